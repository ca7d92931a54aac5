// /forum-platform/services/upload-service/src/validation/dangerous.rs
// ===== DANGEROUS EXTENSION DENYLIST =====

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::RegexSet;

// Extension yang tidak pernah boleh diterima, apapun content type yang di-declare
const DEFAULT_DANGEROUS_EXTENSIONS: &[&str] = &[
    // Windows executables & installers
    "exe", "com", "scr", "pif", "msi", "msp", "mst", "cpl", "gadget", "application",
    // Shared libraries & drivers
    "dll", "so", "dylib", "sys", "drv", "ocx", "ko",
    // Windows scripts
    "bat", "cmd", "vbs", "vbe", "js", "jse", "wsf", "wsh", "ps1", "psm1", "psd1", "hta", "msc",
    // Unix shells & binaries
    "sh", "bash", "zsh", "csh", "ksh", "fish", "run", "bin", "elf", "out", "command",
    // Server-side scripts
    "php", "php3", "php4", "php5", "php7", "phtml", "phar", "asp", "aspx", "jsp", "cgi",
    "pl", "py", "pyc", "rb",
    // JVM & packages
    "jar", "war", "ear", "class", "jnlp", "apk", "app", "deb", "rpm", "dmg", "pkg",
    // Shortcut, registry & system config
    "lnk", "reg", "inf", "scf", "url", "htaccess", "htpasswd", "bashrc", "profile",
    "ini", "cfg", "conf", "config",
];

// Nama file (tanpa extension) yang dikenal sebagai tool miner / credential dumper
const DEFAULT_BLOCKED_NAME_PATTERNS: &[&str] = &[
    r"(?i)xmrig",
    r"(?i)cgminer",
    r"(?i)bfgminer",
    r"(?i)cpuminer",
    r"(?i)nicehash",
    r"(?i)mimikatz",
    r"(?i)^nc(at)?$",
    r"(?i)meterpreter",
];

static DEFAULT_NAME_PATTERNS: Lazy<RegexSet> = Lazy::new(|| {
    RegexSet::new(DEFAULT_BLOCKED_NAME_PATTERNS)
        .expect("Blocked name patterns should compile - this is a static list")
});

/// Denylist extension dan nama file berbahaya. Immutable setelah dibuat,
/// di-share lewat `Arc` ke semua validator.
#[derive(Debug, Clone)]
pub struct DangerousExtensionSet {
    extensions: HashSet<String>,
    name_patterns: RegexSet,
}

impl Default for DangerousExtensionSet {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_DANGEROUS_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            name_patterns: DEFAULT_NAME_PATTERNS.clone(),
        }
    }
}

impl DangerousExtensionSet {
    /// Tambah extension ekstra dari konfigurasi deployment
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions.extend(
            extensions
                .into_iter()
                .map(|ext| normalize_segment(ext.as_ref()).trim_start_matches('.').to_lowercase())
                .filter(|ext| !ext.is_empty()),
        );
        self
    }

    /// Tambah blocked name patterns (regex), pattern lama tetap dipertahankan
    pub fn with_name_patterns<I, S>(self, patterns: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut combined: Vec<String> = self.name_patterns.patterns().to_vec();
        combined.extend(patterns.into_iter().map(|p| p.as_ref().to_string()));

        Ok(Self {
            extensions: self.extensions,
            name_patterns: RegexSet::new(&combined)?,
        })
    }

    /// Lookup satu segment extension (case-insensitive, leading dot dibuang
    /// sama seperti `with_extensions`)
    pub fn contains(&self, extension: &str) -> bool {
        let normalized = normalize_segment(extension)
            .trim_start_matches('.')
            .to_lowercase();
        !normalized.is_empty() && self.extensions.contains(&normalized)
    }

    /// True kalau nama file harus ditolak. Fail closed: nama kosong, tanpa
    /// extension, extension kosong, atau base name kosong semuanya berbahaya.
    pub fn is_dangerous(&self, filename: &str) -> bool {
        let name = final_component(filename);
        if name.trim().is_empty() {
            return true;
        }

        let Some((base, extension)) = name.rsplit_once('.') else {
            return true;
        };

        let base = normalize_segment(base);
        let extension = normalize_segment(extension);

        if base.is_empty() || extension.is_empty() {
            return true;
        }

        if self.contains(extension) {
            return true;
        }

        self.has_blocked_name(base)
    }

    /// Check base name (segment pertama) terhadap blocked name patterns
    pub fn has_blocked_name(&self, base: &str) -> bool {
        let stem = base.split('.').next().unwrap_or(base);
        self.name_patterns.is_match(normalize_segment(stem))
    }
}

// ===== FILENAME HELPERS =====

/// Ambil komponen terakhir dari path (separator `/` dan `\`)
pub fn final_component(filename: &str) -> &str {
    filename
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or(filename)
}

/// Trim whitespace dan control characters di ujung segment (`exe\0`, `exe `)
pub fn normalize_segment(segment: &str) -> &str {
    segment.trim_matches(|c: char| c.is_whitespace() || c.is_control())
}

/// Split nama file (komponen terakhir) jadi segment yang dipisah titik
pub fn extension_segments(filename: &str) -> Vec<&str> {
    final_component(filename)
        .split('.')
        .map(normalize_segment)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocks_executable_and_script_extensions() {
        let set = DangerousExtensionSet::default();

        assert!(set.is_dangerous("setup.exe"));
        assert!(set.is_dangerous("payload.PS1"));
        assert!(set.is_dangerous("libevil.so"));
        assert!(set.is_dangerous("shell.php"));
        assert!(set.is_dangerous("deploy.sh"));
    }

    #[test]
    fn test_allows_document_extensions() {
        let set = DangerousExtensionSet::default();

        assert!(!set.is_dangerous("vacation.jpg"));
        assert!(!set.is_dangerous("report.pdf"));
        assert!(!set.is_dangerous("notes.txt"));
        assert!(!set.is_dangerous("backup.zip"));
    }

    #[test]
    fn test_fails_closed_on_missing_parts() {
        let set = DangerousExtensionSet::default();

        assert!(set.is_dangerous(""));
        assert!(set.is_dangerous("   "));
        assert!(set.is_dangerous("README"));
        assert!(set.is_dangerous("archive."));
        assert!(set.is_dangerous(".bashrc"));
        assert!(set.is_dangerous(".gitignore"));
        assert!(set.is_dangerous("uploads/"));
    }

    #[test]
    fn test_trailing_control_characters_do_not_hide_extension() {
        let set = DangerousExtensionSet::default();

        assert!(set.is_dangerous("run.exe\0"));
        assert!(set.is_dangerous("run.exe "));
        assert!(set.contains(".EXE"));
    }

    #[test]
    fn test_lookup_and_extra_extensions_agree_on_leading_dot() {
        let set = DangerousExtensionSet::default().with_extensions([".svg"]);

        assert!(set.contains("svg"));
        assert!(set.contains(".SVG"));
        assert!(set.contains("exe"));
        assert!(set.contains("..exe"));
        assert!(!set.contains("."));
        assert!(!set.contains(""));
    }

    #[test]
    fn test_uses_final_path_component() {
        let set = DangerousExtensionSet::default();

        assert!(!set.is_dangerous("../../photos.v2/cat.png"));
        assert!(set.is_dangerous("C:\\temp\\tool.bat"));
    }

    #[test]
    fn test_blocked_name_patterns() {
        let set = DangerousExtensionSet::default();

        assert!(set.is_dangerous("xmrig.txt"));
        assert!(set.is_dangerous("XMRig-6.21.zip"));
        assert!(set.is_dangerous("mimikatz.zip"));
        assert!(!set.is_dangerous("nc-report.txt"));
        assert!(!set.is_dangerous("mining-notes.txt"));
    }

    #[test]
    fn test_extra_extensions_and_patterns() {
        let set = DangerousExtensionSet::default()
            .with_extensions([".svg", "HTML", "  "])
            .with_name_patterns(["(?i)^payload$"])
            .unwrap();

        assert!(set.is_dangerous("logo.svg"));
        assert!(set.is_dangerous("index.html"));
        assert!(set.is_dangerous("PAYLOAD.txt"));
        assert!(set.is_dangerous("setup.exe"));
        assert!(set.is_dangerous("xmrig.txt"));
        assert!(!set.is_dangerous("payload-notes.txt"));
    }

    #[test]
    fn test_invalid_name_pattern_is_an_error() {
        assert!(DangerousExtensionSet::default().with_name_patterns(["("]).is_err());
    }

    #[test]
    fn test_extension_segments() {
        assert_eq!(extension_segments("a/b/invoice.pdf.exe"), vec!["invoice", "pdf", "exe"]);
        assert_eq!(extension_segments("x.exe\0.jpg"), vec!["x", "exe", "jpg"]);
    }
}
