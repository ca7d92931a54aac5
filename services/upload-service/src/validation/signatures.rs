// /forum-platform/services/upload-service/src/validation/signatures.rs
// ===== CONTENT TYPE SIGNATURE REGISTRY =====

use std::collections::{BTreeSet, HashMap};

const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF];
const PNG_MAGIC: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
const GIF87_MAGIC: &[u8] = b"GIF87a";
const GIF89_MAGIC: &[u8] = b"GIF89a";
const RIFF_MAGIC: &[u8] = b"RIFF";
const PDF_MAGIC: &[u8] = b"%PDF-";
// OLE2 compound document, dipakai .doc dan .xls lama
const OLE2_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const ZIP_EMPTY_MAGIC: &[u8] = b"PK\x05\x06";
const ZIP_SPANNED_MAGIC: &[u8] = b"PK\x07\x08";
// Prefix bersama RAR 4.x dan RAR 5
const RAR_MAGIC: &[u8] = b"Rar!\x1A\x07";

/// Marker tambahan di offset tetap, contoh `WEBP` di byte 8..12 untuk container RIFF
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffsetMarker {
    pub offset: usize,
    pub bytes: Vec<u8>,
}

/// Magic bytes yang mengkonfirmasi format asli buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MagicSignature {
    prefixes: Vec<Vec<u8>>,
    marker: Option<OffsetMarker>,
}

impl MagicSignature {
    pub fn prefix(bytes: &[u8]) -> Self {
        Self {
            prefixes: vec![bytes.to_vec()],
            marker: None,
        }
    }

    pub fn any_of(prefixes: &[&[u8]]) -> Self {
        Self {
            prefixes: prefixes.iter().map(|p| p.to_vec()).collect(),
            marker: None,
        }
    }

    pub fn with_marker(mut self, offset: usize, bytes: &[u8]) -> Self {
        self.marker = Some(OffsetMarker {
            offset,
            bytes: bytes.to_vec(),
        });
        self
    }

    /// Buffer harus diawali salah satu prefix dan (kalau ada) punya marker di offset-nya.
    /// Buffer yang lebih pendek dari prefix otomatis tidak match.
    pub fn matches(&self, data: &[u8]) -> bool {
        let prefix_ok = self.prefixes.iter().any(|prefix| data.starts_with(prefix));
        if !prefix_ok {
            return false;
        }

        match &self.marker {
            Some(marker) => data
                .get(marker.offset..marker.offset + marker.bytes.len())
                .is_some_and(|window| window == marker.bytes.as_slice()),
            None => true,
        }
    }
}

/// Descriptor per content type: extension utama, alias opsional, plus signature opsional.
/// `magic == None` berarti format text-based yang tidak bisa di-sniff.
/// Extension utama wajib ada, jadi descriptor tidak pernah punya set extension kosong.
#[derive(Debug, Clone)]
pub struct SignatureDescriptor {
    primary: String,
    aliases: BTreeSet<String>,
    magic: Option<MagicSignature>,
}

impl SignatureDescriptor {
    pub fn new(primary_extension: &str, magic: Option<MagicSignature>) -> Self {
        Self {
            primary: normalize_extension(primary_extension),
            aliases: BTreeSet::new(),
            magic,
        }
    }

    /// Extension tambahan yang juga sah untuk content type ini
    pub fn with_aliases(mut self, aliases: &[&str]) -> Self {
        self.aliases.extend(
            aliases
                .iter()
                .map(|alias| normalize_extension(alias))
                .filter(|alias| !alias.is_empty() && *alias != self.primary),
        );
        self
    }

    pub fn primary_extension(&self) -> &str {
        &self.primary
    }

    // Extension kosong tidak pernah sah
    pub fn allows_extension(&self, extension: &str) -> bool {
        let extension = normalize_extension(extension);
        !extension.is_empty() && (extension == self.primary || self.aliases.contains(&extension))
    }

    pub fn magic(&self) -> Option<&MagicSignature> {
        self.magic.as_ref()
    }

    pub fn extensions(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.primary.as_str()).chain(self.aliases.iter().map(String::as_str))
    }
}

fn normalize_extension(extension: &str) -> String {
    extension.trim().trim_start_matches('.').to_lowercase()
}

/// Mapping content type -> descriptor. Read-only setelah startup.
#[derive(Debug, Clone)]
pub struct SignatureRegistry {
    descriptors: HashMap<String, SignatureDescriptor>,
}

impl Default for SignatureRegistry {
    fn default() -> Self {
        let ole2 = || Some(MagicSignature::prefix(OLE2_MAGIC));
        let zip = || Some(MagicSignature::any_of(&[ZIP_MAGIC, ZIP_EMPTY_MAGIC, ZIP_SPANNED_MAGIC]));
        let rar = || Some(MagicSignature::prefix(RAR_MAGIC));

        Self::empty()
            // Images
            .register("image/jpeg", SignatureDescriptor::new("jpg", Some(MagicSignature::prefix(JPEG_MAGIC))).with_aliases(&["jpeg", "jpe"]))
            .register("image/png", SignatureDescriptor::new("png", Some(MagicSignature::prefix(PNG_MAGIC))))
            .register("image/gif", SignatureDescriptor::new("gif", Some(MagicSignature::any_of(&[GIF87_MAGIC, GIF89_MAGIC]))))
            .register(
                "image/webp",
                SignatureDescriptor::new("webp", Some(MagicSignature::prefix(RIFF_MAGIC).with_marker(8, b"WEBP"))),
            )
            .register("image/svg+xml", SignatureDescriptor::new("svg", None))
            // Documents
            .register("application/pdf", SignatureDescriptor::new("pdf", Some(MagicSignature::prefix(PDF_MAGIC))))
            .register("application/msword", SignatureDescriptor::new("doc", ole2()))
            .register("application/vnd.ms-excel", SignatureDescriptor::new("xls", ole2()))
            .register(
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
                SignatureDescriptor::new("docx", zip()),
            )
            .register(
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
                SignatureDescriptor::new("xlsx", zip()),
            )
            .register("text/plain", SignatureDescriptor::new("txt", None).with_aliases(&["text"]))
            // Archives
            .register("application/zip", SignatureDescriptor::new("zip", zip()))
            .register("application/x-zip-compressed", SignatureDescriptor::new("zip", zip()))
            .register("application/vnd.rar", SignatureDescriptor::new("rar", rar()))
            .register("application/x-rar-compressed", SignatureDescriptor::new("rar", rar()))
    }
}

impl SignatureRegistry {
    pub fn empty() -> Self {
        Self {
            descriptors: HashMap::new(),
        }
    }

    pub fn register(mut self, content_type: &str, descriptor: SignatureDescriptor) -> Self {
        self.descriptors
            .insert(normalize_content_type(content_type), descriptor);
        self
    }

    pub fn lookup(&self, content_type: &str) -> Option<&SignatureDescriptor> {
        self.descriptors.get(&normalize_content_type(content_type))
    }

    pub fn content_types(&self) -> impl Iterator<Item = &str> {
        self.descriptors.keys().map(String::as_str)
    }
}

/// Normalisasi content type: lowercase, trim, buang parameter (`; charset=utf-8`)
pub fn normalize_content_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_normalizes_content_type() {
        let registry = SignatureRegistry::default();

        assert!(registry.lookup("image/jpeg").is_some());
        assert!(registry.lookup(" IMAGE/JPEG ").is_some());
        assert!(registry.lookup("text/plain; charset=utf-8").is_some());
        assert!(registry.lookup("application/x-msdownload").is_none());
    }

    #[test]
    fn test_descriptor_extensions() {
        let registry = SignatureRegistry::default();
        let jpeg = registry.lookup("image/jpeg").unwrap();

        assert!(jpeg.allows_extension("jpg"));
        assert!(jpeg.allows_extension("JPEG"));
        assert!(!jpeg.allows_extension("png"));
        assert_eq!(jpeg.primary_extension(), "jpg");
        assert_eq!(jpeg.extensions().collect::<Vec<_>>(), vec!["jpg", "jpe", "jpeg"]);
    }

    #[test]
    fn test_text_formats_have_no_signature() {
        let registry = SignatureRegistry::default();

        assert!(registry.lookup("text/plain").unwrap().magic().is_none());
        assert!(registry.lookup("image/svg+xml").unwrap().magic().is_none());
        assert!(registry.lookup("application/pdf").unwrap().magic().is_some());
    }

    #[test]
    fn test_prefix_matching() {
        let registry = SignatureRegistry::default();
        let pdf = registry.lookup("application/pdf").unwrap().magic().unwrap();

        assert!(pdf.matches(b"%PDF-1.7\n"));
        assert!(!pdf.matches(b"%PDF"));
        assert!(!pdf.matches(b"MZ\x90\x00"));
        assert!(!pdf.matches(b""));
    }

    #[test]
    fn test_alternative_prefixes() {
        let registry = SignatureRegistry::default();
        let gif = registry.lookup("image/gif").unwrap().magic().unwrap();

        assert!(gif.matches(b"GIF87a\x01\x00"));
        assert!(gif.matches(b"GIF89a\x01\x00"));
        assert!(!gif.matches(b"GIF90a"));
    }

    #[test]
    fn test_webp_requires_marker() {
        let registry = SignatureRegistry::default();
        let webp = registry.lookup("image/webp").unwrap().magic().unwrap();

        assert!(webp.matches(b"RIFF\x24\x00\x00\x00WEBPVP8 "));
        assert!(!webp.matches(b"RIFF\x24\x00\x00\x00WAVEfmt "));
        assert!(!webp.matches(b"RIFF\x24\x00"));
    }

    #[test]
    fn test_custom_registry() {
        let registry = SignatureRegistry::empty()
            .register("Application/X-Custom", SignatureDescriptor::new("CST", Some(MagicSignature::prefix(b"CST1"))));

        let descriptor = registry.lookup("application/x-custom").unwrap();
        assert!(descriptor.allows_extension("cst"));
        assert_eq!(registry.content_types().count(), 1);
    }

    #[test]
    fn test_descriptor_always_has_an_extension() {
        let descriptor = SignatureDescriptor::new(".PDF", None).with_aliases(&["", "pdf", " Pdfa "]);

        assert_eq!(descriptor.extensions().collect::<Vec<_>>(), vec!["pdf", "pdfa"]);
        assert!(descriptor.allows_extension("PDF"));
        assert!(!descriptor.allows_extension(""));

        // Extension utama kosong tetap tidak membuka celah untuk nama tanpa extension
        let blank = SignatureDescriptor::new("  ", None);
        assert_eq!(blank.extensions().count(), 1);
        assert!(!blank.allows_extension(""));
    }
}
