// /forum-platform/services/upload-service/src/validation/validator.rs
// ===== FILE VALIDATION PIPELINE =====

use std::collections::HashSet;
use std::sync::Arc;

use bytes::Bytes;

use super::dangerous::{extension_segments, DangerousExtensionSet};
use super::sanitizer::sanitize_filename;
use super::signatures::{normalize_content_type, SignatureRegistry};
use super::verdict::{ErrorKind, ValidationVerdict};

// Jumlah byte yang diperiksa heuristic text content
const TEXT_INSPECTION_WINDOW: usize = 8 * 1024;
// Persentase maksimal control character di file text sebelum dianggap binary
const MAX_CONTROL_CHAR_PERCENT: usize = 10;

/// File yang di-upload, dibuat sekali per request dari multipart field
#[derive(Debug, Clone)]
pub struct UploadCandidate {
    filename: String,
    declared_content_type: String,
    size: u64,
    buffer: Bytes,
}

impl UploadCandidate {
    pub fn new(
        filename: impl Into<String>,
        declared_content_type: impl Into<String>,
        buffer: impl Into<Bytes>,
    ) -> Self {
        let buffer = buffer.into();
        Self {
            filename: filename.into(),
            declared_content_type: declared_content_type.into(),
            size: buffer.len() as u64,
            buffer,
        }
    }

    /// Pakai size yang dilaporkan boundary (contoh Content-Length part)
    pub fn with_declared_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn declared_content_type(&self) -> &str {
        &self.declared_content_type
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn buffer(&self) -> &Bytes {
        &self.buffer
    }

    // Size efektif: yang terbesar antara declared size dan panjang buffer asli
    fn effective_size(&self) -> u64 {
        self.size.max(self.buffer.len() as u64)
    }
}

/// Policy per endpoint: content type yang diizinkan dan batas ukuran
#[derive(Debug, Clone)]
pub struct ValidationPolicy {
    allowed_content_types: HashSet<String>,
    max_size_bytes: u64,
    inspect_text_content: bool,
}

impl ValidationPolicy {
    pub fn new<I, S>(allowed_content_types: I, max_size_bytes: u64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            allowed_content_types: allowed_content_types
                .into_iter()
                .map(|ct| normalize_content_type(ct.as_ref()))
                .collect(),
            max_size_bytes,
            inspect_text_content: false,
        }
    }

    /// Aktifkan heuristic binary-in-text untuk format tanpa magic bytes
    pub fn with_text_inspection(mut self, enabled: bool) -> Self {
        self.inspect_text_content = enabled;
        self
    }

    pub fn allows(&self, content_type: &str) -> bool {
        self.allowed_content_types
            .contains(&normalize_content_type(content_type))
    }

    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_bytes
    }

    pub fn inspects_text_content(&self) -> bool {
        self.inspect_text_content
    }

    pub fn allowed_content_types(&self) -> impl Iterator<Item = &str> {
        self.allowed_content_types.iter().map(String::as_str)
    }
}

/// Orchestrator validasi. Registry di-inject sekali saat startup dan di-share
/// antar request tanpa lock.
#[derive(Debug, Clone)]
pub struct FileValidator {
    dangerous: Arc<DangerousExtensionSet>,
    registry: Arc<SignatureRegistry>,
}

impl FileValidator {
    pub fn new(dangerous: Arc<DangerousExtensionSet>, registry: Arc<SignatureRegistry>) -> Self {
        Self {
            dangerous,
            registry,
        }
    }

    pub fn registry(&self) -> &SignatureRegistry {
        &self.registry
    }

    /// Jalankan pipeline validasi secara berurutan, berhenti di check pertama yang gagal
    pub fn validate(&self, candidate: &UploadCandidate, policy: &ValidationPolicy) -> ValidationVerdict {
        match self.run_checks(candidate, policy) {
            Ok(extension) => ValidationVerdict::Accepted {
                sanitized_name: sanitize_filename(candidate.filename()),
                extension,
            },
            Err(kind) => ValidationVerdict::Rejected(kind),
        }
    }

    fn run_checks(&self, candidate: &UploadCandidate, policy: &ValidationPolicy) -> Result<String, ErrorKind> {
        if candidate.effective_size() > policy.max_size_bytes() {
            return Err(ErrorKind::SizeExceeded);
        }

        let segments = extension_segments(candidate.filename());
        self.check_dangerous_extension(candidate.filename(), &segments)?;
        self.check_double_extension(&segments)?;

        if !policy.allows(candidate.declared_content_type()) {
            return Err(ErrorKind::UnsupportedType);
        }

        // Type diizinkan policy tapi tidak ada di registry: fail closed
        let descriptor = self
            .registry
            .lookup(candidate.declared_content_type())
            .ok_or(ErrorKind::UnsupportedType)?;

        let extension = segments.last().copied().unwrap_or_default().to_lowercase();
        if !descriptor.allows_extension(&extension) {
            return Err(ErrorKind::ExtensionMimeMismatch);
        }

        match descriptor.magic() {
            Some(signature) => {
                if !signature.matches(candidate.buffer()) {
                    return Err(ErrorKind::SignatureMismatch);
                }
            }
            None => {
                if policy.inspects_text_content() && looks_binary(candidate.buffer()) {
                    return Err(ErrorKind::SignatureMismatch);
                }
            }
        }

        Ok(extension)
    }

    // Final extension berbahaya di nama multi-dot dilaporkan sebagai DoubleExtension
    fn check_dangerous_extension(&self, filename: &str, segments: &[&str]) -> Result<(), ErrorKind> {
        let disguised = segments.len() > 2
            && segments
                .last()
                .is_some_and(|last| self.dangerous.contains(last));

        if !disguised && self.dangerous.is_dangerous(filename) {
            return Err(ErrorKind::DangerousExtension);
        }

        Ok(())
    }

    // Semua segment setelah yang pertama dicek: `invoice.pdf.exe` dan `report.exe.pdf`
    fn check_double_extension(&self, segments: &[&str]) -> Result<(), ErrorKind> {
        if segments.len() <= 2 {
            return Ok(());
        }

        if segments[1..].iter().any(|segment| self.dangerous.contains(segment)) {
            return Err(ErrorKind::DoubleExtension);
        }

        Ok(())
    }
}

/// Heuristic binary detection untuk file text: ada NUL byte, atau control
/// character (selain tab, LF, CR, FF, ESC) lebih dari 10% window.
pub fn looks_binary(data: &[u8]) -> bool {
    let window = &data[..data.len().min(TEXT_INSPECTION_WINDOW)];
    if window.is_empty() {
        return false;
    }

    if window.contains(&0) {
        return true;
    }

    let control_count = window
        .iter()
        .filter(|&&b| b < 0x20 && !matches!(b, b'\t' | b'\n' | b'\r' | 0x0C | 0x1B))
        .count();

    control_count * 100 > window.len() * MAX_CONTROL_CHAR_PERCENT
}
