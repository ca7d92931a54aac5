// /forum-platform/services/upload-service/src/validation/verdict.rs

use serde::Serialize;
use thiserror::Error;

/// Alasan penolakan file. Semua terminal, tidak ada yang retryable.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    #[error("File terlalu besar untuk endpoint ini")]
    SizeExceeded,
    #[error("Extension file tidak diizinkan")]
    DangerousExtension,
    #[error("Nama file mengandung extension ganda yang berbahaya")]
    DoubleExtension,
    #[error("Tipe file tidak didukung")]
    UnsupportedType,
    #[error("Extension file tidak sesuai dengan tipe file")]
    ExtensionMimeMismatch,
    #[error("Konten file tidak sesuai dengan tipe file")]
    SignatureMismatch,
}

impl ErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::SizeExceeded => "SIZE_EXCEEDED",
            ErrorKind::DangerousExtension => "DANGEROUS_EXTENSION",
            ErrorKind::DoubleExtension => "DOUBLE_EXTENSION",
            ErrorKind::UnsupportedType => "UNSUPPORTED_TYPE",
            ErrorKind::ExtensionMimeMismatch => "EXTENSION_MIME_MISMATCH",
            ErrorKind::SignatureMismatch => "SIGNATURE_MISMATCH",
        }
    }
}

/// Hasil akhir validasi. Accepted selalu bawa nama hasil sanitasi,
/// Rejected selalu bawa alasan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationVerdict {
    Accepted {
        sanitized_name: String,
        extension: String,
    },
    Rejected(ErrorKind),
}

impl ValidationVerdict {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationVerdict::Accepted { .. })
    }

    pub fn reason(&self) -> Option<ErrorKind> {
        match self {
            ValidationVerdict::Rejected(kind) => Some(*kind),
            ValidationVerdict::Accepted { .. } => None,
        }
    }

    pub fn sanitized_name(&self) -> Option<&str> {
        match self {
            ValidationVerdict::Accepted { sanitized_name, .. } => Some(sanitized_name),
            ValidationVerdict::Rejected(_) => None,
        }
    }
}
