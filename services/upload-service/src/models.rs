// /forum-platform/services/upload-service/src/models.rs

use serde::{Deserialize, Serialize};

// ===== RESPONSE MODELS =====

/// Metadata file yang berhasil disimpan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredFile {
    pub file_path: String,
    // Nama persis dari client, hanya untuk ditampilkan
    pub original_name: String,
    pub sanitized_name: String,
    pub stored_name: String,
    pub content_type: String,
    pub size_bytes: u64,
    pub sha256: String,
}

/// Response untuk file upload
#[derive(Debug, Serialize, Deserialize)]
pub struct FileUploadResponse {
    pub success: bool,
    pub message: String,
    pub data: Option<StoredFile>,
}

impl FileUploadResponse {
    /// Helper untuk membuat response upload sukses
    pub fn success(file: StoredFile) -> Self {
        Self {
            success: true,
            message: "File berhasil diupload".to_string(),
            data: Some(file),
        }
    }
}

/// Response untuk error
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}
