// /forum-platform/services/upload-service/src/policy.rs
// ===== ENDPOINT POLICY TABLE =====

use crate::config::{megabytes, AppConfig};
use crate::validation::{SignatureRegistry, ValidationPolicy};

const IMAGE_TYPES: &[&str] = &["image/jpeg", "image/png", "image/gif", "image/webp"];

const DOCUMENT_TYPES: &[&str] = &[
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "text/plain",
];

const ARCHIVE_TYPES: &[&str] = &[
    "application/zip",
    "application/x-zip-compressed",
    "application/vnd.rar",
    "application/x-rar-compressed",
];

/// Upload surface yang tersedia di forum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UploadEndpoint {
    ForumPost,
    Reply,
    Note,
}

impl UploadEndpoint {
    pub fn name(&self) -> &'static str {
        match self {
            UploadEndpoint::ForumPost => "forum_post",
            UploadEndpoint::Reply => "reply",
            UploadEndpoint::Note => "note",
        }
    }

    /// Sub-directory storage untuk endpoint ini
    pub fn category(&self) -> &'static str {
        match self {
            UploadEndpoint::ForumPost => "posts",
            UploadEndpoint::Reply => "replies",
            UploadEndpoint::Note => "notes",
        }
    }

    pub fn all() -> [UploadEndpoint; 3] {
        [UploadEndpoint::ForumPost, UploadEndpoint::Reply, UploadEndpoint::Note]
    }
}

/// Policy validasi untuk setiap endpoint, dibangun dari konfigurasi
#[derive(Debug, Clone)]
pub struct EndpointPolicies {
    forum_post: ValidationPolicy,
    reply: ValidationPolicy,
    note: ValidationPolicy,
}

impl EndpointPolicies {
    pub fn from_config(config: &AppConfig) -> Self {
        let forum_types = || IMAGE_TYPES.iter().chain(DOCUMENT_TYPES).chain(ARCHIVE_TYPES);
        let reply_types = IMAGE_TYPES.iter().chain(DOCUMENT_TYPES);

        Self {
            forum_post: ValidationPolicy::new(forum_types(), megabytes(config.forum_post_max_mb))
                .with_text_inspection(config.inspect_text_content),
            reply: ValidationPolicy::new(reply_types, megabytes(config.reply_max_mb))
                .with_text_inspection(config.inspect_text_content),
            note: ValidationPolicy::new(forum_types(), megabytes(config.note_max_mb))
                .with_text_inspection(config.inspect_text_content),
        }
    }

    pub fn for_endpoint(&self, endpoint: UploadEndpoint) -> &ValidationPolicy {
        match endpoint {
            UploadEndpoint::ForumPost => &self.forum_post,
            UploadEndpoint::Reply => &self.reply,
            UploadEndpoint::Note => &self.note,
        }
    }

    /// Ceiling terbesar, dipakai untuk request body limit
    pub fn largest_ceiling(&self) -> u64 {
        UploadEndpoint::all()
            .iter()
            .map(|endpoint| self.for_endpoint(*endpoint).max_size_bytes())
            .max()
            .unwrap_or(0)
    }

    /// Log policy saat startup dan warning untuk type yang tidak punya descriptor
    pub fn audit(&self, registry: &SignatureRegistry) -> usize {
        let mut missing = 0;

        for endpoint in UploadEndpoint::all() {
            let policy = self.for_endpoint(endpoint);
            for content_type in policy.allowed_content_types() {
                match registry.lookup(content_type) {
                    Some(descriptor) => tracing::debug!(
                        "Policy {}: {} -> [{}]",
                        endpoint.name(),
                        content_type,
                        descriptor.extensions().collect::<Vec<_>>().join(", ")
                    ),
                    None => {
                        missing += 1;
                        tracing::warn!(
                            "⚠️ Policy {} mengizinkan {} tapi tidak ada signature descriptor, semua upload type ini akan ditolak",
                            endpoint.name(),
                            content_type
                        );
                    }
                }
            }
        }

        missing
    }
}
