// /forum-platform/services/upload-service/src/security_log.rs
// ===== SECURITY EVENT LOG =====

use serde::Serialize;

use crate::identity::ClientIdentity;
use crate::policy::UploadEndpoint;
use crate::validation::ErrorKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SecurityEventKind {
    MaliciousFileBlocked,
    OversizedUpload,
    UnsupportedUpload,
}

impl SecurityEventKind {
    pub fn for_reason(reason: ErrorKind) -> Self {
        match reason {
            ErrorKind::SizeExceeded => SecurityEventKind::OversizedUpload,
            ErrorKind::UnsupportedType => SecurityEventKind::UnsupportedUpload,
            ErrorKind::DangerousExtension
            | ErrorKind::DoubleExtension
            | ErrorKind::ExtensionMimeMismatch
            | ErrorKind::SignatureMismatch => SecurityEventKind::MaliciousFileBlocked,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityEventKind::MaliciousFileBlocked => "MALICIOUS_FILE_BLOCKED",
            SecurityEventKind::OversizedUpload => "OVERSIZED_UPLOAD",
            SecurityEventKind::UnsupportedUpload => "UNSUPPORTED_UPLOAD",
        }
    }
}

/// Event penolakan upload, dicatat ke target `security`
#[derive(Debug, Clone, Serialize)]
pub struct SecurityEvent {
    pub kind: SecurityEventKind,
    pub ip: String,
    pub user_agent: String,
    pub filename: String,
    pub content_type: String,
    pub endpoint: &'static str,
    pub reason: ErrorKind,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl SecurityEvent {
    pub fn rejected(
        identity: &ClientIdentity,
        endpoint: UploadEndpoint,
        filename: &str,
        content_type: &str,
        reason: ErrorKind,
    ) -> Self {
        Self {
            kind: SecurityEventKind::for_reason(reason),
            ip: identity.key.to_string(),
            user_agent: identity.user_agent.clone(),
            filename: filename.to_string(),
            content_type: content_type.to_string(),
            endpoint: endpoint.name(),
            reason,
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn emit(&self) {
        tracing::warn!(
            target: "security",
            event_kind = self.kind.as_str(),
            ip = %self.ip,
            user_agent = %self.user_agent,
            filename = ?self.filename,
            content_type = %self.content_type,
            endpoint = self.endpoint,
            reason = self.reason.code(),
            "Upload diblokir: {}",
            self.reason
        );
    }
}
