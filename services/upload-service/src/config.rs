// /forum-platform/services/upload-service/src/config.rs
// Konfigurasi upload service dari environment variables

use std::env;
use std::net::IpAddr;
use std::path::PathBuf;

use thiserror::Error;
use validator::Validate;

const DEFAULT_CORS_ORIGINS: &[&str] = &["http://localhost:3000", "http://localhost:8080"];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Nilai {key} tidak valid: {value}")]
    InvalidValue { key: &'static str, value: String },

    #[error("Konfigurasi di luar batas: {0}")]
    OutOfBounds(#[from] validator::ValidationErrors),

    #[error("Blocked name pattern tidak valid: {0}")]
    InvalidPattern(#[from] regex::Error),
}

/// Format output log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Konfigurasi lengkap service, di-load sekali saat startup
#[derive(Debug, Clone, Validate)]
pub struct AppConfig {
    pub host: String,
    #[validate(range(min = 1))]
    pub port: u16,
    pub upload_dir: PathBuf,

    // Batas ukuran per endpoint (MB)
    #[validate(range(min = 1, max = 2048))]
    pub forum_post_max_mb: u64,
    #[validate(range(min = 1, max = 2048))]
    pub reply_max_mb: u64,
    #[validate(range(min = 1, max = 2048))]
    pub note_max_mb: u64,

    #[validate(range(min = 1))]
    pub rate_limit_max_requests: u32,
    #[validate(range(min = 1, max = 86400))]
    pub rate_limit_window_seconds: u64,
    #[validate(range(min = 1, max = 100))]
    pub max_concurrent_uploads: usize,

    pub inspect_text_content: bool,
    #[validate(range(min = 1, max = 3600))]
    pub request_timeout_seconds: u64,
    pub log_format: LogFormat,
    pub cors_allowed_origins: Vec<String>,
    // Peer yang boleh mengirim x-forwarded-for / x-real-ip
    pub trusted_proxies: Vec<IpAddr>,

    // Tambahan denylist khusus deployment
    pub extra_blocked_extensions: Vec<String>,
    pub extra_blocked_name_patterns: Vec<String>,
}

impl AppConfig {
    /// Load konfigurasi dari process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(|key| env::var(key).ok())
    }

    /// Load konfigurasi dari sumber key-value apapun (dipakai test tanpa env global)
    pub fn from_source<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = Self {
            host: lookup("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(&lookup, "UPLOAD_SERVICE_PORT", 3004)?,
            upload_dir: PathBuf::from(lookup("UPLOAD_DIR").unwrap_or_else(|| "./storage".to_string())),
            forum_post_max_mb: parse_or(&lookup, "FORUM_POST_MAX_SIZE_MB", 100)?,
            reply_max_mb: parse_or(&lookup, "REPLY_MAX_SIZE_MB", 50)?,
            note_max_mb: parse_or(&lookup, "NOTE_MAX_SIZE_MB", 100)?,
            rate_limit_max_requests: parse_or(&lookup, "RATE_LIMIT_MAX_REQUESTS", 30)?,
            rate_limit_window_seconds: parse_or(&lookup, "RATE_LIMIT_WINDOW_SECONDS", 60)?,
            max_concurrent_uploads: parse_or(&lookup, "MAX_CONCURRENT_UPLOADS", 3)?,
            inspect_text_content: parse_bool_or(&lookup, "UPLOAD_INSPECT_TEXT_CONTENT", true)?,
            request_timeout_seconds: parse_or(&lookup, "REQUEST_TIMEOUT_SECONDS", 120)?,
            log_format: match lookup("LOG_FORMAT").map(|v| v.trim().to_lowercase()).as_deref() {
                Some("json") => LogFormat::Json,
                Some("pretty") | Some("") | None => LogFormat::Pretty,
                Some(other) => {
                    return Err(ConfigError::InvalidValue {
                        key: "LOG_FORMAT",
                        value: other.to_string(),
                    })
                }
            },
            cors_allowed_origins: match parse_list(&lookup, "CORS_ALLOWED_ORIGINS") {
                origins if origins.is_empty() => DEFAULT_CORS_ORIGINS.iter().map(|o| o.to_string()).collect(),
                origins => origins,
            },
            trusted_proxies: parse_ip_list(&lookup, "TRUSTED_PROXIES")?,
            extra_blocked_extensions: parse_list(&lookup, "EXTRA_BLOCKED_EXTENSIONS"),
            extra_blocked_name_patterns: parse_list(&lookup, "EXTRA_BLOCKED_NAME_PATTERNS"),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Konversi MB ke bytes
pub fn megabytes(mb: u64) -> u64 {
    mb * 1024 * 1024
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
            key,
            value: raw,
        }),
        _ => Ok(default),
    }
}

fn parse_bool_or<F>(lookup: &F, key: &'static str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).map(|v| v.trim().to_lowercase()).as_deref() {
        None | Some("") => Ok(default),
        Some("true") | Some("1") | Some("yes") => Ok(true),
        Some("false") | Some("0") | Some("no") => Ok(false),
        Some(other) => Err(ConfigError::InvalidValue {
            key,
            value: other.to_string(),
        }),
    }
}

fn parse_ip_list<F>(lookup: &F, key: &'static str) -> Result<Vec<IpAddr>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    parse_list(lookup, key)
        .into_iter()
        .map(|raw| {
            raw.parse::<IpAddr>()
                .map_err(|_| ConfigError::InvalidValue { key, value: raw })
        })
        .collect()
}

// List dipisah koma, entry kosong diabaikan
fn parse_list<F>(lookup: &F, key: &str) -> Vec<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|raw| {
            raw.split(',')
                .map(|item| item.trim().to_string())
                .filter(|item| !item.is_empty())
                .collect()
        })
        .unwrap_or_default()
}
