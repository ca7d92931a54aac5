// /forum-platform/services/upload-service/src/main.rs
mod config;
mod error;
mod handlers;
mod identity;
mod logger;
mod models;
mod policy;
mod rate_limit;
mod routes;
mod security_log;
mod storage;
mod upload;
mod validation;

use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

use config::{AppConfig, ConfigError};
use error::AppResult;
use identity::TrustedProxies;
use policy::{EndpointPolicies, UploadEndpoint};
use rate_limit::RateLimiter;
use storage::FileStorage;
use upload::{FileUploader, UploadTracker};
use validation::{DangerousExtensionSet, FileValidator, SignatureRegistry};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub uploader: FileUploader,
    pub rate_limiter: Arc<RateLimiter>,
    pub trusted_proxies: Arc<TrustedProxies>,
}

impl AppState {
    // Bangun semua komponen dari konfigurasi, registry immutable setelah ini
    pub fn from_config(config: AppConfig) -> AppResult<Self> {
        let dangerous = DangerousExtensionSet::default()
            .with_extensions(&config.extra_blocked_extensions)
            .with_name_patterns(&config.extra_blocked_name_patterns)
            .map_err(ConfigError::from)?;

        let registry = Arc::new(SignatureRegistry::default());
        let validator = FileValidator::new(Arc::new(dangerous), registry.clone());

        let policies = EndpointPolicies::from_config(&config);
        let missing = policies.audit(validator.registry());
        info!(
            "📋 Signature registry: {} content types, {} policy entries tanpa descriptor",
            registry.content_types().count(),
            missing
        );

        let categories = UploadEndpoint::all().map(|endpoint| endpoint.category());
        let storage = FileStorage::new(config.upload_dir.clone(), &categories)?;

        let uploader = FileUploader::new(
            validator,
            Arc::new(policies),
            Arc::new(storage),
            UploadTracker::new(config.max_concurrent_uploads),
        );

        let rate_limiter = RateLimiter::new(config.rate_limit_max_requests, config.rate_limit_window_seconds);
        let trusted_proxies = TrustedProxies::new(config.trusted_proxies.iter().copied());

        Ok(Self {
            config: Arc::new(config),
            uploader,
            rate_limiter: Arc::new(rate_limiter),
            trusted_proxies: Arc::new(trusted_proxies),
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env()?;
    logger::init_logger(config.log_format);

    let bind_address = config.bind_address();
    info!(
        "⚙️ Upload policy: forum_post={}MB, reply={}MB, note={}MB, inspect_text={}",
        config.forum_post_max_mb,
        config.reply_max_mb,
        config.note_max_mb,
        config.inspect_text_content
    );
    if !config.trusted_proxies.is_empty() {
        info!("🔀 Trusted proxies: {:?}", config.trusted_proxies);
    }

    let app_state = AppState::from_config(config)?;
    let app = routes::create_router(app_state);

    info!("🚀 Upload Service starting on {}", bind_address);

    // Start server
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    // Peer address dibutuhkan untuk identity client
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}
