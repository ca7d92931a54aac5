// /forum-platform/services/upload-service/src/rate_limit.rs
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
    Extension,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::AppError;
use crate::identity::{ClientIdentity, ClientKey};
use crate::AppState;

/// Token bucket per client: kapasitas `max_requests`, terisi penuh lagi dalam satu window
#[derive(Clone)]
pub struct RateLimiter {
    buckets: Arc<Mutex<HashMap<ClientKey, Bucket>>>,
    capacity: f64,
    window_seconds: f64,
}

#[derive(Debug, Clone, Copy)]
struct Bucket {
    tokens: f64,
    updated: Instant,
}

/// Hasil pengecekan satu request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed,
    Limited { retry_after: Duration },
}

impl RateLimiter {
    pub fn new(max_requests: u32, window_seconds: u64) -> Self {
        let window = Duration::from_secs(window_seconds.max(1));
        let capacity = f64::from(max_requests.max(1));

        let limiter = Self {
            buckets: Arc::new(Mutex::new(HashMap::new())),
            capacity,
            window_seconds: window.as_secs_f64(),
        };

        // Bucket yang idle dua window pasti sudah penuh, aman dibuang
        let buckets_clone = limiter.buckets.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(window * 2);

            loop {
                interval.tick().await;
                let mut buckets = buckets_clone.lock().await;
                let before = buckets.len();
                buckets.retain(|_, bucket| bucket.updated.elapsed() < window * 2);

                if before != buckets.len() {
                    tracing::debug!("Rate limiter cleanup: removed {} stale buckets", before - buckets.len());
                }
            }
        });

        limiter
    }

    /// Ambil satu token untuk client, Limited berisi waktu sampai token berikutnya tersedia
    pub async fn check(&self, key: ClientKey) -> RateDecision {
        let now = Instant::now();
        let mut buckets = self.buckets.lock().await;

        let bucket = buckets.entry(key).or_insert(Bucket {
            tokens: self.capacity,
            updated: now,
        });

        let elapsed = now.saturating_duration_since(bucket.updated).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.capacity / self.window_seconds).min(self.capacity);
        bucket.updated = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            return RateDecision::Allowed;
        }

        let wait = ((1.0 - bucket.tokens) * self.window_seconds / self.capacity).ceil().max(1.0);
        RateDecision::Limited {
            retry_after: Duration::from_secs(wait as u64),
        }
    }
}

/// Rate limiting middleware untuk upload routes, identity sudah di-resolve sebelumnya
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    Extension(identity): Extension<ClientIdentity>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    match state.rate_limiter.check(identity.key).await {
        RateDecision::Allowed => Ok(next.run(req).await),
        RateDecision::Limited { retry_after } => {
            tracing::warn!(
                "Rate limit terlampaui untuk: {} (retry dalam {}s)",
                identity.key,
                retry_after.as_secs()
            );

            Err(AppError::RateLimited {
                retry_after_seconds: retry_after.as_secs(),
            })
        }
    }
}
