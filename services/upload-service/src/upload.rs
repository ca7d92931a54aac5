// /forum-platform/services/upload-service/src/upload.rs
// ===== FORUM UPLOAD FLOW =====

use axum::extract::{multipart::Field, Multipart};
use bytes::{Bytes, BytesMut};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{AppError, AppResult};
use crate::identity::{ClientIdentity, ClientKey};
use crate::models::StoredFile;
use crate::policy::{EndpointPolicies, UploadEndpoint};
use crate::security_log::SecurityEvent;
use crate::storage::FileStorage;
use crate::validation::{ErrorKind, FileValidator, UploadCandidate, ValidationVerdict};

/// Nama multipart field yang berisi file
pub const FILE_FIELD: &str = "file";

// Content type kalau part header tidak mengirim Content-Type
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

// Slot yang lebih tua dari ini dianggap upload yang sudah mati
const STALE_SLOT_MINUTES: i64 = 10;

// ===== CONCURRENT UPLOAD TRACKING =====

type SlotMap = HashMap<ClientKey, Vec<ActiveSlot>>;

#[derive(Debug, Clone, Copy)]
struct ActiveSlot {
    id: u64,
    started: chrono::DateTime<chrono::Utc>,
}

// Tracker untuk membatasi upload concurrent per client dengan auto cleanup
#[derive(Clone)]
pub struct UploadTracker {
    active_uploads: Arc<Mutex<SlotMap>>,
    next_id: Arc<AtomicU64>,
    max_concurrent: usize,
}

impl UploadTracker {
    pub fn new(max_concurrent: usize) -> Self {
        let tracker = Self {
            active_uploads: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(0)),
            max_concurrent,
        };

        // Spawn periodic cleanup task
        let uploads_clone = tracker.active_uploads.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(300));

            loop {
                interval.tick().await;

                let removed = {
                    let mut uploads = lock_slots(&uploads_clone);
                    let before = uploads.len();
                    prune_stale(&mut uploads);
                    before - uploads.len()
                };

                if removed > 0 {
                    tracing::info!("Upload tracker cleanup: removed {} stale entries", removed);
                }
            }
        });

        tracker
    }

    // Ambil slot upload, slot expired (>10 menit) dibuang dulu
    pub fn acquire_slot(&self, key: ClientKey) -> AppResult<UploadSlot> {
        let mut uploads = lock_slots(&self.active_uploads);
        prune_stale(&mut uploads);

        let slots = uploads.entry(key).or_default();
        if slots.len() >= self.max_concurrent {
            return Err(AppError::ConcurrentUploadLimit);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        slots.push(ActiveSlot {
            id,
            started: chrono::Utc::now(),
        });

        Ok(UploadSlot {
            key,
            id,
            active_uploads: self.active_uploads.clone(),
        })
    }

    pub fn active_count(&self, key: ClientKey) -> usize {
        lock_slots(&self.active_uploads).get(&key).map_or(0, Vec::len)
    }
}

/// Slot upload yang sedang berjalan. Dilepas saat di-drop, termasuk ketika
/// future upload dibatalkan oleh timeout atau client disconnect.
pub struct UploadSlot {
    key: ClientKey,
    id: u64,
    active_uploads: Arc<Mutex<SlotMap>>,
}

impl Drop for UploadSlot {
    fn drop(&mut self) {
        let mut uploads = lock_slots(&self.active_uploads);

        if let Some(slots) = uploads.get_mut(&self.key) {
            slots.retain(|slot| slot.id != self.id);
            if slots.is_empty() {
                uploads.remove(&self.key);
            }
        }
    }
}

// Map tetap konsisten walau ada thread yang panic saat memegang lock
fn lock_slots(uploads: &Mutex<SlotMap>) -> MutexGuard<'_, SlotMap> {
    uploads.lock().unwrap_or_else(PoisonError::into_inner)
}

fn prune_stale(uploads: &mut SlotMap) {
    let cutoff = chrono::Utc::now() - chrono::Duration::minutes(STALE_SLOT_MINUTES);
    uploads.retain(|_, slots| {
        slots.retain(|slot| slot.started > cutoff);
        !slots.is_empty()
    });
}

// ===== MAIN FILE UPLOADER =====

/// Uploader: baca multipart dengan batas ukuran, validasi, lalu simpan
#[derive(Clone)]
pub struct FileUploader {
    validator: FileValidator,
    policies: Arc<EndpointPolicies>,
    storage: Arc<FileStorage>,
    upload_tracker: UploadTracker,
}

impl FileUploader {
    pub fn new(
        validator: FileValidator,
        policies: Arc<EndpointPolicies>,
        storage: Arc<FileStorage>,
        upload_tracker: UploadTracker,
    ) -> Self {
        Self {
            validator,
            policies,
            storage,
            upload_tracker,
        }
    }

    pub fn policies(&self) -> &EndpointPolicies {
        &self.policies
    }

    // Upload attachment dengan concurrent control per identity
    pub async fn upload(
        &self,
        endpoint: UploadEndpoint,
        identity: &ClientIdentity,
        multipart: Multipart,
    ) -> AppResult<StoredFile> {
        let _slot = self.upload_tracker.acquire_slot(identity.key).map_err(|e| {
            tracing::warn!("Batas upload concurrent untuk {}: {}", identity.key, e);
            e
        })?;

        self.process_upload(endpoint, identity, multipart).await
    }

    // Cari field `file`, field lain diabaikan
    async fn process_upload(
        &self,
        endpoint: UploadEndpoint,
        identity: &ClientIdentity,
        mut multipart: Multipart,
    ) -> AppResult<StoredFile> {
        while let Some(field) = multipart.next_field().await? {
            if field.name() == Some(FILE_FIELD) {
                return self.process_file_field(endpoint, identity, field).await;
            }
        }

        Err(AppError::MissingFile)
    }

    async fn process_file_field(
        &self,
        endpoint: UploadEndpoint,
        identity: &ClientIdentity,
        field: Field<'_>,
    ) -> AppResult<StoredFile> {
        let filename = field.file_name().unwrap_or_default().to_string();
        let content_type = field
            .content_type()
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();
        let policy = self.policies.for_endpoint(endpoint);

        // Buffer yang terpotong tidak pernah divalidasi
        let data = match read_field_with_limit(field, policy.max_size_bytes()).await? {
            Some(data) => data,
            None => {
                return Err(reject(identity, endpoint, &filename, &content_type, ErrorKind::SizeExceeded));
            }
        };

        let candidate = UploadCandidate::new(filename, content_type, data);

        match self.validator.validate(&candidate, policy) {
            ValidationVerdict::Rejected(reason) => Err(reject(
                identity,
                endpoint,
                candidate.filename(),
                candidate.declared_content_type(),
                reason,
            )),
            ValidationVerdict::Accepted {
                sanitized_name,
                extension,
            } => {
                let stored = self
                    .storage
                    .store(endpoint.category(), &sanitized_name, &extension, candidate.buffer())
                    .await?;

                tracing::info!(
                    "✅ Upload {} diterima: {} -> {}",
                    endpoint.name(),
                    sanitized_name,
                    stored.public_path
                );

                Ok(StoredFile {
                    file_path: stored.public_path,
                    original_name: candidate.filename().to_string(),
                    sanitized_name,
                    stored_name: stored.stored_name,
                    content_type: candidate.declared_content_type().to_string(),
                    size_bytes: stored.size_bytes,
                    sha256: stored.sha256,
                })
            }
        }
    }
}

// Catat security event lalu bungkus alasan penolakan sebagai AppError
fn reject(
    identity: &ClientIdentity,
    endpoint: UploadEndpoint,
    filename: &str,
    content_type: &str,
    reason: ErrorKind,
) -> AppError {
    SecurityEvent::rejected(identity, endpoint, filename, content_type, reason).emit();
    AppError::Rejected(reason)
}

// Baca field chunk per chunk, None kalau melewati ceiling
async fn read_field_with_limit(mut field: Field<'_>, max_size_bytes: u64) -> AppResult<Option<Bytes>> {
    let mut data = BytesMut::new();

    while let Some(chunk) = field.chunk().await? {
        if (data.len() + chunk.len()) as u64 > max_size_bytes {
            return Ok(None);
        }
        data.extend_from_slice(&chunk);
    }

    Ok(Some(data.freeze()))
}
