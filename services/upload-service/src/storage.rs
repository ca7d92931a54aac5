// /forum-platform/services/upload-service/src/storage.rs
// ===== STORAGE WRITER =====

use std::path::{Path, PathBuf};

use rand::Rng;
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::validation::sanitizer::FALLBACK_NAME;

/// Prefix URL publik untuk file yang disimpan
pub const PUBLIC_PREFIX: &str = "/storage";

// Panjang maksimal stem di nama file storage
const MAX_STEM_LENGTH: usize = 64;
const SUFFIX_CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Hasil penyimpanan file
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub public_path: String,
    pub stored_name: String,
    pub sha256: String,
    pub size_bytes: u64,
}

/// Writer ke local filesystem dengan atomic rename dari temp directory
#[derive(Debug, Clone)]
pub struct FileStorage {
    upload_dir: PathBuf,
    temp_dir: PathBuf,
}

impl FileStorage {
    // Initialize storage dengan secure directories per kategori
    pub fn new(upload_dir: impl Into<PathBuf>, categories: &[&str]) -> AppResult<Self> {
        let upload_dir = upload_dir.into();
        let temp_dir = upload_dir.join("temp");

        create_secure_directory(&upload_dir)?;
        create_secure_directory(&temp_dir)?;
        for category in categories {
            create_secure_directory(&upload_dir.join(category))?;
        }

        Ok(Self { upload_dir, temp_dir })
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    /// Simpan bytes yang sudah lolos validasi, return path publik.
    /// Kalau gagal di langkah manapun, tidak ada file yang tersisa di temp maupun kategori.
    pub async fn store(
        &self,
        category: &str,
        sanitized_name: &str,
        extension: &str,
        data: &[u8],
    ) -> AppResult<StoredObject> {
        let stored_name = storage_file_name(sanitized_name, extension);
        let temp_path = self.temp_dir.join(format!("{}.tmp", stored_name));
        let final_path = self.upload_dir.join(category).join(&stored_name);

        if let Err(e) = stage_file(&temp_path, data).await {
            discard_file(&temp_path).await;
            return Err(e);
        }

        // Rename adalah satu-satunya langkah yang membuat file terlihat di /storage
        if let Err(e) = fs::rename(&temp_path, &final_path).await {
            discard_file(&temp_path).await;
            return Err(AppError::Storage(format!("Gagal memindahkan file: {}", e)));
        }

        let sha256 = file_digest(data);

        tracing::info!(
            "Integritas file: path={}, hash={}, size={}",
            final_path.display(),
            sha256,
            data.len()
        );

        Ok(StoredObject {
            public_path: format!("{}/{}/{}", PUBLIC_PREFIX, category, stored_name),
            stored_name,
            sha256,
            size_bytes: data.len() as u64,
        })
    }
}

// Tulis ke temp directory dan set permission sebelum file dipindah ke kategori
async fn stage_file(temp_path: &Path, data: &[u8]) -> AppResult<()> {
    let mut file = fs::File::create(temp_path)
        .await
        .map_err(|e| AppError::Storage(format!("Gagal membuat file sementara: {}", e)))?;

    file.write_all(data)
        .await
        .map_err(|e| AppError::Storage(format!("Gagal menulis file: {}", e)))?;

    file.flush()
        .await
        .map_err(|e| AppError::Storage(format!("Gagal flush file: {}", e)))?;

    file.sync_all()
        .await
        .map_err(|e| AppError::Storage(format!("Gagal sync file: {}", e)))?;
    drop(file);

    set_secure_permissions(temp_path).await
}

async fn discard_file(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!("Gagal menghapus file sementara {}: {}", path.display(), e);
        }
    }
}

/// Nama file di disk: `{timestamp}_{uuid}_{random}_{stem}.{extension}`.
/// Stem diambil dari nama hasil sanitasi tanpa extension terakhir.
pub fn storage_file_name(sanitized_name: &str, extension: &str) -> String {
    let stem = sanitized_name
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(sanitized_name);

    let stem: String = stem
        .trim_matches(|c| c == '.' || c == '_' || c == '-')
        .chars()
        .take(MAX_STEM_LENGTH)
        .collect();
    let stem = if stem.is_empty() { FALLBACK_NAME.to_string() } else { stem };

    let mut rng = rand::rng();
    let random_suffix: String = (0..8)
        .map(|_| SUFFIX_CHARS[rng.random_range(0..SUFFIX_CHARS.len())] as char)
        .collect();

    format!(
        "{}_{}_{}_{}.{}",
        chrono::Utc::now().timestamp_millis(),
        Uuid::new_v4().simple(),
        random_suffix,
        stem,
        extension.to_lowercase()
    )
}

/// SHA-256 hex digest untuk integrity check
pub fn file_digest(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

// Create secure directories dengan proper permissions
fn create_secure_directory(path: &Path) -> AppResult<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)
            .map_err(|e| AppError::Storage(format!("Gagal membuat direktori {}: {}", path.display(), e)))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = std::fs::metadata(path)?.permissions();
            perms.set_mode(0o755);
            std::fs::set_permissions(path, perms)?;
        }
    }

    Ok(())
}

// Set secure file permissions (read-write owner, read-only others)
async fn set_secure_permissions(file_path: &Path) -> AppResult<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(file_path)
            .await
            .map_err(|e| AppError::Storage(format!("Gagal mendapatkan permission file: {}", e)))?
            .permissions();

        perms.set_mode(0o644);
        fs::set_permissions(file_path, perms)
            .await
            .map_err(|e| AppError::Storage(format!("Gagal set permission file: {}", e)))?;
    }

    #[cfg(not(unix))]
    let _ = file_path;

    Ok(())
}
