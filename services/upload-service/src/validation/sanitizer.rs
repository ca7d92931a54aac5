// /forum-platform/services/upload-service/src/validation/sanitizer.rs
// ===== FILENAME SANITIZER =====

use super::dangerous::final_component;

/// Panjang maksimal nama hasil sanitasi (dalam karakter)
pub const MAX_SANITIZED_LENGTH: usize = 200;

/// Token pengganti kalau hasil sanitasi kosong
pub const FALLBACK_NAME: &str = "file";

/// Sanitize nama file dari user jadi token aman untuk storage.
///
/// Urutan: ambil komponen path terakhir, ganti karakter di luar `[a-zA-Z0-9._-]`
/// dengan `_`, collapse titik berurutan, buang leading dot, lalu truncate.
/// Idempotent: `sanitize_filename(sanitize_filename(x)) == sanitize_filename(x)`.
pub fn sanitize_filename(filename: &str) -> String {
    let name = final_component(filename);

    let mut sanitized = String::with_capacity(name.len());
    let mut previous_dot = false;

    for c in name.chars() {
        let c = if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
            c
        } else {
            '_'
        };

        if c == '.' {
            if previous_dot {
                continue;
            }
            previous_dot = true;
        } else {
            previous_dot = false;
        }

        sanitized.push(c);
    }

    let trimmed = sanitized.strip_prefix('.').unwrap_or(&sanitized);
    let truncated: String = trimmed.chars().take(MAX_SANITIZED_LENGTH).collect();

    if truncated.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        truncated
    }
}
