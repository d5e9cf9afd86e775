use serde::{de::DeserializeOwned, Serialize};
use std::path::PathBuf;

/// XDG-compatible cache directory: ~/.cache/pixelshelf/ (Linux) or ~/Library/Caches/pixelshelf/ (macOS)
fn cache_dir() -> Option<PathBuf> {
    let dir = dirs::cache_dir()?.join("pixelshelf");
    std::fs::create_dir_all(&dir).ok()?;
    Some(dir)
}

fn cache_path(key: &str) -> Option<PathBuf> {
    Some(cache_dir()?.join(format!("{}.json", key)))
}

/// Read a cached value. Returns None if missing or corrupt.
pub fn read<T: DeserializeOwned>(key: &str) -> Option<T> {
    let path = cache_path(key)?;
    let data = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&data).ok()
}

/// Write a value to cache. Silently ignores errors.
pub fn write<T: Serialize>(key: &str, value: &T) {
    if let Some(path) = cache_path(key) {
        if let Ok(data) = serde_json::to_string(value) {
            let _ = std::fs::write(path, data);
        }
    }
}

pub fn remove(key: &str) {
    if let Some(path) = cache_path(key) {
        let _ = std::fs::remove_file(path);
    }
}

/// Cache key of the unsent profile draft of one user
pub fn draft_key(user_id: &str) -> String {
    let safe: String = user_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    format!("profile_draft_{}", safe)
}
