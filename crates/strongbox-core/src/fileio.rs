use std::fs;
use std::path::Path;
use std::sync::Mutex;

use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Error;
use crate::Result;

/// Serialises all filesystem mutations. Readers go through it too so a
/// half-written file is never observed; the lock is never held across
/// anything slower than the filesystem call itself.
static FILE_MUTEX: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

pub fn file_exists(path: &Path) -> bool {
    path.exists()
}

pub fn file_load(path: &Path) -> Result<Vec<u8>> {
    let _guard = FILE_MUTEX.lock()?;
    fs::read(path).map_err(|e| Error::from_io(e, path))
}

pub fn file_load_string(path: &Path) -> Result<String> {
    let bytes = file_load(path)?;
    String::from_utf8(bytes).map_err(|e| Error::FileRead(format!("{}: {e}", path.display())))
}

pub fn file_save(path: &Path, data: &[u8]) -> Result<()> {
    let _guard = FILE_MUTEX.lock()?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::from_io(e, parent))?;
    }
    fs::write(path, data).map_err(|e| Error::from_io(e, path))
}

pub fn file_delete(path: &Path) -> Result<()> {
    let _guard = FILE_MUTEX.lock()?;
    if !path.exists() {
        return Ok(());
    }
    let result = if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    result.map_err(|e| Error::from_io(e, path))
}

/// Check-then-create, under the file mutex.
pub fn ensure_dir(path: &Path) -> Result<()> {
    let _guard = FILE_MUTEX.lock()?;
    if !path.exists() {
        fs::create_dir_all(path).map_err(|e| Error::from_io(e, path))?;
    }
    Ok(())
}

/// Loads a JSON file straight into a serde type.
pub fn json_load<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = file_load_string(path)?;
    serde_json::from_str(&text).map_err(|e| Error::Json(format!("{}: {e}", path.display())))
}

/// Writes a serde type as pretty-printed JSON.
pub fn json_save<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    file_save(path, text.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("data.json");

        json_save(&path, &serde_json::json!({"k": 1})).unwrap();
        let back: serde_json::Value = json_load(&path).unwrap();
        assert_eq!(back["k"], 1);
    }

    #[test]
    fn missing_file_is_its_own_kind() {
        let dir = tempfile::tempdir().unwrap();
        let err = file_load(&dir.path().join("absent")).unwrap_err();
        assert!(matches!(err, Error::FileDoesNotExist(_)));
    }
}
