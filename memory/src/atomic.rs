use crate::error::{MemoryError, MemoryResult};
use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::path::Path;

fn io_err(path: &Path, source: std::io::Error) -> MemoryError {
    MemoryError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// Acquires an advisory lock on a sibling `.lock` file for the duration of
/// the closure. Exclusive for writers, shared for readers.
fn with_file_lock<T>(
    path: &Path,
    exclusive: bool,
    f: impl FnOnce() -> MemoryResult<T>,
) -> MemoryResult<T> {
    let lock_path = path.with_extension(match path.extension() {
        Some(ext) => format!("{}.lock", ext.to_string_lossy()),
        None => "lock".to_string(),
    });
    if let Some(parent) = lock_path.parent() {
        fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    let lock_file = OpenOptions::new()
        .create(true)
        .write(true)
        .open(&lock_path)
        .map_err(|e| io_err(&lock_path, e))?;

    if exclusive {
        lock_file.lock_exclusive().map_err(|e| io_err(&lock_path, e))?;
    } else {
        lock_file.lock_shared().map_err(|e| io_err(&lock_path, e))?;
    }

    let result = f();

    let _ = FileExt::unlock(&lock_file);
    result
}

/// Atomically writes `value` as JSON to `path`: serialize to a temp file in
/// the same directory, then rename over the target. Either the full new
/// contents become visible or the original file is untouched.
pub fn atomic_write_json<T: Serialize>(path: &Path, value: &T, kind: &'static str) -> MemoryResult<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;

    with_file_lock(path, true, || {
        let mut tmp = tempfile::Builder::new()
            .prefix(".tmp_")
            .suffix(".json")
            .tempfile_in(parent)
            .map_err(|e| io_err(parent, e))?;

        serde_json::to_writer_pretty(tmp.as_file_mut(), value)
            .map_err(|source| MemoryError::Serialize { kind, source })?;

        tmp.persist(path)
            .map_err(|e| io_err(path, e.error))?;
        Ok(())
    })
}

/// Reads and deserializes JSON from `path`. Missing files are `Ok(None)`,
/// not an error — a single unreadable entity is a miss, never fatal.
pub fn load_json<T: DeserializeOwned>(path: &Path, kind: &'static str) -> MemoryResult<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    with_file_lock(path, false, || {
        let file = File::open(path).map_err(|e| io_err(path, e))?;
        match serde_json::from_reader(file) {
            Ok(value) => Ok(Some(value)),
            Err(source) => {
                tracing::warn!(path = %path.display(), kind, error = %source, "corrupt memory file, treating as miss");
                Ok(None)
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Sample {
        value: u32,
    }

    #[test]
    fn round_trips_and_is_atomic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.json");
        atomic_write_json(&path, &Sample { value: 7 }, "sample").unwrap();
        let loaded: Option<Sample> = load_json(&path, "sample").unwrap();
        assert_eq!(loaded, Some(Sample { value: 7 }));
    }

    #[test]
    fn missing_file_is_none_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");
        let loaded: Option<Sample> = load_json(&path, "sample").unwrap();
        assert_eq!(loaded, None);
    }

    #[test]
    fn corrupt_file_is_treated_as_miss() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corrupt.json");
        std::fs::write(&path, b"{not json").unwrap();
        let loaded: MemoryResult<Option<Sample>> = load_json(&path, "sample");
        assert_eq!(loaded.unwrap(), None);
    }
}
