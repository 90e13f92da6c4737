use crate::error::{ChecklistError, ChecklistResult};
use fs2::FileExt;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::path::Path;

fn io_err(path: &Path, source: std::io::Error) -> ChecklistError {
    ChecklistError::Io { path: path.display().to_string(), source }
}

/// Atomically writes `value` as pretty JSON to `path` behind an advisory
/// exclusive lock on a sibling `.lock` file: temp file in the same
/// directory, then rename over the target.
pub fn atomic_write_json<T: Serialize>(path: &Path, value: &T) -> ChecklistResult<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;

    let lock_path = path.with_extension("lock");
    let lock_file = OpenOptions::new().create(true).write(true).open(&lock_path).map_err(|e| io_err(&lock_path, e))?;
    lock_file.lock_exclusive().map_err(|e| io_err(&lock_path, e))?;

    let result = (|| {
        let mut tmp = tempfile::Builder::new().suffix(".tmp").tempfile_in(parent).map_err(|e| io_err(parent, e))?;
        serde_json::to_writer_pretty(tmp.as_file_mut(), value)?;
        tmp.persist(path).map_err(|e| io_err(path, e.error))?;
        Ok(())
    })();

    let _ = FileExt::unlock(&lock_file);
    result
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
    fn writes_and_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        atomic_write_json(&path, &Sample { value: 3 }).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        let parsed: Sample = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, Sample { value: 3 });
    }
}
