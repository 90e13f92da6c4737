//! Stop/pause control files: the only externally-writable signal into a
//! running loop. A stop file's contents are ignored, only its presence
//! matters; callers `touch .loki/control/stop` (or `pause`) to steer a
//! live session without sending it a signal.

use std::path::{Path, PathBuf};

pub fn control_dir(loki_dir: &Path) -> PathBuf {
    loki_dir.join("control")
}

pub fn stop_file(loki_dir: &Path) -> PathBuf {
    control_dir(loki_dir).join("stop")
}

pub fn pause_file(loki_dir: &Path) -> PathBuf {
    control_dir(loki_dir).join("pause")
}

pub fn is_stop_requested(loki_dir: &Path) -> bool {
    stop_file(loki_dir).is_file()
}

pub fn is_paused(loki_dir: &Path) -> bool {
    pause_file(loki_dir).is_file()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_files_mean_running() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!is_stop_requested(dir.path()));
        assert!(!is_paused(dir.path()));
    }

    #[test]
    fn presence_is_detected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(control_dir(dir.path())).unwrap();
        std::fs::write(stop_file(dir.path()), "").unwrap();
        assert!(is_stop_requested(dir.path()));
        assert!(!is_paused(dir.path()));
    }
}
