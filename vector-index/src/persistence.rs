use crate::error::{VectorIndexError, VectorIndexResult};
use crate::index::VectorIndex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::io::{Read, Write};
use std::path::Path;

const MAGIC: &[u8; 4] = b"LKVX";

#[derive(Debug, Serialize, Deserialize)]
struct Sidecar {
    ids: Vec<String>,
    metadata: Vec<Value>,
    dimension: usize,
}

fn io_err(path: &Path, source: std::io::Error) -> VectorIndexError {
    VectorIndexError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// Writes `<path>.vecs` (a little-endian flat f32 matrix with a small
/// header) and `<path>.json` (ids + metadata + dimension) — a
/// dependency-free stand-in for a `.npz` + `.json` pair.
pub fn save(index: &VectorIndex, path: &Path) -> VectorIndexResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }
    }

    let vecs_path = vecs_path(path);
    let mut buf = Vec::with_capacity(8 + index.len() * index.dimension() * 4);
    buf.extend_from_slice(MAGIC);
    buf.extend_from_slice(&(index.dimension() as u32).to_le_bytes());
    buf.extend_from_slice(&(index.len() as u32).to_le_bytes());
    for embedding in index.embeddings() {
        for value in embedding {
            buf.extend_from_slice(&value.to_le_bytes());
        }
    }
    fs::write(&vecs_path, &buf).map_err(|e| io_err(&vecs_path, e))?;

    let json_path = json_path(path);
    let sidecar = Sidecar {
        ids: index.ids().to_vec(),
        metadata: index.metadata().to_vec(),
        dimension: index.dimension(),
    };
    let mut file = fs::File::create(&json_path).map_err(|e| io_err(&json_path, e))?;
    let body = serde_json::to_string_pretty(&sidecar)?;
    file.write_all(body.as_bytes()).map_err(|e| io_err(&json_path, e))?;
    Ok(())
}

pub fn load(path: &Path) -> VectorIndexResult<VectorIndex> {
    let vecs_path = vecs_path(path);
    let json_path = json_path(path);

    if !vecs_path.exists() {
        return Err(VectorIndexError::NotFound(vecs_path.display().to_string()));
    }
    if !json_path.exists() {
        return Err(VectorIndexError::NotFound(json_path.display().to_string()));
    }

    let mut raw = Vec::new();
    fs::File::open(&vecs_path)
        .map_err(|e| io_err(&vecs_path, e))?
        .read_to_end(&mut raw)
        .map_err(|e| io_err(&vecs_path, e))?;

    if raw.len() < 12 || &raw[0..4] != MAGIC {
        return Err(VectorIndexError::Corrupt {
            path: vecs_path.display().to_string(),
            reason: "missing or invalid header".to_string(),
        });
    }
    let dimension = u32::from_le_bytes(raw[4..8].try_into().unwrap()) as usize;
    let count = u32::from_le_bytes(raw[8..12].try_into().unwrap()) as usize;

    let expected_len = 12 + count * dimension * 4;
    if raw.len() != expected_len {
        return Err(VectorIndexError::Corrupt {
            path: vecs_path.display().to_string(),
            reason: format!("expected {expected_len} bytes, found {}", raw.len()),
        });
    }

    let mut embeddings = Vec::with_capacity(count);
    let mut cursor = 12;
    for _ in 0..count {
        let mut embedding = Vec::with_capacity(dimension);
        for _ in 0..dimension {
            let bytes: [u8; 4] = raw[cursor..cursor + 4].try_into().unwrap();
            embedding.push(f32::from_le_bytes(bytes));
            cursor += 4;
        }
        embeddings.push(embedding);
    }

    let sidecar_raw = fs::read_to_string(&json_path).map_err(|e| io_err(&json_path, e))?;
    let sidecar: Sidecar = serde_json::from_str(&sidecar_raw)?;

    if sidecar.ids.len() != count {
        return Err(VectorIndexError::Corrupt {
            path: json_path.display().to_string(),
            reason: format!("{} ids but {count} vectors", sidecar.ids.len()),
        });
    }

    Ok(VectorIndex::from_parts(sidecar.dimension, sidecar.ids, embeddings, sidecar.metadata))
}

fn vecs_path(path: &Path) -> std::path::PathBuf {
    with_suffix(path, "vecs")
}

fn json_path(path: &Path) -> std::path::PathBuf {
    with_suffix(path, "json")
}

fn with_suffix(path: &Path, ext: &str) -> std::path::PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(".");
    os.push(ext);
    std::path::PathBuf::from(os)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index");

        let mut index = VectorIndex::new(3);
        index.add("a", vec![1.0, 0.0, 0.0], Some(serde_json::json!({"kind": "pattern"}))).unwrap();
        index.add("b", vec![0.0, 1.0, 0.0], None).unwrap();
        save(&index, &path).unwrap();

        let loaded = load(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.dimension(), 3);
        assert!(loaded.contains("a"));
        assert_eq!(loaded.metadata_for("a").unwrap()["kind"], "pattern");
    }

    #[test]
    fn load_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing");
        assert!(matches!(load(&path), Err(VectorIndexError::NotFound(_))));
    }
}
