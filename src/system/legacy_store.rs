// src/system/legacy_store.rs

//! The private, per-solution state blob: bincode records compressed with LZ4.

use crate::constants::LEGACY_STORE_VERSION;
use crate::core::schema::StorageError;
use crate::models::{LegacySnapshot, SerializableLegacySnapshot};
use std::fs;
use std::path::Path;

/// Serializes a snapshot to its on-disk bytes.
pub fn encode(snapshot: &LegacySnapshot) -> Result<Vec<u8>, StorageError> {
    let record = SerializableLegacySnapshot::from(snapshot);
    let raw = bincode::serde::encode_to_vec(&record, bincode::config::standard())?;
    log::trace!("Serialized legacy store to {} bytes.", raw.len());
    Ok(lz4_flex::compress_prepend_size(&raw))
}

/// Parses on-disk bytes. Empty input is an empty snapshot.
pub fn decode(bytes: &[u8]) -> Result<LegacySnapshot, StorageError> {
    if bytes.is_empty() {
        return Ok(LegacySnapshot::default());
    }
    let raw = lz4_flex::decompress_size_prepended(bytes)?;
    let (record, _): (SerializableLegacySnapshot, usize) =
        bincode::serde::decode_from_slice(&raw, bincode::config::standard())?;
    if record.version != LEGACY_STORE_VERSION {
        return Err(StorageError::Version {
            found: record.version,
            expected: LEGACY_STORE_VERSION,
        });
    }
    Ok(record.into())
}

/// Reads the store. A missing file is `Ok(None)`.
pub fn load(path: &Path) -> Result<Option<LegacySnapshot>, StorageError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(StorageError::Io {
                path: path.display().to_string(),
                source,
            });
        }
    };
    decode(&bytes).map(Some)
}

/// Reads the store, treating a damaged one as absent.
pub fn load_or_warn(path: &Path) -> Option<LegacySnapshot> {
    match load(path) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            log::warn!(
                "Ignoring unreadable legacy store '{}': {}",
                path.display(),
                e
            );
            None
        }
    }
}

/// Writes the store.
pub fn save(path: &Path, snapshot: &LegacySnapshot) -> Result<(), StorageError> {
    let bytes = encode(snapshot)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| StorageError::Io {
            path: parent.display().to_string(),
            source,
        })?;
    }
    fs::write(path, bytes).map_err(|source| StorageError::Io {
        path: path.display().to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ItemData, ProjectData};
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;
    use uuid::Uuid;

    fn snapshot() -> LegacySnapshot {
        let mut project = ProjectData::empty(Uuid::from_u128(1));
        project.delimiter = Some(";".to_string());
        project.items.push(ItemData {
            id: Uuid::from_u128(2),
            command: "grp".to_string(),
            items: Some(vec![ItemData {
                id: Uuid::from_u128(3),
                command: "--x".to_string(),
                default_checked: true,
                ..Default::default()
            }]),
            ..Default::default()
        });
        let mut snapshot = LegacySnapshot::default();
        snapshot.checked_arguments.insert(Uuid::from_u128(3));
        snapshot.expanded_containers.insert(Uuid::from_u128(2));
        snapshot.project_arguments.insert(project.id, project);
        snapshot
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("App.argtree.bin");
        let original = snapshot();

        save(&path, &original).unwrap();
        let loaded = load(&path).unwrap().unwrap();

        assert_eq!(loaded, original);
        assert!(load(&dir.path().join("missing.bin")).unwrap().is_none());
    }

    #[test]
    fn test_corrupt_store_is_treated_as_absent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("App.argtree.bin");
        // Declares 5 bytes of output, then a truncated literal run.
        fs::write(&path, [5u8, 0, 0, 0, 0xFF, 0xFF]).unwrap();

        assert!(load(&path).is_err());
        assert!(load_or_warn(&path).is_none());
    }
}
