//! On-disk persistence for an index version.
//!
//! An index version is stored as two artifacts that are always written and
//! read together:
//!
//! - the vector file: magic `APXV`, `u32` format version, `u32` dimension,
//!   `u64` vector count, `u64` build id, then `count * dimension`
//!   little-endian `f32`s;
//! - the metadata file: a JSON document with a schema version, the same
//!   build id, the dimension, and the products in index order.
//!
//! Loading validates both files against each other. Any disagreement is
//! reported as a retrieval error and the index is not served.

use std::collections::hash_map::DefaultHasher;
use std::fs::File;
use std::hash::{Hash, Hasher};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use apothecary_core::error::{ApothecaryError, Result};
use apothecary_core::types::Product;

use crate::catalog::IndexedCatalog;
use crate::index::VectorIndex;

const INDEX_MAGIC: &[u8; 4] = b"APXV";
const INDEX_FORMAT_VERSION: u32 = 2;
const HEADER_LEN: usize = 4 + 4 + 4 + 8 + 8;

/// Current metadata schema version.
pub const METADATA_SCHEMA_VERSION: u32 = 2;

/// Serialized form of the metadata artifact.
#[derive(Debug, Serialize, Deserialize)]
pub struct IndexMetadata {
    pub schema_version: u32,
    /// Must equal the build id in the index header.
    pub build_id: u64,
    pub dimension: usize,
    pub products: Vec<Product>,
}

/// Persist an index version to `index_path` and `metadata_path`.
///
/// Both files are first written to temporary siblings and only renamed into
/// place once both writes have succeeded.
pub fn save(catalog: &IndexedCatalog, index_path: &Path, metadata_path: &Path) -> Result<()> {
    for path in [index_path, metadata_path] {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
    }

    let index_tmp = temp_sibling(index_path);
    let metadata_tmp = temp_sibling(metadata_path);
    let build_id = new_build_id(catalog);

    let written = write_pair(catalog, build_id, &index_tmp, &metadata_tmp).and_then(|()| {
        std::fs::rename(&index_tmp, index_path)?;
        std::fs::rename(&metadata_tmp, metadata_path)?;
        Ok(())
    });
    if let Err(e) = written {
        for tmp in [&index_tmp, &metadata_tmp] {
            if tmp.exists() {
                if let Err(cleanup) = std::fs::remove_file(tmp) {
                    warn!(path = %tmp.display(), error = %cleanup, "Failed to remove temporary file");
                }
            }
        }
        return Err(e);
    }

    info!(
        index = %index_path.display(),
        metadata = %metadata_path.display(),
        vectors = catalog.len(),
        dimension = catalog.dimension(),
        build_id,
        "Index and metadata saved"
    );
    Ok(())
}

/// Load and cross-validate an index version.
pub fn load(index_path: &Path, metadata_path: &Path) -> Result<IndexedCatalog> {
    let (index, build_id) = read_index(index_path)?;

    let file = File::open(metadata_path).map_err(|e| unreadable(metadata_path, e))?;
    let metadata: IndexMetadata = serde_json::from_reader(BufReader::new(file)).map_err(|e| {
        ApothecaryError::Retrieval(format!(
            "metadata {} is not valid: {}",
            metadata_path.display(),
            e
        ))
    })?;

    if metadata.schema_version != METADATA_SCHEMA_VERSION {
        return Err(ApothecaryError::Retrieval(format!(
            "metadata schema version {} is not supported (expected {})",
            metadata.schema_version, METADATA_SCHEMA_VERSION
        )));
    }
    if metadata.build_id != build_id {
        return Err(ApothecaryError::Retrieval(format!(
            "metadata {} belongs to build {:016x} but index {} is build {:016x}",
            metadata_path.display(),
            metadata.build_id,
            index_path.display(),
            build_id
        )));
    }
    if metadata.dimension != index.dimension() {
        return Err(ApothecaryError::Retrieval(format!(
            "metadata records dimension {} but index has dimension {}",
            metadata.dimension,
            index.dimension()
        )));
    }

    let catalog = IndexedCatalog::new(index, metadata.products)?;
    info!(
        index = %index_path.display(),
        vectors = catalog.len(),
        dimension = catalog.dimension(),
        "Index and metadata loaded"
    );
    Ok(catalog)
}

fn write_pair(
    catalog: &IndexedCatalog,
    build_id: u64,
    index_tmp: &Path,
    metadata_tmp: &Path,
) -> Result<()> {
    write_index(catalog.index(), build_id, index_tmp)?;

    let metadata = IndexMetadata {
        schema_version: METADATA_SCHEMA_VERSION,
        build_id,
        dimension: catalog.dimension(),
        products: catalog.products().to_vec(),
    };
    let mut writer = BufWriter::new(File::create(metadata_tmp)?);
    serde_json::to_writer_pretty(&mut writer, &metadata)?;
    writer.flush()?;
    Ok(())
}

fn write_index(index: &VectorIndex, build_id: u64, path: &Path) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(INDEX_MAGIC)?;
    writer.write_all(&INDEX_FORMAT_VERSION.to_le_bytes())?;
    writer.write_all(&(index.dimension() as u32).to_le_bytes())?;
    writer.write_all(&(index.len() as u64).to_le_bytes())?;
    writer.write_all(&build_id.to_le_bytes())?;
    for value in index.as_flat() {
        writer.write_all(&value.to_le_bytes())?;
    }
    writer.flush()?;
    Ok(())
}

fn read_index(path: &Path) -> Result<(VectorIndex, u64)> {
    let file = File::open(path).map_err(|e| unreadable(path, e))?;
    let mut bytes = Vec::new();
    BufReader::new(file)
        .read_to_end(&mut bytes)
        .map_err(|e| unreadable(path, e))?;

    let corrupt = |reason: String| {
        ApothecaryError::Retrieval(format!("index {} is corrupt: {}", path.display(), reason))
    };

    if bytes.len() < HEADER_LEN {
        return Err(corrupt(format!("file is only {} bytes", bytes.len())));
    }
    let (header, body) = bytes.split_at(HEADER_LEN);
    if &header[0..4] != INDEX_MAGIC {
        return Err(corrupt("bad magic".to_string()));
    }

    let version = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
    if version != INDEX_FORMAT_VERSION {
        return Err(corrupt(format!("unsupported format version {}", version)));
    }
    let dimension = u32::from_le_bytes([header[8], header[9], header[10], header[11]]) as usize;
    let mut count_bytes = [0u8; 8];
    count_bytes.copy_from_slice(&header[12..20]);
    let count = u64::from_le_bytes(count_bytes) as usize;
    let mut build_bytes = [0u8; 8];
    build_bytes.copy_from_slice(&header[20..28]);
    let build_id = u64::from_le_bytes(build_bytes);

    let expected_len = count
        .checked_mul(dimension)
        .and_then(|values| values.checked_mul(4))
        .ok_or_else(|| corrupt("header overflows".to_string()))?;
    if body.len() != expected_len {
        return Err(corrupt(format!(
            "header declares {} vectors of dimension {} ({} bytes) but body has {} bytes",
            count,
            dimension,
            expected_len,
            body.len()
        )));
    }

    let data: Vec<f32> = body
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    Ok((VectorIndex::from_flat(dimension, data)?, build_id))
}

/// Identifier shared by the two artifacts of one save.
///
/// Only compared for equality, never recomputed from file contents.
fn new_build_id(catalog: &IndexedCatalog) -> u64 {
    let mut hasher = DefaultHasher::new();
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default()
        .hash(&mut hasher);
    std::process::id().hash(&mut hasher);
    for value in catalog.index().as_flat() {
        value.to_bits().hash(&mut hasher);
    }
    for product in catalog.products() {
        product.id.hash(&mut hasher);
    }
    hasher.finish()
}

fn unreadable(path: &Path, err: std::io::Error) -> ApothecaryError {
    ApothecaryError::Retrieval(format!("cannot read {}: {}", path.display(), err))
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(id: i64) -> Product {
        Product {
            id,
            name: format!("Product {}", id),
            description: "desc".to_string(),
            product_type: "capsule".to_string(),
            effects: vec!["sleep".to_string()],
            ingredients: vec!["Melatonin".to_string()],
            price: 4.25,
        }
    }

    fn sample_catalog() -> IndexedCatalog {
        let index = VectorIndex::from_vectors(vec![
            vec![0.1, 0.2, 0.3],
            vec![-1.0, 0.0, 2.5],
            vec![7.0, 8.0, 9.0],
        ])
        .unwrap();
        IndexedCatalog::new(index, vec![product(1), product(2), product(3)]).unwrap()
    }

    fn paths(dir: &tempfile::TempDir) -> (PathBuf, PathBuf) {
        (
            dir.path().join("vector_db").join("index.bin"),
            dir.path().join("vector_db").join("metadata.json"),
        )
    }

    #[test]
    fn test_save_then_load_preserves_alignment() {
        let dir = tempfile::tempdir().unwrap();
        let (index_path, metadata_path) = paths(&dir);
        let original = sample_catalog();

        save(&original, &index_path, &metadata_path).unwrap();
        let loaded = load(&index_path, &metadata_path).unwrap();

        assert_eq!(loaded.len(), loaded.index().len());
        assert_eq!(loaded.index(), original.index());
        assert_eq!(loaded.products(), original.products());
        assert!(!temp_sibling(&index_path).exists());
        assert!(!temp_sibling(&metadata_path).exists());
    }

    #[test]
    fn test_index_file_header_layout() {
        let dir = tempfile::tempdir().unwrap();
        let (index_path, metadata_path) = paths(&dir);
        save(&sample_catalog(), &index_path, &metadata_path).unwrap();

        let bytes = std::fs::read(&index_path).unwrap();
        assert_eq!(&bytes[0..4], b"APXV");
        assert_eq!(u32::from_le_bytes(bytes[4..8].try_into().unwrap()), 2);
        assert_eq!(u32::from_le_bytes(bytes[8..12].try_into().unwrap()), 3);
        assert_eq!(u64::from_le_bytes(bytes[12..20].try_into().unwrap()), 3);
        assert_eq!(bytes.len(), HEADER_LEN + 3 * 3 * 4);

        let metadata: IndexMetadata =
            serde_json::from_str(&std::fs::read_to_string(&metadata_path).unwrap()).unwrap();
        assert_eq!(
            u64::from_le_bytes(bytes[20..28].try_into().unwrap()),
            metadata.build_id
        );
    }

    #[test]
    fn test_index_paired_with_other_builds_metadata_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (index_path, metadata_path) = paths(&dir);
        let vectors = || VectorIndex::from_vectors(vec![vec![0.0, 0.0], vec![9.0, 9.0]]).unwrap();

        // Same vectors and count, products in opposite order.
        let build_a = IndexedCatalog::new(vectors(), vec![product(1), product(2)]).unwrap();
        let build_b = IndexedCatalog::new(vectors(), vec![product(2), product(1)]).unwrap();

        save(&build_a, &index_path, &metadata_path).unwrap();
        let stale_metadata = std::fs::read(&metadata_path).unwrap();
        save(&build_b, &index_path, &metadata_path).unwrap();
        assert_eq!(load(&index_path, &metadata_path).unwrap().products()[0].id, 2);

        std::fs::write(&metadata_path, stale_metadata).unwrap();
        let err = load(&index_path, &metadata_path).unwrap_err();
        assert!(matches!(err, ApothecaryError::Retrieval(_)));
        assert!(err.to_string().contains("belongs to build"));
    }

    #[test]
    fn test_failed_save_removes_temporary_files() {
        let dir = tempfile::tempdir().unwrap();
        let (index_path, metadata_path) = paths(&dir);

        // A non-empty directory at the metadata path makes the final rename fail.
        std::fs::create_dir_all(metadata_path.join("occupied")).unwrap();

        assert!(save(&sample_catalog(), &index_path, &metadata_path).is_err());
        assert!(!temp_sibling(&index_path).exists());
        assert!(!temp_sibling(&metadata_path).exists());
    }

    #[test]
    fn test_truncated_metadata_is_retrieval_error() {
        let dir = tempfile::tempdir().unwrap();
        let (index_path, metadata_path) = paths(&dir);
        save(&sample_catalog(), &index_path, &metadata_path).unwrap();

        // Drop one product while keeping the document well-formed.
        let mut metadata: IndexMetadata =
            serde_json::from_str(&std::fs::read_to_string(&metadata_path).unwrap()).unwrap();
        metadata.products.pop();
        std::fs::write(&metadata_path, serde_json::to_string(&metadata).unwrap()).unwrap();

        let err = load(&index_path, &metadata_path).unwrap_err();
        assert!(matches!(err, ApothecaryError::Retrieval(_)));
        assert!(err.to_string().contains("3 vectors but metadata holds 2"));
    }

    #[test]
    fn test_cut_off_metadata_file_is_retrieval_error() {
        let dir = tempfile::tempdir().unwrap();
        let (index_path, metadata_path) = paths(&dir);
        save(&sample_catalog(), &index_path, &metadata_path).unwrap();

        let content = std::fs::read_to_string(&metadata_path).unwrap();
        std::fs::write(&metadata_path, &content[..content.len() / 2]).unwrap();

        let err = load(&index_path, &metadata_path).unwrap_err();
        assert!(matches!(err, ApothecaryError::Retrieval(_)));
    }

    #[test]
    fn test_truncated_index_file_is_retrieval_error() {
        let dir = tempfile::tempdir().unwrap();
        let (index_path, metadata_path) = paths(&dir);
        save(&sample_catalog(), &index_path, &metadata_path).unwrap();

        let bytes = std::fs::read(&index_path).unwrap();
        std::fs::write(&index_path, &bytes[..bytes.len() - 4]).unwrap();

        let err = load(&index_path, &metadata_path).unwrap_err();
        assert!(matches!(err, ApothecaryError::Retrieval(_)));
        assert!(err.to_string().contains("corrupt"));
    }

    #[test]
    fn test_bad_magic_is_retrieval_error() {
        let dir = tempfile::tempdir().unwrap();
        let (index_path, metadata_path) = paths(&dir);
        save(&sample_catalog(), &index_path, &metadata_path).unwrap();

        let mut bytes = std::fs::read(&index_path).unwrap();
        bytes[0] = b'X';
        std::fs::write(&index_path, &bytes).unwrap();

        assert!(matches!(
            load(&index_path, &metadata_path),
            Err(ApothecaryError::Retrieval(_))
        ));
    }

    #[test]
    fn test_schema_version_drift_is_detected() {
        let dir = tempfile::tempdir().unwrap();
        let (index_path, metadata_path) = paths(&dir);
        save(&sample_catalog(), &index_path, &metadata_path).unwrap();

        let mut metadata: IndexMetadata =
            serde_json::from_str(&std::fs::read_to_string(&metadata_path).unwrap()).unwrap();
        metadata.schema_version = 99;
        std::fs::write(&metadata_path, serde_json::to_string(&metadata).unwrap()).unwrap();

        let err = load(&index_path, &metadata_path).unwrap_err();
        assert!(err.to_string().contains("schema version 99"));
    }

    #[test]
    fn test_missing_files_are_retrieval_errors() {
        let dir = tempfile::tempdir().unwrap();
        let (index_path, metadata_path) = paths(&dir);
        assert!(matches!(
            load(&index_path, &metadata_path),
            Err(ApothecaryError::Retrieval(_))
        ));

        save(&sample_catalog(), &index_path, &metadata_path).unwrap();
        std::fs::remove_file(&metadata_path).unwrap();
        assert!(matches!(
            load(&index_path, &metadata_path),
            Err(ApothecaryError::Retrieval(_))
        ));
    }
}
