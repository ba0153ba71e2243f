use crate::codec::{Codec, DEFAULT_CHUNK_SIZE, IDENTITY, JSON};
use crate::error::{CodecError, IndexError, Result};
use crate::reader::IndexReader;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// What the merge reducer does when one document id shows up in both inputs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Fail the build; partitions must hold disjoint document sets.
    #[default]
    Reject,
    /// Sum term frequencies and concatenate positions.
    Combine,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Directory holding the `postings/`, `catalog/` and `metadata/` subdirectories.
    pub root: PathBuf,
    pub partitions: usize,
    pub merge_workers: usize,
    pub serializer: String,
    pub compressor: String,
    pub compression_chunk_size: usize,
    pub cache_capacity: usize,
    pub index_secondary_field: bool,
    pub apply_stemming: bool,
    pub on_duplicate_document: DuplicatePolicy,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./index"),
            partitions: 8,
            merge_workers: 8,
            serializer: JSON.to_string(),
            compressor: IDENTITY.to_string(),
            compression_chunk_size: DEFAULT_CHUNK_SIZE,
            cache_capacity: 10_000,
            index_secondary_field: false,
            apply_stemming: true,
            on_duplicate_document: DuplicatePolicy::Reject,
        }
    }
}

impl IndexConfig {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf(), ..Self::default() }
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        serde_json::from_str(&raw).map_err(IndexError::Config)
    }

    /// Opens the generation described by `metadata_file` with this config's
    /// cache capacity.
    pub fn open_reader<P: AsRef<Path>>(&self, metadata_file: P) -> Result<IndexReader> {
        IndexReader::open_path(metadata_file, self.cache_capacity())
    }

    pub fn codec(&self) -> std::result::Result<Codec, CodecError> {
        Codec::from_names(&self.serializer, &self.compressor, self.compression_chunk_size)
    }

    pub fn partitions(&self) -> usize {
        self.partitions.max(1)
    }

    pub fn merge_workers(&self) -> usize {
        self.merge_workers.max(1)
    }

    pub fn cache_capacity(&self) -> usize {
        self.cache_capacity.max(1)
    }
}
