use crate::cache::LruCache;
use crate::codec::Codec;
use crate::error::Result;
use crate::index::{Catalog, CatalogEntry, DocId, TermVector};
use crate::persist::{load_catalog, load_metadata, read_entry, Metadata};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub len: usize,
    pub capacity: usize,
}

/// Read-only view of one final generation.
///
/// Everything except the term-vector cache is immutable after [`IndexReader::open`],
/// so a single reader can be shared across threads behind an `Arc`.
pub struct IndexReader {
    metadata: Metadata,
    codec: Codec,
    catalog: Catalog,
    postings: Mutex<File>,
    document_length: HashMap<DocId, u64>,
    cache: Mutex<LruCache<String, Arc<TermVector>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl IndexReader {
    /// Loads the catalog, opens the postings file and computes every document's
    /// length with one pass over the vocabulary.
    pub fn open(metadata: Metadata, cache_capacity: usize) -> Result<Self> {
        let start = Instant::now();
        let codec = metadata.codec()?;
        let catalog = load_catalog(&metadata.catalog_file_path, &codec)?;
        let postings = File::open(&metadata.postings_file_path)?;
        catalog.validate(postings.metadata()?.len())?;
        let mut reader = Self {
            metadata,
            codec,
            catalog,
            postings: Mutex::new(postings),
            document_length: HashMap::new(),
            cache: Mutex::new(LruCache::new(cache_capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        };
        reader.document_length = reader.compute_document_length()?;
        tracing::info!(
            vocabulary = reader.catalog.len(),
            docs = reader.catalog.total_docs,
            took_ms = start.elapsed().as_millis() as u64,
            path = %reader.metadata.postings_file_path.display(),
            "index opened"
        );
        Ok(reader)
    }

    pub fn open_path<P: AsRef<Path>>(metadata_file: P, cache_capacity: usize) -> Result<Self> {
        Self::open(load_metadata(metadata_file.as_ref())?, cache_capacity)
    }

    // Bypasses the cache so the scan does not evict hot terms.
    fn compute_document_length(&self) -> Result<HashMap<DocId, u64>> {
        let mut lengths: HashMap<DocId, u64> = HashMap::new();
        for entry in self.catalog.entries.values() {
            let tv = self.read_term_vector(entry)?;
            for (doc_id, tf) in tv.postings {
                *lengths.entry(doc_id).or_insert(0) += tf.term_freq as u64;
            }
        }
        Ok(lengths)
    }

    fn read_term_vector(&self, entry: &CatalogEntry) -> Result<TermVector> {
        let bytes = {
            let mut f = self.postings.lock();
            read_entry(&mut *f, entry)?
        };
        Ok(self.codec.decode_term_vector(&bytes)?)
    }

    /// `Ok(None)` means the term is not in the vocabulary; treat it as zero
    /// frequency. Decode failures are errors.
    pub fn get_term_vector(&self, term: &str) -> Result<Option<Arc<TermVector>>> {
        let Some(entry) = self.catalog.get(term) else { return Ok(None) };
        if let Some(tv) = self.cache.lock().get(term) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Some(tv));
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        let tv = Arc::new(self.read_term_vector(entry)?);
        self.cache.lock().insert(term.to_string(), Arc::clone(&tv));
        Ok(Some(tv))
    }

    pub fn get_document_length(&self, doc_id: &str) -> Option<u64> {
        self.document_length.get(doc_id).copied()
    }

    /// Mean tokens per document. An index with no documents reports `0.0`.
    pub fn get_average_document_length(&self) -> f64 {
        let total_docs = self.get_total_documents();
        if total_docs == 0 {
            return 0.0;
        }
        let tokens: u64 = self.document_length.values().sum();
        tokens as f64 / total_docs as f64
    }

    pub fn get_vocabulary_size(&self) -> usize {
        self.catalog.len()
    }

    pub fn get_total_documents(&self) -> u64 {
        self.catalog.total_docs
    }

    /// Documents with at least one indexed token.
    pub fn get_all_document_ids(&self) -> HashSet<&str> {
        self.document_length.keys().map(String::as_str).collect()
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn terms(&self) -> impl Iterator<Item = &str> + '_ {
        self.catalog.entries.keys().map(String::as_str)
    }

    pub fn cache_stats(&self) -> CacheStats {
        let cache = self.cache.lock();
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            len: cache.len(),
            capacity: cache.capacity(),
        }
    }
}
