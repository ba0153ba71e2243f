use crate::analyzer::Analyzer;
use crate::config::IndexConfig;
use crate::error::{BuildError, IndexError, Result};
use crate::index::Document;
use crate::merge::MergeReducer;
use crate::partition::PartitionIndexer;
use crate::persist::{discard_generations, save_metadata, set_readonly, IndexPaths, Metadata};
use rayon::prelude::*;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Runs the whole pipeline: split, index partitions in parallel, merge down to
/// one generation, persist its metadata and make its files read-only.
///
/// Returns the final metadata and the path of its metadata file. On failure no
/// metadata file is written and intermediate files are removed.
pub fn index_documents(config: &IndexConfig, analyzer: &dyn Analyzer, documents: &[Document]) -> Result<(Metadata, PathBuf)> {
    let start = Instant::now();
    check_unique_ids(documents)?;

    let codec = config.codec()?;
    IndexPaths::new(&config.root).create_dirs()?;
    // metadata records file paths; make them independent of the working directory
    let paths = IndexPaths::new(fs::canonicalize(&config.root)?);

    let batches = split_documents(documents, config.partitions());
    let indexer = PartitionIndexer {
        paths: &paths,
        codec: &codec,
        analyzer,
        index_secondary_field: config.index_secondary_field,
        apply_stemming: config.apply_stemming,
    };
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.partitions())
        .build()
        .map_err(BuildError::from)?;
    let results: Vec<Result<Metadata>> = pool.install(|| {
        batches
            .into_par_iter()
            .enumerate()
            .map(|(partition, batch)| indexer.index(partition, batch))
            .collect()
    });
    let partitions = keep_all_or_discard(results)?;
    tracing::info!(partitions = partitions.len(), docs = documents.len(), "partitions indexed");

    let reducer = MergeReducer { paths: &paths, workers: config.merge_workers(), on_duplicate: config.on_duplicate_document };
    let merged = reducer.reduce(partitions)?;

    let meta_path = paths.metadata_file_for(&merged);
    if let Err(err) = finalize(&merged, &meta_path) {
        discard_generations(std::slice::from_ref(&merged));
        let _ = std::fs::remove_file(&meta_path);
        return Err(err);
    }
    tracing::info!(
        path = %meta_path.display(),
        docs = merged.total_docs,
        took_ms = start.elapsed().as_millis() as u64,
        "index build complete"
    );
    Ok((merged, meta_path))
}

fn finalize(meta: &Metadata, meta_path: &Path) -> Result<()> {
    save_metadata(meta_path, meta)?;
    for path in [meta.postings_file_path.as_path(), meta.catalog_file_path.as_path(), meta_path] {
        set_readonly(path)?;
    }
    Ok(())
}

fn check_unique_ids(documents: &[Document]) -> std::result::Result<(), BuildError> {
    let mut seen = HashSet::with_capacity(documents.len());
    for doc in documents {
        if !seen.insert(doc.id.as_str()) {
            return Err(BuildError::DuplicateDocument(doc.id.clone()));
        }
    }
    Ok(())
}

/// Contiguous batches of near-equal size. An empty input still yields one
/// (empty) batch so the build produces a generation.
pub fn split_documents(documents: &[Document], partitions: usize) -> Vec<&[Document]> {
    if documents.is_empty() {
        return vec![documents];
    }
    let size = documents.len().div_ceil(partitions.max(1));
    documents.chunks(size).collect()
}

fn keep_all_or_discard(results: Vec<Result<Metadata>>) -> Result<Vec<Metadata>> {
    let mut ok = Vec::with_capacity(results.len());
    let mut first_err: Option<IndexError> = None;
    for result in results {
        match result {
            Ok(meta) => ok.push(meta),
            Err(err) => {
                tracing::warn!(%err, "partition failed");
                first_err.get_or_insert(err);
            }
        }
    }
    match first_err {
        None => Ok(ok),
        Some(err) => {
            discard_generations(&ok);
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn docs(n: usize) -> Vec<Document> {
        (0..n).map(|i| Document::new(format!("d{i}"), "x")).collect()
    }

    #[test]
    fn split_balances_batches() {
        let d = docs(10);
        let sizes: Vec<usize> = split_documents(&d, 4).iter().map(|b| b.len()).collect();
        assert_eq!(sizes, vec![3, 3, 3, 1]);
        assert_eq!(split_documents(&d, 20).len(), 10);
        assert_eq!(split_documents(&[], 8).len(), 1);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut d = docs(3);
        d.push(Document::new("d1", "again"));
        assert!(matches!(check_unique_ids(&d), Err(BuildError::DuplicateDocument(id)) if id == "d1"));
    }
}
