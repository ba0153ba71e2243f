//! Tournament-style reducer: generations are merged pairwise, one level at a
//! time, until a single generation remains.

use crate::config::DuplicatePolicy;
use crate::error::{BuildError, IndexError, Result};
use crate::index::TermVector;
use crate::persist::{
    discard_generations, load_catalog, now_rfc3339, read_entry, remove_generation, write_generation, IndexPaths, Metadata,
};
use rayon::prelude::*;
use std::collections::btree_map::Entry;
use std::fs::File;

pub struct MergeReducer<'a> {
    pub paths: &'a IndexPaths,
    pub workers: usize,
    pub on_duplicate: DuplicatePolicy,
}

impl<'a> MergeReducer<'a> {
    /// Folds `handles` into exactly one generation. Pairs within a level run on
    /// a worker pool; a level starts only after the previous one has finished
    /// and deleted its inputs.
    pub fn reduce(&self, handles: Vec<Metadata>) -> Result<Metadata> {
        self.reduce_on(handles, |workers| rayon::ThreadPoolBuilder::new().num_threads(workers).build())
    }

    fn reduce_on<F>(&self, handles: Vec<Metadata>, build_pool: F) -> Result<Metadata>
    where
        F: FnOnce(usize) -> std::result::Result<rayon::ThreadPool, rayon::ThreadPoolBuildError>,
    {
        let pool = match build_pool(self.workers.max(1)) {
            Ok(pool) => pool,
            Err(err) => {
                discard_generations(&handles);
                return Err(BuildError::from(err).into());
            }
        };

        let mut current = handles;
        let mut level = 0usize;
        while current.len() > 1 {
            let inputs = current.len();
            let groups: Vec<Vec<Metadata>> = current.chunks(2).map(<[Metadata]>::to_vec).collect();
            let outcomes: Vec<(Vec<Metadata>, Result<Metadata>)> = pool.install(|| {
                groups
                    .into_par_iter()
                    .map(|group| {
                        let merged = match group.as_slice() {
                            [a, b] => self.merge_pair(a, b),
                            [single] => Ok(single.clone()),
                            _ => unreachable!("chunks(2) yields one or two handles"),
                        };
                        (group, merged)
                    })
                    .collect()
            });
            current = collect_level(outcomes)?;
            tracing::info!(level, inputs, outputs = current.len(), "merge level complete");
            level += 1;
        }

        match current.len() {
            1 => Ok(current.remove(0)),
            n => Err(BuildError::NotConverged(n).into()),
        }
    }

    /// Merges two generations into a new one, then deletes both inputs.
    pub fn merge_pair(&self, a: &Metadata, b: &Metadata) -> Result<Metadata> {
        let codec_a = a.codec()?;
        let codec_b = b.codec()?;
        let catalog_a = load_catalog(&a.catalog_file_path, &codec_a)?;
        let catalog_b = load_catalog(&b.catalog_file_path, &codec_b)?;
        let mut postings_a = File::open(&a.postings_file_path)?;
        let mut postings_b = File::open(&b.postings_file_path)?;
        catalog_a.validate(postings_a.metadata()?.len())?;
        catalog_b.validate(postings_b.metadata()?.len())?;
        let total_docs = catalog_a.total_docs + catalog_b.total_docs;

        let (postings, catalog) = write_generation(self.paths, &codec_a, total_docs, |w| {
            for term in catalog_a.sorted_terms() {
                let tv = codec_a.decode_term_vector(&read_entry(&mut postings_a, &catalog_a.entries[term])?)?;
                let tv = match catalog_b.get(term) {
                    Some(entry) => {
                        let other = codec_b.decode_term_vector(&read_entry(&mut postings_b, entry)?)?;
                        merge_term_vectors(term, tv, other, self.on_duplicate)?
                    }
                    None => tv,
                };
                w.push(term.to_string(), &tv)?;
            }
            for term in catalog_b.sorted_terms() {
                if catalog_a.contains(term) { continue; }
                let tv = codec_b.decode_term_vector(&read_entry(&mut postings_b, &catalog_b.entries[term])?)?;
                w.push(term.to_string(), &tv)?;
            }
            tracing::debug!(terms = w.terms(), "merged pair written");
            Ok(())
        })?;

        let merged = Metadata {
            postings_file_path: postings,
            catalog_file_path: catalog,
            total_docs,
            timestamp: now_rfc3339(),
            ..a.clone()
        };
        if let Err(err) = remove_generation(a).and_then(|_| remove_generation(b)) {
            discard_generations(std::slice::from_ref(&merged));
            return Err(err.into());
        }
        Ok(merged)
    }
}

/// Keeps a level's outputs if every group succeeded. Otherwise removes every
/// generation the level left behind and returns the first error.
fn collect_level(outcomes: Vec<(Vec<Metadata>, Result<Metadata>)>) -> Result<Vec<Metadata>> {
    if outcomes.iter().all(|(_, r)| r.is_ok()) {
        return outcomes.into_iter().map(|(_, r)| r).collect();
    }
    let mut leftovers = Vec::new();
    let mut first_err: Option<IndexError> = None;
    for (inputs, outcome) in outcomes {
        match outcome {
            Ok(meta) => leftovers.push(meta),
            Err(err) => {
                tracing::warn!(%err, "merge failed");
                leftovers.extend(inputs);
                first_err.get_or_insert(err);
            }
        }
    }
    discard_generations(&leftovers);
    Err(first_err.unwrap_or(BuildError::NotConverged(0).into()))
}

/// Combines two vectors for the same term. Postings from disjoint partitions
/// never share a document; `policy` decides what happens when they do.
pub fn merge_term_vectors(term: &str, a: TermVector, b: TermVector, policy: DuplicatePolicy) -> std::result::Result<TermVector, BuildError> {
    let mut merged = a;
    merged.total_term_freq += b.total_term_freq;
    for (doc_id, entry) in b.postings {
        match merged.postings.entry(doc_id) {
            Entry::Vacant(slot) => {
                slot.insert(entry);
            }
            Entry::Occupied(mut slot) => match policy {
                DuplicatePolicy::Reject => {
                    return Err(BuildError::OverlappingPartitions { term: term.to_string(), doc_id: slot.key().clone() });
                }
                DuplicatePolicy::Combine => {
                    let existing = slot.get_mut();
                    existing.term_freq += entry.term_freq;
                    existing.positions.extend(entry.positions);
                }
            },
        }
    }
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::StandardAnalyzer;
    use crate::codec::Codec;
    use crate::index::{Document, TfEntry};
    use crate::partition::PartitionIndexer;
    use std::io;

    fn tv(postings: &[(&str, &[u32])]) -> TermVector {
        let mut tv = TermVector::new();
        for (doc, positions) in postings {
            for p in *positions {
                tv.record(doc, *p);
            }
        }
        tv
    }

    #[test]
    fn disjoint_postings_union() {
        let merged = merge_term_vectors("dog", tv(&[("d1", &[2])]), tv(&[("d2", &[1, 4])]), DuplicatePolicy::Reject).unwrap();
        assert_eq!(merged.total_term_freq, 3);
        assert_eq!(merged.postings["d1"], TfEntry::new(vec![2]));
        assert_eq!(merged.postings["d2"], TfEntry::new(vec![1, 4]));
    }

    #[test]
    fn overlapping_document_is_rejected_by_default() {
        let err = merge_term_vectors("dog", tv(&[("d1", &[2])]), tv(&[("d1", &[5])]), DuplicatePolicy::default()).unwrap_err();
        assert!(matches!(err, BuildError::OverlappingPartitions { ref doc_id, .. } if doc_id == "d1"));
    }

    #[test]
    fn overlapping_document_can_be_combined() {
        let merged = merge_term_vectors("dog", tv(&[("d1", &[2])]), tv(&[("d1", &[5, 6])]), DuplicatePolicy::Combine).unwrap();
        assert_eq!(merged.total_term_freq, 3);
        assert_eq!(merged.postings["d1"], TfEntry { term_freq: 3, positions: vec![2, 5, 6] });
    }

    #[test]
    fn failed_pool_discards_its_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let paths = IndexPaths::new(dir.path());
        paths.create_dirs().unwrap();
        let codec = Codec::default();
        let analyzer = StandardAnalyzer::new();
        let indexer = PartitionIndexer { paths: &paths, codec: &codec, analyzer: &analyzer, index_secondary_field: false, apply_stemming: false };
        let handles = vec![
            indexer.index(0, &[Document::new("d1", "cat dog")]).unwrap(),
            indexer.index(1, &[Document::new("d2", "dog")]).unwrap(),
        ];
        assert_eq!(std::fs::read_dir(paths.postings_dir()).unwrap().count(), 2);

        let reducer = MergeReducer { paths: &paths, workers: 2, on_duplicate: DuplicatePolicy::Reject };
        let err = reducer
            .reduce_on(handles, |workers| {
                rayon::ThreadPoolBuilder::new()
                    .num_threads(workers)
                    .spawn_handler(|_| Err(io::Error::new(io::ErrorKind::Other, "no threads")))
                    .build()
            })
            .unwrap_err();
        assert!(matches!(err, IndexError::Build(BuildError::WorkerPool(_))));
        assert_eq!(std::fs::read_dir(paths.postings_dir()).unwrap().count(), 0);
        assert_eq!(std::fs::read_dir(paths.catalog_dir()).unwrap().count(), 0);
    }
}
