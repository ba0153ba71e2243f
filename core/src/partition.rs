use crate::analyzer::Analyzer;
use crate::codec::Codec;
use crate::error::{BuildError, Result};
use crate::index::{Document, TermTable, Token};
use crate::persist::{now_rfc3339, write_generation, IndexPaths, Metadata, FORMAT_VERSION};

/// Indexes one batch of documents into a self-contained generation.
pub struct PartitionIndexer<'a> {
    pub paths: &'a IndexPaths,
    pub codec: &'a Codec,
    pub analyzer: &'a dyn Analyzer,
    pub index_secondary_field: bool,
    pub apply_stemming: bool,
}

impl<'a> PartitionIndexer<'a> {
    pub fn index(&self, partition: usize, documents: &[Document]) -> Result<Metadata> {
        let table = self.accumulate(documents)?;
        let terms = table.len();
        let total_docs = documents.len() as u64;
        // the table is consumed term by term so each vector is freed once written
        let (postings, catalog) = write_generation(self.paths, self.codec, total_docs, |w| {
            table.into_iter().try_for_each(|(term, tv)| w.push(term, &tv))
        })?;
        tracing::info!(partition, docs = documents.len(), terms, path = %postings.display(), "partition written");
        Ok(Metadata {
            postings_file_path: postings,
            catalog_file_path: catalog,
            serializer: self.codec.serializer_name().to_string(),
            compressor: self.codec.compressor_name().to_string(),
            compression_chunk_size: self.codec.chunk_size(),
            analyzer: self.analyzer.name(),
            apply_stemming: self.apply_stemming,
            index_secondary_field: self.index_secondary_field,
            total_docs,
            timestamp: now_rfc3339(),
            format_version: FORMAT_VERSION,
        })
    }

    /// Builds the in-memory term table. The first analyzer failure aborts.
    pub fn accumulate(&self, documents: &[Document]) -> std::result::Result<TermTable, BuildError> {
        let mut table = TermTable::new();
        for doc in documents {
            for token in self.tokens_for(doc)? {
                table.entry(token.term).or_default().record(&doc.id, token.position);
            }
        }
        Ok(table)
    }

    fn tokens_for(&self, doc: &Document) -> std::result::Result<Vec<Token>, BuildError> {
        let analyze = |text: &str| {
            self.analyzer
                .analyze(text, self.apply_stemming)
                .map_err(|e| BuildError::Analyze { doc_id: doc.id.clone(), reason: e.to_string() })
        };
        let mut tokens = analyze(&doc.text)?;
        if self.index_secondary_field {
            if let Some(head) = doc.head.as_deref() {
                // keep positions increasing across fields
                let shift = tokens.last().map(|t| t.position).unwrap_or(0);
                tokens.extend(analyze(head)?.into_iter().map(|mut t| {
                    t.position += shift;
                    t
                }));
            }
        }
        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnalyzeError;
    use crate::index::TfEntry;
    use crate::persist::{load_catalog, read_generation};
    use tempfile::tempdir;

    struct Whitespace;

    impl Analyzer for Whitespace {
        fn name(&self) -> String {
            "whitespace".into()
        }

        fn analyze(&self, text: &str, _: bool) -> std::result::Result<Vec<Token>, AnalyzeError> {
            if text.contains('\u{0}') {
                return Err(AnalyzeError("nul byte".into()));
            }
            Ok(text.split_whitespace().zip(1..).map(|(w, p)| Token::new(w, p)).collect())
        }
    }

    fn indexer<'a>(paths: &'a IndexPaths, codec: &'a Codec, secondary: bool) -> PartitionIndexer<'a> {
        PartitionIndexer { paths, codec, analyzer: &Whitespace, index_secondary_field: secondary, apply_stemming: false }
    }

    #[test]
    fn secondary_field_positions_continue_after_primary() {
        let paths = IndexPaths::new("/unused");
        let codec = Codec::default();
        let docs = vec![Document::new("d1", "cat dog").with_head("dog bird")];

        let table = indexer(&paths, &codec, true).accumulate(&docs).unwrap();
        assert_eq!(table["dog"].postings["d1"], TfEntry::new(vec![2, 3]));
        assert_eq!(table["bird"].postings["d1"], TfEntry::new(vec![4]));
        assert_eq!(table["dog"].total_term_freq, 2);

        let table = indexer(&paths, &codec, false).accumulate(&docs).unwrap();
        assert!(!table.contains_key("bird"));
    }

    #[test]
    fn analyzer_failure_names_the_document() {
        let paths = IndexPaths::new("/unused");
        let codec = Codec::default();
        let docs = vec![Document::new("ok", "fine"), Document::new("bad", "x\u{0}y")];
        let err = indexer(&paths, &codec, false).accumulate(&docs).unwrap_err();
        assert!(matches!(err, BuildError::Analyze { ref doc_id, .. } if doc_id == "bad"));
    }

    #[test]
    fn written_partition_is_readable_on_its_own() {
        let dir = tempdir().unwrap();
        let paths = IndexPaths::new(dir.path());
        paths.create_dirs().unwrap();
        let codec = Codec::from_names("bincode", "gzip", 16).unwrap();
        let docs = vec![Document::new("d1", "cat dog cat"), Document::new("d2", "dog")];

        let meta = indexer(&paths, &codec, false).index(0, &docs).unwrap();
        assert_eq!(meta.total_docs, 2);
        assert_eq!(meta.compressor, "gzip");

        let catalog = load_catalog(&meta.catalog_file_path, &codec).unwrap();
        assert_eq!(catalog.total_docs, 2);
        let mut ranges: Vec<_> = catalog.entries.values().copied().collect();
        ranges.sort_by_key(|e| e.offset);
        assert_eq!(ranges[0].offset, 0);
        assert!(ranges.windows(2).all(|w| w[0].end() == w[1].offset));

        let table = read_generation(&meta).unwrap();
        assert_eq!(table["cat"].postings["d1"], TfEntry::new(vec![1, 3]));
        assert_eq!(table["dog"].total_term_freq, 2);
    }
}
