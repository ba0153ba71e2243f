use crate::error::CodecError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

pub type DocId = String;

/// Input record. Only `id` survives indexing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: DocId,
    pub text: String,
    #[serde(default)]
    pub head: Option<String>,
}

impl Document {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self { id: id.into(), text: text.into(), head: None }
    }

    pub fn with_head(mut self, head: impl Into<String>) -> Self {
        self.head = Some(head.into());
        self
    }
}

/// A normalized term and its 1-indexed position within one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub term: String,
    pub position: u32,
}

impl Token {
    pub fn new(term: impl Into<String>, position: u32) -> Self {
        Self { term: term.into(), position }
    }
}

/// Occurrences of one term within one document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TfEntry {
    pub term_freq: u32,
    pub positions: Vec<u32>,
}

impl TfEntry {
    pub fn new(positions: Vec<u32>) -> Self {
        Self { term_freq: positions.len() as u32, positions }
    }
}

/// All statistics for one term. `total_term_freq` always equals the sum of the
/// per-document `term_freq` values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermVector {
    pub total_term_freq: u64,
    pub postings: BTreeMap<DocId, TfEntry>,
}

impl TermVector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, doc_id: &str, position: u32) {
        self.total_term_freq += 1;
        match self.postings.get_mut(doc_id) {
            Some(entry) => {
                entry.term_freq += 1;
                entry.positions.push(position);
            }
            None => {
                self.postings.insert(doc_id.to_string(), TfEntry::new(vec![position]));
            }
        }
    }

    pub fn document_frequency(&self) -> usize {
        self.postings.len()
    }

    pub fn term_freq(&self, doc_id: &str) -> u32 {
        self.postings.get(doc_id).map(|e| e.term_freq).unwrap_or(0)
    }
}

/// Term → term vector for a whole generation, in term order.
pub type TermTable = BTreeMap<String, TermVector>;

/// Byte range of one encoded term vector inside a postings file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub offset: u64,
    pub length: u64,
}

impl CatalogEntry {
    pub fn end(&self) -> u64 {
        self.offset.saturating_add(self.length)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    pub total_docs: u64,
    pub entries: HashMap<String, CatalogEntry>,
}

impl Catalog {
    pub fn new(total_docs: u64) -> Self {
        Self { total_docs, entries: HashMap::new() }
    }

    pub fn get(&self, term: &str) -> Option<&CatalogEntry> {
        self.entries.get(term)
    }

    pub fn contains(&self, term: &str) -> bool {
        self.entries.contains_key(term)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Checks that every entry lies inside a postings file of `file_len` bytes
    /// and that no two entries overlap.
    pub fn validate(&self, file_len: u64) -> Result<(), CodecError> {
        let bad = |term: &str, e: &CatalogEntry, reason| CodecError::BadCatalogEntry {
            term: term.to_string(),
            offset: e.offset,
            length: e.length,
            reason,
        };
        let mut ranges: Vec<(&str, &CatalogEntry)> = Vec::with_capacity(self.entries.len());
        for (term, entry) in &self.entries {
            match entry.offset.checked_add(entry.length) {
                None => return Err(bad(term, entry, "overflows")),
                Some(end) if end > file_len => return Err(bad(term, entry, "runs past the end of the postings file")),
                Some(_) => ranges.push((term.as_str(), entry)),
            }
        }
        ranges.sort_unstable_by_key(|(_, e)| (e.offset, e.length));
        for pair in ranges.windows(2) {
            let ((_, prev), (term, next)) = (pair[0], pair[1]);
            if next.offset < prev.end() {
                return Err(bad(term, next, "overlaps another entry"));
            }
        }
        Ok(())
    }

    /// Terms in lexicographic order, so writers and scans are deterministic.
    pub fn sorted_terms(&self) -> Vec<&str> {
        let mut terms: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        terms.sort_unstable();
        terms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog(entries: &[(&str, u64, u64)]) -> Catalog {
        let mut c = Catalog::new(1);
        for (term, offset, length) in entries {
            c.entries.insert(term.to_string(), CatalogEntry { offset: *offset, length: *length });
        }
        c
    }

    #[test]
    fn validate_accepts_adjacent_entries() {
        assert!(catalog(&[("a", 0, 4), ("b", 4, 6), ("c", 10, 0)]).validate(10).is_ok());
        assert!(Catalog::new(0).validate(0).is_ok());
    }

    #[test]
    fn validate_rejects_out_of_range_and_overlapping_entries() {
        let err = catalog(&[("a", 0, 4), ("b", 4, 7)]).validate(10).unwrap_err();
        assert!(matches!(err, CodecError::BadCatalogEntry { ref term, .. } if term == "b"));
        let err = catalog(&[("a", 8, u64::MAX)]).validate(10).unwrap_err();
        assert!(matches!(err, CodecError::BadCatalogEntry { reason: "overflows", .. }));
        let err = catalog(&[("a", 0, 6), ("b", 5, 2)]).validate(10).unwrap_err();
        assert!(matches!(err, CodecError::BadCatalogEntry { reason: "overlaps another entry", .. }));
    }

    #[test]
    fn record_keeps_totals_consistent() {
        let mut tv = TermVector::new();
        tv.record("d1", 2);
        tv.record("d1", 7);
        tv.record("d2", 1);
        assert_eq!(tv.total_term_freq, 3);
        assert_eq!(tv.postings["d1"], TfEntry::new(vec![2, 7]));
        assert_eq!(tv.term_freq("d2"), 1);
        assert_eq!(tv.term_freq("d3"), 0);
        assert_eq!(tv.document_frequency(), 2);
    }
}
