//! Write-once inverted index: parallel partition indexing, pairwise merging into a
//! single immutable generation, and a cached read layer for ranking code.

pub mod analyzer;
pub mod build;
pub mod cache;
pub mod codec;
pub mod config;
pub mod error;
pub mod index;
pub mod merge;
pub mod partition;
pub mod persist;
pub mod reader;

pub use analyzer::{Analyzer, StandardAnalyzer};
pub use build::index_documents;
pub use codec::Codec;
pub use config::{DuplicatePolicy, IndexConfig};
pub use error::{AnalyzeError, BuildError, CodecError, IndexError, Result};
pub use index::{Catalog, CatalogEntry, DocId, Document, TermTable, TermVector, TfEntry, Token};
pub use persist::{IndexPaths, Metadata};
pub use reader::IndexReader;
