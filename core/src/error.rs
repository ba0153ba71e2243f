use thiserror::Error;

/// Failure turning records into bytes or back. Never masked by callers.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("unknown serializer: {0}")]
    UnknownSerializer(String),

    #[error("unknown compressor: {0}")]
    UnknownCompressor(String),

    #[error("json codec error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("bincode codec error: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("{compressor} stream error: {source}")]
    Compression {
        compressor: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("catalog entry for {term:?} at offset {offset} (+{length}) {reason}")]
    BadCatalogEntry { term: String, offset: u64, length: u64, reason: &'static str },

    #[error("short read: expected {expected} bytes at offset {offset}, got {actual}")]
    ShortRead { offset: u64, expected: u64, actual: u64 },
}

/// Failure that aborts a whole build. No partial generation is finalized.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("document {doc_id} could not be analyzed: {reason}")]
    Analyze { doc_id: String, reason: String },

    #[error("document id {0} appears more than once in the input")]
    DuplicateDocument(String),

    #[error("document {doc_id} appears in both merge inputs for term {term}")]
    OverlappingPartitions { term: String, doc_id: String },

    #[error("merge finished with {0} generations, expected exactly one")]
    NotConverged(usize),

    #[error("worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

/// Returned by analyzers when a text cannot be normalized.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct AnalyzeError(pub String);

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("build error: {0}")]
    Build(#[from] BuildError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed metadata: {0}")]
    Metadata(serde_json::Error),

    #[error("malformed config: {0}")]
    Config(serde_json::Error),
}

pub type Result<T> = std::result::Result<T, IndexError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_errors_convert_into_index_error() {
        let err: IndexError = BuildError::NotConverged(2).into();
        assert_eq!(err.to_string(), "build error: merge finished with 2 generations, expected exactly one");
    }

    #[test]
    fn short_read_message_names_offset() {
        let err = CodecError::ShortRead { offset: 10, expected: 8, actual: 3 };
        assert_eq!(err.to_string(), "short read: expected 8 bytes at offset 10, got 3");
    }
}
