//! Serialize + compress boundary for every record written to disk.
//!
//! A [`Codec`] is two independently pluggable stages. Both stages are named, and
//! the names are stored in each generation's metadata so a reader can rebuild
//! the exact decode path.

use crate::error::CodecError;
use crate::index::{Catalog, TermVector};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::io::{Read, Write};
use std::sync::Arc;

pub const JSON: &str = "json";
pub const BINCODE: &str = "bincode";
pub const IDENTITY: &str = "identity";
pub const GZIP: &str = "gzip";
pub const ZSTD: &str = "zstd";

pub const DEFAULT_CHUNK_SIZE: usize = 8192;

/// Structural mapping between records and bytes. Must round-trip exactly.
pub trait Serializer: Send + Sync {
    fn name(&self) -> &'static str;
    fn serialize_term_vector(&self, value: &TermVector) -> Result<Vec<u8>, CodecError>;
    fn deserialize_term_vector(&self, bytes: &[u8]) -> Result<TermVector, CodecError>;
    fn serialize_catalog(&self, value: &Catalog) -> Result<Vec<u8>, CodecError>;
    fn deserialize_catalog(&self, bytes: &[u8]) -> Result<Catalog, CodecError>;
}

/// Byte-stream transform. Must round-trip exactly.
pub trait Compressor: Send + Sync {
    fn name(&self) -> &'static str;
    fn compress(&self, bytes: &[u8]) -> Result<Vec<u8>, CodecError>;
    fn decompress(&self, bytes: &[u8]) -> Result<Vec<u8>, CodecError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl JsonSerializer {
    fn to_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
        Ok(serde_json::to_vec(value)?)
    }

    fn from_bytes<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

impl Serializer for JsonSerializer {
    fn name(&self) -> &'static str {
        JSON
    }

    fn serialize_term_vector(&self, value: &TermVector) -> Result<Vec<u8>, CodecError> {
        Self::to_bytes(value)
    }

    fn deserialize_term_vector(&self, bytes: &[u8]) -> Result<TermVector, CodecError> {
        Self::from_bytes(bytes)
    }

    fn serialize_catalog(&self, value: &Catalog) -> Result<Vec<u8>, CodecError> {
        Self::to_bytes(value)
    }

    fn deserialize_catalog(&self, bytes: &[u8]) -> Result<Catalog, CodecError> {
        Self::from_bytes(bytes)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeSerializer;

impl BincodeSerializer {
    fn to_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
        Ok(bincode::serialize(value)?)
    }

    fn from_bytes<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
        Ok(bincode::deserialize(bytes)?)
    }
}

impl Serializer for BincodeSerializer {
    fn name(&self) -> &'static str {
        BINCODE
    }

    fn serialize_term_vector(&self, value: &TermVector) -> Result<Vec<u8>, CodecError> {
        Self::to_bytes(value)
    }

    fn deserialize_term_vector(&self, bytes: &[u8]) -> Result<TermVector, CodecError> {
        Self::from_bytes(bytes)
    }

    fn serialize_catalog(&self, value: &Catalog) -> Result<Vec<u8>, CodecError> {
        Self::to_bytes(value)
    }

    fn deserialize_catalog(&self, bytes: &[u8]) -> Result<Catalog, CodecError> {
        Self::from_bytes(bytes)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityCompressor;

impl Compressor for IdentityCompressor {
    fn name(&self) -> &'static str {
        IDENTITY
    }

    fn compress(&self, bytes: &[u8]) -> Result<Vec<u8>, CodecError> {
        Ok(bytes.to_vec())
    }

    fn decompress(&self, bytes: &[u8]) -> Result<Vec<u8>, CodecError> {
        Ok(bytes.to_vec())
    }
}

/// Gzip through fixed-size chunks in both directions.
#[derive(Debug, Clone, Copy)]
pub struct GzipCompressor {
    chunk_size: usize,
}

impl GzipCompressor {
    pub fn new(chunk_size: usize) -> Self {
        Self { chunk_size: chunk_size.max(1) }
    }

    fn err(source: std::io::Error) -> CodecError {
        CodecError::Compression { compressor: GZIP, source }
    }
}

impl Compressor for GzipCompressor {
    fn name(&self) -> &'static str {
        GZIP
    }

    fn compress(&self, bytes: &[u8]) -> Result<Vec<u8>, CodecError> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        for chunk in bytes.chunks(self.chunk_size) {
            encoder.write_all(chunk).map_err(Self::err)?;
        }
        encoder.finish().map_err(Self::err)
    }

    fn decompress(&self, bytes: &[u8]) -> Result<Vec<u8>, CodecError> {
        read_chunked(GzDecoder::new(bytes), self.chunk_size).map_err(Self::err)
    }
}

/// Zstandard through the same chunking as [`GzipCompressor`].
#[derive(Debug, Clone, Copy)]
pub struct ZstdCompressor {
    chunk_size: usize,
    level: i32,
}

impl ZstdCompressor {
    pub fn new(chunk_size: usize) -> Self {
        Self { chunk_size: chunk_size.max(1), level: 3 }
    }

    fn err(source: std::io::Error) -> CodecError {
        CodecError::Compression { compressor: ZSTD, source }
    }
}

impl Compressor for ZstdCompressor {
    fn name(&self) -> &'static str {
        ZSTD
    }

    fn compress(&self, bytes: &[u8]) -> Result<Vec<u8>, CodecError> {
        let mut encoder = zstd::stream::write::Encoder::new(Vec::new(), self.level).map_err(Self::err)?;
        for chunk in bytes.chunks(self.chunk_size) {
            encoder.write_all(chunk).map_err(Self::err)?;
        }
        encoder.finish().map_err(Self::err)
    }

    fn decompress(&self, bytes: &[u8]) -> Result<Vec<u8>, CodecError> {
        let decoder = zstd::stream::read::Decoder::new(bytes).map_err(Self::err)?;
        read_chunked(decoder, self.chunk_size).map_err(Self::err)
    }
}

fn read_chunked<R: Read>(mut reader: R, chunk_size: usize) -> std::io::Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut buf = vec![0u8; chunk_size];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 { break; }
        out.extend_from_slice(&buf[..n]);
    }
    Ok(out)
}

pub fn serializer_by_name(name: &str) -> Result<Arc<dyn Serializer>, CodecError> {
    match name.to_ascii_lowercase().as_str() {
        JSON => Ok(Arc::new(JsonSerializer)),
        BINCODE => Ok(Arc::new(BincodeSerializer)),
        _ => Err(CodecError::UnknownSerializer(name.to_string())),
    }
}

pub fn compressor_by_name(name: &str, chunk_size: usize) -> Result<Arc<dyn Compressor>, CodecError> {
    match name.to_ascii_lowercase().as_str() {
        IDENTITY => Ok(Arc::new(IdentityCompressor)),
        GZIP => Ok(Arc::new(GzipCompressor::new(chunk_size))),
        ZSTD => Ok(Arc::new(ZstdCompressor::new(chunk_size))),
        _ => Err(CodecError::UnknownCompressor(name.to_string())),
    }
}

/// Serializer followed by compressor on write; the reverse on read.
#[derive(Clone)]
pub struct Codec {
    serializer: Arc<dyn Serializer>,
    compressor: Arc<dyn Compressor>,
    chunk_size: usize,
}

impl fmt::Debug for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Codec")
            .field("serializer", &self.serializer.name())
            .field("compressor", &self.compressor.name())
            .field("chunk_size", &self.chunk_size)
            .finish()
    }
}

impl Default for Codec {
    fn default() -> Self {
        Self::new(Arc::new(JsonSerializer), Arc::new(IdentityCompressor), DEFAULT_CHUNK_SIZE)
    }
}

impl Codec {
    pub fn new(serializer: Arc<dyn Serializer>, compressor: Arc<dyn Compressor>, chunk_size: usize) -> Self {
        Self { serializer, compressor, chunk_size }
    }

    pub fn from_names(serializer: &str, compressor: &str, chunk_size: usize) -> Result<Self, CodecError> {
        Ok(Self::new(serializer_by_name(serializer)?, compressor_by_name(compressor, chunk_size)?, chunk_size))
    }

    pub fn serializer_name(&self) -> &'static str {
        self.serializer.name()
    }

    pub fn compressor_name(&self) -> &'static str {
        self.compressor.name()
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn encode_term_vector(&self, value: &TermVector) -> Result<Vec<u8>, CodecError> {
        self.compressor.compress(&self.serializer.serialize_term_vector(value)?)
    }

    pub fn decode_term_vector(&self, bytes: &[u8]) -> Result<TermVector, CodecError> {
        self.serializer.deserialize_term_vector(&self.compressor.decompress(bytes)?)
    }

    pub fn encode_catalog(&self, value: &Catalog) -> Result<Vec<u8>, CodecError> {
        self.compressor.compress(&self.serializer.serialize_catalog(value)?)
    }

    pub fn decode_catalog(&self, bytes: &[u8]) -> Result<Catalog, CodecError> {
        self.serializer.deserialize_catalog(&self.compressor.decompress(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{CatalogEntry, TfEntry};

    fn sample_vector() -> TermVector {
        let mut tv = TermVector::new();
        tv.postings.insert("AP890101-0001".into(), TfEntry::new(vec![3, 17, 40]));
        tv.postings.insert("AP890101-0002".into(), TfEntry::new(vec![1]));
        tv.total_term_freq = 4;
        tv
    }

    #[test]
    fn every_codec_combination_round_trips() {
        let tv = sample_vector();
        let mut catalog = Catalog::new(2);
        catalog.entries.insert("dog".into(), CatalogEntry { offset: 0, length: 12 });
        for ser in [JSON, BINCODE] {
            for comp in [IDENTITY, GZIP, ZSTD] {
                // small chunks force multi-chunk streaming
                let codec = Codec::from_names(ser, comp, 7).unwrap();
                let bytes = codec.encode_term_vector(&tv).unwrap();
                assert_eq!(codec.decode_term_vector(&bytes).unwrap(), tv, "{ser}+{comp}");
                let bytes = codec.encode_catalog(&catalog).unwrap();
                assert_eq!(codec.decode_catalog(&bytes).unwrap(), catalog, "{ser}+{comp}");
            }
        }
    }

    #[test]
    fn gzip_reduces_repetitive_records() {
        let mut tv = TermVector::new();
        for pos in 1..=2000 {
            tv.record("doc", pos);
        }
        let plain = Codec::from_names(JSON, IDENTITY, DEFAULT_CHUNK_SIZE).unwrap();
        let gzip = Codec::from_names(JSON, GZIP, DEFAULT_CHUNK_SIZE).unwrap();
        assert!(gzip.encode_term_vector(&tv).unwrap().len() < plain.encode_term_vector(&tv).unwrap().len());
    }

    #[test]
    fn malformed_bytes_are_rejected() {
        let json = Codec::from_names(JSON, IDENTITY, DEFAULT_CHUNK_SIZE).unwrap();
        assert!(matches!(json.decode_term_vector(b"{\"total_term_freq\": 1"), Err(CodecError::Json(_))));

        let gzip = Codec::from_names(JSON, GZIP, DEFAULT_CHUNK_SIZE).unwrap();
        assert!(matches!(gzip.decode_term_vector(b"definitely not gzip"), Err(CodecError::Compression { .. })));

        let bytes = gzip.encode_term_vector(&sample_vector()).unwrap();
        assert!(gzip.decode_term_vector(&bytes[..bytes.len() / 2]).is_err());
    }

    #[test]
    fn unknown_names_fail() {
        assert!(matches!(Codec::from_names("xml", GZIP, 1), Err(CodecError::UnknownSerializer(_))));
        assert!(matches!(Codec::from_names(JSON, "lzma", 1), Err(CodecError::UnknownCompressor(_))));
    }

    #[test]
    fn names_are_reported() {
        let codec = Codec::from_names("Bincode", "GZIP", 64).unwrap();
        assert_eq!(codec.serializer_name(), BINCODE);
        assert_eq!(codec.compressor_name(), GZIP);
    }
}
