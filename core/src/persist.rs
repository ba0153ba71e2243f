use crate::codec::Codec;
use crate::error::{CodecError, IndexError, Result};
use crate::index::{Catalog, CatalogEntry, TermTable, TermVector};
use serde::{Deserialize, Serialize};
use std::fs::{self, create_dir_all, File};
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::OffsetDateTime;
use uuid::Uuid;

pub const FORMAT_VERSION: u32 = 1;

/// Identity of one index generation. Written once as pretty JSON and never changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub postings_file_path: PathBuf,
    pub catalog_file_path: PathBuf,
    pub serializer: String,
    pub compressor: String,
    pub compression_chunk_size: usize,
    pub analyzer: String,
    pub apply_stemming: bool,
    pub index_secondary_field: bool,
    pub total_docs: u64,
    pub timestamp: String,
    pub format_version: u32,
}

impl Metadata {
    pub fn codec(&self) -> std::result::Result<Codec, CodecError> {
        Codec::from_names(&self.serializer, &self.compressor, self.compression_chunk_size)
    }
}

pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    pub fn postings_dir(&self) -> PathBuf { self.root.join("postings") }
    pub fn catalog_dir(&self) -> PathBuf { self.root.join("catalog") }
    pub fn metadata_dir(&self) -> PathBuf { self.root.join("metadata") }

    pub fn create_dirs(&self) -> io::Result<()> {
        for dir in [self.postings_dir(), self.catalog_dir(), self.metadata_dir()] {
            create_dir_all(dir)?;
        }
        Ok(())
    }

    /// Fresh `(postings, catalog)` paths sharing one generation name.
    pub fn new_generation_files(&self) -> (PathBuf, PathBuf) {
        let name = generation_name();
        (
            self.postings_dir().join(format!("{name}.postings")),
            self.catalog_dir().join(format!("{name}.catalog")),
        )
    }

    pub fn metadata_file_for(&self, meta: &Metadata) -> PathBuf {
        let stem = meta
            .postings_file_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(generation_name);
        self.metadata_dir().join(format!("{stem}.json"))
    }
}

fn generation_name() -> String {
    let ts = OffsetDateTime::now_utc()
        .format(format_description!("[year][month][day]T[hour][minute][second]Z"))
        .unwrap_or_default();
    format!("{ts}-{}", Uuid::new_v4())
}

pub fn now_rfc3339() -> String {
    OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_else(|_| "".into())
}

/// Append-only postings file that hands back the byte range of every record.
pub struct PostingsWriter {
    out: BufWriter<File>,
    cursor: u64,
}

impl PostingsWriter {
    pub fn create<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let f = File::create(path)?;
        Ok(Self { out: BufWriter::new(f), cursor: 0 })
    }

    pub fn append(&mut self, bytes: &[u8]) -> io::Result<CatalogEntry> {
        let entry = CatalogEntry { offset: self.cursor, length: bytes.len() as u64 };
        self.out.write_all(bytes)?;
        self.cursor += entry.length;
        Ok(entry)
    }

    /// Flushes and fsyncs; the file is durable once this returns.
    pub fn finish(self) -> io::Result<u64> {
        let f = self.out.into_inner().map_err(|e| e.into_error())?;
        f.sync_all()?;
        Ok(self.cursor)
    }
}

/// Streams term vectors into a fresh postings + catalog pair.
pub struct GenerationWriter<'c> {
    codec: &'c Codec,
    postings_path: PathBuf,
    catalog_path: PathBuf,
    postings: PostingsWriter,
    catalog: Catalog,
}

impl<'c> GenerationWriter<'c> {
    pub fn create(paths: &IndexPaths, codec: &'c Codec, total_docs: u64) -> Result<Self> {
        let (postings_path, catalog_path) = paths.new_generation_files();
        let postings = PostingsWriter::create(&postings_path)?;
        Ok(Self { codec, postings_path, catalog_path, postings, catalog: Catalog::new(total_docs) })
    }

    pub fn push(&mut self, term: String, tv: &TermVector) -> Result<()> {
        let bytes = self.codec.encode_term_vector(tv)?;
        let entry = self.postings.append(&bytes)?;
        self.catalog.entries.insert(term, entry);
        Ok(())
    }

    pub fn terms(&self) -> usize {
        self.catalog.len()
    }

    fn finish(self) -> Result<(PathBuf, PathBuf)> {
        self.postings.finish()?;
        save_catalog(&self.catalog_path, self.codec, &self.catalog)?;
        Ok((self.postings_path, self.catalog_path))
    }
}

/// Runs `body` against a new generation and makes it durable. On any error the
/// partially written files are removed before the error is returned.
pub fn write_generation<F>(paths: &IndexPaths, codec: &Codec, total_docs: u64, body: F) -> Result<(PathBuf, PathBuf)>
where
    F: FnOnce(&mut GenerationWriter<'_>) -> Result<()>,
{
    let mut writer = GenerationWriter::create(paths, codec, total_docs)?;
    let (postings_path, catalog_path) = (writer.postings_path.clone(), writer.catalog_path.clone());
    let result = body(&mut writer).and_then(|_| writer.finish());
    if result.is_err() {
        let _ = fs::remove_file(&postings_path);
        let _ = fs::remove_file(&catalog_path);
    }
    result
}

/// Decodes every term vector of a generation. Meant for inspection and tests;
/// readers should use `IndexReader`.
pub fn read_generation(meta: &Metadata) -> Result<TermTable> {
    let codec = meta.codec()?;
    let catalog = load_catalog(&meta.catalog_file_path, &codec)?;
    let mut f = File::open(&meta.postings_file_path)?;
    catalog.validate(f.metadata()?.len())?;
    let mut table = TermTable::new();
    for term in catalog.sorted_terms() {
        let bytes = read_entry(&mut f, &catalog.entries[term])?;
        table.insert(term.to_string(), codec.decode_term_vector(&bytes)?);
    }
    Ok(table)
}

/// Reads exactly the bytes an entry points at.
pub fn read_entry(f: &mut File, entry: &CatalogEntry) -> Result<Vec<u8>> {
    f.seek(SeekFrom::Start(entry.offset))?;
    // the length comes from disk; let the read size the buffer
    let mut buf = Vec::new();
    (&mut *f).take(entry.length).read_to_end(&mut buf)?;
    if buf.len() as u64 != entry.length {
        return Err(CodecError::ShortRead { offset: entry.offset, expected: entry.length, actual: buf.len() as u64 }.into());
    }
    Ok(buf)
}

pub fn save_catalog(path: &Path, codec: &Codec, catalog: &Catalog) -> Result<()> {
    let bytes = codec.encode_catalog(catalog)?;
    let mut f = File::create(path)?;
    f.write_all(&bytes)?;
    f.sync_all()?;
    Ok(())
}

pub fn load_catalog(path: &Path, codec: &Codec) -> Result<Catalog> {
    let buf = fs::read(path)?;
    Ok(codec.decode_catalog(&buf)?)
}

pub fn save_metadata(path: &Path, meta: &Metadata) -> Result<()> {
    let json = serde_json::to_string_pretty(meta).map_err(IndexError::Metadata)?;
    let mut f = File::create(path)?;
    f.write_all(json.as_bytes())?;
    f.sync_all()?;
    Ok(())
}

pub fn load_metadata(path: &Path) -> Result<Metadata> {
    let buf = fs::read_to_string(path)?;
    serde_json::from_str(&buf).map_err(IndexError::Metadata)
}

pub fn set_readonly(path: &Path) -> io::Result<()> {
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_readonly(true);
    fs::set_permissions(path, perms)
}

/// Removes the postings and catalog files of an intermediate generation.
pub fn remove_generation(meta: &Metadata) -> io::Result<()> {
    fs::remove_file(&meta.postings_file_path)?;
    fs::remove_file(&meta.catalog_file_path)?;
    Ok(())
}

/// Cleanup after a failed step; errors are logged, not returned.
pub fn discard_generations(metas: &[Metadata]) {
    for meta in metas {
        if let Err(err) = remove_generation(meta) {
            tracing::warn!(path = %meta.postings_file_path.display(), %err, "failed to discard intermediate generation");
        }
    }
}
