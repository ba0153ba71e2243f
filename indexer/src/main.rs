use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use termdex::{index_documents, Document, DuplicatePolicy, IndexConfig, StandardAnalyzer};
use tracing_subscriber::{fmt, EnvFilter};
use walkdir::WalkDir;

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct InputDoc {
    id: String,
    #[serde(alias = "body")]
    text: String,
    #[serde(default, alias = "title")]
    head: Option<String>,
}

impl From<InputDoc> for Document {
    fn from(doc: InputDoc) -> Self {
        Document { id: doc.id, text: doc.text, head: doc.head }
    }
}

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build and inspect a write-once inverted index", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a final index generation from JSON/JSONL files or a directory
    Build {
        /// Input path (file or directory)
        #[arg(long)]
        input: String,
        /// Index root directory (overrides the config file)
        #[arg(long)]
        output: Option<PathBuf>,
        /// JSON config file; flags below override its values
        #[arg(long)]
        config: Option<PathBuf>,
        /// Number of parallel partitions
        #[arg(long)]
        partitions: Option<usize>,
        /// Serializer: json | bincode
        #[arg(long)]
        serializer: Option<String>,
        /// Compressor: identity | gzip | zstd
        #[arg(long)]
        compressor: Option<String>,
        /// Stopword file, one word per line (default: built-in English list)
        #[arg(long)]
        stopwords: Option<PathBuf>,
        /// Also index the secondary (head/title) field
        #[arg(long, default_value_t = false)]
        index_head: bool,
        /// Disable Snowball stemming
        #[arg(long, default_value_t = false)]
        no_stemming: bool,
        /// Sum and concatenate postings when a document shows up in two partitions instead of failing
        #[arg(long, default_value_t = false)]
        combine_duplicates: bool,
    },
    /// Print corpus statistics, or one term vector, of a final generation
    Inspect {
        /// Metadata file written by `build`
        #[arg(long)]
        metadata: PathBuf,
        /// Print this term's vector instead of statistics
        #[arg(long)]
        term: Option<String>,
        /// JSON config file; supplies `cache_capacity` for the reader
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Serialize)]
struct Stats<'a> {
    total_documents: u64,
    vocabulary_size: usize,
    average_document_length: f64,
    serializer: &'a str,
    compressor: &'a str,
    analyzer: &'a str,
    timestamp: &'a str,
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, output, config, partitions, serializer, compressor, stopwords, index_head, no_stemming, combine_duplicates } => {
            let mut cfg = match config {
                Some(path) => IndexConfig::from_json_file(&path).with_context(|| format!("loading {}", path.display()))?,
                None => IndexConfig::default(),
            };
            if let Some(root) = output { cfg.root = root; }
            if let Some(n) = partitions { cfg.partitions = n; }
            if let Some(s) = serializer { cfg.serializer = s; }
            if let Some(c) = compressor { cfg.compressor = c; }
            cfg.index_secondary_field |= index_head;
            if no_stemming { cfg.apply_stemming = false; }
            if combine_duplicates { cfg.on_duplicate_document = DuplicatePolicy::Combine; }
            build_index(&input, &cfg, stopwords.as_deref())
        }
        Commands::Inspect { metadata, term, config } => {
            let cfg = match config {
                Some(path) => IndexConfig::from_json_file(&path).with_context(|| format!("loading {}", path.display()))?,
                None => IndexConfig::default(),
            };
            inspect(&metadata, term.as_deref(), &cfg)
        }
    }
}

fn build_index(input: &str, cfg: &IndexConfig, stopwords: Option<&Path>) -> Result<()> {
    let analyzer = match stopwords {
        Some(path) => StandardAnalyzer::with_stopwords_file(path).with_context(|| format!("reading stopwords {}", path.display()))?,
        None => StandardAnalyzer::new(),
    };
    let documents = load_documents(Path::new(input))?;
    tracing::info!(docs = documents.len(), root = %cfg.root.display(), "documents loaded");

    let (meta, meta_path) = index_documents(cfg, &analyzer, &documents)?;
    tracing::info!(metadata = %meta_path.display(), total_docs = meta.total_docs, "index build complete");
    println!("{}", meta_path.display());
    Ok(())
}

fn inspect(metadata: &Path, term: Option<&str>, cfg: &IndexConfig) -> Result<()> {
    let reader = cfg.open_reader(metadata)?;
    let out = match term {
        Some(t) => match reader.get_term_vector(t)? {
            Some(tv) => serde_json::to_string_pretty(tv.as_ref())?,
            None => format!("term {t:?} not in index"),
        },
        None => {
            let meta = reader.metadata();
            serde_json::to_string_pretty(&Stats {
                total_documents: reader.get_total_documents(),
                vocabulary_size: reader.get_vocabulary_size(),
                average_document_length: reader.get_average_document_length(),
                serializer: &meta.serializer,
                compressor: &meta.compressor,
                analyzer: &meta.analyzer,
                timestamp: &meta.timestamp,
            })?
        }
    };
    println!("{out}");
    Ok(())
}

fn load_documents(input_path: &Path) -> Result<Vec<Document>> {
    let mut files: Vec<PathBuf> = Vec::new();
    if input_path.is_dir() {
        for entry in WalkDir::new(input_path).into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() {
                if let Some(ext) = p.extension().and_then(|s| s.to_str()) {
                    if matches!(ext, "json" | "jsonl") {
                        files.push(p.to_path_buf());
                    }
                }
            }
        }
        files.sort();
    } else if input_path.is_file() {
        files.push(input_path.to_path_buf());
    }

    let mut documents = Vec::new();
    for file in files {
        if file.extension().and_then(|s| s.to_str()) == Some("jsonl") {
            read_jsonl(&file, &mut documents)?;
        } else {
            read_json(&file, &mut documents)?;
        }
    }
    Ok(documents)
}

fn read_jsonl(file: &Path, documents: &mut Vec<Document>) -> Result<()> {
    let reader = BufReader::new(File::open(file)?);
    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() { continue; }
        let doc: InputDoc = serde_json::from_str(&line).with_context(|| format!("{}:{}", file.display(), n + 1))?;
        documents.push(doc.into());
    }
    Ok(())
}

fn read_json(file: &Path, documents: &mut Vec<Document>) -> Result<()> {
    let reader = BufReader::new(File::open(file)?);
    let json: serde_json::Value = serde_json::from_reader(reader)?;
    match json {
        serde_json::Value::Array(arr) => {
            for v in arr {
                let doc: InputDoc = serde_json::from_value(v)?;
                documents.push(doc.into());
            }
        }
        serde_json::Value::Object(_) => {
            let doc: InputDoc = serde_json::from_value(json)?;
            documents.push(doc.into());
        }
        _ => tracing::warn!(path = %file.display(), "skipping JSON that is neither an object nor an array"),
    }
    Ok(())
}
