use anyhow::Result;
use axum::{extract::{Path, State}, http::StatusCode, response::{IntoResponse, Response}, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;
use termdex::reader::CacheStats;
use termdex::{IndexConfig, IndexError, IndexReader, TermVector};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Serialize)]
pub struct StatsResponse {
    pub total_documents: u64,
    pub vocabulary_size: usize,
    pub average_document_length: f64,
    pub serializer: String,
    pub compressor: String,
    pub timestamp: String,
    pub cache: CacheStats,
}

#[derive(Serialize)]
pub struct TermVectorResponse {
    pub term: String,
    #[serde(flatten)]
    pub vector: TermVector,
}

#[derive(Serialize)]
pub struct DocLengthResponse {
    pub doc_id: String,
    pub length: u64,
}

#[derive(Clone)]
pub struct AppState {
    pub reader: Arc<IndexReader>,
}

pub enum ApiError {
    NotFound(String),
    Index(IndexError),
}

impl From<IndexError> for ApiError {
    fn from(err: IndexError) -> Self {
        ApiError::Index(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(what) => (StatusCode::NOT_FOUND, format!("{what} not found")),
            ApiError::Index(err) => {
                tracing::error!(%err, "index read failed");
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

pub fn build_app(reader: Arc<IndexReader>) -> Router {
    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/stats", get(stats_handler))
        .route("/termvector/:term", get(term_vector_handler))
        .route("/doc/:doc_id/length", get(doc_length_handler))
        .route("/docs", get(doc_ids_handler))
        .with_state(AppState { reader })
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Opens the generation described by `metadata_file` and builds the router over it.
/// Reader settings: the config file if given, with `--cache-capacity` on top.
pub fn reader_config(config_file: Option<&std::path::Path>, cache_capacity: Option<usize>) -> Result<IndexConfig> {
    let mut cfg = match config_file {
        Some(path) => IndexConfig::from_json_file(path)?,
        None => IndexConfig::default(),
    };
    if let Some(n) = cache_capacity {
        cfg.cache_capacity = n;
    }
    Ok(cfg)
}

pub fn open_app(metadata_file: &str, cache_capacity: usize) -> Result<Router> {
    let reader = IndexReader::open_path(metadata_file, cache_capacity)?;
    Ok(build_app(Arc::new(reader)))
}

pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let reader = &state.reader;
    let meta = reader.metadata();
    Json(StatsResponse {
        total_documents: reader.get_total_documents(),
        vocabulary_size: reader.get_vocabulary_size(),
        average_document_length: reader.get_average_document_length(),
        serializer: meta.serializer.clone(),
        compressor: meta.compressor.clone(),
        timestamp: meta.timestamp.clone(),
        cache: reader.cache_stats(),
    })
}

pub async fn term_vector_handler(State(state): State<AppState>, Path(term): Path<String>) -> Result<Json<TermVectorResponse>, ApiError> {
    // postings reads block; keep them off the async workers
    let reader = Arc::clone(&state.reader);
    let lookup = term.clone();
    let found = tokio::task::spawn_blocking(move || reader.get_term_vector(&lookup))
        .await
        .map_err(|e| ApiError::Index(IndexError::Io(std::io::Error::other(e))))??;
    match found {
        Some(tv) => Ok(Json(TermVectorResponse { term, vector: TermVector::clone(&tv) })),
        None => Err(ApiError::NotFound(format!("term {term:?}"))),
    }
}

pub async fn doc_length_handler(State(state): State<AppState>, Path(doc_id): Path<String>) -> Result<Json<DocLengthResponse>, ApiError> {
    match state.reader.get_document_length(&doc_id) {
        Some(length) => Ok(Json(DocLengthResponse { doc_id, length })),
        None => Err(ApiError::NotFound(format!("document {doc_id:?}"))),
    }
}

pub async fn doc_ids_handler(State(state): State<AppState>) -> Json<Vec<String>> {
    let mut ids: Vec<String> = state.reader.get_all_document_ids().into_iter().map(str::to_string).collect();
    ids.sort_unstable();
    Json(ids)
}
