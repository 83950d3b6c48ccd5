use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use cdp_core::persist::{load_snapshot, IndexPaths, Snapshot};
use cdp_core::ranker::{search, validate_ceiling, RankOptions, SearchHit, TermMatch, DEFAULT_FUZZY_DISTANCE_CEILING, DEFAULT_MAX_RESULTS};
use parking_lot::RwLock;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

const MAX_K: usize = 100;
const SNIPPET_BEFORE: usize = 100;
const SNIPPET_AFTER: usize = 200;

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default = "default_k")]
    pub k: usize,
    #[serde(default = "default_fuzzy")]
    pub fuzzy: bool,
    #[serde(default = "default_ceiling")]
    pub ceiling: f64,
    #[serde(default)]
    pub normalize: bool,
    pub max_fuzzy: Option<usize>,
}
fn default_k() -> usize { DEFAULT_MAX_RESULTS }
fn default_fuzzy() -> bool { true }
fn default_ceiling() -> f64 { DEFAULT_FUZZY_DISTANCE_CEILING }

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_s: f64,
    /// Documents with a nonzero relevancy, before truncation to `k`.
    pub total_hits: usize,
    pub results: Vec<ResultEntry>,
}

#[derive(Serialize)]
pub struct ResultEntry {
    pub document_id: String,
    pub relevancy: f64,
    pub matched_terms: BTreeMap<String, TermMatch>,
    pub short_name: Option<String>,
    pub snippet: Option<String>,
}

#[derive(Clone)]
pub struct AppState {
    pub index_root: PathBuf,
    pub snapshot: Arc<RwLock<Snapshot>>,
    pub admin_token: Option<String>,
}

/// Build the router, taking the admin token from `ADMIN_TOKEN`.
pub fn build_app(index_dir: String) -> Result<Router> {
    build_app_with(index_dir, std::env::var("ADMIN_TOKEN").ok())
}

pub fn build_app_with(index_dir: String, admin_token: Option<String>) -> Result<Router> {
    let index_root = PathBuf::from(&index_dir);
    let snapshot = load_snapshot(&IndexPaths::new(&index_root))
        .with_context(|| format!("loading index snapshot from {index_dir}"))?;
    tracing::info!(num_docs = snapshot.num_docs, "loaded index snapshot");
    let app_state = AppState { index_root, snapshot: Arc::new(RwLock::new(snapshot)), admin_token };

    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val.split(',').filter_map(|s| s.trim().parse().ok()).collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/doc/:document_id", get(doc_handler))
        .route("/index/reload", post(reload_handler))
        .with_state(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());
    Ok(app)
}

pub async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, (StatusCode, String)> {
    validate_ceiling(params.ceiling).map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    let start = std::time::Instant::now();
    let k = params.k.clamp(1, MAX_K);
    let opts = RankOptions {
        fuzzy: params.fuzzy,
        fuzzy_distance_ceiling: params.ceiling,
        max_results: usize::MAX,
        normalize_query: params.normalize,
        max_fuzzy_matches_per_term: params.max_fuzzy,
    };

    let snapshot = state.snapshot.read();
    let mut hits = search(&params.q, &snapshot.scores, &opts);
    let total_hits = hits.iter().filter(|h| h.relevancy > 0.0).count();
    hits.truncate(k);
    let results = hits.into_iter().map(|hit| result_entry(&snapshot, hit)).collect();
    drop(snapshot);

    let took_s = start.elapsed().as_secs_f64();
    tracing::debug!(query = %params.q, total_hits, took_s, "search");
    Ok(Json(SearchResponse { query: params.q, took_s, total_hits, results }))
}

fn result_entry(snapshot: &Snapshot, hit: SearchHit) -> ResultEntry {
    let latest = snapshot.versions.get(&hit.document_id).and_then(|v| v.last());
    let terms: Vec<&str> = hit.matched_terms.keys().map(String::as_str).collect();
    let snippet = latest.and_then(|v| snippet(&v.full_text, &terms));
    ResultEntry {
        short_name: latest.map(|v| v.short_name.clone()),
        document_id: hit.document_id,
        relevancy: hit.relevancy,
        matched_terms: hit.matched_terms,
        snippet,
    }
}

pub async fn doc_handler(
    State(state): State<AppState>,
    Path(document_id): Path<String>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<serde_json::Value>)> {
    let snapshot = state.snapshot.read();
    let versions = snapshot.versions.get(&document_id).filter(|v| !v.is_empty());
    let (Some(versions), Some(weights)) = (versions, snapshot.scores.get(&document_id)) else {
        return Err((StatusCode::NOT_FOUND, Json(json!({ "error": "not found", "document_id": document_id }))));
    };
    let history: Vec<_> = versions
        .iter()
        .map(|v| json!({ "created_at": v.created_at, "short_name": v.short_name }))
        .collect();
    Ok(Json(json!({
        "document_id": document_id,
        "text": versions.last().map(|v| v.full_text.as_str()),
        "num_terms": weights.len(),
        "versions": history,
    })))
}

async fn reload_handler(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    authorize(&state, &headers)?;
    let fresh = load_snapshot(&IndexPaths::new(&state.index_root)).map_err(|e| {
        tracing::warn!(error = %e, "snapshot reload failed");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;
    let num_docs = fresh.num_docs;
    *state.snapshot.write() = fresh;
    tracing::info!(num_docs, "reloaded index snapshot");
    Ok(Json(json!({ "num_docs": num_docs })))
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), (StatusCode, String)> {
    let required = match &state.admin_token {
        Some(t) => t,
        None => return Err((StatusCode::UNAUTHORIZED, "ADMIN_TOKEN not set".into())),
    };
    let provided = headers.get("X-ADMIN-TOKEN").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err((StatusCode::UNAUTHORIZED, "invalid admin token".into()))
    }
}

fn terms_regex(terms: &[&str]) -> Option<Regex> {
    let alternatives: Vec<String> = terms.iter().filter(|t| !t.trim().is_empty()).map(|t| regex::escape(t)).collect();
    if alternatives.is_empty() {
        return None;
    }
    RegexBuilder::new(&alternatives.join("|")).case_insensitive(true).build().ok()
}

/// A window of `text` around the first matched term, with matches wrapped in `<em>`.
fn snippet(text: &str, terms: &[&str]) -> Option<String> {
    if text.is_empty() {
        return None;
    }
    let Some(re) = terms_regex(terms) else {
        return Some(text.chars().take(SNIPPET_AFTER).collect());
    };
    let window = match re.find(text) {
        Some(m) => {
            let mut start = m.start().saturating_sub(SNIPPET_BEFORE);
            while !text.is_char_boundary(start) {
                start -= 1;
            }
            let mut end = (m.start() + SNIPPET_AFTER).min(text.len());
            while !text.is_char_boundary(end) {
                end += 1;
            }
            &text[start..end]
        }
        None => return Some(text.chars().take(SNIPPET_AFTER).collect()),
    };
    Some(re.replace_all(window, "<em>$0</em>").into_owned())
}
