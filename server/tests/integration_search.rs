use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use cdp_core::persist::{save_meta, save_scores, save_versions, IndexPaths, MetaFile, FORMAT_VERSION};
use cdp_core::{CorpusIndex, DocumentId, Version, VersionHistory};
use http_body_util::BodyExt;
use serde_json::Value;
use std::collections::BTreeMap;
use tempfile::tempdir;
use tower::ServiceExt;

fn build_tiny_index(dir: &std::path::Path, docs: &[(&str, &str)]) {
    let paths = IndexPaths::new(dir);
    let texts: BTreeMap<DocumentId, String> = docs.iter().map(|(id, t)| (id.to_string(), t.to_string())).collect();
    let index = CorpusIndex::from_texts(&texts);
    save_scores(&paths, &index.scores).unwrap();

    let history: VersionHistory = docs
        .iter()
        .map(|(id, t)| {
            let v = Version { full_text: t.to_string(), created_at: "2024-01-01T00:00:00Z".into(), short_name: format!("{id}_2024-01-01T0-0") };
            (id.to_string(), vec![v])
        })
        .collect();
    save_versions(&paths, &history).unwrap();

    let meta = MetaFile {
        num_docs: index.num_docs(),
        num_terms: index.num_terms(),
        rewritten_documents: vec![],
        created_at: "2024-01-01T00:00:00Z".into(),
        version: FORMAT_VERSION,
        build_seconds: 0.0,
    };
    save_meta(&paths, &meta).unwrap();
}

async fn call(app: Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

const BICYCLE: &[(&str, &str)] = &[("a", "bicycle bicycle path"), ("b", "infrastructure path")];

#[tokio::test]
async fn search_returns_ranked_results() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path(), BICYCLE);
    let app = cdp_server::build_app_with(dir.path().to_string_lossy().to_string(), None).unwrap();

    let (status, json) = call(app, get("/search?q=bicycle&k=2&fuzzy=false")).await;
    assert_eq!(status, StatusCode::OK);
    let arr = json["results"].as_array().unwrap();
    assert_eq!(arr.len(), 2);
    assert_eq!(arr[0]["document_id"], "a");
    assert_eq!(arr[1]["document_id"], "b");
    assert_eq!(arr[1]["relevancy"].as_f64().unwrap(), 0.0);
    assert_eq!(json["total_hits"], 1);
    assert_eq!(arr[0]["matched_terms"]["bicycle"]["kind"], "exact");
    assert_eq!(arr[0]["short_name"], "a_2024-01-01T0-0");
    assert!(arr[0]["snippet"].as_str().unwrap().contains("<em>bicycle</em>"));
}

#[tokio::test]
async fn fuzzy_search_is_default() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path(), BICYCLE);
    let app = cdp_server::build_app_with(dir.path().to_string_lossy().to_string(), None).unwrap();

    let (status, json) = call(app, get("/search?q=bicycl")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["results"][0]["document_id"], "a");
    assert_eq!(json["results"][0]["matched_terms"]["bicycle"]["kind"], "fuzzy");
}

#[tokio::test]
async fn doc_lookup_and_missing_doc() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path(), BICYCLE);
    let app = cdp_server::build_app_with(dir.path().to_string_lossy().to_string(), None).unwrap();

    let (status, json) = call(app.clone(), get("/doc/b")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["text"], "infrastructure path");
    assert_eq!(json["versions"].as_array().unwrap().len(), 1);

    let (status, _) = call(app, get("/doc/nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn reload_requires_token_and_picks_up_rebuild() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path(), BICYCLE);
    let root = dir.path().to_string_lossy().to_string();
    let app = cdp_server::build_app_with(root, Some("secret".into())).unwrap();

    let denied = Request::post("/index/reload").body(Body::empty()).unwrap();
    let (status, _) = call(app.clone(), denied).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    build_tiny_index(dir.path(), &[("a", "bicycle"), ("b", "path"), ("c", "levy vote")]);
    let allowed = Request::post("/index/reload").header("X-ADMIN-TOKEN", "secret").body(Body::empty()).unwrap();
    let (status, json) = call(app.clone(), allowed).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["num_docs"], 3);

    let (_, json) = call(app, get("/search?q=levy&fuzzy=false")).await;
    assert_eq!(json["results"][0]["document_id"], "c");
    assert_eq!(json["results"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn out_of_range_ceiling_is_rejected() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path(), BICYCLE);
    let app = cdp_server::build_app_with(dir.path().to_string_lossy().to_string(), None).unwrap();

    let (status, _) = call(app.clone(), get("/search?q=bicycl&ceiling=0.9")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = call(app, get("/search?q=bicycl&ceiling=0.5")).await;
    assert_eq!(status, StatusCode::OK);
}
