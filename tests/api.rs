use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use tower::ServiceExt;
use vetrina::application::catalog::{CatalogService, ProductSource, SourceError};
use vetrina::application::gallery::GalleryService;
use vetrina::application::live::ChangeFeed;
use vetrina::config::CatalogSettings;
use vetrina::domain::products::ProductRecord;
use vetrina::infra::http::{AppState, build_router};
use vetrina::infra::remote_images::RemoteImageProxy;
use vetrina::infra::sheets::SheetsClient;

/// Fixed in-memory source; the router tests never touch the network.
struct StaticSource(Vec<ProductRecord>);

#[async_trait]
impl ProductSource for StaticSource {
    async fn fetch_records(&self) -> Result<Vec<ProductRecord>, SourceError> {
        Ok(self.0.clone())
    }
}

fn sample_products() -> Vec<ProductRecord> {
    vec![
        ProductRecord {
            image: "lamp.png".to_string(),
            name: "Desk lamp".to_string(),
            price: 30.0,
            description: "warm light".to_string(),
        },
        ProductRecord {
            image: String::new(),
            name: "Chair".to_string(),
            price: 5.5,
            description: String::new(),
        },
    ]
}

fn unconfigured_catalog_settings() -> CatalogSettings {
    CatalogSettings {
        sheet_id: None,
        range: "A2:D".to_string(),
        ttl: Duration::from_secs(60),
        credentials_base64: None,
    }
}

fn test_state(gallery_dir: &std::path::Path) -> AppState {
    let source: Arc<dyn ProductSource> = Arc::new(StaticSource(sample_products()));
    let sheets = Arc::new(
        SheetsClient::new(&unconfigured_catalog_settings(), Duration::from_secs(1))
            .expect("sheets client builds"),
    );
    // Unroutable base: any attempted fetch would error rather than succeed.
    let proxy = Arc::new(
        RemoteImageProxy::new("http://192.0.2.1/img/".to_string(), Duration::from_secs(30))
            .expect("proxy builds"),
    );

    AppState {
        catalog: Arc::new(CatalogService::new(source, Duration::from_secs(3600))),
        gallery: Arc::new(GalleryService::new(gallery_dir.to_path_buf())),
        sheets,
        proxy,
        live: Arc::new(ChangeFeed::new()),
    }
}

async fn get(state: AppState, uri: &str) -> axum::http::Response<Body> {
    build_router(state)
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn body_json(response: axum::http::Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn products_returns_the_cached_records_with_no_store() {
    let dir = tempfile::tempdir().unwrap();
    let response = get(test_state(dir.path()), "/products").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CACHE_CONTROL).unwrap(),
        "no-store"
    );

    let body = body_json(response).await;
    let products = body.as_array().expect("array body");
    assert_eq!(products.len(), 2);
    assert_eq!(products[0]["name"], "Desk lamp");
    assert_eq!(products[1]["price"], 5.5);
}

#[tokio::test]
async fn images_lists_only_allowed_extensions() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.png"), b"x").unwrap();
    std::fs::write(dir.path().join("b.txt"), b"x").unwrap();
    std::fs::write(dir.path().join("C.JPG"), b"x").unwrap();

    let response = get(test_state(dir.path()), "/images").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CACHE_CONTROL).unwrap(),
        "no-store"
    );

    let body = body_json(response).await;
    let mut names: Vec<String> = body
        .as_array()
        .expect("array body")
        .iter()
        .map(|value| value.as_str().unwrap().to_string())
        .collect();
    names.sort();
    assert_eq!(names, vec!["C.JPG", "a.png"]);
}

#[tokio::test]
async fn images_on_a_missing_directory_is_an_empty_array() {
    let dir = tempfile::tempdir().unwrap();
    let response = get(test_state(&dir.path().join("absent")), "/images").await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body, serde_json::json!([]));
}

#[tokio::test]
async fn debug_endpoint_reports_the_unconfigured_source() {
    let dir = tempfile::tempdir().unwrap();
    let response = get(test_state(dir.path()), "/products/debug").await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "source_unavailable");
    assert!(body["error"]["message"].is_string());
}

#[tokio::test]
async fn malformed_proxy_id_is_rejected_without_network_io() {
    let dir = tempfile::tempdir().unwrap();
    let response = get(test_state(dir.path()), "/img/bad%20id%21").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "bad_request");
}

#[tokio::test]
async fn entry_page_is_served_with_no_store() {
    let dir = tempfile::tempdir().unwrap();
    let response = get(test_state(dir.path()), "/").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CACHE_CONTROL).unwrap(),
        "no-store"
    );
    let content_type = response.headers().get(header::CONTENT_TYPE).unwrap();
    assert!(content_type.to_str().unwrap().starts_with("text/html"));
}

#[tokio::test]
async fn static_assets_carry_immutable_caching() {
    let dir = tempfile::tempdir().unwrap();
    let response = get(test_state(dir.path()), "/static/style.css").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CACHE_CONTROL).unwrap(),
        "public, max-age=31536000, immutable"
    );
}

#[tokio::test]
async fn gallery_files_are_served_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("lamp.png"), b"not really a png").unwrap();

    let response = get(test_state(dir.path()), "/gallery/lamp.png").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "image/png"
    );

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"not really a png");
}

#[tokio::test]
async fn missing_gallery_files_are_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let response = get(test_state(dir.path()), "/gallery/absent.png").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn gallery_traversal_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("lamp.png"), b"x").unwrap();

    let response = get(test_state(dir.path()), "/gallery/..%2FCargo.toml").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn products_are_cached_across_requests() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path());

    let first = get(state.clone(), "/products").await;
    assert_eq!(first.status(), StatusCode::OK);

    // Same snapshot is reused within the TTL window.
    let snapshot_a = state.catalog.products().await;
    let snapshot_b = state.catalog.products().await;
    assert!(Arc::ptr_eq(&snapshot_a, &snapshot_b));
}
