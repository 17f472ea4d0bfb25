pub mod api;
mod middleware;
mod public;

use std::sync::Arc;

use axum::{Router, middleware as axum_middleware, routing::get};

use crate::application::{catalog::CatalogService, gallery::GalleryService, live::ChangeFeed};
use crate::infra::{assets, remote_images::RemoteImageProxy, sheets::SheetsClient};

use middleware::{log_responses, set_request_context};

/// Everything the request handlers need, created once at startup and
/// torn down with the process.
#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<CatalogService>,
    pub gallery: Arc<GalleryService>,
    pub sheets: Arc<SheetsClient>,
    pub proxy: Arc<RemoteImageProxy>,
    pub live: Arc<ChangeFeed>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(assets::serve_entry_page))
        .route("/images", get(api::list_images))
        .route("/products", get(api::list_products))
        .route("/products/debug", get(api::products_debug))
        .route("/img/{id}", get(api::proxy_image))
        .route("/events", get(api::change_events))
        .route("/gallery/{*path}", get(public::serve_gallery_file))
        .route("/static/{*path}", get(assets::serve_static))
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}
