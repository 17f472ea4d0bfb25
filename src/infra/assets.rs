//! Embedded static asset serving utilities.

use std::borrow::Cow;

use axum::{
    body::Body,
    extract::Path,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use include_dir::{Dir, include_dir};
use mime_guess::{Mime, MimeGuess};

use crate::application::error::ErrorReport;

static STATIC_ASSETS: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/static");

const ENTRY_PAGE: &str = "index.html";

/// Serve embedded static assets with long-lived caching.
pub async fn serve_static(path: Option<Path<String>>) -> Response {
    let source = "infra::assets::serve_static";
    let captured = path.map(|Path(value)| value);
    match resolve_asset(captured) {
        Some(asset) => asset.into_response(),
        None => not_found_response(source),
    }
}

/// Serve the embedded entry page.
///
/// The page drives live re-fetching, so it is delivered with `no-store`
/// rather than the asset bundle's immutable caching.
pub async fn serve_entry_page() -> Response {
    let Some(file) = STATIC_ASSETS.get_file(ENTRY_PAGE) else {
        return not_found_response("infra::assets::serve_entry_page");
    };

    let mut response = build_response(
        Bytes::from_static(file.contents()),
        mime_guess::from_path(ENTRY_PAGE).first_or_octet_stream(),
    );
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-store"),
    );
    response
}

fn not_found_response(source: &'static str) -> Response {
    let mut response = StatusCode::NOT_FOUND.into_response();
    ErrorReport::from_message(source, StatusCode::NOT_FOUND, "Static asset not found")
        .attach(&mut response);
    response
}

struct Asset<'a> {
    contents: Cow<'a, [u8]>,
    mime: MimeGuess,
}

fn resolve_asset(path: Option<String>) -> Option<Asset<'static>> {
    let mut candidate = path.unwrap_or_default();
    if candidate.starts_with('/') {
        candidate = candidate.trim_start_matches('/').to_string();
    }

    if candidate.is_empty() || candidate.ends_with('/') || candidate.contains("..") {
        // Avoid directory traversal and disallow directory listings.
        return None;
    }

    let file = STATIC_ASSETS.get_file(&candidate)?;

    Some(Asset {
        contents: Cow::Borrowed(file.contents()),
        mime: mime_guess::from_path(&candidate),
    })
}

impl IntoResponse for Asset<'static> {
    fn into_response(self) -> Response {
        let mime = self.mime.first_or_octet_stream();
        let mut response = match self.contents {
            Cow::Borrowed(slice) => build_response(Bytes::from_static(slice), mime),
            Cow::Owned(bytes) => build_response(Bytes::from(bytes), mime),
        };
        response.headers_mut().insert(
            header::CACHE_CONTROL,
            HeaderValue::from_static("public, max-age=31536000, immutable"),
        );
        response
    }
}

fn build_response(bytes: Bytes, mime: Mime) -> Response {
    let len = bytes.len();
    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
        headers.insert(header::CONTENT_TYPE, value);
    }
    if let Ok(value) = HeaderValue::from_str(&len.to_string()) {
        headers.insert(header::CONTENT_LENGTH, value);
    }

    response
}
