//! Disk-backed serving of the gallery's own image files.

use std::io::ErrorKind;
use std::path::{Component, Path as StdPath, PathBuf};

use axum::{
    body::Body,
    extract::{Path, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use tracing::error;

use crate::application::error::ErrorReport;

use super::AppState;

pub async fn serve_gallery_file(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Response {
    const SOURCE: &str = "infra::http::public::serve_gallery_file";

    let Some(absolute) = resolve(state.gallery.directory(), &path) else {
        return not_found(SOURCE);
    };

    match tokio::fs::read(&absolute).await {
        Ok(bytes) => {
            let mime = mime_guess::from_path(&path).first_or_octet_stream();
            let mut response = Response::new(Body::from(bytes));
            if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
                response.headers_mut().insert(header::CONTENT_TYPE, value);
            }
            response
        }
        Err(err) if err.kind() == ErrorKind::NotFound => not_found(SOURCE),
        Err(err) => {
            error!(
                target = SOURCE,
                path = %path,
                error = %err,
                "failed to read gallery file"
            );
            let mut response = StatusCode::INTERNAL_SERVER_ERROR.into_response();
            ErrorReport::from_error(SOURCE, StatusCode::INTERNAL_SERVER_ERROR, &err)
                .attach(&mut response);
            response
        }
    }
}

fn not_found(source: &'static str) -> Response {
    let mut response = StatusCode::NOT_FOUND.into_response();
    ErrorReport::from_message(source, StatusCode::NOT_FOUND, "Gallery file not found")
        .attach(&mut response);
    response
}

/// Join the requested path under the gallery root, rejecting absolute
/// paths and parent-directory traversal.
fn resolve(root: &StdPath, requested: &str) -> Option<PathBuf> {
    let relative = StdPath::new(requested);
    if relative.is_absolute()
        || relative
            .components()
            .any(|component| matches!(component, Component::ParentDir | Component::Prefix(_)))
    {
        return None;
    }
    Some(root.join(relative))
}
