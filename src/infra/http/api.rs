//! JSON and streaming endpoints of the catalog surface.

use std::convert::Infallible;

use async_stream::stream;
use axum::{
    Json,
    body::Body,
    extract::{Path, State},
    http::{HeaderValue, StatusCode, header},
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
};
use futures::Stream;
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;

use crate::application::catalog::SourceError;
use crate::application::error::ErrorReport;
use crate::infra::remote_images::RemoteImageError;

use super::AppState;

/// Proxied images may be cached by clients for one day.
const PROXY_CACHE_CONTROL: &str = "public, max-age=86400";

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorMessage,
}

pub mod codes {
    pub const BAD_REQUEST: &str = "bad_request";
    pub const AUTH: &str = "auth_error";
    pub const SOURCE_UNAVAILABLE: &str = "source_unavailable";
    pub const UPSTREAM: &str = "upstream_error";
}

#[derive(Debug, Serialize)]
pub struct ApiErrorMessage {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: &'static str,
    hint: Option<String>,
}

impl ApiError {
    pub fn new(
        status: StatusCode,
        code: &'static str,
        message: &'static str,
        hint: Option<String>,
    ) -> Self {
        Self {
            status,
            code,
            message,
            hint,
        }
    }

    pub fn bad_request(message: &'static str, hint: Option<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, codes::BAD_REQUEST, message, hint)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let hint = self.hint.clone();
        let body = ApiErrorBody {
            error: ApiErrorMessage {
                code: self.code.to_string(),
                message: self.message.to_string(),
                hint: self.hint,
            },
        };
        let mut response = (self.status, Json(body)).into_response();
        // Attach a structured report so shared logging middleware can emit rich diagnostics.
        ErrorReport::from_message(
            "infra::http::api",
            self.status,
            format!("{}: {}", self.code, hint.as_deref().unwrap_or(self.message)),
        )
        .attach(&mut response);
        response
    }
}

impl From<SourceError> for ApiError {
    fn from(error: SourceError) -> Self {
        match error {
            SourceError::Auth { message } => ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                codes::AUTH,
                "Catalog source credentials rejected",
                Some(message),
            ),
            SourceError::Unavailable { message } => ApiError::new(
                StatusCode::BAD_GATEWAY,
                codes::SOURCE_UNAVAILABLE,
                "Catalog source unavailable",
                Some(message),
            ),
        }
    }
}

/// `GET /images` — gallery filenames, never an error.
pub async fn list_images(State(state): State<AppState>) -> Response {
    let images = state.gallery.list_images().await;
    no_store(Json(images))
}

/// `GET /products` — cached catalog records, never an error.
pub async fn list_products(State(state): State<AppState>) -> Response {
    let products = state.catalog.products().await;
    no_store(Json((*products).clone()))
}

/// `GET /products/debug` — raw source diagnostics, or a structured error.
pub async fn products_debug(State(state): State<AppState>) -> Result<Response, ApiError> {
    let diagnostics = state.sheets.inspect().await?;
    Ok(no_store(Json(diagnostics)))
}

/// `GET /img/{id}` — remote image passthrough.
pub async fn proxy_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let image = state.proxy.fetch(&id).await.map_err(|err| match err {
        RemoteImageError::BadId => ApiError::bad_request("Invalid image identifier", None),
        RemoteImageError::Upstream { message } => ApiError::new(
            StatusCode::BAD_GATEWAY,
            codes::UPSTREAM,
            "Upstream image fetch failed",
            Some(message),
        ),
    })?;

    let mut response = Response::new(Body::from(image.body));
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&image.content_type) {
        headers.insert(header::CONTENT_TYPE, value);
    }
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(PROXY_CACHE_CONTROL),
    );
    Ok(response)
}

/// `GET /events` — server-sent change notifications.
///
/// Each broadcast signal becomes one `change` event. A subscriber that
/// lagged past the ring buffer still gets a single event: the payload
/// carries no detail, so one nudge is as good as many.
pub async fn change_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut receiver = state.live.subscribe();

    let stream = stream! {
        loop {
            match receiver.recv().await {
                Ok(_) | Err(RecvError::Lagged(_)) => {
                    yield Ok::<Event, Infallible>(Event::default().event("change").data("changed"));
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

fn no_store(body: impl IntoResponse) -> Response {
    let mut response = body.into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}
