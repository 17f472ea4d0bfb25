//! Remote image passthrough with identifier validation up front.

use std::time::Duration;

use bytes::Bytes;
use metrics::counter;
use reqwest::Client;
use thiserror::Error;
use url::Url;

const METRIC_UPSTREAM_ERRORS: &str = "vetrina_proxy_upstream_errors_total";

/// Minimum accepted identifier length; shorter values are rejected
/// before any network traffic.
const MIN_ID_LEN: usize = 8;

const DEFAULT_CONTENT_TYPE: &str = "image/jpeg";

#[derive(Debug, Error)]
pub enum RemoteImageError {
    #[error("invalid image identifier")]
    BadId,
    #[error("upstream image fetch failed: {message}")]
    Upstream { message: String },
}

impl RemoteImageError {
    fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream {
            message: message.into(),
        }
    }
}

/// A successfully proxied upstream image.
#[derive(Debug)]
pub struct FetchedImage {
    pub content_type: String,
    pub body: Bytes,
}

/// Pass-through fetcher for one templated upstream URL.
pub struct RemoteImageProxy {
    http: Client,
    base: String,
}

impl RemoteImageProxy {
    pub fn new(base: String, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("vetrina/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http, base })
    }

    /// Fetch the remote image for a validated identifier.
    ///
    /// Identifiers that fail validation are rejected without touching
    /// the network.
    pub async fn fetch(&self, id: &str) -> Result<FetchedImage, RemoteImageError> {
        if !valid_id(id) {
            return Err(RemoteImageError::BadId);
        }

        let url = Url::parse(&format!("{}{id}", self.base))
            .map_err(|err| RemoteImageError::upstream(format!("invalid upstream URL: {err}")))?;

        let response = self.http.get(url).send().await.map_err(|err| {
            counter!(METRIC_UPSTREAM_ERRORS).increment(1);
            RemoteImageError::upstream(err.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            counter!(METRIC_UPSTREAM_ERRORS).increment(1);
            return Err(RemoteImageError::upstream(format!(
                "upstream returned status {status}"
            )));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();

        let body = response.bytes().await.map_err(|err| {
            counter!(METRIC_UPSTREAM_ERRORS).increment(1);
            RemoteImageError::upstream(format!("failed to read upstream body: {err}"))
        })?;

        Ok(FetchedImage { content_type, body })
    }
}

/// Word characters and hyphens only, with a minimum length.
fn valid_id(id: &str) -> bool {
    id.len() >= MIN_ID_LEN
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_formed_identifiers_pass() {
        assert!(valid_id("1AbcDEFghiJK_LMnop-42"));
        assert!(valid_id("abcdefgh"));
    }

    #[test]
    fn malformed_identifiers_are_rejected() {
        assert!(!valid_id("bad id!"));
        assert!(!valid_id("short"));
        assert!(!valid_id(""));
        assert!(!valid_id("../../etc/passwd"));
        assert!(!valid_id("abc;defgh"));
    }

    #[tokio::test]
    async fn bad_identifier_fails_without_a_network_call() {
        // The unroutable base guarantees a hang or error on any request;
        // rejection must happen before one is issued.
        let proxy = RemoteImageProxy::new(
            "http://192.0.2.1/img/".to_string(),
            Duration::from_secs(30),
        )
        .expect("proxy builds");

        let err = proxy.fetch("bad id!").await.expect_err("must fail");
        assert!(matches!(err, RemoteImageError::BadId));
    }
}
