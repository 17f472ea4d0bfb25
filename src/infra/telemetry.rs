use std::sync::Once;

use metrics::{Unit, describe_counter};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "vetrina_catalog_cache_hit_total",
            Unit::Count,
            "Total number of product requests served from the fresh cache."
        );
        describe_counter!(
            "vetrina_catalog_cache_miss_total",
            Unit::Count,
            "Total number of product requests that found the cache stale."
        );
        describe_counter!(
            "vetrina_catalog_refresh_total",
            Unit::Count,
            "Total number of upstream catalog refresh attempts."
        );
        describe_counter!(
            "vetrina_catalog_refresh_failed_total",
            Unit::Count,
            "Total number of failed catalog refresh attempts."
        );
        describe_counter!(
            "vetrina_live_signals_total",
            Unit::Count,
            "Total number of change signals broadcast to subscribers."
        );
        describe_counter!(
            "vetrina_watch_events_total",
            Unit::Count,
            "Total number of raw filesystem events accepted from the watcher."
        );
        describe_counter!(
            "vetrina_proxy_upstream_errors_total",
            Unit::Count,
            "Total number of failed remote image fetches."
        );
    });
}
