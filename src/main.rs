use std::{process, sync::Arc};

use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;
use vetrina::{
    application::{
        catalog::{CatalogService, ProductSource},
        error::AppError,
        gallery::GalleryService,
        live::ChangeFeed,
    },
    config,
    infra::{
        error::InfraError,
        http::{self, AppState},
        remote_images::RemoteImageProxy,
        sheets::SheetsClient,
        telemetry, watch,
    },
};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (_cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    let state = build_application_state(&settings)?;

    // Keep the watcher registration alive for the life of the server.
    // A watcher that cannot start disables live updates but never takes
    // the catalog down with it.
    let _watcher = match watch::start(
        state.gallery.directory(),
        state.live.clone(),
        settings.images.debounce,
    ) {
        Ok(watcher) => Some(watcher),
        Err(err) => {
            warn!(
                target = "vetrina::watch",
                error = %err,
                "gallery watcher unavailable, live updates disabled"
            );
            None
        }
    };

    serve_http(&settings, state).await
}

fn build_application_state(settings: &config::Settings) -> Result<AppState, AppError> {
    std::fs::create_dir_all(&settings.images.directory)
        .map_err(|err| AppError::from(InfraError::Io(err)))?;

    let sheets = Arc::new(
        SheetsClient::new(&settings.catalog, settings.images.fetch_timeout).map_err(|err| {
            AppError::unexpected(format!("failed to build spreadsheet client: {err}"))
        })?,
    );
    let source: Arc<dyn ProductSource> = sheets.clone();
    let catalog = Arc::new(CatalogService::new(source, settings.catalog.ttl));
    let gallery = Arc::new(GalleryService::new(settings.images.directory.clone()));
    let proxy = Arc::new(
        RemoteImageProxy::new(
            settings.images.proxy_base.clone(),
            settings.images.fetch_timeout,
        )
        .map_err(|err| AppError::unexpected(format!("failed to build image proxy: {err}")))?,
    );
    let live = Arc::new(ChangeFeed::new());

    Ok(AppState {
        catalog,
        gallery,
        sheets,
        proxy,
        live,
    })
}

async fn serve_http(settings: &config::Settings, state: AppState) -> Result<(), AppError> {
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "vetrina::http",
        addr = %settings.server.addr,
        "listening"
    );

    axum::serve(listener, router.into_make_service())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    Ok(())
}
