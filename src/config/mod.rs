//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "vetrina";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_CATALOG_RANGE: &str = "A2:D";
const DEFAULT_CATALOG_TTL_MS: u64 = 60_000;
const DEFAULT_IMAGES_DIR: &str = "images";
const DEFAULT_PROXY_BASE: &str = "https://drive.google.com/uc?export=view&id=";
const DEFAULT_DEBOUNCE_MS: u64 = 250;
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;

/// Command-line arguments for the Vetrina binary.
#[derive(Debug, Parser)]
#[command(name = "vetrina", version, about = "Vetrina catalog server")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "VETRINA_CONFIG_FILE",
        value_name = "PATH",
        value_hint = ValueHint::FilePath
    )]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the Vetrina HTTP service.
    Serve(Box<ServeArgs>),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the catalog spreadsheet identifier.
    #[arg(long = "catalog-sheet-id", value_name = "ID")]
    pub catalog_sheet_id: Option<String>,

    /// Override the catalog row range selector.
    #[arg(long = "catalog-range", value_name = "RANGE")]
    pub catalog_range: Option<String>,

    /// Override the catalog cache freshness window in milliseconds.
    #[arg(long = "catalog-ttl-ms", value_name = "MILLIS")]
    pub catalog_ttl_ms: Option<u64>,

    /// Override the gallery image directory.
    #[arg(long = "images-directory", value_name = "PATH")]
    pub images_directory: Option<PathBuf>,

    /// Override the change-notification debounce window in milliseconds.
    #[arg(long = "images-debounce-ms", value_name = "MILLIS")]
    pub images_debounce_ms: Option<u64>,
}

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub catalog: CatalogSettings,
    pub images: ImagesSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct CatalogSettings {
    /// Spreadsheet identifier; absent means the catalog source is unconfigured.
    pub sheet_id: Option<String>,
    /// Row range selector within the source spreadsheet.
    pub range: String,
    /// Freshness window for the product cache.
    pub ttl: Duration,
    /// Base64-encoded service-account credentials JSON.
    pub credentials_base64: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ImagesSettings {
    pub directory: PathBuf,
    /// Upstream URL prefix; the validated image id is appended verbatim.
    pub proxy_base: String,
    /// Change-notification coalescing window. Zero disables coalescing
    /// and forwards one signal per raw filesystem event.
    pub debounce: Duration,
    /// Deadline applied to every outbound image and spreadsheet fetch.
    pub fetch_timeout: Duration,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("VETRINA").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    catalog: RawCatalogSettings,
    images: RawImagesSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(id) = overrides.catalog_sheet_id.as_ref() {
            self.catalog.sheet_id = Some(id.clone());
        }
        if let Some(range) = overrides.catalog_range.as_ref() {
            self.catalog.range = Some(range.clone());
        }
        if let Some(ttl) = overrides.catalog_ttl_ms {
            self.catalog.ttl_ms = Some(ttl);
        }
        if let Some(directory) = overrides.images_directory.as_ref() {
            self.images.directory = Some(directory.clone());
        }
        if let Some(window) = overrides.images_debounce_ms {
            self.images.debounce_ms = Some(window);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            catalog,
            images,
        } = raw;

        let server = build_server_settings(server)?;
        let logging = build_logging_settings(logging)?;
        let catalog = build_catalog_settings(catalog)?;
        let images = build_images_settings(images)?;

        Ok(Self {
            server,
            logging,
            catalog,
            images,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    Ok(ServerSettings { addr })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_catalog_settings(catalog: RawCatalogSettings) -> Result<CatalogSettings, LoadError> {
    let sheet_id = catalog.sheet_id.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    let range = catalog
        .range
        .unwrap_or_else(|| DEFAULT_CATALOG_RANGE.to_string());
    if range.trim().is_empty() {
        return Err(LoadError::invalid(
            "catalog.range",
            "range selector must not be empty",
        ));
    }

    let ttl_ms = catalog.ttl_ms.unwrap_or(DEFAULT_CATALOG_TTL_MS);
    if ttl_ms == 0 {
        return Err(LoadError::invalid(
            "catalog.ttl_ms",
            "must be greater than zero",
        ));
    }

    let credentials_base64 = catalog.credentials.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    Ok(CatalogSettings {
        sheet_id,
        range,
        ttl: Duration::from_millis(ttl_ms),
        credentials_base64,
    })
}

fn build_images_settings(images: RawImagesSettings) -> Result<ImagesSettings, LoadError> {
    let directory = images
        .directory
        .unwrap_or_else(|| PathBuf::from(DEFAULT_IMAGES_DIR));
    if directory.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "images.directory",
            "path must not be empty",
        ));
    }

    let proxy_base = images
        .proxy_base
        .unwrap_or_else(|| DEFAULT_PROXY_BASE.to_string());
    if proxy_base.trim().is_empty() {
        return Err(LoadError::invalid(
            "images.proxy_base",
            "upstream URL must not be empty",
        ));
    }

    let timeout_secs = images
        .fetch_timeout_seconds
        .unwrap_or(DEFAULT_FETCH_TIMEOUT_SECS);
    if timeout_secs == 0 {
        return Err(LoadError::invalid(
            "images.fetch_timeout_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ImagesSettings {
        directory,
        proxy_base,
        debounce: Duration::from_millis(images.debounce_ms.unwrap_or(DEFAULT_DEBOUNCE_MS)),
        fetch_timeout: Duration::from_secs(timeout_secs),
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCatalogSettings {
    sheet_id: Option<String>,
    range: Option<String>,
    ttl_ms: Option<u64>,
    credentials: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawImagesSettings {
    directory: Option<PathBuf>,
    proxy_base: Option<String>,
    debounce_ms: Option<u64>,
    fetch_timeout_seconds: Option<u64>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_resolve_without_any_source() {
        let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

        assert_eq!(settings.server.addr.port(), DEFAULT_PORT);
        assert_eq!(settings.catalog.range, DEFAULT_CATALOG_RANGE);
        assert_eq!(settings.catalog.ttl, Duration::from_millis(60_000));
        assert!(settings.catalog.sheet_id.is_none());
        assert_eq!(settings.images.directory, PathBuf::from(DEFAULT_IMAGES_DIR));
        assert_eq!(settings.images.debounce, Duration::from_millis(250));
    }

    #[test]
    fn cli_overrides_take_highest_precedence() {
        let mut raw = RawSettings::default();
        raw.server.port = Some(4000);
        raw.catalog.ttl_ms = Some(5_000);

        let overrides = ServeOverrides {
            server_port: Some(4321),
            catalog_ttl_ms: Some(90_000),
            log_level: Some("debug".to_string()),
            ..Default::default()
        };

        raw.apply_serve_overrides(&overrides);
        let settings = Settings::from_raw(raw).expect("valid settings");

        assert_eq!(settings.server.addr.port(), 4321);
        assert_eq!(settings.catalog.ttl, Duration::from_millis(90_000));
        assert_eq!(settings.logging.level, LevelFilter::DEBUG);
    }

    #[test]
    fn blank_sheet_id_is_treated_as_unset() {
        let mut raw = RawSettings::default();
        raw.catalog.sheet_id = Some("   ".to_string());

        let settings = Settings::from_raw(raw).expect("valid settings");
        assert!(settings.catalog.sheet_id.is_none());
    }

    #[test]
    fn zero_ttl_is_rejected() {
        let mut raw = RawSettings::default();
        raw.catalog.ttl_ms = Some(0);

        let err = Settings::from_raw(raw).expect_err("zero ttl must be rejected");
        assert!(matches!(
            err,
            LoadError::Invalid {
                key: "catalog.ttl_ms",
                ..
            }
        ));
    }

    #[test]
    fn zero_debounce_disables_coalescing() {
        let mut raw = RawSettings::default();
        raw.images.debounce_ms = Some(0);

        let settings = Settings::from_raw(raw).expect("valid settings");
        assert_eq!(settings.images.debounce, Duration::ZERO);
    }

    #[test]
    fn cli_json_logging_enforces_format() {
        let mut raw = RawSettings::default();
        let overrides = ServeOverrides {
            log_json: Some(true),
            ..Default::default()
        };

        raw.apply_serve_overrides(&overrides);
        let settings = Settings::from_raw(raw).expect("valid settings");

        assert!(matches!(settings.logging.format, LogFormat::Json));
    }

    #[test]
    fn default_to_serve_command() {
        let args = CliArgs::parse_from(["vetrina"]);
        assert!(args.command.is_none());
    }

    #[test]
    fn parse_serve_overrides() {
        let args = CliArgs::parse_from([
            "vetrina",
            "serve",
            "--server-host",
            "0.0.0.0",
            "--catalog-sheet-id",
            "1AbcDEFghiJKLmnoPQRstuVWxyz",
            "--images-directory",
            "/srv/gallery",
        ]);

        match args.command.expect("serve command") {
            Command::Serve(serve) => {
                assert_eq!(serve.overrides.server_host.as_deref(), Some("0.0.0.0"));
                assert_eq!(
                    serve.overrides.catalog_sheet_id.as_deref(),
                    Some("1AbcDEFghiJKLmnoPQRstuVWxyz")
                );
                assert_eq!(
                    serve.overrides.images_directory.as_deref(),
                    Some(std::path::Path::new("/srv/gallery"))
                );
            }
        }
    }
}
