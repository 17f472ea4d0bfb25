pub mod assets;
pub mod error;
pub mod http;
pub mod remote_images;
pub mod sheets;
pub mod telemetry;
pub mod watch;
