//! Process runtime shared by the server binary: layered configuration,
//! logging initialisation, home directory resolution and shutdown signals.

pub mod config;
pub mod logging;
pub mod paths;
pub mod shutdown;

pub use config::{AppConfig, CliArgs, LoggingConfig, Section, ServerConfig};
pub use logging::init_logging_from_config;
pub use shutdown::{cancel_on_shutdown, wait_for_shutdown};
