//! Configuration for the Mirra runtime.
//!
//! Layered loading with figment (defaults, files, `MIRRA_*` environment
//! variables) plus validation of the resulting [`MirraConfig`].

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    ApiConfig, DisplayConfig, LogFormat, LogLevel, LogOutput, LoggingConfig, MirraConfig,
    PluginsConfig, ResourcesConfig,
};
pub use validation::validate_config;
