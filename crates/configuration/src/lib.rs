use crate::error::ConfigError;
use std::path::Path;

// Declare the modules that make up this crate.
pub mod error;
pub mod logging;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use logging::init_tracing;
pub use settings::{BrokerSettings, ImportSettings, LoggingSettings, ServerSettings, Settings};

/// Environment variables override file values, e.g. `TRADEBOOK_SERVER__PORT=8080`.
const ENV_PREFIX: &str = "TRADEBOOK";

/// Loads the application configuration from an optional `config.toml` in the
/// working directory plus the environment.
pub fn load_config() -> Result<Settings, ConfigError> {
    build(config::File::with_name("config").required(false))
}

/// Loads the application configuration from an explicit file, which must exist.
pub fn load_config_from(path: &Path) -> Result<Settings, ConfigError> {
    build(config::File::from(path).required(true))
}

fn build<S>(file: S) -> Result<Settings, ConfigError>
where
    S: config::Source + Send + Sync + 'static,
{
    let builder = config::Config::builder()
        .add_source(file)
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    // Attempt to deserialize the entire configuration into our `Settings` struct
    let settings = builder.try_deserialize::<Settings>()?;
    settings.validate()?;

    Ok(settings)
}
