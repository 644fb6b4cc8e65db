mod settings;

use config::{Config, ConfigError, Environment, File};

use settings::PartialSettings;

pub use settings::{BrokerSettings, LogSettings, ServerSettings, Settings, StorageSettings};

/// Loads `config/default.*` (if present) and `ROOMCAST_*` environment
/// variables, merged over the built-in defaults.
pub fn load_config() -> Result<Settings, ConfigError> {
    load_config_from("config/default")
}

/// Same as [`load_config`] with an explicit file stem, e.g. `config/prod`.
///
/// Nested keys use `__` in the environment: `ROOMCAST_SERVER__PORT=9000`,
/// `ROOMCAST_BROKER__QUEUE_CAPACITY=64`.
pub fn load_config_from(file: &str) -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name(file).required(false))
        .add_source(
            Environment::with_prefix("ROOMCAST")
                .prefix_separator("_")
                .separator("__"),
        );

    let config = builder.build()?;

    // Try to deserialize what is available
    let partial: PartialSettings = config.try_deserialize()?;

    Ok(partial.merge_defaults())
}
