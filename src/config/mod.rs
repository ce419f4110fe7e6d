mod settings;

use config::{Config, ConfigError, Environment, File};

use settings::PartialSettings;

pub use settings::{BackendKind, BrokerSettings, LoggingSettings, ServerSettings, Settings};

/// Environment variables are read as `RELAY_<SECTION>__<KEY>`,
/// e.g. `RELAY_BROKER__BOOTSTRAP_SERVERS`.
pub const ENV_PREFIX: &str = "RELAY";

/// Loads the configuration from `config/default.*` (optional) and environment
/// variables, the latter taking precedence. Values found in neither fall back
/// to [`Settings::default`].
pub fn load_config() -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

    let config = builder.build()?;

    // Try to deserialize what is available
    let partial: PartialSettings = config.try_deserialize()?;

    Ok(Settings::merge(partial))
}
