use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::flows::StatusPolicy;
use crate::lifecycle::LifecycleSettings;
use crate::tokens::{DEFAULT_TOKEN_BYTES, MIN_TOKEN_BYTES};

const MAX_TOKEN_BYTES: usize = 64;
const CONFIG_FILES: [&str; 2] = ["lynco.toml", "config/lynco.toml"];

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub quotes: QuotesConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    /// Origin prepended to the access URLs handed out on quote creation.
    pub public_base_url: Option<String>,
    /// Show store and configuration failure details in 500 responses.
    pub expose_error_details: bool,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct QuotesConfig {
    pub strict_status_transitions: bool,
    pub token_bytes: usize,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub log_level: Option<String>,
    pub strict_status_transitions: Option<bool>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://lynco.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                public_base_url: None,
                expose_error_details: false,
                graceful_shutdown_secs: 15,
            },
            quotes: QuotesConfig {
                strict_status_transitions: false,
                token_bytes: DEFAULT_TOKEN_BYTES,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    /// Layers defaults, the TOML file, `LYNCO_*` variables and `options.overrides`,
    /// in that order, then validates the result.
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        match locate_file(options.config_path.as_deref()) {
            Some(path) => config.merge(read_patch(&path)?),
            None if options.require_file => {
                let expected = options.config_path.unwrap_or_else(|| PathBuf::from(CONFIG_FILES[0]));
                return Err(ConfigError::MissingConfigFile(expected));
            }
            None => {}
        }

        config.merge(ConfigPatch::from_env()?);
        config.merge(options.overrides.into_patch());
        config.validate()?;

        Ok(config)
    }

    /// Lifecycle knobs derived from the `quotes` and `server` sections.
    pub fn lifecycle_settings(&self) -> LifecycleSettings {
        LifecycleSettings {
            policy: StatusPolicy::from_strict_flag(self.quotes.strict_status_transitions),
            token_bytes: self.quotes.token_bytes,
            public_base_url: self.server.public_base_url.clone(),
        }
    }

    fn merge(&mut self, patch: ConfigPatch) {
        let ConfigPatch { database, server, quotes, logging } = patch;

        if let Some(database) = database {
            assign(&mut self.database.url, database.url);
            assign(&mut self.database.max_connections, database.max_connections);
            assign(&mut self.database.timeout_secs, database.timeout_secs);
        }
        if let Some(server) = server {
            assign(&mut self.server.bind_address, server.bind_address);
            assign(&mut self.server.port, server.port);
            if server.public_base_url.is_some() {
                self.server.public_base_url = server.public_base_url;
            }
            assign(&mut self.server.expose_error_details, server.expose_error_details);
            assign(&mut self.server.graceful_shutdown_secs, server.graceful_shutdown_secs);
        }
        if let Some(quotes) = quotes {
            assign(&mut self.quotes.strict_status_transitions, quotes.strict_status_transitions);
            assign(&mut self.quotes.token_bytes, quotes.token_bytes);
        }
        if let Some(logging) = logging {
            assign(&mut self.logging.level, logging.level);
            assign(&mut self.logging.format, logging.format);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_server(&self.server)?;
        validate_quotes(&self.quotes)?;
        validate_logging(&self.logging)
    }
}

impl ConfigOverrides {
    fn into_patch(self) -> ConfigPatch {
        ConfigPatch {
            database: Some(DatabasePatch { url: self.database_url, ..DatabasePatch::default() }),
            server: Some(ServerPatch {
                bind_address: self.bind_address,
                port: self.port,
                ..ServerPatch::default()
            }),
            quotes: Some(QuotesPatch {
                strict_status_transitions: self.strict_status_transitions,
                ..QuotesPatch::default()
            }),
            logging: Some(LoggingPatch { level: self.log_level, format: None }),
        }
    }
}

impl ConfigPatch {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            database: Some(DatabasePatch {
                url: env_value("LYNCO_DATABASE_URL")?,
                max_connections: env_value("LYNCO_DATABASE_MAX_CONNECTIONS")?,
                timeout_secs: env_value("LYNCO_DATABASE_TIMEOUT_SECS")?,
            }),
            server: Some(ServerPatch {
                bind_address: env_value("LYNCO_SERVER_BIND_ADDRESS")?,
                port: env_value("LYNCO_SERVER_PORT")?,
                public_base_url: env_value("LYNCO_SERVER_PUBLIC_BASE_URL")?,
                expose_error_details: env_value("LYNCO_SERVER_EXPOSE_ERROR_DETAILS")?,
                graceful_shutdown_secs: env_value("LYNCO_SERVER_GRACEFUL_SHUTDOWN_SECS")?,
            }),
            quotes: Some(QuotesPatch {
                strict_status_transitions: env_value("LYNCO_QUOTES_STRICT_STATUS_TRANSITIONS")?,
                token_bytes: env_value("LYNCO_QUOTES_TOKEN_BYTES")?,
            }),
            logging: Some(LoggingPatch {
                level: first_env_value(&["LYNCO_LOGGING_LEVEL", "LYNCO_LOG_LEVEL"])?,
                format: first_env_value(&["LYNCO_LOGGING_FORMAT", "LYNCO_LOG_FORMAT"])?,
            }),
        })
    }
}

fn assign<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

/// Reads and parses `key`; unset or blank variables are `None`.
fn env_value<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    let Some(raw) = env::var(key).ok().filter(|value| !value.trim().is_empty()) else {
        return Ok(None);
    };
    raw.trim().parse::<T>().map(Some).map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: raw,
    })
}

fn first_env_value<T: FromStr>(keys: &[&str]) -> Result<Option<T>, ConfigError> {
    for key in keys {
        if let Some(value) = env_value(key)? {
            return Ok(Some(value));
        }
    }
    Ok(None)
}

fn locate_file(explicit_path: Option<&Path>) -> Option<PathBuf> {
    match explicit_path {
        Some(path) => path.is_file().then(|| path.to_path_buf()),
        None => CONFIG_FILES.iter().map(PathBuf::from).find(|path| path.is_file()),
    }
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    toml::from_str(&expand_env_refs(&raw)?)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

/// Replaces every `${NAME}` with the value of the environment variable `NAME`.
fn expand_env_refs(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after.find('}').ok_or(ConfigError::UnterminatedInterpolation)?;
        let name = &after[..end];
        let value = env::var(name)
            .map_err(|_| ConfigError::MissingEnvInterpolation { var: name.to_string() })?;
        output.push_str(&value);
        rest = &after[end + 1..];
    }
    output.push_str(rest);

    Ok(output)
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Validation(message.into())
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    if !(url.starts_with("sqlite:") || url == ":memory:") {
        return Err(invalid(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::memory:`, or `:memory:`)",
        ));
    }
    if database.max_connections == 0 {
        return Err(invalid("database.max_connections must be greater than zero"));
    }
    if !(1..=300).contains(&database.timeout_secs) {
        return Err(invalid("database.timeout_secs must be in range 1..=300"));
    }
    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(invalid("server.port must be greater than zero"));
    }
    if server.graceful_shutdown_secs == 0 {
        return Err(invalid("server.graceful_shutdown_secs must be greater than zero"));
    }
    match server.public_base_url.as_deref() {
        Some(url) if !(url.starts_with("http://") || url.starts_with("https://")) => {
            Err(invalid("server.public_base_url must start with http:// or https://"))
        }
        _ => Ok(()),
    }
}

fn validate_quotes(quotes: &QuotesConfig) -> Result<(), ConfigError> {
    if (MIN_TOKEN_BYTES..=MAX_TOKEN_BYTES).contains(&quotes.token_bytes) {
        Ok(())
    } else {
        Err(invalid(format!(
            "quotes.token_bytes must be in range {MIN_TOKEN_BYTES}..={MAX_TOKEN_BYTES}"
        )))
    }
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
    if LEVELS.contains(&logging.level.trim().to_ascii_lowercase().as_str()) {
        Ok(())
    } else {
        Err(invalid("logging.level must be one of trace|debug|info|warn|error"))
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    server: Option<ServerPatch>,
    quotes: Option<QuotesPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    public_base_url: Option<String>,
    expose_error_details: Option<bool>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct QuotesPatch {
    strict_status_transitions: Option<bool>,
    token_bytes: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
