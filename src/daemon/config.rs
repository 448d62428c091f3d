use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::{env, fmt, fs};

use clap::Parser;
use log::{LevelFilter, error, info};
use serde::de;
use serde::{Deserialize, Deserializer};

use crate::commons::ext_serde;
use crate::constants::*;
use crate::storage::StorageType;

//------------ Options -------------------------------------------------------

/// The command line options of the daemon.
#[derive(Clone, Debug, Parser)]
#[command(
    name = EPHCA_SERVER_APP,
    version = EPHCA_VERSION,
    about = "Issues and validates X.509 certificates for short-lived CAs"
)]
pub struct Options {
    /// Path to the config file. Built-in defaults are used if omitted.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

//------------ ConfigDefaults ------------------------------------------------

pub struct ConfigDefaults;

impl ConfigDefaults {
    fn ip() -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
    }
    fn port() -> u16 {
        3000
    }
    fn data_dir() -> PathBuf {
        PathBuf::from(DEFAULT_DATA_DIR)
    }
    fn log_level() -> LevelFilter {
        match env::var(EPHCA_ENV_LOG_LEVEL) {
            Ok(level) => match LevelFilter::from_str(&level) {
                Ok(level) => level,
                Err(_) => {
                    eprintln!(
                        "Unrecognized value for log level in env var {}, using 'info'",
                        EPHCA_ENV_LOG_LEVEL
                    );
                    LevelFilter::Info
                }
            },
            _ => LevelFilter::Info,
        }
    }
    fn log_type() -> LogType {
        LogType::Stderr
    }
    fn post_limit_api() -> u64 {
        HTTP_POST_LIMIT_API
    }
}

//------------ Config --------------------------------------------------------

/// Global configuration for the daemon.
#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    #[serde(default = "ConfigDefaults::ip")]
    pub ip: IpAddr,

    #[serde(default = "ConfigDefaults::port")]
    pub port: u16,

    #[serde(default)]
    pub storage_type: StorageType,

    #[serde(default = "ConfigDefaults::data_dir")]
    pub data_dir: PathBuf,

    /// The key clients must present in the X-API-Key header.
    #[serde(default)]
    pub api_key: String,

    #[serde(
        default = "ConfigDefaults::log_level",
        deserialize_with = "ext_serde::de_level_filter"
    )]
    pub log_level: LevelFilter,

    #[serde(default = "ConfigDefaults::log_type")]
    pub log_type: LogType,

    #[serde(default)]
    pub log_file: Option<PathBuf>,

    #[serde(default = "ConfigDefaults::post_limit_api")]
    pub post_limit_api: u64,
}

/// # Accessors
impl Config {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.port)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

/// # Create
impl Config {
    /// Creates a configuration for testing.
    pub fn test(data_dir: &Path, storage_type: StorageType, port: u16, api_key: &str) -> Self {
        Config {
            ip: ConfigDefaults::ip(),
            port,
            storage_type,
            data_dir: data_dir.to_path_buf(),
            api_key: api_key.to_string(),
            log_level: LevelFilter::Debug,
            log_type: LogType::Stderr,
            log_file: None,
            post_limit_api: ConfigDefaults::post_limit_api(),
        }
    }

    /// Creates the config at start up and initializes logging.
    ///
    /// The file named in the options is read if there is one. The API key
    /// from the environment takes precedence over the one in the file.
    pub fn create(options: &Options) -> Result<Self, ConfigError> {
        let config = match &options.config {
            Some(file) => Self::read_config(file).map_err(|e| {
                ConfigError::Other(format!(
                    "Error parsing config file: {}, error: {}",
                    file.display(),
                    e
                ))
            })?,
            None => Self::from_toml("")?,
        };
        let config = config.with_api_key_override(env::var(EPHCA_ENV_API_KEY).ok());

        config.init_logging()?;
        match &options.config {
            Some(file) => info!("{} uses configuration file: {}", EPHCA_SERVER_APP, file.display()),
            None => info!("{} uses default configuration", EPHCA_SERVER_APP),
        }

        config.verify()?;
        Ok(config)
    }

    pub fn read_config(file: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(file)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(ConfigError::TomlError)
    }

    /// Replaces the API key if an override is given.
    pub fn with_api_key_override(mut self, api_key: Option<String>) -> Self {
        if let Some(api_key) = api_key {
            self.api_key = api_key;
        }
        self
    }

    pub fn verify(&self) -> Result<(), ConfigError> {
        if self.api_key.is_empty() {
            return Err(ConfigError::Other(format!(
                "You MUST provide a value for the API key, either by setting \"api_key\" in the config file, or by setting the {} environment variable.",
                EPHCA_ENV_API_KEY
            )));
        }

        if self.port == 0 {
            return Err(ConfigError::other("Port number must not be 0"));
        }

        if self.log_type == LogType::File && self.log_file.is_none() {
            return Err(ConfigError::other(
                "log_file must be set when log_type is \"file\"",
            ));
        }

        if self.post_limit_api == 0 {
            return Err(ConfigError::other("post_limit_api must be bigger than 0"));
        }

        Ok(())
    }
}

/// # Logging
impl Config {
    pub fn init_logging(&self) -> Result<(), ConfigError> {
        match self.log_type {
            LogType::File => match &self.log_file {
                Some(path) => self.file_logger(path),
                None => Err(ConfigError::other("No log_file configured")),
            },
            LogType::Stderr => self.stderr_logger(),
        }
    }

    /// Creates a stderr logger.
    fn stderr_logger(&self) -> Result<(), ConfigError> {
        self.fern_logger()
            .chain(io::stderr())
            .apply()
            .map_err(|e| ConfigError::Other(format!("Failed to init stderr logging: {}", e)))
    }

    /// Creates a file logger using the file provided by `path`.
    fn file_logger(&self, path: &Path) -> Result<(), ConfigError> {
        let file = match fern::log_file(path) {
            Ok(file) => file,
            Err(err) => {
                let error_string = format!("Failed to open log file '{}': {}", path.display(), err);
                error!("{}", error_string.as_str());
                return Err(ConfigError::Other(error_string));
            }
        };
        self.fern_logger()
            .chain(file)
            .apply()
            .map_err(|e| ConfigError::Other(format!("Failed to init file logging: {}", e)))
    }

    /// Creates and returns a fern logger with log level tweaks
    fn fern_logger(&self) -> fern::Dispatch {
        // suppress overly noisy logging
        let framework_level = self.log_level.min(LevelFilter::Warn);
        let ephca_framework_level = self.log_level.min(LevelFilter::Debug);

        let show_target = self.log_level == LevelFilter::Trace || self.log_level == LevelFilter::Debug;
        fern::Dispatch::new()
            .format(move |out, message, record| {
                if show_target {
                    out.finish(format_args!(
                        "{} [{}] [{}] {}",
                        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                        record.level(),
                        record.target(),
                        message
                    ))
                } else {
                    out.finish(format_args!(
                        "{} [{}] {}",
                        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                        record.level(),
                        message
                    ))
                }
            })
            .level(self.log_level)
            .level_for("hyper", framework_level)
            .level_for("hyper_util", framework_level)
            .level_for("mio", framework_level)
            .level_for("reqwest", framework_level)
            .level_for("tokio", framework_level)
            .level_for("want", framework_level)
            .level_for("h2", framework_level)
            .level_for("ephca::commons::file", ephca_framework_level)
    }
}

//------------ ConfigError ---------------------------------------------------

#[derive(Debug)]
pub enum ConfigError {
    IoError(io::Error),
    TomlError(toml::de::Error),
    Other(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConfigError::IoError(e) => e.fmt(f),
            ConfigError::TomlError(e) => e.fmt(f),
            ConfigError::Other(s) => s.fmt(f),
        }
    }
}

impl std::error::Error for ConfigError {}

impl ConfigError {
    pub fn other(s: &str) -> ConfigError {
        ConfigError::Other(s.to_string())
    }
}

impl From<io::Error> for ConfigError {
    fn from(e: io::Error) -> Self {
        ConfigError::IoError(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::TomlError(e)
    }
}

//------------ LogType -------------------------------------------------------

/// The target to log to.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum LogType {
    Stderr,
    File,
}

impl<'de> Deserialize<'de> for LogType {
    fn deserialize<D>(d: D) -> Result<LogType, D::Error>
    where
        D: Deserializer<'de>,
    {
        let string = String::deserialize(d)?;
        match string.as_str() {
            "stderr" => Ok(LogType::Stderr),
            "file" => Ok(LogType::File),
            _ => Err(de::Error::custom(format!(
                "expected \"stderr\" or \"file\", found : \"{}\"",
                string
            ))),
        }
    }
}

//------------ Tests ---------------------------------------------------------
