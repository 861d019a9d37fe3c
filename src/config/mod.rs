use std::env;
use std::path::PathBuf;
use std::time::Duration;

use regex::Regex;
use rocket::figment::{
    providers::{Format, Toml},
    Figment, Profile,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Extract(#[from] rocket::figment::Error),

    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct AppConfig {
    pub port: u16,
    pub address: String,
    /// Root of the JP2 store; the pairtree lives in its `pairtree_root` subdirectory.
    pub jp2_data_dir: PathBuf,
    /// Ordered rewrite rules applied to remote referents.
    pub ingest_sources: Vec<String>,
    /// Skip the startup scan of `jp2_data_dir`.
    pub ignore_fscache: bool,
    pub image_pattern: String,
    /// Seconds a caller waits on somebody else's conversion.
    pub max_wait: u64,
    pub remote_cache_capacity: usize,
    pub remote_cache_ttl: u64,
    pub timeout: u64,
    pub user_agent: String,
    pub allowed_hosts: Option<Vec<String>>,
    pub fetch_proxy: Option<String>,
    /// External transcoder argv; `{input}` and `{output}` are substituted.
    pub transcoder: Option<Vec<String>>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            address: "127.0.0.1".to_string(),
            jp2_data_dir: PathBuf::new(),
            ingest_sources: Vec::new(),
            ignore_fscache: false,
            image_pattern: r"(?i)^.+\.jp2$".to_string(),
            max_wait: 300,
            remote_cache_capacity: 10_000,
            remote_cache_ttl: 7 * 24 * 60 * 60,
            timeout: 30,
            user_agent: concat!("image-resolver/", env!("CARGO_PKG_VERSION")).to_string(),
            allowed_hosts: None,
            fetch_proxy: None,
            transcoder: None,
        }
    }
}

impl AppConfig {
    pub fn from_figment(figment: &Figment) -> Result<Self, ConfigError> {
        let config = figment.extract::<AppConfig>()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jp2_data_dir.as_os_str().is_empty() {
            return Err(ConfigError::Missing("jp2_data_dir"));
        }

        if self.max_wait == 0 {
            return Err(ConfigError::Invalid {
                key: "max_wait",
                message: "must be at least one second".to_string(),
            });
        }

        if self.remote_cache_capacity == 0 {
            return Err(ConfigError::Invalid {
                key: "remote_cache_capacity",
                message: "must be greater than zero".to_string(),
            });
        }

        if let Some(argv) = &self.transcoder {
            if argv.first().map_or(true, |program| program.trim().is_empty()) {
                return Err(ConfigError::Invalid {
                    key: "transcoder",
                    message: "needs a program to run".to_string(),
                });
            }
        }

        self.name_filter()?;
        for pattern in &self.ingest_sources {
            compile_pattern(pattern)?;
        }

        Ok(())
    }

    pub fn name_filter(&self) -> Result<Regex, ConfigError> {
        compile_pattern(&self.image_pattern)
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_wait)
    }

    pub fn remote_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.remote_cache_ttl)
    }
}

pub(crate) fn compile_pattern(pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern).map_err(|source| ConfigError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}

/// Rocket defaults, then `App.toml`, then environment overrides, with the
/// profile picked from `APP_PROFILE`.
pub fn figment() -> Figment {
    let mut figment = Figment::from(rocket::Config::default())
        .merge(Toml::file("App.toml").nested());

    if let Ok(dir) = env::var("JP2_DATA_DIR") {
        figment = figment.merge(("jp2_data_dir", dir));
    }

    // Space separated, the order is the rule order
    if let Ok(sources) = env::var("INGEST_SOURCES") {
        figment = figment.merge(("ingest_sources", sources.split_whitespace().map(str::to_string).collect::<Vec<String>>()));
    }

    if let Ok(flag) = env::var("IGNORE_FSCACHE") {
        figment = figment.merge(("ignore_fscache", parse_flag(&flag)));
    }

    if let Ok(hosts) = env::var("ALLOWED_HOSTS") {
        figment = figment.merge(("allowed_hosts", hosts.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect::<Vec<String>>()));
    }

    if let Ok(proxy) = env::var("FETCH_PROXY") {
        figment = figment.merge(("fetch_proxy", proxy));
    }

    figment.select(Profile::from_env_or("APP_PROFILE", "default"))
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
