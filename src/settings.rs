//! Runtime settings, read with the `config` crate.
//!
//! Sources are layered: built-in defaults, then an optional TOML file
//! (`tweeter.toml`, or whatever `TWEETER_CONFIG` names), then environment
//! variables such as `TWEETER__SERVER__BIND=0.0.0.0:9000`.

use std::net::SocketAddr;
use std::path::PathBuf;

use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;

use crate::error::{Result, TweeterError};
use crate::persist::PersistenceMode;
use crate::search::DEFAULT_SEARCH_BUFFER;

pub const DEFAULT_CONFIG_FILE: &str = "tweeter";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// tracing filter directive, used when `RUST_LOG` is not set
    pub log: String,
    /// run the interactive shell on stdin/stdout
    pub shell: bool,
    pub persistence: PersistenceSettings,
    pub server: ServerSettings,
    pub search: SearchSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceSettings {
    pub mode: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub enabled: bool,
    pub bind: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchSettings {
    pub buffer: usize,
}

impl Settings {
    pub fn load() -> Result<Self> {
        let file = std::env::var("TWEETER_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        let config = Self::defaults()?
            .add_source(File::with_name(&file).required(false))
            .add_source(Environment::with_prefix("TWEETER").prefix_separator("__").separator("__"))
            .build()?;
        Ok(config.try_deserialize()?)
    }
    /// Defaults overlaid with a TOML document, without touching the
    /// filesystem or the environment.
    pub fn from_toml(toml: &str) -> Result<Self> {
        let config = Self::defaults()?
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?;
        Ok(config.try_deserialize()?)
    }
    fn defaults() -> Result<config::builder::ConfigBuilder<config::builder::DefaultState>> {
        Ok(Config::builder()
            .set_default("log", "info")?
            .set_default("shell", true)?
            .set_default("persistence.mode", "memory")?
            .set_default("persistence.path", "tweets.log")?
            .set_default("server.enabled", true)?
            .set_default("server.bind", "127.0.0.1:8080")?
            .set_default("search.buffer", DEFAULT_SEARCH_BUFFER as u64)?)
    }
    pub fn persistence_mode(&self) -> Result<PersistenceMode> {
        let path = self.persistence.path.clone();
        match self.persistence.mode.to_lowercase().as_str() {
            "memory" | "inmemory" => Ok(PersistenceMode::InMemory),
            "file" => Ok(PersistenceMode::File(path)),
            "sqlite" => Ok(PersistenceMode::Sqlite(path)),
            other => Err(TweeterError::Config(format!(
                "unknown persistence mode '{other}', expected memory, file or sqlite"
            ))),
        }
    }
    pub fn bind_address(&self) -> Result<SocketAddr> {
        self.server
            .bind
            .parse()
            .map_err(|e| TweeterError::Config(format!("invalid server.bind '{}': {e}", self.server.bind)))
    }
}
