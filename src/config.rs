//! Server configuration.
//!
//! Read from the process environment (a `.env` file is honoured). Tests build
//! a [`Config`] from a plain map with [`Config::from_vars`].

use std::{collections::HashMap, env, io, net::SocketAddr, path::PathBuf};

use thiserror::Error;
use tokio::net::lookup_host;

pub const DEFAULT_PORT: u16 = 3001;
pub const DEFAULT_BIND_HOST: &str = "0.0.0.0";
pub const DEFAULT_ROOM_ID_LENGTH: usize = 6;

/// Bounds on generated room id length. Short ids exhaust the id space.
pub const MIN_ROOM_ID_LENGTH: usize = 4;
pub const MAX_ROOM_ID_LENGTH: usize = 64;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
    #[error("cannot resolve BIND_HOST {host}: {source}")]
    Unresolvable {
        host: String,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_host: String,
    pub port: u16,
    /// Directory holding the built web client, served for unmatched GET paths.
    pub static_dir: Option<PathBuf>,
    pub room_id_length: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        // a missing .env file is fine
        let _ = dotenv::dotenv();
        Self::from_vars(&env::vars().collect())
    }

    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let bind_host = vars
            .get("BIND_HOST")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_HOST.to_owned());

        let port = match vars.get("PORT") {
            Some(value) => value.parse().map_err(|_| ConfigError::InvalidValue {
                name: "PORT",
                value: value.clone(),
            })?,
            None => DEFAULT_PORT,
        };

        let static_dir = vars
            .get("STATIC_DIR")
            .filter(|dir| !dir.is_empty())
            .map(PathBuf::from);

        let room_id_length = match vars.get("ROOM_ID_LENGTH") {
            Some(value) => value
                .parse::<usize>()
                .ok()
                .filter(|len| (MIN_ROOM_ID_LENGTH..=MAX_ROOM_ID_LENGTH).contains(len))
                .ok_or_else(|| ConfigError::InvalidValue {
                    name: "ROOM_ID_LENGTH",
                    value: value.clone(),
                })?,
            None => DEFAULT_ROOM_ID_LENGTH,
        };

        Ok(Self {
            bind_host,
            port,
            static_dir,
            room_id_length,
        })
    }

    /// Resolves `BIND_HOST` and `PORT`. Accepts IPv4 and IPv6 literals as well
    /// as host names such as `localhost`.
    pub async fn bind_address(&self) -> Result<SocketAddr, ConfigError> {
        let unresolvable = |source: io::Error| ConfigError::Unresolvable {
            host: self.bind_host.clone(),
            source,
        };
        lookup_host((self.bind_host.as_str(), self.port))
            .await
            .map_err(unresolvable)?
            .next()
            .ok_or_else(|| unresolvable(io::Error::new(io::ErrorKind::NotFound, "no addresses")))
    }
}
