// =============================================================================
// Factorec - Configuration
// =============================================================================
//
// Author: arkSong (arksong2018@gmail.com)
// Version: 0.1.0
// License: Apache 2.0 / MIT
//
// Description:
//   Service configuration loaded with figment from an optional TOML file
//   merged with FACTOREC_-prefixed environment variables. Nested keys are
//   separated by a double underscore, e.g.
//   FACTOREC_ENGINE__TRAINER__MAX_COMPONENTS=4.
//
// =============================================================================

use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::Path,
};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use factorec_engine::EngineConfig;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "FACTOREC_";

/// Service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_address")]
    pub address: IpAddr,

    #[serde(default = "default_port")]
    pub port: u16,

    /// `tracing_subscriber::EnvFilter` directive
    #[serde(default = "default_log")]
    pub log: String,

    #[serde(default)]
    pub engine: EngineConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            address: default_address(),
            port: default_port(),
            log: default_log(),
            engine: EngineConfig::default(),
        }
    }
}

impl Config {
    /// Defaults, then the TOML file at `path` if given, then the environment
    pub fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    pub fn load(path: Option<&Path>) -> Result<Self, figment::Error> {
        Self::figment(path).extract()
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.address, self.port)
    }
}

fn default_address() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0))
}

fn default_port() -> u16 {
    5000
}

fn default_log() -> String {
    "info".to_string()
}
