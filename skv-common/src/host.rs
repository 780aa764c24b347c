//! Host addresses and discovery configuration.
//!
//! Endpoints arrive either as `"host:port"` strings or as structured config
//! loaded through serde; both normalize into [`Host`].

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Port assumed when an address omits one or carries a non-numeric port.
pub const DEFAULT_PORT: u16 = 6379;

/// A resolved server endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Host {
    /// Hostname or IP literal.
    pub host: String,
    /// TCP port.
    pub port: u16,
}

impl Host {
    /// Builds a host from explicit parts.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Host {
            host: host.into(),
            port,
        }
    }

    /// Parses a `"host:port"` string.
    ///
    /// The port falls back to [`DEFAULT_PORT`] when omitted, non-numeric,
    /// or zero. Parsing never fails; an unusable hostname surfaces as a
    /// connect-time error instead.
    pub fn parse(value: &str) -> Host {
        match value.split_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse::<u16>()
                    .ok()
                    .filter(|&p| p != 0)
                    .unwrap_or(DEFAULT_PORT);
                Host::new(host, port)
            }
            None => Host::new(value, DEFAULT_PORT),
        }
    }
}

impl FromStr for Host {
    type Err = Infallible;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(Host::parse(value))
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Sentinel discovery configuration: a logical primary name plus the
/// sentinel endpoints that track it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentinelConfig {
    /// Logical name of the monitored primary.
    pub name: String,
    /// Sentinel endpoints to poll.
    pub hosts: Vec<Host>,
}

/// What a client should connect to: a fixed endpoint or a sentinel set.
#[derive(Debug, Clone)]
pub enum ConnectTarget {
    /// Fixed endpoint.
    Host(Host),
    /// Sentinel-driven primary discovery.
    Sentinel(SentinelConfig),
}

impl From<Host> for ConnectTarget {
    fn from(host: Host) -> Self {
        ConnectTarget::Host(host)
    }
}

impl From<SentinelConfig> for ConnectTarget {
    fn from(config: SentinelConfig) -> Self {
        ConnectTarget::Sentinel(config)
    }
}

impl From<&str> for ConnectTarget {
    fn from(value: &str) -> Self {
        ConnectTarget::Host(Host::parse(value))
    }
}
