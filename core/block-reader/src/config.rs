use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

/// The allocation cap for a single block envelope.
pub const MAX_BLOCK_SIZE: usize = 4 * 1024 * 1024;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ReaderConfig {
    /// Largest block envelope accepted before the stream fails.
    pub max_block_size: usize,
    /// How many blocks may be verified at the same time.
    pub verify_concurrency: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            max_block_size: MAX_BLOCK_SIZE,
            verify_concurrency: 4,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct GatewayConfig {
    pub gateways: Vec<Gateway>,
    #[serde(with = "humantime_serde")]
    pub gateway_timeout: Duration,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Http,
    Https,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Gateway {
    pub protocol: Protocol,
    pub authority: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            gateways: vec![
                Gateway::https("fleek.ipfs.io"),
                Gateway::https("ipfs.io"),
                Gateway::https("ipfs.runfission.com"),
            ],
            gateway_timeout: Duration::from_millis(5000),
        }
    }
}

impl Protocol {
    pub fn as_str(&self) -> &str {
        match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
        }
    }
}

impl Gateway {
    pub fn new(protocol: Protocol, authority: impl Into<String>) -> Self {
        Self {
            protocol,
            authority: authority.into(),
        }
    }

    pub fn https(authority: impl Into<String>) -> Self {
        Self::new(Protocol::Https, authority)
    }

    pub fn base_url(&self) -> Result<Url, url::ParseError> {
        Url::parse(&format!("{}://{}/", self.protocol.as_str(), self.authority))
    }
}
