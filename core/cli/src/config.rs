use std::path::{Path, PathBuf};
use std::{env, fs};

use anyhow::{Context, Result};
use car_block_reader::{GatewayConfig, ReaderConfig};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

use crate::utils::ensure_parent_exist;

lazy_static! {
    pub static ref CAR_READER_HOME_DIR: PathBuf = env::var("CAR_READER_HOME")
        .unwrap_or("~/.car-reader".to_string())
        .into();
}

/// The configuration file of the command line tool.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub reader: ReaderConfig,
    pub gateway: GatewayConfig,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).with_context(|| {
            format!(
                "IO: Could not load the configuration file '{}'.",
                path.to_string_lossy()
            )
        })?;
        toml::from_str(&content).with_context(|| {
            format!(
                "Could not parse the configuration file '{}' as toml.",
                path.to_string_lossy()
            )
        })
    }

    /// Load the configuration at `path`, writing the defaults there first if it does not exist.
    pub fn load_or_write<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            return Self::load(path);
        }
        let config = Self::default();
        config.write(path)?;
        Ok(config)
    }

    /// Load the configuration at `path`, or the defaults if there is none.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        ensure_parent_exist(path)?;
        fs::write(path, self.serialize_config()?).with_context(|| {
            format!(
                "Could not write the configuration file: {}",
                path.to_string_lossy()
            )
        })
    }

    pub fn serialize_config(&self) -> Result<String> {
        toml::to_string(self).context("Failed to serialize config")
    }
}
