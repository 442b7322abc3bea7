//! Configuration file support
//!
//! A TOML file supplies line defaults and the board pin map:
//!
//! ```toml
//! port = "ttyS1"
//! prefix = "tty"
//!
//! [line]
//! frequency = 115200
//! bits = 8
//! parity = "none"
//! stop_bits = "one"
//! flow = "rtscts"
//!
//! [pins]
//! UART1_RX = 15
//! UART1_TX = 14
//! ```

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::frequency::Frequency;
use crate::line::{Flow, Parity, StopBits};
use crate::pins::PinMap;

/// File looked up when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "uartctl.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Default line settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineSettings {
    /// Clock in Hz
    pub frequency: Frequency,
    pub bits: u8,
    pub stop_bits: StopBits,
    pub parity: Parity,
    pub flow: Flow,
}

impl Default for LineSettings {
    fn default() -> Self {
        Self {
            frequency: Frequency::from_hz(115_200),
            bits: 8,
            stop_bits: StopBits::One,
            parity: Parity::None,
            flow: Flow::None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Device used when a command names none
    pub port: Option<String>,
    /// Enumeration prefix
    pub prefix: String,
    pub line: LineSettings,
    /// Pin name to GPIO number
    pub pins: HashMap<String, u32>,
}

impl Config {
    /// Load from an explicit path
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load `path` if given, else the default file if it exists, else defaults
    pub fn discover(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.exists() {
                    Self::load(default)
                } else {
                    log::debug!("no {}, using defaults", DEFAULT_CONFIG_FILE);
                    Ok(Self::default())
                }
            }
        }
    }

    /// Pin registry built from the `[pins]` table
    pub fn pin_map(&self) -> PinMap {
        self.pins.iter().map(|(name, &n)| (name.as_str(), n)).collect()
    }
}
