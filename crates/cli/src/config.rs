//! Configuration management

use anyhow::{Context, Result, anyhow};
use common::LOG_LEVELS;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use types::{Direction, Endpoint, MAX_REPORT_SIZE};
use usb_session::{Selector, parse_hex_id};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub general: GeneralSettings,
    pub device: DeviceSettings,
    pub endpoints: EndpointSettings,
    /// Device listing filters
    #[serde(default)]
    pub list: ListSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneralSettings {
    pub log_level: String,
}

/// The device the `exchange` command talks to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSettings {
    /// Vendor ID as a `0x`-prefixed hex string
    pub vendor_id: String,
    /// Product ID as a `0x`-prefixed hex string
    pub product_id: String,
    #[serde(default)]
    pub interface_number: u8,
    /// Per-transfer timeout in milliseconds
    #[serde(default = "DeviceSettings::default_timeout_ms")]
    pub timeout_ms: u64,
    /// Detach a bound kernel driver before claiming, reattach on close
    #[serde(default = "DeviceSettings::default_detach")]
    pub detach_kernel_driver: bool,
}

impl DeviceSettings {
    fn default_timeout_ms() -> u64 {
        5000
    }

    fn default_detach() -> bool {
        true
    }

    pub fn vendor_id(&self) -> Result<u16> {
        parse_hex_id(&self.vendor_id, "VID").map_err(|e| anyhow!(e))
    }

    pub fn product_id(&self) -> Result<u16> {
        parse_hex_id(&self.product_id, "PID").map_err(|e| anyhow!(e))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointSettings {
    /// Interrupt IN endpoint address, e.g. "0x81"
    pub interrupt_in: String,
    /// Interrupt OUT endpoint address, e.g. "0x01"
    pub interrupt_out: String,
    /// Bytes per report (1-64)
    #[serde(default = "EndpointSettings::default_report_size")]
    pub report_size: usize,
}

impl EndpointSettings {
    fn default_report_size() -> usize {
        MAX_REPORT_SIZE
    }

    pub fn interrupt_in(&self) -> Result<Endpoint> {
        parse_endpoint(&self.interrupt_in, Direction::In)
    }

    pub fn interrupt_out(&self) -> Result<Endpoint> {
        parse_endpoint(&self.interrupt_out, Direction::Out)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListSettings {
    /// Device filters ("0xVID:0xPID", "0xVID:*", "*:*"); empty lists everything
    #[serde(default)]
    pub filters: Vec<String>,
}

impl ListSettings {
    pub fn selectors(&self) -> Result<Vec<Selector>> {
        parse_filters(&self.filters)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralSettings {
                log_level: "info".to_string(),
            },
            device: DeviceSettings {
                vendor_id: "0x04d8".to_string(),
                product_id: "0x003f".to_string(),
                interface_number: 0,
                timeout_ms: DeviceSettings::default_timeout_ms(),
                detach_kernel_driver: DeviceSettings::default_detach(),
            },
            endpoints: EndpointSettings {
                interrupt_in: "0x81".to_string(),
                interrupt_out: "0x01".to_string(),
                report_size: EndpointSettings::default_report_size(),
            },
            list: ListSettings::default(),
        }
    }
}

impl Config {
    /// Load configuration from the specified path, or the first standard
    /// location that exists
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = if let Some(p) = path {
            PathBuf::from(shellexpand::tilde(&p.to_string_lossy()).as_ref())
        } else {
            Self::search_paths()
                .into_iter()
                .find(|p| p.exists())
                .ok_or_else(|| anyhow!("No configuration file found"))?
        };

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

        config.validate()?;

        tracing::info!("Loaded configuration from: {}", config_path.display());
        Ok(config)
    }

    /// Load the first standard configuration file, or defaults if there is none
    ///
    /// A file that exists but fails to parse or validate is an error, never a
    /// silent fallback to the built-in device.
    pub fn load_or_default() -> Result<Self> {
        Self::load_first_or_default(&Self::search_paths())
    }

    fn load_first_or_default(candidates: &[PathBuf]) -> Result<Self> {
        match candidates.iter().find(|p| p.exists()) {
            Some(path) => Self::load(Some(path.clone())),
            None => {
                tracing::debug!("No configuration file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Standard locations, in lookup order
    fn search_paths() -> Vec<PathBuf> {
        vec![
            Self::default_path(),
            PathBuf::from("/etc/usb-session/config.toml"),
        ]
    }

    /// Save configuration to the specified path
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::info!("Saved configuration to: {}", path.display());
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("usb-session").join("config.toml")
        } else {
            PathBuf::from(".config/usb-session/config.toml")
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !LOG_LEVELS.contains(&self.general.log_level.as_str()) {
            return Err(anyhow!(
                "Invalid log level '{}', must be one of: {}",
                self.general.log_level,
                LOG_LEVELS.join(", ")
            ));
        }

        self.device.vendor_id()?;
        self.device.product_id()?;
        if self.device.timeout_ms == 0 {
            return Err(anyhow!("timeout_ms must be greater than 0"));
        }

        self.endpoints.interrupt_in()?;
        self.endpoints.interrupt_out()?;
        if !(1..=MAX_REPORT_SIZE).contains(&self.endpoints.report_size) {
            return Err(anyhow!(
                "Invalid report_size {}, must be 1-{}",
                self.endpoints.report_size,
                MAX_REPORT_SIZE
            ));
        }

        self.list.selectors()?;

        Ok(())
    }
}

/// Parse filter strings into selectors, naming the first bad one
pub fn parse_filters(filters: &[String]) -> Result<Vec<Selector>> {
    filters
        .iter()
        .map(|f| f.parse::<Selector>().map_err(|e| anyhow!(e)))
        .collect()
}

/// Parse a `0x`-prefixed endpoint address and check its direction bit
pub fn parse_endpoint(value: &str, expected: Direction) -> Result<Endpoint> {
    let address = parse_hex_id(value, "endpoint").map_err(|e| anyhow!(e))?;
    let address = u8::try_from(address)
        .map_err(|_| anyhow!("Invalid endpoint '{}', address must fit in one byte", value))?;

    let endpoint = Endpoint::new(address);
    if endpoint.direction() != expected {
        return Err(anyhow!(
            "Invalid endpoint '{}', expected an {:?} endpoint",
            value,
            expected
        ));
    }
    Ok(endpoint)
}
