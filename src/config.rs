//! Bench configuration.
//!
//! Everything is read from one TOML file. Every field has a default matching the
//! bench as it is wired on the production line, so an empty file (or no file at
//! all) gives a working setup.

use std::path::{Path, PathBuf};

use fugit::MillisDurationU32;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::modules::ModuleKind;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    pub serial: SerialConfig,
    pub devices: DeviceConfig,
    pub retries: RetryConfig,
    pub timing: TimingConfig,
    pub limits: Limits,
    pub wifi: WifiConfig,
    pub gpio: GpioConfig,
    pub spi: SpiConfig,
    pub report: ReportConfig,
    /// Modules run on every board, in order. Also decides the log columns.
    pub modules: Modules,
}

impl HarnessConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: HarnessConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.modules.0.is_empty() {
            return Err(ConfigError::Invalid("no test modules configured".into()));
        }
        if self.report.serial_length == 0 {
            return Err(ConfigError::Invalid("serial_length must be at least 1".into()));
        }
        if self.serial.baud_rate == 0 {
            return Err(ConfigError::Invalid("baud_rate must be non-zero".into()));
        }
        if self.devices.main_address == self.devices.node_address {
            return Err(ConfigError::Invalid(format!(
                "main board and passthrough node share address {}",
                self.devices.main_address
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    None,
    Even,
    Odd,
}

/// USB RS-485 adapter settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    pub port: String,
    pub baud_rate: u32,
    pub parity: Parity,
    pub data_bits: u8,
    pub stop_bits: u8,
    pub timeout_ms: u32,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".into(),
            baud_rate: 19200,
            parity: Parity::None,
            data_bits: 8,
            stop_bits: 1,
            timeout_ms: 500,
        }
    }
}

impl SerialConfig {
    pub fn timeout(&self) -> MillisDurationU32 {
        MillisDurationU32::millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Universal address the X2 answers on whatever its stored address is.
    pub main_address: u8,
    pub node_address: u8,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            main_address: 252,
            node_address: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Attempts per Modbus transaction.
    pub modbus: u32,
    /// SSID scans per Wi-Fi search.
    pub wifi_scans: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            modbus: 3,
            wifi_scans: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub host_on_ms: u32,
    pub host_off_ms: u32,
    pub device_ms: u32,
    pub wifi_boot_ms: u32,
    pub wifi_scan_pause_ms: u32,
    pub power_cycle_ms: u32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            host_on_ms: 3000,
            host_off_ms: 5000,
            device_ms: 100,
            wifi_boot_ms: 8000,
            wifi_scan_pause_ms: 2000,
            power_cycle_ms: 1000,
        }
    }
}

impl TimingConfig {
    pub fn host_on(&self) -> MillisDurationU32 {
        MillisDurationU32::millis(self.host_on_ms)
    }

    pub fn host_off(&self) -> MillisDurationU32 {
        MillisDurationU32::millis(self.host_off_ms)
    }

    pub fn device(&self) -> MillisDurationU32 {
        MillisDurationU32::millis(self.device_ms)
    }

    pub fn wifi_boot(&self) -> MillisDurationU32 {
        MillisDurationU32::millis(self.wifi_boot_ms)
    }

    pub fn wifi_scan_pause(&self) -> MillisDurationU32 {
        MillisDurationU32::millis(self.wifi_scan_pause_ms)
    }

    pub fn power_cycle(&self) -> MillisDurationU32 {
        MillisDurationU32::millis(self.power_cycle_ms)
    }
}

/// An expected value and the symmetric window around it.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tolerance {
    pub expected: f64,
    pub tolerance: f64,
}

impl Tolerance {
    pub const fn new(expected: f64, tolerance: f64) -> Self {
        Self {
            expected,
            tolerance,
        }
    }
}

/// Pass windows for every measured quantity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    pub ldo3v: Tolerance,
    pub sepic33: Tolerance,
    pub sepic12: Tolerance,
    pub ldo5: Tolerance,
    pub sensor_port: Tolerance,
    pub power_input: Tolerance,
    pub rtc_battery: Tolerance,
    /// Milliamps.
    pub system_current: Tolerance,
    /// Largest RTC drift over a power cycle that still passes, in seconds.
    pub clock_drift_s: i64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            ldo3v: Tolerance::new(3.0, 0.05),
            sepic33: Tolerance::new(3.3, 0.1),
            sepic12: Tolerance::new(12.0, 0.25),
            ldo5: Tolerance::new(5.0, 0.1),
            sensor_port: Tolerance::new(12.0, 0.25),
            power_input: Tolerance::new(12.0, 0.25),
            rtc_battery: Tolerance::new(3.0, 0.2),
            system_current: Tolerance::new(150.0, 10.0),
            clock_drift_s: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WifiConfig {
    /// Substring the logger's SSID must contain.
    pub ssid: String,
    pub interface: String,
}

impl Default for WifiConfig {
    fn default() -> Self {
        Self {
            ssid: "X2 Logger".into(),
            interface: "wlan0".into(),
        }
    }
}

/// Rail enable lines. Offsets are on the GPIO character device, i.e. BCM numbers
/// on a Raspberry Pi (board pins 11, 13, 15 and 12).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GpioConfig {
    pub chip: String,
    pub primary: u32,
    pub secondary: u32,
    pub backup: u32,
    pub passthrough: u32,
}

impl Default for GpioConfig {
    fn default() -> Self {
        Self {
            chip: "/dev/gpiochip0".into(),
            primary: 17,
            secondary: 27,
            backup: 22,
            passthrough: 18,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpiConfig {
    pub device: String,
    pub max_speed_hz: u32,
}

impl Default for SpiConfig {
    fn default() -> Self {
        Self {
            device: "/dev/spidev0.0".into(),
            max_speed_hz: 1_000_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub directory: PathBuf,
    pub serial_length: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("TestResults"),
            serial_length: 4,
        }
    }
}

/// The ordered module list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Modules(pub Vec<ModuleKind>);

impl Default for Modules {
    fn default() -> Self {
        Self(ModuleKind::catalogue().to_vec())
    }
}
