use std::path::Path;
use std::time::Duration;

use pinwire_codec::DEFAULT_MAX_SYSEX;
use pinwire_device::header::MAX_STATUS_MAGNITUDE;
use pinwire_device::{DeviceConfig, DEFAULT_MAX_BLOCK};
use pinwire_registry::{CapabilityRegistry, PinMode, PinTable, RegistryConfig};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::timer::DEFAULT_SAMPLING_INTERVAL;

/// Engine configuration.
///
/// Every field has a default, so a config file only names what it changes:
///
/// ```json
/// { "firmware_name": "bench-board", "total_pins": 8, "ignored_pins": [0, 1] }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Name reported in REPORT_FIRMWARE.
    pub firmware_name: String,
    pub firmware_major: u8,
    pub firmware_minor: u8,
    /// Reporting cadence in milliseconds. Default: 19.
    pub sampling_interval_ms: u32,
    /// Number of pins in the pin table. Default: 20.
    pub total_pins: u8,
    /// Pins whose default mode is Ignore (e.g. the serial pins).
    pub ignored_pins: Vec<u8>,
    /// Maximum number of feature handlers. Default: 32.
    pub max_features: usize,
    /// Largest inbound sysex body. Default: 256.
    pub max_sysex_size: usize,
    /// Receive buffer size reported through system variable 2.
    pub receive_buffer_size: usize,
    /// Largest outbound sysex body; larger responses are dropped. Default: 1024.
    pub max_response_size: usize,
    /// Largest decoded device parameter block, in and out; at most 8191 so a
    /// byte count always fits a response status. Default: 128.
    pub max_block_size: usize,
    /// Messages dispatched per poll before reporting runs. Default: 64.
    pub max_messages_per_poll: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            firmware_name: "pinwire".to_string(),
            firmware_major: 0,
            firmware_minor: 1,
            sampling_interval_ms: DEFAULT_SAMPLING_INTERVAL.as_millis() as u32,
            total_pins: 20,
            ignored_pins: Vec::new(),
            max_features: 32,
            max_sysex_size: DEFAULT_MAX_SYSEX,
            receive_buffer_size: DEFAULT_MAX_SYSEX,
            max_response_size: 1024,
            max_block_size: DEFAULT_MAX_BLOCK,
            max_messages_per_poll: 64,
        }
    }
}

impl EngineConfig {
    /// Load and validate a JSON config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(EngineError::ConfigIo)?;
        Self::from_json(&content)
    }

    /// Parse and validate a JSON config.
    pub fn from_json(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every value is representable on the wire.
    pub fn validate(&self) -> Result<()> {
        if self.firmware_name.is_empty() {
            return Err(invalid("firmware_name must not be empty"));
        }
        if self.firmware_major > 0x7F || self.firmware_minor > 0x7F {
            return Err(invalid("firmware version components must fit in 7 bits"));
        }
        if self.sampling_interval_ms == 0 || self.sampling_interval_ms > 0x3FFF {
            return Err(invalid("sampling_interval_ms must be between 1 and 16383"));
        }
        if self.total_pins > 0x7F {
            return Err(invalid("total_pins must be at most 127"));
        }
        if let Some(pin) = self.ignored_pins.iter().find(|&&p| p >= self.total_pins) {
            return Err(invalid(format!(
                "ignored pin {pin} is outside the pin table ({} pins)",
                self.total_pins
            )));
        }
        if self.max_features == 0 {
            return Err(invalid("max_features must be greater than zero"));
        }
        if self.max_sysex_size < 16 {
            return Err(invalid("max_sysex_size must be at least 16"));
        }
        if self.max_response_size < self.max_sysex_size {
            return Err(invalid("max_response_size must be at least max_sysex_size"));
        }
        if self.max_block_size == 0 || self.max_block_size > MAX_STATUS_MAGNITUDE as usize {
            return Err(invalid(format!(
                "max_block_size must be between 1 and {MAX_STATUS_MAGNITUDE}"
            )));
        }
        if self.max_messages_per_poll == 0 {
            return Err(invalid("max_messages_per_poll must be greater than zero"));
        }
        Ok(())
    }

    pub fn sampling_interval(&self) -> Duration {
        Duration::from_millis(u64::from(self.sampling_interval_ms))
    }

    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            max_features: self.max_features,
            total_pins: self.total_pins,
            max_sysex_size: self.max_sysex_size,
            receive_buffer_size: self.receive_buffer_size,
        }
    }

    pub fn device_config(&self) -> DeviceConfig {
        DeviceConfig {
            max_block_size: self.max_block_size,
        }
    }

    /// Pin table with every pin defaulting to Output except the ignored ones.
    pub fn pin_table(&self) -> PinTable {
        let defaults = (0..self.total_pins)
            .map(|pin| {
                if self.ignored_pins.contains(&pin) {
                    PinMode::Ignore
                } else {
                    PinMode::Output
                }
            })
            .collect();
        PinTable::with_defaults(defaults)
    }

    /// An empty registry sized by this config.
    pub fn build_registry(&self) -> CapabilityRegistry {
        CapabilityRegistry::with_pins(self.registry_config(), self.pin_table())
    }
}

fn invalid(message: impl Into<String>) -> EngineError {
    EngineError::InvalidConfig(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = EngineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.sampling_interval(), Duration::from_millis(19));
        assert_eq!(config.registry_config(), RegistryConfig::default());
        assert_eq!(config.device_config(), DeviceConfig::default());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = EngineConfig::from_json(
            r#"{ "firmware_name": "bench-board", "total_pins": 8, "ignored_pins": [0, 1] }"#,
        )
        .unwrap();
        assert_eq!(config.firmware_name, "bench-board");
        assert_eq!(config.total_pins, 8);
        assert_eq!(config.max_sysex_size, DEFAULT_MAX_SYSEX);

        let pins = config.pin_table();
        assert_eq!(pins.len(), 8);
        assert_eq!(pins.mode(0), Some(PinMode::Ignore));
        assert_eq!(pins.mode(2), Some(PinMode::Output));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = EngineConfig::from_json(r#"{ "firmware": "x" }"#).unwrap_err();
        assert!(matches!(err, EngineError::ConfigParse(_)));
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        for json in [
            r#"{ "firmware_name": "" }"#,
            r#"{ "sampling_interval_ms": 0 }"#,
            r#"{ "total_pins": 200 }"#,
            r#"{ "total_pins": 4, "ignored_pins": [4] }"#,
            r#"{ "max_sysex_size": 2048 }"#,
            r#"{ "max_block_size": 0 }"#,
            r#"{ "max_block_size": 8192 }"#,
        ] {
            let err = EngineConfig::from_json(json).unwrap_err();
            assert!(matches!(err, EngineError::InvalidConfig(_)), "{json}");
        }
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = EngineConfig::from_file(Path::new("/nonexistent/pinwire.json")).unwrap_err();
        assert!(matches!(err, EngineError::ConfigIo(_)));
    }
}
