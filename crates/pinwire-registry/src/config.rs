use pinwire_codec::DEFAULT_MAX_SYSEX;

/// Controls the registry's bounds and the values it reports to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Maximum number of feature handlers.
    pub max_features: usize,
    /// Number of pins in the pin table.
    pub total_pins: u8,
    /// Largest sysex body the board accepts (system variable 1).
    pub max_sysex_size: usize,
    /// Size of the board's receive buffer (system variable 2).
    pub receive_buffer_size: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_features: 32,
            total_pins: 20,
            max_sysex_size: DEFAULT_MAX_SYSEX,
            receive_buffer_size: DEFAULT_MAX_SYSEX,
        }
    }
}
