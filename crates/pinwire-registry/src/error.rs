/// Errors that can occur while configuring the capability registry.
///
/// Dispatch itself never fails; unclaimed input becomes a diagnostic.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The handler table is full.
    #[error("too many features registered (max {max})")]
    TooManyFeatures { max: usize },

    /// A pin index outside the pin table.
    #[error("pin {pin} out of range ({total} pins)")]
    PinOutOfRange { pin: u8, total: usize },
}

pub type Result<T> = std::result::Result<T, RegistryError>;
