//! Capability registry for the pinwire protocol engine.
//!
//! Owns the ordered list of feature handlers and the pin table, and is the
//! single dispatch point for pin modes, capability and pin-state queries,
//! system variables and sysex commands. Registration order decides who gets
//! to claim a command first.

pub mod config;
pub mod error;
pub mod feature;
pub mod outbox;
pub mod pins;
pub mod registry;
pub mod sysvar;

pub use config::RegistryConfig;
pub use error::{RegistryError, Result};
pub use feature::{CapabilityWriter, FeatureContext, FeatureHandler};
pub use outbox::Outbox;
pub use pins::{encode_pin_state, Pin, PinMode, PinTable, MAX_PIN_STATE};
pub use registry::{CapabilityRegistry, SystemVariableHook};
pub use sysvar::{
    SystemVariable, SystemVariableStatus, SystemVariableType, SYSVAR_AVAILABLE, SYSVAR_MAX_SYSEX,
    SYSVAR_RECEIVE_BUFFER,
};
