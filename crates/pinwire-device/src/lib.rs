//! Device session multiplexer.
//!
//! Implements the device query sub-protocol: a host opens a named unit,
//! receives a 14-bit handle and then issues status, control, read, write and
//! close operations against it. Requests are relayed to a
//! [`DeviceDriverTable`]; the multiplexer owns session bookkeeping and the
//! wire format, drivers own the hardware.

pub mod driver;
pub mod error;
pub mod handle;
pub mod header;
pub mod memory;
pub mod multiplexer;
pub mod session;
pub mod status;

pub use driver::{DeviceDriverTable, DriverEvent};
pub use error::{DeviceError, Result};
pub use handle::DeviceHandle;
pub use header::{DeviceAction, DeviceRequest, DeviceResponse, HEADER_LEN};
pub use memory::RegisterFileTable;
pub use multiplexer::{DeviceConfig, DeviceMultiplexer, DEFAULT_MAX_BLOCK};
pub use session::{Session, SessionKey, SessionTable};
pub use status::StatusCode;
