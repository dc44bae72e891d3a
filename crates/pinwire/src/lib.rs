//! Firmata-style firmware protocol engine.
//!
//! pinwire lets a host enumerate, configure and operate the I/O capabilities
//! of a board over one byte stream: message framing, per-pin capability
//! negotiation, a plugin registry of feature handlers and a handle-based
//! device session protocol.
//!
//! # Crate Structure
//!
//! - [`transport`]: duplex board streams (Unix socket, stdio)
//! - [`codec`]: message framer and 7-bit encodings
//! - [`registry`]: feature handlers, pin table, system variables
//! - [`device`]: device session multiplexer and driver table interface
//! - [`engine`]: the board-side poll loop
//! - [`sim`]: a simulated board built from demonstration handlers

/// Re-export transport types.
pub mod transport {
    pub use pinwire_transport::*;
}

/// Re-export codec types.
pub mod codec {
    pub use pinwire_codec::*;
}

/// Re-export registry types.
pub mod registry {
    pub use pinwire_registry::*;
}

/// Re-export device session types.
pub mod device {
    pub use pinwire_device::*;
}

/// Re-export engine types.
pub mod engine {
    pub use pinwire_engine::*;
}

pub mod sim;
