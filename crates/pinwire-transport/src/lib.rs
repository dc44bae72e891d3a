//! Duplex byte-stream boundary for the pinwire protocol engine.
//!
//! The engine only needs sequential `Read` + `Write`. This crate provides the
//! two streams the tooling uses off-target:
//! - a Unix domain socket a host connects to (Linux/macOS)
//! - the process's stdin/stdout
//!
//! Real firmware plugs its UART/USB stream in place of [`BoardStream`].

pub mod error;
pub mod stream;

#[cfg(unix)]
pub mod uds;

pub use error::{Result, TransportError};
pub use stream::{BoardStream, POLL_INTERVAL};

#[cfg(unix)]
pub use uds::BoardSocket;
