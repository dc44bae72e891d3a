//! The pinwire board-side protocol engine.
//!
//! [`Engine`] owns the capability registry and the framed board stream and
//! runs the cooperative loop: read what the host sent, dispatch each message
//! to completion, give every feature its per-loop report call, write the
//! responses.
//!
//! ```no_run
//! use std::sync::atomic::AtomicBool;
//! use pinwire_engine::{Engine, EngineConfig};
//!
//! # fn main() -> pinwire_engine::Result<()> {
//! let config = EngineConfig::default();
//! let registry = config.build_registry();
//! let mut engine = Engine::new(std::io::stdin(), std::io::stdout(), registry, config)?;
//! engine.run(&AtomicBool::new(true))?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod timer;

pub use config::EngineConfig;
pub use engine::Engine;
pub use error::{EngineError, Result};
pub use timer::{ReportTimer, DEFAULT_SAMPLING_INTERVAL, MIN_SAMPLING_INTERVAL};
