//! Common utilities for udmx-artnet
//!
//! Shared plumbing between the network side and the USB worker thread:
//! the error type, tracing setup, and the async channel bridge that
//! carries DMX frames from the Tokio runtime to the blocking USB thread.

pub mod channel;
pub mod error;
pub mod logging;

pub use channel::{DmxBridge, DmxCommand, DmxWorker, create_dmx_bridge};
pub use error::{Error, Result};
pub use logging::setup_logging;
