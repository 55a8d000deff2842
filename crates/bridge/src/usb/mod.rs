//! USB side of the bridge
//!
//! Device discovery, string descriptor handling, transfer execution, and
//! the worker thread that owns the bound device for the process lifetime.

pub mod descriptor;
pub mod discovery;
pub mod transfers;
pub mod worker;

pub use discovery::{
    BoundDevice, CandidateSummary, DeviceIdentity, DiscoveryError, find_device, list_candidates,
};
pub use transfers::DmxOutput;
pub use worker::spawn_usb_worker;
