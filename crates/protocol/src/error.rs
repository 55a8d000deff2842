//! Protocol error types

use thiserror::Error;

/// Errors raised while parsing Art-Net packets or constructing DMX frames
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// Packet does not carry the "Art-Net\0" identifier
    #[error("Not an Art-Net packet")]
    BadPacketId,

    /// Packet is shorter than its layout requires
    #[error("Truncated packet: expected at least {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    /// Opcode this implementation does not handle
    #[error("Unsupported opcode: {0:#06x}")]
    UnsupportedOpcode(u16),

    /// Peer speaks an older Art-Net revision than we can answer
    #[error("Unsupported protocol version: {0} (minimum 14)")]
    UnsupportedVersion(u16),

    /// DMX data length exceeds one universe
    #[error("Frame too long: {len} channels (max {max})")]
    FrameTooLong { len: usize, max: usize },

    /// Declared DMX length runs past the end of the datagram
    #[error("DMX length {declared} exceeds available payload of {available} bytes")]
    LengthMismatch { declared: usize, available: usize },

    /// Port-address component outside its Art-Net range
    #[error("Invalid {field}: {value} (max {max})")]
    InvalidPortAddress {
        field: &'static str,
        value: u8,
        max: u8,
    },
}

/// Type alias for protocol results
pub type Result<T> = std::result::Result<T, ProtocolError>;
