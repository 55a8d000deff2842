//! uDMX vendor command model
//!
//! The Anyma uDMX and its clones expose the whole device surface as
//! vendor control transfers on endpoint 0: one command sets a single
//! channel, another sets a contiguous range. Both the command codes and
//! the value/index field meanings are fixed by the device firmware.
//!
//! The device ships with the free V-USB shared vendor/product pair, so
//! the ids alone do not identify it; discovery must also match the
//! manufacturer and product descriptor strings defined here.

use crate::dmx::ChannelFrame;

/// Set one channel: wValue = channel value, wIndex = zero-based channel
pub const CMD_SET_SINGLE_CHANNEL: u8 = 1;

/// Set a channel range: wValue = byte count, wIndex = zero-based start,
/// payload = channel values
pub const CMD_SET_CHANNEL_RANGE: u8 = 2;

/// Reserved firmware command, never sent during normal operation
pub const CMD_START_BOOTLOADER: u8 = 0xf8;

/// V-USB shared vendor id used by the uDMX
pub const UDMX_SHARED_VENDOR_ID: u16 = 0x16c0;

/// V-USB shared product id used by the uDMX
pub const UDMX_SHARED_PRODUCT_ID: u16 = 0x05dc;

/// Manufacturer string a genuine uDMX reports
pub const UDMX_MANUFACTURER: &str = "www.anyma.ch";

/// Product string a genuine uDMX reports
pub const UDMX_PRODUCT: &str = "uDMX";

/// One vendor control transfer to issue against the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UdmxRequest {
    /// Set a single channel to a value
    SetSingleChannel {
        /// Intensity to set
        value: u8,
        /// Zero-based channel index
        offset: u16,
    },
    /// Set a contiguous run of channels starting at an offset
    SetChannelRange {
        /// Channel values, in channel order
        data: Vec<u8>,
        /// Zero-based index of the first channel
        offset: u16,
    },
}

impl UdmxRequest {
    /// The bRequest command code
    pub fn request(&self) -> u8 {
        match self {
            Self::SetSingleChannel { .. } => CMD_SET_SINGLE_CHANNEL,
            Self::SetChannelRange { .. } => CMD_SET_CHANNEL_RANGE,
        }
    }

    /// The wValue field: channel value for a single set, byte count for a range
    pub fn value(&self) -> u16 {
        match self {
            Self::SetSingleChannel { value, .. } => *value as u16,
            Self::SetChannelRange { data, .. } => data.len() as u16,
        }
    }

    /// The wIndex field: zero-based channel offset
    pub fn index(&self) -> u16 {
        match self {
            Self::SetSingleChannel { offset, .. } | Self::SetChannelRange { offset, .. } => *offset,
        }
    }

    /// The data stage, empty for a single-channel set
    pub fn payload(&self) -> &[u8] {
        match self {
            Self::SetSingleChannel { .. } => &[],
            Self::SetChannelRange { data, .. } => data,
        }
    }
}

/// Translate a channel frame into the transfers that reproduce it
///
/// Mirrors the device firmware's capabilities: an empty frame needs
/// nothing, one value uses the single-channel command, anything longer is
/// one range command carrying the whole frame. `channel_start` is the
/// 1-based first logical channel; the frame length is already bounded to
/// a universe by [`ChannelFrame`], so the result is defined for every
/// frame that can exist.
pub fn requests_for_frame(frame: &ChannelFrame, channel_start: u16) -> Vec<UdmxRequest> {
    let offset = channel_start.saturating_sub(1);
    match frame.values() {
        [] => Vec::new(),
        [value] => vec![UdmxRequest::SetSingleChannel {
            value: *value,
            offset,
        }],
        values => vec![UdmxRequest::SetChannelRange {
            data: values.to_vec(),
            offset,
        }],
    }
}
