//! Protocol library for udmx-artnet
//!
//! This crate defines both wire formats the bridge translates between:
//! the Art-Net packets arriving over UDP (ArtPoll, ArtPollReply, ArtDmx)
//! and the vendor control requests understood by the uDMX interface.
//! Everything here is pure data handling with no I/O, so the translation
//! logic can be tested without a network or a device.
//!
//! # Example
//!
//! ```
//! use protocol::{ChannelFrame, UdmxRequest, requests_for_frame};
//!
//! let frame = ChannelFrame::from_slice(&[10, 20, 30]).unwrap();
//! let requests = requests_for_frame(&frame, 1);
//!
//! assert_eq!(requests.len(), 1);
//! let UdmxRequest::SetChannelRange { ref data, offset } = requests[0] else {
//!     panic!("expected a range request");
//! };
//! assert_eq!(data, &[10, 20, 30]);
//! assert_eq!(offset, 0);
//! ```

pub mod artnet;
pub mod dmx;
pub mod error;
pub mod udmx;

pub use artnet::{
    ARTNET_ID, ARTNET_PORT, ArtDmx, ArtPacket, ArtPoll, OP_DMX, OP_POLL, OP_POLL_REPLY,
    PROTOCOL_VERSION, PollReply, parse_packet,
};
pub use dmx::{CHANNELS_PER_UNIVERSE, ChannelFrame, PortAddress};
pub use error::{ProtocolError, Result};
pub use udmx::{
    CMD_SET_CHANNEL_RANGE, CMD_SET_SINGLE_CHANNEL, CMD_START_BOOTLOADER, UDMX_MANUFACTURER,
    UDMX_PRODUCT, UDMX_SHARED_PRODUCT_ID, UDMX_SHARED_VENDOR_ID, UdmxRequest, requests_for_frame,
};
