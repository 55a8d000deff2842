//! Art-Net packet codec
//!
//! Art-Net is a UDP-based protocol for transmitting DMX512 over Ethernet.
//! The bridge only speaks the subset a single-output node needs: it parses
//! ArtDmx (channel data) and ArtPoll (controller discovery), and encodes
//! ArtPollReply so controllers can find the node.
//!
//! # Packet layout
//!
//! Every packet starts with the 8-byte identifier `"Art-Net\0"` followed
//! by a little-endian opcode. The protocol version field, where present,
//! is big-endian, as is the ArtDmx data length.

use crate::dmx::{CHANNELS_PER_UNIVERSE, ChannelFrame, PortAddress};
use crate::error::{ProtocolError, Result};

/// Packet identifier, including the terminating NUL
pub const ARTNET_ID: &[u8; 8] = b"Art-Net\0";

/// The well-known Art-Net UDP port
pub const ARTNET_PORT: u16 = 6454;

/// Lowest protocol revision this node answers
pub const PROTOCOL_VERSION: u16 = 14;

/// ArtPoll opcode
pub const OP_POLL: u16 = 0x2000;

/// ArtPollReply opcode
pub const OP_POLL_REPLY: u16 = 0x2100;

/// ArtDmx opcode
pub const OP_DMX: u16 = 0x5000;

/// Parsed inbound packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtPacket {
    /// Controller discovery request
    Poll(ArtPoll),
    /// Channel data for one universe
    Dmx(ArtDmx),
}

/// ArtPoll: a controller asking nodes to identify themselves
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtPoll {
    /// Protocol revision the controller speaks
    pub protocol_version: u16,
    /// TalkToMe behaviour flags (unused by this node)
    pub flags: u8,
}

/// ArtDmx: one frame of channel data for one port address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtDmx {
    /// Sender's sequence number, 0 when unused
    pub sequence: u8,
    /// Physical input port the data originated from
    pub physical: u8,
    /// Destination port address
    pub port_address: PortAddress,
    /// The channel values
    pub frame: ChannelFrame,
}

/// Parse one inbound datagram
///
/// Opcodes other than ArtPoll and ArtDmx come back as
/// [`ProtocolError::UnsupportedOpcode`]; callers drop those packets
/// rather than treating them as failures.
pub fn parse_packet(buf: &[u8]) -> Result<ArtPacket> {
    if buf.len() < 10 {
        return Err(ProtocolError::Truncated {
            expected: 10,
            actual: buf.len(),
        });
    }
    if &buf[0..8] != ARTNET_ID {
        return Err(ProtocolError::BadPacketId);
    }

    let opcode = u16::from_le_bytes([buf[8], buf[9]]);
    match opcode {
        OP_POLL => parse_poll(buf).map(ArtPacket::Poll),
        OP_DMX => parse_dmx(buf).map(ArtPacket::Dmx),
        other => Err(ProtocolError::UnsupportedOpcode(other)),
    }
}

fn parse_poll(buf: &[u8]) -> Result<ArtPoll> {
    // id (8) + opcode (2) + version (2), flags byte is optional in old senders
    if buf.len() < 12 {
        return Err(ProtocolError::Truncated {
            expected: 12,
            actual: buf.len(),
        });
    }

    let protocol_version = u16::from_be_bytes([buf[10], buf[11]]);
    if protocol_version < PROTOCOL_VERSION {
        return Err(ProtocolError::UnsupportedVersion(protocol_version));
    }

    Ok(ArtPoll {
        protocol_version,
        flags: buf.get(12).copied().unwrap_or(0),
    })
}

fn parse_dmx(buf: &[u8]) -> Result<ArtDmx> {
    // Fixed header before the channel data
    if buf.len() < 18 {
        return Err(ProtocolError::Truncated {
            expected: 18,
            actual: buf.len(),
        });
    }

    let declared = u16::from_be_bytes([buf[16], buf[17]]) as usize;
    if declared > CHANNELS_PER_UNIVERSE {
        return Err(ProtocolError::FrameTooLong {
            len: declared,
            max: CHANNELS_PER_UNIVERSE,
        });
    }
    let available = buf.len() - 18;
    if declared > available {
        return Err(ProtocolError::LengthMismatch {
            declared,
            available,
        });
    }

    Ok(ArtDmx {
        sequence: buf[12],
        physical: buf[13],
        port_address: PortAddress::from_raw(u16::from_le_bytes([buf[14], buf[15]])),
        frame: ChannelFrame::from_slice(&buf[18..18 + declared])?,
    })
}

/// ArtPollReply: this node's answer to an ArtPoll
///
/// Describes a node with a single DMX output port on the configured
/// port address.
#[derive(Debug, Clone)]
pub struct PollReply {
    /// IPv4 address the node is reachable on
    pub ip: [u8; 4],
    /// UDP port, normally [`ARTNET_PORT`]
    pub port: u16,
    /// Short node name, truncated to 17 bytes on the wire
    pub short_name: String,
    /// Long node name, truncated to 63 bytes on the wire
    pub long_name: String,
    /// Node status report text, truncated to 63 bytes
    pub report: String,
    /// Port address the output port is subscribed to
    pub port_address: PortAddress,
}

impl PollReply {
    /// Wire size of an ArtPollReply
    pub const LEN: usize = 239;

    /// Encode the reply packet
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; Self::LEN];

        buf[0..8].copy_from_slice(ARTNET_ID);
        buf[8..10].copy_from_slice(&OP_POLL_REPLY.to_le_bytes());
        buf[10..14].copy_from_slice(&self.ip);
        // Port is transmitted low byte first
        buf[14..16].copy_from_slice(&self.port.to_le_bytes());
        // Firmware version
        buf[16] = 0;
        buf[17] = 1;
        buf[18] = self.port_address.net();
        buf[19] = self.port_address.subnet();
        // OemUnknown
        buf[20] = 0x00;
        buf[21] = 0xff;

        copy_text(&mut buf[26..44], &self.short_name);
        copy_text(&mut buf[44..108], &self.long_name);
        copy_text(&mut buf[108..172], &self.report);

        // One port, output-capable, carrying DMX512
        buf[172] = 0;
        buf[173] = 1;
        buf[174] = 0x80;
        // GoodOutput: data is being transmitted
        buf[182] = 0x80;
        // SwOut[0]: the output port's universe nibble
        buf[190] = self.port_address.universe();
        // Style: StNode
        buf[200] = 0x00;

        buf
    }
}

/// Copy a NUL-terminated string into a fixed wire field
///
/// Truncates to leave room for the terminator; the remainder of the field
/// stays zeroed.
fn copy_text(field: &mut [u8], text: &str) {
    let max = field.len() - 1;
    let bytes = text.as_bytes();
    let len = bytes.len().min(max);
    field[..len].copy_from_slice(&bytes[..len]);
}
