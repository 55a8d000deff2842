//! The Art-Net node task
//!
//! Owns the UDP socket and runs the receive loop: ArtDmx frames for the
//! configured port address are handed to the USB worker, ArtPoll gets an
//! ArtPollReply so controllers can discover the node, and everything
//! else is dropped quietly. The loop itself never terminates; main
//! cancels it on shutdown.

use anyhow::{Context as _, Result};
use common::DmxBridge;
use protocol::{ARTNET_PORT, ArtPacket, PollReply, PortAddress, ProtocolError, parse_packet};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use tokio::net::UdpSocket;
use tracing::{debug, info, trace, warn};

use crate::config::{DmxSettings, NodeSettings};

pub struct ArtNetNode {
    socket: UdpSocket,
    port_address: PortAddress,
    short_name: String,
    long_name: String,
    bridge: DmxBridge,
    replies_sent: u64,
}

/// Resolve the configured listen address onto the well-known Art-Net port
fn listen_addr(node: &NodeSettings) -> Result<SocketAddr> {
    let ip = match &node.bind_addr {
        Some(addr) => addr
            .parse::<IpAddr>()
            .with_context(|| format!("Invalid bind address '{}'", addr))?,
        None => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
    };
    Ok(SocketAddr::new(ip, ARTNET_PORT))
}

impl ArtNetNode {
    /// Bind the node socket on the configured address
    pub async fn bind(node: &NodeSettings, dmx: &DmxSettings, bridge: DmxBridge) -> Result<Self> {
        Self::bind_to(listen_addr(node)?, node, dmx, bridge).await
    }

    async fn bind_to(
        addr: SocketAddr,
        node: &NodeSettings,
        dmx: &DmxSettings,
        bridge: DmxBridge,
    ) -> Result<Self> {
        let socket = UdpSocket::bind(addr)
            .await
            .with_context(|| format!("Failed to bind Art-Net socket on {}", addr))?;
        socket
            .set_broadcast(true)
            .context("Failed to enable broadcast")?;

        let port_address = dmx.port_address()?;
        info!(
            "Art-Net node listening on {}, output port address {:#06x}",
            socket.local_addr()?,
            port_address.raw()
        );

        Ok(Self {
            socket,
            port_address,
            short_name: node.short_name.clone(),
            long_name: node.long_name.clone(),
            bridge,
            replies_sent: 0,
        })
    }

    /// Receive and dispatch datagrams until cancelled
    pub async fn run(mut self) -> Result<()> {
        let mut buf = vec![0u8; 1024];

        loop {
            let (len, peer) = self
                .socket
                .recv_from(&mut buf)
                .await
                .context("Art-Net socket receive failed")?;
            self.handle_datagram(&buf[..len], peer).await;
        }
    }

    async fn handle_datagram(&mut self, datagram: &[u8], peer: SocketAddr) {
        match parse_packet(datagram) {
            Ok(ArtPacket::Dmx(dmx)) => {
                if dmx.port_address != self.port_address {
                    trace!(
                        "Ignoring DMX for port address {:#06x}",
                        dmx.port_address.raw()
                    );
                    return;
                }

                debug!(
                    "DMX frame from {}: {} channel(s), sequence {}",
                    peer,
                    dmx.frame.len(),
                    dmx.sequence
                );
                match self.bridge.try_send_frame(dmx.frame) {
                    Ok(true) => {}
                    Ok(false) => warn!("USB worker is behind, dropping frame"),
                    Err(e) => warn!("Cannot hand frame to USB worker: {}", e),
                }
            }
            Ok(ArtPacket::Poll(_)) => {
                debug!("ArtPoll from {}", peer);
                self.send_poll_reply(peer).await;
            }
            Err(ProtocolError::UnsupportedOpcode(opcode)) => {
                trace!("Ignoring opcode {:#06x} from {}", opcode, peer);
            }
            Err(e) => debug!("Dropping packet from {}: {}", peer, e),
        }
    }

    async fn send_poll_reply(&mut self, peer: SocketAddr) {
        self.replies_sent += 1;

        let reply = PollReply {
            ip: self.local_ipv4(),
            port: ARTNET_PORT,
            short_name: self.short_name.clone(),
            long_name: self.long_name.clone(),
            report: format!("#0001 [{:04}] {}", self.replies_sent, self.short_name),
            port_address: self.port_address,
        };

        if let Err(e) = self.socket.send_to(&reply.encode(), peer).await {
            warn!("Failed to send ArtPollReply to {}: {}", peer, e);
        }
    }

    fn local_ipv4(&self) -> [u8; 4] {
        match self.socket.local_addr() {
            Ok(SocketAddr::V4(addr)) => addr.ip().octets(),
            _ => [0, 0, 0, 0],
        }
    }
}
