//! Async channel bridge between the Tokio runtime and the USB thread
//!
//! The network side runs under Tokio; the uDMX handle lives on a
//! dedicated blocking thread so control transfers never stall the
//! socket loop. Commands cross a bounded FIFO channel with a single
//! consumer, which keeps frames in delivery order and lets the worker
//! finish each frame before looking at the next.

use async_channel::{Receiver, Sender, bounded};
use protocol::ChannelFrame;

/// Commands from the Tokio runtime to the USB thread
#[derive(Debug)]
pub enum DmxCommand {
    /// Reproduce one channel frame on the device
    OutputFrame {
        /// The frame, in channel order
        frame: ChannelFrame,
    },

    /// Shut down the USB thread gracefully, releasing the device
    Shutdown,
}

/// Handle for the Tokio runtime side
#[derive(Clone)]
pub struct DmxBridge {
    cmd_tx: Sender<DmxCommand>,
}

impl DmxBridge {
    /// Send a command to the USB thread, waiting for queue space
    pub async fn send_command(&self, cmd: DmxCommand) -> crate::Result<()> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|e| crate::Error::Channel(e.to_string()))
    }

    /// Queue a frame without waiting
    ///
    /// Delivery is best-effort: when the worker is behind and the queue
    /// is full, the frame is dropped and `false` is returned so the
    /// caller can log it. The socket loop never blocks on the device.
    pub fn try_send_frame(&self, frame: ChannelFrame) -> crate::Result<bool> {
        match self.cmd_tx.try_send(DmxCommand::OutputFrame { frame }) {
            Ok(()) => Ok(true),
            Err(async_channel::TrySendError::Full(_)) => Ok(false),
            Err(e) => Err(crate::Error::Channel(e.to_string())),
        }
    }
}

/// Handle for the USB thread side
pub struct DmxWorker {
    cmd_rx: Receiver<DmxCommand>,
}

impl DmxWorker {
    /// Receive the next command, blocking until one arrives
    ///
    /// Returns an error once the bridge side is gone and the queue is
    /// drained, which the worker treats like a shutdown.
    pub fn recv_command(&self) -> crate::Result<DmxCommand> {
        self.cmd_rx
            .recv_blocking()
            .map_err(|e| crate::Error::Channel(e.to_string()))
    }
}

/// Create the channel bridge between Tokio and the USB thread
///
/// Returns (DmxBridge for Tokio, DmxWorker for the USB thread).
pub fn create_dmx_bridge() -> (DmxBridge, DmxWorker) {
    let (cmd_tx, cmd_rx) = bounded(64);

    (DmxBridge { cmd_tx }, DmxWorker { cmd_rx })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_frame_crosses_the_bridge() {
        let (bridge, worker) = create_dmx_bridge();

        let handle = std::thread::spawn(move || {
            let cmd = worker.recv_command().unwrap();
            match cmd {
                DmxCommand::OutputFrame { frame } => frame.values().to_vec(),
                other => panic!("expected OutputFrame, got {:?}", other),
            }
        });

        let frame = ChannelFrame::from_slice(&[1, 2, 3]).unwrap();
        bridge
            .send_command(DmxCommand::OutputFrame { frame })
            .await
            .unwrap();

        assert_eq!(handle.join().unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_try_send_reports_full_queue() {
        let (bridge, worker) = create_dmx_bridge();

        // Fill the queue without a consumer running
        let frame = ChannelFrame::from_slice(&[0]).unwrap();
        while bridge.try_send_frame(frame.clone()).unwrap() {}

        // A drained queue accepts frames again
        let DmxCommand::OutputFrame { .. } = worker.recv_command().unwrap() else {
            panic!("expected OutputFrame");
        };
        assert!(bridge.try_send_frame(frame).unwrap());
    }

    #[tokio::test]
    async fn test_frames_keep_delivery_order() {
        let (bridge, worker) = create_dmx_bridge();

        for v in [10u8, 20, 30] {
            let frame = ChannelFrame::from_slice(&[v]).unwrap();
            bridge
                .send_command(DmxCommand::OutputFrame { frame })
                .await
                .unwrap();
        }
        bridge.send_command(DmxCommand::Shutdown).await.unwrap();

        let mut seen = Vec::new();
        loop {
            match worker.recv_command().unwrap() {
                DmxCommand::OutputFrame { frame } => seen.push(frame.values()[0]),
                DmxCommand::Shutdown => break,
            }
        }
        assert_eq!(seen, vec![10, 20, 30]);
    }
}
