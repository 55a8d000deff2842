//! USB worker thread
//!
//! Owns the bound device for the process lifetime and services frames
//! from the Art-Net side one at a time: each frame is translated and its
//! transfers fully issued before the next command is taken, so channel
//! data reaches the device in delivery order. A failed transfer is
//! logged and the loop keeps going; only shutdown (or the bridge side
//! disappearing) ends it, at which point the device handle is released
//! by drop.

use crate::usb::discovery::BoundDevice;
use crate::usb::transfers::DmxOutput;
use common::{DmxCommand, DmxWorker};
use protocol::{ChannelFrame, requests_for_frame};
use tracing::{debug, error, info};

/// The bridge loop, generic over the output so it is testable
pub struct UsbWorkerThread<O: DmxOutput> {
    output: O,
    worker: DmxWorker,
    channel_start: u16,
}

impl<O: DmxOutput> UsbWorkerThread<O> {
    pub fn new(output: O, worker: DmxWorker, channel_start: u16) -> Self {
        Self {
            output,
            worker,
            channel_start,
        }
    }

    /// Run until shutdown
    pub fn run(mut self) {
        info!("USB worker thread started");

        loop {
            match self.worker.recv_command() {
                Ok(DmxCommand::OutputFrame { frame }) => self.output_frame(&frame),
                Ok(DmxCommand::Shutdown) => {
                    info!("USB worker shutting down");
                    break;
                }
                Err(_) => {
                    debug!("Command channel closed, stopping");
                    break;
                }
            }
        }

        info!("USB worker thread stopped");
        // self.output drops here, releasing the device
    }

    /// Issue the transfers that reproduce one frame
    ///
    /// Failures are contained: log and continue with whatever comes
    /// next. No retry, nothing propagates back to the frame source.
    fn output_frame(&mut self, frame: &ChannelFrame) {
        for request in requests_for_frame(frame, self.channel_start) {
            debug!(
                "Setting {} channel(s) from offset {}",
                frame.len(),
                request.index()
            );
            if let Err(e) = self.output.send_request(&request) {
                error!("USB error: {}", e);
            }
        }
    }
}

/// Spawn the worker thread, handing it exclusive ownership of the device
pub fn spawn_usb_worker(
    worker: DmxWorker,
    device: BoundDevice,
    channel_start: u16,
) -> std::io::Result<std::thread::JoinHandle<()>> {
    std::thread::Builder::new()
        .name("usb-worker".to_string())
        .spawn(move || UsbWorkerThread::new(device, worker, channel_start).run())
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{DmxBridge, create_dmx_bridge};
    use protocol::UdmxRequest;
    use std::sync::{Arc, Mutex};

    /// Records every request and fails the ones it is told to
    #[derive(Clone, Default)]
    struct RecordingOutput {
        sent: Arc<Mutex<Vec<UdmxRequest>>>,
        failures_remaining: Arc<Mutex<u32>>,
    }

    impl RecordingOutput {
        fn failing_first(failures: u32) -> Self {
            let output = Self::default();
            *output.failures_remaining.lock().unwrap() = failures;
            output
        }

        fn sent(&self) -> Vec<UdmxRequest> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl DmxOutput for RecordingOutput {
        fn send_request(&mut self, request: &UdmxRequest) -> Result<usize, rusb::Error> {
            let mut failures = self.failures_remaining.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(rusb::Error::Timeout);
            }
            self.sent.lock().unwrap().push(request.clone());
            Ok(request.payload().len())
        }
    }

    fn worker_with(output: RecordingOutput) -> (DmxBridge, std::thread::JoinHandle<()>) {
        let (bridge, worker) = create_dmx_bridge();
        let handle = std::thread::spawn(move || UsbWorkerThread::new(output, worker, 1).run());
        (bridge, handle)
    }

    #[tokio::test]
    async fn test_frames_are_serviced_in_order() {
        let output = RecordingOutput::default();
        let (bridge, handle) = worker_with(output.clone());

        for values in [vec![1u8, 2], vec![3, 4], vec![5]] {
            let frame = ChannelFrame::from_slice(&values).unwrap();
            bridge
                .send_command(DmxCommand::OutputFrame { frame })
                .await
                .unwrap();
        }
        bridge.send_command(DmxCommand::Shutdown).await.unwrap();
        handle.join().unwrap();

        let sent = output.sent();
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[0].payload(), &[1, 2]);
        assert_eq!(sent[1].payload(), &[3, 4]);
        assert_eq!(
            sent[2],
            UdmxRequest::SetSingleChannel {
                value: 5,
                offset: 0,
            }
        );
    }

    #[tokio::test]
    async fn test_transfer_failure_does_not_stop_the_loop() {
        let output = RecordingOutput::failing_first(1);
        let (bridge, handle) = worker_with(output.clone());

        // The first frame's transfer fails; the second must still go out
        for values in [vec![1u8, 2, 3], vec![4, 5, 6]] {
            let frame = ChannelFrame::from_slice(&values).unwrap();
            bridge
                .send_command(DmxCommand::OutputFrame { frame })
                .await
                .unwrap();
        }
        bridge.send_command(DmxCommand::Shutdown).await.unwrap();
        handle.join().unwrap();

        let sent = output.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].payload(), &[4, 5, 6]);
    }

    #[tokio::test]
    async fn test_empty_frame_is_a_no_op() {
        let output = RecordingOutput::default();
        let (bridge, handle) = worker_with(output.clone());

        let frame = ChannelFrame::from_slice(&[]).unwrap();
        bridge
            .send_command(DmxCommand::OutputFrame { frame })
            .await
            .unwrap();
        bridge.send_command(DmxCommand::Shutdown).await.unwrap();
        handle.join().unwrap();

        assert!(output.sent().is_empty());
    }

    #[tokio::test]
    async fn test_configured_channel_start_offsets_requests() {
        let output = RecordingOutput::default();
        let (bridge, worker) = create_dmx_bridge();
        let thread_output = output.clone();
        let handle =
            std::thread::spawn(move || UsbWorkerThread::new(thread_output, worker, 10).run());

        let frame = ChannelFrame::from_slice(&[7]).unwrap();
        bridge
            .send_command(DmxCommand::OutputFrame { frame })
            .await
            .unwrap();
        bridge.send_command(DmxCommand::Shutdown).await.unwrap();
        handle.join().unwrap();

        assert_eq!(output.sent()[0].index(), 9);
    }

    #[tokio::test]
    async fn test_worker_stops_when_bridge_is_dropped() {
        let output = RecordingOutput::default();
        let (bridge, handle) = worker_with(output);

        drop(bridge);
        handle.join().unwrap();
    }
}
