//! uDMX transfer execution
//!
//! Every device command is a vendor OUT control transfer on endpoint 0;
//! the request's code, value, index and payload come straight from the
//! [`UdmxRequest`] wire mapping.

use crate::usb::discovery::BoundDevice;
use protocol::UdmxRequest;
use rusb::{Direction, Recipient, RequestType};
use tracing::debug;

/// Something that accepts uDMX control requests
///
/// Implemented by [`BoundDevice`] for real hardware; the worker is
/// generic over this so frame servicing can be tested without a device.
pub trait DmxOutput {
    /// Issue one request, returning the number of bytes transferred
    fn send_request(&mut self, request: &UdmxRequest) -> Result<usize, rusb::Error>;
}

impl DmxOutput for BoundDevice {
    fn send_request(&mut self, request: &UdmxRequest) -> Result<usize, rusb::Error> {
        let request_type =
            rusb::request_type(Direction::Out, RequestType::Vendor, Recipient::Device);

        debug!(
            "Control transfer: request={:#04x}, value={}, index={}, payload_len={}",
            request.request(),
            request.value(),
            request.index(),
            request.payload().len()
        );

        self.handle().write_control(
            request_type,
            request.request(),
            request.value(),
            request.index(),
            request.payload(),
            self.timeout(),
        )
    }
}
