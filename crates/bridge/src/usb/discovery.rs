//! uDMX device discovery
//!
//! The uDMX ships with the free V-USB shared vendor/product pair, so the
//! ids match plenty of unrelated hardware. Candidates are therefore
//! opened and their manufacturer and product descriptor strings compared
//! exactly; the first device that passes both checks is bound. Rejected
//! candidates close when their handle goes out of scope, so no scan path
//! can leak a handle.

use crate::usb::descriptor;
use rusb::{Context, DeviceHandle, UsbContext};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// What the scan must find: ids plus the descriptor strings that
/// disambiguate the shared id pair
#[derive(Debug, Clone)]
pub struct DeviceIdentity {
    pub vendor_id: u16,
    pub product_id: u16,
    pub manufacturer: String,
    pub product: String,
}

/// Discovery failures
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Device enumeration itself failed
    #[error("Failed to enumerate USB devices: {0}")]
    Enumerate(#[from] rusb::Error),

    /// The scan completed without accepting a device; fatal to the caller
    #[error(
        "Could not find USB device {manufacturer}/{product} (vid={vendor_id:#06x} pid={product_id:#06x})"
    )]
    NotFound {
        vendor_id: u16,
        product_id: u16,
        manufacturer: String,
        product: String,
    },
}

/// The accepted, verified device
///
/// Exclusively owned by the USB worker for the process lifetime; the
/// underlying handle closes when this drops.
pub struct BoundDevice {
    handle: DeviceHandle<Context>,
    manufacturer_index: Option<u8>,
    product_index: Option<u8>,
    timeout: Duration,
}

impl BoundDevice {
    pub(crate) fn handle(&self) -> &DeviceHandle<Context> {
        &self.handle
    }

    pub(crate) fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// One enumerated device, for the list-devices mode
#[derive(Debug, Clone)]
pub struct CandidateSummary {
    pub bus_number: u8,
    pub address: u8,
    pub vendor_id: u16,
    pub product_id: u16,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
}

/// An enumerated device the scan may try to open
///
/// Abstracted from rusb so the scan logic runs against simulated device
/// lists in tests.
trait Candidate {
    type Opened: OpenedCandidate;

    /// Vendor/product pair, None when the descriptor cannot be read
    fn ids(&self) -> Option<(u16, u16)>;

    fn open(&self) -> Result<Self::Opened, rusb::Error>;
}

/// An opened candidate whose descriptor strings can be queried
///
/// Dropping it closes the handle.
trait OpenedCandidate {
    fn manufacturer(&self) -> Result<String, rusb::Error>;
    fn product(&self) -> Result<String, rusb::Error>;
}

/// Scan candidates in order, returning the first that matches the identity
///
/// Open or query failures on a candidate are warnings, not errors: the
/// scan moves on. Every opened candidate that is not accepted drops here,
/// closing its handle, before the next one is examined.
fn select_device<C: Candidate>(
    candidates: impl IntoIterator<Item = C>,
    identity: &DeviceIdentity,
) -> Option<C::Opened> {
    for candidate in candidates {
        let Some((vendor_id, product_id)) = candidate.ids() else {
            continue;
        };
        if vendor_id != identity.vendor_id || product_id != identity.product_id {
            continue;
        }

        debug!("Found device with {:04x}:{:04x}", vendor_id, product_id);

        let opened = match candidate.open() {
            Ok(opened) => opened,
            Err(e) => {
                warn!("Cannot open USB device: {}", e);
                continue;
            }
        };

        let manufacturer = match opened.manufacturer() {
            Ok(s) => s,
            Err(e) => {
                warn!("Cannot query manufacturer for device: {}", e);
                continue;
            }
        };
        debug!("Device vendor is {}", manufacturer);
        if manufacturer != identity.manufacturer {
            continue;
        }

        let product = match opened.product() {
            Ok(s) => s,
            Err(e) => {
                warn!("Cannot query product for device: {}", e);
                continue;
            }
        };
        debug!("Device product is {}", product);
        if product == identity.product {
            info!("Bound device {}/{}", manufacturer, product);
            return Some(opened);
        }
    }

    None
}

struct UsbCandidate {
    device: rusb::Device<Context>,
    timeout: Duration,
}

impl Candidate for UsbCandidate {
    type Opened = BoundDevice;

    fn ids(&self) -> Option<(u16, u16)> {
        let descriptor = self.device.device_descriptor().ok()?;
        Some((descriptor.vendor_id(), descriptor.product_id()))
    }

    fn open(&self) -> Result<BoundDevice, rusb::Error> {
        let descriptor = self.device.device_descriptor()?;
        let handle = self.device.open()?;

        Ok(BoundDevice {
            handle,
            manufacturer_index: descriptor.manufacturer_string_index(),
            product_index: descriptor.product_string_index(),
            timeout: self.timeout,
        })
    }
}

impl OpenedCandidate for BoundDevice {
    fn manufacturer(&self) -> Result<String, rusb::Error> {
        let index = self.manufacturer_index.ok_or(rusb::Error::NotFound)?;
        descriptor::read_string_latin1(&self.handle, index, self.timeout)
    }

    fn product(&self) -> Result<String, rusb::Error> {
        let index = self.product_index.ok_or(rusb::Error::NotFound)?;
        descriptor::read_string_latin1(&self.handle, index, self.timeout)
    }
}

/// Scan all attached devices for the identity and bind the first match
///
/// `NotFound` is terminal: the caller must not start serving frames.
pub fn find_device(
    context: &Context,
    identity: &DeviceIdentity,
    timeout: Duration,
) -> Result<BoundDevice, DiscoveryError> {
    let devices = context.devices()?;
    let candidates = devices.iter().map(|device| UsbCandidate { device, timeout });

    select_device(candidates, identity).ok_or_else(|| DiscoveryError::NotFound {
        vendor_id: identity.vendor_id,
        product_id: identity.product_id,
        manufacturer: identity.manufacturer.clone(),
        product: identity.product.clone(),
    })
}

/// Enumerate every attached device with its descriptor strings
///
/// Devices that cannot be opened still appear, without strings; this is
/// diagnostic output, not a filter.
pub fn list_candidates(context: &Context) -> Result<Vec<CandidateSummary>, rusb::Error> {
    let mut summaries = Vec::new();

    for device in context.devices()?.iter() {
        let Ok(descriptor) = device.device_descriptor() else {
            continue;
        };

        let strings = device.open().ok().map(|handle| {
            let manufacturer = descriptor
                .manufacturer_string_index()
                .and_then(|index| handle.read_string_descriptor_ascii(index).ok());
            let product = descriptor
                .product_string_index()
                .and_then(|index| handle.read_string_descriptor_ascii(index).ok());
            (manufacturer, product)
        });
        let (manufacturer, product) = strings.unwrap_or((None, None));

        summaries.push(CandidateSummary {
            bus_number: device.bus_number(),
            address: device.address(),
            vendor_id: descriptor.vendor_id(),
            product_id: descriptor.product_id(),
            manufacturer,
            product,
        });
    }

    Ok(summaries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    fn udmx_identity() -> DeviceIdentity {
        DeviceIdentity {
            vendor_id: 0x16c0,
            product_id: 0x05dc,
            manufacturer: "www.anyma.ch".to_string(),
            product: "uDMX".to_string(),
        }
    }

    #[derive(Default)]
    struct Counters {
        opened: Cell<u32>,
        closed: Cell<u32>,
    }

    enum Behaviour {
        BadDescriptor,
        WrongIds,
        OpenFails,
        ManufacturerQueryFails,
        WrongManufacturer,
        ProductQueryFails,
        WrongProduct,
        Genuine,
    }

    struct FakeCandidate {
        behaviour: Behaviour,
        counters: Rc<Counters>,
    }

    impl FakeCandidate {
        fn new(behaviour: Behaviour) -> (Self, Rc<Counters>) {
            let counters = Rc::new(Counters::default());
            (
                Self {
                    behaviour,
                    counters: Rc::clone(&counters),
                },
                counters,
            )
        }
    }

    struct FakeOpened {
        manufacturer: Result<String, rusb::Error>,
        product: Result<String, rusb::Error>,
        counters: Rc<Counters>,
    }

    impl Drop for FakeOpened {
        fn drop(&mut self) {
            self.counters.closed.set(self.counters.closed.get() + 1);
        }
    }

    impl Candidate for FakeCandidate {
        type Opened = FakeOpened;

        fn ids(&self) -> Option<(u16, u16)> {
            match self.behaviour {
                Behaviour::BadDescriptor => None,
                Behaviour::WrongIds => Some((0x1d6b, 0x0002)),
                _ => Some((0x16c0, 0x05dc)),
            }
        }

        fn open(&self) -> Result<FakeOpened, rusb::Error> {
            if matches!(self.behaviour, Behaviour::OpenFails) {
                return Err(rusb::Error::Access);
            }
            self.counters.opened.set(self.counters.opened.get() + 1);

            Ok(FakeOpened {
                manufacturer: match self.behaviour {
                    Behaviour::ManufacturerQueryFails => Err(rusb::Error::Pipe),
                    Behaviour::WrongManufacturer => Ok("Objective Development".to_string()),
                    _ => Ok("www.anyma.ch".to_string()),
                },
                product: match self.behaviour {
                    Behaviour::ProductQueryFails => Err(rusb::Error::Pipe),
                    Behaviour::WrongProduct => Ok("USBasp".to_string()),
                    _ => Ok("uDMX".to_string()),
                },
                counters: Rc::clone(&self.counters),
            })
        }
    }

    impl OpenedCandidate for FakeOpened {
        fn manufacturer(&self) -> Result<String, rusb::Error> {
            self.manufacturer.clone()
        }

        fn product(&self) -> Result<String, rusb::Error> {
            self.product.clone()
        }
    }

    #[test]
    fn test_scan_accepts_the_genuine_device_among_impostors() {
        let (candidates, counters): (Vec<_>, Vec<_>) = [
            Behaviour::WrongIds,
            Behaviour::BadDescriptor,
            Behaviour::OpenFails,
            Behaviour::ManufacturerQueryFails,
            Behaviour::WrongManufacturer,
            Behaviour::ProductQueryFails,
            Behaviour::WrongProduct,
            Behaviour::Genuine,
        ]
        .into_iter()
        .map(FakeCandidate::new)
        .unzip();

        let accepted = select_device(candidates, &udmx_identity());
        assert!(accepted.is_some());

        // Every rejected candidate that was opened has been closed exactly once
        for counters in &counters[..7] {
            assert_eq!(counters.closed.get(), counters.opened.get());
            assert!(counters.opened.get() <= 1);
        }

        // The accepted device is still open, and closes when dropped
        assert_eq!(counters[7].opened.get(), 1);
        assert_eq!(counters[7].closed.get(), 0);
        drop(accepted);
        assert_eq!(counters[7].closed.get(), 1);
    }

    #[test]
    fn test_scan_without_match_closes_everything() {
        let (candidates, counters): (Vec<_>, Vec<_>) = [
            Behaviour::WrongManufacturer,
            Behaviour::OpenFails,
            Behaviour::WrongProduct,
            Behaviour::ProductQueryFails,
        ]
        .into_iter()
        .map(FakeCandidate::new)
        .unzip();

        assert!(select_device(candidates, &udmx_identity()).is_none());

        for counters in &counters {
            assert_eq!(counters.closed.get(), counters.opened.get());
        }
    }

    #[test]
    fn test_first_match_wins() {
        let (candidates, counters): (Vec<_>, Vec<_>) = [Behaviour::Genuine, Behaviour::Genuine]
            .into_iter()
            .map(FakeCandidate::new)
            .unzip();

        let accepted = select_device(candidates, &udmx_identity());
        assert!(accepted.is_some());

        // The second genuine device was never even opened
        assert_eq!(counters[0].opened.get(), 1);
        assert_eq!(counters[1].opened.get(), 0);
    }

    #[test]
    fn test_empty_scan_is_not_found() {
        let candidates: Vec<FakeCandidate> = Vec::new();
        assert!(select_device(candidates, &udmx_identity()).is_none());
    }

    #[test]
    fn test_not_found_names_the_expected_device() {
        let identity = udmx_identity();
        let err = DiscoveryError::NotFound {
            vendor_id: identity.vendor_id,
            product_id: identity.product_id,
            manufacturer: identity.manufacturer,
            product: identity.product,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("www.anyma.ch/uDMX"));
        assert!(msg.contains("0x16c0"));
        assert!(msg.contains("0x05dc"));
    }
}
