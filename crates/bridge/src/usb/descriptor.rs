//! USB string descriptor handling
//!
//! The uDMX check compares descriptor strings byte-for-byte against
//! known Latin-1 values, so descriptors are fetched raw and decoded
//! lossily rather than through a general UTF-16 path: any code unit
//! outside the single-byte range becomes `?`.

use rusb::{Context, DeviceHandle, Direction, Recipient, RequestType};
use std::time::Duration;

const REQUEST_GET_DESCRIPTOR: u8 = 0x06;
const DESCRIPTOR_TYPE_STRING: u8 = 0x03;

/// US English, the language id the uDMX firmware serves
const LANGID_EN_US: u16 = 0x0409;

/// Fetch a string descriptor and decode it to Latin-1
pub fn read_string_latin1(
    handle: &DeviceHandle<Context>,
    index: u8,
    timeout: Duration,
) -> Result<String, rusb::Error> {
    let mut buf = [0u8; 256];
    let request_type = rusb::request_type(Direction::In, RequestType::Standard, Recipient::Device);

    let len = handle.read_control(
        request_type,
        REQUEST_GET_DESCRIPTOR,
        ((DESCRIPTOR_TYPE_STRING as u16) << 8) | index as u16,
        LANGID_EN_US,
        &mut buf,
        timeout,
    )?;

    Ok(decode_latin1(&buf[..len]))
}

/// Decode a raw string descriptor to a Latin-1-representable string
///
/// The descriptor layout is bLength, bDescriptorType, then UTF-16LE code
/// units. The descriptor's own bLength bounds the decode when it claims
/// less than the transfer returned. Code units with a nonzero high byte
/// are outside Latin-1 and decode as `?`. Anything that is not a string
/// descriptor decodes to the empty string.
pub fn decode_latin1(raw: &[u8]) -> String {
    if raw.len() < 2 || raw[1] != DESCRIPTOR_TYPE_STRING {
        return String::new();
    }

    let effective = (raw[0] as usize).min(raw.len());
    let units = effective / 2;

    let mut out = String::with_capacity(units.saturating_sub(1));
    for i in 1..units {
        let low = raw[2 * i];
        let high = raw[2 * i + 1];
        out.push(if high != 0 { '?' } else { low as char });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(units: &[u16]) -> Vec<u8> {
        let mut raw = vec![(2 + units.len() * 2) as u8, DESCRIPTOR_TYPE_STRING];
        for unit in units {
            raw.extend_from_slice(&unit.to_le_bytes());
        }
        raw
    }

    #[test]
    fn test_decode_udmx_product_string() {
        let raw = descriptor(&[u16::from(b'u'), u16::from(b'D'), u16::from(b'M'), u16::from(b'X')]);
        assert_eq!(decode_latin1(&raw), "uDMX");
    }

    #[test]
    fn test_decode_substitutes_outside_latin1() {
        // "u\u{2588}X": the block character has a nonzero high byte
        let raw = descriptor(&[u16::from(b'u'), 0x2588, u16::from(b'X')]);
        assert_eq!(decode_latin1(&raw), "u?X");
    }

    #[test]
    fn test_decode_keeps_high_latin1() {
        // U+00FC is Latin-1 even though it is not ASCII
        let raw = descriptor(&[0x00fc, u16::from(b'd')]);
        assert_eq!(decode_latin1(&raw), "\u{fc}d");
    }

    #[test]
    fn test_decode_honors_blength() {
        // Descriptor claims 6 bytes (two code units) but the buffer has more
        let mut raw = descriptor(&[u16::from(b'a'), u16::from(b'b'), u16::from(b'c')]);
        raw[0] = 6;
        assert_eq!(decode_latin1(&raw), "ab");
    }

    #[test]
    fn test_decode_ignores_blength_past_buffer() {
        let mut raw = descriptor(&[u16::from(b'a')]);
        raw[0] = 200;
        assert_eq!(decode_latin1(&raw), "a");
    }

    #[test]
    fn test_decode_rejects_non_string_descriptor() {
        assert_eq!(decode_latin1(&[4, 0x01, b'a', 0]), "");
    }

    #[test]
    fn test_decode_empty_input() {
        assert_eq!(decode_latin1(&[]), "");
        assert_eq!(decode_latin1(&[2, DESCRIPTOR_TYPE_STRING]), "");
    }
}
