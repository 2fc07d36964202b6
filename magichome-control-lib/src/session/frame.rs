use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Error, Result};

/// Magic prefix of every wrapped (addressable) frame.
pub const ADDRESSABLE_MAGIC: [u8; 4] = [0xb0, 0xb1, 0xb2, 0xb3];

/// Constant bytes following the magic prefix.
const ADDRESSABLE_VERSION: [u8; 3] = [0x00, 0x01, 0x01];

/// Sum of all bytes, modulo 256.
pub fn checksum(payload: &[u8]) -> u8 {
    payload.iter().fold(0u8, |acc, &byte| acc.wrapping_add(byte))
}

/// Appends the checksum byte to `payload`, producing the on-wire frame.
///
/// Values are written as given, callers clamp channel values beforehand.
pub fn encode(payload: &[u8]) -> Bytes {
    let mut frame = BytesMut::with_capacity(payload.len() + 1);
    frame.extend_from_slice(payload);
    frame.put_u8(checksum(payload));
    frame.freeze()
}

/// Builds the pre-checksum payload of an addressable frame.
///
/// `body` starts with the command opcode and ends with the terminator byte,
/// its length goes into the big-endian length field.
pub fn wrap_addressable(sequence: u8, body: &[u8]) -> Result<Vec<u8>> {
    let length = u16::try_from(body.len()).map_err(|_| {
        Error::InvalidArgument(format!("addressable body of {} bytes is too long", body.len()))
    })?;

    let mut payload = BytesMut::with_capacity(ADDRESSABLE_MAGIC.len() + 6 + body.len());
    payload.extend_from_slice(&ADDRESSABLE_MAGIC);
    payload.extend_from_slice(&ADDRESSABLE_VERSION);
    payload.put_u8(sequence);
    payload.put_u16(length);
    payload.extend_from_slice(body);
    Ok(payload.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_wraps() {
        assert_eq!(checksum(&[]), 0);
        assert_eq!(checksum(&[0x71, 0x23, 0x0f]), 0xa3);
        assert_eq!(checksum(&[0xff, 0x02]), 0x01);
        assert_eq!(checksum(&[0x80; 4]), 0x00);
    }

    #[test]
    fn test_encode_appends_single_checksum_byte() {
        for payload in [vec![], vec![0x81, 0x8a, 0x8b], vec![0xff; 300]] {
            let frame = encode(&payload);
            assert_eq!(frame.len(), payload.len() + 1);
            assert_eq!(&frame[..payload.len()], payload.as_slice());
            let sum: u32 = payload.iter().map(|&b| b as u32).sum();
            assert_eq!(frame[payload.len()] as u32, sum % 256);
        }
    }

    #[test]
    fn test_query_frame() {
        assert_eq!(encode(&[0x81, 0x8a, 0x8b]).as_ref(), &[0x81, 0x8a, 0x8b, 0x96]);
    }

    #[test]
    fn test_wrap_addressable_header() {
        let body = [0x42, 0x02, 0x32, 0x32, 0x00];
        let payload = wrap_addressable(7, &body).unwrap();
        assert_eq!(
            payload,
            vec![0xb0, 0xb1, 0xb2, 0xb3, 0x00, 0x01, 0x01, 0x07, 0x00, 0x05, 0x42, 0x02, 0x32, 0x32, 0x00]
        );
    }

    #[test]
    fn test_wrap_addressable_length_is_big_endian() {
        let body = vec![0u8; 0x0123];
        let payload = wrap_addressable(0, &body).unwrap();
        assert_eq!(payload[8], 0x01);
        assert_eq!(payload[9], 0x23);
        assert_eq!(payload.len(), 10 + body.len());
    }

    #[test]
    fn test_wrap_addressable_rejects_oversized_body() {
        let body = vec![0u8; u16::MAX as usize + 1];
        assert!(matches!(
            wrap_addressable(0, &body),
            Err(Error::InvalidArgument(_))
        ));
    }
}
