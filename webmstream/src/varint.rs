//! EBML VarInt codec.
//!
//! IDs are 1-4 byte VarInts whose decoded value keeps the marker bit, so
//! an ID is the bit-exact header bytes read as a big-endian integer.
//! Sizes are 1-8 byte VarInts with the marker stripped; a size whose
//! payload bits are all ones is the unknown-size sentinel.

use nom::combinator::peek;

use crate::{take, Error, Id, IResult};

/// Size payload of the 8-byte unknown-size header (56 bits, all ones).
pub const UNKNOWN_SIZE: u64 = 0x00FF_FFFF_FFFF_FFFF;

pub(crate) fn count_leading_zero_bits(input: u8) -> u8 {
    const MASK: u8 = 0b1000_0000;
    for leading_zeros in 0..8 {
        if input >= (MASK >> leading_zeros) {
            return leading_zeros;
        }
    }
    8
}

/// Parse an element ID, marker bit retained in the value.
pub fn parse_id(input: &[u8]) -> IResult<&[u8], Id> {
    let (input, first_byte) = peek(take(1usize))(input)?;
    let first_byte = first_byte[0];

    let num_bytes = count_leading_zero_bits(first_byte) + 1;

    // IDs can only have up to 4 bytes in Matroska
    if num_bytes > 4 {
        return Err(Error::InvalidId);
    }

    let (input, varint_bytes) = take(num_bytes)(input)?;
    let mut value_buffer = [0u8; 4];
    value_buffer[(4 - varint_bytes.len())..].copy_from_slice(varint_bytes);
    let id = u32::from_be_bytes(value_buffer);

    Ok((input, Id::new(id)))
}

/// Parse an element size. `None` is the unknown-size sentinel.
pub fn parse_size(first_input: &[u8]) -> IResult<&[u8], Option<u64>> {
    let (input, first_byte) = peek(take(1usize))(first_input)?;
    let first_byte = first_byte[0];

    let vint_prefix_size = count_leading_zero_bits(first_byte) + 1;

    // Maximum 8 bytes, i.e. first byte can't be 0
    if vint_prefix_size > 8 {
        return Err(Error::InvalidVarint);
    }

    let (input, varint_bytes) = take(vint_prefix_size)(input)?;
    let mut value_buffer = [0u8; 8];
    value_buffer[(8 - varint_bytes.len())..].copy_from_slice(varint_bytes);
    let mut value = u64::from_be_bytes(value_buffer);

    // discard the varint prefix (zeros + marker bit)
    let num_bits_in_value = 7 * u32::from(vint_prefix_size);
    let bitmask = (1u64 << num_bits_in_value) - 1;
    value &= bitmask;

    // All VINT_DATA bits set to 1 means an unknown size
    let result = (value != bitmask).then_some(value);

    Ok((input, result))
}

/// Encode an ID in the fewest bytes its marker position allows.
pub fn encode_id(id: u32) -> Vec<u8> {
    let mut count = 0;
    let mut mask: u32 = 0xFF;
    while id > mask && count < 3 {
        mask = (mask << 7) | 0x7F;
        count += 1;
    }

    let bytes = id.to_be_bytes();
    bytes[(3 - count)..].to_vec()
}

/// Encode a size in the shortest length whose payload covers the value.
///
/// With `force_full_width` the encoding is always eight bytes, leaving
/// room to rewrite any representable size (or [`UNKNOWN_SIZE`]) in place.
pub fn encode_size(size: u64, force_full_width: bool) -> Vec<u8> {
    let mut count = 0usize;
    let mut size_flag: u64 = 0x80;

    if force_full_width {
        count = 7;
        size_flag = 0x01;
    } else {
        let mut mask: u64 = 0x7F;
        while size > (mask - 1) && count < 7 {
            mask = (mask << 7) | 0x7F;
            size_flag >>= 1;
            count += 1;
        }
    }

    let mut buf = vec![0u8; count + 1];
    let mut rest = size;
    for i in (1..=count).rev() {
        buf[i] = (rest & 0xFF) as u8;
        rest >>= 8;
    }
    buf[0] = (size_flag | (rest & (size_flag - 1))) as u8;
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    const EMPTY: &[u8] = &[];
    const UNKNOWN_VARINT: &[u8] = &[0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF];

    #[test]
    fn test_count_leading_zero_bits() {
        assert_eq!(count_leading_zero_bits(0b10000000), 0);
        assert_eq!(count_leading_zero_bits(0b01000000), 1);
        assert_eq!(count_leading_zero_bits(0b00000001), 7);
        assert_eq!(count_leading_zero_bits(0b00000000), 8);
    }

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id(&[0x1A, 0x45, 0xDF, 0xA3]), Ok((EMPTY, Id::Ebml)));
        assert_eq!(parse_id(&[0xA3]), Ok((EMPTY, Id::SimpleBlock)));
        assert_eq!(parse_id(&[0x23, 0x83, 0xE3]), Ok((EMPTY, Id::FrameRate)));

        // The marker bit stays in the value.
        let (_, id) = parse_id(&[0x80]).unwrap();
        assert_eq!(id.value(), 0x80);

        // 1 byte missing from FrameRate (3 bytes long)
        assert_eq!(parse_id(&[0x23, 0x83]), Err(Error::NeedData));

        // Longer than 4 bytes
        assert_eq!(parse_id(&[0x08, 0x45, 0xDF, 0xA3]), Err(Error::InvalidId));

        let (_, id) = parse_id(&[0x19, 0xAB, 0xCD, 0xEF]).unwrap();
        assert_eq!(id, Id::Unknown(0x19AB_CDEF));
    }

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size(&[0x9F]), Ok((EMPTY, Some(31))));
        assert_eq!(parse_size(&[0x81]), Ok((EMPTY, Some(1))));
        assert_eq!(parse_size(&[0x53, 0xAC]), Ok((EMPTY, Some(5036))));

        // A 1-byte all-ones size is the unknown-size sentinel.
        assert_eq!(parse_size(&[0xFF]), Ok((EMPTY, None)));
        assert_eq!(parse_size(UNKNOWN_VARINT), Ok((EMPTY, None)));

        assert_eq!(parse_size(&[0x00, 0xAC]), Err(Error::InvalidVarint));
        assert_eq!(parse_size(&[0x40]), Err(Error::NeedData));
    }

    #[test]
    fn test_encode_id() {
        assert_eq!(encode_id(0x80), vec![0x80]);
        assert_eq!(encode_id(0x4286), vec![0x42, 0x86]);
        assert_eq!(encode_id(0x2AD7B1), vec![0x2A, 0xD7, 0xB1]);
        assert_eq!(encode_id(0x1A45DFA3), vec![0x1A, 0x45, 0xDF, 0xA3]);
    }

    #[test]
    fn test_encode_size() {
        assert_eq!(encode_size(0, false), vec![0x80]);
        assert_eq!(encode_size(31, false), vec![0x9F]);
        // 0x7F needs two bytes: a 1-byte payload of all ones is the sentinel.
        assert_eq!(encode_size(0x7F, false), vec![0x40, 0x7F]);
        assert_eq!(encode_size(5036, false), vec![0x53, 0xAC]);
    }

    #[test]
    fn test_encode_size_full_width() {
        assert_eq!(
            encode_size(UNKNOWN_SIZE, true),
            vec![0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]
        );
        assert_eq!(
            encode_size(2, true),
            vec![0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x02]
        );
    }

    #[test]
    fn test_size_roundtrip() {
        for size in [0u64, 1, 126, 127, 300, 0x3FFE, 0x4000, 1 << 35] {
            let encoded = encode_size(size, false);
            assert_eq!(parse_size(&encoded), Ok((EMPTY, Some(size))));
            let full = encode_size(size, true);
            assert_eq!(parse_size(&full), Ok((EMPTY, Some(size))));
        }
    }

    #[test]
    fn test_id_roundtrip() {
        for id in [0x80u32, 0xA3, 0x4286, 0x2AD7B1, 0x1A45DFA3] {
            let encoded = encode_id(id);
            let (rest, parsed) = parse_id(&encoded).unwrap();
            assert_eq!(rest, EMPTY);
            assert_eq!(parsed.value(), id);
        }
    }
}
