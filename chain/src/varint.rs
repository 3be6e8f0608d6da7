//! Bitcoin's variable-length unsigned integer ("varint" / `CompactSize`).
//!
//! Prefix byte `< 0xFD` encodes the value directly; `0xFD`, `0xFE`, `0xFF`
//! introduce 2, 4, or 8 further little-endian bytes respectively. Every
//! count and length prefix in the block file format (transaction counts,
//! input/output counts, script lengths, witness stack sizes) uses this
//! encoding.

use crate::{BitcoinDeserialize, BitcoinSerialize, SerializationError};
use byteorder::{LittleEndian, WriteBytesExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Varint(u64);

impl Varint {
    pub fn from(value: usize) -> Varint {
        Varint(value as u64)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    /// Number of bytes this value would occupy on the wire.
    pub fn size(value: usize) -> usize {
        if value < 0xFD {
            1
        } else if value <= u16::MAX as usize {
            3
        } else if value <= u32::MAX as usize {
            5
        } else {
            9
        }
    }
}

impl BitcoinSerialize for Varint {
    fn bitcoin_serialize<W: std::io::Write>(&self, mut target: W) -> Result<(), std::io::Error> {
        if self.0 < 0xFD {
            target.write_all(&[self.0 as u8])
        } else if self.0 <= u16::MAX as u64 {
            target.write_all(&[0xFD])?;
            target.write_u16::<LittleEndian>(self.0 as u16)
        } else if self.0 <= u32::MAX as u64 {
            target.write_all(&[0xFE])?;
            target.write_u32::<LittleEndian>(self.0 as u32)
        } else {
            target.write_all(&[0xFF])?;
            target.write_u64::<LittleEndian>(self.0)
        }
    }
}

impl BitcoinDeserialize for Varint {
    fn bitcoin_deserialize<R: std::io::Read>(mut reader: R) -> Result<Varint, SerializationError> {
        let first = u8::bitcoin_deserialize(&mut reader)?;
        match first {
            0xFD => Ok(Varint(u16::bitcoin_deserialize(&mut reader)? as u64)),
            0xFE => Ok(Varint(u32::bitcoin_deserialize(&mut reader)? as u64)),
            0xFF => Ok(Varint(u64::bitcoin_deserialize(&mut reader)?)),
            small => Ok(Varint(small as u64)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BitcoinSerialize;

    fn roundtrip(bytes: &[u8], expected: u64) {
        let v = Varint::bitcoin_deserialize(bytes).unwrap();
        assert_eq!(v.value(), expected);
        let mut out = Vec::new();
        v.bitcoin_serialize(&mut out).unwrap();
        assert_eq!(out, bytes);
    }

    #[test]
    fn one_byte_prefix() {
        roundtrip(&[0x00], 0);
        roundtrip(&[0xFC], 0xFC);
    }

    #[test]
    fn two_byte_prefix() {
        roundtrip(&[0xFD, 0xFD, 0x00], 0xFD);
        roundtrip(&[0xFD, 0xFF, 0xFF], 0xFFFF);
    }

    #[test]
    fn four_byte_prefix() {
        roundtrip(&[0xFE, 0x00, 0x00, 0x01, 0x00], 0x0001_0000);
    }

    #[test]
    fn eight_byte_prefix() {
        roundtrip(
            &[0xFF, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00],
            0x0000_0001_0000_0000,
        );
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// `encode(decode(bytes)) == bytes` for every canonical encoding.
            #[test]
            fn encode_then_decode_is_identity(value: u64) {
                let mut bytes = Vec::new();
                Varint(value).bitcoin_serialize(&mut bytes).unwrap();
                let decoded = Varint::bitcoin_deserialize(&bytes[..]).unwrap();
                prop_assert_eq!(decoded.value(), value);
                prop_assert_eq!(bytes.len(), Varint::size(value as usize));
            }
        }
    }
}
