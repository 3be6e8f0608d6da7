//! A Bitcoin script is just a varint-length-prefixed byte string; no
//! interpretation happens here (script execution is out of scope).

use std::io;

use crate::reader::Cursor;
use crate::{BitcoinSerialize, SerializationError, Varint};

pub fn read<'a>(cursor: &mut Cursor<'a>) -> Result<Vec<u8>, SerializationError> {
    let len = cursor.pull_varint()?;
    Ok(cursor.pull_bytes(len as usize)?.to_vec())
}

pub fn write<W: io::Write>(script: &[u8], mut target: W) -> Result<(), io::Error> {
    Varint::from(script.len()).bitcoin_serialize(&mut target)?;
    target.write_all(script)
}

pub fn serialized_len(script: &[u8]) -> usize {
    Varint::size(script.len()) + script.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::Cursor;

    #[test]
    fn roundtrip() {
        let script = vec![0x76, 0xa9, 0x14, 0x00, 0x01];
        let mut bytes = Vec::new();
        write(&script, &mut bytes).unwrap();
        assert_eq!(bytes.len(), serialized_len(&script));

        let mut cursor = Cursor::new(&bytes);
        let decoded = read(&mut cursor).unwrap();
        assert_eq!(decoded, script);
        assert_eq!(cursor.remaining(), 0);
    }
}
