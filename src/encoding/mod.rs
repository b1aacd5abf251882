// Primitive encodings shared by the writer and the reader.
//
// Every integer in an SSTable is fixed-width little-endian. A record is
//
//   u32 key_len | key | u32 value_len | value
//
// with no delimiters, so keys and values may hold arbitrary bytes. A length
// field equal to SEPARATOR never describes a key or value; it marks the start
// of the index block (or a bare separator) and the trailer.

use std::io::{self, Read};

use crate::error::{display_key, Error, Result};

pub const SEPARATOR: u32 = 0xFFFF_FFFF;

/// Longest key or value that can be framed without colliding with SEPARATOR.
pub const MAX_FIELD_LEN: usize = 0xFFFF_FFFE;

/// Separator plus the u64 offset of the index block.
pub const TRAILER_LEN: u64 = 4 + 8;

const RECORD_HEADER_LEN: u64 = 4 + 4;

pub fn encode_u32(buf: &mut Vec<u8>, n: u32) {
    buf.extend_from_slice(&n.to_le_bytes());
}

pub fn encode_u64(buf: &mut Vec<u8>, n: u64) {
    buf.extend_from_slice(&n.to_le_bytes());
}

pub fn decode_u32(data: &[u8]) -> Result<u32> {
    let bytes: [u8; 4] = data
        .get(..4)
        .and_then(|b| b.try_into().ok())
        .ok_or(Error::TruncatedInput {
            what: "u32",
            needed: 4,
            available: data.len() as u64,
        })?;
    Ok(u32::from_le_bytes(bytes))
}

pub fn decode_u64(data: &[u8]) -> Result<u64> {
    let bytes: [u8; 8] = data
        .get(..8)
        .and_then(|b| b.try_into().ok())
        .ok_or(Error::TruncatedInput {
            what: "u64",
            needed: 8,
            available: data.len() as u64,
        })?;
    Ok(u64::from_le_bytes(bytes))
}

/// Converts a key or value length into its u32 length prefix.
pub(crate) fn field_len(field: &'static str, len: usize) -> Result<u32> {
    if len > MAX_FIELD_LEN {
        return Err(Error::RecordTooLarge { field, len });
    }
    Ok(len as u32)
}

pub fn encoded_len(key: &[u8], value: &[u8]) -> u64 {
    RECORD_HEADER_LEN + key.len() as u64 + value.len() as u64
}

/// Appends one record to `buf`. Nothing is appended if either field is too
/// large.
pub fn encode_record(buf: &mut Vec<u8>, key: &[u8], value: &[u8]) -> Result<()> {
    let key_len = field_len("key", key.len())?;
    let value_len = field_len("value", value.len())?;
    buf.reserve(encoded_len(key, value) as usize);
    encode_u32(buf, key_len);
    buf.extend_from_slice(key);
    encode_u32(buf, value_len);
    buf.extend_from_slice(value);
    Ok(())
}

/// The first length field of whatever follows the current position.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Frame {
    /// The stream ended cleanly on a record boundary.
    End,
    Separator,
    KeyLen(u32),
}

// Reads until `buf` is full or the stream ends, returning the bytes read.
fn fill<R: Read>(r: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut n = 0;
    while n < buf.len() {
        match r.read(&mut buf[n..]) {
            Ok(0) => break,
            Ok(k) => n += k,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(n)
}

fn read_array<R: Read, const N: usize>(r: &mut R, what: &'static str) -> Result<[u8; N]> {
    let mut buf = [0_u8; N];
    let n = fill(r, &mut buf).map_err(|e| Error::io(what, e))?;
    if n < N {
        return Err(Error::TruncatedInput {
            what,
            needed: N as u64,
            available: n as u64,
        });
    }
    Ok(buf)
}

pub(crate) fn read_u32<R: Read>(r: &mut R, what: &'static str) -> Result<u32> {
    Ok(u32::from_le_bytes(read_array(r, what)?))
}

pub(crate) fn read_u64<R: Read>(r: &mut R, what: &'static str) -> Result<u64> {
    Ok(u64::from_le_bytes(read_array(r, what)?))
}

/// Reads exactly `len` bytes. Allocation grows with what the stream actually
/// yields, so a corrupt length cannot force a huge up-front buffer.
pub(crate) fn read_bytes<R: Read>(r: &mut R, len: u32, what: &'static str) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    r.by_ref()
        .take(len as u64)
        .read_to_end(&mut out)
        .map_err(|e| Error::io(what, e))?;
    if out.len() < len as usize {
        return Err(Error::TruncatedInput {
            what,
            needed: len as u64,
            available: out.len() as u64,
        });
    }
    Ok(out)
}

pub(crate) fn read_frame<R: Read>(r: &mut R) -> Result<Frame> {
    let mut buf = [0_u8; 4];
    let n = fill(r, &mut buf).map_err(|e| Error::io("read key length", e))?;
    match n {
        0 => Ok(Frame::End),
        4 => match u32::from_le_bytes(buf) {
            SEPARATOR => Ok(Frame::Separator),
            len => Ok(Frame::KeyLen(len)),
        },
        _ => Err(Error::TruncatedInput {
            what: "key length",
            needed: 4,
            available: n as u64,
        }),
    }
}

/// Reads the key and value length of a record whose key length has already
/// been consumed, leaving the stream at the start of the value.
pub(crate) fn read_record_head<R: Read>(r: &mut R, key_len: u32) -> Result<(Vec<u8>, u32)> {
    let key = read_bytes(r, key_len, "key")?;
    let value_len = read_u32(r, "value length")?;
    if value_len == SEPARATOR {
        return Err(Error::corrupt(format!(
            "separator in value length of key {:?}",
            display_key(&key)
        )));
    }
    Ok((key, value_len))
}

/// Reads the remainder of a record whose key length has already been consumed.
pub(crate) fn read_record_body<R: Read>(
    r: &mut R,
    key_len: u32,
) -> Result<(Vec<u8>, Vec<u8>, u64)> {
    let (key, value_len) = read_record_head(r, key_len)?;
    let value = read_bytes(r, value_len, "value")?;
    let consumed = encoded_len(&key, &value);
    Ok((key, value, consumed))
}

/// Decodes the record at the stream's current position, returning the key,
/// the value and the number of bytes consumed.
pub fn decode_record<R: Read>(r: &mut R) -> Result<(Vec<u8>, Vec<u8>, u64)> {
    match read_frame(r)? {
        Frame::KeyLen(key_len) => read_record_body(r, key_len),
        Frame::Separator => Err(Error::corrupt("separator where a record was expected")),
        Frame::End => Err(Error::TruncatedInput {
            what: "key length",
            needed: 4,
            available: 0,
        }),
    }
}

/// A bounds-checked cursor over an in-memory buffer.
pub(crate) struct SliceReader<'a> {
    data: &'a [u8],
    idx: usize,
}

impl<'a> SliceReader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        SliceReader { data, idx: 0 }
    }

    fn remaining(&self) -> &'a [u8] {
        &self.data[self.idx..]
    }

    pub(crate) fn read_u32(&mut self) -> Result<u32> {
        let n = decode_u32(self.remaining())?;
        self.idx += 4;
        Ok(n)
    }

    pub(crate) fn read_u64(&mut self) -> Result<u64> {
        let n = decode_u64(self.remaining())?;
        self.idx += 8;
        Ok(n)
    }

    pub(crate) fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        let rest = self.remaining();
        if rest.len() < n {
            return Err(Error::TruncatedInput {
                what: "bytes",
                needed: n as u64,
                available: rest.len() as u64,
            });
        }
        self.idx += n;
        Ok(&rest[..n])
    }

    pub(crate) fn left(&self) -> usize {
        self.data.len() - self.idx
    }

    pub(crate) fn at_end(&self) -> bool {
        self.idx >= self.data.len()
    }
}
