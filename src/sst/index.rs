use std::collections::BTreeMap;

use crate::{
    encoding::{encode_u32, encode_u64, field_len, SliceReader, SEPARATOR},
    error::{display_key, Error, Result},
};

/// Maps each key to the offsets of its records, in write order.
///
/// Keys are kept sorted so that an index block is byte-for-byte reproducible;
/// readers never depend on the block's key order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct OffsetIndex {
    entries: BTreeMap<Vec<u8>, Vec<u64>>,
}

impl OffsetIndex {
    pub fn new() -> Self {
        OffsetIndex {
            entries: BTreeMap::new(),
        }
    }

    pub(crate) fn push(&mut self, key: &[u8], offset: u64) {
        match self.entries.get_mut(key) {
            Some(offsets) => offsets.push(offset),
            None => {
                self.entries.insert(key.to_vec(), vec![offset]);
            }
        }
    }

    pub fn get(&self, key: &[u8]) -> Option<&[u64]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    /// Number of unique keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of records, counting every occurrence of every key.
    pub fn records(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn keys(&self) -> impl Iterator<Item = &[u8]> {
        self.entries.keys().map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &[u64])> {
        self.entries
            .iter()
            .map(|(k, offsets)| (k.as_slice(), offsets.as_slice()))
    }

    /// Every record start in the stream, ascending.
    pub(crate) fn boundaries(&self) -> Vec<u64> {
        let mut all: Vec<u64> = self.entries.values().flatten().copied().collect();
        all.sort_unstable();
        all
    }

    /// Appends the index block: the separator, the key count, then each key
    /// with its offsets.
    pub(crate) fn encode_block(&self, buf: &mut Vec<u8>) -> Result<()> {
        let count = u32::try_from(self.entries.len()).map_err(|_| Error::RecordTooLarge {
            field: "index",
            len: self.entries.len(),
        })?;
        encode_u32(buf, SEPARATOR);
        encode_u32(buf, count);
        for (key, offsets) in &self.entries {
            encode_u32(buf, field_len("key", key.len())?);
            buf.extend_from_slice(key);
            let n = u32::try_from(offsets.len()).map_err(|_| Error::RecordTooLarge {
                field: "offset list",
                len: offsets.len(),
            })?;
            encode_u32(buf, n);
            for offset in offsets {
                encode_u64(buf, *offset);
            }
        }
        Ok(())
    }

    /// Parses an index block spanning all of `block`. Every offset must fall
    /// inside a record stream of `data_len` bytes.
    pub(crate) fn decode_block(block: &[u8], data_len: u64) -> Result<Self> {
        Self::decode_entries(block, data_len).map_err(|e| match e {
            Error::TruncatedInput {
                what,
                needed,
                available,
            } => Error::corrupt(format!(
                "index block truncated reading {}: needed {} bytes, {} available",
                what, needed, available
            )),
            e => e,
        })
    }

    fn decode_entries(block: &[u8], data_len: u64) -> Result<Self> {
        let mut r = SliceReader::new(block);
        if r.read_u32()? != SEPARATOR {
            return Err(Error::corrupt("index block does not start with a separator"));
        }
        let count = r.read_u32()?;

        let mut index = OffsetIndex::new();
        for _ in 0..count {
            let key_len = r.read_u32()?;
            if key_len == SEPARATOR {
                return Err(Error::corrupt("separator in index key length"));
            }
            let key = r.read_bytes(key_len as usize)?;
            let n = r.read_u32()? as usize;
            if n == 0 {
                return Err(Error::corrupt(format!(
                    "index lists no offsets for key {:?}",
                    display_key(key)
                )));
            }
            if n > r.left() / 8 {
                return Err(Error::corrupt(format!(
                    "index block truncated: key {:?} lists {} offsets but only {} bytes remain",
                    display_key(key),
                    n,
                    r.left()
                )));
            }

            let mut offsets = Vec::with_capacity(n);
            for _ in 0..n {
                let offset = r.read_u64()?;
                if offset >= data_len {
                    return Err(Error::corrupt(format!(
                        "offset {} of key {:?} is past the record stream ({} bytes)",
                        offset,
                        display_key(key),
                        data_len
                    )));
                }
                if offsets.last().map_or(false, |prev| *prev >= offset) {
                    return Err(Error::corrupt(format!(
                        "offsets of key {:?} are not increasing",
                        display_key(key)
                    )));
                }
                offsets.push(offset);
            }

            if index.entries.insert(key.to_vec(), offsets).is_some() {
                return Err(Error::corrupt(format!(
                    "key {:?} appears twice in the index",
                    display_key(key)
                )));
            }
        }

        if !r.at_end() {
            return Err(Error::corrupt(format!(
                "{} trailing bytes after the index block",
                r.left()
            )));
        }
        Ok(index)
    }
}
