use std::io::{BufReader, Read, Seek, SeekFrom};

use serde::Serialize;
use tracing::{debug, warn};

use crate::{
    encoding::{
        decode_record, read_frame, read_record_head, read_u32, read_u64, Frame, SEPARATOR,
        TRAILER_LEN,
    },
    error::{display_key, Error, Result},
};

use super::index::OffsetIndex;

/// How a reader obtained its offset map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexSource {
    /// Parsed from the index block named by the trailer.
    Trailer,
    /// Rebuilt by scanning the records of a file without a trailer.
    Scan,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableStats {
    pub records: usize,
    pub unique_keys: usize,
    pub data_len: u64,
    pub file_len: u64,
    pub index_source: IndexSource,
}

// What the last TRAILER_LEN bytes of a file say.
enum Acquisition {
    HasIndex { index_start: u64 },
    NoIndex,
}

/// Serves lookups against a finished SSTable. The offset map is acquired
/// once, in [`Reader::open`]; lookups never touch the underlying store, and
/// fetches seek and read it.
#[derive(Debug)]
pub struct Reader<R>
where
    R: Read + Seek,
{
    r: R,
    index: OffsetIndex,
    // Every record start, ascending.
    boundaries: Vec<u64>,
    data_len: u64,
    file_len: u64,
    source: IndexSource,
}

impl<R> Reader<R>
where
    R: Read + Seek,
{
    pub fn open(mut r: R) -> Result<Self> {
        let file_len = r
            .seek(SeekFrom::End(0))
            .map_err(|e| Error::io("seek to end", e))?;
        if file_len < TRAILER_LEN {
            return Err(Error::corrupt(format!(
                "file of {} bytes is shorter than the {} byte trailer",
                file_len, TRAILER_LEN
            )));
        }

        let (index, data_len, source) = match probe_trailer(&mut r, file_len)? {
            Acquisition::HasIndex { index_start } => {
                let index = load_index(&mut r, file_len, index_start)?;
                (index, index_start, IndexSource::Trailer)
            }
            Acquisition::NoIndex => {
                warn!(file_len, "sstable has no trailer, rebuilding index by scan");
                let (index, data_len) = scan(&mut r, file_len)?;
                (index, data_len, IndexSource::Scan)
            }
        };

        debug!(
            ?source,
            unique_keys = index.len(),
            data_len,
            file_len,
            "opened sstable"
        );
        Ok(Reader {
            r,
            boundaries: index.boundaries(),
            index,
            data_len,
            file_len,
            source,
        })
    }

    /// Offsets of every record with `key`, in write order.
    pub fn lookup(&self, key: &[u8]) -> Result<&[u64]> {
        self.index.get(key).ok_or_else(|| Error::not_found(key))
    }

    /// Decodes the record starting at `offset`, which must be a record
    /// boundary.
    pub fn fetch_at(&mut self, offset: u64) -> Result<(Vec<u8>, Vec<u8>)> {
        let i = self.boundaries.binary_search(&offset).map_err(|_| {
            Error::corrupt(format!("offset {} is not a record boundary", offset))
        })?;
        let end = self
            .boundaries
            .get(i + 1)
            .copied()
            .unwrap_or(self.data_len);

        self.r
            .seek(SeekFrom::Start(offset))
            .map_err(|e| Error::io("seek to record", e))?;
        let (key, value, consumed) = decode_record(&mut self.r).map_err(|e| match e {
            Error::TruncatedInput { what, .. } => Error::corrupt(format!(
                "record at offset {} truncated reading {}",
                offset, what
            )),
            e => e,
        })?;

        if offset + consumed != end {
            return Err(Error::corrupt(format!(
                "record at offset {} spans {} bytes but the next record starts at {}",
                offset, consumed, end
            )));
        }
        Ok((key, value))
    }

    /// Every value written under `key`, in write order.
    pub fn get(&mut self, key: &[u8]) -> Result<Vec<Vec<u8>>> {
        let offsets = self.lookup(key)?.to_vec();
        let mut values = Vec::with_capacity(offsets.len());
        for offset in offsets {
            let (found, value) = self.fetch_at(offset)?;
            if found != key {
                return Err(Error::corrupt(format!(
                    "index maps {:?} to offset {} which holds {:?}",
                    display_key(key),
                    offset,
                    display_key(&found)
                )));
            }
            values.push(value);
        }
        Ok(values)
    }

    pub fn index(&self) -> &OffsetIndex {
        &self.index
    }

    pub fn index_source(&self) -> IndexSource {
        self.source
    }

    /// Length of the record stream, which is also where any index begins.
    pub fn data_len(&self) -> u64 {
        self.data_len
    }

    /// Number of unique keys.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &[u8]> {
        self.index.keys()
    }

    pub fn stats(&self) -> TableStats {
        TableStats {
            records: self.index.records(),
            unique_keys: self.index.len(),
            data_len: self.data_len,
            file_len: self.file_len,
            index_source: self.source,
        }
    }

    pub fn into_inner(self) -> R {
        self.r
    }
}

fn probe_trailer<R: Read + Seek>(r: &mut R, file_len: u64) -> Result<Acquisition> {
    r.seek(SeekFrom::Start(file_len - TRAILER_LEN))
        .map_err(|e| Error::io("seek to trailer", e))?;
    if read_u32(r, "trailer separator")? != SEPARATOR {
        return Ok(Acquisition::NoIndex);
    }
    let index_start = read_u64(r, "index offset")?;
    Ok(Acquisition::HasIndex { index_start })
}

fn load_index<R: Read + Seek>(r: &mut R, file_len: u64, index_start: u64) -> Result<OffsetIndex> {
    // The smallest index block is a separator and a zero key count.
    let block_end = file_len - TRAILER_LEN;
    if index_start > block_end || block_end - index_start < 8 {
        return Err(Error::corrupt(format!(
            "index offset {} out of range for a file of {} bytes",
            index_start, file_len
        )));
    }
    let block_len = block_end - index_start;

    r.seek(SeekFrom::Start(index_start))
        .map_err(|e| Error::io("seek to index", e))?;
    let mut block = Vec::new();
    r.take(block_len)
        .read_to_end(&mut block)
        .map_err(|e| Error::io("read index", e))?;
    if (block.len() as u64) < block_len {
        return Err(Error::corrupt(format!(
            "index block of {} bytes ended after {}",
            block_len,
            block.len()
        )));
    }

    OffsetIndex::decode_block(&block, index_start)
}

/// Rebuilds the offset map by decoding records from the start of the file
/// until it ends or a separator appears where a key length should be.
/// Anything after that separator must be an index block agreeing with the
/// records. Returns the map and the length of the record stream.
fn scan<R: Read + Seek>(r: &mut R, file_len: u64) -> Result<(OffsetIndex, u64)> {
    r.seek(SeekFrom::Start(0))
        .map_err(|e| Error::io("seek to start", e))?;
    let mut br = BufReader::new(r);

    let mut index = OffsetIndex::new();
    let mut pos = 0_u64;
    loop {
        let key_len = match read_frame(&mut br)? {
            Frame::End => return Ok((index, pos)),
            Frame::Separator => break,
            Frame::KeyLen(len) => len,
        };
        let (key, value_len) = read_record_head(&mut br, key_len)?;

        let value_start = pos + 8 + key_len as u64;
        let end = value_start + value_len as u64;
        if end > file_len {
            return Err(Error::TruncatedInput {
                what: "value",
                needed: value_len as u64,
                available: file_len - value_start,
            });
        }
        br.seek_relative(value_len as i64)
            .map_err(|e| Error::io("skip value", e))?;

        index.push(&key, pos);
        pos = end;
    }

    let mut block = SEPARATOR.to_le_bytes().to_vec();
    br.read_to_end(&mut block)
        .map_err(|e| Error::io("read after separator", e))?;
    if block.len() > 4 && OffsetIndex::decode_block(&block, pos)? != index {
        return Err(Error::corrupt(format!(
            "index block at offset {} does not match the records before it",
            pos
        )));
    }
    Ok((index, pos))
}
