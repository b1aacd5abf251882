use std::io::Write;

use tracing::{debug, trace};

use crate::{
    encoding::{encode_record, encode_u32, encode_u64, SEPARATOR},
    error::{Error, Result},
};

use super::index::OffsetIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Open,
    Sealed,
}

/// Appends records to a sink and, on [`Writer::finalize`], the index block
/// and trailer. Not safe for concurrent use.
#[derive(Debug)]
pub struct Writer<W>
where
    W: Write,
{
    w: W,
    // Bytes of records written so far; the start offset of the next record.
    offset: u64,
    index: OffsetIndex,
    state: State,
    buf: Vec<u8>,
}

impl<W> Writer<W>
where
    W: Write,
{
    pub fn new(w: W) -> Self {
        Writer {
            w,
            offset: 0,
            index: OffsetIndex::new(),
            state: State::Open,
            buf: Vec::with_capacity(1024),
        }
    }

    fn check_open(&self) -> Result<()> {
        match self.state {
            State::Open => Ok(()),
            State::Sealed => Err(Error::SealedWriter),
        }
    }

    /// Appends one record. Repeated keys are kept; each occurrence gets its
    /// own offset. If the sink write fails, the writer's offset and index are
    /// left as they were.
    ///
    /// Bytes the sink accepted before failing are not rolled back. If any
    /// were taken, the writer's offset no longer matches the sink and the
    /// table must be discarded rather than written to further.
    pub fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.check_open()?;

        self.buf.clear();
        encode_record(&mut self.buf, key, value)?;
        self.w
            .write_all(&self.buf)
            .map_err(|e| Error::io_for_key("put", key, e))?;

        trace!(
            offset = self.offset,
            key_len = key.len(),
            value_len = value.len(),
            "put record"
        );
        self.index.push(key, self.offset);
        self.offset += self.buf.len() as u64;
        Ok(())
    }

    /// Writes the index block followed by the trailer and seals the writer.
    ///
    /// The writer is sealed even if a write fails; the sink then holds a
    /// partial file and should be discarded.
    pub fn finalize(&mut self) -> Result<()> {
        self.check_open()?;
        self.state = State::Sealed;

        self.buf.clear();
        self.index.encode_block(&mut self.buf)?;
        let index_len = self.buf.len();
        encode_u32(&mut self.buf, SEPARATOR);
        encode_u64(&mut self.buf, self.offset);

        self.w
            .write_all(&self.buf)
            .map_err(|e| Error::io("finalize", e))?;
        self.w.flush().map_err(|e| Error::io("flush", e))?;

        debug!(
            unique_keys = self.index.len(),
            data_len = self.offset,
            index_len,
            "finalized sstable"
        );
        Ok(())
    }

    /// Seals the writer after a bare separator, leaving readers to rebuild the
    /// index by scanning.
    pub fn finalize_without_index(&mut self) -> Result<()> {
        self.check_open()?;
        self.state = State::Sealed;

        self.w
            .write_all(&SEPARATOR.to_le_bytes())
            .map_err(|e| Error::io("finalize", e))?;
        self.w.flush().map_err(|e| Error::io("flush", e))?;

        debug!(data_len = self.offset, "sealed sstable without index");
        Ok(())
    }

    /// Length of the record stream written so far.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn unique_keys(&self) -> usize {
        self.index.len()
    }

    pub fn index(&self) -> &OffsetIndex {
        &self.index
    }

    pub fn is_sealed(&self) -> bool {
        self.state == State::Sealed
    }

    pub fn get_ref(&self) -> &W {
        &self.w
    }

    pub fn into_inner(self) -> W {
        self.w
    }
}
