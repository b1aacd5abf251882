use std::{
    cell::RefCell,
    fs::File,
    io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write},
    path::Path,
    rc::Rc,
};

use crate::{
    error::{Error, Result},
    sst::{reader::Reader, writer::Writer},
};

/// Creates (or truncates) `path` and returns a buffered writer over it.
pub fn create_file<P>(path: P) -> Result<Writer<BufWriter<File>>>
where
    P: AsRef<Path>,
{
    let file = File::create(path).map_err(|e| Error::io("create", e))?;
    Ok(Writer::new(BufWriter::new(file)))
}

/// Flushes a writer's buffer and syncs the file to disk.
pub fn finish_file(w: Writer<BufWriter<File>>) -> Result<()> {
    let file = w
        .into_inner()
        .into_inner()
        .map_err(|e| Error::io("flush", e.into_error()))?;
    file.sync_all().map_err(|e| Error::io("sync", e))
}

pub fn open_file<P>(path: P) -> Result<Reader<BufReader<File>>>
where
    P: AsRef<Path>,
{
    let file = File::open(path).map_err(|e| Error::io("open", e))?;
    Reader::open(BufReader::new(file))
}

// Mock Implementation

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A write of `len` bytes at a position.
    Write(usize, usize),
    Flush,
}

impl Event {
    pub fn write_abbrev<W: std::fmt::Write>(&self, w: &mut W) -> std::fmt::Result {
        match self {
            Event::Write(idx, len) => write!(w, "Write({}, {})", idx, len),
            Event::Flush => write!(w, "Flush"),
        }
    }
}

#[derive(Default, Debug)]
struct MockData {
    bytes: Vec<u8>,
    events: Vec<Event>,

    // After this many writes, fail every write until recovered.
    time_to_fail: Option<usize>,
}

impl MockData {
    fn perform_write(&mut self) -> io::Result<()> {
        match self.time_to_fail {
            Some(0) => Err(io::Error::new(io::ErrorKind::Other, "injected write failure")),
            Some(x) => {
                self.time_to_fail = Some(x - 1);
                Ok(())
            }
            None => Ok(()),
        }
    }
}

/// An in-memory file shared by every clone. Each clone has its own cursor,
/// so a test can keep one handle for writing and open readers on others.
#[derive(Clone, Debug, Default)]
pub struct MockFile {
    idx: usize,
    data: Rc<RefCell<MockData>>,
}

impl MockFile {
    pub fn new() -> Self {
        MockFile::default()
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let file = MockFile::new();
        file.data.borrow_mut().bytes = bytes;
        file
    }

    /// A new handle on the same contents, positioned at the start.
    pub fn reopen(&self) -> Self {
        MockFile {
            idx: 0,
            data: self.data.clone(),
        }
    }

    /// Lets `writes` more writes succeed, then fails the rest.
    pub fn fail_after(&self, writes: usize) {
        self.data.borrow_mut().time_to_fail = Some(writes);
    }

    pub fn recover(&self) {
        self.data.borrow_mut().time_to_fail = None;
    }

    pub fn contents(&self) -> Vec<u8> {
        self.data.borrow().bytes.clone()
    }

    pub fn truncate(&self, len: usize) {
        self.data.borrow_mut().bytes.truncate(len);
    }

    pub fn len(&self) -> usize {
        self.data.borrow().bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn take_events(&self) -> Vec<Event> {
        std::mem::take(&mut self.data.borrow_mut().events)
    }
}

impl Seek for MockFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let (base, delta) = match pos {
            SeekFrom::Start(i) => (0, i as i64),
            SeekFrom::End(i) => (self.len() as i64, i),
            SeekFrom::Current(i) => (self.idx as i64, i),
        };
        let idx = base
            .checked_add(delta)
            .filter(|idx| *idx >= 0)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "seek before start"))?;
        self.idx = idx as usize;
        Ok(idx as u64)
    }
}

impl Read for MockFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let data = self.data.borrow();
        let start = std::cmp::min(self.idx, data.bytes.len());
        let n = std::cmp::min(data.bytes.len() - start, buf.len());
        buf[..n].copy_from_slice(&data.bytes[start..start + n]);
        self.idx = start + n;
        Ok(n)
    }
}

impl Write for MockFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut data = self.data.borrow_mut();
        data.perform_write()?;

        let end = self.idx + buf.len();
        if data.bytes.len() < end {
            data.bytes.resize(end, 0);
        }
        data.bytes[self.idx..end].copy_from_slice(buf);
        data.events.push(Event::Write(self.idx, buf.len()));
        self.idx = end;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut data = self.data.borrow_mut();
        data.perform_write()?;
        data.events.push(Event::Flush);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_file() -> anyhow::Result<()> {
        let mut a = MockFile::new();
        a.write_all(&[1, 2, 3, 4])?;
        assert_eq!(vec![1, 2, 3, 4], a.contents());

        let mut b = a.reopen();
        let mut buf = [0_u8; 3];
        b.seek(SeekFrom::End(-3))?;
        assert_eq!(b.read(&mut buf)?, 3);
        assert_eq!(buf, [2, 3, 4]);
        assert_eq!(b.read(&mut buf)?, 0);
        assert!(b.seek(SeekFrom::Current(-5)).is_err());

        a.fail_after(1);
        a.write_all(&[5])?;
        assert!(a.write_all(&[6]).is_err());
        a.recover();
        a.write_all(&[7])?;
        assert_eq!(vec![1, 2, 3, 4, 5, 7], a.contents());

        let mut trace = String::new();
        for event in a.take_events() {
            event.write_abbrev(&mut trace)?;
            trace.push('\n');
        }
        assert_eq!(trace, "Write(0, 4)\nWrite(4, 1)\nWrite(5, 1)\n");
        Ok(())
    }

    #[test]
    fn real_files() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("fruit.sst");

        let mut w = create_file(&path)?;
        w.put(b"apple", b"pie")?;
        w.put(b"banana", b"split")?;
        w.put(b"apple", b"imac")?;
        w.finalize()?;
        finish_file(w)?;

        let mut r = open_file(&path)?;
        assert_eq!(r.get(b"apple")?, vec![b"pie".to_vec(), b"imac".to_vec()]);
        assert_eq!(r.get(b"banana")?, vec![b"split".to_vec()]);
        assert!(r.get(b"cherry").unwrap_err().is_not_found());
        Ok(())
    }

    #[test]
    fn open_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let res = open_file(dir.path().join("nope.sst"));
        assert!(matches!(res, Err(Error::Io { op: "open", .. })));
    }
}
