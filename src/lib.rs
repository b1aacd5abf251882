//! Reading and writing of SSTable files.
//!
//! A [`Writer`] appends key/value records to any [`std::io::Write`] sink and,
//! when finalized, an index of where each key's records start. A [`Reader`]
//! opens any [`std::io::Read`] + [`std::io::Seek`] source, loads that index
//! (or rebuilds it by scanning when the file has none), and serves lookups.
//!
//! ```
//! use std::io::Cursor;
//!
//! use sstable::{Reader, Writer};
//!
//! let mut w = Writer::new(Vec::new());
//! w.put(b"apple", b"pie")?;
//! w.put(b"apple", b"imac")?;
//! w.finalize()?;
//!
//! let mut r = Reader::open(Cursor::new(w.into_inner()))?;
//! assert_eq!(r.get(b"apple")?, vec![b"pie".to_vec(), b"imac".to_vec()]);
//! assert!(r.get(b"banana").unwrap_err().is_not_found());
//! # Ok::<(), sstable::Error>(())
//! ```

pub mod encoding;
pub mod error;
pub mod fs;
pub mod sst;

pub use error::{Error, Result};
pub use sst::{
    index::OffsetIndex,
    reader::{IndexSource, Reader, TableStats},
    writer::Writer,
};
