use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A length field asked for more bytes than the input had left.
    #[error("truncated input reading {what}: needed {needed} bytes, {available} available")]
    TruncatedInput {
        what: &'static str,
        needed: u64,
        available: u64,
    },

    /// A key or value whose length would collide with the separator.
    #[error("{field} of {len} bytes is too large to encode")]
    RecordTooLarge { field: &'static str, len: usize },

    #[error("writer is sealed")]
    SealedWriter,

    #[error("corrupt sstable: {reason}")]
    CorruptFile { reason: String },

    #[error("key {key:?} not found")]
    NotFound { key: String },

    #[error("i/o error during {op}{}: {source}", fmt_key(.key))]
    Io {
        op: &'static str,
        key: Option<String>,
        #[source]
        source: io::Error,
    },
}

fn fmt_key(key: &Option<String>) -> String {
    match key {
        Some(k) => format!(" (key {:?})", k),
        None => String::new(),
    }
}

/// Renders a key for error messages; keys are arbitrary bytes.
pub(crate) fn display_key(key: &[u8]) -> String {
    String::from_utf8_lossy(key).into_owned()
}

impl Error {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    pub(crate) fn corrupt(reason: impl Into<String>) -> Self {
        Error::CorruptFile {
            reason: reason.into(),
        }
    }

    pub(crate) fn io(op: &'static str, source: io::Error) -> Self {
        Error::Io {
            op,
            key: None,
            source,
        }
    }

    pub(crate) fn io_for_key(op: &'static str, key: &[u8], source: io::Error) -> Self {
        Error::Io {
            op,
            key: Some(display_key(key)),
            source,
        }
    }

    pub(crate) fn not_found(key: &[u8]) -> Self {
        Error::NotFound {
            key: display_key(key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_context() {
        let e = Error::io_for_key(
            "put",
            b"apple",
            io::Error::new(io::ErrorKind::Other, "disk full"),
        );
        assert_eq!(
            e.to_string(),
            "i/o error during put (key \"apple\"): disk full"
        );

        let e = Error::io("finalize", io::Error::new(io::ErrorKind::Other, "gone"));
        assert_eq!(e.to_string(), "i/o error during finalize: gone");

        assert!(Error::not_found(b"banana").is_not_found());
        assert!(!Error::SealedWriter.is_not_found());
    }
}
