pub mod index;
pub mod reader;
pub mod writer;

#[cfg(test)]
mod datadriven_test;

// This package provides facilities to both read and write Sorted-String Tables
// (SSTs).
//
// An SST is a flat, immutable file of key-value records. The writer appends
// records in the order it is given them; it never sorts, so a caller that wants
// a sorted table writes in key order. A key may be written any number of times
// and every occurrence is kept.
//
// Physically, an SST is a sequence of records, each a little-endian u32 key
// length, the key, a u32 value length and the value. After the records the
// writer may append the _index block_: the separator 0xffffffff, the number of
// unique keys, and for each key its length, the key, the number of records with
// that key and the u64 offset of each of them. Last comes the trailer, the
// separator again followed by the u64 offset where the index block begins.
//
// A valid file is one of
// * records,
// * records followed by a bare separator, or
// * records, the index block and the trailer.
//
// A reader looks for the trailer first. If it is missing, the reader rebuilds
// the same offset map by scanning the records from the start of the file. Bytes
// after the separator that stops the scan must form an index block agreeing
// with the records; anything else is corrupt.
//
// The trailer is recognised only by the separator sitting 12 bytes from the
// end. A file without a trailer whose last record holds 0xffffffff at that
// position is read as having one, and is rejected when the offset that follows
// is out of range. Writers that may produce such values should finalize with
// an index.
