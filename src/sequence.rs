//! Construction-time input sources.
//!
//! A partitioned vector is built from anything that knows its length and can
//! return the value at an index. Construction reads the input front to back
//! twice, so a file-backed source only needs a small window of it in memory.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom, Write};
use std::path::Path;

use simple_sds::int_vector::IntVector;
use simple_sds::ops::{Access, Vector};

use crate::error::{Error, Result};

/// A random-access sequence of unsigned integers.
pub trait Sequence {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the value at `index`, or `OutOfRange` if `index >= self.len()`.
    fn value(&mut self, index: usize) -> Result<u64>;
}

impl Sequence for &[u64] {
    fn len(&self) -> usize {
        <[u64]>::len(self)
    }

    fn value(&mut self, index: usize) -> Result<u64> {
        self.get(index).copied().ok_or(Error::OutOfRange {
            index,
            len: <[u64]>::len(self),
        })
    }
}

impl Sequence for &Vec<u64> {
    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn value(&mut self, index: usize) -> Result<u64> {
        self.as_slice().value(index)
    }
}

impl Sequence for &IntVector {
    fn len(&self) -> usize {
        Vector::len(*self)
    }

    fn value(&mut self, index: usize) -> Result<u64> {
        let len = Vector::len(*self);
        if index >= len {
            return Err(Error::OutOfRange { index, len });
        }
        Ok(Access::get(*self, index))
    }
}

impl<S: Sequence + ?Sized> Sequence for &mut S {
    fn len(&self) -> usize {
        (**self).len()
    }

    fn value(&mut self, index: usize) -> Result<u64> {
        (**self).value(index)
    }
}

/// Number of words a `BufferedSequence` keeps in memory by default.
pub const DEFAULT_BUFFER_LEN: usize = 4096;

const WORD_BYTES: usize = std::mem::size_of::<u64>();

/// A sequence of little-endian `u64` words read through a fixed-size window.
///
/// A miss refills the window starting at the requested index, so a front to
/// back scan reads each word from the underlying reader exactly once.
#[derive(Debug)]
pub struct BufferedSequence<R> {
    reader: R,
    len: usize,
    buffer: Vec<u64>,
    // Index of buffer[0] in the sequence.
    buffer_start: usize,
    buffer_len: usize,
}

impl BufferedSequence<BufReader<File>> {
    /// Opens a file of raw little-endian words. The length is derived from the file size.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let bytes = file.metadata()?.len();
        if bytes % WORD_BYTES as u64 != 0 {
            return Err(Error::corrupt(format!(
                "file size {} is not a multiple of {} bytes",
                bytes, WORD_BYTES
            )));
        }
        let len = usize::try_from(bytes / WORD_BYTES as u64)
            .map_err(|_| Error::corrupt("sequence too long for this platform"))?;
        Ok(Self::new(BufReader::new(file), len))
    }
}

impl<R: Read + Seek> BufferedSequence<R> {
    /// Wraps a reader positioned anywhere; `len` is the number of words it holds.
    pub fn new(reader: R, len: usize) -> Self {
        Self::with_buffer_len(reader, len, DEFAULT_BUFFER_LEN)
    }

    pub fn with_buffer_len(reader: R, len: usize, buffer_len: usize) -> Self {
        BufferedSequence {
            reader,
            len,
            buffer: Vec::with_capacity(buffer_len.max(1)),
            buffer_start: 0,
            buffer_len: buffer_len.max(1),
        }
    }

    pub fn into_inner(self) -> R {
        self.reader
    }

    fn refill(&mut self, index: usize) -> Result<()> {
        let count = self.buffer_len.min(self.len - index);
        let mut bytes = vec![0u8; count * WORD_BYTES];
        self.reader
            .seek(SeekFrom::Start((index * WORD_BYTES) as u64))?;
        self.reader.read_exact(&mut bytes).map_err(Error::from_load)?;

        self.buffer.clear();
        self.buffer.extend(bytes.chunks_exact(WORD_BYTES).map(|chunk| {
            let mut word = [0u8; WORD_BYTES];
            word.copy_from_slice(chunk);
            u64::from_le_bytes(word)
        }));
        self.buffer_start = index;
        Ok(())
    }
}

impl<R: Read + Seek> Sequence for BufferedSequence<R> {
    fn len(&self) -> usize {
        self.len
    }

    fn value(&mut self, index: usize) -> Result<u64> {
        if index >= self.len {
            return Err(Error::OutOfRange {
                index,
                len: self.len,
            });
        }
        let in_window =
            index >= self.buffer_start && index - self.buffer_start < self.buffer.len();
        if !in_window {
            self.refill(index)?;
        }
        Ok(self.buffer[index - self.buffer_start])
    }
}

/// Writes `values` in the format read by [`BufferedSequence`].
pub fn write_words<W: Write>(writer: &mut W, values: &[u64]) -> io::Result<()> {
    for value in values {
        writer.write_all(&value.to_le_bytes())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    use simple_sds::ops::Push;

    fn buffered(values: &[u64], buffer_len: usize) -> BufferedSequence<Cursor<Vec<u8>>> {
        let mut bytes = Vec::new();
        write_words(&mut bytes, values).unwrap();
        BufferedSequence::with_buffer_len(Cursor::new(bytes), values.len(), buffer_len)
    }

    #[test]
    fn slice_sequence() {
        let values = vec![4, 8, 15, 16, 23, 42];
        let mut seq = values.as_slice();
        assert_eq!(seq.len(), 6);
        assert_eq!(seq.value(5).unwrap(), 42);
        assert!(matches!(
            seq.value(6),
            Err(Error::OutOfRange { index: 6, len: 6 })
        ));

        let mut seq = &values;
        assert_eq!(seq.value(0).unwrap(), 4);
    }

    #[test]
    fn int_vector_sequence() {
        let mut iv = IntVector::new(6).unwrap();
        for value in [3, 1, 4, 1, 5] {
            iv.push(value);
        }
        let mut seq = &iv;
        assert_eq!(Sequence::len(&seq), 5);
        assert_eq!(seq.value(2).unwrap(), 4);
        assert!(seq.value(5).is_err());
    }

    #[test]
    fn buffered_matches_slice_forwards_and_backwards() {
        let values: Vec<u64> = (0..1000).map(|i| (i * 7919) % 1013).collect();
        let mut seq = buffered(&values, 64);
        assert_eq!(seq.len(), values.len());
        for (i, &v) in values.iter().enumerate() {
            assert_eq!(seq.value(i).unwrap(), v);
        }
        for (i, &v) in values.iter().enumerate().rev() {
            assert_eq!(seq.value(i).unwrap(), v);
        }
        assert!(matches!(seq.value(1000), Err(Error::OutOfRange { .. })));
    }

    #[test]
    fn buffered_short_reader_is_corrupt() {
        let mut bytes = Vec::new();
        write_words(&mut bytes, &[1, 2, 3]).unwrap();
        // Claims four words but only holds three.
        let mut seq = BufferedSequence::new(Cursor::new(bytes), 4);
        let err = seq.value(0).unwrap_err();
        assert!(matches!(err, Error::CorruptSerializedState(_)));
        assert!(err.to_string().contains("truncated"));
    }

    #[test]
    fn mutable_reference_is_a_sequence() {
        let values = [9u64, 8, 7];
        let mut inner = buffered(&values, 2);
        let seq = &mut inner;
        assert_eq!(Sequence::len(&seq), 3);
        assert_eq!(seq.value(2).unwrap(), 7);
    }
}
