use std::io;
use std::iter;

use log::debug;
use simple_sds::ops::{BitVec, Rank, Select};
use simple_sds::serialize::Serialize;
use simple_sds::sparse_vector::{SparseBuilder, SparseVector};

use crate::compressedvector::CompressedVector;
use crate::error::{invalid_data, Error, Result};

// Stores a non-decreasing integer vector as runs of consecutive integers.
// A run (start, length) covers the values start, start + 1, ..., start + length - 1.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunLengthVector {
    len: usize,
    // Local offset of the first value of each run, plus a sentinel at `len`.
    offsets: SparseVector,
    // start_j + j for the j-th run, which is strictly increasing even when
    // consecutive runs share a start value.
    starts: SparseVector,
}

// Location of one run inside a RunLengthVector.
#[derive(Clone, Copy, Debug)]
struct Run {
    start: u64,
    begin: usize,
    end: usize,
}

impl RunLengthVector {
    pub fn builder() -> RunLengthBuilder {
        RunLengthBuilder::default()
    }

    pub fn run_count(&self) -> usize {
        self.starts.count_ones()
    }

    /// A cursor for positional decoding. Each reader uses its own.
    pub fn iter(&self) -> RunLengthIter<'_> {
        RunLengthIter {
            vector: self,
            run: None,
            next_offset: 0,
        }
    }

    /// The stored runs as (start value, length) pairs.
    pub fn runs(&self) -> impl Iterator<Item = (u64, usize)> + '_ {
        (0..self.run_count()).filter_map(|j| self.run(j).map(|r| (r.start, r.end - r.begin)))
    }

    fn run(&self, j: usize) -> Option<Run> {
        let begin = self.offsets.select(j)?;
        let end = self.offsets.select(j + 1)?;
        let start = self.starts.select(j)?.checked_sub(j)? as u64;
        Some(Run { start, begin, end })
    }

    fn run_containing(&self, offset: usize) -> Option<Run> {
        // The run beginning at offset 0 guarantees rank >= 1.
        let j = self.offsets.rank(offset + 1).checked_sub(1)?;
        self.run(j)
    }
}

impl CompressedVector for RunLengthVector {
    type Config = ();

    fn build(values: Vec<u64>, _config: &()) -> Result<Self> {
        let mut builder = RunLengthVector::builder();
        let mut values = values.into_iter();
        if let Some(first) = values.next() {
            let mut run = (first, 1usize);
            for value in values {
                let last = run.0 + (run.1 as u64 - 1);
                if value < last {
                    return Err(Error::encoding(format!(
                        "value {} is smaller than its predecessor {}",
                        value, last
                    )));
                }
                if Some(value) == last.checked_add(1) {
                    run.1 += 1;
                } else {
                    builder.add_run(run.0, run.1)?;
                    run = (value, 1);
                }
            }
            builder.add_run(run.0, run.1)?;
        }
        builder.build()
    }

    fn len(&self) -> usize {
        self.len
    }

    fn get(&self, index: usize) -> Option<u64> {
        self.iter().select(index)
    }
}

impl Serialize for RunLengthVector {
    fn serialize_header<T: io::Write>(&self, writer: &mut T) -> io::Result<()> {
        self.len.serialize(writer)
    }

    fn serialize_body<T: io::Write>(&self, writer: &mut T) -> io::Result<()> {
        self.offsets.serialize(writer)?;
        self.starts.serialize(writer)
    }

    fn load<T: io::Read>(reader: &mut T) -> io::Result<Self> {
        let len = usize::load(reader)?;
        let offsets = SparseVector::load(reader)?;
        let starts = SparseVector::load(reader)?;

        if offsets.is_multiset() || starts.is_multiset() {
            return Err(invalid_data("run vectors contain duplicate positions"));
        }
        let runs = starts.count_ones();
        if offsets.len() != len + 1 || offsets.count_ones() != runs + 1 {
            return Err(invalid_data(format!(
                "run offsets do not describe {} runs over {} values",
                runs, len
            )));
        }
        let first_ok = runs == 0 || offsets.select(0) == Some(0);
        if !first_ok || offsets.select(runs) != Some(len) {
            return Err(invalid_data("run offsets do not cover the vector"));
        }
        Ok(RunLengthVector {
            len,
            offsets,
            starts,
        })
    }

    fn size_in_elements(&self) -> usize {
        self.len.size_in_elements()
            + self.offsets.size_in_elements()
            + self.starts.size_in_elements()
    }
}

// Collects runs in order. A run that continues the previous one is merged into it.
#[derive(Clone, Debug, Default)]
pub struct RunLengthBuilder {
    starts: Vec<u64>,
    offsets: Vec<usize>,
    len: usize,
}

impl RunLengthBuilder {
    pub fn add_run(&mut self, start: u64, len: usize) -> Result<()> {
        if len == 0 {
            return Ok(());
        }
        if start.checked_add(len as u64 - 1).is_none() {
            return Err(Error::encoding(format!(
                "run ({}, {}) exceeds the value range",
                start, len
            )));
        }
        if let (Some(&prev_start), Some(&prev_offset)) = (self.starts.last(), self.offsets.last()) {
            if start < prev_start {
                return Err(Error::encoding(format!(
                    "run start {} precedes the previous run start {}",
                    start, prev_start
                )));
            }
            let prev_len = (self.len - prev_offset) as u64;
            if prev_start.checked_add(prev_len) == Some(start) {
                self.len += len;
                return Ok(());
            }
        }
        self.starts.push(start);
        self.offsets.push(self.len);
        self.len += len;
        Ok(())
    }

    /// Number of values added so far.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn build(self) -> Result<RunLengthVector> {
        let runs = self.starts.len();

        let mut positions = Vec::with_capacity(runs);
        for (j, &start) in self.starts.iter().enumerate() {
            let position = usize::try_from(start)
                .ok()
                .and_then(|s| s.checked_add(j))
                .ok_or_else(|| Error::encoding(format!("run start {} is too large", start)))?;
            positions.push(position);
        }
        let universe = match positions.last() {
            Some(&last) => last
                .checked_add(1)
                .ok_or_else(|| Error::encoding("run starts exceed the universe"))?,
            None => 1,
        };

        let mut offsets = SparseBuilder::new(self.len + 1, runs + 1).map_err(Error::encoding)?;
        offsets.extend(self.offsets.iter().copied().chain(iter::once(self.len)));
        let mut starts = SparseBuilder::new(universe, runs).map_err(Error::encoding)?;
        starts.extend(positions);

        debug!("built RunLengthVector: {} values, {} runs", self.len, runs);

        Ok(RunLengthVector {
            len: self.len,
            offsets: SparseVector::try_from(offsets).map_err(Error::encoding)?,
            starts: SparseVector::try_from(starts).map_err(Error::encoding)?,
        })
    }
}

/// Decodes values of a [`RunLengthVector`] by offset, caching the current run.
///
/// Selecting offsets inside the cached run needs no rank query, so decoding
/// a partition front to back touches each run once. As an [`Iterator`] it
/// yields every value in order.
#[derive(Clone, Debug)]
pub struct RunLengthIter<'a> {
    vector: &'a RunLengthVector,
    run: Option<Run>,
    next_offset: usize,
}

impl<'a> RunLengthIter<'a> {
    /// Value at `offset`, or `None` if `offset` is past the end.
    pub fn select(&mut self, offset: usize) -> Option<u64> {
        if offset >= self.vector.len {
            return None;
        }
        let run = match self.run {
            Some(run) if run.begin <= offset && offset < run.end => run,
            _ => {
                let run = self.vector.run_containing(offset)?;
                self.run = Some(run);
                run
            }
        };
        Some(run.start + (offset - run.begin) as u64)
    }
}

impl<'a> Iterator for RunLengthIter<'a> {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        let value = self.select(self.next_offset)?;
        self.next_offset += 1;
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.vector.len.saturating_sub(self.next_offset);
        (remaining, Some(remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn rle(values: &[u64]) -> RunLengthVector {
        <RunLengthVector as CompressedVector>::build(values.to_vec(), &()).unwrap()
    }

    fn check(values: &[u64]) -> RunLengthVector {
        let rv = rle(values);
        assert_eq!(CompressedVector::len(&rv), values.len());
        for (i, &v) in values.iter().enumerate() {
            assert_eq!(rv.get(i), Some(v), "offset {} of {:?}", i, values);
        }
        assert_eq!(rv.get(values.len()), None);
        assert_eq!(rv.iter().collect::<Vec<_>>(), values);
        rv
    }

    #[test]
    fn test_single_run() {
        let rv = check(&[0, 1, 2, 3]);
        assert_eq!(rv.runs().collect::<Vec<_>>(), vec![(0, 4)]);
        assert_eq!(rv.get(3), Some(3));
    }

    #[test]
    fn test_runs() {
        let rv = check(&[0, 1, 2, 3, 10, 11, 20]);
        assert_eq!(rv.runs().collect::<Vec<_>>(), vec![(0, 4), (10, 2), (20, 1)]);
        assert_eq!(rv.run_count(), 3);
    }

    #[test]
    fn test_repeated_values() {
        let rv = check(&[5, 5, 5, 6, 7, 7]);
        assert_eq!(
            rv.runs().collect::<Vec<_>>(),
            vec![(5, 1), (5, 1), (5, 3), (7, 1)]
        );
    }

    #[test]
    fn test_empty() {
        let rv = check(&[]);
        assert!(CompressedVector::is_empty(&rv));
        assert_eq!(rv.run_count(), 0);
    }

    #[test]
    fn test_large_values() {
        check(&[1 << 50, (1 << 50) + 1, 1 << 60, (1 << 60) + 7]);
    }

    #[test]
    fn test_builder_coalesces() {
        let mut builder = RunLengthVector::builder();
        builder.add_run(0, 2).unwrap();
        builder.add_run(2, 3).unwrap();
        builder.add_run(9, 0).unwrap();
        builder.add_run(9, 1).unwrap();
        assert_eq!(builder.len(), 6);
        let rv = builder.build().unwrap();
        assert_eq!(rv.runs().collect::<Vec<_>>(), vec![(0, 5), (9, 1)]);
    }

    #[test]
    fn test_builder_rejects_decreasing_start() {
        let mut builder = RunLengthVector::builder();
        builder.add_run(10, 2).unwrap();
        assert!(matches!(
            builder.add_run(3, 1),
            Err(Error::EncodingFailure(_))
        ));
        assert!(matches!(
            builder.add_run(u64::MAX, 2),
            Err(Error::EncodingFailure(_))
        ));
    }

    #[test]
    fn test_build_rejects_descent() {
        assert!(matches!(
            <RunLengthVector as CompressedVector>::build(vec![4, 5, 1], &()),
            Err(Error::EncodingFailure(_))
        ));
        // The run start does not decrease here, but the value does.
        assert!(matches!(
            <RunLengthVector as CompressedVector>::build(vec![4, 5, 4], &()),
            Err(Error::EncodingFailure(_))
        ));
    }

    #[test]
    fn test_iter_select_out_of_order() {
        let values = [1, 2, 3, 7, 8, 20, 21, 22, 23, 40];
        let rv = rle(&values);
        let mut it = rv.iter();
        for &offset in &[9, 0, 4, 3, 8, 5, 1, 9] {
            assert_eq!(it.select(offset), Some(values[offset]));
        }
        assert_eq!(it.select(10), None);
    }

    #[test]
    fn test_random() {
        let mut rng = rand::thread_rng();
        for _ in 0..50 {
            let len = rng.gen_range(1..500);
            let mut value = rng.gen_range(0..100u64);
            let values: Vec<u64> = (0..len)
                .map(|_| {
                    // Mostly consecutive, with occasional gaps and repeats.
                    value += match rng.gen_range(0..10) {
                        0 => 0,
                        1 => rng.gen_range(2..50),
                        _ => 1,
                    };
                    value
                })
                .collect();
            let rv = check(&values);
            let total: usize = rv.runs().map(|(_, len)| len).sum();
            assert_eq!(total, values.len());
        }
    }

    #[test]
    fn test_serialize() {
        let rv = rle(&[3, 4, 5, 5, 9, 10, 11, 12, 30]);
        let mut buf = Vec::new();
        rv.serialize(&mut buf).unwrap();
        assert_eq!(buf.len(), rv.size_in_elements() * 8);

        let loaded = RunLengthVector::load(&mut buf.as_slice()).unwrap();
        assert_eq!(loaded, rv);
        assert_eq!(loaded.runs().collect::<Vec<_>>(), rv.runs().collect::<Vec<_>>());
    }

    #[test]
    fn test_load_rejects_duplicate_starts() {
        let rv = rle(&[0, 1, 5, 9]);
        assert_eq!(rv.run_count(), 3);

        // Same length and offsets, but three runs that all claim position 0.
        let starts = SparseVector::try_from_iter([0usize, 0, 0].into_iter()).unwrap();
        assert!(starts.is_multiset());
        let mut buf = Vec::new();
        rv.len.serialize(&mut buf).unwrap();
        rv.offsets.serialize(&mut buf).unwrap();
        starts.serialize(&mut buf).unwrap();

        let err = RunLengthVector::load(&mut buf.as_slice()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_load_rejects_wrong_length() {
        let rv = rle(&[3, 4, 5, 9]);
        let mut buf = Vec::new();
        rv.serialize(&mut buf).unwrap();
        buf[0..8].copy_from_slice(&5usize.to_ne_bytes());
        let err = RunLengthVector::load(&mut buf.as_slice()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
