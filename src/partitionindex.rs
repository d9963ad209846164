use std::io;
use std::ops::Range;

use log::debug;
use simple_sds::ops::{BitVec, Rank, Select};
use simple_sds::serialize::Serialize;
use simple_sds::sparse_vector::{SparseBuilder, SparseVector};

use crate::error::{Error, Result};
use crate::sequence::Sequence;

// Maps a global index to a (partition, offset) pair.
//
// The sequence is split at every strict descent. A sparse bitvector of length
// size + 1 marks where each partition begins, with an extra one at `size`, so
// partition p spans select(p)..select(p + 1) in 0-based select terms.
// For a Psi array, the partitions correspond to the symbols of the text and
// `alphabet_size` approximates the number of distinct symbols.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PartitionIndex {
    size: usize,
    alphabet_size: usize,
    boundaries: SparseVector,
}

impl PartitionIndex {
    /// Scans `seq` once and marks a boundary at every descent.
    pub fn build<S: Sequence>(mut seq: S) -> Result<PartitionIndex> {
        let size = seq.len();
        if size == 0 {
            return Err(Error::EmptyInput);
        }

        let mut starts = vec![0];
        let mut prev = seq.value(0)?;
        for i in 1..size {
            let value = seq.value(i)?;
            if value < prev {
                starts.push(i);
            }
            prev = value;
        }

        let index = Self::from_starts(size, starts)?;
        debug!(
            "built PartitionIndex: {} elements, {} partitions",
            index.size, index.alphabet_size
        );
        Ok(index)
    }

    // `starts` holds the first index of every partition, beginning with 0.
    fn from_starts(size: usize, mut starts: Vec<usize>) -> Result<PartitionIndex> {
        let alphabet_size = starts.len();
        starts.push(size);

        let mut builder = SparseBuilder::new(size + 1, starts.len()).map_err(Error::encoding)?;
        builder.extend(starts);
        let boundaries = SparseVector::try_from(builder).map_err(Error::encoding)?;

        Ok(PartitionIndex {
            size,
            alphabet_size,
            boundaries,
        })
    }

    /// Returns the partition containing `index` and the offset of `index` inside it.
    pub fn locate(&self, index: usize) -> Result<(usize, usize)> {
        if index >= self.size {
            return Err(Error::OutOfRange {
                index,
                len: self.size,
            });
        }
        // Bit 0 is always set, so the rank is at least one.
        let partition = self.boundaries.rank(index + 1) - 1;
        let start = self.start(partition);
        Ok((partition, index - start))
    }

    /// Global index range covered by `partition`.
    pub fn partition_range(&self, partition: usize) -> Option<Range<usize>> {
        if partition >= self.alphabet_size {
            return None;
        }
        Some(self.start(partition)..self.start(partition + 1))
    }

    pub fn partitions(&self) -> impl Iterator<Item = Range<usize>> + '_ {
        (0..self.alphabet_size).map(|p| self.start(p)..self.start(p + 1))
    }

    pub fn partition_count(&self) -> usize {
        self.alphabet_size
    }

    pub fn len(&self) -> usize {
        self.size
    }

    // An index always holds at least one element.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn size_in_bytes(&self) -> usize {
        8 * (self.size.size_in_elements()
            + self.alphabet_size.size_in_elements()
            + self.boundaries.size_in_elements())
    }

    // Valid for p in 0..=alphabet_size, which the boundary vector guarantees
    // after construction or a checked load.
    fn start(&self, p: usize) -> usize {
        self.boundaries.select(p).unwrap_or(self.size)
    }

    /// Writes `size`, `alphabet_size` and the boundary bitvector.
    pub fn serialize<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        self.serialize_header(writer)?;
        self.serialize_body(writer)?;
        Ok(())
    }

    pub fn load<R: io::Read>(reader: &mut R) -> Result<PartitionIndex> {
        let (size, alphabet_size) = Self::load_header(reader)?;
        Self::load_body(reader, size, alphabet_size)
    }

    // The partitioned vectors write their inner vectors between the header and the body.
    pub(crate) fn serialize_header<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        self.size.serialize(writer)?;
        self.alphabet_size.serialize(writer)
    }

    pub(crate) fn serialize_body<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        self.boundaries.serialize(writer)
    }

    pub(crate) fn load_header<R: io::Read>(reader: &mut R) -> Result<(usize, usize)> {
        let size = usize::load(reader).map_err(Error::from_load)?;
        let alphabet_size = usize::load(reader).map_err(Error::from_load)?;
        if size == 0 {
            return Err(Error::corrupt("serialized size is zero"));
        }
        if alphabet_size == 0 || alphabet_size > size {
            return Err(Error::corrupt(format!(
                "alphabet size {} is invalid for {} elements",
                alphabet_size, size
            )));
        }
        Ok((size, alphabet_size))
    }

    pub(crate) fn load_body<R: io::Read>(
        reader: &mut R,
        size: usize,
        alphabet_size: usize,
    ) -> Result<PartitionIndex> {
        let boundaries = SparseVector::load(reader).map_err(Error::from_load)?;
        if boundaries.is_multiset() {
            return Err(Error::corrupt("boundary vector marks a position twice"));
        }
        if boundaries.len() != size + 1 {
            return Err(Error::corrupt(format!(
                "boundary vector has length {}, expected {}",
                boundaries.len(),
                size + 1
            )));
        }
        if boundaries.count_ones() != alphabet_size + 1 {
            return Err(Error::corrupt(format!(
                "boundary vector marks {} partitions, expected {}",
                boundaries.count_ones().saturating_sub(1),
                alphabet_size
            )));
        }
        if boundaries.select(0) != Some(0) || boundaries.select(alphabet_size) != Some(size) {
            return Err(Error::corrupt(
                "boundary vector does not start at 0 and end at the sequence length",
            ));
        }
        debug!(
            "loaded PartitionIndex: {} elements, {} partitions",
            size, alphabet_size
        );
        Ok(PartitionIndex {
            size,
            alphabet_size,
            boundaries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exhaustigen::Gen;

    fn index(values: &[u64]) -> PartitionIndex {
        PartitionIndex::build(values).unwrap()
    }

    fn descents(values: &[u64]) -> usize {
        values.windows(2).filter(|w| w[1] < w[0]).count()
    }

    #[test]
    fn test_empty_input() {
        let values: Vec<u64> = vec![];
        assert!(matches!(
            PartitionIndex::build(&values),
            Err(Error::EmptyInput)
        ));
    }

    #[test]
    fn test_single_element() {
        let idx = index(&[7]);
        assert_eq!(idx.len(), 1);
        assert_eq!(idx.partition_count(), 1);
        assert_eq!(idx.locate(0).unwrap(), (0, 0));
        assert!(matches!(
            idx.locate(1),
            Err(Error::OutOfRange { index: 1, len: 1 })
        ));
    }

    #[test]
    fn test_increasing_is_one_partition() {
        let values = [3, 4, 5, 6, 9, 10, 12, 13, 15, 17, 18, 19, 22, 23, 25, 27];
        let idx = index(&values);
        assert_eq!(idx.partition_count(), 1);
        assert_eq!(idx.partition_range(0), Some(0..16));
        for i in 0..values.len() {
            assert_eq!(idx.locate(i).unwrap(), (0, i));
        }
    }

    #[test]
    fn test_descents_start_partitions() {
        let idx = index(&[5, 1, 1, 2, 9, 0]);
        assert_eq!(idx.partition_count(), 3);
        let ranges: Vec<_> = idx.partitions().collect();
        assert_eq!(ranges, vec![0..1, 1..5, 5..6]);
        assert_eq!(idx.locate(4).unwrap(), (1, 3));
        assert_eq!(idx.locate(5).unwrap(), (2, 0));
        assert_eq!(idx.partition_range(3), None);
    }

    #[test]
    fn test_decreasing_is_one_partition_per_element() {
        let values: Vec<u64> = (0..20).rev().collect();
        let idx = index(&values);
        assert_eq!(idx.partition_count(), 20);
        for i in 0..20 {
            assert_eq!(idx.locate(i).unwrap(), (i, 0));
        }
    }

    #[test]
    fn test_partition_properties_exhaustive() {
        // Every sequence of length 0..=6 over the alphabet 0..=3.
        let mut gen = Gen::new();
        while !gen.done() {
            let len = gen.gen(6);
            let values: Vec<u64> = (0..len).map(|_| gen.gen(3) as u64).collect();
            if values.is_empty() {
                continue;
            }
            let idx = index(&values);
            assert_eq!(idx.partition_count(), 1 + descents(&values), "{:?}", values);

            // Coverage: contiguous, exhaustive and non-empty.
            let mut next = 0;
            for range in idx.partitions() {
                assert_eq!(range.start, next);
                assert!(range.end > range.start);
                next = range.end;
            }
            assert_eq!(next, values.len());

            for i in 1..values.len() {
                let (p, off) = idx.locate(i).unwrap();
                let (prev_p, prev_off) = idx.locate(i - 1).unwrap();
                if values[i] < values[i - 1] {
                    assert_eq!(off, 0, "{:?} at {}", values, i);
                    assert_eq!(p, prev_p + 1);
                } else {
                    assert_eq!(p, prev_p);
                    assert_eq!(off, prev_off + 1);
                }
            }
        }
    }

    #[test]
    fn test_serialize_roundtrip() {
        let idx = index(&[5, 1, 1, 2, 9, 0, 4, 4, 3]);
        let mut buf = Vec::new();
        idx.serialize(&mut buf).unwrap();
        assert_eq!(buf.len(), idx.size_in_bytes());

        let loaded = PartitionIndex::load(&mut buf.as_slice()).unwrap();
        assert_eq!(loaded, idx);
        for i in 0..idx.len() {
            assert_eq!(loaded.locate(i).unwrap(), idx.locate(i).unwrap());
        }
    }

    #[test]
    fn test_load_rejects_mismatched_counts() {
        let idx = index(&[5, 1, 1, 2, 9, 0]);
        let mut buf = Vec::new();
        idx.serialize(&mut buf).unwrap();

        // Overwrite alphabet_size (the second word) with 2.
        buf[8..16].copy_from_slice(&2usize.to_ne_bytes());
        assert!(matches!(
            PartitionIndex::load(&mut buf.as_slice()),
            Err(Error::CorruptSerializedState(_))
        ));
    }

    #[test]
    fn test_load_rejects_duplicate_boundaries() {
        // Counts and endpoints agree with size 3 and two partitions, but the
        // first partition would be empty.
        let boundaries = SparseVector::try_from_iter([0usize, 0, 3].into_iter()).unwrap();
        let mut buf = Vec::new();
        3usize.serialize(&mut buf).unwrap();
        2usize.serialize(&mut buf).unwrap();
        boundaries.serialize(&mut buf).unwrap();

        assert!(matches!(
            PartitionIndex::load(&mut buf.as_slice()),
            Err(Error::CorruptSerializedState(_))
        ));
    }

    #[test]
    fn test_load_rejects_truncation() {
        let idx = index(&[2, 1, 0]);
        let mut buf = Vec::new();
        idx.serialize(&mut buf).unwrap();
        for cut in [0, 4, 8, 16, buf.len() - 1] {
            assert!(matches!(
                PartitionIndex::load(&mut &buf[..cut]),
                Err(Error::CorruptSerializedState(_))
            ));
        }
    }
}
