use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::ops::Range;
use std::path::Path;

use log::info;
use rayon::prelude::*;

use crate::compressedvector::CompressedVector;
use crate::error::{Error, Result};
use crate::partitionindex::PartitionIndex;
use crate::rlevector::RunLengthVector;
use crate::sequence::Sequence;

/// A read-only integer vector split at every descent, with each non-decreasing
/// partition compressed on its own.
///
/// Access takes two steps: the partition index maps a global index to a
/// partition and an offset, and the partition's inner vector decodes the
/// value at that offset. Built once, then immutable; a shared reference can
/// be read from any number of threads.
#[derive(Clone, Debug, PartialEq)]
pub struct PartitionedVector<C> {
    index: PartitionIndex,
    partitions: Vec<C>,
}

/// A partitioned vector over any inner encoding.
pub type GenericPartitionedVector<C> = PartitionedVector<C>;

/// A partitioned vector that stores each partition as runs of consecutive integers.
pub type RunLengthPartitionedVector = PartitionedVector<RunLengthVector>;

impl<C: CompressedVector> PartitionedVector<C> {
    /// Builds with the default configuration of the inner encoding.
    pub fn build<S: Sequence>(seq: S) -> Result<Self> {
        Self::build_with_config(seq, &C::Config::default())
    }

    pub fn build_with_config<S: Sequence>(mut seq: S, config: &C::Config) -> Result<Self> {
        let index = PartitionIndex::build(&mut seq)?;

        let mut partitions = Vec::with_capacity(index.partition_count());
        for range in index.partitions() {
            let mut values = Vec::with_capacity(range.len());
            for i in range {
                values.push(seq.value(i)?);
            }
            partitions.push(C::build(values, config)?);
        }

        let result = PartitionedVector { index, partitions };
        result.log_built();
        Ok(result)
    }

    /// Value at global index `index`.
    pub fn get(&self, index: usize) -> Result<u64> {
        let (partition, offset) = self.index.locate(index)?;
        decode(&self.partitions[partition], partition, offset)
    }

    /// All values in order.
    ///
    /// Yields one item per element. An offset that an inner vector cannot
    /// decode yields a `CorruptSerializedState` error in its place.
    pub fn iter(&self) -> impl Iterator<Item = Result<u64>> + '_ {
        self.index
            .partitions()
            .zip(&self.partitions)
            .enumerate()
            .flat_map(|(p, (range, inner))| (0..range.len()).map(move |offset| decode(inner, p, offset)))
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn partition_count(&self) -> usize {
        self.index.partition_count()
    }

    pub fn partition(&self, partition: usize) -> Option<&C> {
        self.partitions.get(partition)
    }

    pub fn index(&self) -> &PartitionIndex {
        &self.index
    }

    /// Serialized size in bytes.
    pub fn size_in_bytes(&self) -> usize {
        let inner: usize = self.partitions.iter().map(|c| c.size_in_elements()).sum();
        self.index.size_in_bytes() + 8 * inner
    }

    /// Writes `size`, `alphabet_size`, every inner vector in partition order, then the boundary bitmap.
    pub fn serialize<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        self.index.serialize_header(writer)?;
        for inner in &self.partitions {
            inner.serialize(writer)?;
        }
        self.index.serialize_body(writer)?;
        Ok(())
    }

    pub fn load<R: io::Read>(reader: &mut R) -> Result<Self> {
        let (size, alphabet_size) = PartitionIndex::load_header(reader)?;

        // The header is not trusted yet, so the vector grows as partitions load.
        let mut partitions = Vec::new();
        for _ in 0..alphabet_size {
            partitions.push(C::load(reader).map_err(Error::from_load)?);
        }
        let index = PartitionIndex::load_body(reader, size, alphabet_size)?;

        for (p, (range, inner)) in index.partitions().zip(&partitions).enumerate() {
            check_partition_len(p, &range, inner.len())?;
        }

        let result = PartitionedVector { index, partitions };
        info!(
            "loaded PartitionedVector: {} elements, {} partitions, {} bytes",
            result.len(),
            result.partition_count(),
            result.size_in_bytes()
        );
        Ok(result)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.serialize(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut reader = BufReader::new(File::open(path)?);
        Self::load(&mut reader)
    }

    fn log_built(&self) {
        info!(
            "built PartitionedVector: {} elements, {} partitions, {} bytes",
            self.len(),
            self.partition_count(),
            self.size_in_bytes()
        );
    }
}

impl<C> PartitionedVector<C>
where
    C: CompressedVector + Send,
    C::Config: Sync,
{
    /// Like [`build_with_config`](Self::build_with_config), but the inner vectors are built in parallel.
    pub fn build_parallel(values: &[u64], config: &C::Config) -> Result<Self> {
        let index = PartitionIndex::build(values)?;

        let ranges: Vec<Range<usize>> = index.partitions().collect();
        let partitions = ranges
            .into_par_iter()
            .map(|range| C::build(values[range].to_vec(), config))
            .collect::<Result<Vec<C>>>()?;

        let result = PartitionedVector { index, partitions };
        result.log_built();
        Ok(result)
    }
}

fn decode<C: CompressedVector>(inner: &C, partition: usize, offset: usize) -> Result<u64> {
    inner.get(offset).ok_or_else(|| {
        Error::corrupt(format!(
            "partition {} cannot decode offset {}",
            partition, offset
        ))
    })
}

fn check_partition_len(partition: usize, range: &Range<usize>, len: usize) -> Result<()> {
    if range.len() != len {
        return Err(Error::corrupt(format!(
            "partition {} holds {} values, the index expects {}",
            partition,
            len,
            range.len()
        )));
    }
    Ok(())
}
