use std::fmt::Debug;

use simple_sds::bits;
use simple_sds::int_vector::IntVector;
use simple_sds::ops::{Access, Push, Vector};
use simple_sds::serialize::Serialize;

use crate::error::{Error, Result};

/// An immutable integer vector that a partitioned vector stores one of per partition.
///
/// Implementors take ownership of the values of one partition, which are
/// non-decreasing when built by a partitioned vector. Persistence goes through
/// [`Serialize`], whose `size_in_elements` is also the reported space usage.
pub trait CompressedVector: Serialize + Sized {
    /// Construction parameters.
    type Config: Clone + Debug + Default;

    fn build(values: Vec<u64>, config: &Self::Config) -> Result<Self>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Decodes the value at `index`, or returns `None` if `index >= self.len()`.
    fn get(&self, index: usize) -> Option<u64>;
}

// Plain bit-packed storage, using just enough bits for the largest value.
impl CompressedVector for IntVector {
    type Config = ();

    fn build(values: Vec<u64>, _config: &()) -> Result<Self> {
        let max = values.iter().copied().max().unwrap_or(0);
        let width = bits::bit_len(max).max(1);
        let mut result = IntVector::with_capacity(values.len(), width).map_err(Error::encoding)?;
        for value in values {
            result.push(value);
        }
        Ok(result)
    }

    fn len(&self) -> usize {
        Vector::len(self)
    }

    fn get(&self, index: usize) -> Option<u64> {
        if index >= Vector::len(self) {
            return None;
        }
        Some(Access::get(self, index))
    }
}
