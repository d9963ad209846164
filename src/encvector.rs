use std::io;
use std::marker::PhantomData;

use simple_sds::int_vector::IntVector;
use simple_sds::ops::Vector;
use simple_sds::serialize::Serialize;

use crate::coder::{BitBuf, Coder, EliasDelta};
use crate::compressedvector::CompressedVector;
use crate::error::{invalid_data, Error, Result};

/// Construction parameters for [`EncVector`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EncVectorConfig {
    /// Every `sample_density`-th value is stored verbatim.
    pub sample_density: usize,
}

impl Default for EncVectorConfig {
    fn default() -> Self {
        EncVectorConfig {
            sample_density: 128,
        }
    }
}

/// A non-decreasing integer vector stored as sampled, self-delimiting coded differences.
///
/// Value `i` is rebuilt from the sample at `i / sample_density` by decoding
/// at most `sample_density - 1` codes. A difference `d` is stored as `C(d + 1)`,
/// since the coders only represent positive integers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncVector<C = EliasDelta> {
    len: usize,
    sample_density: usize,
    samples: IntVector,
    // Bit offset of the first code after each sample.
    pointers: IntVector,
    data: BitBuf,
    coder: PhantomData<C>,
}

impl<C: Coder> EncVector<C> {
    pub fn sample_density(&self) -> usize {
        self.sample_density
    }

    /// Size of the code stream in bits.
    pub fn coded_bits(&self) -> usize {
        self.data.len()
    }
}

impl<C: Coder> CompressedVector for EncVector<C> {
    type Config = EncVectorConfig;

    fn build(values: Vec<u64>, config: &EncVectorConfig) -> Result<Self> {
        let sample_density = config.sample_density;
        if sample_density == 0 {
            return Err(Error::encoding("sample density must be positive"));
        }

        let mut samples = Vec::with_capacity(values.len().div_ceil(sample_density));
        let mut pointers = Vec::with_capacity(samples.capacity());
        let mut data = BitBuf::new();
        let mut prev = 0;
        for (i, &value) in values.iter().enumerate() {
            if i % sample_density == 0 {
                samples.push(value);
                pointers.push(data.len() as u64);
            } else {
                if value < prev {
                    return Err(Error::encoding(format!(
                        "value {} at offset {} is smaller than its predecessor {}",
                        value, i, prev
                    )));
                }
                let code = (value - prev)
                    .checked_add(1)
                    .ok_or_else(|| Error::encoding(format!("difference at offset {} overflows", i)))?;
                C::encode(code, &mut data);
            }
            prev = value;
        }

        Ok(EncVector {
            len: values.len(),
            sample_density,
            samples: <IntVector as CompressedVector>::build(samples, &())?,
            pointers: <IntVector as CompressedVector>::build(pointers, &())?,
            data,
            coder: PhantomData,
        })
    }

    fn len(&self) -> usize {
        self.len
    }

    fn get(&self, index: usize) -> Option<u64> {
        if index >= self.len {
            return None;
        }
        let sample = index / self.sample_density;
        let mut value = CompressedVector::get(&self.samples, sample)?;
        let mut offset = CompressedVector::get(&self.pointers, sample)? as usize;
        for _ in 0..index % self.sample_density {
            let code = C::decode(&self.data, &mut offset)?;
            value = value.checked_add(code - 1)?;
        }
        Some(value)
    }
}

impl<C: Coder> Serialize for EncVector<C> {
    fn serialize_header<T: io::Write>(&self, writer: &mut T) -> io::Result<()> {
        self.len.serialize(writer)?;
        self.sample_density.serialize(writer)
    }

    fn serialize_body<T: io::Write>(&self, writer: &mut T) -> io::Result<()> {
        self.samples.serialize(writer)?;
        self.pointers.serialize(writer)?;
        self.data.serialize(writer)
    }

    fn load<T: io::Read>(reader: &mut T) -> io::Result<Self> {
        let len = usize::load(reader)?;
        let sample_density = usize::load(reader)?;
        if sample_density == 0 {
            return Err(invalid_data("sample density must be positive"));
        }
        let samples = IntVector::load(reader)?;
        let pointers = IntVector::load(reader)?;
        let data = BitBuf::load(reader)?;

        let expected = len.div_ceil(sample_density);
        if Vector::len(&samples) != expected || Vector::len(&pointers) != expected {
            return Err(invalid_data(format!(
                "{} samples and {} pointers for {} values, expected {}",
                Vector::len(&samples),
                Vector::len(&pointers),
                len,
                expected
            )));
        }
        Ok(EncVector {
            len,
            sample_density,
            samples,
            pointers,
            data,
            coder: PhantomData,
        })
    }

    fn size_in_elements(&self) -> usize {
        self.len.size_in_elements()
            + self.sample_density.size_in_elements()
            + self.samples.size_in_elements()
            + self.pointers.size_in_elements()
            + self.data.size_in_elements()
    }
}
