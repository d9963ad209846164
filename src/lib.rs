//! Compressed Psi arrays, partitioned by symbol.
//!
//! The Psi array of a compressed suffix array is increasing within each
//! symbol's range of suffixes. [`PartitionedVector`] splits an integer
//! sequence at every descent, compresses each partition with a pluggable
//! [`CompressedVector`] encoding and answers random access through a sparse
//! boundary bitvector.

pub mod coder;
pub mod compressedvector;
pub mod encvector;
pub mod error;
pub mod partitionindex;
pub mod psi;
pub mod psivector;
pub mod rlevector;
pub mod sequence;

pub use coder::{BitBuf, Coder, EliasDelta, EliasGamma};
pub use compressedvector::CompressedVector;
pub use encvector::{EncVector, EncVectorConfig};
pub use error::{Error, Result};
pub use partitionindex::PartitionIndex;
pub use psi::psi_from_text;
pub use psivector::{GenericPartitionedVector, PartitionedVector, RunLengthPartitionedVector};
pub use rlevector::{RunLengthBuilder, RunLengthIter, RunLengthVector};
pub use sequence::{write_words, BufferedSequence, Sequence, DEFAULT_BUFFER_LEN};
