// Self-delimiting integer codes and the bit buffer they are written to.

use std::io;

use simple_sds::bits;
use simple_sds::raw_vector::{AccessRaw, PushRaw, RawVector};
use simple_sds::serialize::Serialize;

const WORD_BITS: usize = u64::BITS as usize;

/// A growable bit buffer for concatenated code words, stored in a [`RawVector`].
///
/// Integers are written and read with at most 64 bits at a time. Reads past
/// the end return `None` instead of panicking.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BitBuf {
    data: RawVector,
}

impl BitBuf {
    pub fn new() -> Self {
        Self::default()
    }

    /// Length in bits.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn get(&self, index: usize) -> bool {
        assert!(index < self.len(), "out of bounds");
        self.data.bit(index)
    }

    pub fn push_bit(&mut self, bit: bool) {
        self.data.push_bit(bit);
    }

    /// Appends the low `width` bits of `value`.
    pub fn push_int(&mut self, value: u64, width: usize) {
        assert!(width <= WORD_BITS, "width {} exceeds a word", width);
        unsafe { self.data.push_int(value, width) }
    }

    /// Reads `width` bits starting at bit `offset`, or `None` if they extend past the end.
    pub fn int(&self, offset: usize, width: usize) -> Option<u64> {
        if width > WORD_BITS || offset.checked_add(width)? > self.len() {
            return None;
        }
        Some(unsafe { self.data.int(offset, width) })
    }

    /// Counts the zero bits from `offset` up to the next one bit.
    pub fn zeros_before_one(&self, offset: usize) -> Option<usize> {
        let mut pos = offset;
        while pos < self.len() {
            let width = WORD_BITS.min(self.len() - pos);
            let word = self.int(pos, width)?;
            if word != 0 {
                return Some(pos + word.trailing_zeros() as usize - offset);
            }
            pos += width;
        }
        None
    }
}

impl Serialize for BitBuf {
    fn serialize_header<T: io::Write>(&self, writer: &mut T) -> io::Result<()> {
        self.data.serialize_header(writer)
    }

    fn serialize_body<T: io::Write>(&self, writer: &mut T) -> io::Result<()> {
        self.data.serialize_body(writer)
    }

    fn load<T: io::Read>(reader: &mut T) -> io::Result<Self> {
        let data = RawVector::load(reader)?;
        Ok(BitBuf { data })
    }

    fn size_in_elements(&self) -> usize {
        self.data.size_in_elements()
    }
}

/// A self-delimiting code for positive integers.
///
/// The length of each code word can be determined while reading it, so code
/// words can be concatenated without separators.
pub trait Coder {
    /// Appends the code for `value`, which must be at least 1.
    fn encode(value: u64, buf: &mut BitBuf);

    /// Decodes the code word at `offset` and advances `offset` past it.
    /// Returns `None` if the buffer ends inside the code word.
    fn decode(buf: &BitBuf, offset: &mut usize) -> Option<u64>;

    /// Number of bits in the code for `value`.
    fn encoded_len(value: u64) -> usize;
}

/// Elias gamma code: the bit length in unary, then the value without its leading one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EliasGamma;

impl Coder for EliasGamma {
    fn encode(value: u64, buf: &mut BitBuf) {
        debug_assert!(value > 0, "gamma code is only defined for positive integers");
        let width = bits::bit_len(value);
        buf.push_int(0, width - 1);
        buf.push_bit(true);
        buf.push_int(value, width - 1);
    }

    fn decode(buf: &BitBuf, offset: &mut usize) -> Option<u64> {
        let zeros = buf.zeros_before_one(*offset)?;
        if zeros >= WORD_BITS {
            return None;
        }
        let low = buf.int(*offset + zeros + 1, zeros)?;
        *offset += 2 * zeros + 1;
        Some((1 << zeros) | low)
    }

    fn encoded_len(value: u64) -> usize {
        2 * bits::bit_len(value) - 1
    }
}

/// Elias delta code: the bit length in gamma code, then the value without its leading one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EliasDelta;

impl Coder for EliasDelta {
    fn encode(value: u64, buf: &mut BitBuf) {
        debug_assert!(value > 0, "delta code is only defined for positive integers");
        let width = bits::bit_len(value);
        EliasGamma::encode(width as u64, buf);
        buf.push_int(value, width - 1);
    }

    fn decode(buf: &BitBuf, offset: &mut usize) -> Option<u64> {
        let mut pos = *offset;
        let width = EliasGamma::decode(buf, &mut pos)? as usize;
        if width > WORD_BITS {
            return None;
        }
        let low = buf.int(pos, width - 1)?;
        *offset = pos + width - 1;
        Some((1 << (width - 1)) | low)
    }

    fn encoded_len(value: u64) -> usize {
        let width = bits::bit_len(value);
        EliasGamma::encoded_len(width as u64) + width - 1
    }
}
