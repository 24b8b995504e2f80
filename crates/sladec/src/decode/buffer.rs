use sla_format::Field;
use tracing::trace;

use crate::image::{ImageError, LoadImage};
use crate::space::{Address, AddressSpace, VarnodeData};
use crate::{DecodeError, Error, Result};

/// Instruction bytes fetched lazily from a [LoadImage].
///
/// The buffer only ever holds a prefix of the instruction. Requesting a byte beyond the prefix
/// reads exactly the missing bytes, so image reads start at non-decreasing offsets and never
/// extend past the furthest byte decoding asked for.
pub(crate) struct InstructionBuffer<'a> {
    image: &'a dyn LoadImage,
    space: &'a AddressSpace,
    start: Address,
    bytes: Vec<u8>,
}

fn mask(bits: u32) -> u64 {
    if bits >= u64::BITS {
        u64::MAX
    } else {
        (1 << bits) - 1
    }
}

impl<'a> InstructionBuffer<'a> {
    pub fn new(image: &'a dyn LoadImage, space: &'a AddressSpace, start: Address) -> Self {
        Self {
            image,
            space,
            start,
            bytes: Vec::new(),
        }
    }

    /// Number of bytes fetched from the image so far.
    pub fn fetched(&self) -> usize {
        self.bytes.len()
    }

    /// Address of the byte at `position` relative to the start of the instruction.
    pub fn address_at(&self, position: usize) -> Address {
        let offset = self.start.offset.wrapping_add(position as u64) & self.space.max_offset();
        Address::new(self.start.address_space, offset)
    }

    /// Position `offset` bytes past `base`, failing if it cannot be addressed.
    pub fn position(&self, base: usize, offset: usize) -> Result<usize> {
        base.checked_add(offset).ok_or_else(|| {
            DecodeError::AddressOverflow {
                address: self.start,
            }
            .into()
        })
    }

    /// Ensure the first `len` bytes of the instruction have been fetched.
    pub fn require(&mut self, len: usize) -> Result<()> {
        let fetched = self.fetched();
        if len <= fetched {
            return Ok(());
        }

        let overflow = || {
            Error::Decode(DecodeError::AddressOverflow {
                address: self.start,
            })
        };

        // Last byte of the requested range must be addressable
        u64::try_from(len - 1)
            .ok()
            .and_then(|len| self.start.offset.checked_add(len))
            .filter(|&last| last <= self.space.max_offset())
            .ok_or_else(overflow)?;
        let offset = self.start.offset + fetched as u64;

        let location = VarnodeData::new(Address::new(self.space.id, offset), len - fetched);
        trace!(%location, "reading instruction bytes");

        let data = self
            .image
            .instruction_bytes(&location)
            .map_err(|source| Error::ImageRead { location, source })?;

        // A well-behaved image returns exactly the bytes requested
        if data.len() != location.size {
            return Err(Error::ImageRead {
                location,
                source: ImageError::OutOfBounds(location),
            });
        }

        self.bytes.extend_from_slice(&data);
        Ok(())
    }

    /// The byte at `position` relative to the start of the instruction.
    pub fn byte(&mut self, position: usize) -> Result<u8> {
        self.require(self.position(position, 1)?)?;
        Ok(self.bytes[position])
    }

    /// Extract a token field located relative to a constructor starting at `base`. The returned
    /// value is sign-extended to 64 bits for signed fields.
    pub fn field(&mut self, base: usize, field: &Field, big_endian: bool) -> Result<u64> {
        let position = self.position(base, field.offset)?;
        let end = self.position(position, field.size)?;
        self.require(end)?;

        let token_bytes = &self.bytes[position..end];
        let assemble = |token: u64, byte: &u8| (token << 8) | u64::from(*byte);
        let token = if big_endian {
            token_bytes.iter().fold(0, assemble)
        } else {
            token_bytes.iter().rev().fold(0, assemble)
        };

        let value = (token >> field.shift) & mask(field.bits);
        let negative = field.signed && field.bits < u64::BITS && (value >> (field.bits - 1)) & 1 == 1;
        if negative {
            Ok(value | !mask(field.bits))
        } else {
            Ok(value)
        }
    }
}
