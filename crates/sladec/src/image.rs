//! The memory image a decoder fetches instruction bytes from.
//!
//! A [LoadImage] is supplied by the caller; the decoder never owns backing memory. Reads are
//! described by a [VarnodeData] naming the address space, offset and number of bytes wanted.
use std::sync::Arc;

use crate::space::VarnodeData;

/// Errors reported by a [LoadImage].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ImageError {
    #[error("{0} is not mapped in the image")]
    OutOfBounds(VarnodeData),

    #[error("{0} is not executable")]
    NotExecutable(VarnodeData),

    #[error("image unavailable: {0}")]
    Unavailable(String),
}

/// Source of instruction bytes.
///
/// Implementations must be deterministic: repeated reads of the same range while decoding a
/// single instruction must return the same bytes. A read either returns exactly `source.size`
/// bytes or fails.
pub trait LoadImage {
    fn instruction_bytes(&self, source: &VarnodeData) -> Result<Vec<u8>, ImageError>;
}

impl<T: LoadImage + ?Sized> LoadImage for &T {
    fn instruction_bytes(&self, source: &VarnodeData) -> Result<Vec<u8>, ImageError> {
        (**self).instruction_bytes(source)
    }
}

impl<T: LoadImage + ?Sized> LoadImage for Box<T> {
    fn instruction_bytes(&self, source: &VarnodeData) -> Result<Vec<u8>, ImageError> {
        (**self).instruction_bytes(source)
    }
}

impl<T: LoadImage + ?Sized> LoadImage for Arc<T> {
    fn instruction_bytes(&self, source: &VarnodeData) -> Result<Vec<u8>, ImageError> {
        (**self).instruction_bytes(source)
    }
}

/// A flat image starting at offset 0. The address space of the request is not consulted.
impl LoadImage for [u8] {
    fn instruction_bytes(&self, source: &VarnodeData) -> Result<Vec<u8>, ImageError> {
        let range = source
            .range()
            .ok_or(ImageError::OutOfBounds(*source))?;
        let start = usize::try_from(range.start).map_err(|_| ImageError::OutOfBounds(*source))?;
        let end = usize::try_from(range.end).map_err(|_| ImageError::OutOfBounds(*source))?;

        self.get(start..end)
            .map(<[u8]>::to_vec)
            .ok_or(ImageError::OutOfBounds(*source))
    }
}

impl LoadImage for Vec<u8> {
    fn instruction_bytes(&self, source: &VarnodeData) -> Result<Vec<u8>, ImageError> {
        self.as_slice().instruction_bytes(source)
    }
}

/// An image with nothing mapped. Every read fails.
#[derive(Copy, Clone, Debug, Default)]
pub struct EmptyImage;

impl LoadImage for EmptyImage {
    fn instruction_bytes(&self, source: &VarnodeData) -> Result<Vec<u8>, ImageError> {
        Err(ImageError::OutOfBounds(*source))
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Perms {
    pub read: bool,
    pub write: bool,
    pub exec: bool,
}

impl Perms {
    pub const RWX: Perms = Perms {
        read: true,
        write: true,
        exec: true,
    };

    pub const RX: Perms = Perms {
        read: true,
        write: false,
        exec: true,
    };

    pub const RW: Perms = Perms {
        read: true,
        write: true,
        exec: false,
    };

    pub const R: Perms = Perms {
        read: true,
        write: false,
        exec: false,
    };

    pub const NONE: Perms = Perms {
        read: false,
        write: false,
        exec: false,
    };
}

/// A contiguous, mapped region of an [Image].
#[derive(Clone, Debug)]
pub struct ImageSection {
    pub base_address: u64,
    pub data: Vec<u8>,
    pub perms: Perms,
}

impl ImageSection {
    pub fn new(base_address: u64, data: impl Into<Vec<u8>>, perms: Perms) -> Self {
        Self {
            base_address,
            data: data.into(),
            perms,
        }
    }

    fn contains(&self, range: &std::ops::Range<u64>) -> bool {
        let len = self.data.len() as u64;
        range.start >= self.base_address
            && self
                .base_address
                .checked_add(len)
                .is_some_and(|end| range.end <= end)
    }
}

/// An image made of sections placed at arbitrary base addresses, such as the loadable segments
/// of an executable. Instruction bytes may only be fetched from a single executable section.
/// Section addresses are offsets in the code space; the address space of a request is not
/// consulted.
#[derive(Clone, Debug, Default)]
pub struct Image {
    sections: Vec<ImageSection>,
}

impl Image {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_section(mut self, section: ImageSection) -> Self {
        self.sections.push(section);
        self
    }

    pub fn sections(&self) -> &[ImageSection] {
        &self.sections
    }
}

impl From<Vec<ImageSection>> for Image {
    fn from(sections: Vec<ImageSection>) -> Self {
        Self { sections }
    }
}

impl LoadImage for Image {
    fn instruction_bytes(&self, source: &VarnodeData) -> Result<Vec<u8>, ImageError> {
        let range = source.range().ok_or(ImageError::OutOfBounds(*source))?;
        let section = self
            .sections
            .iter()
            .find(|section| section.contains(&range))
            .ok_or(ImageError::OutOfBounds(*source))?;

        if !section.perms.exec {
            return Err(ImageError::NotExecutable(*source));
        }

        let start = usize::try_from(range.start - section.base_address)
            .map_err(|_| ImageError::OutOfBounds(*source))?;
        Ok(section.data[start..start + source.size].to_vec())
    }
}
