//! The compiled processor specification format consumed by the `sladec` decoder.
//!
//! A specification is a JSON document describing the address spaces, registers, context
//! variables and decode tables of an instruction set. The standard blob form prefixes the
//! document with the `sla` magic and a version byte and compresses it with zlib; the raw form is
//! the bare document.
//!
//! ```
//! use sla_format::*;
//!
//! let spec = Specification::new("ram")
//!     .space("const", SpaceKind::Constant, 1, 8)
//!     .space("ram", SpaceKind::Processor, 1, 8)
//!     .table(DecodeTable::new(DEFAULT_ROOT_TABLE).constructor(Constructor::new("NOP", 1).byte(0, 0)));
//!
//! let blob = encode(&spec).unwrap();
//! assert_eq!(decode(&blob).unwrap(), spec);
//! ```

use std::borrow::Cow;

mod codec;
mod model;
mod validate;

pub use codec::*;
pub use model::*;
pub use validate::{MAX_CONTEXT_WIDTH, MAX_FIELD_SIZE};

/// Errors produced while encoding or decoding a specification.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("missing or invalid sla header")]
    InvalidHeader,

    #[error("unsupported sla version {found}, expected {expected}")]
    UnsupportedVersion { found: u8, expected: u8 },

    #[error("failed to decompress specification: {0}")]
    Decompress(#[source] std::io::Error),

    #[error("failed to compress specification: {0}")]
    Compress(#[source] std::io::Error),

    #[error("malformed specification document: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("invalid specification: {message}")]
    Invalid { message: Cow<'static, str> },
}

pub type Result<T> = std::result::Result<T, Error>;
