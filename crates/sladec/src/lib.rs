//! This crate decodes machine instructions using a compiled Sleigh-style processor specification
//! and translates them to **p-code**.
//!
//! A processor specification describes a microprocessor with enough detail to facilitate
//! disassembly: its address spaces, registers, context variables and the decode tables that match
//! instruction bytes. Each matched instruction is rendered as native assembly and translated to
//! p-code, which captures the instruction semantics independent of the specific processor.
//! Specifications are loaded from the blob format of the [sla_format] crate.
//!
//! ```
//! use sla_format::{Constructor, DecodeTable, SpaceKind, Specification};
//! use sladec::SleighContext;
//!
//! let spec = Specification::new("ram")
//!     .space("const", SpaceKind::Constant, 1, 8)
//!     .space("ram", SpaceKind::Processor, 1, 4)
//!     .table(DecodeTable::new("instruction").constructor(Constructor::new("NOP", 1).byte(0, 0x90)));
//!
//! let mut sleigh = SleighContext::new(sla_format::encode(&spec)?)?;
//! sleigh.bind_image(vec![0x90]);
//!
//! let instruction = sleigh.decode_one(0)?;
//! assert_eq!(instruction.disassembly.mnemonic, "NOP");
//! assert_eq!(instruction.length, 1);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod context;
mod decode;
mod emit;
mod image;
mod language;
mod opcodes;
mod register;
mod sleigh;
mod space;

pub use emit::*;
pub use image::*;
pub use opcodes::*;
pub use register::*;
pub use sleigh::*;
pub use space::*;
