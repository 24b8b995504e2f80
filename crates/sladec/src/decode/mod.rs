//! Single-instruction decoding.
//!
//! Decoding happens in two phases. The walk matches constructors against the instruction bytes,
//! starting from the root table and descending into subtables, and produces an immutable
//! [ParsedInstruction]. The projections in [projection] then render that tree into assembly text
//! and p-code. Both projections read the same tree, so they always agree on operand resolution
//! and never observe the image twice.
mod buffer;
mod projection;

use sla_format::{Constraint, Constructor, OperandKind, RelativeBase};
use tracing::trace;

use crate::context::ContextDatabase;
use crate::image::LoadImage;
use crate::language::Language;
use crate::space::{Address, VarnodeData};
use crate::{DecodeError, Error, Result};

use buffer::InstructionBuffer;

/// An operand of a matched constructor with its value extracted from the instruction bytes.
#[derive(Debug)]
pub(crate) enum ResolvedOperand<'a> {
    Immediate {
        value: u64,
        signed: bool,
        size: usize,
    },
    Register {
        name: &'a str,
        location: VarnodeData,
    },
    Relative {
        displacement: u64,
        base: RelativeBase,
    },
    Subtable(Box<ConstructorNode<'a>>),
}

/// A matched constructor.
#[derive(Debug)]
pub(crate) struct ConstructorNode<'a> {
    pub table: usize,
    pub constructor_index: usize,
    pub constructor: &'a Constructor,

    /// Offset one past the last byte covered by this constructor or any of its subtables
    pub end: usize,

    pub operands: Vec<ResolvedOperand<'a>>,
}

/// The result of walking the decode tables for one instruction.
#[derive(Debug)]
pub(crate) struct ParsedInstruction<'a> {
    pub address: Address,
    pub length: usize,
    pub root: ConstructorNode<'a>,
}

pub(crate) struct Decoder<'a> {
    language: &'a Language,
    context: &'a ContextDatabase,
    max_depth: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(language: &'a Language, context: &'a ContextDatabase, max_depth: usize) -> Self {
        Self {
            language,
            context,
            max_depth,
        }
    }

    /// Walk the decode tables for the instruction at `offset` in the default code space.
    ///
    /// Candidates are tried in declaration order and every constraint of a candidate is checked
    /// against the image. Rejecting a longer candidate declared before an overlapping shorter
    /// one therefore reads bytes past the instruction that finally matches. The reported length
    /// is unaffected, but the image sees more offsets than the instruction covers.
    pub fn parse(&self, image: &dyn LoadImage, offset: u64) -> Result<ParsedInstruction<'a>> {
        let code_space = self.language.spaces.default_code_space();
        let address = Address::new(code_space.id, offset);
        if offset > code_space.max_offset() {
            return Err(DecodeError::AddressOverflow { address }.into());
        }

        let mut buffer = InstructionBuffer::new(image, code_space, address);
        let root = self.parse_table(&mut buffer, self.language.root_table, 0, 0)?;

        let length = root.end;
        if length == 0 {
            return Err(DecodeError::EmptyInstruction { address }.into());
        }

        // Bytes covered by the instruction but never inspected must still be present
        buffer.require(length)?;

        Ok(ParsedInstruction {
            address,
            length,
            root,
        })
    }

    fn parse_table(
        &self,
        buffer: &mut InstructionBuffer,
        table: usize,
        start: usize,
        depth: usize,
    ) -> Result<ConstructorNode<'a>> {
        let address = buffer.address_at(start);

        if depth > self.max_depth {
            return Err(DecodeError::DepthExceeded {
                address,
                depth: self.max_depth,
            }
            .into());
        }

        let decode_table = self.language.spec.tables.get(table).ok_or_else(|| {
            Error::InternalError(format!("table index {table} out of range"))
        })?;

        // A candidate whose bytes are unavailable does not rule out a later, shorter candidate.
        // The read failure is reported only if nothing else matches.
        let mut unreadable = None;
        for (index, constructor) in decode_table.constructors.iter().enumerate() {
            match self.matches(buffer, constructor, start) {
                Ok(true) => {
                    trace!(table = %decode_table.name, index, start, "matched constructor");
                    return self.parse_constructor(buffer, table, index, start, depth);
                }
                Ok(false) => (),
                Err(err @ Error::ImageRead { .. }) => {
                    unreadable.get_or_insert(err);
                }
                Err(err) => return Err(err),
            }
        }

        Err(unreadable.unwrap_or_else(|| {
            DecodeError::NoMatch {
                address,
                table: decode_table.name.clone(),
            }
            .into()
        }))
    }

    fn matches(
        &self,
        buffer: &mut InstructionBuffer,
        constructor: &Constructor,
        start: usize,
    ) -> Result<bool> {
        for constraint in &constructor.constraints {
            let satisfied = match constraint {
                Constraint::Context { name, value } => self.context.value(name)? == *value,
                Constraint::Bytes {
                    offset,
                    mask,
                    value,
                } => buffer.byte(buffer.position(start, *offset)?)? & mask == *value,
            };

            if !satisfied {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn parse_constructor(
        &self,
        buffer: &mut InstructionBuffer,
        table: usize,
        constructor_index: usize,
        start: usize,
        depth: usize,
    ) -> Result<ConstructorNode<'a>> {
        let language = self.language;
        let constructor = &language.spec.tables[table].constructors[constructor_index];
        let big_endian = language.spec.big_endian;
        let mut end = buffer.position(start, constructor.length)?;

        let mut operands = Vec::with_capacity(constructor.operands.len());
        for operand in &constructor.operands {
            let resolved = match &operand.kind {
                OperandKind::Immediate { field } => ResolvedOperand::Immediate {
                    value: buffer.field(start, field, big_endian)?,
                    signed: field.signed,
                    size: field.size,
                },
                OperandKind::Register { field, registers } => {
                    let value = buffer.field(start, field, big_endian)?;
                    let name = usize::try_from(value)
                        .ok()
                        .and_then(|index| registers.get(index))
                        .and_then(Option::as_deref)
                        .ok_or_else(|| DecodeError::InvalidOperand {
                            address: buffer.address_at(start),
                            operand: operand.name.clone(),
                            value,
                        })?;

                    ResolvedOperand::Register {
                        name,
                        location: language.registers.lookup(name)?,
                    }
                }
                OperandKind::Relative { field, base } => ResolvedOperand::Relative {
                    displacement: buffer.field(start, field, big_endian)?,
                    base: *base,
                },
                OperandKind::Subtable {
                    table: subtable,
                    offset,
                } => {
                    let subtable = language.table_index(subtable)?;
                    let position = buffer.position(start, *offset)?;
                    let node = self.parse_table(buffer, subtable, position, depth + 1)?;
                    end = end.max(node.end);
                    ResolvedOperand::Subtable(Box::new(node))
                }
            };

            operands.push(resolved);
        }

        Ok(ConstructorNode {
            table,
            constructor_index,
            constructor,
            end,
            operands,
        })
    }
}
