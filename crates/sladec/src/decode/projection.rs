//! Projections of a [ParsedInstruction] into assembly text and p-code.
use sla_format::{DisplayPiece, RelativeBase, VarnodeTemplate};

use crate::emit::AssemblyEmit;
use crate::language::Language;
use crate::sleigh::PcodeInstruction;
use crate::space::{Address, VarnodeData};
use crate::{DecodeError, Error, Result};

use super::{ConstructorNode, ParsedInstruction, ResolvedOperand};

fn size_mask(size: usize) -> u64 {
    match size {
        size if size >= 8 => u64::MAX,
        size => (1u64 << (size * 8)) - 1,
    }
}

/// Formats an immediate. Signed values are printed with a leading minus sign when negative.
fn format_immediate(value: u64, signed: bool, size: usize) -> String {
    let value = if signed {
        value
    } else {
        value & size_mask(size)
    };

    match value as i64 {
        negative if signed && negative < 0 => format!("-0x{:X}", negative.unsigned_abs()),
        _ => format!("0x{value:X}"),
    }
}

impl<'a> ParsedInstruction<'a> {
    /// Code address an operand relative to this instruction refers to.
    fn relative_target(&self, language: &Language, displacement: u64, base: RelativeBase) -> u64 {
        let base = match base {
            RelativeBase::Start => self.address.offset,
            RelativeBase::Next => self.address.offset.wrapping_add(self.length as u64),
        };

        base.wrapping_add(displacement) & language.spaces.default_code_space().max_offset()
    }

    /// Emit the mnemonic followed by every displayed operand of the root constructor.
    pub fn render(&self, language: &Language, emit: &mut dyn AssemblyEmit) {
        emit.mnemonic(&self.address, &self.root.constructor.mnemonic);
        for display in &self.root.constructor.display {
            emit.operand(self.render_display(language, &self.root, display));
        }
    }

    fn render_display(
        &self,
        language: &Language,
        node: &ConstructorNode,
        display: &[DisplayPiece],
    ) -> String {
        let mut text = String::new();
        for piece in display {
            match piece {
                DisplayPiece::Text(literal) => text.push_str(literal),
                DisplayPiece::Operand(index) => {
                    // Operand indices are checked when the specification is loaded
                    if let Some(operand) = node.operands.get(*index) {
                        text.push_str(&self.render_operand(language, operand));
                    }
                }
            }
        }

        text
    }

    fn render_operand(&self, language: &Language, operand: &ResolvedOperand) -> String {
        match operand {
            ResolvedOperand::Immediate {
                value,
                signed,
                size,
            } => format_immediate(*value, *signed, *size),
            ResolvedOperand::Register { name, .. } => name.to_string(),
            ResolvedOperand::Relative { displacement, base } => {
                format!("0x{:X}", self.relative_target(language, *displacement, *base))
            }
            ResolvedOperand::Subtable(node) => {
                let operands = node
                    .constructor
                    .display
                    .iter()
                    .map(|display| self.render_display(language, node, display))
                    .collect::<Vec<_>>()
                    .join(", ");

                match (node.constructor.mnemonic.is_empty(), operands.is_empty()) {
                    (_, true) => node.constructor.mnemonic.clone(),
                    (true, false) => operands,
                    (false, false) => format!("{} {operands}", node.constructor.mnemonic),
                }
            }
        }
    }

    /// Build the p-code of the instruction. The semantics of each subtable are placed before the
    /// semantics of the constructor referencing it, in operand order.
    pub fn build(&self, language: &Language) -> Result<Vec<PcodeInstruction>> {
        let mut instructions = Vec::new();
        self.build_node(language, &self.root, &mut instructions)?;
        Ok(instructions)
    }

    fn build_node(
        &self,
        language: &Language,
        node: &ConstructorNode,
        instructions: &mut Vec<PcodeInstruction>,
    ) -> Result<()> {
        for operand in &node.operands {
            if let ResolvedOperand::Subtable(subtable) = operand {
                self.build_node(language, subtable, instructions)?;
            }
        }

        let opcodes = language.opcodes(node.table, node.constructor_index);
        if opcodes.len() != node.constructor.semantics.len() {
            return Err(Error::InternalError(format!(
                "constructor {index} of table {table} has {templates} templates but {opcodes} opcodes",
                index = node.constructor_index,
                table = node.table,
                templates = node.constructor.semantics.len(),
                opcodes = opcodes.len(),
            )));
        }

        for (template, op_code) in node.constructor.semantics.iter().zip(opcodes) {
            let output = template
                .output
                .as_ref()
                .map(|output| self.resolve(language, node, output))
                .transpose()?;

            let inputs = template
                .inputs
                .iter()
                .map(|input| self.resolve(language, node, input))
                .collect::<Result<Vec<_>>>()?;

            instructions.push(PcodeInstruction {
                address: self.address,
                op_code: *op_code,
                inputs,
                output,
            });
        }

        Ok(())
    }

    /// Resolve a varnode template against the operands of a matched constructor.
    fn resolve(
        &self,
        language: &Language,
        node: &ConstructorNode,
        template: &VarnodeTemplate,
    ) -> Result<VarnodeData> {
        let spaces = &language.spaces;
        let constant = |value: u64, size: usize| {
            VarnodeData::new(
                Address::new(spaces.constant_space().id, value & size_mask(size)),
                size,
            )
        };

        let code_space = spaces.default_code_space();
        let varnode = match template {
            VarnodeTemplate::Operand(index) => {
                let operand = node.operands.get(*index).ok_or_else(|| {
                    Error::InternalError(format!("operand {index} out of range"))
                })?;
                self.operand_handle(language, operand)?
            }
            VarnodeTemplate::Register(name) => language.registers.lookup(name)?,
            VarnodeTemplate::Constant { value, size } => constant(*value, *size),
            VarnodeTemplate::Temporary { offset, size } => {
                let unique = spaces.unique_space().ok_or_else(|| {
                    Error::InternalError("temporary used without a unique space".into())
                })?;
                VarnodeData::new(Address::new(unique.id, *offset), *size)
            }
            VarnodeTemplate::Space(name) => {
                let space = spaces
                    .by_name(name)
                    .ok_or_else(|| Error::InternalError(format!("unknown space {name}")))?;
                let size = spaces.constant_space().address_size;
                constant(space.id.index() as u64, size)
            }
            VarnodeTemplate::InstStart => constant(self.address.offset, code_space.address_size),
            VarnodeTemplate::InstNext => constant(
                self.address.offset.wrapping_add(self.length as u64),
                code_space.address_size,
            ),
        };

        Ok(varnode)
    }

    /// The location an operand stands for when named by a semantic template.
    fn operand_handle(&self, language: &Language, operand: &ResolvedOperand) -> Result<VarnodeData> {
        let spaces = &language.spaces;
        match operand {
            ResolvedOperand::Immediate { value, size, .. } => Ok(VarnodeData::new(
                Address::new(spaces.constant_space().id, value & size_mask(*size)),
                *size,
            )),
            ResolvedOperand::Register { location, .. } => Ok(*location),
            ResolvedOperand::Relative { displacement, base } => {
                let code_space = spaces.default_code_space();
                Ok(VarnodeData::new(
                    Address::new(
                        code_space.id,
                        self.relative_target(language, *displacement, *base),
                    ),
                    code_space.address_size,
                ))
            }
            ResolvedOperand::Subtable(node) => match &node.constructor.export {
                Some(export) => self.resolve(language, node, export),
                None => Err(DecodeError::MissingExport {
                    address: self.address,
                    table: language
                        .spec
                        .tables
                        .get(node.table)
                        .map(|table| table.name.clone())
                        .unwrap_or_default(),
                }
                .into()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::format_immediate;

    #[test]
    fn immediates() {
        assert_eq!(format_immediate(0x2a, false, 1), "0x2A");
        assert_eq!(format_immediate(0, false, 1), "0x0");
        assert_eq!(format_immediate(u64::MAX, false, 1), "0xFF");
        assert_eq!(format_immediate(-2i64 as u64, true, 1), "-0x2");
        assert_eq!(format_immediate(0x7f, true, 1), "0x7F");
        assert_eq!(format_immediate(i64::MIN as u64, true, 8), "-0x8000000000000000");
    }
}
