use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};

use crate::model::*;
use crate::{Error, Result};

/// Maximum number of bytes that may be assembled into a single token field.
pub const MAX_FIELD_SIZE: usize = 8;

/// Maximum width of a context variable in bits.
pub const MAX_CONTEXT_WIDTH: u32 = 32;

fn invalid(message: String) -> Error {
    Error::Invalid {
        message: Cow::Owned(message),
    }
}

fn unique_names<'a>(kind: &str, names: impl Iterator<Item = &'a str>) -> Result<()> {
    let mut seen = BTreeSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(invalid(format!("duplicate {kind} name '{name}'")));
        }
    }

    Ok(())
}

impl Specification {
    /// Check that the document is internally consistent. Every name referenced by a register,
    /// constraint, operand or template must be declared and every index must be in range.
    pub fn validate(&self) -> Result<()> {
        unique_names("space", self.spaces.iter().map(|s| s.name.as_str()))?;
        unique_names("register", self.registers.iter().map(|r| r.name.as_str()))?;
        unique_names("context", self.context.iter().map(|c| c.name.as_str()))?;
        unique_names("table", self.tables.iter().map(|t| t.name.as_str()))?;

        self.validate_spaces()?;
        self.validate_registers()?;
        self.validate_context()?;

        if self.find_table(&self.root_table).is_none() {
            return Err(invalid(format!(
                "root table '{}' is not defined",
                self.root_table
            )));
        }

        for table in &self.tables {
            for (index, constructor) in table.constructors.iter().enumerate() {
                ConstructorValidator {
                    spec: self,
                    location: format!("{}[{index}]", table.name),
                    constructor,
                }
                .validate()?;
            }
        }

        Ok(())
    }

    fn validate_spaces(&self) -> Result<()> {
        for space in &self.spaces {
            if space.word_size == 0 || space.address_size == 0 || space.address_size > 8 {
                return Err(invalid(format!(
                    "space '{}' has invalid word size {} or address size {}",
                    space.name, space.word_size, space.address_size
                )));
            }
        }

        let code_space = self.find_space(&self.default_code_space).ok_or_else(|| {
            invalid(format!(
                "default code space '{}' is not defined",
                self.default_code_space
            ))
        })?;

        if code_space.kind != SpaceKind::Processor || code_space.word_size != 1 {
            return Err(invalid(format!(
                "default code space '{}' must be a byte-addressed processor space",
                code_space.name
            )));
        }

        if !self
            .spaces
            .iter()
            .any(|space| space.kind == SpaceKind::Constant)
        {
            return Err(invalid("no constant space defined".to_string()));
        }

        Ok(())
    }

    fn validate_registers(&self) -> Result<()> {
        let mut locations = BTreeMap::new();
        for register in &self.registers {
            let space = self.find_space(&register.space).ok_or_else(|| {
                invalid(format!(
                    "register '{}' refers to unknown space '{}'",
                    register.name, register.space
                ))
            })?;

            if space.kind != SpaceKind::Register {
                return Err(invalid(format!(
                    "register '{}' is not in a register space",
                    register.name
                )));
            }

            if register.size == 0 || register.offset.checked_add(register.size as u64).is_none() {
                return Err(invalid(format!(
                    "register '{}' has invalid size {}",
                    register.name, register.size
                )));
            }

            let location = (register.space.as_str(), register.offset, register.size);
            if let Some(other) = locations.insert(location, register.name.as_str()) {
                return Err(invalid(format!(
                    "registers '{other}' and '{}' share the same location",
                    register.name
                )));
            }
        }

        Ok(())
    }

    fn validate_context(&self) -> Result<()> {
        for field in &self.context {
            if field.width == 0 || field.width > MAX_CONTEXT_WIDTH {
                return Err(invalid(format!(
                    "context variable '{}' has invalid width {}",
                    field.name, field.width
                )));
            }
        }

        Ok(())
    }
}

struct ConstructorValidator<'a> {
    spec: &'a Specification,
    location: String,
    constructor: &'a Constructor,
}

impl ConstructorValidator<'_> {
    fn invalid(&self, message: impl std::fmt::Display) -> Error {
        invalid(format!("constructor {}: {message}", self.location))
    }

    fn validate(&self) -> Result<()> {
        // An instruction never spans more bytes than the code space can address
        let code_span = self
            .spec
            .find_space(&self.spec.default_code_space)
            .map_or(0, |space| 1u128 << (8 * space.address_size.min(8) as u32));
        if self.constructor.length as u128 > code_span {
            return Err(self.invalid(format!(
                "length {} exceeds the code space",
                self.constructor.length
            )));
        }

        for constraint in &self.constructor.constraints {
            match constraint {
                Constraint::Bytes { offset, .. } if *offset >= self.constructor.length => {
                    return Err(self.invalid(format!(
                        "byte constraint at offset {offset} lies outside length {}",
                        self.constructor.length
                    )));
                }
                Constraint::Bytes { .. } => (),
                Constraint::Context { name, .. } => {
                    if !self.spec.context.iter().any(|c| &c.name == name) {
                        return Err(self.invalid(format!("unknown context variable '{name}'")));
                    }
                }
            }
        }

        for operand in &self.constructor.operands {
            self.validate_operand(operand)?;
        }

        for piece in self.constructor.display.iter().flatten() {
            if let DisplayPiece::Operand(index) = piece {
                self.operand(*index)?;
            }
        }

        for op in &self.constructor.semantics {
            if op.opcode.is_empty() {
                return Err(self.invalid("empty opcode name"));
            }

            for template in op.output.iter().chain(op.inputs.iter()) {
                self.validate_template(template)?;
            }
        }

        if let Some(export) = &self.constructor.export {
            self.validate_template(export)?;
        }

        Ok(())
    }

    fn operand(&self, index: usize) -> Result<&Operand> {
        self.constructor
            .operands
            .get(index)
            .ok_or_else(|| self.invalid(format!("operand index {index} out of range")))
    }

    fn validate_field(&self, name: &str, field: &Field) -> Result<()> {
        let fits = field.size > 0
            && field.size <= MAX_FIELD_SIZE
            && field.bits > 0
            && field
                .offset
                .checked_add(field.size)
                .is_some_and(|end| end <= self.constructor.length)
            && (field.shift as usize) + (field.bits as usize) <= field.size * 8;

        if fits {
            Ok(())
        } else {
            Err(self.invalid(format!("field of operand '{name}' does not fit: {field:?}")))
        }
    }

    fn validate_operand(&self, operand: &Operand) -> Result<()> {
        match &operand.kind {
            OperandKind::Immediate { field } | OperandKind::Relative { field, .. } => {
                self.validate_field(&operand.name, field)
            }
            OperandKind::Register { field, registers } => {
                self.validate_field(&operand.name, field)?;
                for name in registers.iter().flatten() {
                    if !self.spec.registers.iter().any(|r| &r.name == name) {
                        return Err(self.invalid(format!(
                            "operand '{}' attaches unknown register '{name}'",
                            operand.name
                        )));
                    }
                }
                Ok(())
            }
            OperandKind::Subtable { table, offset } => {
                if *offset > self.constructor.length {
                    return Err(self.invalid(format!(
                        "subtable operand '{}' starts beyond length {}",
                        operand.name, self.constructor.length
                    )));
                }

                match self.spec.find_table(table) {
                    Some(_) => Ok(()),
                    None => Err(self.invalid(format!("unknown table '{table}'"))),
                }
            }
        }
    }

    fn validate_template(&self, template: &VarnodeTemplate) -> Result<()> {
        match template {
            VarnodeTemplate::Operand(index) => {
                let operand = self.operand(*index)?;
                if let OperandKind::Subtable { table, .. } = &operand.kind {
                    let exports = self
                        .spec
                        .find_table(table)
                        .is_some_and(|t| t.constructors.iter().all(|c| c.export.is_some()));
                    if !exports {
                        return Err(self.invalid(format!(
                            "table '{table}' is used as a varnode but does not export one"
                        )));
                    }
                }
                Ok(())
            }
            VarnodeTemplate::Register(name) => {
                if self.spec.registers.iter().any(|r| &r.name == name) {
                    Ok(())
                } else {
                    Err(self.invalid(format!("unknown register '{name}'")))
                }
            }
            VarnodeTemplate::Space(name) => match self.spec.find_space(name) {
                Some(_) => Ok(()),
                None => Err(self.invalid(format!("unknown space '{name}'"))),
            },
            VarnodeTemplate::Constant { size, .. } | VarnodeTemplate::Temporary { size, .. }
                if *size == 0 =>
            {
                Err(self.invalid("zero-sized varnode"))
            }
            VarnodeTemplate::Temporary { .. } => {
                if self
                    .spec
                    .spaces
                    .iter()
                    .any(|space| space.kind == SpaceKind::Unique)
                {
                    Ok(())
                } else {
                    Err(self.invalid("temporary used without a unique space"))
                }
            }
            VarnodeTemplate::Constant { .. }
            | VarnodeTemplate::InstStart
            | VarnodeTemplate::InstNext => Ok(()),
        }
    }
}
