use std::collections::BTreeMap;

use sla_format::Specification;

use crate::opcodes::{self, OpCode};
use crate::register::RegisterCatalog;
use crate::space::SpaceRegistry;
use crate::{Error, Result};

/// The immutable part of a loaded specification: its address spaces, registers and decode tables
/// with every name resolved.
#[derive(Debug)]
pub(crate) struct Language {
    pub spec: Specification,
    pub spaces: SpaceRegistry,
    pub registers: RegisterCatalog,

    /// Table name to index into `spec.tables`
    table_index: BTreeMap<String, usize>,

    /// Resolved opcodes of every semantic template, indexed by table, constructor, then operation
    opcodes: Vec<Vec<Vec<OpCode>>>,

    pub root_table: usize,
}

impl Language {
    pub fn new(spec: Specification) -> Result<Self> {
        let opcode_table = opcodes::initialize();
        let spaces = SpaceRegistry::new(&spec)?;
        let registers = RegisterCatalog::new(&spec, &spaces)?;

        let table_index: BTreeMap<String, usize> = spec
            .tables
            .iter()
            .enumerate()
            .map(|(index, table)| (table.name.clone(), index))
            .collect();

        let opcodes = spec
            .tables
            .iter()
            .map(|table| {
                table
                    .constructors
                    .iter()
                    .map(|constructor| {
                        constructor
                            .semantics
                            .iter()
                            .map(|op| match opcode_table.opcode(&op.opcode) {
                                Some(opcode) if !opcode.is_analysis() => Ok(opcode),
                                _ => Err(Error::UnknownOpcode(op.opcode.clone())),
                            })
                            .collect::<Result<Vec<_>>>()
                    })
                    .collect::<Result<Vec<_>>>()
            })
            .collect::<Result<Vec<_>>>()?;

        let root_table = table_index
            .get(&spec.root_table)
            .copied()
            .ok_or_else(|| Error::InternalError(format!("root table {} missing", spec.root_table)))?;

        Ok(Self {
            spec,
            spaces,
            registers,
            table_index,
            opcodes,
            root_table,
        })
    }

    pub fn table_index(&self, name: &str) -> Result<usize> {
        self.table_index
            .get(name)
            .copied()
            .ok_or_else(|| Error::InternalError(format!("unknown table {name}")))
    }

    pub fn opcodes(&self, table: usize, constructor: usize) -> &[OpCode] {
        self.opcodes
            .get(table)
            .and_then(|constructors| constructors.get(constructor))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}
