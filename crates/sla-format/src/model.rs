//! The document model of a compiled processor specification.
//!
//! A specification declares the address spaces of a processor, its registers and context
//! variables, and a set of decode tables. Each decode table holds constructors: a constructor
//! matches a byte pattern, extracts operands from the matched bytes, and describes both the
//! assembly rendering and the p-code semantics of the instruction it recognizes.
use serde::{Deserialize, Serialize};

/// Name of the decode table used as the entry point when none is given.
pub const DEFAULT_ROOT_TABLE: &str = "instruction";

fn default_root_table() -> String {
    DEFAULT_ROOT_TABLE.to_string()
}

/// A compiled processor specification.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Specification {
    /// Byte order used when assembling multi-byte token fields.
    pub big_endian: bool,

    /// Address spaces in index order. The position of a space in this list is its index.
    pub spaces: Vec<SpaceDefinition>,

    /// Name of the space instructions are fetched from.
    pub default_code_space: String,

    #[serde(default)]
    pub registers: Vec<RegisterDefinition>,

    #[serde(default)]
    pub context: Vec<ContextField>,

    #[serde(default)]
    pub tables: Vec<DecodeTable>,

    /// Name of the table instruction decoding starts from.
    #[serde(default = "default_root_table")]
    pub root_table: String,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpaceKind {
    /// Space whose offsets are the constant values themselves
    Constant,
    /// Memory modelled by the processor, such as `ram`
    Processor,
    /// Processor registers
    Register,
    /// Temporaries local to a single instruction
    Unique,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpaceDefinition {
    pub name: String,
    pub kind: SpaceKind,
    pub word_size: usize,
    pub address_size: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterDefinition {
    pub name: String,
    pub space: String,
    pub offset: u64,
    pub size: usize,
}

/// A context variable. Context variables select between constructors for instruction sets with
/// processor modes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextField {
    pub name: String,

    /// Width of the variable in bits.
    pub width: u32,

    #[serde(default)]
    pub default: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodeTable {
    pub name: String,
    pub constructors: Vec<Constructor>,
}

/// A single pattern of a decode table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constructor {
    /// Mnemonic printed for the instruction. Subtable constructors usually leave this empty.
    #[serde(default)]
    pub mnemonic: String,

    /// Number of bytes covered by this constructor's own tokens.
    pub length: usize,

    #[serde(default)]
    pub constraints: Vec<Constraint>,

    #[serde(default)]
    pub operands: Vec<Operand>,

    /// Printed operands. Each entry is rendered into one operand string.
    #[serde(default)]
    pub display: Vec<Vec<DisplayPiece>>,

    #[serde(default)]
    pub semantics: Vec<OpTemplate>,

    /// Location this constructor stands for when its table is referenced as an operand.
    #[serde(default)]
    pub export: Option<VarnodeTemplate>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Constraint {
    /// `byte[offset] & mask == value`, relative to the start of the constructor
    Bytes { offset: usize, mask: u8, value: u8 },
    /// The named context variable must hold `value`
    Context { name: String, value: u32 },
}

impl Constraint {
    /// Key used to order constraints for evaluation. Context constraints never touch the image
    /// so they are evaluated first, followed by byte constraints in increasing offset order.
    pub fn evaluation_key(&self) -> (u8, usize) {
        match self {
            Constraint::Context { .. } => (0, 0),
            Constraint::Bytes { offset, .. } => (1, *offset),
        }
    }
}

/// A bit field within the instruction bytes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    /// Byte offset relative to the start of the constructor
    pub offset: usize,

    /// Number of bytes assembled into the token holding this field
    pub size: usize,

    /// Position of the least significant bit of the field within the token
    #[serde(default)]
    pub shift: u32,

    pub bits: u32,

    #[serde(default)]
    pub signed: bool,
}

impl Field {
    /// A field covering an entire byte.
    pub fn byte(offset: usize) -> Self {
        Self {
            offset,
            size: 1,
            shift: 0,
            bits: 8,
            signed: false,
        }
    }

    /// A field covering an entire token of `size` bytes.
    pub fn token(offset: usize, size: usize) -> Self {
        Self {
            offset,
            size,
            shift: 0,
            bits: u32::try_from(size * 8).unwrap_or(u32::MAX),
            signed: false,
        }
    }

    /// Restrict the field to `bits` bits starting at bit `shift` of the token.
    pub fn bits(mut self, shift: u32, bits: u32) -> Self {
        self.shift = shift;
        self.bits = bits;
        self
    }

    pub fn signed(mut self) -> Self {
        self.signed = true;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operand {
    pub name: String,
    pub kind: OperandKind,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelativeBase {
    /// Address of the instruction being decoded
    Start,
    /// Address immediately following the instruction being decoded
    Next,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperandKind {
    Immediate {
        field: Field,
    },
    Register {
        field: Field,
        registers: Vec<Option<String>>,
    },
    Relative {
        field: Field,
        base: RelativeBase,
    },
    Subtable {
        table: String,
        #[serde(default)]
        offset: usize,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayPiece {
    Text(String),
    Operand(usize),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VarnodeTemplate {
    /// The location an operand of the constructor resolves to
    Operand(usize),
    Register(String),
    Constant {
        value: u64,
        size: usize,
    },
    Temporary {
        offset: u64,
        size: usize,
    },
    /// A constant identifying the named address space, as used by `LOAD` and `STORE`
    Space(String),
    /// The address of the instruction being decoded
    InstStart,
    /// The address immediately following the instruction being decoded
    InstNext,
}

/// A p-code operation with unresolved varnodes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpTemplate {
    /// Name of the p-code operation, for example `INT_ADD`
    pub opcode: String,

    #[serde(default)]
    pub output: Option<VarnodeTemplate>,

    #[serde(default)]
    pub inputs: Vec<VarnodeTemplate>,
}

impl OpTemplate {
    pub fn new(opcode: impl Into<String>) -> Self {
        Self {
            opcode: opcode.into(),
            output: None,
            inputs: Vec::new(),
        }
    }

    pub fn output(mut self, output: VarnodeTemplate) -> Self {
        self.output = Some(output);
        self
    }

    pub fn input(mut self, input: VarnodeTemplate) -> Self {
        self.inputs.push(input);
        self
    }
}

impl Constructor {
    pub fn new(mnemonic: impl Into<String>, length: usize) -> Self {
        Self {
            mnemonic: mnemonic.into(),
            length,
            constraints: Vec::new(),
            operands: Vec::new(),
            display: Vec::new(),
            semantics: Vec::new(),
            export: None,
        }
    }

    /// Require the byte at `offset` to equal `value`.
    pub fn byte(self, offset: usize, value: u8) -> Self {
        self.masked_byte(offset, 0xff, value)
    }

    /// Require the masked byte at `offset` to equal `value`.
    pub fn masked_byte(mut self, offset: usize, mask: u8, value: u8) -> Self {
        self.constraints.push(Constraint::Bytes {
            offset,
            mask,
            value,
        });
        self
    }

    /// Require the named context variable to hold `value`.
    pub fn context(mut self, name: impl Into<String>, value: u32) -> Self {
        self.constraints.push(Constraint::Context {
            name: name.into(),
            value,
        });
        self
    }

    /// Add an operand. The operand is also appended to the display as its own printed operand;
    /// use [Constructor::display] to replace the default display.
    pub fn operand(mut self, name: impl Into<String>, kind: OperandKind) -> Self {
        let index = self.operands.len();
        self.operands.push(Operand {
            name: name.into(),
            kind,
        });
        self.display.push(vec![DisplayPiece::Operand(index)]);
        self
    }

    pub fn display(mut self, display: Vec<Vec<DisplayPiece>>) -> Self {
        self.display = display;
        self
    }

    pub fn op(mut self, op: OpTemplate) -> Self {
        self.semantics.push(op);
        self
    }

    pub fn export(mut self, export: VarnodeTemplate) -> Self {
        self.export = Some(export);
        self
    }
}

impl DecodeTable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            constructors: Vec::new(),
        }
    }

    pub fn constructor(mut self, constructor: Constructor) -> Self {
        self.constructors.push(constructor);
        self
    }
}

impl Specification {
    /// Create an empty specification fetching instructions from `default_code_space`.
    pub fn new(default_code_space: impl Into<String>) -> Self {
        Self {
            big_endian: false,
            spaces: Vec::new(),
            default_code_space: default_code_space.into(),
            registers: Vec::new(),
            context: Vec::new(),
            tables: Vec::new(),
            root_table: default_root_table(),
        }
    }

    pub fn big_endian(mut self, big_endian: bool) -> Self {
        self.big_endian = big_endian;
        self
    }

    pub fn space(
        mut self,
        name: impl Into<String>,
        kind: SpaceKind,
        word_size: usize,
        address_size: usize,
    ) -> Self {
        self.spaces.push(SpaceDefinition {
            name: name.into(),
            kind,
            word_size,
            address_size,
        });
        self
    }

    pub fn register(
        mut self,
        name: impl Into<String>,
        space: impl Into<String>,
        offset: u64,
        size: usize,
    ) -> Self {
        self.registers.push(RegisterDefinition {
            name: name.into(),
            space: space.into(),
            offset,
            size,
        });
        self
    }

    pub fn context_field(mut self, name: impl Into<String>, width: u32, default: u32) -> Self {
        self.context.push(ContextField {
            name: name.into(),
            width,
            default,
        });
        self
    }

    pub fn table(mut self, table: DecodeTable) -> Self {
        self.tables.push(table);
        self
    }

    pub fn find_space(&self, name: &str) -> Option<&SpaceDefinition> {
        self.spaces.iter().find(|space| space.name == name)
    }

    pub fn find_table(&self, name: &str) -> Option<&DecodeTable> {
        self.tables.iter().find(|table| table.name == name)
    }

    /// Put the document in canonical form. Constraints are reordered so that evaluating them in
    /// sequence never inspects a byte before a lower-offset byte.
    pub fn normalize(&mut self) {
        for table in &mut self.tables {
            for constructor in &mut table.constructors {
                constructor
                    .constraints
                    .sort_by_key(Constraint::evaluation_key);
            }
        }
    }
}
