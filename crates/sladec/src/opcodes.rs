//! The opcode for a p-code instruction determines the semantics of the instruction. The [OpCode]
//! enum contains the full list of possible opcodes. However, the [AnalysisOp] opcodes are only
//! ever emitted by analysis programs; they are not permitted in Sleigh processor specifications.
//! The [PseudoOp] opcodes may be emitted but do not have fully defined semantics.
//!
//! Specifications refer to opcodes by their p-code names, such as `INT_ADD`. The mapping between
//! names and [OpCode] values is held in a process-wide [OpcodeTable] built once by [initialize].
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// A representation of opcodes for p-code instructions.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum OpCode {
    /// Copy a sequence of bytes from one fixed location to another.
    Copy,

    /// Load a sequence of bytes from a dynamic location to a fixed location.
    Load,

    /// Store a sequence of bytes from a fixed location to a dynamic location.
    Store,

    /// Jump to a fixed destination. The destination may be an absolute address or a relative
    /// p-code address for the current instruction.
    Branch,

    /// Jump to a fixed destination based on a condition. See [OpCode::Branch] for details on
    /// an explanation on possible destinations.
    BranchConditional,

    /// Jump to a dynamic destination.
    BranchIndirect,

    /// Semantically identical to [OpCode::Branch] but is used as a hint to analysis programs.
    Call,

    /// Semantically identical to [OpCode::BranchIndirect] but is used as a hint to analysis programs.
    CallIndirect,

    /// Semantically identical to [OpCode::BranchIndirect] but is used as a hint to analysis programs.
    Return,

    /// Concatenates two inputs together: `x:y`.
    Piece,

    /// Truncates an input: `x:y => x`.
    Subpiece,

    /// Counts the number of bits set in an input.
    Popcount,

    /// Count the number of leading 0-bits
    LzCount,

    /// Operations which operate on boolean (single bit) inputs.
    Bool(BoolOp),

    /// Operations which operate on integers.
    Int(IntOp),

    /// Operations which operate on floating-point numbers.
    Float(FloatOp),

    /// A pseudo operation.
    Pseudo(PseudoOp),

    /// An operation produced by analysis.
    Analysis(AnalysisOp),
}

/// Operations for boolean, single-bit inputs.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum BoolOp {
    /// Negate a single bit: `!x`.
    Negate,

    /// The and operation of two bits: `x & y`.
    And,

    /// The inclusive-or of two bits: `x | y`.
    Or,

    /// The exclusive-or of two bits: `x ^ y`.
    Xor,
}

/// Indicates whether an integer operation is operating on signed or unsigned inputs. If the
/// operation does not include `IntSign` as an argument, then distinguishing between signed and
/// unsigned is not applicable for the operation.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum IntSign {
    /// An integer where the most significant bit (msb) indicates the sign of the integer. The integer is
    /// positive if the msb is `0` and negative if the msb is `1`. Signed integers are represented
    /// using the two's complement encoding.
    Signed,

    /// An integer that does not have a sign bit and therefore cannot be negative.
    Unsigned,
}

/// Operations on integers.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum IntOp {
    /// Add two integers: `x + y`.
    Add,

    /// Negate an integer by converting it to its two's complement: `-x`.
    Negate,

    /// Subtract two integers: `x - y`.
    Subtract,

    /// Multiply two integers: `x * y`.
    Multiply,

    /// Divide two integers: `x / y`.
    Divide(IntSign),

    /// The remainder from integer division: `x % y`.
    Remainder(IntSign),

    /// Check if two integers are equal: `x == y`.
    Equal,

    /// Check if two integers are not equal: `x != y`.
    NotEqual,

    /// Check if an integer is less than another: `x < y`.
    LessThan(IntSign),

    /// Check if an integer is less than or equal to another: `x <= y`.
    LessThanOrEqual(IntSign),

    /// Extend an integer with additional bits. Extends with zero bits if unsigned and with the
    /// sign bit if the integer is signed.
    Extension(IntSign),

    /// The carry flag for an addition indicating an overflow would occur.
    Carry(IntSign),

    /// The borrow flag for a subtraction indicating an overflow would occur. The inputs for this
    /// operation are always signed. The equivalent unsigned check is
    /// `LessThan(IntSign::Unsigned)`.
    Borrow,

    /// Shift the integer left by some number of bits: x << y.
    ShiftLeft,

    /// Shift the integer right by some number of bits: x >> y. A signed shift right will shift in
    /// the sign bit of `x` instead of zero.
    ShiftRight(IntSign),

    /// Bitwise boolean operations applied to each bit of the integer.
    Bitwise(BoolOp),
}

/// Operations on floating-point numbers.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum FloatOp {
    /// Check if two numbers are equal: `x == y`.
    Equal,

    /// Check if two numbers are not equal: `x != `y.
    NotEqual,

    /// Check if a number is less than another: `x < y`
    LessThan,

    /// Check if a number is less than or equal to another: `x <= y`
    LessThanOrEqual,

    /// Check if a number is interpreted as NaN.
    IsNaN,

    /// Add two numbers: `x + y`.
    Add,

    /// Subtract two numbers: `x - y`.
    Subtract,

    /// Multiply two numbers: `x + y`.
    Multiply,

    /// Divide two numbers: `x / y`.
    Divide,

    /// Negate a number: `-x`.
    Negate,

    /// Take the absolute value of a number: `|x|`.
    AbsoluteValue,

    /// Take the square root of a number: `x`<sup>0.5</sup>.
    SquareRoot,

    /// Convert an integer to a floating point number.
    IntToFloat,

    /// Convert a floating point number to another with different precision.
    FloatToFloat,

    /// Convert a floating point number to an integer.
    Truncate,

    /// Round a number towards positive infinity.
    Ceiling,

    /// Round a number towards negative infinity.
    Floor,

    /// Round a number to the closest integral value.
    Round,
}

/// Operations which represent black-box placeholders for some sequence of changes to the machine state.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum PseudoOp {
    /// A call that cannot be semantically represented in p-code. For example, a syscall.
    CallOther,

    /// Returns specific run-time dependent values from the constant pool. Used by object-oriented
    /// instruction sets and other managed code environments.
    ConstantPoolRef,

    /// Allocates memory for an object or set of objects.
    New,
}

/// Operations which are only generated by analysis programs. These operations are not permitted
/// for use in processor specifications and therefore will never be emitted when directly
/// translating machine instructions.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum AnalysisOp {
    /// Copies a sequence of bytes to a fixed location. There are multiple origins possible for the
    /// bytes. The selected origin depends on the execution path leading to this operation.
    MultiEqual,

    /// Copies a sequence of bytes to a fixed location. However, the value may be altered
    /// indirectly by another operation referenced by this one.
    CopyIndirect,

    /// Add an offset to a pointer: `(p + i)`
    PointerAdd,

    /// Access a subcomponent of a pointer: `p->x`.
    PointerSubcomponent,

    /// Identical to a [OpCode::Copy]. This operation is a signal that the output data-type
    /// interpretation has changed.
    Cast,

    /// Insert bits from one input into the section of another: `x[8..16] = y`
    Insert,

    /// Extract bits from the section of an input and copy them to another: `y = x[8..16]`.
    Extract,

    /// A placeholder for address mappings involving segments.
    SegmentOp,
}

/// P-code operation names in the order of their Ghidra opcode numbers, starting at `COPY = 1`.
pub(crate) const OPCODE_NAMES: &[(&str, OpCode)] = &[
    ("COPY", OpCode::Copy),
    ("LOAD", OpCode::Load),
    ("STORE", OpCode::Store),
    ("BRANCH", OpCode::Branch),
    ("CBRANCH", OpCode::BranchConditional),
    ("BRANCHIND", OpCode::BranchIndirect),
    ("CALL", OpCode::Call),
    ("CALLIND", OpCode::CallIndirect),
    ("CALLOTHER", OpCode::Pseudo(PseudoOp::CallOther)),
    ("RETURN", OpCode::Return),
    ("INT_EQUAL", OpCode::Int(IntOp::Equal)),
    ("INT_NOTEQUAL", OpCode::Int(IntOp::NotEqual)),
    ("INT_SLESS", OpCode::Int(IntOp::LessThan(IntSign::Signed))),
    (
        "INT_SLESSEQUAL",
        OpCode::Int(IntOp::LessThanOrEqual(IntSign::Signed)),
    ),
    ("INT_LESS", OpCode::Int(IntOp::LessThan(IntSign::Unsigned))),
    (
        "INT_LESSEQUAL",
        OpCode::Int(IntOp::LessThanOrEqual(IntSign::Unsigned)),
    ),
    ("INT_ZEXT", OpCode::Int(IntOp::Extension(IntSign::Unsigned))),
    ("INT_SEXT", OpCode::Int(IntOp::Extension(IntSign::Signed))),
    ("INT_ADD", OpCode::Int(IntOp::Add)),
    ("INT_SUB", OpCode::Int(IntOp::Subtract)),
    ("INT_CARRY", OpCode::Int(IntOp::Carry(IntSign::Unsigned))),
    ("INT_SCARRY", OpCode::Int(IntOp::Carry(IntSign::Signed))),
    ("INT_SBORROW", OpCode::Int(IntOp::Borrow)),
    ("INT_2COMP", OpCode::Int(IntOp::Negate)),
    ("INT_NEGATE", OpCode::Int(IntOp::Bitwise(BoolOp::Negate))),
    ("INT_XOR", OpCode::Int(IntOp::Bitwise(BoolOp::Xor))),
    ("INT_AND", OpCode::Int(IntOp::Bitwise(BoolOp::And))),
    ("INT_OR", OpCode::Int(IntOp::Bitwise(BoolOp::Or))),
    ("INT_LEFT", OpCode::Int(IntOp::ShiftLeft)),
    ("INT_RIGHT", OpCode::Int(IntOp::ShiftRight(IntSign::Unsigned))),
    ("INT_SRIGHT", OpCode::Int(IntOp::ShiftRight(IntSign::Signed))),
    ("INT_MULT", OpCode::Int(IntOp::Multiply)),
    ("INT_DIV", OpCode::Int(IntOp::Divide(IntSign::Unsigned))),
    ("INT_SDIV", OpCode::Int(IntOp::Divide(IntSign::Signed))),
    ("INT_REM", OpCode::Int(IntOp::Remainder(IntSign::Unsigned))),
    ("INT_SREM", OpCode::Int(IntOp::Remainder(IntSign::Signed))),
    ("BOOL_NEGATE", OpCode::Bool(BoolOp::Negate)),
    ("BOOL_XOR", OpCode::Bool(BoolOp::Xor)),
    ("BOOL_AND", OpCode::Bool(BoolOp::And)),
    ("BOOL_OR", OpCode::Bool(BoolOp::Or)),
    ("FLOAT_EQUAL", OpCode::Float(FloatOp::Equal)),
    ("FLOAT_NOTEQUAL", OpCode::Float(FloatOp::NotEqual)),
    ("FLOAT_LESS", OpCode::Float(FloatOp::LessThan)),
    ("FLOAT_LESSEQUAL", OpCode::Float(FloatOp::LessThanOrEqual)),
    ("FLOAT_NAN", OpCode::Float(FloatOp::IsNaN)),
    ("FLOAT_ADD", OpCode::Float(FloatOp::Add)),
    ("FLOAT_DIV", OpCode::Float(FloatOp::Divide)),
    ("FLOAT_MULT", OpCode::Float(FloatOp::Multiply)),
    ("FLOAT_SUB", OpCode::Float(FloatOp::Subtract)),
    ("FLOAT_NEG", OpCode::Float(FloatOp::Negate)),
    ("FLOAT_ABS", OpCode::Float(FloatOp::AbsoluteValue)),
    ("FLOAT_SQRT", OpCode::Float(FloatOp::SquareRoot)),
    ("FLOAT_INT2FLOAT", OpCode::Float(FloatOp::IntToFloat)),
    ("FLOAT_FLOAT2FLOAT", OpCode::Float(FloatOp::FloatToFloat)),
    ("FLOAT_TRUNC", OpCode::Float(FloatOp::Truncate)),
    ("FLOAT_CEIL", OpCode::Float(FloatOp::Ceiling)),
    ("FLOAT_FLOOR", OpCode::Float(FloatOp::Floor)),
    ("FLOAT_ROUND", OpCode::Float(FloatOp::Round)),
    ("MULTIEQUAL", OpCode::Analysis(AnalysisOp::MultiEqual)),
    ("INDIRECT", OpCode::Analysis(AnalysisOp::CopyIndirect)),
    ("PIECE", OpCode::Piece),
    ("SUBPIECE", OpCode::Subpiece),
    ("CAST", OpCode::Analysis(AnalysisOp::Cast)),
    ("PTRADD", OpCode::Analysis(AnalysisOp::PointerAdd)),
    ("PTRSUB", OpCode::Analysis(AnalysisOp::PointerSubcomponent)),
    ("SEGMENTOP", OpCode::Analysis(AnalysisOp::SegmentOp)),
    ("CPOOLREF", OpCode::Pseudo(PseudoOp::ConstantPoolRef)),
    ("NEW", OpCode::Pseudo(PseudoOp::New)),
    ("INSERT", OpCode::Analysis(AnalysisOp::Insert)),
    ("EXTRACT", OpCode::Analysis(AnalysisOp::Extract)),
    ("POPCOUNT", OpCode::Popcount),
    ("LZCOUNT", OpCode::LzCount),
];

/// Tracks whether the process-wide opcode table has been built
static OPCODE_TABLE: OnceLock<OpcodeTable> = OnceLock::new();

/// Bidirectional mapping between p-code operation names and [OpCode] values.
#[derive(Debug)]
pub struct OpcodeTable {
    by_name: BTreeMap<&'static str, OpCode>,
    by_opcode: BTreeMap<OpCode, &'static str>,
}

impl OpcodeTable {
    fn build() -> Self {
        tracing::debug!(count = OPCODE_NAMES.len(), "building p-code opcode table");
        Self {
            by_name: OPCODE_NAMES.iter().copied().collect(),
            by_opcode: OPCODE_NAMES
                .iter()
                .map(|&(name, opcode)| (opcode, name))
                .collect(),
        }
    }

    /// Look up the opcode for a p-code operation name.
    pub fn opcode(&self, name: &str) -> Option<OpCode> {
        self.by_name.get(name).copied()
    }

    /// Look up the p-code operation name of an opcode.
    pub fn name(&self, opcode: OpCode) -> &'static str {
        // Every variant is present in OPCODE_NAMES
        self.by_opcode.get(&opcode).copied().unwrap_or("UNKNOWN")
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

/// Perform the one-time, process-wide initialization of the opcode identifier table. Calling
/// this more than once is harmless; every call returns the same table.
pub fn initialize() -> &'static OpcodeTable {
    OPCODE_TABLE.get_or_init(OpcodeTable::build)
}

impl OpCode {
    /// The p-code operation name of this opcode, for example `INT_ADD`.
    pub fn name(self) -> &'static str {
        initialize().name(self)
    }

    /// Returns `true` if this opcode is only ever produced by analysis and therefore may not
    /// appear in processor specifications.
    pub fn is_analysis(self) -> bool {
        matches!(self, OpCode::Analysis(_))
    }
}

impl std::fmt::Display for OpCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for OpCode {
    type Err = crate::Error;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        initialize()
            .opcode(name)
            .ok_or_else(|| crate::Error::UnknownOpcode(name.to_string()))
    }
}
