use std::collections::BTreeMap;

use tracing::{debug, instrument};

use crate::context::ContextDatabase;
use crate::decode::Decoder;
use crate::emit::{AssemblyEmit, AssemblyOutput, NullEmit, PcodeEmit, PcodeOutput};
use crate::image::{EmptyImage, ImageError, LoadImage};
use crate::language::Language;
use crate::opcodes::{self, OpCode};
use crate::register::RegisterEntry;
use crate::space::{Address, AddressSpace, VarnodeData};

/// Default limit on how deeply decode tables may reference subtables.
pub const DEFAULT_MAX_TABLE_DEPTH: usize = 32;

/// Errors returned by this crate.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("failed to load specification: {0}")]
    SpecLoad(#[from] sla_format::Error),

    #[error("unknown p-code operation {0}")]
    UnknownOpcode(String),

    #[error("unknown register {0}")]
    UnknownRegister(String),

    #[error("unknown context variable {0}")]
    UnknownContextVariable(String),

    #[error("no register at {0}")]
    NoRegisterAtLocation(VarnodeData),

    #[error("index {index} out of range for {count} address spaces")]
    OutOfRange { index: usize, count: usize },

    #[error("failed to read instruction bytes at {location}: {source}")]
    ImageRead {
        location: VarnodeData,
        #[source]
        source: ImageError,
    },

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("internal error: {0}")]
    InternalError(String),
}

/// The instruction bytes are available but do not form a valid instruction.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("no constructor of table {table} matches at {address}")]
    NoMatch { address: Address, table: String },

    #[error("operand {operand} has invalid encoding {value:#x} at {address}")]
    InvalidOperand {
        address: Address,
        operand: String,
        value: u64,
    },

    #[error("decode tables nested deeper than {depth} at {address}")]
    DepthExceeded { address: Address, depth: usize },

    #[error("constructor of table {table} used as a value exports nothing at {address}")]
    MissingExport { address: Address, table: String },

    #[error("instruction at {address} extends past the end of its address space")]
    AddressOverflow { address: Address },

    #[error("instruction at {address} has no length")]
    EmptyInstruction { address: Address },
}

/// Result returned by Sleigh APIs
pub type Result<T> = std::result::Result<T, Error>;

/// Textual rendering of one instruction.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Disassembly {
    pub mnemonic: String,

    /// Operands in display order
    pub operands: Vec<String>,
}

impl std::fmt::Display for Disassembly {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.mnemonic)?;
        if !self.operands.is_empty() {
            write!(f, " {}", self.operands.join(", "))?;
        }

        Ok(())
    }
}

/// A pcode instruction
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PcodeInstruction {
    /// The address of the machine instruction this operation belongs to
    pub address: Address,

    /// The operation this pcode performs. The operation defines the semantics for the inputs and
    /// optional output of this instruction.
    pub op_code: OpCode,

    /// The inputs this pcode operation requires. The semantics for the inputs is determined by
    /// the [OpCode]. For example, the [OpCode::Load] operation requires the first input has an
    /// address in the [crate::AddressSpaceType::Constant] address space, and is interpreted as an
    /// address space identifier for the ultimate address to load.
    pub inputs: Vec<VarnodeData>,

    /// The output for the pcode operation. The semantics of the output and whether it is expected
    /// is determined by the [OpCode].
    pub output: Option<VarnodeData>,
}

impl std::fmt::Display for PcodeInstruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {} ", self.address, self.op_code)?;
        if let Some(output) = &self.output {
            write!(f, "{output} <- ")?;
        }

        for input in self.inputs.iter() {
            write!(f, "{input} ")?;
        }

        Ok(())
    }
}

/// A fully decoded machine instruction. Decoded instructions are plain values and remain valid
/// after the context that produced them is rebound or dropped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedInstruction {
    pub address: Address,

    /// Number of bytes the instruction occupies. Always at least one.
    pub length: usize,

    pub disassembly: Disassembly,

    /// Semantics of the instruction in execution order
    pub operations: Vec<PcodeInstruction>,
}

impl DecodedInstruction {
    /// Offset of the instruction that follows this one.
    pub fn next_offset(&self) -> u64 {
        self.address.offset.wrapping_add(self.length as u64)
    }

    /// The bytes the instruction occupies.
    pub fn origin(&self) -> VarnodeData {
        VarnodeData::new(self.address, self.length)
    }
}

impl std::fmt::Display for DecodedInstruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "[{}] {}", self.origin(), self.disassembly)?;
        for operation in &self.operations {
            writeln!(f, "  {operation}")?;
        }

        Ok(())
    }
}

#[derive(Default, Copy, Clone, Debug)]
pub enum SlaDecoder {
    /// Standard .sla decoder. Expects header with appropriate version and zlib compressed data.
    #[default]
    Sla,

    /// Raw decoder without a header and uncompressed data.
    Raw,
}

/// Read-only queries shared by decoders. See [SleighContext] for the native implementation.
pub trait Sleigh {
    /// Get the default address space for code execution
    #[must_use]
    fn default_code_space(&self) -> AddressSpace;

    /// List all available address spaces
    #[must_use]
    fn address_spaces(&self) -> Vec<AddressSpace>;

    /// Get an address space by name (if it exists)
    #[must_use]
    fn address_space_by_name(&self, name: impl AsRef<str>) -> Option<AddressSpace> {
        let name = name.as_ref();
        self.address_spaces()
            .into_iter()
            .find(|addr_space| addr_space.name == name)
    }

    /// Get the [VarnodeData] that represents the named register.
    fn register_from_name(&self, name: impl AsRef<str>) -> Result<VarnodeData>;

    /// Get the register name for a varnode targeting a register. This will return `None` if the
    /// target is not exactly a register.
    fn register_name(&self, target: &VarnodeData) -> Option<String>;

    /// Get a sorted map of registers to register names.
    fn register_name_map(&self) -> BTreeMap<VarnodeData, String>;

    /// Decode the instruction at the given offset of the default code space into pcode.
    fn disassemble_pcode(&self, offset: u64) -> Result<Vec<PcodeInstruction>>;

    /// Decode the instruction at the given offset of the default code space into native assembly.
    fn disassemble_native(&self, offset: u64) -> Result<Disassembly>;
}

/// Builder for [SleighContext].
#[derive(Clone, Debug)]
pub struct SleighContextBuilder {
    sla_decoder: SlaDecoder,
    max_table_depth: usize,
    language_id: Option<String>,

    /// Context variable defaults applied after the specification is loaded
    context_defaults: Vec<(String, u32)>,
}

impl Default for SleighContextBuilder {
    fn default() -> Self {
        Self {
            sla_decoder: Default::default(),
            max_table_depth: DEFAULT_MAX_TABLE_DEPTH,
            language_id: None,
            context_defaults: Vec::new(),
        }
    }
}

impl SleighContextBuilder {
    pub fn sla_decoder(mut self, decoder: SlaDecoder) -> Self {
        self.sla_decoder = decoder;
        self
    }

    /// Limit how deeply decode tables may nest. Exceeding the limit while decoding is a
    /// [DecodeError::DepthExceeded].
    pub fn max_table_depth(mut self, depth: usize) -> Self {
        self.max_table_depth = depth;
        self
    }

    /// Identify the language the specification describes, e.g. `x86:LE:64:default`.
    pub fn language_id(mut self, id: impl Into<String>) -> Self {
        self.language_id = Some(id.into());
        self
    }

    /// Set the default value of a context variable once the specification is loaded.
    pub fn context_default(mut self, name: impl Into<String>, value: u32) -> Self {
        self.context_defaults.push((name.into(), value));
        self
    }

    #[instrument(skip_all, fields(decoder = ?self.sla_decoder))]
    pub fn build(self, sla: impl AsRef<[u8]>) -> Result<SleighContext> {
        opcodes::initialize();

        let sla = sla.as_ref();
        let spec = match self.sla_decoder {
            SlaDecoder::Sla => sla_format::decode(sla)?,
            SlaDecoder::Raw => sla_format::decode_raw(sla)?,
        };

        let language = Language::new(spec)?;
        let mut context = ContextDatabase::new(&language.spec);
        for (name, value) in &self.context_defaults {
            context.set_default(name, *value)?;
        }

        debug!(
            spaces = language.spaces.len(),
            registers = language.registers.len(),
            tables = language.spec.tables.len(),
            "loaded specification"
        );

        Ok(SleighContext {
            sla: sla.to_vec(),
            language_id: self.language_id,
            language,
            context,
            image: Box::new(EmptyImage),
            max_table_depth: self.max_table_depth,
        })
    }
}

/// Decoder for a single processor specification.
///
/// The specification, address spaces and registers are fixed once the context is built. The
/// memory image instructions are read from can be replaced at any time with
/// [SleighContext::bind_image]; until then every decode fails with [Error::ImageRead].
pub struct SleighContext {
    /// The specification blob exactly as provided
    sla: Vec<u8>,

    language_id: Option<String>,
    language: Language,
    context: ContextDatabase,
    image: Box<dyn LoadImage + Send + Sync>,
    max_table_depth: usize,
}

impl std::fmt::Debug for SleighContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SleighContext")
            .field("language_id", &self.language_id)
            .field("spaces", &self.language.spaces.len())
            .field("registers", &self.language.registers.len())
            .field("context", &self.context)
            .field("max_table_depth", &self.max_table_depth)
            .finish_non_exhaustive()
    }
}

impl SleighContext {
    /// Create a new sleigh builder. Use this to construct a context with non-default options.
    pub fn builder() -> SleighContextBuilder {
        Default::default()
    }

    /// Load a compressed specification with default options.
    pub fn new(sla: impl AsRef<[u8]>) -> Result<Self> {
        Self::builder().build(sla)
    }

    /// The specification blob this context was built from.
    pub fn sla(&self) -> &[u8] {
        &self.sla
    }

    /// The language identifier given to [SleighContextBuilder::language_id], if any.
    pub fn language_id(&self) -> Option<&str> {
        self.language_id.as_deref()
    }

    /// The image instructions are currently read from.
    pub fn image(&self) -> &(dyn LoadImage + Send + Sync) {
        &*self.image
    }

    /// Set the default value of a context variable. The value is truncated to the width of the
    /// variable. Returns the value stored.
    pub fn set_context_default(&mut self, name: &str, value: u32) -> Result<u32> {
        self.context.set_default(name, value)
    }

    /// The current default value of a context variable.
    pub fn context_default(&self, name: &str) -> Result<u32> {
        self.context.value(name)
    }

    /// Replace the image instructions are read from. Instructions decoded previously are not
    /// affected.
    pub fn bind_image(&mut self, image: impl LoadImage + Send + Sync + 'static) {
        self.image = Box::new(image);
    }

    pub fn space_count(&self) -> usize {
        self.language.spaces.len()
    }

    /// Get the address space at `index`. Index 0 is not necessarily the code space.
    pub fn space(&self, index: usize) -> Result<&AddressSpace> {
        self.language.spaces.get(index)
    }

    /// Get the location of the named register.
    pub fn lookup_register(&self, name: &str) -> Result<VarnodeData> {
        self.language.registers.lookup(name)
    }

    /// Get the name of the register at exactly `location`. A location covering only part of a
    /// register has no name.
    pub fn register_at(&self, location: &VarnodeData) -> Result<&str> {
        self.language.registers.name(location)
    }

    /// Every register ordered by location.
    pub fn all_registers(&self) -> Vec<RegisterEntry> {
        self.language.registers.entries()
    }

    /// Decode the instruction at `offset` in the default code space.
    #[instrument(level = "debug", skip(self))]
    pub fn decode_one(&self, offset: u64) -> Result<DecodedInstruction> {
        let mut assembly = AssemblyOutput::default();
        let mut pcode = PcodeOutput::default();
        let length = self.emit(offset, &mut assembly, &mut pcode)?;

        let instruction = DecodedInstruction {
            address: Address::new(self.language.spaces.default_code_space().id, offset),
            length,
            disassembly: assembly.into_disassembly(),
            operations: pcode.into_instructions(),
        };

        debug!(disassembly = %instruction.disassembly, length, "decoded instruction");
        Ok(instruction)
    }

    /// Decode the instruction at `offset` and replay it into the given sinks. Returns the length
    /// of the instruction. Nothing is emitted if decoding fails.
    pub fn emit(
        &self,
        offset: u64,
        assembly: &mut dyn AssemblyEmit,
        pcode: &mut dyn PcodeEmit,
    ) -> Result<usize> {
        let decoder = Decoder::new(&self.language, &self.context, self.max_table_depth);
        let parsed = decoder.parse(&*self.image, offset)?;
        let operations = parsed.build(&self.language)?;

        parsed.render(&self.language, assembly);
        for operation in operations {
            pcode.dump(operation);
        }

        Ok(parsed.length)
    }
}

impl Sleigh for SleighContext {
    fn default_code_space(&self) -> AddressSpace {
        self.language.spaces.default_code_space().clone()
    }

    fn address_spaces(&self) -> Vec<AddressSpace> {
        self.language.spaces.iter().cloned().collect()
    }

    fn address_space_by_name(&self, name: impl AsRef<str>) -> Option<AddressSpace> {
        self.language.spaces.by_name(name.as_ref()).cloned()
    }

    fn register_from_name(&self, name: impl AsRef<str>) -> Result<VarnodeData> {
        self.lookup_register(name.as_ref())
    }

    fn register_name(&self, target: &VarnodeData) -> Option<String> {
        self.register_at(target).ok().map(str::to_string)
    }

    fn register_name_map(&self) -> BTreeMap<VarnodeData, String> {
        self.language.registers.name_map().clone()
    }

    fn disassemble_pcode(&self, offset: u64) -> Result<Vec<PcodeInstruction>> {
        let mut output = PcodeOutput::default();
        self.emit(offset, &mut NullEmit, &mut output)?;
        Ok(output.into_instructions())
    }

    fn disassemble_native(&self, offset: u64) -> Result<Disassembly> {
        let mut output = AssemblyOutput::default();
        self.emit(offset, &mut output, &mut NullEmit)?;
        Ok(output.into_disassembly())
    }
}
