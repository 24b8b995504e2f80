#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use sla_format::*;
use sladec::{ImageError, LoadImage, SleighContext, VarnodeData};

/// Encodings of the `tiny8` instruction set. All instructions are little-endian.
///
/// | Encoding           | Instruction              |
/// |--------------------|--------------------------|
/// | `00`               | `NOP`                    |
/// | `01 rr ii`         | `MOV Rr, 0xii`           |
/// | `02 dd`            | `JMP` next + signed `dd` |
/// | `03 0r`            | `LD Rr, [R0]`            |
/// | `03 1r aa`         | `LD Rr, [0xaa]`          |
/// | `04`               | `INC R0` or `DEC R0`     |
/// | `05 ds`            | `ADD Rd, Rs`             |
/// | `06 ii`            | `ADDI R0, signed ii`     |
pub mod encoding {
    pub const NOP: u8 = 0x00;
    pub const MOV: u8 = 0x01;
    pub const JMP: u8 = 0x02;
    pub const LD: u8 = 0x03;
    pub const STEP: u8 = 0x04;
    pub const ADD: u8 = 0x05;
    pub const ADDI: u8 = 0x06;

    /// Matches no instruction
    pub const INVALID: u8 = 0xff;
}

fn gpr() -> Vec<Option<String>> {
    ["R0", "R1", "R2", "R3"]
        .into_iter()
        .map(|name| Some(name.to_string()))
        .collect()
}

fn register_operand(field: Field) -> OperandKind {
    OperandKind::Register {
        field,
        registers: gpr(),
    }
}

fn r0() -> VarnodeTemplate {
    VarnodeTemplate::Register("R0".into())
}

pub fn tiny8_spec() -> Specification {
    use encoding::*;

    let one = VarnodeTemplate::Constant { value: 1, size: 4 };
    let instruction = DecodeTable::new(DEFAULT_ROOT_TABLE)
        .constructor(Constructor::new("NOP", 1).byte(0, NOP))
        .constructor(
            Constructor::new("MOV", 3)
                .byte(0, MOV)
                .operand("dst", register_operand(Field::byte(1)))
                .operand(
                    "imm",
                    OperandKind::Immediate {
                        field: Field::byte(2),
                    },
                )
                .op(OpTemplate::new("INT_ZEXT")
                    .output(VarnodeTemplate::Operand(0))
                    .input(VarnodeTemplate::Operand(1))),
        )
        .constructor(
            Constructor::new("JMP", 2)
                .byte(0, JMP)
                .operand(
                    "target",
                    OperandKind::Relative {
                        field: Field::byte(1).signed(),
                        base: RelativeBase::Next,
                    },
                )
                .op(OpTemplate::new("BRANCH").input(VarnodeTemplate::Operand(0))),
        )
        .constructor(
            Constructor::new("LD", 2)
                .byte(0, LD)
                .operand("dst", register_operand(Field::byte(1).bits(0, 4)))
                .operand(
                    "src",
                    OperandKind::Subtable {
                        table: "mem".into(),
                        offset: 1,
                    },
                )
                .op(OpTemplate::new("COPY")
                    .output(VarnodeTemplate::Operand(0))
                    .input(VarnodeTemplate::Operand(1))),
        )
        .constructor(
            Constructor::new("INC", 1)
                .byte(0, STEP)
                .context("mode", 0)
                .display(vec![vec![DisplayPiece::Text("R0".into())]])
                .op(OpTemplate::new("INT_ADD")
                    .output(r0())
                    .input(r0())
                    .input(one.clone())),
        )
        .constructor(
            Constructor::new("DEC", 1)
                .byte(0, STEP)
                .context("mode", 1)
                .display(vec![vec![DisplayPiece::Text("R0".into())]])
                .op(OpTemplate::new("INT_SUB")
                    .output(r0())
                    .input(r0())
                    .input(one)),
        )
        .constructor(
            Constructor::new("ADD", 2)
                .byte(0, ADD)
                .operand("dst", register_operand(Field::byte(1).bits(4, 4)))
                .operand("src", register_operand(Field::byte(1).bits(0, 4)))
                .op(OpTemplate::new("INT_ADD")
                    .output(VarnodeTemplate::Operand(0))
                    .input(VarnodeTemplate::Operand(0))
                    .input(VarnodeTemplate::Operand(1))),
        )
        .constructor(
            Constructor::new("ADDI", 2)
                .byte(0, ADDI)
                .operand(
                    "imm",
                    OperandKind::Immediate {
                        field: Field::byte(1).signed(),
                    },
                )
                .display(vec![
                    vec![DisplayPiece::Text("R0".into())],
                    vec![DisplayPiece::Operand(0)],
                ])
                .op(OpTemplate::new("INT_SEXT")
                    .output(VarnodeTemplate::Temporary { offset: 0x10, size: 4 })
                    .input(VarnodeTemplate::Operand(0)))
                .op(OpTemplate::new("INT_ADD")
                    .output(r0())
                    .input(r0())
                    .input(VarnodeTemplate::Temporary { offset: 0x10, size: 4 })),
        );

    let loaded = VarnodeTemplate::Temporary { offset: 0, size: 4 };
    let mem = DecodeTable::new("mem")
        .constructor(
            Constructor::new("", 1)
                .masked_byte(0, 0xf0, 0x00)
                .display(vec![vec![DisplayPiece::Text("[R0]".into())]])
                .op(OpTemplate::new("LOAD")
                    .output(loaded.clone())
                    .input(VarnodeTemplate::Space("ram".into()))
                    .input(r0()))
                .export(loaded.clone()),
        )
        .constructor(
            Constructor::new("", 2)
                .masked_byte(0, 0xf0, 0x10)
                .operand(
                    "addr",
                    OperandKind::Immediate {
                        field: Field::byte(1),
                    },
                )
                .display(vec![vec![
                    DisplayPiece::Text("[".into()),
                    DisplayPiece::Operand(0),
                    DisplayPiece::Text("]".into()),
                ]])
                .op(OpTemplate::new("LOAD")
                    .output(loaded.clone())
                    .input(VarnodeTemplate::Space("ram".into()))
                    .input(VarnodeTemplate::Operand(0)))
                .export(loaded),
        );

    Specification::new("ram")
        .space("register", SpaceKind::Register, 1, 4)
        .space("const", SpaceKind::Constant, 1, 8)
        .space("ram", SpaceKind::Processor, 1, 4)
        .space("unique", SpaceKind::Unique, 1, 4)
        .register("R0", "register", 0, 4)
        .register("R1", "register", 4, 4)
        .register("R2", "register", 8, 4)
        .register("R3", "register", 12, 4)
        .register("R0L", "register", 0, 1)
        .register("PC", "register", 0x20, 4)
        .context_field("mode", 1, 0)
        .table(instruction)
        .table(mem)
}

pub fn tiny8_sla() -> Vec<u8> {
    encode(&tiny8_spec()).expect("failed to encode tiny8 specification")
}

/// Build a `tiny8` decoder reading from `image`.
pub fn tiny8(image: impl LoadImage + Send + Sync + 'static) -> SleighContext {
    init_tracing();
    let mut sleigh = SleighContext::new(tiny8_sla()).expect("failed to load tiny8 specification");
    sleigh.bind_image(image);
    sleigh
}

/// Route decoder logs to the test output. Set `RUST_LOG=sladec=trace` to see image reads.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A flat image that records every read it serves.
#[derive(Debug, Default)]
pub struct RecordingImage {
    data: Vec<u8>,
    reads: Mutex<Vec<VarnodeData>>,
}

impl RecordingImage {
    pub fn new(data: impl Into<Vec<u8>>) -> Arc<Self> {
        Arc::new(Self {
            data: data.into(),
            reads: Default::default(),
        })
    }

    /// Take the reads recorded so far.
    pub fn take_reads(&self) -> Vec<VarnodeData> {
        std::mem::take(&mut *self.reads.lock().expect("reads lock poisoned"))
    }
}

impl LoadImage for RecordingImage {
    fn instruction_bytes(&self, source: &VarnodeData) -> std::result::Result<Vec<u8>, ImageError> {
        self.reads
            .lock()
            .map_err(|err| ImageError::Unavailable(err.to_string()))?
            .push(*source);
        self.data.instruction_bytes(source)
    }
}
