//! Sinks receiving the two projections of a decoded instruction.
//!
//! Decoding walks the specification tables once and then replays the result into an
//! [AssemblyEmit] and a [PcodeEmit]. The sinks are trusted accumulators and do no validation.
use crate::sleigh::{Disassembly, PcodeInstruction};
use crate::space::Address;

/// Receives the assembly text of one instruction. The mnemonic is emitted exactly once, before
/// the operands, and operands are emitted in display order.
pub trait AssemblyEmit {
    fn mnemonic(&mut self, address: &Address, mnemonic: &str);
    fn operand(&mut self, operand: String);
}

/// Receives the p-code of one instruction in execution order.
pub trait PcodeEmit {
    fn dump(&mut self, instruction: PcodeInstruction);
}

#[derive(Default, Debug)]
pub struct AssemblyOutput {
    mnemonic: Option<String>,
    operands: Vec<String>,
}

impl AssemblyOutput {
    pub fn into_disassembly(self) -> Disassembly {
        Disassembly {
            mnemonic: self.mnemonic.unwrap_or_default(),
            operands: self.operands,
        }
    }
}

impl AssemblyEmit for AssemblyOutput {
    fn mnemonic(&mut self, _address: &Address, mnemonic: &str) {
        self.mnemonic.get_or_insert_with(|| mnemonic.to_string());
    }

    fn operand(&mut self, operand: String) {
        self.operands.push(operand);
    }
}

#[derive(Default, Debug)]
pub struct PcodeOutput {
    instructions: Vec<PcodeInstruction>,
}

impl PcodeOutput {
    pub fn into_instructions(self) -> Vec<PcodeInstruction> {
        self.instructions
    }
}

impl PcodeEmit for PcodeOutput {
    fn dump(&mut self, instruction: PcodeInstruction) {
        self.instructions.push(instruction);
    }
}

/// Discards everything emitted to it.
#[derive(Default, Debug, Copy, Clone)]
pub struct NullEmit;

impl AssemblyEmit for NullEmit {
    fn mnemonic(&mut self, _address: &Address, _mnemonic: &str) {}
    fn operand(&mut self, _operand: String) {}
}

impl PcodeEmit for NullEmit {
    fn dump(&mut self, _instruction: PcodeInstruction) {}
}
