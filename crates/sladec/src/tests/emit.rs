use crate::*;

fn address() -> Address {
    Address::new(AddressSpaceId::new(1), 0)
}

#[test]
fn mnemonic_written_once() {
    let mut output = AssemblyOutput::default();
    output.mnemonic(&address(), "MOV");
    output.mnemonic(&address(), "ADD");
    output.operand("R0".into());
    output.operand("0x2A".into());

    let disassembly = output.into_disassembly();
    assert_eq!(disassembly.mnemonic, "MOV");
    assert_eq!(disassembly.operands, vec!["R0", "0x2A"]);
    assert_eq!(disassembly.to_string(), "MOV R0, 0x2A");
}

#[test]
fn operations_in_order() {
    let mut output = PcodeOutput::default();
    for op_code in [OpCode::Load, OpCode::Copy, OpCode::Return] {
        output.dump(PcodeInstruction {
            address: address(),
            op_code,
            inputs: Vec::new(),
            output: None,
        });
    }

    let op_codes: Vec<_> = output
        .into_instructions()
        .into_iter()
        .map(|instruction| instruction.op_code)
        .collect();
    assert_eq!(op_codes, vec![OpCode::Load, OpCode::Copy, OpCode::Return]);
}

#[test]
fn empty_disassembly() {
    let disassembly = AssemblyOutput::default().into_disassembly();
    assert_eq!(disassembly, Disassembly::default());
    assert_eq!(disassembly.to_string(), "");
}
