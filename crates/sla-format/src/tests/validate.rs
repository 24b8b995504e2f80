use crate::*;

fn base() -> Specification {
    Specification::new("ram")
        .space("const", SpaceKind::Constant, 1, 8)
        .space("ram", SpaceKind::Processor, 1, 4)
        .space("register", SpaceKind::Register, 1, 4)
        .space("unique", SpaceKind::Unique, 1, 4)
        .register("R0", "register", 0, 4)
        .register("R1", "register", 4, 4)
        .context_field("mode", 1, 0)
}

fn with_root(spec: Specification, constructor: Constructor) -> Specification {
    spec.table(DecodeTable::new(DEFAULT_ROOT_TABLE).constructor(constructor))
}

fn assert_invalid(spec: Specification, expected: &str) {
    match spec.validate() {
        Err(Error::Invalid { message }) => assert!(
            message.contains(expected),
            "expected message containing '{expected}', got '{message}'"
        ),
        result => panic!("expected validation failure, got {result:?}"),
    }
}

fn register_operand() -> OperandKind {
    OperandKind::Register {
        field: Field::byte(1).bits(0, 1),
        registers: vec![Some("R0".into()), Some("R1".into())],
    }
}

#[test]
fn valid_specification() -> Result<()> {
    let spec = with_root(
        base(),
        Constructor::new("MOV", 3)
            .byte(0, 1)
            .context("mode", 0)
            .operand("reg", register_operand())
            .operand(
                "imm",
                OperandKind::Immediate {
                    field: Field::byte(2),
                },
            )
            .op(OpTemplate::new("INT_ZEXT")
                .output(VarnodeTemplate::Operand(0))
                .input(VarnodeTemplate::Operand(1)))
            .op(OpTemplate::new("COPY")
                .output(VarnodeTemplate::Temporary { offset: 0, size: 4 })
                .input(VarnodeTemplate::Register("R1".into()))),
    );
    spec.validate()
}

#[test]
fn duplicate_names() {
    assert_invalid(
        with_root(base().register("R0", "register", 8, 4), Constructor::new("NOP", 1)),
        "duplicate register name 'R0'",
    );
    assert_invalid(
        with_root(
            base().space("ram", SpaceKind::Processor, 1, 4),
            Constructor::new("NOP", 1),
        ),
        "duplicate space name 'ram'",
    );
}

#[test]
fn register_location_collision() {
    assert_invalid(
        with_root(base().register("ALIAS", "register", 0, 4), Constructor::new("NOP", 1)),
        "share the same location",
    );
}

#[test]
fn register_outside_register_space() {
    assert_invalid(
        with_root(base().register("PC", "ram", 0, 4), Constructor::new("NOP", 1)),
        "not in a register space",
    );
}

#[test]
fn code_space_requirements() {
    let mut spec = with_root(base(), Constructor::new("NOP", 1));
    spec.default_code_space = "missing".into();
    assert_invalid(spec, "default code space 'missing' is not defined");

    let mut spec = with_root(base(), Constructor::new("NOP", 1));
    spec.default_code_space = "register".into();
    assert_invalid(spec, "byte-addressed processor space");
}

#[test]
fn missing_constant_space() {
    let spec = Specification::new("ram")
        .space("ram", SpaceKind::Processor, 1, 4)
        .table(DecodeTable::new(DEFAULT_ROOT_TABLE).constructor(Constructor::new("NOP", 1)));
    assert_invalid(spec, "no constant space");
}

#[test]
fn missing_root_table() {
    assert_invalid(base(), "root table 'instruction' is not defined");
}

#[test]
fn constraint_outside_constructor() {
    assert_invalid(
        with_root(base(), Constructor::new("NOP", 1).byte(1, 0)),
        "lies outside length 1",
    );
}

#[test]
fn unknown_context_variable() {
    assert_invalid(
        with_root(base(), Constructor::new("NOP", 1).context("thumb", 1)),
        "unknown context variable 'thumb'",
    );
}

#[test]
fn field_does_not_fit() {
    let overlong = Constructor::new("IMM", 2).operand(
        "imm",
        OperandKind::Immediate {
            field: Field::token(1, 2),
        },
    );
    assert_invalid(with_root(base(), overlong), "does not fit");

    let wide = Constructor::new("IMM", 1).operand(
        "imm",
        OperandKind::Immediate {
            field: Field::byte(0).bits(4, 8),
        },
    );
    assert_invalid(with_root(base(), wide), "does not fit");
}

#[test]
fn unknown_attached_register() {
    let constructor = Constructor::new("INC", 2).operand(
        "reg",
        OperandKind::Register {
            field: Field::byte(1),
            registers: vec![Some("R7".into())],
        },
    );
    assert_invalid(with_root(base(), constructor), "unknown register 'R7'");
}

#[test]
fn operand_index_out_of_range() {
    let constructor = Constructor::new("NOP", 1).display(vec![vec![DisplayPiece::Operand(0)]]);
    assert_invalid(with_root(base(), constructor), "operand index 0 out of range");

    let constructor =
        Constructor::new("NOP", 1).op(OpTemplate::new("COPY").input(VarnodeTemplate::Operand(2)));
    assert_invalid(with_root(base(), constructor), "operand index 2 out of range");
}

#[test]
fn subtable_without_export() {
    let spec = base()
        .table(
            DecodeTable::new(DEFAULT_ROOT_TABLE).constructor(
                Constructor::new("JMP", 2)
                    .operand(
                        "dest",
                        OperandKind::Subtable {
                            table: "dest".into(),
                            offset: 1,
                        },
                    )
                    .op(OpTemplate::new("BRANCH").input(VarnodeTemplate::Operand(0))),
            ),
        )
        .table(DecodeTable::new("dest").constructor(Constructor::new("", 1)));
    assert_invalid(spec, "does not export");
}

#[test]
fn unknown_subtable() {
    let constructor = Constructor::new("JMP", 1).operand(
        "dest",
        OperandKind::Subtable {
            table: "dest".into(),
            offset: 0,
        },
    );
    assert_invalid(with_root(base(), constructor), "unknown table 'dest'");
}

#[test]
fn temporary_requires_unique_space() {
    let spec = Specification::new("ram")
        .space("const", SpaceKind::Constant, 1, 8)
        .space("ram", SpaceKind::Processor, 1, 4)
        .table(
            DecodeTable::new(DEFAULT_ROOT_TABLE).constructor(
                Constructor::new("NOP", 1).op(OpTemplate::new("COPY")
                    .output(VarnodeTemplate::Temporary { offset: 0, size: 1 })
                    .input(VarnodeTemplate::Constant { value: 0, size: 1 })),
            ),
        );
    assert_invalid(spec, "without a unique space");
}

#[test]
fn context_width() {
    assert_invalid(
        with_root(base().context_field("wide", 33, 0), Constructor::new("NOP", 1)),
        "invalid width 33",
    );
}

#[test]
fn constructor_longer_than_code_space() {
    let spec = Specification::new("ram")
        .space("const", SpaceKind::Constant, 1, 8)
        .space("ram", SpaceKind::Processor, 1, 2)
        .table(DecodeTable::new(DEFAULT_ROOT_TABLE).constructor(Constructor::new("X", 2)))
        .table(DecodeTable::new("sub").constructor(Constructor::new("", 0x10001)));
    assert_invalid(spec, "length 65537 exceeds the code space");

    // A constructor may cover the whole code space
    let spec = Specification::new("ram")
        .space("const", SpaceKind::Constant, 1, 8)
        .space("ram", SpaceKind::Processor, 1, 2)
        .table(DecodeTable::new(DEFAULT_ROOT_TABLE).constructor(Constructor::new("X", 0x10000)));
    assert!(spec.validate().is_ok());
}
