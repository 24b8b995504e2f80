//! Property-based tests for single-instruction decoding.
//!
//! These verify invariants that hold for arbitrary image contents:
//! - Decoding is deterministic
//! - The reported length matches the bytes fetched from the image
//! - A failed decode does not disturb later decodes

mod common;

use std::collections::BTreeSet;
use std::sync::Arc;

use proptest::prelude::*;

use common::encoding::*;
use common::{tiny8, RecordingImage};
use sladec::*;

/// Offset of a known-good instruction placed after the arbitrary bytes.
const ANCHOR: u64 = 0x40;

fn anchored(mut bytes: Vec<u8>) -> Vec<u8> {
    bytes.resize(ANCHOR as usize, NOP);
    bytes.extend_from_slice(&[MOV, 0x01, 0x2A]);
    bytes
}

/// Bytes drawn mostly from valid opcodes so that a good share of inputs decode.
fn instruction_bytes() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(
        prop_oneof![
            3 => (0u8..=ADDI),
            1 => any::<u8>(),
        ],
        1..8,
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(2000))]

    /// Decoding the same address twice yields identical instructions or identical failures.
    #[test]
    fn decode_is_deterministic(bytes in instruction_bytes()) {
        let sleigh = tiny8(bytes);
        match (sleigh.decode_one(0), sleigh.decode_one(0)) {
            (Ok(first), Ok(second)) => prop_assert_eq!(first, second),
            (Err(first), Err(second)) => prop_assert_eq!(first.to_string(), second.to_string()),
            (first, second) => prop_assert!(false, "inconsistent results: {:?} and {:?}", first, second),
        }
    }

    /// The length of a decoded instruction is the number of distinct offsets read, and reads
    /// never move backwards.
    #[test]
    fn length_matches_bytes_read(bytes in instruction_bytes()) {
        let image = RecordingImage::new(bytes.clone());
        let sleigh = tiny8(Arc::clone(&image));

        if let Ok(instruction) = sleigh.decode_one(0) {
            let reads = image.take_reads();
            let offsets: BTreeSet<u64> = reads
                .iter()
                .filter_map(VarnodeData::range)
                .flatten()
                .collect();

            prop_assert!(instruction.length >= 1);
            prop_assert!(instruction.length <= bytes.len());
            prop_assert_eq!(offsets.len(), instruction.length, "reads: {:?}", reads);
            prop_assert!(reads.windows(2).all(|pair| pair[0].address.offset <= pair[1].address.offset));
        }
    }

    /// Failures at arbitrary addresses do not change how a well-formed instruction decodes.
    #[test]
    fn failures_are_isolated(bytes in instruction_bytes(), offsets in prop::collection::vec(0u64..0x50, 1..8)) {
        let sleigh = tiny8(anchored(bytes));
        let expected = sleigh.decode_one(ANCHOR).expect("anchor instruction decodes");

        for offset in offsets {
            let _ = sleigh.decode_one(offset);
        }

        prop_assert_eq!(sleigh.decode_one(ANCHOR).expect("anchor instruction decodes"), expected);
    }

    /// Both projections of an instruction come from the same decode.
    #[test]
    fn projections_agree(bytes in instruction_bytes()) {
        let sleigh = tiny8(bytes);
        if let Ok(instruction) = sleigh.decode_one(0) {
            prop_assert_eq!(sleigh.disassemble_native(0).ok(), Some(instruction.disassembly));
            prop_assert_eq!(sleigh.disassemble_pcode(0).ok(), Some(instruction.operations));
        }
    }
}
