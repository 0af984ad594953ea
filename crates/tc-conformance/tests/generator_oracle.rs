//! Structural-invariant oracle for the program generators, including the
//! literal boundary scenarios for straight-line and nested generation.

use proptest::prelude::*;
use tc_core::{Alphabet, Instruction};
use tc_gen::{GenerationError, GenerationRequest, SeededGenerator};

fn alphabet(tokens: &str) -> Alphabet {
    Alphabet::from_tokens(tokens).expect("valid tokens")
}

#[test]
fn straight_line_five_tokens_restores_balance() {
    // Literal scenario: alphabet "+-<>", length 5, restore. Five tokens from
    // the alphabet, no prefix with negative net movement, net zero at the end.
    let a = alphabet("+-<>");
    for seed in 0..500 {
        let program = SeededGenerator::from_seed(seed)
            .straight_line(a, 5, true)
            .expect("satisfiable");
        assert_eq!(program.len(), 5);
        program.check_alphabet(a).expect("tokens within +-<>");
        program.check_offset(true).expect("balanced movement");
    }
}

#[test]
fn zero_length_request_returns_the_empty_program() {
    let program = SeededGenerator::from_seed(1)
        .program(GenerationRequest { alphabet: alphabet("<>+-[]"), len: 0, max_depth: 2 })
        .expect("empty program is valid");
    assert!(program.is_empty());
}

#[test]
fn loopless_alphabet_degrades_to_a_straight_line_of_exact_length() {
    let a = alphabet("<>+-");
    let program = SeededGenerator::from_seed(2)
        .program(GenerationRequest { alphabet: a, len: 10, max_depth: 2 })
        .expect("satisfiable");
    assert_eq!(program.len(), 10);
    assert_eq!(program.check_balance(), Ok(0), "no loop tokens may appear");
    program.check_offset(false).expect("offset invariant");
}

#[test]
fn nested_generation_is_length_exact_at_scale() {
    let a = alphabet("<>+-[]");
    for max_depth in 0..=2 {
        let program = SeededGenerator::from_seed(3)
            .program(GenerationRequest { alphabet: a, len: 64 * 1024, max_depth })
            .expect("satisfiable");
        assert_eq!(program.len(), 64 * 1024);
        let depth = program.check_balance().expect("balanced");
        assert!(depth <= max_depth);
    }
}

#[test]
fn unsatisfiable_alphabets_error_instead_of_spinning() {
    let outcome = SeededGenerator::from_seed(4).straight_line(alphabet("<"), 4, false);
    assert!(matches!(outcome, Err(GenerationError::Unsatisfiable { .. })));

    // Loop-only alphabet cannot express the skeleton, and its straight
    // remainder is empty.
    let outcome = SeededGenerator::from_seed(4)
        .program(GenerationRequest { alphabet: alphabet("[]"), len: 8, max_depth: 2 });
    assert!(matches!(
        outcome,
        Err(GenerationError::EmptyAlphabet | GenerationError::Unsatisfiable { .. })
    ));
}

#[test]
fn loop_bodies_may_contain_io_tokens() {
    let a = alphabet("<>+-[].");
    let mut saw_write_inside_loop = false;
    for seed in 0..50 {
        let program = SeededGenerator::from_seed(seed)
            .program(GenerationRequest { alphabet: a, len: 512, max_depth: 2 })
            .expect("satisfiable");
        let mut depth = 0;
        for instruction in program.instructions() {
            match instruction {
                Instruction::LoopOpen => depth += 1,
                Instruction::LoopClose => depth -= 1,
                Instruction::WriteByte if depth > 0 => saw_write_inside_loop = true,
                _ => {}
            }
        }
        if saw_write_inside_loop {
            break;
        }
    }
    assert!(saw_write_inside_loop, "recursion never placed i/o inside a loop");
}

proptest! {
    #[test]
    fn straight_line_invariants_hold_for_every_seed(
        seed in any::<u64>(),
        len in 0_usize..=200,
        restore in any::<bool>(),
    ) {
        let a = alphabet("+-<>,.");
        let program = SeededGenerator::from_seed(seed)
            .straight_line(a, len, restore)
            .expect("satisfiable");
        prop_assert_eq!(program.len(), len);
        prop_assert!(program.check_alphabet(a).is_ok());
        prop_assert!(program.check_offset(restore).is_ok());
    }

    #[test]
    fn nested_invariants_hold_for_every_seed(
        seed in any::<u64>(),
        len in 0_usize..=400,
        max_depth in 0_usize..=3,
    ) {
        let a = alphabet("<>+-[],.");
        let program = SeededGenerator::from_seed(seed)
            .program(GenerationRequest { alphabet: a, len, max_depth })
            .expect("satisfiable");
        prop_assert_eq!(program.len(), len);
        prop_assert!(program.check_alphabet(a).is_ok());
        let depth = program.check_balance().expect("balanced");
        prop_assert!(depth <= max_depth);
        prop_assert!(program.check_offset(false).is_ok());
    }
}
