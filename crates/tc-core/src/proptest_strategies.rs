use crate::{Alphabet, Instruction, Program};
use proptest::prelude::*;

pub fn arb_instruction() -> impl Strategy<Value = Instruction> {
    prop::sample::select(Instruction::ALL.to_vec())
}

pub fn arb_straight_instruction() -> impl Strategy<Value = Instruction> {
    prop::sample::select(
        Instruction::ALL
            .into_iter()
            .filter(|instruction| !instruction.is_loop_token())
            .collect::<Vec<_>>(),
    )
}

pub fn arb_alphabet() -> impl Strategy<Value = Alphabet> {
    prop::collection::vec(arb_instruction(), 1..=8).prop_map(|instructions| {
        instructions
            .into_iter()
            .fold(Alphabet::EMPTY, Alphabet::with)
    })
}

pub fn arb_program(max_len: usize) -> impl Strategy<Value = Program> {
    prop::collection::vec(arb_instruction(), 0..=max_len).prop_map(Program::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn wire_form_round_trips(program in arb_program(64)) {
            let bytes = program.as_bytes();
            prop_assert_eq!(Program::from_bytes(&bytes), Ok(program));
        }

        #[test]
        fn display_matches_wire_form(program in arb_program(64)) {
            prop_assert_eq!(program.to_string().into_bytes(), program.as_bytes());
        }

        #[test]
        fn alphabet_membership_is_consistent(alphabet in arb_alphabet(), instruction in arb_instruction()) {
            let with = alphabet.with(instruction);
            let without = alphabet.without(instruction);
            prop_assert!(with.contains(instruction));
            prop_assert!(!without.contains(instruction));
        }

        #[test]
        fn straight_programs_always_balance(instructions in prop::collection::vec(arb_straight_instruction(), 0..=64)) {
            let program = Program::new(instructions);
            prop_assert_eq!(program.check_balance(), Ok(0));
        }
    }
}
