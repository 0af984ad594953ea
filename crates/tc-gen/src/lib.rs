#![forbid(unsafe_code)]

//! Constrained random program generation.
//!
//! Programs come out syntactically valid and length-exact by construction:
//! the generators never emit an instruction that would violate the
//! pointer-offset or balance invariants, and never backtrack or discard
//! emitted work. A postcondition failure therefore means a generator bug and
//! aborts loudly rather than being retried.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use smallvec::SmallVec;
use std::fmt;
use tc_core::{Alphabet, Instruction, InvariantViolation, Program};

/// Length of the empty loop skeleton `-[><]`.
pub const LOOP_SKELETON_LEN: usize = 5;

/// Longest counter-exhausting decrement run inside a loop block. The loop
/// counter is a wrapping 8-bit cell, so runs longer than 255 gain nothing.
const MAX_LOOP_DECREMENT: usize = 255;

/// Everything a single `generate_program` call needs; owned transiently by
/// that call, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationRequest {
    pub alphabet: Alphabet,
    pub len: usize,
    pub max_depth: usize,
}

/// A request the generators cannot satisfy. These are caller errors, distinct
/// from postcondition failures (which panic).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationError {
    LoopTokensInStraightLine,
    EmptyAlphabet,
    Unsatisfiable { len: usize, alphabet: Alphabet },
}

impl fmt::Display for GenerationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LoopTokensInStraightLine => {
                write!(f, "straight-line alphabet must not contain loop tokens")
            }
            Self::EmptyAlphabet => write!(f, "cannot generate from an empty alphabet"),
            Self::Unsatisfiable { len, alphabet } => {
                write!(
                    f,
                    "no program of length {len} exists over alphabet \"{alphabet}\" under the requested constraints"
                )
            }
        }
    }
}

impl std::error::Error for GenerationError {}

/// Generate exactly `len` non-control-flow instructions drawn from
/// `alphabet`, keeping the simulated pointer offset non-negative on every
/// prefix. With `restore_offset`, the offset is exactly zero after the last
/// instruction.
///
/// Single forward pass: move-left is excluded while the offset is zero,
/// move-right is excluded once a further right move could no longer be
/// undone in the remaining budget, and once the offset equals the remaining
/// budget the rest of the run is a forced budget-exact closing sequence of
/// move-left instructions.
pub fn straight_line<R: Rng>(
    rng: &mut R,
    alphabet: Alphabet,
    len: usize,
    restore_offset: bool,
) -> Result<Program, GenerationError> {
    if alphabet.contains(Instruction::LoopOpen) || alphabet.contains(Instruction::LoopClose) {
        return Err(GenerationError::LoopTokensInStraightLine);
    }
    if len > 0 && alphabet.is_empty() {
        return Err(GenerationError::EmptyAlphabet);
    }

    let mut instructions = Vec::with_capacity(len);
    let mut offset: usize = 0;
    while instructions.len() < len {
        let remaining = len - instructions.len();

        if restore_offset && offset > 0 && offset == remaining {
            // Forced closing phase: every remaining slot must move left.
            for _ in 0..offset {
                instructions.push(Instruction::MoveLeft);
            }
            break;
        }

        let mut candidates: SmallVec<[Instruction; 8]> = SmallVec::new();
        for instruction in alphabet.instructions() {
            match instruction {
                Instruction::MoveLeft if offset == 0 => continue,
                Instruction::MoveRight if restore_offset && offset + 1 > remaining - 1 => {
                    // No room left to come back; also forbids a final-slot
                    // move at offset zero.
                    continue;
                }
                _ => {}
            }
            candidates.push(instruction);
        }
        if candidates.is_empty() {
            return Err(GenerationError::Unsatisfiable { len, alphabet });
        }

        let instruction = candidates[rng.gen_range(0..candidates.len())];
        match instruction {
            Instruction::MoveLeft => offset -= 1,
            Instruction::MoveRight => offset += 1,
            _ => {}
        }
        instructions.push(instruction);
    }

    let program = Program::new(instructions);
    enforce_len(&program, len);
    enforce(program.check_alphabet(alphabet), "alphabet membership");
    enforce(program.check_offset(restore_offset), "pointer offset");
    Ok(program)
}

/// Generate a program of exactly `request.len` instructions with loop
/// nesting bounded by `request.max_depth`.
///
/// Degrades to a single non-restoring straight-line run when the alphabet
/// cannot express the loop skeleton or the depth budget is zero. Otherwise
/// the program is a concatenation of loop blocks (`-[> BODY < D ]`, `D` an
/// odd-length decrement run) and restore-offset straight blocks, chosen
/// until the budget is consumed exactly.
pub fn generate_program<R: Rng>(
    rng: &mut R,
    request: GenerationRequest,
) -> Result<Program, GenerationError> {
    let GenerationRequest { alphabet, len, max_depth } = request;

    if len == 0 {
        return Ok(Program::empty());
    }
    if max_depth == 0 || !supports_loop_skeleton(alphabet) {
        return straight_line(rng, alphabet.without_loops(), len, false);
    }

    // The skeleton check above guarantees `<`, `>`, and `-` survive here, so
    // restore-offset straight blocks are always satisfiable.
    let straight_alphabet = alphabet.without_loops();
    let mut instructions = Vec::with_capacity(len);
    let mut remaining = len;
    while remaining > 0 {
        // A loop block needs its skeleton plus at least one counter decrement.
        let loop_affordable = remaining >= LOOP_SKELETON_LEN + 1;
        let block = if loop_affordable && rng.gen_bool(0.5) {
            loop_block(rng, alphabet, remaining, max_depth)?
        } else {
            let block_len = rng.gen_range(0..=remaining);
            straight_line(rng, straight_alphabet, block_len, true)?
        };
        remaining -= block.len();
        instructions.extend_from_slice(block.instructions());
    }

    let program = Program::new(instructions);
    enforce_len(&program, len);
    enforce(program.check_alphabet(alphabet), "alphabet membership");
    enforce(program.check_offset(false), "pointer offset");
    match program.check_balance() {
        Ok(depth) if depth <= max_depth => {}
        Ok(depth) => panic!(
            "generator invariant violated (nesting depth): observed {depth}, budget {max_depth}"
        ),
        Err(violation) => panic!("generator invariant violated (balance): {violation}"),
    }
    Ok(program)
}

/// The loop skeleton spends `-`, `[`, `>`, `<`, `]`; all five must be in the
/// alphabet or the block would violate the membership postcondition.
fn supports_loop_skeleton(alphabet: Alphabet) -> bool {
    alphabet.has_loop_tokens()
        && alphabet.contains(Instruction::MoveLeft)
        && alphabet.contains(Instruction::MoveRight)
        && alphabet.contains(Instruction::Decrement)
}

/// One `-[> BODY < D ]` block: a decrement seeds the wrapping 8-bit counter,
/// the body runs one cell to the right, and `D` (odd, so the counter always
/// reaches zero) exhausts it. Net pointer movement across the block is
/// whatever the body leaves, never negative.
fn loop_block<R: Rng>(
    rng: &mut R,
    alphabet: Alphabet,
    remaining: usize,
    max_depth: usize,
) -> Result<Program, GenerationError> {
    debug_assert!(remaining > LOOP_SKELETON_LEN);
    debug_assert!(max_depth > 0);

    let decrement_cap = (remaining - LOOP_SKELETON_LEN).min(MAX_LOOP_DECREMENT);
    let decrement_len = 2 * rng.gen_range(0..=(decrement_cap - 1) / 2) + 1;
    let body_budget = remaining - LOOP_SKELETON_LEN - decrement_len;
    let body_len = rng.gen_range(0..=body_budget);
    let body = generate_program(
        rng,
        GenerationRequest {
            alphabet,
            len: body_len,
            max_depth: max_depth - 1,
        },
    )?;

    let mut instructions = Vec::with_capacity(LOOP_SKELETON_LEN + decrement_len + body.len());
    instructions.push(Instruction::Decrement);
    instructions.push(Instruction::LoopOpen);
    instructions.push(Instruction::MoveRight);
    instructions.extend_from_slice(body.instructions());
    instructions.push(Instruction::MoveLeft);
    instructions.extend(std::iter::repeat(Instruction::Decrement).take(decrement_len));
    instructions.push(Instruction::LoopClose);
    Ok(Program::new(instructions))
}

fn enforce(result: Result<(), InvariantViolation>, what: &str) {
    if let Err(violation) = result {
        panic!("generator invariant violated ({what}): {violation}");
    }
}

fn enforce_len(program: &Program, len: usize) {
    if program.len() != len {
        panic!(
            "generator invariant violated (length): produced {}, requested {len}",
            program.len()
        );
    }
}

/// Convenience wrapper owning a seeded rng, for callers that only need
/// reproducibility from a single `u64` seed.
#[derive(Debug)]
pub struct SeededGenerator {
    rng: StdRng,
}

impl SeededGenerator {
    #[must_use]
    pub fn from_seed(seed: u64) -> Self {
        Self { rng: StdRng::seed_from_u64(seed) }
    }

    pub fn straight_line(
        &mut self,
        alphabet: Alphabet,
        len: usize,
        restore_offset: bool,
    ) -> Result<Program, GenerationError> {
        straight_line(&mut self.rng, alphabet, len, restore_offset)
    }

    pub fn program(&mut self, request: GenerationRequest) -> Result<Program, GenerationError> {
        generate_program(&mut self.rng, request)
    }

    /// Uniformly random engine input of the given length.
    pub fn input_bytes(&mut self, len: usize) -> Vec<u8> {
        (0..len).map(|_| self.rng.gen()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{
        GenerationError, GenerationRequest, SeededGenerator, generate_program, straight_line,
    };
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use tc_core::{Alphabet, Instruction};

    fn alphabet(tokens: &str) -> Alphabet {
        Alphabet::from_tokens(tokens).expect("valid tokens")
    }

    #[test]
    fn straight_line_rejects_loop_tokens() {
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(
            straight_line(&mut rng, alphabet("+-[]"), 4, false),
            Err(GenerationError::LoopTokensInStraightLine)
        );
    }

    #[test]
    fn straight_line_rejects_empty_alphabet() {
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(
            straight_line(&mut rng, Alphabet::EMPTY, 1, false),
            Err(GenerationError::EmptyAlphabet)
        );
        assert_eq!(
            straight_line(&mut rng, Alphabet::EMPTY, 0, false).map(|p| p.len()),
            Ok(0)
        );
    }

    #[test]
    fn straight_line_restores_offset_over_move_heavy_alphabet() {
        // Boundary scenario: "+-<>", length 5, restore. Net balance must be
        // exactly zero with no negative prefix, for every seed.
        let a = alphabet("+-<>");
        for seed in 0..200 {
            let mut rng = StdRng::seed_from_u64(seed);
            let program = straight_line(&mut rng, a, 5, true).expect("satisfiable");
            assert_eq!(program.len(), 5);
            program.check_alphabet(a).expect("alphabet membership");
            program.check_offset(true).expect("restored offset");
        }
    }

    #[test]
    fn straight_line_detects_unsatisfiable_requests() {
        let mut rng = StdRng::seed_from_u64(0);
        // Only move-left: the very first slot has no candidate.
        assert!(matches!(
            straight_line(&mut rng, alphabet("<"), 3, false),
            Err(GenerationError::Unsatisfiable { .. })
        ));
        // Pure moves with an odd length can never return to zero.
        assert!(matches!(
            straight_line(&mut rng, alphabet("<>"), 5, true),
            Err(GenerationError::Unsatisfiable { .. })
        ));
    }

    #[test]
    fn straight_line_pure_moves_even_length_closes_exactly() {
        let a = alphabet("<>");
        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let program = straight_line(&mut rng, a, 8, true).expect("satisfiable");
            assert_eq!(program.len(), 8);
            program.check_offset(true).expect("restored offset");
        }
    }

    #[test]
    fn empty_request_yields_empty_program() {
        let mut rng = StdRng::seed_from_u64(7);
        let program = generate_program(
            &mut rng,
            GenerationRequest { alphabet: alphabet("<>+-[]"), len: 0, max_depth: 2 },
        )
        .expect("empty program is valid");
        assert!(program.is_empty());
    }

    #[test]
    fn missing_loop_tokens_degrade_to_straight_line() {
        let a = alphabet("<>+-");
        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let program = generate_program(
                &mut rng,
                GenerationRequest { alphabet: a, len: 10, max_depth: 2 },
            )
            .expect("satisfiable");
            assert_eq!(program.len(), 10);
            assert!(
                !program
                    .instructions()
                    .iter()
                    .any(|instruction| instruction.is_loop_token())
            );
        }
    }

    #[test]
    fn zero_depth_degrades_to_straight_line() {
        let mut rng = StdRng::seed_from_u64(11);
        let program = generate_program(
            &mut rng,
            GenerationRequest { alphabet: Alphabet::FULL, len: 64, max_depth: 0 },
        )
        .expect("satisfiable");
        assert_eq!(program.len(), 64);
        assert_eq!(program.check_balance(), Ok(0));
    }

    #[test]
    fn nested_generation_respects_depth_budget() {
        let a = alphabet("<>+-[].");
        for seed in 0..100 {
            let mut rng = StdRng::seed_from_u64(seed);
            let program = generate_program(
                &mut rng,
                GenerationRequest { alphabet: a, len: 80, max_depth: 2 },
            )
            .expect("satisfiable");
            assert_eq!(program.len(), 80);
            let depth = program.check_balance().expect("balanced");
            assert!(depth <= 2, "depth {depth} exceeds budget");
            program.check_offset(false).expect("offset invariant");
            program.check_alphabet(a).expect("alphabet membership");
        }
    }

    #[test]
    fn loop_blocks_appear_at_realistic_lengths() {
        // With a 1 KiB budget and depth 2 the coin flips make at least one
        // loop block overwhelmingly likely across 20 seeds.
        let a = alphabet("<>+-[]");
        let mut saw_loop = false;
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let program = generate_program(
                &mut rng,
                GenerationRequest { alphabet: a, len: 1024, max_depth: 2 },
            )
            .expect("satisfiable");
            if program
                .instructions()
                .iter()
                .any(|instruction| *instruction == Instruction::LoopOpen)
            {
                saw_loop = true;
                break;
            }
        }
        assert!(saw_loop, "no loop block generated in 20 seeds");
    }

    #[test]
    fn same_seed_reproduces_the_same_program() {
        let request = GenerationRequest { alphabet: Alphabet::FULL, len: 256, max_depth: 2 };
        let first = SeededGenerator::from_seed(42).program(request).expect("satisfiable");
        let second = SeededGenerator::from_seed(42).program(request).expect("satisfiable");
        assert_eq!(first, second);
    }

    #[test]
    fn input_bytes_are_reproducible_and_sized() {
        let mut generator = SeededGenerator::from_seed(9);
        let input = generator.input_bytes(80);
        assert_eq!(input.len(), 80);
        let mut again = SeededGenerator::from_seed(9);
        assert_eq!(again.input_bytes(80), input);
    }

    proptest! {
        #[test]
        fn straight_line_invariants_hold_for_all_seeds(
            seed in any::<u64>(),
            len in 0_usize..=128,
            restore in any::<bool>(),
        ) {
            let a = alphabet("+-<>,.");
            let mut rng = StdRng::seed_from_u64(seed);
            let program = straight_line(&mut rng, a, len, restore).expect("satisfiable");
            prop_assert_eq!(program.len(), len);
            prop_assert!(program.check_alphabet(a).is_ok());
            prop_assert!(program.check_offset(restore).is_ok());
        }

        #[test]
        fn program_invariants_hold_for_all_seeds(
            seed in any::<u64>(),
            len in 0_usize..=256,
            max_depth in 0_usize..=3,
        ) {
            let a = alphabet("<>+-[],.");
            let mut rng = StdRng::seed_from_u64(seed);
            let program = generate_program(
                &mut rng,
                GenerationRequest { alphabet: a, len, max_depth },
            ).expect("satisfiable");
            prop_assert_eq!(program.len(), len);
            prop_assert!(program.check_alphabet(a).is_ok());
            let depth = program.check_balance().expect("balanced");
            prop_assert!(depth <= max_depth);
            prop_assert!(program.check_offset(false).is_ok());
        }
    }
}
