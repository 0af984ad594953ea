#![no_main]

mod common;

use common::{ByteCursor, sample_alphabet};
use libfuzzer_sys::fuzz_target;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tc_gen::{GenerationRequest, generate_program};

fuzz_target!(|data: &[u8]| {
    let mut cursor = ByteCursor::new(data);
    let seed = cursor.take_u64();
    let len = cursor.take_usize(4096);
    let max_depth = cursor.take_usize(4);
    let alphabet = sample_alphabet(&mut cursor);

    let mut rng = StdRng::seed_from_u64(seed);
    let request = GenerationRequest { alphabet, len, max_depth };
    let Ok(program) = generate_program(&mut rng, request) else {
        return;
    };

    assert_eq!(program.len(), len);
    program.check_alphabet(alphabet).unwrap();
    let depth = program.check_balance().unwrap();
    assert!(depth <= max_depth);
    program.check_offset(false).unwrap();
});
