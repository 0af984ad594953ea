#![no_main]

mod common;

use common::{ByteCursor, sample_alphabet};
use libfuzzer_sys::fuzz_target;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tc_gen::straight_line;

fuzz_target!(|data: &[u8]| {
    let mut cursor = ByteCursor::new(data);
    let seed = cursor.take_u64();
    let len = cursor.take_usize(2048);
    let restore = cursor.take_bool();
    let alphabet = sample_alphabet(&mut cursor).without_loops();
    if alphabet.is_empty() {
        return;
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let Ok(program) = straight_line(&mut rng, alphabet, len, restore) else {
        return;
    };

    assert_eq!(program.len(), len);
    program.check_alphabet(alphabet).unwrap();
    program.check_offset(restore).unwrap();
});
