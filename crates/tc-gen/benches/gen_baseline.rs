use criterion::{Criterion, criterion_group, criterion_main};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tc_core::Alphabet;
use tc_gen::{GenerationRequest, generate_program, straight_line};

const FUZZ_LEN: usize = 80;
const BENCH_LEN: usize = 1024 * 1024;

fn bench_straight_line(c: &mut Criterion) {
    let alphabet = Alphabet::from_tokens("+-<>,.").unwrap();
    let mut group = c.benchmark_group("straight_line");

    group.bench_function("len80_restore", |b| {
        b.iter(|| {
            let mut rng = StdRng::seed_from_u64(7);
            straight_line(&mut rng, alphabet, FUZZ_LEN, true).unwrap()
        });
    });

    group.bench_function("len1mib", |b| {
        b.iter(|| {
            let mut rng = StdRng::seed_from_u64(7);
            straight_line(&mut rng, alphabet, BENCH_LEN, false).unwrap()
        });
    });

    group.finish();
}

fn bench_nested(c: &mut Criterion) {
    let alphabet = Alphabet::from_tokens("<>+-[]").unwrap();
    let mut group = c.benchmark_group("generate_program");
    group.sample_size(20);

    for max_depth in 0..=2_usize {
        group.bench_function(format!("len1mib_depth{max_depth}"), |b| {
            b.iter(|| {
                let mut rng = StdRng::seed_from_u64(7);
                generate_program(
                    &mut rng,
                    GenerationRequest { alphabet, len: BENCH_LEN, max_depth },
                )
                .unwrap()
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_straight_line, bench_nested);
criterion_main!(benches);
