//! Min-of-N wall-clock timing across variants. Minimum rather than average:
//! process spawn and scheduler jitter only ever add time.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tc_core::{Alphabet, Instruction};
use tc_exec::{AdapterError, EngineAdapter, ExecutionVariant, PersistedProgram, TrialStatus};
use tc_gen::{GenerationError, GenerationRequest, SeededGenerator};

use crate::STDERR_PREFIX_CHARS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BenchmarkConfig {
    /// Number of recorded measurements per variant.
    pub trials: usize,
    /// Invocations per measurement; only the fastest is recorded.
    pub inner_repeats: usize,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self { trials: 5, inner_repeats: 20 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RelativeRatio {
    /// Fastest trial relative to the reference's same trial.
    pub best: f64,
    /// Slowest trial relative to the reference's same trial.
    pub worst: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantTiming {
    pub variant: String,
    /// One minimum per trial — `trials` values, never `trials * inner_repeats`.
    pub trial_seconds: Vec<f64>,
    pub total_seconds: f64,
    pub mean_seconds: f64,
    /// Relative spread against the reference; `None` for the reference itself.
    pub ratio: Option<RelativeRatio>,
}

/// Descriptive summary only; no statistical significance testing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkReport {
    pub program_path: PathBuf,
    pub trials: usize,
    pub inner_repeats: usize,
    pub timings: Vec<VariantTiming>,
}

#[derive(Debug)]
pub enum BenchmarkError {
    EmptyVariantList,
    InvalidConfig { trials: usize, inner_repeats: usize },
    Adapter { variant: String, error: AdapterError },
    /// Timing a failing engine is meaningless; the run aborts instead.
    EngineFailure { variant: String, status: TrialStatus, stderr_prefix: String },
}

impl fmt::Display for BenchmarkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyVariantList => write!(f, "benchmark needs at least one variant"),
            Self::InvalidConfig { trials, inner_repeats } => {
                write!(
                    f,
                    "benchmark config must be positive (trials={trials}, inner_repeats={inner_repeats})"
                )
            }
            Self::Adapter { variant, error } => {
                write!(f, "adapter failure on variant {variant}: {error}")
            }
            Self::EngineFailure { variant, status, stderr_prefix } => {
                write!(f, "variant {variant} failed during timing ({status}): {stderr_prefix}")
            }
        }
    }
}

impl std::error::Error for BenchmarkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Adapter { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// Time one persisted program across every variant.
///
/// Per trial and variant, the engine runs `inner_repeats` times with each
/// invocation individually timed, and the minimum is recorded. Variants run
/// strictly in list order within a trial so measurements never contend.
pub fn run_benchmark(
    adapter: &dyn EngineAdapter,
    variants: &[ExecutionVariant],
    program_path: &Path,
    config: &BenchmarkConfig,
) -> Result<BenchmarkReport, BenchmarkError> {
    if variants.is_empty() {
        return Err(BenchmarkError::EmptyVariantList);
    }
    if config.trials == 0 || config.inner_repeats == 0 {
        return Err(BenchmarkError::InvalidConfig {
            trials: config.trials,
            inner_repeats: config.inner_repeats,
        });
    }

    let mut minima: Vec<Vec<Duration>> = vec![Vec::with_capacity(config.trials); variants.len()];
    for _ in 0..config.trials {
        for (index, variant) in variants.iter().enumerate() {
            let mut best: Option<Duration> = None;
            for _ in 0..config.inner_repeats {
                let started = Instant::now();
                let trial = adapter.run(variant, program_path, b"").map_err(|error| {
                    BenchmarkError::Adapter { variant: variant.name.clone(), error }
                })?;
                let elapsed = started.elapsed();
                if !trial.status.is_success() {
                    return Err(BenchmarkError::EngineFailure {
                        variant: variant.name.clone(),
                        status: trial.status,
                        stderr_prefix: trial.stderr_prefix(STDERR_PREFIX_CHARS),
                    });
                }
                best = Some(best.map_or(elapsed, |current| current.min(elapsed)));
            }
            if let Some(best) = best {
                minima[index].push(best);
            }
        }
    }

    let reference_seconds: Vec<f64> =
        minima[0].iter().map(Duration::as_secs_f64).collect();
    let timings = variants
        .iter()
        .zip(minima.iter())
        .enumerate()
        .map(|(index, (variant, durations))| {
            let trial_seconds: Vec<f64> = durations.iter().map(Duration::as_secs_f64).collect();
            let total_seconds: f64 = trial_seconds.iter().sum();
            let mean_seconds = total_seconds / trial_seconds.len() as f64;
            let ratio = (index != 0).then(|| relative_ratio(&trial_seconds, &reference_seconds));
            VariantTiming {
                variant: variant.name.clone(),
                trial_seconds,
                total_seconds,
                mean_seconds,
                ratio,
            }
        })
        .collect();

    Ok(BenchmarkReport {
        program_path: program_path.to_path_buf(),
        trials: config.trials,
        inner_repeats: config.inner_repeats,
        timings,
    })
}

fn relative_ratio(variant: &[f64], reference: &[f64]) -> RelativeRatio {
    let mut best = f64::INFINITY;
    let mut worst = f64::NEG_INFINITY;
    for (v, r) in variant.iter().zip(reference.iter()) {
        let ratio = v / r;
        best = best.min(ratio);
        worst = worst.max(ratio);
    }
    RelativeRatio { best, worst }
}

/// Configuration for the generated-workload driver: per nesting level,
/// `programs_per_level` fresh programs are generated and timed.
#[derive(Debug, Clone)]
pub struct GeneratedBenchmarkConfig {
    pub seed: u64,
    pub alphabet: Alphabet,
    pub program_len: usize,
    /// Nesting levels `0..=max_depth` each get their own batch.
    pub max_depth: usize,
    pub programs_per_level: usize,
    pub timer: BenchmarkConfig,
}

impl Default for GeneratedBenchmarkConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            // Benchmark programs carry no i/o tokens; they exist to be timed.
            alphabet: benchmark_alphabet(),
            program_len: 1024 * 1024,
            max_depth: 2,
            programs_per_level: 20,
            timer: BenchmarkConfig::default(),
        }
    }
}

fn benchmark_alphabet() -> Alphabet {
    Alphabet::EMPTY
        .with(Instruction::MoveLeft)
        .with(Instruction::MoveRight)
        .with(Instruction::Increment)
        .with(Instruction::Decrement)
        .with(Instruction::LoopOpen)
        .with(Instruction::LoopClose)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedBenchmarkLevel {
    pub max_depth: usize,
    pub reports: Vec<BenchmarkReport>,
}

#[derive(Debug)]
pub enum GeneratedBenchmarkError {
    Generation(GenerationError),
    Storage(AdapterError),
    Benchmark(BenchmarkError),
}

impl fmt::Display for GeneratedBenchmarkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Generation(err) => write!(f, "program generation failed: {err}"),
            Self::Storage(err) => write!(f, "program storage failed: {err}"),
            Self::Benchmark(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for GeneratedBenchmarkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Generation(err) => Some(err),
            Self::Storage(err) => Some(err),
            Self::Benchmark(err) => Some(err),
        }
    }
}

impl From<GenerationError> for GeneratedBenchmarkError {
    fn from(err: GenerationError) -> Self {
        Self::Generation(err)
    }
}

impl From<BenchmarkError> for GeneratedBenchmarkError {
    fn from(err: BenchmarkError) -> Self {
        Self::Benchmark(err)
    }
}

/// Generate-and-time batches at every nesting level. Each program is
/// persisted only for as long as its own timing runs; report paths are
/// informational once the run completes.
pub fn run_generated_benchmarks(
    adapter: &dyn EngineAdapter,
    variants: &[ExecutionVariant],
    config: &GeneratedBenchmarkConfig,
) -> Result<Vec<GeneratedBenchmarkLevel>, GeneratedBenchmarkError> {
    let mut generator = SeededGenerator::from_seed(config.seed);
    let mut levels = Vec::with_capacity(config.max_depth + 1);
    for max_depth in 0..=config.max_depth {
        let mut reports = Vec::with_capacity(config.programs_per_level);
        for _ in 0..config.programs_per_level {
            let program = generator.program(GenerationRequest {
                alphabet: config.alphabet,
                len: config.program_len,
                max_depth,
            })?;
            let persisted =
                PersistedProgram::write(&program).map_err(GeneratedBenchmarkError::Storage)?;
            reports.push(run_benchmark(adapter, variants, persisted.path(), &config.timer)?);
        }
        levels.push(GeneratedBenchmarkLevel { max_depth, reports });
    }
    Ok(levels)
}

#[cfg(test)]
mod tests {
    use super::benchmark_alphabet;

    #[test]
    fn benchmark_alphabet_has_no_io_tokens() {
        assert_eq!(benchmark_alphabet().to_string(), "<>+-[]");
    }
}
