//! The timed fuzz loop: fresh random program per trial, every variant run on
//! it, first-class deadline and trial counter.

use crate::{DivergenceReport, check_consistency};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tc_core::Alphabet;
use tc_exec::{AdapterError, EngineAdapter, ExecutionVariant, PersistedProgram};
use tc_gen::{GenerationError, GenerationRequest, SeededGenerator};

/// What each trial feeds the engines on stdin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputStrategy {
    Empty,
    /// Random bytes, exactly as many as the program has instructions — a
    /// straight-line program can never read more than its own length.
    RandomMatchingProgramLength,
}

/// When the loop stops (absent a fail-fast failure).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FuzzBudget {
    Duration(Duration),
    Trials(u64),
}

#[derive(Debug, Clone)]
pub struct FuzzConfig {
    pub seed: u64,
    pub alphabet: Alphabet,
    pub program_len: usize,
    pub max_depth: usize,
    pub input: InputStrategy,
    pub budget: FuzzBudget,
    /// Stop at the first failure and keep its program file; otherwise tally
    /// failures and keep going until the budget runs out.
    pub fail_fast: bool,
}

/// The failure that stopped a fail-fast run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuzzFailure {
    /// 1-based ordinal of the failing trial.
    pub trial: u64,
    pub description: String,
    /// Where the offending program was kept for reproduction, when keeping
    /// it succeeded.
    pub kept_program: Option<PathBuf>,
    pub divergence: Option<DivergenceReport>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureTally {
    pub description: String,
    pub count: u64,
}

/// Outcome of one fuzz run. `completed_trials` counts every trial whose
/// oracle comparison ran to a verdict, clean or not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuzzReport {
    pub seed: u64,
    pub alphabet: String,
    pub program_len: usize,
    pub max_depth: usize,
    pub completed_trials: u64,
    pub elapsed_ms: u64,
    pub failure: Option<FuzzFailure>,
    pub failure_tallies: Vec<FailureTally>,
}

impl FuzzReport {
    #[must_use]
    pub fn found_failure(&self) -> bool {
        self.failure.is_some() || !self.failure_tallies.is_empty()
    }
}

/// A fuzz run that could not proceed at all, as opposed to one that found a
/// divergence.
#[derive(Debug)]
pub enum FuzzError {
    Generation(GenerationError),
    Storage(AdapterError),
}

impl fmt::Display for FuzzError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Generation(err) => write!(f, "program generation failed: {err}"),
            Self::Storage(err) => write!(f, "program storage failed: {err}"),
        }
    }
}

impl std::error::Error for FuzzError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Generation(err) => Some(err),
            Self::Storage(err) => Some(err),
        }
    }
}

impl From<GenerationError> for FuzzError {
    fn from(err: GenerationError) -> Self {
        Self::Generation(err)
    }
}

/// Repeatedly generate, persist, and differentially execute programs until
/// the budget is exhausted or (fail-fast) a failure appears.
///
/// Every iteration draws a fresh program from the seeded generator; nothing
/// is cached between iterations. The deadline is computed once at entry and
/// checked between iterations only — an in-flight engine invocation is never
/// interrupted here (the adapter's own timeout still applies).
pub fn run_fuzz(
    adapter: &dyn EngineAdapter,
    variants: &[ExecutionVariant],
    config: &FuzzConfig,
) -> Result<FuzzReport, FuzzError> {
    let mut generator = SeededGenerator::from_seed(config.seed);
    let started = Instant::now();
    let deadline = match config.budget {
        FuzzBudget::Duration(budget) => Some(started + budget),
        FuzzBudget::Trials(_) => None,
    };
    let trial_limit = match config.budget {
        FuzzBudget::Trials(limit) => Some(limit),
        FuzzBudget::Duration(_) => None,
    };

    let mut completed: u64 = 0;
    let mut failure = None;
    let mut tallies: FxHashMap<String, u64> = FxHashMap::default();

    loop {
        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                break;
            }
        }
        if let Some(limit) = trial_limit {
            if completed >= limit {
                break;
            }
        }

        let program = generator.program(GenerationRequest {
            alphabet: config.alphabet,
            len: config.program_len,
            max_depth: config.max_depth,
        })?;
        let input = match config.input {
            InputStrategy::Empty => Vec::new(),
            InputStrategy::RandomMatchingProgramLength => generator.input_bytes(program.len()),
        };
        let persisted = PersistedProgram::write(&program).map_err(FuzzError::Storage)?;

        match check_consistency(adapter, variants, persisted.path(), &input) {
            Ok(()) => completed += 1,
            Err(oracle_failure) => {
                completed += 1;
                let description = oracle_failure.to_string();
                if config.fail_fast {
                    failure = Some(FuzzFailure {
                        trial: completed,
                        description,
                        kept_program: persisted.keep().ok(),
                        divergence: oracle_failure.into_divergence(),
                    });
                    break;
                }
                *tallies.entry(description).or_insert(0) += 1;
            }
        }
    }

    let mut failure_tallies: Vec<FailureTally> = tallies
        .into_iter()
        .map(|(description, count)| FailureTally { description, count })
        .collect();
    failure_tallies.sort_by(|a, b| b.count.cmp(&a.count).then(a.description.cmp(&b.description)));

    Ok(FuzzReport {
        seed: config.seed,
        alphabet: config.alphabet.to_string(),
        program_len: config.program_len,
        max_depth: config.max_depth,
        completed_trials: completed,
        elapsed_ms: duration_ms(started.elapsed()),
        failure,
        failure_tallies,
    })
}

fn duration_ms(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}
