#![forbid(unsafe_code)]

//! Differential conformance for tape-language engines: the equivalence
//! oracle plus the timed fuzz loop, benchmark timer, and known-program
//! suite built on top of it.

pub mod bench;
pub mod fuzz;
pub mod suite;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tc_exec::{AdapterError, EngineAdapter, ExecutionVariant, TrialResult, TrialStatus};

/// Diagnostic text embedded in reports is clipped to this many characters.
pub const STDERR_PREFIX_CHARS: usize = 120;

/// How a variant disagreed with the reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DivergenceKind {
    /// The variant (or the reference itself) did not exit cleanly.
    EngineFailure { status: TrialStatus, stderr_prefix: String },
    /// The variant wrote diagnostics where the reference wrote none.
    UnexpectedDiagnostic { stderr_prefix: String },
    /// Output bytes differ; `first_difference` is the offset of the first
    /// disagreeing byte (equal to the shorter length when one output is a
    /// prefix of the other).
    OutputMismatch {
        first_difference: usize,
        reference_len: usize,
        variant_len: usize,
    },
}

impl fmt::Display for DivergenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EngineFailure { status, stderr_prefix } => {
                write!(f, "engine failure ({status}): {stderr_prefix}")
            }
            Self::UnexpectedDiagnostic { stderr_prefix } => {
                write!(f, "unexpected diagnostic output: {stderr_prefix}")
            }
            Self::OutputMismatch { first_difference, reference_len, variant_len } => {
                write!(
                    f,
                    "output mismatch at byte {first_difference} (reference {reference_len} bytes, variant {variant_len} bytes)"
                )
            }
        }
    }
}

/// One detected disagreement, carrying enough detail to reproduce it by
/// re-running the persisted program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DivergenceReport {
    pub reference: String,
    pub variant: String,
    pub program_path: PathBuf,
    pub kind: DivergenceKind,
}

impl fmt::Display for DivergenceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "variant {} diverged from reference {} on {}: {}",
            self.variant,
            self.reference,
            self.program_path.display(),
            self.kind
        )
    }
}

/// Why one oracle invocation did not come back clean.
#[derive(Debug)]
pub enum OracleFailure {
    NotEnoughVariants { count: usize },
    Adapter { variant: String, error: AdapterError },
    Divergence(DivergenceReport),
}

impl fmt::Display for OracleFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotEnoughVariants { count } => {
                write!(f, "differential comparison needs at least 2 variants, got {count}")
            }
            Self::Adapter { variant, error } => {
                write!(f, "adapter failure on variant {variant}: {error}")
            }
            Self::Divergence(report) => write!(f, "{report}"),
        }
    }
}

impl std::error::Error for OracleFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Adapter { error, .. } => Some(error),
            _ => None,
        }
    }
}

impl OracleFailure {
    /// The structured divergence, when this failure is one.
    #[must_use]
    pub fn into_divergence(self) -> Option<DivergenceReport> {
        match self {
            Self::Divergence(report) => Some(report),
            _ => None,
        }
    }
}

/// Run every variant on the persisted program with identical input and
/// require byte-identical successful behavior.
///
/// The first variant is the reference: it must exit successfully with an
/// empty diagnostic stream, and every other variant must match its output
/// exactly. Succeeds silently when all variants agree.
pub fn check_consistency(
    adapter: &dyn EngineAdapter,
    variants: &[ExecutionVariant],
    program_path: &Path,
    input: &[u8],
) -> Result<(), OracleFailure> {
    let Some((reference, others)) = variants.split_first() else {
        return Err(OracleFailure::NotEnoughVariants { count: 0 });
    };
    if others.is_empty() {
        return Err(OracleFailure::NotEnoughVariants { count: 1 });
    }

    let reference_trial = run_variant(adapter, reference, program_path, input)?;
    if !reference_trial.status.is_success() || !reference_trial.stderr.is_empty() {
        return Err(OracleFailure::Divergence(DivergenceReport {
            reference: reference.name.clone(),
            variant: reference.name.clone(),
            program_path: program_path.to_path_buf(),
            kind: DivergenceKind::EngineFailure {
                status: reference_trial.status,
                stderr_prefix: reference_trial.stderr_prefix(STDERR_PREFIX_CHARS),
            },
        }));
    }

    for variant in others {
        let trial = run_variant(adapter, variant, program_path, input)?;
        let kind = if !trial.status.is_success() {
            Some(DivergenceKind::EngineFailure {
                status: trial.status,
                stderr_prefix: trial.stderr_prefix(STDERR_PREFIX_CHARS),
            })
        } else if !trial.stderr.is_empty() {
            Some(DivergenceKind::UnexpectedDiagnostic {
                stderr_prefix: trial.stderr_prefix(STDERR_PREFIX_CHARS),
            })
        } else if trial.stdout != reference_trial.stdout {
            Some(DivergenceKind::OutputMismatch {
                first_difference: first_difference(&reference_trial.stdout, &trial.stdout),
                reference_len: reference_trial.stdout.len(),
                variant_len: trial.stdout.len(),
            })
        } else {
            None
        };

        if let Some(kind) = kind {
            return Err(OracleFailure::Divergence(DivergenceReport {
                reference: reference.name.clone(),
                variant: variant.name.clone(),
                program_path: program_path.to_path_buf(),
                kind,
            }));
        }
    }

    Ok(())
}

fn run_variant(
    adapter: &dyn EngineAdapter,
    variant: &ExecutionVariant,
    program_path: &Path,
    input: &[u8],
) -> Result<TrialResult, OracleFailure> {
    adapter
        .run(variant, program_path, input)
        .map_err(|error| OracleFailure::Adapter { variant: variant.name.clone(), error })
}

fn first_difference(reference: &[u8], variant: &[u8]) -> usize {
    reference
        .iter()
        .zip(variant.iter())
        .position(|(a, b)| a != b)
        .unwrap_or_else(|| reference.len().min(variant.len()))
}

#[cfg(test)]
mod tests {
    use super::first_difference;

    #[test]
    fn first_difference_pinpoints_the_disagreeing_byte() {
        assert_eq!(first_difference(b"abcd", b"abXd"), 2);
        assert_eq!(first_difference(b"abc", b"abcd"), 3);
        assert_eq!(first_difference(b"", b"x"), 0);
    }
}
