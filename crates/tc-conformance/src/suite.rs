//! Known-program conformance cases, run identically against every variant.
//! Variant behavior is data here — one parameterized runner, no per-variant
//! fixtures.

use crate::STDERR_PREFIX_CHARS;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use tc_exec::{AdapterError, EngineAdapter, ExecutionVariant, TrialStatus};

/// The canonical Hello World program; prints `Hello World!\n`.
pub const HELLO_PROGRAM: &[u8] =
    b"++++++++[>++++[>++>+++>+++>+<<<<-]>+>+>->>+[<]<-]>>.>---.+++++++..+++.>>.<-.<.+++.------.--------.>>+.>++.";

/// Echoes stdin until end-of-input.
pub const CAT_PROGRAM: &[u8] = b",[.,]";

/// A deliberately unmatched loop open; every engine must reject it.
pub const UNBALANCED_PROGRAM: &[u8] = b"[++";

/// What a case demands from every variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expectation {
    /// Exit 0, empty stderr, exactly these stdout bytes.
    Output(Vec<u8>),
    /// Exit 1, empty stdout, stderr containing this fragment.
    ErrorContains(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuiteCase {
    pub name: &'static str,
    pub program: &'static [u8],
    pub stdin: &'static [u8],
    pub expectation: Expectation,
}

/// The cases every conforming engine family must pass.
#[must_use]
pub fn default_cases() -> Vec<SuiteCase> {
    vec![
        SuiteCase {
            name: "hello",
            program: HELLO_PROGRAM,
            stdin: b"",
            expectation: Expectation::Output(b"Hello World!\n".to_vec()),
        },
        SuiteCase {
            name: "cat",
            program: CAT_PROGRAM,
            stdin: b"This should be echoed!",
            expectation: Expectation::Output(b"This should be echoed!".to_vec()),
        },
        SuiteCase {
            name: "empty",
            program: b"",
            stdin: b"",
            expectation: Expectation::Output(Vec::new()),
        },
        SuiteCase {
            name: "unbalanced",
            program: UNBALANCED_PROGRAM,
            stdin: b"",
            expectation: Expectation::ErrorContains(
                "Unable to find loop end in block starting with: [++".to_owned(),
            ),
        },
    ]
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteCaseReport {
    pub case: String,
    pub variant: String,
    pub passed: bool,
    /// Present only on failure: what was expected vs. observed.
    pub detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteReport {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub cases: Vec<SuiteCaseReport>,
}

#[derive(Debug)]
pub enum SuiteError {
    Storage(AdapterError),
    Adapter { variant: String, error: AdapterError },
}

impl fmt::Display for SuiteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Storage(err) => write!(f, "program storage failed: {err}"),
            Self::Adapter { variant, error } => {
                write!(f, "adapter failure on variant {variant}: {error}")
            }
        }
    }
}

impl std::error::Error for SuiteError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Storage(err) | Self::Adapter { error: err, .. } => Some(err),
        }
    }
}

/// Run every case against every variant through the same adapter.
pub fn run_suite(
    adapter: &dyn EngineAdapter,
    variants: &[ExecutionVariant],
    cases: &[SuiteCase],
) -> Result<SuiteReport, SuiteError> {
    let mut reports = Vec::with_capacity(cases.len() * variants.len());
    for case in cases {
        let persisted = persist_bytes(case.program)?;
        for variant in variants {
            let trial = adapter
                .run(variant, persisted.path(), case.stdin)
                .map_err(|error| SuiteError::Adapter { variant: variant.name.clone(), error })?;
            let detail = evaluate(&case.expectation, &trial);
            reports.push(SuiteCaseReport {
                case: case.name.to_owned(),
                variant: variant.name.clone(),
                passed: detail.is_none(),
                detail,
            });
        }
    }

    let passed = reports.iter().filter(|report| report.passed).count();
    Ok(SuiteReport {
        total: reports.len(),
        passed,
        failed: reports.len() - passed,
        cases: reports,
    })
}

/// Suite programs may intentionally be malformed, so they bypass
/// `Program::from_bytes` and go to disk verbatim.
fn persist_bytes(program: &[u8]) -> Result<tempfile::NamedTempFile, SuiteError> {
    let mut file = tempfile::Builder::new()
        .prefix("tapecheck-suite-")
        .suffix(".b")
        .tempfile()
        .map_err(|source| SuiteError::Storage(AdapterError::Io { source }))?;
    file.write_all(program)
        .map_err(|source| SuiteError::Storage(AdapterError::Io { source }))?;
    file.flush()
        .map_err(|source| SuiteError::Storage(AdapterError::Io { source }))?;
    Ok(file)
}

/// `None` when the trial meets the expectation, otherwise a description of
/// the mismatch.
fn evaluate(expectation: &Expectation, trial: &tc_exec::TrialResult) -> Option<String> {
    match expectation {
        Expectation::Output(expected) => {
            if !trial.status.is_success() {
                return Some(format!(
                    "expected success, got {}: {}",
                    trial.status,
                    trial.stderr_prefix(STDERR_PREFIX_CHARS)
                ));
            }
            if !trial.stderr.is_empty() {
                return Some(format!(
                    "expected empty diagnostics, got: {}",
                    trial.stderr_prefix(STDERR_PREFIX_CHARS)
                ));
            }
            if trial.stdout != *expected {
                return Some(format!(
                    "output mismatch: expected {:?}, got {:?}",
                    String::from_utf8_lossy(expected),
                    String::from_utf8_lossy(&trial.stdout)
                ));
            }
            None
        }
        Expectation::ErrorContains(fragment) => {
            if trial.status != (TrialStatus::Failure { code: 1 }) {
                return Some(format!("expected exit 1, got {}", trial.status));
            }
            if !trial.stdout.is_empty() {
                return Some(format!(
                    "expected empty output, got {} bytes",
                    trial.stdout.len()
                ));
            }
            let stderr = String::from_utf8_lossy(&trial.stderr);
            if !stderr.contains(fragment) {
                return Some(format!(
                    "diagnostic {:?} does not mention {:?}",
                    trial.stderr_prefix(STDERR_PREFIX_CHARS),
                    fragment
                ));
            }
            None
        }
    }
}
