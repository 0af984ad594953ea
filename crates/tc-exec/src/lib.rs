#![forbid(unsafe_code)]

//! The boundary between the harness and the black-box engines: execution
//! variants, captured trial results, the adapter seam, and the child-process
//! adapter that actually runs an engine binary.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tc_core::Program;

/// Default bound on one engine invocation. A hung engine becomes an
/// `AdapterError::TimedOut` instead of hanging the whole harness.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(2);

/// One way of executing a program: a display name plus the engine's
/// mode-selecting flag value. Variants are harness configuration data, never
/// generated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionVariant {
    pub name: String,
    pub mode_flag: String,
}

impl ExecutionVariant {
    #[must_use]
    pub fn new(name: &str, mode_flag: &str) -> Self {
        Self { name: name.to_owned(), mode_flag: mode_flag.to_owned() }
    }

    /// The engine's command-line form, e.g. `--mode=jit`.
    #[must_use]
    pub fn mode_argument(&self) -> String {
        format!("--mode={}", self.mode_flag)
    }
}

impl fmt::Display for ExecutionVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// The three canonical variants, interpreter first: every downstream
/// comparison and ratio is taken against the head of the list.
#[must_use]
pub fn default_variants() -> Vec<ExecutionVariant> {
    vec![
        ExecutionVariant::new("interpreter", "i"),
        ExecutionVariant::new("compile-and-run", "cag"),
        ExecutionVariant::new("jit", "jit"),
    ]
}

/// Exit taxonomy for one engine invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TrialStatus {
    Success,
    Failure { code: i32 },
    Signaled,
}

impl TrialStatus {
    #[must_use]
    pub fn from_exit_status(status: ExitStatus) -> Self {
        match status.code() {
            Some(0) => Self::Success,
            Some(code) => Self::Failure { code },
            None => Self::Signaled,
        }
    }

    #[must_use]
    pub fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

impl fmt::Display for TrialStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "exit 0"),
            Self::Failure { code } => write!(f, "exit {code}"),
            Self::Signaled => write!(f, "killed by signal"),
        }
    }
}

/// Captured outcome of one (variant, program, input) invocation. Consumed by
/// the oracle or timer and discarded; never outlives its trial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrialResult {
    pub status: TrialStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl TrialResult {
    /// First line of the diagnostic stream, lossily decoded and truncated,
    /// for report embedding.
    #[must_use]
    pub fn stderr_prefix(&self, max_chars: usize) -> String {
        let text = String::from_utf8_lossy(&self.stderr);
        let line = text.lines().next().unwrap_or("");
        line.chars().take(max_chars).collect()
    }
}

/// A failure in the harness-to-engine plumbing, as opposed to a divergence
/// between engines.
#[derive(Debug)]
pub enum AdapterError {
    Spawn { executable: PathBuf, source: std::io::Error },
    Io { source: std::io::Error },
    TimedOut { variant: String, limit: Duration },
}

impl fmt::Display for AdapterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spawn { executable, source } => {
                write!(f, "failed to spawn engine {}: {source}", executable.display())
            }
            Self::Io { source } => write!(f, "engine i/o failed: {source}"),
            Self::TimedOut { variant, limit } => {
                write!(f, "variant {variant} exceeded the {}ms limit", limit.as_millis())
            }
        }
    }
}

impl std::error::Error for AdapterError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Spawn { source, .. } | Self::Io { source } => Some(source),
            Self::TimedOut { .. } => None,
        }
    }
}

/// The seam between the harness and an engine. The oracle, fuzz loop, and
/// benchmark timer only ever talk to this trait; tests substitute scripted
/// implementations.
pub trait EngineAdapter {
    fn run(
        &self,
        variant: &ExecutionVariant,
        program_path: &Path,
        input: &[u8],
    ) -> Result<TrialResult, AdapterError>;
}

/// Runs a real engine binary as a child process with piped stdio.
///
/// Invocation protocol: `<engine> --mode=<flag> <program-path>`, input on
/// stdin, program output on stdout, diagnostics on stderr, exit 0 on
/// success. Invocations are strictly sequential; the adapter never runs two
/// children at once.
#[derive(Debug, Clone)]
pub struct ProcessAdapter {
    executable: PathBuf,
    timeout: Option<Duration>,
}

impl ProcessAdapter {
    #[must_use]
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self { executable: executable.into(), timeout: Some(DEFAULT_TIMEOUT) }
    }

    /// Override the invocation bound. `None` restores unbounded blocking.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn executable(&self) -> &Path {
        &self.executable
    }

    fn wait_with_deadline(&self, child: &mut Child) -> Result<Option<ExitStatus>, AdapterError> {
        let Some(limit) = self.timeout else {
            return child.wait().map(Some).map_err(|source| AdapterError::Io { source });
        };
        let deadline = Instant::now() + limit;
        loop {
            if let Some(status) = child.try_wait().map_err(|source| AdapterError::Io { source })? {
                return Ok(Some(status));
            }
            if Instant::now() >= deadline {
                // Kill may race a natural exit; either way the child is gone.
                let _ = child.kill();
                let _ = child.wait();
                return Ok(None);
            }
            std::thread::sleep(WAIT_POLL_INTERVAL);
        }
    }
}

impl EngineAdapter for ProcessAdapter {
    fn run(
        &self,
        variant: &ExecutionVariant,
        program_path: &Path,
        input: &[u8],
    ) -> Result<TrialResult, AdapterError> {
        let mut child = Command::new(&self.executable)
            .arg(variant.mode_argument())
            .arg(program_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| AdapterError::Spawn {
                executable: self.executable.clone(),
                source,
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            match stdin.write_all(input) {
                // The engine may exit without draining stdin; that is not a
                // harness failure.
                Err(err) if err.kind() == std::io::ErrorKind::BrokenPipe => {}
                other => other.map_err(|source| AdapterError::Io { source })?,
            }
            // Dropping stdin closes the pipe so the child sees end-of-input.
        }

        // Both streams are drained off-thread so a chatty child cannot
        // deadlock against a full pipe while we wait on it.
        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();
        let stdout_reader = std::thread::spawn(move || drain(stdout_pipe));
        let stderr_reader = std::thread::spawn(move || drain(stderr_pipe));

        let status = self.wait_with_deadline(&mut child)?;
        let stdout = join_reader(stdout_reader)?;
        let stderr = join_reader(stderr_reader)?;

        match status {
            Some(status) => Ok(TrialResult {
                status: TrialStatus::from_exit_status(status),
                stdout,
                stderr,
            }),
            None => Err(AdapterError::TimedOut {
                variant: variant.name.clone(),
                limit: self.timeout.unwrap_or(DEFAULT_TIMEOUT),
            }),
        }
    }
}

fn drain<R: Read>(pipe: Option<R>) -> std::io::Result<Vec<u8>> {
    let mut bytes = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut bytes)?;
    }
    Ok(bytes)
}

fn join_reader(
    reader: std::thread::JoinHandle<std::io::Result<Vec<u8>>>,
) -> Result<Vec<u8>, AdapterError> {
    match reader.join() {
        Ok(result) => result.map_err(|source| AdapterError::Io { source }),
        Err(_) => Err(AdapterError::Io {
            source: std::io::Error::other("stream reader thread panicked"),
        }),
    }
}

/// A program written to ephemeral storage in its wire form so the external
/// engines can read it. Storage is released on drop unless `keep` is called.
#[derive(Debug)]
pub struct PersistedProgram {
    file: tempfile::NamedTempFile,
}

impl PersistedProgram {
    pub fn write(program: &Program) -> Result<Self, AdapterError> {
        let mut file = tempfile::Builder::new()
            .prefix("tapecheck-")
            .suffix(".b")
            .tempfile()
            .map_err(|source| AdapterError::Io { source })?;
        file.write_all(&program.as_bytes())
            .map_err(|source| AdapterError::Io { source })?;
        file.flush().map_err(|source| AdapterError::Io { source })?;
        Ok(Self { file })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Persist the file past this value's lifetime, e.g. so a divergence
    /// report can point at a reproducible artifact. Returns the final path.
    pub fn keep(self) -> Result<PathBuf, AdapterError> {
        let (_, path) = self
            .file
            .keep()
            .map_err(|err| AdapterError::Io { source: err.error })?;
        Ok(path)
    }
}
