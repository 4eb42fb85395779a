//! Bounded execution of short-lived tool invocations (probes).
//!
//! Long-running transcodes go through [`crate::export`] instead, which
//! streams progress and supports cancellation.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use cropaway_common::error::{CropawayError, CropawayResult};
use tokio::process::Command;

/// Default timeout for probe-style invocations.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Lines of diagnostic output kept for error messages.
pub const STDERR_TAIL_LINES: usize = 20;

/// Output captured from a tool run.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

/// Builder for a single tool invocation with a timeout.
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl ToolCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn arg(&mut self, s: impl Into<String>) -> &mut Self {
        self.args.push(s.into());
        self
    }

    pub fn args(&mut self, iter: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.args.extend(iter.into_iter().map(Into::into));
        self
    }

    pub fn timeout(&mut self, d: Duration) -> &mut Self {
        self.timeout = d;
        self
    }

    /// Run to completion, capturing output.
    ///
    /// A missing binary is a resource error, an overrun is a timeout (the
    /// child is killed), and a non-zero exit is a transcoder error carrying
    /// the diagnostic tail.
    pub async fn execute(&self) -> CropawayResult<ToolOutput> {
        let program_name = program_name(&self.program);

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|e| {
            CropawayError::resource(format!("Failed to start {program_name}: {e}"))
        })?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_elapsed) => {
                return Err(CropawayError::timeout(format!(
                    "{program_name} did not finish within {:?}",
                    self.timeout
                )))
            }
        };

        let tool_output = ToolOutput {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };

        if !output.status.success() {
            return Err(CropawayError::transcoder(
                output.status.code(),
                tail_lines(&tool_output.stderr, STDERR_TAIL_LINES),
            ));
        }

        Ok(tool_output)
    }
}

/// The last `n` non-empty lines of `text`.
pub fn tail_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}

/// Resolve a tool path: absolute/relative paths must exist, bare names are
/// looked up on `PATH`.
pub fn resolve_tool(program: &Path) -> CropawayResult<PathBuf> {
    if program.components().count() > 1 {
        if program.exists() {
            return Ok(program.to_path_buf());
        }
        return Err(CropawayError::resource(format!(
            "Tool not found: {}",
            program.display()
        )));
    }
    which::which(program).map_err(|_| {
        CropawayError::resource(format!(
            "{} not found in PATH",
            program.display()
        ))
    })
}

fn program_name(program: &Path) -> String {
    program
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| program.to_string_lossy().to_string())
}
