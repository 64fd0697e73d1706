//! External processes the tracker talks to: the emotion predictor and the
//! lamp driver. Both are plain subprocesses with a narrow argument/exit-code
//! contract; anything richer lives on the other side of that boundary.

pub mod lamp;
pub mod predictor;

pub use lamp::{LampDriver, ProcessLamp};
pub use predictor::{parse_predictor_output, PredictedSample, Predictor, ProcessPredictor};

use std::path::PathBuf;
use std::process::Stdio;

use serde::{Deserialize, Serialize};
use tokio::process::Command;

use crate::errors::AffectError;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::log_debug;

/// Program plus fixed leading arguments. Per-call arguments are appended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CommandSpec {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|arg| arg.to_string()).collect(),
            working_dir: None,
        }
    }

    pub fn describe(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Runs `spec` with `extra_args` appended and returns its stdout.
///
/// A spawn failure or a non-zero exit is `CollaboratorUnavailable` no matter
/// what the process printed.
pub(crate) async fn run_collaborator(
    collaborator: &'static str,
    spec: &CommandSpec,
    extra_args: &[String],
) -> Result<String, AffectError> {
    let mut command = Command::new(&spec.program);
    command
        .args(&spec.args)
        .args(extra_args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = &spec.working_dir {
        command.current_dir(dir);
    }

    log_debug!("running {collaborator}: {} {}", spec.describe(), extra_args.join(" "));

    let output = command
        .output()
        .await
        .map_err(|err| AffectError::unavailable(collaborator, format!("failed to spawn '{}': {err}", spec.program)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let detail = match stderr.trim() {
            "" => format!("exited with {}", output.status),
            text => format!("exited with {}: {}", output.status, last_line(text)),
        };
        return Err(AffectError::unavailable(collaborator, detail));
    }

    String::from_utf8(output.stdout)
        .map_err(|_| AffectError::malformed(collaborator, "output is not valid UTF-8"))
}

fn last_line(text: &str) -> &str {
    text.lines().last().unwrap_or(text)
}
