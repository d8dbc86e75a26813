use super::process::run_supervised;
use super::{Generate, GenerationError};
use crate::config::GenerationConfig;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Supported command-line assistants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Claude,
    Gemini,
}

impl Backend {
    pub fn program(self) -> &'static str {
        match self {
            Backend::Claude => "claude",
            Backend::Gemini => "gemini",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.program())
    }
}

/// Runs `<program> -p <prompt>` and returns its stdout.
#[derive(Debug, Clone)]
pub struct CliBackend {
    program: PathBuf,
    name: String,
    timeout: Duration,
    grace: Duration,
}

impl CliBackend {
    pub fn new(backend: Backend, config: &GenerationConfig) -> Self {
        Self::with_program(backend.program(), config.timeout(), config.kill_grace())
    }

    pub fn with_program(program: impl Into<PathBuf>, timeout: Duration, grace: Duration) -> Self {
        let program = program.into();
        let name = program
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| program.display().to_string());
        Self {
            program,
            name,
            timeout,
            grace,
        }
    }

    /// Check that `<program> --version` runs and exits successfully.
    pub async fn probe(&self) -> Result<String, GenerationError> {
        let mut command = Command::new(&self.program);
        command.arg("--version");
        let output = run_supervised(command, self.timeout, self.grace)
            .await
            .map_err(|error| self.unavailable(error.to_string()))?;
        if !output.status.success() {
            return Err(self.unavailable(format!("--version exited with {}", output.status)));
        }
        Ok(output.stdout.trim().to_string())
    }

    fn unavailable(&self, reason: String) -> GenerationError {
        GenerationError::Unavailable {
            program: self.name.clone(),
            reason,
        }
    }
}

impl Generate for CliBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let mut command = Command::new(&self.program);
        command.arg("-p").arg(prompt);

        let output = run_supervised(command, self.timeout, self.grace).await?;
        debug!(
            program = %self.name,
            stdout_len = output.stdout.len(),
            stderr_len = output.stderr.len(),
            "backend finished"
        );
        if !output.status.success() {
            return Err(GenerationError::Exit {
                program: self.name.clone(),
                code: output.status.code(),
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(output.stdout)
    }
}
