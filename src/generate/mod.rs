//! Generation of replacement documentation through an external tool.
//!
//! [`Generate`] is the seam between the run and whatever produces text:
//! [`CliBackend`] spawns a command-line assistant, tests plug in scripted
//! fakes. [`GenerationClient`] owns prompt building, reply parsing and the
//! retry policy on top of any backend.

mod backend;
mod process;
mod prompt;

pub use backend::{Backend, CliBackend};
pub use process::{run_supervised, ProcessOutput, Supervision};
pub use prompt::{indentation_for, PromptBuilder, Template};

use crate::config::{FormattingConfig, GenerationConfig};
use crate::model::DocumentationRecord;
use regex::Regex;
use std::future::Future;
use std::sync::LazyLock;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

static CONTENT_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```reStructuredText\s*\n(.*?)\n```").unwrap());
static EXPLANATION_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```text\s*\n(.*?)\n```").unwrap());

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("failed to start `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("i/o error while supervising `{program}`: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{program}` timed out after {after:?}")]
    Timeout { program: String, after: Duration },

    #[error("`{program}` exited with {}: {stderr}", exit_description(*.code))]
    Exit {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("reply has no reStructuredText block: {preview:?}")]
    MissingContent { preview: String },

    #[error("`{program}` is not available: {reason}")]
    Unavailable { program: String, reason: String },

    #[error("gave up after {attempts} attempts: {source}")]
    Exhausted {
        attempts: u32,
        #[source]
        source: Box<GenerationError>,
    },
}

fn exit_description(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "a signal".to_string(),
    }
}

/// Something that turns a prompt into a raw reply.
pub trait Generate: Send + Sync {
    fn name(&self) -> &str;

    fn generate(&self, prompt: &str) -> impl Future<Output = Result<String, GenerationError>> + Send;
}

/// Parsed reply for one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub content: String,
    pub explanation: String,
    pub attempts: u32,
}

/// Split a raw reply into its content and explanation blocks.
pub fn parse_reply(raw: &str) -> Result<(String, String), GenerationError> {
    let content = CONTENT_BLOCK
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .ok_or_else(|| GenerationError::MissingContent {
            preview: raw.chars().take(200).collect(),
        })?;
    let explanation = EXPLANATION_BLOCK
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default();
    Ok((content, explanation))
}

pub struct GenerationClient<G> {
    backend: G,
    config: GenerationConfig,
    prompts: PromptBuilder,
}

impl<G: Generate> GenerationClient<G> {
    pub fn new(backend: G, config: GenerationConfig, formatting: &FormattingConfig) -> Self {
        let prompts = PromptBuilder::new(formatting, config.preamble.as_deref());
        Self {
            backend,
            config,
            prompts,
        }
    }

    pub fn backend(&self) -> &G {
        &self.backend
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    /// Ask the backend for improved text, retrying transport and parse
    /// failures with exponential backoff.
    pub async fn improve(&self, record: &DocumentationRecord) -> Result<Reply, GenerationError> {
        let prompt = self.prompts.render(record);
        let target = record.qualified_name();
        debug!(target = %target, length = prompt.len(), "prompt built");

        let mut attempt: u32 = 0;
        loop {
            let result = self
                .backend
                .generate(&prompt)
                .await
                .and_then(|raw| parse_reply(&raw));

            match result {
                Ok((content, explanation)) => {
                    if attempt > 0 {
                        info!(target = %target, attempt, "succeeded on retry");
                    }
                    return Ok(Reply {
                        content,
                        explanation,
                        attempts: attempt + 1,
                    });
                }
                Err(error) if attempt < self.config.max_retries => {
                    attempt += 1;
                    let delay = self.config.retry_delay(attempt);
                    warn!(
                        target = %target,
                        backend = self.backend.name(),
                        attempt,
                        delay = ?delay,
                        error = %error,
                        "generation failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(error) => {
                    return Err(GenerationError::Exhausted {
                        attempts: attempt + 1,
                        source: Box::new(error),
                    })
                }
            }
        }
    }
}
