use serde::Deserialize;
use std::fmt;
use std::time::Duration;

/// Settings for a processing run, loaded from `docstring-patcher.toml`.
///
/// Every table and field is optional; omitted values take the defaults below.
#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    pub generation: GenerationConfig,
    pub formatting: FormattingConfig,
    pub context: ContextConfig,
    pub exports: ExportsConfig,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct GenerationConfig {
    /// Wall-clock limit for one backend invocation.
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_delay_secs: f64,
    pub backoff_factor: f64,
    /// Wait after each termination request before escalating.
    pub kill_grace_secs: u64,
    /// Replaces the built-in instruction preamble of every prompt.
    pub preamble: Option<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 180,
            max_retries: 4,
            retry_delay_secs: 5.0,
            backoff_factor: 3.0,
            kill_grace_secs: 5,
            preamble: None,
        }
    }
}

impl GenerationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn kill_grace(&self) -> Duration {
        Duration::from_secs(self.kill_grace_secs)
    }

    /// Delay before retry number `retry` (1-based).
    pub fn retry_delay(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1) as i32;
        let secs = self.retry_delay_secs * self.backoff_factor.powi(exponent);
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }

    /// Upper bound for one record: every attempt plus every backoff delay.
    pub fn record_timeout(&self) -> Duration {
        let attempts = self.timeout().saturating_mul(self.max_retries.saturating_add(1));
        (1..=self.max_retries)
            .map(|retry| self.retry_delay(retry))
            .fold(attempts, Duration::saturating_add)
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FormattingConfig {
    pub line_length: usize,
    /// One indentation level, used to estimate nesting depth in prompts.
    pub indentation: String,
    /// Content shorter than this stays on the delimiter line.
    pub single_line_threshold: usize,
}

impl Default for FormattingConfig {
    fn default() -> Self {
        Self {
            line_length: 79,
            indentation: "    ".to_string(),
            single_line_threshold: 60,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ContextConfig {
    /// Leading lines scanned for module context.
    pub module_context_lines: usize,
    /// Cap on non-import lines collected for module context.
    pub max_context_lines: usize,
    pub class_before: usize,
    pub class_after: usize,
    pub function_before: usize,
    pub function_after: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            module_context_lines: 20,
            max_context_lines: 10,
            class_before: 5,
            class_after: 10,
            function_before: 3,
            function_after: 5,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ExportsConfig {
    /// Maximum number of other lines between two sections of one group.
    pub group_gap_threshold: usize,
    pub file_pattern: String,
}

impl Default for ExportsConfig {
    fn default() -> Self {
        Self {
            group_gap_threshold: 5,
            file_pattern: "**/__init__.py".to_string(),
        }
    }
}

impl ProcessingConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        let generation = &self.generation;
        if generation.timeout_secs == 0 {
            issues.push(ValidationIssue::NonPositive {
                field: "generation.timeout_secs",
            });
        }
        if !(generation.retry_delay_secs.is_finite() && generation.retry_delay_secs >= 0.0) {
            issues.push(ValidationIssue::InvalidValue {
                field: "generation.retry_delay_secs",
                message: "must be a finite, non-negative number of seconds".to_string(),
            });
        }
        if !(generation.backoff_factor.is_finite() && generation.backoff_factor >= 1.0) {
            issues.push(ValidationIssue::InvalidValue {
                field: "generation.backoff_factor",
                message: "must be at least 1.0".to_string(),
            });
        }
        if generation
            .preamble
            .as_deref()
            .is_some_and(|preamble| preamble.trim().is_empty())
        {
            issues.push(ValidationIssue::InvalidValue {
                field: "generation.preamble",
                message: "must not be blank when set".to_string(),
            });
        }

        let formatting = &self.formatting;
        if formatting.line_length == 0 {
            issues.push(ValidationIssue::NonPositive {
                field: "formatting.line_length",
            });
        }
        if formatting.indentation.is_empty()
            || !formatting.indentation.chars().all(|c| c == ' ' || c == '\t')
        {
            issues.push(ValidationIssue::InvalidValue {
                field: "formatting.indentation",
                message: "must be one or more spaces or tabs".to_string(),
            });
        }
        if formatting.single_line_threshold >= formatting.line_length {
            issues.push(ValidationIssue::InvalidValue {
                field: "formatting.single_line_threshold",
                message: format!(
                    "must be smaller than formatting.line_length ({})",
                    formatting.line_length
                ),
            });
        }

        if self.context.max_context_lines == 0 {
            issues.push(ValidationIssue::NonPositive {
                field: "context.max_context_lines",
            });
        }

        if self.exports.file_pattern.trim().is_empty() {
            issues.push(ValidationIssue::InvalidValue {
                field: "exports.file_pattern",
                message: "must not be empty".to_string(),
            });
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone, PartialEq)]
pub enum ValidationIssue {
    NonPositive {
        field: &'static str,
    },
    InvalidValue {
        field: &'static str,
        message: String,
    },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::NonPositive { field } => write!(f, "'{field}' must be positive"),
            ValidationIssue::InvalidValue { field, message } => write!(f, "'{field}' {message}"),
        }
    }
}
