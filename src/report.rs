//! Aggregation and rendering of run results.

use crate::model::DocKind;
use colored::Colorize;
use serde::Serialize;
use similar::{ChangeTag, TextDiff};
use std::fmt::Write as _;
use std::path::PathBuf;

/// Unchanged records are listed individually only up to this many.
const UNCHANGED_LISTING_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum Outcome {
    Improved,
    Unchanged,
    Failed { reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct RecordReport {
    pub name: String,
    pub kind: DocKind,
    pub line: usize,
    #[serde(flatten)]
    pub outcome: Outcome,
    /// `None` in dry runs and when nothing was written.
    pub file_operation: Option<bool>,
    pub attempts: u32,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub explanation: String,
    #[serde(skip)]
    pub change: Option<BlockChange>,
}

/// Region text before and after an improvement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockChange {
    pub before: String,
    pub after: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub path: PathBuf,
    pub records: Vec<RecordReport>,
    /// File-level failure, e.g. a syntax error; `records` is empty then.
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub dry_run: bool,
    pub tool: String,
    pub cancelled: bool,
    pub files: Vec<FileReport>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub files_processed: usize,
    pub file_errors: usize,
    pub records_found: usize,
    pub improved: usize,
    pub failed: usize,
    pub unchanged: usize,
}

impl RunSummary {
    pub fn errors(&self) -> usize {
        self.file_errors + self.failed
    }
}

impl RunReport {
    pub fn summary(&self) -> RunSummary {
        self.files.iter().fold(RunSummary::default(), |mut summary, file| {
            summary.files_processed += 1;
            if file.error.is_some() {
                summary.file_errors += 1;
            }
            for record in &file.records {
                summary.records_found += 1;
                match record.outcome {
                    Outcome::Improved => summary.improved += 1,
                    Outcome::Unchanged => summary.unchanged += 1,
                    Outcome::Failed { .. } => summary.failed += 1,
                }
            }
            summary
        })
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        #[derive(Serialize)]
        struct Document<'a> {
            summary: RunSummary,
            #[serde(flatten)]
            report: &'a RunReport,
        }
        serde_json::to_string_pretty(&Document {
            summary: self.summary(),
            report: self,
        })
    }

    /// Human-readable summary, optionally with a diff per improvement.
    pub fn render(&self, with_diff: bool) -> String {
        let mut out = String::new();
        let summary = self.summary();
        let rule = "=".repeat(79);

        let mut improved = Vec::new();
        let mut failed = Vec::new();
        let mut unchanged = Vec::new();
        for file in &self.files {
            if let Some(error) = &file.error {
                let _ = writeln!(out, "{} {}: {}", "✗".red(), file.path.display(), error);
            }
            for record in &file.records {
                let entry = (file, record);
                match &record.outcome {
                    Outcome::Improved => improved.push(entry),
                    Outcome::Unchanged => unchanged.push(entry),
                    Outcome::Failed { .. } => failed.push(entry),
                }
            }
        }

        let _ = writeln!(out, "\n{rule}\n{}\n{rule}", "DOCSTRING PROCESSING SUMMARY".bold());

        if !improved.is_empty() {
            let _ = writeln!(out, "\n{} ({} records):", "Improved".green().bold(), improved.len());
            for (file, record) in &improved {
                let status = match (self.dry_run, record.file_operation) {
                    (false, Some(true)) => format!(" ({})", "applied".green()),
                    (false, Some(false)) => format!(" ({})", "failed to apply".red()),
                    _ => String::new(),
                };
                let _ = writeln!(
                    out,
                    "  {} '{}' in {}:{}{}",
                    record.kind,
                    record.name,
                    file.path.display(),
                    record.line,
                    status
                );
                if with_diff {
                    if let Some(change) = &record.change {
                        out.push_str(&unified_diff(&change.before, &change.after));
                    }
                }
            }
        }

        if !failed.is_empty() {
            let _ = writeln!(out, "\n{} ({} records):", "Failed".red().bold(), failed.len());
            for (file, record) in &failed {
                let reason = match &record.outcome {
                    Outcome::Failed { reason } => reason.as_str(),
                    _ => "",
                };
                let _ = writeln!(
                    out,
                    "  {} '{}' in {}:{} - {}",
                    record.kind,
                    record.name,
                    file.path.display(),
                    record.line,
                    reason
                );
            }
        }

        if !unchanged.is_empty() {
            if unchanged.len() <= UNCHANGED_LISTING_LIMIT {
                let _ = writeln!(out, "\n{} ({} records):", "Unchanged".dimmed(), unchanged.len());
                for (file, record) in &unchanged {
                    let _ = writeln!(
                        out,
                        "  {} '{}' in {}:{}",
                        record.kind,
                        record.name,
                        file.path.display(),
                        record.line
                    );
                }
            } else {
                let _ = writeln!(out, "\n{}: {} records", "Unchanged".dimmed(), unchanged.len());
            }
        }

        let _ = writeln!(
            out,
            "\n{rule}\nfiles: {}  found: {}  improved: {}  failed: {}  unchanged: {}",
            summary.files_processed, summary.records_found, summary.improved, summary.errors(), summary.unchanged
        );

        let closing = if self.cancelled {
            "Run interrupted; in-flight writes were completed.".yellow().to_string()
        } else if self.dry_run {
            "Dry run: no files were modified. Remove --dry-run to apply changes.".to_string()
        } else if summary.improved > 0 && summary.errors() == 0 {
            "Changes applied.".green().to_string()
        } else if summary.improved > 0 {
            format!("Completed with {} errors; some changes were applied.", summary.errors())
        } else if summary.errors() > 0 {
            format!("Completed with {} errors; no changes were applied.", summary.errors())
        } else {
            "No changes were needed.".to_string()
        };
        let _ = writeln!(out, "{closing}");
        out
    }
}

/// Coloured unified diff between two blocks.
pub fn unified_diff(before: &str, after: &str) -> String {
    let diff = TextDiff::from_lines(before, after);
    let mut out = String::new();
    for change in diff.iter_all_changes() {
        let line = match change.tag() {
            ChangeTag::Delete => format!("-{change}").red().to_string(),
            ChangeTag::Insert => format!("+{change}").green().to_string(),
            ChangeTag::Equal => format!(" {change}"),
        };
        out.push_str(&line);
        if change.missing_newline() {
            out.push('\n');
        }
    }
    out
}
