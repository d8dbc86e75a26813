//! Concurrent docstring processing over many files.
//!
//! Every file and every record within it is a future; all of them are
//! driven together and share one semaphore that bounds how many backend
//! invocations run at once. Writes to one file are serialised by a per-file
//! lock and run to completion even after cancellation.

use crate::edit::EditResult;
use crate::extract::ContentExtractor;
use crate::format::TextFormatter;
use crate::generate::{Generate, GenerationClient, GenerationError};
use crate::model::DocumentationRecord;
use crate::report::{BlockChange, FileReport, Outcome, RecordReport, RunReport};
use crate::rewrite::{plan_replacement, replace_docstring, RewriteError};
use crate::writer::AtomicWriter;
use futures::future::join_all;
use globset::GlobMatcher;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub dry_run: bool,
    /// Concurrent backend invocations.
    pub parallel: usize,
    /// Only records whose name matches are processed.
    pub object_pattern: Option<GlobMatcher>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            parallel: 4,
            object_pattern: None,
        }
    }
}

pub struct Orchestrator<G> {
    client: Arc<GenerationClient<G>>,
    extractor: ContentExtractor,
    writer: AtomicWriter,
    formatter: TextFormatter,
    semaphore: Arc<Semaphore>,
    cancel: CancellationToken,
    options: RunOptions,
}

enum Generated {
    Text { content: String, explanation: String, attempts: u32 },
    Failed(String),
}

impl<G: Generate> Orchestrator<G> {
    pub fn new(
        client: GenerationClient<G>,
        extractor: ContentExtractor,
        writer: AtomicWriter,
        formatter: TextFormatter,
        options: RunOptions,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            client: Arc::new(client),
            extractor,
            writer,
            formatter,
            semaphore: Arc::new(Semaphore::new(options.parallel.max(1))),
            cancel,
            options,
        }
    }

    /// Process `files` and collect one report per file, in input order.
    pub async fn run(&self, files: &[PathBuf]) -> RunReport {
        info!(
            files = files.len(),
            parallel = self.options.parallel,
            dry_run = self.options.dry_run,
            "processing files"
        );
        let reports = join_all(files.iter().map(|path| self.process_file(path))).await;
        RunReport {
            dry_run: self.options.dry_run,
            tool: self.client.backend().name().to_string(),
            cancelled: self.cancel.is_cancelled(),
            files: reports,
        }
    }

    #[instrument(skip_all, fields(path = %path.display()))]
    async fn process_file(&self, path: &Path) -> FileReport {
        let records = match self.extract(path).await {
            Ok(records) => records,
            Err(error) => {
                return FileReport {
                    path: path.to_path_buf(),
                    records: Vec::new(),
                    error: Some(error),
                }
            }
        };

        let found = records.len();
        let records: Vec<DocumentationRecord> = match &self.options.object_pattern {
            Some(pattern) => records
                .into_iter()
                .filter(|record| pattern.is_match(&record.name))
                .collect(),
            None => records,
        };
        if self.options.object_pattern.is_some() {
            info!(matched = records.len(), found, "applied object pattern");
        }

        let lock = Arc::new(Mutex::new(()));
        let reports = join_all(
            records
                .iter()
                .map(|record| self.process_record(path, record, Arc::clone(&lock))),
        )
        .await;

        debug!(records = reports.len(), "file complete");
        FileReport {
            path: path.to_path_buf(),
            records: reports,
            error: None,
        }
    }

    #[instrument(skip_all, fields(record = %record.qualified_name(), kind = %record.kind))]
    async fn process_record(
        &self,
        path: &Path,
        record: &DocumentationRecord,
        lock: Arc<Mutex<()>>,
    ) -> RecordReport {
        let mut report = RecordReport {
            name: record.name.clone(),
            kind: record.kind,
            line: record.line,
            outcome: Outcome::Unchanged,
            file_operation: None,
            attempts: 0,
            explanation: String::new(),
            change: None,
        };

        let (content, explanation, attempts) = match self.generate(record).await {
            Generated::Text {
                content,
                explanation,
                attempts,
            } => (content, explanation, attempts),
            Generated::Failed(reason) => {
                report.outcome = Outcome::Failed { reason };
                return report;
            }
        };
        report.attempts = attempts;
        report.explanation = explanation;

        if content == record.content {
            debug!("content unchanged");
            return report;
        }

        // Writes never start after cancellation, but once started they finish.
        if self.cancel.is_cancelled() {
            report.outcome = Outcome::Failed {
                reason: "cancelled before write".to_string(),
            };
            return report;
        }

        let _guard = lock.lock().await;
        let result = if self.options.dry_run {
            self.plan(path, record, &content).await
        } else {
            self.write(path, record, &content).await
        };

        match result {
            Ok(Some(change)) => {
                report.outcome = Outcome::Improved;
                report.file_operation = (!self.options.dry_run).then_some(true);
                report.change = Some(change);
                info!("improved");
            }
            Ok(None) => debug!("formatted block identical"),
            Err(reason) => {
                warn!(reason = %reason, "write failed");
                report.outcome = Outcome::Failed { reason };
                report.file_operation = (!self.options.dry_run).then_some(false);
            }
        }
        report
    }

    /// Read and parse off the async workers.
    async fn extract(&self, path: &Path) -> Result<Vec<DocumentationRecord>, String> {
        let extractor = self.extractor.clone();
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || extractor.extract(&path))
            .await
            .map_err(|e| format!("extraction task failed: {e}"))?
            .map_err(|e| e.to_string())
    }

    async fn generate(&self, record: &DocumentationRecord) -> Generated {
        let Ok(_permit) = self.semaphore.acquire().await else {
            return Generated::Failed("semaphore closed".to_string());
        };
        let limit = self.client.config().record_timeout();

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Generated::Failed("cancelled".to_string()),
            outcome = tokio::time::timeout(limit, self.client.improve(record)) => match outcome {
                Ok(Ok(reply)) => Generated::Text {
                    content: reply.content,
                    explanation: reply.explanation,
                    attempts: reply.attempts,
                },
                Ok(Err(e)) => {
                    error!(error = %e, "generation failed");
                    Generated::Failed(describe(&e))
                }
                Err(_) => {
                    warn!(limit = ?limit, "record timed out");
                    Generated::Failed(format!("timed out after {limit:?}"))
                }
            },
        }
    }

    async fn plan(
        &self,
        path: &Path,
        record: &DocumentationRecord,
        content: &str,
    ) -> Result<Option<BlockChange>, String> {
        let source = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
        let planned = plan_replacement(&self.formatter, path, &source, record, content)
            .map_err(|e| e.to_string())?;
        Ok((!planned.is_noop()).then(|| BlockChange {
            before: planned.old_block,
            after: planned.new_block,
        }))
    }

    async fn write(
        &self,
        path: &Path,
        record: &DocumentationRecord,
        content: &str,
    ) -> Result<Option<BlockChange>, String> {
        let writer = self.writer.clone();
        let formatter = self.formatter;
        let path = path.to_path_buf();
        let record = record.clone();
        let content = content.to_string();

        let joined = tokio::task::spawn_blocking(move || {
            replace_docstring(&writer, &formatter, &path, &record, &content)
        })
        .await
        .map_err(|e| format!("write task failed: {e}"))?;

        match joined {
            Ok((planned, EditResult::Applied { .. })) => Ok(Some(BlockChange {
                before: planned.old_block,
                after: planned.new_block,
            })),
            Ok((_, EditResult::AlreadyApplied { .. })) => Ok(None),
            Err(e) => Err(rewrite_reason(&e)),
        }
    }
}

fn describe(error: &GenerationError) -> String {
    match error {
        GenerationError::Exhausted { attempts, source } => {
            format!("{source} (after {attempts} attempts)")
        }
        other => other.to_string(),
    }
}

fn rewrite_reason(error: &RewriteError) -> String {
    match error {
        RewriteError::Locate(_) => format!("not found in current file: {error}"),
        other => other.to_string(),
    }
}
