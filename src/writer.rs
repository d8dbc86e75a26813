//! Backup-validated atomic commits of whole-file content.
//!
//! A commit walks a fixed protocol:
//!
//! 1. read the current content (an identical target short-circuits);
//! 2. copy it verbatim to `<file>.backup`;
//! 3. write the new content to `<file>.tmp` in the same directory and fsync it;
//! 4. re-read the temp file and run it through the [`SourceValidator`];
//! 5. rename the temp file over the original;
//! 6. delete the backup.
//!
//! A failure in steps 3 to 5 renames the backup back over the original and
//! removes the temp file. If that restore fails the backup is left on disk
//! and the failure is logged as critical.

use crate::edit::{Edit, EditError, EditResult, Spliced};
use crate::validate::{PythonSyntax, SourceValidator, ValidationError};
use std::ffi::OsString;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, warn};

#[derive(Error, Debug)]
pub enum WriteError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to create backup {backup}: {source}")]
    Backup {
        backup: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write temporary file {temp}: {source}")]
    TempWrite {
        temp: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("rewritten {path} failed validation: {source}")]
    Validation {
        path: PathBuf,
        #[source]
        source: ValidationError,
    },

    #[error("failed to move {temp} over {path}: {source}")]
    Rename {
        path: PathBuf,
        temp: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("CRITICAL: could not restore {path} from {backup} after `{cause}`: {source}")]
    RestoreFailed {
        path: PathBuf,
        backup: PathBuf,
        cause: Box<WriteError>,
        #[source]
        source: io::Error,
    },
}

/// What a successful commit did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The file now holds the new content.
    Written,
    /// The file already held the new content; nothing was touched.
    Unchanged,
}

/// `<file>.backup`, beside the original.
pub fn backup_path(path: &Path) -> PathBuf {
    sibling(path, ".backup")
}

/// `<file>.tmp`, beside the original.
pub fn temp_path(path: &Path) -> PathBuf {
    sibling(path, ".tmp")
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

/// Commits whole-file content with backup, validation and rollback.
#[derive(Clone)]
pub struct AtomicWriter {
    validator: Arc<dyn SourceValidator>,
}

impl Default for AtomicWriter {
    fn default() -> Self {
        Self::new(Arc::new(PythonSyntax))
    }
}

impl std::fmt::Debug for AtomicWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AtomicWriter")
            .field("validator", &self.validator.name())
            .finish()
    }
}

impl AtomicWriter {
    pub fn new(validator: Arc<dyn SourceValidator>) -> Self {
        Self { validator }
    }

    /// Replace the content of `path` with `new_text`.
    pub fn commit(&self, path: &Path, new_text: &str) -> Result<CommitOutcome, WriteError> {
        let original = fs::read(path).map_err(|source| WriteError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        if original == new_text.as_bytes() {
            debug!(path = %path.display(), "content unchanged, skipping write");
            return Ok(CommitOutcome::Unchanged);
        }

        let backup = backup_path(path);
        write_backup(path, &backup, &original).map_err(|source| WriteError::Backup {
            backup: backup.clone(),
            source,
        })?;
        debug!(path = %path.display(), backup = %backup.display(), "backup written");

        let temp = temp_path(path);
        let result = self.swap_in(path, &temp, new_text);

        match result {
            Ok(()) => {
                if let Err(e) = fs::remove_file(&backup) {
                    warn!(backup = %backup.display(), error = %e, "failed to remove backup after commit");
                }
                debug!(path = %path.display(), "commit complete");
                Ok(CommitOutcome::Written)
            }
            Err(cause) => {
                remove_if_present(&temp);
                Err(self.restore(path, &backup, cause))
            }
        }
    }

    /// Apply a verified byte-span edit through the commit protocol.
    ///
    /// The file is re-read, the edit's before-text checked against it, and
    /// the spliced content committed.
    pub fn apply(&self, edit: &Edit) -> Result<EditResult, EditError> {
        let current = fs::read_to_string(&edit.file).map_err(|source| WriteError::Read {
            path: edit.file.clone(),
            source,
        })?;

        match edit.splice(&current)? {
            Spliced::AlreadyApplied => Ok(EditResult::AlreadyApplied {
                file: edit.file.clone(),
            }),
            Spliced::Replaced(new_content) => match self.commit(&edit.file, &new_content)? {
                CommitOutcome::Written => Ok(EditResult::Applied {
                    file: edit.file.clone(),
                    bytes_changed: edit.new_text.len(),
                }),
                CommitOutcome::Unchanged => Ok(EditResult::AlreadyApplied {
                    file: edit.file.clone(),
                }),
            },
        }
    }

    /// Steps 3 to 5: temp write, validation, rename.
    fn swap_in(&self, path: &Path, temp: &Path, new_text: &str) -> Result<(), WriteError> {
        write_temp(path, temp, new_text).map_err(|source| WriteError::TempWrite {
            temp: temp.to_path_buf(),
            source,
        })?;

        let written = fs::read_to_string(temp).map_err(|source| WriteError::TempWrite {
            temp: temp.to_path_buf(),
            source,
        })?;
        self.validator
            .validate(&written)
            .map_err(|source| WriteError::Validation {
                path: path.to_path_buf(),
                source,
            })?;
        debug!(temp = %temp.display(), validator = self.validator.name(), "temp file validated");

        fs::rename(temp, path).map_err(|source| WriteError::Rename {
            path: path.to_path_buf(),
            temp: temp.to_path_buf(),
            source,
        })
    }

    fn restore(&self, path: &Path, backup: &Path, cause: WriteError) -> WriteError {
        match fs::rename(backup, path) {
            Ok(()) => {
                warn!(path = %path.display(), error = %cause, "write failed, original restored");
                cause
            }
            Err(source) => {
                error!(
                    path = %path.display(),
                    backup = %backup.display(),
                    error = %source,
                    cause = %cause,
                    "CRITICAL: restore from backup failed, manual recovery required"
                );
                WriteError::RestoreFailed {
                    path: path.to_path_buf(),
                    backup: backup.to_path_buf(),
                    cause: Box::new(cause),
                    source,
                }
            }
        }
    }
}

/// Write a fresh backup; an existing one, e.g. left by a failed restore, is kept.
fn write_backup(original: &Path, backup: &Path, content: &[u8]) -> io::Result<()> {
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(backup)?;
    let written = file
        .write_all(content)
        .and_then(|()| fs::metadata(original))
        .and_then(|metadata| file.set_permissions(metadata.permissions()))
        .and_then(|()| file.sync_all());
    if written.is_err() {
        remove_if_present(backup);
    }
    written
}

fn write_temp(original: &Path, temp: &Path, content: &str) -> io::Result<()> {
    let mut file = fs::File::create(temp)?;
    file.write_all(content.as_bytes())?;
    if let Ok(metadata) = fs::metadata(original) {
        file.set_permissions(metadata.permissions())?;
    }
    file.sync_all()
}

fn remove_if_present(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "failed to remove temporary file"),
    }
}
