//! Atomic in-place update of a file-backed archive
//!
//! The new package is written next to the original, the original is
//! optionally copied aside, and the new file is moved over it. The old file
//! stays readable until the new one is complete, so a failed write never
//! leaves a half-migrated package behind.

use crate::archive::Archive;
use crate::error::{ArchiveError, ArchiveResult};
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// What an update did besides rewriting the package
#[derive(Debug)]
pub struct UpdateOutcome {
    /// Backup copy of the previous file; `None` when no backup was asked
    /// for or the replacement did not happen
    pub backup_path: Option<PathBuf>,
    /// Why the new file could not replace the original
    ///
    /// The rewritten package is then left at the temporary path and the
    /// archive is reopened from the unchanged original.
    pub replace_error: Option<ArchiveError>,
}

impl UpdateOutcome {
    /// Whether the original file now holds the rewritten package
    pub const fn replaced(&self) -> bool {
        self.replace_error.is_none()
    }
}

/// `path` with `suffix` appended to its file name
pub fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

impl Archive<BufReader<File>> {
    /// Rewrite the package in place, replacing the file by rename
    pub fn update(&mut self, make_backup: bool) -> ArchiveResult<UpdateOutcome> {
        self.update_using(make_backup, |from, to| fs::rename(from, to))
    }

    /// Rewrite the package in place with a custom replace step
    ///
    /// `replace` moves the temporary file (first argument) over the
    /// archive path (second argument). Its failure does not fail the
    /// update: the outcome reports it and carries no backup path.
    ///
    /// Failing to write the temporary file or to copy the backup returns
    /// the error before the source is closed, so the archive stays open
    /// with its staged edits. A failed reopen is returned as well.
    pub fn update_using<F>(&mut self, make_backup: bool, replace: F) -> ArchiveResult<UpdateOutcome>
    where
        F: FnOnce(&Path, &Path) -> io::Result<()>,
    {
        let path = self.path.clone().ok_or(ArchiveError::NoPath)?;
        let temp_path = sibling_path(&path, &self.config.temp_suffix);
        let backup = sibling_path(&path, &self.config.backup_suffix);

        if let Err(err) = self.write_temp(&temp_path) {
            remove_temp(&temp_path);
            return Err(err);
        }

        let mut backup_path = None;
        if make_backup && path.exists() {
            if let Err(err) = fs::copy(&path, &backup) {
                remove_temp(&temp_path);
                return Err(err.into());
            }
            debug!("Backed up {} to {}", path.display(), backup.display());
            backup_path = Some(backup);
        }

        self.close();

        let replace_error = match replace(&temp_path, &path) {
            Ok(()) => None,
            Err(source) => {
                warn!(
                    "Could not replace {}, rewritten package left at {}: {}",
                    path.display(),
                    temp_path.display(),
                    source
                );
                backup_path = None;
                Some(ArchiveError::FileLocked {
                    path: path.clone(),
                    source,
                })
            }
        };

        self.reopen(&path)?;
        if replace_error.is_none() {
            info!("Updated {}", path.display());
        }
        Ok(UpdateOutcome {
            backup_path,
            replace_error,
        })
    }

    fn write_temp(&mut self, temp_path: &Path) -> ArchiveResult<()> {
        let mut writer = BufWriter::new(File::create(temp_path)?);
        let summary = self.rewrite(&mut writer)?;
        let file = writer.into_inner().map_err(|e| ArchiveError::Io(e.into_error()))?;
        if self.config.sync_on_update {
            file.sync_all()?;
        }
        debug!(
            "Wrote {} bytes to {}",
            summary.bytes_written,
            temp_path.display()
        );
        Ok(())
    }

    fn reopen(&mut self, path: &Path) -> ArchiveResult<()> {
        let mut reopened = Self::open_with(path, self.config.clone())?;
        reopened.registry = std::sync::Arc::clone(&self.registry);
        *self = reopened;
        Ok(())
    }
}

fn remove_temp(temp_path: &Path) {
    if let Err(err) = fs::remove_file(temp_path) {
        debug!("Could not remove {}: {}", temp_path.display(), err);
    }
}
