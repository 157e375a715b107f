//! Applies sanitized asset names around the packing of each entry.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::RenameStrategy;
use crate::error::{BundleError, Result};
use crate::models::{RenameLog, ThemeFile, strip_root_segment};
use crate::theme_paths::sanitized_name;

/// Tracks sanitized names for one packaging run and decides where each entry is read from.
#[derive(Debug)]
pub struct RenameCoordinator {
  strategy: RenameStrategy,
  assets_dir_name: String,
  log: RenameLog,
  sanitized: HashSet<String>,
}

impl RenameCoordinator {
  /// Create a coordinator for a single run.
  pub fn new(strategy: RenameStrategy, assets_dir_name: impl Into<String>) -> Self {
    Self {
      strategy,
      assets_dir_name: assets_dir_name.into(),
      log: RenameLog::default(),
      sanitized: HashSet::new(),
    }
  }

  /// Resolve the source path and archive name for `file`, renaming it on disk when the
  /// strategy asks for it. The returned entry must be finished once packed.
  ///
  /// A sanitized name that matches a file already on disk, or one produced earlier in the
  /// run, is rejected so no archive entry is ever written twice.
  pub fn stage(&mut self, file: &ThemeFile) -> Result<StagedEntry> {
    let Some(new_name) = sanitized_name(file.file_name(), file.theme_relative(), &self.assets_dir_name)
    else {
      return Ok(StagedEntry {
        source: file.path.clone(),
        archive_name: file.archive_name.clone(),
        guard: None,
      });
    };

    let archive_name = match file.archive_name.rsplit_once('/') {
      Some((dir, _)) => format!("{dir}/{new_name}"),
      None => new_name.clone(),
    };

    let renamed = file.path.with_file_name(&new_name);
    if fs::symlink_metadata(&renamed).is_ok() || self.sanitized.contains(&archive_name) {
      return Err(collision(&renamed, &file.path));
    }

    let (source, guard) = match self.strategy {
      RenameStrategy::Virtual => (file.path.clone(), None),
      RenameStrategy::InPlace => {
        let guard = RenameGuard::apply(&file.path, &renamed)?;
        (renamed, Some(guard))
      }
    };
    self.sanitized.insert(archive_name.clone());

    debug!(
      from = file.theme_relative(),
      to = strip_root_segment(&archive_name),
      "sanitized asset name"
    );
    self
      .log
      .push(file.theme_relative(), strip_root_segment(&archive_name));

    Ok(StagedEntry {
      source,
      archive_name,
      guard,
    })
  }

  /// Renames recorded so far.
  pub fn log(&self) -> &RenameLog {
    &self.log
  }

  /// Consume the coordinator, returning the rename log.
  pub fn into_log(self) -> RenameLog {
    self.log
  }
}

/// An entry ready to be packed.
#[derive(Debug)]
pub struct StagedEntry {
  source: PathBuf,
  archive_name: String,
  guard: Option<RenameGuard>,
}

impl StagedEntry {
  /// Path to read the entry's bytes from.
  pub fn source(&self) -> &Path {
    &self.source
  }

  /// Name to write the entry under.
  pub fn archive_name(&self) -> &str {
    &self.archive_name
  }

  /// Restore any on-disk rename, reporting failure to the caller.
  pub fn finish(self) -> Result<()> {
    match self.guard {
      Some(guard) => guard.restore(),
      None => Ok(()),
    }
  }
}

/// An on-disk rename that is reverted when the guard is restored or dropped.
#[derive(Debug)]
pub struct RenameGuard {
  original: PathBuf,
  renamed: PathBuf,
  armed: bool,
}

impl RenameGuard {
  /// Rename `original` to `renamed`. Fails rather than overwrite an existing file.
  pub fn apply(original: &Path, renamed: &Path) -> Result<Self> {
    if fs::symlink_metadata(renamed).is_ok() {
      return Err(collision(renamed, original));
    }
    fs::rename(original, renamed).map_err(|err| BundleError::filesystem(original, err))?;

    Ok(Self {
      original: original.to_path_buf(),
      renamed: renamed.to_path_buf(),
      armed: true,
    })
  }

  /// Move the file back to its original name.
  pub fn restore(mut self) -> Result<()> {
    self.armed = false;
    fs::rename(&self.renamed, &self.original)
      .map_err(|err| BundleError::filesystem(&self.renamed, err))
  }
}

fn collision(renamed: &Path, original: &Path) -> BundleError {
  BundleError::filesystem(
    renamed,
    io::Error::new(
      io::ErrorKind::AlreadyExists,
      format!("sanitized name collides with {}", original.display()),
    ),
  )
}

impl Drop for RenameGuard {
  fn drop(&mut self) {
    if !self.armed {
      return;
    }
    if let Err(err) = fs::rename(&self.renamed, &self.original) {
      warn!(
        renamed = %self.renamed.display(),
        original = %self.original.display(),
        error = %err,
        "failed to restore original file name"
      );
    }
  }
}
