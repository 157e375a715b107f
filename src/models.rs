//! Data structures produced while packaging a theme bundle.

use std::path::PathBuf;

use serde::Serialize;

/// A packable file discovered under the theme root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemeFile {
  /// Path on disk.
  pub path: PathBuf,
  /// Archive entry name, `/`-separated and prefixed with the theme root's base name.
  pub archive_name: String,
}

impl ThemeFile {
  /// Entry name with the leading theme directory segment stripped.
  pub fn theme_relative(&self) -> &str {
    strip_root_segment(&self.archive_name)
  }

  /// Base name of the file.
  pub fn file_name(&self) -> &str {
    self
      .archive_name
      .rsplit_once('/')
      .map_or(self.archive_name.as_str(), |(_, name)| name)
  }
}

/// Strip everything up to and including the first `/`.
pub fn strip_root_segment(name: &str) -> &str {
  name.split_once('/').map_or(name, |(_, rest)| rest)
}

/// One sanitized file, both sides relative to the theme root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenameRecord {
  /// Path as authored.
  pub old: String,
  /// Path as written into the archive.
  pub new: String,
}

/// Ordered record of every rename applied during one packaging run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RenameLog {
  records: Vec<RenameRecord>,
}

impl RenameLog {
  /// Append a record.
  pub fn push(&mut self, old: impl Into<String>, new: impl Into<String>) {
    self.records.push(RenameRecord {
      old: old.into(),
      new: new.into(),
    });
  }

  /// First replacement recorded for `old`, if any.
  pub fn replacement_for(&self, old: &str) -> Option<&str> {
    self
      .records
      .iter()
      .find(|record| record.old == old)
      .map(|record| record.new.as_str())
  }

  /// Whether no renames were recorded.
  pub fn is_empty(&self) -> bool {
    self.records.is_empty()
  }

  /// Number of records.
  pub fn len(&self) -> usize {
    self.records.len()
  }

  /// Records in insertion order.
  pub fn records(&self) -> &[RenameRecord] {
    &self.records
  }
}

/// Outcome of a successful packaging run.
#[derive(Debug, Clone, Serialize)]
pub struct BundleSummary {
  /// Finished archive.
  pub archive_path: PathBuf,
  /// Entry names in archive order; the manifest is always last.
  pub entries: Vec<String>,
  /// Renames applied to asset files.
  pub renames: RenameLog,
}
