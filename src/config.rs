//! Packager configuration loader describing the theme layout and rename policy.

use std::fs;
use std::path::Path;

use serde::Deserialize;

/// Configuration file looked up at the theme root. Dot-prefixed, so it never lands in a bundle.
pub const DEFAULT_CONFIG_FILE: &str = ".theme-bundle.json";

/// How sanitized asset names are applied while packing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenameStrategy {
  /// Write the entry under its sanitized name without touching the file on disk.
  #[default]
  Virtual,
  /// Rename the file on disk, pack it, then rename it back.
  InPlace,
}

/// Discoverable packager configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BundleConfig {
  /// Name of the theme manifest directly under the theme root.
  pub manifest_file: String,
  /// Directory segment whose descendants are eligible for name sanitization.
  pub assets_dir_name: String,
  /// Directory name pruned from the walk at any depth.
  pub excluded_dir_name: String,
  /// Strategy used to apply sanitized names.
  pub rename_strategy: RenameStrategy,
  /// Gzip compression level (0-9).
  pub compression_level: u32,
}

impl Default for BundleConfig {
  fn default() -> Self {
    Self {
      manifest_file: "about.json".into(),
      assets_dir_name: "assets".into(),
      excluded_dir_name: "src".into(),
      rename_strategy: RenameStrategy::Virtual,
      compression_level: 6,
    }
  }
}

impl BundleConfig {
  /// Attempt to load configuration from the theme root.
  ///
  /// A missing or malformed file yields the default configuration.
  pub fn discover(theme_root: &Path) -> Self {
    let candidate = theme_root.join(DEFAULT_CONFIG_FILE);
    Self::from_path(&candidate).unwrap_or_default()
  }

  /// Read configuration from a specific JSON file.
  pub fn from_path(path: &Path) -> Option<Self> {
    let content = fs::read_to_string(path).ok()?;
    serde_json::from_str(&content).ok()
  }

  /// Copy of this configuration using a different rename strategy.
  pub fn with_rename_strategy(mut self, strategy: RenameStrategy) -> Self {
    self.rename_strategy = strategy;
    self
  }

  pub(crate) fn compression(&self) -> flate2::Compression {
    flate2::Compression::new(self.compression_level.min(9))
  }
}
