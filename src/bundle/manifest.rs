//! Loading the theme manifest and rewriting its asset paths to match sanitized names.

use std::borrow::Cow;
use std::fs::{self, Metadata};
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::error::{BundleError, Result};
use crate::models::RenameLog;

/// Raw manifest bytes as found on disk.
///
/// The file is only ever read. Patched content is produced in memory and packed from there,
/// so the manifest on disk is identical before and after a run whatever its outcome.
#[derive(Debug)]
pub struct ThemeManifest {
  path: PathBuf,
  bytes: Vec<u8>,
  metadata: Metadata,
}

impl ThemeManifest {
  /// Read the manifest at `path`.
  pub fn read(path: &Path) -> Result<Self> {
    let bytes = fs::read(path).map_err(|err| BundleError::filesystem(path, err))?;
    let metadata = fs::metadata(path).map_err(|err| BundleError::filesystem(path, err))?;
    Ok(Self {
      path: path.to_path_buf(),
      bytes,
      metadata,
    })
  }

  /// Original bytes.
  pub fn bytes(&self) -> &[u8] {
    &self.bytes
  }

  /// File metadata captured when the manifest was read.
  pub fn metadata(&self) -> &Metadata {
    &self.metadata
  }

  /// Manifest content to pack for the given renames.
  ///
  /// Without renames the original bytes are returned untouched and never parsed.
  pub fn patched(&self, renames: &RenameLog) -> Result<Cow<'_, [u8]>> {
    if renames.is_empty() {
      return Ok(Cow::Borrowed(&self.bytes));
    }

    let mut document: Value = serde_json::from_slice(&self.bytes)
      .map_err(|err| BundleError::manifest(&self.path, err.to_string()))?;
    let patched = patch_asset_paths(&mut document, renames)
      .map_err(|reason| BundleError::manifest(&self.path, reason))?;
    debug!(manifest = %self.path.display(), patched, "patched manifest asset paths");

    let bytes = serde_json::to_vec(&document)
      .map_err(|err| BundleError::manifest(&self.path, err.to_string()))?;
    Ok(Cow::Owned(bytes))
  }
}

/// Point every `assets` value that matches a renamed path at its new location.
///
/// Returns the number of values rewritten. A missing or `null` `assets` key has nothing
/// to patch; any other non-object value, or a non-string asset path, is rejected.
pub fn patch_asset_paths(document: &mut Value, renames: &RenameLog) -> std::result::Result<usize, String> {
  let root = match document {
    Value::Object(root) => root,
    other => return Err(format!("expected a JSON object, found {}", describe(other))),
  };

  let assets = match root.get_mut("assets") {
    None | Some(Value::Null) => return Ok(0),
    Some(Value::Object(assets)) => assets,
    Some(other) => return Err(format!("`assets` must be an object, found {}", describe(other))),
  };

  let mut patched = 0;
  for (key, value) in assets.iter_mut() {
    let current = match value {
      Value::String(current) => current,
      other => return Err(format!("asset `{key}` must be a string, found {}", describe(other))),
    };
    if let Some(replacement) = renames.replacement_for(current) {
      *current = replacement.to_string();
      patched += 1;
    }
  }
  Ok(patched)
}

fn describe(value: &Value) -> &'static str {
  match value {
    Value::Null => "null",
    Value::Bool(_) => "a boolean",
    Value::Number(_) => "a number",
    Value::String(_) => "a string",
    Value::Array(_) => "an array",
    Value::Object(_) => "an object",
  }
}
