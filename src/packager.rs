//! Theme packaging orchestrator: walks the theme, packs every file and finishes with the manifest.

use std::env;
use std::fs;
use std::ops::Deref;
use std::path::{Path, PathBuf};

use tempfile::TempPath;
use tracing::{debug, info};

use crate::bundle::archive::ArchiveWriter;
use crate::bundle::manifest::ThemeManifest;
use crate::bundle::rename::RenameCoordinator;
use crate::config::{BundleConfig, RenameStrategy};
use crate::error::{BundleError, Result};
use crate::models::{BundleSummary, ThemeFile};
use crate::theme_paths::ThemeWalk;

/// Packages one theme directory into a gzip-compressed tarball.
#[derive(Debug, Clone)]
pub struct ThemePackager {
  walk: ThemeWalk,
  config: BundleConfig,
}

impl ThemePackager {
  /// Create a packager for `root` using an explicit configuration.
  pub fn new(root: impl AsRef<Path>, config: BundleConfig) -> Result<Self> {
    let walk = ThemeWalk::new(root.as_ref(), &config)?;
    Ok(Self { walk, config })
  }

  /// Create a packager for `root`, loading configuration from the theme when present.
  pub fn discover(root: impl AsRef<Path>) -> Result<Self> {
    let config = BundleConfig::discover(root.as_ref());
    Self::new(root, config)
  }

  /// Canonical theme root.
  pub fn root(&self) -> &Path {
    self.walk.root()
  }

  /// Base name of the theme directory.
  pub fn theme_name(&self) -> &str {
    self.walk.root_name()
  }

  /// Configuration in effect.
  pub fn config(&self) -> &BundleConfig {
    &self.config
  }

  /// Write the bundle to `destination`.
  ///
  /// On success the destination holds a complete archive and the theme directory is unchanged.
  /// On failure the destination file is closed but must be treated as invalid.
  pub fn package(&self, destination: impl AsRef<Path>) -> Result<BundleSummary> {
    let destination = destination.as_ref();
    let manifest = ThemeManifest::read(&self.walk.manifest_path())?;

    let mut writer = ArchiveWriter::create(destination, self.config.compression())?;
    let walk = self.walk.clone().skipping(destination);
    let mut renames =
      RenameCoordinator::new(self.config.rename_strategy, self.config.assets_dir_name.as_str());

    // Renaming entries of a directory that is still being read can surface them twice,
    // so in-place renames work from a listing taken up front.
    let files: Box<dyn Iterator<Item = Result<ThemeFile>> + '_> = match self.config.rename_strategy {
      RenameStrategy::Virtual => Box::new(walk.files()),
      RenameStrategy::InPlace => Box::new(walk.files().collect::<Vec<_>>().into_iter()),
    };

    for file in files {
      let file = file?;
      let staged = renames.stage(&file)?;
      writer.append_file(staged.source(), staged.archive_name())?;
      staged.finish()?;
    }

    let renames = renames.into_log();
    let contents = manifest.patched(&renames)?;
    writer.append_bytes(&walk.manifest_archive_name(), &contents, Some(manifest.metadata()))?;

    let entries = writer.entries().to_vec();
    let archive_path = writer.finish()?;
    info!(
      theme = self.theme_name(),
      archive = %archive_path.display(),
      entries = entries.len(),
      renamed = renames.len(),
      "theme bundle written"
    );

    Ok(BundleSummary {
      archive_path,
      entries,
      renames,
    })
  }

  /// Write the bundle to a uniquely named `bundle_*.tar.gz` file in the system temp directory.
  ///
  /// The file is removed when the returned [`TempBundle`] is dropped, and immediately if
  /// packaging fails.
  pub fn package_to_temp(&self) -> Result<TempBundle> {
    let temp_dir = env::temp_dir();
    let temp_dir = fs::canonicalize(&temp_dir).map_err(|err| BundleError::filesystem(&temp_dir, err))?;
    let file = tempfile::Builder::new()
      .prefix("bundle_")
      .suffix(".tar.gz")
      .rand_bytes(16)
      .tempfile_in(&temp_dir)
      .map_err(|err| BundleError::filesystem(&temp_dir, err))?;
    let path = file.into_temp_path();
    debug!(path = %path.display(), "packaging into temporary bundle");

    let summary = self.package(&path)?;
    Ok(TempBundle { path, summary })
  }
}

/// A bundle written to a temporary file that is deleted on drop.
#[derive(Debug)]
pub struct TempBundle {
  path: TempPath,
  summary: BundleSummary,
}

impl TempBundle {
  /// Location of the archive.
  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Summary of the packaging run.
  pub fn summary(&self) -> &BundleSummary {
    &self.summary
  }

  /// Keep the archive on disk and return its path.
  pub fn keep(self) -> Result<PathBuf> {
    let path = self.path.to_path_buf();
    self
      .path
      .keep()
      .map_err(|err| BundleError::filesystem(&path, err.error))
  }
}

impl Deref for TempBundle {
  type Target = BundleSummary;

  fn deref(&self) -> &Self::Target {
    &self.summary
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::BTreeMap;
  use std::fs::File;
  use std::io::Read;

  use flate2::read::GzDecoder;
  use tempfile::{TempDir, tempdir};

  use crate::error::BundleErrorKind;

  const MANIFEST: &str = r#"{"name":"My Theme","assets":{"x":"assets/a b.js","y":"assets/other.js","z":"assets/sub/my file!.js"}}"#;

  struct Fixture {
    _dir: TempDir,
    root: PathBuf,
    output: PathBuf,
  }

  fn fixture(files: &[(&str, &str)]) -> Fixture {
    let dir = tempdir().unwrap();
    let root = dir.path().join("mytheme");
    for (relative, content) in files {
      let path = root.join(relative);
      fs::create_dir_all(path.parent().unwrap()).unwrap();
      fs::write(path, content).unwrap();
    }
    let output = dir.path().join("bundle.tar.gz");
    Fixture {
      _dir: dir,
      root,
      output,
    }
  }

  fn standard_theme() -> Fixture {
    fixture(&[
      ("about.json", MANIFEST),
      ("assets/a b.js", "console.log('a b');"),
      ("assets/other.js", "console.log('other');"),
      ("assets/sub/my file!.js", "console.log('sub');"),
      ("javascripts/my file!.js", "console.log('outside');"),
      ("common/common.scss", "body {}"),
      ("src/index.js", "source"),
      ("assets/src/hidden.js", "source"),
      (".git/HEAD", "ref"),
      ("assets/.cache/x", "cache"),
    ])
  }

  fn read_archive(path: &Path) -> Vec<(String, Vec<u8>)> {
    let mut archive = tar::Archive::new(GzDecoder::new(File::open(path).unwrap()));
    archive
      .entries()
      .unwrap()
      .map(|entry| {
        let mut entry = entry.unwrap();
        let name = entry.path().unwrap().to_string_lossy().into_owned();
        let mut body = Vec::new();
        entry.read_to_end(&mut body).unwrap();
        (name, body)
      })
      .collect()
  }

  fn snapshot(root: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    walkdir::WalkDir::new(root)
      .into_iter()
      .map(|entry| entry.unwrap())
      .filter(|entry| entry.file_type().is_file())
      .map(|entry| (entry.path().to_path_buf(), fs::read(entry.path()).unwrap()))
      .collect()
  }

  fn packager(root: &Path, strategy: RenameStrategy) -> ThemePackager {
    ThemePackager::new(root, BundleConfig::default().with_rename_strategy(strategy)).unwrap()
  }

  const STRATEGIES: [RenameStrategy; 2] = [RenameStrategy::Virtual, RenameStrategy::InPlace];

  #[test]
  fn excludes_source_and_dot_entries() {
    for strategy in STRATEGIES {
      let theme = standard_theme();
      packager(&theme.root, strategy).package(&theme.output).unwrap();

      for (name, _) in read_archive(&theme.output) {
        assert!(!name.split('/').any(|segment| segment == "src"), "{name}");
        assert!(!name.split('/').any(|segment| segment.starts_with('.')), "{name}");
      }
    }
  }

  #[test]
  fn packs_every_file_once_with_manifest_last() {
    for strategy in STRATEGIES {
      let theme = standard_theme();
      let summary = packager(&theme.root, strategy).package(&theme.output).unwrap();

      let entries = read_archive(&theme.output);
      let names: Vec<&str> = entries.iter().map(|(name, _)| name.as_str()).collect();
      assert_eq!(names.len(), 6);
      assert_eq!(names.last(), Some(&"mytheme/about.json"));
      assert_eq!(summary.entries, names);

      let mut sorted = names.clone();
      sorted.sort();
      assert_eq!(
        sorted,
        vec![
          "mytheme/about.json",
          "mytheme/assets/a-b.js",
          "mytheme/assets/other.js",
          "mytheme/assets/sub/my-file-.js",
          "mytheme/common/common.scss",
          "mytheme/javascripts/my file!.js",
        ]
      );
    }
  }

  #[test]
  fn sanitized_entries_keep_their_contents() {
    let theme = standard_theme();
    packager(&theme.root, RenameStrategy::InPlace)
      .package(&theme.output)
      .unwrap();

    let entries: BTreeMap<String, Vec<u8>> = read_archive(&theme.output).into_iter().collect();
    assert_eq!(entries["mytheme/assets/sub/my-file-.js"], b"console.log('sub');");
    assert_eq!(entries["mytheme/javascripts/my file!.js"], b"console.log('outside');");
  }

  #[test]
  fn restores_tree_and_manifest() {
    for strategy in STRATEGIES {
      let theme = standard_theme();
      let before = snapshot(&theme.root);

      let summary = packager(&theme.root, strategy).package(&theme.output).unwrap();

      assert_eq!(summary.renames.len(), 2);
      assert_eq!(snapshot(&theme.root), before);
      assert!(!theme.root.join("assets/a-b.js").exists());
      assert!(!theme.root.join("assets/sub/my-file-.js").exists());
      assert_eq!(
        fs::read_to_string(theme.root.join("about.json")).unwrap(),
        MANIFEST
      );
    }
  }

  #[test]
  fn archived_manifest_reflects_renames() {
    for strategy in STRATEGIES {
      let theme = standard_theme();
      packager(&theme.root, strategy).package(&theme.output).unwrap();

      let (name, body) = read_archive(&theme.output).pop().unwrap();
      assert_eq!(name, "mytheme/about.json");
      assert_eq!(
        std::str::from_utf8(&body).unwrap(),
        r#"{"name":"My Theme","assets":{"x":"assets/a-b.js","y":"assets/other.js","z":"assets/sub/my-file-.js"}}"#
      );
    }
  }

  #[test]
  fn manifest_is_verbatim_without_renames() {
    let manifest = "{\n  \"assets\": { \"logo\": \"assets/logo.png\" }\n}\n";
    let theme = fixture(&[
      ("about.json", manifest),
      ("assets/logo.png", "png"),
      ("javascripts/odd name.js", "js"),
    ]);

    let summary = packager(&theme.root, RenameStrategy::InPlace)
      .package(&theme.output)
      .unwrap();
    assert!(summary.renames.is_empty());

    let (name, body) = read_archive(&theme.output).pop().unwrap();
    assert_eq!(name, "mytheme/about.json");
    assert_eq!(body, manifest.as_bytes());
  }

  #[test]
  fn manifest_without_assets_is_accepted() {
    let theme = fixture(&[("about.json", r#"{"name":"t"}"#), ("assets/a b.png", "png")]);

    let summary = packager(&theme.root, RenameStrategy::Virtual)
      .package(&theme.output)
      .unwrap();
    assert_eq!(summary.renames.len(), 1);
    let (_, body) = read_archive(&theme.output).pop().unwrap();
    assert_eq!(body, br#"{"name":"t"}"#);
  }

  #[test]
  fn malformed_manifest_fails_and_leaves_theme_untouched() {
    for strategy in STRATEGIES {
      let theme = fixture(&[
        ("about.json", r#"{"assets":["assets/a b.js"]}"#),
        ("assets/a b.js", "js"),
      ]);
      let before = snapshot(&theme.root);

      let err = packager(&theme.root, strategy)
        .package(&theme.output)
        .unwrap_err();
      assert_eq!(err.kind(), BundleErrorKind::ManifestParse);
      assert_eq!(snapshot(&theme.root), before);
    }
  }

  #[test]
  fn sanitized_name_colliding_with_sibling_fails() {
    for strategy in STRATEGIES {
      let theme = fixture(&[
        ("about.json", r#"{"assets":{"x":"assets/a b.js"}}"#),
        ("assets/a b.js", "SPACE"),
        ("assets/a-b.js", "DASH"),
      ]);
      let before = snapshot(&theme.root);

      let err = packager(&theme.root, strategy)
        .package(&theme.output)
        .unwrap_err();
      assert_eq!(err.kind(), BundleErrorKind::Filesystem);
      assert_eq!(snapshot(&theme.root), before);
    }
  }

  #[cfg(target_os = "linux")]
  fn noise(len: usize) -> Vec<u8> {
    let mut state: u64 = 0x9e37_79b9_7f4a_7c15;
    (0..len)
      .map(|_| {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        (state >> 24) as u8
      })
      .collect()
  }

  #[cfg(target_os = "linux")]
  #[test]
  fn package_to_full_device_is_an_archive_write_error() {
    let theme = standard_theme();
    let before = snapshot(&theme.root);

    let err = packager(&theme.root, RenameStrategy::Virtual)
      .package("/dev/full")
      .unwrap_err();
    assert_eq!(err.kind(), BundleErrorKind::ArchiveWrite);
    assert_eq!(snapshot(&theme.root), before);
  }

  #[cfg(target_os = "linux")]
  #[test]
  fn failed_write_after_in_place_rename_restores_tree() {
    let theme = fixture(&[("about.json", r#"{"assets":{"big":"assets/big file.bin"}}"#)]);
    let asset = theme.root.join("assets/big file.bin");
    fs::create_dir_all(asset.parent().unwrap()).unwrap();
    fs::write(&asset, noise(1 << 20)).unwrap();
    let before = snapshot(&theme.root);

    let err = packager(&theme.root, RenameStrategy::InPlace)
      .package("/dev/full")
      .unwrap_err();
    assert_eq!(err.kind(), BundleErrorKind::ArchiveWrite);
    assert_eq!(snapshot(&theme.root), before);
    assert!(!theme.root.join("assets/big-file.bin").exists());
  }

  #[test]
  fn missing_manifest_is_a_filesystem_error() {
    let theme = fixture(&[("assets/logo.png", "png")]);
    let err = packager(&theme.root, RenameStrategy::Virtual)
      .package(&theme.output)
      .unwrap_err();
    assert_eq!(err.kind(), BundleErrorKind::Filesystem);
  }

  #[test]
  fn archive_inside_theme_is_not_packed() {
    let theme = fixture(&[("about.json", "{}"), ("settings.yml", "a: 1")]);
    let output = theme.root.join("bundle.tar.gz");

    let summary = packager(&theme.root, RenameStrategy::Virtual)
      .package(&output)
      .unwrap();
    assert_eq!(
      summary.entries,
      vec!["mytheme/settings.yml", "mytheme/about.json"]
    );
  }

  #[test]
  fn temp_bundle_is_removed_on_drop() {
    let theme = standard_theme();
    let bundle = packager(&theme.root, RenameStrategy::Virtual)
      .package_to_temp()
      .unwrap();
    let path = bundle.path().to_path_buf();

    let file_name = path.file_name().unwrap().to_string_lossy().into_owned();
    assert!(file_name.starts_with("bundle_"));
    assert!(file_name.ends_with(".tar.gz"));
    assert_eq!(bundle.entries.last().map(String::as_str), Some("mytheme/about.json"));
    assert_eq!(read_archive(&path).len(), bundle.entries.len());

    drop(bundle);
    assert!(!path.exists());
  }

  #[test]
  fn kept_temp_bundle_survives() {
    let theme = fixture(&[("about.json", "{}")]);
    let bundle = packager(&theme.root, RenameStrategy::Virtual)
      .package_to_temp()
      .unwrap();

    let path = bundle.keep().unwrap();
    assert!(path.exists());
    fs::remove_file(path).unwrap();
  }

  #[test]
  fn discover_uses_theme_configuration() {
    let theme = fixture(&[
      ("about.json", "{}"),
      (".theme-bundle.json", r#"{ "rename_strategy": "in_place" }"#),
    ]);
    let packager = ThemePackager::discover(&theme.root).unwrap();
    assert_eq!(packager.config().rename_strategy, RenameStrategy::InPlace);
    assert_eq!(packager.theme_name(), "mytheme");

    let summary = packager.package(&theme.output).unwrap();
    assert_eq!(summary.entries, vec!["mytheme/about.json"]);
  }
}
