use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

use crate::config::BundleConfig;
use crate::error::{BundleError, Result};
use crate::models::ThemeFile;

use super::filters::should_prune_entry;

/// Depth-first walk over the packable files of a theme directory.
///
/// Entries come back in directory order, unsorted. Pruned directories are never
/// descended into. Every call to [`ThemeWalk::files`] starts a fresh walk.
#[derive(Debug, Clone)]
pub struct ThemeWalk {
    root: PathBuf,
    root_name: String,
    manifest_file: String,
    excluded_dir_name: String,
    skip: Option<PathBuf>,
}

impl ThemeWalk {
    /// Prepare a walk over `root`, which must be an existing directory.
    pub fn new(root: &Path, config: &BundleConfig) -> Result<Self> {
        let canonical = fs::canonicalize(root).map_err(|err| BundleError::filesystem(root, err))?;
        if !canonical.is_dir() {
            return Err(BundleError::InvalidRoot {
                path: root.to_path_buf(),
                reason: "not a directory".into(),
            });
        }
        let root_name = canonical
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::to_owned)
            .ok_or_else(|| BundleError::InvalidRoot {
                path: root.to_path_buf(),
                reason: "directory has no UTF-8 base name".into(),
            })?;

        Ok(Self {
            root: canonical,
            root_name,
            manifest_file: config.manifest_file.clone(),
            excluded_dir_name: config.excluded_dir_name.clone(),
            skip: None,
        })
    }

    /// Leave `path` out of the walk, used for an archive written inside the theme.
    pub fn skipping(mut self, path: &Path) -> Self {
        self.skip = canonicalize_lenient(path);
        self
    }

    /// Canonical theme root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Base name of the theme root; the prefix of every archive entry.
    pub fn root_name(&self) -> &str {
        &self.root_name
    }

    /// Path of the manifest on disk.
    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(&self.manifest_file)
    }

    /// Archive entry name of the manifest.
    pub fn manifest_archive_name(&self) -> String {
        format!("{}/{}", self.root_name, self.manifest_file)
    }

    /// Lazily yield every packable file under the root, manifest excluded.
    pub fn files(&self) -> impl Iterator<Item = Result<ThemeFile>> + '_ {
        WalkDir::new(&self.root)
            .follow_links(false)
            .into_iter()
            .filter_entry(move |entry| {
                entry.depth() == 0
                    || !should_prune_entry(&entry.file_name().to_string_lossy(), &self.excluded_dir_name)
            })
            .filter_map(move |entry| self.classify(entry).transpose())
    }

    fn classify(&self, entry: walkdir::Result<DirEntry>) -> Result<Option<ThemeFile>> {
        let entry = entry.map_err(|err| {
            let path = err.path().map_or_else(|| self.root.clone(), Path::to_path_buf);
            BundleError::filesystem(path, io::Error::from(err))
        })?;

        let path = entry.path();
        // Follows symlinks; directories, broken links and special files are skipped.
        if entry.depth() == 0 || !path.is_file() {
            return Ok(None);
        }
        if entry.depth() == 1 && entry.file_name() == OsStr::new(&self.manifest_file) {
            return Ok(None);
        }
        if self.skip.as_deref() == Some(path) {
            return Ok(None);
        }

        let relative = path
            .strip_prefix(&self.root)
            .map_err(|err| BundleError::filesystem(path, io::Error::other(err)))?;
        // Entry names are UTF-8; a name that is not is refused rather than rewritten.
        let relative = to_posix(relative).ok_or_else(|| {
            BundleError::filesystem(
                path,
                io::Error::new(io::ErrorKind::InvalidData, "file name is not valid UTF-8"),
            )
        })?;
        Ok(Some(ThemeFile {
            path: path.to_path_buf(),
            archive_name: format!("{}/{}", self.root_name, relative),
        }))
    }
}

fn to_posix(relative: &Path) -> Option<String> {
    let parts = relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_str()),
            _ => None,
        })
        .collect::<Option<Vec<_>>>()?;
    Some(parts.join("/"))
}

fn canonicalize_lenient(path: &Path) -> Option<PathBuf> {
    if let Ok(canonical) = fs::canonicalize(path) {
        return Some(canonical);
    }
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let name = path.file_name()?;
    fs::canonicalize(parent).ok().map(|dir| dir.join(name))
}
