//! Gzip-compressed tar output for theme bundles.

use std::fs::{File, Metadata};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use flate2::Compression;
use flate2::write::GzEncoder;
use tar::{Builder, EntryType, Header, HeaderMode};
use tracing::debug;

use crate::error::{BundleError, Result};

type ArchiveStream = GzEncoder<BufWriter<File>>;

/// Appends theme files, in order, to a `.tar.gz` file.
///
/// Dropping the writer without calling [`ArchiveWriter::finish`] still flushes and closes the
/// underlying file, but the archive must then be treated as incomplete.
pub struct ArchiveWriter {
  builder: Builder<ArchiveStream>,
  path: PathBuf,
  entries: Vec<String>,
}

impl ArchiveWriter {
  /// Create (or truncate) the archive at `path`.
  pub fn create(path: &Path, compression: Compression) -> Result<Self> {
    let file = File::create(path).map_err(|err| BundleError::filesystem(path, err))?;
    let encoder = GzEncoder::new(BufWriter::new(file), compression);
    let mut builder = Builder::new(encoder);
    builder.mode(HeaderMode::Complete);

    Ok(Self {
      builder,
      path: path.to_path_buf(),
      entries: Vec::new(),
    })
  }

  /// Pack the file at `source` under the entry name `name`.
  pub fn append_file(&mut self, source: &Path, name: &str) -> Result<()> {
    let file = File::open(source).map_err(|err| BundleError::filesystem(source, err))?;
    let metadata = file
      .metadata()
      .map_err(|err| BundleError::filesystem(source, err))?;

    let mut header = Header::new_gnu();
    header.set_metadata_in_mode(&metadata, HeaderMode::Complete);
    header.set_entry_type(EntryType::Regular);
    header.set_size(metadata.len());

    self
      .builder
      .append_data(&mut header, name, file)
      .map_err(BundleError::archive)?;
    debug!(entry = name, source = %source.display(), "packed file");
    self.entries.push(name.to_string());
    Ok(())
  }

  /// Pack an in-memory buffer under `name`, taking mode and mtime from `metadata` when given.
  pub fn append_bytes(&mut self, name: &str, data: &[u8], metadata: Option<&Metadata>) -> Result<()> {
    let mut header = Header::new_gnu();
    match metadata {
      Some(metadata) => header.set_metadata_in_mode(metadata, HeaderMode::Complete),
      None => {
        header.set_mode(0o644);
        header.set_mtime(unix_now());
      }
    }
    header.set_entry_type(EntryType::Regular);
    header.set_size(data.len() as u64);

    self
      .builder
      .append_data(&mut header, name, data)
      .map_err(BundleError::archive)?;
    debug!(entry = name, bytes = data.len(), "packed buffer");
    self.entries.push(name.to_string());
    Ok(())
  }

  /// Entry names appended so far, in order.
  pub fn entries(&self) -> &[String] {
    &self.entries
  }

  /// Write the tar trailer, finish the gzip stream and sync the file to disk.
  pub fn finish(self) -> Result<PathBuf> {
    let encoder = self.builder.into_inner().map_err(BundleError::archive)?;
    let mut buffered = encoder.finish().map_err(BundleError::archive)?;
    buffered.flush().map_err(BundleError::archive)?;
    let file = buffered
      .into_inner()
      .map_err(|err| BundleError::archive(err.into_error()))?;
    file.sync_all().map_err(BundleError::archive)?;
    Ok(self.path)
  }
}

fn unix_now() -> u64 {
  SystemTime::now()
    .duration_since(SystemTime::UNIX_EPOCH)
    .map(|elapsed| elapsed.as_secs())
    .unwrap_or_default()
}
