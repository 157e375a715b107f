use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use theme_bundler::{BundleConfig, RenameStrategy, ThemePackager};

/// Package a theme directory into an upload-ready `.tar.gz` bundle.
#[derive(Debug, Parser)]
#[command(name = "theme-bundle", version, about)]
struct Cli {
  /// Theme directory containing `about.json`.
  theme_dir: PathBuf,

  /// Destination archive. Defaults to `<theme>.tar.gz` in the current directory.
  #[arg(short, long)]
  output: Option<PathBuf>,

  /// Configuration file to use instead of the theme's `.theme-bundle.json`.
  #[arg(long)]
  config: Option<PathBuf>,

  /// Rename unsafe asset files on disk while packing instead of renaming them only in the archive.
  #[arg(long)]
  in_place_renames: bool,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
    )
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();

  let mut config = match &cli.config {
    Some(path) => BundleConfig::from_path(path)
      .with_context(|| format!("failed to load configuration from {}", path.display()))?,
    None => BundleConfig::discover(&cli.theme_dir),
  };
  if cli.in_place_renames {
    config = config.with_rename_strategy(RenameStrategy::InPlace);
  }

  let packager = ThemePackager::new(&cli.theme_dir, config)
    .with_context(|| format!("failed to open theme at {}", cli.theme_dir.display()))?;
  let output = cli
    .output
    .unwrap_or_else(|| PathBuf::from(format!("{}.tar.gz", packager.theme_name())));

  let summary = packager
    .package(&output)
    .with_context(|| format!("failed to package {}", packager.root().display()))?;

  println!(
    "{} ({} entries, {} renamed)",
    summary.archive_path.display(),
    summary.entries.len(),
    summary.renames.len()
  );
  Ok(())
}
