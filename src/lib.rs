#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

pub mod bundle;
pub mod config;
pub mod error;
pub mod models;
pub mod packager;
pub mod theme_paths;

pub use config::{BundleConfig, RenameStrategy};
pub use error::{BundleError, BundleErrorKind, Result};
pub use models::{BundleSummary, RenameLog, RenameRecord, ThemeFile};
pub use packager::{TempBundle, ThemePackager};
