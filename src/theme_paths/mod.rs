//! Helpers for deciding which theme files are packaged and under what names.
//!
//! Filtering, name sanitization and the directory walk live in separate submodules so
//! each policy can be tested on its own. The packager composes them in `crate::packager`.

mod filters;
mod sanitize;
mod walk;

pub use filters::should_prune_entry;
pub use sanitize::{is_within_assets_dir, needs_rename, sanitize_file_name, sanitized_name};
pub use walk::ThemeWalk;
