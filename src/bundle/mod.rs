//! Building blocks for writing a theme bundle: the archive stream, asset renames and the manifest.

pub mod archive;
pub mod manifest;
pub mod rename;
