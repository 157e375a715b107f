use std::sync::OnceLock;

use regex::Regex;

fn safe_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\A[A-Za-z0-9_\-./]+\z").expect("invalid safe name regex"))
}

fn unsafe_char_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[^A-Za-z0-9_./]").expect("invalid unsafe char regex"))
}

/// Whether a theme-relative path lives below a directory named `assets_dir_name`.
///
/// Only directory segments count, so a file that is itself called `assets` does not qualify.
pub fn is_within_assets_dir(theme_relative: &str, assets_dir_name: &str) -> bool {
    let mut segments: Vec<&str> = theme_relative.split('/').collect();
    segments.pop();
    segments.iter().any(|segment| *segment == assets_dir_name)
}

/// Decide whether a file has to be renamed before it is archived.
///
/// Names are only rewritten for files under an assets directory. Unsafe names elsewhere
/// in the theme are packaged as they are.
pub fn needs_rename(file_name: &str, theme_relative: &str, assets_dir_name: &str) -> bool {
    !safe_name_pattern().is_match(file_name) && is_within_assets_dir(theme_relative, assets_dir_name)
}

/// Replace every character outside `[A-Za-z0-9_./]` with `-`, one for one.
pub fn sanitize_file_name(file_name: &str) -> String {
    unsafe_char_pattern().replace_all(file_name, "-").into_owned()
}

/// Sanitized base name for the file, or `None` when it can be archived as is.
pub fn sanitized_name(file_name: &str, theme_relative: &str, assets_dir_name: &str) -> Option<String> {
    needs_rename(file_name, theme_relative, assets_dir_name).then(|| sanitize_file_name(file_name))
}
