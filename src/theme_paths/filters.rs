/// Determine whether a walked entry, and everything beneath it, is left out of the bundle.
///
/// Source directories and dot-prefixed entries never ship. The check applies at every depth
/// and to files as well as directories.
pub fn should_prune_entry(name: &str, excluded_dir_name: &str) -> bool {
    name == excluded_dir_name || name.starts_with('.')
}
