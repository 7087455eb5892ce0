//! Path pattern matching for exceptions and approvals.
//!
//! A pattern matches when it is byte-equal to the path or, when it contains
//! glob metacharacters, when the compiled glob matches. Both sides are
//! separator-normalized first. `*` stays inside one path segment; crossing
//! directories takes `**`. An invalid glob matches nothing.

use globset::GlobBuilder;

const GLOB_META: &[char] = &['*', '?', '[', '{'];

pub fn normalize_separators(path: &str) -> String {
    path.replace('\\', "/")
}

pub fn path_matches(pattern: &str, path: &str) -> bool {
    let pattern = normalize_separators(pattern.trim());
    let path = normalize_separators(path);
    if pattern.is_empty() {
        return false;
    }
    if pattern == path {
        return true;
    }
    if !pattern.contains(GLOB_META) {
        return false;
    }
    match GlobBuilder::new(&pattern).literal_separator(true).build() {
        Ok(glob) => glob.compile_matcher().is_match(&path),
        Err(_) => false,
    }
}
