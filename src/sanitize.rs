use crate::constants::{JUNK_DIR_NAMES, JUNK_FILE_PATTERNS};
use glob::{MatchOptions, Pattern};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// What a sanitize pass changed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SanitizeReport {
    pub removed: usize,
    pub renamed: usize,
    /// Entries left under their padded name because the trimmed name was taken.
    pub collisions: usize,
}

/// Removes junk entries and trims stray whitespace from names under `root`.
/// Paths under `exclude` are left untouched.
pub fn sanitize(root: &Path, exclude: Option<&Path>) -> io::Result<SanitizeReport> {
    let removed = remove_junk(root, exclude)?;
    let (renamed, collisions) = trim_names(root, exclude)?;
    Ok(SanitizeReport {
        removed,
        renamed,
        collisions,
    })
}

fn junk_patterns() -> Vec<Pattern> {
    JUNK_FILE_PATTERNS
        .iter()
        .filter_map(|p| Pattern::new(p).ok())
        .collect()
}

pub fn is_junk_file(name: &str) -> bool {
    junk_patterns()
        .iter()
        .any(|p| p.matches_with(name, MATCH_OPTIONS))
}

pub fn is_junk_dir(name: &str) -> bool {
    JUNK_DIR_NAMES.iter().any(|d| d.eq_ignore_ascii_case(name))
}

fn excluded(path: &Path, exclude: Option<&Path>) -> bool {
    exclude.is_some_and(|e| path.starts_with(e))
}

/// Deletes metadata directories and byproduct files. Returns how many entries went.
pub fn remove_junk(root: &Path, exclude: Option<&Path>) -> io::Result<usize> {
    let patterns = junk_patterns();
    let mut junk_dirs = Vec::new();
    let mut junk_files = Vec::new();

    let mut walker = WalkDir::new(root).min_depth(1).into_iter();
    while let Some(entry) = walker.next() {
        let entry = entry.map_err(io::Error::from)?;
        let path = entry.path();
        if excluded(path, exclude) {
            if entry.file_type().is_dir() {
                walker.skip_current_dir();
            }
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if entry.file_type().is_dir() {
            if is_junk_dir(&name) {
                junk_dirs.push(path.to_path_buf());
                walker.skip_current_dir();
            }
        } else if patterns.iter().any(|p| p.matches_with(&name, MATCH_OPTIONS)) {
            junk_files.push(path.to_path_buf());
        }
    }

    let mut removed = 0;
    for dir in junk_dirs {
        match fs::remove_dir_all(&dir) {
            Ok(()) => removed += 1,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
    }
    for file in junk_files {
        match fs::remove_file(&file) {
            Ok(()) => removed += 1,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
    }
    Ok(removed)
}

/// Renames entries whose names carry leading or trailing whitespace.
///
/// Deepest paths go first so a renamed directory never invalidates a child
/// path still waiting in the queue. An existing entry under the trimmed name
/// wins; the padded one is then left as it is.
pub fn trim_names(root: &Path, exclude: Option<&Path>) -> io::Result<(usize, usize)> {
    let mut paths: Vec<PathBuf> = WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .filter_entry(|e| !excluded(e.path(), exclude))
        .map(|entry| entry.map(|e| e.into_path()).map_err(io::Error::from))
        .collect::<io::Result<_>>()?;
    paths.sort_by_key(|p| std::cmp::Reverse(p.components().count()));

    let mut renamed = 0;
    let mut collisions = 0;
    for path in paths {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let trimmed = name.trim();
        if trimmed == name || trimmed.is_empty() {
            continue;
        }
        let target = path.with_file_name(trimmed);
        if target.symlink_metadata().is_ok() {
            collisions += 1;
            continue;
        }
        fs::rename(&path, &target)?;
        renamed += 1;
    }
    Ok((renamed, collisions))
}
