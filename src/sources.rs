//! Source file discovery: explicit files, glob patterns and directory scans.

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("cannot access {}: {source}", .path.display())]
    Stat {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid glob pattern '{pattern}': {source}")]
    Glob {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("failed to walk {}: {source}", .path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

/// Compile `globs` into one matcher. `*` does not cross directory
/// separators; `**` does.
pub fn build_globset<S: AsRef<str>>(globs: &[S]) -> Result<GlobSet, SourceError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in globs {
        let pattern = pattern.as_ref();
        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .map_err(|source| SourceError::Glob {
                pattern: pattern.to_string(),
                source,
            })?;
        builder.add(glob);
    }
    builder.build().map_err(|source| SourceError::Glob {
        pattern: globs
            .iter()
            .map(|g| g.as_ref())
            .collect::<Vec<_>>()
            .join(","),
        source,
    })
}

/// Files under `dir`, in a stable order.
///
/// Only the top level is listed unless `recursive` is set. With a `filter`,
/// only files whose path relative to `dir` matches are returned.
pub fn scan_directory(
    dir: &Path,
    recursive: bool,
    filter: Option<&GlobSet>,
) -> Result<Vec<PathBuf>, SourceError> {
    let mut walker = WalkDir::new(dir).sort_by_file_name();
    if !recursive {
        walker = walker.max_depth(1);
    }

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|source| SourceError::Walk {
            path: dir.to_path_buf(),
            source,
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(dir).unwrap_or(entry.path());
        if filter.map_or(true, |set| set.is_match(relative)) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Expand each directory in `sources` to the files below it matching
/// `globs`. Plain files pass through untouched; without globs nothing is
/// expanded.
pub fn collect_sources<S: AsRef<str>>(sources: &[PathBuf], globs: &[S]) -> Result<Vec<PathBuf>, SourceError> {
    if globs.is_empty() {
        return Ok(sources.to_vec());
    }

    let set = build_globset(globs)?;
    let mut collected = Vec::new();
    for source in sources {
        let metadata = fs::metadata(source).map_err(|e| SourceError::Stat {
            path: source.clone(),
            source: e,
        })?;
        if metadata.is_dir() {
            collected.extend(scan_directory(source, true, Some(&set))?);
        } else {
            collected.push(source.clone());
        }
    }
    Ok(collected)
}

fn has_glob_meta(component: &str) -> bool {
    component.contains(['*', '?', '[', '{'])
}

/// Files on disk matching a glob pattern such as `src/**/*.go`.
pub fn expand_glob(pattern: &str) -> Result<Vec<PathBuf>, SourceError> {
    let set = build_globset(&[pattern])?;

    // walk from the longest literal prefix of the pattern
    let mut base = PathBuf::new();
    for component in Path::new(pattern).components() {
        match component {
            Component::Normal(part) if has_glob_meta(&part.to_string_lossy()) => break,
            other => base.push(other),
        }
    }
    if base == Path::new(pattern) {
        return Ok(if base.is_file() { vec![base] } else { Vec::new() });
    }

    let root = if base.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        base
    };
    if !root.is_dir() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(&root).sort_by_file_name() {
        let entry = entry.map_err(|source| SourceError::Walk {
            path: root.clone(),
            source,
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let candidate = if pattern.starts_with("./") || root != Path::new(".") {
            entry.path().to_path_buf()
        } else {
            entry
                .path()
                .strip_prefix(".")
                .unwrap_or(entry.path())
                .to_path_buf()
        };
        if set.is_match(&candidate) {
            files.push(candidate);
        }
    }
    Ok(files)
}

/// Remove repeated paths, keeping the first occurrence.
pub fn dedupe(files: Vec<PathBuf>) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    files
        .into_iter()
        .filter(|file| seen.insert(file.clone()))
        .collect()
}
