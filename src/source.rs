// Copyright 2025 Lablup Inc. and Jeongkyu Shin
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Source path resolution.
//!
//! Expands the configured source (a path or glob pattern) against the
//! workspace root into the ordered list of paths handed to rsync.
//!
//! Wildcards match within a single path component only: `*`, `**` and any
//! longer run of stars all mean "any sequence of characters except the
//! separator". Each directory level is listed and sorted by name, so the
//! result is ordered component by component.
//!
//! When the pattern matches nothing, or is not a valid glob, the original
//! pattern is returned untouched so that rsync reports the problem itself.

use glob::{MatchOptions, Pattern, PatternError};
use std::ffi::{OsStr, OsString};
use std::fs;
use std::path::{Component, Path, PathBuf, MAIN_SEPARATOR, MAIN_SEPARATOR_STR};

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Resolve `source` into concrete paths.
///
/// Relative sources are joined under `root` first; absolute sources are
/// matched as given. A trailing separator on `source` is carried over to
/// every match. File names are kept as raw OS strings, so matches that are
/// not valid UTF-8 reach rsync unchanged.
pub fn resolve(source: &str, root: &Path) -> Vec<OsString> {
    let pattern = if Path::new(source).is_absolute() {
        clean(Path::new(source))
    } else {
        clean(&root.join(source))
    };

    let mut matches = match expand(&pattern) {
        Ok(matches) => matches,
        Err(e) => {
            tracing::debug!("Invalid glob pattern {:?}: {}, passing through", pattern, e);
            return vec![OsString::from(source)];
        }
    };

    if matches.is_empty() {
        tracing::debug!("No paths matched {:?}, passing '{}' through", pattern, source);
        return vec![OsString::from(source)];
    }

    // Joining and cleaning drop the trailing separator, which tells rsync to
    // copy the directory contents rather than the directory itself.
    if source.ends_with(MAIN_SEPARATOR) {
        for path in &mut matches {
            path.push(MAIN_SEPARATOR_STR);
        }
    }

    tracing::debug!("Resolved source '{}' to {} path(s)", source, matches.len());
    matches
}

enum Segment<'a> {
    Literal(&'a OsStr),
    Wildcard(Pattern),
}

/// Walk the filesystem one component at a time, listing directories only
/// where a component carries wildcards.
fn expand(pattern: &Path) -> Result<Vec<OsString>, PatternError> {
    // Compile every component up front so a malformed pattern is rejected
    // even when an earlier directory does not exist.
    let segments = pattern
        .components()
        .map(|component| {
            let text = component.as_os_str();
            match text.to_str() {
                Some(text) if has_wildcards(text) => {
                    Pattern::new(&collapse_stars(text)).map(Segment::Wildcard)
                }
                _ => Ok(Segment::Literal(text)),
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut candidates = vec![PathBuf::new()];
    for segment in &segments {
        candidates = match segment {
            Segment::Literal(name) => candidates.into_iter().map(|dir| dir.join(name)).collect(),
            Segment::Wildcard(pattern) => candidates
                .iter()
                .flat_map(|dir| matching_entries(dir, pattern))
                .collect(),
        };
        if candidates.is_empty() {
            break;
        }
    }

    Ok(candidates
        .into_iter()
        .filter(|path| fs::symlink_metadata(path).is_ok())
        .map(PathBuf::into_os_string)
        .collect())
}

/// Entries of `dir` whose name matches `pattern`, sorted by name.
fn matching_entries(dir: &Path, pattern: &Pattern) -> Vec<PathBuf> {
    let listing = if dir.as_os_str().is_empty() {
        Path::new(".")
    } else {
        dir
    };

    // Unreadable or non-directory candidates simply contribute no matches
    let entries = match fs::read_dir(listing) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::trace!("Skipping {:?}: {}", listing, e);
            return Vec::new();
        }
    };

    let mut names: Vec<OsString> = entries
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry.file_name()),
            Err(e) => {
                tracing::warn!("Failed to read entry in {:?}: {}", listing, e);
                None
            }
        })
        .collect();
    names.sort();

    names
        .into_iter()
        .filter(|name| pattern.matches_with(&name.to_string_lossy(), MATCH_OPTIONS))
        .map(|name| dir.join(name))
        .collect()
}

fn has_wildcards(component: &str) -> bool {
    component.contains(|c| matches!(c, '*' | '?' | '['))
}

/// Reduce every run of `*` outside a `[...]` class to a single `*`.
fn collapse_stars(component: &str) -> String {
    #[derive(Clone, Copy)]
    enum State {
        Plain,
        ClassStart,
        ClassNegated,
        Class,
    }

    let mut collapsed = String::with_capacity(component.len());
    let mut state = State::Plain;

    for c in component.chars() {
        state = match (state, c) {
            (State::Plain, '*') if collapsed.ends_with('*') => continue,
            (State::Plain, '[') => State::ClassStart,
            (State::Plain, _) => State::Plain,
            (State::ClassStart, '!') => State::ClassNegated,
            // The first member of a class may be a literal `]`
            (State::ClassStart | State::ClassNegated, _) => State::Class,
            (State::Class, ']') => State::Plain,
            (State::Class, _) => State::Class,
        };
        collapsed.push(c);
    }

    collapsed
}

/// Lexically normalize a path: drop `.` segments, fold `..` into the
/// preceding segment where possible and drop trailing separators.
/// An empty result becomes `.`.
fn clean(path: &Path) -> PathBuf {
    let mut parts: Vec<Component<'_>> = Vec::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match parts.last() {
                Some(Component::Normal(_)) => {
                    parts.pop();
                }
                // `/..` is `/`
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => parts.push(component),
            },
            other => parts.push(other),
        }
    }

    if parts.is_empty() {
        return PathBuf::from(".");
    }
    parts.iter().collect()
}
