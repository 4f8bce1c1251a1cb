use crate::error::{Error, Result};
use crate::options::Options;
use crate::pattern::PatternMatcher;
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Whether a target is a file or a directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    File,
    Dir,
}

/// One filesystem entry considered for renaming
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    /// Directory containing the entry
    pub root: PathBuf,
    /// Base name without the extension
    pub name: String,
    /// Extension including its dot, empty for directories and extensionless files
    pub extension: String,
    pub kind: TargetKind,
}

impl Target {
    pub fn new(root: impl Into<PathBuf>, file_name: &str, kind: TargetKind) -> Self {
        let (name, extension) = match kind {
            TargetKind::File => split_extension(file_name),
            TargetKind::Dir => (file_name, ""),
        };
        Self {
            root: root.into(),
            name: name.to_string(),
            extension: extension.to_string(),
            kind,
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}{}", self.name, self.extension)
    }

    pub fn path(&self) -> PathBuf {
        self.root.join(self.file_name())
    }

    pub fn is_dir(&self) -> bool {
        self.kind == TargetKind::Dir
    }
}

/// Split a file name into stem and extension at the last dot.
///
/// Leading dots never start an extension, so `.bashrc` has none.
pub fn split_extension(file_name: &str) -> (&str, &str) {
    let stripped = file_name.trim_start_matches('.');
    let offset = file_name.len() - stripped.len();
    match stripped.rfind('.') {
        Some(idx) => file_name.split_at(offset + idx),
        None => (file_name, ""),
    }
}

/// Walks a root directory and yields the entries matching a source pattern
#[derive(Debug, Clone)]
pub struct Discoverer {
    root: PathBuf,
    matcher: PatternMatcher,
    exclude: Option<GlobSet>,
    recursive: bool,
    hidden: bool,
    dirsonly: bool,
    filesonly: bool,
}

impl Discoverer {
    pub fn new(root: &Path, matcher: PatternMatcher, options: &Options) -> Result<Self> {
        Ok(Self {
            root: root.to_path_buf(),
            matcher,
            exclude: build_globset(&options.exclude)?,
            recursive: options.recursive,
            hidden: options.hidden,
            dirsonly: options.dirsonly,
            filesonly: options.filesonly,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Start a fresh traversal. Each call restarts from the root.
    pub fn iter(&self) -> Targets<'_> {
        let max_depth = if self.recursive { usize::MAX } else { 1 };
        let walker = WalkDir::new(&self.root)
            .min_depth(1)
            .max_depth(max_depth)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter();

        Targets {
            discoverer: self,
            walker,
        }
    }

    fn is_excluded(&self, file_name: &str) -> bool {
        self.exclude
            .as_ref()
            .is_some_and(|set| set.is_match(file_name))
    }
}

impl<'a> IntoIterator for &'a Discoverer {
    type Item = Result<Target>;
    type IntoIter = Targets<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Lazy traversal produced by [`Discoverer::iter`].
///
/// Unreadable directories surface as `Error::Discovery` items; the walk
/// continues with the next sibling.
pub struct Targets<'a> {
    discoverer: &'a Discoverer,
    walker: walkdir::IntoIter,
}

impl Iterator for Targets<'_> {
    type Item = Result<Target>;

    fn next(&mut self) -> Option<Self::Item> {
        let d = self.discoverer;

        loop {
            let entry = match self.walker.next()? {
                Ok(entry) => entry,
                Err(err) => return Some(Err(discovery_error(err, &d.root))),
            };

            let is_dir = entry.file_type().is_dir();
            let Some(file_name) = entry.file_name().to_str() else {
                warn!(path = %entry.path().display(), "skipping entry with non UTF-8 name");
                if is_dir {
                    self.walker.skip_current_dir();
                }
                continue;
            };

            if !d.hidden && file_name.starts_with('.') {
                if is_dir {
                    self.walker.skip_current_dir();
                }
                continue;
            }
            if d.is_excluded(file_name) {
                debug!(name = file_name, "excluded");
                if is_dir {
                    self.walker.skip_current_dir();
                }
                continue;
            }
            if (is_dir && d.filesonly) || (!is_dir && d.dirsonly) {
                continue;
            }

            let kind = if is_dir {
                TargetKind::Dir
            } else {
                TargetKind::File
            };
            let parent = entry.path().parent().unwrap_or(&d.root);
            let target = Target::new(parent, file_name, kind);

            if d.matcher.matches_target(&target) {
                return Some(Ok(target));
            }
        }
    }
}

fn discovery_error(err: walkdir::Error, root: &Path) -> Error {
    let path = err.path().unwrap_or(root).to_path_buf();
    let source = err
        .into_io_error()
        .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, "filesystem loop detected"));
    Error::Discovery { path, source }
}

/// Build a globset from exclude patterns
pub fn build_globset(patterns: &[String]) -> Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }

    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| Error::config("exclude", format!("bad glob '{}': {}", pattern, e)))?;
        builder.add(glob);
    }
    let set = builder
        .build()
        .map_err(|e| Error::config("exclude", e.to_string()))?;
    Ok(Some(set))
}
