use crate::scanner::Target;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Windows reserved filenames that cannot be used
const WINDOWS_RESERVED: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Why a plan entry cannot be committed as-is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictKind {
    /// Two or more entries map to the same destination
    Duplicate,
    /// The destination exists and is not one of the batch's moving sources
    Exists,
    /// The new name is empty, `.`/`..`, or contains a separator
    InvalidName,
    /// The new name is a Windows device name (only reported on Windows)
    WindowsReserved,
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Duplicate => "another entry maps to the same destination",
            Self::Exists => "destination already exists",
            Self::InvalidName => "new name is not a valid file name",
            Self::WindowsReserved => "new name is a reserved device name",
        };
        f.write_str(s)
    }
}

/// One proposed rename
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanEntry {
    pub target: Target,
    pub new_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflict: Option<ConflictKind>,
}

impl PlanEntry {
    pub fn new(target: Target, new_name: String) -> Self {
        Self {
            target,
            new_name,
            conflict: None,
        }
    }

    pub fn source_path(&self) -> PathBuf {
        self.target.path()
    }

    pub fn dest_path(&self) -> PathBuf {
        self.target.root.join(&self.new_name)
    }

    /// The transformation left the name as it was
    pub fn is_unchanged(&self) -> bool {
        self.new_name == self.target.file_name()
    }

    /// Would be renamed by a commit without needing a decision
    pub fn is_actionable(&self) -> bool {
        self.conflict.is_none() && !self.is_unchanged()
    }
}

/// The full set of proposed renames for one `stage` call
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RenamePlan {
    pub root: PathBuf,
    pub entries: Vec<PlanEntry>,
    /// Subtrees skipped during discovery
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub case_insensitive_fs: bool,
}

impl RenamePlan {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn conflicts(&self) -> impl Iterator<Item = &PlanEntry> {
        self.entries.iter().filter(|e| e.conflict.is_some())
    }

    pub fn actionable(&self) -> impl Iterator<Item = &PlanEntry> {
        self.entries.iter().filter(|e| e.is_actionable())
    }
}

/// Check if the filesystem at the given path is case-insensitive.
///
/// Read-only check: looks up the nearest ancestor whose name has letters
/// under its case-flipped name and checks both resolve to the same entry.
pub fn detect_case_insensitive_fs(path: &Path) -> bool {
    let Ok(path) = path.canonicalize() else {
        return false; // Assume case-sensitive if we can't test
    };

    for ancestor in path.ancestors() {
        let Some(name) = ancestor.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let flipped: String = name
            .chars()
            .map(|c| {
                if c.is_ascii_lowercase() {
                    c.to_ascii_uppercase()
                } else {
                    c.to_ascii_lowercase()
                }
            })
            .collect();
        if flipped == name {
            continue;
        }

        return match (fs::metadata(ancestor), fs::metadata(ancestor.with_file_name(&flipped))) {
            (Ok(original), Ok(alternate)) => same_entry(&original, &alternate),
            _ => false,
        };
    }

    false
}

#[cfg(unix)]
fn same_entry(a: &fs::Metadata, b: &fs::Metadata) -> bool {
    use std::os::unix::fs::MetadataExt;
    a.dev() == b.dev() && a.ino() == b.ino()
}

#[cfg(not(unix))]
fn same_entry(_a: &fs::Metadata, _b: &fs::Metadata) -> bool {
    true
}

/// Check if a filename is a Windows reserved name
pub fn is_windows_reserved(name: &str) -> bool {
    let base = name.split('.').next().unwrap_or(name).to_uppercase();
    WINDOWS_RESERVED.contains(&base.as_str())
}

fn is_invalid_name(name: &str) -> bool {
    name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\0')
        || (cfg!(windows) && name.contains('\\'))
}

pub(crate) fn path_key(path: &Path, case_insensitive: bool) -> PathBuf {
    if case_insensitive {
        PathBuf::from(path.to_string_lossy().to_lowercase())
    } else {
        path.to_path_buf()
    }
}

/// Annotate every entry of the plan with its conflict, if any.
///
/// Destinations shared by several entries are all marked `Duplicate`.
/// A destination that exists on disk is only acceptable when its current
/// occupant is itself moving away in this batch; otherwise it is `Exists`.
pub fn resolve(mut plan: RenamePlan) -> RenamePlan {
    let ci = plan.case_insensitive_fs;

    for entry in &mut plan.entries {
        entry.conflict = None;
        if entry.is_unchanged() {
            continue;
        }
        if is_invalid_name(&entry.new_name) {
            entry.conflict = Some(ConflictKind::InvalidName);
        } else if cfg!(windows) && is_windows_reserved(&entry.new_name) {
            entry.conflict = Some(ConflictKind::WindowsReserved);
        }
    }

    let mut destinations: HashMap<PathBuf, Vec<usize>> = HashMap::new();
    for (idx, entry) in plan.entries.iter().enumerate() {
        if entry.conflict.is_none() && !entry.is_unchanged() {
            destinations
                .entry(path_key(&entry.dest_path(), ci))
                .or_default()
                .push(idx);
        }
    }
    for indices in destinations.values().filter(|v| v.len() > 1) {
        for &idx in indices {
            plan.entries[idx].conflict = Some(ConflictKind::Duplicate);
        }
    }

    // Entries that stop moving keep occupying their path, so iterate to a fixpoint
    loop {
        let moving: HashSet<PathBuf> = plan
            .entries
            .iter()
            .filter(|e| e.is_actionable())
            .map(|e| path_key(&e.source_path(), ci))
            .collect();

        let mut changed = false;
        for entry in plan.entries.iter_mut().filter(|e| e.is_actionable()) {
            let to = entry.dest_path();
            let to_key = path_key(&to, ci);
            if to_key == path_key(&entry.source_path(), ci) {
                // Case-only rename of the same entry
                continue;
            }
            if fs::symlink_metadata(&to).is_ok() && !moving.contains(&to_key) {
                entry.conflict = Some(ConflictKind::Exists);
                changed = true;
            }
        }

        if !changed {
            break;
        }
    }

    plan
}
