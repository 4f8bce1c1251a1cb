use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

/// Whether an entry records a forward rename or the reversal of one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryKind {
    Commit,
    Undo,
}

/// Represents a single committed rename
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Sequence number, unique within the log
    pub id: u64,
    pub old_path: PathBuf,
    pub new_path: PathBuf,
    /// RFC 3339 timestamp of the rename
    pub timestamp: String,
    pub kind: HistoryKind,
    /// For undo entries, the id of the entry being reverted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revert_of: Option<u64>,
}

/// Append-only record of committed renames
#[derive(Debug, Clone, Default)]
pub struct UndoLog {
    entries: Vec<HistoryEntry>,
}

impl UndoLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a log previously written with [`UndoLog::save_to_path`]
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let entries = if path.exists() {
            let file = File::open(path)
                .with_context(|| format!("Failed to open history file: {}", path.display()))?;
            let reader = BufReader::new(file);
            serde_json::from_reader(reader)
                .with_context(|| format!("Failed to parse history file: {}", path.display()))?
        } else {
            Vec::new()
        };

        Ok(Self { entries })
    }

    /// Write the log as JSON, creating parent directories as needed
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)
            .with_context(|| format!("Failed to create history file: {}", path.display()))?;

        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, &self.entries)
            .with_context(|| format!("Failed to write history file: {}", path.display()))?;

        Ok(())
    }

    /// Record a rename and return the stored entry
    pub fn record(
        &mut self,
        old_path: PathBuf,
        new_path: PathBuf,
        kind: HistoryKind,
        revert_of: Option<u64>,
    ) -> &HistoryEntry {
        let id = self.entries.last().map_or(1, |e| e.id + 1);
        self.entries.push(HistoryEntry {
            id,
            old_path,
            new_path,
            timestamp: chrono::Local::now().to_rfc3339(),
            kind,
            revert_of,
        });
        &self.entries[self.entries.len() - 1]
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last_entry(&self) -> Option<&HistoryEntry> {
        self.entries.last()
    }

    /// All entries, most recent first, optionally limited to N
    pub fn list_entries(&self, limit: Option<usize>) -> Vec<&HistoryEntry> {
        let entries = self.entries.iter().rev();
        match limit {
            Some(limit) => entries.take(limit).collect(),
            None => entries.collect(),
        }
    }

    pub fn is_reverted(&self, id: u64) -> bool {
        self.entries.iter().any(|e| e.revert_of == Some(id))
    }

    /// The last `count` commit entries that have not been reverted yet, most recent first
    pub fn undoable(&self, count: usize) -> Vec<HistoryEntry> {
        let reverted: HashSet<u64> = self.entries.iter().filter_map(|e| e.revert_of).collect();
        self.entries
            .iter()
            .rev()
            .filter(|e| e.kind == HistoryKind::Commit && !reverted.contains(&e.id))
            .take(count)
            .cloned()
            .collect()
    }
}

/// Format history entries for display
pub fn format_history(entries: &[&HistoryEntry], json: bool) -> Result<String> {
    if json {
        Ok(serde_json::to_string_pretty(entries)?)
    } else {
        use comfy_table::{Cell, Color, Table};

        let mut table = Table::new();
        table.set_header(vec![
            Cell::new("ID").fg(Color::Cyan),
            Cell::new("Date").fg(Color::Cyan),
            Cell::new("Type").fg(Color::Cyan),
            Cell::new("From").fg(Color::Cyan),
            Cell::new("To").fg(Color::Cyan),
        ]);

        for entry in entries {
            let date = entry
                .timestamp
                .split('T')
                .next()
                .unwrap_or(&entry.timestamp);
            let kind = match entry.kind {
                HistoryKind::Commit => "rename",
                HistoryKind::Undo => "undo",
            };

            table.add_row(vec![
                entry.id.to_string(),
                date.to_string(),
                kind.to_string(),
                entry.old_path.display().to_string(),
                entry.new_path.display().to_string(),
            ]);
        }

        Ok(table.to_string())
    }
}
