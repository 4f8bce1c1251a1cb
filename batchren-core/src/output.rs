use crate::apply::{CommitReport, Outcome};
use crate::rename::RenamePlan;
use crate::scanner::TargetKind;
use comfy_table::{Cell, Color, ContentArrangement, Table};
use nu_ansi_term::{Color as AnsiColor, Style};
use serde_json::json;
use std::fmt::Write;
use std::io::{self, IsTerminal};
use std::path::Path;

/// Output format for front ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Summary,
    Json,
}

/// Trait for formatting output in different formats
pub trait OutputFormatter {
    fn format(&self, format: OutputFormat) -> String {
        match format {
            OutputFormat::Json => self.format_json(),
            OutputFormat::Summary => self.format_summary(),
        }
    }
    fn format_json(&self) -> String;
    fn format_summary(&self) -> String;
}

impl OutputFormatter for RenamePlan {
    fn format_json(&self) -> String {
        serde_json::to_string(&json!({
            "success": true,
            "operation": "stage",
            "root": self.root,
            "summary": {
                "entries": self.len(),
                "actionable": self.actionable().count(),
                "conflicts": self.conflicts().count(),
            },
            "entries": self.entries,
            "warnings": self.warnings,
        }))
        .unwrap_or_default()
    }

    fn format_summary(&self) -> String {
        let mut output = String::new();
        let _ = writeln!(output, "Rename plan for {}", self.root.display());
        let _ = writeln!(
            output,
            "Entries: {} ({} to rename, {} conflicts)",
            self.len(),
            self.actionable().count(),
            self.conflicts().count()
        );
        for warning in &self.warnings {
            let _ = writeln!(output, "Warning: {}", warning);
        }
        output
    }
}

impl OutputFormatter for CommitReport {
    fn format_json(&self) -> String {
        serde_json::to_string(&json!({
            "success": self.is_success(),
            "operation": "commit",
            "aborted": self.aborted,
            "summary": {
                "renamed": self.count(Outcome::Renamed),
                "simulated": self.count(Outcome::Simulated),
                "skipped": self.count(Outcome::Skipped),
                "failed": self.count(Outcome::Failed),
            },
            "results": self.results,
        }))
        .unwrap_or_default()
    }

    fn format_summary(&self) -> String {
        let mut output = String::new();

        let renamed = self.count(Outcome::Renamed);
        let simulated = self.count(Outcome::Simulated);
        if simulated > 0 {
            let _ = writeln!(output, "Would rename {} items", simulated);
        }
        if renamed > 0 {
            let _ = writeln!(output, "✓ Renamed {} items", renamed);
        }

        let skipped = self.count(Outcome::Skipped);
        if skipped > 0 {
            let _ = writeln!(output, "Skipped {} items", skipped);
        }
        for failure in self.failures() {
            let _ = writeln!(
                output,
                "✗ {}: {}",
                failure.from.display(),
                failure.reason.as_deref().unwrap_or("failed")
            );
        }
        if self.aborted {
            output.push_str("Batch aborted\n");
        }
        if renamed == 0 && simulated == 0 && skipped == 0 && !self.aborted {
            output.push_str("Nothing to rename\n");
        }

        output
    }
}

/// Render a staged plan as a table
pub fn render_plan_table(plan: &RenamePlan, use_color: bool) -> String {
    let mut table = Table::new();

    if io::stdout().is_terminal() {
        table.set_content_arrangement(ContentArrangement::Dynamic);
    } else {
        table.set_content_arrangement(ContentArrangement::Disabled);
    }

    // Force styling even in non-TTY environments when colors are explicitly requested
    if use_color {
        table.enforce_styling();
        table.set_header(vec![
            Cell::new("From").fg(Color::Cyan),
            Cell::new("To").fg(Color::Cyan),
            Cell::new("Kind").fg(Color::Cyan),
            Cell::new("Status").fg(Color::Cyan),
        ]);
    } else {
        table.set_header(vec!["From", "To", "Kind", "Status"]);
    }

    for entry in &plan.entries {
        let from = relative_to(&entry.source_path(), &plan.root);
        let to = relative_to(&entry.dest_path(), &plan.root);
        let kind = match entry.target.kind {
            TargetKind::File => "File",
            TargetKind::Dir => "Dir",
        };
        let (status, color) = match entry.conflict {
            Some(conflict) => (conflict.to_string(), Color::Red),
            None if entry.is_unchanged() => ("unchanged".to_string(), Color::DarkGrey),
            None => ("ok".to_string(), Color::Green),
        };

        if use_color {
            table.add_row(vec![
                Cell::new(&from),
                Cell::new(&to),
                Cell::new(kind).fg(Color::Blue),
                Cell::new(&status).fg(color),
            ]);
        } else {
            table.add_row(vec![from, to, kind.to_string(), status]);
        }
    }

    table.to_string()
}

/// One line per result, `from -> to` with the outcome
pub fn render_report_lines(report: &CommitReport, use_color: bool) -> String {
    let mut output = String::new();

    for result in &report.results {
        let (label, color) = match result.outcome {
            Outcome::Renamed => ("renamed", AnsiColor::Green),
            Outcome::Simulated => ("would rename", AnsiColor::Cyan),
            Outcome::Skipped => ("skipped", AnsiColor::Yellow),
            Outcome::Failed => ("failed", AnsiColor::Red),
        };
        let label = if use_color {
            Style::new().fg(color).bold().paint(label).to_string()
        } else {
            label.to_string()
        };

        let _ = write!(
            output,
            "{}: {} -> {}",
            label,
            result.from.display(),
            result.to.display()
        );
        match &result.reason {
            Some(reason) => {
                let _ = writeln!(output, " ({})", reason);
            },
            None => output.push('\n'),
        }
    }

    output
}

fn relative_to(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}
