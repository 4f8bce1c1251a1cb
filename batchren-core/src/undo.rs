use crate::apply::{CommitReport, CommitResult, Executor, Move, Outcome};
use crate::events::{EngineEvent, EventSink};
use crate::history::{HistoryKind, UndoLog};
use crate::options::Options;
use crate::rename::detect_case_insensitive_fs;
use std::path::Path;
use tracing::info;

/// Revert the last `count` committed renames that are not reverted yet.
///
/// Entries are replayed most recent first (`new_path -> old_path`) and each
/// success is appended to the log as an undo entry. Honors `simulate` and
/// `autostop` like a commit.
pub fn undo(
    count: usize,
    options: &Options,
    log: &mut UndoLog,
    events: &dyn EventSink,
) -> CommitReport {
    let mut report = CommitReport::default();
    let entries = log.undoable(count);
    if entries.is_empty() {
        info!("nothing to undo");
        return report;
    }

    if options.simulate {
        for entry in entries {
            events.emit(&EngineEvent::Simulated {
                from: entry.new_path.clone(),
                to: entry.old_path.clone(),
            });
            report.results.push(CommitResult {
                from: entry.new_path,
                to: entry.old_path,
                outcome: Outcome::Simulated,
                reason: None,
                error_kind: None,
            });
        }
        return report;
    }

    let case_insensitive = entries
        .first()
        .and_then(|e| e.old_path.parent())
        .is_some_and(|dir| detect_case_insensitive_fs(dir_or_cwd(dir)));

    let moves = entries
        .into_iter()
        .map(|entry| {
            let mut mv = Move::new(entry.new_path, entry.old_path);
            mv.revert_of = Some(entry.id);
            mv
        })
        .collect();

    info!(count, "undoing renames");
    let mut executor = Executor {
        log,
        events,
        autostop: options.autostop,
        case_insensitive,
        kind: HistoryKind::Undo,
        temp_counter: 0,
    };
    executor.run(moves, &mut report);

    if report.aborted {
        events.emit(&EngineEvent::Aborted);
    }
    report
}

fn dir_or_cwd(dir: &Path) -> &Path {
    if dir.as_os_str().is_empty() {
        Path::new(".")
    } else {
        dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apply::{commit, CommitContext};
    use crate::events::{MemorySink, NullSink};
    use crate::rename::{resolve, PlanEntry, RenamePlan};
    use crate::scanner::{Target, TargetKind};
    use std::fs;
    use tempfile::TempDir;

    fn commit_renames(root: &Path, renames: &[(&str, &str)], log: &mut UndoLog) {
        let entries = renames
            .iter()
            .map(|(old, new)| {
                PlanEntry::new(Target::new(root, old, TargetKind::File), (*new).to_string())
            })
            .collect();
        let plan = resolve(RenamePlan {
            root: root.to_path_buf(),
            entries,
            warnings: vec![],
            case_insensitive_fs: detect_case_insensitive_fs(root),
        });
        let ctx = CommitContext {
            options: &Options::default(),
            confirmer: None,
            events: &NullSink,
        };
        assert!(commit(&plan, &ctx, log).is_success());
    }

    #[test]
    fn test_undo_restores_and_records() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.txt"), "a").unwrap();

        let mut log = UndoLog::new();
        commit_renames(temp.path(), &[("a.txt", "b.txt")], &mut log);

        let sink = MemorySink::new();
        let report = undo(1, &Options::default(), &mut log, &sink);
        assert!(report.is_success());
        assert_eq!(fs::read_to_string(temp.path().join("a.txt")).unwrap(), "a");
        assert!(!temp.path().join("b.txt").exists());

        assert_eq!(log.len(), 2);
        let last = log.last_entry().unwrap();
        assert_eq!(last.kind, HistoryKind::Undo);
        assert_eq!(last.revert_of, Some(1));
        assert!(matches!(sink.events()[0], EngineEvent::Undone { .. }));
    }

    #[test]
    fn test_undo_skips_reverted_entries() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.txt"), "").unwrap();

        let mut log = UndoLog::new();
        commit_renames(temp.path(), &[("a.txt", "b.txt")], &mut log);
        commit_renames(temp.path(), &[("b.txt", "c.txt")], &mut log);

        undo(1, &Options::default(), &mut log, &NullSink);
        assert!(temp.path().join("b.txt").exists());

        // The second undo reaches the older commit
        undo(1, &Options::default(), &mut log, &NullSink);
        assert!(temp.path().join("a.txt").exists());

        // Nothing left
        let report = undo(1, &Options::default(), &mut log, &NullSink);
        assert!(report.results.is_empty());
    }

    #[test]
    fn test_undo_of_swap() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.txt"), "a").unwrap();
        fs::write(temp.path().join("b.txt"), "b").unwrap();

        let mut log = UndoLog::new();
        commit_renames(temp.path(), &[("a.txt", "b.txt"), ("b.txt", "a.txt")], &mut log);
        assert_eq!(fs::read_to_string(temp.path().join("a.txt")).unwrap(), "b");

        let report = undo(2, &Options::default(), &mut log, &NullSink);
        assert!(report.is_success());
        assert_eq!(fs::read_to_string(temp.path().join("a.txt")).unwrap(), "a");
        assert_eq!(fs::read_to_string(temp.path().join("b.txt")).unwrap(), "b");
    }

    #[test]
    fn test_undo_simulate_changes_nothing() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.txt"), "").unwrap();

        let mut log = UndoLog::new();
        commit_renames(temp.path(), &[("a.txt", "b.txt")], &mut log);

        let options = Options {
            simulate: true,
            ..Options::default()
        };
        let report = undo(1, &options, &mut log, &NullSink);
        assert_eq!(report.count(Outcome::Simulated), 1);
        assert!(temp.path().join("b.txt").exists());
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_undo_refuses_to_clobber() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.txt"), "moved").unwrap();

        let mut log = UndoLog::new();
        commit_renames(temp.path(), &[("a.txt", "b.txt")], &mut log);
        fs::write(temp.path().join("a.txt"), "newcomer").unwrap();

        let report = undo(1, &Options::default(), &mut log, &NullSink);
        assert_eq!(report.count(Outcome::Failed), 1);
        assert_eq!(
            fs::read_to_string(temp.path().join("a.txt")).unwrap(),
            "newcomer"
        );
        // A failed undo is not recorded
        assert_eq!(log.len(), 1);
    }
}
