use crate::error::{Error, IoErrorKind};
use crate::events::{EngineEvent, EventSink};
use crate::history::{HistoryKind, UndoLog};
use crate::options::Options;
use crate::rename::{path_key, ConflictKind, PlanEntry, RenamePlan};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// What happened to one entry during a commit or an undo
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Renamed,
    Simulated,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitResult {
    pub from: PathBuf,
    pub to: PathBuf,
    pub outcome: Outcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<IoErrorKind>,
}

impl CommitResult {
    fn new(from: PathBuf, to: PathBuf, outcome: Outcome) -> Self {
        Self {
            from,
            to,
            outcome,
            reason: None,
            error_kind: None,
        }
    }
}

/// Per-entry results of a commit or undo, in execution order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitReport {
    pub results: Vec<CommitResult>,
    /// The batch stopped early because of `autostop`
    pub aborted: bool,
}

impl CommitReport {
    pub fn count(&self, outcome: Outcome) -> usize {
        self.results.iter().filter(|r| r.outcome == outcome).count()
    }

    pub fn renamed(&self) -> impl Iterator<Item = &CommitResult> {
        self.results
            .iter()
            .filter(|r| r.outcome == Outcome::Renamed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &CommitResult> {
        self.results.iter().filter(|r| r.outcome == Outcome::Failed)
    }

    /// Nothing failed and the batch ran to the end
    pub fn is_success(&self) -> bool {
        !self.aborted && self.failures().next().is_none()
    }

    fn skip(&mut self, events: &dyn EventSink, from: PathBuf, to: PathBuf, reason: String) {
        debug!(from = %from.display(), to = %to.display(), %reason, "skipped");
        events.emit(&EngineEvent::Skipped {
            from: from.clone(),
            to: to.clone(),
            reason: reason.clone(),
        });
        self.results.push(CommitResult {
            reason: Some(reason),
            ..CommitResult::new(from, to, Outcome::Skipped)
        });
    }
}

/// Decides whether a single entry may be renamed
pub trait Confirm: Send + Sync {
    fn confirm(&self, entry: &PlanEntry) -> bool;
}

impl<F> Confirm for F
where
    F: Fn(&PlanEntry) -> bool + Send + Sync,
{
    fn confirm(&self, entry: &PlanEntry) -> bool {
        self(entry)
    }
}

/// Everything a commit needs besides the plan and the log
pub struct CommitContext<'a> {
    pub options: &'a Options,
    pub confirmer: Option<&'a dyn Confirm>,
    pub events: &'a dyn EventSink,
}

/// One filesystem move scheduled by a commit or an undo
#[derive(Debug, Clone)]
pub(crate) struct Move {
    pub from: PathBuf,
    pub to: PathBuf,
    pub overwrite: bool,
    pub revert_of: Option<u64>,
    /// Temporary location while the move is parked to break a cycle
    parked: Option<PathBuf>,
}

impl Move {
    pub(crate) fn new(from: PathBuf, to: PathBuf) -> Self {
        Self {
            from,
            to,
            overwrite: false,
            revert_of: None,
            parked: None,
        }
    }

    fn current(&self) -> &Path {
        self.parked.as_deref().unwrap_or(&self.from)
    }
}

/// Commit a resolved plan.
///
/// Conflicted entries are skipped (`Exists` may be overridden through the
/// confirmer when `interactive` is set and `noclobber` is not); with
/// `autostop` the first skipped conflict aborts the batch. Every
/// successful rename is appended to `log`. With `simulate` nothing is
/// touched and the log is left alone.
pub fn commit(plan: &RenamePlan, ctx: &CommitContext<'_>, log: &mut UndoLog) -> CommitReport {
    let options = ctx.options;
    let mut report = CommitReport::default();
    let mut moves = Vec::new();

    for entry in &plan.entries {
        if entry.is_unchanged() {
            continue;
        }

        let from = entry.source_path();
        let to = entry.dest_path();

        let overwrite = match entry.conflict {
            None => false,
            Some(ConflictKind::Exists) if options.interactive && !options.noclobber => {
                if !ctx.confirmer.is_some_and(|c| c.confirm(entry)) {
                    report.skip(ctx.events, from, to, "overwrite declined".to_string());
                    continue;
                }
                true
            },
            Some(kind) => {
                let conflict = Error::Conflict {
                    path: to.clone(),
                    reason: kind.to_string(),
                };
                report.skip(ctx.events, from, to, conflict.to_string());
                if options.autostop {
                    warn!(%conflict, "autostop set, aborting");
                    report.aborted = true;
                    break;
                }
                continue;
            },
        };

        // An overwrite was already confirmed above
        if options.prompt && !overwrite && !ctx.confirmer.is_some_and(|c| c.confirm(entry)) {
            report.skip(ctx.events, from, to, "not confirmed".to_string());
            continue;
        }

        moves.push(Move {
            overwrite,
            ..Move::new(from, to)
        });
    }

    // Children before their parents so pending paths stay valid
    moves.sort_by_key(|m| Reverse(m.from.components().count()));

    if options.simulate {
        for mv in moves {
            info!(from = %mv.from.display(), to = %mv.to.display(), "would rename");
            ctx.events.emit(&EngineEvent::Simulated {
                from: mv.from.clone(),
                to: mv.to.clone(),
            });
            report
                .results
                .push(CommitResult::new(mv.from, mv.to, Outcome::Simulated));
        }
        return report;
    }

    let mut executor = Executor {
        log,
        events: ctx.events,
        autostop: options.autostop,
        case_insensitive: plan.case_insensitive_fs,
        kind: HistoryKind::Commit,
        temp_counter: 0,
    };
    executor.run(moves, &mut report);

    if report.aborted {
        ctx.events.emit(&EngineEvent::Aborted);
    }
    report
}

/// Runs a batch of moves against the filesystem, recording each success
pub(crate) struct Executor<'a> {
    pub log: &'a mut UndoLog,
    pub events: &'a dyn EventSink,
    pub autostop: bool,
    pub case_insensitive: bool,
    pub kind: HistoryKind,
    pub temp_counter: usize,
}

impl Executor<'_> {
    /// Execute `moves` in order, letting a move wait while its destination
    /// is still the source of another pending move or while it has pending
    /// descendants. A finished move wakes the moves waiting on it. When
    /// nothing can progress one move is parked under a temporary name.
    pub(crate) fn run(&mut self, moves: Vec<Move>, report: &mut CommitReport) {
        let mut schedule = Schedule::new(moves, self.case_insensitive);
        let mut queue: VecDeque<usize> = (0..schedule.moves.len()).collect();
        let mut stopped = false;

        while schedule.remaining > 0 && !stopped {
            while let Some(idx) = queue.pop_front() {
                if schedule.done[idx] {
                    continue;
                }
                if let Some(blocker) = schedule.blocker(idx) {
                    schedule.wait(idx, blocker);
                    continue;
                }

                let result = self.perform(&schedule.moves[idx]);
                let woken = schedule.finish(idx);
                for &next in woken.iter().rev() {
                    queue.push_front(next);
                }
                match result {
                    Ok(()) => self.record_success(&schedule.moves[idx], report),
                    Err(err) => {
                        self.record_failure(&schedule.moves[idx], err, report);
                        if self.autostop {
                            stopped = true;
                            break;
                        }
                    },
                }
            }

            if stopped || schedule.remaining == 0 {
                break;
            }

            let Some(idx) = schedule.park_candidate() else {
                for idx in schedule.pending() {
                    let err = io::Error::new(io::ErrorKind::Other, "unresolvable rename order");
                    self.record_failure(&schedule.moves[idx], err, report);
                }
                break;
            };

            let temp = self.temp_path(&schedule.moves[idx].from);
            debug!(from = %schedule.moves[idx].from.display(), temp = %temp.display(), "breaking rename cycle");
            match fs::rename(&schedule.moves[idx].from, &temp) {
                Ok(()) => queue.extend(schedule.relocate(idx, temp)),
                Err(err) => {
                    queue.extend(schedule.finish(idx));
                    self.record_failure(&schedule.moves[idx], err, report);
                    if self.autostop {
                        stopped = true;
                    }
                },
            }
        }

        if stopped {
            for idx in schedule.pending() {
                let mv = &schedule.moves[idx];
                Self::unpark(mv);
                report.skip(self.events, mv.from.clone(), mv.to.clone(), "batch aborted".to_string());
            }
            report.aborted = true;
        }
    }

    fn perform(&mut self, mv: &Move) -> io::Result<()> {
        let source = mv.current();

        // Case-only rename on a case-insensitive filesystem goes through a temp name
        let case_only = mv.parked.is_none()
            && mv.from != mv.to
            && mv.from.to_string_lossy().to_lowercase() == mv.to.to_string_lossy().to_lowercase();

        if case_only && self.case_insensitive {
            let temp = self.temp_path(&mv.from);
            debug!(temp = %temp.display(), "case-only rename, using temp");
            fs::rename(source, &temp)?;
            if let Err(err) = fs::rename(&temp, &mv.to) {
                return Err(restore_from_temp(&temp, source, err));
            }
            return Ok(());
        }

        if !mv.overwrite && fs::symlink_metadata(&mv.to).is_ok() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                "destination already exists",
            ));
        }

        fs::rename(source, &mv.to)
    }

    /// Move a parked source back where it came from
    fn unpark(mv: &Move) {
        if let Some(temp) = &mv.parked {
            if let Err(err) = fs::rename(temp, &mv.from) {
                warn!(temp = %temp.display(), from = %mv.from.display(), %err, "failed to restore parked entry");
            }
        }
    }

    fn temp_path(&mut self, near: &Path) -> PathBuf {
        let parent = near.parent().unwrap_or_else(|| Path::new("."));
        loop {
            self.temp_counter += 1;
            let candidate = parent.join(format!(
                ".batchren-{}-{}.tmp",
                std::process::id(),
                self.temp_counter
            ));
            if fs::symlink_metadata(&candidate).is_err() {
                return candidate;
            }
        }
    }

    fn record_success(&mut self, mv: &Move, report: &mut CommitReport) {
        self.log
            .record(mv.from.clone(), mv.to.clone(), self.kind, mv.revert_of);
        info!(from = %mv.from.display(), to = %mv.to.display(), "renamed");

        let event = match self.kind {
            HistoryKind::Commit => EngineEvent::Renamed {
                from: mv.from.clone(),
                to: mv.to.clone(),
            },
            HistoryKind::Undo => EngineEvent::Undone {
                from: mv.from.clone(),
                to: mv.to.clone(),
            },
        };
        self.events.emit(&event);
        report.results.push(CommitResult::new(
            mv.from.clone(),
            mv.to.clone(),
            Outcome::Renamed,
        ));
    }

    fn record_failure(&self, mv: &Move, err: io::Error, report: &mut CommitReport) {
        Self::unpark(mv);
        let error = Error::io(mv.from.clone(), mv.to.clone(), err);
        let kind = match &error {
            Error::Io { kind, .. } => *kind,
            _ => IoErrorKind::Other,
        };
        warn!(%error, "rename failed");

        self.events.emit(&EngineEvent::Failed {
            from: mv.from.clone(),
            to: mv.to.clone(),
            kind,
            message: error.to_string(),
        });
        report.results.push(CommitResult {
            reason: Some(error.to_string()),
            error_kind: Some(kind),
            ..CommitResult::new(mv.from.clone(), mv.to.clone(), Outcome::Failed)
        });
    }
}

/// Put a source back after the second step of a two-step rename failed.
/// If that fails too the error names the temporary path holding the entry.
fn restore_from_temp(temp: &Path, source: &Path, err: io::Error) -> io::Error {
    match fs::rename(temp, source) {
        Ok(()) => err,
        Err(restore_err) => {
            warn!(temp = %temp.display(), source = %source.display(), %restore_err, "failed to restore entry from temp");
            io::Error::new(
                err.kind(),
                format!("{}; entry left at {}", err, temp.display()),
            )
        },
    }
}

/// Why a move cannot run yet
enum Blocker {
    /// The destination is the current path of another pending move
    Occupied(PathBuf),
    /// Pending moves still live beneath this directory
    Nested(PathBuf),
}

/// Pending-move bookkeeping with constant-time readiness checks
struct Schedule {
    moves: Vec<Move>,
    done: Vec<bool>,
    remaining: usize,
    case_insensitive: bool,
    /// Current path key of every pending move
    occupants: HashMap<PathBuf, usize>,
    /// Number of pending moves beneath each directory
    nested: HashMap<PathBuf, usize>,
    occupied_waiters: HashMap<PathBuf, Vec<usize>>,
    nested_waiters: HashMap<PathBuf, Vec<usize>>,
}

impl Schedule {
    fn new(moves: Vec<Move>, case_insensitive: bool) -> Self {
        let mut occupants = HashMap::with_capacity(moves.len());
        let mut nested: HashMap<PathBuf, usize> = HashMap::new();
        for (idx, mv) in moves.iter().enumerate() {
            occupants.insert(path_key(mv.current(), case_insensitive), idx);
            for dir in mv.current().ancestors().skip(1) {
                *nested.entry(dir.to_path_buf()).or_default() += 1;
            }
        }

        Self {
            done: vec![false; moves.len()],
            remaining: moves.len(),
            moves,
            case_insensitive,
            occupants,
            nested,
            occupied_waiters: HashMap::new(),
            nested_waiters: HashMap::new(),
        }
    }

    fn blocker(&self, idx: usize) -> Option<Blocker> {
        let mv = &self.moves[idx];
        let to_key = path_key(&mv.to, self.case_insensitive);
        match self.occupants.get(&to_key) {
            Some(&other) if other != idx => return Some(Blocker::Occupied(to_key)),
            _ => {},
        }

        let current = mv.current();
        if self.nested.get(current).is_some_and(|&n| n > 0) {
            return Some(Blocker::Nested(current.to_path_buf()));
        }
        None
    }

    fn wait(&mut self, idx: usize, blocker: Blocker) {
        let waiters = match blocker {
            Blocker::Occupied(key) => self.occupied_waiters.entry(key),
            Blocker::Nested(dir) => self.nested_waiters.entry(dir),
        };
        waiters.or_default().push(idx);
    }

    /// Drop a move from the pending set, returning the moves it unblocked
    fn finish(&mut self, idx: usize) -> Vec<usize> {
        self.done[idx] = true;
        self.remaining -= 1;

        let mut woken = self.vacate(idx);
        let current = self.moves[idx].current().to_path_buf();
        for dir in current.ancestors().skip(1) {
            if let Some(count) = self.nested.get_mut(dir) {
                *count -= 1;
                if *count == 0 {
                    self.nested.remove(dir);
                    woken.extend(self.nested_waiters.remove(dir).unwrap_or_default());
                }
            }
        }
        woken
    }

    /// Record that a move's source now sits at `temp` (same parent directory)
    fn relocate(&mut self, idx: usize, temp: PathBuf) -> Vec<usize> {
        let woken = self.vacate(idx);
        self.occupants
            .insert(path_key(&temp, self.case_insensitive), idx);
        self.moves[idx].parked = Some(temp);
        woken
    }

    fn vacate(&mut self, idx: usize) -> Vec<usize> {
        let key = path_key(self.moves[idx].current(), self.case_insensitive);
        if self.occupants.get(&key) == Some(&idx) {
            self.occupants.remove(&key);
        }
        self.occupied_waiters.remove(&key).unwrap_or_default()
    }

    /// First unparked move with nothing pending beneath it
    fn park_candidate(&self) -> Option<usize> {
        self.pending().find(|&idx| {
            let mv = &self.moves[idx];
            mv.parked.is_none() && !self.nested.contains_key(mv.current())
        })
    }

    fn pending(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.moves.len()).filter(move |&idx| !self.done[idx])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{MemorySink, NullSink};
    use crate::rename::{detect_case_insensitive_fs, resolve};
    use crate::scanner::{Target, TargetKind};
    use tempfile::TempDir;

    fn plan(root: &Path, renames: &[(&str, &str)]) -> RenamePlan {
        let entries = renames
            .iter()
            .map(|(old, new)| {
                let old_path = root.join(old);
                let parent = old_path.parent().unwrap().to_path_buf();
                let name = old_path.file_name().unwrap().to_str().unwrap().to_string();
                let kind = if old_path.is_dir() {
                    TargetKind::Dir
                } else {
                    TargetKind::File
                };
                PlanEntry::new(Target::new(parent, &name, kind), (*new).to_string())
            })
            .collect();

        resolve(RenamePlan {
            root: root.to_path_buf(),
            entries,
            warnings: vec![],
            case_insensitive_fs: detect_case_insensitive_fs(root),
        })
    }

    fn run(plan: &RenamePlan, options: &Options, log: &mut UndoLog) -> CommitReport {
        let ctx = CommitContext {
            options,
            confirmer: None,
            events: &NullSink,
        };
        commit(plan, &ctx, log)
    }

    #[test]
    fn test_commit_renames_and_logs() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.txt"), "a").unwrap();

        let mut log = UndoLog::new();
        let report = run(&plan(temp.path(), &[("a.txt", "b.txt")]), &Options::default(), &mut log);

        assert!(report.is_success());
        assert_eq!(report.count(Outcome::Renamed), 1);
        assert!(!temp.path().join("a.txt").exists());
        assert_eq!(fs::read_to_string(temp.path().join("b.txt")).unwrap(), "a");
        assert_eq!(log.len(), 1);
        assert_eq!(log.entries()[0].old_path, temp.path().join("a.txt"));
    }

    #[test]
    fn test_swap_is_broken_through_temp_name() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.txt"), "a").unwrap();
        fs::write(temp.path().join("b.txt"), "b").unwrap();

        let mut log = UndoLog::new();
        let report = run(
            &plan(temp.path(), &[("a.txt", "b.txt"), ("b.txt", "a.txt")]),
            &Options::default(),
            &mut log,
        );

        assert!(report.is_success());
        assert_eq!(fs::read_to_string(temp.path().join("a.txt")).unwrap(), "b");
        assert_eq!(fs::read_to_string(temp.path().join("b.txt")).unwrap(), "a");
        assert_eq!(log.len(), 2);
        // No temp files left behind
        assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 2);
    }

    #[test]
    fn test_chain_waits_for_vacated_destination() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.txt"), "a").unwrap();
        fs::write(temp.path().join("b.txt"), "b").unwrap();

        let mut log = UndoLog::new();
        let report = run(
            &plan(temp.path(), &[("a.txt", "b.txt"), ("b.txt", "c.txt")]),
            &Options::default(),
            &mut log,
        );

        assert!(report.is_success());
        assert_eq!(fs::read_to_string(temp.path().join("b.txt")).unwrap(), "a");
        assert_eq!(fs::read_to_string(temp.path().join("c.txt")).unwrap(), "b");
        // b -> c had to run first
        assert_eq!(report.results[0].to, temp.path().join("c.txt"));
    }

    #[test]
    fn test_long_chain_and_cycle() {
        let temp = TempDir::new().unwrap();
        let count = 2000;
        for i in 0..count {
            fs::write(temp.path().join(format!("{}.txt", i)), i.to_string()).unwrap();
        }
        for name in ["x", "y", "z"] {
            fs::write(temp.path().join(name), name).unwrap();
        }

        let names: Vec<(String, String)> = (0..count)
            .map(|i| (format!("{}.txt", i), format!("{}.txt", i + 1)))
            .chain([
                ("x".to_string(), "y".to_string()),
                ("y".to_string(), "z".to_string()),
                ("z".to_string(), "x".to_string()),
            ])
            .collect();
        let renames: Vec<(&str, &str)> = names
            .iter()
            .map(|(old, new)| (old.as_str(), new.as_str()))
            .collect();

        let mut log = UndoLog::new();
        let report = run(&plan(temp.path(), &renames), &Options::default(), &mut log);

        assert!(report.is_success());
        assert_eq!(report.count(Outcome::Renamed), count + 3);
        assert!(!temp.path().join("0.txt").exists());
        assert_eq!(fs::read_to_string(temp.path().join("1.txt")).unwrap(), "0");
        assert_eq!(
            fs::read_to_string(temp.path().join(format!("{}.txt", count))).unwrap(),
            (count - 1).to_string()
        );
        assert_eq!(fs::read_to_string(temp.path().join("x")).unwrap(), "z");
        assert_eq!(fs::read_to_string(temp.path().join("y")).unwrap(), "x");
        assert_eq!(fs::read_dir(temp.path()).unwrap().count(), count + 3);
    }

    #[test]
    fn test_restore_from_temp_names_stranded_entry() {
        let temp = TempDir::new().unwrap();
        let parked = temp.path().join(".batchren-1-1.tmp");
        let source = temp.path().join("a.txt");
        fs::write(&parked, "a").unwrap();

        let err = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        let err = restore_from_temp(&parked, &source, err);
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
        assert_eq!(err.to_string(), "denied");
        assert!(source.exists());

        // Restoring into a missing directory fails, so the temp path is reported
        let gone = temp.path().join("gone").join("a.txt");
        let err = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        let err = restore_from_temp(&source, &gone, err);
        assert!(err
            .to_string()
            .contains(&format!("entry left at {}", source.display())));
    }

    #[test]
    fn test_children_renamed_before_parent() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("dir")).unwrap();
        fs::write(temp.path().join("dir").join("x.txt"), "x").unwrap();

        let mut log = UndoLog::new();
        let report = run(
            &plan(temp.path(), &[("dir", "folder"), ("dir/x.txt", "y.txt")]),
            &Options::default(),
            &mut log,
        );

        assert!(report.is_success());
        assert!(temp.path().join("folder").join("y.txt").exists());
        assert!(!temp.path().join("dir").exists());
    }

    #[test]
    fn test_duplicate_is_skipped_or_aborts() {
        let temp = TempDir::new().unwrap();
        for name in ["a1.txt", "a2.txt", "b.txt"] {
            fs::write(temp.path().join(name), "").unwrap();
        }
        let renames = [("a1.txt", "a.txt"), ("a2.txt", "a.txt"), ("b.txt", "c.txt")];

        let mut log = UndoLog::new();
        let report = run(&plan(temp.path(), &renames), &Options::default(), &mut log);
        assert_eq!(report.count(Outcome::Skipped), 2);
        assert_eq!(report.count(Outcome::Renamed), 1);
        assert!(!report.aborted);
        assert!(!temp.path().join("a.txt").exists());

        fs::rename(temp.path().join("c.txt"), temp.path().join("b.txt")).unwrap();
        let options = Options {
            autostop: true,
            ..Options::default()
        };
        let mut log = UndoLog::new();
        let report = run(&plan(temp.path(), &renames), &options, &mut log);
        assert!(report.aborted);
        assert_eq!(report.count(Outcome::Renamed), 0);
        assert!(temp.path().join("b.txt").exists());
    }

    #[test]
    fn test_existing_destination_aborts_with_autostop() {
        let temp = TempDir::new().unwrap();
        for name in ["a.txt", "b.txt", "c.txt", "taken.txt"] {
            fs::write(temp.path().join(name), name).unwrap();
        }
        let renames = [("a.txt", "x.txt"), ("b.txt", "taken.txt"), ("c.txt", "z.txt")];

        let mut log = UndoLog::new();
        let report = run(&plan(temp.path(), &renames), &Options::default(), &mut log);
        assert!(!report.aborted);
        assert_eq!(report.count(Outcome::Renamed), 2);
        assert_eq!(report.count(Outcome::Skipped), 1);

        for (old, new) in [("a.txt", "x.txt"), ("c.txt", "z.txt")] {
            fs::rename(temp.path().join(new), temp.path().join(old)).unwrap();
        }
        let options = Options {
            autostop: true,
            ..Options::default()
        };
        let sink = MemorySink::new();
        let ctx = CommitContext {
            options: &options,
            confirmer: None,
            events: &sink,
        };
        let mut log = UndoLog::new();
        let report = commit(&plan(temp.path(), &renames), &ctx, &mut log);

        assert!(report.aborted);
        assert_eq!(report.count(Outcome::Renamed), 1);
        assert!(temp.path().join("x.txt").exists());
        assert!(temp.path().join("c.txt").exists());
        assert_eq!(
            fs::read_to_string(temp.path().join("taken.txt")).unwrap(),
            "taken.txt"
        );
        let skipped = report
            .results
            .iter()
            .find(|r| r.outcome == Outcome::Skipped)
            .unwrap();
        assert!(skipped
            .reason
            .as_deref()
            .unwrap()
            .starts_with("conflict at "));
        assert!(matches!(sink.events().last(), Some(EngineEvent::Aborted)));
    }

    #[test]
    fn test_declined_overwrite_does_not_abort() {
        let temp = TempDir::new().unwrap();
        for name in ["a.txt", "taken.txt", "c.txt"] {
            fs::write(temp.path().join(name), "").unwrap();
        }
        let plan = plan(temp.path(), &[("a.txt", "taken.txt"), ("c.txt", "z.txt")]);
        let no = |_: &PlanEntry| false;
        let options = Options {
            interactive: true,
            autostop: true,
            ..Options::default()
        };
        let ctx = CommitContext {
            options: &options,
            confirmer: Some(&no),
            events: &NullSink,
        };
        let mut log = UndoLog::new();
        let report = commit(&plan, &ctx, &mut log);

        assert!(!report.aborted);
        assert_eq!(report.count(Outcome::Renamed), 1);
        assert_eq!(report.results[0].reason.as_deref(), Some("overwrite declined"));
    }

    #[test]
    fn test_exists_needs_interactive_confirmation() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.txt"), "new").unwrap();
        fs::write(temp.path().join("taken.txt"), "old").unwrap();
        let plan = plan(temp.path(), &[("a.txt", "taken.txt")]);
        let yes = |_: &PlanEntry| true;

        // Without interactive the confirmer is never asked
        let mut log = UndoLog::new();
        let ctx = CommitContext {
            options: &Options::default(),
            confirmer: Some(&yes),
            events: &NullSink,
        };
        let report = commit(&plan, &ctx, &mut log);
        assert_eq!(report.count(Outcome::Skipped), 1);

        let noclobber = Options {
            interactive: true,
            noclobber: true,
            ..Options::default()
        };
        let ctx = CommitContext {
            options: &noclobber,
            confirmer: Some(&yes),
            events: &NullSink,
        };
        assert_eq!(commit(&plan, &ctx, &mut log).count(Outcome::Skipped), 1);
        assert_eq!(
            fs::read_to_string(temp.path().join("taken.txt")).unwrap(),
            "old"
        );

        let interactive = Options {
            interactive: true,
            ..Options::default()
        };
        let ctx = CommitContext {
            options: &interactive,
            confirmer: Some(&yes),
            events: &NullSink,
        };
        let report = commit(&plan, &ctx, &mut log);
        assert_eq!(report.count(Outcome::Renamed), 1);
        assert_eq!(
            fs::read_to_string(temp.path().join("taken.txt")).unwrap(),
            "new"
        );
    }

    #[test]
    fn test_prompt_consults_confirmer_for_each_entry() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("keep.txt"), "").unwrap();
        fs::write(temp.path().join("move.txt"), "").unwrap();
        let plan = plan(
            temp.path(),
            &[("keep.txt", "kept.txt"), ("move.txt", "moved.txt")],
        );

        let only_move = |entry: &PlanEntry| entry.target.name == "move";
        let options = Options {
            prompt: true,
            ..Options::default()
        };
        let ctx = CommitContext {
            options: &options,
            confirmer: Some(&only_move),
            events: &NullSink,
        };
        let mut log = UndoLog::new();
        let report = commit(&plan, &ctx, &mut log);

        assert_eq!(report.count(Outcome::Renamed), 1);
        assert_eq!(report.count(Outcome::Skipped), 1);
        assert!(temp.path().join("keep.txt").exists());
        assert!(temp.path().join("moved.txt").exists());
    }

    #[test]
    fn test_simulate_touches_nothing() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.txt"), "").unwrap();

        let options = Options {
            simulate: true,
            ..Options::default()
        };
        let sink = MemorySink::new();
        let ctx = CommitContext {
            options: &options,
            confirmer: None,
            events: &sink,
        };
        let mut log = UndoLog::new();
        let report = commit(&plan(temp.path(), &[("a.txt", "b.txt")]), &ctx, &mut log);

        assert_eq!(report.count(Outcome::Simulated), 1);
        assert!(temp.path().join("a.txt").exists());
        assert!(!temp.path().join("b.txt").exists());
        assert!(log.is_empty());
        assert!(matches!(sink.events()[0], EngineEvent::Simulated { .. }));
    }

    #[test]
    fn test_missing_source_is_classified() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.txt"), "").unwrap();
        fs::write(temp.path().join("b.txt"), "").unwrap();
        let plan = plan(temp.path(), &[("a.txt", "x.txt"), ("b.txt", "y.txt")]);

        // External mutation between stage and commit
        fs::remove_file(temp.path().join("a.txt")).unwrap();

        let mut log = UndoLog::new();
        let report = run(&plan, &Options::default(), &mut log);
        assert_eq!(report.count(Outcome::Failed), 1);
        assert_eq!(report.count(Outcome::Renamed), 1);
        let failure = report.failures().next().unwrap();
        assert_eq!(failure.error_kind, Some(IoErrorKind::NotFound));

        fs::rename(temp.path().join("y.txt"), temp.path().join("b.txt")).unwrap();
        let options = Options {
            autostop: true,
            ..Options::default()
        };
        let mut log = UndoLog::new();
        let report = run(&plan, &options, &mut log);
        assert!(report.aborted);
        assert_eq!(report.count(Outcome::Renamed), 0);
        assert_eq!(report.results.last().unwrap().reason.as_deref(), Some("batch aborted"));
        assert!(temp.path().join("b.txt").exists());
    }

    #[test]
    fn test_case_only_rename() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("readme.md"), "r").unwrap();

        let mut log = UndoLog::new();
        let report = run(
            &plan(temp.path(), &[("readme.md", "README.md")]),
            &Options::default(),
            &mut log,
        );

        assert!(report.is_success());
        let names: Vec<String> = fs::read_dir(temp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["README.md"]);
    }

    #[test]
    fn test_unchanged_entries_are_not_reported() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("same.txt"), "").unwrap();

        let mut log = UndoLog::new();
        let report = run(
            &plan(temp.path(), &[("same.txt", "same.txt")]),
            &Options::default(),
            &mut log,
        );
        assert!(report.results.is_empty());
        assert!(log.is_empty());
    }
}
