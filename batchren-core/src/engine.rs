use crate::apply::{self, CommitContext, CommitReport, Confirm};
use crate::error::{Error, Result};
use crate::events::{EngineEvent, EventSink, NullSink};
use crate::history::UndoLog;
use crate::options::{OptionSet, OptionValue, Options};
use crate::pattern::PatternMatcher;
use crate::rename::{detect_case_insensitive_fs, resolve, PlanEntry, RenamePlan};
use crate::scanner::Discoverer;
use crate::transform::{Pipeline, TransformStage};
use crate::undo;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, info, warn};

/// How new names are derived when staging
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// Pipeline from the transform options, stem untouched
    Keep,
    /// Pipeline from the transform options behind a stem template (`*` is the old stem)
    Template(String),
    /// Explicit stages, applied in their fixed order
    Stages(Vec<TransformStage>),
}

impl Destination {
    fn pipeline(&self, options: &Options) -> Pipeline {
        match self {
            Self::Keep => Pipeline::from_options(options, None),
            Self::Template(text) => Pipeline::from_options(options, Some(text)),
            Self::Stages(stages) => Pipeline::new(stages.clone(), options.keepext),
        }
    }
}

/// The batch rename engine.
///
/// Owns the option state and the undo log. Plans are transient values
/// produced by [`Engine::stage`] and consumed by [`Engine::commit`].
pub struct Engine {
    options: OptionSet,
    history: UndoLog,
    confirmer: Option<Box<dyn Confirm>>,
    events: Box<dyn EventSink>,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("options", &self.options)
            .field("history", &self.history.len())
            .field("confirmer", &self.confirmer.is_some())
            .finish_non_exhaustive()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(Options::default())
    }
}

impl Engine {
    /// Create an engine whose defaults are `options`
    pub fn new(options: Options) -> Self {
        Self {
            options: OptionSet::new(options),
            history: UndoLog::new(),
            confirmer: None,
            events: Box::new(NullSink),
        }
    }

    /// Validate `values` on top of the built-in defaults and freeze the
    /// result as this engine's defaults
    pub fn configure<I, K>(values: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, OptionValue)>,
        K: AsRef<str>,
    {
        let mut set = OptionSet::default();
        set.set(values)?;
        Ok(Self::new(set.options().clone()))
    }

    /// Capability consulted for `interactive` overwrites and `prompt`
    #[must_use]
    pub fn with_confirmer(mut self, confirmer: impl Confirm + 'static) -> Self {
        self.confirmer = Some(Box::new(confirmer));
        self
    }

    #[must_use]
    pub fn with_event_sink(mut self, sink: impl EventSink + 'static) -> Self {
        self.events = Box::new(sink);
        self
    }

    /// Continue from a previously saved log
    #[must_use]
    pub fn with_history(mut self, history: UndoLog) -> Self {
        self.history = history;
        self
    }

    pub fn options(&self) -> &Options {
        self.options.options()
    }

    pub fn get_options(&self, names: &[&str]) -> Result<BTreeMap<String, OptionValue>> {
        self.options.get(names)
    }

    /// Validate and apply a batch of option values; nothing changes on error
    pub fn set_options<I, K>(&mut self, values: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, OptionValue)>,
        K: AsRef<str>,
    {
        let changed = self.options.set(values)?;
        if changed.is_empty() {
            return Ok(());
        }

        for (name, value) in &changed {
            debug!(option = name.as_str(), %value, "option changed");
        }
        self.events.emit(&EngineEvent::OptionsChanged {
            changes: changed
                .into_iter()
                .map(|(name, value)| (name.as_str().to_string(), value))
                .collect(),
        });
        Ok(())
    }

    pub fn restore_defaults(&mut self) {
        self.options.restore();
        debug!("options restored to defaults");
        self.events.emit(&EngineEvent::DefaultsRestored);
    }

    /// Discover the targets under `root` matching `source` and compute their
    /// new names. Read-only: nothing on disk changes.
    ///
    /// Unreadable subtrees are skipped and reported in the plan's warnings.
    pub fn stage(&self, source: &str, destination: &Destination, root: &Path) -> Result<RenamePlan> {
        let options = self.options.options();

        let metadata = fs::metadata(root).map_err(|source| Error::Discovery {
            path: root.to_path_buf(),
            source,
        })?;
        if !metadata.is_dir() {
            return Err(Error::Discovery {
                path: root.to_path_buf(),
                source: io::Error::new(io::ErrorKind::Other, "not a directory"),
            });
        }

        let matcher = PatternMatcher::from_options(source, options)?;
        let discoverer = Discoverer::new(root, matcher, options)?;

        let mut targets = Vec::new();
        let mut warnings = Vec::new();
        for item in &discoverer {
            match item {
                Ok(target) => targets.push(target),
                Err(err) => {
                    warn!(%err, "skipping unreadable subtree");
                    warnings.push(err.to_string());
                },
            }
        }

        let pipeline = destination.pipeline(options);
        let names = pipeline.apply_all(&targets);
        let entries = targets
            .into_iter()
            .zip(names)
            .map(|(target, new_name)| PlanEntry::new(target, new_name))
            .collect();

        let plan = resolve(RenamePlan {
            root: root.to_path_buf(),
            entries,
            warnings,
            case_insensitive_fs: detect_case_insensitive_fs(root),
        });

        let conflicts = plan.conflicts().count();
        info!(
            root = %root.display(),
            entries = plan.len(),
            conflicts,
            "staged rename plan"
        );
        self.events.emit(&EngineEvent::Staged {
            root: plan.root.clone(),
            entries: plan.len(),
            conflicts,
            warnings: plan.warnings.len(),
        });

        Ok(plan)
    }

    /// Execute a staged plan. Per-entry failures are reported, not returned;
    /// the call itself fails only when the plan's root is gone.
    pub fn commit(&mut self, plan: &RenamePlan) -> Result<CommitReport> {
        if let Err(source) = fs::metadata(&plan.root) {
            return Err(Error::Discovery {
                path: plan.root.clone(),
                source,
            });
        }

        let ctx = CommitContext {
            options: self.options.options(),
            confirmer: self.confirmer.as_deref(),
            events: &*self.events,
        };
        let report = apply::commit(plan, &ctx, &mut self.history);

        info!(
            renamed = report.count(apply::Outcome::Renamed),
            failed = report.count(apply::Outcome::Failed),
            aborted = report.aborted,
            "commit finished"
        );
        Ok(report)
    }

    /// Revert the last `count` committed renames
    pub fn undo(&mut self, count: usize) -> Result<CommitReport> {
        let report = undo::undo(
            count,
            self.options.options(),
            &mut self.history,
            &*self.events,
        );
        Ok(report)
    }

    pub fn history(&self) -> &UndoLog {
        &self.history
    }
}
