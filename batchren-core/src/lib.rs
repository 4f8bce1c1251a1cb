#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::unnecessary_wraps)]

pub mod apply;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod history;
pub mod options;
pub mod output;
pub mod pattern;
pub mod rename;
pub mod scanner;
pub mod transform;
pub mod undo;

pub use apply::{commit, CommitContext, CommitReport, CommitResult, Confirm, Outcome};
pub use config::Config;
pub use engine::{Destination, Engine};
pub use error::{Error, IoErrorKind, Result};
pub use events::{EngineEvent, EventSink, MemorySink, NullSink};
pub use history::{format_history, HistoryEntry, HistoryKind, UndoLog};
pub use options::{OptionName, OptionSet, OptionValue, Options};
pub use output::{render_plan_table, render_report_lines, OutputFormat, OutputFormatter};
pub use pattern::{glob_to_regex, PatternMatcher, PatternMode};
pub use rename::{
    detect_case_insensitive_fs, is_windows_reserved, resolve, ConflictKind, PlanEntry, RenamePlan,
};
pub use scanner::{split_extension, Discoverer, Target, TargetKind};
pub use transform::{CaseMode, Counter, Pipeline, SpacingMode, TransformStage};
pub use undo::undo;
