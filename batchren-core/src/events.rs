use crate::error::IoErrorKind;
use crate::options::OptionValue;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

/// A state change reported by the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    OptionsChanged {
        changes: Vec<(String, OptionValue)>,
    },
    DefaultsRestored,
    Staged {
        root: PathBuf,
        entries: usize,
        conflicts: usize,
        warnings: usize,
    },
    Renamed {
        from: PathBuf,
        to: PathBuf,
    },
    Simulated {
        from: PathBuf,
        to: PathBuf,
    },
    Skipped {
        from: PathBuf,
        to: PathBuf,
        reason: String,
    },
    Failed {
        from: PathBuf,
        to: PathBuf,
        kind: IoErrorKind,
        message: String,
    },
    Undone {
        from: PathBuf,
        to: PathBuf,
    },
    Aborted,
}

/// Receives engine events. Injected by the caller; the engine works without one.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &EngineEvent);
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: &EngineEvent) {}
}

/// Keeps every event in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<EngineEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<EngineEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Drain the recorded events
    pub fn take(&self) -> Vec<EngineEvent> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: &EngineEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}
