mod controller;
mod recorder;
mod state;

pub use controller::{TickSource, TimerController};
pub use recorder::{LocalRecorder, SessionRecorder, TaskCompleter};
pub use state::{
    SessionSlot, TimerDurations, TimerEffect, TimerEvent, TimerMode, TimerPhase, TimerSnapshot,
    TimerState, DEFAULT_BREAK_SECS, DEFAULT_FOCUS_SECS,
};
