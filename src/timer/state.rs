//! Focus timer state machine.
//!
//! [`TimerState::apply`] is the only way the timer changes. It is pure: it
//! mutates the state and returns the side effects the caller must carry out
//! (ticking, recorder calls, task completion). No I/O happens here.

use serde::{Deserialize, Serialize};

use crate::db::{NewSession, SessionKind};

pub const DEFAULT_FOCUS_SECS: u32 = 25 * 60;
pub const DEFAULT_BREAK_SECS: u32 = 5 * 60;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TimerDurations {
    pub focus_secs: u32,
    pub break_secs: u32,
}

impl Default for TimerDurations {
    fn default() -> Self {
        Self {
            focus_secs: DEFAULT_FOCUS_SECS,
            break_secs: DEFAULT_BREAK_SECS,
        }
    }
}

impl TimerDurations {
    /// Zero-length phases are bumped to one second.
    pub fn new(focus_secs: u32, break_secs: u32) -> Self {
        Self {
            focus_secs: focus_secs.max(1),
            break_secs: break_secs.max(1),
        }
    }

    /// Converts a minute count to seconds, `None` when it does not fit.
    pub fn secs_from_minutes(minutes: u32) -> Option<u32> {
        minutes.checked_mul(60)
    }

    pub fn for_mode(&self, mode: TimerMode) -> u32 {
        match mode {
            TimerMode::Focus => self.focus_secs,
            TimerMode::Break => self.break_secs,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum TimerMode {
    #[default]
    Focus,
    Break,
}

impl TimerMode {
    pub fn session_kind(&self) -> SessionKind {
        match self {
            TimerMode::Focus => SessionKind::Focus,
            TimerMode::Break => SessionKind::Break,
        }
    }

    pub fn next(&self) -> TimerMode {
        match self {
            TimerMode::Focus => TimerMode::Break,
            TimerMode::Break => TimerMode::Focus,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum TimerPhase {
    IdleFocus,
    RunningFocus,
    IdleBreak,
    RunningBreak,
}

/// Link between the running phase and its persisted session record.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionSlot {
    #[default]
    Empty,
    /// An open request is in flight for the current epoch.
    Pending,
    Open(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerEvent {
    Start,
    Pause,
    /// Start when idle, pause when running.
    Toggle,
    Reset,
    Tick,
    SelectTask(i64),
    DeselectTask,
    SwitchMode(TimerMode),
    /// The task was deleted or completed elsewhere.
    TaskRemoved(i64),
    SessionOpened { epoch: u64, session_id: String },
    SessionOpenFailed { epoch: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerEffect {
    BeginTicking,
    StopTicking,
    OpenSession { epoch: u64, request: NewSession },
    CompleteSession { session_id: String },
    CompleteTask { task_id: i64 },
    PhaseFinished { mode: TimerMode },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimerSnapshot {
    pub phase: TimerPhase,
    pub mode: TimerMode,
    pub running: bool,
    pub remaining_secs: u32,
    pub total_secs: u32,
    pub progress: f32,
    pub completed_focus_count: u32,
    pub active_task_id: Option<i64>,
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimerState {
    durations: TimerDurations,
    mode: TimerMode,
    running: bool,
    remaining_secs: u32,
    total_secs: u32,
    completed_focus_count: u32,
    active_task: Option<i64>,
    session: SessionSlot,
    /// Bumped whenever the current phase is abandoned or finishes, so replies
    /// addressed to an older phase can be recognised and dropped.
    epoch: u64,
}

impl Default for TimerState {
    fn default() -> Self {
        Self::new(TimerDurations::default())
    }
}

impl TimerState {
    pub fn new(durations: TimerDurations) -> Self {
        Self {
            durations,
            mode: TimerMode::Focus,
            running: false,
            remaining_secs: durations.focus_secs,
            total_secs: durations.focus_secs,
            completed_focus_count: 0,
            active_task: None,
            session: SessionSlot::Empty,
            epoch: 0,
        }
    }

    pub fn durations(&self) -> TimerDurations {
        self.durations
    }

    pub fn mode(&self) -> TimerMode {
        self.mode
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn remaining_secs(&self) -> u32 {
        self.remaining_secs
    }

    pub fn total_secs(&self) -> u32 {
        self.total_secs
    }

    pub fn completed_focus_count(&self) -> u32 {
        self.completed_focus_count
    }

    pub fn active_task(&self) -> Option<i64> {
        self.active_task
    }

    pub fn session(&self) -> &SessionSlot {
        &self.session
    }

    pub fn current_session(&self) -> Option<&str> {
        match &self.session {
            SessionSlot::Open(id) => Some(id),
            _ => None,
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn phase(&self) -> TimerPhase {
        match (self.mode, self.running) {
            (TimerMode::Focus, false) => TimerPhase::IdleFocus,
            (TimerMode::Focus, true) => TimerPhase::RunningFocus,
            (TimerMode::Break, false) => TimerPhase::IdleBreak,
            (TimerMode::Break, true) => TimerPhase::RunningBreak,
        }
    }

    /// Fraction of the current phase already elapsed, in `0.0..=1.0`.
    pub fn progress(&self) -> f32 {
        if self.total_secs == 0 {
            return 1.0;
        }
        1.0 - (self.remaining_secs as f32 / self.total_secs as f32)
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot {
            phase: self.phase(),
            mode: self.mode,
            running: self.running,
            remaining_secs: self.remaining_secs,
            total_secs: self.total_secs,
            progress: self.progress(),
            completed_focus_count: self.completed_focus_count,
            active_task_id: self.active_task,
            session_id: self.current_session().map(str::to_string),
        }
    }

    pub fn apply(&mut self, event: TimerEvent) -> Vec<TimerEffect> {
        match event {
            TimerEvent::Start => self.start(),
            TimerEvent::Pause => self.pause(),
            TimerEvent::Toggle => {
                if self.running {
                    self.pause()
                } else {
                    self.start()
                }
            }
            TimerEvent::Reset => self.reset(),
            TimerEvent::Tick => self.tick(),
            TimerEvent::SelectTask(task_id) => {
                self.active_task = Some(task_id);
                self.mode = TimerMode::Focus;
                self.reset()
            }
            TimerEvent::DeselectTask => {
                self.active_task = None;
                Vec::new()
            }
            TimerEvent::SwitchMode(mode) => {
                self.mode = mode;
                self.reset()
            }
            TimerEvent::TaskRemoved(task_id) => {
                if self.active_task == Some(task_id) {
                    self.active_task = None;
                }
                Vec::new()
            }
            TimerEvent::SessionOpened { epoch, session_id } => {
                if epoch == self.epoch && self.session == SessionSlot::Pending {
                    self.session = SessionSlot::Open(session_id);
                }
                Vec::new()
            }
            TimerEvent::SessionOpenFailed { epoch } => {
                if epoch == self.epoch && self.session == SessionSlot::Pending {
                    self.session = SessionSlot::Empty;
                }
                Vec::new()
            }
        }
    }

    fn start(&mut self) -> Vec<TimerEffect> {
        if self.running {
            return Vec::new();
        }
        self.running = true;

        let mut effects = vec![TimerEffect::BeginTicking];
        // A resumed phase keeps the session it already has.
        if self.session == SessionSlot::Empty {
            self.session = SessionSlot::Pending;
            effects.push(TimerEffect::OpenSession {
                epoch: self.epoch,
                request: NewSession {
                    task_id: self.active_task,
                    duration_secs: self.total_secs,
                    kind: self.mode.session_kind(),
                },
            });
        }
        effects
    }

    fn pause(&mut self) -> Vec<TimerEffect> {
        if !self.running {
            return Vec::new();
        }
        self.running = false;
        vec![TimerEffect::StopTicking]
    }

    fn reset(&mut self) -> Vec<TimerEffect> {
        let was_running = self.running;
        self.begin_phase(self.mode);
        if was_running {
            vec![TimerEffect::StopTicking]
        } else {
            Vec::new()
        }
    }

    fn tick(&mut self) -> Vec<TimerEffect> {
        if !self.running {
            return Vec::new();
        }
        self.remaining_secs = self.remaining_secs.saturating_sub(1);
        if self.remaining_secs > 0 {
            return Vec::new();
        }
        self.expire()
    }

    fn expire(&mut self) -> Vec<TimerEffect> {
        let finished = self.mode;
        let mut effects = vec![TimerEffect::StopTicking];

        if let SessionSlot::Open(session_id) = std::mem::take(&mut self.session) {
            effects.push(TimerEffect::CompleteSession { session_id });
        }

        if finished == TimerMode::Focus {
            self.completed_focus_count += 1;
            if let Some(task_id) = self.active_task.take() {
                effects.push(TimerEffect::CompleteTask { task_id });
            }
        }

        self.begin_phase(finished.next());
        effects.push(TimerEffect::PhaseFinished { mode: finished });
        effects
    }

    /// Idle at the start of `mode`, with no session attached.
    fn begin_phase(&mut self, mode: TimerMode) {
        self.mode = mode;
        self.running = false;
        self.total_secs = self.durations.for_mode(mode);
        self.remaining_secs = self.total_secs;
        self.session = SessionSlot::Empty;
        self.epoch += 1;
    }
}
