use std::sync::Arc;

use anyhow::{anyhow, Result};
use tokio::{
    sync::{mpsc, oneshot, watch},
    time::{self, Duration, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use super::{
    recorder::{SessionRecorder, TaskCompleter},
    state::{TimerDurations, TimerEffect, TimerEvent, TimerMode, TimerSnapshot, TimerState},
};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

/// Where the one-second ticks come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickSource {
    /// A background ticker fires every `Duration` while a phase is running.
    Interval(Duration),
    /// No ticker; ticks are fed through [`TimerController::tick`].
    Manual,
}

impl Default for TickSource {
    fn default() -> Self {
        TickSource::Interval(Duration::from_secs(1))
    }
}

enum DriverMsg {
    Dispatch {
        event: TimerEvent,
        reply: Option<oneshot::Sender<TimerSnapshot>>,
    },
    Tick {
        generation: u64,
    },
    Shutdown,
}

/// Handle to a running timer.
///
/// The state lives inside a single driver task. Every handle method queues an
/// event and waits for the snapshot taken right after it was applied.
#[derive(Clone)]
pub struct TimerController {
    sender: mpsc::UnboundedSender<DriverMsg>,
    snapshots: watch::Receiver<TimerSnapshot>,
}

impl TimerController {
    pub fn spawn<R, C>(
        recorder: Arc<R>,
        completer: Arc<C>,
        durations: TimerDurations,
        ticks: TickSource,
    ) -> Self
    where
        R: SessionRecorder,
        C: TaskCompleter,
    {
        let (sender, receiver) = mpsc::unbounded_channel();
        let state = TimerState::new(durations);
        let (snapshot_tx, snapshot_rx) = watch::channel(state.snapshot());

        let driver = Driver {
            state,
            recorder,
            completer,
            ticks,
            events: sender.downgrade(),
            snapshots: snapshot_tx,
            ticker: None,
            generation: 0,
        };
        tokio::spawn(driver.run(receiver));

        Self {
            sender,
            snapshots: snapshot_rx,
        }
    }

    pub async fn start(&self) -> Result<TimerSnapshot> {
        self.dispatch(TimerEvent::Start).await
    }

    pub async fn pause(&self) -> Result<TimerSnapshot> {
        self.dispatch(TimerEvent::Pause).await
    }

    pub async fn toggle(&self) -> Result<TimerSnapshot> {
        self.dispatch(TimerEvent::Toggle).await
    }

    pub async fn reset(&self) -> Result<TimerSnapshot> {
        self.dispatch(TimerEvent::Reset).await
    }

    pub async fn select_task(&self, task_id: i64) -> Result<TimerSnapshot> {
        self.dispatch(TimerEvent::SelectTask(task_id)).await
    }

    pub async fn deselect_task(&self) -> Result<TimerSnapshot> {
        self.dispatch(TimerEvent::DeselectTask).await
    }

    pub async fn switch_mode(&self, mode: TimerMode) -> Result<TimerSnapshot> {
        self.dispatch(TimerEvent::SwitchMode(mode)).await
    }

    /// Tells the timer a task was deleted or completed elsewhere.
    pub async fn task_removed(&self, task_id: i64) -> Result<TimerSnapshot> {
        self.dispatch(TimerEvent::TaskRemoved(task_id)).await
    }

    /// Advances the countdown by one second. Meant for [`TickSource::Manual`].
    pub async fn tick(&self) -> Result<TimerSnapshot> {
        self.dispatch(TimerEvent::Tick).await
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<TimerSnapshot> {
        self.snapshots.clone()
    }

    pub fn shutdown(&self) {
        if self.sender.send(DriverMsg::Shutdown).is_err() {
            log_debug!("timer driver already stopped");
        }
    }

    async fn dispatch(&self, event: TimerEvent) -> Result<TimerSnapshot> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(DriverMsg::Dispatch {
                event,
                reply: Some(reply_tx),
            })
            .map_err(|_| anyhow!("timer driver has stopped"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("timer driver stopped before replying"))
    }
}

struct Driver<R, C> {
    state: TimerState,
    recorder: Arc<R>,
    completer: Arc<C>,
    ticks: TickSource,
    /// Weak so the driver exits once every handle is gone.
    events: mpsc::WeakUnboundedSender<DriverMsg>,
    snapshots: watch::Sender<TimerSnapshot>,
    ticker: Option<CancellationToken>,
    generation: u64,
}

impl<R, C> Driver<R, C>
where
    R: SessionRecorder,
    C: TaskCompleter,
{
    async fn run(mut self, mut receiver: mpsc::UnboundedReceiver<DriverMsg>) {
        while let Some(msg) = receiver.recv().await {
            match msg {
                DriverMsg::Dispatch { event, reply } => {
                    let snapshot = self.handle(event);
                    if let Some(reply) = reply {
                        let _ = reply.send(snapshot);
                    }
                }
                DriverMsg::Tick { generation } => {
                    if generation == self.generation && self.ticker.is_some() {
                        self.handle(TimerEvent::Tick);
                    } else {
                        log_debug!("dropping tick from stale ticker generation {generation}");
                    }
                }
                DriverMsg::Shutdown => break,
            }
        }

        self.stop_ticking();
        log_info!("timer driver shutting down");
    }

    fn handle(&mut self, event: TimerEvent) -> TimerSnapshot {
        let effects = self.state.apply(event);
        for effect in effects {
            self.perform(effect);
        }

        let snapshot = self.state.snapshot();
        self.snapshots.send_replace(snapshot.clone());
        snapshot
    }

    fn perform(&mut self, effect: TimerEffect) {
        match effect {
            TimerEffect::BeginTicking => self.begin_ticking(),
            TimerEffect::StopTicking => self.stop_ticking(),
            TimerEffect::OpenSession { epoch, request } => {
                let recorder = Arc::clone(&self.recorder);
                let events = self.events.clone();
                tokio::spawn(async move {
                    let event = match recorder.open(request).await {
                        Ok(session) => {
                            log_info!("opened {} session {}", session.kind.as_str(), session.id);
                            TimerEvent::SessionOpened {
                                epoch,
                                session_id: session.id,
                            }
                        }
                        Err(err) => {
                            log_warn!("failed to open session, timer continues unrecorded: {err:?}");
                            TimerEvent::SessionOpenFailed { epoch }
                        }
                    };
                    if let Some(sender) = events.upgrade() {
                        let _ = sender.send(DriverMsg::Dispatch { event, reply: None });
                    }
                });
            }
            TimerEffect::CompleteSession { session_id } => {
                let recorder = Arc::clone(&self.recorder);
                tokio::spawn(async move {
                    match recorder.complete(&session_id).await {
                        Ok(session) if session.id == session_id => {
                            log_info!("completed session {session_id}");
                        }
                        Ok(session) => {
                            log_warn!(
                                "stale completion reply: expected {session_id}, got {}",
                                session.id
                            );
                        }
                        Err(err) => log_warn!("failed to complete session {session_id}: {err:?}"),
                    }
                });
            }
            TimerEffect::CompleteTask { task_id } => {
                let completer = Arc::clone(&self.completer);
                tokio::spawn(async move {
                    if let Err(err) = completer.complete_task(task_id).await {
                        log_warn!("failed to mark task {task_id} completed: {err:?}");
                    }
                });
            }
            TimerEffect::PhaseFinished { mode } => {
                log_info!(
                    "{mode:?} phase finished ({} focus phases completed)",
                    self.state.completed_focus_count()
                );
            }
        }
    }

    fn begin_ticking(&mut self) {
        self.stop_ticking();

        let TickSource::Interval(period) = self.ticks else {
            return;
        };
        let token = CancellationToken::new();
        self.ticker = Some(token.clone());
        tokio::spawn(run_ticker(period, token, self.events.clone(), self.generation));
    }

    /// Cancels the ticker and invalidates any ticks it already queued.
    fn stop_ticking(&mut self) {
        if let Some(token) = self.ticker.take() {
            token.cancel();
        }
        self.generation += 1;
    }
}

async fn run_ticker(
    period: Duration,
    cancel_token: CancellationToken,
    events: mpsc::WeakUnboundedSender<DriverMsg>,
    generation: u64,
) {
    let mut interval = time::interval_at(Instant::now() + period, period);
    // A stalled runtime catches up instead of silently losing seconds.
    interval.set_missed_tick_behavior(MissedTickBehavior::Burst);

    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => break,
            _ = interval.tick() => {
                let Some(sender) = events.upgrade() else { break };
                if sender.send(DriverMsg::Tick { generation }).is_err() {
                    break;
                }
            }
        }
    }
}
