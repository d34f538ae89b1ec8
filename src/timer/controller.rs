use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use chrono::Local;
use log::{debug, error, info, warn};
use serde::Serialize;
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::{
    clock::Clock,
    completion::{log_completion, reanchor_by_prefix, CompletionOutcome, CounterAnnotation},
    host::{DocumentStore, PluginDataStore},
    models::{BoundTask, PluginData, Stats},
    settings::{ControllerConfig, Settings, SoundCue},
    tasks::{
        collect_subtasks, line_holds_subtask, scan_tasks, select_subtasks, toggle_checkbox,
        SubtaskView, TaskItem,
    },
};

use super::{DurationOverrides, SessionKind, SessionState, TimerMode};

const EVENT_CAPACITY: usize = 64;

const WORK_DONE_NOTICE: &str = "Pomodoro finished! Time for a break.";
const BREAK_DONE_NOTICE: &str = "Break finished! Ready to work?";
const DRIFT_NOTICE: &str = "Task line changed? Could not log time to the exact line.";
const MISSING_NOTICE: &str = "Task note is gone. Could not log time.";
const WRITE_FAILED_NOTICE: &str = "Could not save the pomodoro count to the task note.";

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct TimerSnapshot {
    pub state: SessionState,
    pub remaining_ms: u64,
    pub is_paused: bool,
}

impl TimerSnapshot {
    fn capture(state: &SessionState, clock: &dyn Clock) -> Self {
        Self {
            remaining_ms: state.remaining_ms(clock.now()),
            is_paused: state.is_paused(),
            state: state.clone(),
        }
    }

    pub fn mode(&self) -> TimerMode {
        self.state.mode
    }

    pub fn task(&self) -> Option<&BoundTask> {
        self.state.task.as_ref()
    }
}

/// Everything observers are told about.
#[derive(Debug, Serialize, Clone)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TimerEvent {
    /// After every transition; redraw everything.
    StateChanged { snapshot: TimerSnapshot },
    /// Countdown refresh only.
    #[serde(rename_all = "camelCase")]
    Tick { remaining_ms: u64 },
    Notice { message: String },
    #[serde(rename_all = "camelCase")]
    Sound {
        cue: SoundCue,
        sound_id: String,
        volume: f32,
    },
}

struct Ticker {
    handle: JoinHandle<()>,
    cancel: CancellationToken,
}

/// Owns the timer session and is the only writer of it.
///
/// Every operation takes the state lock for its whole duration, document I/O
/// included, so the recurring tick and user calls are serialized.
pub struct TimerController<D, S> {
    state: Arc<Mutex<PluginData>>,
    docs: Arc<D>,
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    events: broadcast::Sender<TimerEvent>,
    ticker: Arc<Mutex<Option<Ticker>>>,
    config: ControllerConfig,
}

impl<D, S> Clone for TimerController<D, S> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            docs: self.docs.clone(),
            store: self.store.clone(),
            clock: self.clock.clone(),
            events: self.events.clone(),
            ticker: self.ticker.clone(),
            config: self.config.clone(),
        }
    }
}

impl<D: DocumentStore, S: PluginDataStore> TimerController<D, S> {
    /// Controller with default settings and an idle session.
    pub fn new(docs: D, store: S, clock: Arc<dyn Clock>, config: ControllerConfig) -> Self {
        Self::with_data(docs, store, clock, config, PluginData::default())
    }

    /// Restores settings, stats and the session from the plugin data slot and
    /// picks the countdown back up if a session was running.
    pub async fn load(
        docs: D,
        store: S,
        clock: Arc<dyn Clock>,
        config: ControllerConfig,
    ) -> Result<Self> {
        let raw = store
            .load_plugin_data()
            .await
            .context("failed to load plugin data")?;

        let mut data = match raw {
            Some(value) => PluginData::from_value(value).unwrap_or_else(|(fallback, err)| {
                warn!("Plugin data unreadable, starting from defaults: {err}");
                fallback
            }),
            None => PluginData::default(),
        };

        if let Err(err) = data.settings.validate() {
            warn!("Stored settings rejected ({err}); using defaults");
            data.settings = Settings::default();
        }
        if data.timer_state.sanitize() {
            warn!("Restored timer state was inconsistent; reset to idle");
        }

        let running = data.timer_state.is_running();
        let remaining_ms = data.timer_state.remaining_ms(clock.now());
        let controller = Self::with_data(docs, store, clock, config, data);

        if running {
            info!("Resuming restored session with {remaining_ms} ms left");
            controller.spawn_ticker().await;
        }

        Ok(controller)
    }

    fn with_data(
        docs: D,
        store: S,
        clock: Arc<dyn Clock>,
        config: ControllerConfig,
        data: PluginData,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: Arc::new(Mutex::new(data)),
            docs: Arc::new(docs),
            store: Arc::new(store),
            clock,
            events,
            ticker: Arc::new(Mutex::new(None)),
            config,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TimerEvent> {
        self.events.subscribe()
    }

    pub fn documents(&self) -> &D {
        &self.docs
    }

    pub async fn get_snapshot(&self) -> TimerSnapshot {
        let guard = self.state.lock().await;
        TimerSnapshot::capture(&guard.timer_state, self.clock.as_ref())
    }

    pub async fn time_remaining_seconds(&self) -> f64 {
        let guard = self.state.lock().await;
        guard.timer_state.remaining_seconds(self.clock.now())
    }

    pub async fn settings(&self) -> Settings {
        self.state.lock().await.settings.clone()
    }

    pub async fn stats(&self) -> Stats {
        self.state.lock().await.stats
    }

    pub async fn start(
        &self,
        task: BoundTask,
        kind: SessionKind,
        overrides: Option<DurationOverrides>,
    ) -> Result<TimerSnapshot> {
        if task.path.trim().is_empty() {
            bail!("a session must be bound to a document");
        }
        if let Some(overrides) = overrides {
            validate_overrides(&overrides)?;
        }

        let mut guard = self.state.lock().await;
        self.start_locked(&mut guard, task, kind, overrides).await;
        Ok(TimerSnapshot::capture(&guard.timer_state, self.clock.as_ref()))
    }

    pub async fn stop(&self) -> TimerSnapshot {
        let mut guard = self.state.lock().await;
        self.stop_locked(&mut guard).await;
        TimerSnapshot::capture(&guard.timer_state, self.clock.as_ref())
    }

    pub async fn pause(&self) -> TimerSnapshot {
        let mut guard = self.state.lock().await;
        let now = self.clock.now();
        if guard.timer_state.pause(now) {
            self.cancel_ticker().await;
            info!("Session paused with {} ms left", guard.timer_state.remaining_ms(now));
            self.play(&guard.settings, SoundCue::Pause);
            self.persist(&guard).await;
            self.emit_state(&guard.timer_state);
        }
        TimerSnapshot::capture(&guard.timer_state, self.clock.as_ref())
    }

    pub async fn resume(&self) -> TimerSnapshot {
        let mut guard = self.state.lock().await;
        if guard.timer_state.resume(self.clock.now()) {
            info!("Session resumed");
            self.persist(&guard).await;
            self.spawn_ticker().await;
            self.emit_state(&guard.timer_state);
        }
        TimerSnapshot::capture(&guard.timer_state, self.clock.as_ref())
    }

    /// Restarts the current interval from its full length.
    pub async fn reset(&self) -> TimerSnapshot {
        let mut guard = self.state.lock().await;
        let now = self.clock.now();
        if guard.timer_state.restart(now) {
            info!("Session restarted");
            self.persist(&guard).await;
            self.spawn_ticker().await;
            self.emit_state(&guard.timer_state);
            self.emit(TimerEvent::Tick {
                remaining_ms: guard.timer_state.remaining_ms(now),
            });
        }
        TimerSnapshot::capture(&guard.timer_state, self.clock.as_ref())
    }

    /// Flips work and break on the same task, carrying the overrides over.
    /// Stops instead when the task's document is gone.
    pub async fn switch_mode(&self) -> TimerSnapshot {
        let mut guard = self.state.lock().await;
        let (Some(kind), Some(task)) = (guard.timer_state.kind(), guard.timer_state.task.clone())
        else {
            return TimerSnapshot::capture(&guard.timer_state, self.clock.as_ref());
        };
        let overrides = guard.timer_state.overrides;

        match self.docs.resolve_path(&task.path).await {
            Some(path) => {
                let task = BoundTask { path, ..task };
                self.start_locked(&mut guard, task, kind.opposite(), overrides)
                    .await;
            }
            None => {
                warn!("{} no longer resolves; stopping instead of switching", task.path);
                self.stop_locked(&mut guard).await;
            }
        }
        TimerSnapshot::capture(&guard.timer_state, self.clock.as_ref())
    }

    /// Stores per-cycle durations and retargets the running interval.
    pub async fn apply_overrides(&self, work: u32, short_break: u32) -> Result<TimerSnapshot> {
        let overrides = DurationOverrides::new(work, short_break);
        validate_overrides(&overrides)?;

        let mut guard = self.state.lock().await;
        guard.timer_state.apply_overrides(overrides);
        info!("Overrides set to {work}/{short_break} minutes");
        self.persist(&guard).await;
        self.emit_state(&guard.timer_state);
        let now = self.clock.now();
        if !guard.timer_state.is_idle() {
            self.emit(TimerEvent::Tick {
                remaining_ms: guard.timer_state.remaining_ms(now),
            });
        }
        Ok(TimerSnapshot::capture(&guard.timer_state, self.clock.as_ref()))
    }

    pub async fn update_settings(&self, settings: Settings) -> Result<()> {
        settings.validate()?;
        let mut guard = self.state.lock().await;
        guard.settings = settings;
        self.persist(&guard).await;
        self.emit_state(&guard.timer_state);
        Ok(())
    }

    pub async fn reset_stats(&self) -> Stats {
        let mut guard = self.state.lock().await;
        guard.stats.reset();
        info!("Stats reset");
        self.persist(&guard).await;
        self.emit_state(&guard.timer_state);
        guard.stats
    }

    /// Open tasks carrying the configured tag in a document.
    pub async fn list_tasks(&self, path: &str) -> Result<Vec<TaskItem>> {
        let tag = self.state.lock().await.settings.tag.clone();
        let text = self.docs.read_document(path).await?;
        Ok(scan_tasks(&text, &tag))
    }

    /// Subtasks under the bound task, re-anchored if the task moved.
    pub async fn subtasks(&self) -> Result<SubtaskView> {
        let (task, settings, session_done) = {
            let guard = self.state.lock().await;
            let Some(task) = guard.timer_state.task.clone() else {
                return Ok(SubtaskView::default());
            };
            (
                task,
                guard.settings.clone(),
                guard.timer_state.completed_subtasks.clone(),
            )
        };

        if self.docs.resolve_path(&task.path).await.is_none() {
            return Ok(SubtaskView::default());
        }
        let text = self.docs.read_document(&task.path).await?;
        let lines: Vec<&str> = text.split('\n').collect();
        let tag = settings.tag.trim();

        let Some(anchor) = reanchor_by_prefix(&task.text, &lines, task.line, tag) else {
            debug!("Bound task not found in {}; no subtasks", task.path);
            return Ok(SubtaskView::default());
        };

        let today = self
            .clock
            .now()
            .with_timezone(&Local)
            .format("%Y-%m-%d")
            .to_string();
        let scan = collect_subtasks(&lines, anchor, tag, &session_done, &today);
        Ok(select_subtasks(scan, &settings))
    }

    /// Ticks or unticks a subtask line in the bound document and remembers it
    /// as done during this session. Fails without writing when `line` no
    /// longer holds that subtask.
    pub async fn toggle_subtask(&self, line: usize, text: &str, checked: bool) -> Result<()> {
        let mut guard = self.state.lock().await;
        let task = guard
            .timer_state
            .task
            .clone()
            .ok_or_else(|| anyhow!("no task is bound to the timer"))?;

        let content = self.docs.read_document(&task.path).await?;
        let mut lines: Vec<&str> = content.split('\n').collect();
        let Some(current) = lines.get(line) else {
            bail!("line {line} is past the end of {}", task.path);
        };
        if !line_holds_subtask(current, text) {
            warn!("Line {line} of {} no longer holds subtask '{text}'", task.path);
            bail!("subtask '{text}' moved; reload the subtask list");
        }
        let toggled = toggle_checkbox(current, checked);
        lines[line] = &toggled;
        self.docs
            .write_document(&task.path, &lines.join("\n"))
            .await?;

        guard.timer_state.mark_subtask(text, checked);
        self.persist(&guard).await;
        self.emit_state(&guard.timer_state);
        Ok(())
    }

    /// Counter on the bound task's line, if any.
    pub async fn cycle_info(&self) -> Result<Option<CounterAnnotation>> {
        let Some(task) = self.state.lock().await.timer_state.task.clone() else {
            return Ok(None);
        };
        if self.docs.resolve_path(&task.path).await.is_none() {
            return Ok(None);
        }
        let text = self.docs.read_document(&task.path).await?;
        Ok(text
            .split('\n')
            .nth(task.line)
            .and_then(CounterAnnotation::find))
    }

    /// Stops the tick without touching the session, for host unload.
    pub async fn shutdown(&self) {
        if let Some(handle) = self.cancel_ticker().await {
            if let Err(err) = handle.await {
                error!("Ticker task failed: {err}");
            }
        }
    }

    async fn start_locked(
        &self,
        data: &mut PluginData,
        task: BoundTask,
        kind: SessionKind,
        overrides: Option<DurationOverrides>,
    ) {
        let now = self.clock.now();
        let minutes = overrides
            .unwrap_or_default()
            .minutes_for(kind, &data.settings);

        info!(
            "Starting {kind:?} session of {minutes} min on {}:{}",
            task.path, task.line
        );
        data.timer_state
            .begin_session(task, kind, minutes, overrides, now);

        if kind == SessionKind::Work {
            self.play(&data.settings, SoundCue::WorkStart);
        }
        if data.settings.auto_start_paused {
            data.timer_state.pause(now);
        }

        self.persist(data).await;
        self.spawn_ticker().await;
        self.emit_state(&data.timer_state);
    }

    async fn stop_locked(&self, data: &mut PluginData) {
        self.cancel_ticker().await;
        data.timer_state.cancel();
        info!("Session stopped");
        self.persist(data).await;
        self.emit_state(&data.timer_state);
    }

    /// One tick. Returns false once the ticker should exit.
    async fn on_tick(&self, token: &CancellationToken) -> bool {
        let mut guard = self.state.lock().await;
        if token.is_cancelled() || !guard.timer_state.is_running() {
            return false;
        }

        let remaining_ms = guard.timer_state.remaining_ms(self.clock.now());
        if remaining_ms > 0 {
            if self.config.debug {
                debug!("tick: {remaining_ms} ms left");
            }
            self.emit(TimerEvent::Tick { remaining_ms });
            return true;
        }

        self.complete_locked(&mut guard).await;
        false
    }

    async fn complete_locked(&self, data: &mut PluginData) {
        self.cancel_ticker().await;

        let session = data.timer_state.clone();
        match session.kind() {
            Some(SessionKind::Work) => {
                if let Some(task) = &session.task {
                    self.record_work_completion(data, task, session.duration_minutes)
                        .await;
                }
                self.play(&data.settings, SoundCue::WorkEnd);
                self.notice(WORK_DONE_NOTICE);
            }
            Some(SessionKind::Break) => {
                self.play(&data.settings, SoundCue::BreakEnd);
                self.notice(BREAK_DONE_NOTICE);
            }
            None => return,
        }

        self.stop_locked(data).await;
    }

    async fn record_work_completion(&self, data: &mut PluginData, task: &BoundTask, minutes: u32) {
        match log_completion(self.docs.as_ref(), task).await {
            Ok(CompletionOutcome::Logged(_)) => {
                data.stats.record_work_session(minutes);
                info!(
                    "Stats now {} sessions / {} min",
                    data.stats.completed_work_sessions, data.stats.total_work_minutes
                );
            }
            Ok(CompletionOutcome::Drifted) => self.notice(DRIFT_NOTICE),
            Ok(CompletionOutcome::MissingDocument) => self.notice(MISSING_NOTICE),
            Err(err) => {
                error!("Failed to log completion: {err:#}");
                self.notice(WRITE_FAILED_NOTICE);
            }
        }
    }

    async fn spawn_ticker(&self) {
        let mut ticker_guard = self.ticker.lock().await;
        if let Some(old) = ticker_guard.take() {
            old.cancel.cancel();
        }

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let controller = self.clone();
        let tick_interval = self.config.tick_interval;

        let handle = tokio::spawn(async move {
            let mut interval = time::interval_at(time::Instant::now() + tick_interval, tick_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {}
                }
                if !controller.on_tick(&token).await {
                    break;
                }
            }
        });

        *ticker_guard = Some(Ticker { handle, cancel });
    }

    /// Cancels the tick and hands back its task. Callers inside the tick must
    /// not await the handle.
    async fn cancel_ticker(&self) -> Option<JoinHandle<()>> {
        let ticker = self.ticker.lock().await.take()?;
        ticker.cancel.cancel();
        Some(ticker.handle)
    }

    async fn persist(&self, data: &PluginData) {
        let value = match serde_json::to_value(data) {
            Ok(value) => value,
            Err(err) => {
                error!("Failed to serialize plugin data: {err}");
                return;
            }
        };
        if let Err(err) = self.store.save_plugin_data(value).await {
            error!("Failed to save plugin data: {err:#}");
        }
    }

    fn emit(&self, event: TimerEvent) {
        let _ = self.events.send(event);
    }

    fn emit_state(&self, state: &SessionState) {
        self.emit(TimerEvent::StateChanged {
            snapshot: TimerSnapshot::capture(state, self.clock.as_ref()),
        });
    }

    fn notice(&self, message: &str) {
        info!("Notice: {message}");
        self.emit(TimerEvent::Notice {
            message: message.to_string(),
        });
    }

    fn play(&self, settings: &Settings, cue: SoundCue) {
        if let Some(sound_id) = settings.sound_for(cue) {
            self.emit(TimerEvent::Sound {
                cue,
                sound_id: sound_id.to_string(),
                volume: settings.volume,
            });
        }
    }
}

fn validate_overrides(overrides: &DurationOverrides) -> Result<()> {
    if overrides.work == Some(0) || overrides.short_break == Some(0) {
        bail!("override durations must be at least one minute");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration as StdDuration;

    use chrono::{DateTime, Duration, Utc};

    use super::*;
    use crate::{
        clock::ManualClock,
        host::memory::{MemoryDocuments, MemoryPluginData},
    };

    type TestController = TimerController<MemoryDocuments, MemoryPluginData>;

    const PLAN: &str = "# Plan\n\n- [ ] Write report 🍅:: 3/5 #pomodoro\n  - [ ] outline\n  - [ ] draft\n";

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-05-01T09:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn fast_config() -> ControllerConfig {
        ControllerConfig {
            tick_interval: StdDuration::from_millis(10),
            debug: true,
        }
    }

    fn controller_with(doc: &str) -> (TestController, ManualClock) {
        let clock = ManualClock::new(t0());
        let controller = TimerController::new(
            MemoryDocuments::with("plan.md", doc),
            MemoryPluginData::default(),
            Arc::new(clock.clone()),
            fast_config(),
        );
        (controller, clock)
    }

    fn report_task() -> BoundTask {
        BoundTask::new("plan.md", 2, "Write report 🍅:: 3/5")
    }

    /// Collects events until the session is back to idle.
    async fn events_until_idle(rx: &mut broadcast::Receiver<TimerEvent>) -> Vec<TimerEvent> {
        let mut seen = Vec::new();
        loop {
            let event = match time::timeout(StdDuration::from_secs(5), rx.recv()).await {
                Ok(Ok(event)) => event,
                Ok(Err(broadcast::error::RecvError::Lagged(_))) => continue,
                Ok(Err(err)) => panic!("event channel closed: {err}"),
                Err(_) => panic!("session never went idle; saw {seen:?}"),
            };
            let idle = matches!(
                &event,
                TimerEvent::StateChanged { snapshot } if snapshot.mode() == TimerMode::Idle
            );
            seen.push(event);
            if idle {
                return seen;
            }
        }
    }

    fn drain(rx: &mut broadcast::Receiver<TimerEvent>) -> Vec<TimerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn notices(events: &[TimerEvent]) -> Vec<&str> {
        events
            .iter()
            .filter_map(|event| match event {
                TimerEvent::Notice { message } => Some(message.as_str()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn switch_mode_carries_overrides_both_ways() {
        let (controller, _clock) = controller_with(PLAN);

        let work = controller
            .start(report_task(), SessionKind::Work, Some(DurationOverrides::new(50, 10)))
            .await
            .unwrap();
        assert_eq!(work.state.duration_minutes, 50);

        let rest = controller.switch_mode().await;
        assert_eq!(rest.mode(), TimerMode::Break);
        assert_eq!(rest.state.duration_minutes, 10);
        assert_eq!(rest.task(), Some(&report_task()));

        let back = controller.switch_mode().await;
        assert_eq!(back.mode(), TimerMode::Work);
        assert_eq!(back.state.duration_minutes, 50);
    }

    #[tokio::test]
    async fn switch_mode_stops_when_document_is_gone() {
        let (controller, _clock) = controller_with(PLAN);
        controller
            .start(report_task(), SessionKind::Work, None)
            .await
            .unwrap();

        controller.documents().remove("plan.md").await;
        let snapshot = controller.switch_mode().await;

        assert_eq!(snapshot.mode(), TimerMode::Idle);
        assert!(snapshot.task().is_none());
    }

    #[tokio::test]
    async fn overrides_retarget_the_running_work_session() {
        let (controller, clock) = controller_with(PLAN);
        let started = controller
            .start(report_task(), SessionKind::Work, None)
            .await
            .unwrap();
        assert_eq!(started.state.duration_minutes, 25);

        clock.advance(Duration::minutes(5));
        let snapshot = controller.apply_overrides(40, 5).await.unwrap();

        assert_eq!(snapshot.state.started_at, Some(t0()));
        assert_eq!(snapshot.remaining_ms, 35 * 60_000);
        assert_eq!(controller.time_remaining_seconds().await, 35.0 * 60.0);
        assert!(controller.apply_overrides(0, 5).await.is_err());
    }

    #[tokio::test]
    async fn paused_time_is_not_counted() {
        let (controller, clock) = controller_with(PLAN);
        controller
            .start(report_task(), SessionKind::Work, None)
            .await
            .unwrap();

        clock.advance_secs(120);
        let paused = controller.pause().await;
        assert!(paused.is_paused);

        clock.advance_secs(1_000);
        assert_eq!(controller.get_snapshot().await.remaining_ms, (25 * 60 - 120) * 1000);

        let resumed = controller.resume().await;
        assert!(!resumed.is_paused);
        assert_eq!(resumed.remaining_ms, (25 * 60 - 120) * 1000);
    }

    #[tokio::test]
    async fn reset_restarts_interval_and_keeps_binding() {
        let (controller, clock) = controller_with(PLAN);
        controller
            .start(report_task(), SessionKind::Break, None)
            .await
            .unwrap();
        clock.advance_secs(200);
        controller.pause().await;

        let snapshot = controller.reset().await;

        assert_eq!(snapshot.mode(), TimerMode::Break);
        assert!(!snapshot.is_paused);
        assert_eq!(snapshot.remaining_ms, 5 * 60_000);
        assert_eq!(snapshot.task(), Some(&report_task()));
    }

    #[tokio::test]
    async fn idle_operations_are_noops() {
        let (controller, _clock) = controller_with(PLAN);

        assert_eq!(controller.pause().await.mode(), TimerMode::Idle);
        assert_eq!(controller.resume().await.mode(), TimerMode::Idle);
        assert_eq!(controller.reset().await.mode(), TimerMode::Idle);
        assert_eq!(controller.switch_mode().await.mode(), TimerMode::Idle);
        assert_eq!(controller.time_remaining_seconds().await, 0.0);
    }

    #[tokio::test]
    async fn start_requires_a_document() {
        let (controller, _clock) = controller_with(PLAN);
        let result = controller
            .start(BoundTask::new("", 0, "x"), SessionKind::Work, None)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn auto_start_paused_freezes_the_new_session() {
        let (controller, clock) = controller_with(PLAN);
        controller
            .update_settings(Settings {
                auto_start_paused: true,
                ..Settings::default()
            })
            .await
            .unwrap();

        controller
            .start(report_task(), SessionKind::Work, None)
            .await
            .unwrap();
        clock.advance_secs(600);

        let snapshot = controller.get_snapshot().await;
        assert!(snapshot.is_paused);
        assert_eq!(snapshot.remaining_ms, 25 * 60_000);
    }

    #[tokio::test]
    async fn finished_work_session_logs_counter_and_stats() {
        let (controller, clock) = controller_with(PLAN);
        let mut rx = controller.subscribe();
        controller
            .start(report_task(), SessionKind::Work, None)
            .await
            .unwrap();

        clock.advance(Duration::minutes(25));
        let events = events_until_idle(&mut rx).await;

        let doc = controller.documents().get("plan.md").await.unwrap();
        assert!(doc.contains("- [ ] Write report 🍅:: 4/5 #pomodoro"));
        assert_eq!(
            controller.stats().await,
            Stats {
                completed_work_sessions: 1,
                total_work_minutes: 25,
            }
        );
        assert_eq!(notices(&events), vec![WORK_DONE_NOTICE]);
        assert!(events.iter().any(|event| matches!(
            event,
            TimerEvent::Sound { cue: SoundCue::WorkEnd, .. }
        )));

        let saved = controller.store.snapshot().await.unwrap();
        assert_eq!(saved["stats"]["completedWorkSessions"], 1);
        assert_eq!(saved["timerState"]["mode"], "idle");
    }

    #[tokio::test]
    async fn drifted_task_line_is_left_alone() {
        let (controller, clock) = controller_with(PLAN);
        let mut rx = controller.subscribe();
        controller
            .start(BoundTask::new("plan.md", 2, "Write report"), SessionKind::Work, None)
            .await
            .unwrap();

        let edited = "# Plan\n\n- [ ] Call the bank #pomodoro\n";
        controller.documents().put("plan.md", edited).await;
        clock.advance(Duration::minutes(26));
        let events = events_until_idle(&mut rx).await;

        assert_eq!(controller.documents().get("plan.md").await.unwrap(), edited);
        assert_eq!(controller.documents().write_count().await, 0);
        assert_eq!(notices(&events), vec![DRIFT_NOTICE, WORK_DONE_NOTICE]);
        assert_eq!(controller.stats().await, Stats::default());
    }

    #[tokio::test]
    async fn finished_break_does_not_touch_document() {
        let (controller, clock) = controller_with(PLAN);
        let mut rx = controller.subscribe();
        controller
            .start(report_task(), SessionKind::Break, None)
            .await
            .unwrap();

        clock.advance(Duration::minutes(5));
        let events = events_until_idle(&mut rx).await;

        assert_eq!(controller.documents().write_count().await, 0);
        assert_eq!(notices(&events), vec![BREAK_DONE_NOTICE]);
        assert_eq!(controller.stats().await, Stats::default());
    }

    #[tokio::test]
    async fn stop_clears_session_without_sound() {
        let (controller, _clock) = controller_with(PLAN);
        controller
            .start(report_task(), SessionKind::Work, Some(DurationOverrides::new(30, 5)))
            .await
            .unwrap();
        let mut rx = controller.subscribe();

        let snapshot = controller.stop().await;

        assert_eq!(snapshot.state, SessionState::default());
        let events = drain(&mut rx);
        assert!(events
            .iter()
            .any(|event| matches!(event, TimerEvent::StateChanged { .. })));
        assert!(!events
            .iter()
            .any(|event| matches!(event, TimerEvent::Sound { .. })));
    }

    #[tokio::test]
    async fn pause_plays_configured_sound() {
        let (controller, _clock) = controller_with(PLAN);
        controller
            .update_settings(Settings {
                pause_sound: "click".into(),
                ..Settings::default()
            })
            .await
            .unwrap();
        controller
            .start(report_task(), SessionKind::Work, None)
            .await
            .unwrap();
        let mut rx = controller.subscribe();

        controller.pause().await;

        let sounds: Vec<(SoundCue, String)> = drain(&mut rx)
            .into_iter()
            .filter_map(|event| match event {
                TimerEvent::Sound { cue, sound_id, .. } => Some((cue, sound_id)),
                _ => None,
            })
            .collect();
        assert_eq!(sounds, vec![(SoundCue::Pause, "click".to_string())]);
    }

    #[tokio::test]
    async fn restored_running_session_keeps_counting() {
        let clock = ManualClock::new(t0());
        let mut data = PluginData::default();
        data.timer_state
            .begin_session(report_task(), SessionKind::Work, 25, None, t0());
        let store = MemoryPluginData::with(serde_json::to_value(&data).unwrap());

        clock.advance(Duration::minutes(10));
        let controller = TimerController::load(
            MemoryDocuments::with("plan.md", PLAN),
            store,
            Arc::new(clock.clone()),
            fast_config(),
        )
        .await
        .unwrap();
        let mut rx = controller.subscribe();

        let snapshot = controller.get_snapshot().await;
        assert_eq!(snapshot.mode(), TimerMode::Work);
        assert_eq!(snapshot.remaining_ms, 15 * 60_000);

        clock.advance(Duration::minutes(15));
        events_until_idle(&mut rx).await;
        assert_eq!(controller.stats().await.completed_work_sessions, 1);
    }

    #[tokio::test]
    async fn invalid_stored_settings_fall_back_to_defaults() {
        let store = MemoryPluginData::with(serde_json::json!({
            "tag": "",
            "workDuration": 40,
            "stats": { "completedWorkSessions": 3, "totalWorkMinutes": 75 },
        }));

        let controller = TimerController::load(
            MemoryDocuments::with("plan.md", PLAN),
            store,
            Arc::new(ManualClock::new(t0())),
            fast_config(),
        )
        .await
        .unwrap();

        assert_eq!(controller.settings().await, Settings::default());
        assert_eq!(controller.stats().await.completed_work_sessions, 3);
        assert_eq!(controller.get_snapshot().await.mode(), TimerMode::Idle);
    }

    #[tokio::test]
    async fn subtasks_follow_the_moved_task_and_session_ticks() {
        let (controller, _clock) = controller_with(PLAN);
        controller
            .start(report_task(), SessionKind::Work, None)
            .await
            .unwrap();

        let moved = format!("# Added heading\n{PLAN}");
        controller.documents().put("plan.md", &moved).await;

        let view = controller.subtasks().await.unwrap();
        let texts: Vec<&str> = view.items.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["outline", "draft"]);

        controller.toggle_subtask(4, "outline", true).await.unwrap();

        let doc = controller.documents().get("plan.md").await.unwrap();
        assert!(doc.contains("  - [x] outline"));
        let view = controller.subtasks().await.unwrap();
        assert_eq!(view.pending, 1);
        assert!(view.items.iter().any(|s| s.text == "outline" && s.in_session));
    }

    #[tokio::test]
    async fn toggle_refuses_a_line_that_no_longer_holds_the_subtask() {
        let (controller, _clock) = controller_with(PLAN);
        controller
            .start(report_task(), SessionKind::Work, None)
            .await
            .unwrap();

        let shifted = "# Plan\n- [ ] Write report 🍅:: 3/5 #pomodoro\n  - [ ] outline\n- [ ] Other [ ] item\n";
        controller.documents().put("plan.md", shifted).await;

        let result = controller.toggle_subtask(3, "outline", true).await;

        assert!(result.is_err());
        assert_eq!(controller.documents().get("plan.md").await.unwrap(), shifted);
        assert_eq!(controller.documents().write_count().await, 0);
        assert!(controller
            .get_snapshot()
            .await
            .state
            .completed_subtasks
            .is_empty());

        controller.toggle_subtask(2, "outline", true).await.unwrap();
        let doc = controller.documents().get("plan.md").await.unwrap();
        assert!(doc.contains("  - [x] outline"));
        assert!(doc.contains("- [ ] Other [ ] item"));
    }

    #[tokio::test]
    async fn cycle_info_reads_bound_counter() {
        let (controller, _clock) = controller_with(PLAN);
        assert!(controller.cycle_info().await.unwrap().is_none());

        controller
            .start(report_task(), SessionKind::Work, None)
            .await
            .unwrap();

        let counter = controller.cycle_info().await.unwrap().unwrap();
        assert_eq!((counter.count, counter.goal), (3, Some(5)));
    }

    #[tokio::test]
    async fn list_tasks_uses_configured_tag() {
        let (controller, _clock) = controller_with(PLAN);
        let tasks = controller.list_tasks("plan.md").await.unwrap();

        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].line, 2);
        assert_eq!(tasks[0].display_text, "Write report");
    }

    #[tokio::test]
    async fn reset_stats_zeroes_counters() {
        let (controller, clock) = controller_with(PLAN);
        let mut rx = controller.subscribe();
        controller
            .start(report_task(), SessionKind::Work, None)
            .await
            .unwrap();
        clock.advance(Duration::minutes(25));
        events_until_idle(&mut rx).await;

        let stats = controller.reset_stats().await;

        assert_eq!(stats, Stats::default());
    }

    #[tokio::test]
    async fn shutdown_stops_ticking_but_keeps_session() {
        let (controller, _clock) = controller_with(PLAN);
        controller
            .start(report_task(), SessionKind::Work, None)
            .await
            .unwrap();

        controller.shutdown().await;

        assert_eq!(controller.get_snapshot().await.mode(), TimerMode::Work);
        assert!(controller.ticker.lock().await.is_none());
    }
}
