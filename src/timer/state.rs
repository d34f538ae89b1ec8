use std::{cmp, collections::BTreeSet};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{models::BoundTask, settings::Settings};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum TimerMode {
    #[default]
    Idle,
    Work,
    Break,
}

/// Interval kinds a session can be started in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SessionKind {
    Work,
    Break,
}

impl SessionKind {
    pub fn opposite(self) -> Self {
        match self {
            SessionKind::Work => SessionKind::Break,
            SessionKind::Break => SessionKind::Work,
        }
    }
}

impl From<SessionKind> for TimerMode {
    fn from(kind: SessionKind) -> Self {
        match kind {
            SessionKind::Work => TimerMode::Work,
            SessionKind::Break => TimerMode::Break,
        }
    }
}

/// Per-cycle minute values that win over the settings defaults.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct DurationOverrides {
    pub work: Option<u32>,
    pub short_break: Option<u32>,
}

impl DurationOverrides {
    pub fn new(work: u32, short_break: u32) -> Self {
        Self {
            work: Some(work),
            short_break: Some(short_break),
        }
    }

    pub fn minutes_for(&self, kind: SessionKind, settings: &Settings) -> u32 {
        match kind {
            SessionKind::Work => self.work.unwrap_or(settings.work_duration),
            SessionKind::Break => self.short_break.unwrap_or(settings.short_break_duration),
        }
    }
}

/// The one timer session.
///
/// `started_at` is an adjusted anchor, not the wall-clock start: every resume
/// shifts it forward by the paused span so `now - started_at` is always the
/// net running time. `paused_at` being set is the only pause flag.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionState {
    pub mode: TimerMode,
    pub started_at: Option<DateTime<Utc>>,
    pub paused_at: Option<DateTime<Utc>>,
    pub duration_minutes: u32,
    pub task: Option<BoundTask>,
    pub completed_subtasks: BTreeSet<String>,
    pub overrides: Option<DurationOverrides>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_idle(&self) -> bool {
        self.mode == TimerMode::Idle
    }

    pub fn is_paused(&self) -> bool {
        self.paused_at.is_some()
    }

    /// Counting down: neither idle nor paused.
    pub fn is_running(&self) -> bool {
        !self.is_idle() && !self.is_paused()
    }

    pub fn kind(&self) -> Option<SessionKind> {
        match self.mode {
            TimerMode::Idle => None,
            TimerMode::Work => Some(SessionKind::Work),
            TimerMode::Break => Some(SessionKind::Break),
        }
    }

    pub fn total_ms(&self) -> i64 {
        i64::from(self.duration_minutes) * 60_000
    }

    /// Net running time, frozen at `paused_at` while paused.
    pub fn elapsed_ms(&self, now: DateTime<Utc>) -> i64 {
        match self.started_at {
            Some(started_at) if !self.is_idle() => {
                let reference = self.paused_at.unwrap_or(now);
                cmp::max((reference - started_at).num_milliseconds(), 0)
            }
            _ => 0,
        }
    }

    pub fn remaining_ms(&self, now: DateTime<Utc>) -> u64 {
        if self.is_idle() || self.started_at.is_none() {
            return 0;
        }
        let remaining = self.total_ms() - self.elapsed_ms(now);
        cmp::max(remaining, 0) as u64
    }

    pub fn remaining_seconds(&self, now: DateTime<Utc>) -> f64 {
        self.remaining_ms(now) as f64 / 1000.0
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        !self.is_idle() && self.remaining_ms(now) == 0
    }

    pub fn begin_session(
        &mut self,
        task: BoundTask,
        kind: SessionKind,
        duration_minutes: u32,
        overrides: Option<DurationOverrides>,
        now: DateTime<Utc>,
    ) {
        *self = Self {
            mode: kind.into(),
            started_at: Some(now),
            paused_at: None,
            duration_minutes,
            task: Some(task),
            completed_subtasks: BTreeSet::new(),
            overrides,
        };
    }

    /// Back to the idle baseline.
    pub fn cancel(&mut self) {
        *self = Self::default();
    }

    /// Returns false when idle or already paused.
    pub fn pause(&mut self, now: DateTime<Utc>) -> bool {
        if self.is_idle() || self.is_paused() {
            return false;
        }
        self.paused_at = Some(now);
        true
    }

    /// Shifts the anchor forward by the paused span. Returns false unless a
    /// started session is paused.
    pub fn resume(&mut self, now: DateTime<Utc>) -> bool {
        let (Some(paused_at), Some(started_at)) = (self.paused_at, self.started_at) else {
            return false;
        };
        if self.is_idle() {
            return false;
        }
        let paused_for = cmp::max(now - paused_at, Duration::zero());
        self.started_at = Some(started_at + paused_for);
        self.paused_at = None;
        true
    }

    /// Restarts the current interval at full length, keeping mode and task.
    pub fn restart(&mut self, now: DateTime<Utc>) -> bool {
        if self.is_idle() {
            return false;
        }
        self.started_at = Some(now);
        self.paused_at = None;
        true
    }

    /// Stores the overrides and retargets the running interval without moving
    /// its anchor.
    pub fn apply_overrides(&mut self, overrides: DurationOverrides) {
        self.overrides = Some(overrides);
        match self.kind() {
            Some(SessionKind::Work) => {
                if let Some(work) = overrides.work {
                    self.duration_minutes = work;
                }
            }
            Some(SessionKind::Break) => {
                if let Some(short_break) = overrides.short_break {
                    self.duration_minutes = short_break;
                }
            }
            None => {}
        }
    }

    pub fn mark_subtask(&mut self, text: &str, done: bool) {
        if done {
            self.completed_subtasks.insert(text.to_string());
        } else {
            self.completed_subtasks.remove(text);
        }
    }

    /// Repairs a restored session so the mode/anchor invariants hold.
    /// Returns true when something had to change.
    pub fn sanitize(&mut self) -> bool {
        let consistent = match self.mode {
            TimerMode::Idle => self.started_at.is_none() && self.paused_at.is_none(),
            TimerMode::Work | TimerMode::Break => {
                self.started_at.is_some() && self.task.is_some() && self.duration_minutes > 0
            }
        };
        if consistent {
            return false;
        }
        if self.is_idle() {
            let overrides = self.overrides;
            self.cancel();
            self.overrides = overrides;
        } else {
            self.cancel();
        }
        true
    }
}
