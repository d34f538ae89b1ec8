use std::time::Duration;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Sound id that disables a cue.
pub const SILENT_SOUND: &str = "none";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SoundCue {
    WorkStart,
    WorkEnd,
    /// Used for both short and long breaks.
    BreakEnd,
    Pause,
}

/// User-facing plugin settings. Persisted flattened into the plugin blob, so
/// every field needs a default for blobs written by older versions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub tag: String,
    /// Minutes.
    pub work_duration: u32,
    pub short_break_duration: u32,
    pub long_break_duration: u32,
    pub subtask_count: usize,
    pub enable_subtask_limit: bool,
    pub default_subtasks_expanded: bool,
    pub show_completed_subtasks: bool,
    pub show_completed_today: bool,
    pub auto_start_paused: bool,
    pub work_start_sound: String,
    pub work_end_sound: String,
    pub break_end_sound: String,
    pub pause_sound: String,
    pub volume: f32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tag: "#pomodoro".into(),
            work_duration: 25,
            short_break_duration: 5,
            long_break_duration: 15,
            subtask_count: 3,
            enable_subtask_limit: true,
            default_subtasks_expanded: true,
            show_completed_subtasks: false,
            show_completed_today: false,
            auto_start_paused: false,
            work_start_sound: "tick".into(),
            work_end_sound: "chime".into(),
            break_end_sound: "bell".into(),
            pause_sound: SILENT_SOUND.into(),
            volume: 0.5,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if self.tag.trim().is_empty() {
            bail!("tag must not be empty");
        }
        if self.work_duration == 0 || self.short_break_duration == 0 || self.long_break_duration == 0
        {
            bail!("durations must be at least one minute");
        }
        if !(0.0..=1.0).contains(&self.volume) {
            bail!("volume {} is outside 0.0..=1.0", self.volume);
        }
        Ok(())
    }

    /// Sound configured for a cue, `None` when the cue is silenced.
    pub fn sound_for(&self, cue: SoundCue) -> Option<&str> {
        let id = match cue {
            SoundCue::WorkStart => &self.work_start_sound,
            SoundCue::WorkEnd => &self.work_end_sound,
            SoundCue::BreakEnd => &self.break_end_sound,
            SoundCue::Pause => &self.pause_sound,
        };
        let id = id.trim();
        (!id.is_empty() && id != SILENT_SOUND).then_some(id)
    }
}

/// Runtime knobs that are not user settings.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub tick_interval: Duration,
    /// Logs every tick when set.
    pub debug: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            debug: false,
        }
    }
}

impl ControllerConfig {
    /// Reads `POMOTASK_TICK_MS` and `POMOTASK_DEBUG`.
    pub fn from_env() -> Self {
        let debug = std::env::var("POMOTASK_DEBUG")
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        let tick_interval = std::env::var("POMOTASK_TICK_MS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
            .unwrap_or(Duration::from_secs(1));

        Self {
            tick_interval,
            debug,
        }
    }
}
