//! Pomodoro timer core for tagged markdown tasks.
//!
//! A [`TimerController`] owns the single focus/break session, bound to one task
//! line in a host document. Finished work intervals bump a `🍅:: N[/M]` counter
//! on that line and tick the task off once the goal is reached. Documents and
//! the plugin's persisted data are reached through the [`host`] traits.

pub mod clock;
pub mod completion;
pub mod db;
pub mod host;
pub mod models;
pub mod settings;
pub mod tasks;
pub mod timer;

pub use clock::{Clock, ManualClock, SystemClock};
pub use completion::{CompletionOutcome, CounterAnnotation};
pub use db::Database;
pub use host::{DocumentStore, FsDocumentStore, PluginDataStore};
pub use models::{BoundTask, PluginData, Stats};
pub use settings::{ControllerConfig, Settings, SoundCue};
pub use timer::{
    DurationOverrides, SessionKind, SessionState, TimerController, TimerEvent, TimerMode,
    TimerSnapshot,
};

/// Installs `env_logger` (reads `RUST_LOG`, defaults to info). Later calls are
/// no-ops.
pub fn init_logging() {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .try_init();
}
