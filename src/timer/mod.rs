pub mod controller;
pub mod state;

pub use controller::{TimerController, TimerEvent, TimerSnapshot};
pub use state::{DurationOverrides, SessionKind, SessionState, TimerMode};
