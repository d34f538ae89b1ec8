use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct Stats {
    #[serde(alias = "completedSessions")]
    pub completed_work_sessions: u64,
    #[serde(alias = "totalWorkDuration")]
    pub total_work_minutes: u64,
}

impl Stats {
    pub fn record_work_session(&mut self, minutes: u32) {
        self.completed_work_sessions = self.completed_work_sessions.saturating_add(1);
        self.total_work_minutes = self.total_work_minutes.saturating_add(u64::from(minutes));
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
