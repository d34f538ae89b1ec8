use log::warn;
use serde::{Deserialize, Deserializer, Serialize};

use crate::{settings::Settings, timer::SessionState};

use super::Stats;

/// Everything the plugin persists, as one blob in the host's data slot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginData {
    #[serde(flatten)]
    pub settings: Settings,
    #[serde(default)]
    pub stats: Stats,
    #[serde(default, deserialize_with = "session_or_idle")]
    pub timer_state: SessionState,
}

/// A session that no longer decodes is dropped rather than taking the
/// settings and stats down with it.
fn session_or_idle<'de, D>(deserializer: D) -> Result<SessionState, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(raw).unwrap_or_else(|err| {
        warn!("Discarding unreadable timer state: {err}");
        SessionState::default()
    }))
}

impl PluginData {
    /// Decodes a stored blob, falling back to defaults for anything missing.
    /// Returns the defaults and the decode error when the blob is unusable.
    pub fn from_value(value: serde_json::Value) -> Result<Self, (Self, serde_json::Error)> {
        serde_json::from_value(value).map_err(|err| (Self::default(), err))
    }
}
