pub mod plugin_data;
pub mod stats;
pub mod task;

pub use plugin_data::PluginData;
pub use stats::Stats;
pub use task::BoundTask;
