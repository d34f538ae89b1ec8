//! Finding tagged tasks and their subtasks in markdown text.

pub mod scan;
pub mod subtasks;

pub use scan::{clean_task_text, scan_tasks, TaskItem};
pub use subtasks::{
    collect_subtasks, line_holds_subtask, select_subtasks, toggle_checkbox, Subtask, SubtaskScan,
    SubtaskView,
};
