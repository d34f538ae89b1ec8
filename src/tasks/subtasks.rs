use std::collections::BTreeSet;

use serde::Serialize;

use crate::settings::Settings;

use super::scan::{done_task_regex, open_task_regex};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Subtask {
    pub line: usize,
    pub text: String,
    pub completed: bool,
    /// Ticked during the running session.
    pub in_session: bool,
    pub done_today: bool,
}

/// Checkbox items between the anchored task and the next tagged task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubtaskScan {
    pub open: Vec<Subtask>,
    pub done: Vec<Subtask>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SubtaskView {
    pub items: Vec<Subtask>,
    pub pending: usize,
    pub total: usize,
}

/// `today` is matched literally against completed lines (`YYYY-MM-DD`).
pub fn collect_subtasks(
    lines: &[&str],
    anchor: usize,
    tag: &str,
    session_done: &BTreeSet<String>,
    today: &str,
) -> SubtaskScan {
    let open_re = open_task_regex();
    let done_re = done_task_regex();
    let mut scan = SubtaskScan::default();

    for (idx, line) in lines.iter().enumerate().skip(anchor + 1) {
        let is_open = open_re.is_match(line);
        let is_done = done_re.is_match(line);

        if (is_open || is_done) && line.contains(tag) {
            break;
        }

        if is_open {
            scan.open.push(Subtask {
                line: idx,
                text: open_re.replace(line, "").trim().to_string(),
                completed: false,
                in_session: false,
                done_today: false,
            });
        } else if is_done {
            let text = done_re.replace(line, "").trim().to_string();
            let in_session = session_done
                .iter()
                .any(|stored| !stored.is_empty() && text.contains(stored.as_str()));
            scan.done.push(Subtask {
                line: idx,
                done_today: in_session || line.contains(today),
                text,
                completed: true,
                in_session,
            });
        }
    }

    scan
}

/// Open subtasks fill the display limit first. Completed ones show when the
/// settings ask for them or they were ticked this session; session ticks, and
/// today's completions with `show_completed_today`, bypass the limit.
pub fn select_subtasks(scan: SubtaskScan, settings: &Settings) -> SubtaskView {
    let total = scan.open.len() + scan.done.len();
    let pending = scan.open.len();
    let mut slots = if settings.enable_subtask_limit {
        settings.subtask_count
    } else {
        usize::MAX
    };
    let mut items = Vec::new();

    for task in scan.open {
        if slots == 0 {
            break;
        }
        items.push(task);
        slots -= 1;
    }

    for task in scan.done {
        if !(settings.show_completed_subtasks || task.in_session) {
            continue;
        }
        let bypass = (settings.show_completed_today && task.done_today) || task.in_session;
        if bypass {
            items.push(task);
        } else if slots > 0 {
            items.push(task);
            slots -= 1;
        }
    }

    SubtaskView {
        items,
        pending,
        total,
    }
}

/// Whether `line` is still a checkbox item carrying `text`.
pub fn line_holds_subtask(line: &str, text: &str) -> bool {
    let line = line.trim_end_matches('\r');
    let is_item = open_task_regex().is_match(line) || done_task_regex().is_match(line);
    is_item && !text.trim().is_empty() && line.contains(text.trim())
}

/// Ticks or unticks the first checkbox on a line.
pub fn toggle_checkbox(line: &str, checked: bool) -> String {
    if checked {
        line.replacen("[ ]", "[x]", 1)
    } else {
        line.replacen("[x]", "[ ]", 1).replacen("[X]", "[ ]", 1)
    }
}
