use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::completion::{annotation::counter_regex, CounterAnnotation};

/// Obsidian Tasks metadata symbols; display text is cut at the first one.
const TASK_SYMBOLS: [char; 10] = ['🔁', '🏁', '📅', '⏳', '🛫', '✅', '➕', '🔺', '⏫', '🔽'];

pub(crate) fn open_task_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*[-*] \[ \]").expect("open task pattern compiles"))
}

pub(crate) fn done_task_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^\s*[-*] \[x\]").expect("done task pattern compiles"))
}

fn tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"#[\w/-]+").expect("tag pattern compiles"))
}

fn inline_field_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[[^\]]+::.*?\]").expect("field pattern compiles"))
}

/// An open, tagged task found in a document.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TaskItem {
    pub line: usize,
    /// Line text without the checkbox and tag; this is what a session binds.
    pub text: String,
    pub display_text: String,
    #[serde(skip)]
    pub counter: Option<CounterAnnotation>,
    pub counter_label: Option<String>,
}

/// Open checkbox items carrying `tag`, in document order.
pub fn scan_tasks(text: &str, tag: &str) -> Vec<TaskItem> {
    let tag = tag.trim();
    let open = open_task_regex();

    text.split('\n')
        .enumerate()
        .filter(|(_, line)| open.is_match(line) && line.contains(tag))
        .map(|(idx, line)| {
            let text = open.replace(line, "").replacen(tag, "", 1).trim().to_string();
            let counter = CounterAnnotation::find(&text);
            TaskItem {
                line: idx,
                display_text: clean_task_text(&text),
                counter_label: counter.as_ref().map(CounterAnnotation::label),
                counter,
                text,
            }
        })
        .collect()
}

/// Strips counters, tags, inline fields and Tasks metadata for display.
pub fn clean_task_text(text: &str) -> String {
    let without_counters = counter_regex().replace_all(text, "");
    let without_tags = tag_regex().replace_all(&without_counters, "");
    let without_fields = inline_field_regex().replace_all(&without_tags, "");

    let cut = match without_fields.find(|c| TASK_SYMBOLS.contains(&c)) {
        Some(idx) => &without_fields[..idx],
        None => &without_fields[..],
    };

    cut.split_whitespace().collect::<Vec<_>>().join(" ")
}
