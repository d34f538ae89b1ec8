use std::sync::OnceLock;

use anyhow::{Context, Result};
use log::{info, warn};
use regex::Regex;

use crate::{host::DocumentStore, models::BoundTask};

use super::{
    annotation::{first_counter, CounterAnnotation},
    reanchor::validate_at_hint,
};

fn open_checkbox_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\s*[-*+]\s*)\[ \]").expect("checkbox pattern compiles"))
}

/// A task line after one completed work interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineUpdate {
    pub line: String,
    pub count: u32,
    pub goal: Option<u32>,
    /// The leading checkbox was ticked because the goal was reached.
    pub checked_off: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionOutcome {
    Logged(LineUpdate),
    /// The stored line no longer looks like the bound task; nothing written.
    Drifted,
    /// The bound document no longer resolves; nothing written.
    MissingDocument,
}

/// Bumps the counter on `line`, appending a fresh one when none parses, and
/// ticks the leading checkbox once a goal is met.
pub fn apply_completion(line: &str) -> LineUpdate {
    let (body, line_end) = match line.strip_suffix('\r') {
        Some(body) => (body, "\r"),
        None => (line, ""),
    };

    let (mut updated, counter) = match CounterAnnotation::find(body) {
        Some(existing) => {
            let next = existing.incremented();
            let mut updated = String::with_capacity(body.len() + 4);
            updated.push_str(&body[..existing.span.start]);
            updated.push_str(&next.render());
            updated.push_str(&body[existing.span.end..]);
            (updated, Some(next))
        }
        None => (format!("{body} {}", first_counter()), None),
    };

    let mut checked_off = false;
    if counter.as_ref().is_some_and(CounterAnnotation::goal_reached) {
        let checkbox = open_checkbox_regex();
        if checkbox.is_match(&updated) {
            updated = checkbox.replacen(&updated, 1, "${1}[x]").into_owned();
            checked_off = true;
        }
    }

    updated.push_str(line_end);
    LineUpdate {
        line: updated,
        count: counter.as_ref().map_or(1, |c| c.count),
        goal: counter.and_then(|c| c.goal),
        checked_off,
    }
}

/// Applies a completion to the bound line of `text`. `None` on drift.
pub fn log_completion_in_text(text: &str, task: &BoundTask) -> Option<(String, LineUpdate)> {
    let mut lines: Vec<&str> = text.split('\n').collect();
    let idx = validate_at_hint(&lines, task.line, &task.text)?;

    let update = apply_completion(lines[idx]);
    lines[idx] = &update.line;
    Some((lines.join("\n"), update))
}

/// Re-reads the bound document, updates the task line and writes the whole
/// document back.
pub async fn log_completion<D: DocumentStore>(
    docs: &D,
    task: &BoundTask,
) -> Result<CompletionOutcome> {
    if docs.resolve_path(&task.path).await.is_none() {
        warn!("Bound document {} is gone; completion not logged", task.path);
        return Ok(CompletionOutcome::MissingDocument);
    }

    let text = docs
        .read_document(&task.path)
        .await
        .with_context(|| format!("failed to re-read {}", task.path))?;

    let Some((updated, update)) = log_completion_in_text(&text, task) else {
        warn!(
            "Line {} of {} no longer matches '{}'; completion not logged",
            task.line, task.path, task.text
        );
        return Ok(CompletionOutcome::Drifted);
    };

    docs.write_document(&task.path, &updated)
        .await
        .with_context(|| format!("failed to write completion to {}", task.path))?;

    info!(
        "Logged completion on {}:{} (count {}{})",
        task.path,
        task.line,
        update.count,
        if update.checked_off { ", task done" } else { "" }
    );
    Ok(CompletionOutcome::Logged(update))
}
