//! The `🍅:: N[/M]` counter embedded in task lines.
//!
//! Two syntaxes exist in the wild. Lines written by older versions wrap the
//! counter as a dataview field, `[🍅:: N/M]`; current versions write it bare.
//! Both are read, only the bare form is written.

use std::{ops::Range, sync::OnceLock};

use regex::{Captures, Regex};

pub const COUNTER_MARKER: &str = "🍅::";

const COUNTER_PATTERN: &str =
    r"\[🍅::\s*([0-9]+)(?:\s*/\s*([0-9]+))?\]|🍅::\s*([0-9]+)(?:\s*/\s*([0-9]+))?";

pub(crate) fn counter_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(COUNTER_PATTERN).expect("counter pattern compiles"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotationSyntax {
    /// `[🍅:: N/M]`, read-only.
    Bracketed,
    /// `🍅:: N/M`, the only form written.
    Inline,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterAnnotation {
    pub count: u32,
    pub goal: Option<u32>,
    pub syntax: AnnotationSyntax,
    /// Byte range of the whole match, brackets included.
    pub span: Range<usize>,
    goal_text: Option<String>,
}

impl CounterAnnotation {
    /// First counter on the line. Counters whose numbers do not fit are
    /// treated as absent.
    pub fn find(line: &str) -> Option<Self> {
        let caps = counter_regex().captures(line)?;
        Self::from_captures(&caps)
    }

    fn from_captures(caps: &Captures<'_>) -> Option<Self> {
        let whole = caps.get(0)?;
        let (syntax, count, goal) = match caps.get(1) {
            Some(count) => (AnnotationSyntax::Bracketed, count, caps.get(2)),
            None => (AnnotationSyntax::Inline, caps.get(3)?, caps.get(4)),
        };

        let count = count.as_str().parse::<u32>().ok()?;
        let goal_text = goal.map(|m| m.as_str().to_string());
        let goal = match &goal_text {
            Some(raw) => Some(raw.parse::<u32>().ok()?),
            None => None,
        };

        Some(Self {
            count,
            goal,
            syntax,
            span: whole.range(),
            goal_text,
        })
    }

    /// The counter after one more completed interval. Goal kept verbatim.
    pub fn incremented(&self) -> Self {
        Self {
            count: self.count.saturating_add(1),
            ..self.clone()
        }
    }

    pub fn goal_reached(&self) -> bool {
        matches!(self.goal, Some(goal) if self.count >= goal)
    }

    /// Canonical written form, always inline.
    pub fn render(&self) -> String {
        match &self.goal_text {
            Some(goal) => format!("{COUNTER_MARKER} {}/{goal}", self.count),
            None => format!("{COUNTER_MARKER} {}", self.count),
        }
    }

    /// Short label for display, e.g. `🍅 2/4`.
    pub fn label(&self) -> String {
        match self.goal {
            Some(goal) => format!("🍅 {}/{goal}", self.count),
            None => format!("🍅 {}", self.count),
        }
    }
}

/// Counter written on a task's first completed interval.
pub fn first_counter() -> String {
    format!("{COUNTER_MARKER} 1")
}
