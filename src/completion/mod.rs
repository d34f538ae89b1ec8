//! Writing completed work intervals back into the task's document.

pub mod annotation;
pub mod logger;
pub mod reanchor;

pub use annotation::{AnnotationSyntax, CounterAnnotation, COUNTER_MARKER};
pub use logger::{apply_completion, log_completion, log_completion_in_text, CompletionOutcome, LineUpdate};
pub use reanchor::{reanchor_by_prefix, validate_at_hint};
