use serde::{Deserialize, Serialize};

/// The task a session is bound to.
///
/// `line` is a hint captured at bind time; the document may have shifted
/// since, so writers re-validate against `text` before touching the line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BoundTask {
    pub path: String,
    pub line: usize,
    pub text: String,
}

impl BoundTask {
    pub fn new(path: impl Into<String>, line: usize, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            line,
            text: text.into(),
        }
    }
}
