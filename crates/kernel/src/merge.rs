use serde::{Deserialize, Serialize};

/// How an annotation value combines with the accumulator entry already
/// carrying the same name during annotation merging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeStrategy {
    Replace,
    Shallow,
    Deep,
}

impl Default for MergeStrategy {
    fn default() -> Self {
        MergeStrategy::Replace
    }
}

impl MergeStrategy {
    pub const fn as_str(self) -> &'static str {
        match self {
            MergeStrategy::Replace => "replace",
            MergeStrategy::Shallow => "shallow",
            MergeStrategy::Deep => "deep",
        }
    }
}
