//! Types for stage evaluation.

use serde::{Deserialize, Serialize};

use crate::signature::Location;

/// The candidate that appeared, and where.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Matched {
    /// Id of the matched signature.
    pub candidate: String,
    pub location: Location,
}

/// Outcome of one stage evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum StageResult {
    Matched(Matched),
    /// No candidate appeared within the stage timeout.
    NotFound,
    /// The recognition host reported a fault.
    Error { reason: String },
    /// The session was cancelled at a polling boundary.
    Cancelled,
}

impl StageResult {
    pub fn matched(candidate: impl Into<String>, location: Location) -> Self {
        Self::Matched(Matched {
            candidate: candidate.into(),
            location,
        })
    }

    /// Short classification used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Matched(_) => "matched",
            Self::NotFound => "not_found",
            Self::Error { .. } => "error",
            Self::Cancelled => "cancelled",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_result_serialization() {
        let result = StageResult::matched("continue", Location::new(10, 20, 30, 40));
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["result"], "matched");
        assert_eq!(json["candidate"], "continue");
        assert_eq!(json["location"]["width"], 30);

        let json = serde_json::to_value(StageResult::NotFound).unwrap();
        assert_eq!(json["result"], "not_found");
    }

    #[test]
    fn test_kind() {
        assert_eq!(StageResult::NotFound.kind(), "not_found");
        assert_eq!(
            StageResult::Error {
                reason: "x".into()
            }
            .kind(),
            "error"
        );
    }
}
