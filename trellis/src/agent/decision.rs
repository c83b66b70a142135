//! Human decision carried by a resume call.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::PauseReason;

/// Reviewer's answer to a pause.
///
/// Plan reviews accept `Approved` or `Rejected`; tool reviews accept `Approved` or
/// `Revised` arguments.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decision", content = "arguments", rename_all = "snake_case")]
pub enum ResumeDecision {
    Approved,
    Rejected,
    /// Replacement tool-call arguments.
    Revised(Value),
}

impl ResumeDecision {
    /// Whether this decision answers a pause of the given kind.
    pub fn answers(&self, reason: PauseReason) -> bool {
        matches!(
            (self, reason),
            (ResumeDecision::Approved, _)
                | (ResumeDecision::Rejected, PauseReason::PlanReview)
                | (ResumeDecision::Revised(_), PauseReason::ToolReview)
        )
    }
}

impl fmt::Display for ResumeDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResumeDecision::Approved => f.write_str("approved"),
            ResumeDecision::Rejected => f.write_str("rejected"),
            ResumeDecision::Revised(args) => write!(f, "{}", args),
        }
    }
}

impl FromStr for ResumeDecision {
    type Err = String;

    /// `approved`, `rejected` (any case), or a JSON document of revised arguments.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let t = s.trim();
        if t.eq_ignore_ascii_case("approved") {
            return Ok(ResumeDecision::Approved);
        }
        if t.eq_ignore_ascii_case("rejected") {
            return Ok(ResumeDecision::Rejected);
        }
        serde_json::from_str::<Value>(t)
            .map(ResumeDecision::Revised)
            .map_err(|_| format!("expected approved, rejected or JSON arguments, got {:?}", s))
    }
}
