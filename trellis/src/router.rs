//! Condition router: one model call picks one of several outgoing targets.
//!
//! The reply is scanned for candidate ids as literal substrings in candidate-list order; the
//! first candidate found wins. When no id appears, the first candidate is selected.

use std::sync::Arc;

use tracing::debug;

use crate::llm::{LanguageModel, LlmError};

/// One outgoing target offered to the model.
#[derive(Clone, Debug, PartialEq)]
pub struct RouteCandidate {
    pub id: String,
    pub name: String,
    /// Edge condition text, if the definition gave one.
    pub condition: Option<String>,
}

/// Result of a routing decision.
#[derive(Clone, Debug, PartialEq)]
pub struct RouteSelection {
    pub target_id: String,
    /// Text after a `Reasoning:` prefix in the reply, if any.
    pub reasoning: Option<String>,
    /// False when no candidate id appeared in the reply and the first candidate was taken.
    pub matched: bool,
}

/// Picks a branch target with the language model.
///
/// **Interaction**: Called by the engine walk when the current node has more than one
/// outgoing edge. The single model call is one of the walk's cancellation points.
pub struct ConditionRouter {
    llm: Arc<dyn LanguageModel>,
}

impl ConditionRouter {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self { llm }
    }

    /// Selects one of `candidates`. `candidates` must not be empty.
    pub async fn select(
        &self,
        condition: &str,
        candidates: &[RouteCandidate],
        response: &str,
        query: &str,
    ) -> Result<RouteSelection, LlmError> {
        let Some(first) = candidates.first() else {
            return Err(LlmError::Request("no routing candidates".to_string()));
        };
        let prompt = build_routing_prompt(condition, candidates, response, query);
        let reply = self.llm.invoke(&prompt).await?;
        let (target_id, matched) = match pick_candidate(&reply, candidates) {
            Some(c) => (c.id.clone(), true),
            None => (first.id.clone(), false),
        };
        debug!(
            target_id = %target_id,
            matched,
            candidates = candidates.len(),
            "condition routed"
        );
        Ok(RouteSelection {
            target_id,
            reasoning: extract_reasoning(&reply),
            matched,
        })
    }
}

pub fn build_routing_prompt(
    condition: &str,
    candidates: &[RouteCandidate],
    response: &str,
    query: &str,
) -> String {
    let mut prompt = String::from(
        "You route a workflow to exactly one next step.\n\n",
    );
    prompt.push_str("Original request:\n");
    prompt.push_str(query);
    prompt.push_str("\n\nCurrent response:\n");
    prompt.push_str(if response.is_empty() { "(none yet)" } else { response });
    prompt.push_str("\n\nCondition:\n");
    prompt.push_str(if condition.is_empty() { "(none)" } else { condition });
    prompt.push_str("\n\nCandidates:\n");
    for c in candidates {
        prompt.push_str("- id: ");
        prompt.push_str(&c.id);
        prompt.push_str(", name: ");
        prompt.push_str(&c.name);
        if let Some(cond) = c.condition.as_deref().filter(|s| !s.is_empty()) {
            prompt.push_str(", when: ");
            prompt.push_str(cond);
        }
        prompt.push('\n');
    }
    prompt.push_str(
        "\nAnswer with two lines:\nReasoning: <one sentence>\nSelected: <candidate id>\n",
    );
    prompt
}

/// First candidate (in list order) whose id occurs anywhere in `reply`.
pub fn pick_candidate<'a>(reply: &str, candidates: &'a [RouteCandidate]) -> Option<&'a RouteCandidate> {
    candidates
        .iter()
        .find(|c| !c.id.is_empty() && reply.contains(c.id.as_str()))
}

/// Text following `Reasoning:` (any case) on its line; multiple lines are joined.
pub fn extract_reasoning(reply: &str) -> Option<String> {
    let parts: Vec<&str> = reply
        .lines()
        .filter_map(|line| {
            let line = line.trim().trim_start_matches(&['*', '-', ' '][..]);
            let head = line.get(..10)?;
            if head.eq_ignore_ascii_case("reasoning:") {
                Some(line[10..].trim_start_matches('*').trim())
            } else {
                None
            }
        })
        .filter(|s| !s.is_empty())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}
