//! Scripted agent for tests and demos.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::{AgentError, AgentPort, AgentRequest, AgentResponse};

type Script = VecDeque<Result<AgentResponse, AgentError>>;

/// [`AgentPort`] that answers from per-agent scripts.
///
/// Each agent id has a queue of responses. Calls pop from the front; the last response
/// stays and repeats, so a single `reply` covers any number of visits. Every request is
/// recorded for assertions.
#[derive(Default)]
pub struct ScriptedAgent {
    scripts: Mutex<HashMap<String, Script>>,
    requests: Mutex<Vec<AgentRequest>>,
    delay: Option<Duration>,
}

impl ScriptedAgent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a completed response with `text` for `agent_id` (builder).
    pub fn reply(self, agent_id: impl Into<String>, text: impl Into<String>) -> Self {
        self.respond(agent_id, AgentResponse::completed(text))
    }

    /// Queue an arbitrary response for `agent_id` (builder).
    pub fn respond(self, agent_id: impl Into<String>, response: AgentResponse) -> Self {
        self.push(agent_id.into(), Ok(response));
        self
    }

    /// Queue a failure for `agent_id` (builder).
    pub fn fail(self, agent_id: impl Into<String>, message: impl Into<String>) -> Self {
        let agent_id = agent_id.into();
        let err = AgentError::Failed {
            agent_id: agent_id.clone(),
            message: message.into(),
        };
        self.push(agent_id, Err(err));
        self
    }

    /// Sleep before answering (builder).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Requests received so far, in call order.
    pub fn requests(&self) -> Vec<AgentRequest> {
        match self.requests.lock() {
            Ok(r) => r.clone(),
            Err(e) => e.into_inner().clone(),
        }
    }

    fn push(&self, agent_id: String, entry: Result<AgentResponse, AgentError>) {
        let mut scripts = match self.scripts.lock() {
            Ok(s) => s,
            Err(e) => e.into_inner(),
        };
        scripts.entry(agent_id).or_default().push_back(entry);
    }

    fn next(&self, agent_id: &str) -> Result<AgentResponse, AgentError> {
        let mut scripts = match self.scripts.lock() {
            Ok(s) => s,
            Err(e) => e.into_inner(),
        };
        let queue = scripts
            .get_mut(agent_id)
            .ok_or_else(|| AgentError::UnknownAgent(agent_id.to_string()))?;
        let entry = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        entry.unwrap_or_else(|| Err(AgentError::UnknownAgent(agent_id.to_string())))
    }
}

#[async_trait]
impl AgentPort for ScriptedAgent {
    async fn invoke(&self, request: AgentRequest) -> Result<AgentResponse, AgentError> {
        let agent_id = request.agent_id.clone();
        match self.requests.lock() {
            Ok(mut r) => r.push(request),
            Err(e) => e.into_inner().push(request),
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.next(&agent_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentInput, AgentOutcome, PauseReason, VerifierFlags};
    use crate::context::ThreadKey;
    use serde_json::json;

    fn request(agent_id: &str) -> AgentRequest {
        AgentRequest {
            agent_id: agent_id.to_string(),
            input: AgentInput::Query {
                prompt: "q".to_string(),
            },
            thread: ThreadKey::new("s", "e", "n"),
            verifiers: VerifierFlags::default(),
        }
    }

    /// **Scenario**: Queued responses pop in order; the last one repeats.
    #[tokio::test]
    async fn script_pops_then_repeats_last() {
        let agent = ScriptedAgent::new()
            .respond("a", AgentResponse::paused(PauseReason::PlanReview, json!("plan")))
            .reply("a", "done");
        let first = agent.invoke(request("a")).await.unwrap();
        assert!(matches!(first.outcome, AgentOutcome::Paused(_)));
        for _ in 0..2 {
            let next = agent.invoke(request("a")).await.unwrap();
            assert_eq!(next, AgentResponse::completed("done"));
        }
        assert_eq!(agent.requests().len(), 3);
    }

    #[tokio::test]
    async fn unknown_agent_errors() {
        let agent = ScriptedAgent::new();
        assert_eq!(
            agent.invoke(request("nobody")).await,
            Err(AgentError::UnknownAgent("nobody".to_string()))
        );
    }

    #[tokio::test]
    async fn scripted_failure() {
        let agent = ScriptedAgent::new().fail("a", "tool crashed");
        match agent.invoke(request("a")).await {
            Err(AgentError::Failed { message, .. }) => assert_eq!(message, "tool crashed"),
            other => panic!("expected Failed, got {:?}", other),
        }
    }
}
