//! One state machine per sub-query: retrieve, generate, then follow the model's chosen action
//! until an answer is reached.

pub mod nodes;
pub mod router;
pub mod state;

use serde::{Deserialize, Serialize};

use crate::BedrockService;
use router::{Limits, Node};
use state::QueryState;

pub const STEP_CEILING_APOLOGY: &str =
	"I could not finish answering your question. Please try rephrasing it.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
	User,
	Assistant,
	System,
}
impl Role {
	pub fn parse(raw: &str) -> Option<Self> {
		match raw.trim().to_ascii_lowercase().as_str() {
			"user" | "human" => Some(Self::User),
			"assistant" | "ai" => Some(Self::Assistant),
			"system" => Some(Self::System),
			_ => None,
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Self::User => "user",
			Self::Assistant => "assistant",
			Self::System => "system",
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
	pub role: Role,
	pub content: String,
}

/// Drives `state` from `Retrieve` to `Answer`, stopping early at the configured step ceiling.
pub async fn run(service: &BedrockService, mut state: QueryState) -> QueryState {
	let limits = Limits::new(&service.cfg.agent);
	let max_steps = service.cfg.agent.max_steps;
	let mut node = Node::Retrieve;

	while node != Node::Answer {
		if state.steps >= max_steps {
			tracing::warn!(
				trace_id = %state.trace_id,
				node = node.as_str(),
				steps = state.steps,
				"Step ceiling reached. Stopping at answer."
			);

			if state.answer.trim().is_empty() {
				state.answer = STEP_CEILING_APOLOGY.to_string();
			}

			break;
		}

		state.steps += 1;

		tracing::debug!(trace_id = %state.trace_id, node = node.as_str(), "Entering node.");

		state = nodes::execute(service, node, state).await;
		node = router::next(node, &state, &limits);
	}

	state
}
