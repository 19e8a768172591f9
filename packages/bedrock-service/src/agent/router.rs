use crate::agent::state::{Action, QueryState, SummaryDecision};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Node {
	Retrieve,
	Generate,
	WebSearch,
	StructuredQuery,
	DocumentSummary,
	GlobalSummary,
	Failure,
	SelfKnowledge,
	Answer,
}
impl Node {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Retrieve => "retrieve",
			Self::Generate => "generate",
			Self::WebSearch => "web_search",
			Self::StructuredQuery => "structured_query",
			Self::DocumentSummary => "document_summary",
			Self::GlobalSummary => "global_summary",
			Self::Failure => "failure",
			Self::SelfKnowledge => "self_knowledge",
			Self::Answer => "answer",
		}
	}
}

#[derive(Debug, Clone, Copy)]
pub struct Limits {
	pub max_web_search: u32,
	pub max_structured_query: u32,
}
impl Limits {
	pub fn new(cfg: &bedrock_config::Agent) -> Self {
		Self { max_web_search: cfg.max_web_search, max_structured_query: cfg.max_structured_query }
	}
}

/// Maps the model's chosen action to the next node, honoring the per-action ceilings.
pub fn route(action: Option<Action>, state: &QueryState, limits: &Limits) -> Node {
	match action {
		Some(Action::Answer) => Node::Answer,
		Some(Action::WebSearch) if state.web_search_attempts < limits.max_web_search =>
			Node::WebSearch,
		Some(Action::WebSearch) => Node::Failure,
		Some(Action::StructuredQuery)
			if state.structured_query_attempts < limits.max_structured_query =>
			Node::StructuredQuery,
		// Out of structured-query rounds: answer with what has been gathered.
		Some(Action::StructuredQuery) => Node::Answer,
		Some(Action::DocumentSummary) => Node::DocumentSummary,
		Some(Action::GlobalSummary) => Node::GlobalSummary,
		Some(Action::Failure) | None => Node::Failure,
	}
}

pub fn next(node: Node, state: &QueryState, limits: &Limits) -> Node {
	match node {
		Node::Retrieve | Node::WebSearch | Node::StructuredQuery => Node::Generate,
		Node::Generate => route(state.action, state, limits),
		Node::DocumentSummary | Node::GlobalSummary => match state.after_summary {
			Some(SummaryDecision::Answer) => Node::Answer,
			Some(SummaryDecision::Generate) | None => Node::Generate,
		},
		Node::Failure => Node::SelfKnowledge,
		Node::SelfKnowledge | Node::Answer => Node::Answer,
	}
}
