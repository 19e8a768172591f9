use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
	agent::{Message, Role},
	gateway::BackendDescriptor,
};
use bedrock_domain::{ChunkRecord, Confidence};
use bedrock_providers::web_search::WebSearchResponse;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
	/// Answers come from the conversation's documents only.
	#[default]
	Internal,
	/// Web search may supplement the documents.
	External,
}

/// What the model asked to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
	Answer,
	WebSearch,
	#[serde(alias = "sql_query")]
	StructuredQuery,
	#[serde(alias = "document_summarizer")]
	DocumentSummary,
	#[serde(alias = "global_summarizer")]
	GlobalSummary,
	Failure,
}
impl Action {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Answer => "answer",
			Self::WebSearch => "web_search",
			Self::StructuredQuery => "structured_query",
			Self::DocumentSummary => "document_summary",
			Self::GlobalSummary => "global_summary",
			Self::Failure => "failure",
		}
	}
}

/// Where a summary node sends the state next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryDecision {
	Answer,
	Generate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkReference {
	pub document_id: String,
	#[serde(default)]
	pub page_no: u32,
}

/// Everything one sub-query accumulates on its way to an answer.
#[derive(Debug, Clone)]
pub struct QueryState {
	pub trace_id: Uuid,
	pub owner_id: String,
	pub conversation_id: String,
	/// The sub-query this state answers.
	pub question: String,
	pub resolved_question: String,
	pub original_question: String,
	pub messages: Vec<Message>,
	pub chunks: Vec<ChunkRecord>,
	pub confidence: Confidence,
	pub prefetched: Option<WebSearchResponse>,
	pub pending_web_queries: Vec<String>,
	pub web_results: Vec<WebSearchResponse>,
	pub web_note: Option<String>,
	pub schema_hint: Option<String>,
	pub structured_query: Option<String>,
	pub structured_result: Option<String>,
	pub action: Option<Action>,
	pub document_id: Option<String>,
	pub generation_attempts: u32,
	pub web_search_attempts: u32,
	pub structured_query_attempts: u32,
	pub mode: Mode,
	pub backend: BackendDescriptor,
	pub allow_self_knowledge: bool,
	pub answered_from_self_knowledge: bool,
	pub summary: Option<String>,
	pub after_summary: Option<SummaryDecision>,
	pub chunks_used: Vec<ChunkReference>,
	pub answer: String,
	pub steps: u32,
}
impl QueryState {
	pub fn new(scope: StateScope, question: &str, backend: BackendDescriptor) -> Self {
		let StateScope {
			trace_id,
			owner_id,
			conversation_id,
			original_question,
			resolved_question,
			history,
			mode,
			allow_self_knowledge,
			schema_hint,
			prefetched,
		} = scope;

		Self {
			trace_id,
			owner_id,
			conversation_id,
			question: question.to_string(),
			resolved_question,
			original_question,
			messages: history,
			chunks: Vec::new(),
			confidence: Confidence::Low,
			prefetched,
			pending_web_queries: Vec::new(),
			web_results: Vec::new(),
			web_note: None,
			schema_hint,
			structured_query: None,
			structured_result: None,
			action: None,
			document_id: None,
			generation_attempts: 0,
			web_search_attempts: 0,
			structured_query_attempts: 0,
			mode,
			backend,
			allow_self_knowledge,
			answered_from_self_knowledge: false,
			summary: None,
			after_summary: None,
			chunks_used: Vec::new(),
			answer: String::new(),
			steps: 0,
		}
	}

	/// The sub-query, falling back to the context-resolved and then the raw question.
	pub fn working_question(&self) -> &str {
		[&self.question, &self.resolved_question, &self.original_question]
			.into_iter()
			.find(|question| !question.trim().is_empty())
			.map_or("", |question| question.as_str())
	}

	pub fn push_message(&mut self, role: Role, content: impl Into<String>) {
		self.messages.push(Message { role, content: content.into() });
	}
}

/// Request-level inputs copied into every sub-query state.
#[derive(Debug, Clone)]
pub struct StateScope {
	pub trace_id: Uuid,
	pub owner_id: String,
	pub conversation_id: String,
	pub original_question: String,
	/// The question rewritten against the conversation history.
	pub resolved_question: String,
	pub history: Vec<Message>,
	pub mode: Mode,
	pub allow_self_knowledge: bool,
	pub schema_hint: Option<String>,
	pub prefetched: Option<WebSearchResponse>,
}
