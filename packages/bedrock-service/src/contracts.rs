//! Response shapes the gateway validates model output against.

use serde::{Deserialize, Deserializer};

use crate::{
	agent::state::{Action, ChunkReference, Mode},
	gateway::Contract,
};

#[derive(Debug, Clone, Deserialize)]
pub struct GenerationOutput {
	pub answer: String,
	pub action: Action,
	#[serde(default, deserialize_with = "null_as_empty")]
	pub chunks_used: Vec<ChunkReference>,
	#[serde(default, deserialize_with = "null_as_empty")]
	pub web_search_queries: Vec<String>,
	#[serde(default)]
	pub document_id: Option<String>,
	#[serde(default, alias = "sql_query")]
	pub structured_query: Option<String>,
}

/// Grounded answer generation. The allowed actions depend on the execution mode.
#[derive(Debug, Clone, Copy)]
pub struct GenerationContract {
	pub mode: Mode,
	pub allow_failure: bool,
}
impl GenerationContract {
	pub fn new(mode: Mode, allow_self_knowledge: bool) -> Self {
		Self { mode, allow_failure: mode == Mode::External || allow_self_knowledge }
	}

	pub fn allowed_actions(&self) -> Vec<Action> {
		let mut actions = vec![
			Action::Answer,
			Action::DocumentSummary,
			Action::GlobalSummary,
			Action::StructuredQuery,
		];

		if self.mode == Mode::External {
			actions.push(Action::WebSearch);
		}
		if self.allow_failure {
			actions.push(Action::Failure);
		}

		actions
	}
}
impl Contract for GenerationContract {
	type Output = GenerationOutput;

	fn name(&self) -> &'static str {
		"generation"
	}

	fn format_instructions(&self) -> String {
		let actions: Vec<&str> = self.allowed_actions().iter().map(|action| action.as_str()).collect();
		let mut fields = vec![
			r#""answer": string, the full markdown answer"#.to_string(),
			format!(r#""action": one of {}"#, actions.join(", ")),
			r#""chunks_used": list of {"document_id": string, "page_no": integer} for every chunk the answer relies on"#.to_string(),
			r#""document_id": string, required when action is document_summary"#.to_string(),
			r#""structured_query": string, one SQLite SELECT statement, required when action is structured_query"#.to_string(),
		];

		if self.mode == Mode::External {
			fields.push(
				r#""web_search_queries": list of short search queries, required when action is web_search"#
					.to_string(),
			);
		}

		format!(
			"Respond with a single JSON object and nothing else. Fields:\n- {}",
			fields.join("\n- ")
		)
	}

	fn check(&self, output: &GenerationOutput) -> Result<(), String> {
		if !self.allowed_actions().contains(&output.action) {
			return Err(format!("Action {} is not allowed here.", output.action.as_str()));
		}
		if output.action == Action::Answer && output.answer.trim().is_empty() {
			return Err("An answer action needs a non-empty answer.".to_string());
		}

		Ok(())
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct Decomposition {
	pub requires_decomposition: bool,
	pub resolved_query: String,
	#[serde(default, deserialize_with = "null_as_empty")]
	pub sub_queries: Vec<String>,
}
impl Decomposition {
	/// The single-sub-query form used whenever decomposition is skipped or unusable.
	pub fn trivial(query: &str) -> Self {
		Self {
			requires_decomposition: false,
			resolved_query: query.to_string(),
			sub_queries: vec![query.to_string()],
		}
	}
}

#[derive(Debug, Clone, Copy)]
pub struct DecompositionContract {
	pub max_sub_queries: u32,
}
impl Contract for DecompositionContract {
	type Output = Decomposition;

	fn name(&self) -> &'static str {
		"decomposition"
	}

	fn format_instructions(&self) -> String {
		format!(
			"Respond with a single JSON object and nothing else. Fields:\n\
- \"requires_decomposition\": boolean\n\
- \"resolved_query\": string, the question rewritten to stand on its own\n\
- \"sub_queries\": list of at most {} self-contained questions; exactly [resolved_query] when requires_decomposition is false",
			self.max_sub_queries
		)
	}

	fn check(&self, output: &Decomposition) -> Result<(), String> {
		if output.resolved_query.trim().is_empty() {
			return Err("resolved_query must be non-empty.".to_string());
		}

		Ok(())
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnswerOnly {
	pub answer: String,
}

/// Merges ordered sub-answers into one response.
#[derive(Debug, Clone, Copy)]
pub struct CombinationContract;
impl Contract for CombinationContract {
	type Output = AnswerOnly;

	fn name(&self) -> &'static str {
		"combination"
	}

	fn format_instructions(&self) -> String {
		answer_only_instructions()
	}

	fn check(&self, output: &AnswerOnly) -> Result<(), String> {
		non_empty_answer(output)
	}
}

/// Ungrounded answer from the model's own knowledge.
#[derive(Debug, Clone, Copy)]
pub struct SelfKnowledgeContract;
impl Contract for SelfKnowledgeContract {
	type Output = AnswerOnly;

	fn name(&self) -> &'static str {
		"self_knowledge"
	}

	fn format_instructions(&self) -> String {
		answer_only_instructions()
	}

	fn check(&self, output: &AnswerOnly) -> Result<(), String> {
		non_empty_answer(output)
	}
}

fn answer_only_instructions() -> String {
	"Respond with a single JSON object and nothing else: {\"answer\": string, the full markdown answer}"
		.to_string()
}

fn non_empty_answer(output: &AnswerOnly) -> Result<(), String> {
	if output.answer.trim().is_empty() {
		return Err("answer must be non-empty.".to_string());
	}

	Ok(())
}

/// Models often write `null` for a list they have nothing to put in.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
	D: Deserializer<'de>,
	T: Deserialize<'de>,
{
	Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
