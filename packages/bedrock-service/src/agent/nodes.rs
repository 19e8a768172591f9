use std::time::Duration;

use futures::future;

use crate::{
	BedrockService,
	agent::{
		Role,
		router::Node,
		state::{Action, Mode, QueryState, SummaryDecision},
	},
	contracts::{GenerationContract, SelfKnowledgeContract},
	prompts,
};
use bedrock_domain::sanitize;

pub const GENERATION_APOLOGY: &str =
	"An error occurred while generating the answer. Please try again later.";
pub const UNABLE_TO_ANSWER: &str = "I am unable to answer your question at this time. Please try \
rephrasing or asking a different question.";
pub const WEB_SEARCH_FAILED: &str = "Web search failed. Please try again later.";
pub const NO_STRUCTURED_QUERY: &str = "No SQL query was provided.";
pub const NO_DOCUMENT_SUMMARY: &str = "No summary available for this document. Use the other \
context to provide an answer.";
pub const NO_GLOBAL_SUMMARY: &str = "No global summary available for the documents. Use the \
other context to provide an answer.";

pub async fn execute(service: &BedrockService, node: Node, state: QueryState) -> QueryState {
	match node {
		Node::Retrieve => retrieve(service, state).await,
		Node::Generate => generate(service, state).await,
		Node::WebSearch => web_search(service, state).await,
		Node::StructuredQuery => structured_query(service, state).await,
		Node::DocumentSummary => document_summary(service, state).await,
		Node::GlobalSummary => global_summary(service, state).await,
		Node::Failure => failure(state),
		Node::SelfKnowledge => self_knowledge(service, state).await,
		Node::Answer => state,
	}
}

pub async fn retrieve(service: &BedrockService, mut state: QueryState) -> QueryState {
	let outcome =
		service.retrieve(&state.owner_id, &state.conversation_id, state.working_question()).await;

	tracing::info!(
		trace_id = %state.trace_id,
		chunks = outcome.chunks.len(),
		confidence = outcome.confidence.as_str(),
		"Retrieved chunks."
	);

	state.chunks = outcome.chunks;
	state.confidence = outcome.confidence;

	state
}

pub async fn generate(service: &BedrockService, mut state: QueryState) -> QueryState {
	let contract = GenerationContract::new(state.mode, state.allow_self_knowledge);
	let prompt = prompts::generation(&state);
	let max_attempts = service.cfg.agent.max_generation_attempts.max(1);

	for attempt in 1..=max_attempts {
		match service.gateway.invoke(&contract, &prompt, &state.backend).await {
			Ok(output) => {
				let answer = sanitize::normalize_answer(&output.answer);

				state.push_message(Role::User, state.question.clone());
				state.push_message(Role::Assistant, answer.clone());
				state.push_message(Role::System, format!("Action taken: {}", output.action.as_str()));

				state.answer = answer;
				state.action = Some(output.action);
				state.chunks_used = output.chunks_used;
				state.document_id = output.document_id.filter(|id| !id.trim().is_empty());
				state.structured_query =
					output.structured_query.filter(|query| !query.trim().is_empty());
				state.pending_web_queries = if state.mode == Mode::External {
					output.web_search_queries
				} else {
					Vec::new()
				};
				state.generation_attempts += 1;

				return state;
			},
			Err(err) => {
				tracing::warn!(
					trace_id = %state.trace_id,
					attempt,
					error = %err,
					"Generation attempt failed."
				);

				if attempt < max_attempts {
					tokio::time::sleep(Duration::from_millis(service.cfg.agent.generation_backoff_ms))
						.await;
				}
			},
		}
	}

	state.answer = GENERATION_APOLOGY.to_string();
	state.action = Some(Action::Failure);

	state
}

pub async fn web_search(service: &BedrockService, mut state: QueryState) -> QueryState {
	let mut queries: Vec<String> = std::mem::take(&mut state.pending_web_queries)
		.into_iter()
		.map(|query| query.trim().to_string())
		.filter(|query| !query.is_empty())
		.collect();

	if queries.is_empty() {
		queries.push(state.working_question().to_string());
	}

	let cfg = &service.cfg.providers.web_search;
	let results = future::join_all(
		queries.iter().map(|query| service.providers.web_search.search(cfg, query)),
	)
	.await;
	let mut responses = Vec::with_capacity(results.len());

	for (query, result) in queries.iter().zip(results) {
		match result {
			Ok(response) => responses.push(response),
			Err(err) => tracing::warn!(
				trace_id = %state.trace_id,
				query = %query,
				error = %err,
				"Web search failed."
			),
		}
	}

	state.web_search_attempts += 1;

	if responses.iter().all(|response| response.is_empty()) {
		state.web_note = Some(WEB_SEARCH_FAILED.to_string());
		state.push_message(Role::Assistant, WEB_SEARCH_FAILED);
	} else {
		state.web_note = None;
		state.push_message(
			Role::User,
			format!("Web search initiated for queries: {}", queries.join("; ")),
		);
	}

	state.web_results.extend(responses.into_iter().filter(|response| !response.is_empty()));

	state
}

pub async fn structured_query(service: &BedrockService, mut state: QueryState) -> QueryState {
	state.structured_query_attempts += 1;

	let Some(statement) = state.structured_query.clone() else {
		state.structured_result = Some(NO_STRUCTURED_QUERY.to_string());
		state.push_message(
			Role::Assistant,
			"Structured query requested but no statement was provided.",
		);

		return state;
	};
	let result = service
		.stores
		.tabular
		.execute(&state.owner_id, &state.conversation_id, &statement)
		.await;
	let text = match result {
		Ok(text) => {
			state.push_message(Role::User, format!("SQL query executed: {statement}"));

			text
		},
		Err(err) => {
			tracing::warn!(trace_id = %state.trace_id, error = %err, "Structured query failed.");

			format!("SQL query failed: {err}")
		},
	};

	state.push_message(Role::Assistant, text.clone());
	state.structured_result = Some(text);

	state
}

pub async fn document_summary(service: &BedrockService, mut state: QueryState) -> QueryState {
	let Some(document_id) = state.document_id.clone() else {
		state.summary = Some(NO_DOCUMENT_SUMMARY.to_string());
		state.after_summary = Some(SummaryDecision::Generate);

		return state;
	};
	let found = service
		.stores
		.conversations
		.document_summary(&state.owner_id, &state.conversation_id, &document_id)
		.await
		.unwrap_or_else(|err| {
			tracing::warn!(trace_id = %state.trace_id, error = %err, "Document summary lookup failed.");

			None
		});

	state.push_message(Role::User, format!("Summarizing document with ID: {document_id}"));

	match found {
		Some(summary) => {
			state.answer = format!("Summary: \n {summary}");
			state.summary = Some(format!("Summary for document {document_id}: {summary}"));
			state.after_summary = Some(SummaryDecision::Answer);
		},
		None => {
			state.summary = Some(NO_DOCUMENT_SUMMARY.to_string());
			state.after_summary = Some(SummaryDecision::Generate);
		},
	}

	state
}

pub async fn global_summary(service: &BedrockService, mut state: QueryState) -> QueryState {
	let found = service
		.stores
		.conversations
		.global_summary(&state.owner_id, &state.conversation_id)
		.await
		.unwrap_or_else(|err| {
			tracing::warn!(trace_id = %state.trace_id, error = %err, "Global summary lookup failed.");

			None
		});

	match found {
		Some(summary) => {
			state.answer = summary.clone();
			state.summary = Some(format!("Global summary of all the documents: {summary}"));
			state.after_summary = Some(SummaryDecision::Answer);
		},
		None => {
			state.summary = Some(NO_GLOBAL_SUMMARY.to_string());
			state.after_summary = Some(SummaryDecision::Generate);
		},
	}

	state
}

pub fn failure(mut state: QueryState) -> QueryState {
	state.push_message(Role::Assistant, UNABLE_TO_ANSWER);
	state.answer = UNABLE_TO_ANSWER.to_string();

	state
}

pub async fn self_knowledge(service: &BedrockService, mut state: QueryState) -> QueryState {
	if state.mode == Mode::External {
		state.answer = UNABLE_TO_ANSWER.to_string();

		return state;
	}

	let prompt = prompts::self_knowledge(state.working_question(), &state.messages);

	match service.gateway.invoke(&SelfKnowledgeContract, &prompt, &state.backend).await {
		Ok(output) => {
			let answer = sanitize::normalize_answer(&output.answer);

			state.push_message(Role::Assistant, answer.clone());
			state.answer = answer;
			state.answered_from_self_knowledge = true;
		},
		Err(err) => {
			tracing::warn!(trace_id = %state.trace_id, error = %err, "Self-knowledge call failed.");

			state.answer = UNABLE_TO_ANSWER.to_string();
		},
	}

	state
}
