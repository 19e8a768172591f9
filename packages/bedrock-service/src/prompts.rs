//! Prompt assembly for every gateway call the service makes.

use crate::agent::{
	Message,
	state::{Mode, QueryState},
};
use bedrock_domain::{
	chunk,
	style::{self, AnswerStyle},
};
use bedrock_providers::web_search::WebSearchResponse;

const TITLE_CAVEAT: &str = "Document titles are file names and may not describe the content. \
Use them for attribution only.";

pub fn generation(state: &QueryState) -> String {
	let answer_style = style::detect(state.working_question());
	let mut sections = vec![system_section(state.mode, answer_style)];

	if !state.messages.is_empty() {
		sections.push(format!("## Conversation so far\n{}", render_history(&state.messages)));
	}
	if !state.chunks.is_empty() {
		sections.push(format!("## Document chunks\n{}", chunk::render_chunks(&state.chunks)));
	}
	if let Some(summary) = &state.summary {
		sections.push(format!("## Summary reference\n{summary}"));
	}
	if state.mode == Mode::External {
		if let Some(prefetched) = state.prefetched.as_ref().filter(|response| !response.is_empty()) {
			sections.push(format!("## Initial web search\n{}", render_search(prefetched)));
		}

		let searched: Vec<String> = state
			.web_results
			.iter()
			.filter(|response| !response.is_empty())
			.map(render_search)
			.collect();

		if !searched.is_empty() {
			sections.push(format!("## Web search results\n{}", searched.join("\n\n")));
		}
		if let Some(note) = &state.web_note {
			sections.push(format!("## Web search status\n{note}"));
		}

		sections.push(
			"When documents and web sources disagree, prefer the documents and say that the \
sources conflict."
				.to_string(),
		);
	}

	sections.push(TITLE_CAVEAT.to_string());

	if let Some(schema) = &state.schema_hint {
		sections.push(format!(
			"## Spreadsheet data\nThe conversation's spreadsheets are loaded into a SQLite \
database. Use the structured_query action with a single SELECT statement for any lookup, \
filter, count or aggregation over this data. Document chunks only hold previews of these \
tables.\n```\n{schema}\n```"
		));
	}
	if let Some(result) = &state.structured_result {
		sections.push(format!(
			"## Structured query result\n{result}\n\nUse this result to answer. Present tabular \
data as a markdown table."
		));
	}

	sections.push(action_guide(state));
	sections.push(format!("## Question\n{}", state.working_question()));

	sections.join("\n\n")
}

pub fn decomposition(
	question: &str,
	history: &[Message],
	schema_hint: Option<&str>,
	max_sub_queries: u32,
) -> String {
	let mut sections = vec![format!(
		"You split user questions for a document retrieval system.\n\n\
First resolve the question against the conversation: replace pronouns and shorthand that \
clearly refer to earlier entities so the question stands on its own. Keep it unchanged \
otherwise.\n\n\
Split only multi-part, comparative, temporal or enumerating questions, producing between 2 \
and {max_sub_queries} self-contained sub-questions. A single information need stays whole."
	)];

	if let Some(schema) = schema_hint {
		sections.push(format!(
			"The conversation has spreadsheet data. Never split a question that a single SQL \
query over these tables can answer (lookups, listings, counts, sums, averages).\n```\n{schema}\n```"
		));
	}
	if !history.is_empty() {
		sections.push(format!("## Conversation so far\n{}", render_history(history)));
	}

	sections.push(format!("## Question\n{question}"));

	sections.join("\n\n")
}

pub fn combination(resolved_question: &str, pairs: &[(String, String)]) -> String {
	let rendered: Vec<String> = pairs
		.iter()
		.enumerate()
		.map(|(idx, (sub_query, answer))| {
			format!("### Sub-question {}: {sub_query}\n{answer}", idx + 1)
		})
		.collect();

	format!(
		"Combine the sub-answers below into one markdown answer to the original question. Keep \
every citation, merge overlapping points and call out any contradiction between sub-answers.\n\n\
## Original question\n{resolved_question}\n\n## Sub-answers\n{}",
		rendered.join("\n\n")
	)
}

pub fn self_knowledge(question: &str, history: &[Message]) -> String {
	let mut sections = vec![
		"The user's documents do not answer the question. Answer from general knowledge in \
markdown, and say plainly that the answer is not based on their documents."
			.to_string(),
	];

	if !history.is_empty() {
		sections.push(format!("## Conversation so far\n{}", render_history(history)));
	}

	sections.push(format!("## Question\n{question}"));

	sections.join("\n\n")
}

fn system_section(mode: Mode, answer_style: AnswerStyle) -> String {
	let role = match (mode, answer_style) {
		(Mode::External, _) =>
			"You answer questions from the provided documents and any supplied web results.",
		(Mode::Internal, AnswerStyle::Analyst) =>
			"You are a senior analyst. Give evidence-backed findings, implications, \
recommendations and risks drawn only from the provided documents.",
		(Mode::Internal, _) => "You answer questions from the provided documents.",
	};
	let task = match answer_style {
		AnswerStyle::Brief => "Keep the answer short: a one-line overview and a few key bullets.",
		AnswerStyle::Analyst =>
			"Structure the answer as Key Findings, Implications, Recommendations, Risks and Summary.",
		AnswerStyle::Detailed =>
			"Give a structured, comprehensive answer with headings, bullet lists and a closing summary.",
	};

	format!(
		"{role}\n{task}\n\n\
Rely strictly on the supplied data. If it is insufficient, say \"I cannot answer based on the \
provided data.\"\n\
Refer to documents by their exact title, never by id or position, and cite claims inline as \
[Document Title, Page X]."
	)
}

fn action_guide(state: &QueryState) -> String {
	let mut lines = vec![
		"## Actions".to_string(),
		"- answer: answer directly from the information above.".to_string(),
	];

	if state.mode == Mode::External {
		lines.push("- web_search: search the web for information missing from the documents.".to_string());
	}
	if state.schema_hint.is_some() {
		lines.push(
			"- structured_query: run one SELECT statement against the spreadsheet data.".to_string(),
		);
	}

	lines.push("- document_summary: fetch the summary of one document (needs document_id).".to_string());
	lines.push("- global_summary: fetch the summary of every document together.".to_string());

	if state.mode == Mode::External || state.allow_self_knowledge {
		lines.push("- failure: the information above cannot answer the question.".to_string());
	}

	lines.join("\n")
}

fn render_history(messages: &[Message]) -> String {
	messages
		.iter()
		.map(|message| format!("{}: {}", message.role.as_str(), message.content))
		.collect::<Vec<_>>()
		.join("\n")
}

fn render_search(response: &WebSearchResponse) -> String {
	let mut out = format!("Query: {}", response.query);

	if let Some(answer) = &response.answer {
		out.push_str(&format!("\nAnswer: {answer}"));
	}

	for result in &response.results {
		out.push_str(&format!("\n- {} ({})\n  {}", result.title, result.url, result.content));
	}

	out
}
