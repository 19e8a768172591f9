//! Request entry point: decompose, prefetch, fan sub-queries out to the ready backends, then
//! combine the sub-answers.

use std::collections::HashSet;

use futures::future;
use serde::{Deserialize, Serialize};
use tokio::sync::{
	Mutex as AsyncMutex,
	mpsc::{self, UnboundedReceiver},
};
use uuid::Uuid;

use crate::{
	BedrockService, Error, Result,
	agent::{
		self, Message,
		state::{Mode, QueryState, StateScope},
	},
	contracts::{CombinationContract, Decomposition, DecompositionContract},
	gateway::BackendDescriptor,
	prompts,
};
use bedrock_domain::{ChunkRecord, Confidence, confidence, sanitize};
use bedrock_providers::web_search::WebSearchResponse;

#[derive(Debug, Clone, Deserialize)]
pub struct QueryRequest {
	pub owner_id: String,
	pub conversation_id: String,
	pub question: String,
	#[serde(default)]
	pub mode: Mode,
	#[serde(default)]
	pub use_self_knowledge: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
	pub trace_id: Uuid,
	pub question: String,
	pub answer: String,
	pub decomposed: bool,
	pub sub_queries: Vec<String>,
	pub confidence: Confidence,
	pub citations: Vec<Citation>,
	pub web_sources: Vec<WebSource>,
	pub use_self_knowledge: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
	pub document_id: String,
	pub title: String,
	pub page_no: u32,
	pub file_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebSource {
	pub url: String,
	pub title: String,
	pub favicon: Option<String>,
}

#[derive(Debug, Clone)]
pub struct WorkItem {
	pub index: usize,
	pub sub_query: String,
	pub prefetched: Option<WebSearchResponse>,
}

impl BedrockService {
	pub async fn query(&self, req: QueryRequest) -> Result<QueryResponse> {
		let question = req.question.trim();

		if question.is_empty() {
			return Err(Error::InvalidRequest { message: "question must be non-empty.".to_string() });
		}
		if req.owner_id.trim().is_empty() || req.conversation_id.trim().is_empty() {
			return Err(Error::InvalidRequest {
				message: "owner_id and conversation_id are required.".to_string(),
			});
		}

		let trace_id = Uuid::new_v4();
		let conversations = &self.stores.conversations;
		let history = conversations
			.recent_messages(&req.owner_id, &req.conversation_id, self.cfg.agent.history_turns)
			.await
			.unwrap_or_else(|err| {
				tracing::warn!(trace_id = %trace_id, error = %err, "Failed to load history.");

				Vec::new()
			});
		let schema_hint = self
			.stores
			.tabular
			.schema(&req.owner_id, &req.conversation_id)
			.await
			.unwrap_or_else(|err| {
				tracing::warn!(trace_id = %trace_id, error = %err, "Failed to load tabular schema.");

				None
			});
		let decomposition = self.decompose(question, &history, schema_hint.as_deref()).await;
		let decomposed = decomposition.requires_decomposition;

		tracing::info!(
			trace_id = %trace_id,
			decomposed,
			sub_queries = decomposition.sub_queries.len(),
			"Planned query."
		);

		let prefetched = match req.mode {
			Mode::External => self.prefetch(&decomposition.sub_queries).await,
			Mode::Internal => vec![None; decomposition.sub_queries.len()],
		};
		let scope = StateScope {
			trace_id,
			owner_id: req.owner_id.clone(),
			conversation_id: req.conversation_id.clone(),
			original_question: question.to_string(),
			resolved_question: decomposition.resolved_query.clone(),
			history,
			mode: req.mode,
			allow_self_knowledge: req.use_self_knowledge,
			schema_hint,
			prefetched: None,
		};
		let items: Vec<WorkItem> = decomposition
			.sub_queries
			.iter()
			.cloned()
			.zip(prefetched.iter().cloned())
			.enumerate()
			.map(|(index, (sub_query, prefetched))| WorkItem { index, sub_query, prefetched })
			.collect();
		let states = if decomposed {
			let backends = self.ready_backends(&req.owner_id, &req.conversation_id).await;

			self.run_sub_queries(&scope, items, &backends).await?
		} else {
			let backend = BackendDescriptor::primary(&self.cfg.backends);

			self.run_sub_queries(&scope, items, &[backend]).await?
		};
		let answer = if decomposed {
			let pairs: Vec<(String, String)> =
				states.iter().map(|state| (state.question.clone(), state.answer.clone())).collect();

			self.combine(trace_id, &decomposition.resolved_query, &pairs).await
		} else {
			states.first().map(|state| state.answer.clone()).unwrap_or_default()
		};
		let all_chunks: Vec<ChunkRecord> =
			states.iter().flat_map(|state| state.chunks.iter().cloned()).collect();
		let response = QueryResponse {
			trace_id,
			question: question.to_string(),
			answer,
			decomposed,
			sub_queries: decomposition.sub_queries.clone(),
			confidence: confidence::assess(&all_chunks),
			citations: reconcile_citations(&states),
			web_sources: collect_web_sources(&prefetched, &states),
			use_self_knowledge: states.iter().any(|state| state.answered_from_self_knowledge),
		};

		if let Err(err) = conversations
			.record_exchange(&req.owner_id, &req.conversation_id, question, &response.answer)
			.await
		{
			tracing::warn!(trace_id = %trace_id, error = %err, "Failed to record the exchange.");
		}

		Ok(response)
	}

	/// Resolves the question against recent history and splits it when it carries several
	/// information needs. Every failure path yields the single-sub-query form.
	pub async fn decompose(
		&self,
		question: &str,
		history: &[Message],
		schema_hint: Option<&str>,
	) -> Decomposition {
		let cfg = &self.cfg.orchestrator;

		if !cfg.decomposition {
			return Decomposition::trivial(question);
		}

		let contract = DecompositionContract { max_sub_queries: cfg.max_sub_queries };
		let prompt = prompts::decomposition(question, history, schema_hint, cfg.max_sub_queries);
		let backend = BackendDescriptor::primary(&self.cfg.backends);

		match self.gateway.invoke(&contract, &prompt, &backend).await {
			Ok(result) => normalize_decomposition(result, cfg.max_sub_queries),
			Err(err) => {
				tracing::warn!(error = %err, "Decomposition failed. Using the question as is.");

				Decomposition::trivial(question)
			},
		}
	}

	/// The primary backend, plus the secondary one unless disabled or reserved by a background
	/// job for this conversation.
	pub async fn ready_backends(
		&self,
		owner_id: &str,
		conversation_id: &str,
	) -> Vec<BackendDescriptor> {
		let mut backends = vec![BackendDescriptor::primary(&self.cfg.backends)];

		if !self.cfg.orchestrator.parallel_backends {
			return backends;
		}

		let reserved = self
			.stores
			.conversations
			.background_job_active(owner_id, conversation_id)
			.await
			.unwrap_or_else(|err| {
				tracing::warn!(error = %err, "Failed to check background jobs.");

				true
			});

		if reserved {
			tracing::info!(conversation_id, "Secondary backend reserved by a background job.");
		} else {
			backends.push(BackendDescriptor::secondary(&self.cfg.backends));
		}

		backends
	}

	/// Runs one state machine per work item, one worker per backend, and returns the final
	/// states in work-item order.
	pub async fn run_sub_queries(
		&self,
		scope: &StateScope,
		items: Vec<WorkItem>,
		backends: &[BackendDescriptor],
	) -> Result<Vec<QueryState>> {
		let total = items.len();
		let (tx, rx) = mpsc::unbounded_channel();

		for item in items {
			tx.send(item).map_err(|_| Error::InvalidRequest {
				message: "Sub-query queue closed before dispatch.".to_string(),
			})?;
		}

		drop(tx);

		let rx = AsyncMutex::new(rx);
		let workers = backends.iter().map(|backend| self.drain_queue(scope, &rx, backend));
		let mut slots: Vec<Option<QueryState>> = (0..total).map(|_| None).collect();

		for (index, state) in future::join_all(workers).await.into_iter().flatten() {
			slots[index] = Some(state);
		}

		Ok(slots.into_iter().flatten().collect())
	}

	async fn drain_queue(
		&self,
		scope: &StateScope,
		rx: &AsyncMutex<UnboundedReceiver<WorkItem>>,
		backend: &BackendDescriptor,
	) -> Vec<(usize, QueryState)> {
		let mut done = Vec::new();

		loop {
			let next = rx.lock().await.recv().await;
			let Some(item) = next else { break };
			let mut item_scope = scope.clone();

			item_scope.prefetched = item.prefetched;

			tracing::debug!(
				trace_id = %scope.trace_id,
				index = item.index,
				endpoint = %backend.endpoint,
				"Dispatching sub-query."
			);

			let state =
				agent::run(self, QueryState::new(item_scope, &item.sub_query, backend.clone()))
					.await;

			done.push((item.index, state));
		}

		done
	}

	async fn prefetch(&self, queries: &[String]) -> Vec<Option<WebSearchResponse>> {
		let cfg = &self.cfg.providers.web_search;
		let results =
			future::join_all(queries.iter().map(|query| self.providers.web_search.search(cfg, query)))
				.await;

		results
			.into_iter()
			.map(|result| match result {
				Ok(response) if !response.is_empty() => Some(response),
				Ok(_) => None,
				Err(err) => {
					tracing::warn!(error = %err, "Prefetch search failed.");

					None
				},
			})
			.collect()
	}

	async fn combine(&self, trace_id: Uuid, resolved: &str, pairs: &[(String, String)]) -> String {
		let prompt = prompts::combination(resolved, pairs);
		let backend = BackendDescriptor::primary(&self.cfg.backends);

		match self.gateway.invoke(&CombinationContract, &prompt, &backend).await {
			Ok(output) => sanitize::normalize_answer(&output.answer),
			Err(err) => {
				tracing::warn!(
					trace_id = %trace_id,
					error = %err,
					"Combination failed. Concatenating sub-answers."
				);

				concatenate_answers(pairs)
			},
		}
	}
}

/// Cleans a model decomposition. A split into fewer than two usable sub-queries collapses to
/// the single resolved query.
pub fn normalize_decomposition(result: Decomposition, max_sub_queries: u32) -> Decomposition {
	let resolved = result.resolved_query.trim().to_string();

	if !result.requires_decomposition {
		return Decomposition::trivial(&resolved);
	}

	let mut sub_queries: Vec<String> = result
		.sub_queries
		.into_iter()
		.map(|query| query.trim().to_string())
		.filter(|query| !query.is_empty())
		.collect();

	if sub_queries.len() < 2 {
		tracing::warn!(
			sub_queries = sub_queries.len(),
			"Decomposition flagged without enough sub-queries."
		);

		return Decomposition::trivial(&resolved);
	}

	sub_queries.truncate(max_sub_queries.max(1) as usize);

	Decomposition {
		requires_decomposition: sub_queries.len() > 1,
		resolved_query: resolved,
		sub_queries,
	}
}

pub fn concatenate_answers(pairs: &[(String, String)]) -> String {
	pairs
		.iter()
		.map(|(sub_query, answer)| format!("## {sub_query}\n\n{answer}"))
		.collect::<Vec<_>>()
		.join("\n\n")
}

/// Matches the model's `(document_id, page_no)` references against every retrieved chunk.
pub fn reconcile_citations(states: &[QueryState]) -> Vec<Citation> {
	let chunks: Vec<&ChunkRecord> = states.iter().flat_map(|state| state.chunks.iter()).collect();
	let mut seen = HashSet::new();
	let mut citations = Vec::new();

	for reference in states.iter().flat_map(|state| state.chunks_used.iter()) {
		let Some(chunk) = chunks.iter().find(|chunk| {
			chunk.document_id == reference.document_id && chunk.page_no == reference.page_no
		}) else {
			continue;
		};

		if seen.insert((chunk.document_id.clone(), chunk.page_no)) {
			citations.push(Citation {
				document_id: chunk.document_id.clone(),
				title: chunk.title.clone(),
				page_no: chunk.page_no,
				file_name: chunk.file_name.clone(),
			});
		}
	}

	citations
}

pub fn collect_web_sources(
	prefetched: &[Option<WebSearchResponse>],
	states: &[QueryState],
) -> Vec<WebSource> {
	let responses = prefetched
		.iter()
		.flatten()
		.chain(states.iter().flat_map(|state| state.web_results.iter()));
	let mut seen = HashSet::new();
	let mut sources = Vec::new();

	for result in responses.flat_map(|response| response.results.iter()) {
		if seen.insert(result.url.clone()) {
			sources.push(WebSource {
				url: result.url.clone(),
				title: result.title.clone(),
				favicon: result.favicon.clone(),
			});
		}
	}

	sources
}
