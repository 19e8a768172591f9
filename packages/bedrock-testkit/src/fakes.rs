//! In-memory stand-ins for every collaborator the service talks to.

use std::{
	collections::HashMap,
	sync::{
		Arc, Mutex,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration,
};

use bedrock_config::{Backends, Config, ProviderConfig, WebSearchProviderConfig};
use bedrock_domain::ChunkRecord;
use bedrock_providers::web_search::WebSearchResponse;
use bedrock_service::{
	BackendDescriptor, BedrockService, BoxFuture, ChunkIndex, CompletionBackend, ConcurrencyDomain,
	ConversationStore, Error, HostedModel, Message, Providers, RerankProvider, Result, Stores,
	TabularEngine, WebSearchProvider,
};

type Respond = dyn Fn(&BackendDescriptor, &str) -> Result<String> + Send + Sync;
type Delay = dyn Fn(&str) -> u64 + Send + Sync;

/// Every fake wired into one service. Override a field with struct update syntax.
#[derive(Clone)]
pub struct Fakes {
	pub completion: Arc<FakeCompletion>,
	pub provider_a: Arc<FakeHosted>,
	pub provider_b: Arc<FakeHosted>,
	pub rerank: Arc<FakeRerank>,
	pub web_search: Arc<FakeWebSearch>,
	pub chunks: Arc<FakeChunkIndex>,
	pub tabular: Arc<FakeTabular>,
	pub conversations: Arc<FakeConversations>,
}
impl Fakes {
	pub fn new(completion: FakeCompletion) -> Self {
		Self {
			completion: Arc::new(completion),
			provider_a: Arc::new(FakeHosted::failing()),
			provider_b: Arc::new(FakeHosted::failing()),
			rerank: Arc::new(FakeRerank::unavailable()),
			web_search: Arc::new(FakeWebSearch::default()),
			chunks: Arc::new(FakeChunkIndex::default()),
			tabular: Arc::new(FakeTabular::default()),
			conversations: Arc::new(FakeConversations::default()),
		}
	}

	pub fn providers(&self) -> Providers {
		Providers::new(
			self.completion.clone(),
			self.provider_a.clone(),
			self.provider_b.clone(),
			self.rerank.clone(),
			self.web_search.clone(),
		)
	}

	pub fn stores(&self) -> Stores {
		Stores::new(self.chunks.clone(), self.tabular.clone(), self.conversations.clone())
	}

	pub fn service(&self, cfg: Config) -> BedrockService {
		BedrockService::with_collaborators(
			cfg,
			self.providers(),
			self.stores(),
			Arc::new(ConcurrencyDomain::default()),
		)
	}
}

/// Local inference backend answering from a closure over `(backend, prompt)`.
pub struct FakeCompletion {
	respond: Box<Respond>,
	delay_ms: Option<Box<Delay>>,
	calls: Arc<AtomicUsize>,
	endpoints: Arc<Mutex<Vec<String>>>,
}
impl FakeCompletion {
	pub fn new<F>(respond: F) -> Self
	where
		F: Fn(&BackendDescriptor, &str) -> Result<String> + Send + Sync + 'static,
	{
		Self {
			respond: Box::new(respond),
			delay_ms: None,
			calls: Arc::new(AtomicUsize::new(0)),
			endpoints: Arc::new(Mutex::new(Vec::new())),
		}
	}

	/// Always answers with the same raw text.
	pub fn replying(raw: &str) -> Self {
		let raw = raw.to_string();

		Self::new(move |_, _| Ok(raw.clone()))
	}

	pub fn failing() -> Self {
		Self::new(|_, _| Err(Error::Provider { message: "Backend unavailable.".to_string() }))
	}

	/// Sleeps before answering, for a duration picked from the prompt.
	pub fn with_delay<F>(mut self, delay_ms: F) -> Self
	where
		F: Fn(&str) -> u64 + Send + Sync + 'static,
	{
		self.delay_ms = Some(Box::new(delay_ms));

		self
	}

	pub fn count(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}

	pub fn endpoints(&self) -> Vec<String> {
		self.endpoints.lock().unwrap_or_else(|err| err.into_inner()).clone()
	}
}
impl CompletionBackend for FakeCompletion {
	fn complete<'a>(
		&'a self,
		_cfg: &'a Backends,
		backend: &'a BackendDescriptor,
		prompt: &'a str,
	) -> BoxFuture<'a, Result<String>> {
		self.calls.fetch_add(1, Ordering::SeqCst);
		self.endpoints
			.lock()
			.unwrap_or_else(|err| err.into_inner())
			.push(backend.endpoint.clone());

		let result = (self.respond)(backend, prompt);
		let delay_ms = self.delay_ms.as_ref().map(|delay| delay(prompt)).unwrap_or(0);

		Box::pin(async move {
			if delay_ms > 0 {
				tokio::time::sleep(Duration::from_millis(delay_ms)).await;
			}

			result
		})
	}
}

pub struct FakeHosted {
	reply: Option<String>,
	calls: Arc<AtomicUsize>,
	credentials: Arc<Mutex<Vec<String>>>,
}
impl FakeHosted {
	pub fn replying(raw: &str) -> Self {
		Self {
			reply: Some(raw.to_string()),
			calls: Arc::new(AtomicUsize::new(0)),
			credentials: Arc::new(Mutex::new(Vec::new())),
		}
	}

	pub fn failing() -> Self {
		Self {
			reply: None,
			calls: Arc::new(AtomicUsize::new(0)),
			credentials: Arc::new(Mutex::new(Vec::new())),
		}
	}

	pub fn count(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}

	pub fn credentials(&self) -> Vec<String> {
		self.credentials.lock().unwrap_or_else(|err| err.into_inner()).clone()
	}
}
impl HostedModel for FakeHosted {
	fn complete<'a>(&'a self, credential: &'a str, _prompt: &'a str) -> BoxFuture<'a, Result<String>> {
		self.calls.fetch_add(1, Ordering::SeqCst);
		self.credentials
			.lock()
			.unwrap_or_else(|err| err.into_inner())
			.push(credential.to_string());

		let reply = self.reply.clone();

		Box::pin(async move {
			reply.ok_or_else(|| Error::Provider { message: "Hosted model unavailable.".to_string() })
		})
	}
}

pub struct FakeRerank {
	scores: Option<Vec<f32>>,
}
impl FakeRerank {
	pub fn scoring(scores: Vec<f32>) -> Self {
		Self { scores: Some(scores) }
	}

	pub fn unavailable() -> Self {
		Self { scores: None }
	}
}
impl RerankProvider for FakeRerank {
	fn rerank<'a>(
		&'a self,
		_cfg: &'a ProviderConfig,
		_query: &'a str,
		_docs: &'a [String],
	) -> BoxFuture<'a, Result<Vec<f32>>> {
		let scores = self.scores.clone();

		Box::pin(async move {
			scores.ok_or_else(|| Error::Provider { message: "Rerank unavailable.".to_string() })
		})
	}
}

#[derive(Default)]
pub struct FakeWebSearch {
	pub responses: HashMap<String, WebSearchResponse>,
	pub fail: bool,
	calls: AtomicUsize,
	queries: Mutex<Vec<String>>,
}
impl FakeWebSearch {
	pub fn with_responses(responses: Vec<WebSearchResponse>) -> Self {
		Self {
			responses: responses.into_iter().map(|res| (res.query.clone(), res)).collect(),
			..Self::default()
		}
	}

	pub fn failing() -> Self {
		Self { fail: true, ..Self::default() }
	}

	pub fn count(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}

	pub fn queries(&self) -> Vec<String> {
		self.queries.lock().unwrap_or_else(|err| err.into_inner()).clone()
	}
}
impl WebSearchProvider for FakeWebSearch {
	fn search<'a>(
		&'a self,
		_cfg: &'a WebSearchProviderConfig,
		query: &'a str,
	) -> BoxFuture<'a, Result<WebSearchResponse>> {
		self.calls.fetch_add(1, Ordering::SeqCst);
		self.queries.lock().unwrap_or_else(|err| err.into_inner()).push(query.to_string());

		let result = if self.fail {
			Err(Error::Provider { message: "Search unavailable.".to_string() })
		} else {
			Ok(self
				.responses
				.get(query)
				.cloned()
				.unwrap_or_else(|| WebSearchResponse::empty(query)))
		};

		Box::pin(async move { result })
	}
}

#[derive(Default)]
pub struct FakeChunkIndex {
	pub semantic: Vec<ChunkRecord>,
	pub lexical: Vec<ChunkRecord>,
	pub fail: bool,
}
impl FakeChunkIndex {
	pub fn new(semantic: Vec<ChunkRecord>, lexical: Vec<ChunkRecord>) -> Self {
		Self { semantic, lexical, fail: false }
	}

	fn hits(&self, chunks: &[ChunkRecord], limit: u32) -> Result<Vec<ChunkRecord>> {
		if self.fail {
			return Err(Error::Qdrant { message: "Index unavailable.".to_string() });
		}

		Ok(chunks.iter().take(limit as usize).cloned().collect())
	}
}
impl ChunkIndex for FakeChunkIndex {
	fn semantic<'a>(
		&'a self,
		_owner_id: &'a str,
		_conversation_id: &'a str,
		_query: &'a str,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<ChunkRecord>>> {
		let hits = self.hits(&self.semantic, limit);

		Box::pin(async move { hits })
	}

	fn lexical<'a>(
		&'a self,
		_owner_id: &'a str,
		_conversation_id: &'a str,
		_query: &'a str,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<ChunkRecord>>> {
		let hits = self.hits(&self.lexical, limit);

		Box::pin(async move { hits })
	}
}

#[derive(Default)]
pub struct FakeTabular {
	pub schema: Option<String>,
	/// `Err` carries the message a failing statement reports.
	pub result: Option<std::result::Result<String, String>>,
	statements: Mutex<Vec<String>>,
}
impl FakeTabular {
	pub fn new(schema: &str, result: std::result::Result<String, String>) -> Self {
		Self { schema: Some(schema.to_string()), result: Some(result), ..Self::default() }
	}

	pub fn statements(&self) -> Vec<String> {
		self.statements.lock().unwrap_or_else(|err| err.into_inner()).clone()
	}
}
impl TabularEngine for FakeTabular {
	fn schema<'a>(
		&'a self,
		_owner_id: &'a str,
		_conversation_id: &'a str,
	) -> BoxFuture<'a, Result<Option<String>>> {
		let schema = self.schema.clone();

		Box::pin(async move { Ok(schema) })
	}

	fn execute<'a>(
		&'a self,
		_owner_id: &'a str,
		_conversation_id: &'a str,
		statement: &'a str,
	) -> BoxFuture<'a, Result<String>> {
		self.statements.lock().unwrap_or_else(|err| err.into_inner()).push(statement.to_string());

		let result = match &self.result {
			Some(Ok(text)) => Ok(text.clone()),
			Some(Err(message)) => Err(Error::Tabular { message: message.clone() }),
			None => Err(Error::Tabular {
				message: "No spreadsheet data is available for this conversation.".to_string(),
			}),
		};

		Box::pin(async move { result })
	}
}

#[derive(Default)]
pub struct FakeConversations {
	pub history: Vec<Message>,
	pub document_summaries: HashMap<String, String>,
	pub global_summary: Option<String>,
	pub job_active: bool,
	pub recorded: Mutex<Vec<(String, String)>>,
}
impl FakeConversations {
	pub fn recorded(&self) -> Vec<(String, String)> {
		self.recorded.lock().unwrap_or_else(|err| err.into_inner()).clone()
	}
}
impl ConversationStore for FakeConversations {
	fn recent_messages<'a>(
		&'a self,
		_owner_id: &'a str,
		_conversation_id: &'a str,
		turns: u32,
	) -> BoxFuture<'a, Result<Vec<Message>>> {
		let keep = turns as usize * 2;
		let skip = self.history.len().saturating_sub(keep);
		let history = self.history[skip..].to_vec();

		Box::pin(async move { Ok(history) })
	}

	fn document_summary<'a>(
		&'a self,
		_owner_id: &'a str,
		_conversation_id: &'a str,
		document_id: &'a str,
	) -> BoxFuture<'a, Result<Option<String>>> {
		let summary = self.document_summaries.get(document_id).cloned();

		Box::pin(async move { Ok(summary) })
	}

	fn global_summary<'a>(
		&'a self,
		_owner_id: &'a str,
		_conversation_id: &'a str,
	) -> BoxFuture<'a, Result<Option<String>>> {
		let summary = self.global_summary.clone();

		Box::pin(async move { Ok(summary) })
	}

	fn background_job_active<'a>(
		&'a self,
		_owner_id: &'a str,
		_conversation_id: &'a str,
	) -> BoxFuture<'a, Result<bool>> {
		let active = self.job_active;

		Box::pin(async move { Ok(active) })
	}

	fn record_exchange<'a>(
		&'a self,
		_owner_id: &'a str,
		_conversation_id: &'a str,
		question: &'a str,
		answer: &'a str,
	) -> BoxFuture<'a, Result<()>> {
		self.recorded
			.lock()
			.unwrap_or_else(|err| err.into_inner())
			.push((question.to_string(), answer.to_string()));

		Box::pin(async move { Ok(()) })
	}
}

/// A chunk with a predictable title and file name.
pub fn chunk(document_id: &str, page_no: u32, chunk_index: u32, content: &str) -> ChunkRecord {
	ChunkRecord {
		content: content.to_string(),
		document_id: document_id.to_string(),
		title: format!("{document_id} title"),
		page_no,
		file_name: format!("{document_id}.pdf"),
		chunk_index: Some(chunk_index),
		semantic_score: None,
		fused_score: None,
		rerank_score: None,
	}
}

/// A generation reply in the JSON shape the generation contract expects.
pub fn generation_reply(answer: &str, action: &str) -> String {
	serde_json::json!({ "answer": answer, "action": action, "chunks_used": [] }).to_string()
}
