pub mod agent;
pub mod contracts;
pub mod gateway;
pub mod orchestrator;
pub mod prompts;
pub mod retrieval;

mod error;

pub use agent::{
	Message, Role,
	router::Node,
	state::{Action, Mode, QueryState},
};
pub use error::{Error, Result};
pub use gateway::{BackendDescriptor, ConcurrencyDomain, Contract, Gateway};
pub use orchestrator::{Citation, QueryRequest, QueryResponse, WebSource};
pub use retrieval::RetrievalOutcome;

use std::{future::Future, pin::Pin, sync::Arc};

use bedrock_config::{
	Backends, Config, EmbeddingProviderConfig, LlmProviderConfig, ProviderConfig,
	RotatingProviderConfig, WebSearchProviderConfig,
};
use bedrock_domain::ChunkRecord;
use bedrock_providers::{
	embedding, gemini, inference, openai, rerank,
	web_search::{self, WebSearchResponse},
};
use bedrock_storage::{db::Db, qdrant::QdrantStore, queries, tabular::TabularStore};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Dense and BM25 search over the chunks of one conversation.
pub trait ChunkIndex
where
	Self: Send + Sync,
{
	fn semantic<'a>(
		&'a self,
		owner_id: &'a str,
		conversation_id: &'a str,
		query: &'a str,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<ChunkRecord>>>;

	fn lexical<'a>(
		&'a self,
		owner_id: &'a str,
		conversation_id: &'a str,
		query: &'a str,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<ChunkRecord>>>;
}

pub trait RerankProvider
where
	Self: Send + Sync,
{
	fn rerank<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
		query: &'a str,
		docs: &'a [String],
	) -> BoxFuture<'a, Result<Vec<f32>>>;
}

pub trait CompletionBackend
where
	Self: Send + Sync,
{
	fn complete<'a>(
		&'a self,
		cfg: &'a Backends,
		backend: &'a BackendDescriptor,
		prompt: &'a str,
	) -> BoxFuture<'a, Result<String>>;
}

/// A hosted model reached with an explicit credential.
pub trait HostedModel
where
	Self: Send + Sync,
{
	fn complete<'a>(&'a self, credential: &'a str, prompt: &'a str) -> BoxFuture<'a, Result<String>>;
}

pub trait WebSearchProvider
where
	Self: Send + Sync,
{
	fn search<'a>(
		&'a self,
		cfg: &'a WebSearchProviderConfig,
		query: &'a str,
	) -> BoxFuture<'a, Result<WebSearchResponse>>;
}

pub trait TabularEngine
where
	Self: Send + Sync,
{
	fn schema<'a>(
		&'a self,
		owner_id: &'a str,
		conversation_id: &'a str,
	) -> BoxFuture<'a, Result<Option<String>>>;

	/// Runs one read-only statement and returns the rendered result table.
	fn execute<'a>(
		&'a self,
		owner_id: &'a str,
		conversation_id: &'a str,
		statement: &'a str,
	) -> BoxFuture<'a, Result<String>>;
}

pub trait ConversationStore
where
	Self: Send + Sync,
{
	fn recent_messages<'a>(
		&'a self,
		owner_id: &'a str,
		conversation_id: &'a str,
		turns: u32,
	) -> BoxFuture<'a, Result<Vec<Message>>>;

	fn document_summary<'a>(
		&'a self,
		owner_id: &'a str,
		conversation_id: &'a str,
		document_id: &'a str,
	) -> BoxFuture<'a, Result<Option<String>>>;

	fn global_summary<'a>(
		&'a self,
		owner_id: &'a str,
		conversation_id: &'a str,
	) -> BoxFuture<'a, Result<Option<String>>>;

	fn background_job_active<'a>(
		&'a self,
		owner_id: &'a str,
		conversation_id: &'a str,
	) -> BoxFuture<'a, Result<bool>>;

	fn record_exchange<'a>(
		&'a self,
		owner_id: &'a str,
		conversation_id: &'a str,
		question: &'a str,
		answer: &'a str,
	) -> BoxFuture<'a, Result<()>>;
}

#[derive(Clone)]
pub struct Providers {
	pub completion: Arc<dyn CompletionBackend>,
	pub provider_a: Arc<dyn HostedModel>,
	pub provider_b: Arc<dyn HostedModel>,
	pub rerank: Arc<dyn RerankProvider>,
	pub web_search: Arc<dyn WebSearchProvider>,
}
impl Providers {
	pub fn new(
		completion: Arc<dyn CompletionBackend>,
		provider_a: Arc<dyn HostedModel>,
		provider_b: Arc<dyn HostedModel>,
		rerank: Arc<dyn RerankProvider>,
		web_search: Arc<dyn WebSearchProvider>,
	) -> Self {
		Self { completion, provider_a, provider_b, rerank, web_search }
	}

	pub fn from_config(cfg: &Config) -> Self {
		let provider = Arc::new(DefaultProviders);

		Self {
			completion: provider.clone(),
			provider_a: Arc::new(GenerateContentModel { cfg: cfg.gateway.provider_a.clone() }),
			provider_b: Arc::new(ChatCompletionModel { cfg: cfg.gateway.provider_b.clone() }),
			rerank: provider.clone(),
			web_search: provider,
		}
	}
}

#[derive(Clone)]
pub struct Stores {
	pub chunks: Arc<dyn ChunkIndex>,
	pub tabular: Arc<dyn TabularEngine>,
	pub conversations: Arc<dyn ConversationStore>,
}
impl Stores {
	pub fn new(
		chunks: Arc<dyn ChunkIndex>,
		tabular: Arc<dyn TabularEngine>,
		conversations: Arc<dyn ConversationStore>,
	) -> Self {
		Self { chunks, tabular, conversations }
	}

	pub fn from_backends(cfg: &Config, db: Db, qdrant: QdrantStore) -> Self {
		Self {
			chunks: Arc::new(QdrantChunkIndex {
				store: qdrant,
				embedding: cfg.providers.embedding.clone(),
			}),
			tabular: Arc::new(TabularStore::new(&cfg.storage.tabular)),
			conversations: Arc::new(db),
		}
	}
}

pub struct BedrockService {
	pub cfg: Config,
	pub gateway: Gateway,
	pub providers: Providers,
	pub stores: Stores,
}
impl BedrockService {
	pub fn new(cfg: Config, db: Db, qdrant: QdrantStore) -> Self {
		let providers = Providers::from_config(&cfg);
		let stores = Stores::from_backends(&cfg, db, qdrant);

		Self::with_collaborators(cfg, providers, stores, Arc::new(ConcurrencyDomain::default()))
	}

	pub fn with_collaborators(
		cfg: Config,
		providers: Providers,
		stores: Stores,
		domain: Arc<ConcurrencyDomain>,
	) -> Self {
		let gateway = Gateway::new(&cfg, &providers, domain);

		Self { cfg, gateway, providers, stores }
	}
}

struct DefaultProviders;
impl CompletionBackend for DefaultProviders {
	fn complete<'a>(
		&'a self,
		cfg: &'a Backends,
		backend: &'a BackendDescriptor,
		prompt: &'a str,
	) -> BoxFuture<'a, Result<String>> {
		Box::pin(async move {
			Ok(inference::generate(
				&backend.endpoint,
				&cfg.path,
				&backend.model,
				cfg.timeout_ms,
				prompt,
			)
			.await?)
		})
	}
}

impl RerankProvider for DefaultProviders {
	fn rerank<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
		query: &'a str,
		docs: &'a [String],
	) -> BoxFuture<'a, Result<Vec<f32>>> {
		Box::pin(async move { Ok(rerank::rerank(cfg, query, docs).await?) })
	}
}

impl WebSearchProvider for DefaultProviders {
	fn search<'a>(
		&'a self,
		cfg: &'a WebSearchProviderConfig,
		query: &'a str,
	) -> BoxFuture<'a, Result<WebSearchResponse>> {
		Box::pin(async move { Ok(web_search::search_with_retries(cfg, query).await) })
	}
}

struct GenerateContentModel {
	cfg: RotatingProviderConfig,
}
impl HostedModel for GenerateContentModel {
	fn complete<'a>(&'a self, credential: &'a str, prompt: &'a str) -> BoxFuture<'a, Result<String>> {
		Box::pin(async move { Ok(gemini::generate(&self.cfg, credential, prompt).await?) })
	}
}

struct ChatCompletionModel {
	cfg: LlmProviderConfig,
}
impl HostedModel for ChatCompletionModel {
	fn complete<'a>(&'a self, credential: &'a str, prompt: &'a str) -> BoxFuture<'a, Result<String>> {
		Box::pin(async move { Ok(openai::complete(&self.cfg, credential, prompt).await?) })
	}
}

struct QdrantChunkIndex {
	store: QdrantStore,
	embedding: EmbeddingProviderConfig,
}
impl ChunkIndex for QdrantChunkIndex {
	fn semantic<'a>(
		&'a self,
		owner_id: &'a str,
		conversation_id: &'a str,
		query: &'a str,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<ChunkRecord>>> {
		Box::pin(async move {
			let vector = embedding::embed_one(&self.embedding, query).await?;

			Ok(self.store.semantic_search(owner_id, conversation_id, vector, limit).await?)
		})
	}

	fn lexical<'a>(
		&'a self,
		owner_id: &'a str,
		conversation_id: &'a str,
		query: &'a str,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<ChunkRecord>>> {
		Box::pin(async move {
			Ok(self.store.lexical_search(owner_id, conversation_id, query, limit).await?)
		})
	}
}

impl TabularEngine for TabularStore {
	fn schema<'a>(
		&'a self,
		owner_id: &'a str,
		conversation_id: &'a str,
	) -> BoxFuture<'a, Result<Option<String>>> {
		Box::pin(async move {
			TabularStore::schema(self, owner_id, conversation_id).await.map_err(tabular_error)
		})
	}

	fn execute<'a>(
		&'a self,
		owner_id: &'a str,
		conversation_id: &'a str,
		statement: &'a str,
	) -> BoxFuture<'a, Result<String>> {
		Box::pin(async move {
			let table = TabularStore::execute(self, owner_id, conversation_id, statement)
				.await
				.map_err(tabular_error)?;

			Ok(table.render(self.max_rows))
		})
	}
}

impl ConversationStore for Db {
	fn recent_messages<'a>(
		&'a self,
		owner_id: &'a str,
		conversation_id: &'a str,
		turns: u32,
	) -> BoxFuture<'a, Result<Vec<Message>>> {
		Box::pin(async move {
			let rows = queries::recent_messages(self, owner_id, conversation_id, turns).await?;

			Ok(rows
				.into_iter()
				.filter_map(|row| {
					Role::parse(&row.role).map(|role| Message { role, content: row.content })
				})
				.collect())
		})
	}

	fn document_summary<'a>(
		&'a self,
		owner_id: &'a str,
		conversation_id: &'a str,
		document_id: &'a str,
	) -> BoxFuture<'a, Result<Option<String>>> {
		Box::pin(async move {
			Ok(queries::document_summary(self, owner_id, conversation_id, document_id).await?)
		})
	}

	fn global_summary<'a>(
		&'a self,
		owner_id: &'a str,
		conversation_id: &'a str,
	) -> BoxFuture<'a, Result<Option<String>>> {
		Box::pin(async move {
			Ok(queries::conversation_summary(self, owner_id, conversation_id).await?)
		})
	}

	fn background_job_active<'a>(
		&'a self,
		owner_id: &'a str,
		conversation_id: &'a str,
	) -> BoxFuture<'a, Result<bool>> {
		Box::pin(async move {
			Ok(queries::background_job_active(self, owner_id, conversation_id).await?)
		})
	}

	fn record_exchange<'a>(
		&'a self,
		owner_id: &'a str,
		conversation_id: &'a str,
		question: &'a str,
		answer: &'a str,
	) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			queries::insert_message(self, owner_id, conversation_id, Role::User.as_str(), question)
				.await?;
			queries::insert_message(
				self,
				owner_id,
				conversation_id,
				Role::Assistant.as_str(),
				answer,
			)
			.await?;

			Ok(())
		})
	}
}

// Tabular failures are surfaced verbatim to the next generation round.
fn tabular_error(err: bedrock_storage::Error) -> Error {
	match err {
		bedrock_storage::Error::InvalidArgument(message)
		| bedrock_storage::Error::NotFound(message) => Error::Tabular { message },
		other => Error::Tabular { message: other.to_string() },
	}
}
