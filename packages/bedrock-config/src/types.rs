use std::path::PathBuf;

use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	pub backends: Backends,
	pub gateway: Gateway,
	pub retrieval: Retrieval,
	pub agent: Agent,
	pub orchestrator: Orchestrator,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
	pub qdrant: Qdrant,
	pub tabular: Tabular,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Qdrant {
	pub url: String,
	pub collection: String,
	pub vector_dim: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Tabular {
	/// Directory holding one SQLite file per conversation, laid out as
	/// `<root_dir>/<owner_id>/<conversation_id>.sqlite`.
	pub root_dir: PathBuf,
	#[serde(default = "default_max_rows")]
	pub max_rows: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
	pub rerank: ProviderConfig,
	pub web_search: WebSearchProviderConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub timeout_ms: u64,
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebSearchProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub max_results: u32,
	pub search_depth: String,
	pub timeout_ms: u64,
	/// Attempts per query before the provider gives up and reports an empty result.
	#[serde(default = "default_web_search_attempts")]
	pub max_attempts: u32,
	#[serde(default = "default_web_search_retry_pause_ms")]
	pub retry_pause_ms: u64,
	pub default_headers: Map<String, Value>,
}

/// The pair of local inference endpoints serving the main model.
///
/// `primary_endpoint` is the high-priority endpoint: a failed call against it is retried once on
/// `secondary_endpoint` inside the same gateway attempt.
#[derive(Debug, Clone, Deserialize)]
pub struct Backends {
	pub model: String,
	pub path: String,
	pub primary_endpoint: String,
	pub secondary_endpoint: String,
	pub timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Gateway {
	pub max_attempts: u32,
	pub backoff_ms: u64,
	#[serde(default = "default_key_switch_pause_ms")]
	pub key_switch_pause_ms: u64,
	pub provider_a: RotatingProviderConfig,
	pub provider_b: LlmProviderConfig,
}

/// Hosted model reached with one of several credentials, rotated round-robin.
#[derive(Debug, Clone, Deserialize)]
pub struct RotatingProviderConfig {
	pub enabled: bool,
	pub provider_id: String,
	pub api_base: String,
	pub api_keys: Vec<String>,
	pub path: String,
	pub model: String,
	pub temperature: f32,
	pub max_output_tokens: Option<u32>,
	pub timeout_ms: u64,
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmProviderConfig {
	pub enabled: bool,
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub temperature: f32,
	pub timeout_ms: u64,
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Retrieval {
	pub semantic_k: u32,
	pub lexical_k: u32,
	pub rrf_k: u32,
	pub mmr_lambda: f32,
	pub min_chunks_per_doc: u32,
	pub max_total_chunks: u32,
	#[serde(default = "default_chunks_per_document")]
	pub chunks_per_document: u32,
	#[serde(default = "default_thresholds")]
	pub thresholds: Vec<RetrievalThreshold>,
}

/// Target chunk total used when the fused pool spans at most `max_documents` documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RetrievalThreshold {
	pub max_documents: u32,
	pub target: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Agent {
	pub max_generation_attempts: u32,
	pub generation_backoff_ms: u64,
	pub max_web_search: u32,
	pub max_structured_query: u32,
	#[serde(default = "default_max_steps")]
	pub max_steps: u32,
	#[serde(default = "default_history_turns")]
	pub history_turns: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Orchestrator {
	pub decomposition: bool,
	pub max_sub_queries: u32,
	#[serde(default = "default_parallel_backends")]
	pub parallel_backends: bool,
}

pub fn default_thresholds() -> Vec<RetrievalThreshold> {
	vec![
		RetrievalThreshold { max_documents: 2, target: 20 },
		RetrievalThreshold { max_documents: 5, target: 50 },
		RetrievalThreshold { max_documents: 10, target: 100 },
	]
}

fn default_max_rows() -> u32 {
	500
}

fn default_web_search_attempts() -> u32 {
	5
}

fn default_web_search_retry_pause_ms() -> u64 {
	1_000
}

fn default_key_switch_pause_ms() -> u64 {
	200
}

fn default_chunks_per_document() -> u32 {
	10
}

fn default_max_steps() -> u32 {
	32
}

fn default_history_turns() -> u32 {
	2
}

fn default_parallel_backends() -> bool {
	true
}
