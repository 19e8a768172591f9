mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Agent, Backends, Config, EmbeddingProviderConfig, Gateway, LlmProviderConfig, Orchestrator,
	Postgres, ProviderConfig, Providers, Qdrant, Retrieval, RetrievalThreshold,
	RotatingProviderConfig, Service, Storage, Tabular, WebSearchProviderConfig, default_thresholds,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions != cfg.storage.qdrant.vector_dim {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must match storage.qdrant.vector_dim."
				.to_string(),
		});
	}
	if cfg.storage.tabular.max_rows == 0 {
		return Err(Error::Validation {
			message: "storage.tabular.max_rows must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.web_search.max_attempts == 0 {
		return Err(Error::Validation {
			message: "providers.web_search.max_attempts must be greater than zero.".to_string(),
		});
	}

	for (label, value) in [
		("backends.model", &cfg.backends.model),
		("backends.primary_endpoint", &cfg.backends.primary_endpoint),
		("backends.secondary_endpoint", &cfg.backends.secondary_endpoint),
	] {
		if value.trim().is_empty() {
			return Err(Error::Validation { message: format!("{label} must be non-empty.") });
		}
	}

	validate_gateway(cfg)?;
	validate_retrieval(cfg)?;

	if cfg.agent.max_generation_attempts == 0 {
		return Err(Error::Validation {
			message: "agent.max_generation_attempts must be greater than zero.".to_string(),
		});
	}
	if cfg.agent.max_steps == 0 {
		return Err(Error::Validation {
			message: "agent.max_steps must be greater than zero.".to_string(),
		});
	}
	if cfg.orchestrator.max_sub_queries == 0 {
		return Err(Error::Validation {
			message: "orchestrator.max_sub_queries must be greater than zero.".to_string(),
		});
	}

	for (label, key) in [
		("embedding", &cfg.providers.embedding.api_key),
		("rerank", &cfg.providers.rerank.api_key),
		("web_search", &cfg.providers.web_search.api_key),
	] {
		if key.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("Provider {label} api_key must be non-empty."),
			});
		}
	}

	Ok(())
}

fn validate_gateway(cfg: &Config) -> Result<()> {
	let gateway = &cfg.gateway;

	if gateway.max_attempts == 0 {
		return Err(Error::Validation {
			message: "gateway.max_attempts must be greater than zero.".to_string(),
		});
	}
	if gateway.provider_a.enabled && gateway.provider_a.api_keys.is_empty() {
		return Err(Error::Validation {
			message: "gateway.provider_a.api_keys must be non-empty when enabled.".to_string(),
		});
	}
	if gateway.provider_b.enabled && gateway.provider_b.api_key.trim().is_empty() {
		return Err(Error::Validation {
			message: "gateway.provider_b.api_key must be non-empty when enabled.".to_string(),
		});
	}

	for (label, temperature) in [
		("gateway.provider_a.temperature", gateway.provider_a.temperature),
		("gateway.provider_b.temperature", gateway.provider_b.temperature),
	] {
		if !temperature.is_finite() || temperature < 0.0 {
			return Err(Error::Validation {
				message: format!("{label} must be a finite number, zero or greater."),
			});
		}
	}

	Ok(())
}

fn validate_retrieval(cfg: &Config) -> Result<()> {
	let retrieval = &cfg.retrieval;

	if retrieval.rrf_k == 0 {
		return Err(Error::Validation {
			message: "retrieval.rrf_k must be greater than zero.".to_string(),
		});
	}
	if !retrieval.mmr_lambda.is_finite() {
		return Err(Error::Validation {
			message: "retrieval.mmr_lambda must be a finite number.".to_string(),
		});
	}
	if !(0.0..=1.0).contains(&retrieval.mmr_lambda) {
		return Err(Error::Validation {
			message: "retrieval.mmr_lambda must be in the range 0.0-1.0.".to_string(),
		});
	}
	if retrieval.min_chunks_per_doc == 0 {
		return Err(Error::Validation {
			message: "retrieval.min_chunks_per_doc must be greater than zero.".to_string(),
		});
	}
	if retrieval.max_total_chunks == 0 {
		return Err(Error::Validation {
			message: "retrieval.max_total_chunks must be greater than zero.".to_string(),
		});
	}
	if retrieval.semantic_k == 0 {
		return Err(Error::Validation {
			message: "retrieval.semantic_k must be greater than zero.".to_string(),
		});
	}
	if retrieval.thresholds.is_empty() {
		return Err(Error::Validation {
			message: "retrieval.thresholds must be non-empty.".to_string(),
		});
	}

	let mut previous: Option<u32> = None;

	for threshold in &retrieval.thresholds {
		if threshold.max_documents == 0 || threshold.target == 0 {
			return Err(Error::Validation {
				message: "retrieval.thresholds entries must be greater than zero.".to_string(),
			});
		}
		if let Some(prev) = previous
			&& threshold.max_documents <= prev
		{
			return Err(Error::Validation {
				message: "retrieval.thresholds must be sorted by ascending max_documents."
					.to_string(),
			});
		}

		previous = Some(threshold.max_documents);
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg.service.log_level.trim().is_empty() {
		cfg.service.log_level = "info".to_string();
	}

	cfg.gateway.provider_a.api_keys.retain(|key| !key.trim().is_empty());

	if cfg.gateway.provider_a.max_output_tokens == Some(0) {
		cfg.gateway.provider_a.max_output_tokens = None;
	}
}
