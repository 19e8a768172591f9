//! Tiered model invocation with one shared attempt budget.
//!
//! Each attempt walks the primary backend, then hosted provider A once per credential, then
//! hosted provider B. The first response that parses and passes its contract wins.

use std::{
	collections::HashMap,
	future::Future,
	sync::{Arc, Mutex},
	time::Duration,
};

use serde::de::DeserializeOwned;
use tokio::sync::Mutex as AsyncMutex;

use crate::{CompletionBackend, Error, HostedModel, Providers, Result};
use bedrock_config::{Backends, Config, LlmProviderConfig, RotatingProviderConfig};
use bedrock_domain::sanitize;

/// The unit of mutual exclusion for the primary tier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BackendDescriptor {
	pub model: String,
	pub endpoint: String,
}
impl BackendDescriptor {
	pub fn new(model: impl Into<String>, endpoint: impl Into<String>) -> Self {
		Self { model: model.into(), endpoint: endpoint.into() }
	}

	pub fn primary(cfg: &Backends) -> Self {
		Self::new(cfg.model.clone(), cfg.primary_endpoint.clone())
	}

	pub fn secondary(cfg: &Backends) -> Self {
		Self::new(cfg.model.clone(), cfg.secondary_endpoint.clone())
	}
}

/// Lock table and credential cursor shared by every holder of one gateway.
#[derive(Debug, Default)]
pub struct ConcurrencyDomain {
	locks: Mutex<HashMap<BackendDescriptor, Arc<AsyncMutex<()>>>>,
	cursor: Mutex<usize>,
}
impl ConcurrencyDomain {
	pub fn backend_lock(&self, backend: &BackendDescriptor) -> Arc<AsyncMutex<()>> {
		let mut locks = self.locks.lock().unwrap_or_else(|err| err.into_inner());

		locks.entry(backend.clone()).or_default().clone()
	}

	/// Returns the next credential in round-robin order.
	pub fn next_credential<'a>(&self, keys: &'a [String]) -> Option<&'a str> {
		if keys.is_empty() {
			return None;
		}

		let mut cursor = self.cursor.lock().unwrap_or_else(|err| err.into_inner());
		let key = &keys[*cursor % keys.len()];

		*cursor = (*cursor + 1) % keys.len();

		Some(key.as_str())
	}
}

/// The structured shape a model response must take.
pub trait Contract
where
	Self: Send + Sync,
{
	type Output: DeserializeOwned + Send;

	fn name(&self) -> &'static str;

	/// Appended to every prompt sent under this contract.
	fn format_instructions(&self) -> String;

	fn check(&self, _output: &Self::Output) -> std::result::Result<(), String> {
		Ok(())
	}
}

pub struct Gateway {
	backends: Backends,
	max_attempts: u32,
	backoff_ms: u64,
	key_switch_pause_ms: u64,
	provider_a_cfg: RotatingProviderConfig,
	provider_b_cfg: LlmProviderConfig,
	completion: Arc<dyn CompletionBackend>,
	provider_a: Arc<dyn HostedModel>,
	provider_b: Arc<dyn HostedModel>,
	domain: Arc<ConcurrencyDomain>,
}
impl Gateway {
	pub fn new(cfg: &Config, providers: &Providers, domain: Arc<ConcurrencyDomain>) -> Self {
		Self {
			backends: cfg.backends.clone(),
			max_attempts: cfg.gateway.max_attempts,
			backoff_ms: cfg.gateway.backoff_ms,
			key_switch_pause_ms: cfg.gateway.key_switch_pause_ms,
			provider_a_cfg: cfg.gateway.provider_a.clone(),
			provider_b_cfg: cfg.gateway.provider_b.clone(),
			completion: providers.completion.clone(),
			provider_a: providers.provider_a.clone(),
			provider_b: providers.provider_b.clone(),
			domain,
		}
	}

	pub async fn invoke<C>(
		&self,
		contract: &C,
		prompt: &str,
		backend: &BackendDescriptor,
	) -> Result<C::Output>
	where
		C: Contract,
	{
		let prompt = format!("{prompt}\n\n{}", contract.format_instructions());
		let attempts = self.max_attempts.max(1);

		for attempt in 1..=attempts {
			match self.try_primary(contract, &prompt, backend).await {
				Ok(output) => return Ok(output),
				Err(err) => tracing::warn!(
					attempt,
					tier = "primary",
					contract = contract.name(),
					model = %backend.model,
					endpoint = %backend.endpoint,
					error = %err,
					"Gateway tier failed."
				),
			}

			if self.provider_a_cfg.enabled
				&& let Some(output) = self.try_provider_a(contract, &prompt, attempt).await
			{
				return Ok(output);
			}
			if self.provider_b_cfg.enabled {
				let call = self.provider_b.complete(&self.provider_b_cfg.api_key, &prompt);
				let result = with_timeout(self.provider_b_cfg.timeout_ms, call)
					.await
					.and_then(|raw| parse_output(contract, &raw));

				match result {
					Ok(output) => return Ok(output),
					Err(err) => tracing::warn!(
						attempt,
						tier = "provider_b",
						contract = contract.name(),
						error = %err,
						"Gateway tier failed."
					),
				}
			}
			if attempt < attempts {
				tokio::time::sleep(Duration::from_millis(self.backoff_ms)).await;
			}
		}

		tracing::error!(attempts, contract = contract.name(), "Gateway attempt budget exhausted.");

		Err(Error::Exhausted { attempts })
	}

	async fn try_primary<C>(
		&self,
		contract: &C,
		prompt: &str,
		backend: &BackendDescriptor,
	) -> Result<C::Output>
	where
		C: Contract,
	{
		match self.call_backend(contract, prompt, backend).await {
			Ok(output) => Ok(output),
			Err(err) if backend.endpoint == self.backends.primary_endpoint => {
				let alternate = BackendDescriptor::secondary(&self.backends);

				tracing::warn!(
					endpoint = %backend.endpoint,
					alternate = %alternate.endpoint,
					error = %err,
					"High-priority endpoint failed. Retrying on the alternate endpoint."
				);

				self.call_backend(contract, prompt, &alternate).await
			},
			Err(err) => Err(err),
		}
	}

	async fn call_backend<C>(
		&self,
		contract: &C,
		prompt: &str,
		backend: &BackendDescriptor,
	) -> Result<C::Output>
	where
		C: Contract,
	{
		let lock = self.domain.backend_lock(backend);
		let raw = {
			let _guard = lock.lock().await;

			with_timeout(
				self.backends.timeout_ms,
				self.completion.complete(&self.backends, backend, prompt),
			)
			.await?
		};

		parse_output(contract, &raw)
	}

	async fn try_provider_a<C>(&self, contract: &C, prompt: &str, attempt: u32) -> Option<C::Output>
	where
		C: Contract,
	{
		let keys = &self.provider_a_cfg.api_keys;

		for idx in 0..keys.len() {
			let key = self.domain.next_credential(keys)?;
			let call = self.provider_a.complete(key, prompt);
			let result = with_timeout(self.provider_a_cfg.timeout_ms, call)
				.await
				.and_then(|raw| parse_output(contract, &raw));

			match result {
				Ok(output) => return Some(output),
				Err(err) => tracing::warn!(
					attempt,
					tier = "provider_a",
					credential = idx,
					contract = contract.name(),
					error = %err,
					"Gateway tier failed."
				),
			}

			if idx + 1 < keys.len() {
				tokio::time::sleep(Duration::from_millis(self.key_switch_pause_ms)).await;
			}
		}

		None
	}
}

/// Sanitizes raw model text and deserializes it against the contract.
pub fn parse_output<C>(contract: &C, raw: &str) -> Result<C::Output>
where
	C: Contract,
{
	let cleaned = sanitize::sanitize_json(raw);
	let output: C::Output = serde_json::from_str(&cleaned).map_err(|err| Error::Contract {
		contract: contract.name(),
		message: format!("Output is not valid JSON for this contract: {err}"),
	})?;

	contract
		.check(&output)
		.map_err(|message| Error::Contract { contract: contract.name(), message })?;

	Ok(output)
}

async fn with_timeout<F>(timeout_ms: u64, call: F) -> Result<String>
where
	F: Future<Output = Result<String>>,
{
	tokio::time::timeout(Duration::from_millis(timeout_ms), call)
		.await
		.map_err(|_| Error::Timeout { timeout_ms })?
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn credentials_rotate_round_robin() {
		let domain = ConcurrencyDomain::default();
		let keys = vec!["k1".to_string(), "k2".to_string(), "k3".to_string()];
		let picked: Vec<&str> = (0..4).filter_map(|_| domain.next_credential(&keys)).collect();

		assert_eq!(picked, vec!["k1", "k2", "k3", "k1"]);
		assert_eq!(domain.next_credential(&[]), None);
	}

	#[test]
	fn one_lock_per_backend() {
		let domain = ConcurrencyDomain::default();
		let a = BackendDescriptor::new("m", "http://a");
		let b = BackendDescriptor::new("m", "http://b");

		assert!(Arc::ptr_eq(&domain.backend_lock(&a), &domain.backend_lock(&a)));
		assert!(!Arc::ptr_eq(&domain.backend_lock(&a), &domain.backend_lock(&b)));
	}
}
