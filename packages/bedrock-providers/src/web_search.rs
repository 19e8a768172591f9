use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, Result};
use bedrock_config::WebSearchProviderConfig;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebSearchResponse {
	pub query: String,
	pub answer: Option<String>,
	pub results: Vec<WebResult>,
}
impl WebSearchResponse {
	pub fn empty(query: &str) -> Self {
		Self { query: query.to_string(), answer: None, results: Vec::new() }
	}

	pub fn is_empty(&self) -> bool {
		self.answer.is_none() && self.results.is_empty()
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebResult {
	pub url: String,
	pub title: String,
	pub content: String,
	pub favicon: Option<String>,
}

pub async fn search(cfg: &WebSearchProviderConfig, query: &str) -> Result<WebSearchResponse> {
	let client = crate::client(cfg.timeout_ms)?;
	let url = crate::endpoint_url(&cfg.api_base, &cfg.path);
	let body = serde_json::json!({
		"query": query,
		"include_answer": "advanced",
		"search_depth": cfg.search_depth,
		"max_results": cfg.max_results,
		"include_favicon": true,
	});
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;

	parse_search_response(query, json)
}

/// Retries `search` up to the configured attempt count, then settles for an empty response.
pub async fn search_with_retries(cfg: &WebSearchProviderConfig, query: &str) -> WebSearchResponse {
	let attempts = cfg.max_attempts.max(1);

	for attempt in 1..=attempts {
		match search(cfg, query).await {
			Ok(response) => return response,
			Err(err) => {
				tracing::warn!(
					provider_id = %cfg.provider_id,
					attempt,
					error = %err,
					"Web search attempt failed."
				);

				if attempt < attempts {
					tokio::time::sleep(Duration::from_millis(cfg.retry_pause_ms)).await;
				}
			},
		}
	}

	WebSearchResponse::empty(query)
}

fn parse_search_response(query: &str, json: Value) -> Result<WebSearchResponse> {
	let items = json.get("results").and_then(|v| v.as_array()).ok_or_else(|| {
		Error::InvalidResponse { message: "Search response is missing results array.".to_string() }
	})?;
	let mut results = Vec::with_capacity(items.len());

	for item in items {
		let Some(url) = item.get("url").and_then(|v| v.as_str()) else { continue };
		let favicon = item
			.get("favicon")
			.and_then(|v| v.as_str())
			.filter(|value| !value.trim().is_empty())
			.map(str::to_string);

		results.push(WebResult {
			url: url.to_string(),
			title: str_field(item, "title"),
			content: str_field(item, "content"),
			favicon,
		});
	}

	let answer = json
		.get("answer")
		.and_then(|v| v.as_str())
		.filter(|value| !value.trim().is_empty())
		.map(str::to_string);

	Ok(WebSearchResponse { query: query.to_string(), answer, results })
}

fn str_field(item: &Value, key: &str) -> String {
	item.get(key).and_then(|v| v.as_str()).unwrap_or_default().to_string()
}
