//! Hosted provider reached through `generateContent` with a per-call API key.

use reqwest::header::HeaderValue;
use serde_json::Value;

use crate::{Error, Result};
use bedrock_config::RotatingProviderConfig;

pub async fn generate(cfg: &RotatingProviderConfig, api_key: &str, prompt: &str) -> Result<String> {
	let client = crate::client(cfg.timeout_ms)?;
	let url = crate::endpoint_url(&cfg.api_base, &cfg.path);
	let mut headers = crate::default_header_map(&cfg.default_headers)?;

	headers.insert("x-goog-api-key", HeaderValue::from_str(api_key)?);

	let res = client.post(url).headers(headers).json(&request_body(cfg, prompt)).send().await?;
	let json: Value = res.error_for_status()?.json().await?;

	parse_generate_content(json)
}

fn request_body(cfg: &RotatingProviderConfig, prompt: &str) -> Value {
	let mut generation = serde_json::json!({ "temperature": cfg.temperature });

	if let Some(max_output_tokens) = cfg.max_output_tokens {
		generation["maxOutputTokens"] = Value::from(max_output_tokens);
	}

	serde_json::json!({
		"contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
		"generationConfig": generation,
	})
}

fn parse_generate_content(json: Value) -> Result<String> {
	let parts = json
		.get("candidates")
		.and_then(|v| v.as_array())
		.and_then(|arr| arr.first())
		.and_then(|candidate| candidate.get("content"))
		.and_then(|content| content.get("parts"))
		.and_then(|parts| parts.as_array())
		.ok_or_else(|| Error::InvalidResponse {
			message: "Response is missing candidate content parts.".to_string(),
		})?;
	let text: String =
		parts.iter().filter_map(|part| part.get("text").and_then(|t| t.as_str())).collect();

	if text.trim().is_empty() {
		return Err(Error::InvalidResponse { message: "Candidate content is empty.".to_string() });
	}

	Ok(text)
}
