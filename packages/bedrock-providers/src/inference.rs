//! Local inference server speaking the `{model, prompt, stream}` generate protocol.

use serde_json::Value;

use crate::{Error, Result};

pub async fn generate(
	endpoint: &str,
	path: &str,
	model: &str,
	timeout_ms: u64,
	prompt: &str,
) -> Result<String> {
	let client = crate::client(timeout_ms)?;
	let url = crate::endpoint_url(endpoint, path);
	let body = serde_json::json!({ "model": model, "prompt": prompt, "stream": false });
	let res = client.post(url).json(&body).send().await?;
	let json: Value = res.error_for_status()?.json().await?;

	parse_generate_response(json)
}

fn parse_generate_response(json: Value) -> Result<String> {
	json.get("response").and_then(|v| v.as_str()).map(str::to_string).ok_or_else(|| {
		Error::InvalidResponse { message: "Generate response is missing response text.".to_string() }
	})
}
