pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("Provider error: {message}")]
	Provider { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
	#[error("Qdrant error: {message}")]
	Qdrant { message: String },
	#[error("{message}")]
	Tabular { message: String },
	#[error("Response rejected by {contract} contract: {message}")]
	Contract { contract: &'static str, message: String },
	#[error("Timed out after {timeout_ms} ms.")]
	Timeout { timeout_ms: u64 },
	#[error("All {attempts} attempts failed.")]
	Exhausted { attempts: u32 },
}
impl From<bedrock_storage::Error> for Error {
	fn from(err: bedrock_storage::Error) -> Self {
		match err {
			bedrock_storage::Error::Sqlx(inner) => Self::Storage { message: inner.to_string() },
			bedrock_storage::Error::InvalidArgument(message) => Self::InvalidRequest { message },
			bedrock_storage::Error::NotFound(message) => Self::NotFound { message },
			bedrock_storage::Error::Qdrant(inner) => Self::Qdrant { message: inner.to_string() },
		}
	}
}

impl From<bedrock_providers::Error> for Error {
	fn from(err: bedrock_providers::Error) -> Self {
		Self::Provider { message: err.to_string() }
	}
}
