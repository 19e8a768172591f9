use std::sync::Arc;

use bedrock_service::BedrockService;
use bedrock_storage::{db::Db, qdrant::QdrantStore};

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<BedrockService>,
}
impl AppState {
	pub async fn new(config: bedrock_config::Config) -> color_eyre::Result<Self> {
		let db = Db::connect(&config.storage.postgres).await?;

		db.ensure_schema().await?;

		let qdrant = QdrantStore::new(&config.storage.qdrant)?;
		let service = BedrockService::new(config, db, qdrant);

		Ok(Self::from_service(service))
	}

	pub fn from_service(service: BedrockService) -> Self {
		Self { service: Arc::new(service) }
	}
}
