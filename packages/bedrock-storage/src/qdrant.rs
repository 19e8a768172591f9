pub const DENSE_VECTOR_NAME: &str = "dense";
pub const BM25_VECTOR_NAME: &str = "bm25";
pub const BM25_MODEL: &str = "qdrant/bm25";

use std::collections::HashMap;

use qdrant_client::qdrant::{
	Condition, Document, Filter, Query, QueryPointsBuilder, ScoredPoint, Value, value::Kind,
};

use crate::Result;
use bedrock_domain::ChunkRecord;

pub struct QdrantStore {
	pub client: qdrant_client::Qdrant,
	pub collection: String,
	pub vector_dim: u32,
}
impl QdrantStore {
	pub fn new(cfg: &bedrock_config::Qdrant) -> Result<Self> {
		let client = qdrant_client::Qdrant::from_url(&cfg.url).build()?;

		Ok(Self { client, collection: cfg.collection.clone(), vector_dim: cfg.vector_dim })
	}

	pub async fn semantic_search(
		&self,
		owner_id: &str,
		conversation_id: &str,
		vector: Vec<f32>,
		limit: u32,
	) -> Result<Vec<ChunkRecord>> {
		let search = QueryPointsBuilder::new(self.collection.clone())
			.query(Query::new_nearest(vector))
			.using(DENSE_VECTOR_NAME)
			.filter(scope_filter(owner_id, conversation_id))
			.with_payload(true)
			.limit(limit as u64);
		let response = self.client.query(search).await?;

		Ok(response.result.iter().filter_map(|point| chunk_from_point(point, true)).collect())
	}

	pub async fn lexical_search(
		&self,
		owner_id: &str,
		conversation_id: &str,
		text: &str,
		limit: u32,
	) -> Result<Vec<ChunkRecord>> {
		let search = QueryPointsBuilder::new(self.collection.clone())
			.query(Query::new_nearest(Document::new(text.to_string(), BM25_MODEL)))
			.using(BM25_VECTOR_NAME)
			.filter(scope_filter(owner_id, conversation_id))
			.with_payload(true)
			.limit(limit as u64);
		let response = self.client.query(search).await?;

		Ok(response.result.iter().filter_map(|point| chunk_from_point(point, false)).collect())
	}
}

pub fn scope_filter(owner_id: &str, conversation_id: &str) -> Filter {
	Filter::all([
		Condition::matches("owner_id", owner_id.to_string()),
		Condition::matches("conversation_id", conversation_id.to_string()),
	])
}

/// Builds a chunk from a point payload. Points without content or a document id are skipped.
pub fn chunk_from_point(point: &ScoredPoint, semantic: bool) -> Option<ChunkRecord> {
	let payload = &point.payload;
	let content = payload_string(payload, "content")
		.or_else(|| payload_string(payload, "page_content"))?;
	let document_id = payload_string(payload, "document_id")?;

	if content.trim().is_empty() {
		tracing::warn!(document_id = %document_id, "Skipping chunk with empty content.");

		return None;
	}

	Some(ChunkRecord {
		content,
		title: payload_string(payload, "title").unwrap_or_else(|| document_id.clone()),
		page_no: payload_u32(payload, "page_no").unwrap_or(0),
		file_name: payload_string(payload, "file_name").unwrap_or_default(),
		chunk_index: payload_u32(payload, "chunk_index"),
		semantic_score: semantic.then_some(point.score),
		fused_score: None,
		rerank_score: None,
		document_id,
	})
}

pub fn payload_string(payload: &HashMap<String, Value>, key: &str) -> Option<String> {
	let value = payload.get(key)?;

	match &value.kind {
		Some(Kind::StringValue(text)) => Some(text.to_string()),
		_ => None,
	}
}

pub fn payload_u32(payload: &HashMap<String, Value>, key: &str) -> Option<u32> {
	let value = payload.get(key)?;

	match &value.kind {
		Some(Kind::IntegerValue(value)) => u32::try_from(*value).ok(),
		Some(Kind::DoubleValue(value)) =>
			if value.fract() == 0.0 {
				u32::try_from(*value as i64).ok()
			} else {
				None
			},
		Some(Kind::StringValue(text)) => text.trim().parse().ok(),
		_ => None,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn value(kind: Kind) -> Value {
		Value { kind: Some(kind) }
	}

	fn point(payload: Vec<(&str, Kind)>, score: f32) -> ScoredPoint {
		ScoredPoint {
			payload: payload.into_iter().map(|(key, kind)| (key.to_string(), value(kind))).collect(),
			score,
			..Default::default()
		}
	}

	#[test]
	fn reads_chunk_fields_from_payload() {
		let point = point(
			vec![
				("page_content", Kind::StringValue("Quarterly revenue rose.".to_string())),
				("document_id", Kind::StringValue("doc-1".to_string())),
				("title", Kind::StringValue("Q3 Report".to_string())),
				("page_no", Kind::DoubleValue(4.0)),
				("chunk_index", Kind::StringValue("12".to_string())),
			],
			0.83,
		);
		let chunk = chunk_from_point(&point, true).expect("Chunk must parse.");

		assert_eq!(chunk.title, "Q3 Report");
		assert_eq!(chunk.page_no, 4);
		assert_eq!(chunk.chunk_index, Some(12));
		assert_eq!(chunk.semantic_score, Some(0.83));
	}

	#[test]
	fn lexical_points_carry_no_semantic_score() {
		let point = point(
			vec![
				("content", Kind::StringValue("Body.".to_string())),
				("document_id", Kind::StringValue("doc-2".to_string())),
			],
			7.5,
		);
		let chunk = chunk_from_point(&point, false).expect("Chunk must parse.");

		assert_eq!(chunk.semantic_score, None);
		assert_eq!(chunk.title, "doc-2");
		assert_eq!(chunk.chunk_index, None);
	}

	#[test]
	fn points_without_document_are_skipped() {
		let point = point(vec![("content", Kind::StringValue("Body.".to_string()))], 1.0);

		assert!(chunk_from_point(&point, true).is_none());
	}
}
