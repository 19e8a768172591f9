use serde::{Deserialize, Serialize};

/// One retrieved passage of a source document.
///
/// Scores are filled in as the record moves through retrieval: `semantic_score` by the dense
/// search, `fused_score` by reciprocal rank fusion and `rerank_score` by the cross-model pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkRecord {
	pub content: String,
	pub document_id: String,
	pub title: String,
	pub page_no: u32,
	pub file_name: String,
	pub chunk_index: Option<u32>,
	pub semantic_score: Option<f32>,
	pub fused_score: Option<f32>,
	pub rerank_score: Option<f32>,
}
impl ChunkRecord {
	/// Identity used for fusion. A chunk without a stored index falls back to its rank in the
	/// list it came from.
	pub fn key(&self, rank: usize) -> ChunkKey {
		ChunkKey {
			document_id: self.document_id.clone(),
			page_no: self.page_no,
			chunk_index: self.chunk_index.unwrap_or(rank as u32),
		}
	}

	pub fn render(&self) -> String {
		format!("[Document: {}]\n\n{}", self.title, self.content)
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChunkKey {
	pub document_id: String,
	pub page_no: u32,
	pub chunk_index: u32,
}

pub fn render_chunks(chunks: &[ChunkRecord]) -> String {
	chunks.iter().map(ChunkRecord::render).collect::<Vec<_>>().join("\n\n")
}
