use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::ChunkRecord;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
	High,
	Medium,
	#[default]
	Low,
}
impl Confidence {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::High => "high",
			Self::Medium => "medium",
			Self::Low => "low",
		}
	}
}

pub fn assess(chunks: &[ChunkRecord]) -> Confidence {
	let documents: HashSet<&str> = chunks
		.iter()
		.map(|chunk| chunk.document_id.as_str())
		.filter(|id| !id.trim().is_empty())
		.collect();

	if chunks.len() >= 5 && documents.len() >= 2 {
		Confidence::High
	} else if chunks.len() >= 3 {
		Confidence::Medium
	} else {
		Confidence::Low
	}
}
