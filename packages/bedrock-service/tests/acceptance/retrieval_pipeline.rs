use std::sync::Arc;

use super::{CONVERSATION, OWNER};
use bedrock_domain::{ChunkRecord, Confidence};
use bedrock_testkit::{
	Fakes,
	fakes::{self, FakeChunkIndex, FakeCompletion, FakeRerank},
	test_config,
};

fn documents(chunks: &[ChunkRecord]) -> Vec<&str> {
	chunks.iter().map(|chunk| chunk.document_id.as_str()).collect()
}

#[tokio::test]
async fn lexical_miss_keeps_the_semantic_order() {
	let semantic = vec![
		fakes::chunk("doc-a", 1, 0, "alpha revenue"),
		fakes::chunk("doc-b", 2, 0, "beta costs"),
		fakes::chunk("doc-c", 3, 0, "gamma hiring"),
	];
	let fakes = Fakes {
		chunks: Arc::new(FakeChunkIndex::new(semantic, Vec::new())),
		..Fakes::new(FakeCompletion::failing())
	};
	let service = fakes.service(test_config());
	let outcome = service.retrieve(OWNER, CONVERSATION, "revenue").await;

	assert_eq!(documents(&outcome.chunks), vec!["doc-a", "doc-b", "doc-c"]);
	assert!(outcome.chunks.iter().all(|chunk| chunk.fused_score.is_none()));
	assert_eq!(outcome.confidence, Confidence::Medium);
}

#[tokio::test]
async fn both_lists_are_fused_by_rank() {
	let semantic = vec![
		fakes::chunk("doc-a", 1, 0, "alpha revenue"),
		fakes::chunk("doc-b", 1, 0, "beta costs"),
	];
	let lexical =
		vec![fakes::chunk("doc-c", 1, 0, "gamma hiring"), fakes::chunk("doc-a", 1, 0, "alpha revenue")];
	let fakes = Fakes {
		chunks: Arc::new(FakeChunkIndex::new(semantic, lexical)),
		..Fakes::new(FakeCompletion::failing())
	};
	let service = fakes.service(test_config());
	let outcome = service.retrieve(OWNER, CONVERSATION, "revenue").await;

	// doc-a appears in both lists; doc-c outranks doc-b on its first place.
	assert_eq!(documents(&outcome.chunks), vec!["doc-a", "doc-c", "doc-b"]);
	assert!(outcome.chunks.iter().all(|chunk| chunk.fused_score.is_some()));
}

#[tokio::test]
async fn rerank_scores_drive_the_final_order() {
	let semantic = vec![
		fakes::chunk("doc-a", 1, 0, "alpha revenue"),
		fakes::chunk("doc-a", 2, 1, "beta costs"),
		fakes::chunk("doc-b", 1, 0, "gamma hiring"),
	];
	let fakes = Fakes {
		chunks: Arc::new(FakeChunkIndex::new(semantic, Vec::new())),
		rerank: Arc::new(FakeRerank::scoring(vec![0.1, 0.9, 0.5])),
		..Fakes::new(FakeCompletion::failing())
	};
	let service = fakes.service(test_config());
	let outcome = service.retrieve(OWNER, CONVERSATION, "costs").await;
	let scores: Vec<Option<f32>> = outcome.chunks.iter().map(|chunk| chunk.rerank_score).collect();

	assert_eq!(scores, vec![Some(0.9), Some(0.5), Some(0.1)]);
}

#[tokio::test]
async fn mismatched_rerank_output_falls_back_to_rank_scores() {
	let semantic = vec![
		fakes::chunk("doc-a", 1, 0, "alpha revenue"),
		fakes::chunk("doc-b", 1, 0, "beta costs"),
	];
	let fakes = Fakes {
		chunks: Arc::new(FakeChunkIndex::new(semantic, Vec::new())),
		rerank: Arc::new(FakeRerank::scoring(vec![0.7])),
		..Fakes::new(FakeCompletion::failing())
	};
	let service = fakes.service(test_config());
	let outcome = service.retrieve(OWNER, CONVERSATION, "revenue").await;
	let scores: Vec<Option<f32>> = outcome.chunks.iter().map(|chunk| chunk.rerank_score).collect();

	assert_eq!(scores, vec![Some(1.0), Some(0.5)]);
}

#[tokio::test]
async fn unavailable_index_degrades_to_an_empty_result() {
	let fakes = Fakes {
		chunks: Arc::new(FakeChunkIndex { fail: true, ..FakeChunkIndex::default() }),
		..Fakes::new(FakeCompletion::failing())
	};
	let service = fakes.service(test_config());
	let outcome = service.retrieve(OWNER, CONVERSATION, "revenue").await;

	assert!(outcome.chunks.is_empty());
	assert_eq!(outcome.confidence, Confidence::Low);
}

#[tokio::test]
async fn many_documents_yield_high_confidence() {
	let semantic: Vec<ChunkRecord> = (0..6)
		.map(|idx| {
			fakes::chunk(&format!("doc-{idx}"), 1, 0, &format!("topic{idx} unique{idx}"))
		})
		.collect();
	let fakes = Fakes {
		chunks: Arc::new(FakeChunkIndex::new(semantic, Vec::new())),
		..Fakes::new(FakeCompletion::failing())
	};
	let service = fakes.service(test_config());
	let outcome = service.retrieve(OWNER, CONVERSATION, "topics").await;

	assert_eq!(outcome.chunks.len(), 6);
	assert_eq!(outcome.confidence, Confidence::High);
}
