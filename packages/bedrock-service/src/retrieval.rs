use crate::BedrockService;
use bedrock_domain::{ChunkRecord, Confidence, balance, confidence, diversity, fusion};

#[derive(Debug, Clone)]
pub struct RetrievalOutcome {
	pub chunks: Vec<ChunkRecord>,
	pub confidence: Confidence,
}
impl RetrievalOutcome {
	pub fn empty() -> Self {
		Self { chunks: Vec::new(), confidence: Confidence::Low }
	}
}

impl BedrockService {
	/// Hybrid search, fusion, per-document balancing, rescoring and MMR diversification.
	///
	/// Never fails: search or rescoring errors degrade the result instead.
	pub async fn retrieve(
		&self,
		owner_id: &str,
		conversation_id: &str,
		query: &str,
	) -> RetrievalOutcome {
		let cfg = &self.cfg.retrieval;
		let (semantic, lexical) = tokio::join!(
			self.stores.chunks.semantic(owner_id, conversation_id, query, cfg.semantic_k),
			self.stores.chunks.lexical(owner_id, conversation_id, query, cfg.lexical_k),
		);
		let semantic = semantic.unwrap_or_else(|err| {
			tracing::warn!(error = %err, "Semantic search failed.");

			Vec::new()
		});
		let lexical = lexical.unwrap_or_else(|err| {
			tracing::warn!(error = %err, "Lexical search failed.");

			Vec::new()
		});
		let pool = if lexical.is_empty() {
			semantic
		} else {
			fusion::reciprocal_rank_fusion(&[semantic, lexical], cfg.rrf_k)
		};

		if pool.is_empty() {
			return RetrievalOutcome::empty();
		}

		let (balanced, plan) = balance::select_balanced(pool, cfg);

		tracing::debug!(
			documents = plan.documents,
			target = plan.target,
			quota = plan.quota,
			selected = balanced.len(),
			"Balanced retrieval pool."
		);

		let rescored = self.rescore(query, balanced).await;
		let top_k = rescored.len();
		let chunks = diversity::select_mmr(rescored, top_k, cfg.mmr_lambda);
		let confidence = confidence::assess(&chunks);

		RetrievalOutcome { chunks, confidence }
	}

	async fn rescore(&self, query: &str, mut chunks: Vec<ChunkRecord>) -> Vec<ChunkRecord> {
		let docs: Vec<String> = chunks.iter().map(|chunk| chunk.content.clone()).collect();
		let scores = match self.providers.rerank.rerank(&self.cfg.providers.rerank, query, &docs).await
		{
			Ok(scores) if scores.len() == docs.len() => scores,
			Ok(scores) => {
				tracing::warn!(
					expected = docs.len(),
					got = scores.len(),
					"Rerank returned a mismatched score count. Falling back to rank scores."
				);

				rank_scores(docs.len())
			},
			Err(err) => {
				tracing::warn!(error = %err, "Rerank failed. Falling back to rank scores.");

				rank_scores(docs.len())
			},
		};

		for (chunk, score) in chunks.iter_mut().zip(scores) {
			chunk.rerank_score = Some(score);
		}

		chunks
	}
}

/// `1 - i/n` for each position, so earlier fused ranks keep their lead.
pub fn rank_scores(count: usize) -> Vec<f32> {
	(0..count).map(|idx| 1.0 - idx as f32 / count as f32).collect()
}
