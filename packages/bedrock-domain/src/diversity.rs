use std::collections::{HashMap, HashSet};

use crate::{ChunkRecord, cmp_f32_desc};

pub type SparseVector = HashMap<String, f32>;

/// TF-IDF vectors over whitespace-separated lowercase terms.
///
/// `tf = count / terms_in_chunk`, `idf = ln((n + 1) / (df + 1))` where `n` is the pool size.
pub fn tfidf_vectors(texts: &[&str]) -> Vec<SparseVector> {
	let counts: Vec<HashMap<String, usize>> = texts
		.iter()
		.map(|text| {
			let mut counts = HashMap::new();

			for term in text.to_lowercase().split_whitespace() {
				*counts.entry(term.to_string()).or_insert(0) += 1;
			}

			counts
		})
		.collect();
	let mut doc_freq: HashMap<&str, usize> = HashMap::new();

	for chunk_counts in &counts {
		for term in chunk_counts.keys() {
			*doc_freq.entry(term.as_str()).or_insert(0) += 1;
		}
	}

	let n = texts.len() as f32;

	counts
		.iter()
		.map(|chunk_counts| {
			let total = chunk_counts.values().sum::<usize>().max(1) as f32;

			chunk_counts
				.iter()
				.map(|(term, count)| {
					let df = doc_freq.get(term.as_str()).copied().unwrap_or(0) as f32;
					let tf = *count as f32 / total;
					let idf = ((n + 1.0) / (df + 1.0)).ln();

					(term.clone(), tf * idf)
				})
				.collect()
		})
		.collect()
}

pub fn sparse_cosine(lhs: &SparseVector, rhs: &SparseVector) -> f32 {
	let (small, large) = if lhs.len() <= rhs.len() { (lhs, rhs) } else { (rhs, lhs) };
	let dot: f32 =
		small.iter().filter_map(|(term, value)| large.get(term).map(|other| value * other)).sum();

	if dot == 0.0 {
		return 0.0;
	}

	let lhs_norm = lhs.values().map(|v| v * v).sum::<f32>().sqrt();
	let rhs_norm = rhs.values().map(|v| v * v).sum::<f32>().sqrt();

	if lhs_norm <= f32::EPSILON || rhs_norm <= f32::EPSILON {
		return 0.0;
	}

	dot / (lhs_norm * rhs_norm)
}

/// Maximal marginal relevance over `rerank_score`.
///
/// Each pick maximizes `(1 - lambda) * relevance - lambda * max_similarity_to_selected`.
/// Candidates are scanned in descending relevance and only a strictly better score replaces the
/// current best, so ties go to the more relevant chunk.
pub fn select_mmr(chunks: Vec<ChunkRecord>, top_k: usize, lambda: f32) -> Vec<ChunkRecord> {
	if chunks.is_empty() || top_k == 0 {
		return Vec::new();
	}

	let texts: Vec<&str> = chunks.iter().map(|chunk| chunk.content.as_str()).collect();
	let vectors = tfidf_vectors(&texts);
	let relevance: Vec<f32> =
		chunks.iter().map(|chunk| chunk.rerank_score.unwrap_or(0.0)).collect();
	let mut order: Vec<usize> = (0..chunks.len()).collect();

	order.sort_by(|a, b| cmp_f32_desc(relevance[*a], relevance[*b]));

	let mut picked: Vec<usize> = Vec::new();
	let mut picked_set: HashSet<usize> = HashSet::new();

	for _ in 0..top_k.min(chunks.len()) {
		let mut best: Option<(usize, f32)> = None;

		for &idx in &order {
			if picked_set.contains(&idx) {
				continue;
			}

			let max_similarity = picked
				.iter()
				.map(|&sel| sparse_cosine(&vectors[idx], &vectors[sel]))
				.fold(0.0_f32, f32::max);
			let score = (1.0 - lambda) * relevance[idx] - lambda * max_similarity;

			if best.map(|(_, best_score)| score > best_score).unwrap_or(true) {
				best = Some((idx, score));
			}
		}

		let Some((idx, _)) = best else { break };

		picked.push(idx);
		picked_set.insert(idx);
	}

	let mut slots: Vec<Option<ChunkRecord>> = chunks.into_iter().map(Some).collect();

	picked.into_iter().filter_map(|idx| slots[idx].take()).collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn identical_texts_are_fully_similar() {
		let vectors = tfidf_vectors(&["alpha beta", "alpha beta", "gamma"]);

		assert!((sparse_cosine(&vectors[0], &vectors[1]) - 1.0).abs() < 1e-5);
		assert_eq!(sparse_cosine(&vectors[0], &vectors[2]), 0.0);
	}

	#[test]
	fn term_in_every_chunk_carries_no_weight() {
		let vectors = tfidf_vectors(&["shared rare", "shared"]);
		let shared = vectors[0].get("shared").copied().unwrap_or_default();
		let rare = vectors[0].get("rare").copied().unwrap_or_default();

		assert!(shared.abs() < 1e-6);
		assert!((rare - 0.5 * 1.5_f32.ln()).abs() < 1e-6);
	}
}
