use std::collections::HashMap;

use crate::{ChunkKey, ChunkRecord};

/// Merges ranked lists with reciprocal rank fusion.
///
/// Each appearance adds `1 / (k + rank + 1)` to the chunk's score. The first occurrence of a
/// chunk is the one kept. Output is ordered by descending fused score; equal scores keep the
/// order in which the chunks were first seen.
pub fn reciprocal_rank_fusion(lists: &[Vec<ChunkRecord>], k: u32) -> Vec<ChunkRecord> {
	let mut positions: HashMap<ChunkKey, usize> = HashMap::new();
	let mut fused: Vec<(ChunkRecord, f64)> = Vec::new();

	for list in lists {
		for (rank, chunk) in list.iter().enumerate() {
			let contribution = 1.0 / (f64::from(k) + rank as f64 + 1.0);
			let key = chunk.key(rank);

			match positions.get(&key) {
				Some(&idx) => fused[idx].1 += contribution,
				None => {
					positions.insert(key, fused.len());
					fused.push((chunk.clone(), contribution));
				},
			}
		}
	}

	fused.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

	fused
		.into_iter()
		.map(|(mut chunk, score)| {
			chunk.fused_score = Some(score as f32);

			chunk
		})
		.collect()
}
