use std::collections::HashMap;

use bedrock_config::Retrieval;

use crate::ChunkRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalancePlan {
	pub documents: usize,
	pub target: usize,
	pub quota: usize,
	pub total: usize,
}

pub fn adaptive_target(documents: usize, cfg: &Retrieval) -> usize {
	for threshold in &cfg.thresholds {
		if documents <= threshold.max_documents as usize {
			return threshold.target as usize;
		}
	}

	(cfg.max_total_chunks as usize).min(documents * cfg.chunks_per_document as usize)
}

pub fn plan(documents: usize, cfg: &Retrieval) -> BalancePlan {
	if documents == 0 {
		return BalancePlan { documents, target: 0, quota: 0, total: 0 };
	}

	let target = adaptive_target(documents, cfg);
	let quota = target.div_ceil(documents).max(cfg.min_chunks_per_doc as usize);
	let total = (quota * documents).min(cfg.max_total_chunks as usize);

	BalancePlan { documents, target, quota, total }
}

/// Groups chunks by document in first-seen order.
pub fn group_by_document(chunks: Vec<ChunkRecord>) -> Vec<(String, Vec<ChunkRecord>)> {
	let mut positions: HashMap<String, usize> = HashMap::new();
	let mut groups: Vec<(String, Vec<ChunkRecord>)> = Vec::new();

	for chunk in chunks {
		match positions.get(&chunk.document_id) {
			Some(&idx) => groups[idx].1.push(chunk),
			None => {
				positions.insert(chunk.document_id.clone(), groups.len());
				groups.push((chunk.document_id.clone(), vec![chunk]));
			},
		}
	}

	groups
}

/// Takes up to the per-document quota from each document, then truncates to the plan total.
pub fn select_balanced(chunks: Vec<ChunkRecord>, cfg: &Retrieval) -> (Vec<ChunkRecord>, BalancePlan) {
	let groups = group_by_document(chunks);
	let plan = plan(groups.len(), cfg);
	let mut selected = Vec::with_capacity(plan.total);

	for (_, group) in groups {
		selected.extend(group.into_iter().take(plan.quota));
	}

	selected.truncate(plan.total);

	(selected, plan)
}
