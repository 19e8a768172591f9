pub mod balance;
pub mod chunk;
pub mod confidence;
pub mod diversity;
pub mod fusion;
pub mod sanitize;
pub mod sql_guard;
pub mod style;

pub use chunk::{ChunkKey, ChunkRecord};
pub use confidence::Confidence;

use std::cmp::Ordering;

pub fn cmp_f32_desc(a: f32, b: f32) -> Ordering {
	match (a.is_nan(), b.is_nan()) {
		(true, true) => Ordering::Equal,
		(true, false) => Ordering::Greater,
		(false, true) => Ordering::Less,
		(false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
	}
}
