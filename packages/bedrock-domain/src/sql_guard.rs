use std::sync::LazyLock;

use regex::Regex;

pub const DISALLOWED_KEYWORDS: &[&str] =
	&["DROP", "DELETE", "INSERT", "UPDATE", "ALTER", "CREATE", "ATTACH"];

static DISALLOWED: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
	DISALLOWED_KEYWORDS
		.iter()
		.map(|keyword| {
			let re = Regex::new(&format!(r"\b{keyword}\b"))
				.expect("Disallowed keyword regex must compile.");

			(*keyword, re)
		})
		.collect()
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
	NotReadOnly,
	DisallowedKeyword(&'static str),
}
impl std::fmt::Display for Rejection {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::NotReadOnly => f.write_str(
				"Only SELECT queries are allowed. Do not use INSERT, UPDATE, DELETE, DROP, or ALTER.",
			),
			Self::DisallowedKeyword(keyword) =>
				write!(f, "Query contains disallowed keyword: {keyword}"),
		}
	}
}

/// Accepts a single `SELECT` or `WITH` statement that names none of the mutating verbs.
///
/// Keywords match on word boundaries, so a column such as `updated_at` passes.
pub fn check_read_only(statement: &str) -> Result<(), Rejection> {
	let normalized = statement.trim().to_uppercase();

	if !(normalized.starts_with("SELECT") || normalized.starts_with("WITH")) {
		return Err(Rejection::NotReadOnly);
	}

	if let Some((keyword, _)) = DISALLOWED.iter().find(|(_, re)| re.is_match(&normalized)) {
		return Err(Rejection::DisallowedKeyword(*keyword));
	}

	Ok(())
}
