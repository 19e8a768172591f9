use serde::{Deserialize, Serialize};

const BRIEF_KEYWORDS: &[&str] =
	&["3 bullet points", "summarize", "brief", "short", "concise", "in short", "quick summary"];
const ANALYST_KEYWORDS: &[&str] = &[
	"recommend",
	"what should",
	"implications",
	"strategy",
	"strategic",
	"suggest",
	"advise",
	"action items",
	"what are the risks",
	"swot",
	"pros and cons",
	"trade-off",
	"tradeoff",
	"evaluate",
	"assessment",
	"analysis",
	"analyze",
	"analyse",
	"what can we learn",
	"what does this mean",
	"insights",
	"common trend",
	"common themes",
	"compare",
	"comparison",
	"contrast",
	"gaps",
	"opportunities",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerStyle {
	Brief,
	Analyst,
	Detailed,
}

/// Brief keywords win over analyst keywords; anything else gets a detailed answer.
pub fn detect(question: &str) -> AnswerStyle {
	let lowered = question.to_lowercase();

	if BRIEF_KEYWORDS.iter().any(|keyword| lowered.contains(keyword)) {
		return AnswerStyle::Brief;
	}
	if ANALYST_KEYWORDS.iter().any(|keyword| lowered.contains(keyword)) {
		return AnswerStyle::Analyst;
	}

	AnswerStyle::Detailed
}
