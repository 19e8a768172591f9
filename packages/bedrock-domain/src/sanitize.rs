//! Cleanup of raw model output before it is parsed as JSON.

use std::sync::LazyLock;

use regex::Regex;

static REASONING_RE: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"(?s)<think>.*?</think>").expect("Reasoning pattern must compile.")
});
static CODE_FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"(?s)```(?:json|JSON)?\s*\n?(.*?)\n?\s*```").expect("Fence pattern must compile.")
});
static EXCESSIVE_NEWLINES_RE: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"\n{3,}").expect("Newline pattern must compile."));

const SPACE_LIKE: &[char] = &[
	'\u{00a0}', '\u{2009}', '\u{200a}', '\u{202f}', '\u{00ad}', '\u{2002}', '\u{2003}', '\u{2004}',
	'\u{2005}', '\u{2006}', '\u{2007}', '\u{2008}',
];
const ZERO_WIDTH: &[char] = &['\u{200b}', '\u{200c}', '\u{200d}', '\u{feff}', '\u{2060}', '\u{180e}'];

pub fn strip_reasoning(raw: &str) -> String {
	REASONING_RE.replace_all(raw, "").trim().to_string()
}

/// Reduces raw output to the text most likely to parse as JSON.
///
/// Removes reasoning markup and the first markdown fence, maps exotic spaces to plain spaces,
/// drops zero-width characters, normalizes line endings and finally cuts out the outermost
/// object or array.
pub fn sanitize_json(raw: &str) -> String {
	let without_reasoning = strip_reasoning(raw);

	if without_reasoning.is_empty() {
		return without_reasoning;
	}

	let unfenced = match CODE_FENCE_RE.captures(&without_reasoning).and_then(|caps| caps.get(1)) {
		Some(body) => body.as_str().to_string(),
		None => without_reasoning,
	};
	let mut text = String::with_capacity(unfenced.len());

	for ch in unfenced.chars() {
		if SPACE_LIKE.contains(&ch) {
			text.push(' ');
		} else if !ZERO_WIDTH.contains(&ch) {
			text.push(ch);
		}
	}

	let text = text.replace("\r\n", "\n").replace('\r', "\n");

	extract_json_block(text.trim()).to_string()
}

/// Returns the outermost `{...}` or `[...]` in `text`, matched by bracket depth outside of
/// string literals. Text without an opening bracket is returned unchanged; an unbalanced block
/// runs to the end of the input.
pub fn extract_json_block(text: &str) -> &str {
	let Some((start, open)) = text.char_indices().find(|(_, ch)| *ch == '{' || *ch == '[') else {
		return text;
	};
	let close = if open == '{' { '}' } else { ']' };
	let mut depth = 0_usize;
	let mut in_string = false;
	let mut escaped = false;

	for (offset, ch) in text[start..].char_indices() {
		if escaped {
			escaped = false;

			continue;
		}

		match ch {
			'\\' if in_string => escaped = true,
			'"' => in_string = !in_string,
			_ if in_string => {},
			c if c == open => depth += 1,
			c if c == close => {
				depth = depth.saturating_sub(1);

				if depth == 0 {
					return &text[start..start + offset + ch.len_utf8()];
				}
			},
			_ => {},
		}
	}

	&text[start..]
}

/// Repairs escape sequences that survive double encoding and collapses runs of blank lines.
pub fn normalize_answer(text: &str) -> String {
	if text.is_empty() {
		return String::new();
	}

	let placeholder = "\u{0}BSLASH\u{0}";
	let repaired = text
		.replace("\\\\", placeholder)
		.replace("\\n", "\n")
		.replace("\\t", "\t")
		.replace("\\\"", "\"")
		.replace("\\/", "/")
		.replace(placeholder, "\\");

	EXCESSIVE_NEWLINES_RE.replace_all(&repaired, "\n\n").into_owned()
}
