use std::sync::LazyLock;

use regex::Regex;

use super::tokenizer::{END_TOKEN, START_TOKEN};

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid pattern"));
static COMMA: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*,\s*").expect("valid pattern"));
static PERIOD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*\.\s*").expect("valid pattern"));

/// Normalizes generated text into a presentable sentence.
///
/// - Removes boundary marker text
/// - Collapses whitespace runs to a single space
/// - Commas and periods get no space before and one space after
/// - Capitalizes the first character
/// - Appends `.` unless the text already ends with `.`, `!` or `?`
///
/// Empty input stays empty.
pub fn format_answer(answer: &str) -> String {
	let answer = answer.replace(START_TOKEN, "").replace(END_TOKEN, "");
	let answer = WHITESPACE.replace_all(answer.trim(), " ");
	let answer = COMMA.replace_all(&answer, ", ");
	let answer = PERIOD.replace_all(&answer, ". ");
	let answer = answer.trim();

	let mut chars = answer.chars();
	let Some(first) = chars.next() else {
		return String::new();
	};

	let mut formatted: String = first.to_uppercase().collect();
	formatted.push_str(chars.as_str());

	if !formatted.ends_with(['.', '!', '?']) {
		formatted.push('.');
	}
	formatted
}
