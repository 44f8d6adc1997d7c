use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::Result;
use crate::io::{build_output_path, ensure_parent_dir};

/// Reserved token opening every tokenized sentence.
pub const START_TOKEN: &str = "<start>";

/// Reserved token closing every tokenized sentence.
pub const END_TOKEN: &str = "<end>";

/// Characters emitted as standalone tokens when punctuation is kept.
const PUNCTUATION: &[char] = &[
	'.', '!', '?', ',', ';', ':', '\'', '"', '(', ')', '[', ']', '{', '}', '…', '–', '—',
];

const TOKENS_SUFFIX: &str = "_tokens.txt";
const VOCABULARY_SUFFIX: &str = "_vocabulary.txt";

static WORD_PATTERN: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"[\p{L}\p{N}-]+").expect("word pattern is valid"));

/// Returns true for `<start>` and `<end>`.
pub fn is_boundary(token: &str) -> bool {
	token == START_TOKEN || token == END_TOKEN
}

/// Returns true if the token starts with a punctuation character.
///
/// Boundary markers are not punctuation.
pub fn is_punctuation(token: &str) -> bool {
	if is_boundary(token) {
		return false;
	}
	token.chars().next().is_some_and(|c| PUNCTUATION.contains(&c))
}

/// Joins tokens back into readable text.
///
/// Tokens are separated by one space, except that punctuation sticks to
/// the preceding token: `["кот", "спит", "."]` → `"кот спит."`.
pub fn join_tokens<S: AsRef<str>>(tokens: &[S]) -> String {
	let mut result = String::new();
	for (i, token) in tokens.iter().enumerate() {
		let token: &str = token.as_ref();
		if i > 0 && !is_punctuation(token) {
			result.push(' ');
		}
		result.push_str(token);
	}
	result
}

/// Tokenizer settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TokenizerConfig {
	/// Emit punctuation marks as separate tokens instead of dropping them.
	pub keep_punctuation: bool,
	/// Lower-case input before splitting.
	pub lowercase: bool,
}

impl Default for TokenizerConfig {
	fn default() -> Self {
		Self { keep_punctuation: true, lowercase: true }
	}
}

/// Splits text into word and punctuation tokens framed by boundary markers.
///
/// Tokens never contain whitespace, which keeps chain prefix keys
/// unambiguous.
#[derive(Clone, Debug, Default)]
pub struct Tokenizer {
	config: TokenizerConfig,
}

impl Tokenizer {
	pub fn new(config: TokenizerConfig) -> Self {
		Self { config }
	}

	pub fn config(&self) -> &TokenizerConfig {
		&self.config
	}

	/// Tokenizes one piece of text.
	///
	/// The result always starts with `<start>` and ends with `<end>`; empty
	/// text yields just the two markers. Marker text found in the input is
	/// discarded so it cannot be confused with real boundaries.
	pub fn tokenize(&self, text: &str) -> Vec<String> {
		let mut text = if self.config.lowercase { text.to_lowercase() } else { text.to_owned() };
		if text.contains(START_TOKEN) || text.contains(END_TOKEN) {
			text = text.replace(START_TOKEN, " ").replace(END_TOKEN, " ");
		}

		let words = if self.config.keep_punctuation {
			Self::split_with_punctuation(&text)
		} else {
			Self::split_words(&text)
		};

		let mut tokens = Vec::with_capacity(words.len() + 2);
		tokens.push(START_TOKEN.to_owned());
		tokens.extend(words);
		tokens.push(END_TOKEN.to_owned());
		tokens
	}

	/// Tokenizes each non-blank input.
	pub fn tokenize_sentences<S: AsRef<str>>(&self, sentences: &[S]) -> Vec<Vec<String>> {
		let mut tokenized = Vec::with_capacity(sentences.len());
		for sentence in sentences {
			let sentence: &str = sentence.as_ref();
			if !sentence.trim().is_empty() {
				tokenized.push(self.tokenize(sentence));
			}
		}
		tokenized
	}

	fn split_with_punctuation(text: &str) -> Vec<String> {
		let mut tokens = Vec::new();
		let mut word = String::new();

		for c in text.chars() {
			if c.is_alphanumeric() || c == '-' {
				word.push(c);
				continue;
			}
			Self::flush_word(&mut word, &mut tokens);
			if PUNCTUATION.contains(&c) {
				tokens.push(c.to_string());
			}
		}
		Self::flush_word(&mut word, &mut tokens);

		tokens
	}

	fn flush_word(word: &mut String, tokens: &mut Vec<String>) {
		if word.is_empty() || *word == "-" {
			word.clear();
			return;
		}
		tokens.push(std::mem::take(word));
	}

	fn split_words(text: &str) -> Vec<String> {
		WORD_PATTERN
			.find_iter(text)
			.map(|m| m.as_str())
			.filter(|word| *word != "-")
			.map(str::to_owned)
			.collect()
	}
}

/// Counts token occurrences across tokenized sentences.
pub fn vocabulary(tokenized_sentences: &[Vec<String>]) -> HashMap<String, usize> {
	let mut vocab = HashMap::new();
	for token in tokenized_sentences.iter().flatten() {
		*vocab.entry(token.clone()).or_insert(0) += 1;
	}
	vocab
}

/// Keeps the entries seen at least `min_frequency` times.
pub fn filter_by_frequency(vocab: &HashMap<String, usize>, min_frequency: usize) -> HashMap<String, usize> {
	vocab
		.iter()
		.filter(|(_, frequency)| **frequency >= min_frequency)
		.map(|(token, frequency)| (token.clone(), *frequency))
		.collect()
}

/// Content tokens by decreasing frequency, ties by token.
///
/// Boundary markers are left out.
pub fn sorted_by_frequency(vocab: &HashMap<String, usize>) -> Vec<(&str, usize)> {
	let mut frequencies: Vec<(&str, usize)> = vocab
		.iter()
		.filter(|(token, _)| !is_boundary(token))
		.map(|(token, frequency)| (token.as_str(), *frequency))
		.collect();
	frequencies.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
	frequencies
}

/// Writes `<base>_tokens.txt` (one numbered sentence per line) and
/// `<base>_vocabulary.txt` (`token -> frequency`, most frequent first).
pub fn save_tokenized<P: AsRef<Path>>(base: P, tokenized_sentences: &[Vec<String>]) -> Result<()> {
	let base = base.as_ref();

	let mut tokens = String::new();
	for (i, sentence) in tokenized_sentences.iter().enumerate() {
		let _ = writeln!(tokens, "{}: {}", i + 1, sentence.join(" "));
	}
	let vocab = vocabulary(tokenized_sentences);
	let mut frequencies = String::new();
	for (token, frequency) in sorted_by_frequency(&vocab) {
		let _ = writeln!(frequencies, "{token} -> {frequency}");
	}

	let tokens_path = build_output_path(base, TOKENS_SUFFIX);
	ensure_parent_dir(&tokens_path)?;
	fs::write(&tokens_path, tokens)?;
	fs::write(build_output_path(base, VOCABULARY_SUFFIX), frequencies)?;

	log::info!("Tokenized data saved under {}*", base.display());
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_tokenize_with_punctuation() {
		let tokenizer = Tokenizer::default();
		let tokens = tokenizer.tokenize("Кот, как ни странно, спит!");
		assert_eq!(
			tokens,
			vec!["<start>", "кот", ",", "как", "ни", "странно", ",", "спит", "!", "<end>"]
		);
	}

	#[test]
	fn test_tokenize_words_only() {
		let tokenizer = Tokenizer::new(TokenizerConfig { keep_punctuation: false, lowercase: true });
		let tokens = tokenizer.tokenize("Где-то - рядом, 42 кота.");
		assert_eq!(tokens, vec!["<start>", "где-то", "рядом", "42", "кота", "<end>"]);
	}

	#[test]
	fn test_tokenize_empty() {
		let tokenizer = Tokenizer::default();
		assert_eq!(tokenizer.tokenize("   "), vec![START_TOKEN, END_TOKEN]);
	}

	#[test]
	fn test_tokenize_discards_marker_text() {
		let tokenizer = Tokenizer::default();
		let tokens = tokenizer.tokenize("<start> start end <end>");
		assert_eq!(tokens, vec!["<start>", "start", "end", "<end>"]);
	}

	#[test]
	fn test_tokenize_sentences_skips_blank() {
		let tokenizer = Tokenizer::default();
		let tokenized = tokenizer.tokenize_sentences(&["a b", " ", "c"]);
		assert_eq!(tokenized.len(), 2);
	}

	#[test]
	fn test_join_tokens() {
		assert_eq!(join_tokens(&["кот", ",", "пёс", "спят", "."]), "кот, пёс спят.");
		assert_eq!(join_tokens::<&str>(&[]), "");
	}

	#[test]
	fn test_is_punctuation() {
		assert!(is_punctuation("."));
		assert!(is_punctuation("…"));
		assert!(!is_punctuation("кот"));
		assert!(!is_punctuation(START_TOKEN));
		assert!(!is_punctuation(""));
	}

	#[test]
	fn test_vocabulary_and_filter() {
		let tokenized = vec![
			vec!["a".to_owned(), "b".to_owned()],
			vec!["a".to_owned()],
		];
		let vocab = vocabulary(&tokenized);
		assert_eq!(vocab["a"], 2);
		assert_eq!(vocab["b"], 1);

		let filtered = filter_by_frequency(&vocab, 2);
		assert_eq!(filtered.len(), 1);
		assert!(filtered.contains_key("a"));
	}

	#[test]
	fn test_sorted_by_frequency_skips_boundaries() {
		let tokenized = Tokenizer::default().tokenize_sentences(&["пёс и кот", "кот"]);
		let vocab = vocabulary(&tokenized);
		assert_eq!(sorted_by_frequency(&vocab), vec![("кот", 2), ("и", 1), ("пёс", 1)]);
	}

	#[test]
	fn test_save_tokenized() {
		let tokenized = Tokenizer::default().tokenize_sentences(&["Кот спит.", "Кот ест"]);
		let dir = std::env::temp_dir().join(format!("markmach_tokenizer_{}", std::process::id()));
		let base = dir.join("nested").join("corpus");

		save_tokenized(&base, &tokenized).unwrap();
		let tokens = fs::read_to_string(dir.join("nested").join("corpus_tokens.txt")).unwrap();
		assert_eq!(tokens, "1: <start> кот спит . <end>\n2: <start> кот ест <end>\n");
		let frequencies = fs::read_to_string(dir.join("nested").join("corpus_vocabulary.txt")).unwrap();
		assert_eq!(frequencies, "кот -> 2\n. -> 1\nест -> 1\nспит -> 1\n");

		let _ = fs::remove_dir_all(&dir);
	}
}
