use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::Result;
use crate::io::{build_output_path, ensure_parent_dir, read_file, read_lines};

static HTML_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid pattern"));
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid pattern"));
static NOISE: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"[^\p{L}\p{N}\p{P}\s]").expect("valid pattern"));
static TERMINAL_SPACING: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"\s*([.!?…])\s*").expect("valid pattern"));
static BLANK_LINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n\s*\n").expect("valid pattern"));
static LINE_BREAKS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*\n\s*").expect("valid pattern"));

/// Abbreviations whose final period does not end a sentence.
const ABBREVIATIONS: &[&str] = &["т.д.", "т.п.", "др.", "пр.", "см.", "рис.", "стр."];

/// Sentences of at most this many characters are dropped.
const MIN_SENTENCE_CHARS: usize = 10;

/// Blank-line paragraphs of at most this many characters are dropped.
const MIN_PARAGRAPH_CHARS: usize = 20;

const SENTENCES_SUFFIX: &str = "_sentences.txt";
const PARAGRAPHS_SUFFIX: &str = "_paragraphs.txt";
const CLEANED_SUFFIX: &str = "_cleaned.txt";

/// A document split into training units.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedCorpus {
	/// Cleaned text on a single line.
	pub raw_text: String,
	pub sentences: Vec<String>,
	pub paragraphs: Vec<String>,
}

/// Splits raw documents into cleaned text, sentences and paragraphs.
#[derive(Clone, Copy, Debug, Default)]
pub struct CorpusParser;

impl CorpusParser {
	pub fn new() -> Self {
		Self
	}

	/// Reads and parses a text file.
	///
	/// # Errors
	/// Returns `Io` if the file cannot be read.
	pub fn parse_file<P: AsRef<Path>>(&self, path: P) -> Result<ParsedCorpus> {
		let path = path.as_ref();
		let content = read_file(path)?;
		let corpus = self.parse_text(&content);
		log::info!(
			"Parsed {}: {} sentences, {} paragraphs",
			path.display(),
			corpus.sentences.len(),
			corpus.paragraphs.len()
		);
		Ok(corpus)
	}

	/// Parses an in-memory document.
	///
	/// Sentences come from the cleaned text, paragraphs from the original
	/// layout (blank lines separate them).
	pub fn parse_text(&self, content: &str) -> ParsedCorpus {
		let raw_text = clean_text(content);
		let sentences = split_sentences(&raw_text);
		let paragraphs = split_paragraphs(content);
		ParsedCorpus { raw_text, sentences, paragraphs }
	}
}

/// Removes markup and symbols, and flattens whitespace.
///
/// Only letters, digits, punctuation and whitespace survive.
pub fn clean_text(text: &str) -> String {
	let text = HTML_TAG.replace_all(text, "");
	let text = NOISE.replace_all(&text, "");
	let text = WHITESPACE.replace_all(&text, " ");
	text.trim().to_owned()
}

/// Splits cleaned text at `.`, `!`, `?` and `…`.
///
/// A terminal mark ends a sentence when it is followed by whitespace, an
/// uppercase letter or the end of the text, unless it closes an
/// abbreviation. Sentences of at most 10 characters are dropped.
pub fn split_sentences(text: &str) -> Vec<String> {
	let text = TERMINAL_SPACING.replace_all(text, "$1 ");
	let chars: Vec<char> = text.trim().chars().collect();

	let mut sentences = Vec::new();
	let mut current = String::new();
	for (i, &c) in chars.iter().enumerate() {
		current.push(c);
		if !matches!(c, '.' | '!' | '?' | '…') {
			continue;
		}
		let at_boundary = chars.get(i + 1).is_none_or(|next| next.is_whitespace() || next.is_uppercase());
		if at_boundary && !(c == '.' && ends_with_abbreviation(&current)) {
			push_sentence(&mut sentences, &mut current);
		}
	}
	push_sentence(&mut sentences, &mut current);

	sentences
}

/// True if the last word is a known abbreviation or a single letter
/// followed by a period (`т. д.` once spaced, initials).
fn ends_with_abbreviation(text: &str) -> bool {
	let Some(word) = text.split_whitespace().last() else {
		return false;
	};
	let word = word.trim_start_matches(|c: char| !c.is_alphanumeric()).to_lowercase();
	if ABBREVIATIONS.contains(&word.as_str()) {
		return true;
	}
	let mut chars = word.chars();
	matches!((chars.next(), chars.next(), chars.next()), (Some(letter), Some('.'), None) if letter.is_alphabetic())
}

fn push_sentence(sentences: &mut Vec<String>, current: &mut String) {
	let sentence = current.trim();
	if sentence.chars().count() > MIN_SENTENCE_CHARS {
		sentences.push(sentence.to_owned());
	}
	current.clear();
}

/// Splits a document into paragraphs separated by blank lines.
///
/// Lines inside a paragraph are joined with spaces. Paragraphs of at most
/// 20 characters are dropped, unless that leaves a single paragraph or
/// none, in which case every blank-line block is kept.
pub fn split_paragraphs(text: &str) -> Vec<String> {
	let blocks: Vec<String> = BLANK_LINE
		.split(&text.replace("\r\n", "\n"))
		.map(|block| LINE_BREAKS.replace_all(block.trim(), " ").into_owned())
		.filter(|block| !block.is_empty())
		.collect();

	let paragraphs: Vec<String> = blocks
		.iter()
		.filter(|block| block.chars().count() > MIN_PARAGRAPH_CHARS)
		.cloned()
		.collect();

	if paragraphs.len() <= 1 { blocks } else { paragraphs }
}

impl ParsedCorpus {
	/// Writes `<base>_sentences.txt`, `<base>_paragraphs.txt` and
	/// `<base>_cleaned.txt`.
	pub fn save<P: AsRef<Path>>(&self, base: P) -> Result<()> {
		let base = base.as_ref();

		let mut sentences = String::new();
		for (i, sentence) in self.sentences.iter().enumerate() {
			let _ = writeln!(sentences, "{}: {sentence}", i + 1);
		}
		let mut paragraphs = String::new();
		for (i, paragraph) in self.paragraphs.iter().enumerate() {
			let _ = write!(paragraphs, "=== Paragraph {} ===\n{paragraph}\n\n", i + 1);
		}

		let sentences_path = build_output_path(base, SENTENCES_SUFFIX);
		ensure_parent_dir(&sentences_path)?;
		fs::write(&sentences_path, sentences)?;
		fs::write(build_output_path(base, PARAGRAPHS_SUFFIX), paragraphs)?;
		fs::write(build_output_path(base, CLEANED_SUFFIX), &self.raw_text)?;

		log::info!("Parsed corpus saved under {}*", base.display());
		Ok(())
	}

	/// Reads back the files written by `save`.
	///
	/// # Errors
	/// Returns `Io` if one of the three files is missing.
	pub fn load<P: AsRef<Path>>(base: P) -> Result<Self> {
		let base = base.as_ref();
		let raw_text = read_file(build_output_path(base, CLEANED_SUFFIX))?;

		let sentences = read_lines(build_output_path(base, SENTENCES_SUFFIX))?
			.iter()
			.filter_map(|line| line.trim().split_once(": "))
			.map(|(_, sentence)| sentence.to_owned())
			.collect();

		let paragraphs = read_file(build_output_path(base, PARAGRAPHS_SUFFIX))?
			.split("\n\n")
			.filter_map(|section| {
				let mut lines = section.trim().lines();
				lines.next()?;
				let body: Vec<&str> = lines.collect();
				(!body.is_empty()).then(|| body.join(" "))
			})
			.collect();

		Ok(Self { raw_text, sentences, paragraphs })
	}
}
