use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::chain::MarkovChain;
use super::distribution::Distribution;
use super::entropy::TokenEntropy;
use super::generator_config::GeneratorConfig;
use crate::text::format::format_answer;
use crate::text::tokenizer::{is_boundary, is_punctuation, join_tokens, Tokenizer, TokenizerConfig, END_TOKEN};

/// Answer returned when the question carries no usable keyword.
pub const NO_KEYWORDS_MESSAGE: &str = "Пожалуйста, задайте вопрос.";

/// Answer returned when no learned sentence matches the question.
pub const NO_MATCH_MESSAGE: &str =
	"К сожалению, я не нашел информации по вашему вопросу в изученном материале.";

/// Question words and auxiliaries that never make a keyword.
const STOP_WORDS: &[&str] = &[
	"что", "как", "зачем", "почему", "где", "когда", "какой", "какая", "какое", "какие", "объясни",
	"расскажи", "пожалуйста", "мог", "бы", "ли", "what", "how", "why", "where", "when", "which",
	"who", "is", "are", "do", "does", "did", "can", "could", "would", "please", "tell", "explain",
];

/// Number of thematic tokens logged when a generator starts.
const REPORTED_THEMATIC_TOKENS: usize = 15;

/// Added to an entropy before inverting it in start-position scores.
const ENTROPY_SMOOTHING: f64 = 0.1;

/// Start-position score of a keyword with no known entropy.
const UNKNOWN_KEYWORD_SCORE: f64 = 0.5;

/// Thematic successors are boosted by `BIAS_CEILING - entropy`.
const BIAS_CEILING: f64 = 3.0;

/// Boost applied to non-thematic keyword successors.
const KEYWORD_BIAS: f64 = 1.5;

/// Answers questions by rewriting the most relevant learned sentence.
///
/// # Responsibilities
/// - Extract keywords from the question and keep the thematic ones
/// - Retrieve candidate sentences and select the best match
/// - Locate the most thematic known prefix inside that sentence
/// - Continue the text with a keyword-biased walk over the chain
///
/// # Notes
/// - The chain is shared read-only; the generator owns its random source.
/// - Entropies are computed once, at construction.
/// - `generate_answer` never fails: fallbacks are fixed messages.
pub struct AnswerGenerator<R = StdRng> {
	chain: Arc<MarkovChain>,
	tokenizer: Tokenizer,
	entropy: TokenEntropy,
	config: GeneratorConfig,
	rng: R,
}

impl AnswerGenerator<StdRng> {
	/// Creates a generator seeded from the operating system.
	pub fn new(chain: Arc<MarkovChain>, config: GeneratorConfig) -> Self {
		Self::with_rng(chain, config, StdRng::from_os_rng())
	}

	/// Creates a generator with a fixed seed, for reproducible answers.
	pub fn with_seed(chain: Arc<MarkovChain>, config: GeneratorConfig, seed: u64) -> Self {
		Self::with_rng(chain, config, StdRng::seed_from_u64(seed))
	}
}

impl<R: Rng> AnswerGenerator<R> {
	/// Creates a generator drawing from `rng`.
	///
	/// Analyzes the token entropy of `chain` with the configured threshold.
	pub fn with_rng(chain: Arc<MarkovChain>, config: GeneratorConfig, rng: R) -> Self {
		let entropy = TokenEntropy::analyze(&chain, config.thematic_threshold());
		let tokenizer = Tokenizer::new(TokenizerConfig {
			keep_punctuation: config.keep_punctuation,
			lowercase: true,
		});

		let top = entropy.most_thematic(REPORTED_THEMATIC_TOKENS);
		if !top.is_empty() {
			let listing: Vec<String> = top
				.iter()
				.map(|(token, entropy)| format!("{token} ({entropy:.3})"))
				.collect();
			log::info!("Most thematic tokens: {}", listing.join(", "));
		}

		Self { chain, tokenizer, entropy, config, rng }
	}

	pub fn chain(&self) -> &MarkovChain {
		&self.chain
	}

	pub fn entropy(&self) -> &TokenEntropy {
		&self.entropy
	}

	pub fn config(&self) -> &GeneratorConfig {
		&self.config
	}

	/// Answers a free-form question.
	///
	/// Returns `NO_KEYWORDS_MESSAGE` when the question has no keyword and
	/// `NO_MATCH_MESSAGE` when no learned sentence contains any of them.
	pub fn generate_answer(&mut self, question: &str) -> String {
		let keywords = self.extract_keywords(question);
		if keywords.is_empty() {
			return NO_KEYWORDS_MESSAGE.to_owned();
		}

		let thematic = self.entropy.thematic(&keywords);
		let search_keywords: Vec<String> = if thematic.is_empty() {
			keywords.clone()
		} else {
			log::debug!("Thematic keywords: {thematic:?}");
			thematic.into_iter().map(str::to_owned).collect()
		};

		let best = {
			let candidates = self.chain.search(&search_keywords, self.config.search_limit);
			if candidates.is_empty() {
				log::debug!("No sentence matches {search_keywords:?}");
				return NO_MATCH_MESSAGE.to_owned();
			}
			self.best_sentence(&candidates, &search_keywords).to_owned()
		};
		log::debug!("Best sentence: {best}");

		let answer = self.generate_from_sentence(&best, &search_keywords);
		format_answer(&answer)
	}

	/// Content tokens of the question usable as search keywords.
	///
	/// Stop words, punctuation and single-character tokens are dropped;
	/// duplicates keep their first occurrence.
	pub fn extract_keywords(&self, question: &str) -> Vec<String> {
		let mut keywords: Vec<String> = Vec::new();
		for token in self.tokenizer.tokenize(question) {
			if is_boundary(&token)
				|| is_punctuation(&token)
				|| token.chars().count() <= 1
				|| STOP_WORDS.contains(&token.as_str())
				|| keywords.contains(&token)
			{
				continue;
			}
			keywords.push(token);
		}
		keywords
	}

	/// Candidate containing the most distinct keywords, first one on ties.
	fn best_sentence<'a>(&self, candidates: &[&'a str], keywords: &[String]) -> &'a str {
		let mut best: Option<(&'a str, usize)> = None;
		for candidate in candidates {
			let tokens = self.tokenizer.tokenize(candidate);
			let score = keywords.iter().filter(|keyword| tokens.contains(keyword)).count();
			if best.is_none_or(|(_, best_score)| score > best_score) {
				best = Some((*candidate, score));
			}
		}
		best.map_or("", |(sentence, _)| sentence)
	}

	fn generate_from_sentence(&mut self, sentence: &str, keywords: &[String]) -> String {
		let tokens: Vec<String> = self
			.tokenizer
			.tokenize(sentence)
			.into_iter()
			.filter(|token| !is_boundary(token))
			.collect();
		if tokens.is_empty() {
			return sentence.to_owned();
		}

		let start = self.find_start_position(&tokens, keywords);
		log::debug!("Starting continuation at token {start} of {}", tokens.len());

		let result = self.continue_thematically(&tokens, start, keywords);
		join_tokens(&result)
	}

	/// Index of the known prefix window with the highest keyword score.
	///
	/// Keywords weigh `1 / (entropy + 0.1)` (0.5 when the entropy is
	/// unknown). The earliest window wins ties; 0 when no window is a known
	/// prefix.
	fn find_start_position(&self, tokens: &[String], keywords: &[String]) -> usize {
		let width = self.chain.order() - 1;
		if tokens.len() < width {
			return 0;
		}

		let mut best: Option<(usize, f64)> = None;
		for (position, window) in tokens.windows(width).enumerate() {
			if !self.chain.contains_prefix(window) {
				continue;
			}
			let score: f64 = window
				.iter()
				.filter(|token| keywords.contains(token))
				.map(|token| match self.entropy.get(token) {
					Some(entropy) => 1.0 / (entropy + ENTROPY_SMOOTHING),
					None => UNKNOWN_KEYWORD_SCORE,
				})
				.sum();
			if best.is_none_or(|(_, best_score)| score > best_score) {
				best = Some((position, score));
			}
		}
		best.map_or(0, |(position, _)| position)
	}

	/// Rewrites `tokens` from `start` with a keyword-biased chain walk.
	///
	/// The source tokens before `start` are kept verbatim. Whenever the
	/// chain has no successor for the current context, the next source
	/// token is copied instead and counts as a stall.
	fn continue_thematically(&mut self, tokens: &[String], start: usize, keywords: &[String]) -> Vec<String> {
		let width = self.chain.order() - 1;
		let max_length = self.config.max_length;

		let mut result: Vec<String> = tokens[..start].to_vec();
		let mut cursor = start;
		let mut stalls = 0;

		while result.len() < max_length && cursor < tokens.len() && stalls < self.config.max_stalls {
			let context: Vec<&str> = if result.len() >= width {
				result[result.len() - width..].iter().map(String::as_str).collect()
			} else {
				let from = cursor.saturating_sub(width - result.len());
				tokens[from..cursor].iter().chain(&result).map(String::as_str).collect()
			};

			let next = match self.chain.next_tokens(&context) {
				Some(distribution) => self.select_token(distribution, keywords),
				None => None,
			};

			match next {
				Some(token) if token == END_TOKEN => break,
				Some(token) => {
					result.push(token);
					stalls = 0;
				}
				None => {
					result.push(tokens[cursor].clone());
					cursor += 1;
					stalls += 1;
				}
			}
		}

		if result.len() < max_length / 2 && cursor < tokens.len() {
			let remaining = (max_length - result.len()).min(tokens.len() - cursor);
			result.extend_from_slice(&tokens[cursor..cursor + remaining]);
		}
		result.truncate(max_length);
		result
	}

	/// Boosts the search keywords of a successor distribution.
	///
	/// A keyword whose entropy is below the thematic threshold is multiplied
	/// by `3 - entropy`, any other keyword by 1.5. The result is normalized.
	fn bias(&self, distribution: Distribution, keywords: &[String]) -> Distribution {
		let threshold = self.entropy.threshold();
		distribution
			.reweight(|token, _| {
				if !keywords.iter().any(|keyword| keyword == token) {
					return 1.0;
				}
				match self.entropy.get(token) {
					Some(e) if e < threshold => BIAS_CEILING - e,
					_ => KEYWORD_BIAS,
				}
			})
			.normalize()
	}

	/// Samples a successor after boosting the search keywords.
	fn select_token(&mut self, distribution: Distribution, keywords: &[String]) -> Option<String> {
		let biased = self.bias(distribution, keywords);
		let r: f64 = self.rng.random();
		biased.sample(r).map(str::to_owned)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::model::builder::train;

	fn generator(order: usize, sentences: &[&str], config: GeneratorConfig) -> AnswerGenerator {
		let tokenized = Tokenizer::default().tokenize_sentences(sentences);
		let chain = train(order, &tokenized).unwrap();
		AnswerGenerator::with_seed(Arc::new(chain), config, 7)
	}

	fn keywords(raw: &[&str]) -> Vec<String> {
		raw.iter().map(|keyword| (*keyword).to_owned()).collect()
	}

	#[test]
	fn test_extract_keywords() {
		let generator = generator(3, &["Кот спит дома."], GeneratorConfig::default());
		assert_eq!(
			generator.extract_keywords("Почему кот, а не пёс, спит? Кот!"),
			vec!["кот", "не", "пёс", "спит"]
		);
		assert!(generator.extract_keywords("Что? Как? а").is_empty());
		assert_eq!(generator.extract_keywords("What does the cat eat"), vec!["the", "cat", "eat"]);
	}

	#[test]
	fn test_single_cyrillic_letters_are_not_keywords() {
		let generator = generator(3, &["Кот спит дома."], GeneratorConfig::default());
		assert_eq!(generator.extract_keywords("я живу в доме"), vec!["живу", "доме"]);
		assert_eq!(generator.extract_keywords("кот и я"), vec!["кот"]);
	}

	#[test]
	fn test_fallback_messages() {
		let mut generator = generator(3, &["Кот спит дома."], GeneratorConfig::default());
		assert_eq!(generator.generate_answer(""), NO_KEYWORDS_MESSAGE);
		assert_eq!(generator.generate_answer("Как? Почему?"), "Пожалуйста, задайте вопрос.");
		assert_eq!(generator.generate_answer("Где жираф?"), NO_MATCH_MESSAGE);
	}

	#[test]
	fn test_best_sentence_counts_distinct_keywords() {
		let generator = generator(3, &["Кот спит дома."], GeneratorConfig::default());
		let candidates = ["кот ест.", "кот спит, кот ест.", "кот спит."];
		let best = generator.best_sentence(&candidates, &keywords(&["кот", "спит"]));
		assert_eq!(best, "кот спит, кот ест.");
	}

	#[test]
	fn test_start_position_prefers_keywords() {
		let generator = generator(3, &["Мой старый кот спит дома."], GeneratorConfig::default());
		let tokens = keywords(&["мой", "старый", "кот", "спит", "дома", "."]);
		assert_eq!(generator.find_start_position(&tokens, &keywords(&["спит"])), 2);
		assert_eq!(generator.find_start_position(&tokens, &keywords(&["жираф"])), 0);
	}

	#[test]
	fn test_start_position_skips_unknown_windows() {
		let generator = generator(3, &["Кот спит."], GeneratorConfig::default());
		let tokens = keywords(&["пёс", "лает", "кот", "спит"]);
		assert_eq!(generator.find_start_position(&tokens, &keywords(&["лает"])), 2);
		assert_eq!(generator.find_start_position(&keywords(&["пёс"]), &keywords(&["пёс"])), 0);
	}

	#[test]
	fn test_sentence_without_transitions_is_copied() {
		// Order 6 leaves the chain empty: every step stalls on the source
		let mut generator = generator(6, &["Кот спит."], GeneratorConfig::default());
		assert!(generator.chain().is_empty());
		assert_eq!(generator.generate_answer("кот"), "Кот спит.");
	}

	#[test]
	fn test_answer_is_capped_at_max_length() {
		let mut config = GeneratorConfig::default();
		config.max_length = 3;
		let mut generator = generator(
			2,
			&["Кот спит и кот ест и кот пьёт и кот играет весь день."],
			config,
		);
		for _ in 0..20 {
			let answer = generator.generate_answer("кот");
			assert!(answer.split_whitespace().count() <= 3, "{answer}");
		}
	}

	#[test]
	fn test_stalls_end_continuation() {
		let mut config = GeneratorConfig::default();
		config.max_length = 2;
		config.max_stalls = 1;
		let mut generator = generator(6, &["Кот спит на диване."], config);
		assert_eq!(generator.generate_answer("диване"), "Кот.");
	}

	fn weights(distribution: &Distribution) -> Vec<(&str, f64)> {
		distribution.iter().collect()
	}

	fn assert_weights(actual: Vec<(&str, f64)>, expected: &[(&str, f64)]) {
		assert_eq!(actual.len(), expected.len(), "{actual:?}");
		for ((token, weight), (expected_token, expected_weight)) in actual.iter().zip(expected) {
			assert_eq!(token, expected_token);
			assert!((weight - expected_weight).abs() < 1e-9, "{actual:?}");
		}
	}

	#[test]
	fn test_thematic_keyword_is_boosted_by_its_entropy() {
		let generator = generator(2, &["a x", "a y"], GeneratorConfig::default());
		// x follows "a" once and precedes "<end>" once
		assert_eq!(generator.entropy().get("x"), Some(1.0));

		let distribution = generator.chain().next_tokens(&["a"]).unwrap();
		let biased = generator.bias(distribution, &keywords(&["x"]));
		assert_weights(weights(&biased), &[("x", 2.0 / 3.0), ("y", 1.0 / 3.0)]);
	}

	#[test]
	fn test_non_thematic_keyword_gets_fixed_boost() {
		let mut config = GeneratorConfig::default();
		config.set_thematic_threshold(1.0).unwrap();
		let generator = generator(2, &["a x", "a y"], config);
		assert!(!generator.entropy().is_thematic("x"));

		let distribution = generator.chain().next_tokens(&["a"]).unwrap();
		let biased = generator.bias(distribution, &keywords(&["x"]));
		assert_weights(weights(&biased), &[("x", 0.6), ("y", 0.4)]);
	}

	#[test]
	fn test_non_keywords_keep_their_weight() {
		let generator = generator(2, &["a x", "a y"], GeneratorConfig::default());
		let distribution = generator.chain().next_tokens(&["a"]).unwrap();
		let biased = generator.bias(distribution, &keywords(&["z"]));
		assert_weights(weights(&biased), &[("x", 0.5), ("y", 0.5)]);
	}

	#[test]
	fn test_short_output_is_filled_from_the_source() {
		let corpus = ["Кот сидит на окне.", "Кот любит молоко.", "Мой кот спит на диване."];
		let tokens = keywords(&["кот", "сидит", "на", "окне", "."]);

		// Two stalls consume "кот" and "сидит"; the chain then reaches <end>
		// after 5 tokens, under half of 12, so the unread source is appended
		let mut config = GeneratorConfig::default();
		config.max_length = 12;
		let mut filled = generator(3, &corpus, config);
		assert_eq!(
			filled.continue_thematically(&tokens, 0, &keywords(&["кот"])),
			keywords(&["кот", "сидит", "на", "окне", ".", "на", "окне", "."])
		);

		// 5 tokens is not under half of 10: no fill
		let mut config = GeneratorConfig::default();
		config.max_length = 10;
		let mut unfilled = generator(3, &corpus, config);
		assert_eq!(unfilled.continue_thematically(&tokens, 0, &keywords(&["кот"])), tokens);
	}
}
