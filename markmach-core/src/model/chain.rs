use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::distribution::Distribution;
use super::index::SentenceIndex;
use super::state::State;
use crate::error::{Error, Result};
use crate::io::{ensure_parent_dir, SnapshotFormat};
use crate::text::tokenizer::{is_boundary, join_tokens};

/// Serializes a prefix as its canonical key: `["a", "b"]` → `"[a b]"`.
///
/// Tokens must not contain spaces, otherwise keys become ambiguous.
pub fn prefix_key<S: AsRef<str>>(tokens: &[S]) -> String {
	let mut key = String::from("[");
	for (i, token) in tokens.iter().enumerate() {
		if i > 0 {
			key.push(' ');
		}
		key.push_str(token.as_ref());
	}
	key.push(']');
	key
}

/// Splits a prefix key back into its tokens: `"[a b]"` → `["a", "b"]`.
///
/// Exactly one bracket is removed on each side, so bracket tokens
/// (`"[[ x]"` → `["[", "x"]`) survive.
pub fn parse_prefix(key: &str) -> Vec<&str> {
	let inner = key.strip_prefix('[').unwrap_or(key);
	let inner = inner.strip_suffix(']').unwrap_or(inner);
	inner.split(' ').filter(|token| !token.is_empty()).collect()
}

/// Order-N Markov chain over tokens with its retrieval structures.
///
/// # Responsibilities
/// - Count `prefix -> successor` transitions (prefix of `order - 1` tokens)
/// - Cache the total number of transitions per prefix
/// - Index readable sentences by the tokens they contain
/// - Count token frequencies
/// - Persist and reload itself as a snapshot
///
/// # Invariants
/// - `order` is always >= 2
/// - Every state has at least one transition
/// - `sums[p] == chain[p].total()` for every prefix once training is done
/// - Boundary markers are never indexed nor counted in `vocab`
///
/// The field names are the snapshot layout.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct MarkovChain {
	/// Order of the chain (tokens per n-gram).
	order: usize,

	/// Prefix key → successor counts.
	chain: HashMap<String, State>,

	/// Prefix key → total number of transitions.
	sums: HashMap<String, usize>,

	/// Token → sentences containing it.
	index: SentenceIndex,

	/// Token → number of occurrences in the corpus.
	vocab: HashMap<String, usize>,
}

/// Summary figures about a trained chain.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct ChainStats {
	pub order: usize,
	pub prefixes: usize,
	pub vocabulary_size: usize,
	pub index_size: usize,
	pub total_transitions: usize,
	pub avg_transitions_per_prefix: f64,
}

impl fmt::Display for ChainStats {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		writeln!(f, "order: {}", self.order)?;
		writeln!(f, "prefixes: {}", self.prefixes)?;
		writeln!(f, "vocabulary_size: {}", self.vocabulary_size)?;
		writeln!(f, "index_size: {}", self.index_size)?;
		writeln!(f, "total_transitions: {}", self.total_transitions)?;
		write!(f, "avg_transitions_per_prefix: {:.3}", self.avg_transitions_per_prefix)
	}
}

impl MarkovChain {
	/// Creates an empty chain of order `order`.
	///
	/// # Errors
	/// Returns `InvalidOrder` if `order < 2`.
	pub fn new(order: usize) -> Result<Self> {
		if order < 2 {
			return Err(Error::InvalidOrder(order));
		}
		Ok(Self {
			order,
			chain: HashMap::new(),
			sums: HashMap::new(),
			index: SentenceIndex::new(),
			vocab: HashMap::new(),
		})
	}

	pub fn order(&self) -> usize {
		self.order
	}

	/// Number of known prefixes.
	pub fn len(&self) -> usize {
		self.chain.len()
	}

	pub fn is_empty(&self) -> bool {
		self.chain.is_empty()
	}

	pub fn vocab(&self) -> &HashMap<String, usize> {
		&self.vocab
	}

	pub fn index(&self) -> &SentenceIndex {
		&self.index
	}

	/// Iterates over `(prefix key, state)` pairs in no particular order.
	pub fn states(&self) -> impl Iterator<Item = (&str, &State)> {
		self.chain.iter().map(|(key, state)| (key.as_str(), state))
	}

	/// Cached transition total of a prefix key.
	pub fn sum(&self, key: &str) -> Option<usize> {
		self.sums.get(key).copied()
	}

	/// Returns true if the token tuple is a known prefix.
	pub fn contains_prefix<S: AsRef<str>>(&self, prefix: &[S]) -> bool {
		self.chain.contains_key(&prefix_key(prefix))
	}

	/// Successor probabilities for a prefix.
	///
	/// Returns `None` if the prefix is unknown.
	pub fn next_tokens<S: AsRef<str>>(&self, prefix: &[S]) -> Option<Distribution> {
		let key = prefix_key(prefix);
		let state = self.chain.get(&key)?;
		let total = self.sums.get(&key).copied().unwrap_or_else(|| state.total());
		state.distribution(total)
	}

	/// Sentences best matching the keywords (see `SentenceIndex::search`).
	pub fn search<S: AsRef<str>>(&self, keywords: &[S], limit: usize) -> Vec<&str> {
		self.index.search(keywords, limit)
	}

	/// Adds one tokenized sentence (boundary markers included).
	///
	/// # Notes
	/// - The readable sentence is indexed under each of its content tokens.
	/// - Sentences shorter than `order` are indexed but add no transitions.
	/// - `finalize` must run once all sentences are added.
	pub(crate) fn add_sentence(&mut self, tokens: &[String]) {
		let content: Vec<&str> = tokens
			.iter()
			.map(String::as_str)
			.filter(|token| !is_boundary(token))
			.collect();
		let sentence = join_tokens(&content);

		for token in &content {
			match self.vocab.get_mut(*token) {
				Some(count) => *count += 1,
				None => {
					self.vocab.insert((*token).to_owned(), 1);
				}
			}
			self.index.insert(token, &sentence);
		}

		if tokens.len() < self.order {
			// Sentence too short, no n-grams to compute
			return;
		}

		for window in tokens.windows(self.order) {
			let (prefix, next) = window.split_at(self.order - 1);
			let state = self.chain.entry(prefix_key(prefix)).or_default();
			state.add_transition(&next[0]);
		}
	}

	/// Deduplicates the index and recomputes every prefix sum from scratch.
	pub(crate) fn finalize(&mut self) {
		self.index.dedup();
		self.sums = self
			.chain
			.iter()
			.map(|(key, state)| (key.clone(), state.total()))
			.collect();
	}

	/// Merges another chain into this one.
	///
	/// # Notes
	/// - Both chains must have the same order.
	/// - Transition and vocabulary counts are summed.
	/// - Index lists of `other` are appended after those of `self`.
	/// - Sums are stale until `finalize` runs.
	///
	/// # Errors
	/// Returns `OrderMismatch` if the orders differ.
	pub fn merge(&mut self, other: &Self) -> Result<()> {
		if self.order != other.order {
			return Err(Error::OrderMismatch { expected: self.order, found: other.order });
		}

		for (key, state) in &other.chain {
			if let Some(existing) = self.chain.get_mut(key) {
				existing.merge(state);
			} else {
				self.chain.insert(key.clone(), state.clone());
			}
		}
		for (token, count) in &other.vocab {
			*self.vocab.entry(token.clone()).or_insert(0) += count;
		}
		self.index.merge(&other.index);

		Ok(())
	}

	/// Summary figures.
	pub fn stats(&self) -> ChainStats {
		let total_transitions: usize = self.sums.values().sum();
		let avg_transitions_per_prefix = if self.chain.is_empty() {
			0.0
		} else {
			total_transitions as f64 / self.chain.len() as f64
		};

		ChainStats {
			order: self.order,
			prefixes: self.chain.len(),
			vocabulary_size: self.vocab.len(),
			index_size: self.index.len(),
			total_transitions,
			avg_transitions_per_prefix,
		}
	}

	/// Checks the invariants a loaded snapshot must satisfy.
	fn validate(&self) -> std::result::Result<(), String> {
		if self.order < 2 {
			return Err(format!("order must be >= 2, got {}", self.order));
		}
		if self.sums.len() != self.chain.len() {
			return Err(format!(
				"{} sums for {} prefixes",
				self.sums.len(),
				self.chain.len()
			));
		}
		for (key, state) in &self.chain {
			if state.is_empty() {
				return Err(format!("prefix {key} has no transitions"));
			}
			if self.sums.get(key) != Some(&state.total()) {
				return Err(format!("sum of prefix {key} does not match its transitions"));
			}
		}
		Ok(())
	}

	/// Writes the snapshot to `path`.
	///
	/// `.bin` files are encoded with `postcard`, anything else as pretty JSON.
	/// Missing parent directories are created.
	pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
		let path = path.as_ref();
		let save_error = |reason: String| Error::ModelSave { path: path.to_path_buf(), reason };

		let bytes = match SnapshotFormat::from_path(path) {
			SnapshotFormat::Json => serde_json::to_vec_pretty(self).map_err(|e| save_error(e.to_string()))?,
			SnapshotFormat::Postcard => postcard::to_stdvec(self).map_err(|e| save_error(e.to_string()))?,
		};
		ensure_parent_dir(path).map_err(|e| save_error(e.to_string()))?;
		fs::write(path, bytes).map_err(|e| save_error(e.to_string()))?;

		log::info!("Model saved to {} ({} prefixes)", path.display(), self.chain.len());
		Ok(())
	}

	/// Reads a snapshot written by `save`.
	///
	/// # Errors
	/// Returns `ModelLoad` if the file is missing, cannot be decoded, or
	/// breaks the chain invariants.
	pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
		let path = path.as_ref();
		let load_error = |reason: String| Error::ModelLoad { path: path.to_path_buf(), reason };

		let bytes = fs::read(path).map_err(|e| load_error(e.to_string()))?;
		let model: Self = match SnapshotFormat::from_path(path) {
			SnapshotFormat::Json => serde_json::from_slice(&bytes).map_err(|e| load_error(e.to_string()))?,
			SnapshotFormat::Postcard => postcard::from_bytes(&bytes).map_err(|e| load_error(e.to_string()))?,
		};
		model.validate().map_err(load_error)?;

		log::info!(
			"Model loaded from {} (order: {}, chain size: {})",
			path.display(),
			model.order,
			model.chain.len()
		);
		Ok(model)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn tokens(text: &str) -> Vec<String> {
		text.split(' ').map(str::to_owned).collect()
	}

	fn trained(order: usize, sentences: &[&str]) -> MarkovChain {
		let mut chain = MarkovChain::new(order).unwrap();
		for sentence in sentences {
			chain.add_sentence(&tokens(sentence));
		}
		chain.finalize();
		chain
	}

	#[test]
	fn test_prefix_key_round_trip() {
		assert_eq!(prefix_key(&["a", "b"]), "[a b]");
		assert_eq!(parse_prefix("[a b]"), vec!["a", "b"]);
		assert_eq!(parse_prefix("[[ x]"), vec!["[", "x"]);
		assert_eq!(parse_prefix("[x ]]"), vec!["x", "]"]);
		assert!(parse_prefix("[]").is_empty());
	}

	#[test]
	fn test_new_rejects_small_order() {
		assert!(matches!(MarkovChain::new(1), Err(Error::InvalidOrder(1))));
		assert!(MarkovChain::new(2).is_ok());
	}

	#[test]
	fn test_add_sentence_counts_transitions() {
		let chain = trained(3, &["<start> кот спит . <end>", "<start> кот ест . <end>"]);

		let dist = chain.next_tokens(&["<start>", "кот"]).unwrap();
		assert_eq!(dist.weight("спит"), Some(0.5));
		assert_eq!(dist.weight("ест"), Some(0.5));
		assert_eq!(chain.sum("[<start> кот]"), Some(2));
		assert!(chain.next_tokens(&["кот", "лает"]).is_none());
	}

	#[test]
	fn test_index_and_vocab_skip_boundaries() {
		let chain = trained(3, &["<start> кот спит . <end>", "<start> кот <end>"]);

		assert_eq!(chain.vocab().get("кот"), Some(&2));
		assert_eq!(chain.vocab().get("."), Some(&1));
		assert!(!chain.vocab().contains_key("<start>"));
		assert!(!chain.index().contains("<end>"));
		assert_eq!(
			chain.index().get("кот").unwrap(),
			&["кот спит.".to_owned(), "кот".to_owned()]
		);
	}

	#[test]
	fn test_short_sentence_is_indexed_only() {
		let chain = trained(4, &["<start> кот <end>"]);
		assert!(chain.is_empty());
		assert!(chain.index().contains("кот"));
	}

	#[test]
	fn test_sums_match_transitions() {
		let chain = trained(2, &["<start> a b a b c <end>", "<start> b a <end>"]);
		for (key, state) in chain.states() {
			assert_eq!(chain.sum(key), Some(state.total()));
		}
		assert!(chain.validate().is_ok());
	}

	#[test]
	fn test_merge_order_mismatch() {
		let mut left = MarkovChain::new(2).unwrap();
		let right = MarkovChain::new(3).unwrap();
		assert!(matches!(
			left.merge(&right),
			Err(Error::OrderMismatch { expected: 2, found: 3 })
		));
	}

	#[test]
	fn test_stats() {
		let chain = trained(2, &["<start> a b <end>"]);
		let stats = chain.stats();
		assert_eq!(stats.order, 2);
		assert_eq!(stats.prefixes, 3);
		assert_eq!(stats.total_transitions, 3);
		assert_eq!(stats.vocabulary_size, 2);
		assert!((stats.avg_transitions_per_prefix - 1.0).abs() < 1e-12);
	}

	#[test]
	fn test_validate_detects_broken_sums() {
		let mut chain = trained(2, &["<start> a b <end>"]);
		chain.sums.insert("[a]".to_owned(), 7);
		assert!(chain.validate().is_err());
	}
}
