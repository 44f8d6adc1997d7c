use std::collections::{BTreeMap, HashMap};

use super::chain::{parse_prefix, MarkovChain};

/// Default entropy (bits) under which a token counts as thematic.
pub const DEFAULT_THEMATIC_THRESHOLD: f64 = 2.0;

/// Order-independent signature of a prefix: tokens sorted and joined by `|`.
///
/// `["кот", "ест"]` and `["ест", "кот"]` share the key `"ест|кот"`.
pub fn context_key<S: AsRef<str>>(tokens: &[S]) -> String {
	let mut sorted: Vec<&str> = tokens.iter().map(|token| token.as_ref()).collect();
	sorted.sort_unstable();
	sorted.join("|")
}

/// Shannon entropy in bits of a count histogram.
///
/// An empty (or all-zero) histogram has infinite entropy.
pub fn shannon_entropy<'a, I>(counts: I) -> f64
where
	I: IntoIterator<Item = &'a usize>,
	I::IntoIter: Clone,
{
	let counts = counts.into_iter();
	let total: usize = counts.clone().sum();
	if total == 0 {
		return f64::INFINITY;
	}

	let total = total as f64;
	counts
		.filter(|count| **count > 0)
		.map(|count| {
			let count = *count as f64;
			(count / total) * (total / count).log2()
		})
		.sum()
}

/// Per-token context entropy of a chain.
///
/// For every prefix `P` with successor counts `s -> c`, each token of `P`
/// and each successor `s` is observed `c` times under the context key of
/// `P`. A token's entropy is the Shannon entropy of its context histogram:
/// the fewer distinct contexts it lives in, the lower the entropy and the
/// more topic-specific the token.
///
/// # Invariants
/// - Entropies are non-negative (possibly infinite)
/// - Immutable once computed
#[derive(Clone, Debug)]
pub struct TokenEntropy {
	entropy: HashMap<String, f64>,
	threshold: f64,
}

impl TokenEntropy {
	/// Computes the entropy of every token appearing in `chain`.
	///
	/// `threshold` is the bound (exclusive) under which a token is thematic.
	pub fn analyze(chain: &MarkovChain, threshold: f64) -> Self {
		log::info!("Analyzing entropy for {} tokens...", chain.vocab().len());

		let mut contexts: HashMap<&str, BTreeMap<String, usize>> = HashMap::new();
		for (key, state) in chain.states() {
			let prefix = parse_prefix(key);
			let context = context_key(&prefix);
			let total = state.total();

			for token in &prefix {
				*contexts.entry(*token).or_default().entry(context.clone()).or_insert(0) += total;
			}
			for (successor, count) in state.transitions() {
				*contexts.entry(successor).or_default().entry(context.clone()).or_insert(0) += count;
			}
		}

		let entropy: HashMap<String, f64> = contexts
			.into_iter()
			.map(|(token, histogram)| (token.to_owned(), shannon_entropy(histogram.values())))
			.collect();

		let analysis = Self { entropy, threshold };
		if let Some((min, max)) = analysis.range() {
			log::info!("Entropy analysis complete. Range: [{min:.3}, {max:.3}]");
		}
		analysis
	}

	/// Entropy of `token`, `None` if it never appears in the chain.
	pub fn get(&self, token: &str) -> Option<f64> {
		self.entropy.get(token).copied()
	}

	pub fn threshold(&self) -> f64 {
		self.threshold
	}

	/// Number of tokens with a computed entropy.
	pub fn len(&self) -> usize {
		self.entropy.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entropy.is_empty()
	}

	/// True iff the token's entropy is known and strictly below the threshold.
	pub fn is_thematic(&self, token: &str) -> bool {
		self.get(token).is_some_and(|entropy| entropy < self.threshold)
	}

	/// Keeps the thematic keywords, preserving their order.
	pub fn thematic<'a, S: AsRef<str>>(&self, keywords: &'a [S]) -> Vec<&'a str> {
		keywords
			.iter()
			.map(|keyword| keyword.as_ref())
			.filter(|keyword| self.is_thematic(keyword))
			.collect()
	}

	/// Smallest and largest finite entropies.
	pub fn range(&self) -> Option<(f64, f64)> {
		self.entropy
			.values()
			.copied()
			.filter(|entropy| entropy.is_finite())
			.fold(None, |range, entropy| match range {
				None => Some((entropy, entropy)),
				Some((min, max)) => Some((min.min(entropy), max.max(entropy))),
			})
	}

	/// The `limit` lowest-entropy tokens, ties ordered by token.
	pub fn most_thematic(&self, limit: usize) -> Vec<(&str, f64)> {
		let mut tokens: Vec<(&str, f64)> = self
			.entropy
			.iter()
			.map(|(token, entropy)| (token.as_str(), *entropy))
			.collect();
		tokens.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(b.0)));
		tokens.truncate(limit);
		tokens
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::model::builder::train;

	fn sentences(raw: &[&str]) -> Vec<Vec<String>> {
		raw.iter()
			.map(|sentence| sentence.split(' ').map(str::to_owned).collect())
			.collect()
	}

	#[test]
	fn test_context_key_is_order_independent() {
		assert_eq!(context_key(&["b", "a"]), context_key(&["a", "b"]));
		assert_eq!(context_key(&["кот", "ест"]), "ест|кот");
	}

	#[test]
	fn test_empty_histogram_is_infinite() {
		let empty: HashMap<String, usize> = HashMap::new();
		assert!(shannon_entropy(empty.values()).is_infinite());
		assert!(shannon_entropy(&[0usize, 0]).is_infinite());
	}

	#[test]
	fn test_unknown_token_is_not_thematic() {
		let chain = train(2, &sentences(&["a b"])).unwrap();
		let analysis = TokenEntropy::analyze(&chain, DEFAULT_THEMATIC_THRESHOLD);
		assert_eq!(analysis.get("zzz"), None);
		assert!(!analysis.is_thematic("zzz"));
	}

	#[test]
	fn test_entropy_weighted_by_counts() {
		let chain = train(2, &sentences(&["a b", "a b", "a b", "c b"])).unwrap();
		let analysis = TokenEntropy::analyze(&chain, DEFAULT_THEMATIC_THRESHOLD);

		// b: context "a" seen 3 times, context "c" once
		let expected = -(0.75f64 * 0.75f64.log2() + 0.25f64 * 0.25f64.log2());
		assert!((analysis.get("b").unwrap() - expected).abs() < 1e-9);
		assert_eq!(analysis.get("a"), Some(0.0));
		assert!(analysis.is_thematic("b"));
	}

	#[test]
	fn test_entropy_invariant_to_context_permutation() {
		let straight = train(3, &sentences(&["a b z", "c d z"])).unwrap();
		let permuted = train(3, &sentences(&["b a z", "d c z"])).unwrap();
		let straight = TokenEntropy::analyze(&straight, DEFAULT_THEMATIC_THRESHOLD);
		let permuted = TokenEntropy::analyze(&permuted, DEFAULT_THEMATIC_THRESHOLD);

		for token in ["a", "b", "c", "d", "z"] {
			assert_eq!(straight.get(token), permuted.get(token), "token {token}");
		}
		assert_eq!(straight.get("z"), Some(1.0));
	}

	#[test]
	fn test_threshold_is_strict() {
		let chain = train(3, &sentences(&["a b z", "c d z"])).unwrap();
		let analysis = TokenEntropy::analyze(&chain, 1.0);
		assert!(!analysis.is_thematic("z"));
		assert!(analysis.is_thematic("a"));
		assert_eq!(analysis.thematic(&["z", "a", "q"]), vec!["a"]);
	}

	#[test]
	fn test_most_thematic_sorted() {
		let chain = train(2, &sentences(&["a b", "a b", "a b", "c b"])).unwrap();
		let analysis = TokenEntropy::analyze(&chain, DEFAULT_THEMATIC_THRESHOLD);
		let top = analysis.most_thematic(2);
		assert_eq!(top, vec![("a", 0.0), ("c", 0.0)]);
		assert_eq!(analysis.range().map(|(min, _)| min), Some(0.0));
	}
}
