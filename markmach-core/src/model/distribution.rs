/// Probability distribution over successor tokens.
///
/// Entries are kept sorted lexicographically by token so that cumulative
/// sampling visits candidates in a fixed, reproducible order regardless of
/// how the weights were produced.
///
/// # Invariants
/// - Tokens are unique and sorted
/// - Weights are finite and non-negative
#[derive(Clone, Debug, PartialEq)]
pub struct Distribution {
	entries: Vec<(String, f64)>,
}

impl Distribution {
	/// Builds a distribution from `(token, weight)` pairs.
	///
	/// Pairs are sorted by token. Negative or non-finite weights are clamped to 0.
	pub fn from_weights<I>(weights: I) -> Self
	where
		I: IntoIterator<Item = (String, f64)>,
	{
		let mut entries: Vec<(String, f64)> = weights
			.into_iter()
			.map(|(token, weight)| (token, if weight.is_finite() { weight.max(0.0) } else { 0.0 }))
			.collect();
		entries.sort_by(|a, b| a.0.cmp(&b.0));
		entries.dedup_by(|a, b| a.0 == b.0);
		Self { entries }
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	/// Iterates over `(token, weight)` in token order.
	pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
		self.entries.iter().map(|(token, weight)| (token.as_str(), *weight))
	}

	/// Returns the weight of `token`, if present.
	pub fn weight(&self, token: &str) -> Option<f64> {
		self.entries
			.binary_search_by(|(t, _)| t.as_str().cmp(token))
			.ok()
			.map(|i| self.entries[i].1)
	}

	/// Sum of all weights.
	pub fn total(&self) -> f64 {
		self.entries.iter().map(|(_, weight)| weight).sum()
	}

	/// Multiplies every weight by the factor returned for its token.
	pub fn reweight<F>(mut self, mut factor: F) -> Self
	where
		F: FnMut(&str, f64) -> f64,
	{
		for (token, weight) in &mut self.entries {
			let scaled = *weight * factor(token, *weight);
			*weight = if scaled.is_finite() { scaled.max(0.0) } else { 0.0 };
		}
		self
	}

	/// Rescales weights so they sum to 1.
	///
	/// Left unchanged when the total is 0.
	pub fn normalize(mut self) -> Self {
		let total = self.total();
		if total > 0.0 {
			for (_, weight) in &mut self.entries {
				*weight /= total;
			}
		}
		self
	}

	/// Selects a token for a uniform draw `r` in `[0, 1)`.
	///
	/// Walks the entries in token order accumulating weight and returns the
	/// first token whose cumulative weight reaches `r`. When rounding leaves
	/// the total below `r`, the heaviest token wins (first one on ties).
	///
	/// Returns `None` only for an empty distribution.
	pub fn sample(&self, r: f64) -> Option<&str> {
		let mut cumulative = 0.0;
		for (token, weight) in &self.entries {
			cumulative += weight;
			if cumulative >= r {
				return Some(token);
			}
		}

		self.heaviest()
	}

	/// Token with the highest weight, first in token order on ties.
	pub fn heaviest(&self) -> Option<&str> {
		let mut best: Option<&(String, f64)> = None;
		for entry in &self.entries {
			match best {
				Some((_, weight)) if entry.1 <= *weight => (),
				_ => best = Some(entry),
			}
		}
		best.map(|(token, _)| token.as_str())
	}
}
