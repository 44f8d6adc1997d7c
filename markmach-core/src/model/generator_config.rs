use super::entropy::DEFAULT_THEMATIC_THRESHOLD;

/// Input parameters of the answer generator.
///
/// # Responsibilities
/// - Bound the length of generated answers (`max_length`, in tokens)
/// - Bound retrieval (`search_limit` candidate sentences)
/// - Bound continuation retries (`max_stalls` consecutive steps without a
///   known successor distribution)
/// - Select the tokenizer mode used on questions and retrieved sentences
/// - Hold the entropy threshold under which a token is thematic
///
/// # Invariants
/// - `thematic_threshold` is in `(0.0, 3.0]`, which keeps the thematic bias
///   factor `3 - entropy` positive
#[derive(Clone, Debug, PartialEq)]
pub struct GeneratorConfig {
	/// Maximum answer length in tokens.
	pub max_length: usize,

	/// Number of candidate sentences fetched from the index.
	pub search_limit: usize,

	/// Consecutive stalls after which continuation gives up.
	pub max_stalls: usize,

	/// Keep punctuation tokens when tokenizing (must match training).
	pub keep_punctuation: bool,

	/// Entropy (bits) under which a token is thematic.
	thematic_threshold: f64,
}

impl Default for GeneratorConfig {
	fn default() -> Self {
		Self {
			max_length: 50,
			search_limit: 5,
			max_stalls: 10,
			keep_punctuation: true,
			thematic_threshold: DEFAULT_THEMATIC_THRESHOLD,
		}
	}
}

impl GeneratorConfig {
	/// Returns the current thematic threshold.
	pub fn thematic_threshold(&self) -> f64 {
		self.thematic_threshold
	}

	/// Sets the thematic threshold (0.0 exclusive ..= 3.0).
	///
	/// # Errors
	/// Returns an error if the value is outside the valid range.
	pub fn set_thematic_threshold(&mut self, threshold: f64) -> Result<(), String> {
		if !(threshold > 0.0 && threshold <= 3.0) {
			return Err(format!("Thematic threshold must be in (0.0, 3.0], got {threshold}"));
		}
		self.thematic_threshold = threshold;
		Ok(())
	}
}
