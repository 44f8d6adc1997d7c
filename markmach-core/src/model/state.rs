use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::distribution::Distribution;

/// Represents a state in the Markov chain.
///
/// A `State` corresponds to one (n-1)-token prefix and stores all observed
/// transitions from this prefix to the next token.
///
/// Conceptually, this is a node in a Markov chain where outgoing edges
/// are weighted by their number of observations.
///
/// ## Responsibilities:
/// - Accumulate transition occurrences during training
/// - Expose the successor distribution used by generation
/// - Merge with another state of the same prefix (parallel training support)
///
/// ## Invariants
/// - Each transition occurrence count is strictly positive
/// - Successors are ordered lexicographically
///
/// Serialized as a plain `successor -> count` map.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct State {
	/// Outgoing transitions indexed by the next token.
	/// Example: { "кот" => 42, "." => 3 }
	transitions: BTreeMap<String, usize>,
}

impl State {
	/// Creates a new empty state.
	pub fn new() -> Self {
		Self::default()
	}

	/// Records an occurrence of a transition toward `next_token`.
	///
	/// - If the transition already exists, its occurrence count is increased.
	/// - Otherwise, a new transition is created with an initial count of 1.
	pub fn add_transition(&mut self, next_token: &str) {
		self.add_occurrences(next_token, 1);
	}

	fn add_occurrences(&mut self, next_token: &str, occurrences: usize) {
		if occurrences == 0 {
			return;
		}
		match self.transitions.get_mut(next_token) {
			Some(count) => *count += occurrences,
			None => {
				self.transitions.insert(next_token.to_owned(), occurrences);
			}
		}
	}

	pub fn is_empty(&self) -> bool {
		self.transitions.is_empty()
	}

	/// Number of distinct successors.
	pub fn len(&self) -> usize {
		self.transitions.len()
	}

	/// Iterates over `(successor, count)` in successor order.
	pub fn transitions(&self) -> impl Iterator<Item = (&str, usize)> {
		self.transitions.iter().map(|(token, count)| (token.as_str(), *count))
	}

	/// Total number of observed transitions.
	pub fn total(&self) -> usize {
		self.transitions.values().sum()
	}

	/// Successor probabilities given the cached total for this prefix.
	///
	/// Returns `None` for an empty state or a zero total.
	pub fn distribution(&self, total: usize) -> Option<Distribution> {
		if self.transitions.is_empty() || total == 0 {
			return None;
		}
		let total = total as f64;
		Some(Distribution::from_weights(
			self.transitions
				.iter()
				.map(|(token, count)| (token.clone(), *count as f64 / total)),
		))
	}

	/// Merges another state into this one.
	///
	/// Transition occurrence counts are summed. Both states are expected to
	/// describe the same prefix; the caller owns that pairing.
	pub fn merge(&mut self, other: &Self) {
		for (next_token, occurrences) in &other.transitions {
			self.add_occurrences(next_token, *occurrences);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_add_transition_counts() {
		let mut state = State::new();
		state.add_transition("b");
		state.add_transition("a");
		state.add_transition("b");

		let transitions: Vec<(&str, usize)> = state.transitions().collect();
		assert_eq!(transitions, vec![("a", 1), ("b", 2)]);
		assert_eq!(state.total(), 3);
	}

	#[test]
	fn test_distribution() {
		let mut state = State::new();
		state.add_transition("a");
		state.add_transition("b");
		state.add_transition("b");
		state.add_transition("b");

		let dist = state.distribution(state.total()).unwrap();
		assert_eq!(dist.weight("a"), Some(0.25));
		assert_eq!(dist.weight("b"), Some(0.75));
		assert!(State::new().distribution(0).is_none());
	}

	#[test]
	fn test_merge() {
		let mut left = State::new();
		left.add_transition("a");
		let mut right = State::new();
		right.add_transition("a");
		right.add_transition("c");

		left.merge(&right);
		let transitions: Vec<(&str, usize)> = left.transitions().collect();
		assert_eq!(transitions, vec![("a", 2), ("c", 1)]);
	}
}
