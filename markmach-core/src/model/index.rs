use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

/// Inverted index from a token to the sentences containing it.
///
/// Sentences are stored in their human-readable form (boundary markers
/// stripped). Each list keeps the order in which sentences were first seen
/// during training.
///
/// # Invariants
/// - After `dedup`, a sentence appears at most once per token
///
/// Serialized as a plain `token -> [sentence]` map.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct SentenceIndex {
	sentences: HashMap<String, Vec<String>>,
}

/// A retrieval hit and the number of distinct query keywords it contains.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScoredSentence<'a> {
	pub sentence: &'a str,
	pub score: usize,
}

impl SentenceIndex {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers `sentence` under `token`.
	///
	/// Consecutive repeats are skipped here; `dedup` removes the rest.
	pub fn insert(&mut self, token: &str, sentence: &str) {
		let list = self.sentences.entry(token.to_owned()).or_default();
		if list.last().map(String::as_str) != Some(sentence) {
			list.push(sentence.to_owned());
		}
	}

	/// Removes duplicate sentences per token, keeping first occurrences.
	pub fn dedup(&mut self) {
		for list in self.sentences.values_mut() {
			let mut seen = HashSet::with_capacity(list.len());
			list.retain(|sentence| seen.insert(sentence.clone()));
		}
	}

	/// Appends the lists of `other` after the lists of `self`.
	///
	/// Call `dedup` once all merges are done.
	pub fn merge(&mut self, other: &Self) {
		for (token, sentences) in &other.sentences {
			self.sentences
				.entry(token.clone())
				.or_default()
				.extend(sentences.iter().cloned());
		}
	}

	/// Sentences indexed under `token`, in first-seen order.
	pub fn get(&self, token: &str) -> Option<&[String]> {
		self.sentences.get(token).map(Vec::as_slice)
	}

	pub fn contains(&self, token: &str) -> bool {
		self.sentences.contains_key(token)
	}

	/// Number of indexed tokens.
	pub fn len(&self) -> usize {
		self.sentences.len()
	}

	pub fn is_empty(&self) -> bool {
		self.sentences.is_empty()
	}

	/// Ranks sentences by how many distinct keywords they contain.
	///
	/// Every keyword present in the index adds 1 to each of its sentences.
	/// Duplicate keywords count once. Results are sorted by descending score.
	///
	/// Ties are broken by query-walk order, not corpus order: sentences are
	/// ranked by when they were first met while walking the keywords in query
	/// order and each list in stored order. A sentence found through the first
	/// keyword therefore precedes an equally scored one from an earlier part of
	/// the corpus found through a later keyword. Global corpus order is not
	/// kept in the index.
	///
	/// At most `limit` results are returned, none when nothing matched.
	pub fn search_scored<S: AsRef<str>>(&self, keywords: &[S], limit: usize) -> Vec<ScoredSentence<'_>> {
		let mut seen_keywords: HashSet<&str> = HashSet::new();
		let mut positions: HashMap<&str, usize> = HashMap::new();
		// (sentence, score, last keyword that scored it)
		let mut scored: Vec<(&str, usize, usize)> = Vec::new();

		for (keyword_index, keyword) in keywords.iter().enumerate() {
			let keyword: &str = keyword.as_ref();
			if !seen_keywords.insert(keyword) {
				continue;
			}
			let Some(sentences) = self.sentences.get(keyword) else {
				continue;
			};
			for sentence in sentences {
				let position = positions.get(sentence.as_str()).copied();
				match position {
					Some(i) => {
						let entry = &mut scored[i];
						if entry.2 != keyword_index {
							entry.1 += 1;
							entry.2 = keyword_index;
						}
					}
					None => {
						positions.insert(sentence.as_str(), scored.len());
						scored.push((sentence.as_str(), 1, keyword_index));
					}
				}
			}
		}

		// Stable sort: ties stay in first-seen order
		scored.sort_by(|a, b| b.1.cmp(&a.1));
		scored
			.into_iter()
			.take(limit)
			.map(|(sentence, score, _)| ScoredSentence { sentence, score })
			.collect()
	}

	/// Same ranking as `search_scored`, sentences only.
	pub fn search<S: AsRef<str>>(&self, keywords: &[S], limit: usize) -> Vec<&str> {
		self.search_scored(keywords, limit)
			.into_iter()
			.map(|hit| hit.sentence)
			.collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn sample_index() -> SentenceIndex {
		let mut index = SentenceIndex::new();
		for (tokens, sentence) in [
			(vec!["кот", "спит"], "кот спит."),
			(vec!["пёс", "спит"], "пёс спит."),
			(vec!["кот", "ест", "рыбу"], "кот ест рыбу."),
			(vec!["кот", "спит", "дома"], "кот спит дома."),
		] {
			for token in tokens {
				index.insert(token, sentence);
			}
		}
		index
	}

	#[test]
	fn test_insert_dedup_keeps_first_seen_order() {
		let mut index = SentenceIndex::new();
		index.insert("a", "one");
		index.insert("a", "two");
		index.insert("a", "one");
		index.dedup();
		assert_eq!(index.get("a").unwrap(), &["one".to_owned(), "two".to_owned()]);
	}

	#[test]
	fn test_search_ranks_by_distinct_keywords() {
		let index = sample_index();
		let hits = index.search_scored(&["кот", "спит"], 10);

		assert_eq!(hits[0], ScoredSentence { sentence: "кот спит.", score: 2 });
		assert_eq!(hits[1], ScoredSentence { sentence: "кот спит дома.", score: 2 });
		assert_eq!(hits[2], ScoredSentence { sentence: "кот ест рыбу.", score: 1 });
		assert_eq!(hits[3], ScoredSentence { sentence: "пёс спит.", score: 1 });
		assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
	}

	#[test]
	fn test_search_duplicate_keywords_count_once() {
		let index = sample_index();
		let hits = index.search_scored(&["рыбу", "рыбу"], 10);
		assert_eq!(hits, vec![ScoredSentence { sentence: "кот ест рыбу.", score: 1 }]);
	}

	#[test]
	fn test_search_ties_follow_query_order() {
		let mut index = SentenceIndex::new();
		index.insert("кот", "кот спит дома.");
		index.insert("пёс", "пёс спит дома.");
		assert_eq!(index.search(&["пёс", "кот"], 5), vec!["пёс спит дома.", "кот спит дома."]);
		assert_eq!(index.search(&["кот", "пёс"], 5), vec!["кот спит дома.", "пёс спит дома."]);
	}

	#[test]
	fn test_search_respects_limit() {
		let index = sample_index();
		assert_eq!(index.search(&["кот", "спит"], 2).len(), 2);
		assert!(index.search(&["кот"], 0).is_empty());
	}

	#[test]
	fn test_search_no_match() {
		let index = sample_index();
		assert!(index.search(&["собака"], 5).is_empty());
		assert!(index.search::<&str>(&[], 5).is_empty());
	}

	#[test]
	fn test_merge_appends_in_order() {
		let mut left = SentenceIndex::new();
		left.insert("a", "first");
		let mut right = SentenceIndex::new();
		right.insert("a", "second");
		right.insert("a", "first");
		right.insert("b", "second");

		left.merge(&right);
		left.dedup();
		assert_eq!(left.get("a").unwrap(), &["first".to_owned(), "second".to_owned()]);
		assert_eq!(left.get("b").unwrap(), &["second".to_owned()]);
	}
}
