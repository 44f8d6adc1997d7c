use std::sync::mpsc;
use std::thread;

use super::chain::MarkovChain;
use crate::error::{Error, Result};

/// Chunks per worker when training in parallel.
const CHUNKS_PER_WORKER: usize = 4;

/// Below this many sentences per chunk, splitting is not worth a thread.
const MIN_CHUNK_SIZE: usize = 512;

/// Training settings.
///
/// # Fields
/// - `order`: n-gram order of the chain (>= 2).
/// - `workers`: threads used to build partial chains. `0` uses every
///   logical CPU, `1` trains sequentially.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TrainConfig {
	pub order: usize,
	pub workers: usize,
}

impl Default for TrainConfig {
	fn default() -> Self {
		Self { order: 3, workers: 1 }
	}
}

/// Builds a `MarkovChain` from tokenized sentences.
///
/// # Responsibilities
/// - Validate the configuration
/// - Feed every sentence to the chain (index, vocabulary, transitions)
/// - Optionally split the corpus over worker threads and merge the
///   partial chains in corpus order
/// - Recompute prefix sums once everything is counted
#[derive(Clone, Debug)]
pub struct Trainer {
	config: TrainConfig,
}

impl Trainer {
	/// # Errors
	/// Returns `InvalidOrder` if `config.order < 2`.
	pub fn new(config: TrainConfig) -> Result<Self> {
		if config.order < 2 {
			return Err(Error::InvalidOrder(config.order));
		}
		Ok(Self { config })
	}

	pub fn config(&self) -> &TrainConfig {
		&self.config
	}

	/// Trains a chain on `sentences` (each one framed by boundary markers).
	///
	/// The result does not depend on the number of workers: partial chains
	/// are merged in the order of their chunks, so index lists keep the
	/// submission order.
	///
	/// # Errors
	/// Returns `InsufficientData` if `sentences` is empty.
	pub fn train(&self, sentences: &[Vec<String>]) -> Result<MarkovChain> {
		if sentences.is_empty() {
			return Err(Error::InsufficientData);
		}
		log::info!(
			"Training Markov chain with order {} on {} sentences...",
			self.config.order,
			sentences.len()
		);

		let workers = match self.config.workers {
			0 => num_cpus::get(),
			n => n,
		};
		let chunks = workers * CHUNKS_PER_WORKER;
		let chunk_size = sentences.len().div_ceil(chunks).max(MIN_CHUNK_SIZE);

		let mut model = if workers > 1 && chunk_size < sentences.len() {
			self.train_parallel(sentences, chunk_size)?
		} else {
			let mut model = MarkovChain::new(self.config.order)?;
			for sentence in sentences {
				model.add_sentence(sentence);
			}
			model
		};
		model.finalize();

		let stats = model.stats();
		log::info!("Training completed. Chain size: {} prefixes", stats.prefixes);
		log::info!("Vocabulary size: {} tokens", stats.vocabulary_size);
		log::info!("Index size: {} words", stats.index_size);

		Ok(model)
	}

	/// Builds one partial chain per chunk on scoped threads and merges them.
	///
	/// # Notes
	/// - Uses MPSC channels to collect chains from threads.
	/// - Partials are tagged with their chunk number and merged in that order.
	fn train_parallel(&self, sentences: &[Vec<String>], chunk_size: usize) -> Result<MarkovChain> {
		let order = self.config.order;
		let (tx, rx) = mpsc::channel();

		thread::scope(|scope| {
			for (chunk_index, chunk) in sentences.chunks(chunk_size).enumerate() {
				let tx = tx.clone();
				scope.spawn(move || {
					let partial = MarkovChain::new(order).map(|mut partial| {
						for sentence in chunk {
							partial.add_sentence(sentence);
						}
						partial
					});
					// The receiver outlives the scope
					let _ = tx.send((chunk_index, partial));
				});
			}
		});
		drop(tx);

		let mut partials: Vec<(usize, Result<MarkovChain>)> = rx.iter().collect();
		partials.sort_by_key(|(chunk_index, _)| *chunk_index);
		log::debug!("Merging {} partial chains", partials.len());

		let mut model = MarkovChain::new(order)?;
		for (_, partial) in partials {
			model.merge(&partial?)?;
		}
		Ok(model)
	}
}

/// Trains a chain of the given order on a single thread.
pub fn train(order: usize, sentences: &[Vec<String>]) -> Result<MarkovChain> {
	Trainer::new(TrainConfig { order, workers: 1 })?.train(sentences)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn corpus(size: usize) -> Vec<Vec<String>> {
		let words = ["кот", "пёс", "спит", "ест", "дома", "рыбу", "громко"];
		(0..size)
			.map(|i| {
				let mut sentence = vec!["<start>".to_owned()];
				for j in 0..(3 + i % 4) {
					sentence.push(words[(i * 3 + j * 5) % words.len()].to_owned());
				}
				sentence.push(".".to_owned());
				sentence.push("<end>".to_owned());
				sentence
			})
			.collect()
	}

	#[test]
	fn test_empty_corpus_is_rejected() {
		assert!(matches!(train(3, &[]), Err(Error::InsufficientData)));
	}

	#[test]
	fn test_invalid_order_is_rejected() {
		assert!(matches!(
			Trainer::new(TrainConfig { order: 1, workers: 1 }),
			Err(Error::InvalidOrder(1))
		));
	}

	#[test]
	fn test_sums_equal_transition_totals() {
		let model = train(3, &corpus(50)).unwrap();
		assert!(!model.is_empty());
		for (key, state) in model.states() {
			let total: usize = state.transitions().map(|(_, count)| count).sum();
			assert_eq!(model.sum(key), Some(total), "prefix {key}");
		}
	}

	#[test]
	fn test_parallel_matches_sequential() {
		let sentences = corpus(3000);
		let sequential = Trainer::new(TrainConfig { order: 3, workers: 1 })
			.unwrap()
			.train(&sentences)
			.unwrap();
		let parallel = Trainer::new(TrainConfig { order: 3, workers: 4 })
			.unwrap()
			.train(&sentences)
			.unwrap();
		assert_eq!(sequential, parallel);
	}

	#[test]
	fn test_index_keeps_submission_order() {
		let sentences: Vec<Vec<String>> = vec![
			"<start> б кот <end>".split(' ').map(str::to_owned).collect(),
			"<start> а кот <end>".split(' ').map(str::to_owned).collect(),
			"<start> б кот <end>".split(' ').map(str::to_owned).collect(),
		];
		let model = train(2, &sentences).unwrap();
		assert_eq!(
			model.index().get("кот").unwrap(),
			&["б кот".to_owned(), "а кот".to_owned()]
		);
	}
}
