//! Markov chain model and the answering logic built on top of it.
//!
//! This module provides:
//! - The order-N chain with its sentence index and vocabulary (`MarkovChain`)
//! - Batch and parallel training (`Trainer`)
//! - Per-token context entropy (`TokenEntropy`)
//! - The thematic answer generator (`AnswerGenerator`)

/// Order-N transition counts, cached sums, sentence index and vocabulary.
///
/// Handles snapshot persistence (JSON or postcard).
pub mod chain;

/// Builds chains from tokenized sentences, optionally on worker threads.
pub mod builder;

/// Successor counts of a single prefix.
pub mod state;

/// Ordered `(token, weight)` probabilities and the sampling rule.
pub mod distribution;

/// Inverted index from tokens to the sentences containing them.
pub mod index;

/// Shannon entropy of the contexts each token appears in.
pub mod entropy;

/// Question answering by retrieval and biased continuation.
pub mod generator;

/// Settings of the answer generator.
pub mod generator_config;
