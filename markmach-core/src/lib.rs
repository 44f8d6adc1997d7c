//! Markov chain question answering library.
//!
//! This crate provides:
//! - Corpus parsing and tokenization
//! - Order-N Markov chain training, persistence and statistics
//! - Token entropy analysis to spot topic-specific words
//! - An answer generator that retrieves the most relevant learned sentence
//!   and rewrites it with a keyword-biased walk over the chain
//!
//! Typical flow: `CorpusParser` → `Tokenizer` → `Trainer` → `MarkovChain`
//! → `AnswerGenerator::generate_answer`.

/// Error type shared by the library.
pub mod error;

/// Chain model, training, entropy and generation.
pub mod model;

/// Parsing, tokenization and answer formatting.
pub mod text;

/// I/O utilities (file loading, path helpers, snapshot formats).
///
/// Not exposed
pub(crate) mod io;

pub use error::{Error, Result};
pub use model::builder::{TrainConfig, Trainer};
pub use model::chain::{ChainStats, MarkovChain};
pub use model::entropy::TokenEntropy;
pub use model::generator::{AnswerGenerator, NO_KEYWORDS_MESSAGE, NO_MATCH_MESSAGE};
pub use model::generator_config::GeneratorConfig;
pub use text::parser::{CorpusParser, ParsedCorpus};
pub use text::tokenizer::{Tokenizer, TokenizerConfig};
