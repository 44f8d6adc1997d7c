//! Text processing around the chain: from raw documents to tokens, and
//! from generated tokens back to presentable answers.

/// Document cleaning and sentence/paragraph splitting.
///
/// Parsed corpora can be saved next to the source and reloaded.
pub mod parser;

/// Word and punctuation tokenizer framing sentences with boundary markers.
pub mod tokenizer;

/// Final normalization of generated answers.
pub mod format;
