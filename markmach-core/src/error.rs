//! Error types for training, loading and saving chain models.

use std::path::PathBuf;
use std::{fmt, io};

/// Errors raised by the chain engine.
///
/// Question answering never fails: missing keywords or unmatched questions
/// are answered with fixed messages instead (see `generator`).
#[derive(Debug)]
pub enum Error {
	/// Training was invoked on an empty corpus.
	InsufficientData,
	/// The requested chain order is below 2.
	InvalidOrder(usize),
	/// Two models of different orders cannot be merged.
	OrderMismatch { expected: usize, found: usize },
	/// A snapshot is missing, undecodable or inconsistent.
	ModelLoad { path: PathBuf, reason: String },
	/// A snapshot could not be encoded or written.
	ModelSave { path: PathBuf, reason: String },
	/// Reading or writing a corpus file failed.
	Io(io::Error),
}

impl fmt::Display for Error {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::InsufficientData => write!(f, "no data to train on"),
			Self::InvalidOrder(n) => write!(f, "chain order must be >= 2, got {n}"),
			Self::OrderMismatch { expected, found } => {
				write!(f, "order mismatch: expected {expected}, found {found}")
			}
			Self::ModelLoad { path, reason } => {
				write!(f, "failed to load model from {}: {reason}", path.display())
			}
			Self::ModelSave { path, reason } => {
				write!(f, "failed to save model to {}: {reason}", path.display())
			}
			Self::Io(e) => write!(f, "i/o error: {e}"),
		}
	}
}

impl std::error::Error for Error {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		match self {
			Self::Io(e) => Some(e),
			_ => None,
		}
	}
}

impl From<io::Error> for Error {
	fn from(e: io::Error) -> Self {
		Self::Io(e)
	}
}

pub type Result<T> = std::result::Result<T, Error>;
