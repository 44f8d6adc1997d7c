use std::ffi::OsStr;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::{fs, io};

/// On-disk encoding of a model snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SnapshotFormat {
	/// Pretty-printed JSON, readable and diffable.
	Json,
	/// Compact `postcard` binary.
	Postcard,
}

impl SnapshotFormat {
	/// Picks the encoding from the file extension.
	///
	/// `model.bin` → `Postcard`, anything else (`model.json`, no extension) → `Json`.
	pub(crate) fn from_path<P: AsRef<Path>>(path: P) -> Self {
		match path.as_ref().extension() {
			Some(ext) if ext == OsStr::new("bin") => Self::Postcard,
			_ => Self::Json,
		}
	}
}

/// Reads a whole text file into a `String`.
pub(crate) fn read_file<P: AsRef<Path>>(filename: P) -> io::Result<String> {
	let mut contents = String::new();
	File::open(filename)?.read_to_string(&mut contents)?;
	Ok(contents)
}

/// Reads a text file and returns all its lines as a `Vec<String>`.
///
/// - Reads the entire file into memory
/// - Splits on `\n` / `\r\n`
pub(crate) fn read_lines<P: AsRef<Path>>(filename: P) -> io::Result<Vec<String>> {
	Ok(read_file(filename)?.lines().map(str::to_owned).collect())
}

/// Builds a sibling path by appending a suffix to a base path.
///
/// Example:
/// `output/result` + `"_sentences.txt"` → `output/result_sentences.txt`
pub(crate) fn build_output_path<P: AsRef<Path>>(base: P, suffix: &str) -> PathBuf {
	let mut output = base.as_ref().as_os_str().to_owned();
	output.push(suffix);
	PathBuf::from(output)
}

/// Creates the parent directory of `path` if it does not exist yet.
pub(crate) fn ensure_parent_dir<P: AsRef<Path>>(path: P) -> io::Result<()> {
	match path.as_ref().parent() {
		Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
		_ => Ok(()),
	}
}
