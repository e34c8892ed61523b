use std::path::PathBuf;

use thiserror::Error;

use crate::crypto;

pub type Result<T> = std::result::Result<T, Error>;

/// An error that can occur while producing a mandate document
#[derive(Debug, Error)]
pub enum Error {
	#[error("pdf template not found at {}", .0.display())]
	TemplateMissing(PathBuf),
	#[error("pdf template is {found_width}x{found_height}pt, layout expects {expected_width}x{expected_height}pt")]
	TemplateMismatch {
		expected_width: f32,
		expected_height: f32,
		found_width: f32,
		found_height: f32,
	},
	#[error("unreadable pdf template: {0}")]
	Template(String),
	#[error("invalid layout table: {0}")]
	Layout(String),
	/// A stored field could not be decrypted; the document is not produced
	#[error("decrypting mandate field: {0}")]
	Decryption(#[from] crypto::Error),
	/// No document font has a glyph for this character
	#[error("character {0:?} cannot be printed")]
	Unprintable(char),
	#[error("writing pdf: {0}")]
	Pdf(String),
	#[error("rendering exceeded its time budget")]
	Timeout,
	#[error("rendering task aborted: {0}")]
	Aborted(String),
}
