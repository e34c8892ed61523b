use std::error;
use std::fmt;

use crate::{crypto, db};

use super::validate::FieldErrors;

/// An error that can occur when submitting a mandate
#[derive(Debug, PartialEq)]
pub struct Error {
	kind: ErrorKind,
}

impl Error {
	pub fn new(kind: ErrorKind) -> Error {
		Error { kind }
	}

	pub fn kind(&self) -> &ErrorKind {
		&self.kind
	}

	/// Validation and state errors are the caller's to fix; the rest are internal failures
	pub fn is_recoverable(&self) -> bool {
		matches!(
			self.kind,
			ErrorKind::Validation(_) | ErrorKind::CustomerNotFound | ErrorKind::AlreadySubmitted
		)
	}
}

/// The kind of an error that can occur.
#[derive(Debug, PartialEq)]
pub enum ErrorKind {
	Validation(FieldErrors),
	CustomerNotFound,
	AlreadySubmitted,
	Encryption(crypto::Error),
	/// The signature image could not be written to storage
	Signature(String),
	Storage(db::Error),
}

impl fmt::Display for Error {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match &self.kind {
			ErrorKind::Validation(errors) => {
				let fields: Vec<&str> = errors.fields().collect();
				write!(f, "validation failed: {}", fields.join(", "))
			}
			ErrorKind::CustomerNotFound => write!(f, "customer not found"),
			ErrorKind::AlreadySubmitted => write!(f, "mandate already submitted"),
			ErrorKind::Encryption(e) => write!(f, "encryption error: {}", e),
			ErrorKind::Signature(msg) => write!(f, "storing signature: {}", msg),
			ErrorKind::Storage(e) => write!(f, "db error: {}", e),
		}
	}
}

impl error::Error for Error {}

impl From<ErrorKind> for Error {
	fn from(kind: ErrorKind) -> Self {
		Error::new(kind)
	}
}

impl From<FieldErrors> for Error {
	fn from(e: FieldErrors) -> Self {
		Error::new(ErrorKind::Validation(e))
	}
}

impl From<crypto::Error> for Error {
	fn from(e: crypto::Error) -> Self {
		Error::new(ErrorKind::Encryption(e))
	}
}

impl From<db::Error> for Error {
	fn from(e: db::Error) -> Self {
		match e {
			db::Error::RecordNotFound => Error::new(ErrorKind::CustomerNotFound),
			db::Error::Conflict => Error::new(ErrorKind::AlreadySubmitted),
			_ => Error::new(ErrorKind::Storage(e)),
		}
	}
}
