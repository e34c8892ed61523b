mod error;
mod service;
pub mod validate;

pub use error::{Error, ErrorKind};
pub use service::{NewService, Result, Service};
pub use validate::{AccountRequest, FieldErrors, SubmissionRequest, ValidAccount, ValidSubmission};
