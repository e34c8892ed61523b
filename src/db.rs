use diesel::PgConnection;
use diesel::r2d2::ConnectionManager;
use diesel::result::DatabaseErrorKind::UniqueViolation;
use diesel::result::Error::{DatabaseError, NotFound};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;
pub type PgPool = r2d2::Pool<ConnectionManager<PgConnection>>;

/// Build a connection pool for the PostgreSQL database at `database_url`
///
/// The pool is created once at startup and handed to every store explicitly.
pub fn pg_connection(database_url: &str) -> Result<PgPool> {
	let manager = ConnectionManager::<PgConnection>::new(database_url);
	r2d2::Pool::builder()
		.build(manager)
		.map_err(Into::into)
}

/// Error that can occur when querying against the database
#[derive(Debug, Error, PartialEq)]
pub enum Error {
	#[error("record violates a unique constraint")]
	RecordAlreadyExists,
	#[error("record does not exist")]
	RecordNotFound,
	/// A guarded write matched no row because the record is not in the expected state
	#[error("record is not in the expected state")]
	Conflict,
	#[error("opening database connection: {0}")]
	Connection(String),
	/// Used as a catch-all for other diesel errors
	#[error("database error: {0}")]
	DatabaseError(diesel::result::Error),
}

impl From<diesel::result::Error> for Error {
	fn from(e: diesel::result::Error) -> Self {
		match e {
			DatabaseError(UniqueViolation, _) => Error::RecordAlreadyExists,
			NotFound => Error::RecordNotFound,

			_ => Error::DatabaseError(e),
		}
	}
}

impl From<r2d2::Error> for Error {
	fn from(e: r2d2::Error) -> Self {
		Error::Connection(e.to_string())
	}
}
