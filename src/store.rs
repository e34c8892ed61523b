use diesel::Connection;
use log::debug;

use crate::customer::{self, Customer, NewCustomer};
use crate::db::{self, PgPool};
use crate::mandate::{self, GeneratedPdf, MandateDetails, MandateSummary, NewMandateRecord};
use crate::types::{Id, Time};

/// Storage handle shared by the token gate, the submission pipeline and document archiving
///
/// Implementations enforce the one-mandate-per-customer rule themselves; callers
/// hold no locks.
pub trait MandateStore: Send + Sync {
	fn create_customer(&self, new_customer: &NewCustomer, token: &str, expiry: Time) -> db::Result<Customer>;

	fn find_customer(&self, id: &Id) -> db::Result<Customer>;

	fn find_customer_by_token(&self, token: &str) -> db::Result<Customer>;

	/// Mark pending customers whose token expired before `now` as expired
	fn expire_stale_customers(&self, now: Time) -> db::Result<usize>;

	/// Atomically claim the customer, insert the mandate and its accounts
	///
	/// Returns [`db::Error::Conflict`] when the customer was already submitted,
	/// leaving no rows behind.
	fn create_mandate(&self, record: &NewMandateRecord) -> db::Result<MandateDetails>;

	fn find_mandate(&self, id: &Id) -> db::Result<MandateDetails>;

	fn list_mandates(&self) -> db::Result<Vec<MandateSummary>>;

	fn record_generated_pdf(&self, mandate_id: &Id, file_path: &str) -> db::Result<GeneratedPdf>;
}

/// PostgreSQL-backed store
#[derive(Clone)]
pub struct PgStore {
	db: PgPool,
}

impl PgStore {
	pub fn new(db: PgPool) -> Self {
		PgStore { db }
	}
}

impl MandateStore for PgStore {
	fn create_customer(&self, new_customer: &NewCustomer, token: &str, expiry: Time) -> db::Result<Customer> {
		let mut conn = self.db.get()?;
		customer::Repo::new(&mut conn).create(new_customer, token, expiry)
	}

	fn find_customer(&self, id: &Id) -> db::Result<Customer> {
		let mut conn = self.db.get()?;
		customer::Repo::new(&mut conn).find_by_id(id)
	}

	fn find_customer_by_token(&self, token: &str) -> db::Result<Customer> {
		let mut conn = self.db.get()?;
		customer::Repo::new(&mut conn).find_by_token(token)
	}

	fn expire_stale_customers(&self, now: Time) -> db::Result<usize> {
		let mut conn = self.db.get()?;
		customer::Repo::new(&mut conn).expire_stale(now)
	}

	fn create_mandate(&self, record: &NewMandateRecord) -> db::Result<MandateDetails> {
		let mut conn = self.db.get()?;
		conn.transaction::<MandateDetails, db::Error, _>(|conn| {
			// the guarded update takes the row lock first, so a racing submission
			// waits here and then matches nothing
			let customer = customer::Repo::new(conn).claim_for_submission(&record.customer_id)?;
			let (mandate, accounts) = mandate::Repo::new(conn).create(record)?;
			debug!(
				target: "mandate::store",
				"created mandate {} with {} account(s) for customer {}",
				mandate.id, accounts.len(), customer.id,
			);

			Ok(MandateDetails { mandate, customer, accounts })
		})
	}

	fn find_mandate(&self, id: &Id) -> db::Result<MandateDetails> {
		let mut conn = self.db.get()?;
		mandate::Repo::new(&mut conn).find_details(id)
	}

	fn list_mandates(&self) -> db::Result<Vec<MandateSummary>> {
		let mut conn = self.db.get()?;
		mandate::Repo::new(&mut conn).list_summaries()
	}

	fn record_generated_pdf(&self, mandate_id: &Id, file_path: &str) -> db::Result<GeneratedPdf> {
		let mut conn = self.db.get()?;
		mandate::Repo::new(&mut conn).record_pdf(mandate_id, file_path)
	}
}
