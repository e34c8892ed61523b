use std::io::Write;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use diesel::{
	deserialize::{self, FromSql},
	pg::{Pg, PgValue},
	prelude::*,
	serialize::{self, IsNull, Output, ToSql},
	sql_types::Varchar,
};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::db;
use crate::schema::customers;
use crate::types::{Date, Id, Time};

/// A borrower invited to sign a direct-debit mandate
#[derive(Queryable, Identifiable, Clone, PartialEq, Debug)]
#[diesel(table_name = customers)]
pub struct Customer {
	pub id: Id,
	pub full_name: String,
	pub phone_number: String,
	pub loan_balance: Option<BigDecimal>,
	pub monthly_repayment: Option<BigDecimal>,
	pub start_date: Option<Date>,
	/// Loan term in months
	pub no_of_months: Option<i32>,
	pub status: CustomerStatus,
	/// Single-use token carried by the SMS link, cleared on submission
	pub session_token: Option<String>,
	pub token_expiry: Option<Time>,
	pub created_at: Time,
}

#[derive(Debug, Clone, Copy, AsExpression, FromSqlRow, Eq, PartialEq, EnumString, Display, AsRefStr)]
#[diesel(sql_type = Varchar)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum CustomerStatus {
	/// Invited, mandate not yet received
	Pending,
	/// Mandate received; terminal
	Submitted,
	/// Link lapsed before a mandate was received
	Expired,
}

impl Default for CustomerStatus {
	fn default() -> Self { CustomerStatus::Pending }
}

impl ToSql<Varchar, Pg> for CustomerStatus {
	fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
		out.write_all(self.as_ref().as_bytes())?;
		Ok(IsNull::No)
	}
}

impl FromSql<Varchar, Pg> for CustomerStatus {
	fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
		let s = std::str::from_utf8(bytes.as_bytes())?;
		CustomerStatus::from_str(s).map_err(|_| format!("invalid customer status: {}", s).into())
	}
}

/// Fully-typed customer creation request handed over by the import and admin flows
#[derive(Debug, Clone)]
pub struct NewCustomer {
	pub full_name: String,
	pub phone_number: String,
	pub loan_balance: Option<BigDecimal>,
	pub monthly_repayment: Option<BigDecimal>,
	pub start_date: Option<Date>,
	pub no_of_months: Option<i32>,
}

#[derive(Insertable)]
#[diesel(table_name = customers)]
pub(crate) struct CustomerRow<'a> {
	pub full_name: &'a str,
	pub phone_number: &'a str,
	pub loan_balance: Option<BigDecimal>,
	pub monthly_repayment: Option<BigDecimal>,
	pub start_date: Option<Date>,
	pub no_of_months: Option<i32>,
	pub status: CustomerStatus,
	pub session_token: &'a str,
	pub token_expiry: Time,
}

/// Data store implementation for operating on customers in the database
pub struct Repo<'a> {
	conn: &'a mut PgConnection,
}

impl<'a> Repo<'a> {
	pub fn new(conn: &'a mut PgConnection) -> Self {
		Repo { conn }
	}

	/// Insert a pending customer holding a freshly issued token
	pub fn create(&mut self, new_customer: &NewCustomer, token: &str, expiry: Time) -> db::Result<Customer> {
		diesel::insert_into(customers::table)
			.values(CustomerRow {
				full_name: &new_customer.full_name,
				phone_number: &new_customer.phone_number,
				loan_balance: new_customer.loan_balance.clone(),
				monthly_repayment: new_customer.monthly_repayment.clone(),
				start_date: new_customer.start_date,
				no_of_months: new_customer.no_of_months,
				status: CustomerStatus::Pending,
				session_token: token,
				token_expiry: expiry,
			})
			.get_result(self.conn)
			.map_err(Into::into)
	}

	pub fn find_by_id(&mut self, id: &Id) -> db::Result<Customer> {
		customers::table
			.find(id)
			.first::<Customer>(self.conn)
			.map_err(Into::into)
	}

	pub fn find_by_token(&mut self, token: &str) -> db::Result<Customer> {
		customers::table
			.filter(customers::session_token.eq(token))
			.first::<Customer>(self.conn)
			.map_err(Into::into)
	}

	/// Mark the customer as submitted and clear its token
	///
	/// Only matches a customer that has not submitted yet. Concurrent callers
	/// serialize on the row lock and the loser observes [`db::Error::Conflict`];
	/// an unknown id gives [`db::Error::RecordNotFound`].
	pub fn claim_for_submission(&mut self, id: &Id) -> db::Result<Customer> {
		let claimed = diesel::update(
			customers::table
				.find(id)
				.filter(customers::status.ne(CustomerStatus::Submitted)),
		)
			.set((
				customers::status.eq(CustomerStatus::Submitted),
				customers::session_token.eq(None::<String>),
			))
			.get_result::<Customer>(self.conn)
			.optional()?;

		match claimed {
			Some(customer) => Ok(customer),
			None => {
				let exists: i64 = customers::table.find(id).count().get_result(self.conn)?;
				Err(if exists == 0 { db::Error::RecordNotFound } else { db::Error::Conflict })
			}
		}
	}

	/// Expire pending customers whose token lapsed before `now`
	pub fn expire_stale(&mut self, now: Time) -> db::Result<usize> {
		diesel::update(
			customers::table
				.filter(customers::status.eq(CustomerStatus::Pending))
				.filter(customers::token_expiry.lt(now)),
		)
			.set(customers::status.eq(CustomerStatus::Expired))
			.execute(self.conn)
			.map_err(Into::into)
	}
}
