use std::io::Write;
use std::str::FromStr;

use diesel::{
	deserialize::{self, FromSql},
	pg::{Pg, PgValue},
	prelude::*,
	serialize::{self, IsNull, Output, ToSql},
	sql_types::Varchar,
};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::customer::Customer;
use crate::db;
use crate::schema::{customers, direct_debit_accounts, direct_debit_mandates, generated_pdfs};
use crate::types::{Id, Time};

/// A customer's signed authorization for recurring direct debits
///
/// Immutable once created. `ghana_card_number` holds ciphertext.
#[derive(Queryable, Identifiable, Clone, PartialEq, Debug)]
#[diesel(table_name = direct_debit_mandates)]
pub struct Mandate {
	pub id: Id,
	pub customer_id: Id,
	pub ghana_card_number: String,
	pub agreement_accepted: bool,
	/// Inline data URI or a reference into signature storage
	pub digital_signature_path: Option<String>,
	pub submitted_at: Time,
	pub ip_address: Option<String>,
}

impl Mandate {
	/// Short human-legible reference printed on the document
	pub fn reference(&self) -> String {
		self.id.simple().to_string()[..8].to_uppercase()
	}
}

/// A bank account debited under a mandate. `account_number` holds ciphertext.
#[derive(Queryable, Identifiable, Clone, PartialEq, Debug)]
#[diesel(table_name = direct_debit_accounts)]
pub struct Account {
	pub id: Id,
	pub mandate_id: Id,
	pub account_order: AccountOrder,
	pub bank_name: String,
	pub branch: String,
	pub account_name: String,
	pub account_number: String,
}

/// Priority rank of an account within one mandate
#[derive(
	Debug, Clone, Copy, AsExpression, FromSqlRow, Eq, PartialEq, Ord, PartialOrd, Hash,
	EnumString, Display, AsRefStr, Serialize, Deserialize,
)]
#[diesel(sql_type = Varchar)]
pub enum AccountOrder {
	#[strum(serialize = "1ST")]
	#[serde(rename = "1ST")]
	First,
	#[strum(serialize = "2ND")]
	#[serde(rename = "2ND")]
	Second,
	#[strum(serialize = "3RD")]
	#[serde(rename = "3RD")]
	Third,
}

impl ToSql<Varchar, Pg> for AccountOrder {
	fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
		out.write_all(self.as_ref().as_bytes())?;
		Ok(IsNull::No)
	}
}

impl FromSql<Varchar, Pg> for AccountOrder {
	fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
		let s = std::str::from_utf8(bytes.as_bytes())?;
		AccountOrder::from_str(s).map_err(|_| format!("invalid account order: {}", s).into())
	}
}

/// Record that a document was rendered and where it was written
#[derive(Queryable, Identifiable, Clone, PartialEq, Debug)]
#[diesel(table_name = generated_pdfs)]
pub struct GeneratedPdf {
	pub id: Id,
	pub mandate_id: Id,
	pub file_path: String,
	pub generated_at: Time,
}

/// A mandate loaded together with its customer and accounts (ordered by rank)
#[derive(Clone, PartialEq, Debug)]
pub struct MandateDetails {
	pub mandate: Mandate,
	pub customer: Customer,
	pub accounts: Vec<Account>,
}

/// Row of the submitted-mandates listing
#[derive(Clone, PartialEq, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MandateSummary {
	pub id: Id,
	pub submitted_at: Time,
	pub customer_id: Id,
	pub customer_name: String,
	pub customer_phone: String,
	pub account_count: usize,
	pub pdf_path: Option<String>,
	pub ip_address: Option<String>,
}

/// Everything needed to persist a mandate; sensitive fields are already encrypted
#[derive(Clone, Debug)]
pub struct NewMandateRecord {
	pub customer_id: Id,
	pub ghana_card_number: String,
	pub agreement_accepted: bool,
	pub digital_signature_path: Option<String>,
	pub submitted_at: Time,
	pub ip_address: Option<String>,
	pub accounts: Vec<NewAccountRecord>,
}

#[derive(Clone, Debug)]
pub struct NewAccountRecord {
	pub account_order: AccountOrder,
	pub bank_name: String,
	pub branch: String,
	pub account_name: String,
	pub account_number: String,
}

#[derive(Insertable)]
#[diesel(table_name = direct_debit_mandates)]
struct NewMandate<'a> {
	customer_id: Id,
	ghana_card_number: &'a str,
	agreement_accepted: bool,
	digital_signature_path: Option<&'a str>,
	submitted_at: Time,
	ip_address: Option<&'a str>,
}

#[derive(Insertable)]
#[diesel(table_name = direct_debit_accounts)]
struct NewAccount<'a> {
	mandate_id: Id,
	account_order: AccountOrder,
	bank_name: &'a str,
	branch: &'a str,
	account_name: &'a str,
	account_number: &'a str,
}

#[derive(Insertable)]
#[diesel(table_name = generated_pdfs)]
struct NewGeneratedPdf<'a> {
	mandate_id: Id,
	file_path: &'a str,
}

/// Data store implementation for mandates and their owned rows
pub struct Repo<'a> {
	conn: &'a mut PgConnection,
}

impl<'a> Repo<'a> {
	pub fn new(conn: &'a mut PgConnection) -> Self {
		Repo { conn }
	}

	/// Insert the mandate and its accounts
	///
	/// Callers run this inside the submission transaction.
	pub fn create(&mut self, record: &NewMandateRecord) -> db::Result<(Mandate, Vec<Account>)> {
		let mandate = diesel::insert_into(direct_debit_mandates::table)
			.values(NewMandate {
				customer_id: record.customer_id,
				ghana_card_number: &record.ghana_card_number,
				agreement_accepted: record.agreement_accepted,
				digital_signature_path: record.digital_signature_path.as_deref(),
				submitted_at: record.submitted_at,
				ip_address: record.ip_address.as_deref(),
			})
			.get_result::<Mandate>(self.conn)?;

		let rows: Vec<NewAccount> = record.accounts
			.iter()
			.map(|a| NewAccount {
				mandate_id: mandate.id,
				account_order: a.account_order,
				bank_name: &a.bank_name,
				branch: &a.branch,
				account_name: &a.account_name,
				account_number: &a.account_number,
			})
			.collect();

		let mut accounts = diesel::insert_into(direct_debit_accounts::table)
			.values(&rows)
			.get_results::<Account>(self.conn)?;
		accounts.sort_by_key(|a| a.account_order);

		Ok((mandate, accounts))
	}

	pub fn find_details(&mut self, id: &Id) -> db::Result<MandateDetails> {
		let (mandate, customer) = direct_debit_mandates::table
			.inner_join(customers::table)
			.filter(direct_debit_mandates::id.eq(id))
			.first::<(Mandate, Customer)>(self.conn)?;

		let accounts = direct_debit_accounts::table
			.filter(direct_debit_accounts::mandate_id.eq(id))
			.order(direct_debit_accounts::account_order.asc())
			.load::<Account>(self.conn)?;

		Ok(MandateDetails { mandate, customer, accounts })
	}

	/// Submitted mandates, newest first, with the latest generated document
	pub fn list_summaries(&mut self) -> db::Result<Vec<MandateSummary>> {
		let rows = direct_debit_mandates::table
			.inner_join(customers::table)
			.order(direct_debit_mandates::submitted_at.desc())
			.load::<(Mandate, Customer)>(self.conn)?;

		let mut summaries = Vec::with_capacity(rows.len());
		for (mandate, customer) in rows {
			let account_count: i64 = direct_debit_accounts::table
				.filter(direct_debit_accounts::mandate_id.eq(mandate.id))
				.count()
				.get_result(self.conn)?;
			let pdf_path = generated_pdfs::table
				.filter(generated_pdfs::mandate_id.eq(mandate.id))
				.order(generated_pdfs::generated_at.desc())
				.select(generated_pdfs::file_path)
				.first::<String>(self.conn)
				.optional()?;

			summaries.push(MandateSummary {
				id: mandate.id,
				submitted_at: mandate.submitted_at,
				customer_id: customer.id,
				customer_name: customer.full_name,
				customer_phone: customer.phone_number,
				account_count: account_count as usize,
				pdf_path,
				ip_address: mandate.ip_address,
			});
		}
		Ok(summaries)
	}

	pub fn record_pdf(&mut self, mandate_id: &Id, file_path: &str) -> db::Result<GeneratedPdf> {
		diesel::insert_into(generated_pdfs::table)
			.values(NewGeneratedPdf { mandate_id: *mandate_id, file_path })
			.get_result(self.conn)
			.map_err(Into::into)
	}
}
