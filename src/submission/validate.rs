use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::mandate::AccountOrder;
use crate::types::Id;

/// National ID: three capital letters, nine digits and a check digit, dash separated
static NATIONAL_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z]{3}-[0-9]{9}-[0-9]$").expect("national id pattern"));

pub const MIN_ACCOUNTS: usize = 1;
pub const MAX_ACCOUNTS: usize = 3;
const MIN_NAME_LEN: usize = 2;
const MIN_ACCOUNT_NUMBER_LEN: usize = 8;

/// Mandate form body as posted by the public form
///
/// Every field defaults so that missing values surface as field errors rather
/// than as a rejected body.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubmissionRequest {
	pub customer_id: String,
	pub full_name: String,
	pub ghana_card_number: String,
	pub accounts: Vec<AccountRequest>,
	pub agreement_accepted: Option<bool>,
	/// Signature image as a data URI
	pub signature: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AccountRequest {
	pub account_order: String,
	pub bank_name: String,
	pub branch: String,
	pub account_name: String,
	pub account_number: String,
}

/// Field path to messages, e.g. `accounts[1].branch`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors {
	fields: BTreeMap<String, Vec<String>>,
}

impl FieldErrors {
	pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
		self.fields.entry(field.into()).or_default().push(message.into());
	}

	pub fn is_empty(&self) -> bool {
		self.fields.is_empty()
	}

	pub fn has(&self, field: &str) -> bool {
		self.fields.contains_key(field)
	}

	pub fn get(&self, field: &str) -> &[String] {
		self.fields.get(field).map(Vec::as_slice).unwrap_or_default()
	}

	pub fn fields(&self) -> impl Iterator<Item = &str> {
		self.fields.keys().map(String::as_str)
	}
}

/// A submission that passed validation, trimmed and fully typed
#[derive(Debug, Clone, PartialEq)]
pub struct ValidSubmission {
	pub customer_id: Id,
	pub full_name: String,
	pub national_id: String,
	pub accounts: Vec<ValidAccount>,
	pub signature: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidAccount {
	pub order: AccountOrder,
	pub bank_name: String,
	pub branch: String,
	pub account_name: String,
	pub account_number: String,
}

fn text_field(errors: &mut FieldErrors, field: &str, value: &str, min: usize, message: &str) -> String {
	let value = value.trim();
	if value.chars().count() < min {
		errors.add(field, message);
	}
	value.to_string()
}

/// Check every field, collecting all problems before giving up
pub fn validate(request: &SubmissionRequest) -> Result<ValidSubmission, FieldErrors> {
	let mut errors = FieldErrors::default();

	let customer_id = match Id::parse_str(request.customer_id.trim()) {
		Ok(id) => Some(id),
		Err(_) => {
			errors.add("customerId", "A valid customer id is required.");
			None
		}
	};

	let full_name = text_field(
		&mut errors, "fullName", &request.full_name, MIN_NAME_LEN,
		"Full name must be at least 2 characters.",
	);

	// checked as sent; surrounding whitespace is a format error
	let national_id = request.ghana_card_number.clone();
	if !NATIONAL_ID.is_match(&national_id) {
		errors.add("ghanaCardNumber", "Invalid Ghana Card Number format (e.g., GHA-123456789-0).");
	}

	if request.accounts.len() < MIN_ACCOUNTS {
		errors.add("accounts", "At least one account is required.");
	} else if request.accounts.len() > MAX_ACCOUNTS {
		errors.add("accounts", "No more than three accounts may be submitted.");
	}

	let mut seen = BTreeSet::new();
	let mut accounts = Vec::with_capacity(request.accounts.len());
	for (i, account) in request.accounts.iter().enumerate() {
		let path = |field: &str| format!("accounts[{}].{}", i, field);

		let order = match AccountOrder::from_str(account.account_order.trim()) {
			Ok(order) if !seen.insert(order) => {
				errors.add(path("accountOrder"), "Each account order may only be used once.");
				None
			}
			Ok(order) => Some(order),
			Err(_) => {
				errors.add(path("accountOrder"), "Account order must be one of 1ST, 2ND or 3RD.");
				None
			}
		};
		let bank_name = text_field(&mut errors, &path("bankName"), &account.bank_name, MIN_NAME_LEN, "Bank name is required.");
		let branch = text_field(&mut errors, &path("branch"), &account.branch, MIN_NAME_LEN, "Branch name is required.");
		let account_name = text_field(
			&mut errors, &path("accountName"), &account.account_name, MIN_NAME_LEN,
			"Account name is required.",
		);
		let account_number = text_field(
			&mut errors, &path("accountNumber"), &account.account_number, MIN_ACCOUNT_NUMBER_LEN,
			"Account number must be at least 8 characters.",
		);

		if let Some(order) = order {
			accounts.push(ValidAccount { order, bank_name, branch, account_name, account_number });
		}
	}

	if request.agreement_accepted != Some(true) {
		errors.add("agreementAccepted", "You must accept the terms and conditions.");
	}

	let signature = request.signature.trim().to_string();
	if signature.is_empty() {
		errors.add("signature", "Signature is required.");
	}

	match customer_id {
		Some(customer_id) if errors.is_empty() => {
			accounts.sort_by_key(|a| a.order);
			Ok(ValidSubmission { customer_id, full_name, national_id, accounts, signature })
		}
		_ => Err(errors),
	}
}
