pub mod canvas;
pub mod compose;
pub mod error;
pub mod font;
pub mod layout;
pub mod signature;
pub mod template;

use std::sync::Arc;

use image::RgbImage;
use log::warn;

use crate::crypto::FieldCipher;
use crate::mandate::{AccountOrder, MandateDetails};
use crate::signature_store::SignatureStore;
use crate::types::{format_date, Id};

pub use error::{Error, Result};
use signature::Signature;
use template::Template;

/// Title written to the document information dictionary
pub const DOCUMENT_TITLE: &str = "Direct Debit Mandate";

pub const PRODUCER: &str = "mandate_api";

/// One account line as printed, with the account number in clear
#[derive(Debug, Clone, PartialEq)]
pub struct AccountLine {
	pub order: AccountOrder,
	pub bank_name: String,
	pub branch: String,
	pub account_name: String,
	pub account_number: String,
}

/// Everything printed on a mandate document, already decrypted and formatted
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentContent {
	pub mandate_id: Id,
	pub reference: String,
	pub customer_name: String,
	pub customer_phone: String,
	pub national_id: String,
	pub loan_balance: Option<String>,
	pub monthly_repayment: Option<String>,
	pub start_date: Option<String>,
	pub no_of_months: Option<String>,
	/// Day the mandate was submitted, printed as the document and signing date
	pub submitted_on: String,
	pub ip_address: Option<String>,
	pub accounts: Vec<AccountLine>,
	pub signature: Signature,
}

impl DocumentContent {
	/// Decrypt protected fields and format values for printing
	///
	/// Any field that fails to decrypt aborts the document.
	pub fn prepare(details: &MandateDetails, cipher: &FieldCipher, signatures: &SignatureStore) -> Result<DocumentContent> {
		let MandateDetails { mandate, customer, accounts } = details;

		let accounts = accounts
			.iter()
			.map(|a| -> Result<AccountLine> {
				Ok(AccountLine {
					order: a.account_order,
					bank_name: a.bank_name.clone(),
					branch: a.branch.clone(),
					account_name: a.account_name.clone(),
					account_number: cipher.decrypt(&a.account_number)?,
				})
			})
			.collect::<Result<Vec<_>>>()?;

		Ok(DocumentContent {
			mandate_id: mandate.id,
			reference: mandate.reference(),
			customer_name: customer.full_name.clone(),
			customer_phone: customer.phone_number.clone(),
			national_id: cipher.decrypt(&mandate.ghana_card_number)?,
			loan_balance: customer.loan_balance.as_ref().map(|v| v.with_scale(2).to_string()),
			monthly_repayment: customer.monthly_repayment.as_ref().map(|v| v.with_scale(2).to_string()),
			start_date: customer.start_date.as_ref().map(format_date),
			no_of_months: customer.no_of_months.map(|n| n.to_string()),
			submitted_on: format_date(&mandate.submitted_at.date_naive()),
			ip_address: mandate.ip_address.clone().filter(|ip| !ip.trim().is_empty()),
			accounts,
			signature: Signature::load(mandate.digital_signature_path.as_deref(), signatures),
		})
	}

	pub fn ip_or_na(&self) -> &str {
		self.ip_address.as_deref().unwrap_or("N/A")
	}
}

/// Produces mandate PDFs from stored mandate details
pub struct Renderer {
	cipher: Arc<FieldCipher>,
	signatures: SignatureStore,
	template: Template,
	logo: Option<RgbImage>,
	fallback: bool,
}

impl Renderer {
	pub fn new(cipher: Arc<FieldCipher>, signatures: SignatureStore, template: Template) -> Self {
		Renderer { cipher, signatures, template, logo: None, fallback: false }
	}

	/// Branding image drawn over the template's logo placeholder
	pub fn with_logo(mut self, logo: RgbImage) -> Self {
		self.logo = Some(logo);
		self
	}

	/// Compose a plain document when the template file is missing
	pub fn with_fallback(mut self, fallback: bool) -> Self {
		self.fallback = fallback;
		self
	}

	pub fn template(&self) -> &Template {
		&self.template
	}

	pub fn render(&self, details: &MandateDetails) -> Result<Vec<u8>> {
		let content = DocumentContent::prepare(details, &self.cipher, &self.signatures)?;
		match self.template.render(&content, self.logo.as_ref()) {
			Err(Error::TemplateMissing(path)) if self.fallback => {
				warn!(
					target: "mandate::render",
					"template {} missing, composing mandate {} without it", path.display(), content.mandate_id,
				);
				compose::compose(&content)
			}
			other => other,
		}
	}
}
