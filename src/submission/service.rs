use std::sync::Arc;

use log::{debug, error, info, warn};

use crate::crypto::FieldCipher;
use crate::customer::CustomerStatus;
use crate::db;
use crate::documents::Archiver;
use crate::mandate::{GeneratedPdf, MandateDetails, NewAccountRecord, NewMandateRecord};
use crate::signature_store::SignatureStore;
use crate::store::MandateStore;
use crate::types::{Clock, Id};

use super::error::{Error, ErrorKind};
use super::validate::{self, SubmissionRequest};

pub type Result<T> = std::result::Result<T, Error>;

/// Service accepting mandate submissions from the public form
pub struct Service {
	store: Arc<dyn MandateStore>,
	cipher: Arc<FieldCipher>,
	signatures: SignatureStore,
	clock: Arc<dyn Clock>,
	archiver: Option<Arc<Archiver>>,
}

/// Parameter object for creating a new Service
pub struct NewService {
	pub store: Arc<dyn MandateStore>,
	pub cipher: Arc<FieldCipher>,
	pub signatures: SignatureStore,
	pub clock: Arc<dyn Clock>,
}

impl Service {
	pub fn new(v: NewService) -> Self {
		Service {
			store: v.store,
			cipher: v.cipher,
			signatures: v.signatures,
			clock: v.clock,
			archiver: None,
		}
	}

	/// Render and keep a copy of every accepted mandate
	pub fn with_archiver(mut self, archiver: Arc<Archiver>) -> Self {
		self.archiver = Some(archiver);
		self
	}

	/// Validate, encrypt and store a mandate, closing the customer's link
	///
	/// Either the mandate, its accounts and the customer's status change are
	/// all stored, or none of them are.
	///
	/// # Arguments
	/// * `request` - form body as posted
	/// * `client_ip` - best-effort address of the submitting client
	pub fn submit(&self, request: &SubmissionRequest, client_ip: Option<&str>) -> Result<MandateDetails> {
		let valid = validate::validate(request).map_err(|errors| {
			debug!(target: "mandate::submission", "rejected submission: {:?}", errors);
			Error::from(errors)
		})?;

		let customer = match self.store.find_customer(&valid.customer_id) {
			Ok(c) => c,
			Err(db::Error::RecordNotFound) => return Err(ErrorKind::CustomerNotFound.into()),
			Err(e) => {
				error!(target: "mandate::submission", "loading customer {}: {}", valid.customer_id, e);
				return Err(ErrorKind::Storage(e).into());
			}
		};
		if customer.status == CustomerStatus::Submitted {
			return Err(ErrorKind::AlreadySubmitted.into());
		}

		let national_id = self.cipher.encrypt(&valid.national_id)?;
		let accounts = valid.accounts
			.iter()
			.map(|a| -> Result<NewAccountRecord> {
				Ok(NewAccountRecord {
					account_order: a.order,
					bank_name: a.bank_name.clone(),
					branch: a.branch.clone(),
					account_name: a.account_name.clone(),
					account_number: self.cipher.encrypt(&a.account_number)?,
				})
			})
			.collect::<Result<Vec<_>>>()?;

		let signature_name = format!("signature_{}_{}", customer.id, Id::new_v4().simple());
		let signature = self.signatures
			.persist(&valid.signature, &signature_name)
			.map_err(|e| {
				error!(target: "mandate::submission", "storing signature for customer {}: {}", customer.id, e);
				Error::new(ErrorKind::Signature(e.to_string()))
			})?;

		let record = NewMandateRecord {
			customer_id: customer.id,
			ghana_card_number: national_id,
			agreement_accepted: true,
			digital_signature_path: Some(signature.clone()),
			submitted_at: self.clock.now(),
			ip_address: client_ip.map(str::trim).filter(|ip| !ip.is_empty()).map(String::from),
			accounts,
		};

		let details = self.store.create_mandate(&record).map_err(|e| {
			match e {
				db::Error::Conflict | db::Error::RecordNotFound => self.signatures.discard(&signature),
				db::Error::RecordAlreadyExists => {
					error!(target: "mandate::submission", "storing mandate for customer {}: {}", customer.id, e);
					self.signatures.discard(&signature);
				}
				// the commit may have gone through, so the signature stays
				_ => error!(target: "mandate::submission", "storing mandate for customer {}: {}", customer.id, e),
			}
			Error::from(e)
		})?;

		info!(
			target: "mandate::submission",
			"mandate {} submitted for customer {} with {} account(s)",
			details.mandate.id, customer.id, details.accounts.len(),
		);
		Ok(details)
	}

	/// Best-effort document copy of a freshly submitted mandate
	///
	/// Failures are logged and never affect the stored mandate; the document
	/// can be rendered again on demand.
	pub fn archive(&self, details: &MandateDetails) -> Option<GeneratedPdf> {
		let archiver = self.archiver.as_ref()?;
		match archiver.archive(details) {
			Ok(pdf) => Some(pdf),
			Err(e) => {
				warn!(target: "mandate::submission", "archiving mandate {}: {}", details.mandate.id, e);
				None
			}
		}
	}
}
