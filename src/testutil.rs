use std::collections::HashMap;
use std::io::Cursor;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
pub use bigdecimal::BigDecimal;
use chrono::{Duration, TimeZone, Utc};
use image::{ImageFormat, Rgba, RgbaImage};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use tempfile::TempDir;

use crate::crypto::{FieldCipher, KEY_LEN};
use crate::customer::{Customer, CustomerStatus, NewCustomer};
use crate::db;
use crate::mandate::{Account, AccountOrder, GeneratedPdf, Mandate, MandateDetails, MandateSummary, NewMandateRecord};
use crate::render::layout::LayoutTable;
use crate::render::template::Template;
use crate::render::Renderer;
use crate::session::{self, Gate};
use crate::signature_store::SignatureStore;
use crate::store::MandateStore;
use crate::submission::{AccountRequest, NewService, Service, SubmissionRequest};
use crate::types::{Clock, Date, Id, Time};

/// Bank, branch, holder and number of the three accounts used across tests
pub const ACCOUNTS: [(&str, &str, &str, &str, &str); 3] = [
	("1ST", "GCB Bank", "Makola", "Ama Mensah", "0011223344"),
	("2ND", "Ecobank", "Osu", "Ama K. Mensah", "0055667788"),
	("3RD", "Fidelity Bank", "Adum", "Ama Mensah", "0099001122"),
];

pub const NATIONAL_ID: &str = "GHA-123456789-0";

pub fn fixed_now() -> Time {
	Utc.with_ymd_and_hms(2024, 6, 3, 9, 30, 0).unwrap()
}

pub struct FixedClock(pub Time);

impl Clock for FixedClock {
	fn now(&self) -> Time {
		self.0
	}
}

pub struct Fixture {
	pub store: Arc<MemoryStore>,
	pub cipher: Arc<FieldCipher>,
	pub clock: Arc<FixedClock>,
	pub customer_factory: CustomerFactory,
}

impl Fixture {
	pub fn new() -> Self {
		Fixture {
			store: Arc::new(MemoryStore::default()),
			cipher: Arc::new(FieldCipher::new([42u8; KEY_LEN])),
			clock: Arc::new(FixedClock(fixed_now())),
			customer_factory: CustomerFactory,
		}
	}

	pub fn insert(&self, customer: Customer) -> Customer {
		self.store.put_customer(customer)
	}

	pub fn gate(&self) -> Gate {
		Gate::new(self.store.clone(), self.clock.clone())
	}

	pub fn service(&self) -> Service {
		self.service_with(SignatureStore::Inline)
	}

	pub fn service_with(&self, signatures: SignatureStore) -> Service {
		Service::new(NewService {
			store: self.store.clone(),
			cipher: self.cipher.clone(),
			signatures,
			clock: self.clock.clone(),
		})
	}

	/// A submitted mandate for Ama with the first `accounts` test accounts
	pub fn details(&self, accounts: usize) -> MandateDetails {
		let mut customer = self.customer_factory.ama();
		customer.status = CustomerStatus::Submitted;
		customer.session_token = None;

		let mandate = Mandate {
			id: Id::new_v4(),
			customer_id: customer.id,
			ghana_card_number: self.cipher.encrypt(NATIONAL_ID).unwrap(),
			agreement_accepted: true,
			digital_signature_path: Some(png_data_uri(40, 20)),
			submitted_at: fixed_now(),
			ip_address: Some("102.176.1.20".into()),
		};
		let accounts = ACCOUNTS
			.iter()
			.take(accounts)
			.map(|(order, bank, branch, name, number)| Account {
				id: Id::new_v4(),
				mandate_id: mandate.id,
				account_order: AccountOrder::from_str(order).unwrap(),
				bank_name: bank.to_string(),
				branch: branch.to_string(),
				account_name: name.to_string(),
				account_number: self.cipher.encrypt(number).unwrap(),
			})
			.collect();

		MandateDetails { mandate, customer, accounts }
	}

	/// Renderer over the generated test template, kept alive by the returned directory
	pub fn renderer(&self) -> (Renderer, TempDir) {
		let (template, dir) = template_on_disk(&template_pdf());
		(Renderer::new(self.cipher.clone(), SignatureStore::Inline, template), dir)
	}

	pub fn renderer_with_template(&self, path: PathBuf) -> Renderer {
		let template = Template::new(path, "v1", &LayoutTable::builtin().unwrap()).unwrap();
		Renderer::new(self.cipher.clone(), SignatureStore::Inline, template)
	}
}

pub struct CustomerFactory;

impl CustomerFactory {
	pub fn defaults(&self) -> Customer {
		let (token, expiry) = session::issue(fixed_now(), Duration::hours(48));
		Customer {
			id: Id::new_v4(),
			full_name: "Default Customer".into(),
			phone_number: "0200000000".into(),
			loan_balance: None,
			monthly_repayment: None,
			start_date: None,
			no_of_months: None,
			status: CustomerStatus::Pending,
			session_token: Some(token),
			token_expiry: Some(expiry),
			created_at: fixed_now() - Duration::days(1),
		}
	}

	pub fn ama(&self) -> Customer {
		Customer {
			full_name: "Ama Mensah".into(),
			phone_number: "0241234567".into(),
			loan_balance: Some(BigDecimal::from(5000)),
			monthly_repayment: Some(BigDecimal::from_str("450.5").unwrap()),
			start_date: Date::from_ymd_opt(2024, 2, 1),
			no_of_months: Some(12),
			..self.defaults()
		}
	}

	pub fn kofi(&self) -> Customer {
		Customer {
			full_name: "Kofi Boateng".into(),
			phone_number: "0551234567".into(),
			..self.defaults()
		}
	}

	pub fn with_expiry(&self, expiry: Time) -> Customer {
		Customer { token_expiry: Some(expiry), ..self.ama() }
	}
}

/// Form body for `customer_id` carrying the first `accounts` test accounts (cycled past three)
pub fn submission_request(customer_id: &Id, accounts: usize) -> SubmissionRequest {
	SubmissionRequest {
		customer_id: customer_id.to_string(),
		full_name: "Ama Mensah".into(),
		ghana_card_number: NATIONAL_ID.into(),
		accounts: ACCOUNTS
			.iter()
			.cycle()
			.take(accounts)
			.map(|(order, bank, branch, name, number)| AccountRequest {
				account_order: order.to_string(),
				bank_name: bank.to_string(),
				branch: branch.to_string(),
				account_name: name.to_string(),
				account_number: number.to_string(),
			})
			.collect(),
		agreement_accepted: Some(true),
		signature: png_data_uri(40, 20),
	}
}

/// Opaque PNG signature of the given size as a data URI
pub fn png_data_uri(width: u32, height: u32) -> String {
	let img = RgbaImage::from_pixel(width, height, Rgba([20, 20, 60, 255]));
	let mut png = Vec::new();
	image::DynamicImage::ImageRgba8(img)
		.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
		.unwrap();
	format!("data:image/png;base64,{}", STANDARD.encode(png))
}

fn one_page_pdf(media_box: Vec<Object>) -> Vec<u8> {
	let mut doc = Document::with_version("1.5");
	let pages_id = doc.new_object_id();
	let font_id = doc.add_object(dictionary! {
		"Type" => "Font",
		"Subtype" => "Type1",
		"BaseFont" => "Courier",
	});
	let content = Content {
		operations: vec![
			Operation::new("BT", vec![]),
			Operation::new("Tf", vec!["F1".into(), 14.into()]),
			Operation::new("Td", vec![50.into(), 800.into()]),
			Operation::new("Tj", vec![Object::string_literal("MANDATE FORM")]),
			Operation::new("ET", vec![]),
		],
	};
	let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
	let page_id = doc.add_object(dictionary! {
		"Type" => "Page",
		"Parent" => pages_id,
		"Contents" => content_id,
	});
	// resources and page size are inherited from the page tree
	doc.objects.insert(
		pages_id,
		Object::Dictionary(dictionary! {
			"Type" => "Pages",
			"Kids" => vec![page_id.into()],
			"Count" => 1,
			"Resources" => dictionary! {
				"Font" => dictionary! { "F1" => font_id },
			},
			"MediaBox" => media_box,
		}),
	);
	let catalog_id = doc.add_object(dictionary! {
		"Type" => "Catalog",
		"Pages" => pages_id,
	});
	doc.trailer.set("Root", catalog_id);

	let mut out = Vec::new();
	doc.save_to(&mut out).unwrap();
	out
}

/// One A4 page with font `F1` and a single content stream
pub fn template_pdf() -> Vec<u8> {
	one_page_pdf(vec![0.into(), 0.into(), 595.28f32.into(), 841.89f32.into()])
}

/// One US Letter page
pub fn letter_pdf() -> Vec<u8> {
	one_page_pdf(vec![0.into(), 0.into(), 612.into(), 792.into()])
}

/// Strings shown with font resource `font` on the first page, in drawing order
pub fn shown_text(pdf: &[u8], font: &str) -> Vec<Vec<u8>> {
	let doc = Document::load_mem(pdf).unwrap();
	let page_id = *doc.get_pages().get(&1).unwrap();
	let content = Content::decode(&doc.get_page_content(page_id).unwrap()).unwrap();
	let mut current = Vec::new();
	let mut shown = Vec::new();
	for op in content.operations {
		match op.operator.as_str() {
			"Tf" => current = op.operands[0].as_name().unwrap().to_vec(),
			"Tj" if current == font.as_bytes() => shown.push(op.operands[0].as_str().unwrap().to_vec()),
			_ => {}
		}
	}
	shown
}

/// Write `pdf` to a temporary file and describe it with the built-in v1 layout
pub fn template_on_disk(pdf: &[u8]) -> (Template, TempDir) {
	let dir = tempfile::tempdir().unwrap();
	let path = dir.path().join("mandate_template.pdf");
	std::fs::write(&path, pdf).unwrap();
	let template = Template::new(path, "v1", &LayoutTable::builtin().unwrap()).unwrap();
	(template, dir)
}

#[derive(Default)]
struct State {
	customers: HashMap<Id, Customer>,
	mandates: Vec<MandateDetails>,
	pdfs: Vec<GeneratedPdf>,
	fail_next_mandate: Option<db::Error>,
}

/// In-memory [`MandateStore`] with the same claim-then-insert semantics as the database
#[derive(Default)]
pub struct MemoryStore {
	state: Mutex<State>,
}

impl MemoryStore {
	fn state(&self) -> MutexGuard<'_, State> {
		self.state.lock().unwrap()
	}

	pub fn put_customer(&self, customer: Customer) -> Customer {
		self.state().customers.insert(customer.id, customer.clone());
		customer
	}

	/// Store an already-built mandate along with its customer
	pub fn seed_mandate(&self, details: MandateDetails) -> MandateDetails {
		let mut state = self.state();
		state.customers.insert(details.customer.id, details.customer.clone());
		state.mandates.push(details.clone());
		details
	}

	/// Make the next `create_mandate` fail as if the database went away mid-transaction
	/// Make the next `create_mandate` roll back with `err`
	pub fn fail_next_mandate(&self, err: db::Error) {
		self.state().fail_next_mandate = Some(err);
	}

	pub fn mandates_for(&self, customer_id: &Id) -> Vec<MandateDetails> {
		self.state().mandates.iter().filter(|m| &m.customer.id == customer_id).cloned().collect()
	}

	pub fn generated_pdfs(&self, mandate_id: &Id) -> Vec<GeneratedPdf> {
		self.state().pdfs.iter().filter(|p| &p.mandate_id == mandate_id).cloned().collect()
	}
}

impl MandateStore for MemoryStore {
	fn create_customer(&self, new_customer: &NewCustomer, token: &str, expiry: Time) -> db::Result<Customer> {
		let mut state = self.state();
		if state.customers.values().any(|c| c.session_token.as_deref() == Some(token)) {
			return Err(db::Error::RecordAlreadyExists);
		}
		let customer = Customer {
			id: Id::new_v4(),
			full_name: new_customer.full_name.clone(),
			phone_number: new_customer.phone_number.clone(),
			loan_balance: new_customer.loan_balance.clone(),
			monthly_repayment: new_customer.monthly_repayment.clone(),
			start_date: new_customer.start_date,
			no_of_months: new_customer.no_of_months,
			status: CustomerStatus::Pending,
			session_token: Some(token.to_string()),
			token_expiry: Some(expiry),
			created_at: fixed_now(),
		};
		state.customers.insert(customer.id, customer.clone());
		Ok(customer)
	}

	fn find_customer(&self, id: &Id) -> db::Result<Customer> {
		self.state().customers.get(id).cloned().ok_or(db::Error::RecordNotFound)
	}

	fn find_customer_by_token(&self, token: &str) -> db::Result<Customer> {
		self.state()
			.customers
			.values()
			.find(|c| c.session_token.as_deref() == Some(token))
			.cloned()
			.ok_or(db::Error::RecordNotFound)
	}

	fn expire_stale_customers(&self, now: Time) -> db::Result<usize> {
		let mut state = self.state();
		let mut expired = 0;
		for customer in state.customers.values_mut() {
			let stale = matches!(customer.token_expiry, Some(expiry) if expiry < now);
			if customer.status == CustomerStatus::Pending && stale {
				customer.status = CustomerStatus::Expired;
				expired += 1;
			}
		}
		Ok(expired)
	}

	fn create_mandate(&self, record: &NewMandateRecord) -> db::Result<MandateDetails> {
		let mut state = self.state();
		if let Some(err) = state.fail_next_mandate.take() {
			return Err(err);
		}

		let customer = state.customers.get_mut(&record.customer_id).ok_or(db::Error::RecordNotFound)?;
		if customer.status == CustomerStatus::Submitted {
			return Err(db::Error::Conflict);
		}
		customer.status = CustomerStatus::Submitted;
		customer.session_token = None;
		let customer = customer.clone();

		let mandate = Mandate {
			id: Id::new_v4(),
			customer_id: record.customer_id,
			ghana_card_number: record.ghana_card_number.clone(),
			agreement_accepted: record.agreement_accepted,
			digital_signature_path: record.digital_signature_path.clone(),
			submitted_at: record.submitted_at,
			ip_address: record.ip_address.clone(),
		};
		let mut accounts: Vec<Account> = record.accounts
			.iter()
			.map(|a| Account {
				id: Id::new_v4(),
				mandate_id: mandate.id,
				account_order: a.account_order,
				bank_name: a.bank_name.clone(),
				branch: a.branch.clone(),
				account_name: a.account_name.clone(),
				account_number: a.account_number.clone(),
			})
			.collect();
		accounts.sort_by_key(|a| a.account_order);

		let details = MandateDetails { mandate, customer, accounts };
		state.mandates.push(details.clone());
		Ok(details)
	}

	fn find_mandate(&self, id: &Id) -> db::Result<MandateDetails> {
		self.state()
			.mandates
			.iter()
			.find(|m| &m.mandate.id == id)
			.cloned()
			.ok_or(db::Error::RecordNotFound)
	}

	fn list_mandates(&self) -> db::Result<Vec<MandateSummary>> {
		let state = self.state();
		let mut mandates: Vec<&MandateDetails> = state.mandates.iter().collect();
		mandates.sort_by(|a, b| b.mandate.submitted_at.cmp(&a.mandate.submitted_at));
		Ok(mandates
			.into_iter()
			.map(|m| MandateSummary {
				id: m.mandate.id,
				submitted_at: m.mandate.submitted_at,
				customer_id: m.customer.id,
				customer_name: m.customer.full_name.clone(),
				customer_phone: m.customer.phone_number.clone(),
				account_count: m.accounts.len(),
				pdf_path: state.pdfs
					.iter()
					.filter(|p| p.mandate_id == m.mandate.id)
					.max_by_key(|p| p.generated_at)
					.map(|p| p.file_path.clone()),
				ip_address: m.mandate.ip_address.clone(),
			})
			.collect())
	}

	fn record_generated_pdf(&self, mandate_id: &Id, file_path: &str) -> db::Result<GeneratedPdf> {
		let mut state = self.state();
		if !state.mandates.iter().any(|m| &m.mandate.id == mandate_id) {
			return Err(db::Error::RecordNotFound);
		}
		let pdf = GeneratedPdf {
			id: Id::new_v4(),
			mandate_id: *mandate_id,
			file_path: file_path.to_string(),
			generated_at: Utc::now(),
		};
		state.pdfs.push(pdf.clone());
		Ok(pdf)
	}
}
