use lopdf::{dictionary, Document, Object, Stream};

use super::canvas::{self, Canvas};
use super::error::{Error, Result};
use super::layout::{Point, Rect};
use super::signature::{self, Signature};
use super::{DocumentContent, DOCUMENT_TITLE, PRODUCER};

const A4_WIDTH: f32 = 595.28;
const A4_HEIGHT: f32 = 841.89;
const MARGIN: f32 = 50.0;
const VALUE_X: f32 = 200.0;
const LINE: f32 = 16.0;
const BODY_SIZE: f32 = 10.0;
const HEADING_SIZE: f32 = 12.0;
const TITLE_SIZE: f32 = 16.0;

/// Writes rows top to bottom
struct Cursor {
	canvas: Canvas,
	y: f32,
}

impl Cursor {
	fn heading(&mut self, text: &str) -> Result<()> {
		self.y -= LINE / 2.0;
		self.canvas.text_sized(Point { x: MARGIN, y: self.y }, HEADING_SIZE, text)?;
		self.y -= 4.0;
		self.canvas.rule(Point { x: MARGIN, y: self.y }, Point { x: A4_WIDTH - MARGIN, y: self.y });
		self.y -= LINE;
		Ok(())
	}

	fn row(&mut self, label: &str, value: &str) -> Result<()> {
		self.canvas.text(Point { x: MARGIN, y: self.y }, label)?;
		self.canvas.text(Point { x: VALUE_X, y: self.y }, value)?;
		self.y -= LINE;
		Ok(())
	}

	fn line(&mut self, text: &str) -> Result<()> {
		self.canvas.text(Point { x: MARGIN, y: self.y }, text)?;
		self.y -= LINE;
		Ok(())
	}
}

pub fn compose(content: &DocumentContent) -> Result<Vec<u8>> {
	let mut doc = Document::with_version("1.5");
	let pages_id = doc.new_object_id();
	let contents_id = doc.add_object(Stream::new(dictionary! {}, Vec::new()));
	let page_id = doc.add_object(dictionary! {
		"Type" => "Page",
		"Parent" => pages_id,
		"Contents" => contents_id,
		"Resources" => dictionary! {},
	});
	doc.objects.insert(
		pages_id,
		Object::Dictionary(dictionary! {
			"Type" => "Pages",
			"Kids" => vec![page_id.into()],
			"Count" => 1,
			"MediaBox" => vec![0.into(), 0.into(), A4_WIDTH.into(), A4_HEIGHT.into()],
		}),
	);
	let catalog_id = doc.add_object(dictionary! {
		"Type" => "Catalog",
		"Pages" => pages_id,
	});
	doc.trailer.set("Root", catalog_id);

	let mut page = Cursor { canvas: Canvas::new(BODY_SIZE), y: A4_HEIGHT - MARGIN };
	page.canvas.text_sized(Point { x: MARGIN, y: page.y }, TITLE_SIZE, "DIRECT DEBIT MANDATE")?;
	page.y -= LINE * 1.5;
	page.row("Reference", &content.reference)?;
	page.row("Date", &content.submitted_on)?;

	page.heading("Customer")?;
	page.row("Full Name", &content.customer_name)?;
	page.row("Phone Number", &content.customer_phone)?;
	page.row("Ghana Card Number", &content.national_id)?;
	let loan = [
		("Loan Balance", &content.loan_balance),
		("Monthly Repayment", &content.monthly_repayment),
		("Start Date", &content.start_date),
		("No. of Months", &content.no_of_months),
	];
	for (label, value) in loan {
		if let Some(value) = value {
			page.row(label, value)?;
		}
	}

	page.heading("Bank Accounts")?;
	for account in &content.accounts {
		page.line(&format!("{} Account", account.order))?;
		page.row("Bank", &account.bank_name)?;
		page.row("Branch", &account.branch)?;
		page.row("Account Name", &account.account_name)?;
		page.row("Account Number", &account.account_number)?;
	}

	page.heading("Authorization")?;
	let bounds = Rect { x: MARGIN, y: page.y - 60.0, width: 160.0, height: 60.0 };
	match &content.signature {
		Signature::Image(img) => page.canvas.image(img, signature::fit(img.width(), img.height(), bounds)),
		Signature::Undecodable => page.canvas.text(Point { x: bounds.x, y: bounds.y }, signature::NOT_FOUND)?,
		Signature::Missing => page.canvas.text(Point { x: bounds.x, y: bounds.y }, signature::BLANK_LINE)?,
	}
	page.y = bounds.y - LINE * 1.5;
	page.line(&format!("Signed Date: {}", content.submitted_on))?;
	page.line(&format!("IP: {}", content.ip_or_na()))?;

	page.canvas.text_sized(
		Point { x: MARGIN, y: MARGIN / 2.0 },
		BODY_SIZE - 2.0,
		&format!("Mandate ID: {}", content.mandate_id),
	)?;

	page.canvas.apply(&mut doc, page_id)?;
	canvas::write_info(&mut doc, DOCUMENT_TITLE, PRODUCER);

	let mut out = Vec::new();
	doc.save_to(&mut out).map_err(|e| Error::Pdf(e.to_string()))?;
	Ok(out)
}
