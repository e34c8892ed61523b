use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use image::RgbImage;
use log::{info, warn};
use lopdf::Document;

use super::canvas::{self, Canvas};
use super::error::{Error, Result};
use super::layout::{Layout, LayoutTable, Point, Rect};
use super::signature::{self, Signature};
use super::{DocumentContent, DOCUMENT_TITLE, PRODUCER};

/// The lender's mandate form together with the layout describing where fields go
#[derive(Debug, Clone)]
pub struct Template {
	path: PathBuf,
	version: String,
	layout: Layout,
}

impl Template {
	pub fn new(path: impl Into<PathBuf>, version: &str, layouts: &LayoutTable) -> Result<Template> {
		Ok(Template {
			path: path.into(),
			version: version.to_string(),
			layout: layouts.get(version)?,
		})
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	pub fn version(&self) -> &str {
		&self.version
	}

	pub fn layout(&self) -> &Layout {
		&self.layout
	}

	/// Check that the template exists and its first page has the size the layout was measured on
	pub fn verify(&self) -> Result<()> {
		let doc = self.load()?;
		let (width, height) = canvas::page_size(&doc, canvas::first_page(&doc)?)?;
		if !self.layout.page.matches(width, height) {
			return Err(Error::TemplateMismatch {
				expected_width: self.layout.page.width,
				expected_height: self.layout.page.height,
				found_width: width,
				found_height: height,
			});
		}
		info!(
			target: "mandate::render",
			"template {} (layout {}) verified, {}x{}pt", self.path.display(), self.version, width, height,
		);
		Ok(())
	}

	fn load(&self) -> Result<Document> {
		let bytes = fs::read(&self.path).map_err(|e| match e.kind() {
			ErrorKind::NotFound => Error::TemplateMissing(self.path.clone()),
			_ => Error::Template(format!("reading {}: {}", self.path.display(), e)),
		})?;
		Document::load_mem(&bytes).map_err(|e| Error::Template(e.to_string()))
	}

	/// Overlay `content` onto a fresh copy of the template's first page
	pub fn render(&self, content: &DocumentContent, logo: Option<&RgbImage>) -> Result<Vec<u8>> {
		let mut doc = self.load()?;
		let page_id = canvas::first_page(&doc)?;
		let layout = &self.layout;
		let mut page = Canvas::new(layout.font_size);

		if let Some(logo) = logo {
			page.blank_out(layout.logo);
			page.image(logo, contain(logo.width(), logo.height(), layout.logo));
		}

		page.text(layout.customer_name, &content.customer_name)?;
		page.text(layout.customer_phone, &content.customer_phone)?;
		let optional = [
			(layout.loan_balance, &content.loan_balance),
			(layout.monthly_repayment, &content.monthly_repayment),
			(layout.start_date, &content.start_date),
			(layout.no_of_months, &content.no_of_months),
		];
		for (at, value) in optional {
			if let Some(value) = value {
				page.text(at, value)?;
			}
		}
		page.text(layout.national_id, &content.national_id)?;
		page.text(layout.mandate_ref, &content.reference)?;
		page.text(layout.date, &content.submitted_on)?;

		if content.accounts.len() > layout.accounts.len() {
			warn!(
				target: "mandate::render",
				"mandate {} has {} accounts, template {} prints only {}",
				content.mandate_id, content.accounts.len(), self.version, layout.accounts.len(),
			);
		}
		for (slot, account) in layout.accounts.iter().zip(&content.accounts) {
			page.text(slot.bank_name, &account.bank_name)?;
			page.text(slot.branch, &account.branch)?;
			page.text(slot.account_number, &account.account_number)?;
			page.text(slot.account_name, &account.account_name)?;
		}

		let corner = Point { x: layout.signature.x, y: layout.signature.y };
		match &content.signature {
			Signature::Image(img) => page.image(img, signature::fit(img.width(), img.height(), layout.signature)),
			Signature::Undecodable => page.text(corner, signature::NOT_FOUND)?,
			Signature::Missing => page.text(corner, signature::BLANK_LINE)?,
		}
		page.text(layout.signed_date, &format!("Signed Date: {}", content.submitted_on))?;
		page.text(layout.ip_address, &format!("IP: {}", content.ip_or_na()))?;

		page.apply(&mut doc, page_id)?;
		canvas::write_info(&mut doc, DOCUMENT_TITLE, PRODUCER);

		let mut out = Vec::new();
		doc.save_to(&mut out).map_err(|e| Error::Pdf(e.to_string()))?;
		Ok(out)
	}
}

/// Largest placement of a `width`x`height` image inside `bounds`, centred
fn contain(width: u32, height: u32, bounds: Rect) -> Rect {
	let (w, h) = (width.max(1) as f32, height.max(1) as f32);
	let scale = (bounds.width / w).min(bounds.height / h);
	let (w, h) = ((w * scale).min(bounds.width), (h * scale).min(bounds.height));
	Rect {
		x: bounds.x + (bounds.width - w) / 2.0,
		y: bounds.y + (bounds.height - h) / 2.0,
		width: w,
		height: h,
	}
}
