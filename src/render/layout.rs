use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use super::error::{Error, Result};

/// Layout table compiled into the binary
pub const DEFAULT_LAYOUTS: &str = include_str!("../../assets/layouts.json");

/// Fewest account slots a template layout may offer
pub const MIN_ACCOUNT_SLOTS: usize = 2;

/// Page size tolerance when checking a template against its layout, in points
pub const PAGE_TOLERANCE: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Point {
	pub x: f32,
	pub y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Rect {
	pub x: f32,
	pub y: f32,
	pub width: f32,
	pub height: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct PageSize {
	pub width: f32,
	pub height: f32,
}

impl PageSize {
	pub fn matches(&self, width: f32, height: f32) -> bool {
		(self.width - width).abs() <= PAGE_TOLERANCE && (self.height - height).abs() <= PAGE_TOLERANCE
	}
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AccountSlot {
	pub bank_name: Point,
	pub branch: Point,
	pub account_number: Point,
	pub account_name: Point,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Layout {
	/// Size of the template's first page
	pub page: PageSize,
	pub font_size: f32,
	/// Branding image box, painted white before the logo is drawn
	pub logo: Rect,
	pub mandate_ref: Point,
	pub date: Point,
	pub customer_name: Point,
	pub customer_phone: Point,
	pub national_id: Point,
	pub loan_balance: Point,
	pub monthly_repayment: Point,
	pub start_date: Point,
	pub no_of_months: Point,
	pub accounts: Vec<AccountSlot>,
	pub signature: Rect,
	pub signed_date: Point,
	pub ip_address: Point,
}

/// All known layouts by template version; coordinates are points from the bottom-left
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct LayoutTable {
	versions: BTreeMap<String, Layout>,
}

impl LayoutTable {
	pub fn parse(json: &str) -> Result<LayoutTable> {
		let table: LayoutTable = serde_json::from_str(json).map_err(|e| Error::Layout(e.to_string()))?;
		for (version, layout) in &table.versions {
			if layout.accounts.len() < MIN_ACCOUNT_SLOTS {
				return Err(Error::Layout(format!(
					"layout {} has {} account slot(s), at least {} required",
					version, layout.accounts.len(), MIN_ACCOUNT_SLOTS,
				)));
			}
			if layout.font_size <= 0.0 || layout.signature.width <= 0.0 || layout.signature.height <= 0.0 {
				return Err(Error::Layout(format!("layout {} has non-positive sizes", version)));
			}
		}
		Ok(table)
	}

	pub fn builtin() -> Result<LayoutTable> {
		LayoutTable::parse(DEFAULT_LAYOUTS)
	}

	pub fn from_file(path: &Path) -> Result<LayoutTable> {
		let json = fs::read_to_string(path)
			.map_err(|e| Error::Layout(format!("reading {}: {}", path.display(), e)))?;
		LayoutTable::parse(&json)
	}

	pub fn get(&self, version: &str) -> Result<Layout> {
		self.versions
			.get(version)
			.cloned()
			.ok_or_else(|| Error::Layout(format!("no layout for template version {}", version)))
	}
}
