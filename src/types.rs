use chrono::{DateTime, NaiveDate, Utc};

pub type Id = uuid::Uuid;
pub type Time = DateTime<Utc>;
pub type Date = NaiveDate;

/// Source of the current time for token checks and submission timestamps
pub trait Clock: Send + Sync {
	/// Gets the current time
	fn now(&self) -> Time {
		Utc::now()
	}
}

/// Wall-clock time
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {}

/// Calendar format used on the printed mandate
pub fn format_date(date: &Date) -> String {
	date.format("%d/%m/%Y").to_string()
}
