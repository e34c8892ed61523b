use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use thiserror::Error;

use crate::db;
use crate::mandate::{GeneratedPdf, MandateDetails};
use crate::render::{self, Renderer};
use crate::store::MandateStore;

/// Run blocking document work on the blocking pool, giving up after `limit`
///
/// The blocking task itself is not cancelled; its result is dropped when it
/// finishes late.
pub async fn bounded<T, F>(limit: Duration, work: F) -> render::Result<T>
where
	T: Send + 'static,
	F: FnOnce() -> render::Result<T> + Send + 'static,
{
	let task = tokio::task::spawn_blocking(work);
	match tokio::time::timeout(limit, task).await {
		Ok(Ok(result)) => result,
		Ok(Err(e)) => Err(render::Error::Aborted(e.to_string())),
		Err(_) => {
			warn!(target: "mandate::documents", "render exceeded {:?}", limit);
			Err(render::Error::Timeout)
		}
	}
}

/// Render a mandate on the blocking pool under a time limit
pub async fn render_bounded(renderer: Arc<Renderer>, details: MandateDetails, limit: Duration) -> render::Result<Vec<u8>> {
	bounded(limit, move || renderer.render(&details)).await
}

/// Download name: `Mandate_<Name_With_Underscores>_<first 8 of id>.pdf`, ASCII only so it fits a header
pub fn attachment_filename(details: &MandateDetails) -> String {
	let name = details.customer.full_name
		.split_whitespace()
		.collect::<Vec<_>>()
		.join("_")
		.chars()
		.filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
		.collect::<String>();
	let id = details.mandate.id.to_string();
	format!("Mandate_{}_{}.pdf", name, &id[..8])
}

#[derive(Debug, Error)]
pub enum ArchiveError {
	#[error(transparent)]
	Render(#[from] render::Error),
	#[error("writing pdf file: {0}")]
	Io(#[from] io::Error),
	#[error("recording generated pdf: {0}")]
	Storage(#[from] db::Error),
}

/// Renders mandates into the output directory and records each file
pub struct Archiver {
	renderer: Arc<Renderer>,
	store: Arc<dyn MandateStore>,
	output_dir: PathBuf,
}

impl Archiver {
	pub fn new(renderer: Arc<Renderer>, store: Arc<dyn MandateStore>, output_dir: impl Into<PathBuf>) -> Self {
		Archiver { renderer, store, output_dir: output_dir.into() }
	}

	/// Render, write and record; running it twice records two rows
	pub fn archive(&self, details: &MandateDetails) -> Result<GeneratedPdf, ArchiveError> {
		let pdf = self.renderer.render(details)?;
		fs::create_dir_all(&self.output_dir)?;
		let path = self.output_dir.join(format!("mandate_{}.pdf", details.mandate.id));
		fs::write(&path, &pdf)?;

		let record = self.store.record_generated_pdf(&details.mandate.id, &path.to_string_lossy())?;
		info!(target: "mandate::documents", "archived mandate {} to {}", details.mandate.id, record.file_path);
		Ok(record)
	}
}
