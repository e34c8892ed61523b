use std::sync::Arc;
use std::thread;

use mandate_api::documents::Archiver;
use mandate_api::submission::ErrorKind;

use crate::common::*;

#[test]
#[ignore]
fn concurrent_submissions_create_one_mandate() {
	let f = Fixture::new();
	let ama = f.customer_factory.ama();
	let service = Arc::new(f.service());

	let handles: Vec<_> = (0..6)
		.map(|_| {
			let service = service.clone();
			let request = submission_request(&ama.id, 2);
			thread::spawn(move || service.submit(&request, Some("10.0.0.1")))
		})
		.collect();
	let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

	assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
	for err in results.iter().filter_map(|r| r.as_ref().err()) {
		assert!(matches!(err.kind(), ErrorKind::AlreadySubmitted), "unexpected error: {}", err);
	}
	assert_eq!(f.store.find_customer(&ama.id).unwrap().status, CustomerStatus::Submitted);
}

#[test]
#[ignore]
fn submitted_mandate_is_archived() {
	let f = Fixture::new();
	let ama = f.customer_factory.ama();
	let dir = tempfile::tempdir().unwrap();
	let renderer = Arc::new(f.fallback_renderer(dir.path()));
	let archiver = Archiver::new(renderer, f.store.clone(), dir.path().join("pdfs"));

	let details = f.service().submit(&submission_request(&ama.id, 3), None).unwrap();
	let stored = f.store.find_mandate(&details.mandate.id).unwrap();
	assert_eq!(stored.accounts.len(), 3);
	assert_ne!(stored.accounts[0].account_number, "0011223344");
	assert_eq!(f.cipher.decrypt(&stored.accounts[0].account_number).unwrap(), "0011223344");

	let pdf = archiver.archive(&stored).unwrap();
	assert!(std::fs::read(&pdf.file_path).unwrap().starts_with(b"%PDF"));

	let summary = f.store
		.list_mandates()
		.unwrap()
		.into_iter()
		.find(|s| s.id == details.mandate.id)
		.unwrap();
	assert_eq!(summary.pdf_path, Some(pdf.file_path));
	assert_eq!(summary.ip_address, None);
}
