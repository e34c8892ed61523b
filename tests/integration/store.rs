use chrono::{Duration, Utc};

use mandate_api::mandate::{NewAccountRecord, NewMandateRecord};

use crate::common::*;

fn record(customer_id: Id, orders: &[AccountOrder]) -> NewMandateRecord {
	NewMandateRecord {
		customer_id,
		ghana_card_number: "ciphertext".into(),
		agreement_accepted: true,
		digital_signature_path: Some("data:image/png;base64,AAAA".into()),
		submitted_at: Utc::now(),
		ip_address: Some("10.0.0.7".into()),
		accounts: orders
			.iter()
			.map(|order| NewAccountRecord {
				account_order: *order,
				bank_name: "GCB Bank".into(),
				branch: "Makola".into(),
				account_name: "Ama Mensah".into(),
				account_number: format!("number-{}", order),
			})
			.collect(),
	}
}

#[test]
#[ignore]
fn finds_customer_by_token() {
	let f = Fixture::new();
	let ama = f.customer_factory.ama();
	let token = ama.session_token.clone().unwrap();

	let got = f.store.find_customer_by_token(&token).unwrap();
	assert_eq!(got, ama);
	assert_eq!(got.status, CustomerStatus::Pending);
	assert_eq!(f.store.find_customer_by_token("not-a-token").unwrap_err(), db::Error::RecordNotFound);
}

#[test]
#[ignore]
fn duplicate_token_is_rejected() {
	let f = Fixture::new();
	let ama = f.customer_factory.ama();
	let token = ama.session_token.unwrap();

	let err = f.store
		.create_customer(&CustomerFactory::defaults(), &token, Utc::now() + Duration::hours(1))
		.unwrap_err();
	assert_eq!(err, db::Error::RecordAlreadyExists);
}

#[test]
#[ignore]
fn create_mandate_claims_customer() {
	let f = Fixture::new();
	let ama = f.customer_factory.ama();

	let created = f.store
		.create_mandate(&record(ama.id, &[AccountOrder::Second, AccountOrder::First]))
		.unwrap();
	assert_eq!(created.customer.status, CustomerStatus::Submitted);
	assert_eq!(created.customer.session_token, None);

	let found = f.store.find_mandate(&created.mandate.id).unwrap();
	assert_eq!(found.mandate, created.mandate);
	let orders: Vec<_> = found.accounts.iter().map(|a| a.account_order).collect();
	assert_eq!(orders, vec![AccountOrder::First, AccountOrder::Second]);

	let second = f.store.create_mandate(&record(ama.id, &[AccountOrder::First])).unwrap_err();
	assert_eq!(second, db::Error::Conflict);
}

#[test]
#[ignore]
fn create_mandate_for_unknown_customer() {
	let f = Fixture::new();
	let err = f.store.create_mandate(&record(Id::new_v4(), &[AccountOrder::First])).unwrap_err();
	assert_eq!(err, db::Error::RecordNotFound);
}

#[test]
#[ignore]
fn failed_insert_rolls_back_the_claim() {
	let f = Fixture::new();
	let kofi = f.customer_factory.kofi();

	let err = f.store
		.create_mandate(&record(kofi.id, &[AccountOrder::First, AccountOrder::First]))
		.unwrap_err();
	assert_eq!(err, db::Error::RecordAlreadyExists);

	let after = f.store.find_customer(&kofi.id).unwrap();
	assert_eq!(after.status, CustomerStatus::Pending);
	assert_eq!(after.session_token, kofi.session_token);

	let mandates: i64 = mandate_api::schema::direct_debit_mandates::table
		.filter(mandate_api::schema::direct_debit_mandates::customer_id.eq(kofi.id))
		.count()
		.get_result(&mut f.conn())
		.unwrap();
	assert_eq!(mandates, 0);
}

#[test]
#[ignore]
fn lists_mandates_with_latest_document() {
	let f = Fixture::new();
	let ama = f.customer_factory.ama();
	let kofi = f.customer_factory.kofi();

	let mut older = record(ama.id, &[AccountOrder::First, AccountOrder::Second]);
	older.submitted_at = Utc::now() - Duration::minutes(5);
	let older = f.store.create_mandate(&older).unwrap();
	let newer = f.store.create_mandate(&record(kofi.id, &[AccountOrder::First])).unwrap();
	f.store.record_generated_pdf(&older.mandate.id, "storage/pdfs/first.pdf").unwrap();

	let summaries = f.store.list_mandates().unwrap();
	let position = |id: &Id| summaries.iter().position(|s| &s.id == id).unwrap();
	assert!(position(&newer.mandate.id) < position(&older.mandate.id));

	let summary = &summaries[position(&older.mandate.id)];
	assert_eq!(summary.customer_name, "Ama Mensah");
	assert_eq!(summary.account_count, 2);
	assert_eq!(summary.pdf_path.as_deref(), Some("storage/pdfs/first.pdf"));
	assert_eq!(summaries[position(&newer.mandate.id)].pdf_path, None);
}

#[test]
#[ignore]
fn expires_lapsed_invitations() {
	let f = Fixture::new();
	let now = Utc::now();
	let lapsed = session::invite(f.store.as_ref(), &CustomerFactory::defaults(), now - Duration::hours(72), Duration::hours(48)).unwrap();
	let fresh = f.customer_factory.kofi();

	assert!(f.store.expire_stale_customers(now).unwrap() >= 1);
	assert_eq!(f.store.find_customer(&lapsed.id).unwrap().status, CustomerStatus::Expired);
	assert_eq!(f.store.find_customer(&fresh.id).unwrap().status, CustomerStatus::Pending);
}
