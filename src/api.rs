use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;
use warp::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use warp::http::{Response, StatusCode};
use warp::{Filter, Rejection, Reply};

use crate::db;
use crate::documents;
use crate::render;
use crate::render::Renderer;
use crate::session::{self, Gate};
use crate::store::MandateStore;
use crate::submission::{self, ErrorKind, SubmissionRequest};
use crate::types::Id;

type HttpReply = warp::reply::Response;

/// Largest accepted submission body; signatures arrive inline as data URIs
pub const MAX_BODY_BYTES: u64 = 2 * 1024 * 1024;

/// Everything the handlers need, shared across requests
pub struct Api {
	pub gate: Gate,
	pub submissions: Arc<submission::Service>,
	pub store: Arc<dyn MandateStore>,
	pub renderer: Arc<Renderer>,
	pub render_timeout: Duration,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Submitted {
	success: bool,
	mandate_id: Id,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionInfo {
	customer_id: Id,
	customer_name: String,
}

#[derive(Debug, Deserialize)]
struct TokenQuery {
	token: Option<String>,
}

fn with_api(api: Arc<Api>) -> impl Filter<Extract = (Arc<Api>,), Error = Infallible> + Clone {
	warp::any().map(move || api.clone())
}

pub fn routes(api: Arc<Api>) -> impl Filter<Extract = (impl warp::Reply,), Error = Infallible> + Clone {
	let submit = warp::path!("api" / "mandates")
		.and(warp::post())
		.and(warp::body::content_length_limit(MAX_BODY_BYTES))
		.and(warp::body::json())
		.and(warp::header::optional::<String>("x-forwarded-for"))
		.and(warp::addr::remote())
		.and(with_api(api.clone()))
		.and_then(submit_mandate);

	let pdf = warp::path!("api" / "mandates" / String / "pdf")
		.and(warp::get())
		.and(with_api(api.clone()))
		.and_then(mandate_pdf);

	let session = warp::path!("session" / String)
		.and(warp::get())
		.and(with_api(api.clone()))
		.and_then(check_session);

	let form = warp::path!("mandate")
		.and(warp::get())
		.and(warp::query::<TokenQuery>())
		.map(|q: TokenQuery| q.token.unwrap_or_default())
		.and(with_api(api))
		.and_then(check_session);

	submit.or(pdf).or(session).or(form).recover(handle_rejection)
}

fn json_status<T: Serialize>(body: &T, status: StatusCode) -> HttpReply {
	warp::reply::with_status(warp::reply::json(body), status).into_response()
}

fn error_body(message: &str, status: StatusCode) -> HttpReply {
	json_status(&json!({ "error": message }), status)
}

fn internal_error() -> HttpReply {
	error_body("Internal server error", StatusCode::INTERNAL_SERVER_ERROR)
}

/// First `X-Forwarded-For` entry, else the peer address
pub fn client_ip(forwarded_for: Option<&str>, remote: Option<SocketAddr>) -> Option<String> {
	forwarded_for
		.and_then(|v| v.split(',').next())
		.map(str::trim)
		.filter(|ip| !ip.is_empty())
		.map(String::from)
		.or_else(|| remote.map(|addr| addr.ip().to_string()))
}

async fn submit_mandate(
	request: SubmissionRequest,
	forwarded_for: Option<String>,
	remote: Option<SocketAddr>,
	api: Arc<Api>,
) -> Result<HttpReply, Rejection> {
	let ip = client_ip(forwarded_for.as_deref(), remote);
	let service = api.submissions.clone();
	// the blocking task runs to completion even if the client goes away
	let result = tokio::task::spawn_blocking(move || service.submit(&request, ip.as_deref())).await;

	let details = match result {
		Ok(Ok(details)) => details,
		Ok(Err(e)) => {
			return Ok(match e.kind() {
				ErrorKind::Validation(errors) => json_status(
					&json!({ "error": "Validation failed", "details": errors }),
					StatusCode::BAD_REQUEST,
				),
				ErrorKind::CustomerNotFound => error_body("Customer not found", StatusCode::NOT_FOUND),
				ErrorKind::AlreadySubmitted => error_body("Mandate already submitted", StatusCode::BAD_REQUEST),
				_ => internal_error(),
			});
		}
		Err(e) => {
			error!(target: "mandate::api", "submission task failed: {}", e);
			return Ok(internal_error());
		}
	};

	let mandate_id = details.mandate.id;
	let service = api.submissions.clone();
	tokio::task::spawn_blocking(move || service.archive(&details));

	Ok(json_status(&Submitted { success: true, mandate_id }, StatusCode::CREATED))
}

async fn mandate_pdf(id: String, api: Arc<Api>) -> Result<HttpReply, Rejection> {
	let not_found = || error_body("Mandate not found", StatusCode::NOT_FOUND);
	let id = match Id::parse_str(&id) {
		Ok(id) => id,
		Err(_) => return Ok(not_found()),
	};

	let store = api.store.clone();
	let details = match tokio::task::spawn_blocking(move || store.find_mandate(&id)).await {
		Ok(Ok(details)) => details,
		Ok(Err(db::Error::RecordNotFound)) => return Ok(not_found()),
		Ok(Err(e)) => {
			error!(target: "mandate::api", "loading mandate {}: {}", id, e);
			return Ok(internal_error());
		}
		Err(e) => {
			error!(target: "mandate::api", "loading mandate {}: {}", id, e);
			return Ok(internal_error());
		}
	};

	let filename = documents::attachment_filename(&details);
	let pdf = match documents::render_bounded(api.renderer.clone(), details, api.render_timeout).await {
		Ok(pdf) => pdf,
		Err(render::Error::Timeout) => {
			return Ok(error_body("Generating the document took too long", StatusCode::GATEWAY_TIMEOUT));
		}
		Err(e) => {
			error!(target: "mandate::api", "rendering mandate {}: {}", id, e);
			return Ok(error_body("Failed to generate PDF", StatusCode::INTERNAL_SERVER_ERROR));
		}
	};

	let response = Response::builder()
		.status(StatusCode::OK)
		.header(CONTENT_TYPE, "application/pdf")
		.header(CONTENT_DISPOSITION, format!("attachment; filename=\"{}\"", filename))
		.body(pdf);
	Ok(match response {
		Ok(r) => r.into_response(),
		Err(e) => {
			error!(target: "mandate::api", "building pdf response: {}", e);
			internal_error()
		}
	})
}

async fn check_session(token: String, api: Arc<Api>) -> Result<HttpReply, Rejection> {
	let result = tokio::task::spawn_blocking(move || api.gate.validate(&token)).await;

	Ok(match result {
		Ok(Ok(customer)) => json_status(
			&SessionInfo { customer_id: customer.id, customer_name: customer.full_name },
			StatusCode::OK,
		),
		Ok(Err(session::Error::Rejected(rejection))) => {
			let status = match rejection {
				session::Rejection::Expired => StatusCode::GONE,
				_ => StatusCode::BAD_REQUEST,
			};
			error_body(rejection.public_message(), status)
		}
		Ok(Err(session::Error::Storage(_))) => internal_error(),
		Err(e) => {
			error!(target: "mandate::api", "session task failed: {}", e);
			internal_error()
		}
	})
}

async fn handle_rejection(err: Rejection) -> Result<HttpReply, Infallible> {
	if err.is_not_found() {
		return Ok(error_body("Not found", StatusCode::NOT_FOUND));
	}
	if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
		debug!(target: "mandate::api", "unreadable request body: {}", e);
		return Ok(error_body("Invalid request body", StatusCode::BAD_REQUEST));
	}
	if err.find::<warp::reject::PayloadTooLarge>().is_some() {
		return Ok(error_body("Request body too large", StatusCode::PAYLOAD_TOO_LARGE));
	}
	if err.find::<warp::reject::MethodNotAllowed>().is_some() {
		return Ok(error_body("Method not allowed", StatusCode::METHOD_NOT_ALLOWED));
	}
	warn!(target: "mandate::api", "unhandled rejection: {:?}", err);
	Ok(internal_error())
}
