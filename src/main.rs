use std::env;
use std::error::Error;
use std::process;
use std::sync::Arc;

use log::*;
use warp::filters::log::Info;
use warp::Filter;

use mandate_api::api::{self, Api};
use mandate_api::config::Config;
use mandate_api::documents::Archiver;
use mandate_api::render::layout::LayoutTable;
use mandate_api::render::signature::flatten;
use mandate_api::render::template::Template;
use mandate_api::render::{self, Renderer};
use mandate_api::session::Gate;
use mandate_api::signature_store::SignatureStore;
use mandate_api::submission::{NewService, Service};
use mandate_api::{db, Clock, FieldCipher, MandateStore, PgStore, SystemClock};

#[tokio::main]
async fn main() {
	if env::var_os("RUST_LOG").is_none() {
		env::set_var("RUST_LOG", "info");
	}
	pretty_env_logger::init();

	if let Err(e) = run().await {
		error!(target: "mandate::api", "startup failed: {}", e);
		process::exit(1);
	}
}

async fn run() -> Result<(), Box<dyn Error>> {
	let config = Config::from_env()?;
	let cipher = Arc::new(FieldCipher::from_hex(config.encryption_key.expose())?);

	let pool = db::pg_connection(&config.database_url)?;
	let store: Arc<dyn MandateStore> = Arc::new(PgStore::new(pool));
	let clock: Arc<dyn Clock> = Arc::new(SystemClock);

	let layouts = match &config.layout_path {
		Some(path) => LayoutTable::from_file(path)?,
		None => LayoutTable::builtin()?,
	};
	let template = Template::new(config.template_path.clone(), &config.template_version, &layouts)?;
	match template.verify() {
		Ok(()) => {}
		Err(render::Error::TemplateMissing(path)) if config.pdf_fallback => {
			warn!(target: "mandate::render", "template {} missing, documents will be composed without it", path.display());
		}
		Err(e) => return Err(e.into()),
	}

	let signatures = match &config.signature_dir {
		Some(dir) => SignatureStore::Directory(dir.clone()),
		None => SignatureStore::Inline,
	};
	let mut renderer = Renderer::new(cipher.clone(), signatures.clone(), template).with_fallback(config.pdf_fallback);
	if let Some(path) = &config.logo_path {
		renderer = renderer.with_logo(flatten(&image::open(path)?.to_rgba8()));
	}
	let renderer = Arc::new(renderer);

	let archiver = Archiver::new(renderer.clone(), store.clone(), config.pdf_output_dir.clone());
	let submissions = Service::new(NewService {
		store: store.clone(),
		cipher,
		signatures,
		clock: clock.clone(),
	})
		.with_archiver(Arc::new(archiver));

	let sweep = store.clone();
	let now = clock.now();
	let expired = tokio::task::spawn_blocking(move || sweep.expire_stale_customers(now)).await??;
	info!(target: "mandate::session", "expired {} stale invitation(s)", expired);

	let api = Arc::new(Api {
		gate: Gate::new(store.clone(), clock),
		submissions: Arc::new(submissions),
		store,
		renderer,
		render_timeout: config.render_timeout,
	});

	let log = warp::log::custom(|info: Info| {
		info!(
			target: "mandate::api",
			"\"{} {} {:?}\" \t{} {} {:?}",
			info.method(),
			info.path(),
			info.version(),
			info.status().canonical_reason().unwrap_or("-"),
			info.status().as_u16(),
			info.elapsed(),
		);
	});
	let routes = api::routes(api).with(log);

	info!(target: "mandate::api", "listening on {}", config.bind_addr);
	warp::serve(routes).run(config.bind_addr).await;
	Ok(())
}
