use std::sync::Arc;

use chrono::Utc;
use rocket::fairing::AdHoc;
use rocket::serde::json::{json, Json, Value};

use log::info;

use crate::registry::StreamRegistry;
use crate::store::Store;

mod admin;
mod analytics;
mod overlays;
mod settings;
mod streams;



/// Everything the handlers share, managed by Rocket.
pub struct AppState {
	pub store: Arc<dyn Store>,
	pub registry: StreamRegistry,
}

impl AppState {
	pub fn new(store: Arc<dyn Store>, registry: StreamRegistry) -> AppState {
		AppState { store, registry }
	}
}

/// A non-empty string field of a JSON body, such as `rtspUrl`.
fn required_str<'a>(body: &'a Value, field: &str) -> Option<&'a str> {
	body.get(field)
		.and_then(Value::as_str)
		.filter(|value| !value.is_empty())
}

#[get("/")]
fn health() -> Json<Value> {
	Json(json!({
		"status": "healthy",
		"service": "StreamOverlay API",
		"version": env!("CARGO_PKG_VERSION"),
		"timestamp": Utc::now(),
	}))
}

// Browsers preflight PUT and DELETE; the CORS fairing adds the headers.
#[options("/<_..>")]
fn preflight() {}

// Handlers answer their own 400s, so only a body that fails to parse as
// JSON (400) or parses to the wrong shape (422) reaches these two.
#[catch(400)]
fn bad_request() -> Value {
	json!({
		"error": "Request body is not valid JSON",
	})
}

#[catch(422)]
fn unprocessable() -> Value {
	json!({
		"error": "Request body is not valid JSON",
	})
}

#[catch(404)]
fn not_found() -> Value {
	json!({
		"error": "Resource not found",
	})
}

#[catch(500)]
fn internal_error() -> Value {
	json!({
		"error": "Internal server error",
	})
}



pub fn stage(state: AppState) -> AdHoc {
	AdHoc::on_ignite("REST API", |rocket| async move {
		info!("Serving overlays from the {} store", state.store.name());
		rocket
			.manage(state)
			.register("/", catchers![bad_request, not_found, unprocessable, internal_error])
			.mount("/", routes![health, preflight])
			.mount("/api/overlays", overlays::routes())
			.mount("/api/streams", streams::routes())
			.mount("/api/settings", settings::routes())
			.mount("/api/analytics", analytics::routes())
			.mount("/api/admin", admin::routes())
	})
}
