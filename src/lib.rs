#[macro_use] extern crate rocket;
#[macro_use] extern crate serde_derive;

use rocket::figment::Provider;
use rocket::{Build, Request, Response, Rocket};
use rocket::fairing::{Fairing, Info, Kind};
use rocket::http::Header;

pub mod common;
pub mod config;
pub mod error;
pub mod registry;
pub mod rest_api;
pub mod rtsp;
pub mod store;
pub mod validation;

pub use rest_api::AppState;



// The overlay UI is served by another server, so it needs CORS to reach us.
pub struct CORS;

#[rocket::async_trait]
impl Fairing for CORS {
	fn info(&self) -> Info {
		Info {
			name: "Add CORS headers to responses",
			kind: Kind::Response
		}
	}

	async fn on_response<'r>(&self, _request: &'r Request<'_>, response: &mut Response<'r>) {
		response.set_header(Header::new("Access-Control-Allow-Origin", "*"));
		response.set_header(Header::new("Access-Control-Allow-Methods", "GET, POST, PUT, DELETE, OPTIONS"));
		response.set_header(Header::new("Access-Control-Allow-Headers", "*"));
	}
}

pub fn build_rocket<T: Provider>(figment: T, state: AppState) -> Rocket<Build> {
	rocket::custom(figment)
		.attach(rest_api::stage(state))
		.attach(CORS)
}
