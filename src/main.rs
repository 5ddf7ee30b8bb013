use std::sync::Arc;

use stream_overlay_mgr::config::{self, Config};
use stream_overlay_mgr::registry::StreamRegistry;
use stream_overlay_mgr::rtsp::RtspOpener;
use stream_overlay_mgr::store::{MemoryStore, MongoStore, Store};
use stream_overlay_mgr::AppState;



#[rocket::main]
async fn main() -> anyhow::Result<()> {
	// A missing .env file is fine; real environment variables still apply.
	dotenv::dotenv().ok();

	let matches = config::command().get_matches();
	let config = Config::from_matches(&matches);

	let store: Arc<dyn Store> = if config.memory_store {
		Arc::new(MemoryStore::new())
	} else {
		Arc::new(MongoStore::connect(&config.mongo_uri, config.database.as_deref()).await?)
	};
	let registry = StreamRegistry::new(Arc::new(RtspOpener::new(config.probe_timeout)));

	let figment = rocket::Config::figment()
		.merge(("address", config.address.clone()))
		.merge(("port", config.port));

	stream_overlay_mgr::build_rocket(figment, AppState::new(store, registry))
		.launch()
		.await?;

	anyhow::Ok(())
}
