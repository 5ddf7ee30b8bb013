use rocket::serde::json::{json, Json, Value};
use rocket::{Route, State};

use log::info;

use crate::error::{ApiError, ApiResult};
use crate::rest_api::AppState;



/// Creates the store's indexes. Safe to call repeatedly.
#[post("/init-db")]
async fn init_db(state: &State<AppState>) -> ApiResult<Json<Value>> {
	let indexes = state.store
		.init_indexes()
		.await
		.map_err(ApiError::store("Failed to initialize database"))?;

	info!("Database initialized successfully ({})", indexes.join(", "));
	Ok(Json(json!({
		"message": "Database initialized successfully",
		"indexes": indexes,
	})))
}

pub fn routes() -> Vec<Route> {
	routes![init_db]
}
