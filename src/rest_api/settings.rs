use chrono::Utc;
use rocket::serde::json::{json, Json, Value};
use rocket::{Route, State};

use log::info;

use crate::error::{ApiError, ApiResult};
use crate::rest_api::AppState;



pub const SETTINGS_TYPE: &str = "global";

/// Served when nothing has been stored yet. Never persisted.
pub fn default_settings() -> Value {
	json!({
		"type": SETTINGS_TYPE,
		"stream": {
			"defaultQuality": "720p",
			"defaultBitrate": 2000,
			"defaultFrameRate": 30,
			"autoReconnect": true,
			"bufferSize": 3,
		},
		"overlay": {
			"maxOverlays": 10,
			"defaultFont": "Arial",
			"enableAnimations": true,
		},
		"ui": {
			"theme": "dark",
			"enableNotifications": true,
			"autoSave": true,
		},
	})
}

#[get("/")]
async fn get_settings(state: &State<AppState>) -> ApiResult<Json<Value>> {
	let stored = state.store
		.find_settings()
		.await
		.map_err(ApiError::store("Failed to fetch settings"))?;
	Ok(Json(stored.map(Value::Object).unwrap_or_else(default_settings)))
}

/// Stores whatever object it is given; the settings document has no schema.
#[put("/", data = "<body>")]
async fn update_settings(body: Json<Value>, state: &State<AppState>) -> ApiResult<Json<Value>> {
	let mut settings = match body.into_inner() {
		Value::Object(settings) => settings,
		_ => return Err(ApiError::BadRequest("Settings must be a JSON object".to_string())),
	};
	settings.remove("_id");
	settings.insert("type".to_string(), Value::from(SETTINGS_TYPE));
	settings.insert("updatedAt".to_string(), Value::from(Utc::now().to_rfc3339()));

	let stored = state.store
		.merge_settings(settings)
		.await
		.map_err(ApiError::store("Failed to update settings"))?;
	info!("Updated settings");
	Ok(Json(Value::Object(stored)))
}

pub fn routes() -> Vec<Route> {
	routes![get_settings, update_settings]
}
