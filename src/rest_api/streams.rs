use chrono::Utc;
use rocket::serde::json::{json, Json, Value};
use rocket::{Route, State};

use log::{error, info, warn};

use crate::common::{Document, StreamRecord, StreamStatus};
use crate::error::{ApiError, ApiResult};
use crate::registry::StartError;
use crate::rest_api::{required_str, AppState};
use crate::rtsp::validate_rtsp_url;
use crate::validation::{Mode, STREAM_SETTINGS_SCHEMA};



/// An absent or null `settings` object is stored as `{}`.
fn parse_settings(body: &Value) -> ApiResult<Document> {
	match body.get("settings") {
		None | Some(Value::Null) => Ok(Document::new()),
		Some(settings) => STREAM_SETTINGS_SCHEMA
			.validate(settings, Mode::Full)
			.map_err(ApiError::Validation),
	}
}

#[post("/validate", data = "<body>")]
async fn validate_stream(body: Json<Value>, state: &State<AppState>) -> ApiResult<Json<Value>> {
	let rtsp_url = required_str(&body, "rtspUrl")
		.ok_or_else(|| ApiError::BadRequest("RTSP URL is required".to_string()))?;

	let (valid, message) = validate_rtsp_url(state.registry.opener(), rtsp_url).await;
	Ok(Json(json!({
		"valid": valid,
		"message": message,
		"url": rtsp_url,
	})))
}

#[post("/<stream_id>/start", data = "<body>")]
async fn start_stream(stream_id: &str, body: Json<Value>, state: &State<AppState>) -> ApiResult<Json<Value>> {
	let rtsp_url = required_str(&body, "rtspUrl")
		.ok_or_else(|| ApiError::BadRequest("RTSP URL is required".to_string()))?;
	let settings = parse_settings(&body)?;

	let pending = match state.registry.start(stream_id, rtsp_url).await {
		Ok(pending) => pending,
		Err(err) => {
			match &err {
				StartError::AlreadyActive => warn!("Stream {} is already active", stream_id),
				StartError::CannotOpen(cause) => warn!("Cannot open stream {} at {}: {}", stream_id, rtsp_url, cause),
			}
			return Err(ApiError::BadRequest(err.to_string()));
		}
	};

	let record = StreamRecord {
		id: None,
		stream_id: stream_id.to_string(),
		rtsp_url: rtsp_url.to_string(),
		status: StreamStatus::Active,
		start_time: pending.start_time(),
		stop_time: None,
		settings,
	};
	// Dropping `pending` on failure releases the capture and frees the id.
	state.store
		.upsert_stream(&record)
		.await
		.map_err(ApiError::store("Failed to start stream"))?;
	pending.activate();

	Ok(Json(json!({
		"message": "Stream started successfully",
		"streamId": stream_id,
	})))
}

#[post("/<stream_id>/stop")]
async fn stop_stream(stream_id: &str, state: &State<AppState>) -> ApiResult<Json<Value>> {
	if !state.registry.stop(stream_id) {
		return Err(ApiError::NotFound("Stream not found or already stopped".to_string()));
	}

	let recorded = state.store
		.mark_stream_stopped(stream_id, Utc::now())
		.await
		.map_err(ApiError::store("Failed to stop stream"))?;
	if !recorded {
		error!("Stopped stream {} has no stored record", stream_id);
	}

	info!("Stopped stream {}", stream_id);
	Ok(Json(json!({
		"message": "Stream stopped successfully",
	})))
}

#[get("/<stream_id>/status")]
async fn stream_status(stream_id: &str, state: &State<AppState>) -> ApiResult<Json<Value>> {
	if let Some(snapshot) = state.registry.status(stream_id) {
		return Ok(Json(json!(snapshot)));
	}

	let last_known = state.store
		.find_stream(stream_id)
		.await
		.map_err(ApiError::store("Failed to get stream status"))?;
	match last_known {
		Some(record) => Ok(Json(json!({
			"status": "inactive",
			"lastKnown": record,
		}))),
		None => Err(ApiError::NotFound("Stream not found".to_string())),
	}
}

pub fn routes() -> Vec<Route> {
	routes![validate_stream, start_stream, stop_stream, stream_status]
}
