use chrono::{DateTime, Utc};
use rocket::response::status::Created;
use rocket::serde::json::{json, Json, Value};
use rocket::{Route, State};

use log::{info, warn};

use crate::common::{Overlay, OverlayFields, OverlayFilter, OverlayPatch, Pagination};
use crate::error::{ApiError, ApiResult};
use crate::rest_api::AppState;
use crate::store::Store;
use crate::validation::{Mode, OVERLAY_SCHEMA};



pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_LIMIT: u64 = 10;
pub const MAX_LIMIT: u64 = 100;

#[derive(FromForm)]
struct OverlayQuery {
	page: Option<String>,
	limit: Option<String>,
	#[field(name = "type")]
	kind: Option<String>,
	visible: Option<String>,
}

fn positive_param(name: &str, raw: Option<&str>, default: u64) -> ApiResult<u64> {
	match raw {
		None => Ok(default),
		Some(raw) => match raw.trim().parse::<u64>() {
			Ok(value) if value > 0 => Ok(value),
			_ => Err(ApiError::BadRequest(format!("'{}' must be a positive integer", name))),
		},
	}
}

fn parse_fields(body: &Value) -> ApiResult<OverlayFields> {
	let validated = OVERLAY_SCHEMA.validate(body, Mode::Full).map_err(ApiError::Validation)?;
	serde_json::from_value(Value::Object(validated))
		.map_err(|err| ApiError::internal("Failed to create overlay", err))
}

fn parse_patch(body: &Value) -> ApiResult<OverlayPatch> {
	let validated = OVERLAY_SCHEMA.validate(body, Mode::Partial).map_err(ApiError::Validation)?;
	serde_json::from_value(Value::Object(validated))
		.map_err(|err| ApiError::internal("Failed to update overlay", err))
}

#[get("/?<query..>")]
async fn list_overlays(query: OverlayQuery, state: &State<AppState>) -> ApiResult<Json<Value>> {
	let page = positive_param("page", query.page.as_deref(), DEFAULT_PAGE)?;
	let limit = positive_param("limit", query.limit.as_deref(), DEFAULT_LIMIT)?.min(MAX_LIMIT);
	let filter = OverlayFilter {
		kind: query.kind.filter(|kind| !kind.is_empty()),
		visible: query.visible.map(|visible| visible.to_lowercase() == "true"),
	};

	let overlays = state.store
		.list_overlays(&filter, Pagination::skip(page, limit), limit)
		.await
		.map_err(ApiError::store("Failed to fetch overlays"))?;
	let total = state.store
		.count_overlays(&filter)
		.await
		.map_err(ApiError::store("Failed to fetch overlays"))?;

	Ok(Json(json!({
		"overlays": overlays,
		"pagination": Pagination::new(page, limit, total),
	})))
}

#[post("/", data = "<body>")]
async fn create_overlay(body: Json<Value>, state: &State<AppState>) -> ApiResult<Created<Json<Overlay>>> {
	let fields = parse_fields(&body)?;
	let overlay = state.store
		.insert_overlay(fields, Utc::now())
		.await
		.map_err(ApiError::store("Failed to create overlay"))?;

	info!("Created overlay: {}", overlay.id);
	Ok(Created::new(format!("/api/overlays/{}", overlay.id)).body(Json(overlay)))
}

#[get("/<id>")]
async fn get_overlay(id: &str, state: &State<AppState>) -> ApiResult<Json<Overlay>> {
	state.store
		.find_overlay(id)
		.await
		.map_err(ApiError::store("Failed to fetch overlay"))?
		.map(Json)
		.ok_or_else(|| ApiError::NotFound("Overlay not found".to_string()))
}

#[put("/<id>", data = "<body>")]
async fn update_overlay(id: &str, body: Json<Value>, state: &State<AppState>) -> ApiResult<Json<Overlay>> {
	let patch = parse_patch(&body)?;
	let updated = state.store
		.update_overlay(id, &patch, Utc::now())
		.await
		.map_err(ApiError::store("Failed to update overlay"))?;

	match updated {
		Some(overlay) => {
			info!("Updated overlay: {} (version {})", id, overlay.version);
			Ok(Json(overlay))
		},
		None => Err(ApiError::NotFound("Overlay not found".to_string())),
	}
}

#[delete("/<id>")]
async fn delete_overlay(id: &str, state: &State<AppState>) -> ApiResult<Json<Value>> {
	let deleted = state.store
		.delete_overlay(id)
		.await
		.map_err(ApiError::store("Failed to delete overlay"))?;

	if !deleted {
		return Err(ApiError::NotFound("Overlay not found".to_string()));
	}
	info!("Deleted overlay: {}", id);
	Ok(Json(json!({
		"message": "Overlay deleted successfully",
	})))
}

/// Applies one bulk operation. `Ok(false)` means no overlay matched.
async fn apply_operation(store: &dyn Store, operation: &Value, now: DateTime<Utc>) -> ApiResult<bool> {
	let id = operation.get("id")
		.and_then(Value::as_str)
		.ok_or_else(|| ApiError::BadRequest("operation has no id".to_string()))?;

	match operation.get("type").and_then(Value::as_str) {
		Some("update") => {
			let data = operation.get("data").cloned().unwrap_or_else(|| json!({}));
			let patch = parse_patch(&data)?;
			let updated = store
				.update_overlay(id, &patch, now)
				.await
				.map_err(ApiError::store("Bulk operation failed"))?;
			Ok(updated.is_some())
		},
		Some("delete") => store
			.delete_overlay(id)
			.await
			.map_err(ApiError::store("Bulk operation failed")),
		other => Err(ApiError::BadRequest(format!("unknown operation type {:?}", other))),
	}
}

/// Each operation stands alone: a failing item is reported, never aborts the rest.
#[post("/bulk", data = "<body>")]
async fn bulk_overlays(body: Json<Value>, state: &State<AppState>) -> ApiResult<Json<Value>> {
	let no_operations = Vec::new();
	let operations = match body.get("operations") {
		None | Some(Value::Null) => &no_operations,
		Some(Value::Array(operations)) => operations,
		Some(_) => return Err(ApiError::BadRequest("'operations' must be an array".to_string())),
	};

	let now = Utc::now();
	let mut results = Vec::with_capacity(operations.len());
	for operation in operations {
		let id = operation.get("id").cloned().unwrap_or(Value::Null);
		let success = match apply_operation(state.store.as_ref(), operation, now).await {
			Ok(applied) => applied,
			Err(err) => {
				warn!("Bulk operation on {} failed: {}", id, err);
				false
			}
		};
		results.push(json!({
			"id": id,
			"success": success,
		}));
	}

	info!("Bulk operation: {} of {} applied", results.iter().filter(|r| r["success"] == true).count(), results.len());
	Ok(Json(json!({
		"results": results,
	})))
}

pub fn routes() -> Vec<Route> {
	routes![list_overlays, create_overlay, get_overlay, update_overlay, delete_overlay, bulk_overlays]
}



#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn page_params_default_and_reject_garbage() {
		assert_eq!(positive_param("page", None, 1).unwrap(), 1);
		assert_eq!(positive_param("limit", Some("25"), 10).unwrap(), 25);
		assert!(matches!(positive_param("page", Some("0"), 1), Err(ApiError::BadRequest(_))));
		assert!(matches!(positive_param("limit", Some("ten"), 10), Err(ApiError::BadRequest(_))));
		assert!(matches!(positive_param("limit", Some("-3"), 10), Err(ApiError::BadRequest(_))));
	}

	#[test]
	fn update_payloads_become_patches() {
		let patch = parse_patch(&json!({"x": 20, "isVisible": false, "_id": "ignored"})).unwrap();
		assert_eq!(patch, OverlayPatch { x: Some(20.0), is_visible: Some(false), ..OverlayPatch::default() });
		assert!(matches!(parse_patch(&json!({"y": 101})), Err(ApiError::Validation(_))));
	}
}
