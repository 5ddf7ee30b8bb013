use rocket::serde::json::{json, Json, Value};
use rocket::{Route, State};

use crate::common::OverlayFilter;
use crate::error::{ApiError, ApiResult};
use crate::rest_api::AppState;



const RECENT_ACTIVITY: u64 = 5;

#[get("/overview")]
async fn overview(state: &State<AppState>) -> ApiResult<Json<Value>> {
	let store = &state.store;
	let failed = || ApiError::store("Failed to fetch analytics");

	let all = OverlayFilter::default();
	let visible = OverlayFilter { visible: Some(true), ..OverlayFilter::default() };
	let total_overlays = store.count_overlays(&all).await.map_err(failed())?;
	let active_overlays = store.count_overlays(&visible).await.map_err(failed())?;
	let total_streams = store.count_streams().await.map_err(failed())?;
	let active_streams = state.registry.active_count();

	let recent_overlays = store.list_overlays(&all, 0, RECENT_ACTIVITY).await.map_err(failed())?;
	let recent_streams = store.recent_streams(RECENT_ACTIVITY).await.map_err(failed())?;

	Ok(Json(json!({
		"summary": {
			"totalOverlays": total_overlays,
			"activeOverlays": active_overlays,
			"totalStreams": total_streams,
			"activeStreams": active_streams,
		},
		"recentActivity": {
			"overlays": recent_overlays,
			"streams": recent_streams,
		},
		"systemStatus": {
			"uptime": "OK",
			"memoryUsage": "Normal",
			"activeConnections": active_streams,
		},
	})))
}

pub fn routes() -> Vec<Route> {
	routes![overview]
}
