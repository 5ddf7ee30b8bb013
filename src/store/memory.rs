use std::collections::HashMap;

use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::common::{Document, Overlay, OverlayFields, OverlayFilter, OverlayList, OverlayPatch, StreamId, StreamList, StreamRecord, StreamStatus};
use crate::store::{Store, StoreResult, INDEX_NAMES};



/// In-process store used when no database is configured, and by the tests.
/// Nothing survives a restart.
pub struct MemoryStore {
	// Insertion order, which is also `createdAt` order.
	overlays: RwLock<Vec<Overlay>>,
	streams: RwLock<HashMap<StreamId, StreamRecord>>,
	settings: RwLock<Option<Document>>,
}

impl MemoryStore {
	pub fn new() -> MemoryStore {
		// Using tokio::sync::RwLock so concurrent readers don't block each
		// other and a waiting writer isn't starved by new readers.
		MemoryStore {
			overlays: RwLock::new(Vec::new()),
			streams: RwLock::new(HashMap::new()),
			settings: RwLock::new(None),
		}
	}
}

impl Default for MemoryStore {
	fn default() -> Self {
		Self::new()
	}
}

fn newest_first<'a>(overlays: &'a [Overlay], filter: &OverlayFilter) -> Vec<&'a Overlay> {
	let mut matching: Vec<&Overlay> = overlays.iter().rev().filter(|overlay| filter.matches(overlay)).collect();
	matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
	matching
}

#[rocket::async_trait]
impl Store for MemoryStore {
	fn name(&self) -> &'static str {
		"in-memory"
	}

	async fn list_overlays(&self, filter: &OverlayFilter, skip: u64, limit: u64) -> StoreResult<OverlayList> {
		let overlays = self.overlays.read().await;
		Ok(newest_first(&overlays, filter)
			.into_iter()
			.skip(skip as usize)
			.take(limit as usize)
			.cloned()
			.collect())
	}

	async fn count_overlays(&self, filter: &OverlayFilter) -> StoreResult<u64> {
		let overlays = self.overlays.read().await;
		Ok(overlays.iter().filter(|overlay| filter.matches(overlay)).count() as u64)
	}

	async fn insert_overlay(&self, fields: OverlayFields, now: DateTime<Utc>) -> StoreResult<Overlay> {
		let overlay = Overlay {
			id: ObjectId::new().to_hex(),
			fields,
			created_at: now,
			updated_at: now,
			version: 1,
		};
		self.overlays.write().await.push(overlay.clone());
		Ok(overlay)
	}

	async fn find_overlay(&self, id: &str) -> StoreResult<Option<Overlay>> {
		let overlays = self.overlays.read().await;
		Ok(overlays.iter().find(|overlay| overlay.id == id).cloned())
	}

	async fn update_overlay(&self, id: &str, patch: &OverlayPatch, now: DateTime<Utc>) -> StoreResult<Option<Overlay>> {
		let mut overlays = self.overlays.write().await;
		Ok(overlays.iter_mut().find(|overlay| overlay.id == id).map(|overlay| {
			patch.apply_to(&mut overlay.fields);
			overlay.updated_at = now;
			overlay.version += 1;
			overlay.clone()
		}))
	}

	async fn delete_overlay(&self, id: &str) -> StoreResult<bool> {
		let mut overlays = self.overlays.write().await;
		let before = overlays.len();
		overlays.retain(|overlay| overlay.id != id);
		Ok(overlays.len() != before)
	}

	async fn upsert_stream(&self, record: &StreamRecord) -> StoreResult<()> {
		let mut streams = self.streams.write().await;
		let id = streams
			.get(&record.stream_id)
			.and_then(|existing| existing.id.clone())
			.or_else(|| record.id.clone())
			.unwrap_or_else(|| ObjectId::new().to_hex());
		let stored = StreamRecord {
			id: Some(id),
			stop_time: None,
			..record.clone()
		};
		streams.insert(record.stream_id.clone(), stored);
		Ok(())
	}

	async fn mark_stream_stopped(&self, stream_id: &str, at: DateTime<Utc>) -> StoreResult<bool> {
		let mut streams = self.streams.write().await;
		Ok(match streams.get_mut(stream_id) {
			Some(record) => {
				record.status = StreamStatus::Stopped;
				record.stop_time = Some(at);
				true
			},
			None => false,
		})
	}

	async fn find_stream(&self, stream_id: &str) -> StoreResult<Option<StreamRecord>> {
		Ok(self.streams.read().await.get(stream_id).cloned())
	}

	async fn count_streams(&self) -> StoreResult<u64> {
		Ok(self.streams.read().await.len() as u64)
	}

	async fn recent_streams(&self, limit: u64) -> StoreResult<StreamList> {
		let streams = self.streams.read().await;
		let mut records: StreamList = streams.values().cloned().collect();
		records.sort_by(|a, b| b.start_time.cmp(&a.start_time).then_with(|| b.id.cmp(&a.id)));
		records.truncate(limit as usize);
		Ok(records)
	}

	async fn find_settings(&self) -> StoreResult<Option<Document>> {
		Ok(self.settings.read().await.clone())
	}

	async fn merge_settings(&self, settings: Document) -> StoreResult<Document> {
		let mut stored = self.settings.write().await;
		let document = stored.get_or_insert_with(|| {
			let mut document = Document::new();
			document.insert("_id".to_string(), Value::String(ObjectId::new().to_hex()));
			document
		});
		for (key, value) in settings {
			if key != "_id" {
				document.insert(key, value);
			}
		}
		Ok(document.clone())
	}

	async fn init_indexes(&self) -> StoreResult<Vec<String>> {
		Ok(INDEX_NAMES.iter().map(|name| name.to_string()).collect())
	}
}



#[cfg(test)]
mod tests {
	use super::*;
	use chrono::Duration;
	use crate::common::{Animation, OverlayKind};
	use serde_json::json;

	fn fields(content: &str, kind: OverlayKind, is_visible: bool) -> OverlayFields {
		OverlayFields {
			kind,
			content: content.to_string(),
			x: 10.0,
			y: 10.0,
			width: 5.0,
			height: 5.0,
			font_size: 16,
			color: "#ffffff".to_string(),
			background_color: "rgba(0,0,0,0.5)".to_string(),
			border_radius: 0,
			opacity: 1.0,
			rotation: 0.0,
			z_index: 1,
			animation: Animation::None,
			is_visible,
		}
	}

	fn record(stream_id: &str, start_time: DateTime<Utc>) -> StreamRecord {
		StreamRecord {
			id: None,
			stream_id: stream_id.to_string(),
			rtsp_url: format!("rtsp://camera/{}", stream_id),
			status: StreamStatus::Active,
			start_time,
			stop_time: None,
			settings: Document::new(),
		}
	}

	#[tokio::test]
	async fn lists_newest_first_with_filters() {
		let store = MemoryStore::new();
		let t0 = Utc::now();
		store.insert_overlay(fields("a", OverlayKind::Text, true), t0).await.unwrap();
		store.insert_overlay(fields("b", OverlayKind::Logo, false), t0 + Duration::seconds(1)).await.unwrap();
		store.insert_overlay(fields("c", OverlayKind::Text, false), t0 + Duration::seconds(2)).await.unwrap();

		let all = store.list_overlays(&OverlayFilter::default(), 0, 10).await.unwrap();
		let contents: Vec<&str> = all.iter().map(|o| o.fields.content.as_str()).collect();
		assert_eq!(contents, ["c", "b", "a"]);

		let text = OverlayFilter { kind: Some("text".to_string()), visible: None };
		assert_eq!(store.count_overlays(&text).await.unwrap(), 2);

		let hidden_text = OverlayFilter { kind: Some("text".to_string()), visible: Some(false) };
		let hidden = store.list_overlays(&hidden_text, 0, 10).await.unwrap();
		assert_eq!(hidden.len(), 1);
		assert_eq!(hidden[0].fields.content, "c");

		let page = store.list_overlays(&OverlayFilter::default(), 1, 1).await.unwrap();
		assert_eq!(page[0].fields.content, "b");
	}

	#[tokio::test]
	async fn update_bumps_version_and_unknown_ids_miss() {
		let store = MemoryStore::new();
		let t0 = Utc::now();
		let created = store.insert_overlay(fields("a", OverlayKind::Image, true), t0).await.unwrap();
		assert_eq!(created.version, 1);

		let patch = OverlayPatch { content: Some("b".to_string()), ..OverlayPatch::default() };
		let later = t0 + Duration::seconds(5);
		let updated = store.update_overlay(&created.id, &patch, later).await.unwrap().unwrap();
		assert_eq!(updated.version, 2);
		assert_eq!(updated.updated_at, later);
		assert_eq!(updated.created_at, t0);
		assert_eq!(updated.fields.content, "b");

		assert!(store.update_overlay("not-an-id", &patch, later).await.unwrap().is_none());
		assert!(store.delete_overlay(&created.id).await.unwrap());
		assert!(!store.delete_overlay(&created.id).await.unwrap());
		assert!(store.find_overlay(&created.id).await.unwrap().is_none());
	}

	#[tokio::test]
	async fn stream_upsert_keeps_id_and_clears_stop_time() {
		let store = MemoryStore::new();
		let t0 = Utc::now();
		store.upsert_stream(&record("cam1", t0)).await.unwrap();
		let first = store.find_stream("cam1").await.unwrap().unwrap();
		assert!(first.id.is_some());

		assert!(store.mark_stream_stopped("cam1", t0 + Duration::seconds(3)).await.unwrap());
		assert!(!store.mark_stream_stopped("cam2", t0).await.unwrap());
		let stopped = store.find_stream("cam1").await.unwrap().unwrap();
		assert_eq!(stopped.status, StreamStatus::Stopped);
		assert!(stopped.stop_time.is_some());

		store.upsert_stream(&record("cam1", t0 + Duration::seconds(10))).await.unwrap();
		let restarted = store.find_stream("cam1").await.unwrap().unwrap();
		assert_eq!(restarted.id, first.id);
		assert_eq!(restarted.status, StreamStatus::Active);
		assert!(restarted.stop_time.is_none());
		assert_eq!(store.count_streams().await.unwrap(), 1);
	}

	#[tokio::test]
	async fn recent_streams_by_start_time() {
		let store = MemoryStore::new();
		let t0 = Utc::now();
		for (i, name) in ["a", "b", "c"].iter().enumerate() {
			store.upsert_stream(&record(name, t0 + Duration::seconds(i as i64))).await.unwrap();
		}
		let recent = store.recent_streams(2).await.unwrap();
		let ids: Vec<&str> = recent.iter().map(|r| r.stream_id.as_str()).collect();
		assert_eq!(ids, ["c", "b"]);
	}

	#[tokio::test]
	async fn recent_streams_break_ties_newest_record_first() {
		let store = MemoryStore::new();
		let t0 = Utc::now();
		for name in ["a", "b", "c", "d"] {
			store.upsert_stream(&record(name, t0)).await.unwrap();
		}
		let recent = store.recent_streams(4).await.unwrap();
		let ids: Vec<&str> = recent.iter().map(|r| r.stream_id.as_str()).collect();
		assert_eq!(ids, ["d", "c", "b", "a"]);
	}

	#[tokio::test]
	async fn settings_merge_keeps_untouched_keys() {
		let store = MemoryStore::new();
		assert!(store.find_settings().await.unwrap().is_none());

		let first = json!({"type": "global", "ui": {"theme": "light"}, "extra": 1});
		store.merge_settings(first.as_object().unwrap().clone()).await.unwrap();
		let second = json!({"ui": {"theme": "dark"}});
		let merged = store.merge_settings(second.as_object().unwrap().clone()).await.unwrap();

		assert_eq!(merged["ui"], json!({"theme": "dark"}));
		assert_eq!(merged["extra"], json!(1));
		assert!(merged["_id"].is_string());
		assert_eq!(store.find_settings().await.unwrap(), Some(merged));
	}
}
