use chrono::{DateTime, TimeZone, Utc};
use futures::TryStreamExt;
use mongodb::bson::{self, doc, oid::ObjectId, Bson, DateTime as BsonDateTime, Document as BsonDocument};
use mongodb::options::{ClientOptions, FindOneAndUpdateOptions, FindOptions, IndexOptions, ReturnDocument, UpdateOptions};
use mongodb::{Client, Collection, Database, IndexModel};
use serde_json::Value;

use crate::common::{Document, Overlay, OverlayFields, OverlayFilter, OverlayList, OverlayPatch, StreamList, StreamRecord, StreamStatus};
use crate::store::{Store, StoreError, StoreResult, OVERLAYS, SETTINGS, STREAMS};



pub const DEFAULT_DATABASE: &str = "livestream_app";

#[derive(Debug)]
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OverlayDocument {
	#[serde(rename = "_id")]
	id: ObjectId,
	#[serde(flatten)]
	fields: OverlayFields,
	created_at: BsonDateTime,
	updated_at: BsonDateTime,
	version: i64,
}

#[derive(Debug)]
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreamDocument {
	#[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
	id: Option<ObjectId>,
	stream_id: String,
	rtsp_url: String,
	status: StreamStatus,
	start_time: BsonDateTime,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	stop_time: Option<BsonDateTime>,
	#[serde(default)]
	settings: BsonDocument,
}

fn to_bson_time(time: DateTime<Utc>) -> BsonDateTime {
	BsonDateTime::from_millis(time.timestamp_millis())
}

fn from_bson_time(time: BsonDateTime) -> StoreResult<DateTime<Utc>> {
	Utc.timestamp_millis_opt(time.timestamp_millis())
		.single()
		.ok_or_else(|| StoreError::Malformed(format!("timestamp out of range: {}", time.timestamp_millis())))
}

/// Converts a BSON document to plain JSON, rendering `_id` as a hex string.
fn to_json_document(mut document: BsonDocument) -> Document {
	let id = document.remove("_id");
	let mut json = match Bson::Document(document).into_relaxed_extjson() {
		Value::Object(object) => object,
		_ => Document::new(),
	};
	match id {
		Some(Bson::ObjectId(oid)) => {
			json.insert("_id".to_string(), Value::String(oid.to_hex()));
		},
		Some(other) => {
			json.insert("_id".to_string(), other.into_relaxed_extjson());
		},
		None => {}
	}
	json
}

impl TryFrom<OverlayDocument> for Overlay {
	type Error = StoreError;

	fn try_from(document: OverlayDocument) -> StoreResult<Overlay> {
		Ok(Overlay {
			id: document.id.to_hex(),
			fields: document.fields,
			created_at: from_bson_time(document.created_at)?,
			updated_at: from_bson_time(document.updated_at)?,
			version: document.version,
		})
	}
}

impl TryFrom<StreamDocument> for StreamRecord {
	type Error = StoreError;

	fn try_from(document: StreamDocument) -> StoreResult<StreamRecord> {
		Ok(StreamRecord {
			id: document.id.map(|id| id.to_hex()),
			stream_id: document.stream_id,
			rtsp_url: document.rtsp_url,
			status: document.status,
			start_time: from_bson_time(document.start_time)?,
			stop_time: document.stop_time.map(from_bson_time).transpose()?,
			settings: to_json_document(document.settings),
		})
	}
}

fn overlay_query(filter: &OverlayFilter) -> BsonDocument {
	let mut query = doc! {};
	if let Some(kind) = &filter.kind {
		query.insert("type", kind.as_str());
	}
	if let Some(visible) = filter.visible {
		query.insert("isVisible", visible);
	}
	query
}

/// Newest first. ObjectIds grow with insertion, so `_id` orders overlays
/// created within the same millisecond.
fn overlay_sort() -> BsonDocument {
	doc! { "createdAt": -1, "_id": -1 }
}

fn stream_sort() -> BsonDocument {
	doc! { "startTime": -1, "_id": -1 }
}

/// MongoDB-backed store. Overlay ids are ObjectIds rendered as hex.
pub struct MongoStore {
	overlays: Collection<OverlayDocument>,
	streams: Collection<StreamDocument>,
	settings: Collection<BsonDocument>,
}

impl MongoStore {
	/// `database` overrides the database named in the URI, which in turn
	/// overrides [`DEFAULT_DATABASE`].
	pub async fn connect(uri: &str, database: Option<&str>) -> StoreResult<MongoStore> {
		let options = ClientOptions::parse(uri).await?;
		let name = database
			.map(str::to_string)
			.or_else(|| options.default_database.clone())
			.unwrap_or_else(|| DEFAULT_DATABASE.to_string());
		let client = Client::with_options(options)?;
		Ok(MongoStore::with_database(&client.database(&name)))
	}

	pub fn with_database(db: &Database) -> MongoStore {
		MongoStore {
			overlays: db.collection(OVERLAYS),
			streams: db.collection(STREAMS),
			settings: db.collection(SETTINGS),
		}
	}
}

#[rocket::async_trait]
impl Store for MongoStore {
	fn name(&self) -> &'static str {
		"MongoDB"
	}

	async fn list_overlays(&self, filter: &OverlayFilter, skip: u64, limit: u64) -> StoreResult<OverlayList> {
		let options = FindOptions::builder()
			.sort(overlay_sort())
			.skip(skip)
			.limit(limit as i64)
			.build();
		let cursor = self.overlays.find(overlay_query(filter), options).await?;
		let documents: Vec<OverlayDocument> = cursor.try_collect().await?;
		documents.into_iter().map(Overlay::try_from).collect()
	}

	async fn count_overlays(&self, filter: &OverlayFilter) -> StoreResult<u64> {
		Ok(self.overlays.count_documents(overlay_query(filter), None).await?)
	}

	async fn insert_overlay(&self, fields: OverlayFields, now: DateTime<Utc>) -> StoreResult<Overlay> {
		let document = OverlayDocument {
			id: ObjectId::new(),
			fields,
			created_at: to_bson_time(now),
			updated_at: to_bson_time(now),
			version: 1,
		};
		self.overlays.insert_one(&document, None).await?;
		Overlay::try_from(document)
	}

	async fn find_overlay(&self, id: &str) -> StoreResult<Option<Overlay>> {
		let oid = match ObjectId::parse_str(id) {
			Ok(oid) => oid,
			Err(_) => return Ok(None),
		};
		self.overlays
			.find_one(doc! { "_id": oid }, None)
			.await?
			.map(Overlay::try_from)
			.transpose()
	}

	async fn update_overlay(&self, id: &str, patch: &OverlayPatch, now: DateTime<Utc>) -> StoreResult<Option<Overlay>> {
		let oid = match ObjectId::parse_str(id) {
			Ok(oid) => oid,
			Err(_) => return Ok(None),
		};
		let mut set = bson::to_document(patch)?;
		set.insert("updatedAt", to_bson_time(now));
		let options = FindOneAndUpdateOptions::builder()
			.return_document(ReturnDocument::After)
			.build();
		self.overlays
			.find_one_and_update(doc! { "_id": oid }, doc! { "$set": set, "$inc": { "version": 1_i64 } }, options)
			.await?
			.map(Overlay::try_from)
			.transpose()
	}

	async fn delete_overlay(&self, id: &str) -> StoreResult<bool> {
		let oid = match ObjectId::parse_str(id) {
			Ok(oid) => oid,
			Err(_) => return Ok(false),
		};
		let result = self.overlays.delete_one(doc! { "_id": oid }, None).await?;
		Ok(result.deleted_count > 0)
	}

	async fn upsert_stream(&self, record: &StreamRecord) -> StoreResult<()> {
		let settings = bson::to_document(&record.settings)?;
		let update = doc! {
			"$set": {
				"streamId": record.stream_id.as_str(),
				"rtspUrl": record.rtsp_url.as_str(),
				"status": record.status.as_str(),
				"startTime": to_bson_time(record.start_time),
				"settings": settings,
			},
			"$unset": { "stopTime": "" },
		};
		let options = UpdateOptions::builder().upsert(true).build();
		self.streams
			.update_one(doc! { "streamId": record.stream_id.as_str() }, update, options)
			.await?;
		Ok(())
	}

	async fn mark_stream_stopped(&self, stream_id: &str, at: DateTime<Utc>) -> StoreResult<bool> {
		let update = doc! {
			"$set": {
				"status": StreamStatus::Stopped.as_str(),
				"stopTime": to_bson_time(at),
			},
		};
		let result = self.streams.update_one(doc! { "streamId": stream_id }, update, None).await?;
		Ok(result.matched_count > 0)
	}

	async fn find_stream(&self, stream_id: &str) -> StoreResult<Option<StreamRecord>> {
		self.streams
			.find_one(doc! { "streamId": stream_id }, None)
			.await?
			.map(StreamRecord::try_from)
			.transpose()
	}

	async fn count_streams(&self) -> StoreResult<u64> {
		Ok(self.streams.count_documents(doc! {}, None).await?)
	}

	async fn recent_streams(&self, limit: u64) -> StoreResult<StreamList> {
		let options = FindOptions::builder()
			.sort(stream_sort())
			.limit(limit as i64)
			.build();
		let cursor = self.streams.find(doc! {}, options).await?;
		let documents: Vec<StreamDocument> = cursor.try_collect().await?;
		documents.into_iter().map(StreamRecord::try_from).collect()
	}

	async fn find_settings(&self) -> StoreResult<Option<Document>> {
		let found = self.settings.find_one(doc! { "type": "global" }, None).await?;
		Ok(found.map(to_json_document))
	}

	async fn merge_settings(&self, mut settings: Document) -> StoreResult<Document> {
		// _id is immutable once the document exists.
		settings.remove("_id");
		let set = bson::to_document(&settings)?;
		let options = FindOneAndUpdateOptions::builder()
			.upsert(true)
			.return_document(ReturnDocument::After)
			.build();
		let stored = self.settings
			.find_one_and_update(doc! { "type": "global" }, doc! { "$set": set }, options)
			.await?
			.ok_or_else(|| StoreError::Malformed("settings upsert returned no document".to_string()))?;
		Ok(to_json_document(stored))
	}

	async fn init_indexes(&self) -> StoreResult<Vec<String>> {
		let unique = IndexOptions::builder().unique(true).build();
		let mut names = Vec::new();

		let created = self.overlays
			.create_index(IndexModel::builder().keys(doc! { "type": 1, "isVisible": 1 }).build(), None)
			.await?;
		names.push(created.index_name);
		let created = self.overlays
			.create_index(IndexModel::builder().keys(doc! { "createdAt": -1 }).build(), None)
			.await?;
		names.push(created.index_name);
		let created = self.streams
			.create_index(IndexModel::builder().keys(doc! { "streamId": 1 }).options(unique).build(), None)
			.await?;
		names.push(created.index_name);
		let created = self.streams
			.create_index(IndexModel::builder().keys(doc! { "status": 1 }).build(), None)
			.await?;
		names.push(created.index_name);

		Ok(names)
	}
}



#[cfg(test)]
mod tests {
	use super::*;
	use crate::common::{Animation, OverlayKind};
	use serde_json::json;

	#[test]
	fn overlay_document_round_trips_through_bson() {
		let now = Utc.timestamp_millis_opt(1_700_000_000_123).single().unwrap();
		let document = OverlayDocument {
			id: ObjectId::new(),
			fields: OverlayFields {
				kind: OverlayKind::Logo,
				content: "logo.png".to_string(),
				x: 1.5,
				y: 2.0,
				width: 20.0,
				height: 10.0,
				font_size: 16,
				color: "#ffffff".to_string(),
				background_color: "rgba(0,0,0,0.5)".to_string(),
				border_radius: 4,
				opacity: 0.5,
				rotation: 90.0,
				z_index: 2,
				animation: Animation::Bounce,
				is_visible: false,
			},
			created_at: to_bson_time(now),
			updated_at: to_bson_time(now),
			version: 3,
		};
		let raw = bson::to_document(&document).unwrap();
		assert_eq!(raw.get_str("type").unwrap(), "logo");
		assert_eq!(raw.get_str("animation").unwrap(), "bounce");
		assert!(raw.get_datetime("createdAt").is_ok());
		assert!(raw.get_object_id("_id").is_ok());

		let decoded: OverlayDocument = bson::from_document(raw).unwrap();
		let overlay = Overlay::try_from(decoded).unwrap();
		assert_eq!(overlay.id, document.id.to_hex());
		assert_eq!(overlay.created_at, now);
		assert_eq!(overlay.fields.border_radius, 4);
		assert_eq!(overlay.version, 3);
	}

	#[test]
	fn patch_becomes_a_set_document() {
		let patch = OverlayPatch { x: Some(12.0), is_visible: Some(true), ..OverlayPatch::default() };
		let set = bson::to_document(&patch).unwrap();
		assert_eq!(set.len(), 2);
		assert_eq!(set.get_f64("x").unwrap(), 12.0);
		assert!(set.get_bool("isVisible").unwrap());
	}

	#[test]
	fn query_only_names_given_filters() {
		assert!(overlay_query(&OverlayFilter::default()).is_empty());
		let query = overlay_query(&OverlayFilter { kind: Some("text".to_string()), visible: Some(true) });
		assert_eq!(query, doc! { "type": "text", "isVisible": true });
	}

	#[test]
	fn sorts_break_timestamp_ties_by_id() {
		let overlays = overlay_sort();
		let keys: Vec<&str> = overlays.keys().map(String::as_str).collect();
		assert_eq!(keys, ["createdAt", "_id"]);
		assert_eq!(overlays.get_i32("_id").unwrap(), -1);

		let streams = stream_sort();
		let keys: Vec<&str> = streams.keys().map(String::as_str).collect();
		assert_eq!(keys, ["startTime", "_id"]);
	}

	#[test]
	fn settings_documents_render_plain_json() {
		let oid = ObjectId::new();
		let stored = doc! { "_id": oid, "type": "global", "ui": { "theme": "dark" }, "bufferSize": 3_i64 };
		let json = to_json_document(stored);
		assert_eq!(json["_id"], json!(oid.to_hex()));
		assert_eq!(json["ui"], json!({"theme": "dark"}));
		assert_eq!(json["bufferSize"], json!(3));
	}
}
