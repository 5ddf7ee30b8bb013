//! Document store accessor over the `overlays`, `streams` and `settings`
//! collections.

use chrono::{DateTime, Utc};

use crate::common::{Document, Overlay, OverlayFields, OverlayFilter, OverlayList, OverlayPatch, StreamList, StreamRecord};

pub mod memory;
pub mod mongo;

pub use self::memory::MemoryStore;
pub use self::mongo::MongoStore;



pub const OVERLAYS: &str = "overlays";
pub const STREAMS: &str = "streams";
pub const SETTINGS: &str = "settings";

/// Names of the indexes created by [`Store::init_indexes`], in creation order.
pub const INDEX_NAMES: [&str; 4] = ["type_1_isVisible_1", "createdAt_-1", "streamId_1", "status_1"];

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
	#[error("database error: {0}")]
	Database(#[from] mongodb::error::Error),

	#[error("bson encoding error: {0}")]
	Encode(#[from] mongodb::bson::ser::Error),

	#[error("bson decoding error: {0}")]
	Decode(#[from] mongodb::bson::de::Error),

	#[error("malformed document: {0}")]
	Malformed(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Overlay ids that do not parse are treated as absent: lookups return
/// `None`, updates return `None` and deletes return `false`.
#[rocket::async_trait]
pub trait Store: Send + Sync {
	/// Short name for logs.
	fn name(&self) -> &'static str;

	/// Newest-first by `createdAt`.
	async fn list_overlays(&self, filter: &OverlayFilter, skip: u64, limit: u64) -> StoreResult<OverlayList>;
	async fn count_overlays(&self, filter: &OverlayFilter) -> StoreResult<u64>;
	/// Stamps `createdAt`/`updatedAt` with `now` and `version` with 1.
	async fn insert_overlay(&self, fields: OverlayFields, now: DateTime<Utc>) -> StoreResult<Overlay>;
	async fn find_overlay(&self, id: &str) -> StoreResult<Option<Overlay>>;
	/// Applies `patch`, stamps `updatedAt` and bumps `version` in one step.
	async fn update_overlay(&self, id: &str, patch: &OverlayPatch, now: DateTime<Utc>) -> StoreResult<Option<Overlay>>;
	async fn delete_overlay(&self, id: &str) -> StoreResult<bool>;

	/// Inserts or replaces the record keyed by `streamId`, clearing `stopTime`.
	async fn upsert_stream(&self, record: &StreamRecord) -> StoreResult<()>;
	async fn mark_stream_stopped(&self, stream_id: &str, at: DateTime<Utc>) -> StoreResult<bool>;
	async fn find_stream(&self, stream_id: &str) -> StoreResult<Option<StreamRecord>>;
	async fn count_streams(&self) -> StoreResult<u64>;
	/// Newest-first by `startTime`.
	async fn recent_streams(&self, limit: u64) -> StoreResult<StreamList>;

	/// The `type: "global"` settings document, `_id` rendered as a hex string.
	async fn find_settings(&self) -> StoreResult<Option<Document>>;
	/// Upserts the global settings, replacing the given top-level keys and
	/// keeping the others. Returns the stored document.
	async fn merge_settings(&self, settings: Document) -> StoreResult<Document>;

	/// Idempotent. Returns the index names.
	async fn init_indexes(&self) -> StoreResult<Vec<String>>;
}
