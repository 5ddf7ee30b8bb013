use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};

use log::{debug, info};

use crate::common::StreamId;
use crate::rtsp::{Capture, CaptureOpener, ProbeError};



#[derive(Debug, thiserror::Error)]
pub enum StartError {
	#[error("Stream already active")]
	AlreadyActive,

	#[error("Cannot open RTSP stream")]
	CannotOpen(#[source] ProbeError),
}

/// Live status of an active stream, as reported by the status endpoint.
#[derive(Clone)]
#[derive(Debug, PartialEq)]
#[derive(Serialize)]
pub struct StreamSnapshot {
	pub status: &'static str,
	pub rtsp_url: String,
	pub start_time: DateTime<Utc>,
	/// Seconds since the stream was started.
	pub uptime: f64,
}

struct ActiveStream {
	capture: Box<dyn Capture>,
	rtsp_url: String,
	start_time: DateTime<Utc>,
}

enum Slot {
	// Reserved from the start request until its record is stored. Starts and
	// stops of the same id are refused meanwhile.
	Starting,
	Active(ActiveStream),
}

/// The set of streams this process currently holds a capture for.
///
/// The map is only locked for short synchronous sections, never across the
/// network probe or a store write.
pub struct StreamRegistry {
	opener: Arc<dyn CaptureOpener>,
	streams: Mutex<HashMap<StreamId, Slot>>,
}

impl StreamRegistry {
	pub fn new(opener: Arc<dyn CaptureOpener>) -> StreamRegistry {
		StreamRegistry {
			opener,
			streams: Mutex::new(HashMap::new()),
		}
	}

	pub fn opener(&self) -> &dyn CaptureOpener {
		self.opener.as_ref()
	}

	fn slots(&self) -> MutexGuard<'_, HashMap<StreamId, Slot>> {
		// Nothing panics while holding the lock, but don't wedge the registry if it does.
		self.streams.lock().unwrap_or_else(PoisonError::into_inner)
	}

	/// Reserves `stream_id` and opens a capture for it.
	///
	/// The stream only becomes active once [`PendingStream::activate`] is
	/// called. Dropping the returned value instead releases the capture and
	/// frees the id, as does a failed or panicking open.
	pub async fn start(&self, stream_id: &str, rtsp_url: &str) -> Result<PendingStream<'_>, StartError> {
		{
			let mut streams = self.slots();
			if streams.contains_key(stream_id) {
				return Err(StartError::AlreadyActive);
			}
			streams.insert(stream_id.to_string(), Slot::Starting);
		}
		let mut pending = PendingStream {
			registry: self,
			stream_id: stream_id.to_string(),
			stream: None,
			activated: false,
		};

		match self.opener.open(rtsp_url).await {
			Ok(capture) => {
				pending.stream = Some(ActiveStream {
					capture,
					rtsp_url: rtsp_url.to_string(),
					start_time: Utc::now(),
				});
				Ok(pending)
			},
			Err(err) => {
				debug!("Stream {} failed to open {}: {}", stream_id, rtsp_url, err);
				Err(StartError::CannotOpen(err))
			}
		}
	}

	/// Releases the capture of an active stream. Returns `false` if the stream
	/// was not active.
	pub fn stop(&self, stream_id: &str) -> bool {
		let mut streams = self.slots();
		if !matches!(streams.get(stream_id), Some(Slot::Active(_))) {
			return false;
		}
		if let Some(Slot::Active(mut stream)) = streams.remove(stream_id) {
			stream.capture.release();
			info!("Stream {} stopped ({})", stream_id, stream.rtsp_url);
		}
		true
	}

	pub fn status(&self, stream_id: &str) -> Option<StreamSnapshot> {
		let streams = self.slots();
		match streams.get(stream_id) {
			Some(Slot::Active(stream)) => {
				let elapsed = Utc::now() - stream.start_time;
				Some(StreamSnapshot {
					status: "active",
					rtsp_url: stream.rtsp_url.clone(),
					start_time: stream.start_time,
					uptime: elapsed.num_milliseconds() as f64 / 1000.0,
				})
			},
			_ => None,
		}
	}

	pub fn active_count(&self) -> usize {
		self.slots().values().filter(|slot| matches!(slot, Slot::Active(_))).count()
	}
}

/// A reserved stream id whose capture is open but not yet active.
pub struct PendingStream<'a> {
	registry: &'a StreamRegistry,
	stream_id: StreamId,
	stream: Option<ActiveStream>,
	activated: bool,
}

impl PendingStream<'_> {
	pub fn start_time(&self) -> DateTime<Utc> {
		self.stream.as_ref().map(|stream| stream.start_time).unwrap_or_else(Utc::now)
	}

	/// Makes the stream visible to status and stop.
	pub fn activate(mut self) {
		if let Some(stream) = self.stream.take() {
			info!("Stream {} active ({})", self.stream_id, stream.rtsp_url);
			self.registry.slots().insert(self.stream_id.clone(), Slot::Active(stream));
			self.activated = true;
		}
	}
}

impl Drop for PendingStream<'_> {
	fn drop(&mut self) {
		if self.activated {
			return;
		}
		if let Some(mut stream) = self.stream.take() {
			stream.capture.release();
		}
		self.registry.slots().remove(&self.stream_id);
		debug!("Released reservation for stream {}", self.stream_id);
	}
}
