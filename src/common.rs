use chrono::{DateTime, Utc};
use serde_json::{Map, Value};



pub type OverlayId = String;
pub type StreamId = String;
pub type OverlayList = Vec<Overlay>;
pub type StreamList = Vec<StreamRecord>;

/// Free-form JSON object, as stored for settings and stream settings.
pub type Document = Map<String, Value>;

#[derive(Clone, Copy)]
#[derive(Debug, PartialEq, Eq)]
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlayKind {
	Text,
	Image,
	Logo,
}

impl OverlayKind {
	pub fn as_str(&self) -> &'static str {
		match self {
			OverlayKind::Text => "text",
			OverlayKind::Image => "image",
			OverlayKind::Logo => "logo",
		}
	}
}

#[derive(Clone, Copy)]
#[derive(Debug, PartialEq, Eq)]
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Animation {
	None,
	Fade,
	Slide,
	Bounce,
}

/// The user-editable part of an overlay.
#[derive(Clone)]
#[derive(Debug, PartialEq)]
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayFields {
	#[serde(rename = "type")]
	pub kind: OverlayKind,
	pub content: String,
	pub x: f64,
	pub y: f64,
	pub width: f64,
	pub height: f64,
	pub font_size: i64,
	pub color: String,
	pub background_color: String,
	pub border_radius: i64,
	pub opacity: f64,
	pub rotation: f64,
	pub z_index: i64,
	pub animation: Animation,
	pub is_visible: bool,
}

#[derive(Clone)]
#[derive(Debug, PartialEq)]
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Overlay {
	#[serde(rename = "_id")]
	pub id: OverlayId,
	#[serde(flatten)]
	pub fields: OverlayFields,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
	pub version: i64,
}

/// Partial update of an overlay. Absent fields are left untouched.
#[derive(Clone, Default)]
#[derive(Debug, PartialEq)]
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayPatch {
	#[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
	pub kind: Option<OverlayKind>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub content: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub x: Option<f64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub y: Option<f64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub width: Option<f64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub height: Option<f64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub font_size: Option<i64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub color: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub background_color: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub border_radius: Option<i64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub opacity: Option<f64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub rotation: Option<f64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub z_index: Option<i64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub animation: Option<Animation>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub is_visible: Option<bool>,
}

impl OverlayPatch {
	pub fn apply_to(&self, fields: &mut OverlayFields) {
		if let Some(kind) = self.kind { fields.kind = kind; }
		if let Some(content) = &self.content { fields.content = content.clone(); }
		if let Some(x) = self.x { fields.x = x; }
		if let Some(y) = self.y { fields.y = y; }
		if let Some(width) = self.width { fields.width = width; }
		if let Some(height) = self.height { fields.height = height; }
		if let Some(font_size) = self.font_size { fields.font_size = font_size; }
		if let Some(color) = &self.color { fields.color = color.clone(); }
		if let Some(background_color) = &self.background_color { fields.background_color = background_color.clone(); }
		if let Some(border_radius) = self.border_radius { fields.border_radius = border_radius; }
		if let Some(opacity) = self.opacity { fields.opacity = opacity; }
		if let Some(rotation) = self.rotation { fields.rotation = rotation; }
		if let Some(z_index) = self.z_index { fields.z_index = z_index; }
		if let Some(animation) = self.animation { fields.animation = animation; }
		if let Some(is_visible) = self.is_visible { fields.is_visible = is_visible; }
	}
}

/// Query filter for listing overlays. `kind` is matched verbatim, so an
/// unknown type simply matches nothing.
#[derive(Clone, Default)]
#[derive(Debug, PartialEq, Eq)]
pub struct OverlayFilter {
	pub kind: Option<String>,
	pub visible: Option<bool>,
}

impl OverlayFilter {
	pub fn matches(&self, overlay: &Overlay) -> bool {
		if let Some(kind) = &self.kind {
			if overlay.fields.kind.as_str() != kind {
				return false;
			}
		}
		match self.visible {
			Some(visible) => overlay.fields.is_visible == visible,
			None => true,
		}
	}
}

#[derive(Clone, Copy)]
#[derive(Debug, PartialEq, Eq)]
#[derive(Serialize, Deserialize)]
pub struct Pagination {
	pub page: u64,
	pub limit: u64,
	pub total: u64,
	pub pages: u64,
}

impl Pagination {
	pub fn new(page: u64, limit: u64, total: u64) -> Pagination {
		Pagination {
			page,
			limit,
			total,
			pages: (total + limit - 1) / limit,
		}
	}

	/// Saturates at `i64::MAX`, the largest skip a store accepts, so a huge
	/// `page` is just past the end.
	pub fn skip(page: u64, limit: u64) -> u64 {
		page.saturating_sub(1).saturating_mul(limit).min(i64::MAX as u64)
	}
}

#[derive(Clone, Copy)]
#[derive(Debug, PartialEq, Eq)]
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamStatus {
	Active,
	Stopped,
}

impl StreamStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			StreamStatus::Active => "active",
			StreamStatus::Stopped => "stopped",
		}
	}
}

/// Persisted stream record, one per stream id.
#[derive(Clone)]
#[derive(Debug, PartialEq)]
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamRecord {
	#[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
	pub id: Option<String>,
	pub stream_id: StreamId,
	pub rtsp_url: String,
	pub status: StreamStatus,
	pub start_time: DateTime<Utc>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub stop_time: Option<DateTime<Utc>>,
	#[serde(default)]
	pub settings: Document,
}



#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn pages_round_up() {
		assert_eq!(Pagination::new(2, 5, 12).pages, 3);
		assert_eq!(Pagination::new(1, 10, 10).pages, 1);
		assert_eq!(Pagination::new(1, 10, 0).pages, 0);
		assert_eq!(Pagination::skip(2, 5), 5);
		assert_eq!(Pagination::skip(1, 10), 0);
	}

	#[test]
	fn skip_of_huge_page_saturates() {
		assert_eq!(Pagination::skip(u64::MAX, 100), i64::MAX as u64);
		assert_eq!(Pagination::skip(u64::MAX / 2, 3), i64::MAX as u64);
		assert_eq!(Pagination::new(u64::MAX, 100, 12).pages, 1);
	}

	#[test]
	fn patch_only_touches_present_fields() {
		let mut fields = OverlayFields {
			kind: OverlayKind::Text,
			content: "hi".to_string(),
			x: 50.0,
			y: 50.0,
			width: 10.0,
			height: 10.0,
			font_size: 16,
			color: "#ffffff".to_string(),
			background_color: "rgba(0,0,0,0.5)".to_string(),
			border_radius: 0,
			opacity: 1.0,
			rotation: 0.0,
			z_index: 1,
			animation: Animation::None,
			is_visible: true,
		};
		let patch = OverlayPatch {
			x: Some(25.0),
			animation: Some(Animation::Fade),
			..OverlayPatch::default()
		};
		patch.apply_to(&mut fields);
		assert_eq!(fields.x, 25.0);
		assert_eq!(fields.animation, Animation::Fade);
		assert_eq!(fields.y, 50.0);
		assert_eq!(fields.content, "hi");
	}

	#[test]
	fn patch_serializes_only_set_fields() {
		let patch = OverlayPatch {
			font_size: Some(20),
			is_visible: Some(false),
			..OverlayPatch::default()
		};
		let value = serde_json::to_value(&patch).unwrap();
		assert_eq!(value, serde_json::json!({"fontSize": 20, "isVisible": false}));
	}
}
