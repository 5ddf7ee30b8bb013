use rocket::http::Status;
use rocket::request::Request;
use rocket::response::{self, Responder};
use rocket::serde::json::{json, Json};

use log::error;

use crate::store::StoreError;
use crate::validation::FieldErrors;



pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
	#[error("validation failed: {0:?}")]
	Validation(FieldErrors),

	#[error("bad request: {0}")]
	BadRequest(String),

	#[error("not found: {0}")]
	NotFound(String),

	/// `context` is the message shown to the client; the source stays in the log.
	#[error("{context}: {source}")]
	Store {
		context: &'static str,
		#[source]
		source: StoreError,
	},

	#[error("{context}: {detail}")]
	Internal {
		context: &'static str,
		detail: String,
	},
}

impl ApiError {
	pub fn store(context: &'static str) -> impl FnOnce(StoreError) -> ApiError {
		move |source| ApiError::Store { context, source }
	}

	pub fn internal(context: &'static str, detail: impl ToString) -> ApiError {
		ApiError::Internal { context, detail: detail.to_string() }
	}

	pub fn status(&self) -> Status {
		match self {
			ApiError::Validation(_) | ApiError::BadRequest(_) => Status::BadRequest,
			ApiError::NotFound(_) => Status::NotFound,
			ApiError::Store { .. } | ApiError::Internal { .. } => Status::InternalServerError,
		}
	}
}

impl<'r> Responder<'r, 'static> for ApiError {
	fn respond_to(self, request: &'r Request<'_>) -> response::Result<'static> {
		let status = self.status();
		let body = match &self {
			ApiError::Validation(messages) => json!({
				"error": "Validation failed",
				"messages": messages,
			}),
			ApiError::BadRequest(message) | ApiError::NotFound(message) => json!({
				"error": message,
			}),
			ApiError::Store { context, .. } | ApiError::Internal { context, .. } => {
				error!("{} {}: {}", request.method(), request.uri(), self);
				json!({
					"error": context,
				})
			}
		};
		(status, Json(body)).respond_to(request)
	}
}



#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn statuses_follow_the_error_kind() {
		assert_eq!(ApiError::Validation(FieldErrors::new()).status(), Status::BadRequest);
		assert_eq!(ApiError::BadRequest("RTSP URL is required".into()).status(), Status::BadRequest);
		assert_eq!(ApiError::NotFound("Overlay not found".into()).status(), Status::NotFound);
		assert_eq!(ApiError::internal("Failed to fetch overlays", "boom").status(), Status::InternalServerError);
		let store_err = ApiError::store("Failed to create overlay")(StoreError::Malformed("no _id".into()));
		assert_eq!(store_err.status(), Status::InternalServerError);
		assert_eq!(store_err.to_string(), "Failed to create overlay: malformed document: no _id");
	}
}
