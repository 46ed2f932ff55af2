use rocket::http::Status;
use rocket::request::Request;
use rocket::response::{self, Responder};
use rocket::serde::json::json;

use crate::common::CameraId;



pub type Result<T> = std::result::Result<T, CameraError>;

/// Everything that can go wrong for a single camera. None of these are fatal to the process.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum CameraError {
	/// A required field was empty or out of range
	#[error("invalid input: {0}")]
	Validation(String),

	#[error("camera {0} not found")]
	NotFound(CameraId),

	/// The operation is not allowed in the camera's current state
	#[error("invalid state: {0}")]
	InvalidState(String),

	/// Snapshot, telemetry or recording request failed; the caller retries on its next tick
	#[error("fetch failed: {0}")]
	TransientFetch(String),
}

impl CameraError {
	pub fn status(&self) -> Status {
		match self {
			CameraError::Validation(_) => Status::BadRequest,
			CameraError::NotFound(_) => Status::NotFound,
			CameraError::InvalidState(_) => Status::Conflict,
			CameraError::TransientFetch(_) => Status::BadGateway,
		}
	}
}

impl From<reqwest::Error> for CameraError {
	fn from(err: reqwest::Error) -> Self {
		CameraError::TransientFetch(err.to_string())
	}
}

// Same body shape as the 404 catcher, so the UI only has to understand one error format.
impl<'r> Responder<'r, 'static> for CameraError {
	fn respond_to(self, request: &'r Request<'_>) -> response::Result<'static> {
		let body = json!({
			"status": "error",
			"reason": self.to_string(),
		});
		(self.status(), body).respond_to(request)
	}
}
