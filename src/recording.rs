use log::info;
use rocket::request::FromParam;

use crate::common::CameraId;
use crate::error::{CameraError, Result};



#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordingCommand {
	Start,
	Stop,
}

impl RecordingCommand {
	fn endpoint(&self) -> &'static str {
		match self {
			RecordingCommand::Start => "start_recording",
			RecordingCommand::Stop => "stop_recording",
		}
	}
}

impl<'a> FromParam<'a> for RecordingCommand {
	type Error = &'a str;

	fn from_param(param: &'a str) -> std::result::Result<Self, Self::Error> {
		match param {
			"start" => Ok(RecordingCommand::Start),
			"stop" => Ok(RecordingCommand::Stop),
			_ => Err(param),
		}
	}
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RecordingRequest {
	stream_id: CameraId,
}

#[derive(Debug)]
#[derive(Deserialize)]
struct RecordingReply {
	message: Option<String>,
	error: Option<String>,
}

impl RecordingReply {
	fn into_result(self, command: RecordingCommand) -> Result<String> {
		match (self.message, self.error) {
			(_, Some(error)) => Err(CameraError::TransientFetch(error)),
			(Some(message), None) => Ok(message),
			(None, None) => Ok(match command {
				RecordingCommand::Start => "Recording started".to_string(),
				RecordingCommand::Stop => "Recording stopped".to_string(),
			}),
		}
	}
}

/// Client of the recording service, which owns the actual capture processes.
pub struct RecordingClient {
	client: reqwest::Client,
	base_url: String,
}

impl RecordingClient {
	pub fn new(base_url: &str) -> Self {
		RecordingClient {
			client: reqwest::Client::new(),
			base_url: base_url.trim_end_matches('/').to_string(),
		}
	}

	pub fn url_for(&self, command: RecordingCommand) -> String {
		format!("{}/{}", self.base_url, command.endpoint())
	}

	/// The service answers errors with a non-2xx status and an `{error}` body, so the body is
	/// parsed regardless of status.
	pub async fn send(&self, id: CameraId, command: RecordingCommand) -> Result<String> {
		let reply: RecordingReply = self.client
			.post(self.url_for(command))
			.json(&RecordingRequest { stream_id: id })
			.send()
			.await?
			.json()
			.await?;
		let message = reply.into_result(command)?;
		info!("Recording {:?} for camera {}: {}", command, id, message);
		Ok(message)
	}
}
