use log::{debug, info};
use reqwest::header::{CACHE_CONTROL, PRAGMA};
use rocket::request::FromParam;
use url::Url;

use crate::common::SessionState;
use crate::error::Result;
use crate::session::Ticker;



/// Pulls still frames from a camera.
#[rocket::async_trait]
pub trait SnapshotProvider: Send + Sync {
	async fn fetch_snapshot(&self, host: &str) -> Result<Vec<u8>>;
}

/// Fetches `http://{host}/snapshot.jpg`, bypassing any cache.
pub struct HttpSnapshotProvider {
	client: reqwest::Client,
}

impl HttpSnapshotProvider {
	pub fn new() -> Self {
		HttpSnapshotProvider {
			client: reqwest::Client::new(),
		}
	}
}

#[rocket::async_trait]
impl SnapshotProvider for HttpSnapshotProvider {
	async fn fetch_snapshot(&self, host: &str) -> Result<Vec<u8>> {
		let response = self.client
			.get(snapshot_url(host))
			.header(CACHE_CONTROL, "no-cache, no-store")
			.header(PRAGMA, "no-cache")
			.send()
			.await?
			.error_for_status()?;
		Ok(response.bytes().await?.to_vec())
	}
}

pub fn snapshot_url(host: &str) -> String {
	format!("http://{}/snapshot.jpg", host)
}

/// Extracts the host of a `scheme://host[:port]/path` transport URI.
pub fn resolve_host(uri: &str) -> Option<String> {
	let parsed = Url::parse(uri.trim()).ok()?;
	match parsed.host_str() {
		Some(host) if !host.is_empty() => Some(host.to_string()),
		_ => None,
	}
}



#[derive(Clone, Copy)]
#[derive(Debug)]
#[derive(PartialEq, Eq)]
#[derive(Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PreviewState {
	Active,
	Paused,
	/// The URI has no usable host; never polled
	Unavailable,
	/// Closed on shutdown; ignores every command
	Stopped,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PreviewCommand {
	Toggle,
	Pause,
	Resume,
}

impl<'a> FromParam<'a> for PreviewCommand {
	type Error = &'a str;

	fn from_param(param: &'a str) -> std::result::Result<Self, Self::Error> {
		match param {
			"toggle" => Ok(PreviewCommand::Toggle),
			"pause" => Ok(PreviewCommand::Pause),
			"resume" => Ok(PreviewCommand::Resume),
			_ => Err(param),
		}
	}
}

#[derive(Clone)]
#[derive(Debug)]
#[derive(PartialEq)]
#[derive(Serialize)]
pub struct PreviewStatus {
	pub state: PreviewState,
	pub host: Option<String>,
	#[serde(flatten)]
	pub session: SessionState,
	pub has_frame: bool,
}

pub struct PreviewSession {
	host: Option<String>,
	state: PreviewState,
	ticker: Option<Ticker>,
	frame: Option<Vec<u8>>,
	last_error: Option<String>,
}

impl PreviewSession {
	/// Opens the session in the active state, or unavailable if the URI has no host.
	pub fn open(uri: &str, spawn: impl FnOnce(&str) -> Ticker) -> Self {
		let mut session = PreviewSession {
			host: None,
			state: PreviewState::Unavailable,
			ticker: None,
			frame: None,
			last_error: None,
		};
		session.retarget(uri, spawn);
		session
	}

	pub fn state(&self) -> PreviewState {
		self.state
	}

	pub fn host(&self) -> Option<&str> {
		self.host.as_deref()
	}

	/// The frame from the last tick, if that tick succeeded.
	pub fn frame(&self) -> Option<&[u8]> {
		self.frame.as_deref()
	}

	pub fn status(&self) -> PreviewStatus {
		PreviewStatus {
			state: self.state,
			host: self.host().map(str::to_string),
			session: SessionState {
				active: self.state == PreviewState::Active,
				last_error: self.last_error.clone(),
			},
			has_frame: self.frame.is_some(),
		}
	}

	/// Returns whether the state changed.
	pub fn pause(&mut self) -> bool {
		if self.state != PreviewState::Active {
			return false;
		}
		self.ticker = None;
		self.state = PreviewState::Paused;
		true
	}

	/// Returns whether the state changed. The next fetch happens one full period from now.
	pub fn resume(&mut self, spawn: impl FnOnce(&str) -> Ticker) -> bool {
		if self.state != PreviewState::Paused {
			return false;
		}
		let Some(host) = self.host.as_deref() else {
			return false;
		};
		self.ticker = Some(spawn(host));
		self.state = PreviewState::Active;
		true
	}

	pub fn toggle(&mut self, spawn: impl FnOnce(&str) -> Ticker) -> bool {
		match self.state {
			PreviewState::Active => self.pause(),
			PreviewState::Paused => self.resume(spawn),
			PreviewState::Unavailable | PreviewState::Stopped => false,
		}
	}

	/// Points the session at the host of `uri`. An active session restarts polling there, a paused
	/// one just remembers it, and an unavailable one becomes active once the URI has a host.
	/// Returns whether anything changed.
	pub fn retarget(&mut self, uri: &str, spawn: impl FnOnce(&str) -> Ticker) -> bool {
		if self.state == PreviewState::Stopped {
			return false;
		}
		let Some(host) = resolve_host(uri) else {
			if self.state == PreviewState::Unavailable && self.last_error.is_some() {
				return false;
			}
			info!("No host in camera URI {:?}; preview unavailable", uri);
			self.ticker = None;
			self.host = None;
			self.frame = None;
			self.state = PreviewState::Unavailable;
			self.last_error = Some("Camera Unavailable (Invalid URI)".to_string());
			return true;
		};
		if self.host.as_deref() == Some(host.as_str()) {
			return false;
		}
		// Frames and errors from the old host no longer describe this camera
		self.frame = None;
		self.last_error = None;
		match self.state {
			PreviewState::Paused => {},
			_ => {
				self.ticker = Some(spawn(&host));
				self.state = PreviewState::Active;
			},
		}
		self.host = Some(host);
		true
	}

	/// Applies the result of a fetch started by the ticker with `generation`. Results from a
	/// ticker that has since been cancelled are discarded; returns whether it was applied.
	pub fn commit(&mut self, generation: u64, result: Result<Vec<u8>>) -> bool {
		let live = self.ticker.as_ref().map(|ticker| ticker.generation()) == Some(generation);
		if !live {
			debug!("Discarding stale snapshot from ticker {}", generation);
			return false;
		}
		match result {
			Ok(frame) => {
				// Replacing the frame frees the previous one
				self.frame = Some(frame);
				self.last_error = None;
			},
			Err(err) => {
				debug!("Snapshot from {:?} failed: {}", self.host, err);
				self.frame = None;
				self.last_error = Some(err.to_string());
			},
		}
		true
	}

	/// Stops polling for good; used when the camera goes away or the service shuts down.
	pub fn close(&mut self) {
		self.ticker = None;
		self.state = PreviewState::Stopped;
	}
}
