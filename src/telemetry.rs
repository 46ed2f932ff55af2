use log::debug;
use rocket::request::FromParam;
use serde_json::{Map, Value};
use url::Url;

use crate::common::SessionState;
use crate::error::{CameraError, Result};
use crate::session::Ticker;



/// Stream statistics shown for every camera, in display order.
pub const TELEMETRY_KEYS: [&str; 8] = [
	"Video Codec",
	"Resolution",
	"Frame Rate",
	"GOP Interval",
	"Latency",
	"Jitter",
	"Dropped Frames",
	"Video Bitrate",
];

const PLACEHOLDER_VALUE: &str = "unknown";
const MISSING_VALUE: &str = "N/A";

pub type TelemetrySnapshot = Map<String, Value>;

/// Backend that measures a stream and reports its statistics.
#[rocket::async_trait]
pub trait TelemetryProvider: Send + Sync {
	async fn fetch_stats(&self, uri: &str) -> Result<TelemetrySnapshot>;
}

/// Queries `GET {endpoint}?uri={camera uri}`.
pub struct HttpTelemetryProvider {
	client: reqwest::Client,
	endpoint: Url,
}

impl HttpTelemetryProvider {
	pub fn new(endpoint: &str) -> std::result::Result<Self, url::ParseError> {
		Ok(HttpTelemetryProvider {
			client: reqwest::Client::new(),
			endpoint: Url::parse(endpoint)?,
		})
	}

	pub fn stats_url(&self, uri: &str) -> Url {
		let mut url = self.endpoint.clone();
		url.query_pairs_mut().append_pair("uri", uri);
		url
	}
}

#[rocket::async_trait]
impl TelemetryProvider for HttpTelemetryProvider {
	async fn fetch_stats(&self, uri: &str) -> Result<TelemetrySnapshot> {
		let body: Value = self.client
			.get(self.stats_url(uri))
			.send()
			.await?
			.error_for_status()?
			.json()
			.await?;
		match body {
			Value::Object(stats) => Ok(stats),
			other => Err(CameraError::TransientFetch(format!("expected a JSON object, got {}", other))),
		}
	}
}



#[derive(Clone)]
#[derive(Debug)]
#[derive(PartialEq)]
#[derive(Serialize)]
pub struct TelemetryField {
	pub name: &'static str,
	pub value: String,
}

/// What the telemetry panel currently shows.
#[derive(Clone)]
#[derive(Debug)]
#[derive(PartialEq)]
#[derive(Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum TelemetryView {
	Hidden,
	/// Shown between `show` and the first completed fetch
	Placeholder(Vec<TelemetryField>),
	Values(Vec<TelemetryField>),
	Error(String),
}

impl TelemetryView {
	pub fn placeholder() -> Self {
		TelemetryView::Placeholder(TELEMETRY_KEYS.iter()
			.map(|&name| TelemetryField { name, value: PLACEHOLDER_VALUE.to_string() })
			.collect())
	}

	pub fn from_snapshot(stats: &TelemetrySnapshot) -> Self {
		TelemetryView::Values(TELEMETRY_KEYS.iter()
			.map(|&name| TelemetryField { name, value: display_value(stats.get(name)) })
			.collect())
	}
}

fn display_value(value: Option<&Value>) -> String {
	match value {
		None | Some(Value::Null) => MISSING_VALUE.to_string(),
		Some(Value::String(text)) => text.clone(),
		Some(other) => other.to_string(),
	}
}

#[derive(Clone, Copy)]
#[derive(Debug)]
#[derive(PartialEq, Eq)]
#[derive(Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
	Hidden,
	Visible,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TelemetryCommand {
	Show,
	Hide,
	Toggle,
}

impl<'a> FromParam<'a> for TelemetryCommand {
	type Error = &'a str;

	fn from_param(param: &'a str) -> std::result::Result<Self, Self::Error> {
		match param {
			"show" => Ok(TelemetryCommand::Show),
			"hide" => Ok(TelemetryCommand::Hide),
			"toggle" => Ok(TelemetryCommand::Toggle),
			_ => Err(param),
		}
	}
}

#[derive(Clone)]
#[derive(Debug)]
#[derive(PartialEq)]
#[derive(Serialize)]
pub struct TelemetryStatus {
	pub visibility: Visibility,
	#[serde(flatten)]
	pub session: SessionState,
	pub view: TelemetryView,
}

pub struct TelemetrySession {
	ticker: Option<Ticker>,
	view: TelemetryView,
	last_error: Option<String>,
}

impl TelemetrySession {
	pub fn new() -> Self {
		TelemetrySession {
			ticker: None,
			view: TelemetryView::Hidden,
			last_error: None,
		}
	}

	pub fn visibility(&self) -> Visibility {
		match self.ticker {
			Some(_) => Visibility::Visible,
			None => Visibility::Hidden,
		}
	}

	pub fn view(&self) -> &TelemetryView {
		&self.view
	}

	pub fn status(&self) -> TelemetryStatus {
		TelemetryStatus {
			visibility: self.visibility(),
			session: SessionState {
				active: self.ticker.is_some(),
				last_error: self.last_error.clone(),
			},
			view: self.view().clone(),
		}
	}

	/// Shows the placeholder right away and starts polling. Returns whether the state changed.
	pub fn show(&mut self, spawn: impl FnOnce() -> Ticker) -> bool {
		if self.ticker.is_some() {
			return false;
		}
		self.ticker = Some(spawn());
		self.view = TelemetryView::placeholder();
		self.last_error = None;
		true
	}

	pub fn hide(&mut self) -> bool {
		if self.ticker.take().is_none() {
			return false;
		}
		self.view = TelemetryView::Hidden;
		true
	}

	pub fn toggle(&mut self, spawn: impl FnOnce() -> Ticker) -> bool {
		match self.visibility() {
			Visibility::Hidden => self.show(spawn),
			Visibility::Visible => self.hide(),
		}
	}

	/// Applies a poll result if the ticker that started it is still the live one.
	pub fn commit(&mut self, generation: u64, result: Result<TelemetrySnapshot>) -> bool {
		let live = self.ticker.as_ref().map(|ticker| ticker.generation()) == Some(generation);
		if !live {
			debug!("Discarding stale telemetry from ticker {}", generation);
			return false;
		}
		match result {
			Ok(stats) => {
				self.view = TelemetryView::from_snapshot(&stats);
				self.last_error = None;
			},
			Err(err) => {
				debug!("Telemetry poll failed: {}", err);
				self.view = TelemetryView::Error(err.to_string());
				self.last_error = Some(err.to_string());
			},
		}
		true
	}

	pub fn close(&mut self) {
		self.ticker = None;
		self.view = TelemetryView::Hidden;
	}
}



#[cfg(test)]
mod tests {
	use super::*;
	use crate::session::TELEMETRY_PERIOD;
	use serde_json::json;

	fn idle_ticker(generation: u64) -> Ticker {
		Ticker::spawn(generation, TELEMETRY_PERIOD, || async {})
	}

	fn value_of(view: &TelemetryView, name: &str) -> Option<String> {
		match view {
			TelemetryView::Placeholder(fields) | TelemetryView::Values(fields) => fields.iter()
				.find(|field| field.name == name)
				.map(|field| field.value.clone()),
			_ => None,
		}
	}

	#[test]
	fn missing_keys_render_as_not_available() {
		let stats = json!({
			"Video Codec": "h264",
			"Dropped Frames": 3,
			"Latency": null,
			"Extra": "ignored",
		});
		let view = TelemetryView::from_snapshot(stats.as_object().unwrap());
		assert_eq!(value_of(&view, "Video Codec").as_deref(), Some("h264"));
		assert_eq!(value_of(&view, "Dropped Frames").as_deref(), Some("3"));
		assert_eq!(value_of(&view, "Latency").as_deref(), Some("N/A"));
		assert_eq!(value_of(&view, "Video Bitrate").as_deref(), Some("N/A"));
		assert_eq!(value_of(&view, "Extra"), None);
	}

	#[test]
	fn encodes_uri_in_query() {
		let provider = HttpTelemetryProvider::new("http://127.0.0.1:5000/api/rtspStats").unwrap();
		let url = provider.stats_url("rtsp://10.0.0.5:554/1");
		let (key, value) = url.query_pairs().next().unwrap();
		assert_eq!(key, "uri");
		assert_eq!(value, "rtsp://10.0.0.5:554/1");
		assert!(!url.query().unwrap().contains("://"));
	}

	#[tokio::test]
	async fn show_renders_placeholder_then_values() {
		let mut session = TelemetrySession::new();
		assert_eq!(session.view(), &TelemetryView::Hidden);

		assert!(session.show(|| idle_ticker(1)));
		assert_eq!(value_of(session.view(), "Resolution").as_deref(), Some("unknown"));
		assert!(!session.show(|| panic!("already visible")));

		let stats = json!({ "Resolution": "1920x1080" });
		assert!(session.commit(1, Ok(stats.as_object().unwrap().clone())));
		assert_eq!(value_of(session.view(), "Resolution").as_deref(), Some("1920x1080"));
	}

	#[tokio::test]
	async fn failure_keeps_polling() {
		let mut session = TelemetrySession::new();
		session.show(|| idle_ticker(1));
		assert!(session.commit(1, Err(CameraError::TransientFetch("503".to_string()))));
		assert!(matches!(session.view(), TelemetryView::Error(_)));
		assert_eq!(session.visibility(), Visibility::Visible);
		assert!(session.status().session.last_error.is_some());
	}

	#[tokio::test]
	async fn hidden_panel_ignores_late_results() {
		let mut session = TelemetrySession::new();
		session.show(|| idle_ticker(1));
		assert!(session.toggle(|| panic!("hiding must not spawn")));
		assert_eq!(session.visibility(), Visibility::Hidden);
		assert!(!session.commit(1, Ok(Map::new())));
		assert_eq!(session.view(), &TelemetryView::Hidden);
		assert!(!session.hide());
	}

	#[test]
	fn hidden_view_serializes_without_detail() {
		assert_eq!(serde_json::to_value(TelemetryView::Hidden).unwrap(), json!({ "status": "hidden" }));
	}
}
