#[macro_use] extern crate rocket;
#[macro_use] extern crate serde_derive;

use std::sync::Arc;

use clap::{Command, Arg, ArgAction};
use rocket::{Request, Response};
use rocket::fairing::{Fairing, Info, Kind};
use rocket::http::Header;

use crate::config::ConfigManager;
use crate::preview::HttpSnapshotProvider;
use crate::recording::RecordingClient;
use crate::registry::Registry;
use crate::telemetry::HttpTelemetryProvider;

mod common;
mod config;
mod error;
mod preview;
mod recording;
mod registry;
mod rest_api;
mod session;
mod settings;
mod telemetry;



// Since the UI is served by another server, we may need to setup CORS to allow the UI to make requests to this server.
pub struct CORS;

#[rocket::async_trait]
impl Fairing for CORS {
	fn info(&self) -> Info {
		Info {
			name: "Add CORS headers to responses",
			kind: Kind::Response
		}
	}

	async fn on_response<'r>(&self, _request: &'r Request<'_>, response: &mut Response<'r>) {
		response.set_header(Header::new("Access-Control-Allow-Origin", "*"));
		response.set_header(Header::new("Access-Control-Allow-Methods", "POST, GET, PUT, PATCH, DELETE, OPTIONS"));
		response.set_header(Header::new("Access-Control-Allow-Headers", "*"));
		response.set_header(Header::new("Access-Control-Allow-Credentials", "true"));
	}
}


#[rocket::main]
async fn main() -> anyhow::Result<()> {
	let matches = Command::new("camera-dashboard")
		.version("0.1.0")
		.author("Alicrow")
		.about("Camera dashboard: live previews, stream telemetry and recording settings.")
		.arg(
			Arg::new("config")
				.action(ArgAction::Append)	// Allow argument to be specified multiple times
				.short('c')
				.long("config")
				.help("TOML file with global recording settings, provider URLs and seed cameras")
		)
		.get_matches();

	let mut config_manager = ConfigManager::new();
	let config_filename_matches = matches.get_many::<String>("config");
	match config_filename_matches {
		Some(filenames) => {
			config_manager.read_config(filenames.map(|v| v.as_str()).collect())?;
		},
		None => {
			// Use default file path
			config_manager.read_default_config_files()?;
		}
	};
	let config = config_manager.get_config()?;

	let snapshots = Arc::new(HttpSnapshotProvider::new());
	let telemetry = Arc::new(HttpTelemetryProvider::new(&config.providers.telemetry_url)?);
	let registry = Registry::shared(config.global.clone(), snapshots, telemetry);
	{
		let mut cameras = registry.write().await;
		for seed in &config.cameras {
			cameras.add(&seed.name, &seed.uri)?;
		}
	}
	let recorder = RecordingClient::new(&config.providers.recording_url);

	rocket::build()
		.attach(rest_api::stage(registry, recorder))
		.attach(rest_api::stop_sessions())
		.attach(CORS)
		.launch()
		.await?;

	anyhow::Ok(())
}
