use std::fs;
use std::path::Path;

use anyhow::Context;
use log::{info, warn};
use toml::{Table, Value};

use crate::common::{CameraDraft, GlobalSettings};



const DEFAULT_CONFIG_FILES: [&str; 2] = [
	"/etc/camera-dashboard/config.toml",
	"camera-dashboard.toml",
];

#[derive(Clone)]
#[derive(Debug)]
#[derive(Default)]
#[derive(Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
	pub global: GlobalSettings,
	pub providers: ProviderConfig,
	pub cameras: Vec<CameraDraft>,
}

#[derive(Clone)]
#[derive(Debug)]
#[derive(Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
	pub telemetry_url: String,
	pub recording_url: String,
}

impl Default for ProviderConfig {
	fn default() -> Self {
		ProviderConfig {
			telemetry_url: "http://127.0.0.1:5000/api/rtspStats".to_string(),
			recording_url: "http://127.0.0.1:5000/api".to_string(),
		}
	}
}

/// Layers any number of TOML files; later files override earlier ones key by key and camera
/// lists are concatenated.
#[derive(Clone, Debug, Default)]
pub struct ConfigManager {
	merged: Table,
}

impl ConfigManager {
	pub fn new() -> Self {
		ConfigManager::default()
	}

	/// Reads files given explicitly; any of them missing or malformed is an error.
	pub fn read_config(&mut self, filenames: Vec<&str>) -> anyhow::Result<()> {
		for filename in filenames {
			self.read_file(Path::new(filename))?;
		}
		Ok(())
	}

	pub fn read_default_config_files(&mut self) -> anyhow::Result<()> {
		for filename in DEFAULT_CONFIG_FILES {
			let path = Path::new(filename);
			if !path.exists() {
				// Expected on a fresh install; defaults apply
				warn!("Config file {} not found, skipping", filename);
				continue;
			}
			self.read_file(path)?;
		}
		Ok(())
	}

	fn read_file(&mut self, path: &Path) -> anyhow::Result<()> {
		let text = fs::read_to_string(path)
			.with_context(|| format!("Failed to read config file {}", path.display()))?;
		self.merge_str(&text)
			.with_context(|| format!("Failed to parse config file {}", path.display()))?;
		info!("Read config file {}", path.display());
		Ok(())
	}

	pub fn merge_str(&mut self, text: &str) -> anyhow::Result<()> {
		let table: Table = toml::from_str(text)?;
		merge_tables(&mut self.merged, table);
		Ok(())
	}

	pub fn get_config(&self) -> anyhow::Result<DashboardConfig> {
		let config: DashboardConfig = Value::Table(self.merged.clone())
			.try_into()
			.context("Invalid configuration")?;
		Ok(config)
	}
}

fn merge_tables(base: &mut Table, overlay: Table) {
	for (key, value) in overlay {
		let merged = match (base.remove(&key), value) {
			(Some(Value::Table(mut existing)), Value::Table(incoming)) => {
				merge_tables(&mut existing, incoming);
				Value::Table(existing)
			},
			(Some(Value::Array(mut existing)), Value::Array(incoming)) => {
				existing.extend(incoming);
				Value::Array(existing)
			},
			(_, value) => value,
		};
		base.insert(key, merged);
	}
}
