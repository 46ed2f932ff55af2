//! The camera registry: the single owner of every camera, its settings and its two live sessions.
//!
//! All mutation happens behind one `tokio::sync::RwLock`. Tick tasks fetch without holding the
//! lock and take the write lock only to commit, at which point the session decides whether the
//! result still belongs to it.

use std::cmp;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use log::{debug, info};
use tokio::sync::RwLock;

use crate::common::{Camera, CameraId, CameraList, GlobalSettings};
use crate::error::{CameraError, Result};
use crate::preview::{PreviewCommand, PreviewSession, PreviewStatus, SnapshotProvider};
use crate::session::{Ticker, PREVIEW_PERIOD, TELEMETRY_PERIOD};
use crate::settings::{self, CameraSettings, SettingsUpdate};
use crate::telemetry::{TelemetryCommand, TelemetryProvider, TelemetrySession, TelemetryStatus};



pub type SharedRegistry = Arc<RwLock<Registry>>;

struct CameraEntry {
	camera: Camera,
	settings: CameraSettings,
	preview: PreviewSession,
	telemetry: TelemetrySession,
}

impl CameraEntry {
	fn close(&mut self) {
		self.preview.close();
		self.telemetry.close();
	}
}

/// Spawns the tick tasks of every session. Each ticker gets a generation number that is never
/// reused, so a late result can't be mistaken for one from a newer session with the same camera id.
#[derive(Clone)]
pub struct Scheduler {
	registry: Weak<RwLock<Registry>>,
	snapshots: Arc<dyn SnapshotProvider>,
	telemetry: Arc<dyn TelemetryProvider>,
	generations: Arc<AtomicU64>,
}

impl Scheduler {
	fn next_generation(&self) -> u64 {
		self.generations.fetch_add(1, Ordering::Relaxed) + 1
	}

	fn preview_ticker(&self, id: CameraId, host: &str) -> Ticker {
		let generation = self.next_generation();
		let registry = self.registry.clone();
		let snapshots = self.snapshots.clone();
		let host = host.to_string();

		Ticker::spawn(generation, PREVIEW_PERIOD, move || {
			let registry = registry.clone();
			let snapshots = snapshots.clone();
			let host = host.clone();
			async move {
				let result = snapshots.fetch_snapshot(&host).await;
				let Some(registry) = registry.upgrade() else {
					return;
				};
				let mut registry = registry.write().await;
				match registry.entry_mut(id) {
					Some(entry) => {
						entry.preview.commit(generation, result);
					},
					None => debug!("Dropping snapshot for removed camera {}", id),
				}
			}
		})
	}

	fn telemetry_ticker(&self, id: CameraId) -> Ticker {
		let generation = self.next_generation();
		let registry = self.registry.clone();
		let telemetry = self.telemetry.clone();

		Ticker::spawn(generation, TELEMETRY_PERIOD, move || {
			let registry = registry.clone();
			let telemetry = telemetry.clone();
			async move {
				let Some(registry) = registry.upgrade() else {
					return;
				};
				// The URI is read on every tick so an edited camera is measured at its new address
				let uri = {
					let cameras = registry.read().await;
					match cameras.get(id) {
						Some(camera) => camera.uri,
						None => return,
					}
				};
				let result = telemetry.fetch_stats(&uri).await;
				let mut registry = registry.write().await;
				match registry.entry_mut(id) {
					Some(entry) => {
						entry.telemetry.commit(generation, result);
					},
					None => debug!("Dropping telemetry for removed camera {}", id),
				}
			}
		})
	}
}

pub struct Registry {
	cameras: Vec<CameraEntry>,
	global: GlobalSettings,
	scheduler: Scheduler,
}

fn next_camera_id(cameras: &[CameraEntry]) -> Result<CameraId> {
	let mut highest_id : CameraId = 0;
	for entry in cameras {
		highest_id = cmp::max(highest_id, entry.camera.id);
	}
	return highest_id.checked_add(1)
		.ok_or_else(|| CameraError::Validation(format!("no camera id left after {}", highest_id)));
}

fn validate_camera(name: &str, uri: &str) -> Result<(String, String)> {
	let name = name.trim();
	let uri = uri.trim();
	if name.is_empty() {
		return Err(CameraError::Validation("camera name must not be empty".to_string()));
	}
	if uri.is_empty() {
		return Err(CameraError::Validation("camera URI must not be empty".to_string()));
	}
	Ok((name.to_string(), uri.to_string()))
}

impl Registry {
	/// Creates an empty registry behind the shared lock its tick tasks commit through.
	pub fn shared(global: GlobalSettings, snapshots: Arc<dyn SnapshotProvider>, telemetry: Arc<dyn TelemetryProvider>) -> SharedRegistry {
		Arc::new_cyclic(|registry| {
			RwLock::new(Registry {
				cameras: Vec::new(),
				global,
				scheduler: Scheduler {
					registry: registry.clone(),
					snapshots,
					telemetry,
					generations: Arc::new(AtomicU64::new(0)),
				},
			})
		})
	}

	fn entry(&self, id: CameraId) -> Result<&CameraEntry> {
		self.cameras.iter()
			.find(|entry| entry.camera.id == id)
			.ok_or(CameraError::NotFound(id))
	}

	fn entry_mut(&mut self, id: CameraId) -> Option<&mut CameraEntry> {
		self.cameras.iter_mut().find(|entry| entry.camera.id == id)
	}

	fn open_entry(&self, camera: Camera, settings: CameraSettings) -> CameraEntry {
		let id = camera.id;
		let preview = PreviewSession::open(&camera.uri, |host| self.scheduler.preview_ticker(id, host));
		CameraEntry {
			camera,
			settings,
			preview,
			telemetry: TelemetrySession::new(),
		}
	}

	pub fn list(&self) -> CameraList {
		self.cameras.iter().map(|entry| entry.camera.clone()).collect()
	}

	pub fn get(&self, id: CameraId) -> Option<Camera> {
		self.entry(id).ok().map(|entry| entry.camera.clone())
	}

	pub fn add(&mut self, name: &str, uri: &str) -> Result<Camera> {
		let (name, uri) = validate_camera(name, uri)?;
		let camera = Camera {
			id: next_camera_id(&self.cameras)?,
			name,
			uri,
		};
		let entry = self.open_entry(camera.clone(), CameraSettings::inherit(&self.global));
		self.cameras.push(entry);
		info!("Added camera {} ({})", camera.id, camera.name);
		Ok(camera)
	}

	/// Renames or re-points a camera. Settings are left as they are; a new URI moves the preview to
	/// the new host without pausing or resuming it.
	pub fn edit(&mut self, id: CameraId, name: &str, uri: &str) -> Result<Camera> {
		let (name, uri) = validate_camera(name, uri)?;
		let scheduler = &self.scheduler;
		let entry = self.cameras.iter_mut()
			.find(|entry| entry.camera.id == id)
			.ok_or(CameraError::NotFound(id))?;
		entry.camera.name = name;
		if entry.camera.uri != uri {
			if entry.preview.retarget(&uri, |host| scheduler.preview_ticker(id, host)) {
				info!("Preview of camera {} now polls {:?} ({:?})", id, entry.preview.host(), entry.preview.state());
			}
			entry.camera.uri = uri;
		}
		info!("Edited camera {}", id);
		Ok(entry.camera.clone())
	}

	/// Removing an unknown camera is a no-op.
	pub fn remove(&mut self, id: CameraId) {
		if let Some(position) = self.cameras.iter().position(|entry| entry.camera.id == id) {
			let mut entry = self.cameras.remove(position);
			entry.close();
			info!("Removed camera {} ({})", id, entry.camera.name);
		}
	}

	/// Replaces the whole camera list. Every session is restarted; settings survive for ids that
	/// are still present.
	pub fn reload(&mut self, cameras: CameraList) -> Result<()> {
		let mut seen = HashSet::new();
		let mut validated = Vec::with_capacity(cameras.len());
		for camera in cameras {
			if !seen.insert(camera.id) {
				return Err(CameraError::Validation(format!("duplicate camera id {}", camera.id)));
			}
			if camera.id == 0 {
				return Err(CameraError::Validation("camera ids start at 1".to_string()));
			}
			let (name, uri) = validate_camera(&camera.name, &camera.uri)?;
			validated.push(Camera { id: camera.id, name, uri });
		}

		let mut previous_settings: HashMap<CameraId, CameraSettings> = HashMap::new();
		for mut entry in self.cameras.drain(..) {
			entry.close();
			previous_settings.insert(entry.camera.id, entry.settings);
		}

		for camera in validated {
			let settings = previous_settings.remove(&camera.id)
				.unwrap_or_else(|| CameraSettings::inherit(&self.global));
			let entry = self.open_entry(camera, settings);
			self.cameras.push(entry);
		}
		info!("Reloaded registry with {} cameras", self.cameras.len());
		Ok(())
	}

	/// Stops every session for good; the cameras stay registered and report their previews as stopped.
	pub fn shutdown(&mut self) {
		for entry in self.cameras.iter_mut() {
			entry.close();
		}
	}



	pub fn global_settings(&self) -> GlobalSettings {
		self.global.clone()
	}

	/// Pushes new globals into every camera that follows them.
	pub fn update_global_settings(&mut self, global: GlobalSettings) -> Result<()> {
		settings::validate_global(&global)?;
		self.global = global;
		for entry in self.cameras.iter_mut() {
			entry.settings.follow_global(&self.global);
		}
		info!("Global settings updated: {:?}", self.global);
		Ok(())
	}

	pub fn settings(&self, id: CameraId) -> Result<CameraSettings> {
		Ok(self.entry(id)?.settings.clone())
	}

	pub fn effective_settings(&self, id: CameraId) -> Result<GlobalSettings> {
		Ok(self.entry(id)?.settings.effective(&self.global))
	}

	pub fn set_use_global(&mut self, id: CameraId, use_global: bool) -> Result<CameraSettings> {
		let global = &self.global;
		let entry = self.cameras.iter_mut()
			.find(|entry| entry.camera.id == id)
			.ok_or(CameraError::NotFound(id))?;
		entry.settings.set_use_global(use_global, global);
		Ok(entry.settings.clone())
	}

	pub fn set_field(&mut self, id: CameraId, update: SettingsUpdate) -> Result<CameraSettings> {
		let entry = self.entry_mut(id).ok_or(CameraError::NotFound(id))?;
		entry.settings.apply(update)?;
		Ok(entry.settings.clone())
	}



	fn preview(&mut self, id: CameraId, command: PreviewCommand) -> Result<PreviewStatus> {
		let scheduler = &self.scheduler;
		let entry = self.cameras.iter_mut()
			.find(|entry| entry.camera.id == id)
			.ok_or(CameraError::NotFound(id))?;
		let spawn = |host: &str| scheduler.preview_ticker(id, host);
		let changed = match command {
			PreviewCommand::Toggle => entry.preview.toggle(spawn),
			PreviewCommand::Pause => entry.preview.pause(),
			PreviewCommand::Resume => entry.preview.resume(spawn),
		};
		if changed {
			info!("Preview of camera {} is now {:?}", id, entry.preview.state());
		}
		Ok(entry.preview.status())
	}

	pub fn toggle_preview(&mut self, id: CameraId) -> Result<PreviewStatus> {
		self.preview(id, PreviewCommand::Toggle)
	}

	pub fn pause_preview(&mut self, id: CameraId) -> Result<PreviewStatus> {
		self.preview(id, PreviewCommand::Pause)
	}

	pub fn resume_preview(&mut self, id: CameraId) -> Result<PreviewStatus> {
		self.preview(id, PreviewCommand::Resume)
	}

	pub fn preview_status(&self, id: CameraId) -> Result<PreviewStatus> {
		Ok(self.entry(id)?.preview.status())
	}

	pub fn latest_frame(&self, id: CameraId) -> Result<Option<Vec<u8>>> {
		Ok(self.entry(id)?.preview.frame().map(|frame| frame.to_vec()))
	}



	fn telemetry(&mut self, id: CameraId, command: TelemetryCommand) -> Result<TelemetryStatus> {
		let scheduler = &self.scheduler;
		let entry = self.cameras.iter_mut()
			.find(|entry| entry.camera.id == id)
			.ok_or(CameraError::NotFound(id))?;
		let spawn = || scheduler.telemetry_ticker(id);
		let changed = match command {
			TelemetryCommand::Show => entry.telemetry.show(spawn),
			TelemetryCommand::Hide => entry.telemetry.hide(),
			TelemetryCommand::Toggle => entry.telemetry.toggle(spawn),
		};
		if changed {
			info!("Telemetry of camera {} is now {:?}", id, entry.telemetry.visibility());
		}
		Ok(entry.telemetry.status())
	}

	pub fn show_telemetry(&mut self, id: CameraId) -> Result<TelemetryStatus> {
		self.telemetry(id, TelemetryCommand::Show)
	}

	pub fn hide_telemetry(&mut self, id: CameraId) -> Result<TelemetryStatus> {
		self.telemetry(id, TelemetryCommand::Hide)
	}

	pub fn toggle_telemetry(&mut self, id: CameraId) -> Result<TelemetryStatus> {
		self.telemetry(id, TelemetryCommand::Toggle)
	}

	pub fn telemetry_status(&self, id: CameraId) -> Result<TelemetryStatus> {
		Ok(self.entry(id)?.telemetry.status())
	}
}
