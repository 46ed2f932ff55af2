//! Recording settings cascade.
//!
//! Every camera either follows the global defaults or carries its own frozen override. While a
//! camera follows the globals its value fields are kept equal to them, so a reader never sees a
//! stale copy.

use rocket::request::FromParam;

use crate::common::GlobalSettings;
use crate::error::{CameraError, Result};



#[derive(Clone)]
#[derive(Debug)]
#[derive(PartialEq)]
#[derive(Serialize, Deserialize)]
pub struct CameraSettings {
	pub use_global: bool,
	pub format: String,
	pub location: String,
	pub segmentation_minutes: f64,
}

/// One of the override fields a camera can edit once it stops following the globals.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SettingsField {
	Format,
	Location,
	SegmentationMinutes,
}

impl<'a> FromParam<'a> for SettingsField {
	type Error = &'a str;

	fn from_param(param: &'a str) -> std::result::Result<Self, Self::Error> {
		match param {
			"format" => Ok(SettingsField::Format),
			"location" => Ok(SettingsField::Location),
			"segmentation_minutes" => Ok(SettingsField::SegmentationMinutes),
			_ => Err(param),
		}
	}
}

/// A typed write to a single override field.
#[derive(Clone, Debug, PartialEq)]
pub enum SettingsUpdate {
	Format(String),
	Location(String),
	SegmentationMinutes(f64),
}

impl SettingsUpdate {
	/// Builds an update from a field name and the JSON value the UI sent for it.
	pub fn from_json(field: SettingsField, value: &serde_json::Value) -> Result<Self> {
		match field {
			SettingsField::Format | SettingsField::Location => {
				let text = value.as_str()
					.ok_or_else(|| CameraError::Validation("expected a string value".to_string()))?;
				Ok(match field {
					SettingsField::Format => SettingsUpdate::Format(text.to_string()),
					_ => SettingsUpdate::Location(text.to_string()),
				})
			},
			SettingsField::SegmentationMinutes => {
				// The settings form submits numbers as text
				let minutes = match value {
					serde_json::Value::Number(number) => number.as_f64(),
					serde_json::Value::String(text) => text.trim().parse::<f64>().ok(),
					_ => None,
				};
				minutes
					.map(SettingsUpdate::SegmentationMinutes)
					.ok_or_else(|| CameraError::Validation("expected a number of minutes".to_string()))
			},
		}
	}
}

/// A write to the global defaults. Fields left out keep their current value.
#[derive(Clone)]
#[derive(Debug)]
#[derive(Default)]
#[derive(PartialEq)]
#[derive(Deserialize)]
pub struct GlobalSettingsUpdate {
	pub format: Option<String>,
	pub location: Option<String>,
	pub segmentation_minutes: Option<f64>,
}

impl GlobalSettingsUpdate {
	pub fn merged_onto(self, current: &GlobalSettings) -> GlobalSettings {
		GlobalSettings {
			format: self.format.unwrap_or_else(|| current.format.clone()),
			location: self.location.unwrap_or_else(|| current.location.clone()),
			segmentation_minutes: self.segmentation_minutes.unwrap_or(current.segmentation_minutes),
		}
	}
}

pub fn validate_global(settings: &GlobalSettings) -> Result<()> {
	validate_text("format", &settings.format)?;
	validate_text("location", &settings.location)?;
	validate_minutes(settings.segmentation_minutes)
}

fn validate_text(field: &str, value: &str) -> Result<()> {
	if value.trim().is_empty() {
		return Err(CameraError::Validation(format!("{} must not be empty", field)));
	}
	Ok(())
}

fn validate_minutes(minutes: f64) -> Result<()> {
	if !minutes.is_finite() || minutes <= 0.0 {
		return Err(CameraError::Validation(format!("segmentation must be a positive number of minutes, got {}", minutes)));
	}
	Ok(())
}

impl CameraSettings {
	/// Settings for a freshly registered camera: following the globals.
	pub fn inherit(global: &GlobalSettings) -> Self {
		CameraSettings {
			use_global: true,
			format: global.format.clone(),
			location: global.location.clone(),
			segmentation_minutes: global.segmentation_minutes,
		}
	}

	pub fn set_use_global(&mut self, use_global: bool, global: &GlobalSettings) {
		self.use_global = use_global;
		if use_global {
			self.copy_from(global);
		}
		// Switching off keeps the current values as the frozen override
	}

	/// Called for every camera when the globals change.
	pub fn follow_global(&mut self, global: &GlobalSettings) {
		if self.use_global {
			self.copy_from(global);
		}
	}

	pub fn apply(&mut self, update: SettingsUpdate) -> Result<()> {
		if self.use_global {
			return Err(CameraError::InvalidState("settings follow the global defaults; disable use_global before editing".to_string()));
		}
		match update {
			SettingsUpdate::Format(format) => {
				validate_text("format", &format)?;
				self.format = format;
			},
			SettingsUpdate::Location(location) => {
				validate_text("location", &location)?;
				self.location = location;
			},
			SettingsUpdate::SegmentationMinutes(minutes) => {
				validate_minutes(minutes)?;
				self.segmentation_minutes = minutes;
			},
		}
		Ok(())
	}

	/// The settings a recording for this camera must use.
	pub fn effective(&self, global: &GlobalSettings) -> GlobalSettings {
		if self.use_global {
			global.clone()
		} else {
			GlobalSettings {
				format: self.format.clone(),
				location: self.location.clone(),
				segmentation_minutes: self.segmentation_minutes,
			}
		}
	}

	fn copy_from(&mut self, global: &GlobalSettings) {
		self.format = global.format.clone();
		self.location = global.location.clone();
		self.segmentation_minutes = global.segmentation_minutes;
	}
}
