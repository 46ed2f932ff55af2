pub type CameraId = u64;
pub type CameraList = Vec<Camera>;

#[derive(Clone)]
#[derive(Debug)]
#[derive(PartialEq)]
#[derive(Serialize, Deserialize)]
pub struct Camera {
	pub id: CameraId,
	pub name: String,
	pub uri: String,
}

// Body of add/edit requests and seed entries of the config file; the id is always assigned by the registry.
#[derive(Clone)]
#[derive(Debug)]
#[derive(PartialEq)]
#[derive(Serialize, Deserialize)]
pub struct CameraDraft {
	pub name: String,
	pub uri: String,
}

#[derive(Clone)]
#[derive(Debug)]
#[derive(PartialEq)]
#[derive(Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalSettings {
	pub format: String,
	pub location: String,
	pub segmentation_minutes: f64,
}

impl Default for GlobalSettings {
	fn default() -> Self {
		GlobalSettings {
			format: "mp4".to_string(),
			location: "./recordings/".to_string(),
			segmentation_minutes: 10.0,
		}
	}
}

#[derive(Clone)]
#[derive(Debug)]
#[derive(Default)]
#[derive(PartialEq)]
#[derive(Serialize, Deserialize)]
pub struct SessionState {
	pub active: bool,
	pub last_error: Option<String>,
}
