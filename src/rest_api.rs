use rocket::fairing::AdHoc;
use rocket::http::{ContentType, Status};
use rocket::serde::json::{json, Json, Value};
use rocket::State;

use log::info;

use crate::common::{Camera, CameraDraft, CameraId, CameraList, GlobalSettings};
use crate::error::Result;
use crate::preview::{PreviewCommand, PreviewStatus};
use crate::recording::{RecordingClient, RecordingCommand};
use crate::registry::SharedRegistry;
use crate::settings::{CameraSettings, GlobalSettingsUpdate, SettingsField, SettingsUpdate};
use crate::telemetry::{TelemetryCommand, TelemetryStatus};



#[get("/")]
async fn list_cameras(registry: &State<SharedRegistry>) -> Json<CameraList> {
	let cameras = registry.read().await;
	Json(cameras.list())
}

#[get("/<id>")]
async fn get_camera(id: CameraId, registry: &State<SharedRegistry>) -> Option<Json<Camera>> {
	let cameras = registry.read().await;
	cameras.get(id).map(|camera| {
		Json(camera)
	})
}

#[post("/", data="<draft>")]
async fn new_camera(draft: Json<CameraDraft>, registry: &State<SharedRegistry>) -> Result<Json<Camera>> {
	let mut cameras = registry.write().await;
	let camera = cameras.add(&draft.name, &draft.uri)?;
	Ok(Json(camera))
}

// Replaces the whole list; every session restarts
#[put("/", data="<cameras>")]
async fn replace_cameras(cameras: Json<CameraList>, registry: &State<SharedRegistry>) -> Result<Json<CameraList>> {
	let mut registry = registry.write().await;
	registry.reload(cameras.into_inner())?;
	Ok(Json(registry.list()))
}

#[patch("/<id>", data="<draft>")]
async fn edit_camera(id: CameraId, draft: Json<CameraDraft>, registry: &State<SharedRegistry>) -> Result<Json<Camera>> {
	let mut cameras = registry.write().await;
	let camera = cameras.edit(id, &draft.name, &draft.uri)?;
	Ok(Json(camera))
}

#[delete("/<id>")]
async fn remove_camera(id: CameraId, registry: &State<SharedRegistry>) -> Status {
	registry.write().await.remove(id);
	Status::NoContent
}



#[derive(Deserialize)]
struct UseGlobalBody {
	use_global: bool,
}

#[derive(Deserialize)]
struct FieldBody {
	value: Value,
}

#[get("/<id>/settings")]
async fn get_settings(id: CameraId, registry: &State<SharedRegistry>) -> Result<Json<CameraSettings>> {
	registry.read().await.settings(id).map(Json)
}

#[get("/<id>/settings/effective")]
async fn get_effective_settings(id: CameraId, registry: &State<SharedRegistry>) -> Result<Json<GlobalSettings>> {
	registry.read().await.effective_settings(id).map(Json)
}

#[put("/<id>/settings/use_global", data="<body>")]
async fn put_use_global(id: CameraId, body: Json<UseGlobalBody>, registry: &State<SharedRegistry>) -> Result<Json<CameraSettings>> {
	registry.write().await.set_use_global(id, body.use_global).map(Json)
}

// Ranked below use_global, which would otherwise match <field> as well
#[put("/<id>/settings/<field>", data="<body>", rank = 2)]
async fn put_settings_field(id: CameraId, field: SettingsField, body: Json<FieldBody>, registry: &State<SharedRegistry>) -> Result<Json<CameraSettings>> {
	let update = SettingsUpdate::from_json(field, &body.value)?;
	registry.write().await.set_field(id, update).map(Json)
}

#[get("/global_settings")]
async fn get_global_settings(registry: &State<SharedRegistry>) -> Json<GlobalSettings> {
	Json(registry.read().await.global_settings())
}

#[put("/global_settings", data="<update>")]
async fn put_global_settings(update: Json<GlobalSettingsUpdate>, registry: &State<SharedRegistry>) -> Result<Json<GlobalSettings>> {
	let mut cameras = registry.write().await;
	let settings = update.into_inner().merged_onto(&cameras.global_settings());
	cameras.update_global_settings(settings)?;
	Ok(Json(cameras.global_settings()))
}



#[get("/<id>/preview")]
async fn preview_status(id: CameraId, registry: &State<SharedRegistry>) -> Result<Json<PreviewStatus>> {
	registry.read().await.preview_status(id).map(Json)
}

#[post("/<id>/preview/<command>")]
async fn preview_command(id: CameraId, command: PreviewCommand, registry: &State<SharedRegistry>) -> Result<Json<PreviewStatus>> {
	let mut cameras = registry.write().await;
	let status = match command {
		PreviewCommand::Toggle => cameras.toggle_preview(id)?,
		PreviewCommand::Pause => cameras.pause_preview(id)?,
		PreviewCommand::Resume => cameras.resume_preview(id)?,
	};
	Ok(Json(status))
}

// 404 while the camera has no fresh frame, so the UI shows its "unavailable" placeholder
#[get("/<id>/preview/frame")]
async fn preview_frame(id: CameraId, registry: &State<SharedRegistry>) -> Result<Option<(ContentType, Vec<u8>)>> {
	let frame = registry.read().await.latest_frame(id)?;
	Ok(frame.map(|frame| (ContentType::JPEG, frame)))
}

#[get("/<id>/telemetry")]
async fn telemetry_status(id: CameraId, registry: &State<SharedRegistry>) -> Result<Json<TelemetryStatus>> {
	registry.read().await.telemetry_status(id).map(Json)
}

#[post("/<id>/telemetry/<command>")]
async fn telemetry_command(id: CameraId, command: TelemetryCommand, registry: &State<SharedRegistry>) -> Result<Json<TelemetryStatus>> {
	let mut cameras = registry.write().await;
	let status = match command {
		TelemetryCommand::Show => cameras.show_telemetry(id)?,
		TelemetryCommand::Hide => cameras.hide_telemetry(id)?,
		TelemetryCommand::Toggle => cameras.toggle_telemetry(id)?,
	};
	Ok(Json(status))
}



#[derive(Serialize)]
struct RecordingOutcome {
	message: String,
	settings: GlobalSettings,
}

#[post("/<id>/recording/<command>")]
async fn recording_command(id: CameraId, command: RecordingCommand, registry: &State<SharedRegistry>, recorder: &State<RecordingClient>) -> Result<Json<RecordingOutcome>> {
	// Resolve the cascade before calling out, so an unknown camera never reaches the service
	let settings = registry.read().await.effective_settings(id)?;
	let message = recorder.send(id, command).await?;
	Ok(Json(RecordingOutcome { message, settings }))
}



#[catch(404)]
fn not_found() -> Value {
	json!({
		"status": "error",
		"reason": "Resource was not found."
	})
}



pub fn stage(registry: SharedRegistry, recorder: RecordingClient) -> AdHoc {
	// tokio::sync::RwLock rather than std::sync::RwLock, so that:
	//     A.) Multiple readers can read the registry at the same time without blocking each other
	//     B.) Tick tasks can wait for the lock without blocking a runtime thread
	AdHoc::on_ignite("JSON", move |rocket| async move {
		rocket
			.manage(registry)
			.manage(recorder)
			.register("/", catchers![not_found])
			.mount("/v0/cameras", routes![
				list_cameras,
				get_camera,
				new_camera,
				replace_cameras,
				edit_camera,
				remove_camera,
				get_settings,
				get_effective_settings,
				put_use_global,
				put_settings_field,
				preview_status,
				preview_command,
				preview_frame,
				telemetry_status,
				telemetry_command,
				recording_command,
			])
			.mount("/v0", routes![get_global_settings, put_global_settings])
	})
}

/// Cancels every session timer when rocket shuts down.
pub fn stop_sessions() -> AdHoc {
	AdHoc::on_shutdown("Stop camera sessions", |rocket| Box::pin(async move {
		if let Some(registry) = rocket.state::<SharedRegistry>() {
			registry.write().await.shutdown();
			info!("Stopped all camera sessions");
		}
	}))
}
