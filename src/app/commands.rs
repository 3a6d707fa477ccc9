//! IPC surface for a host Tauri application.
//!
//! Device work blocks on child processes (and, on first use, an HTTP
//! download), so each command hops onto the blocking pool.

use std::sync::Arc;

use tauri::plugin::{Builder, TauriPlugin};
use tauri::{Manager, Runtime, State};
use uuid::Uuid;

use crate::app::device::service::DeviceManager;
use crate::app::error::AppError;
use crate::app::models::{BridgeInfo, BrightnessReading, CommandResponse, ForwardInfo};

pub const PLUGIN_NAME: &str = "dashlink";

pub type SharedDeviceManager = Arc<DeviceManager>;

fn resolve_trace_id(input: Option<String>) -> String {
    input
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

async fn run_blocking<T, F>(
    state: State<'_, SharedDeviceManager>,
    trace_id: Option<String>,
    work: F,
) -> Result<CommandResponse<T>, AppError>
where
    T: Send + 'static,
    F: FnOnce(&DeviceManager, &str) -> Result<T, AppError> + Send + 'static,
{
    let trace_id = resolve_trace_id(trace_id);
    let manager = Arc::clone(state.inner());
    let task_trace_id = trace_id.clone();
    let data = tauri::async_runtime::spawn_blocking(move || work(&manager, &task_trace_id))
        .await
        .map_err(|err| AppError::system(format!("Device task failed: {err}"), &trace_id))??;
    Ok(CommandResponse { trace_id, data })
}

#[tauri::command]
pub async fn check_bridge(
    state: State<'_, SharedDeviceManager>,
    trace_id: Option<String>,
) -> Result<CommandResponse<BridgeInfo>, AppError> {
    run_blocking(state, trace_id, |manager, trace_id| {
        Ok(manager.check_bridge(trace_id))
    })
    .await
}

#[tauri::command]
pub async fn list_devices(
    state: State<'_, SharedDeviceManager>,
    trace_id: Option<String>,
) -> Result<CommandResponse<Vec<String>>, AppError> {
    run_blocking(state, trace_id, |manager, trace_id| manager.list_devices(trace_id)).await
}

#[tauri::command]
pub async fn find_device(
    state: State<'_, SharedDeviceManager>,
    trace_id: Option<String>,
) -> Result<CommandResponse<Option<String>>, AppError> {
    run_blocking(state, trace_id, |manager, trace_id| manager.find_device(trace_id)).await
}

#[tauri::command]
pub async fn restart_app(
    state: State<'_, SharedDeviceManager>,
    device: Option<String>,
    trace_id: Option<String>,
) -> Result<CommandResponse<()>, AppError> {
    run_blocking(state, trace_id, move |manager, trace_id| {
        manager.restart_app(device.as_deref(), trace_id)
    })
    .await
}

#[tauri::command]
pub async fn set_auto_brightness(
    state: State<'_, SharedDeviceManager>,
    enabled: bool,
    device: Option<String>,
    trace_id: Option<String>,
) -> Result<CommandResponse<()>, AppError> {
    run_blocking(state, trace_id, move |manager, trace_id| {
        manager.set_auto_brightness(device.as_deref(), enabled, trace_id)
    })
    .await
}

#[tauri::command]
pub async fn get_brightness(
    state: State<'_, SharedDeviceManager>,
    parse: Option<bool>,
    device: Option<String>,
    trace_id: Option<String>,
) -> Result<CommandResponse<BrightnessReading>, AppError> {
    run_blocking(state, trace_id, move |manager, trace_id| {
        manager.get_brightness(device.as_deref(), parse.unwrap_or(true), trace_id)
    })
    .await
}

#[tauri::command]
pub async fn set_brightness(
    state: State<'_, SharedDeviceManager>,
    value: f64,
    device: Option<String>,
    trace_id: Option<String>,
) -> Result<CommandResponse<u8>, AppError> {
    run_blocking(state, trace_id, move |manager, trace_id| {
        manager.set_brightness(device.as_deref(), value, trace_id)
    })
    .await
}

#[tauri::command]
pub async fn set_brightness_smooth(
    state: State<'_, SharedDeviceManager>,
    value: f64,
    device: Option<String>,
    trace_id: Option<String>,
) -> Result<CommandResponse<u8>, AppError> {
    run_blocking(state, trace_id, move |manager, trace_id| {
        manager.set_brightness_smooth(device.as_deref(), value, trace_id)
    })
    .await
}

#[tauri::command]
pub async fn install_app(
    state: State<'_, SharedDeviceManager>,
    device: Option<String>,
    trace_id: Option<String>,
) -> Result<CommandResponse<()>, AppError> {
    run_blocking(state, trace_id, move |manager, trace_id| {
        manager.install_app(device.as_deref(), trace_id)
    })
    .await
}

#[tauri::command]
pub async fn restore_app(
    state: State<'_, SharedDeviceManager>,
    restart: Option<bool>,
    device: Option<String>,
    trace_id: Option<String>,
) -> Result<CommandResponse<()>, AppError> {
    run_blocking(state, trace_id, move |manager, trace_id| {
        manager.restore(device.as_deref(), restart.unwrap_or(true), trace_id)
    })
    .await
}

#[tauri::command]
pub async fn check_installed_app(
    state: State<'_, SharedDeviceManager>,
    device: Option<String>,
    trace_id: Option<String>,
) -> Result<CommandResponse<bool>, AppError> {
    run_blocking(state, trace_id, move |manager, trace_id| {
        manager.check_installed_app(device.as_deref(), trace_id)
    })
    .await
}

#[tauri::command]
pub async fn forward_socket_server(
    state: State<'_, SharedDeviceManager>,
    device: Option<String>,
    trace_id: Option<String>,
) -> Result<CommandResponse<ForwardInfo>, AppError> {
    run_blocking(state, trace_id, move |manager, trace_id| {
        manager.forward_socket_server(device.as_deref(), trace_id)
    })
    .await
}

/// Registers the device commands under `plugin:dashlink|<command>`.
pub fn init<R: Runtime>(manager: DeviceManager) -> TauriPlugin<R> {
    let shared: SharedDeviceManager = Arc::new(manager);
    Builder::new(PLUGIN_NAME)
        .invoke_handler(tauri::generate_handler![
            check_bridge,
            list_devices,
            find_device,
            restart_app,
            set_auto_brightness,
            get_brightness,
            set_brightness,
            set_brightness_smooth,
            install_app,
            restore_app,
            check_installed_app,
            forward_socket_server
        ])
        .setup(move |app, _api| {
            app.manage(shared);
            Ok(())
        })
        .build()
}
