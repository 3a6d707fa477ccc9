use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::app::adb::command::{
    is_mounted_output, DeviceCommand, Secret, SupervisorAction, BACKLIGHT_SERVICE,
    BROWSER_PROGRAM, REVERSE_PORT,
};
use crate::app::adb::locator::{BridgeProgram, BridgeResolver, HttpDownloader};
use crate::app::adb::parse::{is_missing_path_output, parse_backlight_raw};
use crate::app::adb::runner::{CommandRunner, SystemRunner};
use crate::app::collaborators::Collaborators;
use crate::app::config::AppConfig;
use crate::app::device::brightness::{format_brightness, parse_brightness, ramp_target, ramp_values};
use crate::app::device::discovery;
use crate::app::device::steps::{install_plan, restore_plan, Step};
use crate::app::error::AppError;
use crate::app::models::{BridgeInfo, BrightnessReading, ForwardInfo};

/// Operations against the dashboard unit.
///
/// Every operation takes an optional serial. Without one it runs discovery
/// again; no device is remembered between calls. Concurrent calls are not
/// serialized against each other.
pub struct DeviceManager {
    runner: Arc<dyn CommandRunner>,
    resolver: BridgeResolver,
    collaborators: Collaborators,
}

impl DeviceManager {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        resolver: BridgeResolver,
        collaborators: Collaborators,
    ) -> Self {
        Self {
            runner,
            resolver,
            collaborators,
        }
    }

    /// Real processes and HTTP, settings from `config`.
    pub fn from_config(config: &AppConfig, collaborators: Collaborators) -> Result<Self, AppError> {
        let runner: Arc<dyn CommandRunner> = Arc::new(SystemRunner::new(Duration::from_secs(
            config.bridge.command_timeout_secs,
        )));
        let downloader = HttpDownloader::new().map_err(|message| AppError::system(message, ""))?;
        let resolver = BridgeResolver::new(Arc::clone(&runner), Arc::new(downloader), &config.bridge);
        Ok(Self::new(runner, resolver, collaborators))
    }

    pub fn bridge(&self, trace_id: &str) -> Result<BridgeProgram, AppError> {
        self.resolver.resolve(trace_id)
    }

    pub fn check_bridge(&self, trace_id: &str) -> BridgeInfo {
        info!(trace_id = %trace_id, "check_bridge");
        self.resolver.check(trace_id)
    }

    pub fn list_devices(&self, trace_id: &str) -> Result<Vec<String>, AppError> {
        let program = self.bridge(trace_id)?;
        discovery::list_devices(self.runner.as_ref(), &program, trace_id)
    }

    pub fn is_valid_device(&self, serial: &str, trace_id: &str) -> Result<bool, AppError> {
        let program = self.bridge(trace_id)?;
        Ok(discovery::is_valid_device(
            self.runner.as_ref(),
            &program,
            serial,
            trace_id,
        ))
    }

    pub fn find_device(&self, trace_id: &str) -> Result<Option<String>, AppError> {
        let program = self.bridge(trace_id)?;
        discovery::find_device(self.runner.as_ref(), &program, trace_id)
    }

    fn target(&self, device: Option<&str>, trace_id: &str) -> Result<(BridgeProgram, String), AppError> {
        let program = self.bridge(trace_id)?;
        if let Some(serial) = device.map(str::trim).filter(|value| !value.is_empty()) {
            return Ok((program, serial.to_string()));
        }
        let serial = discovery::find_device(self.runner.as_ref(), &program, trace_id)?
            .ok_or_else(|| AppError::no_device(trace_id))?;
        Ok((program, serial))
    }

    fn run_device(
        &self,
        program: &BridgeProgram,
        serial: &str,
        command: &DeviceCommand,
        trace_id: &str,
    ) -> Result<String, AppError> {
        self.runner
            .run(program.command(), &command.args(serial), trace_id)
            .ok_or_else(|| {
                warn!(trace_id = %trace_id, serial = %serial, command = command.label(), "device command failed");
                AppError::command_failed(format!("{} failed on {serial}", command.label()), trace_id)
            })
    }

    fn run_step(
        &self,
        program: &BridgeProgram,
        serial: &str,
        step: &Step,
        trace_id: &str,
    ) -> Result<(), AppError> {
        debug!(trace_id = %trace_id, serial = %serial, step = step.name(), "step");
        let command = match step {
            Step::UnmountIfMounted => {
                let probe = self.run_device(program, serial, &DeviceCommand::ProbeMount, trace_id)?;
                if !is_mounted_output(&probe) {
                    debug!(trace_id = %trace_id, serial = %serial, "web app is not mounted");
                    return Ok(());
                }
                DeviceCommand::Unmount
            }
            Step::RemoveStaging => DeviceCommand::RemoveStaging,
            Step::PushBundle(local_dir) => DeviceCommand::Push {
                local_dir: local_dir.clone(),
            },
            Step::WriteSecret(secret) => DeviceCommand::WriteSecret(secret.clone()),
            Step::CreateMarker => DeviceCommand::CreateMarker,
            Step::BindMount => DeviceCommand::BindMount,
            Step::RestartBrowser => restart_browser_command(),
        };
        self.run_device(program, serial, &command, trace_id).map(|_| ())
    }

    fn run_plan(
        &self,
        program: &BridgeProgram,
        serial: &str,
        steps: &[Step],
        trace_id: &str,
    ) -> Result<(), AppError> {
        for step in steps {
            self.run_step(program, serial, step, trace_id)?;
        }
        Ok(())
    }

    /// Needed after any mount change for the browser to pick it up.
    pub fn restart_app(&self, device: Option<&str>, trace_id: &str) -> Result<(), AppError> {
        let (program, serial) = self.target(device, trace_id)?;
        info!(trace_id = %trace_id, serial = %serial, "restart_app");
        self.run_device(&program, &serial, &restart_browser_command(), trace_id)
            .map(|_| ())
    }

    /// Hands the backlight register to (or takes it back from) the supervisor service.
    pub fn set_auto_brightness(
        &self,
        device: Option<&str>,
        enabled: bool,
        trace_id: &str,
    ) -> Result<(), AppError> {
        let (program, serial) = self.target(device, trace_id)?;
        info!(trace_id = %trace_id, serial = %serial, enabled, "set_auto_brightness");
        let action = if enabled {
            SupervisorAction::Start
        } else {
            SupervisorAction::Stop
        };
        let command = DeviceCommand::Supervisor {
            action,
            program: BACKLIGHT_SERVICE,
        };
        self.run_device(&program, &serial, &command, trace_id)
            .map(|_| ())
    }

    fn read_raw_brightness(
        &self,
        program: &BridgeProgram,
        serial: &str,
        trace_id: &str,
    ) -> Result<u8, AppError> {
        let output = self.run_device(program, serial, &DeviceCommand::ReadBacklight, trace_id)?;
        parse_backlight_raw(&output).ok_or_else(|| {
            AppError::command_failed(format!("Unexpected backlight value: {output}"), trace_id)
        })
    }

    pub fn get_brightness(
        &self,
        device: Option<&str>,
        parse: bool,
        trace_id: &str,
    ) -> Result<BrightnessReading, AppError> {
        let (program, serial) = self.target(device, trace_id)?;
        let raw = self.read_raw_brightness(&program, &serial, trace_id)?;
        debug!(trace_id = %trace_id, serial = %serial, raw, "get_brightness");
        Ok(if parse {
            BrightnessReading::Normalized(parse_brightness(raw))
        } else {
            BrightnessReading::Raw(raw)
        })
    }

    /// Single write. Returns the register value written.
    pub fn set_brightness(
        &self,
        device: Option<&str>,
        normalized: f64,
        trace_id: &str,
    ) -> Result<u8, AppError> {
        let (program, serial) = self.target(device, trace_id)?;
        let raw = format_brightness(normalized);
        info!(trace_id = %trace_id, serial = %serial, raw, "set_brightness");
        self.run_device(&program, &serial, &DeviceCommand::WriteBacklight(raw), trace_id)?;
        Ok(raw)
    }

    /// Ten blocking writes from the current value to the target. Not cancellable;
    /// a failed write leaves the panel at the last value reached.
    pub fn set_brightness_smooth(
        &self,
        device: Option<&str>,
        normalized: f64,
        trace_id: &str,
    ) -> Result<u8, AppError> {
        let (program, serial) = self.target(device, trace_id)?;
        let current = self.read_raw_brightness(&program, &serial, trace_id)?;
        let target = ramp_target(normalized);
        info!(trace_id = %trace_id, serial = %serial, current, target, "set_brightness_smooth");
        for raw in ramp_values(current, target) {
            self.run_device(&program, &serial, &DeviceCommand::WriteBacklight(raw), trace_id)?;
        }
        Ok(target)
    }

    /// Safe when nothing is installed.
    pub fn restore(&self, device: Option<&str>, restart: bool, trace_id: &str) -> Result<(), AppError> {
        let (program, serial) = self.target(device, trace_id)?;
        info!(trace_id = %trace_id, serial = %serial, restart, "restore");
        self.run_plan(&program, &serial, &restore_plan(restart), trace_id)
    }

    pub fn install_app(&self, device: Option<&str>, trace_id: &str) -> Result<(), AppError> {
        let bundle_dir = self
            .collaborators
            .bundle
            .source_dir()
            .map_err(|message| AppError::dependency(message, trace_id))?;
        if !bundle_dir.is_dir() {
            return Err(AppError::validation(
                format!("Web app bundle not found at {}", bundle_dir.display()),
                trace_id,
            ));
        }
        let secret = self
            .collaborators
            .secrets
            .shared_secret()
            .map_err(|message| AppError::dependency(message, trace_id))?;

        let (program, serial) = self.target(device, trace_id)?;
        info!(trace_id = %trace_id, serial = %serial, bundle = %bundle_dir.display(), "install_app");
        let plan = install_plan(bundle_dir.to_string_lossy().to_string(), Secret::new(secret));
        self.run_plan(&program, &serial, &plan, trace_id)?;
        info!(trace_id = %trace_id, serial = %serial, "web app installed");
        Ok(())
    }

    pub fn check_installed_app(&self, device: Option<&str>, trace_id: &str) -> Result<bool, AppError> {
        let (program, serial) = self.target(device, trace_id)?;
        let output = self.run_device(&program, &serial, &DeviceCommand::ListMarker, trace_id)?;
        let installed = !is_missing_path_output(&output);
        debug!(trace_id = %trace_id, serial = %serial, installed, "check_installed_app");
        Ok(installed)
    }

    /// Lets the device reach the host server at `localhost:1337`.
    pub fn forward_socket_server(
        &self,
        device: Option<&str>,
        trace_id: &str,
    ) -> Result<ForwardInfo, AppError> {
        let local_port = self
            .collaborators
            .server
            .listening_port()
            .map_err(|message| AppError::dependency(message, trace_id))?;
        let (program, serial) = self.target(device, trace_id)?;
        info!(trace_id = %trace_id, serial = %serial, local_port, "forward_socket_server");
        self.run_device(&program, &serial, &DeviceCommand::Reverse { local_port }, trace_id)?;
        Ok(ForwardInfo {
            serial,
            remote_port: REVERSE_PORT,
            local_port,
        })
    }
}

fn restart_browser_command() -> DeviceCommand {
    DeviceCommand::Supervisor {
        action: SupervisorAction::Restart,
        program: BROWSER_PROGRAM,
    }
}

#[cfg(test)]
mod tests;
