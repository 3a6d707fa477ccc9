//! Typed bridge invocations.
//!
//! Every remote operation is one variant rendered to an argument vector.
//! Only fixed paths and typed numbers reach the remote shell; the one free-form
//! value (the shared secret) is single-quoted first.

use std::fmt;

/// Parent of the stock web app; its listing identifies a supported unit.
pub const WEBAPP_ROOT: &str = "/usr/share/qt-superbird-app";
pub const FINGERPRINT_ENTRY: &str = "webapp";
pub const WEBAPP_DIR: &str = "/usr/share/qt-superbird-app/webapp";
pub const STAGING_DIR: &str = "/tmp/webapp";
pub const PASSWORD_FILE: &str = "password.txt";
pub const MARKER_FILE: &str = ".dashlink_installed";
pub const BACKLIGHT_PATH: &str = "/sys/class/backlight/aml-bl/brightness";
pub const BROWSER_PROGRAM: &str = "chromium";
pub const BACKLIGHT_SERVICE: &str = "backlight";
/// Device-side port the web app dials to reach the host server.
pub const REVERSE_PORT: u16 = 1337;

const MOUNTED_TOKEN: &str = "mounted";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostCommand {
    Version,
    Devices,
}

impl HostCommand {
    pub fn args(self) -> Vec<String> {
        match self {
            HostCommand::Version => vec!["version".to_string()],
            HostCommand::Devices => vec!["devices".to_string()],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorAction {
    Start,
    Stop,
    Restart,
}

impl SupervisorAction {
    fn as_str(self) -> &'static str {
        match self {
            SupervisorAction::Start => "start",
            SupervisorAction::Stop => "stop",
            SupervisorAction::Restart => "restart",
        }
    }
}

/// Keeps the token out of `Debug` output and logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCommand {
    ListFingerprint,
    /// Always exits 0; a missing marker shows up as text in the output.
    ListMarker,
    ReadBacklight,
    WriteBacklight(u8),
    Supervisor {
        action: SupervisorAction,
        program: &'static str,
    },
    ProbeMount,
    Unmount,
    RemoveStaging,
    Push { local_dir: String },
    WriteSecret(Secret),
    CreateMarker,
    BindMount,
    Reverse { local_port: u16 },
}

impl DeviceCommand {
    pub fn args(&self, serial: &str) -> Vec<String> {
        let mut args = vec!["-s".to_string(), serial.to_string()];
        match self {
            DeviceCommand::Push { local_dir } => {
                args.push("push".to_string());
                args.push(local_dir.clone());
                args.push(STAGING_DIR.to_string());
            }
            DeviceCommand::Reverse { local_port } => {
                args.push("reverse".to_string());
                args.push(format!("tcp:{REVERSE_PORT}"));
                args.push(format!("tcp:{local_port}"));
            }
            _ => {
                args.push("shell".to_string());
                args.extend(self.shell_script());
            }
        }
        args
    }

    fn shell_script(&self) -> Option<String> {
        let script = match self {
            DeviceCommand::ListFingerprint => format!("ls {WEBAPP_ROOT}"),
            DeviceCommand::ListMarker => format!("ls {} || true", live_marker_path()),
            DeviceCommand::ReadBacklight => format!("cat {BACKLIGHT_PATH}"),
            DeviceCommand::WriteBacklight(raw) => format!("echo {raw} > {BACKLIGHT_PATH}"),
            DeviceCommand::Supervisor { action, program } => {
                format!("supervisorctl {} {program}", action.as_str())
            }
            DeviceCommand::ProbeMount => format!(
                "mountpoint -q {WEBAPP_DIR} && echo {MOUNTED_TOKEN} || echo not-{MOUNTED_TOKEN}"
            ),
            DeviceCommand::Unmount => format!("umount {WEBAPP_DIR}"),
            DeviceCommand::RemoveStaging => format!("rm -rf {STAGING_DIR}"),
            DeviceCommand::WriteSecret(secret) => format!(
                "echo {} > {STAGING_DIR}/{PASSWORD_FILE}",
                shell_quote(secret.expose())
            ),
            DeviceCommand::CreateMarker => format!("touch {STAGING_DIR}/{MARKER_FILE}"),
            DeviceCommand::BindMount => format!("mount --bind {STAGING_DIR} {WEBAPP_DIR}"),
            DeviceCommand::Push { .. } | DeviceCommand::Reverse { .. } => return None,
        };
        Some(script)
    }

    /// Short name used in logs and error messages.
    pub fn label(&self) -> &'static str {
        match self {
            DeviceCommand::ListFingerprint => "list fingerprint",
            DeviceCommand::ListMarker => "list install marker",
            DeviceCommand::ReadBacklight => "read backlight",
            DeviceCommand::WriteBacklight(_) => "write backlight",
            DeviceCommand::Supervisor { .. } => "supervisorctl",
            DeviceCommand::ProbeMount => "probe mount",
            DeviceCommand::Unmount => "unmount web app",
            DeviceCommand::RemoveStaging => "remove staging dir",
            DeviceCommand::Push { .. } => "push bundle",
            DeviceCommand::WriteSecret(_) => "write secret",
            DeviceCommand::CreateMarker => "create install marker",
            DeviceCommand::BindMount => "bind mount web app",
            DeviceCommand::Reverse { .. } => "reverse forward",
        }
    }
}

pub fn live_marker_path() -> String {
    format!("{WEBAPP_DIR}/{MARKER_FILE}")
}

/// Interprets `ProbeMount` output.
pub fn is_mounted_output(output: &str) -> bool {
    output.lines().any(|line| line.trim() == MOUNTED_TOKEN)
}

/// POSIX single-quote escaping.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}
