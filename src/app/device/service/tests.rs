use super::*;

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tempfile::TempDir;

use crate::app::adb::command::{live_marker_path, BACKLIGHT_PATH, PASSWORD_FILE, STAGING_DIR, WEBAPP_DIR};
use crate::app::adb::locator::ArchiveDownloader;
use crate::app::collaborators::{BundleDir, FixedPort, StaticSecret};
use crate::app::config::BridgeSettings;
use crate::app::error::{ERR_COMMAND, ERR_DEPENDENCY, ERR_NO_DEVICE, ERR_VALIDATION};

#[derive(Debug, Default)]
struct DeviceState {
    serials: Vec<(String, String)>,
    supported: bool,
    mounted: bool,
    staged: bool,
    marker_staged: bool,
    secret: Option<String>,
    backlight: u8,
    fail_write_after: Option<usize>,
    fail_on: Option<&'static str>,
    writes: Vec<u8>,
    log: Vec<String>,
}

/// Answers adb invocations the way the dashboard unit would.
struct FakeDevice {
    state: Mutex<DeviceState>,
}

impl FakeDevice {
    fn new(state: DeviceState) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(state),
        })
    }

    fn attached(serial: &str) -> DeviceState {
        DeviceState {
            serials: vec![(serial.to_string(), "device".to_string())],
            supported: true,
            backlight: 128,
            ..DeviceState::default()
        }
    }

    fn with<T>(&self, f: impl FnOnce(&mut DeviceState) -> T) -> T {
        let mut guard = self.state.lock().expect("state");
        f(&mut *guard)
    }

    fn log(&self) -> Vec<String> {
        self.with(|state| state.log.clone())
    }

    fn shell(state: &mut DeviceState, script: &str) -> Option<String> {
        if state.fail_on.is_some_and(|needle| script.contains(needle)) {
            return None;
        }
        if script == format!("cat {BACKLIGHT_PATH}") {
            return Some(format!("{}\n", state.backlight));
        }
        if let Some(value) = script
            .strip_prefix("echo ")
            .and_then(|rest| rest.strip_suffix(&format!(" > {BACKLIGHT_PATH}")))
        {
            if let Some(limit) = state.fail_write_after {
                if state.writes.len() >= limit {
                    return None;
                }
            }
            let raw: u8 = value.parse().ok()?;
            state.backlight = raw;
            state.writes.push(raw);
            return Some(String::new());
        }
        if script.starts_with("ls /usr/share/qt-superbird-app") && !script.contains("||") {
            return state
                .supported
                .then(|| "qt-superbird-app.sh\nwebapp".to_string());
        }
        if script == format!("ls {} || true", live_marker_path()) {
            return Some(if state.mounted && state.marker_staged {
                live_marker_path()
            } else {
                format!("ls: {}: No such file or directory", live_marker_path())
            });
        }
        if script.starts_with("mountpoint -q") {
            return Some(if state.mounted { "mounted" } else { "not-mounted" }.to_string());
        }
        if script == format!("umount {WEBAPP_DIR}") {
            // umount of a path that is not mounted fails on the device.
            if !state.mounted {
                return None;
            }
            state.mounted = false;
            return Some(String::new());
        }
        if script == format!("rm -rf {STAGING_DIR}") {
            state.staged = false;
            state.marker_staged = false;
            state.secret = None;
            return Some(String::new());
        }
        if let Some(rest) = script.strip_prefix("echo '") {
            if !state.staged {
                return None;
            }
            let secret = rest.strip_suffix(&format!("' > {STAGING_DIR}/{PASSWORD_FILE}"))?;
            state.secret = Some(secret.to_string());
            return Some(String::new());
        }
        if script.starts_with("touch ") {
            if !state.staged {
                return None;
            }
            state.marker_staged = true;
            return Some(String::new());
        }
        if script == format!("mount --bind {STAGING_DIR} {WEBAPP_DIR}") {
            if !state.staged {
                return None;
            }
            state.mounted = true;
            return Some(String::new());
        }
        if script.starts_with("supervisorctl ") {
            return Some(String::new());
        }
        None
    }
}

impl CommandRunner for FakeDevice {
    fn run(&self, program: &str, args: &[String], _trace_id: &str) -> Option<String> {
        let mut state = self.state.lock().expect("state");
        state.log.push(format!("{program} {}", args.join(" ")));
        match args {
            [command] if command == "version" => Some("Android Debug Bridge version 1.0.41".to_string()),
            [command] if command == "devices" => {
                let mut listing = "List of devices attached\n".to_string();
                for (serial, status) in &state.serials {
                    listing.push_str(&format!("{serial}\t{status}\n"));
                }
                Some(listing)
            }
            [flag, serial, rest @ ..] if flag == "-s" => {
                if !state.serials.iter().any(|(known, _)| known == serial) {
                    return None;
                }
                match rest {
                    [shell, script] if shell == "shell" => Self::shell(&mut state, script),
                    [push, _local, remote] if push == "push" && remote == STAGING_DIR => {
                        state.staged = true;
                        Some("1 file pushed".to_string())
                    }
                    [reverse, _, local] if reverse == "reverse" => {
                        local.strip_prefix("tcp:").map(str::to_string)
                    }
                    _ => None,
                }
            }
            _ => None,
        }
    }
}

struct NoDownload;

impl ArchiveDownloader for NoDownload {
    fn download(&self, url: &str, _dest: &Path, trace_id: &str) -> Result<(), AppError> {
        Err(AppError::download_failed(format!("unexpected download of {url}"), trace_id))
    }
}

fn collaborators(bundle: Option<PathBuf>, secret: Option<&str>, port: Option<u16>) -> Collaborators {
    Collaborators {
        secrets: Arc::new(StaticSecret::new(secret.map(str::to_string))),
        server: Arc::new(FixedPort::new(port)),
        bundle: Arc::new(BundleDir::new(bundle)),
    }
}

fn manager_with(device: &Arc<FakeDevice>, collaborators: Collaborators) -> DeviceManager {
    let settings = BridgeSettings {
        command_path: "adb".to_string(),
        ..BridgeSettings::default()
    };
    let runner: Arc<dyn CommandRunner> = device.clone();
    let resolver = BridgeResolver::new(Arc::clone(&runner), Arc::new(NoDownload), &settings);
    DeviceManager::new(runner, resolver, collaborators)
}

fn manager(device: &Arc<FakeDevice>) -> DeviceManager {
    manager_with(device, collaborators(None, None, None))
}

fn bundle_dir() -> TempDir {
    let tmp = TempDir::new().expect("tmp");
    std::fs::write(tmp.path().join("index.html"), "<html></html>").expect("index");
    tmp
}

#[test]
fn operations_fail_with_no_device_when_nothing_is_attached() {
    let device = FakeDevice::new(DeviceState::default());
    let manager = manager(&device);

    assert_eq!(manager.find_device("t").expect("find"), None);
    let err = manager.restart_app(None, "t").expect_err("no device");
    assert_eq!(err.code, ERR_NO_DEVICE);
    assert_eq!(err.trace_id, "t");
    assert_eq!(manager.get_brightness(None, true, "t").expect_err("no device").code, ERR_NO_DEVICE);
}

#[test]
fn unsupported_unit_is_not_auto_selected() {
    let mut state = FakeDevice::attached("ABC");
    state.supported = false;
    let device = FakeDevice::new(state);
    let manager = manager(&device);

    assert_eq!(manager.find_device("t").expect("find"), None);
    assert!(!manager.is_valid_device("ABC", "t").expect("validate"));
    assert_eq!(manager.set_brightness(None, 0.5, "t").expect_err("none").code, ERR_NO_DEVICE);
}

#[test]
fn explicit_serial_skips_discovery() {
    let device = FakeDevice::new(FakeDevice::attached("ABC"));
    let manager = manager(&device);

    manager.restart_app(Some("ABC"), "t").expect("restart");
    assert_eq!(
        device.log(),
        vec!["adb -s ABC shell supervisorctl restart chromium".to_string()]
    );
}

#[test]
fn discovery_runs_again_on_every_call() {
    let device = FakeDevice::new(FakeDevice::attached("ABC"));
    let manager = manager(&device);

    manager.restart_app(None, "t1").expect("first");
    manager.restart_app(None, "t2").expect("second");
    let listings = device
        .log()
        .iter()
        .filter(|line| line.as_str() == "adb devices")
        .count();
    assert_eq!(listings, 2);
}

#[test]
fn reads_brightness_parsed_or_raw() {
    let mut state = FakeDevice::attached("ABC");
    state.backlight = 0;
    let device = FakeDevice::new(state);
    let manager = manager(&device);

    assert_eq!(
        manager.get_brightness(Some("ABC"), true, "t").expect("parsed"),
        BrightnessReading::Normalized(1.0)
    );
    assert_eq!(
        manager.get_brightness(Some("ABC"), false, "t").expect("raw"),
        BrightnessReading::Raw(0)
    );
}

#[test]
fn unknown_serial_is_command_failed() {
    let device = FakeDevice::new(FakeDevice::attached("ABC"));
    let manager = manager(&device);
    // Unknown serial: the fake refuses every device command.
    assert_eq!(
        manager.get_brightness(Some("ZZZ"), true, "t").expect_err("unknown").code,
        ERR_COMMAND
    );
}

#[test]
fn set_brightness_writes_once() {
    let device = FakeDevice::new(FakeDevice::attached("ABC"));
    let manager = manager(&device);

    assert_eq!(manager.set_brightness(Some("ABC"), 1.0, "t").expect("set"), 0);
    assert_eq!(device.with(|state| state.writes.clone()), vec![0]);
}

#[test]
fn smooth_ramp_issues_ten_writes_and_floors_at_one() {
    for (start, target, expected_last) in [(255u8, 1.0f64, 1u8), (128, 0.5, 127), (10, 0.0, 255)] {
        let mut state = FakeDevice::attached("ABC");
        state.backlight = start;
        let device = FakeDevice::new(state);
        let manager = manager(&device);

        let written = manager
            .set_brightness_smooth(Some("ABC"), target, "t")
            .expect("ramp");
        let writes = device.with(|state| state.writes.clone());
        assert_eq!(writes.len(), 10);
        assert_eq!(written, expected_last);
        assert_eq!(*writes.last().expect("last"), format_brightness(target).max(1));
    }
}

#[test]
fn smooth_ramp_stops_at_first_failed_write() {
    let mut state = FakeDevice::attached("ABC");
    state.backlight = 255;
    state.fail_write_after = Some(3);
    let device = FakeDevice::new(state);
    let manager = manager(&device);

    let err = manager
        .set_brightness_smooth(Some("ABC"), 1.0, "t")
        .expect_err("fails mid ramp");
    assert_eq!(err.code, ERR_COMMAND);
    let (writes, backlight) = device.with(|state| (state.writes.clone(), state.backlight));
    assert_eq!(writes.len(), 3);
    assert_eq!(backlight, writes[2]);
    assert!(backlight > 1);
}

#[test]
fn auto_brightness_toggles_backlight_service() {
    let device = FakeDevice::new(FakeDevice::attached("ABC"));
    let manager = manager(&device);

    manager.set_auto_brightness(Some("ABC"), true, "t").expect("start");
    manager.set_auto_brightness(Some("ABC"), false, "t").expect("stop");
    assert_eq!(
        device.log(),
        vec![
            "adb -s ABC shell supervisorctl start backlight".to_string(),
            "adb -s ABC shell supervisorctl stop backlight".to_string(),
        ]
    );
}

#[test]
fn restore_with_nothing_mounted_does_not_unmount() {
    let device = FakeDevice::new(FakeDevice::attached("ABC"));
    let manager = manager(&device);

    manager.restore(Some("ABC"), true, "t").expect("restore");
    let log = device.log();
    assert!(!log.iter().any(|line| line.contains("umount")));
    assert!(log.iter().any(|line| line.contains("rm -rf /tmp/webapp")));
    assert_eq!(log.last().map(String::as_str), Some("adb -s ABC shell supervisorctl restart chromium"));
}

#[test]
fn restore_twice_after_install_matches_clean_restore() {
    let bundle = bundle_dir();
    let device = FakeDevice::new(FakeDevice::attached("ABC"));
    let manager = manager_with(
        &device,
        collaborators(Some(bundle.path().to_path_buf()), Some("token"), None),
    );

    manager.install_app(Some("ABC"), "t").expect("install");
    assert!(manager.check_installed_app(Some("ABC"), "t").expect("installed"));

    manager.restore(Some("ABC"), true, "t").expect("first restore");
    manager.restore(Some("ABC"), true, "t").expect("second restore");
    let (mounted, staged) = device.with(|state| (state.mounted, state.staged));
    assert!(!mounted);
    assert!(!staged);
    assert!(!manager.check_installed_app(Some("ABC"), "t").expect("not installed"));
}

#[test]
fn install_runs_restore_then_stages_and_mounts() {
    let bundle = bundle_dir();
    let device = FakeDevice::new(FakeDevice::attached("ABC"));
    let manager = manager_with(
        &device,
        collaborators(Some(bundle.path().to_path_buf()), Some("it's-secret"), None),
    );

    manager.install_app(None, "t").expect("install");

    let log = device.log();
    let device_commands: Vec<&str> = log
        .iter()
        .filter(|line| line.starts_with("adb -s ABC"))
        .map(|line| line.trim_start_matches("adb -s ABC "))
        .collect();
    assert_eq!(device_commands.len(), 8);
    assert!(device_commands[0].starts_with("shell ls /usr/share/qt-superbird-app"));
    assert!(device_commands[1].starts_with("shell mountpoint -q"));
    assert_eq!(device_commands[2], "shell rm -rf /tmp/webapp");
    assert_eq!(
        device_commands[3],
        format!("push {} /tmp/webapp", bundle.path().display())
    );
    assert!(device_commands[4].starts_with("shell echo '"));
    assert_eq!(device_commands[5], "shell touch /tmp/webapp/.dashlink_installed");
    assert_eq!(
        device_commands[6],
        "shell mount --bind /tmp/webapp /usr/share/qt-superbird-app/webapp"
    );
    assert_eq!(device_commands[7], "shell supervisorctl restart chromium");

    let (mounted, secret) = device.with(|state| (state.mounted, state.secret.clone()));
    assert!(mounted);
    assert_eq!(secret.as_deref(), Some(r"it'\''s-secret"));
}

#[test]
fn reinstall_unmounts_previous_install_first() {
    let bundle = bundle_dir();
    let device = FakeDevice::new(FakeDevice::attached("ABC"));
    let manager = manager_with(
        &device,
        collaborators(Some(bundle.path().to_path_buf()), Some("token"), None),
    );

    manager.install_app(Some("ABC"), "t1").expect("install");
    manager.install_app(Some("ABC"), "t2").expect("reinstall");
    let unmounts = device
        .log()
        .iter()
        .filter(|line| line.ends_with(&format!("umount {WEBAPP_DIR}")))
        .count();
    assert_eq!(unmounts, 1);
    assert!(device.with(|state| state.mounted));
}

#[test]
fn install_failure_is_not_rolled_back() {
    let bundle = bundle_dir();
    let mut state = FakeDevice::attached("ABC");
    state.fail_on = Some("mount --bind");
    let device = FakeDevice::new(state);
    let manager = manager_with(
        &device,
        collaborators(Some(bundle.path().to_path_buf()), Some("token"), None),
    );

    let err = manager.install_app(Some("ABC"), "t").expect_err("mount fails");
    assert_eq!(err.code, ERR_COMMAND);

    // Pushed and marked but never mounted; the browser is left alone.
    let (staged, marker, mounted) =
        device.with(|state| (state.staged, state.marker_staged, state.mounted));
    assert!(staged);
    assert!(marker);
    assert!(!mounted);
    assert!(!device.log().iter().any(|line| line.contains("supervisorctl")));
    assert!(!manager.check_installed_app(Some("ABC"), "t").expect("check"));
}

#[test]
fn install_requires_bundle_and_secret_before_touching_device() {
    let device = FakeDevice::new(FakeDevice::attached("ABC"));

    let missing_bundle = manager_with(&device, collaborators(None, Some("token"), None));
    assert_eq!(missing_bundle.install_app(None, "t").expect_err("bundle").code, ERR_DEPENDENCY);

    let bundle = bundle_dir();
    let missing_secret = manager_with(
        &device,
        collaborators(Some(bundle.path().to_path_buf()), None, None),
    );
    assert_eq!(missing_secret.install_app(None, "t").expect_err("secret").code, ERR_DEPENDENCY);

    let not_a_dir = manager_with(
        &device,
        collaborators(Some(bundle.path().join("index.html")), Some("token"), None),
    );
    assert_eq!(not_a_dir.install_app(None, "t").expect_err("file").code, ERR_VALIDATION);

    assert!(device.log().is_empty());
}

#[test]
fn marker_check_reads_listing_text() {
    let device = FakeDevice::new(FakeDevice::attached("ABC"));
    let manager = manager(&device);
    assert!(!manager.check_installed_app(Some("ABC"), "t").expect("check"));

    device.with(|state| {
        state.mounted = true;
        state.marker_staged = true;
    });
    assert!(manager.check_installed_app(Some("ABC"), "t").expect("check"));
}

#[test]
fn forward_reverses_fixed_port_to_server_port() {
    let device = FakeDevice::new(FakeDevice::attached("ABC"));
    let manager = manager_with(&device, collaborators(None, None, Some(51234)));

    let info = manager.forward_socket_server(None, "t").expect("forward");
    assert_eq!(
        info,
        ForwardInfo {
            serial: "ABC".to_string(),
            remote_port: 1337,
            local_port: 51234,
        }
    );
    assert_eq!(
        device.log().last().map(String::as_str),
        Some("adb -s ABC reverse tcp:1337 tcp:51234")
    );
}

#[test]
fn forward_without_server_port_is_dependency_error() {
    let device = FakeDevice::new(FakeDevice::attached("ABC"));
    let manager = manager(&device);
    assert_eq!(
        manager.forward_socket_server(None, "t").expect_err("port").code,
        ERR_DEPENDENCY
    );
    assert!(device.log().is_empty());
}

#[test]
fn check_bridge_reports_version() {
    let device = FakeDevice::new(FakeDevice::attached("ABC"));
    let info = manager(&device).check_bridge("t");
    assert!(info.available);
    assert_eq!(info.command_path, "adb");
    assert!(info.version_output.contains("1.0.41"));
}
