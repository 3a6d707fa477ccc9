use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use dashlink_lib::app::collaborators::{BundleDir, Collaborators, FixedPort, StaticSecret};
use dashlink_lib::app::config::load_config;
use dashlink_lib::app::device::service::DeviceManager;
use dashlink_lib::app::error::AppError;
use dashlink_lib::app::logging::init_logging;
use dashlink_lib::app::models::BrightnessReading;
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
struct Args {
    serial: Option<String>,
    json: bool,
    bundle: Option<PathBuf>,
    secret: Option<String>,
    port: Option<u16>,
    brightness: Option<f64>,
    install: bool,
    restore: bool,
}

#[derive(Serialize)]
struct SmokeSummary {
    tool: &'static str,
    status: &'static str,
    trace_id: String,
    timestamp_utc: String,
    adb_program: Option<String>,
    serial: Option<String>,
    checks: Vec<SmokeCheck>,
}

#[derive(Serialize)]
struct SmokeCheck {
    name: &'static str,
    status: &'static str, // pass|fail|skip
    duration_ms: u128,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

const USAGE: &str = "usage: smoke [--serial S] [--json] [--bundle DIR --secret TOKEN --install] \
[--restore] [--port N] [--brightness 0..1]";

fn parse_args() -> Result<Args, String> {
    let mut args = Args {
        serial: std::env::var("ANDROID_SERIAL")
            .ok()
            .filter(|s| !s.trim().is_empty()),
        ..Args::default()
    };

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        let mut value = |name: &str| {
            iter.next()
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| format!("{name} requires a value"))
        };
        match arg.as_str() {
            "--serial" => args.serial = Some(value("--serial")?),
            "--json" => args.json = true,
            "--bundle" => args.bundle = Some(PathBuf::from(value("--bundle")?)),
            "--secret" => args.secret = Some(value("--secret")?),
            "--port" => {
                let raw = value("--port")?;
                args.port = Some(raw.parse().map_err(|_| format!("invalid port: {raw}"))?);
            }
            "--brightness" => {
                let raw = value("--brightness")?;
                let parsed: f64 = raw
                    .parse()
                    .map_err(|_| format!("invalid brightness: {raw}"))?;
                if !(0.0..=1.0).contains(&parsed) {
                    return Err("--brightness must be between 0 and 1".to_string());
                }
                args.brightness = Some(parsed);
            }
            "--install" => args.install = true,
            "--restore" => args.restore = true,
            "-h" | "--help" => return Err(USAGE.to_string()),
            other => return Err(format!("unknown argument: {other}\n{USAGE}")),
        }
    }

    if args.install && args.bundle.is_none() {
        return Err("--install requires --bundle".to_string());
    }
    Ok(args)
}

fn run_check<T>(
    checks: &mut Vec<SmokeCheck>,
    name: &'static str,
    work: impl FnOnce() -> Result<T, AppError>,
    describe: impl FnOnce(&T) -> String,
) -> Option<T> {
    let started = Instant::now();
    let result = work();
    let duration_ms = started.elapsed().as_millis();
    match result {
        Ok(value) => {
            checks.push(SmokeCheck {
                name,
                status: "pass",
                duration_ms,
                detail: Some(describe(&value)),
                error_code: None,
                error: None,
            });
            Some(value)
        }
        Err(err) => {
            checks.push(SmokeCheck {
                name,
                status: "fail",
                duration_ms,
                detail: None,
                error_code: Some(err.code),
                error: Some(err.error),
            });
            None
        }
    }
}

fn skip(checks: &mut Vec<SmokeCheck>, name: &'static str, reason: &str) {
    checks.push(SmokeCheck {
        name,
        status: "skip",
        duration_ms: 0,
        detail: Some(reason.to_string()),
        error_code: None,
        error: None,
    });
}

fn main() {
    let args = match parse_args() {
        Ok(args) => args,
        Err(message) => {
            eprintln!("{message}");
            std::process::exit(2);
        }
    };

    let trace_id = Uuid::new_v4().to_string();
    let config = match load_config(&trace_id) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(2);
        }
    };
    init_logging(&config.logging);

    let collaborators = Collaborators {
        secrets: Arc::new(StaticSecret::new(args.secret.clone())),
        server: Arc::new(FixedPort::new(args.port)),
        bundle: Arc::new(BundleDir::new(args.bundle.clone())),
    };
    let manager = match DeviceManager::from_config(&config, collaborators) {
        Ok(manager) => manager,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(2);
        }
    };

    let mut checks = Vec::new();
    let bridge = manager.check_bridge(&trace_id);
    checks.push(SmokeCheck {
        name: "bridge",
        status: if bridge.available { "pass" } else { "fail" },
        duration_ms: 0,
        detail: Some(bridge.version_output.lines().next().unwrap_or_default().to_string()),
        error_code: None,
        error: bridge.error.clone(),
    });

    let serial = if !bridge.available {
        None
    } else if let Some(serial) = args.serial.clone() {
        run_check(
            &mut checks,
            "validate_device",
            || manager.is_valid_device(&serial, &trace_id),
            |valid| format!("{serial} supported={valid}"),
        )
        .filter(|valid| *valid)
        .map(|_| serial)
    } else {
        run_check(
            &mut checks,
            "find_device",
            || manager.find_device(&trace_id),
            |found| found.clone().unwrap_or_else(|| "none".to_string()),
        )
        .flatten()
    };

    if let Some(serial) = serial.as_deref() {
        let device = Some(serial);
        if args.install {
            run_check(
                &mut checks,
                "install_app",
                || manager.install_app(device, &trace_id),
                |_| "installed".to_string(),
            );
        } else if args.restore {
            run_check(
                &mut checks,
                "restore",
                || manager.restore(device, true, &trace_id),
                |_| "restored".to_string(),
            );
        }
        run_check(
            &mut checks,
            "check_installed_app",
            || manager.check_installed_app(device, &trace_id),
            |installed| format!("installed={installed}"),
        );
        run_check(
            &mut checks,
            "get_brightness",
            || manager.get_brightness(device, true, &trace_id),
            |reading| match reading {
                BrightnessReading::Normalized(value) => format!("{value:.3}"),
                BrightnessReading::Raw(raw) => raw.to_string(),
            },
        );
        match args.brightness {
            Some(value) => {
                run_check(
                    &mut checks,
                    "set_brightness_smooth",
                    || manager.set_brightness_smooth(device, value, &trace_id),
                    |raw| format!("raw={raw}"),
                );
            }
            None => skip(&mut checks, "set_brightness_smooth", "no --brightness given"),
        }
        match args.port {
            Some(_) => {
                run_check(
                    &mut checks,
                    "forward_socket_server",
                    || manager.forward_socket_server(device, &trace_id),
                    |info| format!("tcp:{} -> tcp:{}", info.remote_port, info.local_port),
                );
            }
            None => skip(&mut checks, "forward_socket_server", "no --port given"),
        }
    }

    let failed = checks.iter().any(|check| check.status == "fail") || serial.is_none();
    let summary = SmokeSummary {
        tool: "dashlink-smoke",
        status: if failed { "fail" } else { "pass" },
        trace_id,
        timestamp_utc: Utc::now().to_rfc3339(),
        adb_program: bridge.available.then_some(bridge.command_path),
        serial,
        checks,
    };

    if args.json {
        match serde_json::to_string_pretty(&summary) {
            Ok(payload) => println!("{payload}"),
            Err(err) => eprintln!("failed to serialize summary: {err}"),
        }
    } else {
        println!("{} [{}] trace_id={}", summary.tool, summary.status, summary.trace_id);
        for check in &summary.checks {
            let detail = check
                .error
                .as_deref()
                .or(check.detail.as_deref())
                .unwrap_or_default();
            println!("  {:<24} {:<5} {:>6}ms  {}", check.name, check.status, check.duration_ms, detail);
        }
    }

    if failed {
        std::process::exit(1);
    }
}
