use std::fmt;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::app::adb::command::HostCommand;
use crate::app::adb::runner::CommandRunner;
use crate::app::config::{resolve_data_dir, BridgeSettings};
use crate::app::error::AppError;
use crate::app::models::BridgeInfo;

pub const BARE_ADB: &str = "adb";
const TOOLS_DIR_NAME: &str = "platform-tools";
const PARTIAL_ARCHIVE_NAME: &str = "platform-tools.zip.part";

pub fn normalize_command_path(value: &str) -> String {
    let trimmed = value.trim();
    if let Some(inner) = trimmed
        .strip_prefix('"')
        .and_then(|candidate| candidate.strip_suffix('"'))
    {
        return inner.trim().to_string();
    }
    if let Some(inner) = trimmed
        .strip_prefix('\'')
        .and_then(|candidate| candidate.strip_suffix('\''))
    {
        return inner.trim().to_string();
    }
    trimmed.to_string()
}

pub fn validate_adb_program(program: &str) -> Result<(), String> {
    if program.trim().is_empty() {
        return Err("ADB command is empty".to_string());
    }
    if program == BARE_ADB {
        return Ok(());
    }
    let path = Path::new(program);
    if path.is_dir() {
        return Err("ADB path must point to an executable file".to_string());
    }
    if !path.exists() {
        return Err("ADB executable not found at the configured path".to_string());
    }
    Ok(())
}

/// A runnable reference to the bridge executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeProgram {
    /// Found on the search path.
    OnPath,
    /// Named explicitly in the config.
    Configured(String),
    /// Downloaded into the per-user data directory.
    Provisioned(String),
}

impl BridgeProgram {
    /// Unquoted form passed to the process spawner.
    pub fn command(&self) -> &str {
        match self {
            BridgeProgram::OnPath => BARE_ADB,
            BridgeProgram::Configured(path) | BridgeProgram::Provisioned(path) => path,
        }
    }

    /// `adb`, or the absolute path wrapped in double quotes.
    pub fn quoted(&self) -> String {
        match self {
            BridgeProgram::OnPath => BARE_ADB.to_string(),
            BridgeProgram::Configured(path) | BridgeProgram::Provisioned(path) => {
                format!("\"{path}\"")
            }
        }
    }
}

impl fmt::Display for BridgeProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.quoted())
    }
}

pub fn executable_name(host_os: &str) -> &'static str {
    if host_os == "windows" {
        "adb.exe"
    } else {
        "adb"
    }
}

pub fn platform_archive_name(host_os: &str) -> Option<&'static str> {
    match host_os {
        "windows" => Some("platform-tools-latest-windows.zip"),
        "macos" => Some("platform-tools-latest-darwin.zip"),
        "linux" => Some("platform-tools-latest-linux.zip"),
        _ => None,
    }
}

/// External archive tool invocation that unpacks `archive` into `dest`.
pub fn extract_command(host_os: &str, archive: &Path, dest: &Path) -> (String, Vec<String>) {
    let archive = archive.to_string_lossy().to_string();
    let dest = dest.to_string_lossy().to_string();
    if host_os == "windows" {
        (
            "tar".to_string(),
            vec!["-xf".to_string(), archive, "-C".to_string(), dest],
        )
    } else {
        (
            "unzip".to_string(),
            vec!["-o".to_string(), "-q".to_string(), archive, "-d".to_string(), dest],
        )
    }
}

pub trait ArchiveDownloader: Send + Sync {
    /// Streams `url` into `dest`. Anything but HTTP 200 is `ERR_DOWNLOAD`.
    fn download(&self, url: &str, dest: &Path, trace_id: &str) -> Result<(), AppError>;
}

pub struct HttpDownloader {
    client: reqwest::blocking::Client,
}

impl HttpDownloader {
    pub fn new() -> Result<Self, String> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(Duration::from_secs(15))
            .timeout(Duration::from_secs(600))
            .user_agent(concat!("dashlink/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| format!("Failed to build HTTP client: {err}"))?;
        Ok(Self { client })
    }
}

impl ArchiveDownloader for HttpDownloader {
    fn download(&self, url: &str, dest: &Path, trace_id: &str) -> Result<(), AppError> {
        let mut response = self
            .client
            .get(url)
            .send()
            .map_err(|err| AppError::system(format!("Failed to request {url}: {err}"), trace_id))?;
        if response.status() != reqwest::StatusCode::OK {
            return Err(AppError::download_failed(
                format!("Download of {url} failed with HTTP {}", response.status().as_u16()),
                trace_id,
            ));
        }
        let mut file = File::create(dest).map_err(|err| {
            AppError::system(format!("Failed to create {}: {err}", dest.display()), trace_id)
        })?;
        let written = response
            .copy_to(&mut file)
            .map_err(|err| AppError::system(format!("Failed to stream {url}: {err}"), trace_id))?;
        file.flush()
            .map_err(|err| AppError::system(format!("Failed to flush archive: {err}"), trace_id))?;
        debug!(trace_id = %trace_id, bytes = written, "archive downloaded");
        Ok(())
    }
}

/// Finds or provisions adb and remembers the answer for its own lifetime.
pub struct BridgeResolver {
    runner: Arc<dyn CommandRunner>,
    downloader: Arc<dyn ArchiveDownloader>,
    command_path: String,
    base_url: String,
    broken_system_os: String,
    host_os: String,
    data_dir: PathBuf,
    resolved: Mutex<Option<BridgeProgram>>,
}

impl BridgeResolver {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        downloader: Arc<dyn ArchiveDownloader>,
        settings: &BridgeSettings,
    ) -> Self {
        Self {
            runner,
            downloader,
            command_path: settings.command_path.clone(),
            base_url: settings.platform_tools_base_url.trim_end_matches('/').to_string(),
            broken_system_os: settings.broken_system_bridge_os.clone(),
            host_os: std::env::consts::OS.to_string(),
            data_dir: resolve_data_dir(settings),
            resolved: Mutex::new(None),
        }
    }

    pub fn with_host_os(mut self, host_os: impl Into<String>) -> Self {
        self.host_os = host_os.into();
        self
    }

    pub fn provisioned_path(&self) -> PathBuf {
        self.data_dir
            .join(TOOLS_DIR_NAME)
            .join(executable_name(&self.host_os))
    }

    pub fn resolve(&self, trace_id: &str) -> Result<BridgeProgram, AppError> {
        {
            let guard = self
                .resolved
                .lock()
                .map_err(|_| AppError::system("Bridge cache locked", trace_id))?;
            if let Some(program) = guard.as_ref() {
                return Ok(program.clone());
            }
        }

        // Not held across provisioning; two racing first calls may both download.
        let program = self.resolve_uncached(trace_id)?;
        if let Ok(mut guard) = self.resolved.lock() {
            *guard = Some(program.clone());
        }
        Ok(program)
    }

    fn resolve_uncached(&self, trace_id: &str) -> Result<BridgeProgram, AppError> {
        let configured = normalize_command_path(&self.command_path);
        if !configured.is_empty() {
            validate_adb_program(&configured)
                .map_err(|message| AppError::validation(message, trace_id))?;
            info!(trace_id = %trace_id, program = %configured, "using configured adb");
            return Ok(if configured == BARE_ADB {
                BridgeProgram::OnPath
            } else {
                BridgeProgram::Configured(configured)
            });
        }

        // A working `adb version` is taken as "suitable" unless the host is the
        // one whose system adb is known to misbehave.
        let on_path = self
            .runner
            .run(BARE_ADB, &HostCommand::Version.args(), trace_id)
            .is_some();
        if on_path && self.host_os != self.broken_system_os {
            debug!(trace_id = %trace_id, "using adb from PATH");
            return Ok(BridgeProgram::OnPath);
        }
        if on_path {
            info!(trace_id = %trace_id, host_os = %self.host_os, "skipping system adb");
        }

        let target = self.provisioned_path();
        if target.is_file() {
            debug!(trace_id = %trace_id, path = %target.display(), "using provisioned adb");
            return Ok(BridgeProgram::Provisioned(target.to_string_lossy().to_string()));
        }

        self.provision(&target, trace_id)
    }

    fn provision(&self, target: &Path, trace_id: &str) -> Result<BridgeProgram, AppError> {
        let archive_name = platform_archive_name(&self.host_os).ok_or_else(|| {
            AppError::validation(
                format!("No platform-tools build for host OS {}", self.host_os),
                trace_id,
            )
        })?;
        fs::create_dir_all(&self.data_dir).map_err(|err| {
            AppError::system(
                format!("Failed to create {}: {err}", self.data_dir.display()),
                trace_id,
            )
        })?;

        let archive = self.data_dir.join(PARTIAL_ARCHIVE_NAME);
        if archive.exists() {
            fs::remove_file(&archive).map_err(|err| {
                AppError::system(format!("Failed to remove stale archive: {err}"), trace_id)
            })?;
        }

        let url = format!("{}/{archive_name}", self.base_url);
        info!(trace_id = %trace_id, url = %url, "downloading platform-tools");
        self.downloader.download(&url, &archive, trace_id)?;

        let (program, args) = extract_command(&self.host_os, &archive, &self.data_dir);
        let extracted = self.runner.run(&program, &args, trace_id);
        let _ = fs::remove_file(&archive);
        if extracted.is_none() {
            warn!(trace_id = %trace_id, tool = %program, "platform-tools extraction failed");
            return Err(AppError::extract_failed(
                format!("{program} could not extract {archive_name}"),
                trace_id,
            ));
        }
        if !target.is_file() {
            return Err(AppError::extract_failed(
                format!("{archive_name} did not contain {}", executable_name(&self.host_os)),
                trace_id,
            ));
        }

        info!(trace_id = %trace_id, path = %target.display(), "platform-tools provisioned");
        Ok(BridgeProgram::Provisioned(target.to_string_lossy().to_string()))
    }

    /// Reports availability instead of failing.
    pub fn check(&self, trace_id: &str) -> BridgeInfo {
        let program = match self.resolve(trace_id) {
            Ok(program) => program,
            Err(err) => {
                warn!(trace_id = %trace_id, error = %err.error, "adb unavailable");
                return BridgeInfo {
                    available: false,
                    version_output: String::new(),
                    command_path: normalize_command_path(&self.command_path),
                    error: Some(err.error),
                };
            }
        };
        match self
            .runner
            .run(program.command(), &HostCommand::Version.args(), trace_id)
        {
            Some(version_output) => BridgeInfo {
                available: true,
                version_output,
                command_path: program.quoted(),
                error: None,
            },
            None => BridgeInfo {
                available: false,
                version_output: String::new(),
                command_path: program.quoted(),
                error: Some("adb version failed".to_string()),
            },
        }
    }
}
