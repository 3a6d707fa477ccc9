use std::io::Read;
use std::process::{Command, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::app::error::AppError;

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
}

fn drain<R: Read + Send + 'static>(mut reader: R) -> JoinHandle<Vec<u8>> {
    std::thread::spawn(move || {
        let mut buffer = Vec::<u8>::new();
        let mut temp = [0u8; 4096];
        loop {
            match reader.read(&mut temp) {
                Ok(0) => break,
                Ok(count) => buffer.extend_from_slice(&temp[..count]),
                Err(_) => break,
            }
        }
        buffer
    })
}

pub fn run_command_with_timeout(
    program: &str,
    args: &[String],
    timeout: Duration,
    trace_id: &str,
) -> Result<CommandOutput, AppError> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|err| AppError::system(format!("Failed to spawn {program}: {err}"), trace_id))?;

    // Both pipes are drained while waiting so a chatty `adb push` cannot fill
    // the pipe buffer and stall until the timeout.
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| AppError::system("Failed to capture stdout", trace_id))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| AppError::system("Failed to capture stderr", trace_id))?;
    let stdout_handle = drain(stdout);
    let stderr_handle = drain(stderr);

    let start = Instant::now();
    let exit_code = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status.code(),
            Ok(None) => {
                if start.elapsed() > timeout {
                    let _ = child.kill();
                    let _ = child.wait();
                    let _ = stdout_handle.join();
                    let _ = stderr_handle.join();
                    return Err(AppError::system(
                        format!("{program} timed out after {}s", timeout.as_secs()),
                        trace_id,
                    ));
                }
                std::thread::sleep(Duration::from_millis(25));
            }
            Err(err) => {
                let _ = stdout_handle.join();
                let _ = stderr_handle.join();
                return Err(AppError::system(
                    format!("Failed to poll {program}: {err}"),
                    trace_id,
                ));
            }
        }
    };

    let stdout_bytes = stdout_handle.join().unwrap_or_default();
    let stderr_bytes = stderr_handle.join().unwrap_or_default();

    Ok(CommandOutput {
        stdout: String::from_utf8_lossy(&stdout_bytes).to_string(),
        stderr: String::from_utf8_lossy(&stderr_bytes).to_string(),
        exit_code,
    })
}

/// Executes a bridge invocation and reports its captured output.
///
/// `None` is the failure sentinel: the program could not be spawned, timed out,
/// or exited non-zero. Callers branch on it; nothing here retries.
pub trait CommandRunner: Send + Sync {
    fn run(&self, program: &str, args: &[String], trace_id: &str) -> Option<String>;
}

pub struct SystemRunner {
    timeout: Duration,
}

impl SystemRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[String], trace_id: &str) -> Option<String> {
        let output = match run_command_with_timeout(program, args, self.timeout, trace_id) {
            Ok(output) => output,
            Err(err) => {
                debug!(trace_id = %trace_id, program = %program, error = %err.error, "command did not run");
                return None;
            }
        };
        if output.exit_code != Some(0) {
            debug!(
                trace_id = %trace_id,
                program = %program,
                exit_code = ?output.exit_code,
                stderr = %output.stderr.trim(),
                "command exited abnormally"
            );
            return None;
        }
        Some(combined_output(&output))
    }
}

/// Stdout followed by stderr, trimmed.
pub fn combined_output(output: &CommandOutput) -> String {
    let stdout = output.stdout.trim();
    let stderr = output.stderr.trim();
    match (stdout.is_empty(), stderr.is_empty()) {
        (_, true) => stdout.to_string(),
        (true, false) => stderr.to_string(),
        (false, false) => format!("{stdout}\n{stderr}"),
    }
}
