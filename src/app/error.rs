use serde::Serialize;
use std::fmt;

pub const ERR_VALIDATION: &str = "ERR_VALIDATION";
pub const ERR_DEPENDENCY: &str = "ERR_DEPENDENCY";
pub const ERR_SYSTEM: &str = "ERR_SYSTEM";
pub const ERR_NO_DEVICE: &str = "ERR_NO_DEVICE";
pub const ERR_DOWNLOAD: &str = "ERR_DOWNLOAD";
pub const ERR_EXTRACT: &str = "ERR_EXTRACT";
pub const ERR_COMMAND: &str = "ERR_COMMAND";

#[derive(Debug, Clone, Serialize)]
pub struct AppError {
    pub error: String,
    pub code: String,
    pub trace_id: String,
}

impl AppError {
    pub fn new(code: impl Into<String>, message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            code: code.into(),
            trace_id: trace_id.into(),
        }
    }

    pub fn validation(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new(ERR_VALIDATION, message, trace_id)
    }

    /// A collaborator (settings store, local server, bundle source) could not answer.
    pub fn dependency(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new(ERR_DEPENDENCY, message, trace_id)
    }

    pub fn system(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new(ERR_SYSTEM, message, trace_id)
    }

    /// Discovery found nothing where a device id was required.
    pub fn no_device(trace_id: impl Into<String>) -> Self {
        Self::new(ERR_NO_DEVICE, "No supported device found", trace_id)
    }

    pub fn download_failed(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new(ERR_DOWNLOAD, message, trace_id)
    }

    pub fn extract_failed(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new(ERR_EXTRACT, message, trace_id)
    }

    pub fn command_failed(message: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self::new(ERR_COMMAND, message, trace_id)
    }

    pub fn is_no_device(&self) -> bool {
        self.code == ERR_NO_DEVICE
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.error, self.code)
    }
}

impl std::error::Error for AppError {}
