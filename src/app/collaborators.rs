//! Inputs owned by the host application.
//!
//! The device layer never stores settings, runs the local server or builds the
//! web bundle; it asks these traits at the moment a value is needed.

use std::path::PathBuf;
use std::sync::Arc;

pub trait SecretStore: Send + Sync {
    fn shared_secret(&self) -> Result<String, String>;
}

pub trait ServerPort: Send + Sync {
    fn listening_port(&self) -> Result<u16, String>;
}

pub trait WebAppBundle: Send + Sync {
    fn source_dir(&self) -> Result<PathBuf, String>;
}

#[derive(Clone)]
pub struct Collaborators {
    pub secrets: Arc<dyn SecretStore>,
    pub server: Arc<dyn ServerPort>,
    pub bundle: Arc<dyn WebAppBundle>,
}

/// Secret known up front, e.g. passed on the command line.
pub struct StaticSecret(Option<String>);

impl StaticSecret {
    pub fn new(secret: Option<String>) -> Self {
        Self(secret.filter(|value| !value.trim().is_empty()))
    }
}

impl SecretStore for StaticSecret {
    fn shared_secret(&self) -> Result<String, String> {
        self.0
            .clone()
            .ok_or_else(|| "Shared secret is not configured".to_string())
    }
}

pub struct FixedPort(Option<u16>);

impl FixedPort {
    pub fn new(port: Option<u16>) -> Self {
        Self(port.filter(|port| *port != 0))
    }
}

impl ServerPort for FixedPort {
    fn listening_port(&self) -> Result<u16, String> {
        self.0
            .ok_or_else(|| "Local server is not listening".to_string())
    }
}

pub struct BundleDir(Option<PathBuf>);

impl BundleDir {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self(path)
    }
}

impl WebAppBundle for BundleDir {
    fn source_dir(&self) -> Result<PathBuf, String> {
        self.0
            .clone()
            .ok_or_else(|| "Web app bundle path is not configured".to_string())
    }
}
