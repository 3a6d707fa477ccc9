pub mod adb;
pub mod collaborators;
#[cfg(feature = "tauri")]
pub mod commands;
pub mod config;
pub mod device;
pub mod error;
pub mod logging;
pub mod models;
