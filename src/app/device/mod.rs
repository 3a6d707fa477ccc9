pub mod brightness;
pub mod discovery;
pub mod service;
pub mod steps;
