pub mod app;

pub use app::collaborators::{Collaborators, SecretStore, ServerPort, WebAppBundle};
pub use app::device::service::DeviceManager;
pub use app::error::AppError;
