pub mod config;
pub mod credentials;
pub mod paths;

pub use config::{ApiConfig, Config, SyncConfig};
pub use credentials::CredentialStore;
pub use paths::{base_path_override, PathManager};
