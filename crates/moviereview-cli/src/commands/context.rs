use color_eyre::Result;
use review_sync_config::{Config, CredentialStore, PathManager};
use review_sync_core::{JsonReviewStore, ReviewRepository, ReviewsSynchronizer};
use review_sync_remote::{AuthSession, HttpReviewClient};
use std::sync::Arc;

/// Everything a command needs, wired from the on-disk config and credentials
pub struct AppContext {
    pub paths: PathManager,
    pub config: Config,
    pub credentials: CredentialStore,
    pub auth: Arc<AuthSession>,
    pub repository: Arc<ReviewRepository>,
}

impl AppContext {
    pub fn load() -> Result<Self> {
        let paths = PathManager::new()
            .map_err(|e| color_eyre::eyre::eyre!("Failed to resolve data directories: {}", e))?;
        paths
            .ensure_directories()
            .map_err(|e| color_eyre::eyre::eyre!("Failed to create {}: {}", paths.config_dir().display(), e))?;

        let config_file = paths.config_file();
        let config = Config::load_or_default(&config_file)
            .map_err(|e| color_eyre::eyre::eyre!("Failed to load config from {}: {}", config_file.display(), e))?;
        config
            .validate()
            .map_err(|e| color_eyre::eyre::eyre!("Invalid configuration in {}: {}", config_file.display(), e))?;

        let credentials_file = paths.credentials_file();
        let mut credentials = CredentialStore::new(credentials_file.clone());
        credentials
            .load()
            .map_err(|e| color_eyre::eyre::eyre!("Failed to load credentials from {}: {}", credentials_file.display(), e))?;

        let auth = Arc::new(AuthSession::from_token(credentials.get_access_token().cloned()));
        let store = Arc::new(JsonReviewStore::new(&paths.reviews_dir())?);
        let remote = Arc::new(HttpReviewClient::new(&config.api));
        let repository = Arc::new(ReviewRepository::new(store, remote, auth.clone()));

        tracing::debug!(
            reviews_dir = %paths.reviews_dir().display(),
            base_url = %config.api.base_url,
            "Application context ready"
        );

        Ok(Self {
            paths,
            config,
            credentials,
            auth,
            repository,
        })
    }

    pub fn synchronizer(&self) -> Arc<ReviewsSynchronizer> {
        Arc::new(ReviewsSynchronizer::new(
            self.repository.clone(),
            self.auth.clone(),
            self.config.sync.clone(),
        ))
    }
}
