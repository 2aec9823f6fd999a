//! Process-wide wiring
//!
//! `Runtime::init` builds every service from an explicit configuration and
//! resolves the startup identity. `Runtime::shutdown` stops the store actor.

use std::path::PathBuf;
use std::sync::Arc;

use eyre::{Context, Result};
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::{Config, IdentityProviderKind};
use crate::generation::{GenerationService, RetryPolicy};
use crate::history::HistoryFeed;
use crate::llm::{self, GenerativeClient};
use crate::prompts::PromptLoader;
use crate::session::{IdentityProvider, IdentityToolkitProvider, LocalIdentityProvider, SessionFile, SessionManager};
use crate::state::StateManager;

pub const ENV_SERVICE_CONFIG: &str = "PETITIONER_SERVICE_CONFIG";
pub const ENV_APP_ID: &str = "PETITIONER_APP_ID";
pub const ENV_INITIAL_AUTH_TOKEN: &str = "PETITIONER_INITIAL_AUTH_TOKEN";
pub const DEFAULT_APP_ID: &str = "default-app-id";

/// Values injected by the host environment at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartupConfig {
    /// JSON overriding backend settings, see `ServiceConfig`
    pub service_config: Option<String>,
    pub app_id: String,
    /// Custom token redeemed when no session is persisted
    pub initial_auth_token: Option<String>,
}

impl Default for StartupConfig {
    fn default() -> Self {
        Self {
            service_config: None,
            app_id: DEFAULT_APP_ID.to_string(),
            initial_auth_token: None,
        }
    }
}

impl StartupConfig {
    pub fn from_env() -> Self {
        debug!("StartupConfig::from_env: called");
        let non_empty = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        Self {
            service_config: non_empty(ENV_SERVICE_CONFIG),
            app_id: non_empty(ENV_APP_ID).unwrap_or_else(|| DEFAULT_APP_ID.to_string()),
            initial_auth_token: non_empty(ENV_INITIAL_AUTH_TOKEN),
        }
    }
}

/// Backend overrides carried in `PETITIONER_SERVICE_CONFIG`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceConfig {
    pub store_dir: Option<PathBuf>,
    pub identity_provider: Option<IdentityProviderKind>,
    pub identity_api_key_env: Option<String>,
}

impl ServiceConfig {
    pub fn parse(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Invalid PETITIONER_SERVICE_CONFIG")
    }

    /// Overlay the present fields onto `config`
    pub fn apply(&self, config: &mut Config) {
        if let Some(dir) = &self.store_dir {
            config.storage.store_dir = dir.clone();
        }
        if let Some(provider) = self.identity_provider {
            config.identity.provider = provider;
        }
        if let Some(env) = &self.identity_api_key_env {
            config.identity.api_key_env = env.clone();
        }
    }
}

/// Every service of a running process
pub struct Runtime {
    pub config: Config,
    pub app_id: String,
    pub state: StateManager,
    pub session: SessionManager,
    pub generation: GenerationService,
    pub history: HistoryFeed,
    /// Present when the local identity provider is in use
    pub local_identity: Option<LocalIdentityProvider>,
}

impl Runtime {
    /// Build the runtime with the Gemini client named in `config`
    pub async fn init(config: Config, startup: StartupConfig) -> Result<Self> {
        debug!(app_id = %startup.app_id, "init: called");
        let config = Self::resolve_config(config, &startup)?;
        let client = llm::create_client(&config.llm).context("Failed to create generation client")?;
        Self::init_with_client(config, startup, client).await
    }

    /// Build the runtime around an already constructed client
    pub async fn init_with_client(
        config: Config,
        startup: StartupConfig,
        client: Arc<dyn GenerativeClient>,
    ) -> Result<Self> {
        let config = Self::resolve_config(config, &startup)?;
        let store_dir = config.storage.store_dir.clone();
        let app_id = startup.app_id.clone();

        let state = StateManager::spawn(&store_dir)
            .with_context(|| format!("Failed to open petition store in {}", store_dir.display()))?;

        let local_identity = match config.identity.provider {
            IdentityProviderKind::Local => Some(LocalIdentityProvider::new(state.clone())),
            IdentityProviderKind::IdentityToolkit => None,
        };
        let provider: Arc<dyn IdentityProvider> = match &local_identity {
            Some(local) => Arc::new(local.clone()),
            None => Arc::new(
                IdentityToolkitProvider::from_config(&config.identity)
                    .map_err(|e| eyre::eyre!("Failed to create identity provider: {}", e))?,
            ),
        };

        let session = SessionManager::new(provider, app_id.clone(), config.identity.min_password_len)
            .with_state(state.clone())
            .with_session_file(SessionFile::in_dir(&store_dir));

        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let generation = GenerationService::new(
            client,
            Arc::new(PromptLoader::new(&cwd)),
            RetryPolicy::from_config(&config.llm.retry),
        )
        .with_store(state.clone(), app_id.clone())
        .with_export_file_name(config.export.file_name.clone());

        let history = HistoryFeed::new(state.clone(), app_id.clone());

        session.establish(startup.initial_auth_token.as_deref()).await;
        info!(app_id = %app_id, store_dir = %store_dir.display(), "Runtime initialized");

        Ok(Self {
            config,
            app_id,
            state,
            session,
            generation,
            history,
            local_identity,
        })
    }

    /// Apply the service overlay and validate
    fn resolve_config(mut config: Config, startup: &StartupConfig) -> Result<Config> {
        if let Some(json) = &startup.service_config {
            ServiceConfig::parse(json)?.apply(&mut config);
        }
        config.validate()?;
        Ok(config)
    }

    pub async fn shutdown(self) -> Result<()> {
        debug!("shutdown: called");
        self.state.shutdown().await?;
        info!("Runtime shut down");
        Ok(())
    }
}
