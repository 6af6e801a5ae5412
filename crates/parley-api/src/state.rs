//! Application state wiring the chat context to the concrete infrastructure.
//!
//! AppState is shared by the CLI commands and the REST API handlers.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use parley_core::chat::context::ChatContext;
use parley_core::chat::repository::BoxChatRepository;
use parley_core::llm::box_client::BoxChatClient;
use parley_infra::config::load_config;
use parley_infra::filesystem::{database_path, ensure_data_dir, resolve_data_dir};
use parley_infra::llm::openai_compat::OpenAiCompatClient;
use parley_infra::secret::api_key_from_env;
use parley_infra::sqlite::chat::SqliteChatRepository;
use parley_infra::sqlite::pool::DatabasePool;
use parley_types::config::ParleyConfig;

/// How the state should be initialized for this invocation.
#[derive(Debug, Clone, Default)]
pub struct InitOptions {
    /// Model id or preset name overriding the `chat` preset.
    pub model: Option<String>,
    /// Keep sessions in memory only.
    pub ephemeral: bool,
}

#[derive(Clone)]
pub struct AppState {
    pub context: Arc<ChatContext>,
    pub config: Arc<ParleyConfig>,
    pub data_dir: PathBuf,
    pub db_pool: Option<DatabasePool>,
    pub has_api_key: bool,
}

impl AppState {
    /// Load configuration, open the database, and restore stored sessions.
    pub async fn init(options: &InitOptions) -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        ensure_data_dir(&data_dir).await?;

        let config = load_config(&data_dir).await;

        let api_key = api_key_from_env(&config.provider.api_key_env);
        if api_key.is_none() {
            warn!(
                var = %config.provider.api_key_env,
                "no API key set; completion requests will fail until it is"
            );
        }
        let has_api_key = api_key.is_some();
        let client = OpenAiCompatClient::from_settings(&config.provider, api_key)?;

        let db_pool = if options.ephemeral {
            None
        } else {
            Some(DatabasePool::open(&database_path(&data_dir)).await?)
        };
        let repository = db_pool
            .clone()
            .map(|pool| BoxChatRepository::new(SqliteChatRepository::new(pool)));

        let context = ChatContext::new(
            BoxChatClient::new(client),
            repository,
            &config,
            options.model.as_deref(),
        );

        let restored = context.restore().await?;
        info!(restored, data_dir = %data_dir.display(), "application state ready");

        Ok(Self {
            context: Arc::new(context),
            config: Arc::new(config),
            data_dir,
            db_pool,
            has_api_key,
        })
    }

    /// Wrap an already-built context.
    #[cfg(test)]
    pub fn from_context(context: ChatContext, config: ParleyConfig, data_dir: PathBuf) -> Self {
        Self {
            context: Arc::new(context),
            config: Arc::new(config),
            data_dir,
            db_pool: None,
            has_api_key: true,
        }
    }

    /// Close the database pools, waiting for in-use connections.
    pub async fn close(&self) {
        if let Some(pool) = &self.db_pool {
            pool.writer.close().await;
            pool.reader.close().await;
        }
    }

    /// Model used for every turn.
    pub fn model(&self) -> &str {
        &self.context.orchestrator().config().model
    }
}
