//! Global configuration types for Parley.
//!
//! `ParleyConfig` represents the top-level `config.toml` that controls the
//! completion-service endpoint, model presets, sampling, and chat defaults.

use serde::{Deserialize, Serialize};

use crate::llm::SamplingParams;

/// Top-level configuration for Parley.
///
/// Loaded from `~/.parley/config.toml`. All fields have sensible defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParleyConfig {
    #[serde(default)]
    pub provider: ProviderSettings,

    #[serde(default)]
    pub models: ModelPresets,

    #[serde(default)]
    pub sampling: SamplingParams,

    #[serde(default)]
    pub chat: ChatSettings,
}

/// Connection settings for the OpenAI-compatible completion service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    /// Base URL of the API, without the `/chat/completions` suffix.
    pub base_url: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    /// Whole-request timeout for long generations.
    pub request_timeout_secs: u64,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.siliconflow.cn/v1".to_string(),
            api_key_env: "PARLEY_API_KEY".to_string(),
            request_timeout_secs: 300,
        }
    }
}

/// Named model presets. `chat` is the default for every conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelPresets {
    pub chat: String,
    pub reasoning: String,
    pub coding: String,
    pub fallback: String,
}

impl Default for ModelPresets {
    fn default() -> Self {
        Self {
            chat: "deepseek-chat".to_string(),
            reasoning: "deepseek-reasoner".to_string(),
            coding: "deepseek-coder".to_string(),
            fallback: "Qwen/Qwen2.5-7B-Instruct".to_string(),
        }
    }
}

impl ModelPresets {
    /// Resolve a preset name (`chat`, `reasoning`, `coding`, `fallback`) to a
    /// model id. Anything else is taken as a literal model id.
    pub fn resolve(&self, name: &str) -> String {
        match name {
            "chat" => self.chat.clone(),
            "reasoning" => self.reasoning.clone(),
            "coding" => self.coding.clone(),
            "fallback" => self.fallback.clone(),
            other => other.to_string(),
        }
    }

    /// All preset model ids, for offline model listing.
    pub fn all(&self) -> Vec<String> {
        vec![
            self.chat.clone(),
            self.reasoning.clone(),
            self.coding.clone(),
            self.fallback.clone(),
        ]
    }
}

/// Conversation defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatSettings {
    /// System-role entry prepended to every request.
    pub system_prompt: String,
    /// Title given to sessions created without one.
    pub default_title: String,
    /// Owner recorded on new sessions.
    pub user_id: i64,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            system_prompt: "You are the assistant of a document knowledge base. \
                Answer precisely, cite the relevant documents when you can, and say \
                so plainly when a question falls outside the collection."
                .to_string(),
            default_title: "New conversation".to_string(),
            user_id: 1,
        }
    }
}
