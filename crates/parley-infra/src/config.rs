//! Configuration loader for Parley.
//!
//! Reads `config.toml` from the data directory and deserializes it into
//! [`ParleyConfig`]. Falls back to defaults when the file is missing or
//! malformed.

use std::path::Path;

use parley_types::config::ParleyConfig;

use crate::filesystem::config_path;

/// Load configuration from `{data_dir}/config.toml`.
///
/// - missing file: defaults, logged at debug level
/// - unreadable or unparsable file: defaults, logged as a warning
pub async fn load_config(data_dir: &Path) -> ParleyConfig {
    let path = config_path(data_dir);

    let content = match tokio::fs::read_to_string(&path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", path.display());
            return ParleyConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", path.display());
            return ParleyConfig::default();
        }
    };

    match toml::from_str::<ParleyConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!("Failed to parse {}: {err}, using defaults", path.display());
            ParleyConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).await;
        assert_eq!(config.models.chat, "deepseek-chat");
        assert_eq!(config.provider.api_key_env, "PARLEY_API_KEY");
    }

    #[tokio::test]
    async fn valid_toml_is_parsed() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(
            tmp.path().join("config.toml"),
            r#"
[provider]
base_url = "http://127.0.0.1:9000/v1"
request_timeout_secs = 30

[sampling]
max_tokens = 512

[chat]
system_prompt = "Be brief."
"#,
        )
        .await
        .unwrap();

        let config = load_config(tmp.path()).await;
        assert_eq!(config.provider.base_url, "http://127.0.0.1:9000/v1");
        assert_eq!(config.provider.request_timeout_secs, 30);
        assert_eq!(config.sampling.max_tokens, 512);
        assert_eq!(config.chat.system_prompt, "Be brief.");
        assert_eq!(config.chat.default_title, "New conversation");
    }

    #[tokio::test]
    async fn invalid_toml_returns_default() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join("config.toml"), "this is not { valid toml !!!")
            .await
            .unwrap();

        let config = load_config(tmp.path()).await;
        assert_eq!(config.sampling.max_tokens, 2000);
    }
}
