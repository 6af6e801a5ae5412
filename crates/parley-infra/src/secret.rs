//! API-key lookup.
//!
//! The completion-service key is read from the environment variable named in
//! `provider.api_key_env`. It is wrapped in [`SecretString`] immediately and
//! never logged.

use secrecy::{ExposeSecret, SecretString};

/// Read an API key from the named environment variable.
///
/// Unset, blank, and non-Unicode values all count as missing.
pub fn api_key_from_env(var: &str) -> Option<SecretString> {
    match std::env::var(var) {
        Ok(value) => api_key_from_value(value),
        Err(std::env::VarError::NotPresent) => None,
        Err(std::env::VarError::NotUnicode(_)) => {
            tracing::warn!(var, "API key variable is not valid Unicode, ignoring");
            None
        }
    }
}

fn api_key_from_value(value: String) -> Option<SecretString> {
    let key = SecretString::from(value.trim().to_string());
    if key.expose_secret().is_empty() {
        None
    } else {
        Some(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_variable_is_none() {
        assert!(api_key_from_env("PARLEY_TEST_KEY_THAT_IS_NEVER_SET").is_none());
    }

    #[test]
    fn blank_value_is_none() {
        assert!(api_key_from_value("   ".to_string()).is_none());
    }

    #[test]
    fn value_is_trimmed() {
        let key = api_key_from_value(" sk-test \n".to_string()).unwrap();
        assert_eq!(key.expose_secret(), "sk-test");
    }
}
