//! Platform credentials read from `keys.json`.
//!
//! A missing file is a startup warning, never an error: every consumer
//! degrades to "disabled" when its key is absent.

use std::path::Path;

use {
    secrecy::Secret,
    serde::Deserialize,
    tracing::warn,
};

/// Credentials for the Telegram session and the image host.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct Credentials {
    /// Bot-style auth token used to authenticate the Telegram session.
    pub telegram_bot_token: Option<Secret<String>>,
    /// imgbb API key. Without it media re-hosting is disabled.
    pub imgbb_api_key: Option<Secret<String>>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |s: &Option<Secret<String>>| s.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("Credentials")
            .field("telegram_bot_token", &redact(&self.telegram_bot_token))
            .field("imgbb_api_key", &redact(&self.imgbb_api_key))
            .finish()
    }
}

/// Load credentials, falling back to empty ones when the file is missing or
/// unreadable.
pub fn load_credentials(path: &Path) -> Credentials {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "credentials file not found, continuing without keys");
            return Credentials::default();
        },
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read credentials file");
            return Credentials::default();
        },
    };
    let raw = crate::env_subst::substitute_env(&raw);
    match serde_json::from_str(&raw) {
        Ok(creds) => creds,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "malformed credentials file, ignoring it");
            Credentials::default()
        },
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, secrecy::ExposeSecret, tempfile::TempDir};

    #[test]
    fn missing_file_yields_empty_credentials() {
        let tmp = TempDir::new().unwrap();
        let creds = load_credentials(&tmp.path().join("keys.json"));
        assert!(creds.imgbb_api_key.is_none());
        assert!(creds.telegram_bot_token.is_none());
    }

    #[test]
    fn parses_keys_and_ignores_unused_ones() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("keys.json");
        std::fs::write(
            &path,
            r#"{
                "telegram_api_id": "12345",
                "telegram_api_hash": "hash",
                "telegram_bot_token": "1:abc",
                "imgbb_api_key": "img"
            }"#,
        )
        .unwrap();
        let creds = load_credentials(&path);
        assert_eq!(creds.telegram_bot_token.unwrap().expose_secret(), "1:abc");
        assert_eq!(creds.imgbb_api_key.unwrap().expose_secret(), "img");
    }

    #[test]
    fn malformed_file_falls_back_to_empty() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("keys.json");
        std::fs::write(&path, "{not json").unwrap();
        let creds = load_credentials(&path);
        assert!(creds.telegram_bot_token.is_none());
    }

    #[test]
    fn debug_never_prints_secrets() {
        let creds: Credentials = serde_json::from_str(r#"{"imgbb_api_key": "hunter2"}"#).unwrap();
        assert!(!format!("{creds:?}").contains("hunter2"));
    }
}
