use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use serde::Deserialize;

/// Wrapper for sensitive strings with redacted Debug/Display.
#[derive(Clone, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// Pluggable secret retrieval backend.
pub trait VaultProvider: Send + Sync {
    fn get_secret(
        &self,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Option<String>>> + Send + '_>>;
}

/// Reads secrets from the process environment, falling back to values from a
/// `.env` file. A variable set in the environment always wins.
#[derive(Default)]
pub struct EnvVaultProvider {
    dotenv: HashMap<String, String>,
}

impl fmt::Debug for EnvVaultProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvVaultProvider")
            .field("dotenv", &format_args!("[{} entries]", self.dotenv.len()))
            .finish()
    }
}

impl EnvVaultProvider {
    /// Also consult `path` (usually `.env` in the working directory). A missing
    /// file is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub fn with_dotenv(path: &Path) -> anyhow::Result<Self> {
        let dotenv = match std::fs::read_to_string(path) {
            Ok(content) => {
                let entries = parse_dotenv(&content);
                tracing::debug!(path = %path.display(), entries = entries.len(), "loaded dotenv file");
                entries
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                return Err(anyhow::Error::new(e).context(format!("failed to read {}", path.display())));
            }
        };
        Ok(Self { dotenv })
    }
}

impl VaultProvider for EnvVaultProvider {
    fn get_secret(
        &self,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Option<String>>> + Send + '_>> {
        let value = std::env::var(key)
            .ok()
            .or_else(|| self.dotenv.get(key).cloned());
        Box::pin(async move { Ok(value) })
    }
}

/// Parse `KEY=value` lines. Blank lines and `#` comments are skipped, an
/// optional `export ` prefix is accepted and matching surrounding quotes are
/// removed.
fn parse_dotenv(content: &str) -> HashMap<String, String> {
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .filter_map(|line| {
            let line = line.strip_prefix("export ").unwrap_or(line);
            let (key, value) = line.split_once('=')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            let value = value.trim();
            let value = ['"', '\'']
                .iter()
                .find_map(|q| value.strip_prefix(*q)?.strip_suffix(*q))
                .unwrap_or(value);
            Some((key.to_owned(), value.to_owned()))
        })
        .collect()
}

/// Test helper with HashMap-based secret storage.
#[cfg(test)]
#[derive(Default)]
pub struct MockVaultProvider {
    secrets: HashMap<String, String>,
}

#[cfg(test)]
impl MockVaultProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_secret(mut self, key: &str, value: &str) -> Self {
        self.secrets.insert(key.to_owned(), value.to_owned());
        self
    }
}

#[cfg(test)]
impl VaultProvider for MockVaultProvider {
    fn get_secret(
        &self,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Option<String>>> + Send + '_>> {
        let result = self.secrets.get(key).cloned();
        Box::pin(async move { Ok(result) })
    }
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    #[test]
    fn secret_expose_returns_inner() {
        let secret = Secret::new("my-api-key");
        assert_eq!(secret.expose(), "my-api-key");
    }

    #[test]
    fn secret_debug_and_display_are_redacted() {
        let secret = Secret::new("my-api-key");
        assert_eq!(format!("{secret:?}"), "[REDACTED]");
        assert_eq!(format!("{secret}"), "[REDACTED]");
    }

    #[test]
    fn parse_dotenv_lines() {
        let parsed = parse_dotenv(
            "# keys\nGOOGLE_API_KEY=abc\nexport GROQ_API_KEY=\"gsk 1\"\n\nBROKEN\nQUOTED='x'\n=nokey\n",
        );
        assert_eq!(parsed.get("GOOGLE_API_KEY").unwrap(), "abc");
        assert_eq!(parsed.get("GROQ_API_KEY").unwrap(), "gsk 1");
        assert_eq!(parsed.get("QUOTED").unwrap(), "x");
        assert_eq!(parsed.len(), 3);
    }

    #[tokio::test]
    #[serial]
    async fn env_wins_over_dotenv() {
        let key = "LAWONTIP_TEST_VAULT_PRECEDENCE";
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join(".env");
        std::fs::write(&file, format!("{key}=from-file\nLAWONTIP_TEST_VAULT_FILE_ONLY=file\n")).unwrap();

        unsafe { std::env::set_var(key, "from-env") };
        let vault = EnvVaultProvider::with_dotenv(&file).unwrap();
        let from_env = vault.get_secret(key).await.unwrap();
        let file_only = vault.get_secret("LAWONTIP_TEST_VAULT_FILE_ONLY").await.unwrap();
        unsafe { std::env::remove_var(key) };

        assert_eq!(from_env.as_deref(), Some("from-env"));
        assert_eq!(file_only.as_deref(), Some("file"));
    }

    #[tokio::test]
    async fn missing_dotenv_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let vault = EnvVaultProvider::with_dotenv(&dir.path().join(".env")).unwrap();
        let result = vault
            .get_secret("LAWONTIP_TEST_VAULT_DEFINITELY_UNSET")
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn mock_vault_returns_configured_secret() {
        let vault = MockVaultProvider::new().with_secret("GROQ_API_KEY", "gsk");
        assert_eq!(
            vault.get_secret("GROQ_API_KEY").await.unwrap().as_deref(),
            Some("gsk")
        );
    }
}
