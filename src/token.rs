// Credential persistence: a single cached API token in a small JSON file
// (`{"token": "..."}`) in the user's home directory.

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::debug;

const TOKEN_FILE_NAME: &str = ".honulabsrc";

/// Reads and writes the cached API token.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        CredentialStore { path: path.into() }
    }

    /// `~/.honulabsrc`, or `./.honulabsrc` when no home directory is known.
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(TOKEN_FILE_NAME)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The cached token, if any. A missing or unreadable file means no token.
    pub fn load(&self) -> Option<String> {
        let fields = self.read_fields();
        fields
            .get("token")
            .and_then(Value::as_str)
            .filter(|token| !token.is_empty())
            .map(str::to_string)
    }

    /// Persist `token`, keeping any other keys already in the file.
    pub fn save(&self, token: &str) -> Result<()> {
        let mut fields = self.read_fields();
        fields.insert("token".into(), Value::String(token.to_string()));
        let data = serde_json::to_string(&fields).context("Serialising token file")?;
        std::fs::write(&self.path, data)
            .with_context(|| format!("Failed to write token file {}", self.path.display()))?;
        debug!(path = %self.path.display(), "saved API token");
        Ok(())
    }

    fn read_fields(&self) -> Map<String, Value> {
        let Ok(data) = std::fs::read_to_string(&self.path) else {
            return Map::new();
        };
        match serde_json::from_str::<Value>(&data) {
            Ok(Value::Object(fields)) => fields,
            _ => {
                debug!(path = %self.path.display(), "ignoring unparsable token file");
                Map::new()
            }
        }
    }
}
