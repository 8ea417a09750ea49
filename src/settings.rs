// Runtime configuration: command-line flags with environment fallbacks.

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Parser)]
#[command(name = "honulabs", version, about = "Interactive client for the Honulabs platform")]
pub struct Settings {
    /// Base URL of the Honulabs API
    #[arg(long, env = "HONULABS_API_URL", default_value = "http://localhost:8092")]
    pub api_url: String,

    /// MCP server advertised by `mcp_config`
    #[arg(long, env = "HONULABS_MCP_SERVER_URL", default_value = "http://localhost:8282/mcp/")]
    pub mcp_server_url: String,

    /// Where the API token is cached (defaults to ~/.honulabsrc)
    #[arg(long, env = "HONULABS_TOKEN_FILE")]
    pub token_file: Option<PathBuf>,

    /// Timeout of a single API request. Generation steps can take minutes.
    #[arg(long, env = "HONULABS_REQUEST_TIMEOUT_SECS", default_value_t = 120)]
    pub request_timeout_secs: u64,

    /// Pause between two job status checks
    #[arg(long, env = "HONULABS_POLL_INTERVAL_MS", default_value_t = 1000)]
    pub poll_interval_ms: u64,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, env = "HONULABS_LOG", default_value = "warn")]
    pub log_filter: String,
}

impl Settings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn token_path(&self) -> PathBuf {
        self.token_file
            .clone()
            .unwrap_or_else(crate::token::CredentialStore::default_path)
    }
}
