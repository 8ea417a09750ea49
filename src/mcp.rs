// Connection snippets for MCP clients pointed at the Honulabs MCP server.

use serde_json::{json, Value};

/// `claude_desktop_config.json` entry: proxies the remote server through
/// `mcp-remote` with the bearer token as a header.
pub fn claude_desktop_config(server_url: &str, token: &str) -> Value {
    json!({
        "mcpServers": {
            "honulabs": {
                "command": "npx",
                "args": [
                    "-y",
                    "mcp-remote",
                    server_url,
                    "--header",
                    format!("Authorization: Bearer {token}"),
                ]
            }
        }
    })
}

pub fn cursor_config(server_url: &str, token: &str) -> Value {
    json!({
        "mcpServers": {
            "honulabs": {
                "url": server_url,
                "headers": {
                    "Authorization": format!("Bearer {token}")
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claude_desktop_passes_token_as_header_argument() {
        let config = claude_desktop_config("https://mcp.example.test/mcp/", "tok");
        let args = &config["mcpServers"]["honulabs"]["args"];
        assert_eq!(config["mcpServers"]["honulabs"]["command"], "npx");
        assert_eq!(args[2], "https://mcp.example.test/mcp/");
        assert_eq!(args[4], "Authorization: Bearer tok");
    }

    #[test]
    fn cursor_uses_url_and_headers() {
        let config = cursor_config("https://mcp.example.test/mcp/", "tok");
        let server = &config["mcpServers"]["honulabs"];
        assert_eq!(server["url"], "https://mcp.example.test/mcp/");
        assert_eq!(server["headers"]["Authorization"], "Bearer tok");
    }
}
