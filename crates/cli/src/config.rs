//! MCP server configuration loading from mcp.json (or mcp.toml).

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use mcp::{ServerConfig, TransportConfig};
use runtime::tools::SEPARATOR;
use serde::Deserialize;

/// File looked up in the working directory and in the user config dir.
pub const CONFIG_FILE: &str = "mcp.json";

/// Top-level configuration: `{"mcpServers": {name: entry}}`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpConfig {
    #[serde(default)]
    pub mcp_servers: BTreeMap<String, ServerEntry>,
}

/// One server record as written by the user.
///
/// An absent `type` means a stdio subprocess.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerEntry {
    #[serde(default, rename = "type")]
    pub transport: Option<String>,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl McpConfig {
    /// Load configuration from a file. `.toml` files are parsed as TOML,
    /// everything else as JSON.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::parse_toml(&content),
            _ => Self::parse_json(&content),
        }
    }

    pub fn parse_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn parse_toml(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Validate every entry into a connectable server configuration.
    pub fn servers(&self) -> Result<Vec<ServerConfig>, ConfigError> {
        self.mcp_servers
            .iter()
            .map(|(name, entry)| entry.to_server_config(name))
            .collect()
    }
}

impl ServerEntry {
    pub fn to_server_config(&self, name: &str) -> Result<ServerConfig, ConfigError> {
        // Tool names are advertised as `{name}__{tool}`.
        if name.contains(SEPARATOR) || name.ends_with('_') {
            return Err(ConfigError::InvalidName(name.to_string()));
        }

        let transport = match self.transport.as_deref() {
            None | Some("stdio") => {
                let command = self
                    .command
                    .as_deref()
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                    .ok_or_else(|| ConfigError::MissingCommand(name.to_string()))?;
                TransportConfig::Stdio {
                    command: command.to_string(),
                    args: self.args.clone(),
                    env: self.env.clone(),
                }
            }
            Some("sse") => {
                let url = self
                    .url
                    .as_deref()
                    .filter(|u| !u.trim().is_empty())
                    .ok_or_else(|| ConfigError::MissingUrl(name.to_string()))?;
                TransportConfig::Sse {
                    url: url.to_string(),
                    headers: self.headers.clone(),
                }
            }
            Some(other) => {
                return Err(ConfigError::UnknownTransport {
                    server: name.to_string(),
                    kind: other.to_string(),
                });
            }
        };

        Ok(ServerConfig {
            name: name.to_string(),
            transport,
        })
    }
}

/// Pick the configuration file: the explicit path, else `./mcp.json`, else
/// `<config dir>/deckhand/mcp.json`. Returns `None` when nothing exists.
pub fn resolve_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    let local = PathBuf::from(CONFIG_FILE);
    if local.is_file() {
        return Some(local);
    }

    dirs::config_dir()
        .map(|dir| dir.join("deckhand").join(CONFIG_FILE))
        .filter(|path| path.is_file())
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("server name {0:?} must not contain \"__\" or end with \"_\"")]
    InvalidName(String),

    #[error("server {0}: stdio transport requires a command")]
    MissingCommand(String),

    #[error("server {0}: sse transport requires a url")]
    MissingUrl(String),

    #[error("server {server}: unknown transport type {kind:?}")]
    UnknownTransport { server: String, kind: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(suffix: &str, content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn load_stdio_server() {
        let file = write_config(
            ".json",
            r#"{
              "mcpServers": {
                "filesystem": {
                  "command": "npx",
                  "args": ["-y", "@modelcontextprotocol/server-filesystem", "/tmp/docs"],
                  "env": {"TEST_ENV": "value"}
                }
              }
            }"#,
        );

        let servers = McpConfig::load(file.path()).unwrap().servers().unwrap();
        assert_eq!(servers.len(), 1);
        assert_eq!(servers[0].name, "filesystem");
        match &servers[0].transport {
            TransportConfig::Stdio { command, args, env } => {
                assert_eq!(command, "npx");
                assert_eq!(args.len(), 3);
                assert_eq!(env["TEST_ENV"], "value");
            }
            other => panic!("expected stdio transport, got {other:?}"),
        }
    }

    #[test]
    fn load_sse_server() {
        let file = write_config(
            ".json",
            r#"{
              "mcpServers": {
                "remote": {
                  "type": "sse",
                  "url": "http://localhost:8080/sse",
                  "headers": {"Authorization": "Bearer token"}
                }
              }
            }"#,
        );

        let servers = McpConfig::load(file.path()).unwrap().servers().unwrap();
        assert_eq!(
            servers[0].transport,
            TransportConfig::Sse {
                url: "http://localhost:8080/sse".into(),
                headers: HashMap::from([("Authorization".into(), "Bearer token".into())]),
            }
        );
    }

    #[test]
    fn load_toml_by_extension() {
        let file = write_config(
            ".toml",
            r#"
            [mcpServers.fs]
            command = "mcp-server-filesystem"
            args = ["./workspace"]

            [mcpServers.search]
            type = "sse"
            url = "http://127.0.0.1:3000/sse"
            "#,
        );

        let servers = McpConfig::load(file.path()).unwrap().servers().unwrap();
        let names: Vec<_> = servers.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["fs", "search"]);
        assert_eq!(servers[1].transport.kind(), "sse");
    }

    #[test]
    fn empty_document_has_no_servers() {
        let config = McpConfig::parse_json("{}").unwrap();
        assert!(config.servers().unwrap().is_empty());
    }

    #[test]
    fn invalid_entries_are_rejected() {
        let config = McpConfig::parse_json(r#"{"mcpServers": {"a": {"args": ["x"]}}}"#).unwrap();
        assert!(matches!(config.servers(), Err(ConfigError::MissingCommand(name)) if name == "a"));

        let config = McpConfig::parse_json(r#"{"mcpServers": {"b": {"type": "sse"}}}"#).unwrap();
        assert!(matches!(config.servers(), Err(ConfigError::MissingUrl(name)) if name == "b"));

        let config = McpConfig::parse_json(
            r#"{"mcpServers": {"c": {"type": "websocket", "url": "ws://x"}}}"#,
        )
        .unwrap();
        assert!(matches!(
            config.servers(),
            Err(ConfigError::UnknownTransport { kind, .. }) if kind == "websocket"
        ));
    }

    #[test]
    fn names_that_break_qualification_are_rejected() {
        for name in ["my__srv", "trailing_", "__"] {
            let json = format!(r#"{{"mcpServers": {{"{name}": {{"command": "x"}}}}}}"#);
            let config = McpConfig::parse_json(&json).unwrap();
            assert!(
                matches!(config.servers(), Err(ConfigError::InvalidName(n)) if n == name),
                "{name} should be rejected"
            );
        }

        let config = McpConfig::parse_json(r#"{"mcpServers": {"my_srv": {"command": "x"}}}"#)
            .unwrap();
        assert_eq!(config.servers().unwrap()[0].name, "my_srv");
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = McpConfig::load("/non/existent/path.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let file = write_config(".json", "{ not json");
        assert!(matches!(
            McpConfig::load(file.path()),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn explicit_path_wins() {
        let path = Path::new("/somewhere/else.json");
        assert_eq!(resolve_path(Some(path)), Some(path.to_path_buf()));
    }
}
