//! Generates `--mcp-config`-style fragments for the LLM CLI variants named
//! in §6. Each function takes the server's bind host/port and an optional
//! worker id (`None` renders the coordinator's own `/mcp` URL).

use serde::Serialize;
use serde_json::{json, Value};

fn url(host: &str, port: u16, worker_id: Option<&str>) -> String {
    match worker_id {
        Some(id) => format!("http://{host}:{port}/worker/{id}"),
        None => format!("http://{host}:{port}/mcp"),
    }
}

/// Generic `{"mcpServers": {"<name>": {"type": "http", "url": "..."}}}`.
pub fn generic(name: &str, host: &str, port: u16, worker_id: Option<&str>) -> Value {
    json!({
        "mcpServers": {
            name: {
                "type": "http",
                "url": url(host, port, worker_id),
            }
        }
    })
}

/// Streamable-HTTP variant: `httpUrl` instead of `url`.
pub fn streamable_http(name: &str, host: &str, port: u16, worker_id: Option<&str>) -> Value {
    json!({
        "mcpServers": {
            name: {
                "type": "http",
                "httpUrl": url(host, port, worker_id),
            }
        }
    })
}

/// CLI-A's flat variant, without the `mcpServers` wrapper.
pub fn flat(name: &str, host: &str, port: u16, worker_id: Option<&str>) -> Value {
    json!({
        name: {
            "type": "http",
            "url": url(host, port, worker_id),
        }
    })
}

#[derive(Serialize)]
struct TomlMcpServer {
    url: String,
}

#[derive(Serialize)]
struct TomlMcpServers {
    mcp_servers: std::collections::BTreeMap<String, TomlMcpServer>,
}

/// CLI-B's TOML fragment: `mcp_servers.<name> = { url = "..." }`.
pub fn toml_fragment(name: &str, host: &str, port: u16, worker_id: Option<&str>) -> String {
    let mut mcp_servers = std::collections::BTreeMap::new();
    mcp_servers.insert(
        name.to_string(),
        TomlMcpServer {
            url: url(host, port, worker_id),
        },
    );
    toml::to_string(&TomlMcpServers { mcp_servers })
        .expect("mcp config fragment always serializes to TOML")
}

/// CLI-C's variant: `{"mcp": {"<name>": {"type": "remote", "url": "..."}}}`.
pub fn remote(name: &str, host: &str, port: u16, worker_id: Option<&str>) -> Value {
    json!({
        "mcp": {
            name: {
                "type": "remote",
                "url": url(host, port, worker_id),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinator_url_has_no_worker_segment() {
        let v = generic("swarmctl", "localhost", 8787, None);
        assert_eq!(v["mcpServers"]["swarmctl"]["url"], "http://localhost:8787/mcp");
    }

    #[test]
    fn worker_url_includes_worker_id() {
        let v = generic("swarmctl", "localhost", 8787, Some("worker-1"));
        assert_eq!(
            v["mcpServers"]["swarmctl"]["url"],
            "http://localhost:8787/worker/worker-1"
        );
    }

    #[test]
    fn streamable_http_uses_http_url_key() {
        let v = streamable_http("swarmctl", "localhost", 8787, None);
        assert!(v["mcpServers"]["swarmctl"].get("httpUrl").is_some());
        assert!(v["mcpServers"]["swarmctl"].get("url").is_none());
    }

    #[test]
    fn flat_variant_has_no_wrapper() {
        let v = flat("swarmctl", "localhost", 8787, None);
        assert!(v.get("mcpServers").is_none());
        assert_eq!(v["swarmctl"]["url"], "http://localhost:8787/mcp");
    }

    #[test]
    fn toml_fragment_contains_url() {
        let f = toml_fragment("swarmctl", "localhost", 8787, Some("worker-2"));
        assert!(f.contains("[mcp_servers.swarmctl]"));
        assert!(f.contains("http://localhost:8787/worker/worker-2"));
    }

    #[test]
    fn remote_variant_uses_mcp_key() {
        let v = remote("swarmctl", "localhost", 8787, None);
        assert_eq!(v["mcp"]["swarmctl"]["type"], "remote");
    }
}
