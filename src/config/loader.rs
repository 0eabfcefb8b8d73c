// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::config::consts::{
    DEFAULT_DRAIN_GRACE_MS, DEFAULT_NODE_TIMEOUT_MS, DEFAULT_PROXY_WINDOW_BYTES,
    FALLBACK_MAX_CONCURRENCY,
};
use crate::errors::ConfigError;
use crate::flow::FlowDefinition;

/// A flow file: engine options plus any number of flows.
///
/// ```yaml
/// engine:
///   max_concurrency: 8
///   node_timeout_ms: 2000
/// flows:
///   - name: checkout
///     nodes: [...]
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineOptions,
    #[serde(default)]
    pub flows: Vec<FlowDefinition>,
}

/// Engine tuning. Every field is optional and falls back to a default.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineOptions {
    pub max_concurrency: Option<usize>,
    pub node_timeout_ms: Option<u64>,
    pub flow_deadline_ms: Option<u64>,
    pub drain_grace_ms: Option<u64>,
    pub proxy_window_bytes: Option<usize>,
}

impl EngineOptions {
    /// Upper bound on concurrently running nodes per engine; at least 1.
    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(FALLBACK_MAX_CONCURRENCY)
            })
            .max(1)
    }

    pub fn node_timeout(&self) -> Duration {
        Duration::from_millis(self.node_timeout_ms.unwrap_or(DEFAULT_NODE_TIMEOUT_MS))
    }

    pub fn flow_deadline(&self) -> Option<Duration> {
        self.flow_deadline_ms.map(Duration::from_millis)
    }

    pub fn drain_grace(&self) -> Duration {
        Duration::from_millis(self.drain_grace_ms.unwrap_or(DEFAULT_DRAIN_GRACE_MS))
    }

    pub fn proxy_window(&self) -> usize {
        self.proxy_window_bytes.unwrap_or(DEFAULT_PROXY_WINDOW_BYTES).max(1)
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = Some(max_concurrency);
        self
    }

    pub fn with_node_timeout(mut self, timeout: Duration) -> Self {
        self.node_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn with_flow_deadline(mut self, deadline: Duration) -> Self {
        self.flow_deadline_ms = Some(deadline.as_millis() as u64);
        self
    }

    pub fn with_drain_grace(mut self, grace: Duration) -> Self {
        self.drain_grace_ms = Some(grace.as_millis() as u64);
        self
    }

    pub fn with_proxy_window(mut self, bytes: usize) -> Self {
        self.proxy_window_bytes = Some(bytes);
        self
    }
}

/// Reads a flow file. `.toml` files are parsed as TOML, anything else as YAML.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let is_toml = path
        .extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| extension.eq_ignore_ascii_case("toml"));

    let cfg: Config = if is_toml {
        toml::from_str(&content).map_err(|source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        })?
    } else {
        serde_yaml::from_str(&content).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })?
    };

    let mut names = HashSet::new();
    for flow in &cfg.flows {
        if !names.insert(flow.name.as_str()) {
            return Err(ConfigError::DuplicateFlow {
                flow: flow.name.clone(),
            });
        }
    }

    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_temp(suffix: &str, content: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn parses_yaml_flow_file() {
        let file = write_temp(
            ".yaml",
            r#"
engine:
  max_concurrency: 2
  node_timeout_ms: 500
flows:
  - name: checkout
    nodes:
      - name: user
        resource: users
        request:
          body:
            id: "{{ input:id }}"
    output:
      body:
        name: "{{ user:name }}"
"#,
        );

        let cfg = load_config(file.path()).unwrap();
        assert_eq!(cfg.engine.max_concurrency(), 2);
        assert_eq!(cfg.engine.node_timeout(), Duration::from_millis(500));
        assert_eq!(cfg.flows.len(), 1);
        assert_eq!(cfg.flows[0].nodes[0].resource, "users");
    }

    #[test]
    fn parses_toml_flow_file() {
        let file = write_temp(
            ".toml",
            r#"
[engine]
drain_grace_ms = 50

[[flows]]
name = "ping"

[[flows.nodes]]
name = "pong"
resource = "echo"
depends_on = []

[flows.nodes.request.body]
message = "{{ input:message }}"
"#,
        );

        let cfg = load_config(file.path()).unwrap();
        assert_eq!(cfg.engine.drain_grace(), Duration::from_millis(50));
        assert_eq!(cfg.flows[0].nodes[0].name, "pong");
        assert_eq!(cfg.flows[0].nodes[0].request.body.len(), 1);
    }

    #[test]
    fn defaults_apply_when_engine_section_is_missing() {
        let options = EngineOptions::default();
        assert!(options.max_concurrency() >= 1);
        assert_eq!(options.node_timeout(), Duration::from_millis(DEFAULT_NODE_TIMEOUT_MS));
        assert_eq!(options.flow_deadline(), None);
        assert_eq!(options.drain_grace(), Duration::from_millis(DEFAULT_DRAIN_GRACE_MS));
        assert_eq!(options.proxy_window(), DEFAULT_PROXY_WINDOW_BYTES);
        assert_eq!(EngineOptions::default().with_max_concurrency(0).max_concurrency(), 1);
    }

    #[test]
    fn rejects_duplicate_flows_and_unknown_options() {
        let duplicate = write_temp(".yaml", "flows:\n  - name: a\n  - name: a\n");
        assert!(matches!(
            load_config(duplicate.path()),
            Err(ConfigError::DuplicateFlow { flow }) if flow == "a"
        ));

        let unknown = write_temp(".yml", "engine:\n  strategy: level\n");
        assert!(matches!(load_config(unknown.path()), Err(ConfigError::Yaml { .. })));

        assert!(matches!(
            load_config("/definitely/not/here.yaml"),
            Err(ConfigError::Io { .. })
        ));
    }
}
