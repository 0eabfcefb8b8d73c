// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod loader;
mod registry;

pub mod consts;

pub use loader::{load_config, Config, EngineOptions};
pub use registry::{Capability, Registry};

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::engine::{FlowEngine, FlowManager};
use crate::errors::ConfigError;
use crate::graph::compile;

/// Loads a flow file and compiles every flow in it against `registry`.
///
/// All flows share one engine built from the file's engine options. The
/// first flow that fails to compile aborts loading with all of its
/// diagnostics.
pub fn load_and_compile<P: AsRef<Path>>(
    path: P,
    registry: &Registry,
) -> Result<HashMap<String, FlowManager>, ConfigError> {
    let cfg = load_config(path)?;
    let engine = Arc::new(FlowEngine::new(cfg.engine));

    cfg.flows
        .iter()
        .map(|flow| {
            let compiled = compile(flow, registry).map_err(|errors| ConfigError::Compile {
                flow: flow.name.clone(),
                errors,
            })?;
            Ok((
                flow.name.clone(),
                FlowManager::new(Arc::new(compiled), engine.clone()),
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::stub::RecordingResource;
    use crate::engine::FlowInput;
    use serde_json::json;
    use std::io::Write;

    const FLOWS: &str = r#"
engine:
  max_concurrency: 4
flows:
  - name: greet
    nodes:
      - name: user
        resource: users
        request:
          body:
            id: "{{ input:id }}"
    output:
      body:
        greeting: "{{ strconcat('hello ', user:name) }}"
"#;

    #[tokio::test]
    async fn loads_compiles_and_serves_flows() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(FLOWS.as_bytes()).unwrap();

        let mut registry = Registry::with_builtins();
        registry.register_resource(Arc::new(
            RecordingResource::new("users").responding(json!({ "name": "Ada" })),
        ));

        let managers = load_and_compile(file.path(), &registry).unwrap();
        let output = managers["greet"].call(FlowInput::new(json!({ "id": "42" }))).await.unwrap();
        assert_eq!(output.body, json!({ "greeting": "hello Ada" }));
    }

    #[test]
    fn reports_compile_diagnostics_per_flow() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(FLOWS.as_bytes()).unwrap();

        let err = load_and_compile(file.path(), &Registry::with_builtins()).unwrap_err();
        match err {
            ConfigError::Compile { flow, errors } => {
                assert_eq!(flow, "greet");
                assert!(!errors.is_empty());
            }
            other => panic!("unexpected error: {}", other),
        }
    }
}
