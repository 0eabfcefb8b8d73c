// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::env;
use std::process::ExitCode;
use std::time::Instant;

use the_switchyard::config::{load_and_compile, Registry};
use the_switchyard::engine::FlowInput;
use the_switchyard::observability::init_tracing;

const USAGE: &str = "usage: the-switchyard <flows.yaml|flows.toml> [flow] [input-json]";

/// Checks a flow file and prints each flow's execution plan. With a flow name
/// and an input document, also runs that flow. Only built-in functions are
/// registered, so flows calling external resources are reported as invalid.
#[tokio::main]
async fn main() -> ExitCode {
    init_tracing("warn");

    let args: Vec<String> = env::args().skip(1).collect();
    let Some(path) = args.first() else {
        eprintln!("{USAGE}");
        return ExitCode::from(2);
    };

    let registry = Registry::with_builtins();
    let managers = match load_and_compile(path, &registry) {
        Ok(managers) => managers,
        Err(error) => {
            eprintln!("❌ {error}");
            return ExitCode::FAILURE;
        }
    };

    let mut names: Vec<&String> = managers.keys().collect();
    names.sort();
    for name in names {
        let flow = managers[name].flow();
        println!("✅ flow '{}' ({} nodes)", flow.name(), flow.nodes().len());
        println!("   order: {}", flow.topological_order().join(" -> "));
        for (index, branch) in flow.branches().iter().enumerate() {
            let after = if branch.dependencies.is_empty() {
                "input".to_string()
            } else {
                branch.dependencies.join(", ")
            };
            println!("   branch {index}: [{}] after {after}", branch.nodes.join(", "));
        }
    }

    let Some(flow) = args.get(1) else {
        return ExitCode::SUCCESS;
    };
    let Some(manager) = managers.get(flow) else {
        eprintln!("❌ no flow named '{flow}'");
        return ExitCode::FAILURE;
    };

    let body = match args.get(2).map(|raw| serde_json::from_str::<serde_json::Value>(raw)).transpose() {
        Ok(body) => body.unwrap_or_default(),
        Err(error) => {
            eprintln!("❌ input is not valid JSON: {error}");
            return ExitCode::from(2);
        }
    };

    let started = Instant::now();
    match manager.call(FlowInput::new(body)).await {
        Ok(output) => {
            println!("⏱️  {:?}", started.elapsed());
            match serde_json::to_string_pretty(&output.body) {
                Ok(rendered) => println!("{rendered}"),
                Err(error) => eprintln!("❌ could not render output: {error}"),
            }
            ExitCode::SUCCESS
        }
        Err(failure) => {
            eprintln!("❌ {failure}");
            for error in &failure.secondary {
                eprintln!("   also: {error}");
            }
            ExitCode::FAILURE
        }
    }
}
