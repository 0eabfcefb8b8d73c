// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Flow compilation.
//!
//! # Pipeline
//!
//! 1. **Declaration**: node names are unique and not reserved, resources and
//!    rollback resources exist, proxies are well formed; templates and
//!    conditions are parsed.
//! 2. **Function resolution**: every call site becomes its own node.
//! 3. **Wiring**: every reference is resolved to its owning node (or the
//!    input) and type-checked; data references and `depends_on` become edges.
//!    Rollback and output references are checked but add no edges.
//! 4. **Cycle detection**, then topological order and branch partition.
//!
//! Diagnostics accumulate within a stage. Later stages only run when the
//! earlier ones were clean, since wiring needs a well-formed node set and
//! cycle detection needs a fully wired graph.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::compiled::{Branch, CompiledFlow, CompiledNode, CompiledOutput, CompiledRollback, NodeId, NodeKind};
use super::DependencyGraph;
use crate::conditions::{parse_condition, Expression};
use crate::config::Registry;
use crate::errors::CompileError;
use crate::flow::{FlowDefinition, ParameterMap, PropertyDefinition, PropertyType, Schema};
use crate::functions::FunctionResolver;
use crate::observability::messages::compile::{FlowCompiled, FlowRejected};
use crate::observability::messages::StructuredLog;
use crate::references::{
    header_resource, input_header, PropertyTree, Reference, Template, INPUT_RESOURCE,
    OUTPUT_RESOURCE, STACK_RESOURCE,
};

/// Compiles a flow definition against a registry.
///
/// Compiling the same definition twice yields identical topological orders
/// and branch partitions.
pub fn compile(flow: &FlowDefinition, registry: &Registry) -> Result<CompiledFlow, Vec<CompileError>> {
    let started = Instant::now();
    let result = Builder::new(flow, registry).build();

    match &result {
        Ok(compiled) => FlowCompiled {
            flow: &flow.name,
            node_count: compiled.nodes.len(),
            branch_count: compiled.branches.len(),
            duration: started.elapsed(),
        }
        .log(),
        Err(errors) => FlowRejected {
            flow: &flow.name,
            errors,
        }
        .log(),
    }

    result
}

struct Draft {
    name: String,
    kind: NodeKind,
    response: Option<Schema>,
    condition: Option<Expression>,
    rollback: Option<CompiledRollback>,
    depends_on: Vec<String>,
}

/// A template together with where it appears and the type it must have.
struct Consumer {
    location: String,
    template: Template,
    expected: Option<PropertyType>,
}

struct Builder<'a> {
    flow: &'a FlowDefinition,
    registry: &'a Registry,
    errors: Vec<CompileError>,
}

impl<'a> Builder<'a> {
    fn new(flow: &'a FlowDefinition, registry: &'a Registry) -> Self {
        Self {
            flow,
            registry,
            errors: Vec::new(),
        }
    }

    fn checkpoint(&mut self) -> Result<(), Vec<CompileError>> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(std::mem::take(&mut self.errors))
        }
    }

    fn build(mut self) -> Result<CompiledFlow, Vec<CompileError>> {
        let (mut drafts, mut output) = self.declare();
        self.checkpoint()?;

        self.resolve_functions(&mut drafts, &mut output);
        self.checkpoint()?;

        let graph = self.wire(&drafts, &output);
        self.checkpoint()?;

        if let Some(cycle) = graph.find_cycle() {
            let cycle = cycle.into_iter().map(|id| drafts[id].name.clone()).collect();
            return Err(vec![CompileError::CyclicDependency { cycle }]);
        }

        Ok(assemble(self.flow, drafts, graph, output))
    }

    // ---- declaration -------------------------------------------------------

    fn declare(&mut self) -> (Vec<Draft>, CompiledOutput) {
        let flow = self.flow;
        let mut seen = HashSet::new();
        let mut drafts = Vec::with_capacity(flow.nodes.len());

        for node in &flow.nodes {
            if is_reserved(&node.name) {
                self.errors.push(CompileError::ReservedName {
                    node: node.name.clone(),
                });
            }
            if !seen.insert(node.name.as_str()) {
                self.errors.push(CompileError::DuplicateNode {
                    node: node.name.clone(),
                });
                continue;
            }

            let Some(resource) = self.registry.resource(&node.resource).cloned() else {
                self.errors.push(CompileError::UnknownResource {
                    node: node.name.clone(),
                    resource: node.resource.clone(),
                });
                continue;
            };

            let prefix = format!("node '{}'", node.name);
            if node.proxy {
                if !resource.supports_forwarding() {
                    self.errors.push(CompileError::ProxyNotSupported {
                        node: node.name.clone(),
                        resource: node.resource.clone(),
                    });
                }
                if !node.request.body.is_empty() {
                    self.errors.push(CompileError::InvalidTemplate {
                        location: format!("{} request body", prefix),
                        template: format!("{} properties", node.request.body.len()),
                        message: "proxy nodes stream the inbound body and cannot declare body properties"
                            .to_string(),
                    });
                }
            }

            let condition = node.condition.as_deref().and_then(|expression| {
                parse_condition(expression)
                    .map_err(|source| {
                        self.errors.push(CompileError::Condition {
                            node: node.name.clone(),
                            source,
                        })
                    })
                    .ok()
            });

            let rollback = node.rollback.as_ref().and_then(|rollback| {
                let Some(resource) = self.registry.resource(&rollback.resource).cloned() else {
                    self.errors.push(CompileError::UnknownResource {
                        node: node.name.clone(),
                        resource: rollback.resource.clone(),
                    });
                    return None;
                };
                let prefix = format!("{} rollback", prefix);
                let (request, header) = match &rollback.request {
                    Some(parameters) => {
                        let (request, header) = self.parse_parameters(&prefix, parameters);
                        (Some(request), header)
                    }
                    None => (None, BTreeMap::new()),
                };
                Some(CompiledRollback {
                    resource,
                    request,
                    header,
                })
            });

            let (request, header) = self.parse_parameters(&prefix, &node.request);
            drafts.push(Draft {
                name: node.name.clone(),
                kind: NodeKind::Resource {
                    resource,
                    request,
                    header,
                    proxy: node.proxy,
                    timeout: node.timeout_ms.map(Duration::from_millis),
                },
                response: node.response.clone(),
                condition,
                rollback,
                depends_on: node.depends_on.clone(),
            });
        }

        let proxies = flow
            .nodes
            .iter()
            .filter(|node| node.proxy)
            .map(|node| node.name.clone())
            .collect::<Vec<_>>();
        if proxies.len() > 1 {
            self.errors.push(CompileError::MultipleProxies { nodes: proxies });
        }

        for node in &flow.nodes {
            for dependency in &node.depends_on {
                if !seen.contains(dependency.as_str()) {
                    self.errors.push(CompileError::UnknownDependency {
                        node: node.name.clone(),
                        dependency: dependency.clone(),
                    });
                }
            }
        }

        let output = match &flow.output {
            Some(parameters) => {
                let (body, header) = self.parse_parameters("output", parameters);
                CompiledOutput { body, header }
            }
            None => CompiledOutput::default(),
        };

        (drafts, output)
    }

    fn parse_parameters(
        &mut self,
        prefix: &str,
        parameters: &ParameterMap,
    ) -> (PropertyTree, BTreeMap<String, Template>) {
        (
            self.parse_body(prefix, &parameters.body),
            self.parse_header(prefix, &parameters.header),
        )
    }

    fn parse_body(&mut self, prefix: &str, body: &BTreeMap<String, PropertyDefinition>) -> PropertyTree {
        PropertyTree::parse(body).unwrap_or_else(|error| {
            self.errors.push(CompileError::InvalidTemplate {
                location: format!("{} property '{}'", prefix, error.property),
                template: error.template,
                message: error.source.to_string(),
            });
            PropertyTree::default()
        })
    }

    fn parse_header(&mut self, prefix: &str, header: &BTreeMap<String, String>) -> BTreeMap<String, Template> {
        let mut parsed = BTreeMap::new();
        for (key, raw) in header {
            match Template::parse(raw) {
                Ok(template) => {
                    parsed.insert(key.clone(), template);
                }
                Err(error) => self.errors.push(CompileError::InvalidTemplate {
                    location: format!("{} header '{}'", prefix, key),
                    template: raw.clone(),
                    message: error.to_string(),
                }),
            }
        }
        parsed
    }

    // ---- function resolution -----------------------------------------------

    fn resolve_functions(&mut self, drafts: &mut Vec<Draft>, output: &mut CompiledOutput) {
        let mut resolver = FunctionResolver::new(self.registry);

        for draft in drafts.iter_mut() {
            let prefix = format!("node '{}'", draft.name);
            if let NodeKind::Resource { request, header, .. } = &mut draft.kind {
                resolve_parameters(&mut resolver, &prefix, request, header);
            }
            if let Some(condition) = &mut draft.condition {
                let location = format!("{} condition", prefix);
                condition.visit_mut(&mut |template| resolver.resolve(&location, template));
            }
            if let Some(rollback) = &mut draft.rollback {
                let prefix = format!("{} rollback", prefix);
                let mut replayed = PropertyTree::default();
                let request = rollback.request.as_mut().unwrap_or(&mut replayed);
                resolve_parameters(&mut resolver, &prefix, request, &mut rollback.header);
            }
        }
        resolve_parameters(&mut resolver, "output", &mut output.body, &mut output.header);

        let (calls, errors) = resolver.finish();
        self.errors.extend(errors);
        drafts.extend(calls.into_iter().map(|call| Draft {
            name: call.resource.clone(),
            kind: NodeKind::Function(call),
            response: None,
            condition: None,
            rollback: None,
            depends_on: Vec::new(),
        }));
    }

    // ---- wiring --------------------------------------------------------------

    fn wire(&mut self, drafts: &[Draft], output: &CompiledOutput) -> DependencyGraph {
        let owners: HashMap<&str, NodeId> = drafts
            .iter()
            .enumerate()
            .map(|(id, draft)| (draft.name.as_str(), id))
            .collect();
        let mut graph = DependencyGraph::with_nodes(drafts.len());

        for (id, draft) in drafts.iter().enumerate() {
            for consumer in consumers(draft) {
                for owner in self.check(&draft.name, &consumer, drafts, &owners) {
                    graph.add_edge(owner, id);
                }
            }

            for dependency in &draft.depends_on {
                if let Some(&owner) = owners.get(dependency.as_str()) {
                    graph.add_edge(owner, id);
                }
            }

            if let Some(rollback) = &draft.rollback {
                let prefix = format!("node '{}' rollback", draft.name);
                let request = rollback.request.clone().unwrap_or_default();
                for consumer in parameter_consumers(&prefix, &request, &rollback.header) {
                    self.check(&draft.name, &consumer, drafts, &owners);
                }
            }
        }

        for consumer in parameter_consumers("output", &output.body, &output.header) {
            self.check(OUTPUT_RESOURCE, &consumer, drafts, &owners);
        }

        graph
    }

    /// Resolves and type-checks one consumer, returning its owning node.
    fn check(
        &mut self,
        node: &str,
        consumer: &Consumer,
        drafts: &[Draft],
        owners: &HashMap<&str, NodeId>,
    ) -> Option<NodeId> {
        let (owner, found, reference) = match &consumer.template {
            Template::Literal(value) => (None, PropertyType::of(value), value.to_string()),
            Template::Reference(reference) => match self.lookup(reference, drafts, owners) {
                Some((owner, found)) => (owner, found, reference.to_string()),
                None => {
                    self.errors.push(CompileError::UnresolvedReference {
                        node: node.to_string(),
                        reference: reference.to_string(),
                    });
                    return None;
                }
            },
            Template::Call { .. } => return None,
        };

        if let Some(expected) = consumer.expected {
            if !expected.accepts(found) {
                self.errors.push(CompileError::TypeMismatch {
                    location: consumer.location.clone(),
                    reference,
                    expected,
                    found,
                });
            }
        }

        owner
    }

    /// Owner and static type of a reference. `None` when it cannot resolve.
    fn lookup(
        &self,
        reference: &Reference,
        drafts: &[Draft],
        owners: &HashMap<&str, NodeId>,
    ) -> Option<(Option<NodeId>, PropertyType)> {
        if reference.is_input() {
            if reference.is_header() {
                return Some((None, header_type(reference)));
            }
            let kind = match &self.flow.input {
                Some(schema) => schema.lookup(&reference.path)?,
                None => PropertyType::Any,
            };
            return Some((None, kind));
        }

        let owner = *owners.get(reference.owner())?;
        let draft = &drafts[owner];
        let kind = match &draft.kind {
            NodeKind::Resource { .. } if reference.is_header() => header_type(reference),
            NodeKind::Function(_) if reference.is_header() => return None,
            NodeKind::Function(call) if reference.is_root() => call.signature.returns,
            NodeKind::Function(_) => PropertyType::Any,
            // Proxy bodies are streamed and never stored.
            NodeKind::Resource { proxy: true, .. } => return None,
            NodeKind::Resource { resource, .. } => {
                match draft.response.clone().or_else(|| resource.response_schema()) {
                    Some(schema) => schema.lookup(&reference.path)?,
                    None => PropertyType::Any,
                }
            }
        };
        Some((Some(owner), kind))
    }
}

fn resolve_parameters(
    resolver: &mut FunctionResolver<'_>,
    prefix: &str,
    body: &mut PropertyTree,
    header: &mut BTreeMap<String, Template>,
) {
    body.visit_mut(&mut |path, template| {
        resolver.resolve(&format!("{} property '{}'", prefix, path), template)
    });
    for (key, template) in header.iter_mut() {
        resolver.resolve(&format!("{} header '{}'", prefix, key), template);
    }
}

fn header_type(reference: &Reference) -> PropertyType {
    if reference.is_root() {
        PropertyType::Message
    } else {
        PropertyType::String
    }
}

fn is_reserved(name: &str) -> bool {
    name.is_empty()
        || [INPUT_RESOURCE, OUTPUT_RESOURCE, STACK_RESOURCE].contains(&name)
        || name.contains(|c: char| c == '.' || c == ':' || c.is_whitespace())
}

fn parameter_consumers(
    prefix: &str,
    body: &PropertyTree,
    header: &BTreeMap<String, Template>,
) -> Vec<Consumer> {
    let mut consumers = Vec::new();
    body.visit(&mut |path, template, expected, _| {
        consumers.push(Consumer {
            location: format!("{} property '{}'", prefix, path),
            template: template.clone(),
            expected,
        })
    });
    consumers.extend(header.iter().map(|(key, template)| Consumer {
        location: format!("{} header '{}'", prefix, key),
        template: template.clone(),
        expected: None,
    }));
    consumers
}

/// Every template a node reads before it runs.
fn consumers(draft: &Draft) -> Vec<Consumer> {
    let prefix = format!("node '{}'", draft.name);
    let mut consumers = match &draft.kind {
        NodeKind::Resource { request, header, .. } => parameter_consumers(&prefix, request, header),
        NodeKind::Function(call) => call
            .arguments
            .iter()
            .enumerate()
            .map(|(position, template)| Consumer {
                location: format!("{} argument {} of '{}'", call.location, position, call.function.name()),
                template: template.clone(),
                expected: call.signature.argument(position),
            })
            .collect(),
    };

    if let Some(condition) = &draft.condition {
        condition.visit(&mut |template| {
            consumers.push(Consumer {
                location: format!("{} condition", prefix),
                template: template.clone(),
                expected: None,
            })
        });
    }
    consumers
}

fn assemble(
    flow: &FlowDefinition,
    drafts: Vec<Draft>,
    graph: DependencyGraph,
    output: CompiledOutput,
) -> CompiledFlow {
    let order = graph.topological_order();
    let mut position = vec![usize::MAX; drafts.len()];
    for (index, &id) in order.iter().enumerate() {
        position[id] = index;
    }

    let mut resources = HashMap::new();
    for resource in [INPUT_RESOURCE.to_string(), input_header()] {
        let slot = resources.len();
        resources.insert(resource, slot);
    }
    for draft in &drafts {
        let slot = resources.len();
        resources.insert(draft.name.clone(), slot);
        if matches!(draft.kind, NodeKind::Resource { .. }) {
            let slot = resources.len();
            resources.insert(header_resource(&draft.name), slot);
        }
    }

    let branches = graph
        .partition(&order)
        .into_iter()
        .map(|(dependencies, members)| Branch {
            dependencies: dependencies.into_iter().map(|id| drafts[id].name.clone()).collect(),
            nodes: members.into_iter().map(|id| drafts[id].name.clone()).collect(),
        })
        .collect();

    let dependencies = graph.dependencies();
    let nodes: Vec<CompiledNode> = drafts
        .into_iter()
        .enumerate()
        .map(|(id, draft)| CompiledNode {
            id,
            name: draft.name,
            kind: draft.kind,
            condition: draft.condition,
            rollback: draft.rollback,
            dependencies: dependencies[id].iter().copied().collect(),
            dependents: graph.dependents(id).collect(),
        })
        .collect();
    let proxy = nodes.iter().position(CompiledNode::is_proxy);

    CompiledFlow {
        name: flow.name.clone(),
        nodes,
        order,
        position,
        branches,
        resources: Arc::new(resources),
        output,
        proxy,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::stub::{ForwardingResource, RecordingResource};
    use crate::flow::{NodeDefinition, RollbackDefinition};

    fn registry() -> Registry {
        let mut registry = Registry::with_builtins();
        for name in ["users", "orders", "payments", "refunds"] {
            registry.register_resource(Arc::new(RecordingResource::new(name)));
        }
        registry.register_resource(Arc::new(
            RecordingResource::new("profiles").with_schema(
                Schema::new()
                    .with("name", PropertyType::String)
                    .with("age", PropertyType::Int),
            ),
        ));
        registry.register_resource(Arc::new(ForwardingResource::new("upload")));
        registry
    }

    fn names(flow: &CompiledFlow, ids: &[NodeId]) -> Vec<String> {
        ids.iter().map(|&id| flow.nodes[id].name.clone()).collect()
    }

    #[test]
    fn infers_edges_from_references() {
        let flow = FlowDefinition::new("checkout")
            .node(NodeDefinition::new("order", "orders").request("user", "{{ user:id }}"))
            .node(NodeDefinition::new("user", "users").request("id", "{{ input:id }}"))
            .node(NodeDefinition::new("audit", "users"))
            .output("order", "{{ order:id }}");

        let compiled = compile(&flow, &registry()).unwrap();
        assert_eq!(compiled.topological_order(), vec!["user", "order", "audit"]);

        let order = compiled.node_by_name("order").unwrap();
        assert_eq!(names(&compiled, &order.dependencies), vec!["user"]);
        assert!(compiled.node_by_name("audit").unwrap().dependencies.is_empty());
    }

    #[test]
    fn depends_on_and_condition_references_create_edges() {
        let flow = FlowDefinition::new("f")
            .node(NodeDefinition::new("a", "users"))
            .node(NodeDefinition::new("b", "users"))
            .node(
                NodeDefinition::new("c", "users")
                    .depends_on("a")
                    .condition("{{ b:ok }} == true"),
            );

        let compiled = compile(&flow, &registry()).unwrap();
        let c = compiled.node_by_name("c").unwrap();
        assert_eq!(names(&compiled, &c.dependencies), vec!["a", "b"]);
    }

    #[test]
    fn function_calls_become_nodes() {
        let flow = FlowDefinition::new("f")
            .node(NodeDefinition::new("user", "users"))
            .node(
                NodeDefinition::new("order", "orders")
                    .request("a", "{{ upper(user:name) }}")
                    .request("b", "{{ upper(user:name) }}"),
            );

        let compiled = compile(&flow, &registry()).unwrap();
        let functions = compiled
            .nodes()
            .iter()
            .filter(|node| node.is_function())
            .map(|node| node.name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(functions, vec!["stack.upper.0", "stack.upper.1"]);

        let order = compiled.node_by_name("order").unwrap();
        assert_eq!(names(&compiled, &order.dependencies), vec!["stack.upper.0", "stack.upper.1"]);
        let call = compiled.node_by_name("stack.upper.0").unwrap();
        assert_eq!(names(&compiled, &call.dependencies), vec!["user"]);
        assert_eq!(compiled.topological_order()[0], "user");
    }

    #[test]
    fn detects_cycles_and_self_references() {
        let cyclic = FlowDefinition::new("f")
            .node(NodeDefinition::new("a", "users").request("x", "{{ b:x }}"))
            .node(NodeDefinition::new("b", "users").request("x", "{{ a:x }}"));
        let errors = compile(&cyclic, &registry()).unwrap_err();
        assert_eq!(
            errors,
            vec![CompileError::CyclicDependency {
                cycle: vec!["a".into(), "b".into(), "a".into()]
            }]
        );

        let selfish = FlowDefinition::new("f")
            .node(NodeDefinition::new("a", "users").request("x", "{{ a:x }}"));
        let errors = compile(&selfish, &registry()).unwrap_err();
        assert!(matches!(&errors[0], CompileError::CyclicDependency { cycle } if cycle == &["a", "a"]));
    }

    #[test]
    fn cycle_through_a_function_names_the_call_node() {
        let flow = FlowDefinition::new("f")
            .node(NodeDefinition::new("a", "users").request("x", "{{ upper(a:name) }}"));
        let errors = compile(&flow, &registry()).unwrap_err();
        let nodes = errors[0].nodes();
        assert!(nodes.contains(&"a"));
        assert!(nodes.contains(&"stack.upper.0"));
    }

    #[test]
    fn accumulates_declaration_errors() {
        let flow = FlowDefinition::new("f")
            .node(NodeDefinition::new("input", "users"))
            .node(NodeDefinition::new("a", "users"))
            .node(NodeDefinition::new("a", "users"))
            .node(NodeDefinition::new("b", "nowhere"))
            .node(NodeDefinition::new("c", "users").depends_on("ghost"))
            .node(NodeDefinition::new("d", "users").rollback(RollbackDefinition::new("nowhere")))
            .node(NodeDefinition::new("e", "users").condition("{{ a:x }} =="));

        let errors = compile(&flow, &registry()).unwrap_err();
        assert!(errors.contains(&CompileError::ReservedName { node: "input".into() }));
        assert!(errors.contains(&CompileError::DuplicateNode { node: "a".into() }));
        assert!(errors.contains(&CompileError::UnknownResource {
            node: "b".into(),
            resource: "nowhere".into()
        }));
        assert!(errors.contains(&CompileError::UnknownResource {
            node: "d".into(),
            resource: "nowhere".into()
        }));
        assert!(errors.contains(&CompileError::UnknownDependency {
            node: "c".into(),
            dependency: "ghost".into()
        }));
        assert!(errors.iter().any(|e| matches!(e, CompileError::Condition { node, .. } if node == "e")));
    }

    #[test]
    fn unresolved_references_are_rejected() {
        let flow = FlowDefinition::new("f")
            .input(Schema::new().with("id", PropertyType::String))
            .node(NodeDefinition::new("p", "profiles"))
            .node(
                NodeDefinition::new("a", "users")
                    .request("x", "{{ ghost:x }}")
                    .request("y", "{{ input:missing }}")
                    .request("z", "{{ p:missing }}"),
            )
            .output("n", "{{ nobody:n }}");

        let errors = compile(&flow, &registry()).unwrap_err();
        let unresolved = errors
            .iter()
            .filter_map(|e| match e {
                CompileError::UnresolvedReference { node, reference } => Some((node.as_str(), reference.as_str())),
                _ => None,
            })
            .collect::<Vec<_>>();
        assert_eq!(
            unresolved,
            vec![
                ("a", "ghost:x"),
                ("a", "input:missing"),
                ("a", "p:missing"),
                ("output", "nobody:n"),
            ]
        );
    }

    #[test]
    fn type_mismatches_are_rejected() {
        let flow = FlowDefinition::new("f")
            .node(NodeDefinition::new("p", "profiles"))
            .node(
                NodeDefinition::new("a", "users")
                    .request("age", PropertyDefinition::typed("{{ p:name }}", PropertyType::Int))
                    .request("name", "{{ upper(p:age) }}")
                    .request("fine", PropertyDefinition::typed("{{ p:age }}", PropertyType::Float)),
            );

        let errors = compile(&flow, &registry()).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors.contains(&CompileError::TypeMismatch {
            location: "node 'a' property 'age'".into(),
            reference: "p:name".into(),
            expected: PropertyType::Int,
            found: PropertyType::String,
        }));
        assert!(errors.contains(&CompileError::TypeMismatch {
            location: "node 'a' property 'name' argument 0 of 'upper'".into(),
            reference: "p:age".into(),
            expected: PropertyType::String,
            found: PropertyType::Int,
        }));
    }

    #[test]
    fn rollback_references_add_no_edges() {
        let flow = FlowDefinition::new("f")
            .node(NodeDefinition::new("notify", "users"))
            .node(
                NodeDefinition::new("charge", "payments")
                    .rollback(RollbackDefinition::new("refunds").request("charge", "{{ charge:id }}")),
            );

        let compiled = compile(&flow, &registry()).unwrap();
        assert!(compiled.node_by_name("charge").unwrap().dependencies.is_empty());
        assert!(compiled.node_by_name("charge").unwrap().rollback.is_some());
    }

    #[test]
    fn proxy_nodes_are_validated() {
        let flow = FlowDefinition::new("f")
            .node(NodeDefinition::new("a", "users").proxy())
            .node(NodeDefinition::new("b", "upload").proxy());

        let errors = compile(&flow, &registry()).unwrap_err();
        assert!(errors.contains(&CompileError::ProxyNotSupported {
            node: "a".into(),
            resource: "users".into()
        }));
        assert!(errors.contains(&CompileError::MultipleProxies {
            nodes: vec!["a".into(), "b".into()]
        }));

        let body_read = FlowDefinition::new("f")
            .node(NodeDefinition::new("up", "upload").proxy())
            .node(NodeDefinition::new("after", "users").request("x", "{{ up:x }}"))
            .node(NodeDefinition::new("meta", "users").request("x", "{{ up.header:Location }}"));
        let errors = compile(&body_read, &registry()).unwrap_err();
        assert_eq!(
            errors,
            vec![CompileError::UnresolvedReference {
                node: "after".into(),
                reference: "up:x".into()
            }]
        );
    }

    #[test]
    fn compilation_is_deterministic() {
        let flow = FlowDefinition::new("fan")
            .node(NodeDefinition::new("root", "users"))
            .node(NodeDefinition::new("left", "users").request("x", "{{ root:x }}"))
            .node(NodeDefinition::new("right", "users").request("x", "{{ root:x }}"))
            .node(NodeDefinition::new("solo", "users"))
            .node(
                NodeDefinition::new("join", "users")
                    .request("l", "{{ left:x }}")
                    .request("r", "{{ right:x }}"),
            );

        let first = compile(&flow, &registry()).unwrap();
        let second = compile(&flow, &registry()).unwrap();
        assert_eq!(first.branches(), second.branches());
        assert_eq!(first.topological_order(), second.topological_order());

        let members = first.branches().iter().map(|b| b.nodes.clone()).collect::<Vec<_>>();
        assert_eq!(
            members,
            vec![
                vec!["root".to_string(), "solo".to_string()],
                vec!["left".to_string(), "right".to_string()],
                vec!["join".to_string()],
            ]
        );
    }

    #[test]
    fn store_index_covers_inputs_nodes_and_headers() {
        let flow = FlowDefinition::new("f")
            .node(NodeDefinition::new("a", "users").request("x", "{{ len(input:items) }}"));
        let compiled = compile(&flow, &registry()).unwrap();
        let resources = compiled.resources();

        for resource in ["input", "input.header", "a", "a.header", "stack.len.0"] {
            assert!(resources.contains_key(resource), "{}", resource);
        }
        assert!(!resources.contains_key("stack.len.0.header"));
    }
}
