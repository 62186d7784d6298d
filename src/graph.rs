//! Resource graph construction and validation.
//!
//! The graph is a pure function of the configuration. Optional modules are
//! included or omitted here; downstream nodes that would wire into an
//! omitted module simply lose that edge — their own creation still proceeds.
//!
//! Validation happens before submission so a bad graph fails with a clear
//! error instead of an opaque backend diagnostic mid-run.

use crate::config::DeployConfig;
use crate::error::ProvisionError;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{BTreeMap, VecDeque};

/// Kinds of resources the orchestrator knows how to declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceKind {
    SqlServer,
    SqlDatabase,
    ManagedIdentity,
    LogWorkspace,
    AppService,
    OpenAiAccount,
    OpenAiDeployment,
    SearchService,
}

/// One declared resource: what it is, how to configure it, and what must
/// exist before it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceNode {
    /// Graph-unique identifier.
    pub id: String,
    pub kind: ResourceKind,
    /// Backend-specific configuration payload.
    pub properties: serde_json::Value,
    /// Ids of nodes that must be created first.
    pub depends_on: Vec<String>,
}

impl ResourceNode {
    pub fn new(id: impl Into<String>, kind: ResourceKind, properties: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            kind,
            properties,
            depends_on: Vec::new(),
        }
    }

    /// Add a creation dependency.
    pub fn depends_on(mut self, id: impl Into<String>) -> Self {
        self.depends_on.push(id.into());
        self
    }
}

/// The full set of resources for one deployment, keyed by node id.
///
/// `BTreeMap` keeps iteration deterministic, which keeps submission
/// payloads and test assertions stable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceGraph {
    pub nodes: BTreeMap<String, ResourceNode>,
}

impl ResourceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, node: ResourceNode) {
        self.nodes.insert(node.id.clone(), node);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Check referential integrity and acyclicity.
    ///
    /// Every `depends_on` id must name a node in the graph, and the
    /// dependency edges must form a DAG. Cycle detection is Kahn's
    /// algorithm: if a round of peeling leaves nodes with unsatisfied
    /// in-degrees, those nodes form at least one cycle.
    pub fn validate(&self) -> Result<(), ProvisionError> {
        for node in self.nodes.values() {
            for dep in &node.depends_on {
                if !self.nodes.contains_key(dep) {
                    return Err(ProvisionError::Configuration(format!(
                        "node '{}' depends on unknown node '{}'",
                        node.id, dep
                    )));
                }
            }
        }

        let mut in_degree: BTreeMap<&str, usize> = self
            .nodes
            .values()
            .map(|n| (n.id.as_str(), n.depends_on.len()))
            .collect();

        let mut queue: VecDeque<&str> = in_degree
            .iter()
            .filter(|(_, d)| **d == 0)
            .map(|(id, _)| *id)
            .collect();

        let mut visited = 0usize;
        while let Some(id) = queue.pop_front() {
            visited += 1;
            for node in self.nodes.values() {
                if node.depends_on.iter().any(|d| d == id) {
                    if let Some(d) = in_degree.get_mut(node.id.as_str()) {
                        *d -= 1;
                        if *d == 0 {
                            queue.push_back(node.id.as_str());
                        }
                    }
                }
            }
        }

        if visited < self.nodes.len() {
            let mut stuck: Vec<&str> = in_degree
                .iter()
                .filter(|(_, d)| **d > 0)
                .map(|(id, _)| *id)
                .collect();
            stuck.sort_unstable();
            return Err(ProvisionError::CyclicDependency(format!(
                "cycle involving nodes: {}",
                stuck.join(", ")
            )));
        }

        Ok(())
    }
}

/// Node ids used by the default graph.
pub mod nodes {
    pub const SQL_SERVER: &str = "sqlserver";
    pub const SQL_DATABASE: &str = "sqldatabase";
    pub const MANAGED_IDENTITY: &str = "identity";
    pub const LOG_WORKSPACE: &str = "logs";
    pub const APP_SERVICE: &str = "appservice";
    pub const OPENAI_ACCOUNT: &str = "openai";
    pub const OPENAI_DEPLOYMENT: &str = "openai-model";
    pub const SEARCH_SERVICE: &str = "search";
}

/// Build the resource graph for a configuration.
///
/// Pure: no I/O, no side effects. Feature flags control whether the GenAI
/// and search subgraphs exist at all; the app service's edges onto absent
/// modules are dropped rather than left dangling.
pub fn build_graph(config: &DeployConfig) -> Result<ResourceGraph, ProvisionError> {
    config.validate()?;

    let mut graph = ResourceGraph::new();

    graph.insert(ResourceNode::new(
        nodes::SQL_SERVER,
        ResourceKind::SqlServer,
        json!({
            "name": config.resource_name("sql"),
            "location": config.location,
            "adminObjectId": config.admin_object_id,
            "adminLogin": config.admin_login,
        }),
    ));

    graph.insert(
        ResourceNode::new(
            nodes::SQL_DATABASE,
            ResourceKind::SqlDatabase,
            json!({
                "name": config.resource_name("db"),
                "location": config.location,
            }),
        )
        .depends_on(nodes::SQL_SERVER),
    );

    graph.insert(ResourceNode::new(
        nodes::MANAGED_IDENTITY,
        ResourceKind::ManagedIdentity,
        json!({
            "name": config.resource_name("id"),
            "location": config.location,
        }),
    ));

    graph.insert(ResourceNode::new(
        nodes::LOG_WORKSPACE,
        ResourceKind::LogWorkspace,
        json!({
            "name": config.resource_name("logs"),
            "location": config.location,
        }),
    ));

    if config.deploy_gen_ai {
        graph.insert(ResourceNode::new(
            nodes::OPENAI_ACCOUNT,
            ResourceKind::OpenAiAccount,
            json!({
                "name": config.resource_name("oai"),
                "location": config.location,
            }),
        ));
        graph.insert(
            ResourceNode::new(
                nodes::OPENAI_DEPLOYMENT,
                ResourceKind::OpenAiDeployment,
                json!({
                    "name": config.resource_name("model"),
                }),
            )
            .depends_on(nodes::OPENAI_ACCOUNT),
        );
    }

    if config.deploy_search {
        graph.insert(ResourceNode::new(
            nodes::SEARCH_SERVICE,
            ResourceKind::SearchService,
            json!({
                "name": config.resource_name("search"),
                "location": config.location,
            }),
        ));
    }

    // The app service wires into whatever optional modules exist. Role
    // assignments onto excluded modules are simply not declared; the app
    // itself is still created.
    let mut app = ResourceNode::new(
        nodes::APP_SERVICE,
        ResourceKind::AppService,
        json!({
            "name": config.resource_name("app"),
            "location": config.location,
        }),
    )
    .depends_on(nodes::SQL_DATABASE)
    .depends_on(nodes::MANAGED_IDENTITY)
    .depends_on(nodes::LOG_WORKSPACE);

    if config.deploy_gen_ai {
        app = app.depends_on(nodes::OPENAI_DEPLOYMENT);
    }
    if config.deploy_search {
        app = app.depends_on(nodes::SEARCH_SERVICE);
    }
    graph.insert(app);

    graph.validate()?;
    Ok(graph)
}
