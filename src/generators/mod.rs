pub mod cabling;
pub mod creator;
pub mod dc;
pub mod placement;
pub mod pop;
pub mod routing;
pub mod segment;

use anyhow::{anyhow, Result};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::Instrument;

use crate::infrahub::{clean_data, InfrahubApi};
use crate::models::Topology;

pub use creator::{CreationSummary, DeviceRecord, TopologyCreator};
pub use segment::SegmentReport;

/// Design fields shared by both topology kinds
const TOPOLOGY_FIELDS: &str = r#"
    id
    name { value }
    description { value }
    strategy { value }
    location { node { id name { value } shortname { value } } }
    provider { node { id name { value } } }
    management_subnet { node { id prefix { value } } }
    technical_subnet { node { id prefix { value } } }
    customer_subnet { node { id prefix { value } } }
    design {
        node {
            name { value }
            elements {
                edges {
                    node {
                        quantity { value }
                        role { value }
                        device_type {
                            node {
                                id
                                name { value }
                                height { value }
                                manufacturer { node { name { value } } }
                                platform { node { id } }
                            }
                        }
                        template {
                            node {
                                __typename
                                id
                                template_name { value }
                                interfaces {
                                    edges {
                                        node {
                                            name { value }
                                            role { value }
                                            ... on TemplateDcimConsoleInterface {
                                                port { value }
                                                speed { value }
                                            }
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
    }
"#;

const SEGMENT_QUERY: &str = r#"
    query NetworkSegment($name: String!) {
        ServiceNetworkSegment(name__value: $name) {
            edges {
                node {
                    id
                    name { value }
                    customer_name { value }
                    vlan_id { value }
                    segment_type { value }
                    external_routing { value }
                    tenant_isolation { value }
                    prefix { node { id prefix { value } } }
                    interfaces { edges { node { id } } }
                    deployment {
                        node {
                            id
                            name { value }
                            devices { edges { node { id name { value } role { value } } } }
                        }
                    }
                }
            }
        }
    }"#;

/// Which generator to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorKind {
    Dc,
    Pop,
    Segment,
}

impl GeneratorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GeneratorKind::Dc => "generate_dc",
            GeneratorKind::Pop => "generate_pop",
            GeneratorKind::Segment => "generate_segment",
        }
    }

    /// Infrahub kind the generator is triggered by
    pub fn target_kind(&self) -> &'static str {
        match self {
            GeneratorKind::Dc => "TopologyDataCenter",
            GeneratorKind::Pop => "TopologyColocationCenter",
            GeneratorKind::Segment => "ServiceNetworkSegment",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum GeneratorOutcome {
    Topology(CreationSummary),
    Segment(SegmentReport),
}

pub fn topology_query(kind: &str) -> String {
    format!(
        "query Topology($name: String!) {{ {}(name__value: $name) {{ edges {{ node {{ {} }} }} }} }}",
        kind, TOPOLOGY_FIELDS
    )
}

/// Fetch and decode one topology design by name
pub async fn load_topology(api: &dyn InfrahubApi, kind: &str, name: &str) -> Result<Topology> {
    let data = api.query(&topology_query(kind), json!({ "name": name })).await?;
    topology_from_result(&data, kind)
}

/// First `kind` node of a raw query result
pub fn topology_from_result(data: &Value, kind: &str) -> Result<Topology> {
    let cleaned = clean_data(data);
    let node = cleaned
        .get(kind)
        .and_then(Value::as_array)
        .and_then(|nodes| nodes.first())
        .ok_or_else(|| anyhow!("No {} found in query result", kind))?;
    serde_json::from_value(node.clone()).map_err(|e| anyhow!("Invalid {} design: {}", kind, e))
}

/// Run a generator against the object called `name` on the client's branch
pub async fn run(api: &dyn InfrahubApi, branch: &str, kind: GeneratorKind, name: &str) -> Result<GeneratorOutcome> {
    let span = tracing::info_span!(
        "generator",
        generator = kind.as_str(),
        branch = %branch,
        run_id = %uuid::Uuid::new_v4(),
    );

    async move {
        tracing::info!("Running {} for {} {}", kind.as_str(), kind.target_kind(), name);
        let outcome = match kind {
            GeneratorKind::Dc => {
                let topology = load_topology(api, kind.target_kind(), name).await?;
                GeneratorOutcome::Topology(dc::generate_dc(api, branch, topology).await?)
            }
            GeneratorKind::Pop => {
                let topology = load_topology(api, kind.target_kind(), name).await?;
                GeneratorOutcome::Topology(pop::generate_pop(api, branch, topology).await?)
            }
            GeneratorKind::Segment => {
                let data = api.query(SEGMENT_QUERY, json!({ "name": name })).await?;
                GeneratorOutcome::Segment(segment::generate_segment(api, &data).await?)
            }
        };
        if let GeneratorOutcome::Topology(summary) = &outcome {
            tracing::info!(
                "{} done: {} objects, {} devices, {} cables, {} BGP sessions, {} failures",
                kind.as_str(),
                summary.objects,
                summary.devices,
                summary.cables,
                summary.sessions,
                summary.failed.len()
            );
        }
        Ok::<_, anyhow::Error>(outcome)
    }
    .instrument(span)
    .await
}
