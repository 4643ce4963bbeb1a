//! Service catalog: dashboard listings, form lookups and the Create DC /
//! Create VPN workflows, all over the Infrahub API.

use anyhow::{anyhow, Result};
use serde_json::{json, Value};
use std::time::Duration;

use crate::infrahub::data::str_field;
use crate::infrahub::types::Branch;
use crate::infrahub::{attr, clean_data, list_nodes, CreatedNode, InfrahubApi, InfrahubError};
use crate::models::catalog::*;
use crate::rack::RackDevice;

// --- Branches ---

const BRANCHES_QUERY: &str = "query { Branch { id name is_default sync_with_git } }";

pub async fn list_branches(api: &dyn InfrahubApi) -> Result<Vec<Branch>> {
    let data = api.query(BRANCHES_QUERY, json!({})).await?;
    let branches = data.get("Branch").cloned().unwrap_or_else(|| json!([]));
    serde_json::from_value(branches).map_err(|e| anyhow!("Unexpected branch list: {}", e))
}

pub async fn branch_exists(api: &dyn InfrahubApi, name: &str) -> Result<bool> {
    Ok(list_branches(api).await?.iter().any(|b| b.name == name))
}

pub async fn create_branch(api: &dyn InfrahubApi, name: &str, sync_with_git: bool) -> Result<Branch> {
    let query = r#"
        mutation BranchCreate($name: String!, $sync_with_git: Boolean) {
            BranchCreate(data: { name: $name, sync_with_git: $sync_with_git }) {
                ok
                object { id name is_default sync_with_git }
            }
        }"#;
    let data = api
        .query(query, json!({ "name": name, "sync_with_git": sync_with_git }))
        .await?;
    serde_json::from_value(data["BranchCreate"]["object"].clone())
        .map_err(|e| anyhow!("Unexpected BranchCreate response: {}", e))
}

/// Open a CoreProposedChange from `source` into `destination`
pub async fn create_proposed_change(
    api: &dyn InfrahubApi,
    name: &str,
    description: &str,
    source: &str,
    destination: &str,
) -> Result<CreatedNode> {
    api.create(
        "CoreProposedChange",
        json!({
            "name": attr(name),
            "description": attr(description),
            "source_branch": attr(source),
            "destination_branch": attr(destination),
        }),
    )
    .await
}

// --- Dashboard listings ---

fn label(value: &Value) -> String {
    str_field(value, "display_label")
        .or_else(|| str_field(value, "name"))
        .unwrap_or_default()
        .to_string()
}

pub async fn list_datacenters(api: &dyn InfrahubApi, ui_url: &str, branch: &str) -> Result<Vec<DataCenterRow>> {
    let query = r#"
        query DataCenters {
            TopologyDataCenter {
                edges {
                    node {
                        id
                        name { value }
                        description { value }
                        strategy { value }
                        location { node { id display_label } }
                        design { node { id name { value } } }
                    }
                }
            }
        }"#;
    let nodes = list_nodes(api, query, json!({}), "TopologyDataCenter").await?;
    Ok(nodes
        .iter()
        .map(|dc| {
            let id = str_field(dc, "id").unwrap_or_default().to_string();
            DataCenterRow {
                link: object_url(ui_url, "TopologyDataCenter", &id, branch),
                id,
                name: str_field(dc, "name").unwrap_or_default().to_string(),
                location: label(&dc["location"]),
                description: str_field(dc, "description").unwrap_or_default().to_string(),
                strategy: str_field(dc, "strategy").unwrap_or_default().to_string(),
                design: label(&dc["design"]),
            }
        })
        .collect())
}

pub async fn list_colocation_centers(
    api: &dyn InfrahubApi,
    ui_url: &str,
    branch: &str,
) -> Result<Vec<ColocationRow>> {
    let query = r#"
        query ColocationCenters {
            TopologyColocationCenter {
                edges {
                    node {
                        id
                        name { value }
                        description { value }
                        location { node { id display_label } }
                        provider { node { id display_label } }
                    }
                }
            }
        }"#;
    let nodes = list_nodes(api, query, json!({}), "TopologyColocationCenter").await?;
    Ok(nodes
        .iter()
        .map(|colo| {
            let id = str_field(colo, "id").unwrap_or_default().to_string();
            ColocationRow {
                link: object_url(ui_url, "TopologyColocationCenter", &id, branch),
                id,
                name: str_field(colo, "name").unwrap_or_default().to_string(),
                location: label(&colo["location"]),
                description: str_field(colo, "description").unwrap_or_default().to_string(),
                provider: label(&colo["provider"]),
            }
        })
        .collect())
}

pub async fn list_proposed_changes(api: &dyn InfrahubApi, ui_url: &str) -> Result<Vec<ProposedChangeRow>> {
    let query = r#"
        query ProposedChanges {
            CoreProposedChange {
                edges {
                    node {
                        id
                        name { value }
                        state { value }
                        source_branch { value }
                        destination_branch { value }
                    }
                }
            }
        }"#;
    let nodes = list_nodes(api, query, json!({}), "CoreProposedChange").await?;
    Ok(nodes
        .iter()
        .map(|pc| {
            let id = str_field(pc, "id").unwrap_or_default().to_string();
            ProposedChangeRow {
                link: proposed_change_url(ui_url, &id),
                id,
                name: str_field(pc, "name").unwrap_or_default().to_string(),
                state: str_field(pc, "state").unwrap_or("open").to_string(),
                source_branch: str_field(pc, "source_branch").unwrap_or_default().to_string(),
                destination_branch: str_field(pc, "destination_branch").unwrap_or_default().to_string(),
            }
        })
        .collect())
}

// --- Form lookups ---

/// `{id, name}` pairs for every object of `kind`, using `field` as the name
pub async fn list_options(api: &dyn InfrahubApi, kind: &str, field: &str, filter: &str) -> Result<Vec<NamedOption>> {
    let filter = if filter.is_empty() {
        String::new()
    } else {
        format!("({})", filter)
    };
    let query = format!(
        "query {{ {}{} {{ edges {{ node {{ id {} {{ value }} }} }} }} }}",
        kind, filter, field
    );
    let nodes = list_nodes(api, &query, json!({}), kind).await?;
    Ok(nodes
        .iter()
        .filter_map(|node| {
            Some(NamedOption {
                id: str_field(node, "id")?.to_string(),
                name: str_field(node, field).unwrap_or_default().to_string(),
            })
        })
        .collect())
}

pub async fn list_locations(api: &dyn InfrahubApi) -> Result<Vec<NamedOption>> {
    list_options(api, "LocationMetro", "name", "").await
}

pub async fn list_providers(api: &dyn InfrahubApi) -> Result<Vec<NamedOption>> {
    list_options(api, "OrganizationProvider", "name", "").await
}

pub async fn list_designs(api: &dyn InfrahubApi) -> Result<Vec<NamedOption>> {
    list_options(api, "DesignTopology", "name", "").await
}

pub async fn list_active_prefixes(api: &dyn InfrahubApi) -> Result<Vec<NamedOption>> {
    list_options(api, "IpamPrefix", "prefix", "status__value: \"active\"").await
}

pub async fn list_deployments(api: &dyn InfrahubApi) -> Result<Vec<NamedOption>> {
    list_options(api, "TopologyDeployment", "name", "").await
}

pub async fn list_organizations(api: &dyn InfrahubApi) -> Result<Vec<NamedOption>> {
    list_options(api, "OrganizationGeneric", "name", "").await
}

/// Network segments already attached to a deployment
pub async fn list_segments(api: &dyn InfrahubApi, deployment_id: &str) -> Result<Vec<Value>> {
    let query = r#"
        query DeploymentSegments($deployment: ID!) {
            ServiceNetworkSegment(deployment__ids: [$deployment]) {
                edges {
                    node {
                        id
                        name { value }
                        customer_name { value }
                        vlan_id { value }
                        segment_type { value }
                        tenant_isolation { value }
                        external_routing { value }
                    }
                }
            }
        }"#;
    list_nodes(api, query, json!({ "deployment": deployment_id }), "ServiceNetworkSegment").await
}

// --- Racks ---

pub async fn list_rack_rows(api: &dyn InfrahubApi) -> Result<Vec<NamedOption>> {
    list_options(api, "LocationRow", "name", "").await
}

pub async fn list_racks(api: &dyn InfrahubApi, row_id: &str) -> Result<Vec<Value>> {
    let query = r#"
        query RowRacks($row: ID!) {
            LocationRack(parent__ids: [$row]) {
                edges { node { id name { value } height { value } } }
            }
        }"#;
    list_nodes(api, query, json!({ "row": row_id }), "LocationRack").await
}

/// The rack itself (name, height) and the devices located in it
pub async fn rack_with_devices(api: &dyn InfrahubApi, rack_id: &str) -> Result<(Value, Vec<RackDevice>)> {
    let query = r#"
        query RackDevices($rack: ID!) {
            LocationRack(ids: [$rack]) {
                edges { node { id name { value } height { value } } }
            }
            DcimDevice(location__ids: [$rack]) {
                edges {
                    node {
                        id
                        name { value }
                        position { value }
                        role { value }
                        device_type { node { name { value } height { value } } }
                    }
                }
            }
        }"#;
    let data = api.query(query, json!({ "rack": rack_id })).await?;
    let cleaned = clean_data(&data);
    let rack = cleaned["LocationRack"]
        .as_array()
        .and_then(|racks| racks.first())
        .cloned()
        .ok_or_else(|| InfrahubError::not_found("LocationRack", rack_id))?;
    let devices = cleaned["DcimDevice"]
        .as_array()
        .map(|nodes| nodes.iter().map(RackDevice::from_node).collect())
        .unwrap_or_default();
    Ok((rack, devices))
}

// --- Workflows ---

/// Branch, object on the branch, generator wait, proposed change.
///
/// `main` talks to the default branch and `on_branch` to the new branch.
pub async fn create_datacenter(
    main: &dyn InfrahubApi,
    on_branch: &dyn InfrahubApi,
    ui_url: &str,
    wait: Duration,
    req: &CreateDataCenterRequest,
) -> Result<CreateDataCenterResponse> {
    let branch = req.branch_name();
    tracing::info!("Creating branch {} for data center {}", branch, req.name);
    create_branch(main, &branch, false).await?;

    let datacenter = on_branch.upsert("TopologyDataCenter", req.to_payload()).await?;
    tracing::info!("- Created [TopologyDataCenter] {} ({})", req.name, datacenter.id);

    wait_for_generator(wait).await;

    let pc = create_proposed_change(
        main,
        &req.proposed_change_name(),
        &req.proposed_change_description(),
        &branch,
        "main",
    )
    .await?;
    tracing::info!("- Created [CoreProposedChange] {}", pc.id);

    Ok(CreateDataCenterResponse {
        branch,
        datacenter_id: datacenter.id,
        proposed_change_url: proposed_change_url(ui_url, &pc.id),
        proposed_change_id: pc.id,
    })
}

pub async fn create_segment(
    main: &dyn InfrahubApi,
    on_branch: &dyn InfrahubApi,
    ui_url: &str,
    wait: Duration,
    req: &CreateSegmentRequest,
) -> Result<CreateSegmentResponse> {
    let branch = req.branch_name();
    tracing::info!("Creating branch {} for segment {}", branch, req.customer_name);
    create_branch(main, &branch, false).await?;

    let segment = on_branch.create("ServiceNetworkSegment", req.to_payload()).await?;
    tracing::info!("- Created [ServiceNetworkSegment] {} ({})", req.customer_name, segment.id);

    wait_for_generator(wait).await;

    let pc = create_proposed_change(
        main,
        &req.proposed_change_name(),
        &req.proposed_change_description(),
        &branch,
        "main",
    )
    .await?;

    Ok(CreateSegmentResponse {
        branch,
        segment_id: segment.id,
        proposed_change_url: proposed_change_url(ui_url, &pc.id),
        proposed_change_id: pc.id,
    })
}

async fn wait_for_generator(wait: Duration) {
    if wait.is_zero() {
        return;
    }
    tracing::info!("Waiting {}s for generators to run", wait.as_secs());
    tokio::time::sleep(wait).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrahub::fake::FakeInfrahub;

    fn dc_request() -> CreateDataCenterRequest {
        serde_json::from_value(json!({
            "name": "DC3",
            "location": "loc1",
            "location_name": "Paris",
            "strategy": "ebgp-ibgp",
            "design": "des1",
            "provider": "prov1",
            "management_subnet": "p1",
            "customer_subnet": "p2",
            "technical_subnet": "p3",
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_create_datacenter_workflow() {
        let fake = FakeInfrahub::new();
        fake.respond(
            "BranchCreate",
            json!({"BranchCreate": {"ok": true, "object": {"id": "b1", "name": "add-dc3"}}}),
        );

        let resp = create_datacenter(&fake, &fake, "http://ui", Duration::ZERO, &dc_request())
            .await
            .unwrap();
        assert_eq!(resp.branch, "add-dc3");
        assert_eq!(resp.datacenter_id, "TopologyDataCenter-1");
        assert_eq!(resp.proposed_change_id, "CoreProposedChange-1");
        assert_eq!(resp.proposed_change_url, "http://ui/proposed-changes/CoreProposedChange-1");

        let pcs = fake.calls_of("create", "CoreProposedChange");
        assert_eq!(pcs[0].data["source_branch"], json!({"value": "add-dc3"}));
        assert_eq!(pcs[0].data["destination_branch"], json!({"value": "main"}));
        assert_eq!(pcs[0].data["name"], json!({"value": "Add Data Center: DC3"}));

        let queries = fake.queries.lock().unwrap();
        assert!(queries[0].contains("BranchCreate"));
    }

    #[tokio::test]
    async fn test_create_segment_workflow() {
        let fake = FakeInfrahub::new();
        fake.respond(
            "BranchCreate",
            json!({"BranchCreate": {"ok": true, "object": {"id": "b2", "name": "add-segment-dc1-acme"}}}),
        );
        let req: CreateSegmentRequest = serde_json::from_value(json!({
            "customer_name": "Acme",
            "vlan_id": 300,
            "deployment": "dep1",
            "deployment_name": "DC1",
            "owner": "org1",
        }))
        .unwrap();

        let resp = create_segment(&fake, &fake, "http://ui", Duration::ZERO, &req).await.unwrap();
        assert_eq!(resp.branch, "add-segment-dc1-acme");
        let segments = fake.calls_of("create", "ServiceNetworkSegment");
        assert_eq!(segments[0].data["vlan_id"], json!({"value": 300}));
    }

    #[tokio::test]
    async fn test_list_datacenters_rows() {
        let fake = FakeInfrahub::new();
        fake.respond(
            "DataCenters",
            json!({"TopologyDataCenter": {"edges": [{"node": {
                "id": "dc1",
                "name": {"value": "DC1"},
                "description": {"value": null},
                "strategy": {"value": "ospf-ibgp"},
                "location": {"node": {"id": "l1", "display_label": "Paris"}},
                "design": {"node": {"id": "d1", "name": {"value": "PHYSICAL-DC"}}},
            }}]}}),
        );
        let rows = list_datacenters(&fake, "http://ui", "main").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].location, "Paris");
        assert_eq!(rows[0].design, "PHYSICAL-DC");
        assert_eq!(rows[0].description, "");
        assert_eq!(rows[0].link, "http://ui/objects/TopologyDataCenter/dc1?branch=main");
    }

    #[tokio::test]
    async fn test_branch_listing() {
        let fake = FakeInfrahub::new();
        fake.respond(
            "Branch {",
            json!({"Branch": [
                {"id": "1", "name": "main", "is_default": true, "sync_with_git": true},
                {"id": "2", "name": "add-dc3", "is_default": false, "sync_with_git": false},
            ]}),
        );
        assert!(branch_exists(&fake, "add-dc3").await.unwrap());
        assert!(!branch_exists(&fake, "add-dc4").await.unwrap());
    }

    #[tokio::test]
    async fn test_prefix_options() {
        let fake = FakeInfrahub::new();
        fake.respond(
            "IpamPrefix(status__value",
            json!({"IpamPrefix": {"edges": [{"node": {"id": "p1", "prefix": {"value": "10.0.0.0/24"}}}]}}),
        );
        let options = list_active_prefixes(&fake).await.unwrap();
        assert_eq!(options, vec![NamedOption { id: "p1".to_string(), name: "10.0.0.0/24".to_string() }]);
    }

    #[tokio::test]
    async fn test_rack_with_devices() {
        let fake = FakeInfrahub::new();
        fake.respond(
            "RackDevices",
            json!({
                "LocationRack": {"edges": [{"node": {"id": "r1", "name": {"value": "DC1-Rack-1"}, "height": {"value": 42}}}]},
                "DcimDevice": {"edges": [{"node": {
                    "id": "d1", "name": {"value": "dc1-leaf-01"}, "position": {"value": 42}, "role": {"value": "leaf"},
                    "device_type": {"node": {"name": {"value": "7050"}, "height": {"value": 1}}},
                }}]},
            }),
        );
        let (rack, devices) = rack_with_devices(&fake, "r1").await.unwrap();
        assert_eq!(rack["name"], json!("DC1-Rack-1"));
        assert_eq!(devices[0].position, Some(42));
        assert_eq!(devices[0].height, Some(1));

        let missing = FakeInfrahub::new();
        missing.respond("RackDevices", json!({"LocationRack": {"edges": []}, "DcimDevice": {"edges": []}}));
        assert!(rack_with_devices(&missing, "r9").await.is_err());
    }
}
