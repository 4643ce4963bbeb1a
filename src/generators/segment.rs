use anyhow::Result;
use serde::Serialize;
use serde_json::{json, Value};

use crate::infrahub::data::{list_field, str_field};
use crate::infrahub::{clean_data, list_nodes, rels, InfrahubApi};
use crate::models::device_role;

/// Offset between a segment's VLAN and its VXLAN network identifier
pub const VNI_OFFSET: i64 = 10000;

/// Outcome of one network segment run
#[derive(Debug, Default, Clone, Serialize)]
pub struct SegmentReport {
    pub segment: String,
    pub vlan_id: Option<i64>,
    pub vni: Option<i64>,
    pub rd: Option<String>,
    pub leaf_devices: Vec<String>,
    pub interfaces: usize,
    pub skipped: Option<String>,
}

impl SegmentReport {
    fn skipped(segment: &str, reason: String) -> Self {
        Self {
            segment: segment.to_string(),
            skipped: Some(reason),
            ..Default::default()
        }
    }
}

const CUSTOMER_INTERFACES_QUERY: &str = r#"
    query CustomerInterfaces($device_ids: [ID]) {
        InterfacePhysical(device__ids: $device_ids, role__value: "customer") {
            edges { node { id name { value } } }
        }
    }"#;

/// Tie a ServiceNetworkSegment to the customer ports of its deployment's leafs.
///
/// `data` is the raw (uncleaned) generator query result.
pub async fn generate_segment(api: &dyn InfrahubApi, data: &Value) -> Result<SegmentReport> {
    let cleaned = clean_data(data);
    let Some(segment) = list_field(&cleaned, "ServiceNetworkSegment").first() else {
        tracing::warn!("No segment data found in query result");
        return Ok(SegmentReport::skipped("", "no segment data".to_string()));
    };

    let name = str_field(segment, "name").unwrap_or("unknown");
    let customer = str_field(segment, "customer_name").unwrap_or("unknown");
    let segment_type = str_field(segment, "segment_type").unwrap_or("l2_only");
    let external_routing = segment["external_routing"].as_bool().unwrap_or(false);
    let tenant_isolation = str_field(segment, "tenant_isolation").unwrap_or("customer_dedicated");

    let Some(vlan_id) = segment["vlan_id"].as_i64().filter(|v| *v != 0) else {
        tracing::error!("Segment {} has no VLAN ID, skipping", name);
        return Ok(SegmentReport::skipped(name, "no VLAN ID".to_string()));
    };
    let vni = vlan_id + VNI_OFFSET;
    let rd = vlan_id.to_string();

    tracing::info!("Processing segment: {}", name);
    tracing::info!("  Customer: {}", customer);
    tracing::info!("  VLAN ID: {}", vlan_id);
    tracing::info!("  VNI: {}", vni);
    tracing::info!("  RD: {}", rd);
    tracing::info!("  Type: {}", segment_type);
    tracing::info!("  External Routing: {}", external_routing);
    tracing::info!("  Tenant Isolation: {}", tenant_isolation);

    let mut report = SegmentReport {
        segment: name.to_string(),
        vlan_id: Some(vlan_id),
        vni: Some(vni),
        rd: Some(rd.clone()),
        ..Default::default()
    };

    let deployment = &segment["deployment"];
    if !deployment.as_object().is_some_and(|m| !m.is_empty()) {
        tracing::warn!("Segment {} has no deployment, skipping", name);
        report.skipped = Some("no deployment".to_string());
        return Ok(report);
    }
    let deployment_name = str_field(deployment, "name").unwrap_or("unknown");
    tracing::info!("  Deployment: {}", deployment_name);
    if let Some(prefix) = str_field(&segment["prefix"], "prefix") {
        tracing::info!("  Prefix: {}", prefix);
    }

    let leafs: Vec<&Value> = list_field(deployment, "devices")
        .iter()
        .filter(|d| str_field(d, "role").is_some_and(device_role::is_leaf_like))
        .collect();
    if leafs.is_empty() {
        tracing::info!(
            "No leaf devices found in deployment {}, VxLAN configuration will be applied when devices are available",
            deployment_name
        );
        report.skipped = Some("no leaf devices".to_string());
        return Ok(report);
    }
    tracing::info!("Found {} leaf devices for VxLAN configuration", leafs.len());
    report.leaf_devices = leafs
        .iter()
        .map(|d| str_field(d, "name").unwrap_or("unknown").to_string())
        .collect();

    match str_field(segment, "id") {
        Some(segment_id) => {
            let existing: Vec<String> = list_field(segment, "interfaces")
                .iter()
                .filter_map(|i| str_field(i, "id"))
                .map(str::to_string)
                .collect();
            report.interfaces = associate_interfaces(api, segment_id, name, &leafs, existing).await?;
        }
        None => tracing::warn!("Segment ID not available, skipping interface association"),
    }

    for device in &report.leaf_devices {
        tracing::info!("  VxLAN config on {}: VLAN {} -> VNI {} (RD: {})", device, vlan_id, vni, rd);
        match segment_type {
            "l3_gateway" => tracing::info!("    L3 Gateway: SVI for VLAN {} on {}", vlan_id, device),
            "l3_vrf" => tracing::info!("    L3 VRF: VRF instance for segment on {}", device),
            _ => {}
        }
        if external_routing {
            tracing::info!("    External routing: Advertising VNI {} to external peers", vni);
        }
    }
    tracing::info!("VxLAN configuration complete for segment {}", name);

    Ok(report)
}

/// Add the leafs' customer ports to the segment; returns how many were added
async fn associate_interfaces(
    api: &dyn InfrahubApi,
    segment_id: &str,
    segment_name: &str,
    leafs: &[&Value],
    existing: Vec<String>,
) -> Result<usize> {
    let mut added: Vec<String> = Vec::new();
    for device in leafs {
        let device_name = str_field(device, "name").unwrap_or("unknown");
        let Some(device_id) = str_field(device, "id") else {
            tracing::warn!("Device {} has no ID, skipping", device_name);
            continue;
        };
        let interfaces = list_nodes(
            api,
            CUSTOMER_INTERFACES_QUERY,
            json!({ "device_ids": [device_id] }),
            "InterfacePhysical",
        )
        .await?;
        for interface in &interfaces {
            let Some(id) = str_field(interface, "id") else {
                continue;
            };
            tracing::info!(
                "  Adding interface {} on {} to segment",
                str_field(interface, "name").unwrap_or(id),
                device_name
            );
            added.push(id.to_string());
        }
    }

    if added.is_empty() {
        tracing::info!("No customer interfaces found for segment {}", segment_name);
        return Ok(0);
    }

    let mut all = existing;
    for id in &added {
        if !all.contains(id) {
            all.push(id.clone());
        }
    }
    api.update("ServiceNetworkSegment", segment_id, json!({ "interfaces": rels(&all) }))
        .await?;
    tracing::info!("Associated {} interfaces with segment {}", added.len(), segment_name);
    Ok(added.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrahub::fake::FakeInfrahub;

    fn segment(vlan: Value, devices: Value) -> Value {
        json!({"ServiceNetworkSegment": {"edges": [{"node": {
            "id": "seg-1",
            "name": {"value": "acme-120"},
            "customer_name": {"value": "Acme"},
            "vlan_id": {"value": vlan},
            "segment_type": {"value": "l3_gateway"},
            "external_routing": {"value": true},
            "interfaces": {"edges": [{"node": {"id": "old-1"}}]},
            "deployment": {"node": {
                "id": "dep-1",
                "name": {"value": "DC1"},
                "devices": {"edges": devices},
            }},
        }}]}})
    }

    #[tokio::test]
    async fn test_segment_associates_customer_ports() {
        let fake = FakeInfrahub::new();
        fake.respond(
            "CustomerInterfaces",
            json!({"InterfacePhysical": {"edges": [
                {"node": {"id": "if-1", "name": {"value": "Ethernet1"}}},
                {"node": {"id": "if-2", "name": {"value": "Ethernet2"}}},
            ]}}),
        );
        let data = segment(
            json!(120),
            json!([
                {"node": {"id": "d1", "name": {"value": "dc1-leaf-01"}, "role": {"value": "leaf"}}},
                {"node": {"id": "d2", "name": {"value": "dc1-spine-01"}, "role": {"value": "spine"}}},
            ]),
        );

        let report = generate_segment(&fake, &data).await.unwrap();
        assert_eq!(report.vni, Some(10120));
        assert_eq!(report.rd.as_deref(), Some("120"));
        assert_eq!(report.leaf_devices, vec!["dc1-leaf-01"]);
        assert_eq!(report.interfaces, 2);

        let updates = fake.calls_of("update", "ServiceNetworkSegment");
        assert_eq!(updates.len(), 1);
        assert_eq!(
            updates[0].data["interfaces"],
            json!([{"id": "old-1"}, {"id": "if-1"}, {"id": "if-2"}])
        );
    }

    #[tokio::test]
    async fn test_segment_without_vlan_stops() {
        let fake = FakeInfrahub::new();
        let report = generate_segment(&fake, &segment(Value::Null, json!([]))).await.unwrap();
        assert_eq!(report.skipped.as_deref(), Some("no VLAN ID"));
        assert!(fake.queries.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_segment_without_leafs_stops() {
        let fake = FakeInfrahub::new();
        let data = segment(
            json!(200),
            json!([{"node": {"id": "d2", "name": {"value": "dc1-spine-01"}, "role": {"value": "spine"}}}]),
        );
        let report = generate_segment(&fake, &data).await.unwrap();
        assert_eq!(report.skipped.as_deref(), Some("no leaf devices"));
        assert!(fake.calls_of("update", "ServiceNetworkSegment").is_empty());
    }

    #[tokio::test]
    async fn test_segment_with_empty_deployment_stops() {
        for deployment in [json!({"node": {}}), json!({"node": null})] {
            let fake = FakeInfrahub::new();
            let mut data = segment(json!(120), json!([]));
            data["ServiceNetworkSegment"]["edges"][0]["node"]["deployment"] = deployment;

            let report = generate_segment(&fake, &data).await.unwrap();
            assert_eq!(report.skipped.as_deref(), Some("no deployment"));
            assert!(fake.queries.lock().unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn test_empty_result() {
        let fake = FakeInfrahub::new();
        let report = generate_segment(&fake, &json!({"ServiceNetworkSegment": {"edges": []}}))
            .await
            .unwrap();
        assert!(report.skipped.is_some());
    }
}
