use anyhow::Result;

use super::cabling::OobKind;
use super::creator::{CreationSummary, PoolSubnet, TopologyCreator, LOOPBACK_POOL};
use crate::infrahub::InfrahubApi;
use crate::models::{interface_role, Topology};

/// Build a colocation POP: no row, racks or overlay, one loopback per routed device
pub async fn generate_pop(api: &dyn InfrahubApi, branch: &str, topology: Topology) -> Result<CreationSummary> {
    let mut subnets = Vec::new();
    if let Some(subnet) = &topology.management_subnet {
        subnets.push(PoolSubnet::new("Management", &subnet.id));
    }
    if let Some(subnet) = &topology.technical_subnet {
        subnets.push(PoolSubnet::new("Loopback", &subnet.id));
    }

    let mut creator = TopologyCreator::new(api, branch, topology);
    creator.load_data().await?;
    creator.create_site().await?;
    creator.create_address_pools(&subnets).await?;
    creator.create_l2_pool().await?;
    creator.create_devices().await?;
    creator
        .create_loopback("loopback0", LOOPBACK_POOL, interface_role::LOOPBACK, "Loopback")
        .await?;
    creator.create_oob_connections(OobKind::Management).await?;
    creator.create_oob_connections(OobKind::Console).await?;

    Ok(creator.into_summary())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrahub::fake::FakeInfrahub;
    use serde_json::json;

    fn pop_topology() -> Topology {
        serde_json::from_value(json!({
            "id": "pop-1",
            "name": "POP1",
            "location": {"id": "loc-2"},
            "management_subnet": {"id": "mgmt-2"},
            "technical_subnet": {"id": "tech-2"},
            "design": {"elements": [
                {
                    "quantity": 2, "role": "edge",
                    "device_type": {"id": "dt-edge", "platform": {"id": "junos"}},
                    "template": {"template_name": "edge-tpl", "typename": "TemplateDcimDevice", "interfaces": [
                        {"name": "Console", "role": "console"},
                    ]}
                },
                {
                    "quantity": 1, "role": "edge_firewall",
                    "device_type": {"id": "dt-fw", "platform": {"id": "srx"}},
                    "template": {"template_name": "fw-tpl", "typename": "TemplateSecurityFirewall", "interfaces": [
                        {"name": "Console", "role": "console"},
                    ]}
                },
                {
                    "quantity": 1, "role": "console",
                    "device_type": {"id": "dt-cs", "platform": {"id": "opengear"}},
                    "template": {"template_name": "cs-tpl", "typename": "TemplateDcimDevice", "interfaces": [
                        {"name": "Port[1-8]", "role": "console"},
                    ]}
                },
            ]}
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_pop_flow() {
        let fake = FakeInfrahub::new();
        fake.respond(
            "CoreStandardGroup",
            json!({"CoreStandardGroup": {"edges": [
                {"node": {"id": "g-edges", "name": {"value": "edges"}}},
                {"node": {"id": "g-fw", "name": {"value": "juniper_firewall"}}},
                {"node": {"id": "g-cs", "name": {"value": "consoles"}}},
            ]}}),
        );
        let summary = generate_pop(&fake, "main", pop_topology()).await.unwrap();

        let pools = fake.calls_of("upsert", "CoreIPAddressPool");
        assert_eq!(pools.len(), 2);
        assert_eq!(pools[1].data["name"], json!({"value": "POP1-Loopback-pool"}));
        assert!(fake.calls_of("upsert", "LocationRack").is_empty());

        let firewalls = fake.calls_of("upsert", "SecurityFirewall");
        assert_eq!(firewalls.len(), 1);
        assert_eq!(firewalls[0].data["name"], json!({"value": "pop1-edge_firewall-01"}));
        assert_eq!(firewalls[0].data["member_of_groups"], json!([{"id": "g-fw"}]));

        // only the two edges are routed
        let loopbacks = fake.calls_of("upsert", "InterfaceVirtual");
        assert_eq!(loopbacks.len(), 2);
        assert_eq!(
            loopbacks[0].data["description"],
            json!({"value": "pop1-edge-01 loopback0 Loopback Interface"})
        );

        // console-01 is odd: pairs with edge-01 and the firewall
        let cables = fake.calls_of("upsert", "DcimCable");
        assert_eq!(cables.len(), 2);
        assert_eq!(summary.devices, 4);
        assert!(summary.failed.is_empty());
    }
}
