use anyhow::Result;
use serde_json::{json, Value};

use super::creator::{DeviceRecord, TopologyCreator};
use crate::infrahub::{attr, find_id_by_name, from_pool, rel, rels, InfrahubError};
use crate::models::{device_role, interface_role, Scenario};

const ASN_POOL: &str = "PRIVATE-ASN4";
const UNDERLAY_LOOPBACK: &str = "loopback0";

// --- Plans ---

#[derive(Debug, Clone, PartialEq)]
pub struct PeerGroupPlan {
    pub name: String,
    pub description: String,
    pub peer_group_type: &'static str,
    pub ebgp_multihop: u32,
    pub send_community_extended: bool,
    pub route_reflector_client: Option<bool>,
    pub password: &'static str,
    pub store_key: String,
}

impl PeerGroupPlan {
    pub fn payload(&self) -> Value {
        let mut payload = json!({
            "name": attr(&self.name),
            "description": attr(&self.description),
            "peer_group_type": attr(self.peer_group_type),
            "bfd_enabled": attr(true),
            "ebgp_multihop": attr(self.ebgp_multihop),
            "send_community": attr(true),
            "send_community_extended": attr(self.send_community_extended),
            "password": attr(self.password),
        });
        if let Some(rr_client) = self.route_reflector_client {
            payload["route_reflector_client"] = attr(rr_client);
        }
        payload
    }
}

/// Underlay groups for eBGP fabrics, overlay groups always
pub fn plan_peer_groups(site: &str, scenario: Scenario) -> Vec<PeerGroupPlan> {
    let mut plans = Vec::new();
    if scenario == Scenario::Ebgp {
        for (group, group_type, perspective) in [
            ("SPINE-TO-LEAF-UNDERLAY", "SPINE_TO_LEAF", "spine"),
            ("LEAF-TO-SPINE-UNDERLAY", "LEAF_TO_SPINE", "leaf"),
        ] {
            plans.push(PeerGroupPlan {
                name: format!("{}-{}", site, group),
                description: format!("{} UNDERLAY from {} perspective", site, perspective),
                peer_group_type: group_type,
                ebgp_multihop: 0,
                send_community_extended: false,
                route_reflector_client: None,
                password: "UNDERLAY-secret",
                store_key: format!("{}-PG-{}", group, site),
            });
        }
    }
    for (group, group_type, label, rr_client) in [
        ("RR-CLIENTS-OVERLAY", "EVPN_RR_CLIENT", "clients", false),
        ("RR-SERVERS-OVERLAY", "EVPN_RR_SERVER", "servers", true),
    ] {
        plans.push(PeerGroupPlan {
            name: format!("{}-{}", site, group),
            description: format!("{} OVERLAY route reflector {}", site, label),
            peer_group_type: group_type,
            ebgp_multihop: 3,
            send_community_extended: true,
            route_reflector_client: Some(rr_client),
            password: "OVERLAY-secret",
            store_key: format!("{}-PG-{}", group, site),
        });
    }
    plans
}

#[derive(Debug, Clone, PartialEq)]
pub struct AsnPlan {
    pub description: String,
    pub store_key: String,
}

/// Spine ASN plus one ASN per leaf for eBGP; the shared overlay ASN always
pub fn plan_autonomous_systems(site: &str, scenario: Scenario, devices: &[DeviceRecord]) -> Vec<AsnPlan> {
    match scenario {
        Scenario::Ebgp => {
            let mut plans = vec![AsnPlan {
                description: format!("{} SPINES ASN for eBGP UNDERLAY", site),
                store_key: format!("SPINE-ASN-{}", site),
            }];
            plans.extend(leafs(devices).map(|leaf| AsnPlan {
                description: format!("{} {} ASN for eBGP UNDERLAY", site, leaf.name),
                store_key: format!("LEAF-ASN-{}", leaf.name),
            }));
            plans.push(AsnPlan {
                description: format!("{} OVERLAY ASN for iBGP EVPN over eBGP UNDERLAY", site),
                store_key: format!("OVERLAY-ASN-{}", site),
            });
            plans
        }
        Scenario::Ospf => vec![AsnPlan {
            description: format!("{} OVERLAY ASN for iBGP EVPN over OSPF UNDERLAY", site),
            store_key: format!("OVERLAY-ASN-{}", site),
        }],
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionType {
    External,
    Internal,
}

impl SessionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionType::External => "EXTERNAL",
            SessionType::Internal => "INTERNAL",
        }
    }
}

/// One directed BGP session, expressed with store keys
#[derive(Debug, Clone, PartialEq)]
pub struct SessionPlan {
    pub name: String,
    pub device: String,
    pub peer: String,
    pub local_as_key: String,
    pub remote_as_key: String,
    pub peer_group_key: String,
    /// Loopback carrying local_ip and remote_ip
    pub loopback: String,
    pub session_type: SessionType,
}

fn leafs(devices: &[DeviceRecord]) -> impl Iterator<Item = &DeviceRecord> {
    devices.iter().filter(|d| device_role::is_leaf_like(&d.role))
}

fn spines(devices: &[DeviceRecord]) -> impl Iterator<Item = &DeviceRecord> {
    devices.iter().filter(|d| d.role == device_role::SPINE)
}

/// Spine to leaf sessions first, then the reverse direction
pub fn plan_ebgp_underlay(site: &str, devices: &[DeviceRecord]) -> Vec<SessionPlan> {
    let spine_asn = format!("SPINE-ASN-{}", site);
    let mut plans = Vec::new();
    for spine in spines(devices) {
        for leaf in leafs(devices) {
            plans.push(SessionPlan {
                name: format!("{}-{}", spine.name, leaf.name).to_uppercase(),
                device: spine.name.clone(),
                peer: leaf.name.clone(),
                local_as_key: spine_asn.clone(),
                remote_as_key: format!("LEAF-ASN-{}", leaf.name),
                peer_group_key: format!("SPINE-TO-LEAF-UNDERLAY-PG-{}", site),
                loopback: UNDERLAY_LOOPBACK.to_string(),
                session_type: SessionType::External,
            });
        }
    }
    for leaf in leafs(devices) {
        for spine in spines(devices) {
            plans.push(SessionPlan {
                name: format!("{}-{}", leaf.name, spine.name).to_uppercase(),
                device: leaf.name.clone(),
                peer: spine.name.clone(),
                local_as_key: format!("LEAF-ASN-{}", leaf.name),
                remote_as_key: spine_asn.clone(),
                peer_group_key: format!("LEAF-TO-SPINE-UNDERLAY-PG-{}", site),
                loopback: UNDERLAY_LOOPBACK.to_string(),
                session_type: SessionType::External,
            });
        }
    }
    plans
}

/// EVPN sessions between route reflectors (spines) and their clients
pub fn plan_ibgp_overlay(site: &str, devices: &[DeviceRecord], loopback: &str) -> Vec<SessionPlan> {
    let overlay_asn = format!("OVERLAY-ASN-{}", site);
    let mut plans = Vec::new();
    let mut add = |device: &DeviceRecord, peer: &DeviceRecord, group: &str| {
        plans.push(SessionPlan {
            name: format!("{}-{}-EVPN", device.name, peer.name).to_uppercase(),
            device: device.name.clone(),
            peer: peer.name.clone(),
            local_as_key: overlay_asn.clone(),
            remote_as_key: overlay_asn.clone(),
            peer_group_key: format!("{}-PG-{}", group, site),
            loopback: loopback.to_string(),
            session_type: SessionType::Internal,
        });
    };
    for spine in spines(devices) {
        for leaf in leafs(devices) {
            add(spine, leaf, "RR-SERVERS-OVERLAY");
        }
    }
    for leaf in leafs(devices) {
        for spine in spines(devices) {
            add(leaf, spine, "RR-CLIENTS-OVERLAY");
        }
    }
    plans
}

// --- Creation ---

impl<'a> TopologyCreator<'a> {
    /// OSPFv3 area 0 and one instance per fabric device
    pub async fn create_ospf_underlay(&mut self) -> Result<()> {
        let site = self.site_name().to_string();
        tracing::info!("Creating OSPF underlay for {}", site);

        let area_key = format!("UNDERLAY-{}", site);
        let area = self
            .upsert_node(
                "RoutingOSPFArea",
                json!({
                    "name": attr(format!("{}-UNDERLAY", site)),
                    "description": attr(format!("{} OSPF UNDERLAY service", site)),
                    "area": attr(0),
                    "status": attr("active"),
                    "owner": self.owner(),
                }),
                Some(&area_key),
            )
            .await?;

        tracing::info!("Creating OSPF instances for {}", site);
        let mut items = Vec::new();
        for device in self.devices().iter().filter(|d| device_role::is_fabric(&d.role)) {
            let router_id = match self.loopback_ip_id(&device.name, UNDERLAY_LOOPBACK) {
                Ok(id) => id.to_string(),
                Err(e) => {
                    tracing::warn!("Skipping OSPF on {}: {}", device.name, e);
                    continue;
                }
            };
            let interfaces: Vec<&str> = self
                .interfaces_of(&device.name)
                .iter()
                .filter(|i| i.has_role(interface_role::UNNUMBERED) || i.has_role(interface_role::LOOPBACK))
                .map(|i| i.id.as_str())
                .collect();
            let payload = json!({
                "name": attr(format!("{}-UNDERLAY", device.name.to_uppercase())),
                "owner": self.owner(),
                "area": rel(&area.id),
                "version": attr("ospfv3"),
                "device": rel(&device.id),
                "status": attr("active"),
                "router_id": rel(&router_id),
                "interfaces": rels(interfaces),
            });
            items.push((payload, Some(format!("UNDERLAY-{}", device.name))));
        }
        self.upsert_many("ServiceOSPF", items).await;
        Ok(())
    }

    pub async fn create_autonomous_systems(&mut self, scenario: Scenario) -> Result<()> {
        let site = self.site_name().to_string();
        tracing::info!("Creating autonomous systems for {} (scenario: {})", site, scenario.as_str());

        let pool = find_id_by_name(self.api(), "CoreNumberPool", ASN_POOL)
            .await?
            .ok_or_else(|| InfrahubError::not_found("CoreNumberPool", ASN_POOL))?;
        let building = self.store_get(&site)?.id.clone();

        for plan in plan_autonomous_systems(&site, scenario, self.devices()) {
            let payload = json!({
                "asn": from_pool(&pool),
                "status": attr("active"),
                "description": attr(&plan.description),
                "location": rel(&building),
            });
            self.upsert_node("RoutingAutonomousSystem", payload, Some(&plan.store_key))
                .await?;
        }
        Ok(())
    }

    pub async fn create_bgp_peer_groups(&mut self, scenario: Scenario) -> Result<()> {
        let site = self.site_name().to_string();
        tracing::info!("Creating BGP peer groups for {} ({} scenario)", site, scenario.as_str());
        for plan in plan_peer_groups(&site, scenario) {
            self.upsert_node("RoutingBGPPeerGroup", plan.payload(), Some(&plan.store_key))
                .await?;
        }
        Ok(())
    }

    pub async fn create_ebgp_underlay(&mut self) -> Result<()> {
        let site = self.site_name().to_string();
        tracing::info!("Creating eBGP UNDERLAY for {} (interface-based peering)", site);
        let plans = plan_ebgp_underlay(&site, self.devices());
        self.create_sessions(&plans, "eBGP underlay").await
    }

    pub async fn create_ibgp_overlay(&mut self, loopback: &str) -> Result<()> {
        let site = self.site_name().to_string();
        tracing::info!("Creating iBGP EVPN overlay for {} over {}", site, loopback);
        let plans = plan_ibgp_overlay(&site, self.devices(), loopback);
        self.create_sessions(&plans, "iBGP EVPN overlay").await
    }

    async fn create_sessions(&mut self, plans: &[SessionPlan], note: &str) -> Result<()> {
        let mut items = Vec::new();
        for plan in plans {
            match self.session_payload(plan) {
                Ok(payload) => items.push((payload, None)),
                Err(e) => tracing::warn!("Skipping BGP session {}: {}", plan.name, e),
            }
        }
        let created = self.upsert_batch("ServiceBGP", items, Some(note)).await;
        for _ in created.iter().flatten() {
            self.record_session();
        }
        Ok(())
    }

    fn session_payload(&self, plan: &SessionPlan) -> Result<Value> {
        let device = self
            .devices()
            .iter()
            .find(|d| d.name == plan.device)
            .ok_or_else(|| InfrahubError::not_found("device", &plan.device))?;

        let mut payload = json!({
            "name": attr(&plan.name),
            "owner": self.owner(),
            "device": rel(&device.id),
            "local_as": rel(&self.store_get(&plan.local_as_key)?.id),
            "remote_as": rel(&self.store_get(&plan.remote_as_key)?.id),
            "router_id": rel(self.loopback_ip_id(&plan.device, UNDERLAY_LOOPBACK)?),
            "local_ip": rel(self.loopback_ip_id(&plan.device, &plan.loopback)?),
            "remote_ip": rel(self.loopback_ip_id(&plan.peer, &plan.loopback)?),
            "session_type": attr(plan.session_type.as_str()),
            "status": attr("active"),
        });
        if plan.session_type == SessionType::External {
            let unnumbered: Vec<&str> = self
                .interfaces_of(&plan.device)
                .iter()
                .filter(|i| i.has_role(interface_role::UNNUMBERED))
                .map(|i| i.id.as_str())
                .collect();
            payload["interfaces"] = rels(unnumbered);
        }
        match self.store_id(&plan.peer_group_key) {
            Some(group) => payload["peer_group"] = rel(group),
            None => payload["role"] = attr("peering"),
        }
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(name: &str, role: &str) -> DeviceRecord {
        DeviceRecord {
            id: format!("id-{}", name),
            name: name.to_string(),
            role: role.to_string(),
            template: "tpl".to_string(),
            height: 1,
            kind: "DcimDevice",
        }
    }

    fn fabric() -> Vec<DeviceRecord> {
        vec![
            device("dc1-spine-01", "spine"),
            device("dc1-spine-02", "spine"),
            device("dc1-leaf-01", "leaf"),
            device("dc1-border_leaf-01", "border_leaf"),
            device("dc1-oob-01", "oob"),
        ]
    }

    #[test]
    fn test_peer_groups_per_scenario() {
        let ospf = plan_peer_groups("DC1", Scenario::Ospf);
        assert_eq!(ospf.len(), 2);
        assert_eq!(ospf[0].name, "DC1-RR-CLIENTS-OVERLAY");
        assert_eq!(ospf[1].store_key, "RR-SERVERS-OVERLAY-PG-DC1");
        assert_eq!(ospf[1].payload()["route_reflector_client"], json!({"value": true}));

        let ebgp = plan_peer_groups("DC1", Scenario::Ebgp);
        assert_eq!(ebgp.len(), 4);
        assert_eq!(ebgp[0].description, "DC1 UNDERLAY from spine perspective");
        assert_eq!(ebgp[1].store_key, "LEAF-TO-SPINE-UNDERLAY-PG-DC1");
        let underlay = ebgp[0].payload();
        assert_eq!(underlay["ebgp_multihop"], json!({"value": 0}));
        assert!(underlay.get("route_reflector_client").is_none());
        assert_eq!(underlay["password"], json!({"value": "UNDERLAY-secret"}));
    }

    #[test]
    fn test_asn_plans() {
        let ebgp = plan_autonomous_systems("DC1", Scenario::Ebgp, &fabric());
        let keys: Vec<&str> = ebgp.iter().map(|p| p.store_key.as_str()).collect();
        assert_eq!(
            keys,
            vec!["SPINE-ASN-DC1", "LEAF-ASN-dc1-leaf-01", "LEAF-ASN-dc1-border_leaf-01", "OVERLAY-ASN-DC1"]
        );

        let ospf = plan_autonomous_systems("DC1", Scenario::Ospf, &fabric());
        assert_eq!(ospf.len(), 1);
        assert_eq!(ospf[0].description, "DC1 OVERLAY ASN for iBGP EVPN over OSPF UNDERLAY");
    }

    #[test]
    fn test_ebgp_underlay_both_directions() {
        let plans = plan_ebgp_underlay("DC1", &fabric());
        assert_eq!(plans.len(), 8);
        assert_eq!(plans[0].name, "DC1-SPINE-01-DC1-LEAF-01");
        assert_eq!(plans[0].remote_as_key, "LEAF-ASN-dc1-leaf-01");
        assert_eq!(plans[4].name, "DC1-LEAF-01-DC1-SPINE-01");
        assert_eq!(plans[4].local_as_key, "LEAF-ASN-dc1-leaf-01");
        assert_eq!(plans[4].peer_group_key, "LEAF-TO-SPINE-UNDERLAY-PG-DC1");
        assert!(plans.iter().all(|p| p.session_type == SessionType::External));
    }

    #[test]
    fn test_ibgp_overlay_uses_rr_groups() {
        let plans = plan_ibgp_overlay("DC1", &fabric(), "loopback1");
        assert_eq!(plans.len(), 8);
        assert_eq!(plans[0].name, "DC1-SPINE-01-DC1-LEAF-01-EVPN");
        assert_eq!(plans[0].peer_group_key, "RR-SERVERS-OVERLAY-PG-DC1");
        assert_eq!(plans[7].peer_group_key, "RR-CLIENTS-OVERLAY-PG-DC1");
        assert!(plans.iter().all(|p| p.local_as_key == "OVERLAY-ASN-DC1" && p.loopback == "loopback1"));
    }
}
