use anyhow::{anyhow, Result};
use serde::Serialize;
use serde_json::{json, Value};
use std::path::Path;
use tera::Context;

use super::{
    bgp_profiles, interface_roles, interfaces, load_template, loopbacks, ospf_configs, render_template, vlans,
};
use crate::infrahub::data::{list_field, str_field};
use crate::infrahub::get_data;
use crate::utils::strip_mask;

const ARISTA_EOS: &str = include_str!("../../templates/configs/leafs/arista_eos.j2");
const CISCO_NXOS: &str = include_str!("../../templates/configs/leafs/cisco_nxos.j2");

pub const LEAF_QUERY: &str = r#"
    query leaf_config($device: String!) {
        DcimDevice(name__value: $device) {
            edges {
                node {
                    name { value }
                    device_type { node { platform { node { netmiko_device_type { value } } } } }
                    device_services {
                        edges {
                            node {
                                __typename
                                ... on ServiceBGP {
                                    name { value }
                                    session_type { value }
                                    local_as { node { asn { value } } }
                                    remote_as { node { asn { value } } }
                                    router_id { node { address { value } } }
                                    local_ip { node { address { value } } }
                                    remote_ip { node { address { value } } }
                                    peer_group { node { name { value } } }
                                }
                                ... on ServiceOSPF {
                                    router_id { node { address { value } } }
                                    area { node { area { value } } }
                                }
                            }
                        }
                    }
                    interfaces {
                        edges {
                            node {
                                name { value }
                                description { value }
                                status { value }
                                role { value }
                                ... on InterfacePhysical { mtu { value } }
                                ... on InterfaceLayer3 { ip_addresses { edges { node { address { value } } } } }
                                interface_services {
                                    edges {
                                        node {
                                            __typename
                                            ... on ServiceNetworkSegment {
                                                name { value }
                                                customer_name { value }
                                                vlan_id { value }
                                                segment_type { value }
                                                external_routing { value }
                                            }
                                            ... on ServiceOSPF { area { node { area { value } } } }
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
    }"#;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BgpNeighbor {
    pub name: String,
    pub remote_ip: String,
    pub remote_as: Value,
}

/// Flattened BGP settings for templates that want a single router block
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BgpSummary {
    pub local_as: Value,
    pub router_id: String,
    pub neighbors: Vec<BgpNeighbor>,
}

pub fn bgp_summary(profiles: &[Value]) -> Option<BgpSummary> {
    let first = profiles.first()?;
    let neighbors = profiles
        .iter()
        .flat_map(|profile| list_field(profile, "sessions"))
        .map(|session| BgpNeighbor {
            name: str_field(session, "name").unwrap_or_default().to_string(),
            remote_ip: str_field(&session["remote_ip"], "address").unwrap_or_default().to_string(),
            remote_as: session["remote_as"].get("asn").cloned().unwrap_or_else(|| json!("")),
        })
        .collect();
    Some(BgpSummary {
        local_as: first["local_as"].get("asn").cloned().unwrap_or_else(|| json!("")),
        router_id: str_field(&first["router_id"], "address")
            .map(strip_mask)
            .unwrap_or_default()
            .to_string(),
        neighbors,
    })
}

fn builtin_template(platform: &str) -> Option<&'static str> {
    match platform {
        "arista_eos" => Some(ARISTA_EOS),
        "cisco_nxos" => Some(CISCO_NXOS),
        _ => None,
    }
}

/// Template context for a cleaned leaf device
pub fn leaf_context(device: &Value) -> Context {
    let services = list_field(device, "device_services");
    let device_interfaces = list_field(device, "interfaces");
    let profiles = bgp_profiles(services);
    let ospf = ospf_configs(services);

    let mut context = Context::new();
    context.insert("hostname", &device["name"]);
    context.insert("name", &device["name"]);
    match bgp_summary(&profiles) {
        Some(bgp) => context.insert("bgp", &bgp),
        None => context.insert("bgp", &json!({})),
    }
    context.insert("bgp_profiles", &profiles);
    match ospf.first() {
        Some(first) => context.insert("ospf", first),
        None => context.insert("ospf", &json!({})),
    }
    context.insert("ospf_configs", &ospf);
    context.insert("interfaces", &interface_roles(device_interfaces));
    context.insert("interface_list", &interfaces(device_interfaces));
    context.insert("vlans", &vlans(device_interfaces));
    context.insert("loopbacks", &loopbacks(device_interfaces));
    context
}

/// Render a leaf configuration from the raw `leaf_config` query result.
///
/// The template is picked by the device platform's netmiko type, from
/// `{templates_dir}/configs/leafs/` first and the built-in set otherwise.
pub fn render_leaf(data: &Value, templates_dir: &Path) -> Result<String> {
    let device = get_data(data)?;
    let platform = device["device_type"]["platform"]["netmiko_device_type"]
        .as_str()
        .filter(|p| !p.is_empty())
        .ok_or_else(|| {
            anyhow!(
                "Device {} has no platform netmiko_device_type",
                str_field(&device, "name").unwrap_or("unknown")
            )
        })?;

    let template_name = format!("{}.j2", platform);
    let content = load_template(
        templates_dir,
        &format!("configs/leafs/{}", template_name),
        builtin_template(platform),
    )?;
    render_template(&template_name, &content, &leaf_context(&device))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(platform: &str) -> Value {
        json!({"DcimDevice": {"edges": [{"node": {
            "name": {"value": "dc1-leaf-01"},
            "device_type": {"node": {"platform": {"node": {"netmiko_device_type": {"value": platform}}}}},
            "device_services": {"edges": [
                {"node": {
                    "__typename": "ServiceBGP",
                    "name": {"value": "DC1-LEAF-01-DC1-SPINE-01"},
                    "session_type": {"value": "EXTERNAL"},
                    "local_as": {"node": {"asn": {"value": 65101}}},
                    "remote_as": {"node": {"asn": {"value": 65000}}},
                    "router_id": {"node": {"address": {"value": "10.1.0.3/32"}}},
                    "remote_ip": {"node": {"address": {"value": "10.1.0.1/32"}}},
                    "peer_group": {"node": {"name": {"value": "DC1-LEAF-TO-SPINE-UNDERLAY"}}},
                }},
                {"node": {
                    "__typename": "ServiceOSPF",
                    "router_id": {"node": {"address": {"value": "10.1.0.3/32"}}},
                    "area": {"node": {"area": {"value": 0}}},
                }},
            ]},
            "interfaces": {"edges": [
                {"node": {
                    "name": {"value": "Ethernet49"},
                    "role": {"value": "unnumbered"},
                    "status": {"value": "active"},
                    "description": {"value": "Peering connection to dc1-spine-01 -&gt; Ethernet1"},
                    "interface_services": {"edges": [{"node": {"__typename": "ServiceOSPF", "area": {"node": {"area": {"value": 0}}}}}]},
                }},
                {"node": {
                    "name": {"value": "Ethernet10"},
                    "role": {"value": "customer"},
                    "status": {"value": "active"},
                    "interface_services": {"edges": [{"node": {
                        "__typename": "ServiceNetworkSegment",
                        "name": {"value": "acme-120"},
                        "vlan_id": {"value": 120},
                    }}]},
                }},
                {"node": {
                    "name": {"value": "loopback0"},
                    "role": {"value": "loopback"},
                    "ip_addresses": {"edges": [{"node": {"address": {"value": "10.1.0.3/32"}}}]},
                    "interface_services": {"edges": []},
                }},
                {"node": {
                    "name": {"value": "loopback1"},
                    "role": {"value": "loopback-vtep"},
                    "ip_addresses": {"edges": [{"node": {"address": {"value": "10.1.0.131/32"}}}]},
                    "interface_services": {"edges": []},
                }},
            ]},
        }}]}})
    }

    #[test]
    fn test_bgp_summary_flattens_profiles() {
        let device = get_data(&leaf("arista_eos")).unwrap();
        let profiles = bgp_profiles(list_field(&device, "device_services"));
        let bgp = bgp_summary(&profiles).unwrap();
        assert_eq!(bgp.local_as, json!(65101));
        assert_eq!(bgp.router_id, "10.1.0.3");
        assert_eq!(
            bgp.neighbors,
            vec![BgpNeighbor {
                name: "DC1-LEAF-01-DC1-SPINE-01".to_string(),
                remote_ip: "10.1.0.1/32".to_string(),
                remote_as: json!(65000),
            }]
        );
        assert!(bgp_summary(&[]).is_none());
    }

    #[test]
    fn test_render_arista_builtin() {
        let config = render_leaf(&leaf("arista_eos"), Path::new("/nonexistent")).unwrap();
        assert!(config.starts_with("hostname dc1-leaf-01"));
        assert!(config.contains("vlan 120\n   name acme-120"));
        assert!(config.contains("interface Ethernet49\n   description Peering connection to dc1-spine-01 -> Ethernet1"));
        assert!(config.contains("ip address unnumbered Loopback0"));
        assert!(config.contains("switchport access vlan 120"));
        assert!(config.contains("vxlan vlan 120 vni 10120"));
        assert!(config.contains("router ospf 1\n   router-id 10.1.0.3"));
        assert!(config.contains("router bgp 65101"));
        assert!(config.contains("neighbor 10.1.0.1 remote-as 65000"));
        assert!(config.contains("rd 10.1.0.3:120"));
    }

    #[test]
    fn test_render_nxos_builtin() {
        let config = render_leaf(&leaf("cisco_nxos"), Path::new("/nonexistent")).unwrap();
        assert!(config.contains("vn-segment 10120"));
        assert!(config.contains("ip unnumbered loopback0"));
        assert!(config.contains("ip router ospf 1 area 0"));
        assert!(config.contains("member vni 10120"));
        assert!(config.contains("neighbor 10.1.0.1\n    remote-as 65000"));
    }

    #[test]
    fn test_unknown_platform_without_template() {
        let err = render_leaf(&leaf("juniper_junos"), Path::new("/nonexistent")).unwrap_err();
        assert!(err.to_string().contains("configs/leafs/juniper_junos.j2"));
    }

    #[test]
    fn test_missing_platform() {
        let data = json!({"DcimDevice": {"edges": [{"node": {"name": {"value": "x"}}}]}});
        let err = render_leaf(&data, Path::new("templates")).unwrap_err();
        assert_eq!(err.to_string(), "Device x has no platform netmiko_device_type");
    }
}
