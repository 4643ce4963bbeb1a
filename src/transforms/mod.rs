pub mod cabling;
pub mod firewall;
pub mod leaf;
pub mod openconfig;

use anyhow::{anyhow, Result};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tera::{Context, Tera};

use crate::infrahub::data::{list_field, str_field};
use crate::utils::{expand_interface_range, html_unescape, natural_cmp, sort_interface_names, strip_mask};
use crate::generators::segment::VNI_OFFSET;

pub use cabling::render_cabling;
pub use firewall::render_firewall;
pub use leaf::render_leaf;
pub use openconfig::render_openconfig;

const SESSION_KEYS: &[&str] = &["name", "remote_ip", "remote_as"];

fn typename(value: &Value) -> Option<&str> {
    str_field(value, "typename")
}

// --- Routing services ---

/// Group a device's BGP sessions by peer group.
///
/// Each profile keeps the settings shared by all of its sessions, the peer
/// group name under `profile`, and the per-session fields under `sessions`.
pub fn bgp_profiles(services: &[Value]) -> Vec<Value> {
    let mut groups: Vec<(String, Vec<&Map<String, Value>>)> = Vec::new();
    for service in services.iter().filter(|s| typename(s) == Some("ServiceBGP")) {
        let Some(session) = service.as_object() else {
            continue;
        };
        let group = str_field(&service["peer_group"], "name").unwrap_or("unknown").to_string();
        match groups.iter_mut().find(|(name, _)| *name == group) {
            Some((_, sessions)) => sessions.push(session),
            None => groups.push((group, vec![session])),
        }
    }

    let mut profiles = Vec::new();
    for (_, sessions) in groups {
        let Some(first) = sessions.first() else {
            continue;
        };
        let mut base: Map<String, Value> = first
            .iter()
            .filter(|(k, _)| !SESSION_KEYS.contains(&k.as_str()) && k.as_str() != "peer_group")
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        for session in &sessions[1..] {
            base = base
                .into_iter()
                .filter(|(k, v)| session.get(k).unwrap_or(&Value::Null) == v)
                .collect();
        }

        let entries: Vec<Value> = sessions
            .iter()
            .map(|session| {
                Value::Object(
                    session
                        .iter()
                        .filter(|(k, _)| SESSION_KEYS.contains(&k.as_str()))
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect(),
                )
            })
            .collect();

        if let Some(group) = first.get("peer_group").filter(|g| g.is_object()) {
            base.insert("profile".to_string(), group.get("name").cloned().unwrap_or(Value::Null));
        }
        base.insert("sessions".to_string(), Value::Array(entries));
        profiles.push(Value::Object(base));
    }
    profiles
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OspfConfig {
    pub process_id: i64,
    pub router_id: String,
    pub area: Value,
    pub reference_bandwidth: i64,
}

pub fn ospf_configs(services: &[Value]) -> Vec<OspfConfig> {
    services
        .iter()
        .filter(|s| typename(s) == Some("ServiceOSPF"))
        .map(|service| OspfConfig {
            process_id: service["process_id"].as_i64().unwrap_or(1),
            router_id: str_field(&service["router_id"], "address")
                .map(strip_mask)
                .unwrap_or_default()
                .to_string(),
            area: service["area"]["area"].clone(),
            reference_bandwidth: service["reference_bandwidth"].as_i64().unwrap_or(10000),
        })
        .collect()
}

// --- VLANs ---

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VlanConfig {
    pub vlan_id: i64,
    pub name: String,
    pub vni: i64,
    pub rd: String,
    pub segment_type: String,
    pub external_routing: bool,
}

/// Network segments attached to the interfaces, one entry per VLAN id
pub fn vlans(interfaces: &[Value]) -> Vec<VlanConfig> {
    let mut seen: Vec<VlanConfig> = Vec::new();
    for interface in interfaces {
        for segment in list_field(interface, "interface_services") {
            if typename(segment) != Some("ServiceNetworkSegment") {
                continue;
            }
            let Some(vlan_id) = segment["vlan_id"].as_i64() else {
                continue;
            };
            if seen.iter().any(|v| v.vlan_id == vlan_id) {
                continue;
            }
            let name = [str_field(segment, "name"), str_field(segment, "customer_name")]
                .into_iter()
                .flatten()
                .find(|n| !n.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| format!("VLAN_{}", vlan_id));
            seen.push(VlanConfig {
                vlan_id,
                name,
                vni: vlan_id + VNI_OFFSET,
                rd: vlan_id.to_string(),
                segment_type: str_field(segment, "segment_type").unwrap_or("l2_only").to_string(),
                external_routing: segment["external_routing"].as_bool().unwrap_or(false),
            });
        }
    }
    seen
}

// --- Interfaces ---

fn is_loopback(name: &str, role: &str) -> bool {
    let name = name.to_lowercase();
    role.eq_ignore_ascii_case("loopback") || name.contains("loopback") || name.starts_with("lo")
}

fn first_address(interface: &Value) -> Option<&str> {
    list_field(interface, "ip_addresses")
        .first()
        .and_then(|ip| str_field(ip, "address"))
}

/// Loopback name (lowercased) to its first address without mask
pub fn loopbacks(interfaces: &[Value]) -> BTreeMap<String, String> {
    interfaces
        .iter()
        .filter_map(|iface| {
            let name = str_field(iface, "name").filter(|n| !n.is_empty())?;
            if !is_loopback(name, str_field(iface, "role").unwrap_or_default()) {
                return None;
            }
            let address = first_address(iface)?;
            Some((name.to_lowercase(), strip_mask(address).to_string()))
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OspfArea {
    pub area: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterfaceConfig {
    pub name: String,
    pub vlans: Vec<Value>,
    pub description: Option<String>,
    pub status: Value,
    pub role: Option<String>,
    pub mtu: Value,
    pub ip_addresses: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ospf: Option<OspfArea>,
}

/// Interfaces with ranges expanded, in natural name order
pub fn interfaces(data: &[Value]) -> Vec<InterfaceConfig> {
    let mut by_name: HashMap<String, InterfaceConfig> = HashMap::new();
    for iface in data {
        let Some(name) = str_field(iface, "name").filter(|n| !n.is_empty()) else {
            continue;
        };
        let services = list_field(iface, "interface_services");
        let vlans: Vec<Value> = services
            .iter()
            .filter(|s| typename(s) == Some("ServiceNetworkSegment"))
            .map(|s| s["vlan_id"].clone())
            .collect();
        let ospf = services
            .iter()
            .find(|s| typename(s) == Some("ServiceOSPF"))
            .map(|s| OspfArea {
                area: s["area"]["area"].clone(),
            });

        for expanded in expand_interface_range(name) {
            by_name.insert(
                expanded.clone(),
                InterfaceConfig {
                    name: expanded,
                    vlans: vlans.clone(),
                    description: str_field(iface, "description")
                        .filter(|d| !d.is_empty())
                        .map(html_unescape),
                    status: iface["status"].clone(),
                    role: str_field(iface, "role").map(str::to_string),
                    mtu: iface["mtu"].clone(),
                    ip_addresses: list_field(iface, "ip_addresses").to_vec(),
                    ospf: ospf.clone(),
                },
            );
        }
    }

    let mut names: Vec<String> = by_name.keys().cloned().collect();
    sort_interface_names(&mut names);
    names.into_iter().filter_map(|n| by_name.remove(&n)).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoleInterface {
    #[serde(flatten)]
    pub interface: InterfaceConfig,
    /// First address with its mask, or empty
    pub ip_address: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InterfaceRoles {
    pub loopback: Vec<RoleInterface>,
    pub uplink: Vec<RoleInterface>,
    pub downlink: Vec<RoleInterface>,
    pub customer: Vec<RoleInterface>,
    pub other: Vec<RoleInterface>,
    pub all_downlink: Vec<RoleInterface>,
    pub all_physical: Vec<RoleInterface>,
}

/// Interfaces bucketed by what they face
pub fn interface_roles(data: &[Value]) -> InterfaceRoles {
    let mut roles = InterfaceRoles::default();
    for interface in interfaces(data) {
        let role = interface.role.clone().unwrap_or_default().to_lowercase();
        let ip_address = interface
            .ip_addresses
            .first()
            .and_then(|ip| str_field(ip, "address"))
            .unwrap_or_default()
            .to_string();
        let is_lo = is_loopback(&interface.name, &role);
        let entry = RoleInterface { interface, ip_address };

        if is_lo {
            roles.loopback.push(entry);
        } else {
            match role.as_str() {
                "uplink" | "spine" => roles.uplink.push(entry),
                "downlink" | "leaf" => roles.downlink.push(entry),
                "customer" | "access" => roles.customer.push(entry),
                _ => roles.other.push(entry),
            }
        }
    }

    let by_name = |a: &RoleInterface, b: &RoleInterface| natural_cmp(&a.interface.name, &b.interface.name);
    roles.all_downlink = roles.downlink.iter().chain(&roles.customer).cloned().collect();
    roles.all_downlink.sort_by(by_name);
    roles.all_physical = roles
        .uplink
        .iter()
        .chain(&roles.downlink)
        .chain(&roles.customer)
        .chain(&roles.other)
        .cloned()
        .collect();
    roles.all_physical.sort_by(by_name);
    roles
}

// --- Templates ---

/// Read `{templates_dir}/{relative}`, falling back to the compiled-in copy
pub(crate) fn load_template(templates_dir: &Path, relative: &str, builtin: Option<&'static str>) -> Result<String> {
    let path = templates_dir.join(relative);
    match std::fs::read_to_string(&path) {
        Ok(content) => Ok(content),
        Err(_) => match builtin {
            Some(content) => {
                tracing::debug!("{} not found, using built-in template", path.display());
                Ok(content.to_string())
            }
            None => Err(anyhow!("Template not found: {}", path.display())),
        },
    }
}

/// Render one template source with autoescaping off
pub(crate) fn render_template(name: &str, content: &str, context: &Context) -> Result<String> {
    let mut tera = Tera::default();
    tera.autoescape_on(Vec::new());
    tera.add_raw_template(name, content)
        .map_err(|e| anyhow!("Invalid template {}: {}", name, e))?;
    tera.render(name, context)
        .map_err(|e| anyhow!("Template rendering failed for {}: {:?}", name, e))
}
