use anyhow::Result;
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use tera::Context;

use super::{load_template, render_template};
use crate::infrahub::clean_data;
use crate::infrahub::data::{list_field, str_field};

const JUNIPER_FIREWALL: &str = include_str!("../../templates/configs/juniper_firewall.j2");
const TEMPLATE: &str = "configs/juniper_firewall.j2";

pub const NO_FIREWALL: &str = "# No firewall device found";

pub const FIREWALL_QUERY: &str = r#"
    query juniper_firewall_config($device: String!) {
        SecurityFirewall(name__value: $device) {
            edges {
                node {
                    name { value }
                    interfaces {
                        edges {
                            node {
                                name { value }
                                role { value }
                                ... on InterfaceLayer3 { ip_addresses { edges { node { address { value } } } } }
                            }
                        }
                    }
                    policies {
                        edges {
                            node {
                                rules {
                                    edges {
                                        node {
                                            index { value }
                                            name { value }
                                            action { value }
                                            log { value }
                                            source_zone { node { name { value } } }
                                            destination_zone { node { name { value } } }
                                            source_addresses { edges { node { ...AddressGroup } } }
                                            destination_addresses { edges { node { ...AddressGroup } } }
                                            services {
                                                edges {
                                                    node {
                                                        services { edges { node { name { value } protocol { value } port { value } } } }
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
        }
    }

    fragment AddressGroup on SecurityAddressGroup {
        ip_addresses { edges { node { name { value } ipam_ip_address { node { address { value } } } } } }
        prefixes { edges { node { name { value } ipam_prefix { node { prefix { value } } } } } }
        fqdns { edges { node { name { value } fqdn { value } } } }
    }"#;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FirewallInterface {
    pub name: String,
    pub role: Option<String>,
    pub ip_address: Option<String>,
}

/// Global address book entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AddressEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Application {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub protocol: String,
    pub port: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FirewallRule {
    pub index: i64,
    pub name: String,
    pub action: String,
    pub log: bool,
    pub source_zone: Option<String>,
    pub destination_zone: Option<String>,
    pub source_addresses: Vec<String>,
    pub destination_addresses: Vec<String>,
    pub applications: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZonePair {
    pub source_zone: String,
    pub destination_zone: String,
    pub rules: Vec<FirewallRule>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FirewallData {
    pub device_name: String,
    pub management_interface: String,
    pub interfaces: Vec<FirewallInterface>,
    pub zone_pairs: Vec<ZonePair>,
    pub addresses: Vec<AddressEntry>,
    pub applications: Vec<Application>,
}

impl FirewallData {
    fn add_address(&mut self, name: &str, kind: &'static str, value: &str) {
        if !self.addresses.iter().any(|a| a.name == name) {
            self.addresses.push(AddressEntry {
                name: name.to_string(),
                kind,
                value: value.to_string(),
            });
        }
    }

    /// Register every member of the address groups and return their names
    fn collect_addresses(&mut self, groups: &[Value]) -> Vec<String> {
        let mut names = Vec::new();
        for group in groups {
            let members = [
                ("ip_addresses", "SecurityIPAddress"),
                ("prefixes", "SecurityPrefix"),
                ("fqdns", "SecurityFQDN"),
            ];
            for (field, kind) in members {
                for member in list_field(group, field) {
                    let Some(name) = str_field(member, "name") else {
                        continue;
                    };
                    let value = match kind {
                        "SecurityIPAddress" => str_field(&member["ipam_ip_address"], "address"),
                        "SecurityPrefix" => str_field(&member["ipam_prefix"], "prefix"),
                        _ => str_field(member, "fqdn"),
                    };
                    self.add_address(name, kind, value.unwrap_or_default());
                    names.push(name.to_string());
                }
            }
        }
        names
    }

    fn collect_applications(&mut self, groups: &[Value]) -> Vec<String> {
        let mut names = Vec::new();
        for service in groups.iter().flat_map(|g| list_field(g, "services")) {
            let Some(name) = str_field(service, "name") else {
                continue;
            };
            if !self.applications.iter().any(|a| a.name == name) {
                self.applications.push(Application {
                    name: name.to_string(),
                    kind: "SecurityService",
                    protocol: str_field(service, "protocol").unwrap_or_default().to_string(),
                    port: service["port"].clone(),
                });
            }
            names.push(name.to_string());
        }
        names
    }

    fn add_rule(&mut self, rule: FirewallRule) {
        let (Some(src), Some(dst)) = (rule.source_zone.clone(), rule.destination_zone.clone()) else {
            return;
        };
        match self
            .zone_pairs
            .iter_mut()
            .find(|p| p.source_zone == src && p.destination_zone == dst)
        {
            Some(pair) => pair.rules.push(rule),
            None => self.zone_pairs.push(ZonePair {
                source_zone: src,
                destination_zone: dst,
                rules: vec![rule],
            }),
        }
    }
}

/// Template data for a cleaned SecurityFirewall node
pub fn firewall_data(firewall: &Value) -> FirewallData {
    let mut data = FirewallData {
        device_name: str_field(firewall, "name").unwrap_or_default().to_string(),
        ..Default::default()
    };

    let mut management = None;
    for iface in list_field(firewall, "interfaces") {
        let Some(name) = str_field(iface, "name") else {
            continue;
        };
        let role = str_field(iface, "role");
        if role == Some("management") {
            management = Some(name.to_string());
        }
        data.interfaces.push(FirewallInterface {
            name: name.to_string(),
            role: role.map(str::to_string),
            ip_address: list_field(iface, "ip_addresses")
                .first()
                .and_then(|ip| str_field(ip, "address"))
                .map(str::to_string),
        });
    }
    data.management_interface = management.unwrap_or_else(|| "fxp0".to_string());

    for rule in list_field(firewall, "policies").iter().flat_map(|p| list_field(p, "rules")) {
        let source_addresses = data.collect_addresses(list_field(rule, "source_addresses"));
        let destination_addresses = data.collect_addresses(list_field(rule, "destination_addresses"));
        let applications = data.collect_applications(list_field(rule, "services"));
        data.add_rule(FirewallRule {
            index: rule["index"].as_i64().unwrap_or(0),
            name: str_field(rule, "name").unwrap_or("unnamed-rule").to_string(),
            action: str_field(rule, "action").unwrap_or("deny").to_string(),
            log: rule["log"].as_bool().unwrap_or(false),
            source_zone: str_field(&rule["source_zone"], "name").map(str::to_string),
            destination_zone: str_field(&rule["destination_zone"], "name").map(str::to_string),
            source_addresses,
            destination_addresses,
            applications,
        });
    }

    for pair in &mut data.zone_pairs {
        pair.rules.sort_by_key(|r| r.index);
    }
    data
}

/// Render a Juniper SRX configuration from a raw `juniper_firewall_config` result
pub fn render_firewall(data: &Value, templates_dir: &Path) -> Result<String> {
    let cleaned = clean_data(data);
    let Some(firewall) = list_field(&cleaned, "SecurityFirewall").first() else {
        return Ok(NO_FIREWALL.to_string());
    };

    let content = load_template(templates_dir, TEMPLATE, Some(JUNIPER_FIREWALL))?;
    let mut context = Context::new();
    context.insert("data", &firewall_data(firewall));
    render_template(TEMPLATE, &content, &context)
}
