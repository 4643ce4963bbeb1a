use anyhow::{anyhow, Result};
use serde_json::{json, Map, Value};

use crate::infrahub::clean_data;
use crate::infrahub::data::{list_field, str_field};

pub const OPENCONFIG_QUERY: &str = r#"
    query openconfig_leaf_config($device: String!) {
        DcimDevice(name__value: $device) {
            edges {
                node {
                    name { value }
                    interfaces {
                        edges {
                            node {
                                name { value }
                                description { value }
                                status { value }
                                ... on InterfacePhysical { mtu { value } }
                                ... on InterfaceLayer3 { ip_addresses { edges { node { address { value } } } } }
                            }
                        }
                    }
                }
            }
        }
    }"#;

fn subinterface(index: usize, address: &str) -> Result<Value> {
    let (ip, length) = address
        .split_once('/')
        .ok_or_else(|| anyhow!("Address {} has no prefix length", address))?;
    let length: u8 = length
        .parse()
        .map_err(|_| anyhow!("Invalid prefix length in {}", address))?;
    Ok(json!({
        "index": index,
        "config": { "index": index },
        "openconfig-if-ip:ipv4": {
            "addresses": {
                "address": [{
                    "ip": ip,
                    "config": { "ip": ip, "prefix-length": length },
                }]
            },
            "config": { "enabled": true },
        },
    }))
}

/// Build the OpenConfig interfaces document for the first device in a raw
/// `openconfig_leaf_config` result
pub fn render_openconfig(data: &Value) -> Result<Value> {
    let cleaned = clean_data(data);
    let device = list_field(&cleaned, "DcimDevice")
        .first()
        .ok_or_else(|| anyhow!("No DcimDevice found in query result"))?;

    let mut entries = Vec::new();
    for iface in list_field(device, "interfaces") {
        let Some(name) = str_field(iface, "name") else {
            continue;
        };
        let status = str_field(iface, "status").unwrap_or("active");

        let mut config = Map::new();
        config.insert("name".to_string(), json!(name));
        config.insert("enabled".to_string(), json!(status == "active"));
        if let Some(description) = str_field(iface, "description").filter(|d| !d.is_empty()) {
            config.insert("description".to_string(), json!(description));
        }
        if let Some(mtu) = iface["mtu"].as_i64().filter(|m| *m != 0) {
            config.insert("mtu".to_string(), json!(mtu));
        }

        let mut entry = json!({ "name": name, "config": config });
        let addresses: Vec<&str> = list_field(iface, "ip_addresses")
            .iter()
            .filter_map(|ip| str_field(ip, "address"))
            .collect();
        if !addresses.is_empty() {
            let subinterfaces = addresses
                .iter()
                .enumerate()
                .map(|(index, address)| subinterface(index, address))
                .collect::<Result<Vec<_>>>()?;
            entry["subinterfaces"] = json!({ "subinterface": subinterfaces });
        }
        entries.push(entry);
    }

    Ok(json!({ "openconfig-interfaces:interfaces": { "interface": entries } }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openconfig_interfaces() {
        let data = json!({"DcimDevice": {"edges": [{"node": {
            "name": {"value": "dc1-leaf-01"},
            "interfaces": {"edges": [
                {"node": {
                    "name": {"value": "Ethernet1"},
                    "status": {"value": "active"},
                    "description": {"value": "to spine"},
                    "mtu": {"value": 9214},
                }},
                {"node": {
                    "name": {"value": "Ethernet2"},
                    "status": {"value": "disabled"},
                    "description": {"value": ""},
                    "mtu": {"value": null},
                }},
                {"node": {
                    "name": {"value": "loopback0"},
                    "ip_addresses": {"edges": [
                        {"node": {"address": {"value": "10.1.0.3/32"}}},
                        {"node": {"address": {"value": "10.2.0.3/31"}}},
                    ]},
                }},
            ]},
        }}]}});

        let doc = render_openconfig(&data).unwrap();
        let interfaces = doc["openconfig-interfaces:interfaces"]["interface"].as_array().unwrap();
        assert_eq!(interfaces.len(), 3);

        assert_eq!(
            interfaces[0],
            json!({"name": "Ethernet1", "config": {"name": "Ethernet1", "enabled": true, "description": "to spine", "mtu": 9214}})
        );
        assert_eq!(interfaces[1]["config"], json!({"name": "Ethernet2", "enabled": false}));

        // missing status defaults to active
        assert_eq!(interfaces[2]["config"]["enabled"], json!(true));
        let subs = interfaces[2]["subinterfaces"]["subinterface"].as_array().unwrap();
        assert_eq!(subs.len(), 2);
        assert_eq!(subs[1]["index"], json!(1));
        assert_eq!(
            subs[1]["openconfig-if-ip:ipv4"]["addresses"]["address"][0],
            json!({"ip": "10.2.0.3", "config": {"ip": "10.2.0.3", "prefix-length": 31}})
        );
    }

    #[test]
    fn test_openconfig_bad_address() {
        let data = json!({"DcimDevice": {"edges": [{"node": {"interfaces": {"edges": [
            {"node": {"name": {"value": "Ethernet1"}, "ip_addresses": {"edges": [{"node": {"address": {"value": "10.0.0.1"}}}]}}},
        ]}}}]}});
        assert!(render_openconfig(&data).is_err());
    }

    #[test]
    fn test_openconfig_no_device() {
        assert!(render_openconfig(&json!({"DcimDevice": {"edges": []}})).is_err());
    }
}
