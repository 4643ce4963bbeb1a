use anyhow::{anyhow, Result};
use serde_json::Value;
use std::collections::HashSet;

use crate::infrahub::clean_data;
use crate::infrahub::data::{list_field, str_field};

pub const CABLING_QUERY: &str = r#"
    query topology_cabling($name: String!) {
        TopologyDataCenter(name__value: $name) {
            edges {
                node {
                    devices {
                        edges {
                            node {
                                name { value }
                                interfaces {
                                    edges {
                                        node {
                                            name { value }
                                            ... on InterfacePhysical {
                                                connector {
                                                    node {
                                                        ... on DcimCable {
                                                            cable_type { value }
                                                            status { value }
                                                            color { value }
                                                            label { value }
                                                            connected_endpoints {
                                                                edges {
                                                                    node {
                                                                        ... on DcimEndpoint {
                                                                            name { value }
                                                                            device { node { name { value } } }
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
                    }
                }
            }
        }
    }"#;

pub const CABLING_HEADER: &str =
    "Source Device,Source Interface,Remote Device,Remote Interface,Cable Type,Cable Status,Cable Color,Cable Label";

fn csv_field(field: &str) -> String {
    if field.contains(',') {
        format!("\"{}\"", field)
    } else {
        field.to_string()
    }
}

/// One CSV line per cable in the first topology of a raw `topology_cabling` result
pub fn render_cabling(data: &Value) -> Result<String> {
    let cleaned = clean_data(data);
    let topology = list_field(&cleaned, "TopologyDataCenter")
        .first()
        .ok_or_else(|| anyhow!("No TopologyDataCenter found in query result"))?;

    let mut rows = vec![CABLING_HEADER.to_string()];
    let mut seen: HashSet<[(String, String); 2]> = HashSet::new();

    for device in list_field(topology, "devices") {
        let source_device = str_field(device, "name").unwrap_or_default();
        for iface in list_field(device, "interfaces") {
            let cable = &iface["connector"];
            if !cable.is_object() {
                continue;
            }
            let source_interface = str_field(iface, "name").unwrap_or_default();

            let remote = list_field(cable, "connected_endpoints").iter().find(|endpoint| {
                str_field(&endpoint["device"], "name") != Some(source_device)
                    || str_field(endpoint, "name") != Some(source_interface)
            });
            let Some(remote) = remote else {
                continue;
            };
            let (Some(remote_device), Some(remote_interface)) =
                (str_field(&remote["device"], "name"), str_field(remote, "name"))
            else {
                continue;
            };

            let mut key = [
                (source_device.to_string(), source_interface.to_string()),
                (remote_device.to_string(), remote_interface.to_string()),
            ];
            key.sort();
            if !seen.insert(key) {
                continue;
            }

            let row = [
                source_device,
                source_interface,
                remote_device,
                remote_interface,
                str_field(cable, "cable_type").unwrap_or_default(),
                str_field(cable, "status").unwrap_or_default(),
                str_field(cable, "color").unwrap_or_default(),
                str_field(cable, "label").unwrap_or_default(),
            ];
            rows.push(row.iter().map(|f| csv_field(f)).collect::<Vec<_>>().join(","));
        }
    }

    Ok(rows.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn endpoint(device: &str, iface: &str) -> Value {
        json!({"node": {"name": {"value": iface}, "device": {"node": {"name": {"value": device}}}}})
    }

    fn cable(label: &str, a: (&str, &str), b: (&str, &str)) -> Value {
        json!({"node": {
            "cable_type": {"value": "dac-passive"},
            "status": {"value": "connected"},
            "color": {"value": null},
            "label": {"value": label},
            "connected_endpoints": {"edges": [endpoint(a.0, a.1), endpoint(b.0, b.1)]},
        }})
    }

    #[test]
    fn test_cabling_dedups_both_directions() {
        let data = json!({"TopologyDataCenter": {"edges": [{"node": {"devices": {"edges": [
            {"node": {"name": {"value": "spine-01"}, "interfaces": {"edges": [
                {"node": {"name": {"value": "Ethernet1"},
                          "connector": cable("A,1", ("spine-01", "Ethernet1"), ("leaf-01", "Ethernet49"))}},
                {"node": {"name": {"value": "Ethernet2"}, "connector": {"node": null}}},
            ]}}},
            {"node": {"name": {"value": "leaf-01"}, "interfaces": {"edges": [
                {"node": {"name": {"value": "Ethernet49"},
                          "connector": cable("A,1", ("spine-01", "Ethernet1"), ("leaf-01", "Ethernet49"))}},
            ]}}},
        ]}}}]}});

        let csv = render_cabling(&data).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], CABLING_HEADER);
        assert_eq!(lines[1], "spine-01,Ethernet1,leaf-01,Ethernet49,dac-passive,connected,,\"A,1\"");
    }

    #[test]
    fn test_cabling_without_remote() {
        let data = json!({"TopologyDataCenter": {"edges": [{"node": {"devices": {"edges": [
            {"node": {"name": {"value": "oob-01"}, "interfaces": {"edges": [
                {"node": {"name": {"value": "Ethernet1"},
                          "connector": {"node": {"connected_endpoints": {"edges": [endpoint("oob-01", "Ethernet1")]}}}}},
            ]}}},
        ]}}}]}});
        assert_eq!(render_cabling(&data).unwrap(), CABLING_HEADER);
    }
}
