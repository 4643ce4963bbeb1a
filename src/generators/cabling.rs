use crate::models::{device_role, interface_role};
use crate::utils::{device_number, sort_interface_names};

/// Out-of-band connection flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OobKind {
    Management,
    Console,
}

impl OobKind {
    /// Template interface role that takes part in this kind of connection
    pub fn interface_role(&self) -> &'static str {
        match self {
            OobKind::Management => interface_role::MANAGEMENT,
            OobKind::Console => interface_role::CONSOLE,
        }
    }

    /// Substring in a device name that marks it as the aggregation side
    pub fn source_key(&self) -> &'static str {
        match self {
            OobKind::Management => device_role::OOB,
            OobKind::Console => device_role::CONSOLE,
        }
    }

    /// Infrahub kind of both cable endpoints
    pub fn endpoint_kind(&self) -> &'static str {
        match self {
            OobKind::Management => "InterfacePhysical",
            OobKind::Console => "DcimConsoleInterface",
        }
    }
}

/// One cable to lay between two device ports
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub source: String,
    pub source_interface: String,
    pub target: String,
    pub target_interface: String,
}

/// Interface names (already filtered by role) per device, in device order
pub type DeviceInterfaces = Vec<(String, Vec<String>)>;

/// Pair OOB switches or console servers with every other device.
///
/// Sources are devices named after the aggregation role; each source walks
/// the destinations in order and takes the next free port on both sides
/// when the two devices' trailing numbers share parity.
pub fn plan_oob_connections(kind: OobKind, device_interfaces: &[(String, Vec<String>)]) -> Vec<Connection> {
    let sorted = |ifaces: &Vec<String>| {
        let mut names = ifaces.clone();
        sort_interface_names(&mut names);
        names
    };

    let mut sources: DeviceInterfaces = device_interfaces
        .iter()
        .filter(|(name, ifaces)| name.contains(kind.source_key()) && !ifaces.is_empty())
        .map(|(name, ifaces)| (name.clone(), sorted(ifaces)))
        .collect();

    let mut destinations: DeviceInterfaces = device_interfaces
        .iter()
        .filter(|(name, ifaces)| !ifaces.is_empty() && !sources.iter().any(|(s, _)| s == name))
        .map(|(name, ifaces)| (name.clone(), sorted(ifaces)))
        .collect();

    let mut connections = Vec::new();
    for (source, source_ifaces) in sources.iter_mut() {
        let Some(source_number) = device_number(source) else {
            continue;
        };
        for (target, target_ifaces) in destinations.iter_mut() {
            if source_ifaces.is_empty() || target_ifaces.is_empty() {
                continue;
            }
            match device_number(target) {
                Some(n) if n % 2 == source_number % 2 => {}
                _ => continue,
            }
            connections.push(Connection {
                source: source.clone(),
                source_interface: source_ifaces.remove(0),
                target: target.clone(),
                target_interface: target_ifaces.remove(0),
            });
        }
    }
    connections
}

/// Fabric-facing port on a device template
#[derive(Debug, Clone)]
pub struct FabricPort {
    pub name: String,
    pub role: String,
}

/// Fabric ports of one spine, leaf or border leaf
#[derive(Debug, Clone)]
pub struct FabricDevice {
    pub name: String,
    pub role: String,
    pub ports: Vec<FabricPort>,
}

/// Full mesh between spines and (border) leafs.
///
/// Spine `leaf` ports face plain leafs, spine `uplink` ports face border
/// leafs; leafs and border leafs offer their `uplink` ports.
pub fn plan_fabric_peering(devices: &[FabricDevice]) -> Vec<Connection> {
    let fabric: Vec<&FabricDevice> = devices
        .iter()
        .filter(|d| device_role::is_fabric(&d.role))
        .collect();

    let ports_with_role = |device: &FabricDevice, role: &str| {
        let mut names: Vec<String> = device
            .ports
            .iter()
            .filter(|p| p.role == role)
            .map(|p| p.name.clone())
            .collect();
        sort_interface_names(&mut names);
        (device.name.clone(), names)
    };

    let mut spines_leaves: DeviceInterfaces = fabric
        .iter()
        .filter(|d| d.name.contains(device_role::SPINE))
        .map(|d| ports_with_role(*d, interface_role::LEAF))
        .collect();
    let mut spine_borders: DeviceInterfaces = fabric
        .iter()
        .filter(|d| d.name.contains(device_role::SPINE))
        .map(|d| ports_with_role(*d, interface_role::UPLINK))
        .collect();
    let mut leafs: DeviceInterfaces = fabric
        .iter()
        .filter(|d| d.name.contains(device_role::LEAF) && !d.name.contains("border"))
        .map(|d| ports_with_role(*d, interface_role::UPLINK))
        .collect();
    let mut border_leafs: DeviceInterfaces = fabric
        .iter()
        .filter(|d| d.name.contains(device_role::BORDER_LEAF))
        .map(|d| ports_with_role(*d, interface_role::UPLINK))
        .collect();

    let mut connections = full_mesh(&mut spines_leaves, &mut leafs);
    connections.extend(full_mesh(&mut spine_borders, &mut border_leafs));
    connections
}

fn full_mesh(sources: &mut DeviceInterfaces, targets: &mut DeviceInterfaces) -> Vec<Connection> {
    let mut connections = Vec::new();
    for (source, source_ifaces) in sources.iter_mut() {
        for (target, target_ifaces) in targets.iter_mut() {
            if source_ifaces.is_empty() || target_ifaces.is_empty() {
                continue;
            }
            connections.push(Connection {
                source: source.clone(),
                source_interface: source_ifaces.remove(0),
                target: target.clone(),
                target_interface: target_ifaces.remove(0),
            });
        }
    }
    connections
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ifaces(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_oob_pairs_by_parity() {
        let devices = vec![
            ("dc1-spine-01".to_string(), ifaces(&["Management1"])),
            ("dc1-spine-02".to_string(), ifaces(&["Management1"])),
            ("dc1-leaf-01".to_string(), ifaces(&["Management1"])),
            ("dc1-oob-01".to_string(), ifaces(&["Ethernet10", "Ethernet2", "Ethernet1"])),
            ("dc1-oob-02".to_string(), ifaces(&["Ethernet1", "Ethernet2"])),
            ("dc1-console-01".to_string(), vec![]),
        ];
        let plan = plan_oob_connections(OobKind::Management, &devices);

        assert_eq!(
            plan,
            vec![
                Connection {
                    source: "dc1-oob-01".into(),
                    source_interface: "Ethernet1".into(),
                    target: "dc1-spine-01".into(),
                    target_interface: "Management1".into(),
                },
                Connection {
                    source: "dc1-oob-01".into(),
                    source_interface: "Ethernet2".into(),
                    target: "dc1-leaf-01".into(),
                    target_interface: "Management1".into(),
                },
                Connection {
                    source: "dc1-oob-02".into(),
                    source_interface: "Ethernet1".into(),
                    target: "dc1-spine-02".into(),
                    target_interface: "Management1".into(),
                },
            ]
        );
    }

    #[test]
    fn test_oob_source_runs_out_of_ports() {
        let devices = vec![
            ("dc1-leaf-01".to_string(), ifaces(&["Management1"])),
            ("dc1-leaf-03".to_string(), ifaces(&["Management1"])),
            ("dc1-console-01".to_string(), ifaces(&["Port1"])),
        ];
        let plan = plan_oob_connections(OobKind::Console, &devices);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].target, "dc1-leaf-01");
    }

    fn fabric(name: &str, role: &str, ports: &[(&str, &str)]) -> FabricDevice {
        FabricDevice {
            name: name.to_string(),
            role: role.to_string(),
            ports: ports
                .iter()
                .map(|(n, r)| FabricPort { name: n.to_string(), role: r.to_string() })
                .collect(),
        }
    }

    #[test]
    fn test_fabric_full_mesh() {
        let devices = vec![
            fabric("dc1-spine-01", "spine", &[("Ethernet1", "leaf"), ("Ethernet2", "leaf"), ("Ethernet32", "uplink")]),
            fabric("dc1-spine-02", "spine", &[("Ethernet1", "leaf"), ("Ethernet2", "leaf"), ("Ethernet32", "uplink")]),
            fabric("dc1-leaf-01", "leaf", &[("Ethernet49", "uplink"), ("Ethernet50", "uplink"), ("Ethernet1", "customer")]),
            fabric("dc1-leaf-02", "leaf", &[("Ethernet49", "uplink"), ("Ethernet50", "uplink")]),
            fabric("dc1-border_leaf-01", "border_leaf", &[("Ethernet49", "uplink"), ("Ethernet50", "uplink")]),
            fabric("dc1-edge-01", "edge", &[("Ethernet1", "uplink")]),
        ];
        let plan = plan_fabric_peering(&devices);

        let pairs: Vec<(String, String, String, String)> = plan
            .into_iter()
            .map(|c| (c.source, c.source_interface, c.target, c.target_interface))
            .collect();
        let expect = |a: &str, b: &str, c: &str, d: &str| (a.to_string(), b.to_string(), c.to_string(), d.to_string());
        assert_eq!(
            pairs,
            vec![
                expect("dc1-spine-01", "Ethernet1", "dc1-leaf-01", "Ethernet49"),
                expect("dc1-spine-01", "Ethernet2", "dc1-leaf-02", "Ethernet49"),
                expect("dc1-spine-02", "Ethernet1", "dc1-leaf-01", "Ethernet50"),
                expect("dc1-spine-02", "Ethernet2", "dc1-leaf-02", "Ethernet50"),
                expect("dc1-spine-01", "Ethernet32", "dc1-border_leaf-01", "Ethernet49"),
                expect("dc1-spine-02", "Ethernet32", "dc1-border_leaf-01", "Ethernet50"),
            ]
        );
    }

    #[test]
    fn test_oob_kind_mapping() {
        assert_eq!(OobKind::Management.endpoint_kind(), "InterfacePhysical");
        assert_eq!(OobKind::Console.endpoint_kind(), "DcimConsoleInterface");
        assert_eq!(OobKind::Console.source_key(), "console");
    }
}
