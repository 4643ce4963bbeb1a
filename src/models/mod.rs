pub mod catalog;
pub mod topology;

pub use catalog::*;
pub use topology::*;

/// Canonical device role values
pub mod device_role {
    pub const SPINE: &str = "spine";
    pub const LEAF: &str = "leaf";
    pub const BORDER_LEAF: &str = "border_leaf";
    pub const CONSOLE: &str = "console";
    pub const OOB: &str = "oob";
    pub const EDGE: &str = "edge";
    pub const DC_FIREWALL: &str = "dc_firewall";
    pub const EDGE_FIREWALL: &str = "edge_firewall";
    pub const LOAD_BALANCER: &str = "load_balancer";

    pub const FABRIC: &[&str] = &[SPINE, LEAF, BORDER_LEAF];
    pub const ROUTED: &[&str] = &[SPINE, LEAF, BORDER_LEAF, EDGE];

    pub fn is_firewall(role: &str) -> bool {
        role == DC_FIREWALL || role == EDGE_FIREWALL
    }

    pub fn is_fabric(role: &str) -> bool {
        FABRIC.contains(&role)
    }

    pub fn is_routed(role: &str) -> bool {
        ROUTED.contains(&role)
    }

    /// Leaf-like roles that carry customer segments and per-device ASNs
    pub fn is_leaf_like(role: &str) -> bool {
        role == LEAF || role == BORDER_LEAF
    }
}

/// Canonical interface role values
pub mod interface_role {
    pub const MANAGEMENT: &str = "management";
    pub const CONSOLE: &str = "console";
    pub const UPLINK: &str = "uplink";
    pub const LEAF: &str = "leaf";
    pub const CUSTOMER: &str = "customer";
    pub const UNNUMBERED: &str = "unnumbered";
    pub const LOOPBACK: &str = "loopback";
    pub const LOOPBACK_VTEP: &str = "loopback-vtep";
}

/// Underlay routing scenario for a data center fabric
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Scenario {
    Ospf,
    Ebgp,
}

impl Scenario {
    /// Pick the scenario from the explicit field, then the strategy; anything
    /// unrecognised falls back to OSPF.
    pub fn resolve(scenario: Option<&str>, strategy: Option<&str>) -> Self {
        let value = scenario.or(strategy).unwrap_or("ospf").to_lowercase();
        match value.as_str() {
            "ebgp-ibgp" | "ebgp" => Scenario::Ebgp,
            _ => Scenario::Ospf,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Scenario::Ospf => "ospf",
            Scenario::Ebgp => "ebgp",
        }
    }
}
