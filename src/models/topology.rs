use serde::{Deserialize, Serialize};

/// Declarative topology design as returned (cleaned) by the
/// TopologyDataCenter / TopologyColocationCenter queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topology {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub strategy: Option<String>,
    #[serde(default)]
    pub scenario: Option<String>,
    #[serde(default)]
    pub location: Option<LocationRef>,
    #[serde(default)]
    pub provider: Option<NodeRef>,
    #[serde(default)]
    pub management_subnet: Option<PrefixRef>,
    #[serde(default)]
    pub technical_subnet: Option<PrefixRef>,
    #[serde(default)]
    pub customer_subnet: Option<PrefixRef>,
    #[serde(default)]
    pub design: Option<Design>,
}

impl Topology {
    pub fn elements(&self) -> &[DesignElement] {
        self.design
            .as_ref()
            .map(|d| d.elements.as_slice())
            .unwrap_or(&[])
    }

    pub fn provider_id(&self) -> Option<&str> {
        self.provider.as_ref().map(|p| p.id.as_str())
    }

    /// Total quantity of devices with the given role across all elements
    pub fn quantity_of(&self, role: &str) -> u32 {
        self.elements()
            .iter()
            .filter(|e| e.role == role)
            .map(|e| e.quantity)
            .sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationRef {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub shortname: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRef {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrefixRef {
    pub id: String,
    #[serde(default)]
    pub prefix: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Design {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub elements: Vec<DesignElement>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DesignElement {
    pub quantity: u32,
    pub role: String,
    pub device_type: DeviceTypeRef,
    pub template: TemplateRef,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceTypeRef {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub manufacturer: Option<NamedRef>,
    #[serde(default)]
    pub platform: Option<NodeRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedRef {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateRef {
    #[serde(default)]
    pub id: Option<String>,
    pub template_name: String,
    #[serde(default)]
    pub typename: String,
    #[serde(default)]
    pub interfaces: Vec<TemplateInterface>,
}

/// Interface declared on a device template; `name` may carry a range like `Ethernet[1-48]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateInterface {
    pub name: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub port: Option<u32>,
    #[serde(default)]
    pub speed: Option<u32>,
}

impl TemplateInterface {
    pub fn has_role(&self, role: &str) -> bool {
        self.role.as_deref() == Some(role)
    }
}
