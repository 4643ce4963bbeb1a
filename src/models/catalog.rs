use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::infrahub::{attr, rel, rels};

/// Allowed values for the segment form selects
pub mod segment_options {
    pub const ENVIRONMENTS: &[&str] = &["production", "no-production"];
    pub const SEGMENT_TYPES: &[&str] = &["l2_only", "l3_gateway", "l3_vrf"];
    pub const TENANT_ISOLATION: &[&str] = &["customer_dedicated", "shared_controlled", "public_shared"];
}

/// Lowercase a display name and turn spaces into dashes for branch names
pub fn branch_slug(value: &str) -> String {
    value.to_lowercase().replace(' ', "-")
}

// --- Data center ---

/// CreateDataCenterRequest drives the "Create DC" workflow
#[derive(Debug, Clone, Deserialize)]
pub struct CreateDataCenterRequest {
    pub name: String,
    pub location: String,
    #[serde(default)]
    pub location_name: Option<String>,
    #[serde(default)]
    pub description: String,
    pub strategy: String,
    pub design: String,
    #[serde(default)]
    pub emulation: bool,
    pub provider: String,
    pub management_subnet: String,
    pub customer_subnet: String,
    pub technical_subnet: String,
    #[serde(default)]
    pub member_of_groups: Vec<String>,
}

impl CreateDataCenterRequest {
    /// Required-field problems, empty when the request is usable
    pub fn validate(&self) -> Vec<String> {
        let required = [
            (&self.name, "Name is required"),
            (&self.location, "Location is required"),
            (&self.strategy, "Strategy is required"),
            (&self.design, "Design is required"),
            (&self.provider, "Provider is required"),
            (&self.management_subnet, "Management subnet is required"),
            (&self.customer_subnet, "Customer subnet is required"),
            (&self.technical_subnet, "Technical subnet is required"),
        ];
        required
            .iter()
            .filter(|(value, _)| value.trim().is_empty())
            .map(|(_, msg)| msg.to_string())
            .collect()
    }

    pub fn branch_name(&self) -> String {
        format!("add-{}", branch_slug(&self.name))
    }

    pub fn proposed_change_name(&self) -> String {
        format!("Add Data Center: {}", self.name)
    }

    pub fn proposed_change_description(&self) -> String {
        format!(
            "Proposed change to add new data center {} in {}",
            self.name,
            self.location_name.as_deref().unwrap_or(&self.location)
        )
    }

    /// TopologyDataCenterUpsert input
    pub fn to_payload(&self) -> Value {
        json!({
            "name": attr(&self.name),
            "location": rel(&self.location),
            "description": attr(&self.description),
            "strategy": attr(&self.strategy),
            "design": rel(&self.design),
            "emulation": attr(self.emulation),
            "provider": rel(&self.provider),
            "management_subnet": rel(&self.management_subnet),
            "customer_subnet": rel(&self.customer_subnet),
            "technical_subnet": rel(&self.technical_subnet),
            "member_of_groups": rels(&self.member_of_groups),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateDataCenterResponse {
    pub branch: String,
    pub datacenter_id: String,
    pub proposed_change_id: String,
    pub proposed_change_url: String,
}

// --- Network segment ---

/// CreateSegmentRequest drives the "Create VPN" workflow
#[derive(Debug, Clone, Deserialize)]
pub struct CreateSegmentRequest {
    pub customer_name: String,
    #[serde(default = "default_environment")]
    pub environment: String,
    #[serde(default = "default_segment_type")]
    pub segment_type: String,
    #[serde(default = "default_tenant_isolation")]
    pub tenant_isolation: String,
    pub vlan_id: i64,
    pub deployment: String,
    #[serde(default)]
    pub deployment_name: Option<String>,
    pub owner: String,
    #[serde(default)]
    pub external_routing: bool,
    #[serde(default)]
    pub prefix: Option<String>,
}

fn default_environment() -> String { "production".to_string() }
fn default_segment_type() -> String { "l2_only".to_string() }
fn default_tenant_isolation() -> String { "customer_dedicated".to_string() }

impl CreateSegmentRequest {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.customer_name.trim().is_empty() {
            errors.push("Customer name is required".to_string());
        }
        if self.deployment.trim().is_empty() {
            errors.push("Deployment is required".to_string());
        }
        if self.owner.trim().is_empty() {
            errors.push("Owner is required".to_string());
        }
        if !(1..=4094).contains(&self.vlan_id) {
            errors.push(format!("VLAN ID must be between 1 and 4094, got {}", self.vlan_id));
        }
        if !segment_options::ENVIRONMENTS.contains(&self.environment.as_str()) {
            errors.push(format!("Invalid environment: {}", self.environment));
        }
        if !segment_options::SEGMENT_TYPES.contains(&self.segment_type.as_str()) {
            errors.push(format!("Invalid segment type: {}", self.segment_type));
        }
        if !segment_options::TENANT_ISOLATION.contains(&self.tenant_isolation.as_str()) {
            errors.push(format!("Invalid tenant isolation: {}", self.tenant_isolation));
        }
        errors
    }

    fn deployment_label(&self) -> &str {
        self.deployment_name.as_deref().unwrap_or(&self.deployment)
    }

    pub fn branch_name(&self) -> String {
        format!(
            "add-segment-{}-{}",
            branch_slug(self.deployment_label()),
            branch_slug(&self.customer_name)
        )
    }

    pub fn proposed_change_name(&self) -> String {
        format!("Add Network Segment: {} in {}", self.customer_name, self.deployment_label())
    }

    pub fn proposed_change_description(&self) -> String {
        format!(
            "Proposed change to add new network segment '{}' in deployment '{}'",
            self.customer_name,
            self.deployment_label()
        )
    }

    /// ServiceNetworkSegmentCreate input
    pub fn to_payload(&self) -> Value {
        let mut payload = json!({
            "customer_name": attr(&self.customer_name),
            "environment": attr(&self.environment),
            "segment_type": attr(&self.segment_type),
            "tenant_isolation": attr(&self.tenant_isolation),
            "vlan_id": attr(self.vlan_id),
            "deployment": rel(&self.deployment),
            "owner": rel(&self.owner),
            "external_routing": attr(self.external_routing),
        });
        if let Some(prefix) = self.prefix.as_deref().filter(|p| !p.is_empty()) {
            payload["prefix"] = rel(prefix);
        }
        payload
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateSegmentResponse {
    pub branch: String,
    pub segment_id: String,
    pub proposed_change_id: String,
    pub proposed_change_url: String,
}

// --- Dashboard rows ---

#[derive(Debug, Clone, Serialize)]
pub struct DataCenterRow {
    pub id: String,
    pub name: String,
    pub location: String,
    pub description: String,
    pub strategy: String,
    pub design: String,
    pub link: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ColocationRow {
    pub id: String,
    pub name: String,
    pub location: String,
    pub description: String,
    pub provider: String,
    pub link: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProposedChangeRow {
    pub id: String,
    pub name: String,
    pub state: String,
    pub source_branch: String,
    pub destination_branch: String,
    pub link: String,
}

/// Minimal `{id, name}` option for form selects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedOption {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub connected: bool,
    pub address: String,
    pub ui_url: String,
    pub branch: String,
}

/// Object link in the Infrahub UI
pub fn object_url(ui_url: &str, kind: &str, id: &str, branch: &str) -> String {
    format!("{}/objects/{}/{}?branch={}", ui_url.trim_end_matches('/'), kind, id, branch)
}

pub fn proposed_change_url(ui_url: &str, id: &str) -> String {
    format!("{}/proposed-changes/{}", ui_url.trim_end_matches('/'), id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment_request() -> CreateSegmentRequest {
        serde_json::from_value(json!({
            "customer_name": "Acme Corp",
            "vlan_id": 120,
            "deployment": "dep1",
            "deployment_name": "DC Paris",
            "owner": "org1",
        }))
        .unwrap()
    }

    #[test]
    fn test_segment_defaults_and_branch() {
        let req = segment_request();
        assert_eq!(req.environment, "production");
        assert_eq!(req.segment_type, "l2_only");
        assert_eq!(req.tenant_isolation, "customer_dedicated");
        assert!(req.validate().is_empty());
        assert_eq!(req.branch_name(), "add-segment-dc-paris-acme-corp");
        assert_eq!(req.proposed_change_name(), "Add Network Segment: Acme Corp in DC Paris");
    }

    #[test]
    fn test_segment_vlan_bounds() {
        let mut req = segment_request();
        req.vlan_id = 0;
        assert_eq!(req.validate().len(), 1);
        req.vlan_id = 4095;
        assert!(req.validate()[0].contains("4095"));
        req.vlan_id = 4094;
        assert!(req.validate().is_empty());
    }

    #[test]
    fn test_segment_payload_prefix_optional() {
        let mut req = segment_request();
        let payload = req.to_payload();
        assert!(payload.get("prefix").is_none());
        assert_eq!(payload["vlan_id"], json!({"value": 120}));

        req.prefix = Some("pfx1".to_string());
        assert_eq!(req.to_payload()["prefix"], json!({"id": "pfx1"}));
    }

    #[test]
    fn test_datacenter_validation() {
        let req: CreateDataCenterRequest = serde_json::from_value(json!({
            "name": "DC 3",
            "location": "loc1",
            "strategy": "ospf-ibgp",
            "design": "",
            "provider": "prov1",
            "management_subnet": "p1",
            "customer_subnet": "p2",
            "technical_subnet": "p3",
        }))
        .unwrap();
        assert_eq!(req.validate(), vec!["Design is required".to_string()]);
        assert_eq!(req.branch_name(), "add-dc-3");
        assert_eq!(req.to_payload()["member_of_groups"], json!([]));
        assert_eq!(req.to_payload()["emulation"], json!({"value": false}));
    }

    #[test]
    fn test_urls() {
        assert_eq!(
            object_url("http://ui:8000/", "TopologyDataCenter", "abc", "main"),
            "http://ui:8000/objects/TopologyDataCenter/abc?branch=main"
        );
        assert_eq!(proposed_change_url("http://ui", "pc1"), "http://ui/proposed-changes/pc1");
    }
}
