use anyhow::Result;
use serde::Serialize;
use serde_json::Value;

use crate::infrahub::data::{list_field, str_field};
use crate::infrahub::get_data;

/// Result of a device check: errors fail it, warnings are informational
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CheckReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl CheckReport {
    pub fn passed(&self) -> bool {
        self.errors.is_empty()
    }

    fn log(&self, device: &str) {
        for warning in &self.warnings {
            tracing::info!("WARNING: {} ({})", warning, device);
        }
        for error in &self.errors {
            tracing::error!("{} ({})", error, device);
        }
    }
}

/// Every device needs interfaces, and loopbacks need an address
pub fn validate_interfaces(device: &Value) -> Vec<String> {
    let interfaces = list_field(device, "interfaces");
    let mut errors = Vec::new();
    if interfaces.is_empty() {
        errors.push("Device has no interfaces configured".to_string());
    }
    for iface in interfaces {
        if str_field(iface, "role") == Some("loopback") && list_field(iface, "ip_addresses").is_empty() {
            errors.push(format!(
                "Loopback interface {} is missing IP address",
                str_field(iface, "name").unwrap_or("unknown")
            ));
        }
    }
    errors
}

/// Validate a leaf from the raw `leaf_config` query result
pub fn check_leaf(data: &Value) -> Result<CheckReport> {
    let device = get_data(data)?;
    let mut report = CheckReport {
        errors: validate_interfaces(&device),
        ..Default::default()
    };

    let services = list_field(&device, "device_services");
    if services.is_empty() {
        report.warnings.push("No services configured on this device".to_string());
    } else {
        let bgp = services
            .iter()
            .filter(|s| str_field(s, "typename") == Some("ServiceBGP"))
            .count();
        if bgp == 1 {
            report
                .warnings
                .push("BGP redundancy not configured - only 1 BGP service found".to_string());
        }
    }

    report.log(str_field(&device, "name").unwrap_or("unknown"));
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn device(interfaces: Value, services: Value) -> Value {
        json!({"DcimDevice": {"edges": [{"node": {
            "name": {"value": "dc1-leaf-01"},
            "interfaces": {"edges": interfaces},
            "device_services": services,
        }}]}})
    }

    #[test]
    fn test_healthy_leaf() {
        let data = device(
            json!([{"node": {"name": {"value": "loopback0"}, "role": {"value": "loopback"},
                             "ip_addresses": {"edges": [{"node": {"address": {"value": "10.0.0.1/32"}}}]}}}]),
            json!({"edges": [
                {"node": {"__typename": "ServiceBGP"}},
                {"node": {"__typename": "ServiceBGP"}},
            ]}),
        );
        let report = check_leaf(&data).unwrap();
        assert!(report.passed());
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_loopback_without_address() {
        let data = device(
            json!([{"node": {"name": {"value": "loopback0"}, "role": {"value": "loopback"}, "ip_addresses": {"edges": []}}}]),
            json!({"edges": [{"node": {"__typename": "ServiceBGP"}}]}),
        );
        let report = check_leaf(&data).unwrap();
        assert!(!report.passed());
        assert_eq!(report.errors, vec!["Loopback interface loopback0 is missing IP address"]);
        assert_eq!(report.warnings, vec!["BGP redundancy not configured - only 1 BGP service found"]);
    }

    #[test]
    fn test_no_interfaces_no_services() {
        let report = check_leaf(&device(json!([]), Value::Null)).unwrap();
        assert_eq!(report.errors, vec!["Device has no interfaces configured"]);
        assert_eq!(report.warnings, vec!["No services configured on this device"]);
    }
}
