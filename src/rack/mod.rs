//! Rack elevation diagrams for the service catalog

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::generators::placement::RACK_HEIGHT;
use crate::infrahub::data::str_field;
use crate::models::device_role;
use crate::utils::truncate_name;
use tera::escape_html;

const LABEL_MAX: usize = 18;
const UNIT_PX: u32 = 20;

/// A device as listed in a rack, from the cleaned `DcimDevice` node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RackDevice {
    pub id: String,
    pub name: String,
    pub position: Option<i64>,
    pub height: Option<i64>,
    pub device_type: Option<String>,
    pub role: Option<String>,
}

impl RackDevice {
    pub fn from_node(node: &Value) -> Self {
        Self {
            id: str_field(node, "id").unwrap_or_default().to_string(),
            name: str_field(node, "name").unwrap_or("Unknown Device").to_string(),
            position: node["position"].as_i64(),
            height: node["device_type"]["height"].as_i64().or_else(|| node["height"].as_i64()),
            device_type: str_field(&node["device_type"], "name").map(str::to_string),
            role: str_field(node, "role").map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SpanPosition {
    Single,
    Start,
    Middle,
    End,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RackUnit {
    pub device: RackDevice,
    pub span: u32,
    pub position: SpanPosition,
    pub unit_offset: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelMode {
    Hostname,
    DeviceType,
}

impl LabelMode {
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some("Device Type") => LabelMode::DeviceType,
            _ => LabelMode::Hostname,
        }
    }
}

/// Map every unit `1..=height` to the device occupying it.
///
/// Devices without a positive position are left out, spans are clamped to
/// the top of the rack and the first device to claim a unit keeps it.
pub fn create_rack_unit_map(height: u32, devices: &[RackDevice]) -> BTreeMap<u32, Option<RackUnit>> {
    let mut units: BTreeMap<u32, Option<RackUnit>> = (1..=height).map(|u| (u, None)).collect();

    let mut sorted: Vec<&RackDevice> = devices.iter().collect();
    sorted.sort_by_key(|d| d.position.unwrap_or(0));

    for device in sorted {
        let Some(position) = device.position.filter(|p| *p > 0) else {
            continue;
        };
        let device_height = device.height.filter(|h| *h >= 1).unwrap_or(1);
        let Ok(start) = u32::try_from(position) else {
            continue;
        };
        if start > height {
            continue;
        }
        let end = position.saturating_add(device_height - 1).min(height as i64) as u32;
        let span = end - start + 1;

        for unit in start..=end {
            let Some(slot) = units.get_mut(&unit) else {
                continue;
            };
            if slot.is_some() {
                tracing::debug!("Rack unit U{} already occupied, skipping {}", unit, device.name);
                continue;
            }
            let offset = unit - start;
            let kind = if span == 1 {
                SpanPosition::Single
            } else if offset == 0 {
                SpanPosition::Start
            } else if offset == span - 1 {
                SpanPosition::End
            } else {
                SpanPosition::Middle
            };
            *slot = Some(RackUnit {
                device: device.clone(),
                span,
                position: kind,
                unit_offset: offset,
            });
        }
    }
    units
}

pub fn device_color_class(role: Option<&str>) -> &'static str {
    let Some(role) = role else {
        return "device";
    };
    match role.to_lowercase().as_str() {
        device_role::LEAF => "device device-role-leaf",
        device_role::SPINE => "device device-role-spine",
        device_role::BORDER_LEAF => "device device-role-border-leaf",
        device_role::CONSOLE => "device device-role-console",
        device_role::OOB => "device device-role-oob",
        device_role::EDGE => "device device-role-edge",
        device_role::DC_FIREWALL | device_role::EDGE_FIREWALL => "device device-role-firewall",
        device_role::LOAD_BALANCER => "device device-role-load-balancer",
        _ => "device",
    }
}

fn empty_unit_html(unit: u32) -> String {
    format!(
        "<div class=\"rack-unit rack-unit-empty\">\n    <span class=\"rack-unit-number\">U{}</span>\n</div>",
        unit
    )
}

fn device_html(info: &RackUnit, unit: u32, ui_url: &str, branch: &str, mode: LabelMode) -> String {
    let device = &info.device;
    let device_type = device.device_type.as_deref().filter(|t| !t.is_empty());

    let (primary, secondary) = match (mode, device_type) {
        (LabelMode::DeviceType, Some(device_type)) => (device_type, Some(device.name.as_str())),
        (LabelMode::DeviceType, None) => (device.name.as_str(), Some(device.name.as_str())),
        (LabelMode::Hostname, _) => (device.name.as_str(), device_type),
    };

    let mut content = format!(
        "<div class=\"device-name\">{}</div>",
        escape_html(&truncate_name(primary, LABEL_MAX))
    );
    if info.span > 1 {
        if let Some(secondary) = secondary {
            content.push_str(&format!(
                "<div class=\"device-type-label\">{}</div>",
                escape_html(&truncate_name(secondary, LABEL_MAX))
            ));
        }
    }

    let url = if device.id.is_empty() {
        "#".to_string()
    } else {
        format!("{}/objects/DcimDevice/{}?branch={}", ui_url, device.id, branch)
    };

    format!(
        r#"<div class="rack-unit rack-unit-device" style="height: {height}px;">
    <span class="rack-unit-number">U{unit}</span>
    <a href="{url}" target="_blank" class="device-link">
        <div class="{class}" title="{name} - Click to view in Infrahub">
            {content}
        </div>
    </a>
</div>"#,
        height = info.span * UNIT_PX,
        unit = unit,
        url = escape_html(&url),
        class = device_color_class(device.role.as_deref()),
        name = escape_html(&device.name),
        content = content,
    )
}

/// Unit markup from the top of the rack down
pub fn generate_rack_units_html(
    units: &BTreeMap<u32, Option<RackUnit>>,
    ui_url: &str,
    branch: &str,
    mode: LabelMode,
) -> String {
    units
        .iter()
        .rev()
        .filter_map(|(unit, info)| match info {
            None => Some(empty_unit_html(*unit)),
            Some(info) if matches!(info.position, SpanPosition::Start | SpanPosition::Single) => {
                Some(device_html(info, *unit, ui_url, branch, mode))
            }
            Some(_) => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Full diagram for one rack, styles included
pub fn generate_rack_html(
    rack_name: &str,
    rack_height: Option<u32>,
    devices: &[RackDevice],
    ui_url: &str,
    branch: &str,
    mode: LabelMode,
) -> String {
    let height = rack_height.filter(|h| *h > 0).unwrap_or(RACK_HEIGHT as u32);
    let units = create_rack_unit_map(height, devices);
    format!(
        "<style>\n{}\n</style>\n<div class=\"rack-container\">\n    <div class=\"rack-header\">{}</div>\n    <div class=\"rack-body\">\n{}\n    </div>\n</div>",
        RACK_CSS,
        escape_html(rack_name),
        generate_rack_units_html(&units, ui_url, branch, mode)
    )
}

const RACK_CSS: &str = r#"
    .rack-container {
        border: 2px solid #333;
        border-radius: 4px;
        background-color: #f5f5f5;
        padding: 10px;
        margin: 10px;
        width: 220px;
        display: inline-block;
        vertical-align: top;
    }
    .rack-header {
        font-weight: bold;
        text-align: center;
        padding: 8px;
        background-color: #e0e0e0;
        border-radius: 4px;
        margin-bottom: 10px;
        font-size: 14px;
    }
    .rack-body { display: flex; flex-direction: column; gap: 1px; }
    .rack-unit { position: relative; border: 1px solid #ccc; background-color: white; min-height: 20px; }
    .rack-unit-empty { height: 20px; }
    .rack-unit-device { border: none; padding: 0; background-color: transparent; }
    .rack-unit-number {
        position: absolute;
        left: 2px;
        top: 2px;
        font-size: 9px;
        color: #666;
        font-weight: bold;
        z-index: 10;
    }
    .device-link { display: block; height: 100%; text-decoration: none; color: inherit; }
    .device {
        height: 100%;
        border: 2px solid #a8a8cc;
        padding: 2px 8px;
        text-align: center;
        font-size: 12px;
        overflow: hidden;
        display: flex;
        flex-direction: column;
        justify-content: center;
        align-items: center;
        background-color: #e6e6fa;
        border-radius: 3px;
        box-sizing: border-box;
    }
    .device-name { font-weight: bold; white-space: nowrap; overflow: hidden; text-overflow: ellipsis; width: 100%; }
    .device-type-label { font-size: 9px; white-space: nowrap; overflow: hidden; text-overflow: ellipsis; width: 100%; }
    .device-role-leaf { background-color: #e6e6fa; border-color: #a8a8cc; }
    .device-role-spine { background-color: #aeeeee; border-color: #7cb8b8; }
    .device-role-border-leaf { background-color: #dda0dd; border-color: #b070b0; }
    .device-role-console { background-color: #e8e7ad; border-color: #b8b77d; }
    .device-role-oob { background-color: #e8e7ed; border-color: #b8b7bd; }
    .device-role-edge { background-color: #bf7fbf; border-color: #8f4f8f; }
    .device-role-firewall { background-color: #6a5acd; border-color: #4a3a9d; color: white; }
    .device-role-load-balancer { background-color: #38e7fb; border-color: #08b7cb; }
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn device(name: &str, position: Option<i64>, height: Option<i64>, role: &str) -> RackDevice {
        RackDevice {
            id: format!("id-{}", name),
            name: name.to_string(),
            position,
            height,
            device_type: Some("DCS-7050SX3-48YC8-F".to_string()),
            role: Some(role.to_string()),
        }
    }

    #[test]
    fn test_unit_map_spans() {
        let devices = vec![
            device("spine-01", Some(10), Some(2), "spine"),
            device("leaf-01", Some(42), Some(1), "leaf"),
            device("big", Some(5), Some(3), "edge"),
        ];
        let units = create_rack_unit_map(42, &devices);
        assert_eq!(units.len(), 42);

        let start = units[&10].as_ref().unwrap();
        assert_eq!(start.position, SpanPosition::Start);
        assert_eq!(start.span, 2);
        assert_eq!(units[&11].as_ref().unwrap().position, SpanPosition::End);
        assert_eq!(units[&6].as_ref().unwrap().position, SpanPosition::Middle);
        assert_eq!(units[&6].as_ref().unwrap().unit_offset, 1);
        assert_eq!(units[&42].as_ref().unwrap().position, SpanPosition::Single);
        assert!(units[&12].is_none());
    }

    #[test]
    fn test_unit_map_skips_and_clamps() {
        let devices = vec![
            device("unplaced", None, Some(1), "leaf"),
            device("zero", Some(0), Some(1), "leaf"),
            device("top", Some(41), Some(4), "spine"),
            device("flat", Some(3), Some(0), "oob"),
            device("overlap", Some(41), Some(1), "leaf"),
            device("outside", Some(50), Some(1), "leaf"),
        ];
        let units = create_rack_unit_map(42, &devices);

        let occupied: Vec<&String> = units.values().flatten().map(|u| &u.device.name).collect();
        assert_eq!(occupied.len(), 3);
        // clamped to two units
        assert_eq!(units[&41].as_ref().unwrap().span, 2);
        // first claim wins
        assert_eq!(units[&41].as_ref().unwrap().device.name, "top");
        assert_eq!(units[&3].as_ref().unwrap().position, SpanPosition::Single);
    }

    #[test]
    fn test_unit_map_ignores_out_of_range_positions() {
        let devices = vec![
            device("wrapped", Some(u32::MAX as i64 + 2), Some(1), "leaf"),
            device("tall", Some(40), Some(i64::MAX), "spine"),
        ];
        let units = create_rack_unit_map(42, &devices);

        assert!(units[&1].is_none());
        let tall = units[&40].as_ref().unwrap();
        assert_eq!(tall.device.name, "tall");
        assert_eq!(tall.span, 3);
        assert_eq!(units.values().flatten().count(), 3);
    }

    #[test]
    fn test_labels_are_escaped() {
        let devices = vec![device("leaf<'01'>", Some(1), Some(1), "leaf")];
        let html = generate_rack_html("R&D", Some(1), &devices, "http://ui", "main", LabelMode::Hostname);
        assert!(html.contains("<div class=\"rack-header\">R&amp;D</div>"));
        assert!(html.contains("leaf&lt;&#x27;01&#x27;&gt;"));
        assert!(!html.contains("leaf<'01'>"));
    }

    #[test]
    fn test_color_classes() {
        assert_eq!(device_color_class(Some("border_leaf")), "device device-role-border-leaf");
        assert_eq!(device_color_class(Some("EDGE_FIREWALL")), "device device-role-firewall");
        assert_eq!(device_color_class(Some("storage")), "device");
        assert_eq!(device_color_class(None), "device");
    }

    #[test]
    fn test_rack_html() {
        let devices = vec![
            device("dc1-spine-01-with-long-name", Some(40), Some(2), "spine"),
            device("dc1-leaf-01", Some(1), None, "leaf"),
        ];
        let html = generate_rack_html("DC1-Rack-1", None, &devices, "http://ui", "add-dc1", LabelMode::Hostname);

        assert!(html.starts_with("<style>"));
        assert!(html.contains("<div class=\"rack-header\">DC1-Rack-1</div>"));
        assert!(html.contains("style=\"height: 40px;\""));
        assert!(html.contains("dc1-spine-01-wi..."));
        assert!(html.contains("<div class=\"device-type-label\">DCS-7050SX3-48Y...</div>"));
        assert!(html.contains(
            "href=\"http:&#x2F;&#x2F;ui&#x2F;objects&#x2F;DcimDevice&#x2F;id-dc1-leaf-01?branch=add-dc1\""
        ));
        assert!(html.contains("<span class=\"rack-unit-number\">U42</span>"));
        // U41 belongs to the spine and is not rendered on its own
        assert!(!html.contains(">U41<"));

        let top = html.find(">U42<").unwrap();
        let bottom = html.find(">U1<").unwrap();
        assert!(top < bottom);
    }

    #[test]
    fn test_device_type_labels() {
        let devices = vec![device("dc1-leaf-01", Some(1), Some(1), "leaf")];
        let html = generate_rack_html("R", Some(2), &devices, "http://ui", "main", LabelMode::DeviceType);
        assert!(html.contains("<div class=\"device-name\">DCS-7050SX3-48Y...</div>"));
        assert!(!html.contains("device-type-label\">"));
    }

    #[test]
    fn test_from_node() {
        let node = json!({"id": "d1", "name": "dc1-leaf-01", "position": 40, "role": "leaf",
                          "device_type": {"name": "7050", "height": 2}});
        let device = RackDevice::from_node(&node);
        assert_eq!(device.height, Some(2));
        assert_eq!(device.device_type.as_deref(), Some("7050"));
        assert_eq!(LabelMode::parse(Some("Device Type")), LabelMode::DeviceType);
        assert_eq!(LabelMode::parse(None), LabelMode::Hostname);
    }
}
