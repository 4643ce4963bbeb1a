use std::collections::BTreeMap;

use super::creator::DeviceRecord;
use crate::models::device_role;
use crate::utils::device_number;

pub const RACK_HEIGHT: i64 = 42;

/// Where one device lands: rack number (1-based) and top U position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RackPlacement {
    pub device: String,
    pub rack: u32,
    pub position: i64,
    pub height: i64,
}

/// Spread a fabric across a row of racks.
///
/// One leaf per rack, matched by the leaf's trailing number. Spines, border
/// leafs, console and OOB devices share the racks in the middle of the row,
/// each role walking those racks from the first one and stacking below what
/// is already mounted there.
pub fn plan_rack_assignment(devices: &[DeviceRecord], total_racks: u32) -> Vec<RackPlacement> {
    if total_racks == 0 {
        return Vec::new();
    }

    let leafs = with_role(devices, |r| r == device_role::LEAF);
    let border_leafs = with_role(devices, |r| r == device_role::BORDER_LEAF);
    let spines = with_role(devices, |r| r == device_role::SPINE);
    let consoles = with_role(devices, |r| r.to_lowercase().contains(device_role::CONSOLE));
    let oobs = with_role(devices, |r| r.to_lowercase().contains(device_role::OOB));

    let middle_count = spines
        .len()
        .max(border_leafs.len() + consoles.len() + oobs.len()) as u32;
    let middle_start = (total_racks / 2).saturating_sub(middle_count / 2);
    let middle_racks: Vec<u32> = (middle_start + 1..=middle_start + middle_count)
        .filter(|rack| *rack <= total_racks)
        .collect();

    let mut occupancy: BTreeMap<u32, Vec<RackPlacement>> = BTreeMap::new();

    for device in &leafs {
        let height = device_height(device);
        match device_number(&device.name) {
            Some(rack) if rack >= 1 && rack <= total_racks => {
                occupancy.entry(rack).or_default().push(RackPlacement {
                    device: device.name.clone(),
                    rack,
                    position: RACK_HEIGHT - (height - 1),
                    height,
                });
            }
            Some(number) => {
                tracing::warn!(
                    "Device {} number ({}) exceeds rack count ({}), skipping",
                    device.name,
                    number,
                    total_racks
                );
            }
            None => {
                tracing::warn!("Device {} has no trailing number, skipping", device.name);
            }
        }
    }

    let stacked = [
        (&border_leafs, "border leaf"),
        (&spines, "spine"),
        (&consoles, "console device"),
        (&oobs, "OOB device"),
    ];
    for (group, label) in stacked {
        for (idx, device) in group.iter().enumerate() {
            let Some(&rack) = middle_racks.get(idx) else {
                tracing::warn!("Not enough middle racks for {} {}", label, device.name);
                break;
            };
            let height = device_height(device);
            let slot = occupancy.entry(rack).or_default();
            let position = match slot.iter().map(|p| p.position).min() {
                Some(lowest) => lowest - height,
                None => RACK_HEIGHT - (height - 1),
            };
            slot.push(RackPlacement {
                device: device.name.clone(),
                rack,
                position,
                height,
            });
        }
    }

    occupancy.into_values().flatten().collect()
}

fn with_role(devices: &[DeviceRecord], pred: impl Fn(&str) -> bool) -> Vec<&DeviceRecord> {
    devices.iter().filter(|d| pred(&d.role)).collect()
}

fn device_height(device: &DeviceRecord) -> i64 {
    i64::from(device.height.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(name: &str, role: &str, height: u32) -> DeviceRecord {
        DeviceRecord {
            id: format!("id-{}", name),
            name: name.to_string(),
            role: role.to_string(),
            template: "tpl".to_string(),
            height,
            kind: "DcimDevice",
        }
    }

    fn position_of<'a>(plan: &'a [RackPlacement], name: &str) -> Option<&'a RackPlacement> {
        plan.iter().find(|p| p.device == name)
    }

    #[test]
    fn test_four_leaf_layout() {
        let devices = vec![
            device("dc1-spine-01", "spine", 2),
            device("dc1-spine-02", "spine", 2),
            device("dc1-leaf-01", "leaf", 1),
            device("dc1-leaf-02", "leaf", 1),
            device("dc1-leaf-03", "leaf", 1),
            device("dc1-leaf-04", "leaf", 1),
            device("dc1-console-01", "console", 1),
            device("dc1-oob-01", "oob", 1),
        ];
        let plan = plan_rack_assignment(&devices, 4);

        // middle_count = max(2, 0 + 1 + 1) = 2, middle_start = 2 - 1 = 1 -> racks 2, 3
        assert_eq!(position_of(&plan, "dc1-leaf-01").map(|p| (p.rack, p.position)), Some((1, 42)));
        assert_eq!(position_of(&plan, "dc1-spine-01").map(|p| (p.rack, p.position)), Some((2, 40)));
        assert_eq!(position_of(&plan, "dc1-spine-02").map(|p| (p.rack, p.position)), Some((3, 40)));
        assert_eq!(position_of(&plan, "dc1-console-01").map(|p| (p.rack, p.position)), Some((2, 39)));
        assert_eq!(position_of(&plan, "dc1-oob-01").map(|p| (p.rack, p.position)), Some((2, 38)));
        assert_eq!(plan.len(), 8);

        // ordered by rack number
        let racks: Vec<u32> = plan.iter().map(|p| p.rack).collect();
        let mut sorted = racks.clone();
        sorted.sort();
        assert_eq!(racks, sorted);
    }

    #[test]
    fn test_leaf_beyond_rack_count_is_skipped() {
        let devices = vec![device("dc1-leaf-01", "leaf", 1), device("dc1-leaf-07", "leaf", 1)];
        let plan = plan_rack_assignment(&devices, 2);
        assert!(position_of(&plan, "dc1-leaf-07").is_none());
        assert_eq!(plan.len(), 1);
    }

    #[test]
    fn test_zero_racks() {
        let devices = vec![device("dc1-spine-01", "spine", 1)];
        assert!(plan_rack_assignment(&devices, 0).is_empty());
    }

    #[test]
    fn test_out_of_middle_racks_stops_role() {
        let devices = vec![
            device("dc1-leaf-01", "leaf", 1),
            device("dc1-spine-01", "spine", 1),
            device("dc1-spine-02", "spine", 1),
            device("dc1-spine-03", "spine", 1),
        ];
        // middle_count = 3 but only one rack exists
        let plan = plan_rack_assignment(&devices, 1);
        assert_eq!(position_of(&plan, "dc1-spine-01").map(|p| (p.rack, p.position)), Some((1, 41)));
        assert!(position_of(&plan, "dc1-spine-02").is_none());
        assert!(position_of(&plan, "dc1-spine-03").is_none());
    }

    #[test]
    fn test_zero_height_counts_as_one() {
        let devices = vec![device("dc1-leaf-01", "leaf", 0)];
        let plan = plan_rack_assignment(&devices, 1);
        assert_eq!(plan[0].position, 42);
        assert_eq!(plan[0].height, 1);
    }
}
