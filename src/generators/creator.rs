use anyhow::{anyhow, Result};
use ipnet::IpNet;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::{BTreeSet, HashMap};

use crate::infrahub::{attr, list_nodes, rel, rels, CreatedNode, InfrahubApi, InfrahubError};
use crate::models::{device_role, PrefixRef, TemplateInterface, Topology};
use crate::utils::expand_interface_range;

use super::cabling::{plan_oob_connections, Connection, OobKind};
use super::placement::plan_rack_assignment;

// --- Local store keys ---

pub const MANAGEMENT_POOL: &str = "management_ip_pool";
pub const LOOPBACK_POOL: &str = "loopback_ip_pool";
pub const VTEP_POOL: &str = "loopback-vtep_ip_pool";

const FIREWALL_GROUP: &str = "juniper_firewall";

/// Device created by this run
#[derive(Debug, Clone)]
pub struct DeviceRecord {
    pub id: String,
    pub name: String,
    pub role: String,
    pub template: String,
    pub height: u32,
    pub kind: &'static str,
}

/// Interface created (or re-roled) by this run
#[derive(Debug, Clone)]
pub struct InterfaceRecord {
    pub name: String,
    pub role: Option<String>,
    pub id: String,
    pub kind: &'static str,
    pub ip_ids: Vec<String>,
}

impl InterfaceRecord {
    pub fn has_role(&self, role: &str) -> bool {
        self.role.as_deref() == Some(role)
    }
}

/// Prefix backing one IP address pool
#[derive(Debug, Clone)]
pub struct PoolSubnet {
    pub pool_type: String,
    pub prefix_id: String,
}

impl PoolSubnet {
    pub fn new(pool_type: &str, prefix_id: &str) -> Self {
        Self {
            pool_type: pool_type.to_string(),
            prefix_id: prefix_id.to_string(),
        }
    }
}

/// Counters for what a generator run did
#[derive(Debug, Default, Clone, Serialize)]
pub struct CreationSummary {
    pub site: String,
    pub objects: usize,
    pub devices: usize,
    pub cables: usize,
    pub sessions: usize,
    pub failed: Vec<String>,
}

/// Builds a topology in Infrahub from its design document.
///
/// Every object it saves is kept in a local ledger keyed like the generator
/// keys them (`{site}-Row-1`, `{device}-loopback0`, ...) so later steps can
/// reference earlier ones without querying the branch again.
pub struct TopologyCreator<'a> {
    api: &'a dyn InfrahubApi,
    branch: String,
    topology: Topology,
    templates: HashMap<String, Vec<TemplateInterface>>,
    groups: HashMap<String, String>,
    store: HashMap<String, CreatedNode>,
    devices: Vec<DeviceRecord>,
    interfaces: HashMap<String, Vec<InterfaceRecord>>,
    summary: CreationSummary,
}

impl<'a> TopologyCreator<'a> {
    pub fn new(api: &'a dyn InfrahubApi, branch: &str, topology: Topology) -> Self {
        let summary = CreationSummary {
            site: topology.name.clone(),
            ..Default::default()
        };
        Self {
            api,
            branch: branch.to_string(),
            topology,
            templates: HashMap::new(),
            groups: HashMap::new(),
            store: HashMap::new(),
            devices: Vec::new(),
            interfaces: HashMap::new(),
            summary,
        }
    }

    pub fn site_name(&self) -> &str {
        &self.topology.name
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn devices(&self) -> &[DeviceRecord] {
        &self.devices
    }

    pub fn templates(&self) -> &HashMap<String, Vec<TemplateInterface>> {
        &self.templates
    }

    pub fn interfaces_of(&self, device: &str) -> &[InterfaceRecord] {
        self.interfaces.get(device).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn summary(&self) -> &CreationSummary {
        &self.summary
    }

    pub fn into_summary(self) -> CreationSummary {
        self.summary
    }

    pub(crate) fn api(&self) -> &'a dyn InfrahubApi {
        self.api
    }

    pub(crate) fn store_get(&self, key: &str) -> Result<&CreatedNode> {
        self.store
            .get(key)
            .ok_or_else(|| anyhow!("{} not found in local store on branch {}", key, self.branch))
    }

    pub(crate) fn store_id(&self, key: &str) -> Option<&str> {
        self.store.get(key).map(|n| n.id.as_str())
    }

    /// Owner relationship shared by routing objects
    pub(crate) fn owner(&self) -> Value {
        self.topology.provider_id().map(rel).unwrap_or(Value::Null)
    }

    /// First IP id on one of this run's virtual interfaces
    pub(crate) fn loopback_ip_id(&self, device: &str, loopback: &str) -> Result<&str> {
        self.interfaces_of(device)
            .iter()
            .find(|i| i.kind == "InterfaceVirtual" && i.name == loopback)
            .and_then(|i| i.ip_ids.first())
            .map(String::as_str)
            .ok_or_else(|| anyhow!("{} has no {} address", device, loopback))
    }

    pub(crate) fn record_session(&mut self) {
        self.summary.sessions += 1;
    }

    // --- Save helpers ---

    /// Upsert one object; failures abort the step
    pub(crate) async fn upsert_node(&mut self, kind: &str, payload: Value, store_key: Option<&str>) -> Result<CreatedNode> {
        match self.api.upsert(kind, payload).await {
            Ok(node) => {
                self.log_created(kind, &node);
                self.summary.objects += 1;
                if let Some(key) = store_key {
                    self.store.insert(key.to_string(), node.clone());
                    tracing::debug!("- Stored {} in store with key='{}' on branch='{}'", kind, key, self.branch);
                }
                Ok(node)
            }
            Err(e) => {
                tracing::error!("- Creation failed for {}: {}", kind, e);
                Err(e)
            }
        }
    }

    /// Upsert a batch concurrently; failed items are logged and skipped.
    /// The result lines up with `items`.
    pub(crate) async fn upsert_many(&mut self, kind: &str, items: Vec<(Value, Option<String>)>) -> Vec<Option<CreatedNode>> {
        self.upsert_batch(kind, items, None).await
    }

    /// Same as `upsert_many`, with a note appended to each creation log line
    pub(crate) async fn upsert_batch(
        &mut self,
        kind: &str,
        items: Vec<(Value, Option<String>)>,
        note: Option<&str>,
    ) -> Vec<Option<CreatedNode>> {
        let api = self.api;
        let results = futures::future::join_all(
            items.iter().map(|(payload, _)| api.upsert(kind, payload.clone())),
        )
        .await;

        let mut created = Vec::with_capacity(items.len());
        for ((_, key), result) in items.into_iter().zip(results) {
            match result {
                Ok(node) => {
                    match note {
                        Some(note) => tracing::info!(
                            "- Created [{}] {} ({})",
                            kind,
                            node.display_label.as_deref().unwrap_or(&node.id),
                            note
                        ),
                        None => self.log_created(kind, &node),
                    }
                    self.summary.objects += 1;
                    if let Some(key) = key {
                        self.store.insert(key, node.clone());
                    }
                    created.push(Some(node));
                }
                Err(e) => {
                    tracing::warn!("- Creation failed for {}: {}", kind, e);
                    self.summary.failed.push(format!("{}: {}", kind, e));
                    created.push(None);
                }
            }
        }
        created
    }

    fn log_created(&self, kind: &str, node: &CreatedNode) {
        match &node.display_label {
            Some(label) => tracing::info!("- Created [{}] {}", kind, label),
            None => tracing::info!("- Created [{}]", kind),
        }
    }

    // --- Data loading ---

    /// Expand template interface ranges and resolve the device groups
    pub async fn load_data(&mut self) -> Result<()> {
        for element in self.topology.elements() {
            let expanded: Vec<TemplateInterface> = element
                .template
                .interfaces
                .iter()
                .flat_map(|iface| {
                    expand_interface_range(&iface.name)
                        .into_iter()
                        .map(move |name| TemplateInterface { name, ..iface.clone() })
                })
                .collect();
            self.templates.insert(element.template.template_name.clone(), expanded);
        }

        let mut names: BTreeSet<String> = BTreeSet::new();
        for element in self.topology.elements() {
            names.insert(format!("{}s", element.role));
            if let Some(manufacturer) = &element.device_type.manufacturer {
                names.insert(format!(
                    "{}_{}",
                    manufacturer.name.to_lowercase().replace(' ', "_"),
                    element.role
                ));
            }
            if device_role::is_firewall(&element.role) {
                names.insert(FIREWALL_GROUP.to_string());
            }
        }

        let query = r#"
            query Groups($names: [String]) {
                CoreStandardGroup(name__values: $names) {
                    edges { node { id name { value } } }
                }
            }"#;
        let groups = list_nodes(self.api, query, json!({ "names": names }), "CoreStandardGroup").await?;
        for group in groups {
            if let (Some(id), Some(name)) = (group["id"].as_str(), group["name"].as_str()) {
                self.groups.insert(name.to_string(), id.to_string());
            }
        }
        tracing::info!("Loaded {} templates and {} groups for {}", self.templates.len(), self.groups.len(), self.site_name());
        Ok(())
    }

    /// Prefix string of a subnet reference, fetched when the query did not include it
    pub async fn resolve_prefix(&self, subnet: &PrefixRef) -> Result<String> {
        if let Some(prefix) = &subnet.prefix {
            return Ok(prefix.clone());
        }
        let query = r#"
            query Prefix($id: ID!) {
                IpamPrefix(ids: [$id]) { edges { node { id prefix { value } } } }
            }"#;
        let nodes = list_nodes(self.api, query, json!({ "id": subnet.id }), "IpamPrefix").await?;
        nodes
            .first()
            .and_then(|n| n["prefix"].as_str())
            .map(str::to_string)
            .ok_or_else(|| InfrahubError::not_found("IpamPrefix", &subnet.id).into())
    }

    // --- Locations ---

    pub async fn create_site(&mut self) -> Result<()> {
        let site = self.site_name().to_string();
        tracing::info!("Create site {}", site);

        let location = self
            .topology
            .location
            .as_ref()
            .ok_or_else(|| anyhow!("No location found in topology data for {}", site))?;
        let parent = location
            .id
            .clone()
            .ok_or_else(|| anyhow!("Location has no ID in topology data for {}", site))?;

        tracing::info!("Creating LocationBuilding '{}' with parent location ID: {}", site, parent);
        let payload = json!({
            "name": attr(&site),
            "shortname": attr(&site),
            "parent": rel(&parent),
        });
        self.upsert_node("LocationBuilding", payload, Some(&site)).await?;
        Ok(())
    }

    /// Pod-1 under the building, Row-1 under the pod
    pub async fn create_location_hierarchy(&mut self) -> Result<()> {
        let site = self.site_name().to_string();
        tracing::info!("Creating location hierarchy for {}", site);

        let building = self.store_get(&site)?.id.clone();
        let pod_key = format!("{}-Pod-1", site);
        let pod = self
            .upsert_node(
                "LocationPod",
                json!({ "name": attr("Pod-1"), "shortname": attr("Pod-1"), "parent": rel(&building) }),
                Some(&pod_key),
            )
            .await?;

        let row_key = format!("{}-Row-1", site);
        self.upsert_node(
            "LocationRow",
            json!({ "name": attr("Row-1"), "shortname": attr("Row-1"), "parent": rel(&pod.id) }),
            Some(&row_key),
        )
        .await?;
        Ok(())
    }

    /// One rack per leaf
    pub async fn create_racks(&mut self) -> Result<()> {
        let site = self.site_name().to_string();
        let num_leafs = self.topology.quantity_of(device_role::LEAF);
        tracing::info!("Creating {} racks for {}", num_leafs, site);

        let row = self.store_get(&format!("{}-Row-1", site))?.id.clone();
        let items = (1..=num_leafs)
            .map(|i| {
                let rack_name = format!("{}-Rack-{}", site, i);
                let payload = json!({
                    "name": attr(&rack_name),
                    "shortname": attr(&rack_name),
                    "parent": rel(&row),
                });
                (payload, Some(rack_name))
            })
            .collect();
        self.upsert_many("LocationRack", items).await;
        Ok(())
    }

    // --- Pools ---

    pub async fn create_address_pools(&mut self, subnets: &[PoolSubnet]) -> Result<()> {
        tracing::info!("Creating address pools");
        let site = self.site_name().to_string();
        let items = subnets
            .iter()
            .map(|pool| {
                let payload = json!({
                    "name": attr(format!("{}-{}-pool", site, pool.pool_type)),
                    "default_address_type": attr("IpamIPAddress"),
                    "description": attr(format!("{} IP Pool", pool.pool_type)),
                    "ip_namespace": { "hfid": ["default"] },
                    "resources": rels([pool.prefix_id.as_str()]),
                });
                (payload, Some(format!("{}_ip_pool", pool.pool_type.to_lowercase())))
            })
            .collect();
        self.upsert_many("CoreIPAddressPool", items).await;
        Ok(())
    }

    /// Split the technical subnet in two halves: underlay loopbacks and VTEP loopbacks
    pub async fn split_technical_subnet(&mut self, prefix: &str) -> Result<(CreatedNode, CreatedNode)> {
        let (underlay, vtep) = split_in_halves(prefix)?;
        let site = self.site_name().to_string();

        tracing::info!("Splitting {} into:", prefix);
        tracing::info!("  - Underlay: {}", underlay);
        tracing::info!("  - VTEP: {}", vtep);

        let underlay_node = self
            .upsert_node(
                "IpamPrefix",
                json!({
                    "prefix": attr(underlay.to_string()),
                    "status": attr("active"),
                    "role": attr("loopback"),
                    "description": attr(format!("{} Underlay Loopback Subnet", site)),
                }),
                None,
            )
            .await?;
        let vtep_node = self
            .upsert_node(
                "IpamPrefix",
                json!({
                    "prefix": attr(vtep.to_string()),
                    "status": attr("active"),
                    "role": attr("loopback-vtep"),
                    "description": attr(format!("{} VTEP Loopback Subnet", site)),
                }),
                None,
            )
            .await?;
        Ok((underlay_node, vtep_node))
    }

    pub async fn create_split_loopback_pools(&mut self, prefix: &str) -> Result<()> {
        tracing::info!("Creating split loopback pools for underlay and VTEP");
        let (underlay, vtep) = self.split_technical_subnet(prefix).await?;
        self.create_address_pools(&[
            PoolSubnet::new("Loopback", &underlay.id),
            PoolSubnet::new("Loopback-VTEP", &vtep.id),
        ])
        .await
    }

    /// VLAN id pool consumed by network segments
    pub async fn create_l2_pool(&mut self) -> Result<()> {
        let site = self.site_name().to_string();
        let payload = json!({
            "name": attr(format!("{}-VLAN-POOL", site)),
            "description": attr(format!("{} VLAN Number Pool", site)),
            "node": attr("ServiceNetworkSegment"),
            "node_attribute": attr("vlan_id"),
            "start_range": attr(100),
            "end_range": attr(4000),
        });
        self.upsert_node("CoreNumberPool", payload, None).await?;
        Ok(())
    }

    // --- Devices ---

    pub async fn create_devices(&mut self) -> Result<()> {
        let site = self.site_name().to_string();
        tracing::info!("Create devices for {}", site);

        let building = self.store_get(&site)?.id.clone();
        let management_pool = self.store_get(MANAGEMENT_POOL)?.id.clone();
        let topology_id = self.topology.id.clone();

        let mut role_counters: HashMap<String, u32> = HashMap::new();
        let mut physical = Vec::new();
        let mut virtual_devices = Vec::new();
        let mut firewalls = Vec::new();

        for element in self.topology.elements().to_vec() {
            let role = element.role.clone();
            let group_name = if device_role::is_firewall(&role) {
                FIREWALL_GROUP.to_string()
            } else {
                format!("{}s", role)
            };
            let group_id = self
                .groups
                .get(&group_name)
                .cloned()
                .ok_or_else(|| InfrahubError::not_found("CoreStandardGroup", &group_name))?;

            for _ in 0..element.quantity {
                let counter = role_counters.entry(role.clone()).or_insert(0);
                *counter += 1;
                let name = format!("{}-{}-{:02}", site.to_lowercase(), role, counter);

                let address = self
                    .api
                    .allocate_ip(
                        &management_pool,
                        &format!("{}-management", name),
                        &format!("{} Management IP", name),
                    )
                    .await?;

                let mut payload = json!({
                    "name": attr(&name),
                    "device_type": rel(&element.device_type.id),
                    "status": attr("active"),
                    "role": attr(&role),
                    "location": rel(&building),
                    "member_of_groups": rels([group_id.as_str()]),
                    "primary_address": rel(&address.id),
                });
                if let Some(platform) = &element.device_type.platform {
                    payload["platform"] = rel(&platform.id);
                }
                if let Some(id) = &topology_id {
                    payload["topology"] = rel(id);
                }

                let kind = if element.template.typename.contains("Virtual") {
                    "DcimVirtualDevice"
                } else if device_role::is_firewall(&role) {
                    "SecurityFirewall"
                } else {
                    "DcimDevice"
                };
                let record = DeviceRecord {
                    id: String::new(),
                    name: name.clone(),
                    role: role.clone(),
                    template: element.template.template_name.clone(),
                    height: element.device_type.height.unwrap_or(1),
                    kind,
                };
                let entry = (record, payload);
                match kind {
                    "DcimVirtualDevice" => virtual_devices.push(entry),
                    "SecurityFirewall" => firewalls.push(entry),
                    _ => physical.push(entry),
                }
            }
        }

        for (kind, batch) in [
            ("DcimDevice", physical),
            ("DcimVirtualDevice", virtual_devices),
            ("SecurityFirewall", firewalls),
        ] {
            if batch.is_empty() {
                continue;
            }
            let (records, payloads): (Vec<DeviceRecord>, Vec<Value>) = batch.into_iter().unzip();
            let items = payloads
                .into_iter()
                .zip(records.iter())
                .map(|(payload, record)| (payload, Some(record.name.clone())))
                .collect();
            let created = self.upsert_many(kind, items).await;
            for (mut record, node) in records.into_iter().zip(created) {
                if let Some(node) = node {
                    record.id = node.id;
                    self.devices.push(record);
                }
            }
        }
        self.summary.devices = self.devices.len();

        self.create_interfaces_from_templates().await
    }

    /// Physical and console interfaces for every device, from its expanded template
    pub async fn create_interfaces_from_templates(&mut self) -> Result<()> {
        tracing::info!("Creating interfaces from templates with expanded ranges");

        for device in self.devices.clone() {
            let Some(template) = self.templates.get(&device.template).cloned() else {
                tracing::warn!("No template found for device {}", device.name);
                continue;
            };

            let mut console = Vec::new();
            let mut physical = Vec::new();
            for iface in &template {
                let mut payload = json!({
                    "name": attr(&iface.name),
                    "device": rel(&device.id),
                    "status": attr("active"),
                });
                if let Some(role) = &iface.role {
                    payload["role"] = attr(role);
                }
                let key = Some(format!("{}-{}", device.name, iface.name));
                if iface.has_role(crate::models::interface_role::CONSOLE) {
                    payload["port"] = attr(iface.port.unwrap_or(0));
                    payload["speed"] = attr(iface.speed.unwrap_or(9600));
                    console.push((iface, (payload, key)));
                } else {
                    physical.push((iface, (payload, key)));
                }
            }

            for (kind, batch, label) in [
                ("DcimConsoleInterface", console, "console"),
                ("InterfacePhysical", physical, "physical"),
            ] {
                if batch.is_empty() {
                    continue;
                }
                let (ifaces, items): (Vec<&TemplateInterface>, Vec<(Value, Option<String>)>) = batch.into_iter().unzip();
                let count = items.len();
                let created = self.upsert_many(kind, items).await;
                let records = self.interfaces.entry(device.name.clone()).or_default();
                for (iface, node) in ifaces.into_iter().zip(created) {
                    if let Some(node) = node {
                        records.push(InterfaceRecord {
                            name: iface.name.clone(),
                            role: iface.role.clone(),
                            id: node.id,
                            kind,
                            ip_ids: Vec::new(),
                        });
                    }
                }
                tracing::info!("Created {} {} interfaces for {}", count, label, device.name);
            }
        }
        Ok(())
    }

    /// Mount devices in the row's racks and record their U position
    pub async fn assign_devices_to_racks(&mut self) -> Result<()> {
        let site = self.site_name().to_string();
        tracing::info!("Assigning devices to racks for {}", site);

        let total_racks = self
            .devices
            .iter()
            .filter(|d| d.role == device_role::LEAF)
            .count() as u32;
        if total_racks == 0 {
            tracing::warn!("No leaf devices found, skipping rack assignment");
            return Ok(());
        }

        for placement in plan_rack_assignment(&self.devices, total_racks) {
            let rack_name = format!("{}-Rack-{}", site, placement.rack);
            let Some(rack_id) = self.store_id(&rack_name).map(str::to_string) else {
                tracing::warn!("Rack {} was not created, leaving {} unplaced", rack_name, placement.device);
                continue;
            };
            let Some(device) = self.devices.iter().find(|d| d.name == placement.device) else {
                continue;
            };

            tracing::info!(
                "Assigned {} to {} at position U{} ({}U device)",
                device.name,
                rack_name,
                placement.position,
                placement.height
            );
            let payload = json!({
                "location": rel(&rack_id),
                "position": attr(placement.position),
            });
            if let Err(e) = self.api.update(device.kind, &device.id, payload).await {
                tracing::warn!("Failed to update location for {}: {}", device.name, e);
                self.summary.failed.push(format!("{}: {}", device.name, e));
            } else {
                tracing::info!("- Updated location for [{}] {}", device.kind, device.name);
            }
        }
        Ok(())
    }

    // --- Cabling ---

    /// Management or console cabling between aggregation devices and everything else
    pub async fn create_oob_connections(&mut self, kind: OobKind) -> Result<()> {
        let device_interfaces: Vec<(String, Vec<String>)> = self
            .devices
            .iter()
            .map(|device| {
                let names = self
                    .templates
                    .get(&device.template)
                    .map(|ifaces| {
                        ifaces
                            .iter()
                            .filter(|i| i.has_role(kind.interface_role()))
                            .map(|i| i.name.clone())
                            .collect()
                    })
                    .unwrap_or_default();
                (device.name.clone(), names)
            })
            .collect();

        let connections = plan_oob_connections(kind, &device_interfaces);
        if !connections.is_empty() {
            tracing::info!("Create {} connections for {}", kind.interface_role(), self.site_name());
        }

        for connection in &connections {
            self.connect(connection, kind.endpoint_kind(), "cat6", "Connection to", None)
                .await?;
        }
        Ok(())
    }

    fn interface_id(&self, device: &str, name: &str, kind: &str) -> Option<String> {
        self.interfaces_of(device)
            .iter()
            .find(|i| i.name == name && i.kind == kind)
            .map(|i| i.id.clone())
    }

    /// Lay one cable and point both endpoints at it.
    /// With `role` set, both endpoints take that role.
    pub(crate) async fn connect(
        &mut self,
        connection: &Connection,
        endpoint_kind: &'static str,
        cable_type: &str,
        description_prefix: &str,
        role: Option<&str>,
    ) -> Result<()> {
        let source_id = self.interface_id(&connection.source, &connection.source_interface, endpoint_kind);
        let target_id = self.interface_id(&connection.target, &connection.target_interface, endpoint_kind);
        let (Some(source_id), Some(target_id)) = (source_id, target_id) else {
            tracing::warn!(
                "Skipping {} {} -> {} {}: endpoint not created",
                connection.source,
                connection.source_interface,
                connection.target,
                connection.target_interface
            );
            return Ok(());
        };

        let cable = match self
            .api
            .upsert(
                "DcimCable",
                json!({
                    "status": attr("connected"),
                    "cable_type": attr(cable_type),
                    "connected_endpoints": rels([source_id.as_str(), target_id.as_str()]),
                }),
            )
            .await
        {
            Ok(cable) => cable,
            Err(e) => {
                tracing::warn!("Failed to create cable {} -> {}: {}", connection.source, connection.target, e);
                self.summary.failed.push(format!("DcimCable: {}", e));
                return Ok(());
            }
        };
        self.summary.cables += 1;

        let endpoints = [
            (&source_id, &connection.source, &connection.source_interface, &connection.target, &connection.target_interface),
            (&target_id, &connection.target, &connection.target_interface, &connection.source, &connection.source_interface),
        ];
        for (id, device, iface, peer, peer_iface) in endpoints {
            let description = format!("{} {} -> {}", description_prefix, peer, peer_iface);
            let mut payload = json!({
                "status": attr("active"),
                "description": attr(&description),
                "connector": rel(&cable.id),
            });
            if let Some(role) = role {
                payload["role"] = attr(role);
            }
            self.api.update(endpoint_kind, id, payload).await?;
            tracing::info!("- Created [{}] {} from {} -> {}", endpoint_kind, description, device, iface);

            if let Some(role) = role {
                if let Some(record) = self
                    .interfaces
                    .get_mut(device.as_str())
                    .and_then(|records| records.iter_mut().find(|r| &r.id == id))
                {
                    record.role = Some(role.to_string());
                }
            }
        }
        Ok(())
    }

    // --- Loopbacks ---

    /// One loopback per routed device, addressed from `pool_key`
    pub async fn create_loopback(&mut self, name: &str, pool_key: &str, role: &str, label: &str) -> Result<()> {
        tracing::info!("Creating {} {} interfaces", name, label.to_lowercase());
        let Some(pool) = self.store_id(pool_key).map(str::to_string) else {
            tracing::warn!("No {} available, skipping {} interfaces", pool_key, name);
            return Ok(());
        };

        let routed: Vec<DeviceRecord> = self
            .devices
            .iter()
            .filter(|d| device_role::is_routed(&d.role))
            .cloned()
            .collect();

        let mut items = Vec::new();
        let mut addresses = Vec::new();
        for device in &routed {
            let address = self
                .api
                .allocate_ip(
                    &pool,
                    &format!("{}-{}", device.name, name),
                    &format!("{} {} IP", device.name, label),
                )
                .await?;
            let payload = json!({
                "name": attr(name),
                "device": rel(&device.id),
                "ip_addresses": rels([address.id.as_str()]),
                "role": attr(role),
                "status": attr("active"),
                "description": attr(format!("{} {} {} Interface", device.name, name, label)),
            });
            items.push((payload, Some(format!("{}-{}", device.name, name))));
            addresses.push(address.id);
        }

        let created = self.upsert_many("InterfaceVirtual", items).await;
        for ((device, address), node) in routed.iter().zip(addresses).zip(created) {
            if let Some(node) = node {
                self.interfaces.entry(device.name.clone()).or_default().push(InterfaceRecord {
                    name: name.to_string(),
                    role: Some(role.to_string()),
                    id: node.id,
                    kind: "InterfaceVirtual",
                    ip_ids: vec![address],
                });
            }
        }
        Ok(())
    }
}

/// Both halves of a prefix, one bit longer
pub fn split_in_halves(prefix: &str) -> Result<(IpNet, IpNet)> {
    let network: IpNet = prefix
        .parse()
        .map_err(|e| anyhow!("Invalid prefix {}: {}", prefix, e))?;
    let network = network.trunc();
    let halves: Vec<IpNet> = network
        .subnets(network.prefix_len() + 1)
        .map(|subnets| subnets.collect())
        .unwrap_or_default();
    match halves.as_slice() {
        [first, second] => Ok((*first, *second)),
        _ => Err(anyhow!("Cannot split {} - too small to split", network)),
    }
}
