//! Export generated artifacts (containerlab topologies, device configs and
//! cabling matrices) from Infrahub to the local output directory.

use anyhow::{Context as _, Result};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::infrahub::data::{list_field, str_field};
use crate::infrahub::{list_all, InfrahubApi, InfrahubClient};

const CLAB_ARTIFACT: &str = "containerlab-topology";
const CABLING_ARTIFACT: &str = "topology-cabling";
const DEVICE_ARTIFACTS: &[&str] = &["leaf", "spine", "border-leaf", "openconfig-leaf"];
const DEVICE_ROLES: &[&str] = &["leaf", "spine", "border_leaf"];

const TOPOLOGY_FIELDS: &str = "id name { value } devices { edges { node { id } } }";
const DEVICE_FIELDS: &str = "id name { value } role { value }";
const ARTIFACT_FIELDS: &str = "id name { value } storage_id { value } object { node { id } }";

/// Raw artifact content by storage id
#[async_trait::async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn fetch(&self, storage_id: &str) -> Result<String>;
}

#[async_trait::async_trait]
impl ArtifactStore for InfrahubClient {
    async fn fetch(&self, storage_id: &str) -> Result<String> {
        Ok(self.fetch_storage_object(storage_id).await?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    Topology,
    DeviceConfig,
    Cabling,
}

/// One artifact to write, relative to the output directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedFile {
    pub kind: ExportKind,
    pub label: String,
    pub path: PathBuf,
    pub storage_id: String,
}

#[derive(Debug, Default)]
pub struct ExportSummary {
    pub topologies: Vec<String>,
    pub device_configs: usize,
    pub cabling: usize,
    pub failures: Vec<String>,
}

impl ExportSummary {
    pub fn total(&self) -> usize {
        self.topologies.len() + self.device_configs + self.cabling
    }
}

/// Decide which artifacts to fetch and where they land.
///
/// Device configs are only taken for devices that belong to a data center
/// topology and have a leaf, spine or border_leaf role.
pub fn plan_exports(topologies: &[Value], devices: &[Value], artifacts: &[Value]) -> Vec<PlannedFile> {
    // artifact name -> object id -> storage id
    let mut by_object: HashMap<(&str, &str), &str> = HashMap::new();
    for artifact in artifacts {
        let name = str_field(artifact, "name").unwrap_or_default();
        let object = artifact.get("object").and_then(|o| str_field(o, "id")).unwrap_or_default();
        if let Some(storage_id) = str_field(artifact, "storage_id") {
            by_object.insert((name, object), storage_id);
        }
    }

    let mut planned = Vec::new();
    let mut topology_devices = HashSet::new();

    for topology in topologies {
        let id = str_field(topology, "id").unwrap_or_default();
        let name = str_field(topology, "name").unwrap_or(id);
        for device in list_field(topology, "devices") {
            if let Some(device_id) = str_field(device, "id") {
                topology_devices.insert(device_id);
            }
        }
        if let Some(storage_id) = by_object.get(&(CLAB_ARTIFACT, id)) {
            planned.push(PlannedFile {
                kind: ExportKind::Topology,
                label: name.to_string(),
                path: Path::new("clab").join(format!("{}.clab.yml", name)),
                storage_id: storage_id.to_string(),
            });
        }
        if let Some(storage_id) = by_object.get(&(CABLING_ARTIFACT, id)) {
            planned.push(PlannedFile {
                kind: ExportKind::Cabling,
                label: name.to_string(),
                path: Path::new("cabling").join(format!("{}-cabling.txt", name)),
                storage_id: storage_id.to_string(),
            });
        }
    }

    for device in devices {
        let id = str_field(device, "id").unwrap_or_default();
        if !topology_devices.contains(id) {
            continue;
        }
        if !str_field(device, "role").is_some_and(|r| DEVICE_ROLES.contains(&r)) {
            continue;
        }
        let name = str_field(device, "name").unwrap_or(id);
        for artifact in DEVICE_ARTIFACTS {
            if let Some(storage_id) = by_object.get(&(*artifact, id)) {
                let extension = if *artifact == "openconfig-leaf" { "json" } else { "cfg" };
                planned.push(PlannedFile {
                    kind: ExportKind::DeviceConfig,
                    label: format!("{}.{}", name, extension),
                    path: Path::new("devices").join(format!("{}.{}", name, extension)),
                    storage_id: storage_id.to_string(),
                });
            }
        }
    }

    planned
}

/// Fetch every planned artifact and write it below `output_dir`.
/// Individual failures are recorded and do not stop the export.
pub async fn export(api: &dyn InfrahubApi, store: &dyn ArtifactStore, output_dir: &Path) -> Result<ExportSummary> {
    let topologies = list_all(api, "TopologyDataCenter", TOPOLOGY_FIELDS).await?;
    let devices = list_all(api, "DcimDevice", DEVICE_FIELDS).await?;
    let artifacts = list_all(api, "CoreArtifact", ARTIFACT_FIELDS).await?;

    for dir in ["clab", "devices", "cabling"] {
        tokio::fs::create_dir_all(output_dir.join(dir))
            .await
            .with_context(|| format!("Failed to create {}", output_dir.join(dir).display()))?;
    }

    let mut summary = ExportSummary::default();
    for file in plan_exports(&topologies, &devices, &artifacts) {
        let path = output_dir.join(&file.path);
        let written = async {
            let content = store.fetch(&file.storage_id).await?;
            tokio::fs::write(&path, content)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))
        }
        .await;

        match written {
            Ok(()) => {
                println!("  Saved {}", path.display());
                match file.kind {
                    ExportKind::Topology => summary.topologies.push(file.label),
                    ExportKind::DeviceConfig => summary.device_configs += 1,
                    ExportKind::Cabling => summary.cabling += 1,
                }
            }
            Err(e) => {
                tracing::warn!("Error fetching {}: {}", file.label, e);
                summary.failures.push(format!("{}: {}", file.label, e));
            }
        }
    }
    Ok(summary)
}

fn plural(n: usize, one: &str, many: &str) -> String {
    format!("{} {}", n, if n == 1 { one } else { many })
}

/// CLI entry: export, print the summary and return the exit code
pub async fn run(api: &dyn InfrahubApi, store: &dyn ArtifactStore, output_dir: &Path, branch: &str) -> i32 {
    println!("Extracting Infrahub configuration artifacts (branch: {})", branch);
    let summary = match export(api, store, output_dir).await {
        Ok(summary) => summary,
        Err(e) => {
            println!("Artifact extraction failed: {}", e);
            return 1;
        }
    };

    if summary.total() == 0 {
        println!("No artifacts were retrieved from Infrahub.");
        println!("  The branch may not have any generated artifacts yet, or the generator has not run.");
        println!("  Run the generator: bundle-dc generate dc --branch {} --name <topology-name>", branch);
        return 1;
    }

    println!();
    println!("Configuration extraction complete!");
    println!("  {}", plural(summary.topologies.len(), "containerlab topology", "containerlab topologies"));
    println!("  {}", plural(summary.device_configs, "device configuration", "device configurations"));
    println!("  {}", plural(summary.cabling, "cabling matrix", "cabling matrices"));
    println!("Saved to: {}", output_dir.display());

    for name in &summary.topologies {
        let topo = output_dir.join("clab").join(format!("{}.clab.yml", name));
        println!();
        println!("Deploy {}:  sudo -E containerlab deploy -t {}", name, topo.display());
        println!("Destroy {}: sudo -E containerlab destroy -t {}", name, topo.display());
    }
    0
}
