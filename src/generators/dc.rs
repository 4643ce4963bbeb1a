use anyhow::Result;

use super::cabling::{plan_fabric_peering, FabricDevice, FabricPort, OobKind};
use super::creator::{CreationSummary, PoolSubnet, TopologyCreator, LOOPBACK_POOL, VTEP_POOL};
use crate::infrahub::InfrahubApi;
use crate::models::{device_role, interface_role, Scenario, Topology};

impl<'a> TopologyCreator<'a> {
    /// Spine to leaf and spine to border leaf cabling over unnumbered links
    pub async fn create_fabric_peering(&mut self) -> Result<()> {
        let fabric: Vec<FabricDevice> = self
            .devices()
            .iter()
            .filter(|d| device_role::is_fabric(&d.role))
            .filter_map(|device| {
                let template = self.templates().get(&device.template)?;
                let ports = template
                    .iter()
                    .filter(|i| i.has_role(interface_role::LEAF) || i.has_role(interface_role::UPLINK))
                    .filter_map(|i| {
                        Some(FabricPort {
                            name: i.name.clone(),
                            role: i.role.clone()?,
                        })
                    })
                    .collect();
                Some(FabricDevice {
                    name: device.name.clone(),
                    role: device.role.clone(),
                    ports,
                })
            })
            .collect();

        let connections = plan_fabric_peering(&fabric);
        tracing::info!("Creating {} fabric peering connections for {}", connections.len(), self.site_name());
        for connection in &connections {
            self.connect(
                connection,
                "InterfacePhysical",
                "dac-passive",
                "Peering connection to",
                Some(interface_role::UNNUMBERED),
            )
            .await?;
        }
        Ok(())
    }

    /// loopback0 for the underlay, loopback1 for the VTEP
    pub async fn create_dual_loopbacks(&mut self) -> Result<()> {
        tracing::info!("Creating dual loopback interfaces: loopback0 (underlay) and loopback1 (VTEP)");
        self.create_loopback("loopback0", LOOPBACK_POOL, interface_role::LOOPBACK, "Underlay")
            .await?;
        self.create_loopback("loopback1", VTEP_POOL, interface_role::LOOPBACK_VTEP, "VTEP")
            .await
    }
}

/// Build a spine/leaf data center from its TopologyDataCenter design
pub async fn generate_dc(api: &dyn InfrahubApi, branch: &str, topology: Topology) -> Result<CreationSummary> {
    let scenario = Scenario::resolve(topology.scenario.as_deref(), topology.strategy.as_deref());
    tracing::info!(
        "Using {} scenario for topology generation (unnumbered P2P only)",
        scenario.as_str()
    );

    let management = topology.management_subnet.clone();
    let technical = topology.technical_subnet.clone();
    let mut creator = TopologyCreator::new(api, branch, topology);

    creator.load_data().await?;
    creator.create_site().await?;
    creator.create_location_hierarchy().await?;
    creator.create_racks().await?;

    let subnets: Vec<PoolSubnet> = management
        .iter()
        .map(|subnet| PoolSubnet::new("Management", &subnet.id))
        .collect();
    creator.create_address_pools(&subnets).await?;
    if let Some(technical) = &technical {
        let prefix = creator.resolve_prefix(technical).await?;
        creator.create_split_loopback_pools(&prefix).await?;
    }
    creator.create_l2_pool().await?;

    creator.create_devices().await?;
    creator.assign_devices_to_racks().await?;

    creator.create_oob_connections(OobKind::Management).await?;
    creator.create_oob_connections(OobKind::Console).await?;
    creator.create_fabric_peering().await?;

    creator.create_dual_loopbacks().await?;

    match scenario {
        Scenario::Ospf => {
            creator.create_ospf_underlay().await?;
            creator.create_autonomous_systems(scenario).await?;
            creator.create_bgp_peer_groups(scenario).await?;
            creator.create_ibgp_overlay("loopback1").await?;
        }
        Scenario::Ebgp => {
            creator.create_autonomous_systems(scenario).await?;
            creator.create_bgp_peer_groups(scenario).await?;
            creator.create_ebgp_underlay().await?;
            creator.create_ibgp_overlay("loopback1").await?;
        }
    }

    Ok(creator.into_summary())
}
