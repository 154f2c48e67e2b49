//! Platform root adapter: operations every SLX generation shares.

use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::error::{DeviceError, DeviceResult};
use crate::transport::Transport;
use crate::xml::XmlElement;

use super::records::{
    AnycastGatewayConfig, ArpConfig, BgpConfig, ClusterConfig, DeviceDetail, EvpnInstanceConfig,
    InterfaceHardware, InterfaceStatus, LldpNeighbor, LoopbackConfig, MacConfig,
    ManagementClusterStatus, OverlayGatewayConfig, VeInterfaceConfig,
};
use super::templates::{self, ClusterPeerStyle};
use super::{
    apply_steps, AnycastGatewayParams, BgpNeighborParams, ClusterParams, DeviceAdapter,
    EvpnInstanceParams, EvpnNeighborParams, LoopbackParams, MtuParams, NumberedInterfaceParams,
    OverlayGatewayParams, RouterBgpParams, StaticRouteParams, UnnumberedInterfaceParams,
    VeInterfaceParams,
};

/// Reply returned by operations a platform accepts but has nothing to send for.
pub const OK_REPLY: &str = "<ok/>";

/// Root of the adapter hierarchy.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlatformBase;

impl PlatformBase {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DeviceAdapter for PlatformBase {
    fn name(&self) -> &'static str {
        "slx-base"
    }

    #[instrument(skip(self, transport), fields(host = %transport.host()))]
    async fn get_device_detail(&self, transport: &mut dyn Transport) -> DeviceResult<DeviceDetail> {
        let chassis = transport.execute_rpc(&templates::build_show_chassis()).await?;
        let firmware = transport
            .execute_rpc(&templates::build_show_firmware_version())
            .await?;
        let detail = DeviceDetail::from_replies(&chassis, &firmware)?;
        debug!(model = %detail.model, "Read device identity");
        Ok(detail)
    }

    async fn configure_router_id(
        &self,
        transport: &mut dyn Transport,
        router_id: Ipv4Addr,
    ) -> DeviceResult<String> {
        transport
            .edit_config(&templates::build_router_id(&router_id.to_string()))
            .await
    }

    async fn unconfigure_router_id(&self, transport: &mut dyn Transport) -> DeviceResult<String> {
        transport
            .edit_config(&templates::build_router_id_delete())
            .await
    }

    async fn get_router_id(&self, transport: &mut dyn Transport) -> DeviceResult<Option<Ipv4Addr>> {
        let reply = transport.get_config(templates::FILTER_ROUTER_ID).await?;
        let doc = XmlElement::parse(&reply)?;
        match doc.find_text("router-id").map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => raw
                .parse()
                .map(Some)
                .map_err(|_| DeviceError::parse("router-id", format!("'{}' is not IPv4", raw))),
        }
    }

    async fn configure_system_l2_mtu(
        &self,
        transport: &mut dyn Transport,
        params: &MtuParams,
    ) -> DeviceResult<String> {
        transport.edit_config(&templates::build_l2_mtu(params)).await
    }

    async fn unconfigure_system_l2_mtu(
        &self,
        transport: &mut dyn Transport,
    ) -> DeviceResult<String> {
        transport.edit_config(&templates::build_l2_mtu_delete()).await
    }

    async fn configure_system_ip_mtu(
        &self,
        transport: &mut dyn Transport,
        params: &MtuParams,
    ) -> DeviceResult<String> {
        apply_steps(
            transport,
            "configure_system_ip_mtu",
            vec![
                templates::build_ip_mtu(params),
                templates::build_ipv6_mtu(params),
            ],
        )
        .await
    }

    async fn unconfigure_system_ip_mtu(
        &self,
        transport: &mut dyn Transport,
    ) -> DeviceResult<String> {
        apply_steps(
            transport,
            "unconfigure_system_ip_mtu",
            vec![
                templates::build_ip_mtu_delete(),
                templates::build_ipv6_mtu_delete(),
            ],
        )
        .await
    }

    async fn persist_config(&self, transport: &mut dyn Transport) -> DeviceResult<String> {
        transport
            .execute_rpc(&templates::build_persist_config())
            .await
    }

    async fn get_arp(&self, transport: &mut dyn Transport) -> DeviceResult<ArpConfig> {
        let reply = transport.get_config(templates::FILTER_HOST_TABLE).await?;
        ArpConfig::from_reply(&reply)
    }

    async fn get_mac(&self, transport: &mut dyn Transport) -> DeviceResult<MacConfig> {
        let reply = transport.get_config(templates::FILTER_MAC_TABLE).await?;
        MacConfig::from_reply(&reply)
    }

    async fn configure_anycast_gateway(
        &self,
        transport: &mut dyn Transport,
        params: &AnycastGatewayParams,
    ) -> DeviceResult<String> {
        transport
            .edit_config(&templates::build_anycast_gateway(params, true))
            .await
    }

    async fn unconfigure_anycast_gateway(
        &self,
        transport: &mut dyn Transport,
    ) -> DeviceResult<String> {
        transport
            .edit_config(&templates::build_anycast_gateway_delete(true))
            .await
    }

    async fn get_anycast_gateway(
        &self,
        transport: &mut dyn Transport,
    ) -> DeviceResult<AnycastGatewayConfig> {
        let reply = transport
            .get_config(templates::FILTER_ROUTING_SYSTEM)
            .await?;
        AnycastGatewayConfig::from_reply(&reply)
    }

    async fn configure_ip_route(
        &self,
        transport: &mut dyn Transport,
        params: &StaticRouteParams,
    ) -> DeviceResult<String> {
        debug!(host = %transport.host(), destination = %params.destination, "Static routes not managed on this platform");
        Ok(OK_REPLY.to_string())
    }

    async fn deconfigure_ip_route(
        &self,
        transport: &mut dyn Transport,
        params: &StaticRouteParams,
    ) -> DeviceResult<String> {
        debug!(host = %transport.host(), destination = %params.destination, "Static routes not managed on this platform");
        Ok(OK_REPLY.to_string())
    }

    async fn get_ip_routes(
        &self,
        _transport: &mut dyn Transport,
    ) -> DeviceResult<BTreeMap<String, String>> {
        Ok(BTreeMap::new())
    }

    #[instrument(skip(self, transport, params), fields(host = %transport.host(), local_as = params.local_as))]
    async fn configure_router_bgp(
        &self,
        transport: &mut dyn Transport,
        params: &RouterBgpParams,
    ) -> DeviceResult<String> {
        transport
            .edit_config(&templates::build_router_bgp(params))
            .await
    }

    async fn unconfigure_router_bgp(&self, transport: &mut dyn Transport) -> DeviceResult<String> {
        transport
            .edit_config(&templates::build_router_bgp_delete())
            .await
    }

    async fn get_router_bgp(&self, transport: &mut dyn Transport) -> DeviceResult<BgpConfig> {
        let reply = transport.get_config(templates::FILTER_ROUTER_BGP).await?;
        BgpConfig::from_reply(&reply)
    }

    async fn configure_bgp_neighbor(
        &self,
        transport: &mut dyn Transport,
        params: &BgpNeighborParams,
    ) -> DeviceResult<String> {
        apply_steps(
            transport,
            "configure_bgp_neighbor",
            templates::build_bgp_neighbor(params),
        )
        .await
    }

    async fn unconfigure_bgp_neighbor(
        &self,
        transport: &mut dyn Transport,
        address: Ipv4Addr,
    ) -> DeviceResult<String> {
        transport
            .edit_config(&templates::build_bgp_neighbor_delete(&address.to_string()))
            .await
    }

    fn evpn_neighbor_encap_type(&self) -> &'static str {
        "nsh"
    }

    async fn configure_evpn_neighbor(
        &self,
        transport: &mut dyn Transport,
        params: &EvpnNeighborParams,
    ) -> DeviceResult<String> {
        apply_steps(
            transport,
            "configure_evpn_neighbor",
            templates::build_evpn_neighbor(params),
        )
        .await
    }

    async fn unconfigure_evpn_neighbor(
        &self,
        transport: &mut dyn Transport,
        params: &EvpnNeighborParams,
    ) -> DeviceResult<String> {
        transport
            .edit_config(&templates::build_bgp_neighbor_delete(
                &params.address.to_string(),
            ))
            .await
    }

    async fn configure_loopback(
        &self,
        transport: &mut dyn Transport,
        params: &LoopbackParams,
    ) -> DeviceResult<String> {
        apply_steps(
            transport,
            "configure_loopback",
            vec![
                templates::build_loopback(params),
                templates::build_loopback_activate(params.id),
            ],
        )
        .await
    }

    async fn delete_loopback(&self, transport: &mut dyn Transport, id: u32) -> DeviceResult<String> {
        transport
            .edit_config(&templates::build_loopback_delete(id))
            .await
    }

    async fn get_loopbacks(
        &self,
        transport: &mut dyn Transport,
        ids: &[u32],
    ) -> DeviceResult<Vec<LoopbackConfig>> {
        let reply = transport.get_config(templates::FILTER_LOOPBACK).await?;
        LoopbackConfig::from_reply(&reply, ids)
    }

    async fn configure_interface_ve(
        &self,
        transport: &mut dyn Transport,
        params: &VeInterfaceParams,
    ) -> DeviceResult<String> {
        // BFD timers on the VE itself are only accepted by some generations.
        let plain = VeInterfaceParams {
            bfd: None,
            ..params.clone()
        };
        apply_steps(
            transport,
            "configure_interface_ve",
            vec![
                templates::build_interface_ve(&plain),
                templates::build_interface_ve_activate(params.name),
            ],
        )
        .await
    }

    async fn delete_interface_ve(
        &self,
        transport: &mut dyn Transport,
        name: u16,
    ) -> DeviceResult<String> {
        transport
            .edit_config(&templates::build_interface_ve_delete(name))
            .await
    }

    async fn get_interface_ve(
        &self,
        transport: &mut dyn Transport,
        name: u16,
    ) -> DeviceResult<VeInterfaceConfig> {
        let reply = transport
            .get_config(&templates::filter_interface_ve(name))
            .await?;
        VeInterfaceConfig::from_reply(&reply, name)
    }

    async fn configure_interface_numbered(
        &self,
        transport: &mut dyn Transport,
        params: &NumberedInterfaceParams,
    ) -> DeviceResult<String> {
        apply_steps(
            transport,
            "configure_interface_numbered",
            templates::build_interface_numbered(params),
        )
        .await
    }

    async fn unconfigure_interface_numbered(
        &self,
        transport: &mut dyn Transport,
        params: &NumberedInterfaceParams,
    ) -> DeviceResult<String> {
        transport
            .edit_config(&templates::build_interface_numbered_delete(params))
            .await
    }

    async fn configure_interface_unnumbered(
        &self,
        transport: &mut dyn Transport,
        params: &UnnumberedInterfaceParams,
    ) -> DeviceResult<String> {
        apply_steps(
            transport,
            "configure_interface_unnumbered",
            templates::build_interface_unnumbered(params),
        )
        .await
    }

    async fn unconfigure_interface_unnumbered(
        &self,
        transport: &mut dyn Transport,
        params: &UnnumberedInterfaceParams,
    ) -> DeviceResult<String> {
        transport
            .edit_config(&templates::build_interface_unnumbered_delete(params))
            .await
    }

    #[instrument(skip(self, transport), fields(host = %transport.host()))]
    async fn get_interfaces(
        &self,
        transport: &mut dyn Transport,
        control_ve: Option<u16>,
    ) -> DeviceResult<Vec<InterfaceStatus>> {
        let mut hardware: Vec<InterfaceHardware> = Vec::new();
        loop {
            let resume = hardware
                .last()
                .map(|hw| (hw.int_type.clone(), hw.int_name.clone()));
            let request = templates::build_get_interface_detail(
                resume.as_ref().map(|(t, n)| (t.as_str(), n.as_str())),
            );
            let (page, more) = InterfaceHardware::from_page(&transport.execute_rpc(&request).await?)?;
            let advanced = page.last().is_some_and(|hw| {
                resume.as_ref() != Some(&(hw.int_type.clone(), hw.int_name.clone()))
            });
            hardware.extend(page);
            if !more || !advanced {
                break;
            }
        }

        let reply = transport
            .execute_rpc(&templates::build_get_ip_interface())
            .await?;
        let interfaces = InterfaceStatus::from_reply(&reply, &hardware, control_ve)?;
        debug!(count = interfaces.len(), "Read interfaces");
        Ok(interfaces)
    }

    #[instrument(skip(self, transport), fields(host = %transport.host()))]
    async fn get_lldp_neighbors(
        &self,
        transport: &mut dyn Transport,
    ) -> DeviceResult<Vec<LldpNeighbor>> {
        let mut neighbors = Vec::new();
        let mut last_ifindex: Option<String> = None;
        loop {
            let request = templates::build_get_lldp_neighbor_detail(last_ifindex.as_deref());
            let (page, last, more) = LldpNeighbor::from_page(&transport.execute_rpc(&request).await?)?;
            neighbors.extend(page);
            if !more || last.is_none() || last == last_ifindex {
                break;
            }
            last_ifindex = last;
        }
        debug!(count = neighbors.len(), "Read LLDP neighbors");
        Ok(neighbors)
    }

    async fn configure_cluster(
        &self,
        transport: &mut dyn Transport,
        params: &ClusterParams,
    ) -> DeviceResult<String> {
        transport
            .edit_config(&templates::build_cluster_peer(params, ClusterPeerStyle::Plain))
            .await
    }

    async fn delete_cluster(
        &self,
        transport: &mut dyn Transport,
        params: &ClusterParams,
    ) -> DeviceResult<String> {
        transport
            .edit_config(&templates::build_cluster_delete(params))
            .await
    }

    async fn get_cluster(&self, transport: &mut dyn Transport) -> DeviceResult<Option<ClusterConfig>> {
        let reply = transport.get_config(templates::FILTER_CLUSTER).await?;
        ClusterConfig::from_reply(&reply)
    }

    async fn get_management_cluster_status(
        &self,
        transport: &mut dyn Transport,
    ) -> DeviceResult<ManagementClusterStatus> {
        let reply = transport
            .execute_rpc(&templates::build_show_cluster_management())
            .await?;
        ManagementClusterStatus::from_reply(&reply)
    }

    async fn create_overlay_gateway(
        &self,
        transport: &mut dyn Transport,
        params: &OverlayGatewayParams,
    ) -> DeviceResult<String> {
        transport
            .edit_config(&templates::build_overlay_gateway(params))
            .await
    }

    async fn delete_overlay_gateway(
        &self,
        transport: &mut dyn Transport,
        name: &str,
    ) -> DeviceResult<String> {
        transport
            .edit_config(&templates::build_overlay_gateway_delete(name))
            .await
    }

    async fn get_overlay_gateway(
        &self,
        transport: &mut dyn Transport,
    ) -> DeviceResult<Option<OverlayGatewayConfig>> {
        let reply = transport
            .get_config(templates::FILTER_OVERLAY_GATEWAY)
            .await?;
        OverlayGatewayConfig::from_reply(&reply)
    }

    async fn create_evpn_instance(
        &self,
        transport: &mut dyn Transport,
        params: &EvpnInstanceParams,
    ) -> DeviceResult<String> {
        transport
            .edit_config(&templates::build_evpn_instance(params))
            .await
    }

    async fn delete_evpn_instance(
        &self,
        transport: &mut dyn Transport,
        name: &str,
    ) -> DeviceResult<String> {
        transport
            .edit_config(&templates::build_evpn_instance_delete(name))
            .await
    }

    async fn get_evpn_instance(
        &self,
        transport: &mut dyn Transport,
    ) -> DeviceResult<Option<EvpnInstanceConfig>> {
        let reply = transport
            .get_config(templates::FILTER_EVPN_INSTANCE)
            .await?;
        EvpnInstanceConfig::from_reply(&reply)
    }
}
