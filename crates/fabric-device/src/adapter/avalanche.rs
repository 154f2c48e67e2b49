//! SLX 9540 (Avalanche) generations.

use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use async_trait::async_trait;

use crate::error::{DeviceError, DeviceResult};
use crate::transport::Transport;

use super::records::parse_static_routes;
use super::templates;
use super::{
    apply_steps, DeviceAdapter, EvpnNeighborParams, MtuParams, RoutingBase, StaticRouteParams,
};

/// Avalanche peers EVPN neighbors over loopbacks with MPLS encapsulation and
/// manages static routes towards the MCT peer.
#[derive(Debug, Clone, Default)]
pub struct Avalanche {
    routing: RoutingBase,
}

impl Avalanche {
    pub fn new() -> Self {
        Self {
            routing: RoutingBase::new(),
        }
    }
}

fn peer_loopback(params: &EvpnNeighborParams) -> DeviceResult<(Ipv4Addr, u32)> {
    match (params.loopback_address, params.loopback_number) {
        (Some(address), Some(number)) => Ok((address, number)),
        _ => Err(DeviceError::invalid_param(
            "loopback",
            "EVPN neighbors on this platform peer over a loopback",
        )),
    }
}

#[async_trait]
impl DeviceAdapter for Avalanche {
    fn name(&self) -> &'static str {
        "slx-avalanche"
    }

    fn delegate(&self) -> Option<&dyn DeviceAdapter> {
        Some(&self.routing)
    }

    fn evpn_neighbor_encap_type(&self) -> &'static str {
        "mpls"
    }

    async fn configure_evpn_neighbor(
        &self,
        transport: &mut dyn Transport,
        params: &EvpnNeighborParams,
    ) -> DeviceResult<String> {
        let (address, loopback) = peer_loopback(params)?;
        let address = address.to_string();
        apply_steps(
            transport,
            "configure_evpn_neighbor",
            vec![
                templates::build_mct_neighbor(&address, params.remote_as, Some(loopback), params.bfd),
                templates::build_l2evpn_neighbor(&address, &params.encapsulation),
                templates::build_deactivate_ipv4_unicast(&address),
            ],
        )
        .await
    }

    async fn unconfigure_evpn_neighbor(
        &self,
        transport: &mut dyn Transport,
        params: &EvpnNeighborParams,
    ) -> DeviceResult<String> {
        let (address, _) = peer_loopback(params)?;
        transport
            .edit_config(&templates::build_bgp_neighbor_delete(&address.to_string()))
            .await
    }

    async fn configure_ip_route(
        &self,
        transport: &mut dyn Transport,
        params: &StaticRouteParams,
    ) -> DeviceResult<String> {
        transport
            .edit_config(&templates::build_static_route(params))
            .await
    }

    async fn deconfigure_ip_route(
        &self,
        transport: &mut dyn Transport,
        params: &StaticRouteParams,
    ) -> DeviceResult<String> {
        transport
            .edit_config(&templates::build_static_route_delete(params))
            .await
    }

    async fn get_ip_routes(
        &self,
        transport: &mut dyn Transport,
    ) -> DeviceResult<BTreeMap<String, String>> {
        let reply = transport
            .get_config(templates::FILTER_STATIC_ROUTES)
            .await?;
        parse_static_routes(&reply)
    }
}

/// Avalanche from 18r.2 on, which has no system-wide IPv6 MTU.
#[derive(Debug, Clone, Default)]
pub struct Avalanche18r2 {
    avalanche: Avalanche,
}

impl Avalanche18r2 {
    pub fn new() -> Self {
        Self {
            avalanche: Avalanche::new(),
        }
    }
}

#[async_trait]
impl DeviceAdapter for Avalanche18r2 {
    fn name(&self) -> &'static str {
        "slx-avalanche-18r2"
    }

    fn delegate(&self) -> Option<&dyn DeviceAdapter> {
        Some(&self.avalanche)
    }

    async fn configure_system_ip_mtu(
        &self,
        transport: &mut dyn Transport,
        params: &MtuParams,
    ) -> DeviceResult<String> {
        transport.edit_config(&templates::build_ip_mtu(params)).await
    }

    async fn unconfigure_system_ip_mtu(
        &self,
        transport: &mut dyn Transport,
    ) -> DeviceResult<String> {
        transport.edit_config(&templates::build_ip_mtu_delete()).await
    }
}
