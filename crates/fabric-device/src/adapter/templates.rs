//! Request body builders for device operations
//!
//! Every builder is a pure function from typed parameters to the XML body
//! handed to the transport. Free-form values are escaped; validated
//! numbers and addresses are formatted directly.

use crate::xml::escape;

use super::params::{
    AnycastGatewayParams, BfdTimers, BgpNeighborParams, ClusterParams, EvpnInstanceParams,
    EvpnNeighborParams, HostNameParams, LoopbackParams, MacArpParams, MtuParams,
    NumberedInterfaceParams, OverlayGatewayParams, Redistribution, RouterBgpParams,
    StaticRouteParams, UnnumberedInterfaceParams, VeInterfaceParams,
};

pub const NS_COMMON_DEF: &str = "urn:brocade.com:mgmt:brocade-common-def";
pub const NS_BGP: &str = "urn:brocade.com:mgmt:brocade-bgp";
pub const NS_RTM: &str = "urn:brocade.com:mgmt:brocade-rtm";
pub const NS_INTERFACE: &str = "urn:brocade.com:mgmt:brocade-interface";
pub const NS_LOOPBACK: &str = "urn:brocade.com:mgmt:brocade-intf-loopback";
pub const NS_IP_CONFIG: &str = "urn:brocade.com:mgmt:brocade-ip-config";
pub const NS_IPV6_CONFIG: &str = "urn:brocade.com:mgmt:brocade-ipv6-config";
pub const NS_VRRP: &str = "urn:brocade.com:mgmt:brocade-vrrp";
pub const NS_MCT: &str = "urn:brocade.com:mgmt:brocade-mct";
pub const NS_MPLS: &str = "urn:brocade.com:mgmt:brocade-mpls";
pub const NS_MAC_TABLE: &str = "urn:brocade.com:mgmt:brocade-mac-address-table";
pub const NS_ARP: &str = "urn:brocade.com:mgmt:brocade-arp";
pub const NS_RAS: &str = "urn:brocade.com:mgmt:brocade-ras";
pub const NS_TUNNELS: &str = "urn:brocade.com:mgmt:brocade-tunnels";
pub const NS_CLUSTER: &str = "urn:brocade.com:mgmt:brocade-cluster";
pub const NS_INTERFACE_EXT: &str = "urn:brocade.com:mgmt:brocade-interface-ext";
pub const NS_LLDP_EXT: &str = "urn:brocade.com:mgmt:brocade-lldp-ext";

/// Filter selecting the router BGP subtree.
pub const FILTER_ROUTER_BGP: &str = "/routing-system/router/router-bgp";
/// Filter selecting the router-id.
pub const FILTER_ROUTER_ID: &str = "/ip/rtm-config";
/// Filter selecting the loopback interfaces.
pub const FILTER_LOOPBACK: &str = "/routing-system/interface/loopback";
/// Filter selecting the anycast gateway configuration.
pub const FILTER_ROUTING_SYSTEM: &str = "/routing-system";
/// Filter selecting the MCT cluster.
pub const FILTER_CLUSTER: &str = "//cluster";
pub const FILTER_HOST_TABLE: &str = "/host-table";
pub const FILTER_MAC_TABLE: &str = "/mac-address-table";
pub const FILTER_STATIC_ROUTES: &str = "ip";
pub const FILTER_OVERLAY_GATEWAY: &str = "overlay-gateway";
pub const FILTER_EVPN_INSTANCE: &str = "/routing-system/evpn-config";

/// Filter selecting one VE interface.
pub fn filter_interface_ve(name: u16) -> String {
    format!("/routing-system/interface/ve[name='{}']", name)
}

/// Family-specific container of the switch attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemContainer {
    /// `system-ras`, used by routing platforms.
    SystemRas,
    /// `system`, used by switching platforms.
    System,
}

impl SystemContainer {
    fn tag(&self) -> &'static str {
        match self {
            SystemContainer::SystemRas => "system-ras",
            SystemContainer::System => "system",
        }
    }
}

fn config(body: &str) -> String {
    format!("<config>{}</config>", body)
}

fn routing_system(body: &str) -> String {
    format!(
        "<routing-system xmlns=\"{}\">{}</routing-system>",
        NS_COMMON_DEF, body
    )
}

fn router_bgp(body: &str) -> String {
    config(&routing_system(&format!(
        "<router><router-bgp xmlns=\"{}\">{}</router-bgp></router>",
        NS_BGP, body
    )))
}

fn bgp_neighbor_addr(body: &str) -> String {
    router_bgp(&format!(
        "<router-bgp-attributes><neighbor><neighbor-ips><neighbor-addr>{}</neighbor-addr>\
         </neighbor-ips></neighbor></router-bgp-attributes>",
        body
    ))
}

fn bfd_interval(bfd: &BfdTimers) -> String {
    format!(
        "<bfd><interval><min-tx>{}</min-tx><min-rx>{}</min-rx><multiplier>{}</multiplier>\
         </interval></bfd>",
        bfd.min_tx, bfd.min_rx, bfd.multiplier
    )
}

const GRACEFUL_RESTART: &str =
    "<graceful-restart><graceful-restart-status></graceful-restart-status></graceful-restart>";

/// Build `router bgp` creation request
pub fn build_router_bgp(params: &RouterBgpParams) -> String {
    let group = escape(&params.peer_group);
    let bfd = params.bfd.as_ref().map(bfd_interval).unwrap_or_default();
    let group_bfd = if params.bfd.is_some() {
        "<bfd><bfd-enable></bfd-enable></bfd>"
    } else {
        ""
    };

    let redistribution = match &params.redistribution {
        Redistribution::Connected => "<af-ipv4-uc-and-vrf-cmds-call-point-holder><redistribute>\
             <connected><redistribute-connected></redistribute-connected></connected>\
             </redistribute></af-ipv4-uc-and-vrf-cmds-call-point-holder>"
            .to_string(),
        Redistribution::ConnectedWithRouteMap(route_map) => format!(
            "<af-ipv4-uc-and-vrf-cmds-call-point-holder><redistribute><connected>\
             <redistribute-connected></redistribute-connected>\
             <redistribute-route-map>{}</redistribute-route-map></connected></redistribute>\
             </af-ipv4-uc-and-vrf-cmds-call-point-holder>",
            escape(route_map)
        ),
        Redistribution::Network(network) => format!(
            "<network><network-ipv4-address>{}</network-ipv4-address></network>",
            network
        ),
        Redistribution::None => String::new(),
    };

    let evpn = params
        .evpn
        .as_ref()
        .map(|evpn| {
            let retain = if evpn.retain_route_target_all {
                "<retain><route-target><all></all></route-target></retain>"
            } else {
                ""
            };
            let next_hop = if evpn.next_hop_unchanged {
                "<next-hop-unchanged></next-hop-unchanged>"
            } else {
                ""
            };
            let allowas_in = if evpn.allowas_in > 0 {
                format!("<allowas-in>{}</allowas-in>", evpn.allowas_in)
            } else {
                String::new()
            };
            format!(
                "<l2vpn><evpn>{}<neighbor><evpn-peer-group>\
                 <evpn-neighbor-peergroup-name>{}</evpn-neighbor-peergroup-name>\
                 <encapsulation>vxlan</encapsulation>{}{}\
                 <enable-peer-as-check></enable-peer-as-check><activate></activate>\
                 </evpn-peer-group></neighbor>{}</evpn></l2vpn>",
                retain, group, next_hop, allowas_in, GRACEFUL_RESTART
            )
        })
        .unwrap_or_default();

    router_bgp(&format!(
        "<router-bgp-attributes><local-as>{}</local-as><capability><as4-enable></as4-enable>\
         </capability>{}<fast-external-fallover></fast-external-fallover><neighbor><peer-grps>\
         <neighbor-peer-grp><router-bgp-neighbor-peer-grp>{}</router-bgp-neighbor-peer-grp>\
         <peer-group-name></peer-group-name><description>{}</description>{}</neighbor-peer-grp>\
         </peer-grps></neighbor></router-bgp-attributes><address-family><ipv4><ipv4-unicast>\
         <default-vrf><default-vrf-selected></default-vrf-selected>{}<af-common-cmds-holder>\
         <maximum-paths><load-sharing-value>{}</load-sharing-value></maximum-paths>{}\
         </af-common-cmds-holder></default-vrf></ipv4-unicast></ipv4>{}</address-family>",
        params.local_as,
        bfd,
        group,
        escape(&params.peer_group_description),
        group_bfd,
        redistribution,
        params.max_paths,
        GRACEFUL_RESTART,
        evpn
    ))
}

/// Build `router bgp` removal request
pub fn build_router_bgp_delete() -> String {
    config(&routing_system(&format!(
        "<router><router-bgp xmlns=\"{}\" operation=\"remove\"></router-bgp></router>",
        NS_BGP
    )))
}

/// Build BGP neighbor creation requests, in the order they must be sent
///
/// Leaves set `remote-as` on the peer group; other roles set it on the
/// neighbor address. The neighbor is then bound to the peer group, and
/// multihop (plus next-hop-self for unnumbered peers) follows when set.
pub fn build_bgp_neighbor(params: &BgpNeighborParams) -> Vec<String> {
    let group = escape(&params.peer_group);
    let mut steps = Vec::with_capacity(3);

    let remote_as = if params.is_leaf {
        router_bgp(&format!(
            "<router-bgp-attributes><neighbor><peer-grps><neighbor-peer-grp>\
             <router-bgp-neighbor-peer-grp>{}</router-bgp-neighbor-peer-grp>\
             <peer-group-name></peer-group-name><remote-as>{}</remote-as></neighbor-peer-grp>\
             </peer-grps></neighbor></router-bgp-attributes>",
            group, params.remote_as
        ))
    } else {
        bgp_neighbor_addr(&format!(
            "<router-bgp-neighbor-address>{}</router-bgp-neighbor-address><remote-as>{}</remote-as>",
            params.address, params.remote_as
        ))
    };
    steps.push(remote_as);

    steps.push(bgp_neighbor_addr(&format!(
        "<router-bgp-neighbor-address>{}</router-bgp-neighbor-address>\
         <associate-peer-group>{}</associate-peer-group>",
        params.address, group
    )));

    if let Some(hops) = params.multihop {
        let next_hop_self = if params.next_hop_self {
            "<next-hop-self><next-hop-self-status/></next-hop-self>"
        } else {
            ""
        };
        steps.push(bgp_neighbor_addr(&format!(
            "<router-bgp-neighbor-address>{}</router-bgp-neighbor-address><ebgp-multihop>\
             <ebgp-multihop-count>{}</ebgp-multihop-count></ebgp-multihop>{}",
            params.address, hops, next_hop_self
        )));
    }
    steps
}

/// Build BGP neighbor removal request
pub fn build_bgp_neighbor_delete(address: &str) -> String {
    bgp_neighbor_addr(&format!(
        "<router-bgp-neighbor-address>{}</router-bgp-neighbor-address>\
         <associate-peer-group operation=\"remove\"/><remote-as operation=\"remove\"/>",
        escape(address)
    ))
}

/// Build the underlay half of an MCT peer neighbor
///
/// `update_source` binds the session to a loopback interface.
pub fn build_mct_neighbor(
    address: &str,
    remote_as: u32,
    update_source: Option<u32>,
    bfd: bool,
) -> String {
    let update_source = update_source
        .map(|lo| format!("<update-source><loopback>{}</loopback></update-source>", lo))
        .unwrap_or_default();
    let bfd = if bfd {
        "<bfd><bfd-enable></bfd-enable></bfd>"
    } else {
        ""
    };
    bgp_neighbor_addr(&format!(
        "<router-bgp-neighbor-address>{}</router-bgp-neighbor-address><remote-as>{}</remote-as>{}{}",
        escape(address),
        remote_as,
        update_source,
        bfd
    ))
}

/// Build EVPN address-family activation of a neighbor
pub fn build_l2evpn_neighbor(address: &str, encapsulation: &str) -> String {
    let encapsulation = if encapsulation.is_empty() {
        String::new()
    } else {
        format!("<encapsulation>{}</encapsulation>", escape(encapsulation))
    };
    router_bgp(&format!(
        "<address-family><l2vpn><evpn><neighbor><evpn-neighbor-ipv4>\
         <evpn-neighbor-ipv4-address>{}</evpn-neighbor-ipv4-address><activate></activate>{}\
         </evpn-neighbor-ipv4></neighbor>{}</evpn></l2vpn></address-family>",
        escape(address),
        encapsulation,
        GRACEFUL_RESTART
    ))
}

/// Build removal of a neighbor from the default IPv4 unicast family
pub fn build_deactivate_ipv4_unicast(address: &str) -> String {
    router_bgp(&format!(
        "<address-family><ipv4><ipv4-unicast><default-vrf>\
         <default-vrf-selected></default-vrf-selected><neighbor>\
         <af-ipv4-neighbor-address-holder><af-ipv4-neighbor-address>\
         <af-ipv4-neighbor-address>{}</af-ipv4-neighbor-address><activate operation=\"remove\"/>\
         </af-ipv4-neighbor-address></af-ipv4-neighbor-address-holder></neighbor></default-vrf>\
         </ipv4-unicast></ipv4></address-family>",
        escape(address)
    ))
}

/// Build the three EVPN neighbor steps for a directly addressed peer
pub fn build_evpn_neighbor(params: &EvpnNeighborParams) -> Vec<String> {
    let address = params.address.to_string();
    vec![
        build_mct_neighbor(&address, params.remote_as, None, params.bfd),
        build_l2evpn_neighbor(&address, &params.encapsulation),
        build_deactivate_ipv4_unicast(&address),
    ]
}

/// Build router-id creation request
pub fn build_router_id(router_id: &str) -> String {
    config(&format!(
        "<ip xmlns=\"{}\"><rtm-config xmlns=\"{}\"><router-id>{}</router-id></rtm-config></ip>",
        NS_COMMON_DEF,
        NS_RTM,
        escape(router_id)
    ))
}

/// Build router-id removal request
pub fn build_router_id_delete() -> String {
    config(&format!(
        "<ip xmlns=\"{}\"><rtm-config xmlns=\"{}\"><router-id operation=\"remove\"/></rtm-config></ip>",
        NS_COMMON_DEF, NS_RTM
    ))
}

fn loopback(body: &str, operation: &str) -> String {
    config(&routing_system(&format!(
        "<interface xmlns=\"{}\"><loopback{} xmlns=\"{}\">{}</loopback></interface>",
        NS_INTERFACE, operation, NS_LOOPBACK, body
    )))
}

/// Build loopback creation request
pub fn build_loopback(params: &LoopbackParams) -> String {
    loopback(
        &format!(
            "<id>{}</id><ip xmlns=\"{}\"><ip-config><address><address>{}</address></address>\
             </ip-config></ip>",
            params.id, NS_IP_CONFIG, params.ip_address
        ),
        "",
    )
}

/// Build loopback `no shutdown` request
pub fn build_loopback_activate(id: u32) -> String {
    loopback(
        &format!("<id>{}</id><shutdown operation=\"remove\"></shutdown>", id),
        "",
    )
}

/// Build loopback removal request
pub fn build_loopback_delete(id: u32) -> String {
    loopback(&format!("<id>{}</id>", id), " operation=\"remove\"")
}

fn ve(body: &str, operation: &str) -> String {
    config(&routing_system(&format!(
        "<interface xmlns=\"{}\"><ve{}>{}</ve></interface>",
        NS_INTERFACE, operation, body
    )))
}

/// Build VE creation request, with BFD timers when set
pub fn build_interface_ve(params: &VeInterfaceParams) -> String {
    let bfd = params.bfd.as_ref().map(bfd_interval).unwrap_or_default();
    ve(
        &format!(
            "<name>{}</name><ip xmlns=\"{}\"><ip-config><address><address>{}</address></address>\
             </ip-config></ip>{}",
            params.name, NS_IP_CONFIG, params.ip_address, bfd
        ),
        "",
    )
}

/// Build VE `no shutdown` request
pub fn build_interface_ve_activate(name: u16) -> String {
    ve(
        &format!(
            "<name>{}</name><shutdown xmlns=\"{}\" operation=\"remove\"></shutdown>",
            name, NS_IP_CONFIG
        ),
        "",
    )
}

/// Build VE removal request
pub fn build_interface_ve_delete(name: u16) -> String {
    ve(&format!("<name>{}</name>", name), " operation=\"remove\"")
}

fn physical(int_type: &str, int_name: &str, body: &str) -> String {
    config(&format!(
        "<interface xmlns=\"{ns}\"><{tag}><name>{name}</name>{body}</{tag}></interface>",
        ns = NS_INTERFACE,
        tag = int_type,
        name = escape(int_name),
        body = body
    ))
}

fn physical_activate(int_type: &str, int_name: &str) -> String {
    physical(int_type, int_name, "<shutdown operation=\"remove\"></shutdown>")
}

/// Removal of the BFD interval and description left by either addressing mode
const PHYSICAL_CLEANUP: &str =
    "<bfd><interval operation=\"remove\"></interval></bfd><description operation=\"remove\"> </description>";

/// Build numbered interface requests: the address, then `no shutdown`
pub fn build_interface_numbered(params: &NumberedInterfaceParams) -> Vec<String> {
    let description = params
        .description
        .as_deref()
        .map(|d| format!("<description>{}</description>", escape(d)))
        .unwrap_or_default();
    vec![
        physical(
            &params.int_type,
            &params.int_name,
            &format!(
                "{}<ip><ip-config xmlns=\"{}\"><address><address>{}</address></address>\
                 </ip-config></ip>",
                description, NS_IP_CONFIG, params.ip_address
            ),
        ),
        physical_activate(&params.int_type, &params.int_name),
    ]
}

/// Build numbered interface address removal request
pub fn build_interface_numbered_delete(params: &NumberedInterfaceParams) -> String {
    physical(
        &params.int_type,
        &params.int_name,
        &format!(
            "<ip><ip-config xmlns=\"{}\"><address operation=\"remove\"><address>{}</address>\
             </address></ip-config></ip>{}",
            NS_IP_CONFIG, params.ip_address, PHYSICAL_CLEANUP
        ),
    )
}

/// Build unnumbered interface requests: the donor, then `no shutdown`
pub fn build_interface_unnumbered(params: &UnnumberedInterfaceParams) -> Vec<String> {
    vec![
        physical(
            &params.int_type,
            &params.int_name,
            &format!(
                "<ip><ip-config xmlns=\"{}\"><unnumbered><ip-donor-interface-type>{}\
                 </ip-donor-interface-type><ip-donor-interface-name>{}</ip-donor-interface-name>\
                 </unnumbered></ip-config></ip>",
                NS_IP_CONFIG,
                params.donor_type,
                escape(&params.donor_name)
            ),
        ),
        physical_activate(&params.int_type, &params.int_name),
    ]
}

/// Build unnumbered interface removal request
pub fn build_interface_unnumbered_delete(params: &UnnumberedInterfaceParams) -> String {
    physical(
        &params.int_type,
        &params.int_name,
        &format!(
            "<ip><ip-config xmlns=\"{}\"><unnumbered operation=\"remove\"/></ip-config></ip>{}",
            NS_IP_CONFIG, PHYSICAL_CLEANUP
        ),
    )
}

/// Build the paged interface detail RPC, resuming after `last` when set
pub fn build_get_interface_detail(last: Option<(&str, &str)>) -> String {
    let resume = last
        .map(|(int_type, int_name)| {
            format!(
                "<last-rcvd-interface><interface-type>{}</interface-type>\
                 <interface-name>{}</interface-name></last-rcvd-interface>",
                escape(int_type),
                escape(int_name)
            )
        })
        .unwrap_or_default();
    format!(
        "<get-interface-detail xmlns=\"{}\">{}</get-interface-detail>",
        NS_INTERFACE_EXT, resume
    )
}

/// Build the IP interface summary RPC
pub fn build_get_ip_interface() -> String {
    format!("<get-ip-interface xmlns=\"{}\"/>", NS_INTERFACE_EXT)
}

/// Build the paged LLDP neighbor RPC, resuming after `last_ifindex` when set
pub fn build_get_lldp_neighbor_detail(last_ifindex: Option<&str>) -> String {
    let resume = last_ifindex
        .map(|index| format!("<last-rcvd-ifindex>{}</last-rcvd-ifindex>", escape(index)))
        .unwrap_or_default();
    format!(
        "<get-lldp-neighbor-detail xmlns=\"{}\">{}</get-lldp-neighbor-detail>",
        NS_LLDP_EXT, resume
    )
}

/// Build anycast gateway MAC request; IPv6 is included only when asked for
/// and configured
pub fn build_anycast_gateway(params: &AnycastGatewayParams, with_ipv6: bool) -> String {
    let ipv6 = match (&params.ipv6_mac, with_ipv6) {
        (Some(mac), true) => format!(
            "<ipv6><static-ag-ipv6-config xmlns=\"{}\"><anycast-gateway-mac>\
             <ipv6-anycast-gateway-mac>{}</ipv6-anycast-gateway-mac></anycast-gateway-mac>\
             </static-ag-ipv6-config></ipv6>",
            NS_VRRP,
            escape(mac)
        ),
        _ => String::new(),
    };
    config(&routing_system(&format!(
        "<ip><static-ag-ip-config xmlns=\"{}\"><anycast-gateway-mac>\
         <ip-anycast-gateway-mac>{}</ip-anycast-gateway-mac></anycast-gateway-mac>\
         </static-ag-ip-config></ip>{}",
        NS_VRRP,
        escape(&params.ipv4_mac),
        ipv6
    )))
}

/// Build anycast gateway MAC removal request
pub fn build_anycast_gateway_delete(with_ipv6: bool) -> String {
    let ipv6 = if with_ipv6 {
        format!(
            "<ipv6><static-ag-ipv6-config xmlns=\"{}\"><anycast-gateway-mac>\
             <ipv6-anycast-gateway-mac operation=\"remove\"></ipv6-anycast-gateway-mac>\
             </anycast-gateway-mac></static-ag-ipv6-config></ipv6>",
            NS_VRRP
        )
    } else {
        String::new()
    };
    config(&routing_system(&format!(
        "<ip><static-ag-ip-config xmlns=\"{}\"><anycast-gateway-mac>\
         <ip-anycast-gateway-mac operation=\"remove\"></ip-anycast-gateway-mac>\
         </anycast-gateway-mac></static-ag-ip-config></ip>{}",
        NS_VRRP, ipv6
    )))
}

fn static_route(params: &StaticRouteParams, operation: &str) -> String {
    config(&format!(
        "<ip xmlns=\"{}\"><rtm-config xmlns=\"{}\"><route><static-route-nh{}>\
         <static-route-dest>{}</static-route-dest><static-route-next-hop>{}</static-route-next-hop>\
         </static-route-nh></route></rtm-config></ip>",
        NS_COMMON_DEF, NS_RTM, operation, params.destination, params.next_hop
    ))
}

/// Build static route creation request
pub fn build_static_route(params: &StaticRouteParams) -> String {
    static_route(params, "")
}

/// Build static route removal request
pub fn build_static_route_delete(params: &StaticRouteParams) -> String {
    static_route(params, " operation=\"remove\"")
}

/// Build system-wide L2 MTU request
pub fn build_l2_mtu(params: &MtuParams) -> String {
    config(&format!(
        "<global-mtu-conf xmlns=\"{}\"><global-l2-mtu>{}</global-l2-mtu></global-mtu-conf>",
        NS_INTERFACE, params.mtu
    ))
}

/// Build system-wide L2 MTU removal request
pub fn build_l2_mtu_delete() -> String {
    config(&format!(
        "<global-mtu-conf xmlns=\"{}\"><global-l2-mtu operation=\"remove\"/></global-mtu-conf>",
        NS_INTERFACE
    ))
}

/// Build system-wide IPv4 MTU request
pub fn build_ip_mtu(params: &MtuParams) -> String {
    config(&format!(
        "<global-mtu-conf xmlns=\"{}\"><ip xmlns=\"{}\"><global-ip-mtu>{}</global-ip-mtu></ip>\
         </global-mtu-conf>",
        NS_INTERFACE, NS_IP_CONFIG, params.mtu
    ))
}

/// Build system-wide IPv6 MTU request
pub fn build_ipv6_mtu(params: &MtuParams) -> String {
    config(&format!(
        "<global-mtu-conf xmlns=\"{}\"><ipv6 xmlns=\"{}\"><global-ipv6-mtu>{}</global-ipv6-mtu>\
         </ipv6></global-mtu-conf>",
        NS_INTERFACE, NS_IPV6_CONFIG, params.mtu
    ))
}

/// Build system-wide IPv4 MTU removal request
pub fn build_ip_mtu_delete() -> String {
    config(&format!(
        "<global-mtu-conf xmlns=\"{}\"><ip xmlns=\"{}\"><global-ip-mtu operation=\"remove\"/></ip>\
         </global-mtu-conf>",
        NS_INTERFACE, NS_IP_CONFIG
    ))
}

/// Build system-wide IPv6 MTU removal request
pub fn build_ipv6_mtu_delete() -> String {
    config(&format!(
        "<global-mtu-conf xmlns=\"{}\"><ipv6 xmlns=\"{}\">\
         <global-ipv6-mtu operation=\"remove\"/></ipv6></global-mtu-conf>",
        NS_INTERFACE, NS_IPV6_CONFIG
    ))
}

/// Build the copy running-config to startup-config RPC
pub fn build_persist_config() -> String {
    format!(
        "<bna-config-cmd xmlns=\"{}\"><src>running-config</src><dest>startup-config</dest>\
         </bna-config-cmd>",
        NS_RAS
    )
}

/// Build the chassis details RPC
pub fn build_show_chassis() -> String {
    format!(
        "<action xmlns=\"http://tail-f.com/ns/netconf/actions/1.0\"><data><show xmlns=\"{}\">\
         <infra xmlns=\"urn:brocade.com:mgmt:brocade-ras-ext\"><chassis/></infra></show></data>\
         </action>",
        NS_COMMON_DEF
    )
}

/// Build the firmware version RPC
pub fn build_show_firmware_version() -> String {
    "<show-firmware-version xmlns=\"urn:brocade.com:mgmt:brocade-firmware-ext\"/>".to_string()
}

/// Build the management cluster status RPC
pub fn build_show_cluster_management() -> String {
    format!("<show-cluster-management xmlns=\"{}\"/>", NS_CLUSTER)
}

fn cluster(params: &ClusterParams, body: &str, operation: &str) -> String {
    config(&format!(
        "<cluster xmlns=\"{}\"{}><cluster-name>{}</cluster-name><cluster-id>{}</cluster-id>{}</cluster>",
        NS_MCT,
        operation,
        escape(&params.name),
        params.id,
        body
    ))
}

/// Peer variants differ in what follows `<peer-ip>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterPeerStyle {
    /// Peer and deploy only.
    Plain,
    /// Loose client isolation, used by routing platforms.
    ClientIsolation,
    /// Designated-forwarder load balancing, used by switching platforms.
    DfLoadBalance,
    /// Loose client isolation with an explicit source address.
    SourcedClientIsolation,
}

/// Build MCT peer configuration request
pub fn build_cluster_peer(params: &ClusterParams, style: ClusterPeerStyle) -> String {
    let source = match (style, params.source_ip) {
        (ClusterPeerStyle::SourcedClientIsolation, Some(ip)) => {
            format!("<source><source_ip>{}</source_ip></source>", ip)
        }
        _ => String::new(),
    };
    let tail = match style {
        ClusterPeerStyle::Plain => "",
        ClusterPeerStyle::ClientIsolation | ClusterPeerStyle::SourcedClientIsolation => {
            "<client-isolation><loose></loose></client-isolation>"
        }
        ClusterPeerStyle::DfLoadBalance => "<df-load-balance></df-load-balance>",
    };
    cluster(
        params,
        &format!(
            "<peer-interface><peer-if-type>{}</peer-if-type><peer-if-name>{}</peer-if-name>\
             </peer-interface><peer><peer-ip>{}</peer-ip>{}</peer>{}<deploy></deploy>",
            escape(&params.peer_interface_type),
            escape(&params.peer_interface_name),
            params.peer_ip,
            source,
            tail
        ),
        "",
    )
}

/// Build MCT control VLAN request
pub fn build_cluster_control_vlan(params: &ClusterParams) -> String {
    cluster(
        params,
        &format!(
            "<cluster-control-vlan>{}</cluster-control-vlan>",
            params.control_vlan
        ),
        "",
    )
}

/// Build MCT cluster removal request
pub fn build_cluster_delete(params: &ClusterParams) -> String {
    cluster(params, "", " operation=\"remove\"")
}

/// Build MPLS router creation request
pub fn build_mpls_router() -> String {
    config(&format!(
        "<mpls-config xmlns=\"{}\"><router><mpls></mpls></router></mpls-config>",
        NS_MPLS
    ))
}

/// Build MPLS router removal request
pub fn build_mpls_router_delete() -> String {
    config(&format!(
        "<mpls-config xmlns=\"{}\"><router operation=\"remove\"><mpls></mpls></router></mpls-config>",
        NS_MPLS
    ))
}

fn mac_table(body: &str) -> String {
    format!(
        "<mac-address-table xmlns=\"{}\">{}</mac-address-table>",
        NS_MAC_TABLE, body
    )
}

fn host_table(body: &str) -> String {
    format!("<host-table xmlns=\"{}\">{}</host-table>", NS_ARP, body)
}

/// Build legacy MAC aging request
pub fn build_legacy_mac_timeout(params: &MacArpParams) -> String {
    config(&mac_table(&format!(
        "<aging-time><legacy-time-out>{}</legacy-time-out></aging-time>",
        params.mac_legacy_aging_timeout
    )))
}

/// Build MAC move detection request
pub fn build_mac_move_detect() -> String {
    config(&mac_table(
        "<mac-move><mac-move-detect-enable/></mac-move>",
    ))
}

fn conversational_arp(params: &MacArpParams) -> String {
    host_table(&format!(
        "<aging-mode><conversational></conversational></aging-mode><aging-time>\
         <conversational-timeout>{}</conversational-timeout></aging-time>",
        params.arp_aging_timeout
    ))
}

/// Build conversational ARP and MAC aging request
///
/// With `with_mac` false only the ARP host table is configured.
pub fn build_conversation_properties(params: &MacArpParams, with_mac: bool) -> String {
    let mac = if with_mac {
        mac_table(&format!(
            "<learning-mode>conversational</learning-mode><aging-time>\
             <conversational-time-out>{}</conversational-time-out></aging-time><mac-move>\
             <mac-move-limit>{}</mac-move-limit></mac-move>",
            params.mac_aging_timeout, params.mac_move_limit
        ))
    } else {
        String::new()
    };
    config(&format!("{}{}", conversational_arp(params), mac))
}

/// Build MAC configuration removal request
///
/// `learning_mode` and `move_limit` select which extra leaves are removed
/// alongside the legacy timeout.
pub fn build_mac_config_delete(learning_mode: bool, move_limit: bool) -> String {
    let learning = if learning_mode {
        "<learning-mode operation=\"remove\"/>"
    } else {
        ""
    };
    let limit = if move_limit {
        "<mac-move><mac-move-limit operation=\"remove\"/></mac-move>"
    } else {
        ""
    };
    config(&mac_table(&format!(
        "{}<aging-time><legacy-time-out operation=\"remove\"/></aging-time>{}",
        learning, limit
    )))
}

/// Build MAC move detection removal request
pub fn build_mac_move_detect_delete() -> String {
    config(&mac_table(
        "<mac-move><mac-move-detect-enable operation=\"remove\"/></mac-move>",
    ))
}

/// Build conversational MAC aging removal request
pub fn build_conversation_mac_delete() -> String {
    config(&mac_table(
        "<aging-time><conversational-time-out operation=\"remove\"/></aging-time>",
    ))
}

/// Build conversational ARP aging removal request
pub fn build_conversation_arp_delete() -> String {
    config(&host_table(
        "<aging-time><conversational-timeout operation=\"remove\"/></aging-time>\
         <aging-mode operation=\"remove\"/>",
    ))
}

/// Build host name request
pub fn build_host_name(params: &HostNameParams, container: SystemContainer) -> String {
    config(&format!(
        "<{tag} xmlns=\"{}\"><switch-attributes><host-name>{}</host-name></switch-attributes></{tag}>",
        NS_RAS,
        escape(&params.host_name),
        tag = container.tag()
    ))
}

/// Build host name removal request
pub fn build_host_name_delete(container: SystemContainer) -> String {
    config(&format!(
        "<{tag} xmlns=\"{}\"><switch-attributes><host-name operation=\"delete\"/>\
         </switch-attributes></{tag}>",
        NS_RAS,
        tag = container.tag()
    ))
}

/// Build overlay gateway creation request
pub fn build_overlay_gateway(params: &OverlayGatewayParams) -> String {
    let map = if params.map_vni_auto {
        "<map><vlan-and-bd><vni><auto></auto></vni></vlan-and-bd></map>"
    } else {
        ""
    };
    config(&format!(
        "<overlay-gateway xmlns=\"{}\"><name>{}</name><gw-type>{}</gw-type><ip><interface>\
         <loopback><loopback-id>{}</loopback-id></loopback></interface></ip>{}\
         <activate></activate></overlay-gateway>",
        NS_TUNNELS,
        escape(&params.name),
        escape(&params.gw_type),
        params.loopback_id,
        map
    ))
}

/// Build overlay gateway removal request
pub fn build_overlay_gateway_delete(name: &str) -> String {
    config(&format!(
        "<overlay-gateway xmlns=\"{}\" operation=\"remove\"><name>{}</name></overlay-gateway>",
        NS_TUNNELS,
        escape(name)
    ))
}

/// Build EVPN instance creation request
pub fn build_evpn_instance(params: &EvpnInstanceParams) -> String {
    config(&routing_system(&format!(
        "<evpn-config xmlns=\"{}\"><evpn><evpn-instance><instance-name>{}</instance-name>\
         <route-target><both><target-community>auto</target-community><ignore-as></ignore-as>\
         </both></route-target><route-distinguisher><auto></auto></route-distinguisher>\
         <duplicate-mac-timer><duplicate-mac-timer-value>{}</duplicate-mac-timer-value>\
         <max-count>{}</max-count></duplicate-mac-timer></evpn-instance></evpn></evpn-config>",
        NS_BGP,
        escape(&params.name),
        params.duplicate_mac_timer,
        params.duplicate_mac_max_count
    )))
}

/// Build EVPN instance removal request
pub fn build_evpn_instance_delete(name: &str) -> String {
    config(&routing_system(&format!(
        "<evpn-config xmlns=\"{}\"><evpn operation=\"delete\"><evpn-instance>\
         <instance-name>{}</instance-name></evpn-instance></evpn></evpn-config>",
        NS_BGP,
        escape(name)
    )))
}
