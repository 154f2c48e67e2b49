//! Reply fixtures and device targets for fabric tests
//!
//! Replies are shaped like what the switches send, trimmed to the elements
//! the readers look at.

use fabric_device::{DeviceTarget, Role};

/// Avalanche spine, registered at minor granularity.
pub const SPINE_MODEL: &str = "4000_18r.1.01a";
/// Freedom leaf on the switching family base.
pub const LEAF_MODEL: &str = "3001_18s.1.02";
/// Orca leaf, routing family with its own overrides.
pub const ORCA_MODEL: &str = "3006_18x.1.00";
/// A model nothing is registered for.
pub const UNKNOWN_MODEL: &str = "9999_0.0.0";

pub const USER: &str = "admin";
pub const PASSWORD: &str = "password";

pub fn target(host: &str, model: &str, role: Role) -> DeviceTarget {
    DeviceTarget::new(host, USER, PASSWORD, model, role)
}

pub fn spine(host: &str) -> DeviceTarget {
    target(host, SPINE_MODEL, Role::Spine)
}

pub fn leaf(host: &str) -> DeviceTarget {
    target(host, LEAF_MODEL, Role::Leaf)
}

/// `n` spines on `10.24.39.1` upwards.
pub fn spines(n: u8) -> Vec<DeviceTarget> {
    (1..=n).map(|i| spine(&format!("10.24.39.{}", i))).collect()
}

/// Common reply fixtures
pub mod replies {
    fn wrap(body: &str) -> String {
        format!("<rpc-reply><data>{}</data></rpc-reply>", body)
    }

    /// `router bgp` with a peer group and one entry per `(address, remote_as)`.
    ///
    /// Neighbors join `peer_group` and carry their own `remote-as`.
    pub fn router_bgp(local_as: u32, peer_group: &str, neighbors: &[(&str, u32)]) -> String {
        let neighbors: String = neighbors
            .iter()
            .map(|(address, remote_as)| {
                format!(
                    "<neighbor-addr><router-bgp-neighbor-address>{}</router-bgp-neighbor-address>\
                     <remote-as>{}</remote-as><associate-peer-group>{}</associate-peer-group>\
                     </neighbor-addr>",
                    address, remote_as, peer_group
                )
            })
            .collect();
        wrap(&format!(
            "<routing-system><router><router-bgp><router-bgp-attributes>\
             <local-as>{}</local-as><neighbor><peer-grps><neighbor-peer-grp>\
             <router-bgp-neighbor-peer-grp>{}</router-bgp-neighbor-peer-grp></neighbor-peer-grp>\
             </peer-grps><neighbor-ips>{}</neighbor-ips></neighbor></router-bgp-attributes>\
             </router-bgp></router></routing-system>",
            local_as, peer_group, neighbors
        ))
    }

    pub fn router_id(address: &str) -> String {
        wrap(&format!(
            "<ip><rtm-config><router-id>{}</router-id></rtm-config></ip>",
            address
        ))
    }

    pub fn loopback(id: u32, cidr: &str) -> String {
        wrap(&format!(
            "<routing-system><interface><loopback><id>{}</id><ip><ip-config><address>\
             <address>{}</address></address></ip-config></ip></loopback></interface></routing-system>",
            id, cidr
        ))
    }

    pub fn overlay_gateway(name: &str, loopback_id: u32) -> String {
        wrap(&format!(
            "<overlay-gateway><name>{}</name><gw-type>layer2-extension</gw-type>\
             <ip><interface><loopback><loopback-id>{}</loopback-id></loopback></interface></ip>\
             <map><vlan-and-bd><vni><auto/></vni></vlan-and-bd></map><activate/></overlay-gateway>",
            name, loopback_id
        ))
    }

    pub fn evpn_instance(name: &str) -> String {
        wrap(&format!(
            "<routing-system><evpn-config><evpn><evpn-instance><instance-name>{}</instance-name>\
             <route-target><both><target-community>auto</target-community><ignore-as/></both>\
             </route-target></evpn-instance></evpn></evpn-config></routing-system>",
            name
        ))
    }

    pub fn cluster(name: &str, id: u16, peer_ip: &str) -> String {
        wrap(&format!(
            "<cluster><cluster-name>{}</cluster-name><cluster-id>{}</cluster-id>\
             <peer><peer-ip>{}</peer-ip></peer><deploy/></cluster>",
            name, id, peer_ip
        ))
    }

    /// `show cluster management` listing `members`, the first as principal.
    pub fn management_cluster(total_nodes: usize, members: &[&str]) -> String {
        let nodes: String = members
            .iter()
            .enumerate()
            .map(|(i, ip)| {
                format!(
                    "<cluster-node-info><node-public-ip-address>{}</node-public-ip-address>\
                     <node-id>{}</node-id><node-is-principal>{}</node-is-principal>\
                     <node-condition>Good</node-condition><node-status>Connected to Cluster</node-status>\
                     </cluster-node-info>",
                    ip,
                    i + 1,
                    i == 0
                )
            })
            .collect();
        format!(
            "<rpc-reply><principal-switch-mac>00:27:f8:ca:2e:aa</principal-switch-mac>\
             <total-nodes-in-cluster>{}</total-nodes-in-cluster>{}</rpc-reply>",
            total_nodes, nodes
        )
    }

    /// One page of `get-interface-detail`, `(type, name, mac, speed)` each.
    pub fn interface_detail(interfaces: &[(&str, &str, &str, &str)]) -> String {
        let body: String = interfaces
            .iter()
            .map(|(int_type, int_name, mac, speed)| {
                format!(
                    "<interface><interface-type>{}</interface-type><interface-name>{}</interface-name>\
                     <current-hardware-address>{}</current-hardware-address>\
                     <actual-line-speed>{}</actual-line-speed></interface>",
                    int_type, int_name, mac, speed
                )
            })
            .collect();
        format!("<rpc-reply>{}<has-more>false</has-more></rpc-reply>", body)
    }

    /// `get-ip-interface`, `(type, name, ipv4)` each.
    pub fn ip_interfaces(interfaces: &[(&str, &str, &str)]) -> String {
        let body: String = interfaces
            .iter()
            .map(|(int_type, int_name, ip)| {
                format!(
                    "<interface><interface-type>{}</interface-type><interface-name>{}</interface-name>\
                     <if-state>up</if-state><ip-address><ipv4>{}</ipv4></ip-address></interface>",
                    int_type, int_name, ip
                )
            })
            .collect();
        format!("<rpc-reply>{}</rpc-reply>", body)
    }

    /// One page of LLDP neighbors, `(local port, local mac, remote port, remote mac)`
    /// each, with ports written the way LLDP abbreviates them (`Eth 0/1`).
    pub fn lldp_neighbors(neighbors: &[(&str, &str, &str, &str)]) -> String {
        let body: String = neighbors
            .iter()
            .enumerate()
            .map(|(i, (local, local_mac, remote, remote_mac))| {
                format!(
                    "<lldp-neighbor-detail><local-interface-name>{}</local-interface-name>\
                     <local-interface-ifindex>{}</local-interface-ifindex>\
                     <local-interface-mac>{}</local-interface-mac>\
                     <remote-interface-name>{}</remote-interface-name>\
                     <remote-interface-mac>{}</remote-interface-mac></lldp-neighbor-detail>",
                    local,
                    201_326_592 + i,
                    local_mac,
                    remote,
                    remote_mac
                )
            })
            .collect();
        format!("<rpc-reply>{}<has-more>false</has-more></rpc-reply>", body)
    }

    pub fn chassis(switch_type: &str) -> String {
        format!("<rpc-reply><switch-type>{}</switch-type></rpc-reply>", switch_type)
    }

    pub fn firmware(os_version: &str) -> String {
        format!(
            "<rpc-reply><firmware-full-version>{0}_CVR</firmware-full-version>\
             <os-version>{0}</os-version></rpc-reply>",
            os_version
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabric_device::adapter::{
        BgpConfig, InterfaceHardware, InterfaceStatus, LldpNeighbor, LoopbackConfig,
        ManagementClusterStatus,
    };

    #[test]
    fn test_replies_parse() {
        let bgp = BgpConfig::from_reply(&replies::router_bgp(
            64512,
            "spine-group",
            &[("10.10.10.1", 65001)],
        ))
        .unwrap();
        assert_eq!(bgp.local_as.as_deref(), Some("64512"));
        assert_eq!(bgp.neighbors[0].remote_as.as_deref(), Some("65001"));

        let loopbacks = LoopbackConfig::from_reply(&replies::loopback(1, "172.31.254.1/32"), &[]).unwrap();
        assert_eq!(loopbacks[0].ip_address.as_deref(), Some("172.31.254.1/32"));

        let status =
            ManagementClusterStatus::from_reply(&replies::management_cluster(2, &["10.0.0.1", "10.0.0.2"]))
                .unwrap();
        assert_eq!(status.total_nodes().unwrap(), 2);
        assert_eq!(status.principal().map(|p| p.mgmt_ip.as_str()), Some("10.0.0.1"));
    }

    #[test]
    fn test_discovery_replies_parse() {
        let (hardware, more) = InterfaceHardware::from_page(&replies::interface_detail(&[(
            "ethernet",
            "0/1",
            "0027.f8ca.7a01",
            "40Gbps",
        )]))
        .unwrap();
        assert!(!more);
        let status = InterfaceStatus::from_reply(
            &replies::ip_interfaces(&[("ethernet", "0/1", "10.10.10.0/31")]),
            &hardware,
            None,
        )
        .unwrap();
        assert_eq!(status[0].speed_mbps, 40_000);
        assert_eq!(status[0].ip_address.as_deref(), Some("10.10.10.0/31"));

        let (neighbors, last, _) = LldpNeighbor::from_page(&replies::lldp_neighbors(&[(
            "Eth 0/1",
            "0027.f8ca.7a01",
            "Eth 0/49",
            "609c.9f5d.4a31",
        )]))
        .unwrap();
        assert_eq!(neighbors[0].local_int_type, "Ethernet");
        assert_eq!(last.as_deref(), Some("201326592"));
    }

    #[test]
    fn test_spines_hosts() {
        let hosts: Vec<String> = spines(3).into_iter().map(|t| t.host).collect();
        assert_eq!(hosts, vec!["10.24.39.1", "10.24.39.2", "10.24.39.3"]);
    }
}
