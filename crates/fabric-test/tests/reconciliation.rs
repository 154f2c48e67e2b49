//! Snapshot reconciliation and keyed set algebra

use std::net::Ipv4Addr;

use fabric_actions::configure::reconcile_neighbors;
use fabric_actions::NeighborIntent;
use fabric_common::records::InterfaceRecord;
use fabric_common::{
    compare, difference, intersection, reconcile, union, Identified, KeyedSet, Reconciliation,
    Updated,
};
use pretty_assertions::assert_eq;

#[derive(Debug, Clone, PartialEq)]
struct Entity {
    id: u32,
    name: String,
    value: String,
}

impl Entity {
    fn new(id: u32, name: &str, value: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            value: value.to_string(),
        }
    }
}

impl Identified for Entity {
    fn adopt_identity(&mut self, from: &Self) {
        self.id = from.id;
    }
}

fn compare_entities(old: Vec<Entity>, new: Vec<Entity>) -> Reconciliation<Entity> {
    compare(
        |e: &Entity| e.name.clone(),
        |a: &Entity, b: &Entity| a.value == b.value,
        old,
        new,
    )
}

#[test]
fn test_only_new_is_created() {
    let x = Entity::new(0, "x", "a");
    let delta = compare_entities(vec![], vec![x.clone()]);
    assert_eq!(delta.created, vec![x]);
    assert!(delta.deleted.is_empty());
    assert!(delta.updated.is_empty());
}

#[test]
fn test_only_old_is_deleted() {
    let x = Entity::new(7, "x", "a");
    let delta = compare_entities(vec![x.clone()], vec![]);
    assert!(delta.created.is_empty());
    assert_eq!(delta.deleted, vec![x]);
    assert!(delta.updated.is_empty());
}

#[test]
fn test_update_carries_identity() {
    let delta = compare_entities(vec![Entity::new(1, "x", "a")], vec![Entity::new(0, "x", "b")]);
    assert!(delta.created.is_empty());
    assert!(delta.deleted.is_empty());
    assert_eq!(
        delta.updated,
        vec![Updated {
            old: Entity::new(1, "x", "a"),
            new: Entity::new(1, "x", "b"),
        }]
    );
}

#[test]
fn test_unchanged_entity_is_not_reported() {
    let delta = compare_entities(vec![Entity::new(1, "x", "a")], vec![Entity::new(0, "x", "a")]);
    assert!(delta.is_empty());
}

#[test]
fn test_interface_records_reconcile_on_own_key() {
    let mut recorded = InterfaceRecord::new("ethernet", "0/1").with_ip("10.10.10.1/31");
    recorded.id = 11;
    recorded.device_id = 3;
    let discovered = vec![
        InterfaceRecord::new("ethernet", "0/1").with_ip("10.10.10.3/31"),
        InterfaceRecord::new("ethernet", "0/2"),
    ];

    let delta = reconcile(vec![recorded], discovered);
    assert_eq!(delta.created.len(), 1);
    assert_eq!(delta.created[0].int_name, "0/2");
    assert_eq!(delta.updated.len(), 1);
    assert_eq!(delta.updated[0].new.id, 11);
    assert_eq!(delta.updated[0].new.device_id, 3);
    assert_eq!(delta.updated[0].new.ip_address, "10.10.10.3/31");
}

#[test]
fn test_bgp_neighbor_delta() {
    let neighbor = |last: u8, remote_as: u32| NeighborIntent::new(Ipv4Addr::new(10, 10, 10, last), remote_as);
    let delta = reconcile_neighbors(
        vec![neighbor(1, 65001), neighbor(3, 65003)],
        vec![neighbor(1, 65011), neighbor(5, 65005)],
    );
    assert_eq!(delta.created, vec![neighbor(5, 65005)]);
    assert_eq!(delta.deleted, vec![neighbor(3, 65003)]);
    assert_eq!(delta.updated.len(), 1);
    assert_eq!(delta.updated[0].new, neighbor(1, 65011));
    assert_eq!(delta.change_count(), 3);
}

fn by_name(names: &[&str]) -> KeyedSet<String> {
    KeyedSet::from_items(|s: &String| s.clone(), names.iter().map(|n| n.to_string()))
}

#[test]
fn test_set_algebra() {
    let a = by_name(&["Ethernet0", "Ethernet4", "Ethernet8"]);
    let b = by_name(&["Ethernet4", "Ethernet12"]);

    assert_eq!(union(&a, &[&b]).sorted_keys(), union(&b, &[&a]).sorted_keys());
    assert!(difference(&a, &[&a]).is_empty());

    let common = intersection(&a, &[&b]);
    assert_eq!(common.sorted_keys(), vec!["Ethernet4"]);
    assert!(common.is_subset(&a));
    assert!(common.is_subset(&b));
}

#[test]
fn test_set_algebra_with_empty_operand() {
    let a = by_name(&["Ethernet0"]);
    let empty = a.empty_like();

    assert!(union(&a, &[&empty]).is_equal(&a));
    assert!(difference(&a, &[&empty]).is_equal(&a));
    assert!(intersection(&a, &[&empty]).is_empty());
}
