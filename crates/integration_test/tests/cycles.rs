//! Graphs with cycles: links, shared dictionaries and the error reported
//! when a cycle runs through a plain `Arc`.
#![allow(missing_docs)]

use std::sync::Arc;

use skein_serialize::{Error, Registry, Value, from_bytes, to_bytes};
use skein_integration_test::{
    Directory, Lead, Node, StrictNode, bytes_of, read_root, round_trip,
};
use tracing_test::traced_test;

#[test]
fn two_node_cycle() {
    let registry = Registry::new();
    let ring = Node::ring(&["a", "b"]);

    let a = round_trip(&ring[0], &registry);
    let b = a.next.get().unwrap();

    assert_eq!(a.name, "a");
    assert_eq!(b.name, "b");
    assert!(b.next.points_to(&a));

    Node::unlink(&ring);
    Node::unlink(&[a, b]);
}

#[test]
fn self_loop() {
    let registry = Registry::new();
    let ring = Node::ring(&["alone"]);

    let back = round_trip(&ring[0], &registry);

    assert!(back.next.points_to(&back));
    assert!(!back.next.points_to(&ring[0]));

    Node::unlink(&ring);
    Node::unlink(&[back]);
}

#[traced_test]
#[test]
fn long_ring_resolves_after_the_outermost_read() {
    let registry = Registry::new();
    let names = (0..100).map(|i| format!("n{i}")).collect::<Vec<_>>();
    let names = names.iter().map(String::as_str).collect::<Vec<_>>();
    let ring = Node::ring(&names);

    let first = round_trip(&ring[0], &registry);

    let mut walked = Vec::new();
    let mut current = first.clone();
    for name in &names {
        assert_eq!(current.name, *name);
        let next = current.next.get().unwrap();
        walked.push(current);
        current = next;
    }
    assert!(Arc::ptr_eq(&current, &first));
    assert!(logs_contain("resolving deferred references"));

    Node::unlink(&ring);
    Node::unlink(&walked);
}

#[test]
fn cycle_through_an_arc_is_reported() {
    let writer_registry = Registry::new();
    let ring = Node::ring(&["a", "b"]);
    let bytes = bytes_of(&ring[0], &writer_registry);
    Node::unlink(&ring);

    let reader_registry = Registry::new();
    reader_registry.resolve::<StrictNode>().unwrap();

    assert!(matches!(
        from_bytes(&bytes, &reader_registry),
        Err(Error::CyclicReference { index: 0 })
    ));
}

#[test]
fn arc_into_an_unfinished_object_is_rejected_on_write() {
    let registry = Registry::new();
    registry.resolve::<Lead>().unwrap();
    let (lead, follower) = Lead::pair();

    // the follower's `Arc` would point at the lead before its body ends
    assert!(matches!(
        to_bytes(&Value::shared(&lead), &registry),
        Err(Error::CyclicReference { index: 0 })
    ));

    // from the other end the cycle closes through the link
    let back = round_trip(&follower, &registry);
    assert!(back.lead.follower.points_to(&back));

    lead.follower.set(None);
    back.lead.follower.set(None);
}

#[test]
fn acyclic_stream_reads_into_plain_arcs() {
    let writer_registry = Registry::new();
    let head = Node::new("head");
    head.next.set(Some(Node::new("tail")));

    let bytes = bytes_of(&head, &writer_registry);
    let back = read_root::<StrictNode>(&bytes, &Registry::new());

    assert_eq!(back.name, "head");
    assert_eq!(back.next.as_ref().unwrap().name, "tail");
    assert!(back.next.as_ref().unwrap().next.is_none());
}

#[test]
fn dictionary_entries_close_cycles() {
    let registry = Registry::new();
    let root = Directory::with_child("home", "user");

    let back = round_trip(&root, &registry);

    assert_eq!(back.name, "home");
    assert_eq!(back.entries.len(), 2);
    assert!(Arc::ptr_eq(&back.entries.get(&".".to_owned()).unwrap(), &back));

    let child = back.entries.get(&"user".to_owned()).unwrap();
    assert_eq!(child.name, "user");
    assert!(Arc::ptr_eq(&child.entries.get(&"..".to_owned()).unwrap(), &back));

    root.clear();
    back.clear();
}
