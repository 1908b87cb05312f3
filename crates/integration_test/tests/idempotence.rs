//! Re-serializing a freshly read graph reproduces the original stream.
#![allow(missing_docs)]

use std::{collections::BTreeMap, sync::Arc};

use skein_serialize::{Error, Registry, Value, check_idempotent};
use skein_integration_test::{
    Circle, Color, Drawing, Generation, Node, Puppy, Team,
};

#[test]
fn team_is_idempotent() {
    let registry = Registry::new();
    let team = Team::sample();

    let copy = check_idempotent(&team, &registry).unwrap();

    assert_eq!(*copy, *team);
    assert!(!Arc::ptr_eq(&copy, &team));
}

#[test]
fn cyclic_graph_is_idempotent() {
    let registry = Registry::new();
    let ring = Node::ring(&["a", "b", "c"]);

    let copy = check_idempotent(&ring[0], &registry).unwrap();
    let second = copy.next.get().unwrap();
    let third = second.next.get().unwrap();

    Node::unlink(&ring);
    Node::unlink(&[copy, second, third]);
}

#[test]
fn derived_types_with_skipped_fields_are_idempotent() {
    let registry = Registry::new();

    let copy = check_idempotent(&Puppy::new("Rex", 9), &registry).unwrap();

    assert_eq!(copy.visits, 0);
}

#[test]
fn poly_containers_are_idempotent() {
    let registry = Registry::new();
    registry.resolve::<Circle>().unwrap();
    let circle = Value::shared(&Arc::new(Circle { radius: 1.5 }));

    let drawing = Arc::new(Drawing {
        shapes: vec![circle.clone(), Value::from("label"), circle],
        palette: BTreeMap::from([("ink".to_owned(), Color::Red)]),
        caption: None,
        weights: Some(vec![0.25, 0.75]),
    });

    check_idempotent(&drawing, &registry).unwrap();
}

#[test]
fn drifting_reader_is_detected() {
    let registry = Registry::new();

    assert!(matches!(
        check_idempotent(&Arc::new(Generation(1)), &registry),
        Err(Error::NotIdempotent)
    ));
}
