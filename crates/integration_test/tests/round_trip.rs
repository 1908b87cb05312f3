//! Round trips of acyclic graphs: structure, shared identity and every
//! primitive family.
#![allow(missing_docs)]

use std::{collections::HashMap, hash::RandomState, sync::Arc};

use proptest::prelude::*;
use skein_serialize::{
    Options, Persist, Registry, Value, from_bytes, from_bytes_with, to_bytes,
    to_bytes_with,
};
use skein_integration_test::{
    Member, Meters, Puppy, Stroke, Team, meters_driver, round_trip,
};

#[test]
fn team_round_trips_structurally() {
    let registry = Registry::new();
    let team = Team::sample();

    let back = round_trip(&team, &registry);

    assert_eq!(*back, *team);
    assert_eq!(back.stroke, Stroke::Dashed { on: 3, off: 1 });
    assert_eq!(back.kickoff.offset(), team.kickoff.offset());
    assert_eq!(back.budget.to_string(), "1250000.50");
}

#[test]
fn shared_instances_stay_shared() {
    let registry = Registry::new();
    let back = round_trip(&Team::sample(), &registry);

    // the lead is the first member, and mentors everyone else
    assert!(Arc::ptr_eq(&back.lead, &back.members[0]));
    for member in &back.members[1..] {
        assert!(Arc::ptr_eq(member.mentor.as_ref().unwrap(), &back.lead));
    }
}

#[test]
fn skipped_fields_read_back_as_default() {
    let registry = Registry::new();
    let back = round_trip(&Puppy::new("Rex", 9), &registry);

    assert_eq!(back.visits, 0);
    assert_eq!(back.age_weeks, 9);
    assert_eq!(back.dog.animal.name, "Rex");
    assert_eq!(back.dog.animal.legs, 4);
    assert!(back.dog.friend.is_empty());
}

#[test]
fn repeated_string_is_written_once() {
    let registry = Registry::new();
    let word = Value::from("shared");
    let list = Value::object(vec![word.clone(), word, Value::from("shared")]);

    let bytes = to_bytes(&list, &registry).unwrap();
    let occurrences =
        bytes.windows(b"shared".len()).filter(|w| w == b"shared").count();

    // two distinct instances with equal contents are two strings
    assert_eq!(occurrences, 2);

    let back = from_bytes(&bytes, &registry).unwrap();
    let items = back.downcast_ref::<Vec<Value>>().unwrap();
    let [Value::String(a), Value::String(b), Value::String(c)] = &items[..]
    else {
        panic!("expected three strings, found {items:?}");
    };

    assert!(Arc::ptr_eq(a, b));
    assert!(!Arc::ptr_eq(a, c));
    assert_eq!(a, c);
}

#[test]
fn scalars_at_the_root() {
    let registry = Registry::new();

    for value in [
        Value::Null,
        Value::Int32(i32::MIN),
        Value::UInt32(u32::MAX),
        Value::Double(-0.0),
        Value::Float(f32::EPSILON),
        Value::Char('🦀'),
        Value::from("text"),
        Value::Guid(uuid::Uuid::from_u128(7)),
        Value::TimeSpan(chrono::TimeDelta::microseconds(-250)),
    ] {
        let back = from_bytes(&to_bytes(&value, &registry).unwrap(), &registry)
            .unwrap();
        assert_eq!(back, value);
    }
}

#[test]
fn boxed_primitives_travel_as_objects() {
    let registry = Registry::new();
    let value = Value::object(12_345_678_901_i64);

    let back = from_bytes(&to_bytes(&value, &registry).unwrap(), &registry)
        .unwrap();

    assert_eq!(back.downcast_ref::<i64>(), Some(&12_345_678_901));
}

#[test]
fn dictionaries_can_be_roots() {
    let registry = Registry::new();
    registry.resolve_map::<String, i32, RandomState>().unwrap();

    let map = HashMap::from([("one".to_owned(), 1), ("two".to_owned(), 2)]);
    let bytes = to_bytes(&Value::object(map.clone()), &registry).unwrap();
    let back = from_bytes(&bytes, &registry).unwrap();

    assert_eq!(back.downcast_ref::<HashMap<String, i32>>(), Some(&map));
}

#[test]
fn external_types_round_trip() {
    let registry = Registry::new();
    registry.register_external(meters_driver()).unwrap();

    let bytes = to_bytes(&Value::object(Meters(42.5)), &registry).unwrap();
    let back = from_bytes(&bytes, &registry).unwrap();

    assert_eq!(back.downcast_ref::<Meters>(), Some(&Meters(42.5)));
}

#[test]
fn sentinels_round_trip() {
    let registry = Registry::new();
    registry.resolve::<Team>().unwrap();
    let options = Options::new().with_sentinels(true);
    let team = Team::sample();

    let plain = to_bytes(&Value::shared(&team), &registry).unwrap();
    let checked =
        to_bytes_with(&Value::shared(&team), &registry, options).unwrap();
    assert!(checked.len() > plain.len());

    let back = from_bytes_with(&checked, &registry, options)
        .unwrap()
        .downcast::<Team>()
        .unwrap();
    assert_eq!(*back, *team);
}

#[test]
fn long_chains_within_the_depth_limit() {
    let registry = Registry::new();
    let lineage = Member::lineage(Options::DEFAULT_MAX_DEPTH / 2);

    let back = round_trip(&lineage, &registry);

    assert_eq!(*back, *lineage);
}

#[derive(Debug, PartialEq, Persist)]
#[persist(version = 0, name = "test.Samples")]
struct Samples {
    ints: Vec<i64>,
    words: Vec<String>,
    flags: Option<Vec<bool>>,
}

proptest! {
    #[test]
    fn lists_of_primitives_round_trip(
        ints in proptest::collection::vec(any::<i64>(), 0..64),
        words in proptest::collection::vec("\\PC{0,12}", 0..16),
        flags in proptest::option::of(
            proptest::collection::vec(any::<bool>(), 0..16),
        ),
    ) {
        let registry = Registry::new();
        let samples = Arc::new(Samples { ints, words, flags });

        let back = round_trip(&samples, &registry);

        prop_assert_eq!(&*back, &*samples);
    }
}
