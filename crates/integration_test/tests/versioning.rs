//! Streams written by older declarations of a type, read by newer ones.
#![allow(missing_docs)]

use std::sync::Arc;

use skein_serialize::{Error, Link, Registry, from_bytes};
use skein_integration_test::{
    Animal, AnimalV0, Color, Dog, DogV0, Person, PersonV0, bytes_of,
    read_root, round_trip,
};

/// `people.Person` version 0 with no name, as its first release wrote it.
fn unnamed_person_v0() -> Vec<u8> {
    let mut bytes = vec![0xFF, 0x00, 0x02, 0x0D];
    bytes.extend_from_slice(b"people.Person");
    bytes.extend_from_slice(&[0x00, 0x01, 0x00]);
    bytes
}

#[test]
fn old_declaration_writes_the_recorded_layout() {
    let registry = Registry::new();
    let bytes = bytes_of(&Arc::new(PersonV0 { name: None }), &registry);

    assert_eq!(bytes, unnamed_person_v0());
}

#[test]
fn missing_name_reads_as_unnamed() {
    let registry = Registry::new();

    let person = read_root::<Person>(&unnamed_person_v0(), &registry);

    assert_eq!(person.name, Person::UNNAMED);
}

#[test]
fn recorded_name_survives_the_upgrade() {
    let old = Registry::new();
    let bytes =
        bytes_of(&Arc::new(PersonV0 { name: Some("Ada".to_owned()) }), &old);

    let person = read_root::<Person>(&bytes, &Registry::new());

    assert_eq!(person.name, "Ada");
}

#[test]
fn current_version_round_trips() {
    let registry = Registry::new();
    let person = Arc::new(Person { name: "Grace".to_owned() });

    assert_eq!(*round_trip(&person, &registry), *person);
}

#[test]
fn every_level_reads_at_its_own_version() {
    let old = Registry::new();
    let dog = Arc::new(DogV0 {
        animal: AnimalV0 { name: "Laika".to_owned() },
        coat: Color::Green,
    });
    let bytes = bytes_of(&dog, &old);

    let dog = read_root::<Dog>(&bytes, &Registry::new());

    assert_eq!(dog.animal.name, "Laika");
    assert_eq!(dog.animal.legs, 0);
    assert!(dog.animal.weight.abs() < f64::EPSILON);
    assert_eq!(dog.coat, Color::Green);
    assert!(dog.friend.is_empty());
}

#[test]
fn newer_stream_than_the_local_declaration_is_rejected() {
    let new = Registry::new();
    let animal = Arc::new(Animal {
        name: "Hachiko".to_owned(),
        legs: 4,
        weight: 41.0,
    });
    let bytes = bytes_of(&animal, &new);

    let old = Registry::new();
    old.resolve::<AnimalV0>().unwrap();

    let error = from_bytes(&bytes, &old).unwrap_err();
    assert!(matches!(
        &error,
        Error::LayoutMismatch { type_name, .. } if type_name == "zoo.Animal"
    ));
}

#[test]
fn links_added_in_a_later_version_round_trip() {
    let registry = Registry::new();
    let rex = Arc::new(Dog {
        animal: Animal { name: "Rex".to_owned(), legs: 4, weight: 30.5 },
        coat: Color::Red,
        friend: Link::empty(),
    });
    let fido = Arc::new(Dog {
        animal: Animal { name: "Fido".to_owned(), legs: 3, weight: 12.0 },
        coat: Color::Blue,
        friend: Link::new(rex.clone()),
    });
    rex.friend.set(Some(fido.clone()));

    let back = round_trip(&fido, &registry);
    let friend = back.friend.get().unwrap();

    assert_eq!(friend.animal.name, "Rex");
    assert_eq!(friend.coat, Color::Red);
    assert!(friend.friend.points_to(&back));

    rex.friend.set(None);
    friend.friend.set(None);
}
