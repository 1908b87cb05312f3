//! Every failure a session can report, triggered through the public API.
#![allow(missing_docs)]

use std::sync::Arc;

use skein_serialize::{
    Capability, Error, ExternalDriver, Options, Registry, Value, from_bytes,
    from_bytes_with, to_bytes, to_bytes_with,
};
use skein_integration_test::{
    Member, Meters, Person, PersonV0, Team, Unregistered, bytes_of,
};

fn person_v0_bytes() -> Vec<u8> {
    bytes_of(&Arc::new(PersonV0 { name: None }), &Registry::new())
}

#[test]
fn unregistered_instance_has_no_driver() {
    let registry = Registry::new();

    let error =
        to_bytes(&Value::object(Unregistered), &registry).unwrap_err();

    assert!(matches!(
        &error,
        Error::MissingDriver { type_name }
            if type_name.ends_with("Unregistered")
    ));
    assert!(error.is_configuration());
    assert!(error.to_string().contains("Unregistered"));
}

#[test]
fn malformed_markers_and_type_codes() {
    let registry = Registry::new();

    assert!(matches!(
        from_bytes(&[0x42], &registry),
        Err(Error::InvalidMarker(0x42))
    ));
    assert!(matches!(
        from_bytes(&[0xFF, 0x00, 0x07], &registry),
        Err(Error::InvalidTypeCode(0x07))
    ));
}

#[test]
fn dangling_reference_is_unresolved() {
    let registry = Registry::new();

    let error = from_bytes(&[0xFD, 0x05], &registry).unwrap_err();

    assert!(matches!(error, Error::UnresolvedReference { index: 5 }));
    assert!(!error.is_configuration());
}

#[test]
fn retired_type_is_unknown() {
    let bytes = person_v0_bytes();

    let error = from_bytes(&bytes, &Registry::new()).unwrap_err();

    assert!(matches!(
        &error,
        Error::UnknownType { type_name } if type_name == "people.Person"
    ));
    assert_eq!(
        error.to_string(),
        "type `people.Person` is no longer serializable"
    );
}

#[test]
fn two_declarations_of_one_name_are_ambiguous() {
    let registry = Registry::new();
    registry.resolve::<PersonV0>().unwrap();

    assert!(matches!(
        registry.resolve::<Person>(),
        Err(Error::AmbiguousDeclaration { .. })
    ));
}

#[test]
fn sentinel_reader_on_a_plain_stream_fails() {
    let registry = Registry::new();
    registry.resolve::<Member>().unwrap();
    let list = Value::object(vec![
        Value::shared(&Member::new("Ada", 36, None)),
        Value::Int32(5),
    ]);
    let bytes = to_bytes(&list, &registry).unwrap();
    let options = Options::new().with_sentinels(true);

    let error = from_bytes_with(&bytes, &registry, options).unwrap_err();

    // the member is object #1, followed directly by the next element
    assert!(matches!(
        error,
        Error::SentinelMismatch { expected: 1, found: None, .. }
    ));
}

#[test]
fn plain_reader_on_a_sentinel_stream_fails() {
    let registry = Registry::new();
    registry.resolve::<Member>().unwrap();
    let options = Options::new().with_sentinels(true);
    let member = Value::shared(&Member::new("Ada", 36, None));

    let bytes = to_bytes_with(&member, &registry, options).unwrap();

    assert!(from_bytes(&bytes, &registry).is_err());
}

#[test]
fn downcast_to_the_wrong_type_is_a_mismatch() {
    let registry = Registry::new();
    let bytes = bytes_of(&Team::sample(), &registry);

    let value = from_bytes(&bytes, &registry).unwrap();

    assert!(matches!(
        value.downcast::<Member>(),
        Err(Error::TypeMismatch { found, .. }) if found.ends_with("Team")
    ));
}

#[test]
fn deep_graph_exceeds_the_limit() {
    let registry = Registry::new();
    registry.resolve::<Member>().unwrap();
    let lineage = Value::shared(&Member::lineage(40));
    let shallow = Options::new().with_max_depth(16);

    assert!(matches!(
        to_bytes_with(&lineage, &registry, shallow),
        Err(Error::DepthExceeded { limit: 16 })
    ));

    let bytes = to_bytes(&lineage, &registry).unwrap();
    assert!(matches!(
        from_bytes_with(&bytes, &registry, shallow),
        Err(Error::DepthExceeded { limit: 16 })
    ));
}

#[test]
fn skipped_object_index_is_out_of_order() {
    let registry = Registry::new();

    assert!(matches!(
        from_bytes(&[0xFE, 0x01], &registry),
        Err(Error::IndexMismatch { expected: 0, found: 1 })
    ));
}

#[test]
fn write_only_external_cannot_be_read() {
    let registry = Registry::new();
    registry
        .register_external(
            ExternalDriver::<Meters>::new("geo.Meters")
                .serialize(|meters, writer| {
                    Ok(skein_serialize::Encoder::emit_f64(writer, meters.0)?)
                }),
        )
        .unwrap();

    let bytes = to_bytes(&Value::object(Meters(1.0)), &registry).unwrap();

    assert!(matches!(
        from_bytes(&bytes, &registry),
        Err(Error::MissingCapability {
            capability: Capability::Deserialize,
            ..
        })
    ));
}
