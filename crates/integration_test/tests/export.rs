//! Flattening instances into named properties.
#![allow(missing_docs)]

use std::sync::Arc;

use skein_serialize::{Capability, Error, Object, Registry, Value};
use skein_integration_test::{
    Circle, Color, Member, Meters, Puppy, meters_driver,
};

#[test]
fn properties_follow_the_ancestor_chain() {
    let registry = Registry::new();
    registry.resolve::<Puppy>().unwrap();

    let puppy: Object = Puppy::new("Rex", 9);
    let properties = registry.export(&puppy).unwrap();

    let names = properties.iter().map(|(name, _)| name).collect::<Vec<_>>();
    assert_eq!(
        names,
        ["name", "legs", "weight", "coat", "friend", "age_weeks"]
    );

    assert_eq!(properties.get("name"), Some(&Value::from("Rex")));
    assert_eq!(properties.get("weight"), Some(&Value::Double(3.5)));
    assert_eq!(properties.get("friend"), Some(&Value::Null));
    assert_eq!(
        properties.get("coat").and_then(|coat| coat.downcast_ref::<Color>()),
        Some(&Color::Blue)
    );
    assert!(properties.get("visits").is_none());
}

#[test]
fn scalar_fields_export_as_scalars() {
    let registry = Registry::new();
    registry.resolve::<Circle>().unwrap();

    let circle: Object = Arc::new(Circle { radius: 0.5 });
    let properties = registry.export(&circle).unwrap();

    assert_eq!(properties.len(), 1);
    assert_eq!(properties.get("radius"), Some(&Value::Double(0.5)));
}

#[test]
fn external_export_runs_the_registered_function() {
    let registry = Registry::new();
    registry.register_external(meters_driver()).unwrap();

    let meters: Object = Arc::new(Meters(8.0));
    let properties = registry.export(&meters).unwrap();

    assert_eq!(properties.get("meters"), Some(&Value::Double(8.0)));
}

#[test]
fn boxed_primitives_export_their_value() {
    let registry = Registry::new();

    let object: Object = Arc::new(-12_i32);
    let properties = registry.export(&object).unwrap();

    assert_eq!(properties.get("value"), Some(&Value::Int32(-12)));
}

#[test]
fn types_without_export_report_the_missing_capability() {
    let registry = Registry::new();
    registry.resolve::<Member>().unwrap();

    let member: Object = Member::new("Ada", 36, None);

    assert!(matches!(
        registry.export(&member),
        Err(Error::MissingCapability { capability: Capability::Export, .. })
    ));
}
