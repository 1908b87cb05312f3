use proptest::prelude::*;

use super::*;
use crate::{Link, Persist, from_bytes, writer::GraphWriter};

#[derive(Debug, Persist)]
#[persist(version = 0, name = "test.Strict")]
struct Strict {
    next: Option<Arc<Strict>>,
}

#[derive(Debug, Persist)]
#[persist(version = 0, name = "test.Knot")]
struct Knot {
    label: String,
    next: Link<Knot>,
}

fn write_all(
    values: &[Value],
    registry: &Registry,
    options: Options,
) -> Vec<u8> {
    let mut bytes = Vec::new();
    let mut writer = GraphWriter::with_options(&mut bytes, registry, options);

    for value in values {
        writer.write_value(value).unwrap();
    }

    writer.finish().unwrap();
    bytes
}

fn read_one(bytes: &[u8], registry: &Registry) -> Result<Value> {
    let mut stream = bytes;
    let mut reader = GraphReader::new(&mut stream, registry);
    reader.read_value()
}

fn chain(len: usize) -> Arc<Strict> {
    (1..len).fold(Arc::new(Strict { next: None }), |next, _| {
        Arc::new(Strict { next: Some(next) })
    })
}

#[test]
fn object_table_reports_reserved_slots_as_pending() {
    let mut table = ObjectTable::default();
    let index = table.reserve();

    assert_eq!(table.fetch(index), Fetched::Pending(index));
    assert!(matches!(
        table.get(index),
        Err(Error::UnresolvedReference { index: 0 })
    ));

    table.fill(index, Value::Int32(7));
    assert_eq!(table.fetch(index), Fetched::Ready(Value::Int32(7)));
    assert_eq!(table.len(), 1);
}

#[test]
fn reads_values_in_stream_order() {
    let registry = Registry::new();
    let values = [
        Value::Null,
        Value::Int32(-3),
        Value::from("hi"),
        Value::Char('λ'),
        Value::Double(0.25),
    ];
    let bytes = write_all(&values, &registry, Options::default());

    let mut stream = bytes.as_slice();
    let mut reader = GraphReader::new(&mut stream, &registry);
    for expected in &values {
        assert_eq!(&reader.read_value().unwrap(), expected);
    }

    assert_eq!(reader.position(), bytes.len() as u64);
    reader.finish().unwrap();
}

#[test]
fn repeated_string_becomes_a_reference() {
    let registry = Registry::new();
    let shared = Value::from("hi");
    let bytes =
        write_all(&[shared.clone(), shared], &registry, Options::default());

    assert_eq!(bytes, [0x01, 0x02, b'h', b'i', 0xFD, 0x00]);

    let mut stream = bytes.as_slice();
    let mut reader = GraphReader::new(&mut stream, &registry);
    let (Value::String(first), Value::String(second)) =
        (reader.read_value().unwrap(), reader.read_value().unwrap())
    else {
        panic!("expected two strings");
    };

    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn bare_root_is_an_empty_object() {
    let registry = Registry::new();
    let bytes =
        write_all(&[Value::object(Root)], &registry, Options::default());

    assert_eq!(bytes, [0xFE, 0x00]);
    let value = read_one(&bytes, &registry).unwrap();
    assert!(value.downcast_ref::<Root>().is_some());
}

#[test]
fn unknown_marker_is_rejected() {
    let registry = Registry::new();

    assert!(matches!(
        read_one(&[0x42], &registry),
        Err(Error::InvalidMarker(0x42))
    ));
    assert!(matches!(
        read_one(&[0xFC, 0, 0, 0, 0], &registry),
        Err(Error::InvalidMarker(0xFC))
    ));
}

#[test]
fn reference_past_the_table_is_unresolved() {
    let registry = Registry::new();

    assert!(matches!(
        read_one(&[0xFD, 0x05], &registry),
        Err(Error::UnresolvedReference { index: 5 })
    ));
}

#[test]
fn out_of_order_index_is_rejected() {
    let registry = Registry::new();

    assert!(matches!(
        read_one(&[0xFE, 0x03], &registry),
        Err(Error::IndexMismatch { expected: 0, found: 3 })
    ));
}

#[test]
fn truncated_stream_is_an_io_error() {
    let registry = Registry::new();

    assert!(matches!(read_one(&[0x02, 0x01], &registry), Err(Error::Io(_))));
}

#[test]
fn trailing_bytes_are_rejected() {
    let registry = Registry::new();

    assert!(matches!(
        from_bytes(&[0x00, 0x00], &registry),
        Err(Error::InvalidData(_))
    ));
}

#[test]
fn sentinel_reports_what_it_found() {
    let registry = Registry::new();
    let bytes = [0xFC, 0x07, 0x00, 0x00, 0x00, 0x02];
    let options = Options::new().with_sentinels(true);

    let mut stream = &bytes[..];
    let mut reader = GraphReader::with_options(&mut stream, &registry, options);
    reader.expect_sentinel(7).unwrap();

    let error = reader.expect_sentinel(7).unwrap_err();
    assert!(matches!(
        error,
        Error::SentinelMismatch { expected: 7, found: None, .. }
    ));
}

#[test]
fn sentinels_are_ignored_when_disabled() {
    let registry = Registry::new();
    let mut stream: &[u8] = &[];
    let mut reader = GraphReader::new(&mut stream, &registry);

    reader.expect_sentinel(1).unwrap();
}

#[test]
fn back_reference_into_an_arc_field_is_cyclic() {
    let registry = Registry::new();
    registry.resolve::<Strict>().unwrap();

    let mut bytes = vec![0xFF, 0x00, 0x02, 0x0B];
    bytes.extend_from_slice(b"test.Strict");
    bytes.extend_from_slice(&[0x00, 0x01, 0xFD, 0x00]);

    assert!(matches!(
        read_one(&bytes, &registry),
        Err(Error::CyclicReference { index: 0 })
    ));
}

#[test]
fn newer_stream_version_is_a_layout_mismatch() {
    let registry = Registry::new();
    registry.resolve::<Strict>().unwrap();

    let mut bytes = vec![0xFF, 0x00, 0x02, 0x0B];
    bytes.extend_from_slice(b"test.Strict");
    bytes.extend_from_slice(&[0x05, 0x01, 0x00]);

    assert!(matches!(
        read_one(&bytes, &registry),
        Err(Error::LayoutMismatch { .. })
    ));
}

#[test]
fn unregistered_stream_type_is_unknown() {
    let registry = Registry::new();

    let mut bytes = vec![0xFF, 0x00, 0x02, 0x09];
    bytes.extend_from_slice(b"test.Gone");
    bytes.extend_from_slice(&[0x00, 0x01]);

    let error = read_one(&bytes, &registry).unwrap_err();
    assert!(matches!(
        &error,
        Error::UnknownType { type_name } if type_name == "test.Gone"
    ));
}

#[test]
fn nesting_limit_applies_to_both_sides() {
    let registry = Registry::new();
    registry.resolve::<Strict>().unwrap();
    let shallow = Options::new().with_max_depth(2);
    let root = Value::shared(&chain(3));

    let mut bytes = Vec::new();
    let mut writer = GraphWriter::with_options(&mut bytes, &registry, shallow);
    assert!(matches!(
        writer.write_value(&root),
        Err(Error::DepthExceeded { limit: 2 })
    ));

    let bytes = write_all(&[root], &registry, Options::default());
    let mut stream = bytes.as_slice();
    let mut reader = GraphReader::with_options(&mut stream, &registry, shallow);
    assert!(matches!(
        reader.read_value(),
        Err(Error::DepthExceeded { limit: 2 })
    ));
}

#[tracing_test::traced_test]
#[test]
fn link_to_an_instance_under_construction_is_deferred() {
    let registry = Registry::new();
    registry.resolve::<Knot>().unwrap();
    let knot = Arc::new(Knot { label: "loop".to_owned(), next: Link::empty() });
    knot.next.set(Some(knot.clone()));

    let bytes =
        write_all(&[Value::shared(&knot)], &registry, Options::default());
    knot.next.set(None);

    let mut stream = bytes.as_slice();
    let mut reader = GraphReader::new(&mut stream, &registry);
    let back = reader.read_value().unwrap().downcast::<Knot>().unwrap();

    assert_eq!(back.label, "loop");
    assert!(back.next.points_to(&back));
    assert_eq!(reader.objects().len(), 1);
    assert!(logs_contain("resolving deferred references"));

    reader.finish().unwrap();
    back.next.set(None);
}

#[test]
fn finish_runs_actions_deferred_outside_a_read() {
    let registry = Registry::new();
    let bytes =
        write_all(&[Value::from("kept")], &registry, Options::default());

    let mut stream = bytes.as_slice();
    let mut reader = GraphReader::new(&mut stream, &registry);
    reader.read_value().unwrap();

    let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let single = seen.clone();
    reader.defer(0, move |value| {
        single.lock().push(value);
        Ok(())
    });
    let paired = seen.clone();
    reader.defer_pair(move |objects| {
        paired.lock().push(objects.get(0)?);
        Ok(())
    });

    reader.finish().unwrap();
    assert_eq!(*seen.lock(), [Value::from("kept"), Value::from("kept")]);
}

#[test]
fn finish_reports_a_paired_action_left_unresolved() {
    let registry = Registry::new();
    let mut stream: &[u8] = &[];
    let mut reader = GraphReader::new(&mut stream, &registry);

    reader.defer_pair(|objects| objects.get(3).map(drop));

    assert!(matches!(
        reader.finish(),
        Err(Error::UnresolvedReference { index: 3 })
    ));
}

fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<i32>().prop_map(Value::Int32),
        any::<u32>().prop_map(Value::UInt32),
        any::<f64>().prop_map(Value::Double),
        any::<f32>().prop_map(Value::Float),
        any::<char>().prop_map(Value::Char),
        ".{0,16}".prop_map(Value::from),
        any::<[u8; 16]>()
            .prop_map(|bytes| Value::Guid(uuid::Uuid::from_bytes(bytes))),
    ]
}

proptest! {
    #[test]
    fn scalar_sequences_read_back_equal(
        values in proptest::collection::vec(scalar(), 0..32),
        sentinels in any::<bool>(),
    ) {
        let registry = Registry::new();
        let options = Options::new().with_sentinels(sentinels);
        let bytes = write_all(&values, &registry, options);

        let mut stream = bytes.as_slice();
        let mut reader =
            GraphReader::with_options(&mut stream, &registry, options);
        for expected in &values {
            prop_assert_eq!(&reader.read_value().unwrap(), expected);
        }
        prop_assert_eq!(reader.position(), bytes.len() as u64);
    }
}
