//! Mono- and poly-typed containers, nullable containers and comparers.
#![allow(missing_docs)]

use std::{collections::BTreeMap, sync::Arc};

use skein_serialize::{Error, Registry, Value, from_bytes};
use skein_integration_test::{
    Catalog, Circle, Color, Drawing, Gallery, OpenGallery, SeededState,
    Square, bytes_of, read_root, round_trip,
};

fn circles() -> Vec<Arc<Circle>> {
    vec![Arc::new(Circle { radius: 1.0 }), Arc::new(Circle { radius: 2.5 })]
}

fn open_gallery_bytes() -> Vec<u8> {
    let registry = Registry::new();
    registry.resolve::<Circle>().unwrap();

    let items = circles().iter().map(Value::shared).collect();
    bytes_of(&Arc::new(OpenGallery { items }), &registry)
}

#[test]
fn sealed_elements_skip_their_descriptors() {
    let sealed =
        bytes_of(&Arc::new(Gallery { items: circles() }), &Registry::new());
    let open = open_gallery_bytes();

    // the open list repeats the element descriptor reference per element
    assert!(sealed.len() < open.len());

    let back = read_root::<Gallery>(&sealed, &Registry::new());
    let radii = back.items.iter().map(|c| c.radius).collect::<Vec<_>>();
    assert_eq!(radii, [1.0, 2.5]);
}

#[test]
fn poly_stream_reads_into_a_sealed_list() {
    let registry = Registry::new();
    registry.resolve::<Circle>().unwrap();

    let back = read_root::<Gallery>(&open_gallery_bytes(), &registry);

    assert_eq!(*back.items[0], Circle { radius: 1.0 });
    assert_eq!(*back.items[1], Circle { radius: 2.5 });
}

#[test]
fn mono_stream_cannot_fill_an_open_list() {
    let sealed =
        bytes_of(&Arc::new(Gallery { items: circles() }), &Registry::new());

    let registry = Registry::new();
    registry.resolve::<OpenGallery>().unwrap();
    registry.resolve::<Circle>().unwrap();

    assert!(matches!(
        from_bytes(&sealed, &registry),
        Err(Error::LayoutMismatch { .. })
    ));
}

#[test]
fn sealed_elements_keep_shared_identity() {
    let registry = Registry::new();
    let circle = Arc::new(Circle { radius: 4.0 });
    let gallery = Arc::new(Gallery {
        items: vec![circle.clone(), circle, Arc::new(Circle { radius: 4.0 })],
    });

    let back = round_trip(&gallery, &registry);

    assert!(Arc::ptr_eq(&back.items[0], &back.items[1]));
    assert!(!Arc::ptr_eq(&back.items[0], &back.items[2]));
    assert_eq!(back.items[0], back.items[2]);
}

#[test]
fn mixed_shapes_and_nullable_fields() {
    let registry = Registry::new();
    registry.resolve::<Circle>().unwrap();
    registry.resolve::<Square>().unwrap();

    let caption: Arc<str> = Arc::from("still life");
    let drawing = Arc::new(Drawing {
        shapes: vec![
            Value::shared(&Arc::new(Circle { radius: 3.0 })),
            Value::shared(&Arc::new(Square { side: 2.0 })),
            Value::Null,
            Value::Int32(7),
            Value::String(caption.clone()),
        ],
        palette: BTreeMap::from([
            ("sky".to_owned(), Color::Blue),
            ("grass".to_owned(), Color::Green),
        ]),
        caption: Some(caption),
        weights: None,
    });

    let back = round_trip(&drawing, &registry);

    assert_eq!(
        back.shapes[0].downcast_ref::<Circle>(),
        Some(&Circle { radius: 3.0 })
    );
    assert_eq!(
        back.shapes[1].downcast_ref::<Square>(),
        Some(&Square { side: 2.0 })
    );
    assert!(back.shapes[2].is_null());
    assert_eq!(back.shapes[3], Value::Int32(7));
    assert_eq!(back.palette, drawing.palette);
    assert!(back.weights.is_none());

    // the caption string was written once and referenced afterwards
    let Value::String(listed) = &back.shapes[4] else {
        panic!("expected a string, found {:?}", back.shapes[4]);
    };
    assert!(Arc::ptr_eq(listed, back.caption.as_ref().unwrap()));
}

#[test]
fn present_but_empty_containers_stay_present() {
    let registry = Registry::new();
    let drawing = Arc::new(Drawing {
        shapes: Vec::new(),
        palette: BTreeMap::new(),
        caption: None,
        weights: Some(Vec::new()),
    });

    let back = round_trip(&drawing, &registry);

    assert!(back.shapes.is_empty());
    assert!(back.caption.is_none());
    assert_eq!(back.weights.as_deref(), Some(&[][..]));
}

#[test]
fn custom_comparer_is_rebuilt() {
    let registry = Registry::new();
    let mut prices =
        std::collections::HashMap::with_hasher(SeededState { seed: 0xC0FFEE });
    prices.insert("tea".to_owned(), 3);
    prices.insert("cake".to_owned(), 5);
    let catalog = Arc::new(Catalog { prices });

    let back = round_trip(&catalog, &registry);

    assert_eq!(back.prices.hasher(), &SeededState { seed: 0xC0FFEE });
    assert_eq!(*back, *catalog);
}
