//! Independent sessions sharing one registry from many threads.
#![allow(missing_docs)]

use std::{sync::Arc, thread};

use skein_serialize::{Registry, Value, from_bytes, to_bytes};
use skein_integration_test::{Dog, Node, Puppy, Team, bytes_of};

#[test]
fn parallel_sessions_agree() {
    let registry = Registry::new();
    let team = Team::sample();
    let expected = bytes_of(&team, &registry);

    thread::scope(|scope| {
        let handles = (0..8)
            .map(|_| {
                scope.spawn(|| {
                    let bytes =
                        to_bytes(&Value::shared(&team), &registry).unwrap();
                    let back = from_bytes(&bytes, &registry)
                        .unwrap()
                        .downcast::<Team>()
                        .unwrap();

                    assert_eq!(*back, *team);
                    bytes
                })
            })
            .collect::<Vec<_>>();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), expected);
        }
    });
}

#[test]
fn drivers_resolve_lazily_across_threads() {
    let registry = Registry::new();

    thread::scope(|scope| {
        for index in 0..8_u16 {
            let registry = &registry;
            scope.spawn(move || {
                let puppy = Puppy::new("Rex", index);
                let bytes = bytes_of(&puppy, registry);
                let back = from_bytes(&bytes, registry)
                    .unwrap()
                    .downcast::<Puppy>()
                    .unwrap();

                assert_eq!(back.age_weeks, index);
            });
        }
    });

    // the whole chain was installed once
    assert!(registry.get_by_name("zoo.Puppy").is_some());
    assert!(registry.get_by_name("zoo.Dog").is_some());
    assert_eq!(
        registry.get_by_name("zoo.Dog").unwrap().runtime_type(),
        std::any::TypeId::of::<Dog>()
    );
}

#[test]
fn graphs_cross_threads() {
    let registry = Arc::new(Registry::new());
    let ring = Node::ring(&["ping", "pong"]);
    let bytes = bytes_of(&ring[0], &registry);
    Node::unlink(&ring);

    let reader = {
        let registry = registry.clone();
        thread::spawn(move || {
            from_bytes(&bytes, &registry).unwrap().downcast::<Node>().unwrap()
        })
    };

    let ping = reader.join().unwrap();
    let pong = ping.next.get().unwrap();

    assert_eq!(pong.name, "pong");
    assert!(pong.next.points_to(&ping));

    Node::unlink(&[ping, pong]);
}
