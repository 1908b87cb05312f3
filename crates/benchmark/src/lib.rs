//! Graphs of a configurable shape for the skein benchmarks.

#![allow(missing_docs)]

use std::{collections::HashMap, sync::Arc};

use fxhash::FxBuildHasher;
use skein_integration_test::Member;
use skein_serialize::{Persist, Registry, Value};

/// A wide graph: many members sharing a handful of mentors, repeated tag
/// strings and a name index.
#[derive(Debug, Persist)]
#[persist(version = 0, name = "bench.Roster")]
pub struct Roster {
    pub members: Vec<Arc<Member>>,
    pub tags: Vec<Value>,
    pub index: HashMap<String, u32, FxBuildHasher>,
}

/// Builds a roster of `size` members.
#[must_use]
pub fn roster(size: u32) -> Arc<Roster> {
    let mentors = (0..8)
        .map(|i| Member::new(&format!("mentor {i}"), 60, None))
        .collect::<Vec<_>>();
    let tags = ["core", "tools", "docs", "infra"].map(Value::from);

    let mut members = Vec::new();
    let mut index = HashMap::default();

    for i in 0..size {
        let mentor = mentors[i as usize % mentors.len()].clone();
        let name = format!("member {i}");
        let age = u8::try_from(20 + i % 40).unwrap_or(20);

        index.insert(name.clone(), i);
        members.push(Member::new(&name, age, Some(mentor)));
    }

    let tags = (0..size).map(|i| tags[i as usize % tags.len()].clone());

    Arc::new(Roster { members, tags: tags.collect(), index })
}

/// A registry with every benchmarked type resolved.
///
/// # Panics
///
/// Panics if a declaration is rejected.
#[must_use]
pub fn registry() -> Registry {
    let registry = Registry::new();
    registry.resolve::<Roster>().unwrap();
    registry.resolve::<Member>().unwrap();
    registry
}
