//! Shared model types for the skein integration tests and benchmarks.
//!
//! The model is a small domain that touches every part of the codec:
//! shared and cyclic references, base-to-derived chains with evolving
//! versions, mono- and poly-typed containers, custom comparers, external
//! drivers and every built-in primitive.

#![allow(missing_docs)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_const_for_fn)]

use std::{
    collections::{BTreeMap, HashMap},
    hash::{BuildHasher, DefaultHasher, Hasher},
    sync::Arc,
};

use chrono::{DateTime, FixedOffset, TimeDelta, Utc};
use skein_serialize::{
    Comparer, Decimal, Decode, Decoder, Encode, Encoder, ExternalDriver,
    GraphReader, GraphWriter, Link, Persist, PersistEnum, Properties, Registry,
    Result, Root, SharedMap, Value,
};
use uuid::Uuid;

// ============================================================================
// Cyclic Nodes
// ============================================================================

/// A named node whose successor may close a cycle.
#[derive(Debug, Persist)]
#[persist(version = 0, name = "model.Node")]
pub struct Node {
    pub name: String,
    pub next: Link<Node>,
}

impl Node {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self { name: name.to_owned(), next: Link::empty() })
    }

    /// Builds `names.len()` nodes where each points to the following one and
    /// the last points back to the first.
    pub fn ring(names: &[&str]) -> Vec<Arc<Self>> {
        let nodes =
            names.iter().map(|name| Self::new(name)).collect::<Vec<_>>();

        for (index, node) in nodes.iter().enumerate() {
            let next = &nodes[(index + 1) % nodes.len()];
            node.next.set(Some(next.clone()));
        }

        nodes
    }

    /// Breaks the cycle so the ring can be dropped.
    pub fn unlink(nodes: &[Arc<Self>]) {
        for node in nodes {
            node.next.set(None);
        }
    }
}

/// The same stream layout as [`Node`], but the successor is a plain `Arc`
/// and therefore cannot be read while its target is under construction.
#[derive(Debug, Persist)]
#[persist(version = 0, name = "model.Node")]
pub struct StrictNode {
    pub name: String,
    pub next: Option<Arc<StrictNode>>,
}

/// Holds its follower through a [`Link`], so the follower may point back.
#[derive(Debug, Persist)]
#[persist(version = 0, name = "model.Lead")]
pub struct Lead {
    pub follower: Link<Follower>,
}

/// Holds its lead through a plain `Arc`.
#[derive(Debug, Persist)]
#[persist(version = 0, name = "model.Follower")]
pub struct Follower {
    pub lead: Arc<Lead>,
}

impl Lead {
    /// A lead and a follower pointing at each other.
    pub fn pair() -> (Arc<Self>, Arc<Follower>) {
        let lead = Arc::new(Self { follower: Link::empty() });
        let follower = Arc::new(Follower { lead: lead.clone() });
        lead.follower.set(Some(follower.clone()));

        (lead, follower)
    }
}

// ============================================================================
// Organization
// ============================================================================

/// A plain value type, written inline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Encode, Decode)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

/// An inline enum with payloads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Encode, Decode)]
pub enum Stroke {
    #[default]
    Hidden,
    Solid(u8),
    Dashed { on: u16, off: u16 },
}

#[derive(Debug, PartialEq, Persist)]
#[persist(version = 0, name = "org.Member")]
pub struct Member {
    pub name: String,
    pub age: u8,
    pub mentor: Option<Arc<Member>>,
}

impl Member {
    pub fn new(name: &str, age: u8, mentor: Option<Arc<Self>>) -> Arc<Self> {
        Arc::new(Self { name: name.to_owned(), age, mentor })
    }

    /// A chain of `depth` members, each mentored by the previous one.
    pub fn lineage(depth: usize) -> Arc<Self> {
        let mut current = Self::new("founder", 90, None);

        for generation in 1..depth {
            let age = u8::try_from(90 - (generation % 80)).unwrap_or(18);
            let name = format!("apprentice {generation}");
            current = Self::new(&name, age, Some(current));
        }

        current
    }
}

/// A graph with shared members and one field of every primitive family.
#[derive(Debug, PartialEq, Persist)]
#[persist(version = 0, name = "org.Team")]
pub struct Team {
    pub title: String,
    pub lead: Arc<Member>,
    pub members: Vec<Arc<Member>>,
    pub id: Uuid,
    pub founded: DateTime<Utc>,
    pub kickoff: DateTime<FixedOffset>,
    pub sprint: TimeDelta,
    pub budget: Decimal,
    pub ratio: f32,
    pub checksum: u128,
    pub initial: char,
    pub scores: BTreeMap<String, i64>,
    pub stroke: Stroke,
    pub origin: Point,
}

impl Team {
    /// A team whose lead is also its first member.
    pub fn sample() -> Arc<Self> {
        let ada = Member::new("Ada", 36, None);
        let grace = Member::new("Grace", 45, Some(ada.clone()));
        let edsger = Member::new("Edsger", 41, Some(ada.clone()));

        let founded =
            DateTime::from_timestamp(1_700_000_000, 123_456_700).unwrap();
        let offset = FixedOffset::east_opt(2 * 3600).unwrap();

        Arc::new(Self {
            title: "compilers".to_owned(),
            lead: ada.clone(),
            members: vec![ada, grace, edsger],
            id: Uuid::from_u128(0x0123_4567_89ab_cdef_0123_4567_89ab_cdef),
            founded,
            kickoff: founded.with_timezone(&offset),
            sprint: TimeDelta::days(14),
            budget: Decimal::new(125_000_050, 2).unwrap(),
            ratio: 0.75,
            checksum: u128::MAX - 7,
            initial: 'λ',
            scores: BTreeMap::from([
                ("parsing".to_owned(), 9),
                ("codegen".to_owned(), -2),
            ]),
            stroke: Stroke::Dashed { on: 3, off: 1 },
            origin: Point { x: -4, y: 11 },
        })
    }
}

// ============================================================================
// Zoo: base-to-derived chains
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PersistEnum)]
#[persist(name = "paint.Color")]
#[repr(u8)]
pub enum Color {
    Red = 1,
    Green = 2,
    Blue = 3,
}

#[derive(Debug, Persist)]
#[persist(version = 2, name = "zoo.Animal", export)]
pub struct Animal {
    pub name: String,
    #[persist(since = 1)]
    pub legs: u8,
    #[persist(since = 2)]
    pub weight: f64,
}

#[derive(Debug, Persist)]
#[persist(version = 1, name = "zoo.Dog", export)]
pub struct Dog {
    #[persist(base)]
    pub animal: Animal,
    pub coat: Color,
    #[persist(since = 1)]
    pub friend: Link<Dog>,
}

#[derive(Debug, Persist)]
#[persist(version = 0, name = "zoo.Puppy", export)]
pub struct Puppy {
    #[persist(base)]
    pub dog: Dog,
    pub age_weeks: u16,
    #[persist(skip)]
    pub visits: u32,
}

impl Puppy {
    pub fn new(name: &str, age_weeks: u16) -> Arc<Self> {
        Arc::new(Self {
            dog: Dog {
                animal: Animal { name: name.to_owned(), legs: 4, weight: 3.5 },
                coat: Color::Blue,
                friend: Link::empty(),
            },
            age_weeks,
            visits: 12,
        })
    }
}

/// `zoo.Animal` as it was first released.
#[derive(Debug, Persist)]
#[persist(version = 0, name = "zoo.Animal")]
pub struct AnimalV0 {
    pub name: String,
}

/// `zoo.Dog` as it was first released, on top of the first animal.
#[derive(Debug, Persist)]
#[persist(version = 0, name = "zoo.Dog")]
pub struct DogV0 {
    #[persist(base)]
    pub animal: AnimalV0,
    pub coat: Color,
}

// ============================================================================
// People: a hand-written version branch
// ============================================================================

/// The first release of `people.Person`, whose name was optional.
#[derive(Debug, Persist)]
#[persist(version = 0, name = "people.Person")]
pub struct PersonV0 {
    pub name: Option<String>,
}

/// The current `people.Person`: the name became mandatory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Person {
    pub name: String,
}

impl Person {
    /// Stands in for a name that an old stream never recorded.
    pub const UNNAMED: &'static str = "(unnamed)";
}

impl Persist for Person {
    const TYPE_NAME: &'static str = "people.Person";
    const VERSION: u32 = 1;

    type Base = Root;

    fn base(&self) -> &Root { &Root }

    fn write(&self, writer: &mut GraphWriter<'_>) -> Result<()> {
        writer.write(&self.name)
    }

    fn read(
        _: Root,
        reader: &mut GraphReader<'_>,
        version: u32,
    ) -> Result<Self> {
        let name = match version {
            0 => reader
                .read::<Option<String>>()?
                .unwrap_or_else(|| Self::UNNAMED.to_owned()),
            _ => reader.read::<String>()?,
        };

        Ok(Self { name })
    }
}

// ============================================================================
// Drawings: mono- and poly-typed containers
// ============================================================================

#[derive(Debug, PartialEq, Persist)]
#[persist(version = 0, name = "paint.Circle", export)]
pub struct Circle {
    pub radius: f64,
}

#[derive(Debug, PartialEq, Persist)]
#[persist(version = 0, name = "paint.Square", export)]
pub struct Square {
    pub side: f64,
}

/// A gallery whose element type is sealed: elements skip their descriptors.
#[derive(Debug, Persist)]
#[persist(version = 0, name = "paint.Gallery")]
pub struct Gallery {
    pub items: Vec<Arc<Circle>>,
}

/// The same stream name with an open element type: every element carries
/// its own descriptor.
#[derive(Debug, Persist)]
#[persist(version = 0, name = "paint.Gallery")]
pub struct OpenGallery {
    pub items: Vec<Value>,
}

/// Shapes of mixed types, a palette and an optional caption.
#[derive(Debug, Persist)]
#[persist(version = 0, name = "paint.Drawing")]
pub struct Drawing {
    pub shapes: Vec<Value>,
    pub palette: BTreeMap<String, Color>,
    pub caption: Option<Arc<str>>,
    pub weights: Option<Vec<f64>>,
}

// ============================================================================
// Catalog: a dictionary with a custom comparer
// ============================================================================

/// A deterministic hasher state that records its seed in the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeededState {
    pub seed: u64,
}

impl BuildHasher for SeededState {
    type Hasher = DefaultHasher;

    fn build_hasher(&self) -> DefaultHasher {
        let mut hasher = DefaultHasher::new();
        hasher.write_u64(self.seed);
        hasher
    }
}

impl Comparer for SeededState {
    fn write_comparer(&self, writer: &mut GraphWriter<'_>) -> Result<()> {
        writer.write_value(&Value::object(self.seed))
    }

    fn read_comparer(reader: &mut GraphReader<'_>) -> Result<Self> {
        let seed = reader.read_value()?.downcast::<u64>()?;
        Ok(Self { seed: *seed })
    }
}

#[derive(Debug, PartialEq, Persist)]
#[persist(version = 0, name = "shop.Catalog")]
pub struct Catalog {
    pub prices: HashMap<String, i32, SeededState>,
}

// ============================================================================
// Directories: dictionaries that close cycles
// ============================================================================

#[derive(Debug, Persist)]
#[persist(version = 0, name = "fs.Directory")]
pub struct Directory {
    pub name: String,
    pub entries: SharedMap<String, Arc<Directory>>,
}

impl Directory {
    /// A directory listing itself as `.` and a child that lists it as `..`.
    pub fn with_child(name: &str, child: &str) -> Arc<Self> {
        let parent = Arc::new(Self {
            name: name.to_owned(),
            entries: SharedMap::new(),
        });
        let child = Arc::new(Self {
            name: child.to_owned(),
            entries: SharedMap::new(),
        });

        parent.entries.insert(".".to_owned(), parent.clone());
        parent.entries.insert(child.name.clone(), child.clone());
        child.entries.insert("..".to_owned(), parent.clone());

        parent
    }

    /// Empties every reachable directory so the cycle can be dropped.
    pub fn clear(&self) {
        let entries = self.entries.write().drain().collect::<Vec<_>>();

        for (name, entry) in entries {
            if name != "." && name != ".." {
                entry.clear();
            }
        }
    }
}

// ============================================================================
// External types
// ============================================================================

/// A length that does not describe itself.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Meters(pub f64);

/// A complete driver for [`Meters`].
pub fn meters_driver() -> ExternalDriver<Meters> {
    ExternalDriver::<Meters>::new("geo.Meters")
        .serialize(|meters, writer| Ok(writer.emit_f64(meters.0)?))
        .deserialize(|reader| Ok(Meters(reader.read_f64()?)))
        .export(|meters, properties: &mut Properties| {
            properties.insert("meters", meters.0);
            Ok(())
        })
}

/// A type that is never given a driver.
#[derive(Debug)]
pub struct Unregistered;

/// Reads back one generation newer than it wrote, so it can never
/// serialize identically twice.
#[derive(Debug)]
pub struct Generation(pub u32);

impl Persist for Generation {
    const TYPE_NAME: &'static str = "model.Generation";
    const VERSION: u32 = 0;

    type Base = Root;

    fn base(&self) -> &Root { &Root }

    fn write(&self, writer: &mut GraphWriter<'_>) -> Result<()> {
        writer.write(&self.0)
    }

    fn read(_: Root, reader: &mut GraphReader<'_>, _: u32) -> Result<Self> {
        Ok(Self(reader.read::<u32>()? + 1))
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Writes `value` as the root of a new stream.
///
/// # Panics
///
/// Panics if the value cannot be written.
pub fn bytes_of<T: Persist>(value: &Arc<T>, registry: &Registry) -> Vec<u8> {
    registry.resolve::<T>().unwrap();
    skein_serialize::to_bytes(&Value::shared(value), registry).unwrap()
}

/// Reads a stream whose root is a `T`.
///
/// # Panics
///
/// Panics if the stream cannot be read or its root is not a `T`.
pub fn read_root<T: Persist>(bytes: &[u8], registry: &Registry) -> Arc<T> {
    registry.resolve::<T>().unwrap();
    skein_serialize::from_bytes(bytes, registry)
        .unwrap()
        .downcast::<T>()
        .unwrap()
}

/// Writes `value` and reads it back.
///
/// # Panics
///
/// Panics if either direction fails.
pub fn round_trip<T: Persist>(value: &Arc<T>, registry: &Registry) -> Arc<T> {
    read_root(&bytes_of(value, registry), registry)
}
