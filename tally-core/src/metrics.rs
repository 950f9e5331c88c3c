//! Metric snapshots — named readings captured from the host once per tick.
//!
//! Numbers are graphed by the dashboard; text and percentages are only shown
//! in the metrics table.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::Arc;

const MS_PER_HOUR: f64 = 3_600_000.0;

/// Hourly rate of `count` over `elapsed_ms`. Zero when no time has elapsed.
pub fn per_hour(count: f64, elapsed_ms: u64) -> f64 {
    if elapsed_ms == 0 {
        return 0.0;
    }
    count * MS_PER_HOUR / elapsed_ms as f64
}

#[derive(Debug, Clone, PartialEq)]
pub enum MetricValue {
    Text(String),
    Integer(i64),
    Number(f64),
    Percent(f64),
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Text(s) => f.write_str(s),
            MetricValue::Integer(n) => write!(f, "{}", n),
            MetricValue::Number(n) => write!(f, "{}", n),
            MetricValue::Percent(p) => write!(f, "{}%", p),
        }
    }
}

impl Serialize for MetricValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            MetricValue::Text(s) => serializer.serialize_str(s),
            MetricValue::Integer(n) => serializer.serialize_i64(*n),
            MetricValue::Number(n) if n.is_finite() => serializer.serialize_f64(*n),
            MetricValue::Number(_) => serializer.serialize_f64(0.0),
            MetricValue::Percent(_) => serializer.collect_str(self),
        }
    }
}

impl From<&str> for MetricValue {
    fn from(v: &str) -> Self {
        MetricValue::Text(v.to_string())
    }
}

impl From<String> for MetricValue {
    fn from(v: String) -> Self {
        MetricValue::Text(v)
    }
}

impl From<f64> for MetricValue {
    fn from(v: f64) -> Self {
        MetricValue::Number(v)
    }
}

impl From<i64> for MetricValue {
    fn from(v: i64) -> Self {
        MetricValue::Integer(v)
    }
}

impl From<u64> for MetricValue {
    fn from(v: u64) -> Self {
        MetricValue::Integer(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<u32> for MetricValue {
    fn from(v: u32) -> Self {
        MetricValue::Integer(v.into())
    }
}

impl From<i32> for MetricValue {
    fn from(v: i32) -> Self {
        MetricValue::Integer(v.into())
    }
}

/// Ordered name → value readings. Names are unique; re-inserting a name
/// overwrites its value in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricSnapshot {
    entries: Vec<(String, MetricValue)>,
}

impl MetricSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<MetricValue>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&MetricValue> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetricValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for MetricSnapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (name, value) in self.iter() {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

pub type MetricProducer = Arc<dyn Fn() -> MetricValue + Send + Sync>;

/// Host-registered producers, invoked in registration order on every
/// active tick.
#[derive(Clone, Default)]
pub struct MetricRegistry {
    producers: Vec<(String, MetricProducer)>,
}

impl MetricRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `producer` under `name`. A second registration of the same
    /// name replaces the producer but keeps its original position.
    pub fn register<F, V>(&mut self, name: impl Into<String>, producer: F)
    where
        F: Fn() -> V + Send + Sync + 'static,
        V: Into<MetricValue>,
    {
        let name = name.into();
        let producer: MetricProducer = Arc::new(move || producer().into());
        match self.producers.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = producer,
            None => self.producers.push((name, producer)),
        }
    }

    pub fn snapshot(&self) -> MetricSnapshot {
        let mut snapshot = MetricSnapshot::new();
        for (name, producer) in &self.producers {
            snapshot.insert(name.clone(), producer());
        }
        snapshot
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.producers.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.producers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.producers.is_empty()
    }
}

impl fmt::Debug for MetricRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricRegistry")
            .field("names", &self.names().collect::<Vec<_>>())
            .finish()
    }
}
