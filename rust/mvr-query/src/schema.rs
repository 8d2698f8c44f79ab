//! Schema snapshots, column validation and the time-based schema cache.
//!
//! The snapshot is the only authority on which identifiers may appear in
//! generated SQL. Callers hand one to the query builder per request; the
//! service layer keeps a short-lived cached copy so it does not reload the
//! column list on every call.

use crate::error::{Result, ServiceError};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashSet,
    time::{Duration, Instant},
};
use tracing::debug;

/// Ordered column names of the target table at request time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaSnapshot {
    columns: Vec<String>,
}

impl SchemaSnapshot {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns.iter().any(|known| known == column)
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }
}

impl From<Vec<String>> for SchemaSnapshot {
    fn from(columns: Vec<String>) -> Self {
        Self { columns }
    }
}

/// Returns true iff every requested name is present in `allowed`.
///
/// Membership is exact and case-sensitive. An empty request always validates.
pub fn validate<R, A>(requested: &[R], allowed: &[A]) -> bool
where
    R: AsRef<str>,
    A: AsRef<str>,
{
    unknown_columns(requested, allowed).is_empty()
}

/// Lists the requested names missing from `allowed`, first occurrence order, no repeats.
pub fn unknown_columns<'a, R, A>(requested: &'a [R], allowed: &[A]) -> Vec<&'a str>
where
    R: AsRef<str>,
    A: AsRef<str>,
{
    let known: HashSet<&str> = allowed.iter().map(AsRef::as_ref).collect();
    let mut seen = HashSet::new();

    requested
        .iter()
        .map(AsRef::as_ref)
        .filter(|name| !known.contains(name))
        .filter(|name| seen.insert(*name))
        .collect()
}

/// Supplies a fresh schema snapshot for the target table.
pub trait SchemaSource: Send + Sync {
    fn load(&self) -> Result<SchemaSnapshot>;
}

/// Schema source backed by the column list in the service configuration.
#[derive(Debug, Clone)]
pub struct ConfiguredSchema {
    columns: Vec<String>,
}

impl ConfiguredSchema {
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns }
    }
}

impl SchemaSource for ConfiguredSchema {
    fn load(&self) -> Result<SchemaSnapshot> {
        if self.columns.is_empty() {
            return Err(ServiceError::Config("could not read table schema".into()));
        }
        Ok(SchemaSnapshot::from(self.columns.clone()))
    }
}

struct CachedSnapshot {
    snapshot: SchemaSnapshot,
    loaded_at: Instant,
}

/// Keeps the last loaded snapshot until `ttl` elapses.
pub struct SchemaCache<S> {
    source: S,
    ttl: Duration,
    entry: RwLock<Option<CachedSnapshot>>,
}

impl<S: SchemaSource> SchemaCache<S> {
    pub fn new(source: S, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            entry: RwLock::new(None),
        }
    }

    pub fn snapshot(&self) -> Result<SchemaSnapshot> {
        if let Some(cached) = self.entry.read().as_ref() {
            if cached.loaded_at.elapsed() < self.ttl {
                return Ok(cached.snapshot.clone());
            }
        }

        let mut entry = self.entry.write();
        // another caller may have refreshed while we waited for the write lock
        if let Some(cached) = entry.as_ref() {
            if cached.loaded_at.elapsed() < self.ttl {
                return Ok(cached.snapshot.clone());
            }
        }

        let snapshot = self.source.load()?;
        debug!(columns = snapshot.len(), "schema snapshot refreshed");
        *entry = Some(CachedSnapshot {
            snapshot: snapshot.clone(),
            loaded_at: Instant::now(),
        });
        Ok(snapshot)
    }

    pub fn invalidate(&self) {
        self.entry.write().take();
    }
}
