//! Thread-Safe Storage Engine
//!
//! The engine holds three typed containers, each behind its own `RwLock`:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        StorageEngine                         │
//! │  ┌──────────────┐   ┌────────────────────┐   ┌────────────┐  │
//! │  │   scalars    │   │       hashes       │   │   lists    │  │
//! │  │   RwLock     │   │       RwLock       │   │   RwLock   │  │
//! │  │ key -> value │   │ key -> field->value│   │ key -> [v] │  │
//! │  └──────────────┘   └────────────────────┘   └────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Locking Rules
//!
//! 1. Every primitive takes the guard of exactly one container and drops it
//!    before returning.
//! 2. Read-modify-write primitives (`incr`, `append`, `copy`, `hdel`, pushes)
//!    hold one write guard for the whole operation, so concurrent callers never
//!    lose updates.
//! 3. Nothing takes two guards today. Anything that needs to must acquire them
//!    in the order scalars, hashes, lists.
//!
//! The containers are separate namespaces: a key may name a scalar, a hash and
//! a list at the same time.

use bytes::{Bytes, BytesMut};
use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

/// Failures that leave the store unchanged.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// The stored scalar does not parse as a base-10 i64.
    #[error("value is not an integer")]
    NotAnInteger,

    #[error("increment or decrement would overflow")]
    Overflow,

    #[error("no such key")]
    NoSuchKey,

    #[error("index out of range")]
    IndexOutOfRange,
}

pub type StorageResult<T> = Result<T, StorageError>;

type FieldMap = HashMap<Bytes, Bytes>;

/// The in-memory database.
///
/// Wrap it in an `Arc` and share it across connection tasks; all methods take
/// `&self`.
///
/// # Example
///
/// ```
/// use ledgerkv::storage::StorageEngine;
/// use bytes::Bytes;
///
/// let engine = StorageEngine::new();
/// engine.set(Bytes::from("name"), Bytes::from("Ariz"));
/// assert_eq!(engine.get(b"name"), Some(Bytes::from("Ariz")));
///
/// assert_eq!(engine.rpush(Bytes::from("l"), vec![Bytes::from("a"), Bytes::from("b")]), 2);
/// assert_eq!(engine.lrange(b"l", 0, -1), vec![Bytes::from("a"), Bytes::from("b")]);
/// ```
#[derive(Default)]
pub struct StorageEngine {
    scalars: RwLock<HashMap<Bytes, Bytes>>,
    hashes: RwLock<HashMap<Bytes, FieldMap>>,
    lists: RwLock<HashMap<Bytes, VecDeque<Bytes>>>,

    /// Statistics: primitive calls that only read
    read_count: AtomicU64,
    /// Statistics: primitive calls that write
    write_count: AtomicU64,
    /// Statistics: keys or fields removed
    delete_count: AtomicU64,
}

impl std::fmt::Debug for StorageEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageEngine")
            .field("scalars", &self.scalars.read().len())
            .field("hashes", &self.hashes.read().len())
            .field("lists", &self.lists.read().len())
            .finish()
    }
}

impl StorageEngine {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    fn record_read(&self) {
        self.read_count.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    fn record_write(&self) {
        self.write_count.fetch_add(1, Ordering::Relaxed);
    }

    // ========================================================================
    // SCALAR OPERATIONS
    // ========================================================================

    pub fn get(&self, key: &[u8]) -> Option<Bytes> {
        self.record_read();
        self.scalars.read().get(key).cloned()
    }

    pub fn set(&self, key: Bytes, value: Bytes) {
        self.record_write();
        self.scalars.write().insert(key, value);
    }

    /// Removes a scalar. Returns whether it existed.
    pub fn delete(&self, key: &[u8]) -> bool {
        self.record_write();
        let removed = self.scalars.write().remove(key).is_some();
        if removed {
            self.delete_count.fetch_add(1, Ordering::Relaxed);
        }
        removed
    }

    /// Removes every listed key under one guard and returns how many existed.
    pub fn delete_many(&self, keys: &[Bytes]) -> u64 {
        self.record_write();
        let mut scalars = self.scalars.write();
        let removed = keys
            .iter()
            .filter(|key| scalars.remove(&key[..]).is_some())
            .count() as u64;
        self.delete_count.fetch_add(removed, Ordering::Relaxed);
        removed
    }

    pub fn exists(&self, key: &[u8]) -> bool {
        self.record_read();
        self.scalars.read().contains_key(key)
    }

    /// Counts how many of `keys` exist. A key listed twice is counted twice.
    pub fn exists_many(&self, keys: &[Bytes]) -> u64 {
        self.record_read();
        let scalars = self.scalars.read();
        keys.iter()
            .filter(|key| scalars.contains_key(&key[..]))
            .count() as u64
    }

    /// Appends `suffix` to the scalar at `key`, treating a missing key as the
    /// empty string. Returns the new length in bytes.
    pub fn append(&self, key: &Bytes, suffix: &[u8]) -> usize {
        self.record_write();
        let mut scalars = self.scalars.write();

        let new_value = match scalars.get(key) {
            Some(existing) => {
                let mut buf = BytesMut::with_capacity(existing.len() + suffix.len());
                buf.extend_from_slice(existing);
                buf.extend_from_slice(suffix);
                buf.freeze()
            }
            None => Bytes::copy_from_slice(suffix),
        };

        let len = new_value.len();
        scalars.insert(key.clone(), new_value);
        len
    }

    /// Increments the integer stored at `key` by one.
    ///
    /// A missing key starts from zero. The read, parse and write happen under a
    /// single write guard; on error the stored value is left untouched.
    pub fn incr(&self, key: &Bytes) -> StorageResult<i64> {
        self.record_write();
        let mut scalars = self.scalars.write();

        let current = match scalars.get(key) {
            Some(value) => parse_i64(value).ok_or(StorageError::NotAnInteger)?,
            None => 0,
        };

        let next = current.checked_add(1).ok_or(StorageError::Overflow)?;
        scalars.insert(key.clone(), Bytes::from(next.to_string()));
        Ok(next)
    }

    /// Copies the scalar at `source` over `destination`.
    ///
    /// Returns `false` without writing anything when `source` is missing.
    pub fn copy(&self, source: &[u8], destination: Bytes) -> bool {
        self.record_write();
        let mut scalars = self.scalars.write();

        match scalars.get(source).cloned() {
            Some(value) => {
                scalars.insert(destination, value);
                true
            }
            None => false,
        }
    }

    pub fn scalar_count(&self) -> usize {
        self.scalars.read().len()
    }

    // ========================================================================
    // HASH OPERATIONS
    // ========================================================================

    /// Sets `field` in the hash at `key`, creating the hash on first write.
    ///
    /// Returns `true` when the field is new.
    pub fn hset(&self, key: Bytes, field: Bytes, value: Bytes) -> bool {
        self.record_write();
        let mut hashes = self.hashes.write();
        hashes.entry(key).or_default().insert(field, value).is_none()
    }

    pub fn hget(&self, key: &[u8], field: &[u8]) -> Option<Bytes> {
        self.record_read();
        self.hashes.read().get(key)?.get(field).cloned()
    }

    /// Deletes each listed field and returns how many existed.
    ///
    /// If the hash ends up empty the key itself is removed, so no empty hash is
    /// ever observable.
    pub fn hdel(&self, key: &[u8], fields: &[Bytes]) -> u64 {
        self.record_write();
        let mut hashes = self.hashes.write();

        let Some(hash) = hashes.get_mut(key) else {
            return 0;
        };

        let removed = fields
            .iter()
            .filter(|field| hash.remove(&field[..]).is_some())
            .count() as u64;

        if hash.is_empty() {
            hashes.remove(key);
        }

        self.delete_count.fetch_add(removed, Ordering::Relaxed);
        removed
    }

    /// Returns every field/value pair of the hash, or `None` if it doesn't exist.
    pub fn hgetall(&self, key: &[u8]) -> Option<Vec<(Bytes, Bytes)>> {
        self.record_read();
        let hashes = self.hashes.read();
        let hash = hashes.get(key)?;
        Some(
            hash.iter()
                .map(|(field, value)| (field.clone(), value.clone()))
                .collect(),
        )
    }

    pub fn hash_count(&self) -> usize {
        self.hashes.read().len()
    }

    // ========================================================================
    // LIST OPERATIONS
    // ========================================================================

    /// Pushes values onto the head of a list, one at a time in argument order,
    /// so `LPUSH l a b c` leaves `[c, b, a]`. Creates the list if needed.
    ///
    /// Returns the length after the push.
    pub fn lpush(&self, key: Bytes, values: Vec<Bytes>) -> usize {
        self.record_write();
        let mut lists = self.lists.write();
        let list = lists.entry(key).or_default();
        for value in values {
            list.push_front(value);
        }
        list.len()
    }

    /// Pushes values onto the tail of a list. Creates the list if needed.
    ///
    /// Returns the length after the push.
    pub fn rpush(&self, key: Bytes, values: Vec<Bytes>) -> usize {
        self.record_write();
        let mut lists = self.lists.write();
        let list = lists.entry(key).or_default();
        list.extend(values);
        list.len()
    }

    /// Length of the list, 0 when it doesn't exist.
    pub fn llen(&self, key: &[u8]) -> usize {
        self.record_read();
        self.lists.read().get(key).map_or(0, VecDeque::len)
    }

    /// Returns the inclusive range `[start, stop]`.
    ///
    /// Negative indices count from the end (-1 is the last element) and both
    /// ends are clamped to the list. Ranges that fall entirely outside the list
    /// yield an empty vector, as does a missing key.
    pub fn lrange(&self, key: &[u8], start: i64, stop: i64) -> Vec<Bytes> {
        self.record_read();
        let lists = self.lists.read();

        let Some(list) = lists.get(key) else {
            return Vec::new();
        };

        match clamp_range(list.len(), start, stop) {
            Some((first, last)) => list.range(first..=last).cloned().collect(),
            None => Vec::new(),
        }
    }

    /// Replaces the element at `index`; negative indices count from the end.
    pub fn lset(&self, key: &[u8], index: i64, value: Bytes) -> StorageResult<()> {
        self.record_write();
        let mut lists = self.lists.write();

        let list = lists.get_mut(key).ok_or(StorageError::NoSuchKey)?;
        let slot = resolve_index(list.len(), index).ok_or(StorageError::IndexOutOfRange)?;
        list[slot] = value;
        Ok(())
    }

    pub fn list_count(&self) -> usize {
        self.lists.read().len()
    }

    // ========================================================================
    // INTROSPECTION
    // ========================================================================

    /// Total keys across all three containers.
    pub fn key_count(&self) -> usize {
        self.scalar_count() + self.hash_count() + self.list_count()
    }

    pub fn stats(&self) -> StorageStats {
        StorageStats {
            scalars: self.scalar_count(),
            hashes: self.hash_count(),
            lists: self.list_count(),
            reads: self.read_count.load(Ordering::Relaxed),
            writes: self.write_count.load(Ordering::Relaxed),
            deletes: self.delete_count.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time counters. Op counts are approximate under concurrency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StorageStats {
    pub scalars: usize,
    pub hashes: usize,
    pub lists: usize,
    pub reads: u64,
    pub writes: u64,
    pub deletes: u64,
}

fn parse_i64(value: &[u8]) -> Option<i64> {
    std::str::from_utf8(value).ok()?.parse().ok()
}

/// Maps a possibly negative index onto `[0, len)`.
fn resolve_index(len: usize, index: i64) -> Option<usize> {
    let len = len as i64;
    let actual = if index < 0 { len + index } else { index };
    (0..len).contains(&actual).then_some(actual as usize)
}

/// Normalizes an inclusive `[start, stop]` pair against a list of `len`
/// elements. `None` means the range is empty.
fn clamp_range(len: usize, start: i64, stop: i64) -> Option<(usize, usize)> {
    let len = len as i64;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };

    if start > stop || start >= len || stop < 0 {
        return None;
    }
    Some((start as usize, stop as usize))
}
