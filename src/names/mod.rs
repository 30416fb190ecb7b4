use std::collections::HashMap;

use smol_str::SmolStr;

use crate::text::{escape_into, raw_name_hash};

/// Field names known ahead of time, pre-escaped for writing and hashed for
/// lookup while reading.
///
/// Tables are immutable once built and are shared as `Arc<NameTable>`.
#[derive(Debug, Clone)]
pub struct NameTable {
    names: Vec<SmolStr>,
    /// `"name":` bytes, ready to copy into output.
    keys: Vec<Box<[u8]>>,
    hashes: Vec<u64>,
    index: HashMap<u64, usize>,
    degraded: bool,
}

impl NameTable {
    pub fn of<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<SmolStr>,
    {
        Self::build(names, raw_name_hash)
    }

    fn build<I, S>(names: I, hash: fn(&[u8]) -> u64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<SmolStr>,
    {
        let names: Vec<SmolStr> = names.into_iter().map(Into::into).collect();
        let mut keys = Vec::with_capacity(names.len());
        let mut hashes = Vec::with_capacity(names.len());
        let mut index = HashMap::with_capacity(names.len());
        let mut degraded = false;

        for (position, name) in names.iter().enumerate() {
            let mut key = Vec::with_capacity(name.len() + 3);
            key.push(b'"');
            escape_into(&mut key, name);
            let name_hash = hash(&key[1..]);
            key.extend_from_slice(b"\":");

            if index.insert(name_hash, position).is_some() {
                degraded = true;
            }
            keys.push(key.into_boxed_slice());
            hashes.push(name_hash);
        }

        if degraded {
            tracing::debug!(
                names = names.len(),
                "name table has colliding hashes; lookups disabled"
            );
            index.clear();
        }

        Self {
            names,
            keys,
            hashes,
            index,
            degraded,
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// True when two names share a hash; every lookup then misses.
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    pub fn name(&self, position: usize) -> Option<&str> {
        self.names.get(position).map(SmolStr::as_str)
    }

    /// Escaped `"name":` bytes.
    pub fn key(&self, position: usize) -> Option<&[u8]> {
        self.keys.get(position).map(|key| &key[..])
    }

    /// Escaped name bytes without quotes or colon, as they appear on the wire.
    pub fn escaped(&self, position: usize) -> Option<&[u8]> {
        self.key(position).map(|key| &key[1..key.len() - 2])
    }

    pub fn hash(&self, position: usize) -> Option<u64> {
        self.hashes.get(position).copied()
    }

    pub fn position(&self, hash: u64) -> Option<usize> {
        self.index.get(&hash).copied()
    }

    pub fn lookup(&self, hash: u64) -> Option<&str> {
        self.position(hash).and_then(|position| self.name(position))
    }

    /// Resolves raw (still escaped) name bytes, confirming the bytes on a
    /// hash hit.
    pub fn resolve(&self, hash: u64, raw: &[u8]) -> Option<usize> {
        let position = self.position(hash)?;
        (self.escaped(position)? == raw).then_some(position)
    }

    pub fn position_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|candidate| candidate == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(SmolStr::as_str)
    }
}
