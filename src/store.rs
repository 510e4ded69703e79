//! The concurrent key/entity map backing every database.
use std::collections::{HashMap, HashSet, VecDeque};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rand::seq::SliceRandom;

/// The value bound to a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entity {
    /// a binary safe string
    String(Vec<u8>),
    /// an ordered list of binary safe strings
    List(VecDeque<Vec<u8>>),
    /// an unordered collection of unique binary safe strings
    Set(HashSet<Vec<u8>>),
}

impl Entity {
    /// the name reported by the `TYPE` command
    pub fn type_name(&self) -> &'static str {
        match self {
            Entity::String(_) => "string",
            Entity::List(_) => "list",
            Entity::Set(_) => "set",
        }
    }

    /// returns true for a list or set that holds no elements
    pub fn is_drained(&self) -> bool {
        match self {
            Entity::String(_) => false,
            Entity::List(list) => list.is_empty(),
            Entity::Set(set) => set.is_empty(),
        }
    }
}

/// What [`ConcurrentStore::compute`] should do with the entry once its closure returns
#[derive(Debug)]
pub enum Write {
    /// leave the entry as it is (including any in-place mutation)
    Keep,
    /// bind the key to a new entity
    Put(Entity),
    /// remove the key
    Remove,
}

/// A key to [`Entity`] map that supports many concurrent readers and writers.
///
/// The key space is partitioned into independently locked shards by [`DashMap`], so
/// writers of distinct keys rarely contend. Every operation on a single key is atomic,
/// including the conditional writes.
#[derive(Debug, Default)]
pub struct ConcurrentStore {
    map: DashMap<Vec<u8>, Entity>,
}

impl ConcurrentStore {
    /// creates an empty store
    pub fn new() -> Self {
        ConcurrentStore { map: DashMap::new() }
    }

    /// returns a copy of the entity bound to `key`
    pub fn get(&self, key: &[u8]) -> Option<Entity> {
        self.map.get(key).map(|e| e.value().clone())
    }

    /// runs `f` against the entity bound to `key` without copying it
    ///
    /// `f` must not access this store, the shard lock is held while it runs.
    pub fn read<R, F>(&self, key: &[u8], f: F) -> Option<R>
    where
        F: FnOnce(&Entity) -> R,
    {
        self.map.get(key).map(|e| f(e.value()))
    }

    /// returns true if `key` is bound to an entity
    pub fn contains(&self, key: &[u8]) -> bool {
        self.map.contains_key(key)
    }

    /// binds `key` to `entity`. Returns 1 if the key was created, 0 if it was overwritten
    pub fn put(&self, key: Vec<u8>, entity: Entity) -> u32 {
        match self.map.insert(key, entity) {
            Some(_) => 0,
            None => 1,
        }
    }

    /// binds `key` to `entity` only if the key does not exist. Returns 1 if it wrote
    pub fn put_if_absent(&self, key: Vec<u8>, entity: Entity) -> u32 {
        match self.map.entry(key) {
            Entry::Vacant(vacant) => {
                vacant.insert(entity);
                1
            }
            Entry::Occupied(_) => 0,
        }
    }

    /// binds `key` to `entity` only if the key already exists. Returns 1 if it wrote
    pub fn put_if_exists(&self, key: Vec<u8>, entity: Entity) -> u32 {
        match self.map.get_mut(key.as_slice()) {
            Some(mut existing) => {
                *existing = entity;
                1
            }
            None => 0,
        }
    }

    /// removes `key`. Returns 1 if it existed
    pub fn remove(&self, key: &[u8]) -> u32 {
        match self.map.remove(key) {
            Some(_) => 1,
            None => 0,
        }
    }

    /// removes and returns the entity bound to `key`
    pub fn take(&self, key: &[u8]) -> Option<Entity> {
        self.map.remove(key).map(|(_, entity)| entity)
    }

    /// Atomically reads and modifies the entry of `key`.
    ///
    /// `f` receives the current entity (if any) while the key's shard is write locked and
    /// returns what to do with the entry plus a result that is handed back to the caller.
    /// A list or set left empty by an in-place mutation is removed.
    ///
    /// `f` must not access this store, the shard lock is held while it runs.
    pub fn compute<R, F>(&self, key: &[u8], f: F) -> R
    where
        F: FnOnce(Option<&mut Entity>) -> (Write, R),
    {
        match self.map.entry(key.to_vec()) {
            Entry::Occupied(mut occupied) => {
                let (write, result) = f(Some(occupied.get_mut()));
                match write {
                    Write::Keep if occupied.get().is_drained() => {
                        occupied.remove();
                    }
                    Write::Keep => {}
                    Write::Put(entity) => {
                        occupied.insert(entity);
                    }
                    Write::Remove => {
                        occupied.remove();
                    }
                }
                result
            }
            Entry::Vacant(vacant) => {
                let (write, result) = f(None);
                if let Write::Put(entity) = write {
                    vacant.insert(entity);
                }
                result
            }
        }
    }

    /// removes every key
    pub fn clear(&self) {
        self.map.clear()
    }

    /// the number of keys in the store
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// returns true if the store holds no keys
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// returns every key currently in the store
    pub fn keys(&self) -> Vec<Vec<u8>> {
        self.map.iter().map(|e| e.key().clone()).collect()
    }

    /// returns a point-in-time copy of every key and entity
    pub fn snapshot(&self) -> HashMap<Vec<u8>, Entity> {
        self.map
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect()
    }

    /// returns `limit` randomly chosen keys, the same key may be returned more than once
    pub fn random_keys(&self, limit: usize) -> Vec<Vec<u8>> {
        random_members(self.map.iter().map(|e| e.key().clone()), limit)
    }

    /// returns up to `limit` randomly chosen, distinct keys
    pub fn random_distinct_keys(&self, limit: usize) -> Vec<Vec<u8>> {
        random_distinct_members(self.map.iter().map(|e| e.key().clone()), limit)
    }
}

/// picks `limit` random items out of `items`, allowing duplicates.
/// Returns an empty vec if `items` is empty
pub fn random_members<T, I>(items: I, limit: usize) -> Vec<T>
where
    T: Clone,
    I: IntoIterator<Item = T>,
{
    let pool: Vec<T> = items.into_iter().collect();
    let mut rng = rand::thread_rng();
    (0..limit)
        .filter_map(|_| pool.choose(&mut rng).cloned())
        .collect()
}

/// picks up to `limit` random, distinct items out of `items`
///
/// Never allocates more than the number of items, whatever `limit` is.
pub fn random_distinct_members<T, I>(items: I, limit: usize) -> Vec<T>
where
    I: IntoIterator<Item = T>,
{
    let mut rng = rand::thread_rng();
    let mut picked: Vec<T> = items.into_iter().collect();
    picked.shuffle(&mut rng);
    picked.truncate(limit);
    picked
}
