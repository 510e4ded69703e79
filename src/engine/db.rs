use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use crate::aof::AofSink;
use crate::resp::CmdLine;
use crate::store::{ConcurrentStore, Entity};
use crate::{KvError, Result};

/// One numbered database: a key space plus a handle to the append-only file.
///
/// Command executors operate on a `Db` and call [`Db::add_aof`] once they changed it.
#[derive(Debug)]
pub struct Db {
    index: usize,
    data: ConcurrentStore,
    aof: Arc<AofSink>,
}

impl Db {
    pub(crate) fn new(index: usize, aof: Arc<AofSink>) -> Self {
        Db {
            index,
            data: ConcurrentStore::new(),
            aof,
        }
    }

    /// the index of this database
    pub fn index(&self) -> usize {
        self.index
    }

    /// the key space of this database
    pub fn store(&self) -> &ConcurrentStore {
        &self.data
    }

    /// queues a command line that changed this database for the append-only file
    pub fn add_aof(&self, line: CmdLine) {
        self.aof.append(self.index, line);
    }

    /// queues `name args...` for the append-only file
    pub fn add_aof_cmd(&self, name: &str, args: &[Vec<u8>]) {
        let mut line = Vec::with_capacity(args.len() + 1);
        line.push(name.as_bytes().to_vec());
        line.extend_from_slice(args);
        self.add_aof(line);
    }

    /// returns the string bound to `key`, `None` if the key does not exist
    pub fn get_as_string(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        match self.data.read(key, |e| match e {
            Entity::String(bytes) => Ok(bytes.clone()),
            _ => Err(KvError::WrongType),
        }) {
            Some(bytes) => bytes.map(Some),
            None => Ok(None),
        }
    }

    /// returns a copy of the list bound to `key`, `None` if the key does not exist
    pub fn get_as_list(&self, key: &[u8]) -> Result<Option<VecDeque<Vec<u8>>>> {
        match self.data.read(key, |e| match e {
            Entity::List(list) => Ok(list.clone()),
            _ => Err(KvError::WrongType),
        }) {
            Some(list) => list.map(Some),
            None => Ok(None),
        }
    }

    /// returns a copy of the set bound to `key`, `None` if the key does not exist
    pub fn get_as_set(&self, key: &[u8]) -> Result<Option<HashSet<Vec<u8>>>> {
        match self.data.read(key, |e| match e {
            Entity::Set(set) => Ok(set.clone()),
            _ => Err(KvError::WrongType),
        }) {
            Some(set) => set.map(Some),
            None => Ok(None),
        }
    }

    /// removes every key of this database
    pub fn flush(&self) {
        self.data.clear();
    }
}
