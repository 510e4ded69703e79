//! The built-in command set.
//!
//! Every command is listed once in [`COMMANDS`], along with its argument count contract,
//! and [`table`] turns that list into the [`CommandTable`] an engine is opened with.
use crate::command::{Arity, CommandTable, ExecFn};
use crate::{KvError, Result};

mod keys;
mod list;
mod ping;
mod set;
mod string;

use crate::command::Arity::{AtLeast, Exact};

/// name, executor and arity of every built-in command
pub const COMMANDS: &[(&str, ExecFn, Arity)] = &[
    ("ping", ping::exec_ping, AtLeast(0)),
    // keys
    ("del", keys::exec_del, AtLeast(1)),
    ("exists", keys::exec_exists, AtLeast(1)),
    ("type", keys::exec_type, Exact(1)),
    ("rename", keys::exec_rename, Exact(2)),
    ("renamenx", keys::exec_rename_nx, Exact(2)),
    ("flushdb", keys::exec_flush_db, Exact(0)),
    ("randomkey", keys::exec_random_key, Exact(0)),
    // strings
    ("get", string::exec_get, Exact(1)),
    ("set", string::exec_set, AtLeast(2)),
    ("setnx", string::exec_set_nx, Exact(2)),
    ("mset", string::exec_mset, AtLeast(2)),
    ("mget", string::exec_mget, AtLeast(1)),
    ("msetnx", string::exec_mset_nx, AtLeast(2)),
    ("getset", string::exec_get_set, Exact(2)),
    ("incr", string::exec_incr, Exact(1)),
    ("incrby", string::exec_incr_by, Exact(2)),
    ("decr", string::exec_decr, Exact(1)),
    ("decrby", string::exec_decr_by, Exact(2)),
    ("strlen", string::exec_strlen, Exact(1)),
    ("append", string::exec_append, Exact(2)),
    ("setrange", string::exec_set_range, Exact(3)),
    ("getrange", string::exec_get_range, Exact(3)),
    // lists
    ("lpush", list::exec_lpush, AtLeast(2)),
    ("lpushx", list::exec_lpush_x, AtLeast(2)),
    ("rpush", list::exec_rpush, AtLeast(2)),
    ("rpushx", list::exec_rpush_x, AtLeast(2)),
    ("lpop", list::exec_lpop, Exact(1)),
    ("rpop", list::exec_rpop, Exact(1)),
    ("rpoplpush", list::exec_rpop_lpush, Exact(2)),
    ("lrem", list::exec_lrem, Exact(3)),
    ("llen", list::exec_llen, Exact(1)),
    ("lindex", list::exec_lindex, Exact(2)),
    ("lset", list::exec_lset, Exact(3)),
    ("lrange", list::exec_lrange, Exact(3)),
    // sets
    ("sadd", set::exec_sadd, AtLeast(2)),
    ("sismember", set::exec_sismember, Exact(2)),
    ("srem", set::exec_srem, AtLeast(2)),
    ("spop", set::exec_spop, AtLeast(1)),
    ("scard", set::exec_scard, Exact(1)),
    ("smembers", set::exec_smembers, Exact(1)),
    ("sinter", set::exec_sinter, AtLeast(1)),
    ("sinterstore", set::exec_sinter_store, AtLeast(2)),
    ("sunion", set::exec_sunion, AtLeast(1)),
    ("sunionstore", set::exec_sunion_store, AtLeast(2)),
    ("sdiff", set::exec_sdiff, AtLeast(1)),
    ("sdiffstore", set::exec_sdiff_store, AtLeast(2)),
    ("srandmember", set::exec_srandmember, AtLeast(1)),
];

/// builds the table of built-in commands
pub fn table() -> CommandTable {
    let mut table = CommandTable::new();
    for &(name, executor, arity) in COMMANDS {
        table.register(name, executor, arity);
    }
    table
}

/// the largest string a command may build, in bytes
pub const MAX_STRING_LEN: usize = 512 * 1024 * 1024;

/// the most members a single random sampling with repetitions may return
pub const MAX_SAMPLE_LEN: usize = 1 << 20;

/// parses a base-10, signed 64 bit integer argument
fn parse_int(arg: &[u8]) -> Result<i64> {
    std::str::from_utf8(arg)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or(KvError::NotAnInteger)
}

/// resolves a possibly negative `index` into a position within `len` elements
fn normalize_index(index: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let index = if index < 0 { len + index } else { index };
    if (0..len).contains(&index) {
        Some(index as usize)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_command_is_registered_once() {
        assert_eq!(table().len(), COMMANDS.len());
    }

    #[test]
    fn negative_indexes_count_from_the_end() {
        assert_eq!(normalize_index(-1, 5), Some(4));
        assert_eq!(normalize_index(-5, 5), Some(0));
        assert_eq!(normalize_index(-6, 5), None);
        assert_eq!(normalize_index(5, 5), None);
        assert_eq!(normalize_index(0, 0), None);
    }

    #[test]
    fn integers_are_base_10() {
        assert_eq!(parse_int(b"-42").unwrap(), -42);
        assert!(matches!(parse_int(b"0x10"), Err(KvError::NotAnInteger)));
        assert!(matches!(parse_int(b"1.5"), Err(KvError::NotAnInteger)));
    }
}
