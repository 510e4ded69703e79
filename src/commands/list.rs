//! List commands
use std::collections::VecDeque;

use super::{normalize_index, parse_int};
use crate::engine::Db;
use crate::store::{Entity, Write};
use crate::{KvError, Reply, Result};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum End {
    Head,
    Tail,
}

// pushes `values` one by one onto `end` of the list at `key`. When `create` is false a
// missing key is left alone and `None` is returned
fn push(db: &Db, key: &[u8], values: &[Vec<u8>], end: End, create: bool) -> Result<Option<usize>> {
    let extend = |list: &mut VecDeque<Vec<u8>>| {
        for value in values {
            match end {
                End::Head => list.push_front(value.clone()),
                End::Tail => list.push_back(value.clone()),
            }
        }
        list.len()
    };
    db.store().compute(key, |entity| match entity {
        None if create => {
            let mut list = VecDeque::with_capacity(values.len());
            let len = extend(&mut list);
            (Write::Put(Entity::List(list)), Ok(Some(len)))
        }
        None => (Write::Keep, Ok(None)),
        Some(Entity::List(list)) => (Write::Keep, Ok(Some(extend(list)))),
        Some(_) => (Write::Keep, Err(KvError::WrongType)),
    })
}

fn pop(db: &Db, key: &[u8], end: End) -> Result<Option<Vec<u8>>> {
    db.store().compute(key, |entity| match entity {
        None => (Write::Keep, Ok(None)),
        Some(Entity::List(list)) => {
            let popped = match end {
                End::Head => list.pop_front(),
                End::Tail => list.pop_back(),
            };
            (Write::Keep, Ok(popped))
        }
        Some(_) => (Write::Keep, Err(KvError::WrongType)),
    })
}

fn exec_push(db: &Db, args: &[Vec<u8>], end: End, create: bool, name: &str) -> Result<Reply> {
    match push(db, &args[0], &args[1..], end, create)? {
        Some(len) => {
            db.add_aof_cmd(name, args);
            Ok(Reply::Int(len as i64))
        }
        None => Ok(Reply::Int(0)),
    }
}

fn exec_pop(db: &Db, args: &[Vec<u8>], end: End, name: &str) -> Result<Reply> {
    match pop(db, &args[0], end)? {
        Some(value) => {
            db.add_aof_cmd(name, args);
            Ok(Reply::bulk(value))
        }
        None => Ok(Reply::null()),
    }
}

/// `LPUSH key value [value ...]`
pub fn exec_lpush(db: &Db, args: &[Vec<u8>]) -> Result<Reply> {
    exec_push(db, args, End::Head, true, "lpush")
}

/// `LPUSHX key value [value ...]`, only pushes onto an existing list
pub fn exec_lpush_x(db: &Db, args: &[Vec<u8>]) -> Result<Reply> {
    exec_push(db, args, End::Head, false, "lpushx")
}

/// `RPUSH key value [value ...]`
pub fn exec_rpush(db: &Db, args: &[Vec<u8>]) -> Result<Reply> {
    exec_push(db, args, End::Tail, true, "rpush")
}

/// `RPUSHX key value [value ...]`, only pushes onto an existing list
pub fn exec_rpush_x(db: &Db, args: &[Vec<u8>]) -> Result<Reply> {
    exec_push(db, args, End::Tail, false, "rpushx")
}

/// `LPOP key`
pub fn exec_lpop(db: &Db, args: &[Vec<u8>]) -> Result<Reply> {
    exec_pop(db, args, End::Head, "lpop")
}

/// `RPOP key`
pub fn exec_rpop(db: &Db, args: &[Vec<u8>]) -> Result<Reply> {
    exec_pop(db, args, End::Tail, "rpop")
}

/// `RPOPLPUSH source destination`
///
/// Moves the tail of `source` to the head of `destination`. Each key is updated atomically
/// but the move as a whole is not: a reader may briefly observe the element in neither list.
pub fn exec_rpop_lpush(db: &Db, args: &[Vec<u8>]) -> Result<Reply> {
    let (src, dst) = (&args[0], &args[1]);
    if db.store().read(dst, |e| matches!(e, Entity::List(_))) == Some(false) {
        return Err(KvError::WrongType);
    }
    let value = match pop(db, src, End::Tail)? {
        Some(value) => value,
        None => return Ok(Reply::null()),
    };
    if let Err(e) = push(db, dst, std::slice::from_ref(&value), End::Head, true) {
        // destination changed type in between, put the element back
        push(db, src, std::slice::from_ref(&value), End::Tail, true)?;
        return Err(e);
    }
    db.add_aof_cmd("rpoplpush", args);
    Ok(Reply::bulk(value))
}

/// `LREM key count value`
///
/// Removes `count` occurrences of `value` scanning from the head, from the tail if `count`
/// is negative, or all of them if `count` is 0.
pub fn exec_lrem(db: &Db, args: &[Vec<u8>]) -> Result<Reply> {
    let count = parse_int(&args[1])?;
    let value = &args[2];
    let removed = db.store().compute(&args[0], |entity| match entity {
        None => (Write::Keep, Ok(0)),
        Some(Entity::List(list)) => {
            let limit = if count == 0 {
                usize::MAX
            } else {
                count.unsigned_abs() as usize
            };
            let mut removed = 0;
            let kept: VecDeque<Vec<u8>> = if count >= 0 {
                list.drain(..)
                    .filter(|item| {
                        let drop = removed < limit && item == value;
                        removed += drop as usize;
                        !drop
                    })
                    .collect()
            } else {
                let mut kept: VecDeque<Vec<u8>> = list
                    .drain(..)
                    .rev()
                    .filter(|item| {
                        let drop = removed < limit && item == value;
                        removed += drop as usize;
                        !drop
                    })
                    .collect();
                kept.make_contiguous().reverse();
                kept
            };
            *list = kept;
            (Write::Keep, Ok(removed))
        }
        Some(_) => (Write::Keep, Err(KvError::WrongType)),
    })?;
    if removed > 0 {
        db.add_aof_cmd("lrem", args);
    }
    Ok(Reply::Int(removed as i64))
}

/// `LLEN key`
pub fn exec_llen(db: &Db, args: &[Vec<u8>]) -> Result<Reply> {
    let len = db
        .store()
        .read(&args[0], |e| match e {
            Entity::List(list) => Ok(list.len()),
            _ => Err(KvError::WrongType),
        })
        .unwrap_or(Ok(0))?;
    Ok(Reply::Int(len as i64))
}

/// `LINDEX key index`
pub fn exec_lindex(db: &Db, args: &[Vec<u8>]) -> Result<Reply> {
    let index = parse_int(&args[1])?;
    let value = db
        .store()
        .read(&args[0], |e| match e {
            Entity::List(list) => Ok(normalize_index(index, list.len()).map(|i| list[i].clone())),
            _ => Err(KvError::WrongType),
        })
        .unwrap_or(Ok(None))?;
    Ok(Reply::Bulk(value))
}

/// `LSET key index value`
pub fn exec_lset(db: &Db, args: &[Vec<u8>]) -> Result<Reply> {
    let index = parse_int(&args[1])?;
    let value = &args[2];
    db.store().compute(&args[0], |entity| match entity {
        None => (Write::Keep, Err(KvError::NoSuchKey)),
        Some(Entity::List(list)) => match normalize_index(index, list.len()) {
            Some(i) => {
                list[i] = value.clone();
                (Write::Keep, Ok(()))
            }
            None => (Write::Keep, Err(KvError::IndexOutOfRange("index"))),
        },
        Some(_) => (Write::Keep, Err(KvError::WrongType)),
    })?;
    db.add_aof_cmd("lset", args);
    Ok(Reply::ok())
}

/// `LRANGE key start stop`, both ends inclusive and clamped to the list
pub fn exec_lrange(db: &Db, args: &[Vec<u8>]) -> Result<Reply> {
    let start = parse_int(&args[1])?;
    let stop = parse_int(&args[2])?;
    let items = db
        .store()
        .read(&args[0], |e| match e {
            Entity::List(list) => {
                let (from, to) = clamp_range(start, stop, list.len());
                Ok(list.range(from..to).cloned().collect::<Vec<_>>())
            }
            _ => Err(KvError::WrongType),
        })
        .unwrap_or_else(|| Ok(Vec::new()))?;
    Ok(Reply::array(items))
}

// turns the inclusive, possibly negative bounds of LRANGE into a half open range
fn clamp_range(start: i64, stop: i64, len: usize) -> (usize, usize) {
    let len = len as i64;
    let start = match start {
        s if s < -len => 0,
        s if s < 0 => len + s,
        s if s >= len => return (0, 0),
        s => s,
    };
    let stop = match stop {
        e if e < -len => 0,
        e if e < 0 => len + e + 1,
        e if e < len => e + 1,
        _ => len,
    };
    (start as usize, stop.max(start) as usize)
}
