//! String commands
use super::{parse_int, MAX_STRING_LEN};
use crate::engine::Db;
use crate::store::{Entity, Write};
use crate::{KvError, Reply, Result};

/// how `SET` treats an existing key
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum SetPolicy {
    // default
    Upsert,
    // NX
    Insert,
    // XX
    Update,
}

fn parse_set_policy(options: &[Vec<u8>]) -> Result<SetPolicy> {
    let mut policy = SetPolicy::Upsert;
    for option in options {
        match option.to_ascii_uppercase().as_slice() {
            b"NX" if policy != SetPolicy::Update => policy = SetPolicy::Insert,
            b"XX" if policy != SetPolicy::Insert => policy = SetPolicy::Update,
            _ => return Err(KvError::SyntaxError),
        }
    }
    Ok(policy)
}

/// `GET key`
pub fn exec_get(db: &Db, args: &[Vec<u8>]) -> Result<Reply> {
    Ok(match db.get_as_string(&args[0])? {
        Some(bytes) => Reply::bulk(bytes),
        None => Reply::null(),
    })
}

/// `SET key value [NX|XX]`
///
/// Replies `OK` if the value was written and null if the NX/XX condition prevented it.
pub fn exec_set(db: &Db, args: &[Vec<u8>]) -> Result<Reply> {
    let policy = parse_set_policy(&args[2..])?;
    let key = args[0].clone();
    let entity = Entity::String(args[1].clone());
    let written = match policy {
        SetPolicy::Upsert => {
            db.store().put(key, entity);
            1
        }
        SetPolicy::Insert => db.store().put_if_absent(key, entity),
        SetPolicy::Update => db.store().put_if_exists(key, entity),
    };
    if written > 0 {
        db.add_aof_cmd("set", args);
        Ok(Reply::ok())
    } else {
        Ok(Reply::null())
    }
}

/// `SETNX key value`
pub fn exec_set_nx(db: &Db, args: &[Vec<u8>]) -> Result<Reply> {
    let written = db
        .store()
        .put_if_absent(args[0].clone(), Entity::String(args[1].clone()));
    if written > 0 {
        db.add_aof_cmd("setnx", args);
    }
    Ok(Reply::Int(written as i64))
}

/// `MSET key value [key value ...]`
pub fn exec_mset(db: &Db, args: &[Vec<u8>]) -> Result<Reply> {
    if args.len() % 2 != 0 {
        return Err(KvError::SyntaxError);
    }
    for pair in args.chunks(2) {
        db.store().put(pair[0].clone(), Entity::String(pair[1].clone()));
    }
    db.add_aof_cmd("mset", args);
    Ok(Reply::ok())
}

/// `MGET key [key ...]`, missing keys and keys that do not hold a string are null
pub fn exec_mget(db: &Db, args: &[Vec<u8>]) -> Result<Reply> {
    let values = args
        .iter()
        .map(|key| db.get_as_string(key).unwrap_or(None))
        .collect();
    Ok(Reply::MultiBulk(values))
}

/// `MSETNX key value [key value ...]`, sets nothing if any of the keys exists
pub fn exec_mset_nx(db: &Db, args: &[Vec<u8>]) -> Result<Reply> {
    if args.len() % 2 != 0 {
        return Err(KvError::SyntaxError);
    }
    if args.chunks(2).any(|pair| db.store().contains(&pair[0])) {
        return Ok(Reply::Int(0));
    }
    for pair in args.chunks(2) {
        db.store().put(pair[0].clone(), Entity::String(pair[1].clone()));
    }
    db.add_aof_cmd("msetnx", args);
    Ok(Reply::Int(1))
}

/// `GETSET key value`, returns the previous value
pub fn exec_get_set(db: &Db, args: &[Vec<u8>]) -> Result<Reply> {
    let value = args[1].clone();
    let old = db.store().compute(&args[0], |entity| match entity {
        None => (Write::Put(Entity::String(value)), Ok(None)),
        Some(Entity::String(bytes)) => {
            let old = std::mem::replace(bytes, value);
            (Write::Keep, Ok(Some(old)))
        }
        Some(_) => (Write::Keep, Err(KvError::WrongType)),
    })?;
    db.add_aof_cmd("getset", args);
    Ok(Reply::Bulk(old))
}

// adds `delta` to the integer stored at `key`, a missing key counts as 0
fn incr_by(db: &Db, key: &[u8], delta: i64) -> Result<i64> {
    db.store().compute(key, |entity| match entity {
        None => (
            Write::Put(Entity::String(delta.to_string().into_bytes())),
            Ok(delta),
        ),
        Some(Entity::String(bytes)) => {
            match parse_int(bytes).ok().and_then(|v| v.checked_add(delta)) {
                Some(value) => {
                    *bytes = value.to_string().into_bytes();
                    (Write::Keep, Ok(value))
                }
                None => (Write::Keep, Err(KvError::NotAnInteger)),
            }
        }
        Some(_) => (Write::Keep, Err(KvError::WrongType)),
    })
}

/// `INCR key`
pub fn exec_incr(db: &Db, args: &[Vec<u8>]) -> Result<Reply> {
    let value = incr_by(db, &args[0], 1)?;
    db.add_aof_cmd("incr", args);
    Ok(Reply::Int(value))
}

/// `INCRBY key increment`
pub fn exec_incr_by(db: &Db, args: &[Vec<u8>]) -> Result<Reply> {
    let delta = parse_int(&args[1])?;
    let value = incr_by(db, &args[0], delta)?;
    db.add_aof_cmd("incrby", args);
    Ok(Reply::Int(value))
}

/// `DECR key`
pub fn exec_decr(db: &Db, args: &[Vec<u8>]) -> Result<Reply> {
    let value = incr_by(db, &args[0], -1)?;
    db.add_aof_cmd("decr", args);
    Ok(Reply::Int(value))
}

/// `DECRBY key decrement`
pub fn exec_decr_by(db: &Db, args: &[Vec<u8>]) -> Result<Reply> {
    let delta = parse_int(&args[1])?
        .checked_neg()
        .ok_or(KvError::NotAnInteger)?;
    let value = incr_by(db, &args[0], delta)?;
    db.add_aof_cmd("decrby", args);
    Ok(Reply::Int(value))
}

/// `STRLEN key`
pub fn exec_strlen(db: &Db, args: &[Vec<u8>]) -> Result<Reply> {
    let len = db.get_as_string(&args[0])?.map_or(0, |bytes| bytes.len());
    Ok(Reply::Int(len as i64))
}

/// `APPEND key value`, returns the length of the string after the append
pub fn exec_append(db: &Db, args: &[Vec<u8>]) -> Result<Reply> {
    let value = &args[1];
    let len = db.store().compute(&args[0], |entity| match entity {
        None => (Write::Put(Entity::String(value.clone())), Ok(value.len())),
        Some(Entity::String(bytes)) => {
            bytes.extend_from_slice(value);
            (Write::Keep, Ok(bytes.len()))
        }
        Some(_) => (Write::Keep, Err(KvError::WrongType)),
    })?;
    db.add_aof_cmd("append", args);
    Ok(Reply::Int(len as i64))
}

/// `SETRANGE key offset value`
///
/// Overwrites the string starting at `offset`, padding it with zero bytes if it is shorter
/// than `offset`. Returns the length of the string after the write.
pub fn exec_set_range(db: &Db, args: &[Vec<u8>]) -> Result<Reply> {
    let value = &args[2];
    let offset = usize::try_from(parse_int(&args[1])?)
        .ok()
        .filter(|&offset| offset.saturating_add(value.len()) <= MAX_STRING_LEN)
        .ok_or(KvError::IndexOutOfRange("offset"))?;
    let end = offset + value.len();
    let overwrite = |bytes: &mut Vec<u8>| {
        if bytes.len() < end {
            bytes.resize(end, 0);
        }
        bytes[offset..end].copy_from_slice(value);
        bytes.len()
    };
    let len = db.store().compute(&args[0], |entity| match entity {
        None => {
            let mut bytes = Vec::new();
            let len = overwrite(&mut bytes);
            (Write::Put(Entity::String(bytes)), Ok(len))
        }
        Some(Entity::String(bytes)) => (Write::Keep, Ok(overwrite(bytes))),
        Some(_) => (Write::Keep, Err(KvError::WrongType)),
    })?;
    db.add_aof_cmd("setrange", args);
    Ok(Reply::Int(len as i64))
}

/// `GETRANGE key start end`, both ends inclusive, negative positions count from the end
pub fn exec_get_range(db: &Db, args: &[Vec<u8>]) -> Result<Reply> {
    let start = parse_int(&args[1])?;
    let end = parse_int(&args[2])?;
    let bytes = match db.get_as_string(&args[0])? {
        Some(bytes) => bytes,
        None => return Ok(Reply::null()),
    };

    let len = bytes.len() as i64;
    let start = match start {
        s if s < -len || s >= len => return Ok(Reply::null()),
        s if s < 0 => len + s,
        s => s,
    };
    let end = match end {
        e if e < -len => return Ok(Reply::null()),
        e if e < 0 => len + e + 1,
        e if e < len => e + 1,
        _ => len,
    };
    if start > end {
        return Ok(Reply::null());
    }
    Ok(Reply::bulk(&bytes[start as usize..end as usize]))
}
