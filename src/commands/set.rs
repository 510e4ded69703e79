//! Set commands
use std::collections::HashSet;

use super::{parse_int, MAX_SAMPLE_LEN};
use crate::engine::Db;
use crate::store::{random_distinct_members, random_members, Entity, Write};
use crate::{KvError, Reply, Result};

type Members = HashSet<Vec<u8>>;

/// `SADD key member [member ...]`, returns the number of members that were added
pub fn exec_sadd(db: &Db, args: &[Vec<u8>]) -> Result<Reply> {
    let members = &args[1..];
    let added = db.store().compute(&args[0], |entity| match entity {
        None => {
            let set: Members = members.iter().cloned().collect();
            let added = set.len();
            (Write::Put(Entity::Set(set)), Ok(added))
        }
        Some(Entity::Set(set)) => {
            let added = members.iter().filter(|m| set.insert((*m).clone())).count();
            (Write::Keep, Ok(added))
        }
        Some(_) => (Write::Keep, Err(KvError::WrongType)),
    })?;
    if added > 0 {
        db.add_aof_cmd("sadd", args);
    }
    Ok(Reply::Int(added as i64))
}

/// `SISMEMBER key member`
pub fn exec_sismember(db: &Db, args: &[Vec<u8>]) -> Result<Reply> {
    let found = db
        .store()
        .read(&args[0], |e| match e {
            Entity::Set(set) => Ok(set.contains(&args[1])),
            _ => Err(KvError::WrongType),
        })
        .unwrap_or(Ok(false))?;
    Ok(Reply::Int(found as i64))
}

// removes `members` from the set at `key`, returns how many were present
fn remove_members(db: &Db, key: &[u8], members: &[Vec<u8>]) -> Result<usize> {
    db.store().compute(key, |entity| match entity {
        None => (Write::Keep, Ok(0)),
        Some(Entity::Set(set)) => {
            let removed = members.iter().filter(|m| set.remove(*m)).count();
            (Write::Keep, Ok(removed))
        }
        Some(_) => (Write::Keep, Err(KvError::WrongType)),
    })
}

/// `SREM key member [member ...]`
pub fn exec_srem(db: &Db, args: &[Vec<u8>]) -> Result<Reply> {
    let removed = remove_members(db, &args[0], &args[1..])?;
    if removed > 0 {
        db.add_aof_cmd("srem", args);
    }
    Ok(Reply::Int(removed as i64))
}

/// `SPOP key [count]`
///
/// Removes random members. Logged as the `SREM` of the popped members so a replay removes
/// exactly the same ones.
pub fn exec_spop(db: &Db, args: &[Vec<u8>]) -> Result<Reply> {
    let count = match args.len() {
        1 => None,
        2 => match parse_int(&args[1])? {
            n if n > 0 => Some(n as usize),
            _ => return Err(KvError::IndexOutOfRange("value")),
        },
        _ => return Err(KvError::SyntaxError),
    };

    let key = &args[0];
    let popped = db.store().compute(key, |entity| match entity {
        None => (Write::Keep, Ok(Vec::new())),
        Some(Entity::Set(set)) => {
            let popped = random_distinct_members(set.iter().cloned(), count.unwrap_or(1));
            for member in &popped {
                set.remove(member);
            }
            (Write::Keep, Ok(popped))
        }
        Some(_) => (Write::Keep, Err(KvError::WrongType)),
    })?;

    if !popped.is_empty() {
        let mut line = Vec::with_capacity(popped.len() + 2);
        line.push(b"srem".to_vec());
        line.push(key.clone());
        line.extend(popped.iter().cloned());
        db.add_aof(line);
    }
    match count {
        Some(_) => Ok(Reply::array(popped)),
        None => Ok(Reply::Bulk(popped.into_iter().next())),
    }
}

/// `SCARD key`
pub fn exec_scard(db: &Db, args: &[Vec<u8>]) -> Result<Reply> {
    let len = db.get_as_set(&args[0])?.map_or(0, |set| set.len());
    Ok(Reply::Int(len as i64))
}

/// `SMEMBERS key`
pub fn exec_smembers(db: &Db, args: &[Vec<u8>]) -> Result<Reply> {
    let set = db.get_as_set(&args[0])?.unwrap_or_default();
    Ok(Reply::array(set))
}

/// `SRANDMEMBER key [count]`
///
/// A positive `count` picks up to `count` distinct members, a negative one picks `|count|`
/// members which may repeat. `|count|` is capped at [`MAX_SAMPLE_LEN`] in the latter case.
pub fn exec_srandmember(db: &Db, args: &[Vec<u8>]) -> Result<Reply> {
    let count = match args.len() {
        1 => None,
        2 => Some(parse_int(&args[1])?),
        _ => return Err(KvError::SyntaxError),
    };
    let set = db.get_as_set(&args[0])?;
    match (count, set) {
        (None, None) => Ok(Reply::null()),
        (None, Some(set)) => Ok(Reply::Bulk(random_members(set, 1).pop())),
        (Some(_), None) => Ok(Reply::empty()),
        (Some(n), Some(set)) if n >= 0 => Ok(Reply::array(random_distinct_members(set, n as usize))),
        (Some(n), Some(set)) => {
            let limit = usize::try_from(n.unsigned_abs())
                .ok()
                .filter(|&limit| limit <= MAX_SAMPLE_LEN)
                .ok_or(KvError::IndexOutOfRange("value"))?;
            Ok(Reply::array(random_members(set, limit)))
        }
    }
}

// the intersection of every set in `keys`, empty as soon as one of them is missing
fn intersect(db: &Db, keys: &[Vec<u8>]) -> Result<Members> {
    let mut result: Option<Members> = None;
    for key in keys {
        let set = match db.get_as_set(key)? {
            Some(set) => set,
            None => return Ok(Members::new()),
        };
        let next = match result {
            None => set,
            Some(acc) => acc.into_iter().filter(|m| set.contains(m)).collect(),
        };
        if next.is_empty() {
            return Ok(next);
        }
        result = Some(next);
    }
    Ok(result.unwrap_or_default())
}

// the union of every existing set in `keys`
fn union(db: &Db, keys: &[Vec<u8>]) -> Result<Members> {
    let mut result = Members::new();
    for key in keys {
        if let Some(set) = db.get_as_set(key)? {
            result.extend(set);
        }
    }
    Ok(result)
}

// the members of the first set in `keys` that are in none of the others
fn difference(db: &Db, keys: &[Vec<u8>]) -> Result<Members> {
    let (first, others) = match keys.split_first() {
        Some(split) => split,
        None => return Ok(Members::new()),
    };
    let mut result = match db.get_as_set(first)? {
        Some(set) => set,
        None => return Ok(Members::new()),
    };
    for key in others {
        if let Some(set) = db.get_as_set(key)? {
            result.retain(|m| !set.contains(m));
        }
        if result.is_empty() {
            break;
        }
    }
    Ok(result)
}

// binds `dest` to `members`, or removes it if `members` is empty
fn store(db: &Db, name: &str, args: &[Vec<u8>], members: Members) -> Result<Reply> {
    let dest = args[0].clone();
    let len = members.len();
    if members.is_empty() {
        db.store().remove(&dest);
    } else {
        db.store().put(dest, Entity::Set(members));
    }
    db.add_aof_cmd(name, args);
    Ok(Reply::Int(len as i64))
}

/// `SINTER key [key ...]`
pub fn exec_sinter(db: &Db, args: &[Vec<u8>]) -> Result<Reply> {
    Ok(Reply::array(intersect(db, args)?))
}

/// `SINTERSTORE destination key [key ...]`
pub fn exec_sinter_store(db: &Db, args: &[Vec<u8>]) -> Result<Reply> {
    let members = intersect(db, &args[1..])?;
    store(db, "sinterstore", args, members)
}

/// `SUNION key [key ...]`
pub fn exec_sunion(db: &Db, args: &[Vec<u8>]) -> Result<Reply> {
    Ok(Reply::array(union(db, args)?))
}

/// `SUNIONSTORE destination key [key ...]`
pub fn exec_sunion_store(db: &Db, args: &[Vec<u8>]) -> Result<Reply> {
    let members = union(db, &args[1..])?;
    store(db, "sunionstore", args, members)
}

/// `SDIFF key [key ...]`
pub fn exec_sdiff(db: &Db, args: &[Vec<u8>]) -> Result<Reply> {
    Ok(Reply::array(difference(db, args)?))
}

/// `SDIFFSTORE destination key [key ...]`
pub fn exec_sdiff_store(db: &Db, args: &[Vec<u8>]) -> Result<Reply> {
    let members = difference(db, &args[1..])?;
    store(db, "sdiffstore", args, members)
}
