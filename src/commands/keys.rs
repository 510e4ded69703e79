//! Commands that work on keys regardless of the kind of entity they hold.
use crate::engine::Db;
use crate::{KvError, Reply, Result};

/// `DEL key [key ...]`, returns the number of removed keys
pub fn exec_del(db: &Db, args: &[Vec<u8>]) -> Result<Reply> {
    let deleted: u32 = args.iter().map(|key| db.store().remove(key)).sum();
    if deleted > 0 {
        db.add_aof_cmd("del", args);
    }
    Ok(Reply::Int(deleted as i64))
}

/// `EXISTS key [key ...]`, returns how many of the keys exist
pub fn exec_exists(db: &Db, args: &[Vec<u8>]) -> Result<Reply> {
    let found = args.iter().filter(|key| db.store().contains(key)).count();
    Ok(Reply::Int(found as i64))
}

/// `TYPE key`
pub fn exec_type(db: &Db, args: &[Vec<u8>]) -> Result<Reply> {
    let name = db
        .store()
        .read(&args[0], |entity| entity.type_name())
        .unwrap_or("none");
    Ok(Reply::Status(name.to_string()))
}

/// `RENAME key newkey`, overwrites `newkey` if it exists
pub fn exec_rename(db: &Db, args: &[Vec<u8>]) -> Result<Reply> {
    let entity = db.store().take(&args[0]).ok_or(KvError::NoSuchKey)?;
    db.store().put(args[1].clone(), entity);
    db.add_aof_cmd("rename", args);
    Ok(Reply::ok())
}

/// `RENAMENX key newkey`, renames only if `newkey` does not exist
pub fn exec_rename_nx(db: &Db, args: &[Vec<u8>]) -> Result<Reply> {
    let (src, dest) = (&args[0], &args[1]);
    if !db.store().contains(src) {
        return Err(KvError::NoSuchKey);
    }
    if db.store().contains(dest) {
        return Ok(Reply::Int(0));
    }
    let entity = db.store().take(src).ok_or(KvError::NoSuchKey)?;
    if db.store().put_if_absent(dest.clone(), entity.clone()) == 0 {
        // lost a race for newkey, put the source back where it was
        db.store().put_if_absent(src.clone(), entity);
        return Ok(Reply::Int(0));
    }
    db.add_aof_cmd("renamenx", args);
    Ok(Reply::Int(1))
}

/// `FLUSHDB`, removes every key of the selected database
pub fn exec_flush_db(db: &Db, args: &[Vec<u8>]) -> Result<Reply> {
    db.flush();
    db.add_aof_cmd("flushdb", args);
    Ok(Reply::ok())
}

/// `RANDOMKEY`
pub fn exec_random_key(db: &Db, _args: &[Vec<u8>]) -> Result<Reply> {
    match db.store().random_keys(1).pop() {
        Some(key) => Ok(Reply::bulk(key)),
        None => Ok(Reply::null()),
    }
}
