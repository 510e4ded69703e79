use crate::engine::Db;
use crate::{KvError, Reply, Result};

/// `PING [message]`
pub fn exec_ping(_db: &Db, args: &[Vec<u8>]) -> Result<Reply> {
    match args {
        [] => Ok(Reply::pong()),
        [message] => Ok(Reply::Status(String::from_utf8_lossy(message).into_owned())),
        _ => Err(KvError::WrongArgCount("ping".to_string())),
    }
}
