//! This module provides the command execution engines.
//!
//! [`StandaloneEngine`] executes commands against its own set of databases, and is
//! wrapped by the cluster engine when the node runs as part of a cluster. Both implement
//! the [`Database`] trait, which is all the server needs to know about them.
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use tracing::error;

use crate::{Connection, KvError, Reply, Result};

/// A trait for the basic functionality of a command execution engine
pub trait Database: Clone + Send + Sync + 'static {
    /// executes a decoded command line on behalf of the client `conn`
    ///
    /// The first token of `line` is the command name. Any failure, including an
    /// unexpected fault of the command itself, is returned as an error reply.
    fn exec(&self, conn: &mut Connection, line: &[Vec<u8>]) -> Reply;

    /// gracefully shuts the engine down, flushing any pending persistence work
    fn close(&self);
}

mod db;
mod standalone;

pub use self::db::Db;
pub use self::standalone::StandaloneEngine;

/// Runs one command dispatch, converting its error into an error reply.
///
/// This is the single recovery point per command: a panic raised while the command runs is
/// logged and answered with [`KvError::Internal`] rather than unwinding into the caller.
pub(crate) fn guarded<F>(line: &[Vec<u8>], dispatch: F) -> Reply
where
    F: FnOnce() -> Result<Reply>,
{
    match panic::catch_unwind(AssertUnwindSafe(dispatch)) {
        Ok(Ok(reply)) => reply,
        Ok(Err(e)) => e.into(),
        Err(cause) => {
            let name = line
                .first()
                .map(|n| String::from_utf8_lossy(n).into_owned())
                .unwrap_or_default();
            error!("command '{}' failed unexpectedly: {}", name, panic_message(cause.as_ref()));
            KvError::Internal.into()
        }
    }
}

fn panic_message(cause: &(dyn Any + Send)) -> &str {
    if let Some(msg) = cause.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = cause.downcast_ref::<String>() {
        msg
    } else {
        "unknown panic"
    }
}
