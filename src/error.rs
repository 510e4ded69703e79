use std::io;
use thiserror::Error;

/// type alias for all operations in this crate that could fail with a [`KvError`]
pub type Result<T> = std::result::Result<T, KvError>;

/// The error variants used throughout the node.
///
/// Command level variants double as the text of the RESP error reply sent back to a client,
/// so their `Display` output follows the wording clients of the protocol expect.
#[derive(Error, Debug)]
pub enum KvError {
    /// no executor is registered under the given command name
    #[error("ERR unknown command '{0}'")]
    UnknownCommand(String),

    /// the argument count did not satisfy the command's arity
    #[error("ERR wrong number of arguments for '{0}' command")]
    WrongArgCount(String),

    /// the key holds a different kind of entity than the command operates on
    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,

    /// malformed or conflicting option flags
    #[error("ERR syntax error")]
    SyntaxError,

    /// an arithmetic command met a value that is not a base-10 integer
    #[error("ERR value is not an integer or out of range")]
    NotAnInteger,

    /// an index, offset or count fell outside of its valid range
    #[error("ERR {0} is out of range")]
    IndexOutOfRange(&'static str),

    /// the command requires an existing key
    #[error("ERR no such key")]
    NoSuchKey,

    /// a frame could not be decoded
    #[error("ERR Protocol error: '{0}'")]
    Protocol(String),

    /// a command could not be routed to (or executed on) its owning node
    #[error("ERR {0}")]
    Routing(String),

    /// an unexpected fault was caught at the command dispatch boundary
    #[error("ERR internal error")]
    Internal,

    /// invalid node configuration
    #[error("ERR invalid configuration: {0}")]
    Config(String),

    /// errors caused by file or socket IO
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// errors while reading a JSON configuration file
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
