//! The command registry an engine dispatches through.
use std::collections::HashMap;
use std::fmt;

use crate::engine::Db;
use crate::{Reply, Result};

/// The function that executes a command against one database.
///
/// `args` holds the command's arguments without the command name, i.e. `SET a b` is
/// executed with `[a, b]`.
pub type ExecFn = fn(db: &Db, args: &[Vec<u8>]) -> Result<Reply>;

/// The argument count contract of a command. The count never includes the command name.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Arity {
    /// exactly this many arguments
    Exact(usize),
    /// at least this many arguments
    AtLeast(usize),
}

impl Arity {
    /// returns true if `arg_count` arguments satisfy this arity
    pub fn accepts(&self, arg_count: usize) -> bool {
        match *self {
            Arity::Exact(n) => arg_count == n,
            Arity::AtLeast(n) => arg_count >= n,
        }
    }
}

/// the signed notation: `n >= 0` is an exact count, `n < 0` is a minimum count of `|n|`
impl From<i32> for Arity {
    fn from(n: i32) -> Self {
        if n >= 0 {
            Arity::Exact(n as usize)
        } else {
            Arity::AtLeast(n.unsigned_abs() as usize)
        }
    }
}

/// A registered command
#[derive(Clone)]
pub struct Command {
    /// the lowercase command name
    pub name: String,
    /// the executor
    pub executor: ExecFn,
    /// the argument count contract
    pub arity: Arity,
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish()
    }
}

/// The registry of commands an engine can execute.
///
/// Names are case-insensitive and a later registration of a name replaces the earlier one.
#[derive(Debug, Clone, Default)]
pub struct CommandTable {
    commands: HashMap<String, Command>,
}

impl CommandTable {
    /// creates an empty table
    pub fn new() -> Self {
        CommandTable::default()
    }

    /// registers `executor` under `name`
    pub fn register(&mut self, name: &str, executor: ExecFn, arity: impl Into<Arity>) {
        let name = name.to_lowercase();
        self.commands.insert(
            name.clone(),
            Command {
                name,
                executor,
                arity: arity.into(),
            },
        );
    }

    /// returns the command registered under the (lowercase) `name`
    pub fn lookup(&self, name: &str) -> Option<&Command> {
        self.commands.get(name)
    }

    /// the names of all registered commands
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.commands.keys().map(String::as_str)
    }

    /// the number of registered commands
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// returns true if no command is registered
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}
