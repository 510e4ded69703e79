use std::sync::Arc;

use tracing::{debug, info, instrument};

use super::{guarded, Database, Db};
use crate::aof::{AofHandler, AofSink};
use crate::command::CommandTable;
use crate::{commands, Config, Connection, KvError, Reply, Result};

/// An engine that executes every command against its own, local databases.
///
/// It owns `databases` independent key spaces and, when append-only persistence is
/// enabled, the [`AofHandler`] that records their changes. The file is replayed while the
/// engine is opened, before it can be handed to a server.
///
/// Cloning the engine is cheap, all clones share the same databases.
#[derive(Debug, Clone)]
pub struct StandaloneEngine {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    dbs: Vec<Db>,
    table: CommandTable,
    aof: Option<AofHandler>,
}

impl StandaloneEngine {
    /// opens an engine that executes the built-in command set
    pub fn open(config: &Config) -> Result<StandaloneEngine> {
        StandaloneEngine::with_table(config, commands::table())
    }

    /// opens an engine that executes the commands registered in `table`
    #[instrument(skip(config, table), fields(databases = config.databases, append_only = config.append_only))]
    pub fn with_table(config: &Config, table: CommandTable) -> Result<StandaloneEngine> {
        if config.databases == 0 {
            return Err(KvError::Config("at least one database is required".to_string()));
        }
        let sink = Arc::new(AofSink::new());
        let dbs = (0..config.databases)
            .map(|index| Db::new(index, Arc::clone(&sink)))
            .collect();
        let mut inner = Inner {
            dbs,
            table,
            aof: None,
        };

        if config.append_only {
            let handler = AofHandler::new(&config.append_filename, sink);
            let replayed = handler.load(|conn, line| guarded(line, || inner.exec(conn, line)))?;
            debug!(replayed);
            handler.start()?;
            inner.aof = Some(handler);
        }
        info!("engine opened with {} commands", inner.table.len());

        Ok(StandaloneEngine {
            inner: Arc::new(inner),
        })
    }

    /// the database at `index`
    pub fn db(&self, index: usize) -> Option<&Db> {
        self.inner.dbs.get(index)
    }

    /// the number of databases
    pub fn db_count(&self) -> usize {
        self.inner.dbs.len()
    }

    /// the append-only file handler, `None` if persistence is disabled
    pub fn aof(&self) -> Option<&AofHandler> {
        self.inner.aof.as_ref()
    }

    /// executes `line` without a recovery boundary, for callers that run inside their own
    pub(crate) fn exec_unguarded(&self, conn: &mut Connection, line: &[Vec<u8>]) -> Result<Reply> {
        self.inner.exec(conn, line)
    }
}

impl Database for StandaloneEngine {
    fn exec(&self, conn: &mut Connection, line: &[Vec<u8>]) -> Reply {
        guarded(line, || self.inner.exec(conn, line))
    }

    fn close(&self) {
        if let Some(aof) = &self.inner.aof {
            aof.close();
        }
    }
}

impl Inner {
    fn exec(&self, conn: &mut Connection, line: &[Vec<u8>]) -> Result<Reply> {
        let (name, args) = line
            .split_first()
            .ok_or_else(|| KvError::Protocol("empty command".to_string()))?;
        let name = String::from_utf8_lossy(name).to_lowercase();
        if name == "select" {
            if args.len() != 1 {
                return Err(KvError::WrongArgCount(name));
            }
            return self.select(conn, &args[0]);
        }

        let db = self
            .dbs
            .get(conn.db_index())
            .ok_or(KvError::IndexOutOfRange("DB index"))?;
        let cmd = self
            .table
            .lookup(&name)
            .ok_or_else(|| KvError::UnknownCommand(name.clone()))?;
        if !cmd.arity.accepts(args.len()) {
            return Err(KvError::WrongArgCount(name));
        }
        (cmd.executor)(db, args)
    }

    fn select(&self, conn: &mut Connection, arg: &[u8]) -> Result<Reply> {
        let index = std::str::from_utf8(arg)
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .filter(|&i| i < self.dbs.len())
            .ok_or(KvError::IndexOutOfRange("DB index"))?;
        conn.select_db(index);
        Ok(Reply::ok())
    }
}
