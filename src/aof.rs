//! Append-only file persistence.
//!
//! Mutating commands are handed to an [`AofSink`] which queues them on a bounded channel.
//! A single writer thread drains that channel and appends every command to the file as a
//! RESP array, preceded by a `SELECT` frame whenever the target database changes. At
//! start-up the file is replayed through the engine to rebuild its state.
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::{Mutex, RwLock, RwLockWriteGuard};
use tracing::{debug, error, info, instrument, warn};

use crate::resp::{encode_command, CmdLine, RespReader};
use crate::{Connection, KvError, Reply, Result};

/// capacity of the queue between command executors and the writer thread
pub const AOF_QUEUE_SIZE: usize = 1 << 16;

/// A command waiting to be appended to the file
#[derive(Debug, Clone)]
pub struct LogEntry {
    /// the database the command was executed against
    pub db_index: usize,
    /// the command line, beginning with the command name
    pub line: CmdLine,
}

/// The producer side of the append-only file, shared by every database.
///
/// A sink without an attached queue silently drops entries. That is the case before the
/// file is started, while it is being replayed, and after it has been closed.
#[derive(Debug, Default)]
pub struct AofSink {
    tx: RwLock<Option<Sender<LogEntry>>>,
}

impl AofSink {
    /// creates a sink with no queue attached
    pub fn new() -> Self {
        AofSink::default()
    }

    /// queues `line` for the writer thread. Blocks while the queue is full
    pub fn append(&self, db_index: usize, line: CmdLine) {
        let tx = self.tx.read().clone();
        if let Some(tx) = tx {
            if tx.send(LogEntry { db_index, line }).is_err() {
                warn!("append-only writer has stopped, dropping entry");
            }
        }
    }

    /// returns true if entries are currently being queued
    pub fn is_attached(&self) -> bool {
        self.tx.read().is_some()
    }

    fn attach(&self, tx: Sender<LogEntry>) {
        *self.tx.write() = Some(tx);
    }

    fn detach(&self) -> Option<Sender<LogEntry>> {
        self.tx.write().take()
    }
}

/// Owns the append-only file: replays it, runs its writer thread and closes it.
#[derive(Debug)]
pub struct AofHandler {
    path: PathBuf,
    sink: Arc<AofSink>,
    // taken for reading around every append, a log rewrite would take it for writing
    pausing: Arc<RwLock<()>>,
    worker: Mutex<Option<JoinHandle<BufWriter<File>>>>,
}

impl AofHandler {
    /// creates a handler for the file at `path` that consumes the entries of `sink`
    pub fn new(path: impl Into<PathBuf>, sink: Arc<AofSink>) -> Self {
        AofHandler {
            path: path.into(),
            sink,
            pausing: Arc::new(RwLock::new(())),
            worker: Mutex::new(None),
        }
    }

    /// path of the append-only file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replays the file by passing every command it contains to `exec`, along with a
    /// placeholder connection that follows the `SELECT` frames of the file.
    ///
    /// A missing file is an empty history. Malformed frames are logged and skipped, a
    /// truncated trailing frame ends the replay. The sink is detached while replaying so
    /// the replayed commands are not appended again.
    ///
    /// Returns the number of commands that were replayed.
    #[instrument(skip(self, exec), fields(path = ?self.path))]
    pub fn load<F>(&self, mut exec: F) -> Result<usize>
    where
        F: FnMut(&mut Connection, &[Vec<u8>]) -> Reply,
    {
        let saved = self.sink.detach();
        let replayed = self.replay(&mut exec);
        if let Some(tx) = saved {
            self.sink.attach(tx);
        }
        replayed
    }

    fn replay<F>(&self, exec: &mut F) -> Result<usize>
    where
        F: FnMut(&mut Connection, &[Vec<u8>]) -> Reply,
    {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("no append-only file to load");
                return Ok(0);
            }
            Err(e) => return Err(e.into()),
        };

        let mut reader = RespReader::new(BufReader::new(file));
        let mut conn = Connection::fake();
        let mut replayed = 0_usize;
        loop {
            let frame = match reader.read_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(KvError::Protocol(msg)) => {
                    warn!("skipping malformed frame: {}", msg);
                    continue;
                }
                Err(e) => {
                    warn!("stopped loading append-only file: {}", e);
                    break;
                }
            };
            let line: CmdLine = match frame {
                Reply::MultiBulk(items) if !items.is_empty() => {
                    items.into_iter().map(Option::unwrap_or_default).collect()
                }
                other => {
                    error!("require multi bulk frame, skipping {:?}", other);
                    continue;
                }
            };
            if let Reply::Error(msg) = exec(&mut conn, &line) {
                error!("replayed command failed: {}", msg);
            }
            replayed += 1;
        }
        info!(replayed, "append-only file loaded");
        Ok(replayed)
    }

    /// opens (or creates) the file for appending and starts the writer thread
    #[instrument(skip(self), fields(path = ?self.path))]
    pub fn start(&self) -> Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let (tx, rx) = channel::bounded(AOF_QUEUE_SIZE);
        let pausing = Arc::clone(&self.pausing);
        let handle = thread::Builder::new()
            .name("aof-writer".to_string())
            .spawn(move || write_entries(rx, BufWriter::new(file), pausing))?;
        *self.worker.lock() = Some(handle);
        self.sink.attach(tx);
        debug!("append-only writer started");
        Ok(())
    }

    /// Blocks the writer thread until the returned guard is dropped.
    ///
    /// Entries keep queueing while the writer is paused.
    pub fn pause(&self) -> RwLockWriteGuard<'_, ()> {
        self.pausing.write()
    }

    /// Stops accepting entries, waits for the writer thread to append every queued entry
    /// and then syncs and closes the file. Calling `close` again has no effect
    pub fn close(&self) {
        self.sink.detach();
        let handle = match self.worker.lock().take() {
            Some(handle) => handle,
            None => return,
        };
        match handle.join() {
            Ok(writer) => match writer.into_inner() {
                Ok(file) => {
                    if let Err(e) = file.sync_all() {
                        warn!("could not sync append-only file: {}", e);
                    }
                }
                Err(e) => warn!("could not flush append-only file: {}", e),
            },
            Err(_) => error!("append-only writer thread panicked"),
        }
        info!(path = ?self.path, "append-only file closed");
    }
}

/// the writer thread. Appends entries until every sender is gone, then hands the file back
fn write_entries(
    rx: Receiver<LogEntry>,
    mut writer: BufWriter<File>,
    pausing: Arc<RwLock<()>>,
) -> BufWriter<File> {
    // unknown until the first write, the file may end in any database
    let mut current_db: Option<usize> = None;
    for entry in rx.iter() {
        let _paused = pausing.read();
        if current_db != Some(entry.db_index) {
            let select = encode_command(&[b"SELECT".to_vec(), entry.db_index.to_string().into_bytes()]);
            if let Err(e) = writer.write_all(&select) {
                warn!("could not append SELECT {}: {}", entry.db_index, e);
                continue;
            }
            current_db = Some(entry.db_index);
        }
        if let Err(e) = writer.write_all(&encode_command(&entry.line)) {
            warn!("could not append entry: {}", e);
            continue;
        }
        if rx.is_empty() {
            if let Err(e) = writer.flush() {
                warn!("could not flush append-only file: {}", e);
            }
        }
    }
    if let Err(e) = writer.flush() {
        warn!("could not flush append-only file: {}", e);
    }
    debug!("append-only writer drained");
    writer
}
