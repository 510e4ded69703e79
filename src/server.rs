use std::io::{BufReader, BufWriter, Write};
use std::net::{TcpListener, TcpStream, ToSocketAddrs};

use tracing::{debug, error, info, warn};

use crate::resp::{CmdLine, RespReader};
use crate::thread_pool::ThreadPool;
use crate::{Connection, Database, KvError, Reply, Result};

/// A TCP socket server implementation over a command execution engine.
///
/// It listens for RESP command frames on a [`SocketAddr`](https://doc.rust-lang.org/std/net/enum.SocketAddr.html),
/// decodes them, and serves every client on a job of its [`ThreadPool`].
///
/// Each job receives a handle to a [`Database`], and uses that engine to execute the commands
/// of its client, in order.
///
/// # Example
/// Create and run a new server listening on "127.0.0.1:6399", serving each client on its own
/// thread
/// ```rust,no_run
/// use kvnode::{Config, KvServer, StandaloneEngine};
/// use kvnode::thread_pool::{NaiveThreadPool, ThreadPool};
/// # fn main() -> kvnode::Result<()> {
/// let engine = StandaloneEngine::open(&Config::default())?;
/// let server = KvServer::new(engine, NaiveThreadPool::new(0)?);
/// server.run("127.0.0.1:6399")?;
/// # Ok(())
/// # }
/// ```
pub struct KvServer<D: Database, P: ThreadPool> {
    /// the engine that executes commands
    engine: D,
    /// a pool of threads that will serve clients using a handle to the engine
    pool: P,
}

impl<D: Database, P: ThreadPool> KvServer<D, P> {
    /// Create a new `KvServer` using the given [`Database`] and [`ThreadPool`] implementation.
    pub fn new(engine: D, pool: P) -> Self {
        KvServer { engine, pool }
    }

    /// starts a server listening on the given address.
    ///
    /// # Errors
    /// returns [`KvError`] if the server could not be started
    ///
    /// [`KvError`]: ./enum.KvError.html
    pub fn run<A: ToSocketAddrs>(self, addr: A) -> Result<()> {
        let listener = TcpListener::bind(addr)?;
        self.run_listener(listener)
    }

    /// serves the clients accepted by an already bound `listener`
    pub fn run_listener(self, listener: TcpListener) -> Result<()> {
        info!("listening on {}", listener.local_addr()?);
        for stream in listener.incoming() {
            match stream {
                Ok(stream) => {
                    let engine = self.engine.clone();
                    self.pool.spawn(move || {
                        if let Err(e) = serve(engine, stream) {
                            error!("Error on serving client: {}", e);
                        }
                    });
                }
                Err(e) => error!("Connection failed: {}", e),
            }
        }
        Ok(())
    }
}

/// Executes the command frames coming over the given `tcp` stream until the client
/// disconnects, writing one reply per frame.
///
/// A malformed frame is answered with a protocol error and the connection carries on, an
/// I/O error ends it.
fn serve<D: Database>(engine: D, tcp: TcpStream) -> Result<()> {
    let peer_addr = tcp.peer_addr()?;
    let mut conn = Connection::new(peer_addr);
    let mut frames = RespReader::new(BufReader::new(&tcp));
    let mut stream_writer = BufWriter::new(&tcp);
    debug!("client connected: {}", peer_addr);

    let mut send_reply = move |reply: Reply| -> Result<()> {
        stream_writer.write_all(&reply.to_bytes())?;
        stream_writer.flush()?;
        Ok(())
    };

    loop {
        let frame = match frames.read_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(e @ KvError::Protocol(_)) => {
                warn!("bad frame from {}: {}", peer_addr, e);
                send_reply(e.into())?;
                continue;
            }
            Err(e) => return Err(e),
        };
        let line: CmdLine = match frame {
            Reply::MultiBulk(items) => items.into_iter().map(Option::unwrap_or_default).collect(),
            // inline commands are not supported, only arrays of bulk strings
            other => {
                send_reply(KvError::Protocol(format!("expected an array, got {:?}", other)).into())?;
                continue;
            }
        };
        if line.is_empty() {
            continue;
        }
        let reply = engine.exec(&mut conn, &line);
        send_reply(reply)?;
    }
    debug!("client disconnected: {}", peer_addr);
    Ok(())
}
