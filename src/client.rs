use std::io::{BufReader, BufWriter, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::debug;

use crate::resp::{encode_command, RespReader};
use crate::{KvError, Reply, Result};

/// `PeerClient` contains the functionality for communication with a [`KvServer`], or any
/// other server speaking RESP.
///
/// It is used by the `kvnode-cli` binary and, pooled, by the cluster engine to relay
/// commands to the node that owns a key.
///
/// [`KvServer`]: ./struct.KvServer.html
pub struct PeerClient {
    reader: RespReader<BufReader<TcpStream>>,
    writer: BufWriter<TcpStream>,
    // set once the connection failed, the stream is out of sync with the peer from then on
    broken: bool,
}

impl PeerClient {
    /// creates a client and establishes a socket connection to the server at the given `addr`
    ///
    /// The connection is checked with a `PING` before it is returned.
    pub fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        PeerClient::connect_with_timeout(addr, None)
    }

    /// like [`PeerClient::connect`], but connecting, reading and writing fail after `timeout`
    pub fn connect_with_timeout<A: ToSocketAddrs>(addr: A, timeout: Option<Duration>) -> Result<Self> {
        let tcp_reader = match timeout {
            Some(timeout) => {
                let addr = addr.to_socket_addrs()?.next().ok_or_else(|| {
                    KvError::Io(std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        "address resolved to nothing",
                    ))
                })?;
                TcpStream::connect_timeout(&addr, timeout)?
            }
            None => TcpStream::connect(addr)?,
        };
        tcp_reader.set_read_timeout(timeout)?;
        tcp_reader.set_write_timeout(timeout)?;
        let tcp_writer = tcp_reader.try_clone()?;

        let mut client = PeerClient {
            reader: RespReader::new(BufReader::new(tcp_reader)),
            writer: BufWriter::new(tcp_writer),
            broken: false,
        };
        match client.send(&[b"PING".as_ref()])? {
            Reply::Status(status) if status == "PONG" => {
                debug!("connected to {:?}", client.writer.get_ref().peer_addr().ok());
                Ok(client)
            }
            other => Err(KvError::Routing(format!("unexpected handshake reply: {:?}", other))),
        }
    }

    /// sends one command line and waits for its reply
    ///
    /// An error reply of the server is returned as `Ok(Reply::Error)`, `Err` means the
    /// connection itself failed and is marked as broken.
    pub fn send<T: AsRef<[u8]>>(&mut self, line: &[T]) -> Result<Reply> {
        let result = self.round_trip(line);
        if result.is_err() {
            self.broken = true;
        }
        result
    }

    fn round_trip<T: AsRef<[u8]>>(&mut self, line: &[T]) -> Result<Reply> {
        self.writer.write_all(&encode_command(line))?;
        self.writer.flush()?;
        self.reader.read_frame()?.ok_or_else(|| {
            KvError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionAborted,
                "connection closed by peer",
            ))
        })
    }

    /// returns true once sending a command failed
    pub fn is_broken(&self) -> bool {
        self.broken
    }
}
