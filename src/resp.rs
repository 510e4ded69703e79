//! Encoding and decoding of the RESP wire format.
//!
//! [`Reply`] is the structured value every command produces. It is also what [`RespReader`]
//! yields when decoding a byte stream, in which case an [`Reply::MultiBulk`] frame is a
//! command line sent by a client (or stored in the append-only file). Frames are parsed
//! and written by `redis_protocol`, this module only converts between its RESP2 frames
//! and [`Reply`].
use std::io::{self, BufRead};

use redis_protocol::resp2::decode::decode;
use redis_protocol::resp2::encode::encode;
use redis_protocol::resp2::types::{OwnedFrame, Resp2Frame};
use tracing::error;

use crate::{KvError, Result};

/// a command line: the command name followed by its arguments
pub type CmdLine = Vec<Vec<u8>>;

// upper bound on the bytes buffered for one frame, a bulk string may hold up to 512 MiB
const MAX_FRAME_LEN: usize = 512 * 1024 * 1024 + 64 * 1024;

/// A RESP value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// `+text`
    Status(String),
    /// `-message`
    Error(String),
    /// `:n`
    Int(i64),
    /// `$len bytes`, or `$-1` when `None`
    Bulk(Option<Vec<u8>>),
    /// `*count` followed by bulk strings, `None` elements are encoded as `$-1`
    MultiBulk(Vec<Option<Vec<u8>>>),
}

impl Reply {
    /// `+OK`
    pub fn ok() -> Reply {
        Reply::Status("OK".to_string())
    }

    /// `+PONG`
    pub fn pong() -> Reply {
        Reply::Status("PONG".to_string())
    }

    /// the null bulk string, `$-1`
    pub fn null() -> Reply {
        Reply::Bulk(None)
    }

    /// a bulk string holding `bytes`
    pub fn bulk(bytes: impl Into<Vec<u8>>) -> Reply {
        Reply::Bulk(Some(bytes.into()))
    }

    /// the empty array, `*0`
    pub fn empty() -> Reply {
        Reply::MultiBulk(Vec::new())
    }

    /// an array of (non-null) bulk strings
    pub fn array<I, T>(items: I) -> Reply
    where
        I: IntoIterator<Item = T>,
        T: Into<Vec<u8>>,
    {
        Reply::MultiBulk(items.into_iter().map(|i| Some(i.into())).collect())
    }

    /// returns true if this reply is an error reply
    pub fn is_error(&self) -> bool {
        matches!(self, Reply::Error(_))
    }

    /// encodes this reply into its canonical RESP bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        encode_frame(&OwnedFrame::from(self.clone()))
    }
}

impl From<KvError> for Reply {
    fn from(e: KvError) -> Self {
        Reply::Error(e.to_string())
    }
}

impl From<Reply> for OwnedFrame {
    fn from(reply: Reply) -> Self {
        match reply {
            Reply::Status(text) => OwnedFrame::SimpleString(text.into_bytes()),
            Reply::Error(msg) => OwnedFrame::Error(msg),
            Reply::Int(n) => OwnedFrame::Integer(n),
            Reply::Bulk(bulk) => bulk_frame(bulk),
            Reply::MultiBulk(items) => OwnedFrame::Array(items.into_iter().map(bulk_frame).collect()),
        }
    }
}

impl TryFrom<OwnedFrame> for Reply {
    type Error = KvError;

    fn try_from(frame: OwnedFrame) -> Result<Reply> {
        let reply = match frame {
            OwnedFrame::SimpleString(text) => Reply::Status(String::from_utf8_lossy(&text).into_owned()),
            OwnedFrame::Error(msg) => Reply::Error(msg),
            OwnedFrame::Integer(n) => Reply::Int(n),
            OwnedFrame::BulkString(bytes) => Reply::Bulk(Some(bytes)),
            OwnedFrame::Null => Reply::Bulk(None),
            OwnedFrame::Array(items) => Reply::MultiBulk(
                items
                    .into_iter()
                    .map(array_item)
                    .collect::<Result<Vec<_>>>()?,
            ),
        };
        Ok(reply)
    }
}

fn bulk_frame(bulk: Option<Vec<u8>>) -> OwnedFrame {
    match bulk {
        Some(bytes) => OwnedFrame::BulkString(bytes),
        None => OwnedFrame::Null,
    }
}

// an element of an array frame, only flat arrays of strings are accepted
fn array_item(frame: OwnedFrame) -> Result<Option<Vec<u8>>> {
    match frame {
        OwnedFrame::BulkString(bytes) | OwnedFrame::SimpleString(bytes) => Ok(Some(bytes)),
        OwnedFrame::Integer(n) => Ok(Some(n.to_string().into_bytes())),
        OwnedFrame::Null => Ok(None),
        other => Err(KvError::Protocol(format!("expected bulk string, got {:?}", other))),
    }
}

fn encode_frame(frame: &OwnedFrame) -> Vec<u8> {
    let mut buf = vec![0_u8; frame.encode_len(false)];
    match encode(&mut buf, frame, false) {
        Ok(len) => buf.truncate(len),
        Err(e) => {
            error!("could not encode frame: {}", e);
            buf.clear();
        }
    }
    buf
}

/// encodes a command line as a RESP array of bulk strings
pub fn encode_command<T: AsRef<[u8]>>(line: &[T]) -> Vec<u8> {
    let items = line
        .iter()
        .map(|arg| OwnedFrame::BulkString(arg.as_ref().to_vec()))
        .collect();
    encode_frame(&OwnedFrame::Array(items))
}

/// builds a [`CmdLine`] out of string arguments
pub fn cmd_line(args: &[&str]) -> CmdLine {
    args.iter().map(|a| a.as_bytes().to_vec()).collect()
}

/// Decodes a stream of RESP frames from a buffered reader.
///
/// Bytes are pulled from the reader until a whole frame is buffered. A malformed frame is
/// dropped up to the end of its line before the error is returned, so a caller can log the
/// error and keep reading the frames that follow it.
pub struct RespReader<R: BufRead> {
    reader: R,
    buf: Vec<u8>,
}

impl<R: BufRead> RespReader<R> {
    /// wraps the given `reader`
    pub fn new(reader: R) -> Self {
        RespReader {
            reader,
            buf: Vec::new(),
        }
    }

    /// reads the next frame.
    ///
    /// Returns `Ok(None)` on a clean end of stream, `Err(KvError::Protocol)` for a malformed
    /// frame and `Err(KvError::Io)` if the underlying reader failed, including a stream that
    /// ended in the middle of a frame.
    pub fn read_frame(&mut self) -> Result<Option<Reply>> {
        loop {
            match decode(&self.buf) {
                Ok(Some((frame, len))) => {
                    self.buf.drain(..len);
                    return Reply::try_from(frame).map(Some);
                }
                Ok(None) => {}
                Err(e) => {
                    self.skip_line();
                    return Err(KvError::Protocol(e.to_string()));
                }
            }
            if self.buf.len() > MAX_FRAME_LEN {
                self.buf.clear();
                return Err(KvError::Protocol("frame is too large".to_string()));
            }
            if !self.fill()? {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                self.buf.clear();
                return Err(KvError::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "stream ended in the middle of a frame",
                )));
            }
        }
    }

    // moves whatever the reader has available into the buffer, false at end of stream
    fn fill(&mut self) -> Result<bool> {
        let available = loop {
            match self.reader.fill_buf() {
                Ok(available) => break available,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        };
        if available.is_empty() {
            return Ok(false);
        }
        let read = available.len();
        self.buf.extend_from_slice(available);
        self.reader.consume(read);
        Ok(true)
    }

    // drops the buffered bytes up to and including the next line feed
    fn skip_line(&mut self) {
        match self.buf.iter().position(|&b| b == b'\n') {
            Some(end) => {
                self.buf.drain(..=end);
            }
            None => self.buf.clear(),
        }
    }
}

impl<R: BufRead> Iterator for RespReader<R> {
    type Item = Result<Reply>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_frame().transpose()
    }
}
