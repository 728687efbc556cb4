//! Blocking writer that feeds an async byte stream.
//!
//! Archives are produced by synchronous code on a blocking thread while the
//! HTTP response consumes an async stream. [`ChannelWriter`] bridges the two
//! with a bounded channel, so a slow client applies back-pressure to the
//! archiver and at most `capacity` chunks are buffered at any time.

use std::io::{self, Write};

use bytes::{Bytes, BytesMut};
use tokio::sync::mpsc;

use super::transfer::DEFAULT_CHUNK_SIZE;

/// Item type carried by the channel.
pub type Chunk = io::Result<Bytes>;

/// An [`io::Write`] that sends fixed-size chunks over a Tokio channel.
///
/// Must be used from a blocking context (for example inside
/// `tokio::task::spawn_blocking`); it calls [`mpsc::Sender::blocking_send`].
#[derive(Debug)]
pub struct ChannelWriter {
    sender: mpsc::Sender<Chunk>,
    buffer: BytesMut,
    chunk_size: usize,
}

impl ChannelWriter {
    /// Create a writer that emits [`DEFAULT_CHUNK_SIZE`] chunks.
    pub fn new(sender: mpsc::Sender<Chunk>) -> Self {
        Self::with_chunk_size(sender, DEFAULT_CHUNK_SIZE)
    }

    /// Create a writer with a custom chunk size.
    pub fn with_chunk_size(sender: mpsc::Sender<Chunk>, chunk_size: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            sender,
            buffer: BytesMut::with_capacity(chunk_size),
            chunk_size,
        }
    }

    /// Forward an error to the reader so the stream ends abnormally.
    ///
    /// Buffered bytes are dropped; a truncated archive must not look complete.
    pub fn abort(self, err: io::Error) {
        let _ = self.sender.blocking_send(Err(err));
    }

    fn send_buffered(&mut self) -> io::Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let chunk = self.buffer.split().freeze();
        self.sender
            .blocking_send(Ok(chunk))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "stream receiver closed"))
    }
}

impl Write for ChannelWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.sender.is_closed() {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "stream receiver closed",
            ));
        }

        let room = self.chunk_size - self.buffer.len();
        let take = room.min(buf.len());
        self.buffer.extend_from_slice(&buf[..take]);

        if self.buffer.len() >= self.chunk_size {
            self.send_buffered()?;
        }
        Ok(take)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.send_buffered()
    }
}
