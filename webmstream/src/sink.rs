//! Write targets for the element writer.

use std::fs::File;
use std::io::{self, Seek, SeekFrom, Write};

/// A byte sink that may or may not support repositioning.
///
/// Seekability decides whether master element sizes can be fixed up
/// after the fact; an append-only sink leaves them as unknown-size
/// headers.
pub trait Sink {
    /// Writes every byte of `buf` at the current position.
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()>;

    /// Whether [`seek_to`](Sink::seek_to) is supported.
    fn can_seek(&self) -> bool;

    /// Moves the write position to `offset` from the start.
    fn seek_to(&mut self, offset: u64) -> io::Result<()>;
}

/// Growable, seekable in-memory sink.
///
/// Writing past the end extends the buffer; seeking is allowed anywhere
/// up to the high-water length, and overwrites leave the length alone.
#[derive(Debug, Default)]
pub struct BufferSink {
    data: Vec<u8>,
    cursor: usize,
}

impl BufferSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty sink with reserved capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            cursor: 0,
        }
    }

    /// Everything written so far.
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Consumes the sink, returning its contents.
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

impl Sink for BufferSink {
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        let end = self.cursor + buf.len();
        if end > self.data.len() {
            self.data.resize(end, 0);
        }
        self.data[self.cursor..end].copy_from_slice(buf);
        self.cursor = end;
        Ok(())
    }

    fn can_seek(&self) -> bool {
        true
    }

    fn seek_to(&mut self, offset: u64) -> io::Result<()> {
        if offset as usize > self.data.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek past end of buffer",
            ));
        }
        self.cursor = offset as usize;
        Ok(())
    }
}

impl Sink for File {
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        Write::write_all(self, buf)
    }

    fn can_seek(&self) -> bool {
        true
    }

    fn seek_to(&mut self, offset: u64) -> io::Result<()> {
        self.seek(SeekFrom::Start(offset)).map(|_| ())
    }
}

/// Append-only adapter for pipes, sockets and other unseekable writers.
#[derive(Debug)]
pub struct PipeSink<W> {
    inner: W,
}

impl<W: Write> PipeSink<W> {
    /// Wraps `inner`.
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Consumes the sink, returning the wrapped writer.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Sink for PipeSink<W> {
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.inner.write_all(buf)
    }

    fn can_seek(&self) -> bool {
        false
    }

    fn seek_to(&mut self, _offset: u64) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "sink is append-only",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_and_extend() {
        let mut sink = BufferSink::new();
        sink.write_all(&[1, 2, 3]).unwrap();
        sink.write_all(&[4, 5]).unwrap();
        assert_eq!(sink.bytes(), &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_overwrite_keeps_length() {
        let mut sink = BufferSink::new();
        sink.write_all(&[1, 2, 3, 4, 5]).unwrap();
        sink.seek_to(1).unwrap();
        sink.write_all(&[9, 9]).unwrap();
        assert_eq!(sink.bytes(), &[1, 9, 9, 4, 5]);

        // Writing past the old end after a seek still extends.
        sink.write_all(&[6, 7, 8]).unwrap();
        assert_eq!(sink.bytes(), &[1, 9, 9, 6, 7, 8]);
    }

    #[test]
    fn test_seek_past_end_fails() {
        let mut sink = BufferSink::new();
        sink.write_all(&[1, 2]).unwrap();
        assert!(sink.seek_to(3).is_err());
        assert!(sink.seek_to(2).is_ok());
    }

    #[test]
    fn test_pipe_sink_refuses_seeks() {
        let mut sink = PipeSink::new(Vec::new());
        sink.write_all(&[1]).unwrap();
        assert!(!sink.can_seek());
        assert!(sink.seek_to(0).is_err());
    }
}
