//! Streaming element writer.
//!
//! Payloads go straight to the sink; nothing is buffered. Master
//! elements are opened with a full-width unknown-size header so the real
//! size can be patched into those bytes when the sink is seekable.

use std::io;

use crate::varint::{self, UNKNOWN_SIZE};
use crate::{Id, Sink};

struct MasterFrame {
    id: Id,
    header_offset: u64,
    body_offset: u64,
}

/// Writes EBML elements to a [`Sink`].
pub struct Writer<S> {
    sink: S,
    offset: u64,
    masters: Vec<MasterFrame>,
}

impl<S: Sink> Writer<S> {
    /// Creates a writer positioned at the start of `sink`.
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            offset: 0,
            masters: Vec::new(),
        }
    }

    /// Whether the sink supports size fix-up and repositioning.
    pub fn can_seek(&self) -> bool {
        self.sink.can_seek()
    }

    /// Current write position.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Repositions a seekable sink. Returns `false` when the sink is
    /// append-only or refuses the position.
    pub fn set_offset(&mut self, offset: u64) -> bool {
        if !self.sink.can_seek() || self.sink.seek_to(offset).is_err() {
            return false;
        }
        self.offset = offset;
        true
    }

    /// Consumes the writer, returning the sink.
    ///
    /// Any still-open master elements keep their unknown-size headers.
    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Writes an unsigned integer element in its shortest width.
    pub fn write_uint(&mut self, id: Id, value: u64) -> io::Result<usize> {
        let width = unsigned_width(value);
        let bytes = value.to_be_bytes();
        self.write_binary(id, &bytes[8 - width..])
    }

    /// Writes a signed integer element in the shortest two's-complement
    /// width that preserves the sign.
    pub fn write_int(&mut self, id: Id, value: i64) -> io::Result<usize> {
        let width = signed_width(value);
        let bytes = value.to_be_bytes();
        self.write_binary(id, &bytes[8 - width..])
    }

    /// Writes a float element, always as a big-endian double.
    pub fn write_float(&mut self, id: Id, value: f64) -> io::Result<usize> {
        self.write_binary(id, &value.to_be_bytes())
    }

    /// Writes a string element, raw bytes with no terminator.
    pub fn write_string(&mut self, id: Id, value: &str) -> io::Result<usize> {
        self.write_binary(id, value.as_bytes())
    }

    /// Writes a binary element.
    pub fn write_binary(&mut self, id: Id, body: &[u8]) -> io::Result<usize> {
        let header_bytes = self.write_header(id, body.len() as u64)?;
        let body_bytes = self.write_out(body)?;
        Ok(header_bytes + body_bytes)
    }

    /// Opens a master element with a full-width unknown-size header.
    pub fn write_master_start(&mut self, id: Id) -> io::Result<usize> {
        let header_offset = self.offset;
        let written = self.write_header_full(id, UNKNOWN_SIZE)?;
        self.masters.push(MasterFrame {
            id,
            header_offset,
            body_offset: self.offset,
        });
        Ok(written)
    }

    /// Closes master elements down to and including `id`.
    ///
    /// On a seekable sink every closed master's size is rewritten in
    /// place over the reserved full-width header; an append-only sink
    /// leaves the unknown-size headers as written.
    ///
    /// Panics when `id` is not on the stack of open masters, or when a
    /// seekable sink fails during the rewrite.
    pub fn write_master_end(&mut self, id: Id) {
        let end_offset = self.offset;

        let mut rewrote = false;
        loop {
            let frame = self
                .masters
                .pop()
                .expect("no open master element to close");

            if self.sink.can_seek() && self.sink.seek_to(frame.header_offset).is_ok() {
                self.offset = frame.header_offset;
                rewrote = true;
                let size = end_offset - frame.body_offset;
                if self.write_header_full(frame.id, size).is_err() {
                    panic!("size rewrite failed for {}", frame.id.name());
                }
            }

            if frame.id == id {
                break;
            }
        }

        if rewrote {
            if self.sink.seek_to(end_offset).is_err() {
                panic!("seek back after size rewrite failed");
            }
            self.offset = end_offset;
        }
    }

    /// Writes a Void element spanning exactly `total_size` bytes.
    ///
    /// Panics when `total_size` is below 2, the smallest possible
    /// element.
    pub fn write_void(&mut self, total_size: usize) -> io::Result<usize> {
        assert!(total_size >= 2, "can't void a space smaller than 2 bytes");

        let pad;
        let mut written;
        if total_size < 9 {
            pad = total_size - 2;
            written = self.write_header(Id::Void, pad as u64)?;
        } else {
            pad = total_size - 9;
            written = self.write_header_full(Id::Void, pad as u64)?;
        }

        if pad > 0 {
            written += self.write_out(&vec![0u8; pad])?;
        }
        Ok(written)
    }

    /// Writes pre-encoded bytes as-is.
    pub fn write_raw(&mut self, bytes: &[u8]) -> io::Result<usize> {
        self.write_out(bytes)
    }

    fn write_header(&mut self, id: Id, size: u64) -> io::Result<usize> {
        let id_bytes = self.write_out(&varint::encode_id(id.value()))?;
        let size_bytes = self.write_out(&varint::encode_size(size, false))?;
        Ok(id_bytes + size_bytes)
    }

    fn write_header_full(&mut self, id: Id, size: u64) -> io::Result<usize> {
        let id_bytes = self.write_out(&varint::encode_id(id.value()))?;
        let size_bytes = self.write_out(&varint::encode_size(size, true))?;
        Ok(id_bytes + size_bytes)
    }

    fn write_out(&mut self, bytes: &[u8]) -> io::Result<usize> {
        self.sink.write_all(bytes)?;
        self.offset += bytes.len() as u64;
        Ok(bytes.len())
    }
}

fn unsigned_width(value: u64) -> usize {
    let bits = (64 - value.leading_zeros() as usize).max(1);
    ((bits + 7) / 8).min(8)
}

fn signed_width(value: i64) -> usize {
    // The wide encoding of this one value is kept for byte-exact round
    // trips with existing outputs.
    if value == 0x8000_0000 {
        return 8;
    }
    // Significant bits plus one sign bit, rounded up to whole bytes.
    let magnitude = if value < 0 { !value } else { value };
    let bits = 64 - (magnitude as u64).leading_zeros() as usize + 1;
    (bits + 7) / 8
}
