//! Typed element dispatch.
//!
//! [`ElementParser`] sits on top of the low-level parser: it buffers each
//! non-master element's body and decodes it on element end according to
//! the schema, delivering one typed callback per element.

use tracing::warn;

use crate::{Id, ParserClient, Schema, Type};

/// Receives typed element events.
///
/// Each callback returns whether parsing should continue; `false`
/// poisons the parser that is driving the dispatch.
pub trait ElementClient {
    /// A master element opened.
    fn on_master_start(&mut self, offset: u64, id: Id) -> bool;
    /// A master element closed.
    fn on_master_end(&mut self, offset: u64, id: Id) -> bool;
    /// A binary element, or any element missing from the schema.
    fn on_binary(&mut self, id: Id, value: &[u8]) -> bool;
    /// A signed integer element.
    fn on_int(&mut self, id: Id, value: i64) -> bool;
    /// An unsigned integer element.
    fn on_uint(&mut self, id: Id, value: u64) -> bool;
    /// A float element.
    fn on_float(&mut self, id: Id, value: f64) -> bool;
    /// An ASCII or UTF-8 string element.
    fn on_string(&mut self, id: Id, value: &str) -> bool;
}

/// Materializes element bodies and dispatches them by type.
///
/// Memory use is bounded by the largest single non-master element: the
/// whole body is held until its end event. Register container-sized
/// elements (Segment, Cluster) as masters so their children stream
/// through instead.
pub struct ElementParser<C> {
    id: Id,
    buf: Vec<u8>,
    client: C,
    schema: Schema,
}

impl<C: ElementClient> ElementParser<C> {
    /// Creates a dispatcher decoding payloads per `schema`.
    pub fn new(client: C, schema: Schema) -> Self {
        Self {
            id: Id::Unknown(0),
            buf: Vec::new(),
            client,
            schema,
        }
    }

    /// Shared access to the client.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Consumes the dispatcher, returning its client.
    pub fn into_client(self) -> C {
        self.client
    }

    fn parse_uint(&mut self, id: Id) -> bool {
        if self.buf.is_empty() || self.buf.len() > 8 {
            warn!(element = id.name(), len = self.buf.len(), "bad integer size");
            return false;
        }
        let mut value: u64 = 0;
        for byte in &self.buf {
            value = (value << 8) | u64::from(*byte);
        }
        self.client.on_uint(id, value)
    }

    fn parse_int(&mut self, id: Id) -> bool {
        if self.buf.is_empty() || self.buf.len() > 8 {
            warn!(element = id.name(), len = self.buf.len(), "bad integer size");
            return false;
        }
        // Sign-extend from the first byte's top bit.
        let mut value: i64 = if self.buf[0] & 0x80 != 0 { -1 } else { 0 };
        for byte in &self.buf {
            value = (value << 8) | i64::from(*byte);
        }
        self.client.on_int(id, value)
    }

    fn parse_float(&mut self, id: Id) -> bool {
        match self.buf.len() {
            4 => {
                let value = f32::from_be_bytes(self.buf[..4].try_into().unwrap());
                self.client.on_float(id, f64::from(value))
            }
            8 => {
                let value = f64::from_be_bytes(self.buf[..8].try_into().unwrap());
                self.client.on_float(id, value)
            }
            len => {
                warn!(element = id.name(), len, "bad float size");
                false
            }
        }
    }

    fn parse_string(&mut self, id: Id) -> bool {
        match std::str::from_utf8(&self.buf) {
            Ok(value) => self.client.on_string(id, value),
            Err(_) => {
                warn!(element = id.name(), "string is not valid UTF-8");
                false
            }
        }
    }
}

impl<C: ElementClient> ParserClient for ElementParser<C> {
    fn on_header(&mut self, offset: u64, _header: &[u8], id: Id, _size: Option<u64>) -> bool {
        self.id = id;
        self.buf.clear();

        if self.schema.is_master(id) {
            return self.client.on_master_start(offset, id);
        }
        true
    }

    fn on_body(&mut self, _offset: u64, body: &[u8]) -> bool {
        self.buf.extend_from_slice(body);
        true
    }

    fn on_element_end(&mut self, offset: u64, id: Id) -> bool {
        match self.schema.get(id) {
            Some(Type::Master) => self.client.on_master_end(offset, id),
            Some(Type::Unsigned) => self.parse_uint(self.id),
            Some(Type::Signed) => self.parse_int(self.id),
            Some(Type::Float) => self.parse_float(self.id),
            Some(Type::String) | Some(Type::Utf8) => self.parse_string(self.id),
            Some(Type::Binary) | None => self.client.on_binary(self.id, &self.buf),
        }
    }
}
