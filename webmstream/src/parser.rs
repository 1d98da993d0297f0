//! Low-level streaming parser.
//!
//! Turns an incrementally fed byte stream into header / body-chunk /
//! element-end callbacks without ever seeking the input. Master elements
//! carry no body of their own: their children are reported between the
//! master's header and its end event.

use crate::{varint, Error, Id, Schema, UnknownSizeInfo};

/// Receives raw parse events.
///
/// Every byte of the stream is reported exactly once: header bytes via
/// [`on_header`](ParserClient::on_header), body bytes via any number of
/// [`on_body`](ParserClient::on_body) chunks. Returning `false` from any
/// callback poisons the parser; all further input is rejected.
pub trait ParserClient {
    /// An element header has been decoded. `size` is `None` for an
    /// unknown-size master element.
    fn on_header(&mut self, offset: u64, header: &[u8], id: Id, size: Option<u64>) -> bool;

    /// A chunk of a non-master element's body. Chunk boundaries follow
    /// input arrival and carry no meaning.
    fn on_body(&mut self, offset: u64, body: &[u8]) -> bool;

    /// A non-master element's body is complete, or a master element has
    /// closed (by reaching its declared size, or lazily for unknown-size
    /// masters).
    fn on_element_end(&mut self, offset: u64, id: Id) -> bool;
}

struct MasterInfo {
    id: Id,
    size: Option<u64>,
    bytes_parsed: u64,
}

impl MasterInfo {
    fn add_bytes(&mut self, count: u64) -> bool {
        self.bytes_parsed += count;
        Some(self.bytes_parsed) == self.size
    }
}

/// Streaming EBML parser.
///
/// Push-driven: [`append`](Parser::append) consumes whatever it can and
/// buffers the rest. The schema decides which IDs are master elements;
/// the unknown-size registry decides which of them may omit their size
/// and which IDs close them.
pub struct Parser<C> {
    buf: Vec<u8>,
    offset: u64,
    bytes_left: u64,
    current_id: Id,
    masters: Vec<MasterInfo>,
    schema: Schema,
    unknown_size: UnknownSizeInfo,
    client: C,
    failed: bool,
}

impl<C: ParserClient> Parser<C> {
    /// Creates a parser delivering events to `client`.
    pub fn new(schema: Schema, unknown_size: UnknownSizeInfo, client: C) -> Self {
        Self {
            buf: Vec::new(),
            offset: 0,
            bytes_left: 0,
            current_id: Id::Unknown(0),
            masters: Vec::new(),
            schema,
            unknown_size,
            client,
            failed: false,
        }
    }

    /// Feeds more input. Returns `false` once the parser is poisoned,
    /// whether by malformed data or by a rejecting callback; from then
    /// on every call fails.
    pub fn append(&mut self, data: &[u8]) -> bool {
        if self.failed {
            return false;
        }

        self.buf.extend_from_slice(data);

        while !self.buf.is_empty() {
            if self.bytes_left == 0 {
                let (header_len, id, size) = match self.read_header() {
                    Ok(header) => header,
                    Err(Error::NeedData) => break,
                    Err(_) => return self.fail(),
                };

                // This ID may mark the end of unknown-size masters.
                if !self.check_for_ancestor(id) {
                    return self.fail();
                }

                if self.schema.is_master(id) {
                    if size.is_none() && !self.unknown_size.allows(id) {
                        return self.fail();
                    }
                    if !self.consume_header(header_len, id, size) {
                        return self.fail();
                    }
                    self.masters.push(MasterInfo {
                        id,
                        size,
                        bytes_parsed: 0,
                    });
                    continue;
                }

                let Some(size) = size else {
                    return self.fail();
                };
                if !self.consume_header(header_len, id, Some(size)) {
                    return self.fail();
                }
                self.bytes_left = size;
            }

            let to_consume = self.bytes_left.min(self.buf.len() as u64) as usize;
            self.bytes_left -= to_consume as u64;
            if !self.consume_body(to_consume) {
                return self.fail();
            }
        }
        true
    }

    /// Signals end of input, closing any unknown-size masters still
    /// open with their observed sizes.
    pub fn end_of_data(&mut self) {
        while let Some(top) = self.masters.last_mut() {
            if top.size.is_some() {
                break;
            }
            top.size = Some(top.bytes_parsed);
            if !self.consume_bytes(0) {
                return;
            }
        }
    }

    /// Bytes consumed since construction.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Shared access to the client.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Consumes the parser, returning its client.
    pub fn into_client(self) -> C {
        self.client
    }

    fn fail(&mut self) -> bool {
        self.failed = true;
        false
    }

    fn read_header(&self) -> Result<(usize, Id, Option<u64>), Error> {
        let (rest, id) = varint::parse_id(&self.buf)?;
        let (rest, size) = varint::parse_size(rest)?;
        Ok((self.buf.len() - rest.len(), id, size))
    }

    fn check_for_ancestor(&mut self, id: Id) -> bool {
        loop {
            let Some(top) = self.masters.last_mut() else {
                break;
            };
            if top.size.is_some() {
                break;
            }
            if !self.unknown_size.terminates(top.id, id) {
                break;
            }
            top.size = Some(top.bytes_parsed);
            if !self.consume_bytes(0) {
                return false;
            }
        }
        true
    }

    fn consume_header(&mut self, header_len: usize, id: Id, size: Option<u64>) -> bool {
        self.current_id = id;
        if !self
            .client
            .on_header(self.offset, &self.buf[..header_len], id, size)
        {
            return false;
        }
        self.buf.drain(..header_len);
        self.consume_bytes(header_len as u64)
    }

    fn consume_body(&mut self, count: usize) -> bool {
        if count > 0 && !self.client.on_body(self.offset, &self.buf[..count]) {
            return false;
        }
        self.buf.drain(..count);

        if self.bytes_left == 0 {
            if !self.client.on_element_end(self.offset, self.current_id) {
                return false;
            }
            if let Some(top) = self.masters.last() {
                self.current_id = top.id;
            }
        }
        self.consume_bytes(count as u64)
    }

    fn consume_bytes(&mut self, count: u64) -> bool {
        if count > 0 {
            self.offset += count;
        }

        // Credit the consumed bytes to the innermost master; each master
        // that completes is credited whole to the one above it.
        let mut credited = count;
        loop {
            let Some(top) = self.masters.last_mut() else {
                break;
            };
            if !top.add_bytes(credited) {
                break;
            }
            let id = top.id;
            let size = top.size.unwrap_or(top.bytes_parsed);
            if !self.client.on_element_end(self.offset, id) {
                return false;
            }
            credited = size;
            self.masters.pop();
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    enum Event {
        Header(u64, Id, Option<u64>),
        Body(u64, Vec<u8>),
        End(Id),
    }

    #[derive(Default)]
    struct Recorder {
        events: Vec<Event>,
        reject_bodies: bool,
    }

    impl ParserClient for Recorder {
        fn on_header(&mut self, offset: u64, _header: &[u8], id: Id, size: Option<u64>) -> bool {
            self.events.push(Event::Header(offset, id, size));
            true
        }

        fn on_body(&mut self, offset: u64, body: &[u8]) -> bool {
            self.events.push(Event::Body(offset, body.to_vec()));
            !self.reject_bodies
        }

        fn on_element_end(&mut self, _offset: u64, id: Id) -> bool {
            self.events.push(Event::End(id));
            true
        }
    }

    fn webm_parser() -> Parser<Recorder> {
        Parser::new(Schema::webm(), UnknownSizeInfo::webm(), Recorder::default())
    }

    // EBML header with one child: EBMLVersion = 1.
    const EBML_WITH_VERSION: &[u8] = &[0x1A, 0x45, 0xDF, 0xA3, 0x84, 0x42, 0x86, 0x81, 0x01];

    #[test]
    fn test_master_with_child() {
        let mut parser = webm_parser();
        assert!(parser.append(EBML_WITH_VERSION));
        assert_eq!(
            parser.client().events,
            vec![
                Event::Header(0, Id::Ebml, Some(4)),
                Event::Header(5, Id::EbmlVersion, Some(1)),
                Event::Body(8, vec![0x01]),
                Event::End(Id::EbmlVersion),
                Event::End(Id::Ebml),
            ]
        );
        assert_eq!(parser.offset(), EBML_WITH_VERSION.len() as u64);
    }

    #[test]
    fn test_single_byte_feeding_is_equivalent() {
        let mut parser = webm_parser();
        for byte in EBML_WITH_VERSION {
            assert!(parser.append(std::slice::from_ref(byte)));
        }

        let mut whole = webm_parser();
        assert!(whole.append(EBML_WITH_VERSION));
        assert_eq!(parser.client().events, whole.client().events);
    }

    #[test]
    fn test_body_chunks_sum_to_declared_size() {
        // CodecPrivate with a 5-byte body, fed in awkward pieces.
        let input: &[u8] = &[0x63, 0xA2, 0x85, 1, 2, 3, 4, 5];
        let mut parser = webm_parser();
        assert!(parser.append(&input[..4]));
        assert!(parser.append(&input[4..6]));
        assert!(parser.append(&input[6..]));

        let total: usize = parser
            .client()
            .events
            .iter()
            .map(|event| match event {
                Event::Body(_, chunk) => chunk.len(),
                _ => 0,
            })
            .sum();
        assert_eq!(total, 5);
        assert_eq!(parser.client().events.last(), Some(&Event::End(Id::CodecPrivate)));
    }

    #[test]
    fn test_unknown_size_cluster_closed_by_next_cluster() {
        let mut input = vec![0x18, 0x53, 0x80, 0x67, 0xFF]; // Segment, unknown size
        input.extend([0x1F, 0x43, 0xB6, 0x75, 0xFF]); // Cluster, unknown size
        input.extend([0xE7, 0x81, 0x00]); // Timecode = 0
        input.extend([0x1F, 0x43, 0xB6, 0x75, 0x83]); // Cluster, size 3
        input.extend([0xE7, 0x81, 0x05]); // Timecode = 5

        let mut parser = webm_parser();
        assert!(parser.append(&input));

        // The first Cluster must close exactly when the second one's
        // header shows up, before that header is reported.
        let events = &parser.client().events;
        let first_close = events
            .iter()
            .position(|event| *event == Event::End(Id::Cluster))
            .unwrap();
        assert_eq!(events[first_close + 1], Event::Header(13, Id::Cluster, Some(3)));

        parser.end_of_data();
        let closes = parser
            .client()
            .events
            .iter()
            .filter(|event| matches!(event, Event::End(Id::Cluster | Id::Segment)))
            .count();
        assert_eq!(closes, 3);
    }

    #[test]
    fn test_unknown_size_forbidden_outside_registry() {
        // TrackEntry is a master but not registered for unknown size.
        let mut parser = webm_parser();
        assert!(!parser.append(&[0xAE, 0xFF]));
        // Poisoned for good.
        assert!(!parser.append(&[0xE7, 0x81, 0x00]));
    }

    #[test]
    fn test_unknown_size_forbidden_for_non_master() {
        let mut parser = webm_parser();
        assert!(!parser.append(&[0xE7, 0xFF]));
    }

    #[test]
    fn test_malformed_id_poisons() {
        let mut parser = webm_parser();
        assert!(!parser.append(&[0x08, 0x45, 0xDF, 0xA3, 0x81]));
        assert!(!parser.append(&[0xE7, 0x81, 0x00]));
    }

    #[test]
    fn test_client_reject_poisons() {
        let mut parser = Parser::new(
            Schema::webm(),
            UnknownSizeInfo::webm(),
            Recorder {
                reject_bodies: true,
                ..Default::default()
            },
        );
        assert!(!parser.append(&[0xE7, 0x81, 0x00]));
        assert!(!parser.append(&[0xE7, 0x81, 0x00]));
    }

    #[test]
    fn test_incomplete_header_waits() {
        let mut parser = webm_parser();
        assert!(parser.append(&[0x1A, 0x45]));
        assert!(parser.client().events.is_empty());
        assert!(parser.append(&[0xDF, 0xA3, 0x80]));
        assert_eq!(
            parser.client().events,
            vec![Event::Header(0, Id::Ebml, Some(0))]
        );
    }
}
