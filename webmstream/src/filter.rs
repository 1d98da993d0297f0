//! Denylist-based element filtering.

use std::collections::HashSet;

use tracing::warn;

use crate::{
    BufferSink, ElementClient, ElementParser, Id, Parser, Schema, UnknownSizeInfo, Writer,
};

struct FilterClient {
    denied: HashSet<Id>,
    writer: Writer<BufferSink>,
    // Nesting depth inside a denied master; everything below it is
    // dropped along with the master itself.
    dropped_depth: usize,
}

impl FilterClient {
    fn allow(&self, id: Id) -> bool {
        !self.denied.contains(&id)
    }
}

impl ElementClient for FilterClient {
    fn on_master_start(&mut self, _offset: u64, id: Id) -> bool {
        if self.dropped_depth > 0 {
            self.dropped_depth += 1;
            return true;
        }
        if !self.allow(id) {
            self.dropped_depth = 1;
            return true;
        }
        self.writer.write_master_start(id).is_ok()
    }

    fn on_master_end(&mut self, _offset: u64, id: Id) -> bool {
        if self.dropped_depth > 0 {
            self.dropped_depth -= 1;
            return true;
        }
        self.writer.write_master_end(id);
        true
    }

    fn on_binary(&mut self, id: Id, value: &[u8]) -> bool {
        if self.dropped_depth > 0 || !self.allow(id) {
            return true;
        }
        self.writer.write_binary(id, value).is_ok()
    }

    fn on_int(&mut self, id: Id, value: i64) -> bool {
        if self.dropped_depth > 0 || !self.allow(id) {
            return true;
        }
        self.writer.write_int(id, value).is_ok()
    }

    fn on_uint(&mut self, id: Id, value: u64) -> bool {
        if self.dropped_depth > 0 || !self.allow(id) {
            return true;
        }
        self.writer.write_uint(id, value).is_ok()
    }

    fn on_float(&mut self, id: Id, value: f64) -> bool {
        if self.dropped_depth > 0 || !self.allow(id) {
            return true;
        }
        self.writer.write_float(id, value).is_ok()
    }

    fn on_string(&mut self, id: Id, value: &str) -> bool {
        if self.dropped_depth > 0 || !self.allow(id) {
            return true;
        }
        self.writer.write_string(id, value).is_ok()
    }
}

/// Re-emits `input` with the denylisted elements removed.
///
/// Denied master elements drop their whole subtree. The output is
/// re-encoded, not byte-copied, so element sizes may use a different
/// width than the input. Returns `None` when the input doesn't parse.
pub fn filter(
    input: &[u8],
    denied: &[Id],
    schema: &Schema,
    unknown_size: &UnknownSizeInfo,
) -> Option<Vec<u8>> {
    let client = FilterClient {
        denied: denied.iter().copied().collect(),
        writer: Writer::new(BufferSink::with_capacity(input.len())),
        dropped_depth: 0,
    };
    let mut parser = Parser::new(
        schema.clone(),
        unknown_size.clone(),
        ElementParser::new(client, schema.clone()),
    );

    if !parser.append(input) {
        warn!("filter failed to parse input");
        return None;
    }
    parser.end_of_data();

    Some(
        parser
            .into_client()
            .into_client()
            .writer
            .into_sink()
            .into_bytes(),
    )
}
