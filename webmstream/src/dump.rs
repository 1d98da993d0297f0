//! Serializable records of parse events, for inspection tooling.

use serde::Serialize;
use serde_with::skip_serializing_none;

use crate::{ElementClient, ElementParser, Id, Parser, Schema, UnknownSizeInfo};

const MAX_HEX_LENGTH: usize = 64;

fn as_hex(bytes: &[u8]) -> String {
    if bytes.len() <= MAX_HEX_LENGTH {
        let digits = bytes
            .iter()
            .map(|byte| format!("{byte:02x}"))
            .collect::<Vec<_>>()
            .join(" ");
        format!("[{digits}]")
    } else {
        format!("{} bytes", bytes.len())
    }
}

/// A decoded element payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// An unsigned integer.
    Unsigned(u64),
    /// A signed integer.
    Signed(i64),
    /// A float.
    Float(f64),
    /// A string.
    String(String),
    /// Binary, rendered as hex up to a display cap.
    Binary(String),
}

/// One parse event.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    /// Element the event belongs to.
    pub element: Id,
    /// "start" or "end" on master boundary events.
    pub master: Option<&'static str>,
    /// Stream offset, known for master boundaries only.
    pub offset: Option<u64>,
    /// Decoded payload of leaf elements.
    pub value: Option<Value>,
}

impl Record {
    fn leaf(element: Id, value: Value) -> Self {
        Self {
            element,
            master: None,
            offset: None,
            value: Some(value),
        }
    }

    fn master(element: Id, edge: &'static str, offset: u64) -> Self {
        Self {
            element,
            master: Some(edge),
            offset: Some(offset),
            value: None,
        }
    }
}

/// Collects every parse event as a [`Record`].
#[derive(Debug, Default)]
pub struct DumpClient {
    records: Vec<Record>,
}

impl DumpClient {
    /// Creates an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// The records collected so far.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Consumes the collector, returning its records.
    pub fn into_records(self) -> Vec<Record> {
        self.records
    }
}

impl ElementClient for DumpClient {
    fn on_master_start(&mut self, offset: u64, id: Id) -> bool {
        self.records.push(Record::master(id, "start", offset));
        true
    }

    fn on_master_end(&mut self, offset: u64, id: Id) -> bool {
        self.records.push(Record::master(id, "end", offset));
        true
    }

    fn on_binary(&mut self, id: Id, value: &[u8]) -> bool {
        self.records.push(Record::leaf(id, Value::Binary(as_hex(value))));
        true
    }

    fn on_int(&mut self, id: Id, value: i64) -> bool {
        self.records.push(Record::leaf(id, Value::Signed(value)));
        true
    }

    fn on_uint(&mut self, id: Id, value: u64) -> bool {
        self.records.push(Record::leaf(id, Value::Unsigned(value)));
        true
    }

    fn on_float(&mut self, id: Id, value: f64) -> bool {
        self.records.push(Record::leaf(id, Value::Float(value)));
        true
    }

    fn on_string(&mut self, id: Id, value: &str) -> bool {
        self.records
            .push(Record::leaf(id, Value::String(value.to_string())));
        true
    }
}

/// Dumps a complete in-memory stream with the full WebM schema.
pub fn dump(input: &[u8]) -> Option<Vec<Record>> {
    let mut parser = Parser::new(
        Schema::webm(),
        UnknownSizeInfo::webm(),
        ElementParser::new(DumpClient::new(), Schema::webm()),
    );
    if !parser.append(input) {
        return None;
    }
    parser.end_of_data();
    Some(parser.into_client().into_client().into_records())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dump_records() {
        let records = dump(&[
            0x1A, 0x45, 0xDF, 0xA3, 0x84, // EBML, size 4
            0x42, 0x86, 0x81, 0x01, // EBMLVersion = 1
        ])
        .unwrap();

        assert_eq!(
            records,
            vec![
                Record::master(Id::Ebml, "start", 0),
                Record::leaf(Id::EbmlVersion, Value::Unsigned(1)),
                Record::master(Id::Ebml, "end", 9),
            ]
        );
    }

    #[test]
    fn test_dump_rejects_garbage() {
        assert_eq!(dump(&[0x00, 0x01, 0x02]), None);
    }

    #[test]
    fn test_hex_rendering() {
        assert_eq!(as_hex(&[1, 2, 3]), "[01 02 03]");
        assert_eq!(as_hex(&[0; 65]), "65 bytes");
    }

    #[test]
    fn test_record_serialization() {
        let record = Record::leaf(Id::DocType, Value::String("webm".to_string()));
        assert_eq!(
            serde_yaml::to_string(&record).unwrap().trim(),
            "element: DocType\nvalue: webm"
        );
    }
}
