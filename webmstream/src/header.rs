//! EBML document header support.

use std::io;

use tracing::warn;

use crate::{
    BufferSink, ElementClient, ElementParser, Id, Parser, Schema, Sink, Type, UnknownSizeInfo,
    Writer,
};

/// Fields of an EBML document header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocInfo {
    /// EBMLVersion, the version the document was written with.
    pub version: u64,
    /// EBMLReadVersion, the minimum version needed to read it.
    pub read_version: u64,
    /// EBMLMaxIDLength, widest element ID in the document.
    pub max_id_length: u64,
    /// EBMLMaxSizeLength, widest size field in the document.
    pub max_size_length: u64,
    /// DocType, e.g. "webm".
    pub doc_type: String,
    /// DocTypeVersion.
    pub doc_type_version: u64,
    /// DocTypeReadVersion.
    pub doc_type_read_version: u64,
}

impl Default for DocInfo {
    fn default() -> Self {
        Self {
            version: 1,
            read_version: 1,
            max_id_length: 4,
            max_size_length: 8,
            doc_type: String::new(),
            doc_type_version: 1,
            doc_type_read_version: 1,
        }
    }
}

#[derive(Default)]
struct DocHeaderClient {
    info: DocInfo,
}

impl ElementClient for DocHeaderClient {
    fn on_master_start(&mut self, _offset: u64, _id: Id) -> bool {
        false
    }

    fn on_master_end(&mut self, _offset: u64, _id: Id) -> bool {
        false
    }

    fn on_binary(&mut self, id: Id, _value: &[u8]) -> bool {
        id == Id::Crc32 || id == Id::Void
    }

    fn on_int(&mut self, _id: Id, _value: i64) -> bool {
        false
    }

    fn on_uint(&mut self, id: Id, value: u64) -> bool {
        match id {
            Id::EbmlVersion => self.info.version = value,
            Id::EbmlReadVersion => self.info.read_version = value,
            Id::EbmlMaxIdLength => self.info.max_id_length = value,
            Id::EbmlMaxSizeLength => self.info.max_size_length = value,
            Id::DocTypeVersion => self.info.doc_type_version = value,
            Id::DocTypeReadVersion => self.info.doc_type_read_version = value,
            _ => return false,
        }
        true
    }

    fn on_float(&mut self, _id: Id, _value: f64) -> bool {
        false
    }

    fn on_string(&mut self, id: Id, value: &str) -> bool {
        if id != Id::DocType {
            return false;
        }
        self.info.doc_type = value.to_string();
        true
    }
}

fn doc_header_schema() -> Schema {
    Schema::new(&[
        (Id::EbmlVersion, Type::Unsigned),
        (Id::EbmlReadVersion, Type::Unsigned),
        (Id::EbmlMaxIdLength, Type::Unsigned),
        (Id::EbmlMaxSizeLength, Type::Unsigned),
        (Id::DocType, Type::String),
        (Id::DocTypeVersion, Type::Unsigned),
        (Id::DocTypeReadVersion, Type::Unsigned),
    ])
}

/// Parses and validates the body of an EBML header element.
///
/// Returns `None` when the body doesn't parse or declares limits this
/// toolkit can't honor.
pub fn parse_doc_header(buf: &[u8]) -> Option<DocInfo> {
    let schema = doc_header_schema();
    let mut parser = Parser::new(
        schema.clone(),
        UnknownSizeInfo::none(),
        ElementParser::new(DocHeaderClient::default(), schema),
    );

    if !parser.append(buf) {
        warn!("failed to parse EBML header");
        return None;
    }

    let info = parser.into_client().into_client().info;

    if info.version != 1 {
        warn!(version = info.version, "unsupported EBMLVersion");
        return None;
    }
    if info.read_version != 1 {
        warn!(read_version = info.read_version, "unsupported EBMLReadVersion");
        return None;
    }
    if info.max_id_length > 4 {
        warn!(max_id_length = info.max_id_length, "unsupported EBMLMaxIDLength");
        return None;
    }
    if info.max_size_length > 8 {
        warn!(
            max_size_length = info.max_size_length,
            "unsupported EBMLMaxSizeLength"
        );
        return None;
    }
    if info.doc_type.is_empty() {
        warn!("empty DocType");
        return None;
    }
    if info.doc_type_version < 1 {
        warn!(doc_type_version = info.doc_type_version, "unsupported DocTypeVersion");
        return None;
    }
    if info.doc_type_read_version < 1 {
        warn!(
            doc_type_read_version = info.doc_type_read_version,
            "unsupported DocTypeReadVersion"
        );
        return None;
    }

    Some(info)
}

/// Writes the canonical WebM document header.
pub fn write_webm_doc_header<S: Sink>(writer: &mut Writer<S>) -> io::Result<usize> {
    let mut inner = Writer::new(BufferSink::new());
    inner.write_uint(Id::EbmlVersion, 1)?;
    inner.write_uint(Id::EbmlReadVersion, 1)?;
    inner.write_uint(Id::EbmlMaxIdLength, 4)?;
    inner.write_uint(Id::EbmlMaxSizeLength, 8)?;
    inner.write_string(Id::DocType, "webm")?;
    inner.write_uint(Id::DocTypeVersion, 2)?;
    inner.write_uint(Id::DocTypeReadVersion, 2)?;

    let body = inner.into_sink().into_bytes();
    writer.write_binary(Id::Ebml, &body)
}

#[cfg(test)]
mod tests {
    use super::*;

    const WEBM_HEADER_BODY: &[u8] = &[
        0x42, 0x86, 0x81, 0x01, // EBMLVersion = 1
        0x42, 0xF7, 0x81, 0x01, // EBMLReadVersion = 1
        0x42, 0xF2, 0x81, 0x04, // EBMLMaxIDLength = 4
        0x42, 0xF3, 0x81, 0x08, // EBMLMaxSizeLength = 8
        0x42, 0x82, 0x84, 0x77, 0x65, 0x62, 0x6D, // DocType = "webm"
        0x42, 0x87, 0x81, 0x02, // DocTypeVersion = 2
        0x42, 0x85, 0x81, 0x02, // DocTypeReadVersion = 2
    ];

    #[test]
    fn test_parse_doc_header() {
        let info = parse_doc_header(WEBM_HEADER_BODY).unwrap();
        assert_eq!(
            info,
            DocInfo {
                version: 1,
                read_version: 1,
                max_id_length: 4,
                max_size_length: 8,
                doc_type: "webm".to_string(),
                doc_type_version: 2,
                doc_type_read_version: 2,
            }
        );
    }

    #[test]
    fn test_defaults_apply_when_fields_are_missing() {
        // Only a DocType.
        let info = parse_doc_header(&[0x42, 0x82, 0x84, 0x77, 0x65, 0x62, 0x6D]).unwrap();
        assert_eq!(info.version, 1);
        assert_eq!(info.max_id_length, 4);
        assert_eq!(info.doc_type, "webm");
    }

    #[test]
    fn test_rejects_missing_doc_type() {
        assert_eq!(parse_doc_header(&[0x42, 0x86, 0x81, 0x01]), None);
    }

    #[test]
    fn test_rejects_unsupported_version() {
        // EBMLReadVersion = 2
        assert_eq!(
            parse_doc_header(&[0x42, 0xF7, 0x81, 0x02, 0x42, 0x82, 0x84, 0x77, 0x65, 0x62, 0x6D]),
            None
        );
    }

    #[test]
    fn test_rejects_unexpected_element() {
        // A Timecode does not belong in an EBML header.
        assert_eq!(parse_doc_header(&[0xE7, 0x81, 0x00]), None);
    }

    #[test]
    fn test_written_header_parses_back() {
        let mut writer = Writer::new(BufferSink::new());
        write_webm_doc_header(&mut writer).unwrap();
        let bytes = writer.into_sink().into_bytes();

        // Skip the EBML id (4 bytes) and one-byte size.
        let info = parse_doc_header(&bytes[5..]).unwrap();
        assert_eq!(info.doc_type, "webm");
        assert_eq!(info.doc_type_version, 2);
        assert_eq!(info.doc_type_read_version, 2);
    }
}
