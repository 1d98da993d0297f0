//! Segment Info sub-parser.

use tracing::warn;

use crate::{ElementClient, ElementParser, Id, Parser, Schema, Type, UnknownSizeInfo};

/// Fields extracted from a Segment Info element.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentInfo {
    /// TimecodeScale in nanoseconds per tick.
    pub timecode_scale: u64,
    /// Duration in ticks; +inf when the element is absent.
    pub duration: f64,
    /// DateUTC, nanoseconds relative to the Matroska epoch.
    pub date: i64,
}

struct InfoClient {
    info: SegmentInfo,
}

impl ElementClient for InfoClient {
    fn on_master_start(&mut self, _offset: u64, _id: Id) -> bool {
        false
    }

    fn on_master_end(&mut self, _offset: u64, _id: Id) -> bool {
        false
    }

    fn on_binary(&mut self, id: Id, _value: &[u8]) -> bool {
        matches!(
            id,
            Id::Crc32
                | Id::Void
                | Id::SegmentUid
                | Id::SegmentFilename
                | Id::PrevUid
                | Id::PrevFilename
                | Id::NextUid
                | Id::NextFilename
                | Id::SegmentFamily
                | Id::ChapterTranslate
                | Id::Title
                | Id::MuxingApp
                | Id::WritingApp
        )
    }

    fn on_int(&mut self, id: Id, value: i64) -> bool {
        if id != Id::DateUtc {
            return false;
        }
        self.info.date = value;
        true
    }

    fn on_uint(&mut self, id: Id, value: u64) -> bool {
        if id != Id::TimecodeScale {
            return false;
        }
        self.info.timecode_scale = value;
        true
    }

    fn on_float(&mut self, id: Id, value: f64) -> bool {
        if id != Id::Duration {
            return false;
        }
        self.info.duration = value;
        true
    }

    fn on_string(&mut self, _id: Id, _value: &str) -> bool {
        false
    }
}

/// Parses the body of an Info element.
///
/// Returns `None` when the body doesn't parse, the timecode scale is
/// zero, or a declared duration is not positive.
pub fn parse_info(buf: &[u8]) -> Option<SegmentInfo> {
    let schema = Schema::new(&[
        (Id::TimecodeScale, Type::Unsigned),
        (Id::Duration, Type::Float),
        (Id::DateUtc, Type::Signed),
    ]);
    let client = InfoClient {
        info: SegmentInfo {
            timecode_scale: 1_000_000,
            duration: f64::INFINITY,
            date: 0,
        },
    };
    let mut parser = Parser::new(
        schema.clone(),
        UnknownSizeInfo::none(),
        ElementParser::new(client, schema),
    );

    if !parser.append(buf) {
        warn!("failed to parse Info element");
        return None;
    }

    let info = parser.into_client().into_client().info;
    if info.timecode_scale == 0 || info.duration <= 0.0 {
        warn!(
            timecode_scale = info.timecode_scale,
            duration = info.duration,
            "rejecting Info element"
        );
        return None;
    }

    Some(info)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_info() {
        let body: &[u8] = &[
            0x2A, 0xD7, 0xB1, 0x83, 0x0F, 0x42, 0x40, // TimecodeScale = 1000000
            0x44, 0x89, 0x84, 0x45, 0x7A, 0x30, 0x00, // Duration = 4003.0
        ];
        assert_eq!(
            parse_info(body),
            Some(SegmentInfo {
                timecode_scale: 1_000_000,
                duration: 4003.0,
                date: 0,
            })
        );
    }

    #[test]
    fn test_defaults() {
        let info = parse_info(&[]).unwrap();
        assert_eq!(info.timecode_scale, 1_000_000);
        assert!(info.duration.is_infinite());
    }

    #[test]
    fn test_tolerated_binary_fields() {
        // MuxingApp and WritingApp pass through untyped.
        let body: &[u8] = &[
            0x4D, 0x80, 0x83, 0x61, 0x62, 0x63, // MuxingApp
            0x57, 0x41, 0x83, 0x78, 0x79, 0x7A, // WritingApp
        ];
        assert!(parse_info(body).is_some());
    }

    #[test]
    fn test_rejects_zero_timecode_scale() {
        assert_eq!(parse_info(&[0x2A, 0xD7, 0xB1, 0x81, 0x00]), None);
    }

    #[test]
    fn test_rejects_unexpected_element() {
        // A TrackNumber does not belong in Info.
        assert_eq!(parse_info(&[0xD7, 0x81, 0x01]), None);
    }
}
