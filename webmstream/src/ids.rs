//! WebM element identifiers and their canonical payload types.

use serde::{Serialize, Serializer};

/// Semantic payload type of an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Type {
    /// Contains child elements instead of a payload.
    Master,
    /// Big-endian unsigned integer, up to eight bytes.
    Unsigned,
    /// Big-endian two's-complement integer, up to eight bytes.
    Signed,
    /// IEEE-754 big-endian float, four or eight bytes.
    Float,
    /// ASCII string.
    String,
    /// UTF-8 string.
    Utf8,
    /// Opaque bytes.
    Binary,
}

macro_rules! webm_elements {
    ($(name = $name:ident, id = $value:literal, variant = $variant:ident;)+) => {
        /// Identifier of a WebM/EBML element.
        ///
        /// The value keeps the VarInt marker bit, so an `Id` is the
        /// bit-exact header bytes read as a big-endian integer.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Id {
            /// An ID with no entry in the WebM schema.
            Unknown(u32),
            $(
                #[doc = concat!("The ", stringify!($name), " element.")]
                $name,
            )+
        }

        impl Id {
            /// Looks a decoded ID value up in the WebM schema.
            pub fn new(id: u32) -> Self {
                match id {
                    $($value => Self::$name,)+
                    _ => Self::Unknown(id)
                }
            }

            /// The marker-retaining integer value of this ID.
            pub fn value(&self) -> u32 {
                match self {
                    $(Self::$name => $value,)+
                    Self::Unknown(value) => *value,
                }
            }

            /// Element name, or "Unknown" for IDs outside the schema.
            pub fn name(&self) -> &'static str {
                match self {
                    $(Self::$name => stringify!($name),)+
                    Self::Unknown(_) => "Unknown",
                }
            }
        }

        pub(crate) const ELEMENTS: &[(Id, Type)] = &[
            $((Id::$name, Type::$variant),)+
        ];
    };
}

impl Serialize for Id {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Id::Unknown(value) => serializer.serialize_str(&format!("{:#010X}", value)),
            _ => serializer.serialize_str(self.name()),
        }
    }
}

webm_elements! {
    name = Ebml, id = 0x1A45DFA3, variant = Master;
    name = EbmlVersion, id = 0x4286, variant = Unsigned;
    name = EbmlReadVersion, id = 0x42F7, variant = Unsigned;
    name = EbmlMaxIdLength, id = 0x42F2, variant = Unsigned;
    name = EbmlMaxSizeLength, id = 0x42F3, variant = Unsigned;
    name = DocType, id = 0x4282, variant = String;
    name = DocTypeVersion, id = 0x4287, variant = Unsigned;
    name = DocTypeReadVersion, id = 0x4285, variant = Unsigned;
    name = Void, id = 0xEC, variant = Binary;
    name = Crc32, id = 0xBF, variant = Binary;
    name = Segment, id = 0x18538067, variant = Master;
    name = SeekHead, id = 0x114D9B74, variant = Master;
    name = Seek, id = 0x4DBB, variant = Master;
    name = SeekId, id = 0x53AB, variant = Unsigned;
    name = SeekPosition, id = 0x53AC, variant = Unsigned;
    name = Info, id = 0x1549A966, variant = Master;
    name = SegmentUid, id = 0x73A4, variant = Binary;
    name = SegmentFilename, id = 0x7384, variant = Utf8;
    name = PrevUid, id = 0x3CB923, variant = Binary;
    name = PrevFilename, id = 0x3C83AB, variant = Utf8;
    name = NextUid, id = 0x3EB923, variant = Binary;
    name = NextFilename, id = 0x3E83BB, variant = Utf8;
    name = SegmentFamily, id = 0x4444, variant = Binary;
    name = ChapterTranslate, id = 0x6924, variant = Master;
    name = TimecodeScale, id = 0x2AD7B1, variant = Unsigned;
    name = Duration, id = 0x4489, variant = Float;
    name = DateUtc, id = 0x4461, variant = Signed;
    name = Title, id = 0x7BA9, variant = Utf8;
    name = MuxingApp, id = 0x4D80, variant = Utf8;
    name = WritingApp, id = 0x5741, variant = Utf8;
    name = Cluster, id = 0x1F43B675, variant = Master;
    name = Timecode, id = 0xE7, variant = Unsigned;
    name = Position, id = 0xA7, variant = Unsigned;
    name = PrevSize, id = 0xAB, variant = Unsigned;
    name = SimpleBlock, id = 0xA3, variant = Binary;
    name = BlockGroup, id = 0xA0, variant = Master;
    name = Block, id = 0xA1, variant = Binary;
    name = BlockAdditions, id = 0x75A1, variant = Master;
    name = BlockDuration, id = 0x9B, variant = Unsigned;
    name = ReferenceBlock, id = 0xFB, variant = Signed;
    name = CodecState, id = 0xA4, variant = Binary;
    name = DiscardPadding, id = 0x75A2, variant = Signed;
    name = Tracks, id = 0x1654AE6B, variant = Master;
    name = TrackEntry, id = 0xAE, variant = Master;
    name = TrackNumber, id = 0xD7, variant = Unsigned;
    name = TrackUid, id = 0x73C5, variant = Unsigned;
    name = TrackType, id = 0x83, variant = Unsigned;
    name = FlagEnabled, id = 0xB9, variant = Unsigned;
    name = FlagDefault, id = 0x88, variant = Unsigned;
    name = FlagForced, id = 0x55AA, variant = Unsigned;
    name = FlagLacing, id = 0x9C, variant = Unsigned;
    name = DefaultDuration, id = 0x23E383, variant = Unsigned;
    name = Name, id = 0x536E, variant = Utf8;
    name = Language, id = 0x22B59C, variant = String;
    name = CodecId, id = 0x86, variant = String;
    name = CodecPrivate, id = 0x63A2, variant = Binary;
    name = CodecName, id = 0x258688, variant = Utf8;
    name = CodecDelay, id = 0x56AA, variant = Unsigned;
    name = SeekPreRoll, id = 0x56BB, variant = Unsigned;
    name = Video, id = 0xE0, variant = Master;
    name = FlagInterlaced, id = 0x9A, variant = Unsigned;
    name = StereoMode, id = 0x53B8, variant = Unsigned;
    name = AlphaMode, id = 0x53C0, variant = Unsigned;
    name = PixelWidth, id = 0xB0, variant = Unsigned;
    name = PixelHeight, id = 0xBA, variant = Unsigned;
    name = PixelCropBottom, id = 0x54AA, variant = Unsigned;
    name = PixelCropTop, id = 0x54BB, variant = Unsigned;
    name = PixelCropLeft, id = 0x54CC, variant = Unsigned;
    name = PixelCropRight, id = 0x54DD, variant = Unsigned;
    name = DisplayWidth, id = 0x54B0, variant = Unsigned;
    name = DisplayHeight, id = 0x54BA, variant = Unsigned;
    name = DisplayUnit, id = 0x54B2, variant = Unsigned;
    name = AspectRatioType, id = 0x54B3, variant = Unsigned;
    name = FrameRate, id = 0x2383E3, variant = Float;
    name = Audio, id = 0xE1, variant = Master;
    name = SamplingFrequency, id = 0xB5, variant = Float;
    name = OutputSamplingFrequency, id = 0x78B5, variant = Float;
    name = Channels, id = 0x9F, variant = Unsigned;
    name = BitDepth, id = 0x6264, variant = Unsigned;
    name = Cues, id = 0x1C53BB6B, variant = Master;
    name = CuePoint, id = 0xBB, variant = Master;
    name = CueTime, id = 0xB3, variant = Unsigned;
    name = CueTrackPositions, id = 0xB7, variant = Master;
    name = CueTrack, id = 0xF7, variant = Unsigned;
    name = CueClusterPosition, id = 0xF1, variant = Unsigned;
    name = CueRelativePosition, id = 0xF0, variant = Unsigned;
    name = CueBlockNumber, id = 0x5378, variant = Unsigned;
    name = Attachments, id = 0x1941A469, variant = Master;
    name = Chapters, id = 0x1043A770, variant = Master;
    name = Tags, id = 0x1254C367, variant = Master;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_new() {
        assert_eq!(Id::new(0x1A45DFA3), Id::Ebml);
        assert_eq!(Id::new(0xA3), Id::SimpleBlock);
        assert_eq!(Id::new(0x19ABCDEF), Id::Unknown(0x19ABCDEF));
    }

    #[test]
    fn test_id_value() {
        assert_eq!(Id::Cluster.value(), 0x1F43B675);
        assert_eq!(Id::Unknown(0x42).value(), 0x42);
    }

    #[test]
    fn test_id_serialization() {
        assert_eq!(serde_yaml::to_string(&Id::TrackType).unwrap().trim(), "TrackType");
        assert_eq!(
            serde_yaml::to_string(&Id::Unknown(0x19ABCDEF)).unwrap().trim(),
            "'0x19ABCDEF'"
        );
    }

    #[test]
    fn test_element_table() {
        assert!(ELEMENTS.contains(&(Id::Segment, Type::Master)));
        assert!(ELEMENTS.contains(&(Id::SimpleBlock, Type::Binary)));
    }
}
