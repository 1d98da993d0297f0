/// Errors surfaced while decoding EBML structures.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The input ends before the structure being decoded does. Feeding
    /// more bytes may succeed; every other variant is fatal.
    #[error("need more data")]
    NeedData,
    /// An element ID VarInt has no marker bit within four bytes.
    #[error("invalid element id")]
    InvalidId,
    /// A size VarInt has no marker bit within eight bytes.
    #[error("invalid varint")]
    InvalidVarint,
}

impl From<nom::Err<()>> for Error {
    fn from(err: nom::Err<()>) -> Self {
        match err {
            nom::Err::Incomplete(_) => Error::NeedData,
            _ => Error::InvalidVarint,
        }
    }
}
