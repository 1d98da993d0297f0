//! Caller-supplied element registries.
//!
//! Parsers never consult a global table: each one is handed the types it
//! should decode and the unknown-size nesting rules it should honor.

use std::collections::{HashMap, HashSet};

use crate::ids::ELEMENTS;
use crate::{Id, Type};

/// Maps element IDs to the payload type they should be decoded as.
///
/// IDs without an entry are dispatched as binary; this is how clients
/// opt into receiving a whole subtree (e.g. Info or Tracks) as one blob
/// instead of as individual child events.
#[derive(Debug, Clone)]
pub struct Schema {
    types: HashMap<Id, Type>,
}

impl Schema {
    /// Builds a registry from explicit entries.
    pub fn new(entries: &[(Id, Type)]) -> Self {
        Self {
            types: entries.iter().copied().collect(),
        }
    }

    /// The full WebM element table.
    pub fn webm() -> Self {
        Self::new(ELEMENTS)
    }

    /// The registered type of `id`, if any.
    pub fn get(&self, id: Id) -> Option<Type> {
        self.types.get(&id).copied()
    }

    /// True when `id` is registered as a master element.
    pub fn is_master(&self, id: Id) -> bool {
        self.get(id) == Some(Type::Master)
    }
}

/// Which master elements may declare an unknown size, and which IDs end
/// them.
///
/// An unknown-size master has no length to count down, so it closes when
/// an element appears that cannot live inside it: its parent, a sibling
/// of the same kind, or any other top-level sibling. Each entry lists
/// those terminating IDs; construction expands every entry with the
/// terminator sets of the listed IDs themselves, so that a stack of
/// nested unknown-size masters unwinds in order.
#[derive(Debug, Clone)]
pub struct UnknownSizeInfo {
    terminators: HashMap<Id, HashSet<Id>>,
}

impl UnknownSizeInfo {
    /// Builds the registry from `(list, terminating ids)` entries.
    pub fn new(entries: &[(Id, &[Id])]) -> Self {
        let mut terminators = HashMap::new();
        for (id, enders) in entries {
            let mut set = HashSet::new();
            for ender in *enders {
                set.insert(*ender);
                if ender != id {
                    if let Some((_, peers)) = entries.iter().find(|(peer, _)| peer == ender) {
                        set.extend(peers.iter().copied());
                    }
                }
            }
            terminators.insert(*id, set);
        }
        Self { terminators }
    }

    /// The WebM rules: Segment closes on a new EBML header or Segment;
    /// Cluster closes on any other top-level Segment child.
    pub fn webm() -> Self {
        const SEGMENT_ENDERS: &[Id] = &[Id::Ebml, Id::Segment];
        const CLUSTER_ENDERS: &[Id] = &[
            Id::Segment,
            Id::SeekHead,
            Id::Info,
            Id::Cluster,
            Id::Tracks,
            Id::Cues,
            Id::Attachments,
            Id::Chapters,
            Id::Tags,
        ];
        Self::new(&[(Id::Segment, SEGMENT_ENDERS), (Id::Cluster, CLUSTER_ENDERS)])
    }

    /// No element may declare an unknown size.
    pub fn none() -> Self {
        Self {
            terminators: HashMap::new(),
        }
    }

    pub(crate) fn allows(&self, id: Id) -> bool {
        self.terminators.contains_key(&id)
    }

    pub(crate) fn terminates(&self, list: Id, id: Id) -> bool {
        self.terminators
            .get(&list)
            .map_or(false, |enders| enders.contains(&id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_lookup() {
        let schema = Schema::webm();
        assert_eq!(schema.get(Id::Timecode), Some(Type::Unsigned));
        assert_eq!(schema.get(Id::Unknown(0x42)), None);
        assert!(schema.is_master(Id::Cluster));
        assert!(!schema.is_master(Id::SimpleBlock));
    }

    #[test]
    fn test_narrow_schema_overrides() {
        let schema = Schema::new(&[(Id::Info, Type::Binary)]);
        assert_eq!(schema.get(Id::Info), Some(Type::Binary));
        assert_eq!(schema.get(Id::Tracks), None);
    }

    #[test]
    fn test_unknown_size_terminators() {
        let info = UnknownSizeInfo::webm();
        assert!(info.allows(Id::Segment));
        assert!(info.allows(Id::Cluster));
        assert!(!info.allows(Id::BlockGroup));

        assert!(info.terminates(Id::Cluster, Id::Cluster));
        assert!(info.terminates(Id::Cluster, Id::Tags));
        assert!(!info.terminates(Id::Cluster, Id::SimpleBlock));

        // Expanded through Segment's own terminator set.
        assert!(info.terminates(Id::Cluster, Id::Ebml));
    }
}
