//! Change kinds and the event mask used to select them
//!
//! A mask is either [`EventMask::ALL`] or an explicit, non-empty set of
//! kinds. `All` is its own case rather than "no bits set", so an empty
//! selection can never silently turn into "watch nothing".

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::BitOr;

/// Kind of change reported for the watched file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeEvent {
    /// Renaming, creating or deleting the file
    FileName,
    /// Timestamps, permissions and other metadata
    FileAttributes,
    /// Content writes that change the file's size or data
    FileSize,
}

impl ChangeEvent {
    /// Every kind, in bit order
    pub const ALL: [ChangeEvent; 3] = [
        ChangeEvent::FileName,
        ChangeEvent::FileAttributes,
        ChangeEvent::FileSize,
    ];

    fn kinds(self) -> ChangeKinds {
        match self {
            ChangeEvent::FileName => ChangeKinds::FILE_NAME,
            ChangeEvent::FileAttributes => ChangeKinds::FILE_ATTRIBUTES,
            ChangeEvent::FileSize => ChangeKinds::FILE_SIZE,
        }
    }
}

impl fmt::Display for ChangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChangeEvent::FileName => "file_name",
            ChangeEvent::FileAttributes => "file_attributes",
            ChangeEvent::FileSize => "file_size",
        };
        f.write_str(name)
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    struct ChangeKinds: u8 {
        const FILE_NAME       = 0x1;
        const FILE_ATTRIBUTES = 0x2;
        const FILE_SIZE       = 0x4;
    }
}

/// Set of change kinds a caller wants to be notified about
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventMask(Selection);

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
enum Selection {
    All,
    Only(ChangeKinds),
}

impl EventMask {
    /// Every kind of change
    pub const ALL: EventMask = EventMask(Selection::All);

    /// Renames, creation and deletion
    pub const FILE_NAME: EventMask = EventMask(Selection::Only(ChangeKinds::FILE_NAME));

    /// Metadata changes
    pub const FILE_ATTRIBUTES: EventMask =
        EventMask(Selection::Only(ChangeKinds::FILE_ATTRIBUTES));

    /// Content changes
    pub const FILE_SIZE: EventMask = EventMask(Selection::Only(ChangeKinds::FILE_SIZE));

    /// Mask selecting exactly the given kinds
    ///
    /// Returns `None` for an empty iterator; use [`EventMask::ALL`] to watch
    /// everything.
    pub fn from_events<I>(events: I) -> Option<EventMask>
    where
        I: IntoIterator<Item = ChangeEvent>,
    {
        let kinds = events
            .into_iter()
            .fold(ChangeKinds::empty(), |acc, event| acc | event.kinds());

        if kinds.is_empty() {
            None
        } else {
            Some(EventMask(Selection::Only(kinds)))
        }
    }

    /// Whether this is the `All` sentinel
    pub fn is_all(&self) -> bool {
        matches!(self.0, Selection::All)
    }

    /// Combine two masks; `All` absorbs everything
    pub fn union(self, other: EventMask) -> EventMask {
        match (self.0, other.0) {
            (Selection::Only(a), Selection::Only(b)) => EventMask(Selection::Only(a | b)),
            _ => EventMask::ALL,
        }
    }

    /// Whether both masks select at least one common kind
    pub fn intersects(&self, other: EventMask) -> bool {
        match (self.0, other.0) {
            (Selection::Only(a), Selection::Only(b)) => a.intersects(b),
            _ => true,
        }
    }

    /// Whether a reported change of kind `event` should reach the callback
    pub fn admits(&self, event: ChangeEvent) -> bool {
        match self.0 {
            Selection::All => true,
            Selection::Only(kinds) => kinds.contains(event.kinds()),
        }
    }

    /// The selected kinds, in bit order
    pub fn events(&self) -> impl Iterator<Item = ChangeEvent> + '_ {
        ChangeEvent::ALL
            .into_iter()
            .filter(move |event| self.admits(*event))
    }
}

impl Default for EventMask {
    fn default() -> Self {
        EventMask::ALL
    }
}

impl From<ChangeEvent> for EventMask {
    fn from(event: ChangeEvent) -> Self {
        EventMask(Selection::Only(event.kinds()))
    }
}

impl BitOr for EventMask {
    type Output = EventMask;

    fn bitor(self, rhs: EventMask) -> EventMask {
        self.union(rhs)
    }
}

impl fmt::Debug for EventMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Selection::All => f.write_str("EventMask::ALL"),
            Selection::Only(_) => f.debug_set().entries(self.events()).finish(),
        }
    }
}

impl fmt::Display for EventMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_all() {
            return f.write_str("all");
        }
        let names: Vec<String> = self.events().map(|event| event.to_string()).collect();
        f.write_str(&names.join("|"))
    }
}
