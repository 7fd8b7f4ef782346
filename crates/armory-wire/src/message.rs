//! Replication messages
//!
//! Message = [TAG:1][BODY]
//!
//! FullState (0x01): four sections in category order, each
//!   [CATEGORY:1][COUNT:4][STRING]*COUNT
//! SyncEntry (0x02): [CATEGORY:1][STRING]
//!
//! Identifier strings travel unvalidated; the receiving replica parses them
//! and drops the ones it cannot read. Fields that are over-long or not UTF-8
//! are skipped at decode time and only counted.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use armory_core::{ArmoryError, ArmoryResult, Category, Identifier};

use crate::{ensure, get_category, get_field, put_string, string_size};

/// Message tags
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageTag {
    FullState = 0x01,
    SyncEntry = 0x02,
}

impl MessageTag {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x01 => Some(MessageTag::FullState),
            0x02 => Some(MessageTag::SyncEntry),
            _ => None,
        }
    }
}

/// Complete registry contents, one list per category
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FullState {
    lists: [Vec<String>; 4],
    unreadable: [usize; 4],
}

impl FullState {
    pub fn new() -> Self {
        FullState::default()
    }

    /// Build from identifier lists
    pub fn from_identifiers<'a, I>(lists: I) -> Self
    where
        I: IntoIterator<Item = (Category, &'a [Identifier])>,
    {
        let mut state = FullState::new();
        for (category, ids) in lists {
            state.lists[category.index()] = ids.iter().map(|id| id.to_string()).collect();
        }
        state
    }

    pub fn list(&self, category: Category) -> &[String] {
        &self.lists[category.index()]
    }

    pub fn push(&mut self, category: Category, identifier: impl Into<String>) {
        self.lists[category.index()].push(identifier.into());
    }

    /// Iterate (category, list) in wire order
    pub fn iter(&self) -> impl Iterator<Item = (Category, &[String])> {
        Category::ALL
            .into_iter()
            .map(move |category| (category, self.list(category)))
    }

    /// Fields in a section that could not be read as text
    pub fn unreadable(&self, category: Category) -> usize {
        self.unreadable[category.index()]
    }

    fn encoded_size(&self) -> usize {
        self.lists
            .iter()
            .map(|list| 1 + 4 + list.iter().map(|s| string_size(s)).sum::<usize>())
            .sum()
    }

    fn write<B: BufMut>(&self, buf: &mut B) -> ArmoryResult<()> {
        for (category, list) in self.iter() {
            buf.put_u8(category.to_byte());
            buf.put_u32_le(list.len() as u32);
            for s in list {
                put_string(buf, s)?;
            }
        }
        Ok(())
    }

    fn read<B: Buf>(buf: &mut B) -> ArmoryResult<Self> {
        let mut state = FullState::new();
        for expected in Category::ALL {
            let category = get_category(buf)?;
            if category != expected {
                return Err(ArmoryError::Protocol(format!(
                    "FullState section out of order: expected {}, got {}",
                    expected, category
                )));
            }

            ensure(&*buf, 4)?;
            let count = buf.get_u32_le() as usize;
            // Each string takes at least its 2-byte length prefix
            ensure(&*buf, count.saturating_mul(2))?;

            let index = category.index();
            state.lists[index].reserve(count);
            for _ in 0..count {
                match get_field(buf)? {
                    Some(field) => state.lists[index].push(field),
                    None => state.unreadable[index] += 1,
                }
            }
        }
        Ok(state)
    }
}

/// Single registry change
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncEntry {
    pub category: Category,
    /// `None` when the field arrived over-long or not UTF-8
    pub identifier: Option<String>,
}

impl SyncEntry {
    pub fn new(category: Category, identifier: &Identifier) -> Self {
        SyncEntry {
            category,
            identifier: Some(identifier.to_string()),
        }
    }
}

/// Any message an authority sends to a replica
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyncMessage {
    FullState(FullState),
    Entry(SyncEntry),
}

impl SyncMessage {
    pub fn tag(&self) -> MessageTag {
        match self {
            SyncMessage::FullState(_) => MessageTag::FullState,
            SyncMessage::Entry(_) => MessageTag::SyncEntry,
        }
    }

    /// Fields skipped at decode time; zero for anything built locally
    pub fn unreadable_fields(&self) -> usize {
        match self {
            SyncMessage::FullState(state) => state.unreadable.iter().sum(),
            SyncMessage::Entry(entry) => usize::from(entry.identifier.is_none()),
        }
    }

    /// Encoded size in bytes
    pub fn encoded_size(&self) -> usize {
        1 + match self {
            SyncMessage::FullState(state) => state.encoded_size(),
            SyncMessage::Entry(entry) => {
                1 + string_size(entry.identifier.as_deref().unwrap_or_default())
            }
        }
    }

    /// Serialize to a frame
    pub fn encode(&self) -> ArmoryResult<Bytes> {
        let mut buf = BytesMut::with_capacity(self.encoded_size());
        buf.put_u8(self.tag() as u8);
        match self {
            SyncMessage::FullState(state) => state.write(&mut buf)?,
            SyncMessage::Entry(entry) => {
                buf.put_u8(entry.category.to_byte());
                let identifier = entry.identifier.as_deref().ok_or_else(|| {
                    ArmoryError::Protocol("Cannot encode an unreadable identifier".into())
                })?;
                put_string(&mut buf, identifier)?;
            }
        }
        Ok(buf.freeze())
    }

    /// Parse a complete frame
    pub fn decode(mut buf: &[u8]) -> ArmoryResult<Self> {
        ensure(&buf, 1)?;
        let tag = buf.get_u8();
        let message = match MessageTag::from_byte(tag) {
            Some(MessageTag::FullState) => SyncMessage::FullState(FullState::read(&mut buf)?),
            Some(MessageTag::SyncEntry) => {
                let category = get_category(&mut buf)?;
                let identifier = get_field(&mut buf)?;
                SyncMessage::Entry(SyncEntry {
                    category,
                    identifier,
                })
            }
            None => {
                return Err(ArmoryError::Protocol(format!(
                    "Unknown message tag: {:#04x}",
                    tag
                )))
            }
        };

        if buf.has_remaining() {
            return Err(ArmoryError::Protocol(format!(
                "{} trailing bytes after message",
                buf.remaining()
            )));
        }
        Ok(message)
    }
}
