use media_merge_models::MediaRecord;
use std::fmt;

/// Stable handle to a record stored in a [`RecordArena`]
///
/// Handles carry the arena epoch they were issued in; after a `clear()` old
/// handles resolve to nothing instead of aliasing newly inserted records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId {
    epoch: u32,
    slot: u32,
}

impl RecordId {
    pub fn slot(&self) -> u32 {
        self.slot
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.epoch, self.slot)
    }
}

/// Owner of every record the merge engine and its callers share
#[derive(Debug, Default)]
pub struct RecordArena {
    records: Vec<MediaRecord>,
    epoch: u32,
}

impl RecordArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, record: MediaRecord) -> RecordId {
        let slot = u32::try_from(self.records.len()).unwrap_or(u32::MAX);
        self.records.push(record);
        RecordId {
            epoch: self.epoch,
            slot,
        }
    }

    pub fn get(&self, id: RecordId) -> Option<&MediaRecord> {
        if id.epoch != self.epoch {
            return None;
        }
        self.records.get(id.slot as usize)
    }

    pub fn get_mut(&mut self, id: RecordId) -> Option<&mut MediaRecord> {
        if id.epoch != self.epoch {
            return None;
        }
        self.records.get_mut(id.slot as usize)
    }

    /// Move `source`'s state for `server` onto `target`.
    ///
    /// `source` keeps its identity fields but no longer holds state for
    /// `server`. Returns false when either handle is stale or both name the
    /// same record.
    pub fn absorb(&mut self, target: RecordId, source: RecordId, server: &str) -> bool {
        if target == source {
            return false;
        }
        let Some(source_record) = self.get(source).cloned() else {
            return false;
        };
        let Some(target_record) = self.get_mut(target) else {
            return false;
        };
        target_record.absorb_other(&source_record, server);
        if let Some(source_record) = self.get_mut(source) {
            source_record.servers.remove(server);
        }
        true
    }

    /// Every live record with its handle, in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (RecordId, &MediaRecord)> {
        let epoch = self.epoch;
        self.records.iter().enumerate().map(move |(slot, record)| {
            let id = RecordId {
                epoch,
                slot: u32::try_from(slot).unwrap_or(u32::MAX),
            };
            (id, record)
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drop every record and invalidate all outstanding handles
    pub fn clear(&mut self) {
        self.records.clear();
        self.epoch = self.epoch.wrapping_add(1);
    }
}
