//! The change-record shape published by the scene and consumed by render
//! proxies on the other side of the mirroring protocol (`SPEC_FULL.md` §3,
//! §5). Shared verbatim by `Scene`'s own primitive/material journals and
//! by `ember_render::SceneRenderProxy`'s journal, since both describe the
//! same dense-array-with-swap-remove bookkeeping.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    New,
    Remove,
    Move,
    Update,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeRecord {
    pub kind: ChangeKind,
    pub from_id: u32,
    pub to_id: u32,
}

impl ChangeRecord {
    #[must_use]
    pub fn new(id: u32) -> Self {
        Self {
            kind: ChangeKind::New,
            from_id: id,
            to_id: id,
        }
    }

    #[must_use]
    pub fn remove(id: u32) -> Self {
        Self {
            kind: ChangeKind::Remove,
            from_id: id,
            to_id: id,
        }
    }

    #[must_use]
    pub fn moved(from: u32, to: u32) -> Self {
        Self {
            kind: ChangeKind::Move,
            from_id: from,
            to_id: to,
        }
    }

    #[must_use]
    pub fn update(id: u32) -> Self {
        Self {
            kind: ChangeKind::Update,
            from_id: id,
            to_id: id,
        }
    }
}

/// An append-only log of change records, cleared once the reader has
/// consumed a full frame's worth (`SPEC_FULL.md` §5: "the journal is
/// cleared at the end of each frame update").
#[derive(Debug, Default, Clone)]
pub struct Journal {
    records: Vec<ChangeRecord>,
}

impl Journal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: ChangeRecord) {
        self.records.push(record);
    }

    #[must_use]
    pub fn records(&self) -> &[ChangeRecord] {
        &self.records
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_empties_the_log() {
        let mut j = Journal::new();
        j.push(ChangeRecord::new(0));
        assert!(!j.is_empty());
        j.clear();
        assert!(j.is_empty());
    }
}
