//! Tip tracking and reorganization detection.
//!
//! The tracker owns the highest `(height, hash)` pair the synchronizer has
//! acknowledged and classifies every streamed block against it. The tip
//! moves unconditionally after classification; the caller is responsible
//! for executing the returned repair action, and for executing rewind
//! deletions *before* dispatching the new block's insert.

/// The highest acknowledged block, by height and base58 hash.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tip {
    /// Highest indexed height; 0 means nothing has been indexed yet.
    pub height: u64,
    /// Base58 hash at `height`; empty when nothing has been indexed.
    pub hash: String,
}

/// Repair action for one streamed block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    /// Continuation: index the new block, nothing else.
    Index,
    /// One or more blocks were skipped; backfill `[from, to]`
    /// asynchronously, then index the new block.
    Backfill {
        /// First missing height, inclusive.
        from: u64,
        /// Last missing height, inclusive.
        to: u64,
    },
    /// The chain rewound; delete documents with block height in
    /// `[from, to]` across all families *before* indexing the new block.
    Rewind {
        /// First height to erase, inclusive (the new block's height).
        from: u64,
        /// Last height to erase, inclusive (the old tip).
        to: u64,
    },
}

/// Tracks the tip and classifies incoming blocks.
#[derive(Debug, Default)]
pub struct TipTracker {
    tip: Tip,
}

impl TipTracker {
    /// Tracker with nothing acknowledged yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the tip from persisted state.
    pub fn seed(&mut self, height: u64, hash: impl Into<String>) {
        self.tip = Tip { height, hash: hash.into() };
    }

    /// The current tip.
    pub const fn tip(&self) -> &Tip {
        &self.tip
    }

    /// Classify a streamed block and advance the tip to it.
    pub fn observe(&mut self, height: u64, hash: &str) -> SyncAction {
        let action = classify(&self.tip, height);
        self.tip = Tip { height, hash: hash.to_owned() };
        action
    }
}

fn classify(tip: &Tip, new_height: u64) -> SyncAction {
    if tip.height == 0 && new_height > 0 {
        // Initial sync: everything below the streamed block is missing.
        SyncAction::Backfill { from: 0, to: new_height - 1 }
    } else if new_height == tip.height + 1 {
        SyncAction::Index
    } else if new_height > tip.height + 1 {
        SyncAction::Backfill { from: tip.height + 1, to: new_height - 1 }
    } else {
        // Covers both a rewind below the tip and a same-height fork: any
        // block at or below the tip invalidates everything from its height
        // up.
        SyncAction::Rewind { from: new_height, to: tip.height }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker_at(height: u64) -> TipTracker {
        let mut tracker = TipTracker::new();
        tracker.seed(height, format!("hash{height}"));
        tracker
    }

    #[test]
    fn initial_sync_backfills_from_genesis() {
        let mut tracker = TipTracker::new();
        assert_eq!(tracker.observe(10, "h10"), SyncAction::Backfill { from: 0, to: 9 });
        assert_eq!(tracker.tip(), &Tip { height: 10, hash: "h10".into() });
    }

    #[test]
    fn first_block_after_genesis_still_backfills_genesis() {
        let mut tracker = TipTracker::new();
        assert_eq!(tracker.observe(1, "h1"), SyncAction::Backfill { from: 0, to: 0 });
    }

    #[test]
    fn continuation_advances_monotonically() {
        let mut tracker = tracker_at(5);
        assert_eq!(tracker.observe(6, "h6"), SyncAction::Index);
        assert_eq!(tracker.observe(7, "h7"), SyncAction::Index);
        assert_eq!(tracker.tip().height, 7);
    }

    #[test]
    fn gap_backfills_skipped_interval() {
        let mut tracker = tracker_at(5);
        assert_eq!(tracker.observe(10, "h10"), SyncAction::Backfill { from: 6, to: 9 });
        assert_eq!(tracker.tip().height, 10);
    }

    #[test]
    fn rewind_erases_down_to_new_height() {
        let mut tracker = tracker_at(10);
        assert_eq!(tracker.observe(8, "h8new"), SyncAction::Rewind { from: 8, to: 10 });
        assert_eq!(tracker.tip(), &Tip { height: 8, hash: "h8new".into() });
    }

    #[test]
    fn same_height_fork_rewinds_in_place() {
        let mut tracker = tracker_at(10);
        assert_eq!(tracker.observe(10, "other10"), SyncAction::Rewind { from: 10, to: 10 });
        assert_eq!(tracker.tip().hash, "other10");
    }

    #[test]
    fn genesis_on_empty_tip_rewinds_nothing_harmful() {
        let mut tracker = TipTracker::new();
        assert_eq!(tracker.observe(0, "h0"), SyncAction::Rewind { from: 0, to: 0 });
        assert_eq!(tracker.tip().height, 0);
        assert_eq!(tracker.tip().hash, "h0");
    }
}
