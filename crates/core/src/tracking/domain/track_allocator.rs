//! Frame-to-frame track identity assignment.
//!
//! Each detection inherits the ID of the first previous-frame face it
//! overlaps (see [`is_same_face`]); anything unmatched gets a fresh ID.
//! Only the immediately preceding frame is remembered, so a face that
//! disappears for a single frame comes back with a new ID. Matching is
//! first-match-wins in detection order rather than a global assignment,
//! which means two current faces overlapping the same previous face can
//! both inherit its ID.
use thiserror::Error;

use crate::shared::constants::SAME_FACE_SIMILARITY;
use crate::shared::rect::Rect;
use crate::tracking::domain::overlap::is_same_face;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TrackedFace {
    pub track_id: u32,
    pub rect: Rect,
}

/// Issuing the fresh IDs a frame needs would overflow `u32`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("track IDs exhausted: {needed} new IDs needed after {last_track_id}")]
pub struct TrackIdsExhausted {
    pub last_track_id: u32,
    pub needed: usize,
}

/// How many fresh IDs an allocator seeded with `seed` can still issue.
pub const fn remaining_ids(seed: u32) -> u32 {
    u32::MAX - seed
}

pub struct TrackAllocator {
    last_track_id: u32,
    previous: Vec<TrackedFace>,
}

impl TrackAllocator {
    /// Fresh IDs start at `seed + 1`.
    pub fn new(seed: u32) -> Self {
        Self {
            last_track_id: seed,
            previous: Vec::new(),
        }
    }

    /// Returns one track ID per rectangle, in input order.
    ///
    /// Fails without issuing anything when the frame needs more fresh IDs
    /// than remain; the previous-frame memory is cleared in that case.
    pub fn assign(&mut self, rects: &[Rect]) -> Result<Vec<u32>, TrackIdsExhausted> {
        let mut slots: Vec<Option<u32>> = vec![None; rects.len()];

        if !self.previous.is_empty() {
            for (slot, rect) in slots.iter_mut().zip(rects) {
                *slot = self
                    .previous
                    .iter()
                    .find(|prev| is_same_face(SAME_FACE_SIMILARITY, &prev.rect, rect))
                    .map(|prev| prev.track_id);
            }
        }

        let needed = slots.iter().filter(|slot| slot.is_none()).count();
        if needed > remaining_ids(self.last_track_id) as usize {
            self.previous.clear();
            return Err(TrackIdsExhausted {
                last_track_id: self.last_track_id,
                needed,
            });
        }

        let ids: Vec<u32> = slots
            .into_iter()
            .map(|slot| slot.unwrap_or_else(|| self.next_id()))
            .collect();

        self.previous = rects
            .iter()
            .zip(&ids)
            .map(|(rect, &track_id)| TrackedFace {
                track_id,
                rect: *rect,
            })
            .collect();

        Ok(ids)
    }

    /// Highest track ID issued so far (the seed if none were issued).
    pub fn last_track_id(&self) -> u32 {
        self.last_track_id
    }

    /// Faces remembered from the most recent `assign` call.
    pub fn tracked(&self) -> &[TrackedFace] {
        &self.previous
    }

    /// Callers check `remaining_ids` first.
    fn next_id(&mut self) -> u32 {
        self.last_track_id += 1;
        self.last_track_id
    }
}
