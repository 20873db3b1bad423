//! Best-effort recovery of damaged character cards.
//!
//! [`repair_card`] never fails.  Whatever it cannot decode is reported in
//! [`RepairResult::warnings`]; whatever it could is in the returned card.

pub mod repair;
pub mod scanner;

use serde::Serialize;

use crate::card::CharacterCard;

pub use repair::repair_card;

/// Complete report produced by [`repair_card`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RepairResult {
    /// Always a fully populated V3 card, possibly all defaults.
    pub card:      CharacterCard,
    /// The input PNG with every card-bearing `tEXt` chunk removed, or just
    /// the PNG signature when the chunk stream could not be parsed.
    #[serde(skip)]
    pub image:     Vec<u8>,
    /// One entry per degradation, deduplicated, in the order encountered.
    pub warnings:  Vec<String>,
    /// Source markers (`full_card`, `v1_card`, partial field names) followed
    /// by every top-level field that ended up non-default.  Deduplicated.
    pub recovered: Vec<String>,
}

impl RepairResult {
    /// True when nothing had to be worked around.
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    /// Summary line for display.
    pub fn summary(&self) -> String {
        format!(
            "repaired card {:?}: {} field(s) recovered, {} warning(s), {} byte clean image",
            self.card.data.name,
            self.recovered.len(),
            self.warnings.len(),
            self.image.len(),
        )
    }
}
