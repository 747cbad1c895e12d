//! Preemption level bitfields and the ordering used to rank them.
//!
//! A preemption class is written as `+`-joined level names, e.g.
//! `express_queue+starving_jobs`, and encoded as one bit per level.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use thiserror::Error;

/// Named classes of preemptable work. The discriminant is the bit position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum PreemptLevel {
    NormalJobs = 0,
    OverFairshare = 1,
    OverQueueSoftLimit = 2,
    OverServerSoftLimit = 3,
    StarvingJobs = 4,
    ExpressQueue = 5,
}

impl PreemptLevel {
    pub const ALL: [PreemptLevel; 6] = [
        PreemptLevel::NormalJobs,
        PreemptLevel::OverFairshare,
        PreemptLevel::OverQueueSoftLimit,
        PreemptLevel::OverServerSoftLimit,
        PreemptLevel::StarvingJobs,
        PreemptLevel::ExpressQueue,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PreemptLevel::NormalJobs => "normal_jobs",
            PreemptLevel::OverFairshare => "fairshare",
            PreemptLevel::OverQueueSoftLimit => "queue_softlimits",
            PreemptLevel::OverServerSoftLimit => "server_softlimits",
            PreemptLevel::StarvingJobs => "starving_jobs",
            PreemptLevel::ExpressQueue => "express_queue",
        }
    }

    /// Case-sensitive lookup by configuration name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|level| level.name() == name)
    }

    pub fn bit(self) -> u32 {
        1 << self as u32
    }
}

/// A set of preemption levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PreemptBits(pub u32);

impl PreemptBits {
    pub fn count(self) -> u32 {
        self.0.count_ones()
    }

    /// Whether a job in this state qualifies at `level`. Used by the
    /// scheduling cycle when it matches jobs against compiled classes.
    pub fn contains(self, level: PreemptLevel) -> bool {
        self.0 & level.bit() != 0
    }
}

impl From<PreemptLevel> for PreemptBits {
    fn from(level: PreemptLevel) -> Self {
        PreemptBits(level.bit())
    }
}

/// A `+`-joined list named a level that does not exist.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown preemption level '{0}'")]
pub struct UnknownPreemptLevel(pub String);

/// Encode a `+`-joined list of level names using the built-in level table.
///
/// Any unknown name invalidates the whole list.
pub fn encode(plist: &str) -> Result<PreemptBits, UnknownPreemptLevel> {
    encode_with(plist, |name| PreemptLevel::from_name(name).map(|l| l as u32))
}

/// Encode against a caller-supplied level table mapping names to bit positions.
pub fn encode_with<F>(plist: &str, lookup: F) -> Result<PreemptBits, UnknownPreemptLevel>
where
    F: Fn(&str) -> Option<u32>,
{
    let mut bits = 0u32;
    for token in plist.split('+').filter(|t| !t.is_empty()) {
        let position = lookup(token)
            .filter(|p| *p < u32::BITS)
            .ok_or_else(|| UnknownPreemptLevel(token.to_string()))?;
        bits |= 1 << position;
    }
    Ok(PreemptBits(bits))
}

/// A preemption class paired with a caller-defined priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreemptClass {
    pub bits: PreemptBits,
    pub priority: i32,
}

/// Rank two classes: more levels first, then higher priority first.
pub fn compare(a: &PreemptClass, b: &PreemptClass) -> Ordering {
    b.bits
        .count()
        .cmp(&a.bits.count())
        .then_with(|| b.priority.cmp(&a.priority))
}

/// Stable sort of classes into rank order.
pub fn sort_classes(classes: &mut [PreemptClass]) {
    classes.sort_by(compare);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_known_levels() {
        let bits = encode("express_queue+normal_jobs").unwrap();
        assert_eq!(
            bits.0,
            PreemptLevel::ExpressQueue.bit() | PreemptLevel::NormalJobs.bit()
        );
        assert!(bits.contains(PreemptLevel::ExpressQueue));
        assert!(!bits.contains(PreemptLevel::StarvingJobs));
    }

    #[test]
    fn token_order_does_not_matter() {
        assert_eq!(
            encode("starving_jobs+fairshare"),
            encode("fairshare+starving_jobs")
        );
    }

    #[test]
    fn one_bad_token_invalidates_everything() {
        assert_eq!(
            encode("express_queue+normal_jobs+bogus"),
            Err(UnknownPreemptLevel("bogus".to_string()))
        );
    }

    #[test]
    fn names_are_case_sensitive() {
        assert!(encode("Express_Queue").is_err());
    }

    #[test]
    fn custom_tables() {
        let lookup = |name: &str| match name {
            "express" => Some(5),
            "normal" => Some(0),
            _ => None,
        };
        assert_eq!(encode_with("express+normal", lookup), Ok(PreemptBits(0b100001)));
        assert_eq!(
            encode_with("express+normal", lookup),
            encode_with("normal+express", lookup)
        );
        assert!(encode_with("express+normal+bogus", lookup).is_err());
    }

    #[test]
    fn more_levels_rank_first_regardless_of_priority() {
        let wide = PreemptClass {
            bits: PreemptBits(0b11),
            priority: 1,
        };
        let narrow = PreemptClass {
            bits: PreemptBits(0b100),
            priority: 1000,
        };
        assert_eq!(compare(&wide, &narrow), Ordering::Less);
        assert_eq!(compare(&narrow, &wide), Ordering::Greater);
    }

    #[test]
    fn ties_break_on_priority_descending() {
        let high = PreemptClass {
            bits: PreemptBits(0b1),
            priority: 9,
        };
        let low = PreemptClass {
            bits: PreemptBits(0b10),
            priority: 3,
        };
        let mut classes = [low, high];
        sort_classes(&mut classes);
        assert_eq!(classes, [high, low]);
        assert_eq!(compare(&high, &high), Ordering::Equal);
    }
}
