//! # Slot Allocator
//! Largest-remainder apportionment of the daily slot budget, with a
//! per-source cap.
//!
//! Leftover slots are handed out one at a time, in rounds, by descending
//! fractional remainder. Capped sources are skipped. When a whole round
//! places nothing the loop stops, so the total may fall short of the budget.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

pub const DEFAULT_TOTAL_SLOTS: u32 = 10;
pub const DEFAULT_MAX_SLOTS_PER_SOURCE: u32 = 3;

/// Remaining slot capacity per source id.
///
/// Passed by value through the selection phases and handed back updated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotAllocation(BTreeMap<String, u32>);

impl SlotAllocation {
    pub fn get(&self, source_id: &str) -> u32 {
        self.0.get(source_id).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u32 {
        self.0.values().sum()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Take one slot from `source_id`. Returns false if none was left.
    pub fn take_one(&mut self, source_id: &str) -> bool {
        match self.0.get_mut(source_id) {
            Some(n) if *n > 0 => {
                *n -= 1;
                true
            }
            _ => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn as_map(&self) -> &BTreeMap<String, u32> {
        &self.0
    }
}

impl FromIterator<(String, u32)> for SlotAllocation {
    fn from_iter<I: IntoIterator<Item = (String, u32)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

struct Share<'a> {
    id: &'a str,
    score: f64,
    remainder: f64,
}

/// Apportion `budget` slots across `scores`, never giving a source more than `cap`.
pub fn allocate_slots(scores: &BTreeMap<String, f64>, budget: u32, cap: u32) -> SlotAllocation {
    // Negative scores carry no weight.
    let weight = |s: f64| if s.is_finite() { s.max(0.0) } else { 0.0 };
    let total: f64 = scores.values().map(|&s| weight(s)).sum();

    if total <= 0.0 {
        return scores.keys().map(|id| (id.clone(), 0)).collect();
    }

    let mut slots: BTreeMap<String, u32> = BTreeMap::new();
    let mut shares: Vec<Share<'_>> = Vec::with_capacity(scores.len());
    for (id, &s) in scores {
        let ideal = f64::from(budget) * weight(s) / total;
        let floor = ideal.floor();
        slots.insert(id.clone(), (floor as u32).min(cap));
        shares.push(Share {
            id,
            score: weight(s),
            remainder: ideal - floor,
        });
    }

    // Largest remainder first; then higher score; then id for a total order.
    shares.sort_by(|a, b| {
        b.remainder
            .partial_cmp(&a.remainder)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal))
            .then_with(|| a.id.cmp(b.id))
    });

    let mut remaining = budget.saturating_sub(slots.values().sum());
    while remaining > 0 {
        let mut moved = false;
        for share in &shares {
            let Some(n) = slots.get_mut(share.id) else {
                continue;
            };
            if *n >= cap {
                continue;
            }
            *n += 1;
            remaining -= 1;
            moved = true;
            if remaining == 0 {
                break;
            }
        }
        if !moved {
            break;
        }
    }

    SlotAllocation(slots)
}
