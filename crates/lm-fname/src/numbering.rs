//! Sibling-number allocation.
//!
//! Numbers live in `[1, 999]` and are handed out round-first: tier 100,
//! then 10, then 1. The spacing leaves room to insert between any two
//! adjacent siblings without renumbering until the level fills up.

use std::collections::BTreeSet;

/// Highest sibling number a level can hold.
pub const MAX_NUMBER: u16 = 999;

/// Tier sizes tried in preference order.
const TIERS: [u16; 3] = [100, 10, 1];

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum NumberError {
    #[error("no sibling number available in the requested range")]
    NoSlotAvailable,
}

/// Smallest unused multiple of a tier inside the open interval
/// `(low, high)`, trying the roundest tier first.
fn tier_search(occupied: &BTreeSet<u16>, low: u16, high: u16) -> Result<u16, NumberError> {
    for tier in TIERS {
        let mut candidate = (low / tier + 1) * tier;
        while candidate < high && candidate <= MAX_NUMBER {
            if !occupied.contains(&candidate) {
                return Ok(candidate);
            }
            candidate += tier;
        }
    }
    Err(NumberError::NoSlotAvailable)
}

/// Allocate a number for a new last sibling.
///
/// The roundest free number wins: the first free multiple of 100, else of
/// 10, else the first free number. Fails only when the level is full.
pub fn next_sibling(occupied: &BTreeSet<u16>) -> Result<u16, NumberError> {
    tier_search(occupied, 0, MAX_NUMBER + 1)
}

/// Allocate a number strictly before `before`, between it and its nearest
/// occupied predecessor.
pub fn sibling_before(occupied: &BTreeSet<u16>, before: u16) -> Result<u16, NumberError> {
    let floor = occupied.range(..before).next_back().copied().unwrap_or(0);
    tier_search(occupied, floor, before)
}

/// Allocate a number strictly after `after`, between it and its nearest
/// occupied successor.
pub fn sibling_after(occupied: &BTreeSet<u16>, after: u16) -> Result<u16, NumberError> {
    let ceiling = occupied
        .range(after + 1..)
        .next()
        .copied()
        .unwrap_or(MAX_NUMBER + 1);
    tier_search(occupied, after, ceiling)
}

/// Evenly spaced numbers for `count` renumbered siblings: hundreds while
/// they fit, then tens, then ones.
pub fn compact_numbers(count: usize) -> Result<Vec<u16>, NumberError> {
    let spacing = match count {
        0..=9 => 100,
        10..=99 => 10,
        100..=999 => 1,
        _ => return Err(NumberError::NoSlotAvailable),
    };
    Ok((1..=count as u16).map(|i| i * spacing).collect())
}
