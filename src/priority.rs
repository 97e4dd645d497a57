// src/priority.rs
//! Delivery order for a batch: by level, high first, discovery order kept
//! within a level.

use crate::alert::Alert;
use crate::analyze::AlertLevel;

/// Anything that can be ordered by alert level.
pub trait Leveled {
    fn level(&self) -> AlertLevel;
}

impl Leveled for Alert {
    fn level(&self) -> AlertLevel {
        self.level
    }
}

impl Leveled for AlertLevel {
    fn level(&self) -> AlertLevel {
        *self
    }
}

/// Stable in-place sort by descending level rank.
pub fn sort_by_priority<T: Leveled>(items: &mut [T]) {
    // slice::sort_by is stable
    items.sort_by(|a, b| b.level().rank().cmp(&a.level().rank()));
}

pub fn sorted_by_priority<T: Leveled>(mut items: Vec<T>) -> Vec<T> {
    sort_by_priority(&mut items);
    items
}
