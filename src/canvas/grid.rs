//! Cell storage and concurrency strategies
//!
//! Two strategies trade snapshot consistency against writer throughput:
//! - `Atomic`: every cell is an independent `AtomicU32`. Draws never block;
//!   a full copy may be torn (cells written during the copy can show either
//!   their old or new value, independently of each other).
//! - `Locked`: every cell owns an `RwLock`. A full copy holds every read lock
//!   at once, so it reflects a single instant, but blocks all writers for the
//!   duration of the copy.
//!
//! All locks are allocated up front; no cell lock is ever created lazily.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{PoisonError, RwLock};

use crate::settings::Consistency;

/// Fixed-size array of color cells
#[derive(Debug)]
pub enum Grid {
    /// Lock-free cells, torn snapshots
    Atomic(Box<[AtomicU32]>),
    /// Per-cell reader/writer locks, point-in-time snapshots
    Locked(Box<[RwLock<u32>]>),
}

impl Grid {
    /// Build a grid holding `colors` using the given strategy
    pub fn from_colors(colors: &[u32], consistency: Consistency) -> Self {
        match consistency {
            Consistency::Torn => Grid::Atomic(colors.iter().map(|&c| AtomicU32::new(c)).collect()),
            Consistency::Exact => Grid::Locked(colors.iter().map(|&c| RwLock::new(c)).collect()),
        }
    }

    /// Strategy backing this grid
    pub fn consistency(&self) -> Consistency {
        match self {
            Grid::Atomic(_) => Consistency::Torn,
            Grid::Locked(_) => Consistency::Exact,
        }
    }

    /// Overwrite one cell. `index` must be in bounds.
    pub fn store(&self, index: usize, color: u32) {
        match self {
            Grid::Atomic(cells) => cells[index].store(color, Ordering::Relaxed),
            Grid::Locked(cells) => {
                // A poisoned cell still holds a whole u32; keep going.
                *cells[index].write().unwrap_or_else(PoisonError::into_inner) = color;
            }
        }
    }

    /// Read one cell. `index` must be in bounds.
    pub fn load(&self, index: usize) -> u32 {
        match self {
            Grid::Atomic(cells) => cells[index].load(Ordering::Relaxed),
            Grid::Locked(cells) => *cells[index].read().unwrap_or_else(PoisonError::into_inner),
        }
    }

    /// Copy every cell in index order
    pub fn copy_all(&self) -> Vec<u32> {
        match self {
            Grid::Atomic(cells) => cells.iter().map(|c| c.load(Ordering::Relaxed)).collect(),
            Grid::Locked(cells) => {
                // Acquire in ascending index order; release only after the copy.
                let guards: Vec<_> = cells
                    .iter()
                    .map(|c| c.read().unwrap_or_else(PoisonError::into_inner))
                    .collect();
                guards.iter().map(|g| **g).collect()
            }
        }
    }
}
