//! Canvas store
//!
//! Owns the cell grid and the dirty flag. `draw` is called by any number of
//! writer threads; `read_snapshot` by the save task and the request layer.

use std::sync::atomic::{AtomicBool, Ordering};

use super::grid::Grid;
use super::snapshot::{Snapshot, cell_index};
use crate::persistence::PersistError;
use crate::settings::Consistency;

/// Shared canvas with per-cell concurrent writes
#[derive(Debug)]
pub struct CanvasStore {
    width: u32,
    height: u32,
    grid: Grid,
    /// Advisory "unsaved changes exist" hint. Concurrent writers may race to
    /// set it; only the save path clears it.
    dirty: AtomicBool,
}

impl CanvasStore {
    /// Blank (all zero) canvas
    pub fn new(width: u32, height: u32, consistency: Consistency) -> Self {
        Self::build(&Snapshot::blank(width, height), consistency)
    }

    /// Canvas seeded from a loaded snapshot. Starts clean.
    ///
    /// Fails when `colors` does not hold exactly `width * height` cells.
    pub fn from_snapshot(snapshot: &Snapshot, consistency: Consistency) -> Result<Self, PersistError> {
        let expected = snapshot.width as usize * snapshot.height as usize;
        if snapshot.colors.len() != expected {
            return Err(PersistError::Length {
                expected,
                actual: snapshot.colors.len(),
            });
        }
        Ok(Self::build(snapshot, consistency))
    }

    fn build(snapshot: &Snapshot, consistency: Consistency) -> Self {
        Self {
            width: snapshot.width,
            height: snapshot.height,
            grid: Grid::from_colors(&snapshot.colors, consistency),
            dirty: AtomicBool::new(false),
        }
    }

    /// Paint one cell. Returns false (and changes nothing) when `(x, y)` is
    /// outside the canvas.
    pub fn draw(&self, x: i32, y: i32, color: u32) -> bool {
        let Some(index) = cell_index(self.width, self.height, x, y) else {
            return false;
        };
        self.grid.store(index, color);
        self.dirty.store(true, Ordering::Release);
        true
    }

    /// Full copy of the canvas at the consistency level of the grid strategy
    pub fn read_snapshot(&self) -> Snapshot {
        Snapshot {
            width: self.width,
            height: self.height,
            colors: self.grid.copy_all(),
        }
    }

    /// Canvas as served to the request layer
    pub fn get_canvas(&self) -> Snapshot {
        self.read_snapshot()
    }

    /// Color of a single cell
    pub fn color_at(&self, x: i32, y: i32) -> Option<u32> {
        cell_index(self.width, self.height, x, y).map(|i| self.grid.load(i))
    }

    /// `(width, height)`, fixed at construction
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn consistency(&self) -> Consistency {
        self.grid.consistency()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Clear the dirty flag, returning whether it was set
    pub fn take_dirty(&self) -> bool {
        self.dirty.swap(false, Ordering::AcqRel)
    }

    /// Raise the dirty flag (used to re-arm a failed save)
    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }
}
