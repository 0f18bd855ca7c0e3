//! Point-in-time copies of the canvas
//!
//! A snapshot is the unit exchanged between the store and persistence, and
//! the shape served to the request layer.

use serde::{Deserialize, Serialize};

/// Immutable copy of a canvas (row-major, `colors[y * width + x]`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub width: u32,
    pub height: u32,
    pub colors: Vec<u32>,
}

impl Snapshot {
    /// All-zero canvas of the given size
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            colors: vec![0; width as usize * height as usize],
        }
    }

    /// Row-major index of `(x, y)`, or `None` when outside the canvas
    pub fn index_of(&self, x: i32, y: i32) -> Option<usize> {
        cell_index(self.width, self.height, x, y)
    }

    /// Color at `(x, y)`
    pub fn color_at(&self, x: i32, y: i32) -> Option<u32> {
        self.index_of(x, y).map(|i| self.colors[i])
    }

    /// JSON form handed to the request layer
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Shared bounds check: `0 <= x < width` and `0 <= y < height`
#[inline]
pub(crate) fn cell_index(width: u32, height: u32, x: i32, y: i32) -> Option<usize> {
    if x < 0 || y < 0 || x as u32 >= width || y as u32 >= height {
        return None;
    }
    Some(y as usize * width as usize + x as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_is_zeroed() {
        let snap = Snapshot::blank(4, 3);
        assert_eq!(snap.colors.len(), 12);
        assert!(snap.colors.iter().all(|&c| c == 0));
    }

    #[test]
    fn test_index_row_major() {
        let snap = Snapshot::blank(100, 100);
        assert_eq!(snap.index_of(5, 5), Some(505));
        assert_eq!(snap.index_of(99, 0), Some(99));
        assert_eq!(snap.index_of(0, 1), Some(100));
    }

    #[test]
    fn test_index_out_of_range() {
        let snap = Snapshot::blank(100, 100);
        assert_eq!(snap.index_of(-1, 0), None);
        assert_eq!(snap.index_of(0, -1), None);
        assert_eq!(snap.index_of(100, 0), None);
        assert_eq!(snap.index_of(150, 5), None);
        assert_eq!(snap.index_of(0, 100), None);
    }

    #[test]
    fn test_json_shape() {
        let mut snap = Snapshot::blank(2, 1);
        snap.colors[1] = 0xFF0000;
        let json = snap.to_json().unwrap();
        assert_eq!(json, r#"{"width":2,"height":1,"colors":[0,16711680]}"#);
    }
}
