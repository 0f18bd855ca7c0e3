//! Canvas module
//!
//! The canvas is a fixed-size, row-major grid of opaque `u32` colors that many
//! writers update one cell at a time:
//! - `grid`: Cell storage with two concurrency strategies
//! - `snapshot`: Immutable copies of the whole grid
//! - `store`: Public draw/snapshot API and the dirty flag

pub mod grid;
pub mod snapshot;
pub mod store;

pub use grid::Grid;
pub use snapshot::Snapshot;
pub use store::CanvasStore;
