//! Pixel Canvas - a shared grid of colors with periodic snapshots
//!
//! Core modules:
//! - `canvas`: Cell grid, concurrency strategies and the canvas store
//! - `persistence`: Snapshot file format, save/load with integrity verification
//! - `scheduler`: Background task that saves the canvas when it is dirty
//! - `service`: Wiring of store, persistence and scheduler
//! - `settings`: Data-driven configuration

pub mod canvas;
pub mod persistence;
pub mod scheduler;
pub mod service;
pub mod settings;

pub use canvas::{CanvasStore, Snapshot};
pub use persistence::{Flush, Loaded, LoadOrigin, PersistError, PersistenceManager};
pub use scheduler::Scheduler;
pub use service::CanvasService;
pub use settings::{Consistency, Settings};

/// Canvas configuration constants
pub mod consts {
    use std::time::Duration;

    /// Canvas size used when no snapshot can be loaded
    pub const DEFAULT_WIDTH: u32 = 100;
    pub const DEFAULT_HEIGHT: u32 = 100;

    /// Upper bound on cells accepted from a snapshot file (16M, 64 MiB of colors)
    pub const MAX_CELLS: u64 = 1 << 24;

    /// Delay between the end of one scheduled save and the start of the next
    pub const SAVE_INTERVAL: Duration = Duration::from_secs(15);

    /// Snapshot file name used when none is configured
    pub const DEFAULT_SNAPSHOT_PATH: &str = "map.bin";
}
