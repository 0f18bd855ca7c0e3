//! Canvas service
//!
//! Wires the store, persistence and the save scheduler together. This is
//! the surface the request layer talks to.

use std::io;
use std::sync::Arc;

use crate::canvas::{CanvasStore, Snapshot};
use crate::persistence::{Flush, LoadOrigin, PersistError, PersistenceManager};
use crate::scheduler::Scheduler;
use crate::settings::Settings;

/// Running canvas with background persistence
#[derive(Debug)]
pub struct CanvasService {
    store: Arc<CanvasStore>,
    persistence: Arc<PersistenceManager>,
    scheduler: Option<Scheduler>,
    origin: LoadOrigin,
    load_failures: Vec<PersistError>,
}

impl CanvasService {
    /// Load the saved canvas (or start blank) and begin periodic saves.
    ///
    /// Fails with `InvalidInput` when the settings do not validate.
    pub fn start(settings: &Settings) -> io::Result<Self> {
        settings
            .validate()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        let persistence = Arc::new(PersistenceManager::from_settings(settings));
        let loaded = persistence.load();

        let store = CanvasStore::from_snapshot(&loaded.snapshot, settings.consistency)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let store = Arc::new(store);
        if loaded.needs_rewrite() {
            store.mark_dirty();
        }
        let (width, height) = store.dimensions();
        log::info!(
            "Canvas {}x{} ready ({} snapshots)",
            width,
            height,
            store.consistency().as_str()
        );

        let scheduler = Scheduler::spawn(store.clone(), persistence.clone(), settings.save_interval())?;
        Ok(Self {
            store,
            persistence,
            scheduler: Some(scheduler),
            origin: loaded.origin,
            load_failures: loaded.failures,
        })
    }

    pub fn draw(&self, x: i32, y: i32, color: u32) -> bool {
        self.store.draw(x, y, color)
    }

    pub fn get_canvas(&self) -> Snapshot {
        self.store.get_canvas()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.store.dimensions()
    }

    /// Where the startup canvas came from
    pub fn origin(&self) -> LoadOrigin {
        self.origin
    }

    /// Failures met while loading the startup canvas (a missing file included)
    pub fn load_failures(&self) -> &[PersistError] {
        &self.load_failures
    }

    pub fn store(&self) -> &Arc<CanvasStore> {
        &self.store
    }

    /// Save now if dirty, without waiting for the next tick
    pub fn flush_now(&self) -> Result<Flush, PersistError> {
        self.persistence.flush(&self.store)
    }

    /// Stop the scheduler after a final save
    pub fn shutdown(mut self) {
        if let Some(scheduler) = self.scheduler.take() {
            scheduler.shutdown();
        }
    }
}
