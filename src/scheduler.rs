//! Periodic background save
//!
//! One thread waits `interval` after each pass, then flushes the store if it
//! is dirty. Waiting starts after the previous pass finishes, so a slow save
//! delays the next tick instead of queueing extra ones.

use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::canvas::CanvasStore;
use crate::persistence::{Flush, PersistenceManager};

/// Handle to the running save thread. Stopping it performs one last flush.
#[derive(Debug)]
pub struct Scheduler {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Scheduler {
    /// Start the save thread
    pub fn spawn(
        store: Arc<CanvasStore>,
        persistence: Arc<PersistenceManager>,
        interval: Duration,
    ) -> std::io::Result<Self> {
        let (stop, stop_rx) = mpsc::channel::<()>();
        let handle = thread::Builder::new()
            .name("canvas-saver".to_string())
            .spawn(move || {
                log::info!("Saving canvas every {:?} when dirty", interval);
                loop {
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            // Failures are logged by flush and retried next tick
                            let _ = persistence.flush(&store);
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }

                match persistence.flush(&store) {
                    Ok(Flush::Saved) => log::info!("Final save complete"),
                    Ok(Flush::Clean) => log::info!("No unsaved changes at shutdown"),
                    Err(_) => log::error!("Final save failed; recent changes are lost"),
                }
            })?;

        Ok(Self {
            stop: Some(stop),
            handle: Some(handle),
        })
    }

    /// Stop the thread after a final flush and wait for it
    pub fn shutdown(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Save thread panicked");
            }
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::read_file;
    use crate::settings::Consistency;
    use std::path::PathBuf;
    use tempfile::TempDir;

    /// Snapshot path inside a directory removed when the `TempDir` drops
    fn snapshot_path() -> (TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.bin");
        (dir, path)
    }

    #[test]
    fn test_tick_saves_dirty_store() {
        let (_dir, path) = snapshot_path();
        let store = Arc::new(CanvasStore::new(10, 10, Consistency::Torn));
        let persistence = Arc::new(PersistenceManager::new(&path));
        store.draw(2, 3, 0xABCDEF);

        let scheduler =
            Scheduler::spawn(store.clone(), persistence, Duration::from_millis(20)).unwrap();
        let mut saved = false;
        for _ in 0..200 {
            if path.exists() {
                saved = true;
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        scheduler.shutdown();

        assert!(saved);
        assert!(!store.is_dirty());
        assert_eq!(read_file(&path).unwrap().snapshot.color_at(2, 3), Some(0xABCDEF));
    }

    #[test]
    fn test_clean_store_never_written() {
        let (_dir, path) = snapshot_path();
        let store = Arc::new(CanvasStore::new(10, 10, Consistency::Exact));
        let persistence = Arc::new(PersistenceManager::new(&path));

        let scheduler = Scheduler::spawn(store, persistence, Duration::from_millis(5)).unwrap();
        thread::sleep(Duration::from_millis(60));
        scheduler.shutdown();

        assert!(!path.exists());
    }

    #[test]
    fn test_shutdown_flushes_pending_changes() {
        let (_dir, path) = snapshot_path();
        let store = Arc::new(CanvasStore::new(10, 10, Consistency::Torn));
        let persistence = Arc::new(PersistenceManager::new(&path));

        let scheduler =
            Scheduler::spawn(store.clone(), persistence, Duration::from_secs(3600)).unwrap();
        store.draw(9, 9, 77);
        scheduler.shutdown();

        assert_eq!(read_file(&path).unwrap().snapshot.color_at(9, 9), Some(77));
    }
}
