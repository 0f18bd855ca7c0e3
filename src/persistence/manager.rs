//! Persistence manager
//!
//! Loads the canvas once at startup and saves it repeatedly afterwards.
//! Saves never run concurrently with each other: every write goes through
//! a single save gate.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use super::PersistError;
use super::format::{self, Decoded, FORMAT_VERSION};
use crate::canvas::{CanvasStore, Snapshot};
use crate::consts::{DEFAULT_HEIGHT, DEFAULT_WIDTH};
use crate::settings::Settings;

/// Where a loaded snapshot came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOrigin {
    /// The live snapshot file
    Live,
    /// The live file was unusable; the previous save was
    Backup,
    /// Nothing usable on disk; fresh blank canvas
    Blank,
}

/// Result of a startup load
#[derive(Debug)]
pub struct Loaded {
    pub snapshot: Snapshot,
    pub origin: LoadOrigin,
    /// Format version of the file read (`None` for a blank canvas)
    pub version: Option<u32>,
    /// Every failure met on the way, in order (already logged)
    pub failures: Vec<PersistError>,
}

impl Loaded {
    /// The canvas on disk is not the live file in the current format and
    /// should be rewritten at the next save.
    pub fn needs_rewrite(&self) -> bool {
        self.origin == LoadOrigin::Backup || self.version.is_some_and(|v| v < FORMAT_VERSION)
    }
}

/// Outcome of a scheduled save
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flush {
    /// Store was not dirty; nothing written
    Clean,
    /// Snapshot written
    Saved,
}

/// Reads and writes canvas snapshots at a fixed path
#[derive(Debug)]
pub struct PersistenceManager {
    path: PathBuf,
    keep_backup: bool,
    default_size: (u32, u32),
    save_gate: Mutex<()>,
}

impl PersistenceManager {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            keep_backup: true,
            default_size: (DEFAULT_WIDTH, DEFAULT_HEIGHT),
            save_gate: Mutex::new(()),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(&settings.snapshot_path)
            .with_backup(settings.keep_backup)
            .with_default_size(settings.width, settings.height)
    }

    pub fn with_backup(mut self, keep_backup: bool) -> Self {
        self.keep_backup = keep_backup;
        self
    }

    /// Size of the blank canvas used when nothing loads
    pub fn with_default_size(mut self, width: u32, height: u32) -> Self {
        self.default_size = (width, height);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backup_path(&self) -> PathBuf {
        with_suffix(&self.path, ".bak")
    }

    /// Load the canvas: live file, then backup, then a blank canvas.
    /// Never fails; every failure is logged and returned in the report.
    pub fn load(&self) -> Loaded {
        let mut failures = Vec::new();

        match read_file(&self.path) {
            Ok(decoded) => return self.loaded(decoded, LoadOrigin::Live, failures),
            Err(e) if e.is_not_found() => {
                log::info!("No snapshot at {}", self.path.display());
                failures.push(e);
            }
            Err(e) => {
                log::warn!("Failed to load {}: {}", self.path.display(), e);
                failures.push(e);
            }
        }

        if self.keep_backup {
            let backup = self.backup_path();
            match read_file(&backup) {
                Ok(decoded) => return self.loaded(decoded, LoadOrigin::Backup, failures),
                Err(e) if e.is_not_found() => {}
                Err(e) => {
                    log::warn!("Failed to load backup {}: {}", backup.display(), e);
                    failures.push(e);
                }
            }
        }

        let (width, height) = self.default_size;
        if failures.iter().any(|e| !e.is_not_found()) {
            log::error!("Snapshot unusable, starting with a blank {}x{} canvas", width, height);
        } else {
            log::info!("Starting with a blank {}x{} canvas", width, height);
        }
        Loaded {
            snapshot: Snapshot::blank(width, height),
            origin: LoadOrigin::Blank,
            version: None,
            failures,
        }
    }

    fn loaded(&self, decoded: Decoded, origin: LoadOrigin, failures: Vec<PersistError>) -> Loaded {
        let Decoded { snapshot, version } = decoded;
        log::info!(
            "Loaded {}x{} canvas ({:?}, format v{})",
            snapshot.width,
            snapshot.height,
            origin,
            version
        );
        if version < FORMAT_VERSION {
            log::info!("Snapshot format v{} will be upgraded on next save", version);
        }
        Loaded {
            snapshot,
            origin,
            version: Some(version),
            failures,
        }
    }

    /// Write a snapshot. Waits for any save already in progress.
    pub fn save(&self, snapshot: &Snapshot) -> Result<(), PersistError> {
        let _gate = self.save_gate.lock().unwrap_or_else(PoisonError::into_inner);
        self.write(snapshot)
    }

    /// Scheduled save path: write the store only if it is dirty.
    ///
    /// The dirty flag is cleared before the copy is taken, so draws that race
    /// with the copy dirty the store again. A failed write re-raises the flag
    /// and the next flush retries.
    pub fn flush(&self, store: &CanvasStore) -> Result<Flush, PersistError> {
        let _gate = self.save_gate.lock().unwrap_or_else(PoisonError::into_inner);
        if !store.take_dirty() {
            log::debug!("Canvas clean, skipping save");
            return Ok(Flush::Clean);
        }

        let snapshot = store.read_snapshot();
        match self.write(&snapshot) {
            Ok(()) => Ok(Flush::Saved),
            Err(e) => {
                store.mark_dirty();
                log::error!("Failed to save canvas: {}", e);
                Err(e)
            }
        }
    }

    fn write(&self, snapshot: &Snapshot) -> Result<(), PersistError> {
        let backup = self.keep_backup.then(|| self.backup_path());
        write_atomic(&self.path, &format::encode(snapshot)?, backup.as_deref())?;
        log::info!("Canvas saved to {}", self.path.display());
        Ok(())
    }
}

/// Read and decode a snapshot file
pub fn read_file(path: &Path) -> Result<Decoded, PersistError> {
    let bytes = fs::read(path).map_err(|e| PersistError::io(path, e))?;
    format::decode(&bytes)
}

/// Write to `<path>.tmp`, sync, optionally move the old file to `backup`,
/// then rename the temp file over `path`.
fn write_atomic(path: &Path, bytes: &[u8], backup: Option<&Path>) -> Result<(), PersistError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| PersistError::io(parent, e))?;
    }

    let tmp = with_suffix(path, ".tmp");
    let result = (|| {
        let mut file = File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()
    })();
    if let Err(e) = result {
        let _ = fs::remove_file(&tmp);
        return Err(PersistError::io(&tmp, e));
    }

    if let Some(backup) = backup {
        match fs::rename(path, backup) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => log::warn!("Could not rotate backup {}: {}", backup.display(), e),
        }
    }

    fs::rename(&tmp, path).map_err(|e| PersistError::io(path, e))?;
    sync_parent(path);
    Ok(())
}

/// Persist the rename itself
#[cfg(unix)]
fn sync_parent(path: &Path) {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    if let Err(e) = File::open(parent).and_then(|dir| dir.sync_all()) {
        log::debug!("Could not sync {}: {}", parent.display(), e);
    }
}

#[cfg(not(unix))]
fn sync_parent(_path: &Path) {}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Consistency;

    #[test]
    fn test_save_then_load_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path();
        let manager = PersistenceManager::new(dir.join("map.bin"));
        let mut snap = Snapshot::blank(100, 100);
        snap.colors[505] = 0xFF0000;
        snap.colors[9999] = 0x123456;

        manager.save(&snap).unwrap();
        let loaded = manager.load();
        assert_eq!(loaded.origin, LoadOrigin::Live);
        assert_eq!(loaded.version, Some(FORMAT_VERSION));
        assert_eq!(loaded.snapshot, snap);
        assert!(loaded.failures.is_empty());
        assert!(!dir.join("map.bin.tmp").exists());
    }

    #[test]
    fn test_missing_file_gives_blank_default() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path();
        let loaded = PersistenceManager::new(dir.join("map.bin")).load();
        assert_eq!(loaded.origin, LoadOrigin::Blank);
        assert_eq!(loaded.snapshot, Snapshot::blank(100, 100));
        assert_eq!(loaded.failures.len(), 1);
        assert!(loaded.failures[0].is_not_found());
    }

    #[test]
    fn test_corrupt_file_gives_blank_and_reports() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path();
        let path = dir.join("map.bin");
        fs::write(&path, b"\xAC\xED\x00\x05 definitely not a canvas").unwrap();

        let loaded = PersistenceManager::new(&path).load();
        assert_eq!(loaded.origin, LoadOrigin::Blank);
        assert_eq!((loaded.snapshot.width, loaded.snapshot.height), (100, 100));
        assert!(loaded.snapshot.colors.iter().all(|&c| c == 0));
        assert!(matches!(loaded.failures[0], PersistError::Unrecognized { .. }));
    }

    #[test]
    fn test_corrupt_live_falls_back_to_backup() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path();
        let path = dir.join("map.bin");
        let manager = PersistenceManager::new(&path);

        let mut first = Snapshot::blank(10, 10);
        first.colors[3] = 3;
        manager.save(&first).unwrap();
        let mut second = first.clone();
        second.colors[4] = 4;
        manager.save(&second).unwrap();
        assert!(manager.backup_path().exists());

        // Damage the live file
        let mut bytes = fs::read(&path).unwrap();
        bytes[20] ^= 0xFF;
        fs::write(&path, bytes).unwrap();

        let loaded = manager.load();
        assert_eq!(loaded.origin, LoadOrigin::Backup);
        assert_eq!(loaded.snapshot, first);
        assert!(loaded.needs_rewrite());
        assert!(matches!(loaded.failures[0], PersistError::DigestMismatch));
    }

    #[test]
    fn test_no_backup_when_disabled() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path();
        let manager = PersistenceManager::new(dir.join("map.bin")).with_backup(false);
        manager.save(&Snapshot::blank(2, 2)).unwrap();
        manager.save(&Snapshot::blank(2, 2)).unwrap();
        assert!(!manager.backup_path().exists());
    }

    #[test]
    fn test_legacy_file_loads_and_needs_rewrite() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path();
        let path = dir.join("map.bin");
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&2u32.to_le_bytes());
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.extend_from_slice(&7u32.to_le_bytes());
        bytes.extend_from_slice(&9u32.to_le_bytes());
        fs::write(&path, bytes).unwrap();

        let loaded = PersistenceManager::new(&path).load();
        assert_eq!(loaded.origin, LoadOrigin::Live);
        assert_eq!(loaded.version, Some(0));
        assert_eq!(loaded.snapshot.colors, vec![7, 9]);
        assert!(loaded.needs_rewrite());
    }

    #[test]
    fn test_flush_skips_clean_store() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path();
        let manager = PersistenceManager::new(dir.join("map.bin"));
        let store = CanvasStore::new(10, 10, Consistency::Torn);

        assert_eq!(manager.flush(&store).unwrap(), Flush::Clean);
        assert!(!manager.path().exists());

        store.draw(1, 1, 5);
        assert_eq!(manager.flush(&store).unwrap(), Flush::Saved);
        assert!(!store.is_dirty());
        assert_eq!(read_file(manager.path()).unwrap().snapshot.color_at(1, 1), Some(5));

        // Nothing new since: the file is left alone
        fs::remove_file(manager.path()).unwrap();
        assert_eq!(manager.flush(&store).unwrap(), Flush::Clean);
        assert!(!manager.path().exists());
    }

    #[test]
    fn test_failed_flush_keeps_store_dirty() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path();
        // A regular file where a directory is expected makes every write fail
        let blocker = dir.join("blocker");
        fs::write(&blocker, b"").unwrap();
        let manager = PersistenceManager::new(blocker.join("map.bin"));
        let store = CanvasStore::new(100, 100, Consistency::Exact);

        assert!(store.draw(5, 5, 0xFF0000));
        assert!(manager.flush(&store).is_err());
        assert!(store.is_dirty());
        assert_eq!(store.get_canvas().colors[505], 0xFF0000);
        assert!(store.draw(6, 5, 0x00FF00));
    }

    #[test]
    fn test_concurrent_saves_are_serialized() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path();
        let manager = std::sync::Arc::new(PersistenceManager::new(dir.join("map.bin")));
        let handles: Vec<_> = (0..4u32)
            .map(|i| {
                let manager = manager.clone();
                std::thread::spawn(move || {
                    let mut snap = Snapshot::blank(20, 20);
                    snap.colors.fill(i);
                    for _ in 0..10 {
                        manager.save(&snap).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        // Whatever save landed last, the file is whole
        let decoded = read_file(manager.path()).unwrap();
        let first = decoded.snapshot.colors[0];
        assert!(decoded.snapshot.colors.iter().all(|&c| c == first));
    }

    #[test]
    fn test_save_creates_parent_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("canvas.bin");
        let snap = Snapshot::blank(3, 3);
        PersistenceManager::new(&path).save(&snap).unwrap();
        assert_eq!(read_file(&path).unwrap().snapshot, snap);
    }
}
