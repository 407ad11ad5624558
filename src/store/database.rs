//! # Database
//!
//! One physical store, one writer at a time across every process sharing
//! the backend. A transaction takes the backend's writer lock, catches up
//! with whatever another handle committed, runs against a working copy of
//! the tables and is published only if the closure succeeds and the
//! backend persisted the copy. Any failure leaves the committed state
//! exactly as it was.

use std::sync::{Arc, RwLock};

use crate::errors::{EngineError, EngineResult};
use crate::observability::{LogEvent, Logger};

use super::backend::{MemoryBackend, Snapshot, StoreBackend};
use super::errors::{StoreError, StoreResult};
use super::tables::Tables;

#[derive(Debug)]
pub struct Database {
    committed: RwLock<Snapshot>,
    backend: Arc<dyn StoreBackend>,
}

impl Database {
    /// Open a database over a backend, loading its persisted state
    pub fn open(backend: Arc<dyn StoreBackend>) -> StoreResult<Self> {
        let snapshot = backend.load()?;
        let events = snapshot.tables.events.len().to_string();
        let reports = snapshot.tables.reports.len().to_string();
        let generation = snapshot.generation.to_string();
        Logger::info(
            LogEvent::StoreOpened,
            &[
                ("events", events.as_str()),
                ("generation", generation.as_str()),
                ("reports", reports.as_str()),
            ],
        );
        Ok(Self {
            committed: RwLock::new(snapshot),
            backend,
        })
    }

    /// Fresh in-memory database
    pub fn in_memory() -> Self {
        Self {
            committed: RwLock::new(Snapshot::default()),
            backend: Arc::new(MemoryBackend::new()),
        }
    }

    /// Generation of the locally committed state
    pub fn generation(&self) -> EngineResult<u64> {
        let committed = self
            .committed
            .read()
            .map_err(|_| EngineError::from(StoreError::Poisoned))?;
        Ok(committed.generation)
    }

    /// Run `f` as one all-or-nothing unit of work
    pub fn transaction<T, F>(&self, f: F) -> EngineResult<T>
    where
        F: FnOnce(&mut Tables) -> EngineResult<T>,
    {
        let mut committed = self
            .committed
            .write()
            .map_err(|_| EngineError::from(StoreError::Poisoned))?;
        let _writer = self.backend.lock()?;

        if let Some(fresh) = self.backend.load_if_changed(committed.generation)? {
            log_reload(committed.generation, fresh.generation);
            *committed = fresh;
        }

        let mut working = committed.tables.clone();
        let out = f(&mut working)?;

        let next = Snapshot {
            generation: committed.generation + 1,
            tables: working,
        };
        if let Err(e) = self.backend.persist(&next) {
            let message = e.to_string();
            Logger::error(LogEvent::StoreCommitFailed, &[("error", message.as_str())]);
            return Err(e.into());
        }

        *committed = next;
        Ok(out)
    }

    /// Read against the committed state, catching up with other writers first
    pub fn read<T, F>(&self, f: F) -> EngineResult<T>
    where
        F: FnOnce(&Tables) -> EngineResult<T>,
    {
        self.refresh()?;
        let committed = self
            .committed
            .read()
            .map_err(|_| EngineError::from(StoreError::Poisoned))?;
        f(&committed.tables)
    }

    fn refresh(&self) -> EngineResult<()> {
        let known = self.generation()?;
        let Some(fresh) = self.backend.load_if_changed(known)? else {
            return Ok(());
        };

        let mut committed = self
            .committed
            .write()
            .map_err(|_| EngineError::from(StoreError::Poisoned))?;
        // A local commit may have overtaken the file we just read.
        if fresh.generation > committed.generation {
            log_reload(committed.generation, fresh.generation);
            *committed = fresh;
        }
        Ok(())
    }
}

fn log_reload(from: u64, to: u64) {
    let from = from.to_string();
    let to = to.to_string();
    Logger::trace(
        LogEvent::StoreReloaded,
        &[("from_generation", from.as_str()), ("to_generation", to.as_str())],
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::{Mutex, MutexGuard};

    use tempfile::TempDir;

    use crate::store::{FileBackend, WriterLock};

    #[derive(Debug, Default)]
    struct FailingBackend {
        writer: Mutex<()>,
    }

    impl StoreBackend for FailingBackend {
        fn load(&self) -> StoreResult<Snapshot> {
            Ok(Snapshot::default())
        }

        fn load_if_changed(&self, _generation: u64) -> StoreResult<Option<Snapshot>> {
            Ok(None)
        }

        fn persist(&self, _snapshot: &Snapshot) -> StoreResult<()> {
            Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk full",
            )))
        }

        fn lock(&self) -> StoreResult<WriterLock<'_>> {
            let guard: MutexGuard<'_, ()> = self.writer.lock().map_err(|_| StoreError::Poisoned)?;
            Ok(WriterLock::from_guard(guard))
        }
    }

    fn shared_file() -> (TempDir, Database, Database) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tw.db");
        let a = Database::open(Arc::new(FileBackend::new(&path))).unwrap();
        let b = Database::open(Arc::new(FileBackend::new(&path))).unwrap();
        (dir, a, b)
    }

    #[test]
    fn test_commit_publishes_changes() {
        let db = Database::in_memory();
        let seq = db.transaction(|t| Ok(t.next_seq())).unwrap();
        assert_eq!(seq, 1);
        assert_eq!(db.read(|t| Ok(t.sequence)).unwrap(), 1);
    }

    #[test]
    fn test_closure_error_discards_working_copy() {
        let db = Database::in_memory();
        let result: EngineResult<()> = db.transaction(|t| {
            t.next_seq();
            Err(EngineError::invalid_input("nope"))
        });
        assert!(result.is_err());
        assert_eq!(db.read(|t| Ok(t.sequence)).unwrap(), 0);
    }

    #[test]
    fn test_persist_failure_is_retryable_and_discards() {
        let db = Database::open(Arc::new(FailingBackend::default())).unwrap();
        let err = db.transaction(|t| Ok(t.next_seq())).unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(db.read(|t| Ok(t.sequence)).unwrap(), 0);
        assert_eq!(db.generation().unwrap(), 0);
    }

    #[test]
    fn test_writers_on_one_file_build_on_each_other() {
        let (_dir, a, b) = shared_file();

        assert_eq!(a.transaction(|t| Ok(t.next_seq())).unwrap(), 1);
        // b opened before a committed and must not reuse its sequence number
        assert_eq!(b.transaction(|t| Ok(t.next_seq())).unwrap(), 2);
        assert_eq!(a.transaction(|t| Ok(t.next_seq())).unwrap(), 3);

        assert_eq!(a.generation().unwrap(), 3);
        assert_eq!(b.read(|t| Ok(t.sequence)).unwrap(), 3);
    }

    #[test]
    fn test_reads_see_commits_from_another_handle() {
        let (_dir, a, b) = shared_file();
        assert_eq!(b.read(|t| Ok(t.sequence)).unwrap(), 0);

        a.transaction(|t| Ok(t.next_seq())).unwrap();
        assert_eq!(b.read(|t| Ok(t.sequence)).unwrap(), 1);
        assert_eq!(b.generation().unwrap(), 1);
    }

    #[test]
    fn test_racing_handles_lose_no_commit() {
        let (_dir, a, b) = shared_file();
        let (a, b) = (Arc::new(a), Arc::new(b));

        let handles: Vec<_> = [a, b]
            .into_iter()
            .map(|db| {
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        db.transaction(|t| Ok(t.next_seq())).unwrap();
                    }
                    db
                })
            })
            .collect();
        let dbs: Vec<Arc<Database>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        for db in &dbs {
            assert_eq!(db.read(|t| Ok(t.sequence)).unwrap(), 50);
        }
    }
}
