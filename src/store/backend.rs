//! # Store Backends
//!
//! A backend may be shared by several processes. Writers serialize on
//! `lock()` and every committed state carries a generation number, so a
//! handle can tell whether someone else committed since it last looked.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, RwLock};

use fs2::FileExt;
use serde::{Deserialize, Serialize};

use super::errors::{StoreError, StoreResult};
use super::tables::Tables;

const FORMAT_VERSION: u32 = 2;

/// Committed tables and the generation that produced them
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub generation: u64,
    pub tables: Tables,
}

/// Durable home for the tables
pub trait StoreBackend: Send + Sync + std::fmt::Debug {
    /// Load the last persisted snapshot (generation 0 when nothing was persisted)
    fn load(&self) -> StoreResult<Snapshot>;

    /// The persisted snapshot, if its generation differs from `generation`
    fn load_if_changed(&self, generation: u64) -> StoreResult<Option<Snapshot>>;

    /// Persist a full committed snapshot. Callers hold `lock()`.
    fn persist(&self, snapshot: &Snapshot) -> StoreResult<()>;

    /// Exclusive writer lock across every handle on this backend
    fn lock(&self) -> StoreResult<WriterLock<'_>>;
}

/// Held for the duration of one transaction; released on drop
#[must_use]
pub struct WriterLock<'a> {
    _guard: Option<MutexGuard<'a, ()>>,
    file: Option<File>,
}

impl<'a> WriterLock<'a> {
    /// Lock that only excludes writers in this process
    pub fn from_guard(guard: MutexGuard<'a, ()>) -> Self {
        Self {
            _guard: Some(guard),
            file: None,
        }
    }

    /// Block until the OS grants an exclusive lock on `file`
    pub fn from_file(file: File) -> StoreResult<Self> {
        file.lock_exclusive()?;
        Ok(Self {
            _guard: None,
            file: Some(file),
        })
    }
}

impl Drop for WriterLock<'_> {
    fn drop(&mut self) {
        if let Some(file) = &self.file {
            // Closing the handle releases it as well.
            let _ = FileExt::unlock(file);
        }
    }
}

/// Backend that keeps the last persisted copy in memory
#[derive(Debug, Default)]
pub struct MemoryBackend {
    persisted: RwLock<Snapshot>,
    writer: Mutex<()>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StoreBackend for MemoryBackend {
    fn load(&self) -> StoreResult<Snapshot> {
        let persisted = self.persisted.read().map_err(|_| StoreError::Poisoned)?;
        Ok(persisted.clone())
    }

    fn load_if_changed(&self, generation: u64) -> StoreResult<Option<Snapshot>> {
        let persisted = self.persisted.read().map_err(|_| StoreError::Poisoned)?;
        if persisted.generation == generation {
            return Ok(None);
        }
        Ok(Some(persisted.clone()))
    }

    fn persist(&self, snapshot: &Snapshot) -> StoreResult<()> {
        let mut persisted = self.persisted.write().map_err(|_| StoreError::Poisoned)?;
        *persisted = snapshot.clone();
        Ok(())
    }

    fn lock(&self) -> StoreResult<WriterLock<'_>> {
        let guard = self.writer.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(WriterLock::from_guard(guard))
    }
}

/// First line of the store file
#[derive(Debug, Serialize, Deserialize)]
struct Header {
    version: u32,
    generation: u64,
    /// CRC32 of the body
    checksum: u32,
}

/// JSON file backend with CRC32 integrity check
///
/// Layout is one header line followed by the tables. Writes go to a
/// sibling temp file, are fsynced, then renamed over the live file so a
/// crash leaves either the old or the new state. Writers across processes
/// serialize on an OS lock held on the sibling `.lock` file.
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        self.path.with_extension("tmp")
    }

    fn lock_path(&self) -> PathBuf {
        self.path.with_extension("lock")
    }

    fn ensure_parent(&self) -> StoreResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }

    /// Header of the live file, `None` when nothing was persisted yet
    fn read_header(&self) -> StoreResult<Option<Header>> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let mut line = String::new();
        BufReader::new(file).read_line(&mut line)?;
        if line.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(parse_header(&line)?))
    }
}

fn parse_header(line: &str) -> StoreResult<Header> {
    let header: Header = serde_json::from_str(line.trim_end())?;
    if header.version != FORMAT_VERSION {
        return Err(StoreError::UnsupportedVersion(header.version));
    }
    Ok(header)
}

impl StoreBackend for FileBackend {
    fn load(&self) -> StoreResult<Snapshot> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Snapshot::default()),
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Ok(Snapshot::default());
        }

        let (first, body) = content
            .split_once('\n')
            .ok_or_else(|| StoreError::Malformed("missing header line".into()))?;
        let header = parse_header(first)?;

        let actual = crc32fast::hash(body.as_bytes());
        if actual != header.checksum {
            return Err(StoreError::Corrupted {
                expected: header.checksum,
                actual,
            });
        }

        Ok(Snapshot {
            generation: header.generation,
            tables: serde_json::from_str(body)?,
        })
    }

    fn load_if_changed(&self, generation: u64) -> StoreResult<Option<Snapshot>> {
        let persisted = self.read_header()?.map(|h| h.generation).unwrap_or(0);
        if persisted == generation {
            return Ok(None);
        }
        Ok(Some(self.load()?))
    }

    fn persist(&self, snapshot: &Snapshot) -> StoreResult<()> {
        let body = serde_json::to_string(&snapshot.tables)?;
        let header = Header {
            version: FORMAT_VERSION,
            generation: snapshot.generation,
            checksum: crc32fast::hash(body.as_bytes()),
        };

        self.ensure_parent()?;
        let temp = self.temp_path();
        {
            let mut file = File::create(&temp)?;
            file.write_all(serde_json::to_string(&header)?.as_bytes())?;
            file.write_all(b"\n")?;
            file.write_all(body.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&temp, &self.path)?;
        Ok(())
    }

    fn lock(&self) -> StoreResult<WriterLock<'_>> {
        self.ensure_parent()?;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(self.lock_path())?;
        WriterLock::from_file(file)
    }
}
