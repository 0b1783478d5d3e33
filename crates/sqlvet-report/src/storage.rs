//! Report storage backends.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::ReportError;
use crate::event::ReportEvent;
use crate::logger::ReportFilter;

/// Trait for report storage backends.
#[async_trait]
pub trait ReportStorage: Send + Sync {
    /// Store a report event.
    async fn store(&self, event: ReportEvent) -> Result<(), ReportError>;

    /// Query report events with filters.
    async fn query(&self, filter: ReportFilter) -> Result<Vec<ReportEvent>, ReportError>;

    /// Count events matching a filter, ignoring its limit and offset.
    async fn count(&self, filter: ReportFilter) -> Result<usize, ReportError> {
        let unbounded = ReportFilter {
            limit: None,
            offset: None,
            ..filter
        };
        Ok(self.query(unbounded).await?.len())
    }

    /// Get a report event by ID.
    async fn get(&self, event_id: Uuid) -> Result<Option<ReportEvent>, ReportError>;
}

/// Console storage (JSON on stdout).
#[derive(Debug, Default)]
pub struct ConsoleStorage;

impl ConsoleStorage {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ReportStorage for ConsoleStorage {
    async fn store(&self, event: ReportEvent) -> Result<(), ReportError> {
        let json = serde_json::to_string(&event)?;
        println!("{json}");
        Ok(())
    }

    async fn query(&self, _filter: ReportFilter) -> Result<Vec<ReportEvent>, ReportError> {
        // Nothing is kept
        Ok(vec![])
    }

    async fn get(&self, _event_id: Uuid) -> Result<Option<ReportEvent>, ReportError> {
        Ok(None)
    }
}

/// JSON Lines file storage.
///
/// Events are appended one per line; queries read the file back, so events
/// written by earlier runs are included.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStorage {
    /// Create a file storage, creating the parent directory if needed.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, ReportError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<Vec<ReportEvent>, ReportError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut events = Vec::new();
        for (idx, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let event = serde_json::from_str(&line).map_err(|e| ReportError::CorruptLine {
                line: idx + 1,
                message: e.to_string(),
            })?;
            events.push(event);
        }
        Ok(events)
    }
}

#[async_trait]
impl ReportStorage for FileStorage {
    async fn store(&self, event: ReportEvent) -> Result<(), ReportError> {
        let json = serde_json::to_string(&event)?;

        let _guard = self
            .write_lock
            .lock()
            .map_err(|e| ReportError::StorageError(format!("Failed to acquire write lock: {e}")))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{json}")?;
        Ok(())
    }

    async fn query(&self, filter: ReportFilter) -> Result<Vec<ReportEvent>, ReportError> {
        Ok(filter.apply(self.read_all()?))
    }

    async fn get(&self, event_id: Uuid) -> Result<Option<ReportEvent>, ReportError> {
        Ok(self
            .read_all()?
            .into_iter()
            .find(|e| e.event_id == event_id))
    }
}

/// File storage that also echoes every event to the console.
#[derive(Debug)]
pub struct DualStorage {
    file: FileStorage,
    console: ConsoleStorage,
}

impl DualStorage {
    pub fn new(path: impl AsRef<Path>) -> Result<Self, ReportError> {
        Ok(Self {
            file: FileStorage::new(path)?,
            console: ConsoleStorage::new(),
        })
    }
}

#[async_trait]
impl ReportStorage for DualStorage {
    async fn store(&self, event: ReportEvent) -> Result<(), ReportError> {
        self.console.store(event.clone()).await?;
        self.file.store(event).await
    }

    async fn query(&self, filter: ReportFilter) -> Result<Vec<ReportEvent>, ReportError> {
        self.file.query(filter).await
    }

    async fn get(&self, event_id: Uuid) -> Result<Option<ReportEvent>, ReportError> {
        self.file.get(event_id).await
    }
}

/// Storage that drops everything.
#[derive(Debug, Default)]
pub struct NullStorage;

impl NullStorage {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ReportStorage for NullStorage {
    async fn store(&self, _event: ReportEvent) -> Result<(), ReportError> {
        Ok(())
    }

    async fn query(&self, _filter: ReportFilter) -> Result<Vec<ReportEvent>, ReportError> {
        Ok(vec![])
    }

    async fn get(&self, _event_id: Uuid) -> Result<Option<ReportEvent>, ReportError> {
        Ok(None)
    }
}
