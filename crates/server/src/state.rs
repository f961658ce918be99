use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;
use store::{MemDb, SignatureFile};

/// Shared application state.
///
/// The image array, user-ID map, bucket index, and ID generator all live
/// inside the one [`MemDb`] value, so the single reader-writer lock covers
/// the whole consistent unit: writers (add/remove) take exclusive access,
/// queries and lookups share it. The persistence file has its own mutex; it
/// is only touched after the corresponding in-memory mutation succeeded.
pub struct ServerState {
    /// Server configuration
    pub config: Arc<ServerConfig>,

    /// The in-memory database (shared across requests)
    db: RwLock<MemDb>,

    /// Optional signature file backing the database
    file: Mutex<Option<SignatureFile>>,

    /// Process start, for uptime reporting
    pub started_at: Instant,
}

impl ServerState {
    /// Create new server state, rehydrating from the signature file when one
    /// is configured.
    pub fn new(config: ServerConfig) -> ServerResult<Self> {
        let (db, file) = match config.db_path.as_deref() {
            Some(path) => {
                let file = SignatureFile::open(path)?;
                let db = MemDb::from_file(&file)?;
                tracing::info!("Loaded {} signatures from {}", db.num_images(), path);
                (db, Some(file))
            }
            None => (MemDb::new(), None),
        };

        Ok(Self {
            config: Arc::new(config),
            db: RwLock::new(db),
            file: Mutex::new(file),
            started_at: Instant::now(),
        })
    }

    /// Shared read access to the database.
    pub fn read_db(&self) -> ServerResult<RwLockReadGuard<'_, MemDb>> {
        self.db
            .read()
            .map_err(|_| ServerError::Internal("database lock poisoned".to_string()))
    }

    /// Exclusive write access to the database.
    pub fn write_db(&self) -> ServerResult<RwLockWriteGuard<'_, MemDb>> {
        self.db
            .write()
            .map_err(|_| ServerError::Internal("database lock poisoned".to_string()))
    }

    /// Access to the optional signature file.
    pub fn file(&self) -> ServerResult<MutexGuard<'_, Option<SignatureFile>>> {
        self.file
            .lock()
            .map_err(|_| ServerError::Internal("signature file lock poisoned".to_string()))
    }

    /// Flush pending persistence changes, if a file is configured and dirty.
    pub fn flush(&self) -> ServerResult<usize> {
        let mut guard = self.file()?;
        match guard.as_mut() {
            Some(file) => {
                if file.dirty() {
                    file.save()?;
                }
                Ok(file.len())
            }
            None => Err(ServerError::BadRequest(
                "no database file configured".to_string(),
            )),
        }
    }
}

/// Server metadata for health checks
#[derive(Debug, serde::Serialize)]
pub struct ServerMetadata {
    pub version: String,
    pub uptime_seconds: u64,
}
