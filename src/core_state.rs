//! Shared application state.
//!
//! `CoreState` is built once at startup and wrapped in `Arc` for the HTTP
//! layer. The SQLite connection sits behind a `std::sync::Mutex`; callers
//! take it in block scope and drop the guard before any `.await`.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use uuid::Uuid;

use crate::config::{self, AppConfig};
use crate::db;
use crate::events::EventBus;
use crate::identity::IdentityProvider;
use crate::storage::{ObjectStore, StorageError};

/// Maximum audit entries kept in memory; older entries are dropped first.
const AUDIT_BUFFER_CAPACITY: usize = 1000;

// ═══════════════════════════════════════════════════════════
// CoreState
// ═══════════════════════════════════════════════════════════

pub struct CoreState {
    config: AppConfig,
    db: Mutex<Connection>,
    identity: IdentityProvider,
    events: EventBus,
    objects: ObjectStore,
    audit: AuditLogger,
    started_at: Instant,
}

impl CoreState {
    /// Open (or create) the on-disk database and object store under
    /// `config.data_dir`.
    pub fn open(config: AppConfig) -> Result<Self, CoreError> {
        std::fs::create_dir_all(&config.data_dir).map_err(StorageError::from)?;
        let conn = db::open_database(&config::database_path(&config.data_dir))?;
        let objects = ObjectStore::open(config::storage_dir(&config.data_dir))?;
        tracing::info!(data_dir = %config.data_dir.display(), "Core state opened");
        Ok(Self::assemble(config, conn, objects))
    }

    /// In-memory database with objects stored under `storage_root`.
    pub fn in_memory(config: AppConfig, storage_root: &Path) -> Result<Self, CoreError> {
        let conn = db::open_memory_database()?;
        let objects = ObjectStore::open(storage_root)?;
        Ok(Self::assemble(config, conn, objects))
    }

    fn assemble(config: AppConfig, conn: Connection, objects: ObjectStore) -> Self {
        Self {
            identity: IdentityProvider::new(config.password_min_len, config.pbkdf2_iterations),
            events: EventBus::new(config.event_capacity),
            db: Mutex::new(conn),
            objects,
            audit: AuditLogger::new(),
            started_at: Instant::now(),
            config,
        }
    }

    // ── Accessors ───────────────────────────────────────────

    /// Lock the shared connection. Hold the guard only in block scope.
    pub fn lock_db(&self) -> Result<MutexGuard<'_, Connection>, CoreError> {
        self.db.lock().map_err(|_| CoreError::LockPoisoned)
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn identity(&self) -> &IdentityProvider {
        &self.identity
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn objects(&self) -> &ObjectStore {
        &self.objects
    }

    pub fn audit(&self) -> &AuditLogger {
        &self.audit
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

// ═══════════════════════════════════════════════════════════
// Error types
// ═══════════════════════════════════════════════════════════

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Internal lock error")]
    LockPoisoned,
    #[error("Database error: {0}")]
    Database(#[from] db::DatabaseError),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

// ═══════════════════════════════════════════════════════════
// Audit logger
// ═══════════════════════════════════════════════════════════

/// Bounded in-memory record of handled requests.
pub struct AuditLogger {
    buffer: Mutex<VecDeque<AuditEntry>>,
}

/// A single audit log entry.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    /// `None` for unauthenticated routes.
    pub identity: Option<Uuid>,
    pub method: String,
    pub path: String,
    pub status: u16,
}

impl AuditLogger {
    pub fn new() -> Self {
        Self {
            buffer: Mutex::new(VecDeque::with_capacity(AUDIT_BUFFER_CAPACITY)),
        }
    }

    pub fn log(&self, identity: Option<Uuid>, method: &str, path: &str, status: u16) {
        if let Ok(mut buf) = self.buffer.lock() {
            if buf.len() >= AUDIT_BUFFER_CAPACITY {
                buf.pop_front();
            }
            buf.push_back(AuditEntry {
                timestamp: Utc::now(),
                identity,
                method: method.to_string(),
                path: path.to_string(),
                status,
            });
        }
    }

    /// Snapshot of buffered entries, oldest first.
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.buffer
            .lock()
            .map(|buf| buf.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn buffer_len(&self) -> usize {
        self.buffer.lock().map(|buf| buf.len()).unwrap_or(0)
    }
}

impl Default for AuditLogger {
    fn default() -> Self {
        Self::new()
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(dir: &Path) -> AppConfig {
        AppConfig {
            data_dir: dir.to_path_buf(),
            pbkdf2_iterations: 1_000,
            ..AppConfig::default()
        }
    }

    #[test]
    fn open_creates_database_and_buckets() {
        let dir = tempfile::tempdir().unwrap();
        let state = CoreState::open(test_config(dir.path())).unwrap();
        assert!(config::database_path(dir.path()).exists());
        assert!(state.objects().root().join("symptom-photos").is_dir());
        let tables = db::count_tables(&state.lock_db().unwrap()).unwrap();
        assert_eq!(tables, 8);
    }

    #[test]
    fn in_memory_state_is_usable() {
        let dir = tempfile::tempdir().unwrap();
        let state = CoreState::in_memory(test_config(dir.path()), dir.path()).unwrap();
        assert_eq!(state.identity().active_session_count(), 0);
        assert_eq!(state.events().subscriber_count(), 0);
        assert_eq!(state.config().pbkdf2_iterations, 1_000);
    }

    #[test]
    fn audit_buffer_is_bounded() {
        let audit = AuditLogger::new();
        for i in 0..(AUDIT_BUFFER_CAPACITY + 5) {
            audit.log(None, "GET", &format!("/api/health/{i}"), 200);
        }
        assert_eq!(audit.buffer_len(), AUDIT_BUFFER_CAPACITY);
        assert_eq!(audit.entries()[0].path, "/api/health/5");
    }
}
