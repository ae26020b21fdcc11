// packages/engine/src/session/store.rs
//! Sticky session persistence
//!
//! The most recently written session is restored on startup when sticky
//! sessions are enabled.

use crate::session::state::{Sampled, Session};
use crate::utils::errors::SessionStorageError;
use async_trait::async_trait;
use parking_lot::Mutex as SyncMutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Persistence for the active session
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Most recently saved session, if any
    async fn load(&self) -> Result<Option<Session>, SessionStorageError>;

    /// Persist `session`, replacing any earlier write of the same id
    async fn save(&self, session: &Session) -> Result<(), SessionStorageError>;

    /// Forget all persisted sessions
    async fn clear(&self) -> Result<(), SessionStorageError>;
}

/// SQLite-backed session store
pub struct SqliteSessionStore {
    db: Arc<Mutex<Connection>>,
}

impl SqliteSessionStore {
    /// Open (or create) the store at `path`
    pub async fn open(path: &Path) -> Result<Self, SessionStorageError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let conn = Connection::open(path)?;
        let store = Self {
            db: Arc::new(Mutex::new(conn)),
        };
        store.init_schema().await?;

        info!("Session store initialized at {:?}", path);

        Ok(store)
    }

    /// Store that lives only as long as this value
    pub async fn open_in_memory() -> Result<Self, SessionStorageError> {
        let store = Self {
            db: Arc::new(Mutex::new(Connection::open_in_memory()?)),
        };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), SessionStorageError> {
        let db = self.db.lock().await;

        db.execute(
            r#"
            CREATE TABLE IF NOT EXISTS replay_sessions (
                id TEXT PRIMARY KEY,
                started INTEGER NOT NULL,
                last_activity INTEGER NOT NULL,
                segment_id INTEGER NOT NULL,
                previous_session_id TEXT,
                sampled TEXT NOT NULL,
                write_seq INTEGER NOT NULL
            )
            "#,
            [],
        )?;

        db.execute(
            "CREATE INDEX IF NOT EXISTS idx_replay_sessions_seq ON replay_sessions(write_seq)",
            [],
        )?;

        Ok(())
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn load(&self) -> Result<Option<Session>, SessionStorageError> {
        let db = self.db.lock().await;

        let row = db
            .query_row(
                r#"
                SELECT id, started, last_activity, segment_id, previous_session_id, sampled
                FROM replay_sessions
                ORDER BY write_seq DESC
                LIMIT 1
                "#,
                [],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, Option<String>>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                },
            )
            .optional()?;

        let Some((id, started, last_activity, segment_id, previous_session_id, sampled)) = row else {
            return Ok(None);
        };

        let sampled = Sampled::parse(&sampled)
            .ok_or_else(|| SessionStorageError::Corrupt(format!("unknown sampling mode '{}'", sampled)))?;
        let segment_id = u32::try_from(segment_id)
            .map_err(|_| SessionStorageError::Corrupt(format!("segment id out of range: {}", segment_id)))?;

        let mut session = Session::create(started.max(0) as u64, sampled, previous_session_id);
        session.id = id;
        session.touch(last_activity.max(0) as u64);
        session.segment_id = segment_id;

        debug!("Loaded session {} at segment {}", session.id, session.segment_id);

        Ok(Some(session))
    }

    async fn save(&self, session: &Session) -> Result<(), SessionStorageError> {
        let db = self.db.lock().await;

        db.execute(
            r#"
            INSERT INTO replay_sessions
                (id, started, last_activity, segment_id, previous_session_id, sampled, write_seq)
            VALUES
                (?1, ?2, ?3, ?4, ?5, ?6, (SELECT COALESCE(MAX(write_seq), 0) + 1 FROM replay_sessions))
            ON CONFLICT(id) DO UPDATE SET
                last_activity = excluded.last_activity,
                segment_id = excluded.segment_id,
                sampled = excluded.sampled,
                write_seq = excluded.write_seq
            "#,
            params![
                session.id,
                session.started as i64,
                session.last_activity as i64,
                session.segment_id as i64,
                session.previous_session_id,
                session.sampled().as_str(),
            ],
        )?;

        Ok(())
    }

    async fn clear(&self) -> Result<(), SessionStorageError> {
        let db = self.db.lock().await;
        db.execute("DELETE FROM replay_sessions", [])?;
        Ok(())
    }
}

/// Process-local session store
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    session: SyncMutex<Option<Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self) -> Result<Option<Session>, SessionStorageError> {
        Ok(self.session.lock().clone())
    }

    async fn save(&self, session: &Session) -> Result<(), SessionStorageError> {
        *self.session.lock() = Some(session.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), SessionStorageError> {
        self.session.lock().take();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_sqlite_store_empty() {
        let store = SqliteSessionStore::open_in_memory().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sqlite_store_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("sessions.db");

        let mut session = Session::create(1_000, Sampled::NotSampled, Some("prev".to_string()));
        session.touch(4_000);
        session.advance_segment();
        session.advance_segment();

        {
            let store = SqliteSessionStore::open(&path).await.unwrap();
            store.save(&session).await.unwrap();
        }

        let reopened = SqliteSessionStore::open(&path).await.unwrap();
        let loaded = reopened.load().await.unwrap().unwrap();
        assert_eq!(loaded, session);
    }

    #[tokio::test]
    async fn test_sqlite_store_returns_latest_write() {
        let store = SqliteSessionStore::open_in_memory().await.unwrap();

        let mut first = Session::create(0, Sampled::Session, None);
        let second = Session::create(10, Sampled::Session, Some(first.id.clone()));

        store.save(&first).await.unwrap();
        store.save(&second).await.unwrap();
        assert_eq!(store.load().await.unwrap().unwrap().id, second.id);

        // Re-saving an older session makes it the latest again
        first.advance_segment();
        store.save(&first).await.unwrap();
        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.id, first.id);
        assert_eq!(loaded.segment_id, 1);
    }

    #[tokio::test]
    async fn test_sqlite_store_clear() {
        let store = SqliteSessionStore::open_in_memory().await.unwrap();
        store.save(&Session::create(0, Sampled::Error, None)).await.unwrap();
        store.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemorySessionStore::new();
        assert!(store.load().await.unwrap().is_none());

        let session = Session::create(5, Sampled::Session, None);
        store.save(&session).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(session));

        store.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
    }
}
