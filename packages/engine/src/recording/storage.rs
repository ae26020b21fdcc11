// packages/engine/src/recording/storage.rs
//! Segment storage using SQLite + file system
//!
//! Stores segment metadata in SQLite and segment payloads in files. Serves as
//! the transport when replays are kept locally.

use crate::recording::event::RecordingData;
use crate::replay::transport::{ReplayTransport, SendReplayData};
use crate::utils::errors::{ReplayError, Result, TransportError};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Storage configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Base directory for storage
    pub base_dir: PathBuf,

    /// SQLite database file name
    pub db_name: String,

    /// Segments directory name
    pub segments_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from(".replay"),
            db_name: "replay.db".to_string(),
            segments_dir: "segments".to_string(),
        }
    }
}

impl StorageConfig {
    pub fn db_path(&self) -> PathBuf {
        self.base_dir.join(&self.db_name)
    }
}

/// Transport that writes segments to disk
pub struct StorageTransport {
    config: StorageConfig,
    db: Arc<Mutex<Connection>>,
}

impl StorageTransport {
    /// Create directories and open the metadata database
    pub async fn new(config: StorageConfig) -> Result<Self> {
        let segments_dir = config.base_dir.join(&config.segments_dir);
        fs::create_dir_all(&segments_dir).await.map_err(|e| {
            ReplayError::StorageFailed(format!("Failed to create segments directory: {}", e))
        })?;

        let conn = Connection::open(config.db_path())
            .map_err(|e| ReplayError::StorageFailed(format!("Failed to open database: {}", e)))?;

        let storage = Self {
            config,
            db: Arc::new(Mutex::new(conn)),
        };

        storage.init_schema().await?;

        info!("Segment storage initialized at {:?}", storage.config.base_dir);

        Ok(storage)
    }

    async fn init_schema(&self) -> Result<()> {
        let db = self.db.lock().await;

        db.execute(
            r#"
            CREATE TABLE IF NOT EXISTS replay_segments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                replay_id TEXT NOT NULL,
                segment_id INTEGER NOT NULL,
                file_path TEXT NOT NULL,
                compressed INTEGER NOT NULL,
                size_bytes INTEGER NOT NULL,
                error_ids TEXT NOT NULL,
                trace_ids TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                UNIQUE (replay_id, segment_id)
            )
            "#,
            [],
        )
        .map_err(|e| ReplayError::StorageFailed(format!("Schema creation failed: {}", e)))?;

        db.execute(
            "CREATE INDEX IF NOT EXISTS idx_replay_segments_replay ON replay_segments(replay_id)",
            [],
        )
        .map_err(|e| ReplayError::StorageFailed(format!("Index creation failed: {}", e)))?;

        Ok(())
    }

    /// Write one segment and record its metadata
    pub async fn write_segment(&self, data: &SendReplayData) -> Result<PathBuf> {
        let file_path = self
            .config
            .base_dir
            .join(&self.config.segments_dir)
            .join(format!(
                "{}-{}.{}",
                data.replay_id,
                data.segment_id,
                data.recording_data.extension()
            ));

        let payload = data.recording_data.as_bytes();
        fs::write(&file_path, payload).await.map_err(|e| {
            ReplayError::StorageFailed(format!("Failed to write segment file: {}", e))
        })?;

        let error_ids = serde_json::to_string(&data.event_context.error_ids)
            .map_err(|e| ReplayError::StorageFailed(format!("Failed to encode error ids: {}", e)))?;
        let trace_ids = serde_json::to_string(&data.event_context.trace_ids)
            .map_err(|e| ReplayError::StorageFailed(format!("Failed to encode trace ids: {}", e)))?;

        let db = self.db.lock().await;
        db.execute(
            r#"
            INSERT OR REPLACE INTO replay_segments
                (replay_id, segment_id, file_path, compressed, size_bytes, error_ids, trace_ids, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                data.replay_id,
                data.segment_id as i64,
                file_path.to_string_lossy(),
                data.recording_data.is_compressed(),
                payload.len() as i64,
                error_ids,
                trace_ids,
                chrono::Utc::now().timestamp_millis(),
            ],
        )
        .map_err(|e| {
            ReplayError::StorageFailed(format!("Failed to record segment metadata: {}", e))
        })?;

        debug!(
            "Wrote segment {}#{} ({} bytes)",
            data.replay_id,
            data.segment_id,
            payload.len()
        );

        Ok(file_path)
    }

    /// Read a stored segment payload
    pub async fn read_segment(&self, replay_id: &str, segment_id: u32) -> Result<Option<RecordingData>> {
        let db = self.db.lock().await;
        let row: Option<(String, bool)> = db
            .query_row(
                "SELECT file_path, compressed FROM replay_segments WHERE replay_id = ? AND segment_id = ?",
                params![replay_id, segment_id as i64],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(|e| ReplayError::StorageFailed(format!("Segment lookup failed: {}", e)))?;

        drop(db);

        let Some((file_path, compressed)) = row else {
            return Ok(None);
        };

        let bytes = fs::read(&file_path).await.map_err(|e| {
            ReplayError::StorageFailed(format!("Failed to read segment file: {}", e))
        })?;

        let data = if compressed {
            RecordingData::Compressed(bytes.into())
        } else {
            RecordingData::Raw(String::from_utf8(bytes).map_err(|e| {
                ReplayError::StorageFailed(format!("Segment file is not UTF-8: {}", e))
            })?)
        };

        Ok(Some(data))
    }

    /// Segments stored for a replay, in segment order
    pub async fn list_segments(&self, replay_id: &str) -> Result<Vec<SegmentMetadata>> {
        let db = self.db.lock().await;

        let mut stmt = db
            .prepare(
                r#"
                SELECT replay_id, segment_id, size_bytes, compressed, error_ids, trace_ids, created_at
                FROM replay_segments
                WHERE replay_id = ?
                ORDER BY segment_id
                "#,
            )
            .map_err(|e| ReplayError::StorageFailed(format!("Query preparation failed: {}", e)))?;

        let rows = stmt
            .query_map(params![replay_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, bool>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, i64>(6)?,
                ))
            })
            .map_err(|e| ReplayError::StorageFailed(format!("Query execution failed: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| ReplayError::StorageFailed(format!("Result collection failed: {}", e)))?;

        rows.into_iter()
            .map(
                |(replay_id, segment_id, size_bytes, compressed, error_ids, trace_ids, created_at)| {
                    Ok(SegmentMetadata {
                        replay_id,
                        segment_id: segment_id as u32,
                        size_bytes: size_bytes as u64,
                        compressed,
                        error_ids: decode_ids(&error_ids)?,
                        trace_ids: decode_ids(&trace_ids)?,
                        created_at,
                    })
                },
            )
            .collect()
    }

    /// Get storage statistics
    pub async fn stats(&self) -> Result<StorageStats> {
        let db = self.db.lock().await;

        let (total_segments, total_size): (i64, i64) = db
            .query_row(
                "SELECT COUNT(*), COALESCE(SUM(size_bytes), 0) FROM replay_segments",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map_err(|e| ReplayError::StorageFailed(format!("Stats query failed: {}", e)))?;

        Ok(StorageStats {
            total_segments: total_segments as u64,
            total_size_bytes: total_size as u64,
        })
    }
}

fn decode_ids(json: &str) -> Result<Vec<String>> {
    serde_json::from_str(json)
        .map_err(|e| ReplayError::StorageFailed(format!("Corrupt id list: {}", e)))
}

#[async_trait]
impl ReplayTransport for StorageTransport {
    async fn send_replay(&self, data: SendReplayData) -> std::result::Result<(), TransportError> {
        self.write_segment(&data)
            .await
            .map(|_| ())
            .map_err(|e| TransportError::Delivery(e.to_string()))
    }
}

/// Segment metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentMetadata {
    pub replay_id: String,
    pub segment_id: u32,
    pub size_bytes: u64,
    pub compressed: bool,
    pub error_ids: Vec<String>,
    pub trace_ids: Vec<String>,
    pub created_at: i64,
}

/// Storage statistics
#[derive(Debug, Clone)]
pub struct StorageStats {
    pub total_segments: u64,
    pub total_size_bytes: u64,
}
