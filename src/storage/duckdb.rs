use super::traits::{NewRunRecord, RunRecord, RunStatus, RunType, Store, StorageError, NO_WATERMARK};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use duckdb::Connection;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Tables wiped by [`Store::reset_except_config`].
const RESETTABLE_TABLES: &[&str] = &["last_messages", "run_history", "login_codes"];

/// Check if a process with the given PID is still running
fn is_process_running(pid: u32) -> bool {
    #[cfg(unix)]
    {
        use std::process::Command;
        Command::new("ps")
            .arg("-p")
            .arg(pid.to_string())
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false)
    }
    #[cfg(not(unix))]
    {
        let _ = pid;
        true
    }
}

/// Extract PID from DuckDB lock error message: "... (PID 12345) ..."
fn extract_pid_from_lock_error(error_msg: &str) -> Option<u32> {
    let start = error_msg.find("(PID ")? + 5;
    let end = error_msg[start..].find(')')?;
    error_msg[start..start + end].parse().ok()
}

fn remove_lock_files(db_path: &Path) -> std::io::Result<()> {
    for suffix in ["wal", "lock"] {
        let path = PathBuf::from(format!("{}.{}", db_path.display(), suffix));
        if path.exists() {
            std::fs::remove_file(&path)?;
            tracing::info!(path = %path.display(), "Removed stale database file");
        }
    }
    Ok(())
}

fn micros_to_datetime(micros: i64) -> Result<DateTime<Utc>, StorageError> {
    DateTime::from_timestamp_micros(micros)
        .ok_or_else(|| StorageError::InvalidData(format!("invalid timestamp: {}", micros)))
}

type RawRunRow = (i64, String, String, String, i64);

fn run_record_from_row(row: RawRunRow) -> Result<RunRecord, StorageError> {
    let (id, status, run_type, message, created_at) = row;
    Ok(RunRecord {
        id,
        status: RunStatus::parse(&status)?,
        run_type: RunType::parse(&run_type)?,
        message,
        created_at: micros_to_datetime(created_at)?,
    })
}

/// DuckDB implementation of the [`Store`] trait
pub struct DuckDbStorage {
    conn: Arc<Mutex<Connection>>,
}

impl DuckDbStorage {
    /// Open (or create) the database file at `path`.
    ///
    /// A lock left behind by a dead process is cleared and the open retried once.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StorageError::Database(format!(
                        "failed to create directory '{}': {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        match Connection::open(path) {
            Ok(conn) => Ok(Self::from_connection(conn)),
            Err(e) => {
                let error_msg = e.to_string();
                if !error_msg.contains("Could not set lock") {
                    return Err(e.into());
                }

                tracing::warn!("Database lock detected: {}", error_msg);
                let Some(pid) = extract_pid_from_lock_error(&error_msg) else {
                    return Err(e.into());
                };

                if is_process_running(pid) {
                    tracing::error!(pid, "Database is locked by a running process");
                    return Err(e.into());
                }

                tracing::warn!(pid, "Lock holder is gone, removing stale lock files");
                remove_lock_files(path).map_err(|io_err| {
                    StorageError::Database(format!("failed to remove lock files: {}", io_err))
                })?;

                let conn = Connection::open(path)?;
                Ok(Self::from_connection(conn))
            }
        }
    }

    /// Create an in-memory DuckDB storage instance (for testing)
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Runs `f` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, StorageError> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|_| StorageError::Database("connection mutex poisoned".to_string()))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StorageError::Database(format!("Task join error: {}", e)))?
    }
}

#[async_trait]
impl Store for DuckDbStorage {
    async fn init_schema(&self) -> Result<(), StorageError> {
        self.with_conn(|conn| {
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS config (
                    key VARCHAR PRIMARY KEY,
                    value VARCHAR NOT NULL,
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT current_timestamp
                );

                CREATE TABLE IF NOT EXISTS last_messages (
                    channel_id VARCHAR PRIMARY KEY,
                    last_message_id BIGINT NOT NULL,
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT current_timestamp
                );

                CREATE SEQUENCE IF NOT EXISTS run_history_id_seq START 1;

                CREATE TABLE IF NOT EXISTS run_history (
                    id BIGINT PRIMARY KEY DEFAULT nextval('run_history_id_seq'),
                    status VARCHAR NOT NULL,
                    run_type VARCHAR NOT NULL,
                    message VARCHAR NOT NULL,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT current_timestamp
                );

                CREATE INDEX IF NOT EXISTS idx_run_history_type ON run_history(run_type);

                CREATE TABLE IF NOT EXISTS login_codes (
                    hash_value VARCHAR NOT NULL,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT current_timestamp
                );",
            )?;
            tracing::info!("Database schema initialized");
            Ok(())
        })
        .await
    }

    async fn config_entries(&self) -> Result<HashMap<String, String>, StorageError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT key, value FROM config")?;
            let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;

            let mut entries = HashMap::new();
            for row in rows {
                let (key, value) = row?;
                entries.insert(key, value);
            }
            Ok(entries)
        })
        .await
    }

    async fn set_config(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let entries = vec![(key.to_string(), value.to_string())];
        self.replace_config(&entries).await
    }

    async fn replace_config(&self, entries: &[(String, String)]) -> Result<(), StorageError> {
        if entries.is_empty() {
            return Ok(());
        }

        let entries = entries.to_vec();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO config (key, value, updated_at) VALUES (?, ?, current_timestamp)
                     ON CONFLICT (key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                )?;
                for (key, value) in &entries {
                    stmt.execute(duckdb::params![key, value])?;
                }
            }
            tx.commit()?;

            let keys: Vec<&str> = entries.iter().map(|(k, _)| k.as_str()).collect();
            tracing::info!(keys = %keys.join(", "), "Updated config");
            Ok(())
        })
        .await
    }

    async fn is_config_empty(&self) -> Result<bool, StorageError> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM config", [], |row| row.get(0))?;
            Ok(count == 0)
        })
        .await
    }

    async fn get_watermark(&self, channel: &str) -> Result<i64, StorageError> {
        let channel = channel.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare("SELECT last_message_id FROM last_messages WHERE channel_id = ?")?;
            let mut rows = stmt.query(duckdb::params![channel])?;
            match rows.next()? {
                Some(row) => Ok(row.get::<_, i64>(0)?),
                None => Ok(NO_WATERMARK),
            }
        })
        .await
    }

    async fn set_watermark(&self, channel: &str, message_id: i64) -> Result<(), StorageError> {
        let channel = channel.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO last_messages (channel_id, last_message_id, updated_at)
                 VALUES (?, ?, current_timestamp)
                 ON CONFLICT (channel_id) DO UPDATE SET
                     last_message_id = greatest(last_messages.last_message_id, excluded.last_message_id),
                     updated_at = excluded.updated_at",
                duckdb::params![channel, message_id],
            )?;
            tracing::info!(channel = %channel, message_id, "Updated channel watermark");
            Ok(())
        })
        .await
    }

    async fn append_run_record(&self, record: &NewRunRecord) -> Result<(), StorageError> {
        let record = record.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO run_history (status, run_type, message) VALUES (?, ?, ?)",
                duckdb::params![record.status.as_str(), record.run_type.as_str(), record.message],
            )?;
            tracing::debug!(status = record.status.as_str(), run_type = %record.run_type, "Added run history entry");
            Ok(())
        })
        .await
    }

    async fn run_history(&self, limit: usize) -> Result<Vec<RunRecord>, StorageError> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, status, run_type, message, epoch_us(created_at)
                 FROM run_history
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?",
            )?;
            let rows = stmt.query_map(duckdb::params![limit as i64], |row| {
                let raw: RawRunRow = (row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?);
                Ok(raw)
            })?;

            let mut records = Vec::new();
            for row in rows {
                records.push(run_record_from_row(row?)?);
            }
            Ok(records)
        })
        .await
    }

    async fn last_run_by_type(&self, run_type: RunType) -> Result<Option<RunRecord>, StorageError> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, status, run_type, message, epoch_us(created_at)
                 FROM run_history
                 WHERE run_type = ?
                 ORDER BY created_at DESC, id DESC
                 LIMIT 1",
            )?;
            let mut rows = stmt.query(duckdb::params![run_type.as_str()])?;
            match rows.next()? {
                Some(row) => {
                    let raw: RawRunRow = (row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?);
                    Ok(Some(run_record_from_row(raw)?))
                }
                None => Ok(None),
            }
        })
        .await
    }

    async fn now(&self) -> Result<DateTime<Utc>, StorageError> {
        self.with_conn(|conn| {
            let micros: i64 = conn.query_row("SELECT epoch_us(current_timestamp)", [], |row| row.get(0))?;
            micros_to_datetime(micros)
        })
        .await
    }

    async fn reset_except_config(&self) -> Result<(), StorageError> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            for table in RESETTABLE_TABLES {
                tx.execute(&format!("DELETE FROM {}", table), [])?;
            }
            tx.commit()?;
            tracing::info!("Database reset completed (config kept)");
            Ok(())
        })
        .await
    }

    async fn save_login_code_hash(&self, hash: &str) -> Result<(), StorageError> {
        let hash = hash.to_string();
        self.with_conn(move |conn| {
            conn.execute("INSERT INTO login_codes (hash_value) VALUES (?)", duckdb::params![hash])?;
            tracing::info!("Login code hash saved");
            Ok(())
        })
        .await
    }

    async fn login_code_hash(&self) -> Result<Option<String>, StorageError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT hash_value FROM login_codes ORDER BY created_at DESC LIMIT 1")?;
            let mut rows = stmt.query([])?;
            match rows.next()? {
                Some(row) => Ok(Some(row.get(0)?)),
                None => Ok(None),
            }
        })
        .await
    }

    async fn clear_login_code_hash(&self) -> Result<(), StorageError> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM login_codes", [])?;
            tracing::info!("Login code hashes cleared");
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup_storage() -> DuckDbStorage {
        let storage = DuckDbStorage::in_memory().unwrap();
        storage.init_schema().await.unwrap();
        storage
    }

    #[tokio::test]
    async fn test_schema_initialization_is_idempotent() {
        let storage = setup_storage().await;
        storage.init_schema().await.unwrap();
        assert!(storage.is_config_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_config_upsert() {
        let storage = setup_storage().await;

        storage.set_config("add_fee", "20").await.unwrap();
        storage.set_config("add_fee", "35").await.unwrap();
        storage.set_config("target_channel", "\"@out\"").await.unwrap();

        let entries = storage.config_entries().await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries["add_fee"], "35");
        assert_eq!(entries["target_channel"], "\"@out\"");
        assert!(!storage.is_config_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_replace_config_writes_all_rows() {
        let storage = setup_storage().await;
        let entries = vec![
            ("is_active".to_string(), "false".to_string()),
            ("interval_minutes".to_string(), "15".to_string()),
            ("source_channels".to_string(), "[\"@a\",\"@b\"]".to_string()),
        ];

        storage.replace_config(&entries).await.unwrap();

        let config = storage.get_config().await.unwrap();
        assert!(!config.settings.is_active);
        assert_eq!(config.settings.interval_minutes, 15);
        assert_eq!(config.settings.source_channels, vec!["@a", "@b"]);
    }

    #[tokio::test]
    async fn test_watermark_defaults_to_sentinel() {
        let storage = setup_storage().await;
        assert_eq!(storage.get_watermark("@never").await.unwrap(), NO_WATERMARK);
    }

    #[tokio::test]
    async fn test_watermark_never_decreases() {
        let storage = setup_storage().await;

        storage.set_watermark("@shop", 40).await.unwrap();
        assert_eq!(storage.get_watermark("@shop").await.unwrap(), 40);

        storage.set_watermark("@shop", 12).await.unwrap();
        assert_eq!(storage.get_watermark("@shop").await.unwrap(), 40);

        storage.set_watermark("@shop", 41).await.unwrap();
        assert_eq!(storage.get_watermark("@shop").await.unwrap(), 41);

        // Other channels are independent
        assert_eq!(storage.get_watermark("@other").await.unwrap(), NO_WATERMARK);
    }

    #[tokio::test]
    async fn test_run_history_order_and_limit() {
        let storage = setup_storage().await;

        for i in 0..5 {
            storage
                .append_run_record(&NewRunRecord::success(RunType::Process, format!("run {}", i)))
                .await
                .unwrap();
        }

        let history = storage.run_history(3).await.unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].message, "run 4");
        assert_eq!(history[1].message, "run 3");
        assert_eq!(history[2].message, "run 2");
        assert!(history.iter().all(|r| r.status == RunStatus::Success));
    }

    #[tokio::test]
    async fn test_last_run_by_type() {
        let storage = setup_storage().await;
        assert!(storage.last_run_by_type(RunType::Process).await.unwrap().is_none());

        storage
            .append_run_record(&NewRunRecord::success(RunType::Process, "first"))
            .await
            .unwrap();
        storage
            .append_run_record(&NewRunRecord::error(RunType::Info, "failed"))
            .await
            .unwrap();

        let last = storage.last_run_by_type(RunType::Process).await.unwrap().unwrap();
        assert_eq!(last.message, "first");
        assert_eq!(last.run_type, RunType::Process);

        let info = storage.last_run_by_type(RunType::Info).await.unwrap().unwrap();
        assert_eq!(info.status, RunStatus::Error);
    }

    #[tokio::test]
    async fn test_now_tracks_record_timestamps() {
        let storage = setup_storage().await;
        storage
            .append_run_record(&NewRunRecord::success(RunType::Process, "done"))
            .await
            .unwrap();

        let record = storage.last_run_by_type(RunType::Process).await.unwrap().unwrap();
        let now = storage.now().await.unwrap();
        assert!(now >= record.created_at);
        assert!(now - record.created_at < chrono::Duration::minutes(1));
    }

    #[tokio::test]
    async fn test_reset_keeps_config_identical() {
        let storage = setup_storage().await;
        storage.set_config("add_fee", "20").await.unwrap();
        storage.set_config("phone_number", "\"+905551112233\"").await.unwrap();
        let before = storage.config_entries().await.unwrap();

        storage.set_watermark("@shop", 99).await.unwrap();
        storage
            .append_run_record(&NewRunRecord::success(RunType::Process, "done"))
            .await
            .unwrap();
        storage.save_login_code_hash("abc").await.unwrap();

        storage.reset_except_config().await.unwrap();

        assert_eq!(storage.config_entries().await.unwrap(), before);
        assert_eq!(storage.get_watermark("@shop").await.unwrap(), NO_WATERMARK);
        assert!(storage.run_history(10).await.unwrap().is_empty());
        assert!(storage.login_code_hash().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_login_code_hash_lifecycle() {
        let storage = setup_storage().await;
        assert!(storage.login_code_hash().await.unwrap().is_none());

        storage.save_login_code_hash("hash-1").await.unwrap();
        assert_eq!(storage.login_code_hash().await.unwrap().as_deref(), Some("hash-1"));

        storage.clear_login_code_hash().await.unwrap();
        assert!(storage.login_code_hash().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_backed_storage_persists() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("relay.duckdb");

        {
            let storage = DuckDbStorage::new(&path).unwrap();
            storage.init_schema().await.unwrap();
            storage.set_watermark("@shop", 7).await.unwrap();
        }

        let storage = DuckDbStorage::new(&path).unwrap();
        storage.init_schema().await.unwrap();
        assert_eq!(storage.get_watermark("@shop").await.unwrap(), 7);
    }

    #[test]
    fn test_extract_pid_from_lock_error() {
        let msg = "IO Error: Could not set lock on file \"x.duckdb\": Conflicting lock is held in /usr/bin/price-relay (PID 4242) by user me";
        assert_eq!(extract_pid_from_lock_error(msg), Some(4242));
        assert_eq!(extract_pid_from_lock_error("no pid here"), None);
    }
}
