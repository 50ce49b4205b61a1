//! SQLite 저장소
//!
//! # 스키마
//!
//! ```sql
//! CREATE TABLE passive (
//!     key        TEXT PRIMARY KEY,
//!     sensor     TEXT,
//!     addr       TEXT,
//!     targetval  TEXT,
//!     recon_type TEXT NOT NULL,
//!     port       INTEGER,
//!     source     TEXT,
//!     value      TEXT NOT NULL,
//!     full_value TEXT,
//!     infos      TEXT NOT NULL,     -- JSON
//!     first_seen INTEGER NOT NULL,  -- Unix 마이크로초
//!     last_seen  INTEGER NOT NULL,
//!     count      INTEGER NOT NULL
//! );
//! ```
//!
//! 병합은 `INSERT .. ON CONFLICT(key) DO UPDATE`로 저장소 안에서 수행됩니다.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use passiverecon_core::error::StorageError;
use passiverecon_core::types::{DedupKey, FieldMap, Observation};

use super::PassiveStore;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS passive (
    key TEXT PRIMARY KEY,
    sensor TEXT,
    addr TEXT,
    targetval TEXT,
    recon_type TEXT NOT NULL,
    port INTEGER,
    source TEXT,
    value TEXT NOT NULL,
    full_value TEXT,
    infos TEXT NOT NULL,
    first_seen INTEGER NOT NULL,
    last_seen INTEGER NOT NULL,
    count INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_passive_addr ON passive(addr);
CREATE INDEX IF NOT EXISTS idx_passive_recon_type ON passive(recon_type);
";

const UPSERT: &str = "
INSERT INTO passive (
    key, sensor, addr, targetval, recon_type, port, source,
    value, full_value, infos, first_seen, last_seen, count
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
ON CONFLICT(key) DO UPDATE SET
    count = count + excluded.count,
    first_seen = MIN(first_seen, excluded.first_seen),
    last_seen = MAX(last_seen, excluded.last_seen),
    infos = CASE WHEN infos = '{}' THEN excluded.infos ELSE infos END
";

const SELECT_BY_KEY: &str = "
SELECT key, sensor, addr, targetval, recon_type, port, source,
       value, full_value, infos, first_seen, last_seen, count
FROM passive WHERE key = ?1
";

/// SQLite 저장소
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// 파일 기반 데이터베이스를 엽니다. `:memory:`는 인메모리 데이터베이스입니다.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        if path.as_os_str() == ":memory:" {
            return Self::new_in_memory();
        }

        let conn = Connection::open(path).map_err(|e| {
            StorageError::Connection(format!("failed to open {}: {e}", path.display()))
        })?;
        conn.busy_timeout(Duration::from_secs(5))
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let store = Self { conn };
        store.init_schema()?;
        tracing::debug!(path = %path.display(), "opened sqlite passive store");
        Ok(store)
    }

    /// 인메모리 데이터베이스를 생성합니다.
    pub fn new_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StorageError::Connection(format!("failed to open in-memory db: {e}")))?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), StorageError> {
        self.conn
            .execute_batch(SCHEMA)
            .map_err(|e| StorageError::Connection(format!("failed to initialize schema: {e}")))
    }

    fn execute_upsert(
        stmt: &mut rusqlite::CachedStatement<'_>,
        o: &Observation,
    ) -> Result<(), String> {
        let infos = serde_json::to_string(&o.infos).map_err(|e| e.to_string())?;
        stmt.execute(params![
            o.key.as_str(),
            o.sensor,
            o.addr.map(|a| a.to_string()),
            o.targetval,
            o.recon_type,
            o.port,
            o.source,
            o.value,
            o.full_value,
            infos,
            o.first_seen.timestamp_micros(),
            o.last_seen.timestamp_micros(),
            i64::try_from(o.count).unwrap_or(i64::MAX),
        ])
        .map_err(|e| e.to_string())?;
        Ok(())
    }

    fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRow> {
        Ok(RawRow {
            key: row.get(0)?,
            sensor: row.get(1)?,
            addr: row.get(2)?,
            targetval: row.get(3)?,
            recon_type: row.get(4)?,
            port: row.get(5)?,
            source: row.get(6)?,
            value: row.get(7)?,
            full_value: row.get(8)?,
            infos: row.get(9)?,
            first_seen: row.get(10)?,
            last_seen: row.get(11)?,
            count: row.get(12)?,
        })
    }
}

/// 변환 전의 행
struct RawRow {
    key: String,
    sensor: Option<String>,
    addr: Option<String>,
    targetval: Option<String>,
    recon_type: String,
    port: Option<u16>,
    source: Option<String>,
    value: String,
    full_value: Option<String>,
    infos: String,
    first_seen: i64,
    last_seen: i64,
    count: i64,
}

impl RawRow {
    fn into_observation(self) -> Result<Observation, StorageError> {
        let addr = self
            .addr
            .map(|a| a.parse::<std::net::IpAddr>())
            .transpose()
            .map_err(|e| StorageError::Query(format!("invalid stored addr: {e}")))?;
        let infos: FieldMap = serde_json::from_str(&self.infos)
            .map_err(|e| StorageError::Query(format!("invalid stored infos: {e}")))?;

        Ok(Observation {
            key: DedupKey::new(self.key),
            sensor: self.sensor,
            addr,
            targetval: self.targetval,
            recon_type: self.recon_type,
            port: self.port,
            source: self.source,
            value: self.value,
            full_value: self.full_value,
            infos,
            first_seen: from_micros(self.first_seen)?,
            last_seen: from_micros(self.last_seen)?,
            count: u64::try_from(self.count).unwrap_or_default(),
        })
    }
}

fn from_micros(micros: i64) -> Result<DateTime<Utc>, StorageError> {
    DateTime::from_timestamp_micros(micros)
        .ok_or_else(|| StorageError::Query(format!("invalid stored timestamp: {micros}")))
}

impl PassiveStore for SqliteStore {
    fn upsert(&mut self, observation: &Observation) -> Result<(), StorageError> {
        let write_err = |reason: String| StorageError::Write { records: 1, reason };
        let mut stmt = self
            .conn
            .prepare_cached(UPSERT)
            .map_err(|e| write_err(e.to_string()))?;
        Self::execute_upsert(&mut stmt, observation).map_err(write_err)
    }

    fn upsert_bulk(&mut self, observations: &[Observation]) -> Result<(), StorageError> {
        if observations.is_empty() {
            return Ok(());
        }
        let write_err = |reason: String| StorageError::Write {
            records: observations.len(),
            reason,
        };

        // 트랜잭션이 커밋 전에 drop되면 롤백됨
        let tx = self
            .conn
            .transaction()
            .map_err(|e| write_err(e.to_string()))?;
        {
            let mut stmt = tx
                .prepare_cached(UPSERT)
                .map_err(|e| write_err(e.to_string()))?;
            for observation in observations {
                Self::execute_upsert(&mut stmt, observation).map_err(write_err)?;
            }
        }
        tx.commit().map_err(|e| write_err(e.to_string()))
    }

    fn get(&self, key: &DedupKey) -> Result<Option<Observation>, StorageError> {
        let row = self
            .conn
            .query_row(SELECT_BY_KEY, [key.as_str()], Self::read_row)
            .optional()
            .map_err(|e| StorageError::Query(e.to_string()))?;
        row.map(RawRow::into_observation).transpose()
    }

    fn count(&self) -> Result<u64, StorageError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM passive", [], |row| row.get(0))
            .map_err(|e| StorageError::Query(e.to_string()))?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use passiverecon_core::types::FieldValue;

    fn observation(key: &str, at: i64) -> Observation {
        let ts = DateTime::from_timestamp(at, 250_000_000).unwrap();
        Observation {
            key: DedupKey::new(key),
            sensor: Some("s1".to_owned()),
            addr: Some("10.0.0.5".parse().unwrap()),
            targetval: None,
            recon_type: "SSL_SERVER".to_owned(),
            port: Some(443),
            source: Some("cert".to_owned()),
            value: "MIIB".to_owned(),
            full_value: None,
            infos: FieldMap::new(),
            first_seen: ts,
            last_seen: ts,
            count: 1,
        }
    }

    #[test]
    fn upsert_and_get_round_trip() {
        let mut store = SqliteStore::new_in_memory().unwrap();
        let mut obs = observation("k1", 100);
        obs.infos.insert("size".to_owned(), FieldValue::Int(512));
        store.upsert(&obs).unwrap();

        let stored = store.get(&DedupKey::new("k1")).unwrap().unwrap();
        assert_eq!(stored, obs);
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn conflicting_upsert_merges() {
        let mut store = SqliteStore::new_in_memory().unwrap();
        store.upsert(&observation("k1", 200)).unwrap();
        store.upsert(&observation("k1", 100)).unwrap();
        store.upsert(&observation("k1", 300)).unwrap();

        let stored = store.get(&DedupKey::new("k1")).unwrap().unwrap();
        assert_eq!(stored.count, 3);
        assert_eq!(stored.first_seen.timestamp(), 100);
        assert_eq!(stored.last_seen.timestamp(), 300);
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn existing_infos_are_kept() {
        let mut store = SqliteStore::new_in_memory().unwrap();
        store.upsert(&observation("k1", 100)).unwrap();

        let mut with_infos = observation("k1", 200);
        with_infos.infos.insert("sha256".to_owned(), "aa".into());
        store.upsert(&with_infos).unwrap();

        let mut other_infos = observation("k1", 300);
        other_infos.infos.insert("sha256".to_owned(), "bb".into());
        store.upsert(&other_infos).unwrap();

        let stored = store.get(&DedupKey::new("k1")).unwrap().unwrap();
        assert_eq!(stored.infos.get("sha256"), Some(&FieldValue::from("aa")));
    }

    #[test]
    fn bulk_upsert_in_one_transaction() {
        let mut store = SqliteStore::new_in_memory().unwrap();
        let batch = vec![
            observation("k1", 100),
            observation("k2", 100),
            observation("k1", 150),
        ];
        store.upsert_bulk(&batch).unwrap();
        store.upsert_bulk(&[]).unwrap();

        assert_eq!(store.count().unwrap(), 2);
        let k1 = store.get(&DedupKey::new("k1")).unwrap().unwrap();
        assert_eq!(k1.count, 2);
    }

    #[test]
    fn file_backed_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("passive.db");
        {
            let mut store = SqliteStore::open(&path).unwrap();
            store.upsert(&observation("k1", 100)).unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn memory_path_opens_in_memory() {
        let store = SqliteStore::open(":memory:").unwrap();
        assert_eq!(store.count().unwrap(), 0);
        assert_eq!(store.backend_name(), "sqlite");
    }

    #[test]
    fn unopenable_path_is_connection_error() {
        let result = SqliteStore::open("/nonexistent/dir/passive.db");
        assert!(matches!(result, Err(StorageError::Connection(_))));
    }
}
