//! SQLite-backed history of scraped quotes.
//!
//! Each call to [`RateStore::save_rates`] is one batch: every row in it
//! carries the same write timestamp, and batch timestamps strictly increase,
//! so "latest rates" is simply the batch with the greatest timestamp.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{Duration, NaiveDateTime, Utc};
use rusqlite::{Connection, OptionalExtension};

use crate::types::{RateQuote, RateRow, RatesError, RatesResult};

/// Environment variable naming the database file.
pub const DB_PATH_ENV: &str = "REMIT_RATES_DB";

/// Database file used when nothing else is configured.
pub const DEFAULT_DB_PATH: &str = "exchange_rates.db";

/// Default number of rows returned by [`RateStore::rates_history`].
pub const DEFAULT_HISTORY_LIMIT: usize = 10;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

const SELECT_COLUMNS: &str =
    "SELECT id, service, from_currency, to_currency, rate, fees, quoted_at, timestamp
     FROM exchange_rates";

/// Persistent quote store.
pub struct RateStore {
    db: Mutex<Connection>,
}

impl RateStore {
    /// Open or create a store at `path`.
    pub fn open(path: &Path) -> RatesResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let db = Connection::open(path)?;
        tracing::debug!(path = %path.display(), "rate store opened");
        Self::init(db)
    }

    /// Non-persistent store, for tests and one-shot runs.
    pub fn open_in_memory() -> RatesResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    /// Path from `REMIT_RATES_DB`, falling back to the default file name.
    pub fn default_path() -> std::path::PathBuf {
        match std::env::var(DB_PATH_ENV) {
            Ok(path) if !path.trim().is_empty() => path.trim().into(),
            _ => DEFAULT_DB_PATH.into(),
        }
    }

    fn init(db: Connection) -> RatesResult<Self> {
        db.execute_batch(
            "CREATE TABLE IF NOT EXISTS exchange_rates (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                service TEXT NOT NULL,
                from_currency TEXT NOT NULL,
                to_currency TEXT NOT NULL,
                rate REAL NOT NULL,
                fees REAL DEFAULT 0,
                quoted_at TEXT NOT NULL,
                timestamp TEXT NOT NULL
            );",
        )?;
        migrate(&db)?;
        db.execute_batch(
            "CREATE INDEX IF NOT EXISTS idx_exchange_rates_timestamp
                ON exchange_rates (timestamp);
            CREATE INDEX IF NOT EXISTS idx_exchange_rates_service
                ON exchange_rates (service, timestamp);",
        )?;
        Ok(Self { db: Mutex::new(db) })
    }

    fn conn(&self) -> RatesResult<MutexGuard<'_, Connection>> {
        self.db
            .lock()
            .map_err(|_| RatesError::Task("rate store lock poisoned".into()))
    }

    /// Save one batch of quotes in a single transaction. Returns the number
    /// of rows written; an empty batch writes nothing.
    pub fn save_rates(&self, quotes: &[RateQuote]) -> RatesResult<usize> {
        if quotes.is_empty() {
            return Ok(0);
        }
        let mut db = self.conn()?;
        let tx = db.transaction()?;

        let last: Option<String> = tx
            .query_row("SELECT MAX(timestamp) FROM exchange_rates", [], |row| {
                row.get::<_, Option<String>>(0)
            })
            .optional()?
            .flatten();
        let written_at = next_batch_timestamp(last.as_deref());

        {
            let mut stmt = tx.prepare(
                "INSERT INTO exchange_rates
                    (service, from_currency, to_currency, rate, fees, quoted_at, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for quote in quotes {
                stmt.execute(rusqlite::params![
                    quote.service(),
                    quote.from_currency(),
                    quote.to_currency(),
                    quote.rate(),
                    quote.fees(),
                    quote.timestamp().to_rfc3339(),
                    written_at,
                ])?;
            }
        }
        tx.commit()?;

        tracing::info!(rows = quotes.len(), timestamp = %written_at, "rates saved");
        Ok(quotes.len())
    }

    /// Every row of the most recent batch.
    pub fn latest_rates(&self) -> RatesResult<Vec<RateRow>> {
        let db = self.conn()?;
        let mut stmt = db.prepare(&format!(
            "{SELECT_COLUMNS}
             WHERE timestamp = (SELECT MAX(timestamp) FROM exchange_rates)
             ORDER BY id"
        ))?;
        let rows = stmt
            .query_map([], row_to_rate)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Stored rows for one service, newest first.
    pub fn rates_history(&self, service: &str, limit: usize) -> RatesResult<Vec<RateRow>> {
        let db = self.conn()?;
        let mut stmt = db.prepare(&format!(
            "{SELECT_COLUMNS}
             WHERE service = ?1
             ORDER BY timestamp DESC, id DESC
             LIMIT ?2"
        ))?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt
            .query_map(rusqlite::params![service, limit], row_to_rate)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Total number of stored rows.
    pub fn count(&self) -> RatesResult<usize> {
        let db = self.conn()?;
        let n: i64 = db.query_row("SELECT COUNT(*) FROM exchange_rates", [], |row| row.get(0))?;
        Ok(n as usize)
    }
}

/// Columns missing from databases written before fees and quote instants
/// were stored.
const ADDED_COLUMNS: &[(&str, &str)] = &[("fees", "REAL DEFAULT 0"), ("quoted_at", "TEXT")];

fn migrate(db: &Connection) -> RatesResult<()> {
    let existing = {
        let mut stmt = db.prepare("PRAGMA table_info(exchange_rates)")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<Result<Vec<_>, _>>()?;
        names
    };

    for (name, definition) in ADDED_COLUMNS {
        if existing.iter().any(|c| c == *name) {
            continue;
        }
        db.execute_batch(&format!(
            "ALTER TABLE exchange_rates ADD COLUMN {name} {definition}"
        ))?;
        tracing::info!(column = *name, "added missing exchange_rates column");
    }

    let backfilled = db.execute(
        "UPDATE exchange_rates SET quoted_at = timestamp WHERE quoted_at IS NULL",
        [],
    )?;
    if backfilled > 0 {
        tracing::info!(rows = backfilled, "backfilled quoted_at from timestamp");
    }
    Ok(())
}

fn row_to_rate(row: &rusqlite::Row<'_>) -> rusqlite::Result<RateRow> {
    let timestamp: String = row.get(7)?;
    Ok(RateRow {
        id: row.get(0)?,
        service: row.get(1)?,
        from_currency: row.get(2)?,
        to_currency: row.get(3)?,
        rate: row.get(4)?,
        fees: row.get::<_, Option<f64>>(5)?.unwrap_or(0.0),
        quoted_at: row.get::<_, Option<String>>(6)?.unwrap_or_else(|| timestamp.clone()),
        timestamp,
    })
}

/// Current time, bumped past `last` so batch timestamps never collide.
fn next_batch_timestamp(last: Option<&str>) -> String {
    let now = Utc::now().naive_utc();
    let previous = last.and_then(|s| NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT).ok());
    let at = match previous {
        Some(prev) if now <= prev => prev + Duration::milliseconds(1),
        _ => now,
    };
    at.format(TIMESTAMP_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CurrencyPair;
    use crate::validate::format_quote;

    fn quote(service: &str, rate: f64, fees: f64) -> RateQuote {
        format_quote(rate, Some(fees), service, &CurrencyPair::new("CAD", "XOF")).unwrap()
    }

    #[test]
    fn test_save_and_latest() {
        let dir = tempfile::tempdir().unwrap();
        let store = RateStore::open(&dir.path().join("rates.db")).unwrap();

        let written = store
            .save_rates(&[quote("TapTapSend", 450.0, 2.0), quote("TransfertChapChap", 455.5, 0.0)])
            .unwrap();
        assert_eq!(written, 2);

        let latest = store.latest_rates().unwrap();
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].service, "TapTapSend");
        assert_eq!(latest[0].fees, 2.0);
        assert_eq!(latest[1].rate, 455.5);
        assert_eq!(latest[0].timestamp, latest[1].timestamp);
    }

    #[test]
    fn test_latest_returns_only_newest_batch() {
        let store = RateStore::open_in_memory().unwrap();
        store
            .save_rates(&[quote("A", 450.0, 0.0), quote("B", 451.0, 0.0)])
            .unwrap();
        store.save_rates(&[quote("A", 460.0, 1.0)]).unwrap();

        let latest = store.latest_rates().unwrap();
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].rate, 460.0);
        assert_eq!(store.count().unwrap(), 3);
    }

    #[test]
    fn test_history_newest_first_with_limit() {
        let store = RateStore::open_in_memory().unwrap();
        for rate in [450.0, 451.0, 452.0] {
            store.save_rates(&[quote("A", rate, 0.0)]).unwrap();
        }
        store.save_rates(&[quote("B", 470.0, 0.0)]).unwrap();

        let history = store.rates_history("A", 2).unwrap();
        let rates: Vec<f64> = history.iter().map(|r| r.rate).collect();
        assert_eq!(rates, vec![452.0, 451.0]);
        assert!(store.rates_history("missing", DEFAULT_HISTORY_LIMIT).unwrap().is_empty());
    }

    #[test]
    fn test_empty_store_and_empty_batch() {
        let store = RateStore::open_in_memory().unwrap();
        assert_eq!(store.save_rates(&[]).unwrap(), 0);
        assert!(store.latest_rates().unwrap().is_empty());
    }

    #[test]
    fn test_reopen_keeps_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("rates.db");
        {
            let store = RateStore::open(&path).unwrap();
            store.save_rates(&[quote("A", 450.0, 0.0)]).unwrap();
        }
        let store = RateStore::open(&path).unwrap();
        assert_eq!(store.latest_rates().unwrap().len(), 1);
    }

    #[test]
    fn test_opens_legacy_table_without_fee_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exchange_rates.db");
        {
            let db = Connection::open(&path).unwrap();
            db.execute_batch(
                "CREATE TABLE exchange_rates (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    service TEXT NOT NULL,
                    from_currency TEXT NOT NULL,
                    to_currency TEXT NOT NULL,
                    rate REAL NOT NULL,
                    timestamp DATETIME DEFAULT CURRENT_TIMESTAMP
                );
                INSERT INTO exchange_rates (service, from_currency, to_currency, rate, timestamp)
                    VALUES ('TapTapSend', 'CAD', 'XOF', 441.5, '2024-03-01 10:00:00');",
            )
            .unwrap();
        }

        let store = RateStore::open(&path).unwrap();
        let legacy = store.rates_history("TapTapSend", 10).unwrap();
        assert_eq!(legacy.len(), 1);
        assert_eq!(legacy[0].fees, 0.0);
        assert_eq!(legacy[0].quoted_at, "2024-03-01 10:00:00");

        assert_eq!(store.save_rates(&[quote("TapTapSend", 450.0, 2.0)]).unwrap(), 1);
        let latest = store.latest_rates().unwrap();
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].rate, 450.0);
        assert_eq!(latest[0].fees, 2.0);
        assert_eq!(store.count().unwrap(), 2);
        drop(store);

        // Reopening an already migrated file changes nothing.
        let store = RateStore::open(&path).unwrap();
        assert_eq!(store.count().unwrap(), 2);
    }

    #[test]
    fn test_batch_timestamps_strictly_increase() {
        let later = next_batch_timestamp(Some("2999-01-01 00:00:00.000"));
        assert_eq!(later, "2999-01-01 00:00:00.001");
        assert!(next_batch_timestamp(Some("garbage")).len() >= 19);
    }
}
