//! Read-only view over the `companies` table of a seeded SQLite catalog.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{Connection, OpenFlags};
use tracing::info;

use super::CompanyStore;
use crate::errors::{StoreError, StoreResult};
use crate::models::company::CompanyRecord;

const SCAN_QUERY: &str = "SELECT company_name, description, website_url, city, website_text
     FROM companies
     ORDER BY id";

/// Catalog backed by SQLite; scans are serialized on a single connection
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open an existing catalog database without write access
    pub fn open(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        info!("catalog database opened at {}", path.display());
        Ok(Self::from_connection(conn))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }
}

impl CompanyStore for SqliteStore {
    fn scan(&self, visit: &mut dyn FnMut(&CompanyRecord) -> bool) -> StoreResult<()> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let mut stmt = conn.prepare_cached(SCAN_QUERY)?;
        let mut rows = stmt.query([])?;

        while let Some(row) = rows.next()? {
            let record = CompanyRecord {
                name: row.get::<_, Option<String>>(0)?.unwrap_or_default(),
                description: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                website: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                location: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                excerpt_text: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
            };
            if !visit(&record) {
                break;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> SqliteStore {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE companies (
                id INTEGER PRIMARY KEY,
                company_name TEXT,
                company_id INTEGER,
                city TEXT,
                description TEXT,
                website_url TEXT,
                website_text TEXT
            );
            INSERT INTO companies (id, company_name, city, description, website_url, website_text)
            VALUES (2, 'Taxo', 'Austin', 'AI tax filing', NULL, NULL);
            INSERT INTO companies (id, company_name, city, description, website_url, website_text)
            VALUES (1, 'Ledgerly', 'New York', 'Fintech platform for SMBs', 'https://ledgerly.io', 'Close your books');",
        )
        .unwrap();
        SqliteStore::from_connection(conn)
    }

    #[test]
    fn test_scan_in_id_order_with_nulls() {
        let store = seeded();
        let mut records = Vec::new();
        store
            .scan(&mut |record| {
                records.push(record.clone());
                true
            })
            .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "Ledgerly");
        assert_eq!(records[0].excerpt_text, "Close your books");
        assert_eq!(records[1].name, "Taxo");
        assert_eq!(records[1].website, "");
    }

    #[test]
    fn test_missing_table_is_an_error() {
        let store = SqliteStore::from_connection(Connection::open_in_memory().unwrap());
        let result = store.scan(&mut |_| true);
        assert!(matches!(result, Err(StoreError::Sqlite(_))));
    }
}
