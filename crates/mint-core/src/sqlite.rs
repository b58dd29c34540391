//! SQLite-backed credit ledger and inventory store.

use std::path::Path;

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};

use crate::collaborators::{CreditLedger, InventoryStore};
use crate::error::StoreError;
use crate::types::{InventoryId, InventoryItem};

const MIG_0001: &str = include_str!("migrations/0001_init.sql");
const SCHEMA_VERSION: i64 = 1;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Unavailable(format!("{}: {e}", parent.display())))?;
        }
        Self::from_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        let this = Self {
            conn: Mutex::new(conn),
        };
        this.migrate()?;
        Ok(this)
    }

    fn migrate(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute_batch(MIG_0001)?;
        let v: i64 = conn.query_row("PRAGMA user_version;", [], |r| r.get(0))?;
        if v < SCHEMA_VERSION {
            conn.execute_batch(&format!("PRAGMA user_version = {SCHEMA_VERSION};"))?;
        }
        Ok(())
    }

    pub fn set_balance(&self, dealer_id: &str, credits: u64) -> Result<(), StoreError> {
        let credits = i64::try_from(credits)
            .map_err(|_| StoreError::Conflict(format!("balance {credits} out of range")))?;
        self.conn.lock().execute(
            r#"INSERT INTO dealer_credits(dealer_id, balance) VALUES(?1, ?2)
               ON CONFLICT(dealer_id) DO UPDATE SET balance = excluded.balance"#,
            params![dealer_id, credits],
        )?;
        Ok(())
    }

    pub fn balance(&self, dealer_id: &str) -> Result<u64, StoreError> {
        let balance: Option<i64> = self
            .conn
            .lock()
            .query_row(
                "SELECT balance FROM dealer_credits WHERE dealer_id = ?1",
                params![dealer_id],
                |r| r.get(0),
            )
            .optional()?;
        Ok(balance.map_or(0, |b| b.max(0) as u64))
    }

    pub fn insert_item(&self, item: &InventoryItem) -> Result<(), StoreError> {
        self.conn.lock().execute(
            r#"INSERT INTO inventory
                 (id, dealer_id, serial, make, model, caliber, acquisition_date, minted, tx_signature)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
               ON CONFLICT(id) DO UPDATE SET
                 dealer_id = excluded.dealer_id,
                 serial = excluded.serial,
                 make = excluded.make,
                 model = excluded.model,
                 caliber = excluded.caliber,
                 acquisition_date = excluded.acquisition_date,
                 minted = excluded.minted,
                 tx_signature = excluded.tx_signature"#,
            params![
                item.id,
                item.dealer_id,
                item.serial,
                item.make,
                item.model,
                item.caliber,
                item.acquisition_date,
                item.minted,
                item.tx_signature,
            ],
        )?;
        Ok(())
    }

    fn item_from_row(row: &Row<'_>) -> rusqlite::Result<InventoryItem> {
        Ok(InventoryItem {
            id: row.get(0)?,
            dealer_id: row.get(1)?,
            serial: row.get(2)?,
            make: row.get(3)?,
            model: row.get(4)?,
            caliber: row.get(5)?,
            acquisition_date: row.get(6)?,
            minted: row.get(7)?,
            tx_signature: row.get(8)?,
        })
    }
}

#[async_trait]
impl CreditLedger for SqliteStore {
    async fn reserve(&self, dealer_id: &str, reference: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let prior: Option<String> = tx
            .query_row(
                "SELECT state FROM credit_reservations WHERE reference = ?1",
                params![reference],
                |r| r.get(0),
            )
            .optional()?;
        if let Some(state) = prior {
            return Ok(state != "denied");
        }

        let taken = tx.execute(
            "UPDATE dealer_credits SET balance = balance - 1 WHERE dealer_id = ?1 AND balance > 0",
            params![dealer_id],
        )? == 1;
        let state = if taken { "reserved" } else { "denied" };
        tx.execute(
            "INSERT INTO credit_reservations(reference, dealer_id, state) VALUES(?1, ?2, ?3)",
            params![reference, dealer_id, state],
        )?;
        tx.commit()?;
        Ok(taken)
    }

    async fn refund(&self, dealer_id: &str, reference: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let released = tx.execute(
            r#"UPDATE credit_reservations
               SET state = 'refunded', updated_at = CAST(strftime('%s', 'now') AS INTEGER)
               WHERE reference = ?1 AND dealer_id = ?2 AND state = 'reserved'"#,
            params![reference, dealer_id],
        )?;
        if released == 1 {
            tx.execute(
                "UPDATE dealer_credits SET balance = balance + 1 WHERE dealer_id = ?1",
                params![dealer_id],
            )?;
        }
        tx.commit()?;
        Ok(())
    }
}

#[async_trait]
impl InventoryStore for SqliteStore {
    async fn get(&self, id: InventoryId) -> Result<Option<InventoryItem>, StoreError> {
        let item = self
            .conn
            .lock()
            .query_row(
                r#"SELECT id, dealer_id, serial, make, model, caliber,
                          acquisition_date, minted, tx_signature
                   FROM inventory WHERE id = ?1"#,
                params![id],
                Self::item_from_row,
            )
            .optional()?;
        Ok(item)
    }

    async fn set_minted(&self, id: InventoryId, signature: &str) -> Result<(), StoreError> {
        let updated = self.conn.lock().execute(
            "UPDATE inventory SET minted = 1, tx_signature = ?2 WHERE id = ?1 AND minted = 0",
            params![id, signature],
        )?;
        if updated == 0 {
            return Err(StoreError::Conflict(format!(
                "inventory item {id} is missing or already minted"
            )));
        }
        Ok(())
    }
}
