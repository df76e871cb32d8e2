use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};

use fieldwright_core::{Operation, OperationId, OperationLedger};

use crate::error::StorageError;
use crate::traits::OperationStore;

/// Convert Vec<u8> to fixed-size array with proper error handling.
fn to_array<const N: usize>(v: Vec<u8>, label: &str) -> Result<[u8; N], StorageError> {
    v.try_into()
        .map_err(|_| StorageError::Serialization(format!("invalid {label} length")))
}

fn from_millis(ms: i64, label: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| StorageError::Serialization(format!("invalid {label} timestamp: {ms}")))
}

const SELECT_COLUMNS: &str = "SELECT op_id, kind, source, description, created_at, ledger, rolled_back, rolled_back_at FROM operations";

pub struct SqliteOperationStore {
    conn: Connection,
}

impl SqliteOperationStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        crate::schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        crate::schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    fn query_operations(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<Operation>, StorageError> {
        let mut stmt = self.conn.prepare(sql)?;
        let ops = stmt
            .query_map(params, |row| read_operation(row).map_err(tunnel))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ops)
    }
}

fn read_operation(row: &rusqlite::Row) -> Result<Operation, StorageError> {
    let op_id_bytes: Vec<u8> = row.get(0)?;
    let kind: String = row.get(1)?;
    let source: String = row.get(2)?;
    let description: Option<String> = row.get(3)?;
    let created_at: i64 = row.get(4)?;
    let ledger_bytes: Vec<u8> = row.get(5)?;
    let rolled_back: bool = row.get(6)?;
    let rolled_back_at: Option<i64> = row.get(7)?;

    Ok(Operation {
        id: OperationId::from_bytes(to_array::<16>(op_id_bytes, "op_id")?),
        kind,
        source,
        created_at: from_millis(created_at, "created_at")?,
        description,
        ledger: OperationLedger::from_msgpack(&ledger_bytes)?,
        rolled_back,
        rolled_back_at: rolled_back_at
            .map(|ms| from_millis(ms, "rolled_back_at"))
            .transpose()?,
    })
}

fn tunnel(e: StorageError) -> rusqlite::Error {
    match e {
        StorageError::Sqlite(sq) => sq,
        other => rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Blob,
            Box::new(OpaqueStorageError(other.to_string())),
        ),
    }
}

impl OperationStore for SqliteOperationStore {
    fn append_operation(&mut self, operation: &Operation) -> Result<(), StorageError> {
        let ledger_bytes = operation.ledger.to_msgpack()?;
        self.conn.execute(
            "INSERT INTO operations (op_id, kind, source, description, created_at, ledger, created_count, failed_count, rolled_back, rolled_back_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            rusqlite::params![
                operation.id.as_bytes().as_slice(),
                operation.kind,
                operation.source,
                operation.description,
                operation.created_at.timestamp_millis(),
                ledger_bytes,
                operation.total_created() as i64,
                operation.total_failed() as i64,
                operation.rolled_back,
                operation.rolled_back_at.map(|t| t.timestamp_millis()),
            ],
        )?;
        Ok(())
    }

    fn get_operation(&self, id: OperationId) -> Result<Option<Operation>, StorageError> {
        let sql = format!("{SELECT_COLUMNS} WHERE op_id = ?1");
        let op = self
            .conn
            .query_row(&sql, rusqlite::params![id.as_bytes().as_slice()], |row| {
                read_operation(row).map_err(tunnel)
            })
            .optional()?;
        Ok(op)
    }

    fn list_operations(&self) -> Result<Vec<Operation>, StorageError> {
        self.query_operations(&format!("{SELECT_COLUMNS} ORDER BY rowid DESC"), [])
    }

    fn list_active_operations(&self) -> Result<Vec<Operation>, StorageError> {
        self.query_operations(
            &format!("{SELECT_COLUMNS} WHERE rolled_back = 0 ORDER BY rowid DESC"),
            [],
        )
    }

    fn mark_rolled_back(
        &mut self,
        id: OperationId,
        at: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        let changed = self.conn.execute(
            "UPDATE operations SET rolled_back = 1, rolled_back_at = ?1 WHERE op_id = ?2 AND rolled_back = 0",
            rusqlite::params![at.timestamp_millis(), id.as_bytes().as_slice()],
        )?;
        Ok(changed > 0)
    }

    fn delete_operation(&mut self, id: OperationId) -> Result<bool, StorageError> {
        let changed = self.conn.execute(
            "DELETE FROM operations WHERE op_id = ?1",
            rusqlite::params![id.as_bytes().as_slice()],
        )?;
        Ok(changed > 0)
    }

    fn prune_rolled_back(&mut self, keep: usize) -> Result<usize, StorageError> {
        let removed = self.conn.execute(
            "DELETE FROM operations WHERE rolled_back = 1 \
             AND rowid NOT IN (SELECT rowid FROM operations ORDER BY rowid DESC LIMIT ?1)",
            rusqlite::params![keep as i64],
        )?;
        Ok(removed)
    }

    fn operation_count(&self) -> Result<u64, StorageError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM operations", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

/// Wrapper error type used to tunnel StorageError through rusqlite's error system
/// in row-mapping closures that must return rusqlite::Error.
#[derive(Debug)]
struct OpaqueStorageError(String);

impl std::fmt::Display for OpaqueStorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for OpaqueStorageError {}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldwright_core::{CreatedItem, EntityKind};

    fn sample(kind: &str) -> Operation {
        let mut ledger = OperationLedger::default();
        ledger.push_created(
            EntityKind::Field,
            CreatedItem {
                id: 11,
                name: "Summary".into(),
                handle: "summary".into(),
                host_type: r"fields\PlainText".into(),
            },
        );
        Operation::new(kind, "unit", ledger)
    }

    #[test]
    fn append_and_get() {
        let mut store = SqliteOperationStore::open_in_memory().unwrap();
        let op = sample("generate").with_description("blog scaffold");
        store.append_operation(&op).unwrap();

        let loaded = store.get_operation(op.id).unwrap().unwrap();
        assert_eq!(loaded, op);
        assert!(store.get_operation(OperationId::new()).unwrap().is_none());
        assert_eq!(store.operation_count().unwrap(), 1);
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let mut store = SqliteOperationStore::open_in_memory().unwrap();
        let op = sample("generate");
        store.append_operation(&op).unwrap();
        assert!(matches!(
            store.append_operation(&op),
            Err(StorageError::Sqlite(_))
        ));
    }

    #[test]
    fn listing_is_newest_first() {
        let mut store = SqliteOperationStore::open_in_memory().unwrap();
        let ops: Vec<Operation> = (0..3).map(|i| sample(&format!("op{i}"))).collect();
        for op in &ops {
            store.append_operation(op).unwrap();
        }
        let kinds: Vec<String> = store
            .list_operations()
            .unwrap()
            .into_iter()
            .map(|op| op.kind)
            .collect();
        assert_eq!(kinds, vec!["op2", "op1", "op0"]);
    }

    #[test]
    fn mark_rolled_back_only_once() {
        let mut store = SqliteOperationStore::open_in_memory().unwrap();
        let op = sample("generate");
        store.append_operation(&op).unwrap();

        let at = Utc::now();
        assert!(store.mark_rolled_back(op.id, at).unwrap());
        assert!(!store.mark_rolled_back(op.id, at).unwrap());
        assert!(!store.mark_rolled_back(OperationId::new(), at).unwrap());

        let loaded = store.get_operation(op.id).unwrap().unwrap();
        assert!(loaded.rolled_back);
        assert_eq!(
            loaded.rolled_back_at.unwrap().timestamp_millis(),
            at.timestamp_millis()
        );
        assert!(store.list_active_operations().unwrap().is_empty());
    }

    #[test]
    fn prune_only_removes_old_rolled_back() {
        let mut store = SqliteOperationStore::open_in_memory().unwrap();
        let ops: Vec<Operation> = (0..5).map(|i| sample(&format!("op{i}"))).collect();
        for op in &ops {
            store.append_operation(op).unwrap();
        }
        let at = Utc::now();
        for op in [&ops[0], &ops[2], &ops[4]] {
            assert!(store.mark_rolled_back(op.id, at).unwrap());
        }

        // ops[4] is rolled back but inside the kept window; ops[1] and ops[3] are active.
        assert_eq!(store.prune_rolled_back(2).unwrap(), 2);
        let remaining: Vec<OperationId> =
            store.list_operations().unwrap().iter().map(|op| op.id).collect();
        assert_eq!(remaining, vec![ops[4].id, ops[3].id, ops[1].id]);
        assert_eq!(store.prune_rolled_back(0).unwrap(), 1);
        assert_eq!(store.list_active_operations().unwrap().len(), 2);
    }

    #[test]
    fn delete_reports_presence() {
        let mut store = SqliteOperationStore::open_in_memory().unwrap();
        let op = sample("generate");
        store.append_operation(&op).unwrap();
        assert!(store.delete_operation(op.id).unwrap());
        assert!(!store.delete_operation(op.id).unwrap());
    }

    #[test]
    fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("operations.db");
        let op = sample("generate");
        {
            let mut store = SqliteOperationStore::open(&path).unwrap();
            store.append_operation(&op).unwrap();
        }
        let store = SqliteOperationStore::open(&path).unwrap();
        assert_eq!(store.get_operation(op.id).unwrap().unwrap(), op);
    }
}
