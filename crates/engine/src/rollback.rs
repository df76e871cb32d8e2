use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use fieldwright_core::{CreatedItem, EntityKind, Operation, OperationId, OperationLedger};
use fieldwright_storage::OperationStore;

use crate::error::{EngineError, HostError};
use crate::host::ContentHost;

/// Categories deleted after sections, in order. Entry types go before the
/// fields they lay out; groups reference nothing.
const DELETION_ORDER: [EntityKind; 4] = [
    EntityKind::EntryType,
    EntityKind::Field,
    EntityKind::CategoryGroup,
    EntityKind::TagGroup,
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "camelCase")]
pub enum RollbackStatus {
    Deleted,
    Skipped(String),
    /// Left in place because something outside the operation still uses it.
    Protected(String),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RollbackEntry {
    pub kind: EntityKind,
    pub item: CreatedItem,
    #[serde(flatten)]
    pub status: RollbackStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RollbackReport {
    pub operation_id: OperationId,
    /// In the order deletions were attempted.
    pub entries: Vec<RollbackEntry>,
    /// Sections whose entry-type associations were removed.
    pub detachments: Vec<CreatedItem>,
}

impl RollbackReport {
    fn new(operation_id: OperationId) -> Self {
        Self {
            operation_id,
            entries: Vec::new(),
            detachments: Vec::new(),
        }
    }

    pub fn deleted(&self, kind: EntityKind) -> Vec<&CreatedItem> {
        self.entries
            .iter()
            .filter(|e| e.kind == kind && e.status == RollbackStatus::Deleted)
            .map(|e| &e.item)
            .collect()
    }

    pub fn failed(&self) -> Vec<&RollbackEntry> {
        self.entries
            .iter()
            .filter(|e| matches!(e.status, RollbackStatus::Failed(_)))
            .collect()
    }

    pub fn skipped(&self) -> Vec<&RollbackEntry> {
        self.entries
            .iter()
            .filter(|e| matches!(e.status, RollbackStatus::Skipped(_)))
            .collect()
    }

    pub fn protected(&self) -> Vec<&RollbackEntry> {
        self.entries
            .iter()
            .filter(|e| matches!(e.status, RollbackStatus::Protected(_)))
            .collect()
    }

    /// Every recorded entity was deleted.
    pub fn is_clean(&self) -> bool {
        self.entries.iter().all(|e| e.status == RollbackStatus::Deleted)
    }
}

/// Owns the operation log and undoes recorded operations against the host.
///
/// The store lock is held for a whole rollback, so one operation can never
/// be rolled back twice concurrently.
pub struct RollbackEngine<S, H> {
    store: Mutex<S>,
    host: Arc<H>,
}

impl<S: OperationStore, H: ContentHost> RollbackEngine<S, H> {
    pub fn new(store: S, host: Arc<H>) -> Self {
        Self {
            store: Mutex::new(store),
            host,
        }
    }

    fn store(&self) -> MutexGuard<'_, S> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn record_operation(
        &self,
        kind: &str,
        source: &str,
        ledger: OperationLedger,
    ) -> Result<OperationId, EngineError> {
        self.record(Operation::new(kind, source, ledger))
    }

    /// Persist a prepared operation as-is.
    pub fn record(&self, operation: Operation) -> Result<OperationId, EngineError> {
        self.store().append_operation(&operation)?;
        info!(
            operation = %operation.id,
            kind = %operation.kind,
            created = operation.total_created(),
            failed = operation.total_failed(),
            "recorded operation"
        );
        Ok(operation.id)
    }

    /// Every operation, most recent first.
    pub fn get_operations(&self) -> Result<Vec<Operation>, EngineError> {
        Ok(self.store().list_operations()?)
    }

    /// Operations not yet rolled back, most recent first.
    pub fn active_operations(&self) -> Result<Vec<Operation>, EngineError> {
        Ok(self.store().list_active_operations()?)
    }

    pub fn get_operation(&self, id: OperationId) -> Result<Option<Operation>, EngineError> {
        Ok(self.store().get_operation(id)?)
    }

    pub fn operation_count(&self) -> Result<u64, EngineError> {
        Ok(self.store().operation_count()?)
    }

    /// Delete everything the operation created, sections first and fields after
    /// the entry types that use them.
    ///
    /// Returns `None` when the id is unknown or already rolled back. Individual
    /// deletion failures are reported in the result and do not stop the pass;
    /// the operation is marked rolled back once the pass completes.
    pub fn rollback_operation(&self, id: OperationId) -> Result<Option<RollbackReport>, EngineError> {
        let mut store = self.store();
        let Some(operation) = store.get_operation(id)? else {
            debug!(operation = %id, "rollback requested for unknown operation");
            return Ok(None);
        };
        if operation.rolled_back {
            debug!(operation = %id, "operation already rolled back");
            return Ok(None);
        }

        let mut report = RollbackReport::new(id);

        for section in operation.ledger.created(EntityKind::Section).iter().rev() {
            match self.host.detach_entry_types(section.id) {
                Ok(true) => report.detachments.push(section.clone()),
                Ok(false) => {}
                Err(e) => warn!(
                    operation = %id,
                    section = %section.handle,
                    error = %e,
                    "could not detach entry types"
                ),
            }
            self.delete_one(&mut report, EntityKind::Section, section);
        }
        for kind in DELETION_ORDER {
            for item in operation.ledger.created(kind).iter().rev() {
                self.delete_one(&mut report, kind, item);
            }
        }

        store.mark_rolled_back(id, Utc::now())?;
        info!(
            operation = %id,
            deleted = report.entries.iter().filter(|e| e.status == RollbackStatus::Deleted).count(),
            failed = report.failed().len(),
            protected = report.protected().len(),
            skipped = report.skipped().len(),
            "rolled back operation"
        );
        Ok(Some(report))
    }

    fn delete_one(&self, report: &mut RollbackReport, kind: EntityKind, item: &CreatedItem) {
        let status = match self.host.delete_entity(kind, item.id) {
            Ok(true) => RollbackStatus::Deleted,
            Ok(false) => {
                debug!(kind = kind.as_str(), handle = %item.handle, "already gone, skipping");
                RollbackStatus::Skipped(format!("{} '{}' no longer exists", kind.as_str(), item.handle))
            }
            Err(HostError::InUse(reason)) => {
                info!(kind = kind.as_str(), handle = %item.handle, reason = %reason, "still in use, keeping");
                RollbackStatus::Protected(reason)
            }
            Err(e) => {
                warn!(kind = kind.as_str(), handle = %item.handle, error = %e, "delete failed");
                RollbackStatus::Failed(e.to_string())
            }
        };
        report.entries.push(RollbackEntry {
            kind,
            item: item.clone(),
            status,
        });
    }

    /// Roll back every active operation, newest first.
    pub fn rollback_all(&self) -> Result<Vec<RollbackReport>, EngineError> {
        let ids: Vec<OperationId> = self.active_operations()?.iter().map(|op| op.id).collect();
        let mut reports = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(report) = self.rollback_operation(id)? {
                reports.push(report);
            }
        }
        Ok(reports)
    }

    /// Drop a record from the log. Live entities are untouched.
    pub fn delete_operation(&self, id: OperationId) -> Result<bool, EngineError> {
        let removed = self.store().delete_operation(id)?;
        if removed {
            info!(operation = %id, "deleted operation record");
        }
        Ok(removed)
    }

    /// Drop rolled-back records that fall outside the `max` most recent.
    /// Active operations always stay rollbackable. Returns how many were removed.
    pub fn cleanup_operations(&self, max: usize) -> Result<usize, EngineError> {
        let removed = self.store().prune_rolled_back(max)?;
        if removed > 0 {
            info!(removed, window = max, "pruned rolled-back operations");
        }
        Ok(removed)
    }
}
