use chrono::{DateTime, Utc};

use fieldwright_core::{Operation, OperationId};

use crate::error::StorageError;

/// Durable, ordered log of recorded operations.
///
/// Implementations keep insertion order; listings are newest first.
pub trait OperationStore {
    /// Persist a new operation. Fails if the id already exists.
    fn append_operation(&mut self, operation: &Operation) -> Result<(), StorageError>;

    fn get_operation(&self, id: OperationId) -> Result<Option<Operation>, StorageError>;

    /// All operations, most recently recorded first.
    fn list_operations(&self) -> Result<Vec<Operation>, StorageError>;

    /// Operations not yet rolled back, most recently recorded first.
    fn list_active_operations(&self) -> Result<Vec<Operation>, StorageError>;

    /// Flag an operation as rolled back. Returns `false` if it is missing or already flagged.
    fn mark_rolled_back(
        &mut self,
        id: OperationId,
        at: DateTime<Utc>,
    ) -> Result<bool, StorageError>;

    /// Remove an operation from the log. Returns `false` if it was not present.
    fn delete_operation(&mut self, id: OperationId) -> Result<bool, StorageError>;

    /// Delete rolled-back operations older than the `keep` most recent records.
    /// Active operations are never removed. Returns how many were deleted.
    fn prune_rolled_back(&mut self, keep: usize) -> Result<usize, StorageError>;

    fn operation_count(&self) -> Result<u64, StorageError>;
}
