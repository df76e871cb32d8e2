pub mod catalog;
pub mod config;
pub mod error;
pub mod executor;
pub mod host;
pub mod introspector;
pub mod registry;
pub mod request;
pub mod rollback;

pub use config::EngineConfig;
pub use error::{EngineError, HostError, ItemError};
pub use executor::{BatchReport, ItemOutcome, ItemResult, OperationsExecutor};
pub use host::{ContentHost, FieldTypeCapabilities, HostEntity, SectionKind};
pub use introspector::Introspector;
pub use registry::{FieldTypeProvider, RegistrySchema, RegistryStatistics, TypeRegistry};
pub use request::{Batch, MutationRequest};
pub use rollback::{RollbackEngine, RollbackEntry, RollbackReport, RollbackStatus};

use std::sync::Arc;

use tracing::info;

use fieldwright_core::handle::{self, HandleCheck};
use fieldwright_core::{EntityKind, Operation, OperationId};
use fieldwright_storage::{OperationStore, SqliteOperationStore};

use crate::catalog::curated_types;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyOutcome {
    pub report: BatchReport,
    /// Set when at least one item was created and the operation was recorded.
    pub operation_id: Option<OperationId>,
}

/// Registry, executor and operation log wired over one host and one store.
pub struct Engine<H, S = SqliteOperationStore> {
    config: EngineConfig,
    host: Arc<H>,
    registry: Arc<TypeRegistry<H>>,
    executor: OperationsExecutor<H>,
    rollback: RollbackEngine<S, H>,
}

impl<H: ContentHost> Engine<H, SqliteOperationStore> {
    /// Open the operation log named by the config, in memory if none is set.
    pub fn open(host: Arc<H>, config: EngineConfig) -> Result<Self, EngineError> {
        let store = match &config.operation_log {
            Some(path) => SqliteOperationStore::open(path)?,
            None => SqliteOperationStore::open_in_memory()?,
        };
        Self::bootstrap(host, store, config)
    }
}

impl<H: ContentHost, S: OperationStore> Engine<H, S> {
    /// Build every component and populate the registry.
    ///
    /// Curated types register before auto-discovery so they are never shadowed.
    pub fn bootstrap(host: Arc<H>, store: S, config: EngineConfig) -> Result<Self, EngineError> {
        let registry = Arc::new(TypeRegistry::new(Arc::clone(&host)));
        if config.register_curated {
            for curated in curated_types() {
                registry.register_from_provider(&curated)?;
            }
        }
        if config.auto_register {
            registry.auto_register_all();
        }
        info!(field_types = registry.len(), "engine ready");

        Ok(Self {
            executor: OperationsExecutor::new(Arc::clone(&host), Arc::clone(&registry)),
            rollback: RollbackEngine::new(store, Arc::clone(&host)),
            registry,
            host,
            config,
        })
    }

    /// Execute a batch and record what it created.
    ///
    /// Nothing is recorded when every item failed. With `max_operations` set,
    /// old rolled-back records are pruned afterwards.
    pub fn apply(&self, kind: &str, source: &str, batch: &Batch) -> Result<ApplyOutcome, EngineError> {
        let report = self.executor.execute(batch);
        if report.created_count() == 0 {
            return Ok(ApplyOutcome {
                report,
                operation_id: None,
            });
        }

        let mut operation = Operation::new(kind, source, report.ledger());
        if let Some(description) = batch.description.as_deref().or(batch.name.as_deref()) {
            operation = operation.with_description(description);
        }
        let operation_id = self.rollback.record(operation)?;
        if let Some(max) = self.config.max_operations {
            self.rollback.cleanup_operations(max)?;
        }

        Ok(ApplyOutcome {
            report,
            operation_id: Some(operation_id),
        })
    }

    pub fn apply_json(&self, kind: &str, source: &str, json: &str) -> Result<ApplyOutcome, EngineError> {
        self.apply(kind, source, &Batch::from_json(json)?)
    }

    /// Format and reserved-word rules plus a collision check against live entities of `kind`.
    pub fn check_handle_availability(
        &self,
        kind: EntityKind,
        handle: &str,
    ) -> Result<HandleCheck, EngineError> {
        let mut check = handle::check_handle(handle);
        if check.available && self.host.find_entity(kind, handle)?.is_some() {
            check.available = false;
            check.reason = Some(format!("{} handle '{handle}' is already in use", kind.as_str()));
        }
        Ok(check)
    }

    /// Alternatives to `base` that are free for `kind`. Lookup failures count as taken.
    pub fn suggest_handles(&self, kind: EntityKind, base: &str) -> Vec<String> {
        handle::suggest_handles(base, |candidate| {
            matches!(self.host.find_entity(kind, candidate), Ok(None))
        })
    }

    pub fn rollback_operation(&self, id: OperationId) -> Result<Option<RollbackReport>, EngineError> {
        self.rollback.rollback_operation(id)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn host(&self) -> &Arc<H> {
        &self.host
    }

    pub fn registry(&self) -> &Arc<TypeRegistry<H>> {
        &self.registry
    }

    pub fn executor(&self) -> &OperationsExecutor<H> {
        &self.executor
    }

    pub fn rollback(&self) -> &RollbackEngine<S, H> {
        &self.rollback
    }
}
