use std::sync::Arc;

use serde_json::Value;
use tracing_subscriber::EnvFilter;

use fieldwright_engine::{ApplyOutcome, Batch, Engine, EngineConfig, EngineError};
use fieldwright_storage::SqliteOperationStore;

use crate::host::InMemoryHost;

/// Install a test-writer subscriber. `RUST_LOG` overrides `default_filter`; repeat calls are no-ops.
pub fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// An engine over an [`InMemoryHost`], with the host kept at hand for assertions.
pub struct TestRig {
    pub host: Arc<InMemoryHost>,
    pub engine: Engine<InMemoryHost, SqliteOperationStore>,
}

impl TestRig {
    pub fn new() -> Result<Self, EngineError> {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Result<Self, EngineError> {
        Self::with_host(InMemoryHost::new(), config)
    }

    pub fn with_host(host: InMemoryHost, config: EngineConfig) -> Result<Self, EngineError> {
        init_tracing(&config.log_filter);
        let host = Arc::new(host);
        let engine = Engine::open(Arc::clone(&host), config)?;
        Ok(Self { host, engine })
    }

    /// Apply `{"operations": [...]}` as a "generate" operation.
    pub fn apply(&self, batch: Value) -> Result<ApplyOutcome, EngineError> {
        let batch: Batch = serde_json::from_value(batch)
            .map_err(|e| EngineError::MalformedRequest(e.to_string()))?;
        self.engine.apply("generate", "test", &batch)
    }
}
