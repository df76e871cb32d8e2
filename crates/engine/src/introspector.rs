use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, error, warn};

use fieldwright_core::definition::DEFAULT_STORAGE_TYPE;
use fieldwright_core::DiscoveredMetadata;

use crate::error::{EngineError, HostError};
use crate::host::{ContentHost, FieldTypeCapabilities};

/// Derives baseline metadata from host field types. Read-only and stateless.
pub struct Introspector<H> {
    host: Arc<H>,
}

impl<H: ContentHost> Introspector<H> {
    pub fn new(host: Arc<H>) -> Self {
        Self { host }
    }

    pub fn resolves(&self, host_type_ref: &str) -> bool {
        !host_type_ref.is_empty() && self.host.field_type(host_type_ref).is_some()
    }

    /// Metadata for one host type.
    ///
    /// Only an unresolvable reference is an error. A type that resolves but
    /// fails to describe itself yields a degraded record instead.
    pub fn analyze(&self, host_type_ref: &str) -> Result<DiscoveredMetadata, EngineError> {
        let capabilities = self
            .host
            .field_type(host_type_ref)
            .ok_or_else(|| EngineError::UnresolvableType(host_type_ref.to_string()))?;
        Ok(probe(host_type_ref, capabilities.as_ref()))
    }

    /// Metadata for every field type the host exposes, keyed by host reference.
    pub fn analyze_all(&self) -> BTreeMap<String, DiscoveredMetadata> {
        let mut out = BTreeMap::new();
        for host_type_ref in self.host.field_types() {
            match self.analyze(&host_type_ref) {
                Ok(metadata) => {
                    out.insert(host_type_ref, metadata);
                }
                Err(e) => warn!(host_type = %host_type_ref, error = %e, "listed field type did not resolve"),
            }
        }
        debug!(count = out.len(), "analyzed host field types");
        out
    }
}

fn probe(host_type_ref: &str, capabilities: &dyn FieldTypeCapabilities) -> DiscoveredMetadata {
    let identity = capabilities
        .display_name()
        .and_then(|name| capabilities.icon().map(|icon| (name, icon)));
    let (display_name, icon) = match identity {
        Ok(pair) => pair,
        Err(e) => {
            error!(host_type = %host_type_ref, error = %e, "field type introspection failed");
            return DiscoveredMetadata::degraded(host_type_ref, e.to_string());
        }
    };

    DiscoveredMetadata {
        host_type_ref: host_type_ref.to_string(),
        display_name,
        icon,
        settings_attributes: or_fallback(host_type_ref, "settings", capabilities.settings_attributes()),
        validation_rules: or_fallback(host_type_ref, "rules", capabilities.validation_rules()),
        value_type: capabilities.value_type(),
        storage_type: capabilities
            .storage_type()
            .unwrap_or_else(|e| {
                warn!(host_type = %host_type_ref, probe = "storage", error = %e, "probe failed, using default");
                DEFAULT_STORAGE_TYPE.to_string()
            }),
        supports_translation: capabilities.supports_translation(),
        searchable: capabilities.is_searchable(),
        introspection_error: None,
    }
}

fn or_fallback<T: Default>(host_type_ref: &str, probe: &str, result: Result<T, HostError>) -> T {
    result.unwrap_or_else(|e| {
        warn!(host_type = %host_type_ref, probe, error = %e, "probe failed, using default");
        T::default()
    })
}
