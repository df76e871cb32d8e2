use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use fieldwright_core::definition::derive_type_id;
use fieldwright_core::{CoreError, FieldDefinition};

use crate::error::EngineError;
use crate::host::ContentHost;
use crate::introspector::Introspector;

/// A hand-written field type that can describe itself.
pub trait FieldTypeProvider {
    fn definition(&self) -> FieldDefinition;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaEntry {
    pub display_name: String,
    pub icon: String,
    pub settings_attributes: Vec<String>,
    pub host_type_ref: String,
}

/// Machine-readable view over every registered type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrySchema {
    /// Every id and alias, sorted.
    pub field_types: Vec<String>,
    pub field_definitions: BTreeMap<String, SchemaEntry>,
    pub generated_at: DateTime<Utc>,
    pub total_fields: usize,
}

impl RegistrySchema {
    pub fn to_json(&self) -> Result<String, CoreError> {
        serde_json::to_string_pretty(self).map_err(|e| CoreError::Serialization(e.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryStatistics {
    pub total_fields: usize,
    pub auto_discovered: usize,
    pub manually_enhanced: usize,
    pub field_types: Vec<String>,
}

#[derive(Default)]
struct RegistryState {
    definitions: HashMap<String, Arc<FieldDefinition>>,
    /// alias -> canonical type id
    alias_index: HashMap<String, String>,
    schema_cache: Option<Arc<RegistrySchema>>,
    doc_cache: Option<Arc<str>>,
}

impl RegistryState {
    fn invalidate(&mut self) {
        self.schema_cache = None;
        self.doc_cache = None;
    }

    fn resolve(&self, id_or_alias: &str) -> Option<&Arc<FieldDefinition>> {
        self.definitions.get(id_or_alias).or_else(|| {
            self.alias_index
                .get(id_or_alias)
                .and_then(|type_id| self.definitions.get(type_id))
        })
    }

    fn owner_of(&self, name: &str) -> Option<&str> {
        if let Some((type_id, _)) = self.definitions.get_key_value(name) {
            return Some(type_id.as_str());
        }
        self.alias_index.get(name).map(String::as_str)
    }

    fn sorted_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.definitions.keys().cloned().collect();
        ids.sort();
        ids
    }
}

/// Field-type catalogue merging host introspection with curated data.
///
/// All state sits behind one lock. Mutations invalidate both cached views
/// inside the same write section, so readers never see a stale cache.
pub struct TypeRegistry<H> {
    introspector: Introspector<H>,
    state: RwLock<RegistryState>,
}

impl<H: ContentHost> TypeRegistry<H> {
    pub fn new(host: Arc<H>) -> Self {
        Self {
            introspector: Introspector::new(host),
            state: RwLock::new(RegistryState::default()),
        }
    }

    pub fn introspector(&self) -> &Introspector<H> {
        &self.introspector
    }

    fn read(&self) -> RwLockReadGuard<'_, RegistryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or replace the definition for `type_id`.
    ///
    /// Replacing an existing id is allowed and logged. Blank aliases and aliases
    /// already owned by a different definition are rejected.
    pub fn register(&self, type_id: &str, mut definition: FieldDefinition) -> Result<(), EngineError> {
        let type_id = type_id.trim();
        if type_id.is_empty() {
            return Err(EngineError::InvalidArgument("field type id cannot be empty".into()));
        }
        definition.type_id = type_id.to_string();

        let mut state = self.write();

        if let Some(owner) = state.alias_index.get(type_id).filter(|owner| *owner != type_id) {
            return Err(EngineError::InvalidArgument(format!(
                "type id '{type_id}' is already an alias of '{owner}'"
            )));
        }
        for alias in definition.distinct_aliases() {
            if alias.trim().is_empty() {
                return Err(EngineError::InvalidArgument(format!(
                    "field type '{type_id}' has an empty alias"
                )));
            }
            if let Some(owner) = state.owner_of(alias).filter(|owner| *owner != type_id) {
                return Err(EngineError::InvalidArgument(format!(
                    "alias '{alias}' of '{type_id}' is already claimed by '{owner}'"
                )));
            }
        }

        if let Some(previous) = state.definitions.remove(type_id) {
            warn!(type_id = %type_id, "field type already registered, overriding");
            for alias in previous.distinct_aliases() {
                state.alias_index.remove(alias);
            }
        }
        let aliases: Vec<String> = definition.distinct_aliases().map(str::to_string).collect();
        for alias in &aliases {
            state.alias_index.insert(alias.clone(), type_id.to_string());
        }
        state.definitions.insert(type_id.to_string(), Arc::new(definition));
        state.invalidate();

        info!(type_id = %type_id, aliases = aliases.len(), "registered field type");
        Ok(())
    }

    /// Register a curated type, adding introspected data when the host resolves its reference.
    pub fn register_from_provider(&self, provider: &dyn FieldTypeProvider) -> Result<(), EngineError> {
        let mut definition = provider.definition();
        if definition.auto_discovered.is_none() {
            match self.introspector.analyze(&definition.host_type_ref) {
                Ok(metadata) => definition.auto_discovered = Some(metadata),
                Err(e) => debug!(
                    type_id = %definition.type_id,
                    error = %e,
                    "curated type has no host counterpart, using curated data only"
                ),
            }
        }
        let type_id = definition.type_id.clone();
        self.register(&type_id, definition)
    }

    /// Register every host field type not already covered. Returns how many were added.
    ///
    /// A host type is covered when its derived id is taken as an id or alias,
    /// or when an existing definition already wraps the same host reference.
    pub fn auto_register_all(&self) -> usize {
        let discovered = self.introspector.analyze_all();

        let mut state = self.write();
        let mut added = 0;
        for (host_type_ref, metadata) in discovered {
            let type_id = derive_type_id(&host_type_ref);
            if type_id.is_empty() || state.owner_of(&type_id).is_some() {
                debug!(type_id = %type_id, host_type = %host_type_ref, "already registered, skipping");
                continue;
            }
            if state
                .definitions
                .values()
                .any(|def| def.host_type_ref == host_type_ref)
            {
                debug!(host_type = %host_type_ref, "host type already wrapped, skipping");
                continue;
            }
            let definition =
                FieldDefinition::new(&type_id, &host_type_ref).with_discovered(metadata);
            state.definitions.insert(type_id, Arc::new(definition));
            added += 1;
        }
        state.invalidate();

        info!(count = added, "auto-registered host field types");
        added
    }

    /// Exact id first, then aliases. Every name for a type returns the same `Arc`.
    pub fn lookup(&self, id_or_alias: &str) -> Option<Arc<FieldDefinition>> {
        self.read().resolve(id_or_alias).cloned()
    }

    pub fn contains(&self, id_or_alias: &str) -> bool {
        self.read().resolve(id_or_alias).is_some()
    }

    /// Canonical ids, sorted.
    pub fn type_ids(&self) -> Vec<String> {
        self.read().sorted_ids()
    }

    pub fn definitions(&self) -> Vec<Arc<FieldDefinition>> {
        let state = self.read();
        state
            .sorted_ids()
            .iter()
            .filter_map(|id| state.definitions.get(id).cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.read().definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn generate_schema(&self) -> Arc<RegistrySchema> {
        if let Some(schema) = &self.read().schema_cache {
            return Arc::clone(schema);
        }
        let mut state = self.write();
        if let Some(schema) = &state.schema_cache {
            return Arc::clone(schema);
        }

        let mut field_types = BTreeSet::new();
        let mut field_definitions = BTreeMap::new();
        for (type_id, definition) in &state.definitions {
            field_types.insert(type_id.clone());
            field_types.extend(definition.aliases.iter().cloned());
            let merged = definition.merged();
            field_definitions.insert(
                type_id.clone(),
                SchemaEntry {
                    display_name: merged.display_name,
                    icon: merged.icon,
                    settings_attributes: merged.settings_attributes,
                    host_type_ref: definition.host_type_ref.clone(),
                },
            );
        }
        let schema = Arc::new(RegistrySchema {
            field_types: field_types.into_iter().collect(),
            total_fields: field_definitions.len(),
            field_definitions,
            generated_at: Utc::now(),
        });
        state.schema_cache = Some(Arc::clone(&schema));
        debug!(total_fields = schema.total_fields, "rebuilt schema cache");
        schema
    }

    /// Plain-text listing of every type for prompt construction.
    pub fn generate_documentation(&self) -> Arc<str> {
        if let Some(doc) = &self.read().doc_cache {
            return Arc::clone(doc);
        }
        let mut state = self.write();
        if let Some(doc) = &state.doc_cache {
            return Arc::clone(doc);
        }

        let ids = state.sorted_ids();
        let mut lines = vec![
            "Available field types (alphabetized):".to_string(),
            ids.join(", "),
            String::new(),
            "Field type settings and documentation:".to_string(),
        ];
        lines.extend(
            ids.iter()
                .filter_map(|id| state.definitions.get(id))
                .map(|def| def.documentation_line()),
        );
        let doc: Arc<str> = Arc::from(lines.join("\n"));
        state.doc_cache = Some(Arc::clone(&doc));
        debug!(types = ids.len(), "rebuilt documentation cache");
        doc
    }

    pub fn statistics(&self) -> RegistryStatistics {
        let state = self.read();
        let auto_discovered = state
            .definitions
            .values()
            .filter(|def| def.auto_discovered.is_some() && !def.has_overrides())
            .count();
        let manually_enhanced = state.definitions.values().filter(|def| def.has_overrides()).count();
        RegistryStatistics {
            total_fields: state.definitions.len(),
            auto_discovered,
            manually_enhanced,
            field_types: state.sorted_ids(),
        }
    }

    /// Consistency problems, one message each. Never mutates.
    pub fn validate(&self) -> Vec<String> {
        let definitions = self.definitions();
        let mut errors = Vec::new();
        for def in definitions {
            if def.host_type_ref.trim().is_empty() {
                errors.push(format!("field type '{}' has no host type reference", def.type_id));
            } else if !self.introspector.resolves(&def.host_type_ref) {
                errors.push(format!(
                    "field type '{}' references host type '{}' which does not exist",
                    def.type_id, def.host_type_ref
                ));
            }
        }
        errors
    }

    /// Drop every definition and both caches.
    pub fn clear(&self) {
        let mut state = self.write();
        state.definitions.clear();
        state.alias_index.clear();
        state.invalidate();
        info!("cleared field type registry");
    }
}
