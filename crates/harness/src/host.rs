use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::{Map, Value};
use tracing::debug;

use fieldwright_core::{EntityKind, ValidationRule, ValueKind};
use fieldwright_engine::host::{NewEntryType, NewField, NewGroup, NewSection};
use fieldwright_engine::{ContentHost, FieldTypeCapabilities, HostEntity, HostError};

/// A scripted field type. `broken` types fail to report their identity.
#[derive(Debug, Clone)]
pub struct StubFieldType {
    pub display_name: String,
    pub icon: String,
    pub settings: Vec<String>,
    pub rules: Vec<ValidationRule>,
    pub storage_type: Option<String>,
    pub broken: bool,
}

impl StubFieldType {
    pub fn new(display_name: &str, icon: &str) -> Self {
        Self {
            display_name: display_name.to_string(),
            icon: icon.to_string(),
            settings: Vec::new(),
            rules: Vec::new(),
            storage_type: None,
            broken: false,
        }
    }

    pub fn with_settings(mut self, settings: &[&str]) -> Self {
        self.settings = settings.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_rules(mut self, rules: Vec<ValidationRule>) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_storage_type(mut self, storage_type: &str) -> Self {
        self.storage_type = Some(storage_type.to_string());
        self
    }

    pub fn broken() -> Self {
        Self {
            broken: true,
            ..Self::new("", "")
        }
    }
}

impl FieldTypeCapabilities for StubFieldType {
    fn display_name(&self) -> Result<String, HostError> {
        if self.broken {
            return Err(HostError::Rejected("field type cannot be instantiated".into()));
        }
        Ok(self.display_name.clone())
    }

    fn icon(&self) -> Result<String, HostError> {
        Ok(self.icon.clone())
    }

    fn settings_attributes(&self) -> Result<Vec<String>, HostError> {
        Ok(self.settings.clone())
    }

    fn validation_rules(&self) -> Result<Vec<ValidationRule>, HostError> {
        Ok(self.rules.clone())
    }

    fn storage_type(&self) -> Result<String, HostError> {
        match &self.storage_type {
            Some(storage) => Ok(storage.clone()),
            None => Err(HostError::Unavailable("no content column".into())),
        }
    }
}

/// A host call that changed state, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCall {
    Create(EntityKind, String),
    Detach(String),
    Delete(EntityKind, String),
}

/// Entity state without host ids, for before/after comparisons.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct EntitySnapshot {
    pub kind: EntityKind,
    pub handle: String,
    pub name: String,
    pub host_type: String,
    /// Handles of referenced entities: layout fields or section entry types.
    pub references: Vec<String>,
}

#[derive(Debug, Clone)]
struct StoredEntity {
    kind: EntityKind,
    name: String,
    handle: String,
    host_type: String,
    references: Vec<u64>,
    settings: Map<String, Value>,
}

impl StoredEntity {
    fn to_host_entity(&self, id: u64) -> HostEntity {
        HostEntity {
            id,
            name: self.name.clone(),
            handle: self.handle.clone(),
            host_type: self.host_type.clone(),
        }
    }
}

#[derive(Default)]
struct HostState {
    next_id: u64,
    field_types: BTreeMap<String, Arc<dyn FieldTypeCapabilities>>,
    entities: BTreeMap<u64, StoredEntity>,
    calls: Vec<HostCall>,
    rejected_creates: HashSet<(EntityKind, String)>,
    failing_deletes: HashSet<(EntityKind, String)>,
}

impl HostState {
    fn find(&self, kind: EntityKind, handle: &str) -> Option<(u64, &StoredEntity)> {
        self.entities
            .iter()
            .find(|(_, e)| e.kind == kind && e.handle == handle)
            .map(|(id, e)| (*id, e))
    }

    fn require(&self, kind: EntityKind, ids: &[u64]) -> Result<(), HostError> {
        for id in ids {
            if !self.entities.get(id).is_some_and(|e| e.kind == kind) {
                return Err(HostError::Rejected(format!("{} {id} does not exist", kind.as_str())));
            }
        }
        Ok(())
    }

    fn insert(
        &mut self,
        kind: EntityKind,
        name: &str,
        handle: &str,
        host_type: &str,
        references: Vec<u64>,
        settings: Map<String, Value>,
    ) -> Result<HostEntity, HostError> {
        if self.rejected_creates.contains(&(kind, handle.to_string())) {
            return Err(HostError::Rejected(format!("host refused to save {} '{handle}'", kind.as_str())));
        }
        if self.find(kind, handle).is_some() {
            return Err(HostError::Rejected(format!(
                "{} handle '{handle}' is already in use",
                kind.as_str()
            )));
        }
        self.next_id += 1;
        let id = self.next_id;
        let entity = StoredEntity {
            kind,
            name: name.to_string(),
            handle: handle.to_string(),
            host_type: host_type.to_string(),
            references,
            settings,
        };
        let created = entity.to_host_entity(id);
        self.entities.insert(id, entity);
        self.calls.push(HostCall::Create(kind, handle.to_string()));
        debug!(kind = kind.as_str(), handle, id, "host created entity");
        Ok(created)
    }

    fn referenced_by(&self, id: u64) -> Option<&StoredEntity> {
        self.entities.values().find(|e| e.references.contains(&id))
    }
}

/// In-process stand-in for a content system.
///
/// Enforces the constraints rollback ordering depends on: a field used by an
/// entry type, or an entry type attached to a section, cannot be deleted.
pub struct InMemoryHost {
    state: Mutex<HostState>,
}

impl Default for InMemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryHost {
    /// A host exposing the standard field types plus one third-party and one broken type.
    pub fn new() -> Self {
        let host = Self::empty();
        for (host_type_ref, stub) in standard_field_types() {
            host.add_field_type(host_type_ref, stub);
        }
        host
    }

    pub fn empty() -> Self {
        Self {
            state: Mutex::new(HostState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, HostState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_field_type(&self, host_type_ref: &str, capabilities: impl FieldTypeCapabilities + 'static) {
        self.state()
            .field_types
            .insert(host_type_ref.to_string(), Arc::new(capabilities));
    }

    /// Make every create of `kind` with `handle` fail.
    pub fn reject_create(&self, kind: EntityKind, handle: &str) {
        self.state().rejected_creates.insert((kind, handle.to_string()));
    }

    /// Make every delete of `kind` with `handle` fail.
    pub fn fail_delete(&self, kind: EntityKind, handle: &str) {
        self.state().failing_deletes.insert((kind, handle.to_string()));
    }

    /// Remove an entity out-of-band, the way a manual edit would. Not logged as a call.
    pub fn remove(&self, kind: EntityKind, handle: &str) -> bool {
        let mut state = self.state();
        let Some((id, _)) = state.find(kind, handle) else {
            return false;
        };
        state.entities.remove(&id);
        for entity in state.entities.values_mut() {
            entity.references.retain(|r| *r != id);
        }
        true
    }

    pub fn calls(&self) -> Vec<HostCall> {
        self.state().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    pub fn count(&self, kind: EntityKind) -> usize {
        self.state().entities.values().filter(|e| e.kind == kind).count()
    }

    pub fn settings_of(&self, kind: EntityKind, handle: &str) -> Option<Map<String, Value>> {
        self.state().find(kind, handle).map(|(_, e)| e.settings.clone())
    }

    /// Handles referenced by an entity: layout fields of an entry type, entry types of a section.
    pub fn references_of(&self, kind: EntityKind, handle: &str) -> Option<Vec<String>> {
        let state = self.state();
        let (_, entity) = state.find(kind, handle)?;
        Some(
            entity
                .references
                .iter()
                .filter_map(|id| state.entities.get(id).map(|e| e.handle.clone()))
                .collect(),
        )
    }

    pub fn snapshot(&self) -> Vec<EntitySnapshot> {
        let state = self.state();
        let mut out: Vec<EntitySnapshot> = state
            .entities
            .values()
            .map(|e| EntitySnapshot {
                kind: e.kind,
                handle: e.handle.clone(),
                name: e.name.clone(),
                host_type: e.host_type.clone(),
                references: e
                    .references
                    .iter()
                    .filter_map(|id| state.entities.get(id).map(|r| r.handle.clone()))
                    .collect(),
            })
            .collect();
        out.sort();
        out
    }
}

impl ContentHost for InMemoryHost {
    fn field_types(&self) -> Vec<String> {
        self.state().field_types.keys().cloned().collect()
    }

    fn field_type(&self, host_type_ref: &str) -> Option<Arc<dyn FieldTypeCapabilities>> {
        self.state().field_types.get(host_type_ref).cloned()
    }

    fn find_entity(
        &self,
        kind: EntityKind,
        handle: &str,
    ) -> Result<Option<HostEntity>, HostError> {
        Ok(self.state().find(kind, handle).map(|(id, e)| e.to_host_entity(id)))
    }

    fn create_field(&self, request: &NewField) -> Result<HostEntity, HostError> {
        let mut state = self.state();
        if !state.field_types.contains_key(&request.host_type_ref) {
            return Err(HostError::Rejected(format!(
                "field type {} is not installed",
                request.host_type_ref
            )));
        }
        state.insert(
            EntityKind::Field,
            &request.name,
            &request.handle,
            &request.host_type_ref,
            Vec::new(),
            request.settings.clone(),
        )
    }

    fn create_entry_type(&self, request: &NewEntryType) -> Result<HostEntity, HostError> {
        let mut state = self.state();
        let field_ids: Vec<u64> = request.fields.iter().map(|f| f.field_id).collect();
        state.require(EntityKind::Field, &field_ids)?;
        state.insert(
            EntityKind::EntryType,
            &request.name,
            &request.handle,
            "entryType",
            field_ids,
            Map::new(),
        )
    }

    fn create_section(&self, request: &NewSection) -> Result<HostEntity, HostError> {
        let mut state = self.state();
        state.require(EntityKind::EntryType, &request.entry_type_ids)?;
        state.insert(
            EntityKind::Section,
            &request.name,
            &request.handle,
            request.section_type.as_str(),
            request.entry_type_ids.clone(),
            Map::new(),
        )
    }

    fn create_category_group(&self, request: &NewGroup) -> Result<HostEntity, HostError> {
        let mut settings = Map::new();
        if let Some(levels) = request.max_levels {
            settings.insert("maxLevels".into(), Value::from(levels));
        }
        self.state().insert(
            EntityKind::CategoryGroup,
            &request.name,
            &request.handle,
            "categoryGroup",
            Vec::new(),
            settings,
        )
    }

    fn create_tag_group(&self, request: &NewGroup) -> Result<HostEntity, HostError> {
        self.state().insert(
            EntityKind::TagGroup,
            &request.name,
            &request.handle,
            "tagGroup",
            Vec::new(),
            Map::new(),
        )
    }

    fn detach_entry_types(&self, section_id: u64) -> Result<bool, HostError> {
        let mut state = self.state();
        let Some(section) = state
            .entities
            .get_mut(&section_id)
            .filter(|e| e.kind == EntityKind::Section)
        else {
            return Ok(false);
        };
        section.references.clear();
        let handle = section.handle.clone();
        state.calls.push(HostCall::Detach(handle));
        Ok(true)
    }

    fn delete_entity(&self, kind: EntityKind, id: u64) -> Result<bool, HostError> {
        let mut state = self.state();
        let Some(entity) = state.entities.get(&id).filter(|e| e.kind == kind) else {
            return Ok(false);
        };
        let handle = entity.handle.clone();
        if state.failing_deletes.contains(&(kind, handle.clone())) {
            return Err(HostError::Unavailable(format!(
                "could not delete {} '{handle}'",
                kind.as_str()
            )));
        }
        if let Some(user) = state.referenced_by(id) {
            return Err(HostError::InUse(format!(
                "{} '{handle}' is used by {} '{}'",
                kind.as_str(),
                user.kind.as_str(),
                user.handle
            )));
        }
        state.entities.remove(&id);
        state.calls.push(HostCall::Delete(kind, handle));
        Ok(true)
    }
}

pub const BROKEN_FIELD_TYPE: &str = r"vendor\fields\BrokenField";
pub const MAP_FIELD_TYPE: &str = r"plugins\maps\MapLocationField";

fn standard_field_types() -> Vec<(&'static str, StubFieldType)> {
    vec![
        (
            r"fields\PlainText",
            StubFieldType::new("Plain Text", "text")
                .with_settings(&["multiline", "charLimit", "placeholder"])
                .with_storage_type("text"),
        ),
        (
            r"fields\Number",
            StubFieldType::new("Number", "hashtag")
                .with_settings(&["decimals", "min", "max", "prefix", "suffix"])
                .with_storage_type("decimal"),
        ),
        (
            r"fields\Dropdown",
            StubFieldType::new("Dropdown", "list").with_settings(&["options"]),
        ),
        (
            r"fields\Lightswitch",
            StubFieldType::new("Lightswitch", "toggle-on").with_storage_type("boolean"),
        ),
        (r"fields\Email", StubFieldType::new("Email", "envelope")),
        (r"fields\Link", StubFieldType::new("Link", "link")),
        (
            r"fields\Date",
            StubFieldType::new("Date", "calendar").with_storage_type("datetime"),
        ),
        (r"fields\Entries", StubFieldType::new("Entries", "newspaper")),
        (r"fields\Assets", StubFieldType::new("Assets", "paperclip")),
        (
            r"fields\Table",
            StubFieldType::new("Table", "table")
                .with_settings(&["columns", "minRows", "maxRows"])
                .with_rules(vec![
                    ValidationRule::typed("columns", ValueKind::Array),
                    ValidationRule::ordered("minRows", "maxRows"),
                ]),
        ),
        (r"fields\Color", StubFieldType::new("Color", "palette")),
        (
            MAP_FIELD_TYPE,
            StubFieldType::new("Map Location", "map-pin").with_settings(&["zoom"]),
        ),
        (BROKEN_FIELD_TYPE, StubFieldType::broken()),
    ]
}
