//! The seam to the live content system.
//!
//! Everything the engine knows about the host goes through [`ContentHost`];
//! field-type implementations are probed only through [`FieldTypeCapabilities`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use fieldwright_core::definition::{DEFAULT_STORAGE_TYPE, DEFAULT_VALUE_TYPE};
use fieldwright_core::{CreatedItem, EntityKind, ValidationRule};

use crate::error::HostError;

/// What a host field-type implementation can report about itself.
///
/// Only `display_name` and `icon` are mandatory; hosts commonly implement
/// the rest partially, so every other probe has a neutral default.
pub trait FieldTypeCapabilities: Send + Sync {
    fn display_name(&self) -> Result<String, HostError>;

    fn icon(&self) -> Result<String, HostError>;

    fn settings_attributes(&self) -> Result<Vec<String>, HostError> {
        Ok(Vec::new())
    }

    fn validation_rules(&self) -> Result<Vec<ValidationRule>, HostError> {
        Ok(Vec::new())
    }

    fn storage_type(&self) -> Result<String, HostError> {
        Ok(DEFAULT_STORAGE_TYPE.to_string())
    }

    fn value_type(&self) -> String {
        DEFAULT_VALUE_TYPE.to_string()
    }

    fn is_searchable(&self) -> bool {
        true
    }

    fn supports_translation(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionKind {
    Single,
    #[default]
    Channel,
    Structure,
}

impl SectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Channel => "channel",
            Self::Structure => "structure",
        }
    }
}

/// An entity as the host reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostEntity {
    pub id: u64,
    pub name: String,
    pub handle: String,
    pub host_type: String,
}

impl From<HostEntity> for CreatedItem {
    fn from(entity: HostEntity) -> Self {
        CreatedItem {
            id: entity.id,
            name: entity.name,
            handle: entity.handle,
            host_type: entity.host_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewField {
    pub name: String,
    pub handle: String,
    /// Host type reference of the resolved field type.
    pub host_type_ref: String,
    pub settings: Map<String, Value>,
    pub instructions: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutField {
    pub field_id: u64,
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEntryType {
    pub name: String,
    pub handle: String,
    pub has_title_field: bool,
    pub title_format: Option<String>,
    pub fields: Vec<LayoutField>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSection {
    pub name: String,
    pub handle: String,
    pub section_type: SectionKind,
    pub max_levels: Option<u32>,
    pub entry_type_ids: Vec<u64>,
}

/// Category and tag groups share a shape; tag groups ignore `max_levels`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewGroup {
    pub name: String,
    pub handle: String,
    pub max_levels: Option<u32>,
}

/// Client for the live content system.
///
/// Calls are synchronous and fallible, and are never retried by the engine.
pub trait ContentHost: Send + Sync {
    /// Every field-type reference the host currently exposes.
    fn field_types(&self) -> Vec<String>;

    /// Capabilities of one field type, or `None` if the reference does not resolve.
    fn field_type(&self, host_type_ref: &str) -> Option<Arc<dyn FieldTypeCapabilities>>;

    fn find_entity(&self, kind: EntityKind, handle: &str)
    -> Result<Option<HostEntity>, HostError>;

    fn create_field(&self, request: &NewField) -> Result<HostEntity, HostError>;

    fn create_entry_type(&self, request: &NewEntryType) -> Result<HostEntity, HostError>;

    fn create_section(&self, request: &NewSection) -> Result<HostEntity, HostError>;

    fn create_category_group(&self, request: &NewGroup) -> Result<HostEntity, HostError>;

    fn create_tag_group(&self, request: &NewGroup) -> Result<HostEntity, HostError>;

    /// Remove every entry-type association from a section. Returns `false` if the section is gone.
    fn detach_entry_types(&self, section_id: u64) -> Result<bool, HostError>;

    /// Returns `false` if no such entity exists.
    fn delete_entity(&self, kind: EntityKind, id: u64) -> Result<bool, HostError>;
}
