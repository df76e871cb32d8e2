use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::ids::OperationId;

/// Schema entity categories an operation can create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityKind {
    Field,
    EntryType,
    Section,
    CategoryGroup,
    TagGroup,
}

impl EntityKind {
    pub const ALL: [EntityKind; 5] = [
        Self::Field,
        Self::EntryType,
        Self::Section,
        Self::CategoryGroup,
        Self::TagGroup,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Field => "field",
            Self::EntryType => "entryType",
            Self::Section => "section",
            Self::CategoryGroup => "categoryGroup",
            Self::TagGroup => "tagGroup",
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "field" => Ok(Self::Field),
            "entryType" => Ok(Self::EntryType),
            "section" => Ok(Self::Section),
            "categoryGroup" => Ok(Self::CategoryGroup),
            "tagGroup" => Ok(Self::TagGroup),
            _ => Err(CoreError::InvalidArgument(format!("unknown entity kind: {s}"))),
        }
    }
}

/// Identity of an entity the host created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedItem {
    pub id: u64,
    pub name: String,
    pub handle: String,
    #[serde(rename = "type")]
    pub host_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
    pub reason: String,
}

impl FailedItem {
    pub fn new(name: &str, handle: &str, reason: impl Into<String>) -> Self {
        let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());
        Self {
            name: non_empty(name),
            handle: non_empty(handle),
            reason: reason.into(),
        }
    }

    /// Handle if known, else name.
    pub fn label(&self) -> &str {
        self.handle
            .as_deref()
            .or(self.name.as_deref())
            .unwrap_or("<unnamed>")
    }
}

/// Everything one operation created or failed to create, per category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationLedger {
    #[serde(default)]
    pub created_fields: Vec<CreatedItem>,
    #[serde(default)]
    pub failed_fields: Vec<FailedItem>,
    #[serde(default)]
    pub created_entry_types: Vec<CreatedItem>,
    #[serde(default)]
    pub failed_entry_types: Vec<FailedItem>,
    #[serde(default)]
    pub created_sections: Vec<CreatedItem>,
    #[serde(default)]
    pub failed_sections: Vec<FailedItem>,
    #[serde(default)]
    pub created_category_groups: Vec<CreatedItem>,
    #[serde(default)]
    pub failed_category_groups: Vec<FailedItem>,
    #[serde(default)]
    pub created_tag_groups: Vec<CreatedItem>,
    #[serde(default)]
    pub failed_tag_groups: Vec<FailedItem>,
}

impl OperationLedger {
    pub fn created(&self, kind: EntityKind) -> &[CreatedItem] {
        match kind {
            EntityKind::Field => &self.created_fields,
            EntityKind::EntryType => &self.created_entry_types,
            EntityKind::Section => &self.created_sections,
            EntityKind::CategoryGroup => &self.created_category_groups,
            EntityKind::TagGroup => &self.created_tag_groups,
        }
    }

    pub fn failed(&self, kind: EntityKind) -> &[FailedItem] {
        match kind {
            EntityKind::Field => &self.failed_fields,
            EntityKind::EntryType => &self.failed_entry_types,
            EntityKind::Section => &self.failed_sections,
            EntityKind::CategoryGroup => &self.failed_category_groups,
            EntityKind::TagGroup => &self.failed_tag_groups,
        }
    }

    pub fn push_created(&mut self, kind: EntityKind, item: CreatedItem) {
        match kind {
            EntityKind::Field => self.created_fields.push(item),
            EntityKind::EntryType => self.created_entry_types.push(item),
            EntityKind::Section => self.created_sections.push(item),
            EntityKind::CategoryGroup => self.created_category_groups.push(item),
            EntityKind::TagGroup => self.created_tag_groups.push(item),
        }
    }

    pub fn push_failed(&mut self, kind: EntityKind, item: FailedItem) {
        match kind {
            EntityKind::Field => self.failed_fields.push(item),
            EntityKind::EntryType => self.failed_entry_types.push(item),
            EntityKind::Section => self.failed_sections.push(item),
            EntityKind::CategoryGroup => self.failed_category_groups.push(item),
            EntityKind::TagGroup => self.failed_tag_groups.push(item),
        }
    }

    pub fn total_created(&self) -> usize {
        EntityKind::ALL.iter().map(|k| self.created(*k).len()).sum()
    }

    pub fn total_failed(&self) -> usize {
        EntityKind::ALL.iter().map(|k| self.failed(*k).len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total_created() == 0 && self.total_failed() == 0
    }

    pub fn to_msgpack(&self) -> Result<Vec<u8>, CoreError> {
        rmp_serde::to_vec_named(self).map_err(|e| CoreError::Serialization(e.to_string()))
    }

    pub fn from_msgpack(bytes: &[u8]) -> Result<Self, CoreError> {
        rmp_serde::from_slice(bytes).map_err(|e| CoreError::Serialization(e.to_string()))
    }
}

/// One logical batch of schema mutation, recorded so it can be rolled back.
///
/// Serializes to the persisted JSON shape:
/// `{id, type, source, timestamp, createdFields[], failedFields[], ..., rolled_back, rolled_back_at?}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub id: OperationId,
    #[serde(rename = "type")]
    pub kind: String,
    pub source: String,
    #[serde(rename = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub ledger: OperationLedger,
    #[serde(default)]
    pub rolled_back: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rolled_back_at: Option<DateTime<Utc>>,
}

impl Operation {
    pub fn new(kind: &str, source: &str, ledger: OperationLedger) -> Self {
        Self {
            id: OperationId::new(),
            kind: kind.to_string(),
            source: source.to_string(),
            // Millisecond precision is what the log persists.
            created_at: Utc::now().trunc_subsecs(3),
            description: None,
            ledger,
            rolled_back: false,
            rolled_back_at: None,
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn is_active(&self) -> bool {
        !self.rolled_back
    }

    pub fn created_count(&self, kind: EntityKind) -> usize {
        self.ledger.created(kind).len()
    }

    pub fn total_created(&self) -> usize {
        self.ledger.total_created()
    }

    pub fn total_failed(&self) -> usize {
        self.ledger.total_failed()
    }

    pub fn to_json(&self) -> Result<String, CoreError> {
        serde_json::to_string_pretty(self).map_err(|e| CoreError::Serialization(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        serde_json::from_str(json).map_err(|e| CoreError::Serialization(e.to_string()))
    }
}
