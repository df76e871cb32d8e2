use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use fieldwright_core::EntityKind;

use crate::error::EngineError;
use crate::host::SectionKind;

/// The `{"operations": [...]}` envelope a caller submits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Batch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub operations: Vec<MutationRequest>,
}

impl Batch {
    pub fn new(operations: Vec<MutationRequest>) -> Self {
        Self {
            name: None,
            description: None,
            operations,
        }
    }

    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        serde_json::from_str(json).map_err(|e| EngineError::MalformedRequest(e.to_string()))
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "target", rename_all = "camelCase")]
pub enum MutationRequest {
    Field(FieldRequest),
    EntryType(EntryTypeRequest),
    Section(SectionRequest),
    CategoryGroup(GroupRequest),
    TagGroup(GroupRequest),
}

impl MutationRequest {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Field(_) => EntityKind::Field,
            Self::EntryType(_) => EntityKind::EntryType,
            Self::Section(_) => EntityKind::Section,
            Self::CategoryGroup(_) => EntityKind::CategoryGroup,
            Self::TagGroup(_) => EntityKind::TagGroup,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Field(r) => &r.name,
            Self::EntryType(r) => &r.name,
            Self::Section(r) => &r.name,
            Self::CategoryGroup(r) | Self::TagGroup(r) => &r.name,
        }
    }

    pub fn handle(&self) -> &str {
        match self {
            Self::Field(r) => &r.handle,
            Self::EntryType(r) => &r.handle,
            Self::Section(r) => &r.handle,
            Self::CategoryGroup(r) | Self::TagGroup(r) => &r.handle,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldRequest {
    pub name: String,
    pub handle: String,
    /// Registered type id or alias.
    #[serde(alias = "field_type")]
    pub field_type: String,
    #[serde(default)]
    pub settings: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldAssignment {
    pub handle: String,
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryTypeRequest {
    pub name: String,
    pub handle: String,
    #[serde(default = "default_true")]
    pub has_title_field: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_format: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldAssignment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionRequest {
    pub name: String,
    pub handle: String,
    #[serde(default)]
    pub section_type: SectionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_levels: Option<u32>,
    /// Entry type handles.
    #[serde(default)]
    pub entry_types: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupRequest {
    pub name: String,
    pub handle: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_levels: Option<u32>,
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_envelope_with_defaults() {
        let batch = Batch::from_json(
            r#"{
                "name": "Blog",
                "operations": [
                    {"target": "field", "name": "Summary", "handle": "summary", "field_type": "text"},
                    {"target": "entryType", "name": "Post", "handle": "post",
                     "fields": [{"handle": "summary"}]},
                    {"target": "section", "name": "Blog", "handle": "blog", "entryTypes": ["post"]},
                    {"target": "tagGroup", "name": "Topics", "handle": "topics"}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(batch.len(), 4);
        let MutationRequest::Field(field) = &batch.operations[0] else {
            panic!("expected field request");
        };
        assert_eq!(field.field_type, "text");
        assert!(field.settings.is_empty());

        let MutationRequest::EntryType(entry_type) = &batch.operations[1] else {
            panic!("expected entry type request");
        };
        assert!(entry_type.has_title_field);
        assert!(!entry_type.fields[0].required);

        let MutationRequest::Section(section) = &batch.operations[2] else {
            panic!("expected section request");
        };
        assert_eq!(section.section_type, SectionKind::Channel);
        assert_eq!(batch.operations[3].kind(), EntityKind::TagGroup);
    }

    #[test]
    fn malformed_envelopes_are_rejected() {
        for json in [
            r#"{"ops": []}"#,
            r#"{"operations": [{"target": "matrixBlock", "name": "x", "handle": "x"}]}"#,
            r#"{"operations": [{"target": "field", "name": "x"}]}"#,
            "not json",
        ] {
            assert!(
                matches!(Batch::from_json(json), Err(EngineError::MalformedRequest(_))),
                "accepted {json}"
            );
        }
    }
}
