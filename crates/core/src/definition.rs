//! Field type metadata: what the host reports, what humans curate, and the merged view.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::validation::ValidationRule;

pub const DEFAULT_VALUE_TYPE: &str = "mixed";
pub const DEFAULT_STORAGE_TYPE: &str = "text";

/// Baseline metadata derived by introspecting a host field-type implementation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredMetadata {
    pub host_type_ref: String,
    pub display_name: String,
    pub icon: String,
    pub settings_attributes: Vec<String>,
    pub validation_rules: Vec<ValidationRule>,
    pub value_type: String,
    pub storage_type: String,
    pub supports_translation: bool,
    pub searchable: bool,
    /// Set when introspection failed and the rest of the record is a fallback.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub introspection_error: Option<String>,
}

impl DiscoveredMetadata {
    /// The record used when a host type cannot be introspected.
    pub fn degraded(host_type_ref: &str, error: impl Into<String>) -> Self {
        Self {
            host_type_ref: host_type_ref.to_string(),
            display_name: simple_name(host_type_ref).to_string(),
            icon: String::new(),
            settings_attributes: Vec::new(),
            validation_rules: Vec::new(),
            value_type: DEFAULT_VALUE_TYPE.to_string(),
            storage_type: DEFAULT_STORAGE_TYPE.to_string(),
            supports_translation: false,
            searchable: true,
            introspection_error: Some(error.into()),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.introspection_error.is_some()
    }
}

/// Human-curated metadata. Every populated override wins over the discovered value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings_attributes: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_rules: Option<Vec<ValidationRule>>,
    /// Metadata with no dedicated slot.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, Value>,
}

impl FieldOverrides {
    pub fn is_empty(&self) -> bool {
        self.display_name.is_none()
            && self.icon.is_none()
            && self.settings_attributes.is_none()
            && self.validation_rules.is_none()
            && self.extra.is_empty()
    }
}

/// `discovered ∪ overrides`, overrides first.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergedMetadata {
    pub display_name: String,
    pub icon: String,
    pub settings_attributes: Vec<String>,
    pub validation_rules: Vec<ValidationRule>,
    pub value_type: String,
    pub storage_type: String,
    pub supports_translation: bool,
    pub searchable: bool,
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDefinition {
    pub type_id: String,
    pub host_type_ref: String,
    #[serde(default)]
    pub aliases: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_discovered: Option<DiscoveredMetadata>,
    #[serde(default)]
    pub manual_overrides: FieldOverrides,
    #[serde(default)]
    pub documentation: String,
}

impl FieldDefinition {
    pub fn new(type_id: &str, host_type_ref: &str) -> Self {
        Self {
            type_id: type_id.to_string(),
            host_type_ref: host_type_ref.to_string(),
            aliases: BTreeSet::new(),
            auto_discovered: None,
            manual_overrides: FieldOverrides::default(),
            documentation: String::new(),
        }
    }

    pub fn with_aliases<I, A>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        self.aliases.extend(aliases.into_iter().map(Into::into));
        self
    }

    pub fn with_discovered(mut self, metadata: DiscoveredMetadata) -> Self {
        self.auto_discovered = Some(metadata);
        self
    }

    pub fn with_overrides(mut self, overrides: FieldOverrides) -> Self {
        self.manual_overrides = overrides;
        self
    }

    pub fn with_documentation(mut self, documentation: &str) -> Self {
        self.documentation = documentation.to_string();
        self
    }

    /// True for the canonical id or any alias.
    pub fn matches(&self, id_or_alias: &str) -> bool {
        self.type_id == id_or_alias || self.aliases.contains(id_or_alias)
    }

    /// Aliases other than the canonical id itself.
    pub fn distinct_aliases(&self) -> impl Iterator<Item = &str> {
        self.aliases
            .iter()
            .map(String::as_str)
            .filter(move |alias| *alias != self.type_id)
    }

    pub fn has_overrides(&self) -> bool {
        !self.manual_overrides.is_empty()
    }

    pub fn merged(&self) -> MergedMetadata {
        let auto = self.auto_discovered.as_ref();
        let manual = &self.manual_overrides;

        MergedMetadata {
            display_name: manual
                .display_name
                .clone()
                .or_else(|| auto.map(|a| a.display_name.clone()))
                .unwrap_or_else(|| self.type_id.clone()),
            icon: manual
                .icon
                .clone()
                .or_else(|| auto.map(|a| a.icon.clone()))
                .unwrap_or_default(),
            settings_attributes: manual
                .settings_attributes
                .clone()
                .or_else(|| auto.map(|a| a.settings_attributes.clone()))
                .unwrap_or_default(),
            validation_rules: manual
                .validation_rules
                .clone()
                .or_else(|| auto.map(|a| a.validation_rules.clone()))
                .unwrap_or_default(),
            value_type: auto
                .map(|a| a.value_type.clone())
                .unwrap_or_else(|| DEFAULT_VALUE_TYPE.to_string()),
            storage_type: auto
                .map(|a| a.storage_type.clone())
                .unwrap_or_else(|| DEFAULT_STORAGE_TYPE.to_string()),
            supports_translation: auto.is_some_and(|a| a.supports_translation),
            searchable: auto.is_none_or(|a| a.searchable),
            extra: manual.extra.clone(),
        }
    }

    pub fn display_name(&self) -> String {
        self.merged().display_name
    }

    pub fn icon(&self) -> String {
        self.merged().icon
    }

    pub fn settings_attributes(&self) -> Vec<String> {
        self.merged().settings_attributes
    }

    pub fn validation_rules(&self) -> Vec<ValidationRule> {
        self.merged().validation_rules
    }

    /// One documentation line: the curated text, or one synthesized from merged metadata.
    pub fn documentation_line(&self) -> String {
        if !self.documentation.trim().is_empty() {
            return self.documentation.clone();
        }
        let merged = self.merged();
        if merged.settings_attributes.is_empty() {
            format!("{}: {} field type", self.type_id, merged.display_name)
        } else {
            format!(
                "{}: Available settings - {}",
                self.type_id,
                merged.settings_attributes.join(", ")
            )
        }
    }
}

/// The non-namespaced tail of a host type reference.
///
/// Accepts `\`, `::`, `.` and `/` as namespace separators.
pub fn simple_name(host_type_ref: &str) -> &str {
    host_type_ref
        .rsplit(['\\', ':', '.', '/'])
        .find(|segment| !segment.is_empty())
        .unwrap_or(host_type_ref)
}

/// Canonical type id for a host type reference: `...\PlainTextField` -> `plain_text`.
pub fn derive_type_id(host_type_ref: &str) -> String {
    let name = simple_name(host_type_ref);
    let mut snake = String::with_capacity(name.len() + 4);
    let mut prev_lower = false;
    for ch in name.chars() {
        if prev_lower && ch.is_ascii_uppercase() {
            snake.push('_');
        }
        prev_lower = ch.is_ascii_lowercase();
        snake.push(ch.to_ascii_lowercase());
    }
    match snake.strip_suffix("_field") {
        Some(stripped) if !stripped.is_empty() => stripped.to_string(),
        _ => snake,
    }
}
