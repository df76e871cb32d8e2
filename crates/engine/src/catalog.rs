//! Hand-curated field types: aliases, prompt documentation and setting rules
//! layered over whatever the host reports.

use serde_json::json;

use fieldwright_core::{FieldDefinition, FieldOverrides, ValidationRule, ValueKind};

use crate::registry::FieldTypeProvider;

pub struct CuratedFieldType {
    pub type_id: &'static str,
    pub host_type_ref: &'static str,
    pub aliases: &'static [&'static str],
    pub documentation: &'static str,
    pub settings: &'static [&'static str],
    rules: fn() -> Vec<ValidationRule>,
}

impl FieldTypeProvider for CuratedFieldType {
    fn definition(&self) -> FieldDefinition {
        FieldDefinition::new(self.type_id, self.host_type_ref)
            .with_aliases(self.aliases.iter().copied())
            .with_documentation(self.documentation)
            .with_overrides(FieldOverrides {
                settings_attributes: Some(self.settings.iter().map(|s| s.to_string()).collect()),
                validation_rules: Some((self.rules)()),
                ..FieldOverrides::default()
            })
    }
}

pub fn curated_types() -> Vec<CuratedFieldType> {
    vec![
        CuratedFieldType {
            type_id: "plain_text",
            host_type_ref: r"fields\PlainText",
            aliases: &["text"],
            documentation: "plain_text: multiline (boolean), charLimit (integer)",
            settings: &["multiline", "charLimit"],
            rules: || {
                vec![
                    ValidationRule::typed("multiline", ValueKind::Boolean),
                    ValidationRule::typed("charLimit", ValueKind::Integer),
                    ValidationRule::range("charLimit", Some(0.0), None),
                ]
            },
        },
        CuratedFieldType {
            type_id: "number",
            host_type_ref: r"fields\Number",
            aliases: &[],
            documentation: "number: decimals (integer), min (number), max (number), prefix (string), suffix (string)",
            settings: &["decimals", "min", "max", "prefix", "suffix"],
            rules: || {
                vec![
                    ValidationRule::typed("decimals", ValueKind::Integer),
                    ValidationRule::range("decimals", Some(0.0), None),
                    ValidationRule::typed("min", ValueKind::Number),
                    ValidationRule::typed("max", ValueKind::Number),
                    ValidationRule::ordered("min", "max"),
                    ValidationRule::typed("prefix", ValueKind::String),
                    ValidationRule::typed("suffix", ValueKind::String),
                ]
            },
        },
        CuratedFieldType {
            type_id: "dropdown",
            host_type_ref: r"fields\Dropdown",
            aliases: &[],
            documentation: r#"dropdown: options (array) - Use format: ["value1","value2"] NOT objects"#,
            settings: &["options"],
            rules: || {
                vec![
                    ValidationRule::required("options"),
                    ValidationRule::typed("options", ValueKind::Array),
                    ValidationRule::non_empty("options"),
                ]
            },
        },
        CuratedFieldType {
            type_id: "lightswitch",
            host_type_ref: r"fields\Lightswitch",
            aliases: &["toggle"],
            documentation: "lightswitch: default (boolean), onLabel (string), offLabel (string)",
            settings: &["default", "onLabel", "offLabel"],
            rules: || {
                vec![
                    ValidationRule::typed("default", ValueKind::Boolean),
                    ValidationRule::typed("onLabel", ValueKind::String),
                    ValidationRule::typed("offLabel", ValueKind::String),
                ]
            },
        },
        CuratedFieldType {
            type_id: "email",
            host_type_ref: r"fields\Email",
            aliases: &[],
            documentation: "email: placeholder (string)",
            settings: &["placeholder"],
            rules: || vec![ValidationRule::typed("placeholder", ValueKind::String)],
        },
        CuratedFieldType {
            type_id: "url",
            host_type_ref: r"fields\Link",
            aliases: &["link"],
            documentation: r#"url: Use for URL/link fields. Supports types (array), showLabelField (boolean). Common usage: types:["url"] for external links only."#,
            settings: &["types", "showLabelField"],
            rules: || {
                vec![
                    ValidationRule::typed("types", ValueKind::Array),
                    ValidationRule::typed("showLabelField", ValueKind::Boolean),
                ]
            },
        },
        CuratedFieldType {
            type_id: "date",
            host_type_ref: r"fields\Date",
            aliases: &["datetime"],
            documentation: "date: showDate (boolean), showTime (boolean), showTimeZone (boolean)",
            settings: &["showDate", "showTime", "showTimeZone"],
            rules: || {
                vec![
                    ValidationRule::typed("showDate", ValueKind::Boolean),
                    ValidationRule::typed("showTime", ValueKind::Boolean),
                    ValidationRule::typed("showTimeZone", ValueKind::Boolean),
                ]
            },
        },
        CuratedFieldType {
            type_id: "entries",
            host_type_ref: r"fields\Entries",
            aliases: &[],
            documentation: r#"entries: maxRelations (number), sources (array of section handles or "*" for all)"#,
            settings: &["maxRelations", "sources"],
            rules: || {
                vec![
                    ValidationRule::typed("maxRelations", ValueKind::Number),
                    ValidationRule::typed("sources", ValueKind::Array),
                ]
            },
        },
        CuratedFieldType {
            type_id: "assets",
            host_type_ref: r"fields\Assets",
            aliases: &["asset"],
            documentation: "assets: maxRelations (integer), minRelations (integer), viewMode (string), allowedKinds (array)",
            settings: &["maxRelations", "minRelations", "viewMode", "allowedKinds"],
            rules: || {
                vec![
                    ValidationRule::typed("maxRelations", ValueKind::Integer),
                    ValidationRule::range("maxRelations", Some(1.0), None),
                    ValidationRule::typed("minRelations", ValueKind::Integer),
                    ValidationRule::range("minRelations", Some(0.0), None),
                    ValidationRule::ordered("minRelations", "maxRelations"),
                    ValidationRule::one_of("viewMode", vec![json!("list"), json!("large")]),
                    ValidationRule::typed("allowedKinds", ValueKind::Array),
                ]
            },
        },
    ]
}
