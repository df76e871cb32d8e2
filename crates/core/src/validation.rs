use std::collections::HashMap;
use std::sync::{LazyLock, PoisonError, RwLock};

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Compiled `Pattern` rules keyed by source. `None` marks a pattern that failed to compile.
static COMPILED_PATTERNS: LazyLock<RwLock<HashMap<String, Option<Regex>>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

fn compiled(pattern: &str) -> Option<Regex> {
    if let Some(entry) = COMPILED_PATTERNS
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(pattern)
    {
        return entry.clone();
    }
    let regex = Regex::new(pattern).ok();
    COMPILED_PATTERNS
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(pattern.to_string(), regex.clone());
    regex
}

/// Shape a setting value is expected to have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValueKind {
    Boolean,
    Integer,
    Number,
    String,
    Array,
    Object,
}

impl ValueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::String => "string",
            Self::Array => "array",
            Self::Object => "object",
        }
    }

    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            Self::Boolean => value.is_boolean(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::String => value.is_string(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
        }
    }
}

/// A single constraint on the settings a field of some type may be created with.
///
/// Rules are evaluated independently; a batch item reports every rule it
/// violates rather than stopping at the first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "camelCase")]
pub enum ValidationRule {
    Required {
        attribute: String,
    },
    Type {
        attribute: String,
        kind: ValueKind,
    },
    Range {
        attribute: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
    },
    NonEmpty {
        attribute: String,
    },
    OneOf {
        attribute: String,
        values: Vec<Value>,
    },
    Pattern {
        attribute: String,
        pattern: String,
    },
    Ordered {
        lower: String,
        upper: String,
    },
}

impl ValidationRule {
    pub fn required(attribute: &str) -> Self {
        Self::Required {
            attribute: attribute.to_string(),
        }
    }

    pub fn typed(attribute: &str, kind: ValueKind) -> Self {
        Self::Type {
            attribute: attribute.to_string(),
            kind,
        }
    }

    pub fn range(attribute: &str, min: Option<f64>, max: Option<f64>) -> Self {
        Self::Range {
            attribute: attribute.to_string(),
            min,
            max,
        }
    }

    pub fn non_empty(attribute: &str) -> Self {
        Self::NonEmpty {
            attribute: attribute.to_string(),
        }
    }

    pub fn one_of(attribute: &str, values: Vec<Value>) -> Self {
        Self::OneOf {
            attribute: attribute.to_string(),
            values,
        }
    }

    pub fn pattern(attribute: &str, pattern: &str) -> Self {
        Self::Pattern {
            attribute: attribute.to_string(),
            pattern: pattern.to_string(),
        }
    }

    pub fn ordered(lower: &str, upper: &str) -> Self {
        Self::Ordered {
            lower: lower.to_string(),
            upper: upper.to_string(),
        }
    }

    /// Evaluate the rule. Returns a human-readable violation, or `None` if satisfied.
    pub fn check(&self, settings: &Map<String, Value>) -> Option<String> {
        match self {
            Self::Required { attribute } => match settings.get(attribute) {
                None | Some(Value::Null) => Some(format!("{attribute} is required")),
                Some(_) => None,
            },

            Self::Type { attribute, kind } => {
                let value = present(settings, attribute)?;
                (!kind.accepts(value)).then(|| format!("{attribute} must be a {} value", kind.as_str()))
            }

            Self::Range {
                attribute,
                min,
                max,
            } => {
                let value = present(settings, attribute)?;
                let Some(n) = value.as_f64() else {
                    return Some(format!("{attribute} must be a number"));
                };
                match (min, max) {
                    (Some(lo), _) if n < *lo => Some(format!("{attribute} must be at least {lo}")),
                    (_, Some(hi)) if n > *hi => Some(format!("{attribute} must be at most {hi}")),
                    _ => None,
                }
            }

            Self::NonEmpty { attribute } => {
                let empty = match present(settings, attribute)? {
                    Value::String(s) => s.trim().is_empty(),
                    Value::Array(items) => items.is_empty(),
                    Value::Object(map) => map.is_empty(),
                    _ => false,
                };
                empty.then(|| format!("{attribute} must not be empty"))
            }

            Self::OneOf { attribute, values } => {
                let value = present(settings, attribute)?;
                if values.contains(value) {
                    return None;
                }
                let allowed: Vec<String> = values.iter().map(Value::to_string).collect();
                Some(format!("{attribute} must be one of {}", allowed.join(", ")))
            }

            Self::Pattern { attribute, pattern } => {
                let value = present(settings, attribute)?;
                let Some(text) = value.as_str() else {
                    return Some(format!("{attribute} must be a string"));
                };
                match compiled(pattern) {
                    Some(re) if re.is_match(text) => None,
                    Some(_) => Some(format!("{attribute} must match {pattern}")),
                    None => Some(format!("{attribute} has an unusable pattern rule: {pattern}")),
                }
            }

            Self::Ordered { lower, upper } => {
                let lo = present(settings, lower)?.as_f64()?;
                let hi = present(settings, upper)?.as_f64()?;
                (lo > hi).then(|| format!("{lower} cannot be greater than {upper}"))
            }
        }
    }
}

fn present<'a>(settings: &'a Map<String, Value>, attribute: &str) -> Option<&'a Value> {
    settings.get(attribute).filter(|v| !v.is_null())
}

/// Run every rule against the settings and collect all violations.
pub fn check_all(rules: &[ValidationRule], settings: &Map<String, Value>) -> Vec<String> {
    rules.iter().filter_map(|rule| rule.check(settings)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn settings(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn absent_attributes_only_trip_required() {
        let rules = vec![
            ValidationRule::required("options"),
            ValidationRule::typed("charLimit", ValueKind::Integer),
            ValidationRule::range("charLimit", Some(0.0), None),
            ValidationRule::non_empty("options"),
        ];
        let violations = check_all(&rules, &Map::new());
        assert_eq!(violations, vec!["options is required".to_string()]);
    }

    #[test]
    fn collects_every_violation() {
        let rules = vec![
            ValidationRule::typed("multiline", ValueKind::Boolean),
            ValidationRule::range("charLimit", Some(0.0), None),
            ValidationRule::ordered("min", "max"),
        ];
        let violations = check_all(
            &rules,
            &settings(json!({"multiline": "yes", "charLimit": -4, "min": 10, "max": 2})),
        );
        assert_eq!(violations.len(), 3);
        assert!(violations[0].contains("multiline"));
        assert!(violations[1].contains("at least 0"));
        assert!(violations[2].contains("min cannot be greater than max"));
    }

    #[test]
    fn integer_kind_rejects_fractions() {
        let rule = ValidationRule::typed("decimals", ValueKind::Integer);
        assert!(rule.check(&settings(json!({"decimals": 2}))).is_none());
        assert!(rule.check(&settings(json!({"decimals": 2.5}))).is_some());
    }

    #[test]
    fn one_of_and_pattern() {
        let one_of = ValidationRule::one_of("viewMode", vec![json!("list"), json!("large")]);
        assert!(one_of.check(&settings(json!({"viewMode": "list"}))).is_none());
        let msg = one_of.check(&settings(json!({"viewMode": "grid"}))).unwrap();
        assert!(msg.contains("\"list\""));

        let pattern = ValidationRule::pattern("placeholder", r"^[^<>]*$");
        assert!(pattern.check(&settings(json!({"placeholder": "you@example.com"}))).is_none());
        assert!(pattern.check(&settings(json!({"placeholder": "<b>"}))).is_some());
    }

    #[test]
    fn patterns_compile_once() {
        let source = r"^sku-[0-9]{4}$";
        let rule = ValidationRule::pattern("sku", source);
        assert!(rule.check(&settings(json!({"sku": "sku-0042"}))).is_none());
        assert!(COMPILED_PATTERNS.read().unwrap().contains_key(source));
        assert!(rule.check(&settings(json!({"sku": "0042"}))).is_some());
        assert_eq!(
            COMPILED_PATTERNS.read().unwrap().get(source).cloned().flatten().map(|re| re.as_str().to_string()),
            Some(source.to_string())
        );

        let broken = ValidationRule::pattern("sku", "([unclosed");
        let msg = broken.check(&settings(json!({"sku": "x"}))).unwrap();
        assert!(msg.contains("unusable pattern"));
        assert_eq!(COMPILED_PATTERNS.read().unwrap().get("([unclosed").map(Option::is_none), Some(true));
    }

    #[test]
    fn rules_serialize_with_tag() {
        let rule = ValidationRule::range("charLimit", Some(0.0), None);
        let value = serde_json::to_value(&rule).unwrap();
        assert_eq!(value, json!({"rule": "range", "attribute": "charLimit", "min": 0.0}));
        let back: ValidationRule = serde_json::from_value(value).unwrap();
        assert_eq!(back, rule);
    }
}
