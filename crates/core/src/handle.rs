use std::sync::LazyLock;

use chrono::{Datelike, Utc};
use regex::Regex;
use serde::Serialize;

static HANDLE_FORMAT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9_]*$").expect("static handle regex"));

/// Handles the host reserves for its own element attributes. Compared case-insensitively.
pub const RESERVED_HANDLES: &[&str] = &[
    "id",
    "uid",
    "title",
    "slug",
    "uri",
    "url",
    "enabled",
    "archived",
    "siteId",
    "sectionId",
    "typeId",
    "authorId",
    "postDate",
    "expiryDate",
    "dateCreated",
    "dateUpdated",
    "root",
    "lft",
    "rgt",
    "level",
    "searchScore",
    "trashed",
    "awaitingFieldValues",
    "propagating",
    "propagateAll",
    "newSiteIds",
    "resaving",
    "duplicateOf",
    "previewing",
    "hardDelete",
    "ref",
    "status",
    "structureId",
    "fieldLayoutId",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HandleCheck {
    pub handle: String,
    pub well_formed: bool,
    pub reserved: bool,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

pub fn is_well_formed(handle: &str) -> bool {
    HANDLE_FORMAT.is_match(handle)
}

pub fn is_reserved(handle: &str) -> bool {
    RESERVED_HANDLES
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(handle))
}

/// Format and reserved-word check. Says nothing about collisions with live entities.
pub fn check_handle(handle: &str) -> HandleCheck {
    let well_formed = is_well_formed(handle);
    let reserved = is_reserved(handle);
    let reason = if !well_formed {
        Some(format!(
            "invalid handle format '{handle}': handles must start with a letter and contain only letters, numbers, and underscores"
        ))
    } else if reserved {
        Some(format!("'{handle}' is a reserved word and cannot be used as a handle"))
    } else {
        None
    };
    HandleCheck {
        handle: handle.to_string(),
        well_formed,
        reserved,
        available: well_formed && !reserved,
        reason,
    }
}

/// Lower camel case from arbitrary text: `"Blog post-body"` -> `blogPostBody`.
pub fn to_camel_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for (i, word) in text
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .enumerate()
    {
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            if i == 0 {
                out.push(first.to_ascii_lowercase());
            } else {
                out.push(first.to_ascii_uppercase());
            }
            out.extend(chars);
        }
    }
    let leading_letter = out.find(|c: char| c.is_ascii_alphabetic()).unwrap_or(out.len());
    let mut handle = out.split_off(leading_letter);
    if let Some(first) = handle.get_mut(0..1) {
        first.make_ascii_lowercase();
    }
    handle
}

/// Up to three alternative handles that pass [`check_handle`] and `is_available`.
pub fn suggest_handles(base: &str, is_available: impl Fn(&str) -> bool) -> Vec<String> {
    let clean = match to_camel_case(base) {
        s if s.is_empty() => "field".to_string(),
        s => s,
    };
    let mut capitalized = clean.clone();
    if let Some(first) = capitalized.get_mut(0..1) {
        first.make_ascii_uppercase();
    }

    let variations = [
        clean.clone(),
        format!("{clean}2"),
        format!("{clean}Field"),
        format!("{clean}New"),
        format!("new{capitalized}"),
        format!("{clean}{}", Utc::now().year()),
    ];

    let usable = |candidate: &str| check_handle(candidate).available && is_available(candidate);

    let mut suggestions: Vec<String> = Vec::new();
    for candidate in variations {
        if usable(&candidate) && !suggestions.contains(&candidate) {
            suggestions.push(candidate);
            if suggestions.len() >= 3 {
                return suggestions;
            }
        }
    }
    if suggestions.is_empty() {
        for n in 1..=5 {
            let candidate = format!("{clean}{n}");
            if usable(&candidate) {
                suggestions.push(candidate);
                if suggestions.len() >= 3 {
                    break;
                }
            }
        }
    }
    suggestions
}
