//! `manifest.json` of a generated package

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::element::{ElementType, RemixElement};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManifestDependencies {
    /// npm package -> version range
    #[serde(default)]
    pub npm: BTreeMap<String, String>,
    #[serde(default)]
    pub python: BTreeMap<String, String>,
    /// Portal packages the elements were taken from
    #[serde(default)]
    pub packages: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageManifest {
    pub name: String,
    pub version: String,
    #[serde(rename = "type")]
    pub package_type: String,
    pub display_name: String,
    pub description: String,
    /// Barrel file loaded by the portal
    pub entry: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Component names, default export first
    pub components: Vec<String>,
    pub permissions: Vec<String>,
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    pub license: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    /// Human-readable counts such as `"2 components"`
    pub features: Vec<String>,
    pub dependencies: ManifestDependencies,
    pub created_at: DateTime<Utc>,
}

/// `"support-widgets"` -> `"Support Widgets"`
pub fn display_name(package_name: &str) -> String {
    package_name
        .split(|c: char| c == '-' || c == '_' || c == '.' || c == '/')
        .filter(|w| !w.is_empty() && !w.starts_with('@'))
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Count strings for every element type present, in a fixed order
pub fn feature_counts(elements: &[RemixElement]) -> Vec<String> {
    const LABELS: &[(ElementType, &str, &str)] = &[
        (ElementType::Component, "component", "components"),
        (ElementType::Hook, "hook", "hooks"),
        (ElementType::Service, "service", "services"),
        (ElementType::Function, "utility function", "utility functions"),
        (ElementType::Constant, "constant", "constants"),
        (ElementType::Type, "type definition", "type definitions"),
    ];

    LABELS
        .iter()
        .filter_map(|(kind, singular, plural)| {
            let count = elements.iter().filter(|e| e.element_type == *kind).count();
            match count {
                0 => None,
                1 => Some(format!("1 {}", singular)),
                n => Some(format!("{} {}", n, plural)),
            }
        })
        .collect()
}
