//! Code elements picked from installed packages

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of a remixable element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementType {
    Component,
    Function,
    Hook,
    Type,
    Service,
    Constant,
}

impl ElementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementType::Component => "component",
            ElementType::Function => "function",
            ElementType::Hook => "hook",
            ElementType::Type => "type",
            ElementType::Service => "service",
            ElementType::Constant => "constant",
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A component, hook, service or other unit of code staged for a new package
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemixElement {
    /// Registry id of the element
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub element_type: ElementType,
    /// Package the element was taken from
    #[serde(default)]
    pub source_package: String,
    /// Path of the element inside its source package
    #[serde(default)]
    pub source_path: String,
    /// Ids of other elements or external packages this element needs
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Source text; a placeholder is generated when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default = "Utc::now")]
    pub added_at: DateTime<Utc>,
}

impl RemixElement {
    pub fn new(id: impl Into<String>, name: impl Into<String>, element_type: ElementType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            element_type,
            source_package: String::new(),
            source_path: String::new(),
            dependencies: Vec::new(),
            code: None,
            added_at: Utc::now(),
        }
    }

    pub fn from_package(mut self, package: impl Into<String>, path: impl Into<String>) -> Self {
        self.source_package = package.into();
        self.source_path = path.into();
        self
    }

    pub fn with_dependency(mut self, id: impl Into<String>) -> Self {
        self.dependencies.push(id.into());
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}
