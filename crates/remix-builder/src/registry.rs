//! Lookup of elements outside the current selection

use std::collections::BTreeMap;

use crate::element::RemixElement;

/// Source of element metadata by id
///
/// Consulted by the resolver for dependencies that are neither external
/// packages nor part of the selection.
pub trait ElementRegistry: Send + Sync {
    fn lookup(&self, id: &str) -> Option<RemixElement>;
}

/// Registry backed by a fixed set of elements
#[derive(Debug, Clone, Default)]
pub struct StaticRegistry {
    elements: BTreeMap<String, RemixElement>,
}

impl StaticRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an element
    pub fn insert(&mut self, element: RemixElement) {
        self.elements.insert(element.id.clone(), element);
    }

    pub fn with(mut self, element: RemixElement) -> Self {
        self.insert(element);
        self
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

impl FromIterator<RemixElement> for StaticRegistry {
    fn from_iter<I: IntoIterator<Item = RemixElement>>(iter: I) -> Self {
        let mut registry = Self::new();
        for element in iter {
            registry.insert(element);
        }
        registry
    }
}

impl ElementRegistry for StaticRegistry {
    fn lookup(&self, id: &str) -> Option<RemixElement> {
        self.elements.get(id).cloned()
    }
}
