//! The user's selection of elements for a new package
//!
//! Insertion order is kept; re-adding an element replaces it in place.

use std::collections::BTreeSet;

use graph_store::storage::{load_json, save_json, LocalStorage};

use crate::element::RemixElement;
use crate::error::Result;

/// Local storage key for the persisted basket
pub const BASKET_STORAGE_KEY: &str = "remix.basket";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemixBasket {
    items: Vec<RemixElement>,
}

impl RemixBasket {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an element. Returns false if it replaced one with the same id.
    pub fn add(&mut self, element: RemixElement) -> bool {
        match self.items.iter_mut().find(|e| e.id == element.id) {
            Some(existing) => {
                *existing = element;
                false
            }
            None => {
                log::debug!("Added '{}' to the remix basket", element.id);
                self.items.push(element);
                true
            }
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<RemixElement> {
        let index = self.items.iter().position(|e| e.id == id)?;
        Some(self.items.remove(index))
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn get(&self, id: &str) -> Option<&RemixElement> {
        self.items.iter().find(|e| e.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RemixElement> {
        self.items.iter()
    }

    pub fn elements(&self) -> &[RemixElement] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Distinct source packages, sorted
    pub fn source_packages(&self) -> Vec<String> {
        self.items
            .iter()
            .filter(|e| !e.source_package.is_empty())
            .map(|e| e.source_package.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Restore the basket saved under [`BASKET_STORAGE_KEY`], empty if none
    pub fn load(storage: &dyn LocalStorage) -> Self {
        Self {
            items: load_json(storage, BASKET_STORAGE_KEY).unwrap_or_default(),
        }
    }

    pub fn save(&self, storage: &dyn LocalStorage) -> Result<()> {
        save_json(storage, BASKET_STORAGE_KEY, &self.items)?;
        Ok(())
    }
}

impl<'a> IntoIterator for &'a RemixBasket {
    type Item = &'a RemixElement;
    type IntoIter = std::slice::Iter<'a, RemixElement>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::ElementType;
    use graph_store::storage::MemoryStorage;

    #[test]
    fn test_add_overwrites_in_place() {
        let mut basket = RemixBasket::new();
        assert!(basket.add(RemixElement::new("a", "Alpha", ElementType::Component)));
        assert!(basket.add(RemixElement::new("b", "Beta", ElementType::Hook)));
        assert!(!basket.add(RemixElement::new("a", "Alpha v2", ElementType::Component)));

        let names: Vec<&str> = basket.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Alpha v2", "Beta"]);
    }

    #[test]
    fn test_remove_and_clear() {
        let mut basket = RemixBasket::new();
        basket.add(RemixElement::new("a", "Alpha", ElementType::Function));
        basket.add(RemixElement::new("b", "Beta", ElementType::Function));
        assert_eq!(basket.remove("a").unwrap().name, "Alpha");
        assert!(basket.remove("a").is_none());
        assert_eq!(basket.len(), 1);
        basket.clear();
        assert!(basket.is_empty());
    }

    #[test]
    fn test_source_packages() {
        let mut basket = RemixBasket::new();
        basket.add(RemixElement::new("a", "A", ElementType::Component).from_package("crm", "a.tsx"));
        basket.add(RemixElement::new("b", "B", ElementType::Service).from_package("billing", "b.ts"));
        basket.add(RemixElement::new("c", "C", ElementType::Hook).from_package("crm", "c.ts"));
        assert_eq!(basket.source_packages(), vec!["billing", "crm"]);
    }

    #[test]
    fn test_save_and_load() {
        let storage = MemoryStorage::new();
        assert!(RemixBasket::load(&storage).is_empty());

        let mut basket = RemixBasket::new();
        basket.add(RemixElement::new("a", "Alpha", ElementType::Constant).with_code("export const A = 1;"));
        basket.save(&storage).unwrap();

        let restored = RemixBasket::load(&storage);
        assert_eq!(restored, basket);
    }
}
