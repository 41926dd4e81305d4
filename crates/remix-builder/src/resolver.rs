//! Dependency closure over a selection of elements

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::element::RemixElement;
use crate::registry::ElementRegistry;

/// Runtime packages a generated package may depend on, with the version
/// range written into its manifest
pub const EXTERNAL_PACKAGES: &[(&str, &str)] = &[
    ("react", "^18.2.0"),
    ("react-dom", "^18.2.0"),
    ("lucide-react", "^0.300.0"),
    ("framer-motion", "^10.16.0"),
    ("recharts", "^2.10.0"),
    ("date-fns", "^3.0.0"),
    ("axios", "^1.6.0"),
    ("zustand", "^4.4.0"),
    ("clsx", "^2.0.0"),
    ("tailwind-merge", "^2.2.0"),
];

/// Version range for an allow-listed package, matching subpath imports
/// such as `date-fns/format`
pub fn external_version(id: &str) -> Option<&'static str> {
    EXTERNAL_PACKAGES
        .iter()
        .find(|(name, _)| {
            id == *name
                || id
                    .strip_prefix(name)
                    .is_some_and(|rest| rest.starts_with('/'))
        })
        .map(|(_, version)| *version)
}

pub fn is_external(id: &str) -> bool {
    external_version(id).is_some()
}

/// Result of [`resolve_dependencies`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedDependencies {
    /// The selection in its original order, followed by elements pulled in
    /// from the registry in discovery order
    pub elements: Vec<RemixElement>,
    /// External packages and their version ranges
    pub external: BTreeMap<String, String>,
    /// Ids that could not be resolved, deduplicated, in discovery order
    pub missing: Vec<String>,
}

struct Resolver<'a> {
    known: HashMap<String, RemixElement>,
    registry: Option<&'a dyn ElementRegistry>,
    visited: HashSet<String>,
    pulled: Vec<RemixElement>,
    external: BTreeMap<String, String>,
    missing: Vec<String>,
}

impl Resolver<'_> {
    fn visit(&mut self, id: &str) {
        if !self.visited.insert(id.to_string()) {
            return;
        }
        let Some(dependencies) = self.known.get(id).map(|e| e.dependencies.clone()) else {
            return;
        };

        for dep in dependencies {
            if let Some(version) = external_version(&dep) {
                let package = dep.split('/').next().unwrap_or(&dep).to_string();
                self.external.insert(package, version.to_string());
            } else if self.known.contains_key(&dep) {
                self.visit(&dep);
            } else if let Some(found) = self.registry.and_then(|r| r.lookup(&dep)) {
                log::debug!("Pulled '{}' in from the registry", dep);
                self.known.insert(dep.clone(), found.clone());
                self.pulled.push(found);
                self.visit(&dep);
            } else if !self.missing.contains(&dep) {
                log::warn!("Dependency '{}' of '{}' could not be resolved", dep, id);
                self.missing.push(dep);
            }
        }
    }
}

/// Compute the closure of `elements` over their dependency ids
///
/// External packages are collected but not expanded. Ids that are neither
/// external, selected, nor found in `registry` end up in `missing`.
pub fn resolve_dependencies(
    elements: &[RemixElement],
    registry: Option<&dyn ElementRegistry>,
) -> ResolvedDependencies {
    let mut resolver = Resolver {
        known: elements.iter().map(|e| (e.id.clone(), e.clone())).collect(),
        registry,
        visited: HashSet::new(),
        pulled: Vec::new(),
        external: BTreeMap::new(),
        missing: Vec::new(),
    };

    for element in elements {
        resolver.visit(&element.id);
    }

    let mut seen = BTreeSet::new();
    let resolved: Vec<RemixElement> = elements
        .iter()
        .cloned()
        .chain(resolver.pulled)
        .filter(|e| seen.insert(e.id.clone()))
        .collect();

    ResolvedDependencies {
        elements: resolved,
        external: resolver.external,
        missing: resolver.missing,
    }
}
