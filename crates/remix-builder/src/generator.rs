//! Package generation from a resolved selection
//!
//! Produces the text files of a new package plus its manifest. Code
//! embedded in an element is copied with its imports rewritten; elements
//! without code get a placeholder so the package still type-checks.
//!
//! Layout of the generated package:
//!
//! ```text
//! index.ts               barrel, default export = first component
//! manifest.json
//! README.md              optional
//! components/{Name}.tsx
//! hooks/{name}.ts
//! services/{name}.ts
//! lib/utils.ts           functions and constants
//! types/index.ts         optional
//! ```

use std::collections::BTreeMap;
use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::element::{ElementType, RemixElement};
use crate::error::{RemixError, Result};
use crate::manifest::{display_name, feature_counts, ManifestDependencies, PackageManifest};
use crate::paths::rewrite_imports;
use crate::registry::ElementRegistry;
use crate::resolver::{resolve_dependencies, ResolvedDependencies};

/// Settings for one generation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateOptions {
    /// npm-style package name
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    pub license: String,
    /// Emit `types/index.ts` for type elements
    pub include_types: bool,
    pub include_readme: bool,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            name: "remix-package".to_string(),
            version: "1.0.0".to_string(),
            description: String::new(),
            author: None,
            icon: None,
            price: None,
            license: "MIT".to_string(),
            include_types: true,
            include_readme: true,
        }
    }
}

impl GenerateOptions {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Output of [`PackageGenerator::generate`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedPackage {
    pub name: String,
    pub version: String,
    pub manifest: PackageManifest,
    /// Relative path -> file content
    pub files: BTreeMap<String, String>,
    /// Dependency ids that could not be resolved and were left out
    pub warnings: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

impl GeneratedPackage {
    pub fn file(&self, path: &str) -> Option<&str> {
        self.files.get(path).map(String::as_str)
    }
}

/// Turns a selection of elements into a package
#[derive(Default)]
pub struct PackageGenerator<'a> {
    registry: Option<&'a dyn ElementRegistry>,
}

impl<'a> PackageGenerator<'a> {
    pub fn new() -> Self {
        Self { registry: None }
    }

    /// Resolve dependencies outside the selection through `registry`
    pub fn with_registry(registry: &'a dyn ElementRegistry) -> Self {
        Self {
            registry: Some(registry),
        }
    }

    /// Generate a package
    ///
    /// Fails only for an empty selection or an invalid name. Unresolvable
    /// dependencies are reported in `warnings`.
    pub fn generate(&self, elements: &[RemixElement], options: &GenerateOptions) -> Result<GeneratedPackage> {
        if elements.is_empty() {
            return Err(RemixError::EmptySelection);
        }
        validate_name(&options.name)?;

        let resolved = resolve_dependencies(elements, self.registry);
        let mut files = BTreeMap::new();
        let mut barrel = Vec::new();

        let components = of_type(&resolved.elements, ElementType::Component);
        let mut component_names = Vec::new();
        for element in &components {
            let name = unique_stem(&files, "components", &identifier(&element.name, true), "tsx");
            let path = format!("components/{}.tsx", name);
            files.insert(path, source_or(element, || component_placeholder(&name)));
            barrel.push(format!("./components/{}", name));
            component_names.push(name);
        }

        for (kind, dir) in [(ElementType::Hook, "hooks"), (ElementType::Service, "services")] {
            for element in of_type(&resolved.elements, kind) {
                let name = unique_stem(&files, dir, &identifier(&element.name, false), "ts");
                let path = format!("{}/{}.ts", dir, name);
                files.insert(path, source_or(element, || module_placeholder(element, &name)));
                barrel.push(format!("./{}/{}", dir, name));
            }
        }

        let utilities: Vec<&RemixElement> = resolved
            .elements
            .iter()
            .filter(|e| matches!(e.element_type, ElementType::Function | ElementType::Constant))
            .collect();
        if !utilities.is_empty() {
            files.insert("lib/utils.ts".to_string(), merged_module(&utilities));
            barrel.push("./lib/utils".to_string());
        }

        let types = of_type(&resolved.elements, ElementType::Type);
        if options.include_types && !types.is_empty() {
            files.insert("types/index.ts".to_string(), merged_module(&types));
            barrel.push("./types".to_string());
        }

        if component_names.is_empty() {
            log::warn!("Package '{}' has no component to use as its default export", options.name);
        }
        files.insert(
            "index.ts".to_string(),
            barrel_file(&options.name, &component_names, &barrel),
        );

        let manifest = build_manifest(options, &resolved, component_names);
        files.insert(
            "manifest.json".to_string(),
            serde_json::to_string_pretty(&manifest)?,
        );

        if options.include_readme {
            files.insert("README.md".to_string(), readme(options, &resolved));
        }

        log::info!(
            "Generated package '{}' with {} files ({} missing dependencies)",
            options.name,
            files.len(),
            resolved.missing.len()
        );

        Ok(GeneratedPackage {
            name: options.name.clone(),
            version: options.version.clone(),
            manifest,
            files,
            warnings: resolved.missing,
            generated_at: Utc::now(),
        })
    }
}

/// npm-style: lowercase letters, digits, `-`, `_`, `.`; optional `@scope/`
fn validate_name(name: &str) -> Result<()> {
    let bare = match name.strip_prefix('@') {
        Some(scoped) => match scoped.split_once('/') {
            Some((scope, rest)) if valid_segment(scope) => rest,
            _ => return Err(RemixError::InvalidName(name.to_string())),
        },
        None => name,
    };
    if valid_segment(bare) && name.len() <= 214 {
        Ok(())
    } else {
        Err(RemixError::InvalidName(name.to_string()))
    }
}

fn valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && !segment.starts_with(['.', '-', '_'])
        && segment
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '_' | '.'))
}

fn of_type(elements: &[RemixElement], kind: ElementType) -> Vec<&RemixElement> {
    elements.iter().filter(|e| e.element_type == kind).collect()
}

/// Identifier from a display name: PascalCase for components, camelCase otherwise
fn identifier(name: &str, pascal: bool) -> String {
    let is_identifier = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if is_identifier {
        if !pascal {
            return name.to_string();
        }
        let mut chars = name.chars();
        return chars
            .next()
            .map(|first| first.to_ascii_uppercase().to_string() + chars.as_str())
            .unwrap_or_default();
    }

    let mut out = String::new();
    for (i, word) in name
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .enumerate()
    {
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            if i == 0 && !pascal {
                out.push(first.to_ascii_lowercase());
            } else {
                out.push(first.to_ascii_uppercase());
            }
            out.extend(chars);
        }
    }
    if out.is_empty() || out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert_str(0, if pascal { "Element" } else { "element" });
    }
    out
}

/// Suffix the stem with a counter if `{dir}/{stem}.{ext}` is taken
fn unique_stem(files: &BTreeMap<String, String>, dir: &str, stem: &str, ext: &str) -> String {
    let taken = |s: &str| files.contains_key(&format!("{}/{}.{}", dir, s, ext));
    if !taken(stem) {
        return stem.to_string();
    }
    (2..)
        .map(|n| format!("{}{}", stem, n))
        .find(|candidate| !taken(candidate))
        .unwrap_or_else(|| stem.to_string())
}

fn source_or(element: &RemixElement, placeholder: impl FnOnce() -> String) -> String {
    match &element.code {
        Some(code) if !code.trim().is_empty() => ensure_newline(rewrite_imports(code)),
        _ => placeholder(),
    }
}

fn ensure_newline(mut text: String) -> String {
    if !text.ends_with('\n') {
        text.push('\n');
    }
    text
}

fn component_placeholder(name: &str) -> String {
    format!(
        "import React from 'react';\n\
         \n\
         export interface {name}Props {{\n\
         \x20 className?: string;\n\
         }}\n\
         \n\
         export default function {name}({{ className }}: {name}Props) {{\n\
         \x20 return <div className={{className}}>{name}</div>;\n\
         }}\n",
        name = name
    )
}

fn module_placeholder(element: &RemixElement, name: &str) -> String {
    match element.element_type {
        ElementType::Hook => format!(
            "import {{ useState }} from 'react';\n\
             \n\
             export function {name}<T>(initial: T) {{\n\
             \x20 const [value, setValue] = useState<T>(initial);\n\
             \x20 return {{ value, setValue }};\n\
             }}\n",
            name = name
        ),
        ElementType::Service => format!(
            "export const {name} = {{\n\
             \x20 async request<T>(path: string, init?: RequestInit): Promise<T> {{\n\
             \x20   const response = await fetch(path, init);\n\
             \x20   return response.json() as Promise<T>;\n\
             \x20 }},\n\
             }};\n",
            name = name
        ),
        _ => format!("export {{}}; // {}\n", name),
    }
}

/// Merge several elements into one module, one section per element
fn merged_module(elements: &[&RemixElement]) -> String {
    let mut out = String::new();
    for element in elements {
        let _ = writeln!(out, "// {} ({})", element.name, source_label(element));
        match &element.code {
            Some(code) if !code.trim().is_empty() => {
                out.push_str(&ensure_newline(rewrite_imports(code)));
            }
            _ => {
                let name = identifier(&element.name, element.element_type == ElementType::Type);
                let stub = match element.element_type {
                    ElementType::Type => format!("export type {} = Record<string, unknown>;\n", name),
                    ElementType::Constant => format!("export const {} = undefined;\n", name),
                    _ => format!(
                        "export function {}(...args: unknown[]): unknown {{\n  return args[0];\n}}\n",
                        name
                    ),
                };
                out.push_str(&stub);
            }
        }
        out.push('\n');
    }
    out
}

fn source_label(element: &RemixElement) -> String {
    match (element.source_package.is_empty(), element.source_path.is_empty()) {
        (false, false) => format!("{}/{}", element.source_package, element.source_path),
        (false, true) => element.source_package.clone(),
        _ => "custom".to_string(),
    }
}

/// Barrel with exactly one default export. Every component is also
/// re-exported by name since `export *` skips default exports.
fn barrel_file(package: &str, components: &[String], modules: &[String]) -> String {
    let mut out = format!("// {} entry point\n", package);
    if let Some(component) = components.first() {
        let _ = writeln!(out, "export {{ default }} from './components/{}';", component);
    }
    for component in components {
        let _ = writeln!(
            out,
            "export {{ default as {} }} from './components/{}';",
            component, component
        );
    }
    for module in modules {
        let _ = writeln!(out, "export * from '{}';", module);
    }
    out
}

fn build_manifest(
    options: &GenerateOptions,
    resolved: &ResolvedDependencies,
    components: Vec<String>,
) -> PackageManifest {
    let mut packages: Vec<String> = resolved
        .elements
        .iter()
        .filter(|e| !e.source_package.is_empty())
        .map(|e| e.source_package.clone())
        .collect();
    packages.sort();
    packages.dedup();

    let mut tags = vec!["remix".to_string()];
    tags.extend(packages.iter().cloned());

    PackageManifest {
        name: options.name.clone(),
        version: options.version.clone(),
        package_type: "remix".to_string(),
        display_name: display_name(&options.name),
        description: options.description.clone(),
        entry: "index.ts".to_string(),
        icon: options.icon.clone(),
        components,
        permissions: Vec::new(),
        tags,
        author: options.author.clone(),
        license: options.license.clone(),
        price: options.price,
        features: feature_counts(&resolved.elements),
        dependencies: ManifestDependencies {
            npm: resolved.external.clone(),
            python: BTreeMap::new(),
            packages,
        },
        created_at: Utc::now(),
    }
}

fn readme(options: &GenerateOptions, resolved: &ResolvedDependencies) -> String {
    let mut out = format!("# {}\n\n", display_name(&options.name));
    if !options.description.is_empty() {
        let _ = writeln!(out, "{}\n", options.description);
    }

    out.push_str("## Contents\n\n");
    for element in &resolved.elements {
        let _ = writeln!(
            out,
            "- **{}** ({}) from `{}`",
            element.name,
            element.element_type,
            source_label(element)
        );
    }

    if !resolved.external.is_empty() {
        out.push_str("\n## Dependencies\n\n");
        for (package, version) in &resolved.external {
            let _ = writeln!(out, "- `{}` {}", package, version);
        }
    }

    if !resolved.missing.is_empty() {
        out.push_str("\n## Not included\n\n");
        for id in &resolved.missing {
            let _ = writeln!(out, "- `{}`", id);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::StaticRegistry;

    fn component(id: &str, name: &str) -> RemixElement {
        RemixElement::new(id, name, ElementType::Component).from_package("crm", format!("src/{}.tsx", name))
    }

    fn selection() -> Vec<RemixElement> {
        vec![
            RemixElement::new("fmt", "formatPhone", ElementType::Function)
                .from_package("crm", "src/lib/phone.ts")
                .with_code("export function formatPhone(p: string) { return p.trim(); }"),
            component("card", "Contact Card")
                .with_dependency("react")
                .with_dependency("fmt")
                .with_code("import { formatPhone } from '@/lib/utils';\nexport default function ContactCard() { return null; }"),
            component("list", "ContactList").with_dependency("card"),
            component("badge", "StatusBadge"),
            RemixElement::new("useContacts", "useContacts", ElementType::Hook)
                .from_package("billing", "src/hooks/useContacts.ts")
                .with_dependency("zustand"),
            RemixElement::new("api", "Contacts API", ElementType::Service),
            RemixElement::new("contact", "Contact", ElementType::Type),
        ]
    }

    #[test]
    fn test_missing_dependency_is_a_warning() {
        let _ = env_logger::builder().is_test(true).try_init();
        let elements = vec![
            component("a", "Alpha").with_dependency("ghost-element"),
            component("b", "Beta").with_dependency("react"),
        ];
        let package = PackageGenerator::new()
            .generate(&elements, &GenerateOptions::named("alpha-kit"))
            .unwrap();

        assert_eq!(package.warnings, vec!["ghost-element"]);
        assert!(package.file("components/Alpha.tsx").is_some());
        assert!(package.file("components/Beta.tsx").is_some());
        assert!(package.file("README.md").unwrap().contains("ghost-element"));
    }

    #[test]
    fn test_barrel_has_exactly_one_default_export() {
        let package = PackageGenerator::new()
            .generate(&selection(), &GenerateOptions::named("crm-widgets"))
            .unwrap();
        let barrel = package.file("index.ts").unwrap();

        let defaults: Vec<&str> = barrel
            .lines()
            .filter(|l| l.starts_with("export { default }"))
            .collect();
        assert_eq!(
            defaults,
            vec!["export { default } from './components/ContactCard';"]
        );
        assert!(barrel.contains("export * from './components/ContactList';"));
        assert!(barrel.contains("export * from './hooks/useContacts';"));
        assert!(barrel.contains("export * from './services/contactsAPI';"));
        assert!(barrel.contains("export * from './lib/utils';"));
        assert!(barrel.contains("export * from './types';"));
    }

    #[test]
    fn test_every_component_is_exported_by_name() {
        let package = PackageGenerator::new()
            .generate(&selection(), &GenerateOptions::named("crm-widgets"))
            .unwrap();
        let barrel = package.file("index.ts").unwrap();

        assert_eq!(
            package.manifest.components,
            vec!["ContactCard", "ContactList", "StatusBadge"]
        );
        for name in &package.manifest.components {
            let line = format!("export {{ default as {} }} from './components/{}';", name, name);
            assert!(barrel.contains(&line), "missing named export for {}", name);
        }
    }

    #[test]
    fn test_file_layout_and_rewrites() {
        let package = PackageGenerator::new()
            .generate(&selection(), &GenerateOptions::named("crm-widgets"))
            .unwrap();

        let paths: Vec<&str> = package.files.keys().map(String::as_str).collect();
        assert_eq!(
            paths,
            vec![
                "README.md",
                "components/ContactCard.tsx",
                "components/ContactList.tsx",
                "components/StatusBadge.tsx",
                "hooks/useContacts.ts",
                "index.ts",
                "lib/utils.ts",
                "manifest.json",
                "services/contactsAPI.ts",
                "types/index.ts",
            ]
        );

        let card = package.file("components/ContactCard.tsx").unwrap();
        assert!(card.contains("from '../lib/utils'"));

        let list = package.file("components/ContactList.tsx").unwrap();
        assert!(list.contains("export default function ContactList"));

        assert!(package
            .file("lib/utils.ts")
            .unwrap()
            .contains("// formatPhone (crm/src/lib/phone.ts)"));
    }

    #[test]
    fn test_manifest_contents() {
        let options = GenerateOptions {
            author: Some("dev-1".to_string()),
            description: "Contact widgets".to_string(),
            ..GenerateOptions::named("crm-widgets")
        };
        let package = PackageGenerator::new().generate(&selection(), &options).unwrap();
        let manifest = &package.manifest;

        assert_eq!(manifest.display_name, "Crm Widgets");
        assert_eq!(manifest.entry, "index.ts");
        assert_eq!(manifest.components[0], "ContactCard");
        assert_eq!(manifest.tags, vec!["remix", "billing", "crm"]);
        assert_eq!(manifest.dependencies.packages, vec!["billing", "crm"]);
        assert_eq!(
            manifest.dependencies.npm.keys().collect::<Vec<_>>(),
            vec!["react", "zustand"]
        );
        assert_eq!(
            manifest.features,
            vec![
                "3 components",
                "1 hook",
                "1 service",
                "1 utility function",
                "1 type definition"
            ]
        );

        let written: PackageManifest =
            serde_json::from_str(package.file("manifest.json").unwrap()).unwrap();
        assert_eq!(&written, manifest);
    }

    #[test]
    fn test_optional_files() {
        let options = GenerateOptions {
            include_types: false,
            include_readme: false,
            ..GenerateOptions::named("bare")
        };
        let package = PackageGenerator::new().generate(&selection(), &options).unwrap();
        assert!(package.file("types/index.ts").is_none());
        assert!(package.file("README.md").is_none());
        assert!(!package.file("index.ts").unwrap().contains("./types"));
    }

    #[test]
    fn test_no_component_means_no_default() {
        let elements = vec![RemixElement::new("k", "MAX_ITEMS", ElementType::Constant)];
        let package = PackageGenerator::new()
            .generate(&elements, &GenerateOptions::named("limits"))
            .unwrap();
        assert!(!package.file("index.ts").unwrap().contains("default"));
        assert!(package.manifest.components.is_empty());
    }

    #[test]
    fn test_registry_dependencies_are_generated() {
        let registry = StaticRegistry::new().with(
            RemixElement::new("shared/useDebounce", "useDebounce", ElementType::Hook).from_package("shared", "hooks.ts"),
        );
        let elements = vec![component("search", "SearchBox").with_dependency("shared/useDebounce")];
        let package = PackageGenerator::with_registry(&registry)
            .generate(&elements, &GenerateOptions::named("search"))
            .unwrap();

        assert!(package.warnings.is_empty());
        assert!(package.file("hooks/useDebounce.ts").is_some());
    }

    #[test]
    fn test_errors() {
        let generator = PackageGenerator::new();
        assert!(matches!(
            generator.generate(&[], &GenerateOptions::default()),
            Err(RemixError::EmptySelection)
        ));
        for bad in ["", "Upper", "has space", "-dash", "@scope", "@/x"] {
            assert!(
                matches!(
                    generator.generate(&selection(), &GenerateOptions::named(bad)),
                    Err(RemixError::InvalidName(_))
                ),
                "{:?} should be rejected",
                bad
            );
        }
        assert!(generator
            .generate(&selection(), &GenerateOptions::named("@acme/crm-widgets"))
            .is_ok());
    }

    #[test]
    fn test_duplicate_names_get_suffixes() {
        let elements = vec![component("a", "Panel"), component("b", "Panel")];
        let package = PackageGenerator::new()
            .generate(&elements, &GenerateOptions::named("panels"))
            .unwrap();
        assert!(package.file("components/Panel.tsx").is_some());
        assert!(package.file("components/Panel2.tsx").is_some());
    }
}
