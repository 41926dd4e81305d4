//! Remix Builder - Package generation from picked code elements
//!
//! Users browse installed packages, drop components, hooks, services and
//! utilities into a [`RemixBasket`], and generate a new package from the
//! selection:
//!
//! ```text
//! RemixBasket ──► resolve_dependencies ──► PackageGenerator ──► GeneratedPackage
//!                      │                                           │
//!               ElementRegistry (optional)          write_zip / to_json_bundle
//!                                                   publish_package (POST projects)
//! ```
//!
//! Unresolvable dependencies never fail a generation; they are reported in
//! [`GeneratedPackage::warnings`].

pub mod archive;
pub mod basket;
pub mod element;
pub mod error;
pub mod generator;
pub mod manifest;
pub mod paths;
pub mod publish;
pub mod registry;
pub mod resolver;

pub use archive::{save_zip, to_json_bundle, to_zip_bytes, write_zip};
pub use basket::RemixBasket;
pub use element::{ElementType, RemixElement};
pub use error::{RemixError, Result};
pub use generator::{GenerateOptions, GeneratedPackage, PackageGenerator};
pub use manifest::PackageManifest;
pub use publish::publish_package;
pub use registry::{ElementRegistry, StaticRegistry};
pub use resolver::{resolve_dependencies, ResolvedDependencies};
