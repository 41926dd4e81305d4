//! Saving a generated package as a portal project

use graph_store::backend::{GraphBackend, ProjectDraft};

use crate::error::Result;
use crate::generator::GeneratedPackage;

/// `POST projects` with the manifest and every generated file
///
/// Returns the id of the created project.
pub async fn publish_package(backend: &dyn GraphBackend, package: &GeneratedPackage) -> Result<String> {
    let project = ProjectDraft {
        name: package.name.clone(),
        description: package.manifest.description.clone(),
        manifest: serde_json::to_value(&package.manifest)?,
        files: package.files.clone(),
    };
    let id = backend.create_project(&project).await?;
    log::info!("Published package '{}' as project {}", package.name, id);
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use graph_store::backend::InMemoryBackend;

    use crate::element::{ElementType, RemixElement};
    use crate::error::RemixError;
    use crate::generator::{GenerateOptions, PackageGenerator};

    fn package() -> GeneratedPackage {
        PackageGenerator::new()
            .generate(
                &[RemixElement::new("a", "Banner", ElementType::Component)],
                &GenerateOptions::named("banners"),
            )
            .unwrap()
    }

    #[tokio::test]
    async fn test_publish_creates_project() {
        let backend = InMemoryBackend::new();
        let package = package();
        let id = publish_package(&backend, &package).await.unwrap();

        assert_eq!(id, "project-1");
        let projects = backend.projects();
        assert_eq!(projects[0].name, "banners");
        assert_eq!(projects[0].files, package.files);
        assert_eq!(projects[0].manifest["entry"], "index.ts");
    }

    #[tokio::test]
    async fn test_publish_failure_is_returned() {
        let backend = InMemoryBackend::new();
        backend.set_offline(true);
        let result = publish_package(&backend, &package()).await;
        assert!(matches!(result, Err(RemixError::Backend(_))));
    }
}
