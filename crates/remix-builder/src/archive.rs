//! Packaging a generated package for download

use std::io::{Cursor, Seek, Write};
use std::path::{Path, PathBuf};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::Result;
use crate::generator::GeneratedPackage;

/// Write every file of `package` into a deflated zip archive
pub fn write_zip<W: Write + Seek>(package: &GeneratedPackage, writer: W) -> Result<W> {
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o644);

    let mut zip = ZipWriter::new(writer);
    for (path, contents) in &package.files {
        zip.start_file(path.as_str(), options)?;
        zip.write_all(contents.as_bytes())?;
    }
    Ok(zip.finish()?)
}

/// The archive as an in-memory buffer
pub fn to_zip_bytes(package: &GeneratedPackage) -> Result<Vec<u8>> {
    let cursor = write_zip(package, Cursor::new(Vec::new()))?;
    Ok(cursor.into_inner())
}

/// Write `{dir}/{name}-{version}.zip`, creating `dir` if needed
pub fn save_zip(package: &GeneratedPackage, dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let file_name = format!("{}-{}.zip", package.name.replace('/', "-").trim_start_matches('@'), package.version);
    let path = dir.join(file_name);
    let file = std::fs::File::create(&path)?;
    write_zip(package, file)?;
    log::info!("Saved package archive to {:?}", path);
    Ok(path)
}

/// The whole package, manifest and files included, as pretty JSON
pub fn to_json_bundle(package: &GeneratedPackage) -> Result<String> {
    Ok(serde_json::to_string_pretty(package)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    use crate::element::{ElementType, RemixElement};
    use crate::generator::{GenerateOptions, PackageGenerator};

    fn package() -> GeneratedPackage {
        let elements = vec![
            RemixElement::new("a", "Gauge", ElementType::Component).with_dependency("recharts"),
            RemixElement::new("b", "useTicker", ElementType::Hook),
        ];
        PackageGenerator::new()
            .generate(&elements, &GenerateOptions::named("@acme/gauges"))
            .unwrap()
    }

    #[test]
    fn test_zip_contains_all_files() {
        let package = package();
        let bytes = to_zip_bytes(&package).unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), package.files.len());

        for name in ["index.ts", "manifest.json", "README.md"] {
            let mut contents = String::new();
            archive
                .by_name(name)
                .unwrap()
                .read_to_string(&mut contents)
                .unwrap();
            assert_eq!(contents, package.files[name], "{}", name);
        }
    }

    #[test]
    fn test_save_zip() {
        let dir = tempfile::tempdir().unwrap();
        let path = save_zip(&package(), dir.path()).unwrap();
        assert_eq!(path.file_name().unwrap(), "acme-gauges-1.0.0.zip");

        let file = std::fs::File::open(&path).unwrap();
        let archive = zip::ZipArchive::new(file).unwrap();
        assert!(archive.file_names().any(|n| n == "components/Gauge.tsx"));
    }

    #[test]
    fn test_json_bundle() {
        let package = package();
        let bundle: serde_json::Value = serde_json::from_str(&to_json_bundle(&package).unwrap()).unwrap();
        assert_eq!(bundle["name"], "@acme/gauges");
        assert_eq!(bundle["manifest"]["dependencies"]["npm"]["recharts"], "^2.10.0");
        assert!(bundle["files"]["hooks/useTicker.ts"].is_string());
    }
}
