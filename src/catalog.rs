use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use walkdir::WalkDir;

use crate::errors::BenchError;
use crate::types::FileTree;

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogManifest {
    pub templates: Vec<TemplateEntry>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TemplateEntry {
    pub id: String,
    /// Location of the template, relative to the catalog.
    pub path: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Source of base templates.
#[async_trait]
pub trait TemplateCatalog: Send + Sync {
    async fn manifest(&self) -> Result<CatalogManifest>;

    /// Fetch a template's files. Directories and non-UTF-8 files are not
    /// represented in the returned tree.
    async fn download(&self, entry: &TemplateEntry) -> Result<FileTree>;
}

/// Look up `id` in the catalog and fetch its files.
pub async fn fetch_template(catalog: &dyn TemplateCatalog, id: &str) -> Result<FileTree> {
    let manifest = catalog.manifest().await?;
    let entry = manifest
        .templates
        .iter()
        .find(|t| t.id == id)
        .ok_or_else(|| BenchError::TemplateNotFound { id: id.to_string() })?;

    let tree = catalog.download(entry).await?;
    tracing::debug!(template = %entry.id, files = tree.len(), "fetched template");
    Ok(tree)
}

/// A catalog on the local filesystem: `<root>/manifest.json` lists the
/// templates, each a directory under `<root>`.
pub struct DirectoryCatalog {
    root: PathBuf,
}

impl DirectoryCatalog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl TemplateCatalog for DirectoryCatalog {
    async fn manifest(&self) -> Result<CatalogManifest> {
        let path = self.root.join("manifest.json");
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read template catalog {}", path.display()))?;
        let manifest = serde_json::from_str(&text)
            .with_context(|| format!("Invalid template catalog {}", path.display()))?;
        Ok(manifest)
    }

    async fn download(&self, entry: &TemplateEntry) -> Result<FileTree> {
        read_tree(&self.root.join(&entry.path))
    }
}

/// Read every regular UTF-8 file under `dir` into a tree keyed by relative
/// path. Symlinks are not followed.
pub fn read_tree(dir: &Path) -> Result<FileTree> {
    let mut tree = FileTree::new();

    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to walk template {}", dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let bytes = std::fs::read(entry.path())
            .with_context(|| format!("Failed to read {}", entry.path().display()))?;
        let Ok(text) = String::from_utf8(bytes) else {
            tracing::debug!("skipping binary template file {}", entry.path().display());
            continue;
        };

        let rel = entry.path().strip_prefix(dir)?;
        let key = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        tree.insert(key, text);
    }

    Ok(tree)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn setup_catalog(root: &Path) {
        fs::write(
            root.join("manifest.json"),
            r#"{"templates":[
                {"id":"node-startup","path":"node","description":"Node task"},
                {"id":"other","path":"other"}
            ]}"#,
        )
        .unwrap();
        let node = root.join("node");
        fs::create_dir_all(node.join("src")).unwrap();
        fs::write(node.join("package.json"), "{}").unwrap();
        fs::write(node.join("src").join("index.mjs"), "export {}\n").unwrap();
        fs::write(node.join("logo.png"), [0x89u8, 0x50, 0xff, 0xfe]).unwrap();
    }

    #[tokio::test]
    async fn fetches_template_by_id() {
        let tmp = assert_fs::TempDir::new().unwrap();
        setup_catalog(tmp.path());
        let catalog = DirectoryCatalog::new(tmp.path());

        let tree = fetch_template(&catalog, "node-startup").await.unwrap();
        let paths: Vec<&str> = tree.keys().map(String::as_str).collect();
        assert_eq!(paths, vec!["package.json", "src/index.mjs"]);
        assert_eq!(tree["src/index.mjs"], "export {}\n");
    }

    #[tokio::test]
    async fn unknown_template_id() {
        let tmp = assert_fs::TempDir::new().unwrap();
        setup_catalog(tmp.path());
        let catalog = DirectoryCatalog::new(tmp.path());

        let err = fetch_template(&catalog, "python").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BenchError>(),
            Some(BenchError::TemplateNotFound { id }) if id == "python"
        ));
    }

    #[tokio::test]
    async fn missing_manifest_is_an_error() {
        let tmp = assert_fs::TempDir::new().unwrap();
        let catalog = DirectoryCatalog::new(tmp.path());
        let err = catalog.manifest().await.unwrap_err();
        assert!(err.to_string().contains("manifest.json"));
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_not_included() {
        use std::os::unix::fs as unix_fs;

        let tmp = assert_fs::TempDir::new().unwrap();
        let dir = tmp.path().join("tpl");
        fs::create_dir_all(&dir).unwrap();
        fs::write(tmp.path().join("secret.txt"), "outside").unwrap();
        unix_fs::symlink(tmp.path().join("secret.txt"), dir.join("link.txt")).unwrap();
        fs::write(dir.join("real.txt"), "inside").unwrap();

        let tree = read_tree(&dir).unwrap();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree["real.txt"], "inside");
    }
}
