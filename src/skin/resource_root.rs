//! One filesystem-directory-to-URL-prefix binding.

use std::path::{Path, PathBuf};

/// Binds one directory tree to one public URL prefix.
///
/// Immutable after construction. Resolution is pure concatenation; absence is
/// reported by [`exists`](ResourceRoot::exists), never as an error.
#[derive(Debug, Clone)]
pub struct ResourceRoot {
    dir: PathBuf,
    href: String,
}

impl ResourceRoot {
    pub fn new(dir: impl Into<PathBuf>, href: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            href: href.into(),
        }
    }

    /// Directory this root serves from.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Public URL prefix this root serves under.
    pub fn href(&self) -> &str {
        &self.href
    }

    /// Whether `rel` exists under this root's directory.
    pub fn exists(&self, rel: &str) -> bool {
        self.resource_path(rel).exists()
    }

    /// Absolute path for `rel` under this root. Does not check existence.
    pub fn resource_path(&self, rel: &str) -> PathBuf {
        self.dir.join(rel)
    }

    /// Public URL for `rel` under this root's prefix.
    pub fn url(&self, rel: &str) -> String {
        format!("{}/{}", self.href, rel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_resource_path_is_pure_concatenation() {
        let root = ResourceRoot::new("/srv/app/skin", "app_skin");
        assert_eq!(
            root.resource_path("css/style.css"),
            PathBuf::from("/srv/app/skin/css/style.css")
        );
    }

    #[test]
    fn test_url_prefixes_href() {
        let root = ResourceRoot::new("/srv/app/skin", "app_skin");
        assert_eq!(root.url("js/app.js"), "app_skin/js/app.js");
    }

    #[test]
    fn test_exists_reports_presence() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("style.css"), "body {}").unwrap();

        let root = ResourceRoot::new(dir.path(), "skin");
        assert!(root.exists("style.css"));
        assert!(!root.exists("missing.css"));
    }
}
