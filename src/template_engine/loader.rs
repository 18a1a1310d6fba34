//! Template compilation and the shared, process-wide template cache.
//!
//! Each source file compiles into its own single-template Tera instance,
//! registered under the absolute path so engine errors name the file. The
//! cache is keyed by absolute path: in production an entry is permanent for
//! the process lifetime; in development every access stats the source and
//! recompiles when it changed.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::SystemTime;

use tera::{Context, Tera};

use super::filters;
use super::macros::scan_macros;
use crate::config::RunMode;

const INLINE_TEMPLATE_NAME: &str = "__veneer_inline__";

/// A compiled template plus the macro table extracted from its source.
#[derive(Debug)]
pub struct CompiledTemplate {
    path: PathBuf,
    name: String,
    modified: SystemTime,
    tera: Tera,
    macros: HashMap<String, Vec<String>>,
}

impl CompiledTemplate {
    fn compile(path: &Path) -> Result<Self, TemplateError> {
        let source = std::fs::read_to_string(path).map_err(|e| TemplateError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let modified = source_modified(path)?;

        let name = path.display().to_string();
        let mut tera = Tera::default();
        filters::register(&mut tera);
        tera.add_raw_template(&name, &source)
            .map_err(|e| TemplateError::Compile {
                path: path.to_path_buf(),
                source: e,
            })?;

        Ok(Self {
            path: path.to_path_buf(),
            name,
            modified,
            tera,
            macros: scan_macros(&source),
        })
    }

    /// Absolute source path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Name the template is registered under (the absolute path string).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Render with the given context. Engine errors propagate wrapped,
    /// never reinterpreted.
    pub fn render(&self, context: &Context) -> Result<String, TemplateError> {
        self.tera
            .render(&self.name, context)
            .map_err(|e| TemplateError::Render {
                name: self.name.clone(),
                source: e,
            })
    }

    /// Render a one-off template body against a clone of this template's
    /// engine, so the body can import this template by name.
    pub(crate) fn render_inline(
        &self,
        body: &str,
        context: &Context,
    ) -> Result<String, TemplateError> {
        let mut inline = self.tera.clone();
        inline
            .add_raw_template(INLINE_TEMPLATE_NAME, body)
            .map_err(|e| TemplateError::Compile {
                path: self.path.clone(),
                source: e,
            })?;
        inline
            .render(INLINE_TEMPLATE_NAME, context)
            .map_err(|e| TemplateError::Render {
                name: self.name.clone(),
                source: e,
            })
    }

    /// Macro name → declared parameter names, as scanned from the source.
    pub(crate) fn macro_table(&self) -> &HashMap<String, Vec<String>> {
        &self.macros
    }
}

/// Process-wide template cache shared by every skin.
///
/// Population happens under the write lock with insert-if-absent semantics: a
/// lost compile race costs one redundant compile and never exposes a
/// half-built entry, since entries are fully constructed before insertion.
#[derive(Debug)]
pub struct TemplateCache {
    mode: RunMode,
    templates: RwLock<HashMap<PathBuf, Arc<CompiledTemplate>>>,
}

impl TemplateCache {
    pub fn new(mode: RunMode) -> Self {
        Self {
            mode,
            templates: RwLock::new(HashMap::new()),
        }
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    /// Return the compiled template for `path`, compiling on first use.
    ///
    /// Development mode rechecks the source's modification time on every
    /// access and recompiles in place when it is newer than the cached
    /// compile; production mode never rechecks.
    pub fn load(&self, path: &Path) -> Result<Arc<CompiledTemplate>, TemplateError> {
        let cached = {
            let templates = self.templates.read().expect("template cache lock poisoned");
            templates.get(path).cloned()
        };

        if let Some(template) = cached {
            if !self.mode.is_development() {
                return Ok(template);
            }
            return self.recheck(template);
        }

        let compiled = Arc::new(CompiledTemplate::compile(path)?);
        let mut templates = self.templates.write().expect("template cache lock poisoned");
        let entry = templates
            .entry(path.to_path_buf())
            .or_insert(compiled)
            .clone();
        Ok(entry)
    }

    /// Development-mode staleness check: cheap stat, recompile if newer.
    fn recheck(
        &self,
        cached: Arc<CompiledTemplate>,
    ) -> Result<Arc<CompiledTemplate>, TemplateError> {
        let modified = source_modified(&cached.path)?;
        if modified <= cached.modified {
            return Ok(cached);
        }

        tracing::debug!(path = %cached.path.display(), "template source changed, recompiling");
        let fresh = Arc::new(CompiledTemplate::compile(&cached.path)?);
        self.templates
            .write()
            .expect("template cache lock poisoned")
            .insert(fresh.path.clone(), fresh.clone());
        Ok(fresh)
    }
}

fn source_modified(path: &Path) -> Result<SystemTime, TemplateError> {
    let metadata = std::fs::metadata(path).map_err(|e| TemplateError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    metadata.modified().map_err(|e| TemplateError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}

#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("failed to read template {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to compile template {path}: {source}")]
    Compile { path: PathBuf, source: tera::Error },
    #[error("failed to render template {name}: {source}")]
    Render { name: String, source: tera::Error },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;

    fn write_template(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, body).unwrap();
        path
    }

    /// Rewrite a file and push its mtime forward so staleness checks see the
    /// change regardless of filesystem timestamp granularity.
    fn rewrite_newer(path: &Path, body: &str) {
        fs::write(path, body).unwrap();
        let file = fs::File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() + Duration::from_secs(10))
            .unwrap();
    }

    #[test]
    fn test_compile_and_render() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_template(dir.path(), "page.html", "Hello {{ who }}!");

        let cache = TemplateCache::new(RunMode::Production);
        let template = cache.load(&path).unwrap();

        let mut context = Context::new();
        context.insert("who", "world");
        assert_eq!(template.render(&context).unwrap(), "Hello world!");
    }

    #[test]
    fn test_cache_returns_same_compile() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_template(dir.path(), "page.html", "static");

        let cache = TemplateCache::new(RunMode::Production);
        let first = cache.load(&path).unwrap();
        let second = cache.load(&path).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_production_never_recompiles() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_template(dir.path(), "page.html", "version one");

        let cache = TemplateCache::new(RunMode::Production);
        cache.load(&path).unwrap();

        rewrite_newer(&path, "version two");
        let template = cache.load(&path).unwrap();
        assert_eq!(template.render(&Context::new()).unwrap(), "version one");
    }

    #[test]
    fn test_development_recompiles_changed_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_template(dir.path(), "page.html", "version one");

        let cache = TemplateCache::new(RunMode::Development);
        cache.load(&path).unwrap();

        rewrite_newer(&path, "version two");
        let template = cache.load(&path).unwrap();
        assert_eq!(template.render(&Context::new()).unwrap(), "version two");
    }

    #[test]
    fn test_development_keeps_unchanged_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_template(dir.path(), "page.html", "stable");

        let cache = TemplateCache::new(RunMode::Development);
        let first = cache.load(&path).unwrap();
        let second = cache.load(&path).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_missing_source_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let cache = TemplateCache::new(RunMode::Production);
        let result = cache.load(&dir.path().join("absent.html"));
        assert!(matches!(result, Err(TemplateError::Io { .. })));
    }

    #[test]
    fn test_invalid_syntax_is_compile_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_template(dir.path(), "broken.html", "{% endif %}");

        let cache = TemplateCache::new(RunMode::Production);
        let result = cache.load(&path);
        assert!(matches!(result, Err(TemplateError::Compile { .. })));
    }

    #[test]
    fn test_render_error_names_template() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_template(dir.path(), "page.html", "{{ missing_value }}");

        let cache = TemplateCache::new(RunMode::Production);
        let template = cache.load(&path).unwrap();
        let err = template.render(&Context::new()).unwrap_err();
        assert!(err.to_string().contains("page.html"));
    }
}
