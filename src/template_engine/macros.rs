//! Macro extraction: a named macro from a template file, wrapped as an
//! independently renderable unit.
//!
//! A wrapper renders a tiny one-instruction template that imports the source
//! template and calls the macro, forwarding the macro's declared parameters
//! found in the caller's context. Wrappers are cached per requested name; in
//! development mode the cache is discarded and the source's staleness is
//! rechecked before every lookup, so edited macro definitions are picked up
//! without a restart.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, OnceLock};

use regex::Regex;
use tera::Context;

use super::loader::{CompiledTemplate, TemplateCache, TemplateError};

static MACRO_DEF: OnceLock<Regex> = OnceLock::new();

fn macro_def() -> &'static Regex {
    MACRO_DEF.get_or_init(|| {
        Regex::new(r"\{%-?\s*macro\s+([A-Za-z_][A-Za-z0-9_]*)\s*\(([^)]*)\)")
            .expect("macro definition pattern")
    })
}

/// Scan template source for `{% macro name(...) %}` definitions.
///
/// Returns macro name → declared parameter names. Parameter defaults are
/// ignored; only the names matter for call forwarding.
pub(crate) fn scan_macros(source: &str) -> HashMap<String, Vec<String>> {
    let mut table = HashMap::new();
    for caps in macro_def().captures_iter(source) {
        table.insert(caps[1].to_string(), parse_params(&caps[2]));
    }
    table
}

fn parse_params(raw: &str) -> Vec<String> {
    raw.split(',')
        .filter_map(|part| {
            let ident: String = part
                .trim_start()
                .chars()
                .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
                .collect();
            (!ident.is_empty()).then_some(ident)
        })
        .collect()
}

/// Wraps one source template and hands out per-macro render wrappers.
#[derive(Debug)]
pub struct MacroExtractor {
    templates: Arc<TemplateCache>,
    path: PathBuf,
    wrappers: Mutex<HashMap<String, Arc<MacroWrapper>>>,
}

impl MacroExtractor {
    pub(crate) fn new(templates: Arc<TemplateCache>, path: PathBuf) -> Self {
        Self {
            templates,
            path,
            wrappers: Mutex::new(HashMap::new()),
        }
    }

    /// Look up a macro by name.
    ///
    /// Tries the literal name first, then the underscore→hyphen and
    /// hyphen→underscore variants, tolerating identifier-vs-markup naming
    /// conventions on the caller's side.
    pub fn get(&self, name: &str) -> Result<Arc<MacroWrapper>, MacroError> {
        if self.templates.mode().is_development() {
            self.wrappers
                .lock()
                .expect("wrapper cache lock poisoned")
                .clear();
        } else if let Some(wrapper) = self
            .wrappers
            .lock()
            .expect("wrapper cache lock poisoned")
            .get(name)
        {
            return Ok(wrapper.clone());
        }

        // In development mode this also rechecks source staleness.
        let template = self.templates.load(&self.path)?;

        let (macro_name, params) =
            resolve_name(&template, name).ok_or_else(|| MacroError::NotFound {
                name: name.to_string(),
                template: self.path.clone(),
            })?;

        let wrapper = Arc::new(MacroWrapper {
            template,
            macro_name,
            params,
        });
        self.wrappers
            .lock()
            .expect("wrapper cache lock poisoned")
            .insert(name.to_string(), wrapper.clone());
        Ok(wrapper)
    }

    /// Source template path this extractor wraps.
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

fn resolve_name(template: &CompiledTemplate, name: &str) -> Option<(String, Vec<String>)> {
    let table = template.macro_table();
    let hyphenated = name.replace('_', "-");
    let underscored = name.replace('-', "_");
    [name, hyphenated.as_str(), underscored.as_str()]
        .iter()
        .find_map(|candidate| {
            table
                .get(*candidate)
                .map(|params| (candidate.to_string(), params.clone()))
        })
}

/// One macro bound to its source template, renderable on its own.
#[derive(Debug)]
pub struct MacroWrapper {
    template: Arc<CompiledTemplate>,
    macro_name: String,
    params: Vec<String>,
}

impl MacroWrapper {
    /// Resolved macro name inside the source template.
    pub fn name(&self) -> &str {
        &self.macro_name
    }

    /// Parameter names the macro declares.
    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// Render the macro, forwarding the declared parameters present in
    /// `args`. A missing required parameter surfaces as an engine render
    /// error, unchanged.
    pub fn render(&self, args: &Context) -> Result<String, TemplateError> {
        let forwarded: Vec<String> = self
            .params
            .iter()
            .filter(|p| args.contains_key(p))
            .map(|p| format!("{p}={p}"))
            .collect();

        let body = format!(
            r#"{{% import "{source}" as macros %}}{{{{ macros::{name}({args}) }}}}"#,
            source = self.template.name(),
            name = self.macro_name,
            args = forwarded.join(", ")
        );
        self.template.render_inline(&body, args)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MacroError {
    #[error("no macro named '{name}' in {template}")]
    NotFound { name: String, template: PathBuf },
    #[error("macro source template error: {0}")]
    Template(#[from] TemplateError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunMode;
    use std::fs;
    use std::path::Path;

    const MACRO_SOURCE: &str = r#"{% macro user_list(users) %}<ul>{% for u in users %}<li>{{ u }}</li>{% endfor %}</ul>{% endmacro user_list %}
{% macro greeting(name, salute="Hello") %}{{ salute }}, {{ name }}!{% endmacro greeting %}"#;

    fn write_source(dir: &Path) -> PathBuf {
        let path = dir.join("widgets.html");
        fs::write(&path, MACRO_SOURCE).unwrap();
        path
    }

    fn extractor(dir: &Path, mode: RunMode) -> MacroExtractor {
        MacroExtractor::new(Arc::new(TemplateCache::new(mode)), write_source(dir))
    }

    #[test]
    fn test_scan_macros_names_and_params() {
        let table = scan_macros(MACRO_SOURCE);
        assert_eq!(table.len(), 2);
        assert_eq!(table["user_list"], vec!["users"]);
        assert_eq!(table["greeting"], vec!["name", "salute"]);
    }

    #[test]
    fn test_scan_macros_empty_params() {
        let table = scan_macros("{% macro divider() %}<hr/>{% endmacro divider %}");
        assert!(table["divider"].is_empty());
    }

    #[test]
    fn test_render_macro() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = extractor(dir.path(), RunMode::Production);

        let wrapper = extractor.get("user_list").unwrap();
        let mut args = Context::new();
        args.insert("users", &["ada", "grace"]);
        assert_eq!(
            wrapper.render(&args).unwrap(),
            "<ul><li>ada</li><li>grace</li></ul>"
        );
    }

    #[test]
    fn test_default_param_applies_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = extractor(dir.path(), RunMode::Production);

        let wrapper = extractor.get("greeting").unwrap();
        let mut args = Context::new();
        args.insert("name", "ada");
        assert_eq!(wrapper.render(&args).unwrap(), "Hello, ada!");
    }

    #[test]
    fn test_hyphenated_lookup_resolves_identifier() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = extractor(dir.path(), RunMode::Production);

        let wrapper = extractor.get("user-list").unwrap();
        assert_eq!(wrapper.name(), "user_list");
    }

    #[test]
    fn test_unknown_macro_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = extractor(dir.path(), RunMode::Production);

        let err = extractor.get("nonexistent").unwrap_err();
        assert!(matches!(err, MacroError::NotFound { .. }));
    }

    #[test]
    fn test_wrapper_is_cached_in_production() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = extractor(dir.path(), RunMode::Production);

        let first = extractor.get("greeting").unwrap();
        let second = extractor.get("greeting").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_development_discards_wrapper_cache() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = extractor(dir.path(), RunMode::Development);

        let first = extractor.get("greeting").unwrap();
        let second = extractor.get("greeting").unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
    }
}
