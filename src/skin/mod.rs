//! Skin chain: resolution, hrefs, import maps, and rendering context.
//!
//! A [`Skin`] owns one [`ResourceRoot`] and holds shared handles to child
//! skins attached by assembly code. Resolution walks the chain self-first,
//! depth-first, in registration order; the first root containing a relative
//! path wins. The skin is also the authority for href construction with
//! cache-busting, import-map aggregation, and the layered template-globals
//! mechanism.
//!
//! All mutators take `&mut self`: the tree is wired during a single-threaded
//! assembly phase and is immutable afterwards, so concurrent request workers
//! share it behind `Arc` without locking.

mod context;
mod resource_root;

pub use context::{GlobalsFn, RequestEnv};
pub use resource_root::ResourceRoot;

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use serde::Serialize;
use tera::Context;

use crate::config::{unix_seconds, SkinRuntime};
use crate::template_engine::{
    CompiledTemplate, MacroError, MacroExtractor, TemplateCache, TemplateError,
};

/// Reserved template name looked up by [`Skin::main_template`].
const MAIN_TEMPLATE: &str = "main_template.html";

/// Paths carrying this marker are pre-minified assets, exempt from
/// development-mode cache-busting.
const PREMINIFIED_MARKER: &str = ".min.";

/// Stylesheet sources are compiled out-of-band and likewise exempt.
const STYLESHEET_SOURCE_EXT: &str = ".scss";

static NEXT_SKIN_ID: AtomicU64 = AtomicU64::new(0);

/// Serialized self-reference injected into every rendering context under
/// the `skin` key.
#[derive(Debug, Serialize)]
struct SkinRef<'a> {
    href: &'a str,
    site_url: &'a str,
}

/// A composable bundle of one resource root plus attached child skins,
/// forming the resolution and rendering-context chain for an application
/// or plug-in.
pub struct Skin {
    id: u64,
    root: ResourceRoot,
    runtime: Arc<SkinRuntime>,
    templates: Arc<TemplateCache>,
    children: Vec<Arc<Skin>>,
    import_map: Vec<(String, String)>,
    global_fns: Vec<GlobalsFn>,
}

impl Skin {
    pub fn new(
        dir: impl Into<PathBuf>,
        href: impl Into<String>,
        runtime: Arc<SkinRuntime>,
        templates: Arc<TemplateCache>,
    ) -> Self {
        Self {
            id: NEXT_SKIN_ID.fetch_add(1, Ordering::Relaxed),
            root: ResourceRoot::new(dir, href),
            runtime,
            templates,
            children: Vec::new(),
            import_map: Vec::new(),
            global_fns: Vec::new(),
        }
    }

    /// Conventional href for a module that did not pick one explicitly.
    pub fn default_href(module: &str) -> String {
        format!("{module}_skin")
    }

    /// This skin's own resource root.
    pub fn root(&self) -> &ResourceRoot {
        &self.root
    }

    pub fn runtime(&self) -> &Arc<SkinRuntime> {
        &self.runtime
    }

    /// Attached child skins, in registration order.
    pub fn children(&self) -> &[Arc<Skin>] {
        &self.children
    }

    // ---- assembly ----------------------------------------------------

    /// Append a child skin to the resolution chain.
    ///
    /// Children are not deduplicated; attaching the same skin under two
    /// parents is legitimate. Attachments that would put this skin inside
    /// its own chain are rejected.
    pub fn attach_child(&mut self, child: Arc<Skin>) -> Result<(), SkinError> {
        if child.subtree_contains(self.id) {
            return Err(SkinError::CycleDetected {
                href: child.root.href().to_string(),
            });
        }
        tracing::debug!(
            parent = %self.root.href(),
            child = %child.root.href(),
            "attached child skin"
        );
        self.children.push(child);
        Ok(())
    }

    /// Record one client-module → resource mapping local to this skin.
    pub fn add_import(&mut self, module: impl Into<String>, rel: impl Into<String>) {
        self.import_map.push((module.into(), rel.into()));
    }

    /// Register a template-globals contributor. It runs before every render;
    /// its keys overwrite the defaults and any earlier contributor's.
    pub fn add_template_global(&mut self, f: impl Fn() -> Context + Send + Sync + 'static) {
        self.global_fns.push(Box::new(f));
    }

    fn subtree_contains(&self, id: u64) -> bool {
        self.id == id || self.children.iter().any(|c| c.subtree_contains(id))
    }

    // ---- resolution --------------------------------------------------

    /// First root in the chain whose directory contains `rel`: this skin's
    /// own root, then each child's chain fully, in registration order.
    pub fn first_root_containing(&self, rel: &str) -> Option<&ResourceRoot> {
        if self.root.exists(rel) {
            return Some(&self.root);
        }
        self.children.iter().find_map(|c| c.first_root_containing(rel))
    }

    /// Whether any root in the chain contains `rel`.
    pub fn exists(&self, rel: &str) -> Result<bool, SkinError> {
        check_rel_path(rel)?;
        Ok(self.first_root_containing(rel).is_some())
    }

    /// Absolute filesystem path for `rel` via the first containing root.
    pub fn resource_path(&self, rel: &str) -> Result<PathBuf, SkinError> {
        Ok(self.resolve(rel)?.resource_path(rel))
    }

    /// Public URL for `rel` via the first containing root, without the
    /// application root or cache-busting.
    pub fn url(&self, rel: &str) -> Result<String, SkinError> {
        Ok(self.resolve(rel)?.url(rel))
    }

    fn resolve(&self, rel: &str) -> Result<&ResourceRoot, SkinError> {
        check_rel_path(rel)?;
        self.first_root_containing(rel)
            .ok_or_else(|| SkinError::ResourceNotFound {
                path: rel.to_string(),
            })
    }

    // ---- hrefs -------------------------------------------------------

    /// Full href for `rel`: application root, owning root's URL, and a
    /// cache-busting `t=` query parameter.
    ///
    /// Development mode stamps the current wall-clock time so browsers
    /// refetch on every request; pre-minified assets, stylesheet sources,
    /// and every production href get the fixed process-start timestamp,
    /// which keeps browser caches warm until the process restarts.
    pub fn href(&self, rel: &str) -> Result<String, SkinError> {
        let root = self.resolve(rel)?;

        let busting = self.runtime.is_development()
            && !rel.contains(PREMINIFIED_MARKER)
            && !rel.ends_with(STYLESHEET_SOURCE_EXT);
        let t = if busting {
            unix_seconds(SystemTime::now())
        } else {
            self.runtime.startup_seconds()
        };

        Ok(format!(
            "{}/{}?t={:.6}",
            self.runtime.site_url(),
            root.url(rel),
            t
        ))
    }

    // ---- raw resources -----------------------------------------------

    /// Raw contents of the resource at `rel`.
    pub fn read(&self, rel: &str) -> Result<String, SkinError> {
        let path = self.resource_path(rel)?;
        std::fs::read_to_string(&path).map_err(|e| SkinError::Io { path, source: e })
    }

    /// Literal script element wrapping the file's raw contents. No
    /// transformation beyond the enclosing comment guard.
    pub fn script_tag(&self, rel: &str) -> Result<String, SkinError> {
        let js = self.read(rel)?;
        Ok(format!("<script><!--\n{js}\n// -->\n</script>"))
    }

    // ---- templates ---------------------------------------------------

    /// Resolve `rel` through the chain and load it from the shared cache.
    pub fn load_template(&self, rel: &str) -> Result<Arc<CompiledTemplate>, SkinError> {
        let path = self.resource_path(rel)?;
        Ok(self.templates.load(&path)?)
    }

    /// The reserved `main_template.html` of this chain.
    pub fn main_template(&self) -> Result<Arc<CompiledTemplate>, SkinError> {
        self.load_template(MAIN_TEMPLATE)
    }

    /// An extractor over the macros defined in the template at `rel`.
    pub fn macros_from(&self, rel: &str) -> Result<MacroExtractor, SkinError> {
        let path = self.resource_path(rel)?;
        Ok(MacroExtractor::new(self.templates.clone(), path))
    }

    // ---- rendering context -------------------------------------------

    /// Fixed framework-bound context every render starts from: the injected
    /// ambient values, the application root URL, and a serialized
    /// self-reference.
    pub fn default_globals(&self, env: &RequestEnv) -> Context {
        let mut context = Context::new();
        context.insert("app", &env.app);
        context.insert("request", &env.request);
        context.insert("session", &env.session);
        context.insert("g", &env.g);
        context.insert("site_url", self.runtime.site_url());
        context.insert(
            "skin",
            &SkinRef {
                href: self.root.href(),
                site_url: self.runtime.site_url(),
            },
        );
        context
    }

    /// Defaults overwritten by the contributor walk: this skin's
    /// contributors in registration order, then each child's recursively,
    /// later results overwriting earlier keys.
    pub fn template_globals(&self, env: &RequestEnv) -> Context {
        let mut context = self.default_globals(env);
        self.apply_global_fns(&mut context);
        context
    }

    fn apply_global_fns(&self, context: &mut Context) {
        for f in &self.global_fns {
            context.extend(f());
        }
        for child in &self.children {
            child.apply_global_fns(context);
        }
    }

    /// Resolve, load, and render the template at `rel`. Caller-supplied
    /// `args` take final precedence over every contributed global.
    pub fn render(&self, rel: &str, env: &RequestEnv, args: &Context) -> Result<String, SkinError> {
        let template = self.load_template(rel)?;
        let mut context = self.template_globals(env);
        context.extend(args.clone());
        Ok(template.render(&context)?)
    }

    // ---- import maps -------------------------------------------------

    /// Effective import map: this skin's entries merged with each child's
    /// effective map recursively, later entries overwriting same-named keys.
    pub fn import_map(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        self.collect_imports(&mut map);
        map
    }

    fn collect_imports(&self, out: &mut BTreeMap<String, String>) {
        for (module, rel) in &self.import_map {
            out.insert(module.clone(), rel.clone());
        }
        for child in &self.children {
            child.collect_imports(out);
        }
    }

    /// Import-map declaration for the client runtime: every mapped path
    /// resolved through [`href`](Skin::href), serialized as JSON. Fails
    /// whole if any path is unresolvable.
    pub fn import_map_tag(&self) -> Result<String, SkinError> {
        let mut imports = BTreeMap::new();
        for (module, rel) in self.import_map() {
            imports.insert(module, self.href(&rel)?);
        }
        let body = serde_json::to_string(&serde_json::json!({ "imports": imports }))
            .map_err(|e| SkinError::ImportMap { source: e })?;
        Ok(format!(r#"<script type="importmap">{body}</script>"#))
    }
}

impl fmt::Debug for Skin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Skin")
            .field("href", &self.root.href())
            .field("dir", &self.root.dir())
            .field("children", &self.children.len())
            .finish_non_exhaustive()
    }
}

/// Reject parent-directory traversal (and absolute paths, which would
/// escape the root on join) before any filesystem access.
fn check_rel_path(rel: &str) -> Result<(), SkinError> {
    let path = Path::new(rel);
    let illegal = path.is_absolute()
        || path
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)));
    if illegal {
        return Err(SkinError::IllegalPath {
            path: rel.to_string(),
        });
    }
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum SkinError {
    #[error("no skin resource found for '{path}'")]
    ResourceNotFound { path: String },

    #[error("illegal resource path '{path}'")]
    IllegalPath { path: String },

    #[error("attaching skin '{href}' would form a cycle")]
    CycleDetected { href: String },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to serialize import map: {source}")]
    ImportMap { source: serde_json::Error },

    #[error("template error: {0}")]
    Template(#[from] TemplateError),

    #[error("macro error: {0}")]
    Macro(#[from] MacroError),
}
