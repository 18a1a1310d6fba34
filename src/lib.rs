//! Composable skin layer for web applications.
//!
//! A *skin* binds a directory of templates and static resources to a public
//! URL prefix. Skins nest: a base application owns one skin and each plug-in
//! module attaches its own as a child, forming a chain that is searched
//! self-first, depth-first, in registration order. The first root containing a
//! requested relative path wins, so a parent can override any resource a
//! plug-in ships.
//!
//! Templates are rendered with Tera and memoized in a shared
//! [`TemplateCache`](template_engine::TemplateCache); development mode adds
//! per-access staleness rechecks and stronger cache-busting, production mode
//! compiles once for the process lifetime.
//!
//! # Modules
//!
//! - [`config`] — Run mode, configuration shape, and the shared runtime handle
//! - [`skin`] — Skin chain: resolution, hrefs, import maps, rendering context
//! - [`template_engine`] — Tera-based template cache, filters, and macro extraction

pub mod config;
pub mod skin;
pub mod template_engine;

pub use config::{RunMode, SkinConfig, SkinRuntime};
pub use skin::{RequestEnv, ResourceRoot, Skin, SkinError};
pub use template_engine::{
    CompiledTemplate, MacroError, MacroExtractor, MacroWrapper, TemplateCache, TemplateError,
};
