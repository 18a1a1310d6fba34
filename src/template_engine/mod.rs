//! Tera-based template compilation, caching, and macro extraction.
//!
//! Templates are user-provided files resolved through a skin chain and
//! compiled at runtime, one Tera instance per source file, memoized in a
//! process-wide [`TemplateCache`]. The engine's parsing and rendering
//! semantics are a trusted external component; its errors propagate wrapped
//! but never reinterpreted.

mod filters;
mod loader;
mod macros;

pub use loader::{CompiledTemplate, TemplateCache, TemplateError};
pub use macros::{MacroError, MacroExtractor, MacroWrapper};
