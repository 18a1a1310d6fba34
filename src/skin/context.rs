//! Injected per-request framework values and the contributor function type.
//!
//! The web framework's request, session, per-request globals, and application
//! handle are consumed as opaque JSON values passed into each render call.
//! The core never reads them from process globals and never interprets them.

use serde_json::Value;
use tera::Context;

/// A registered template-globals contributor: a no-argument function whose
/// returned context is folded into the rendering context before every render,
/// later contributors overwriting earlier keys.
pub type GlobalsFn = Box<dyn Fn() -> Context + Send + Sync>;

/// Ambient framework values for one render, passed through to templates
/// unchanged under the keys `app`, `request`, `session`, and `g`.
#[derive(Debug, Clone, Default)]
pub struct RequestEnv {
    /// The active application handle.
    pub app: Value,
    /// The current request.
    pub request: Value,
    /// The session-like object.
    pub session: Value,
    /// The per-request global object.
    pub g: Value,
}

impl RequestEnv {
    pub fn new() -> Self {
        Self::default()
    }
}
