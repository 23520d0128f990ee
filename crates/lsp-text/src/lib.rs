//! Immutable rope-backed source text and UTF-16 position translation.
//!
//! LSP-agnostic by design — mirrors a set of basic editing primitives that
//! a document store can build on, with no dependency on `lsp-types`.
//! `lsp-server` maps `lsp_types::Position`/`Range` onto [`Position`]/[`Range`]
//! at the handler boundary.

mod edit;
mod position;
mod text;

pub use edit::TextEdit;
pub use position::{Position, Range};
pub use text::SourceText;
