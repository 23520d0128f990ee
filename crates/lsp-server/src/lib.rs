//! The LSP server kernel: lifecycle state machine, document store,
//! workspace façade / AnalysisProvider boundary, debounced diagnostics,
//! and feature handlers, layered over `lsp-rpc`'s transport-agnostic
//! dispatcher.

pub mod analysis;
pub mod config;
pub mod diagnostics;
pub mod documents;
pub mod error;
pub mod handlers;
pub mod lifecycle;
pub mod log_sink;
pub mod server;

pub use analysis::{AnalysisProvider, Snapshot, WorkspaceFacade};
pub use config::ServerConfig;
pub use diagnostics::DiagnosticsEngine;
pub use documents::{DocumentChanged, DocumentStore};
pub use error::{DocumentError, ProviderError};
pub use lifecycle::{Lifecycle, LifecycleLayer, ServerState};
pub use server::{Server, ServerContext};
