//! Generic async JSON-RPC message pump: transport, codec, and a tower-based
//! dispatcher. Nothing in this crate is LSP-specific — `lsp-server` layers
//! lifecycle, document sync, and feature semantics on top.

pub mod dispatcher;
pub mod envelope;
pub mod error;
pub mod service;
pub mod transport;

pub use dispatcher::Dispatcher;
pub use envelope::{error_code, Id, Incoming, Notification, Request, Response, ResponseError};
pub use error::TransportError;
pub use service::{NotificationCall, NotificationHandler, RequestCall, RequestHandler, Router, RouterBuilder};
pub use transport::{FramedReader, FramedWriter, MessageReader, MessageWriter};
