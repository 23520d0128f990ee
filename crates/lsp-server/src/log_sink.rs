//! `window/logMessage` helper: converts an AnalysisProvider failure into an
//! empty/null LSP result plus a client-visible warning notification.
//! Distinct from the `tracing` side channel — this one travels over the
//! protocol to the client.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use lsp_types::{LogMessageParams, MessageType};
use serde_json::Value;

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// Function-value write capability, injected rather than held as a
/// back-pointer to the dispatcher.
pub type NotifySink = Arc<dyn Fn(&'static str, Value) -> BoxFuture<()> + Send + Sync>;

pub async fn log_message(sink: &NotifySink, message_type: MessageType, message: impl Into<String>) {
	let params = LogMessageParams { typ: message_type, message: message.into() };
	let value = serde_json::to_value(params).expect("LogMessageParams always serializes");
	(sink)("window/logMessage", value).await;
}

pub async fn log_warn(sink: &NotifySink, message: impl Into<String>) {
	log_message(sink, MessageType::WARNING, message).await;
}
