//! Top-level wiring: builds the [`lsp_rpc::Router`], wraps it in the
//! [`LifecycleLayer`], and assembles a runnable [`Server`] around a
//! Document Store, Workspace Façade, and Diagnostics Engine.

use std::sync::Arc;

use lsp_rpc::service::{NotificationCall, RequestCall, RouterBuilder};
use lsp_rpc::{Dispatcher, ResponseError};
use lsp_types::{
	CompletionOptions, DidChangeTextDocumentParams, DidCloseTextDocumentParams, DidOpenTextDocumentParams,
	DidSaveTextDocumentParams, HoverProviderCapability, InitializeParams, InitializeResult, OneOf,
	PositionEncodingKind, RenameOptions, SaveOptions, ServerCapabilities, TextDocumentSyncCapability,
	TextDocumentSyncKind, TextDocumentSyncOptions, TextDocumentSyncSaveOptions,
};
use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::watch;
use tower_layer::Layer;
use tower_service::Service;

use crate::analysis::AnalysisProvider;
use crate::analysis::WorkspaceFacade;
use crate::config::ServerConfig;
use crate::diagnostics::DiagnosticsEngine;
use crate::documents::DocumentStore;
use crate::handlers;
use crate::lifecycle::{Lifecycle, LifecycleLayer};
use crate::log_sink::NotifySink;

/// Shared state every handler closure captures a clone of. Cloning is
/// cheap — everything inside is already `Arc`/`Copy`-shared.
pub struct ServerContext {
	pub documents: Arc<DocumentStore>,
	pub facade: Arc<WorkspaceFacade>,
	pub config: Arc<RwLock<ServerConfig>>,
	pub notify: NotifySink,
	pub diagnostics: Arc<DiagnosticsEngine>,
	pub lifecycle: Lifecycle,
}

/// A fully wired server, ready to drive a transport. The write capability
/// is a plain function value over the transport's writer half, built
/// before the Dispatcher exists — the Diagnostics Engine and `initialize`
/// handler both need to publish notifications, but the Dispatcher itself
/// is only constructed once the router (which the dispatcher wraps) is
/// ready. Going through the raw writer instead of a `Dispatcher` clone
/// breaks that would-be cycle.
pub struct Server {
	ctx: Arc<ServerContext>,
	exit_code: watch::Sender<Option<i32>>,
	writer: Arc<dyn lsp_rpc::transport::MessageWriter>,
}

impl Server {
	pub fn new(provider: Arc<dyn AnalysisProvider>, writer: Arc<dyn lsp_rpc::transport::MessageWriter>) -> Self {
		let notify = notify_sink(writer.clone());
		let documents = Arc::new(DocumentStore::new());
		let facade = Arc::new(WorkspaceFacade::new(provider));
		let config = Arc::new(RwLock::new(ServerConfig::default()));
		let diagnostics = DiagnosticsEngine::new(documents.clone(), facade.clone(), config.clone(), notify.clone());
		let lifecycle = Lifecycle::new();
		let ctx = Arc::new(ServerContext { documents, facade, config, notify, diagnostics, lifecycle });
		let (exit_code, _rx) = watch::channel(None);
		Self { ctx, exit_code, writer }
	}

	/// A receiver that resolves once `exit` has been processed, yielding
	/// the process exit code.
	pub fn exit_code(&self) -> watch::Receiver<Option<i32>> {
		self.exit_code.subscribe()
	}

	/// Subscribes the Diagnostics Engine to document-change events and
	/// builds the lifecycle-gated dispatcher. Call once, before `run()`.
	pub fn dispatcher(&self) -> Dispatcher<impl RouterService> {
		self.spawn_diagnostics_subscriber();
		let router = build_router(self.ctx.clone(), self.exit_code.clone());
		let lifecycle_layer = LifecycleLayer::new(self.ctx.lifecycle.clone());
		let service = lifecycle_layer.layer(router);
		Dispatcher::with_sequential_methods(self.writer.clone(), service, ["shutdown"])
	}

	/// `run()` starting the transport: NotStarted -> Starting.
	pub fn start(&self) {
		self.ctx.lifecycle.start();
	}

	fn spawn_diagnostics_subscriber(&self) {
		let mut events = self.ctx.documents.subscribe();
		let diagnostics = self.ctx.diagnostics.clone();
		tokio::spawn(async move {
			loop {
				match events.recv().await {
					Ok(event) => diagnostics.handle_change(event.uri, event.version),
					Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
					Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
				}
			}
		});
	}
}

/// Bound alias so `Server::dispatcher`'s return type doesn't need to spell
/// out the full `Service<...>` where-clause at every call site.
pub trait RouterService:
	Service<lsp_rpc::service::RouterCall, Response = lsp_rpc::service::RouterResponse, Error = std::convert::Infallible>
	+ Clone
	+ Send
	+ Sync
	+ 'static
{
}
impl<T> RouterService for T where
	T: Service<lsp_rpc::service::RouterCall, Response = lsp_rpc::service::RouterResponse, Error = std::convert::Infallible>
		+ Clone
		+ Send
		+ Sync
		+ 'static
{
}

fn build_router(ctx: Arc<ServerContext>, exit_code: watch::Sender<Option<i32>>) -> lsp_rpc::Router {
	let init_ctx = ctx.clone();
	let initialized_ctx = ctx.clone();
	let shutdown_ctx = ctx.clone();
	let exit_ctx = ctx.clone();
	let did_open_ctx = ctx.clone();
	let did_change_ctx = ctx.clone();
	let did_save_ctx = ctx.clone();
	let did_close_ctx = ctx.clone();
	let did_change_config_ctx = ctx.clone();
	let hover_ctx = ctx.clone();
	let definition_ctx = ctx.clone();
	let references_ctx = ctx.clone();
	let prepare_rename_ctx = ctx.clone();
	let rename_ctx = ctx.clone();
	let document_symbol_ctx = ctx.clone();
	let workspace_symbol_ctx = ctx.clone();
	let completion_ctx = ctx.clone();
	let completion_resolve_ctx = ctx.clone();

	RouterBuilder::new()
		.request("initialize", move |call: RequestCall| {
			let ctx = init_ctx.clone();
			async move { handle_initialize(ctx, call).await }
		})
		.notification("initialized", move |_call: NotificationCall| {
			let ctx = initialized_ctx.clone();
			async move { handle_initialized(ctx).await }
		})
		.request("shutdown", move |_call: RequestCall| {
			let ctx = shutdown_ctx.clone();
			async move {
				ctx.lifecycle.on_shutdown();
				Ok(Value::Null)
			}
		})
		.notification("exit", move |_call: NotificationCall| {
			let ctx = exit_ctx.clone();
			let exit_code = exit_code.clone();
			async move {
				let code = ctx.lifecycle.on_exit();
				let _ = exit_code.send(Some(code));
			}
		})
		.notification("$/setTrace", move |_call: NotificationCall| async move {})
		.notification("textDocument/didOpen", move |call: NotificationCall| {
			let ctx = did_open_ctx.clone();
			async move { handle_did_open(ctx, call).await }
		})
		.notification("textDocument/didChange", move |call: NotificationCall| {
			let ctx = did_change_ctx.clone();
			async move { handle_did_change(ctx, call).await }
		})
		.notification("textDocument/didSave", move |call: NotificationCall| {
			let ctx = did_save_ctx.clone();
			async move { handle_did_save(ctx, call).await }
		})
		.notification("textDocument/didClose", move |call: NotificationCall| {
			let ctx = did_close_ctx.clone();
			async move { handle_did_close(ctx, call).await }
		})
		.notification("workspace/didChangeConfiguration", move |call: NotificationCall| {
			let ctx = did_change_config_ctx.clone();
			async move { handle_did_change_configuration(ctx, call).await }
		})
		.request("textDocument/hover", move |call: RequestCall| {
			let ctx = hover_ctx.clone();
			async move { handlers::hover(ctx, call).await }
		})
		.request("textDocument/definition", move |call: RequestCall| {
			let ctx = definition_ctx.clone();
			async move { handlers::definition(ctx, call).await }
		})
		.request("textDocument/references", move |call: RequestCall| {
			let ctx = references_ctx.clone();
			async move { handlers::references(ctx, call).await }
		})
		.request("textDocument/prepareRename", move |call: RequestCall| {
			let ctx = prepare_rename_ctx.clone();
			async move { handlers::prepare_rename(ctx, call).await }
		})
		.request("textDocument/rename", move |call: RequestCall| {
			let ctx = rename_ctx.clone();
			async move { handlers::rename(ctx, call).await }
		})
		.request("textDocument/documentSymbol", move |call: RequestCall| {
			let ctx = document_symbol_ctx.clone();
			async move { handlers::document_symbol(ctx, call).await }
		})
		.request("workspace/symbol", move |call: RequestCall| {
			let ctx = workspace_symbol_ctx.clone();
			async move { handlers::workspace_symbol(ctx, call).await }
		})
		.request("textDocument/completion", move |call: RequestCall| {
			let ctx = completion_ctx.clone();
			async move { handlers::completion(ctx, call).await }
		})
		.request("completionItem/resolve", move |call: RequestCall| {
			let ctx = completion_resolve_ctx.clone();
			async move { handlers::completion_resolve(ctx, call).await }
		})
		.build()
}

async fn handle_initialize(ctx: Arc<ServerContext>, call: RequestCall) -> Result<Value, ResponseError> {
	if !ctx.lifecycle.on_initialize() {
		return Err(ResponseError::invalid_request("server already initialized"));
	}
	let params: InitializeParams =
		serde_json::from_value(call.params).map_err(|e| ResponseError::invalid_params(e.to_string()))?;
	if let Some(options) = params.initialization_options {
		if let Ok(config) = serde_json::from_value(options) {
			*ctx.config.write() = config;
		}
	}

	let capabilities = ServerCapabilities {
		position_encoding: Some(PositionEncodingKind::UTF16),
		text_document_sync: Some(TextDocumentSyncCapability::Options(TextDocumentSyncOptions {
			open_close: Some(true),
			change: Some(TextDocumentSyncKind::INCREMENTAL),
			will_save: None,
			will_save_wait_until: None,
			save: Some(TextDocumentSyncSaveOptions::SaveOptions(SaveOptions { include_text: Some(false) })),
		})),
		completion_provider: Some(CompletionOptions {
			resolve_provider: Some(true),
			trigger_characters: Some(vec![".".to_string()]),
			..Default::default()
		}),
		hover_provider: Some(HoverProviderCapability::Simple(true)),
		definition_provider: Some(OneOf::Left(true)),
		references_provider: Some(OneOf::Left(true)),
		document_symbol_provider: Some(OneOf::Left(true)),
		workspace_symbol_provider: Some(OneOf::Left(true)),
		rename_provider: Some(OneOf::Right(RenameOptions {
			prepare_provider: Some(true),
			work_done_progress_options: Default::default(),
		})),
		..Default::default()
	};

	Ok(serde_json::to_value(InitializeResult { capabilities, server_info: None })
		.expect("InitializeResult always serializes"))
}

async fn handle_initialized(ctx: Arc<ServerContext>) {
	if !ctx.lifecycle.on_initialized() {
		return;
	}
	let facade = ctx.facade.clone();
	tokio::spawn(async move {
		facade.bootstrap(lsp_worker::CancelSignal::never()).await;
	});
}

async fn handle_did_open(ctx: Arc<ServerContext>, call: NotificationCall) {
	let Ok(params) = serde_json::from_value::<DidOpenTextDocumentParams>(call.params) else {
		tracing::warn!("malformed textDocument/didOpen params");
		return;
	};
	let doc = params.text_document;
	let uri: std::sync::Arc<str> = doc.uri.as_str().into();
	if let Err(err) = ctx.documents.open(uri, doc.language_id, doc.version, doc.text) {
		tracing::warn!(%err, "didOpen rejected");
	}
}

async fn handle_did_change(ctx: Arc<ServerContext>, call: NotificationCall) {
	let Ok(params) = serde_json::from_value::<DidChangeTextDocumentParams>(call.params) else {
		tracing::warn!("malformed textDocument/didChange params");
		return;
	};
	let uri = params.text_document.uri.as_str().to_string();
	let version = params.text_document.version;
	let edits = params
		.content_changes
		.into_iter()
		.map(|change| match change.range {
			Some(range) => lsp_text::TextEdit::ranged(convert_range(range), change.text),
			None => lsp_text::TextEdit::whole_document(change.text),
		})
		.collect();
	if let Err(err) = ctx.documents.change(&uri, version, edits) {
		tracing::warn!(%err, "didChange rejected");
	}
}

async fn handle_did_save(ctx: Arc<ServerContext>, call: NotificationCall) {
	let Ok(params) = serde_json::from_value::<DidSaveTextDocumentParams>(call.params) else {
		tracing::warn!("malformed textDocument/didSave params");
		return;
	};
	let uri = params.text_document.uri.as_str().to_string();
	if let Err(err) = ctx.documents.save(&uri, params.text) {
		tracing::warn!(%err, "didSave rejected");
	}
}

async fn handle_did_close(ctx: Arc<ServerContext>, call: NotificationCall) {
	let Ok(params) = serde_json::from_value::<DidCloseTextDocumentParams>(call.params) else {
		tracing::warn!("malformed textDocument/didClose params");
		return;
	};
	let uri = params.text_document.uri.as_str().to_string();
	ctx.documents.close(&uri);
	ctx.diagnostics.handle_close(uri.into()).await;
}

async fn handle_did_change_configuration(ctx: Arc<ServerContext>, call: NotificationCall) {
	let settings = call.params.get("settings").cloned().unwrap_or(call.params);
	let Ok(new_config) = serde_json::from_value::<ServerConfig>(settings) else {
		tracing::warn!("malformed workspace/didChangeConfiguration settings");
		return;
	};
	let severity_changed = {
		let mut config = ctx.config.write();
		let changed = config.minimum_severity != new_config.minimum_severity;
		*config = new_config;
		changed
	};
	if severity_changed {
		// Surface previously filtered diagnostics without requiring an edit.
		ctx.diagnostics.recompute_all_open();
	}
}

fn convert_range(range: lsp_types::Range) -> lsp_text::Range {
	lsp_text::Range::new(
		lsp_text::Position::new(range.start.line, range.start.character),
		lsp_text::Position::new(range.end.line, range.end.character),
	)
}

/// Builds the function-value write capability the Diagnostics Engine and
/// `window/logMessage` use to publish server-initiated notifications,
/// writing `Content-Length`-framed JSON-RPC notification envelopes
/// directly to `writer`.
fn notify_sink(writer: Arc<dyn lsp_rpc::transport::MessageWriter>) -> NotifySink {
	Arc::new(move |method: &'static str, params: Value| {
		let writer = writer.clone();
		Box::pin(async move {
			let body = serde_json::json!({ "jsonrpc": "2.0", "method": method, "params": params });
			let bytes = serde_json::to_vec(&body).expect("outbound notification is always valid JSON");
			if let Err(err) = writer.write_message(&bytes).await {
				tracing::warn!(method, error = %err, "failed to write outbound notification");
			}
		})
	})
}
