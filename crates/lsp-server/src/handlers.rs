//! Thin request translators: LSP params -> AnalysisProvider call -> LSP
//! result. Each handler is a free function taking a shared
//! [`ServerContext`] plus a dispatcher [`RequestCall`], matching the
//! `(method -> typed handler)` registration model lsp-rpc expects.

use std::sync::Arc;

use lsp_rpc::service::RequestCall;
use lsp_rpc::ResponseError;
use lsp_text::SourceText;
use lsp_types::{
	CompletionItem, CompletionList, CompletionParams, DocumentSymbolParams, GotoDefinitionParams,
	GotoDefinitionResponse, Hover, HoverParams, Location, PrepareRenameResponse, ReferenceParams, RenameParams,
	TextDocumentPositionParams, WorkspaceEdit, WorkspaceSymbolParams,
};
use serde_json::Value;

use crate::analysis::Snapshot;
use crate::error::ProviderError;
use crate::log_sink;
use crate::server::ServerContext;

fn invalid_params(err: impl std::fmt::Display) -> ResponseError {
	ResponseError::invalid_params(err.to_string())
}

/// Resolves the open document and takes a snapshot, or signals the caller
/// to return the LSP-appropriate empty result for an unopened URI.
fn snapshot_for(ctx: &ServerContext, uri: &str) -> Option<Arc<Snapshot>> {
	let (version, text) = ctx.documents.snapshot(uri)?;
	Some(Arc::new(Snapshot { uri: uri.into(), version, text }))
}

/// Reports an AnalysisProvider failure to the client over
/// `window/logMessage` and to the local trace log, so a handler can fall
/// back to the method's empty/null result instead of propagating an
/// internal error to the peer.
async fn report_provider_failure(ctx: &ServerContext, method: &str, err: ProviderError) {
	tracing::warn!(method, error = %err, "analysis provider call failed");
	log_sink::log_warn(&ctx.notify, format!("{method}: {err}")).await;
}

pub async fn hover(ctx: Arc<ServerContext>, call: RequestCall) -> Result<Value, ResponseError> {
	let params: HoverParams = serde_json::from_value(call.params).map_err(invalid_params)?;
	let uri = params.text_document_position_params.text_document.uri.as_str();
	let Some(snapshot) = snapshot_for(&ctx, uri) else {
		return Ok(Value::Null);
	};
	let position = params.text_document_position_params.position;
	let result: Option<Hover> = tokio::select! {
		result = ctx.facade.hover(snapshot, position, call.cancel.clone()) => match result {
			Ok(hover) => hover,
			Err(err) => {
				report_provider_failure(&ctx, "textDocument/hover", err).await;
				None
			}
		},
		_ = call.cancel.cancelled() => return Err(ResponseError::request_cancelled()),
	};
	Ok(serde_json::to_value(result).expect("Option<Hover> always serializes"))
}

pub async fn definition(ctx: Arc<ServerContext>, call: RequestCall) -> Result<Value, ResponseError> {
	let params: GotoDefinitionParams = serde_json::from_value(call.params).map_err(invalid_params)?;
	let uri = params.text_document_position_params.text_document.uri.as_str();
	let Some(snapshot) = snapshot_for(&ctx, uri) else {
		return Ok(Value::Null);
	};
	let position = params.text_document_position_params.position;
	let locations: Vec<Location> = tokio::select! {
		result = ctx.facade.definition(snapshot, position, call.cancel.clone()) => match result {
			Ok(locations) => locations,
			Err(err) => {
				report_provider_failure(&ctx, "textDocument/definition", err).await;
				Vec::new()
			}
		},
		_ = call.cancel.cancelled() => return Err(ResponseError::request_cancelled()),
	};
	let response = GotoDefinitionResponse::Array(locations);
	Ok(serde_json::to_value(response).expect("GotoDefinitionResponse always serializes"))
}

pub async fn references(ctx: Arc<ServerContext>, call: RequestCall) -> Result<Value, ResponseError> {
	let params: ReferenceParams = serde_json::from_value(call.params).map_err(invalid_params)?;
	let uri = params.text_document_position.text_document.uri.as_str();
	let Some(snapshot) = snapshot_for(&ctx, uri) else {
		return Ok(Value::Null);
	};
	let position = params.text_document_position.position;
	let include_declaration = params.context.include_declaration;
	let locations: Vec<Location> = tokio::select! {
		result = ctx.facade.references(snapshot, position, include_declaration, call.cancel.clone()) => match result {
			Ok(locations) => locations,
			Err(err) => {
				report_provider_failure(&ctx, "textDocument/references", err).await;
				Vec::new()
			}
		},
		_ = call.cancel.cancelled() => return Err(ResponseError::request_cancelled()),
	};
	Ok(serde_json::to_value(locations).expect("Vec<Location> always serializes"))
}

pub async fn prepare_rename(ctx: Arc<ServerContext>, call: RequestCall) -> Result<Value, ResponseError> {
	let params: TextDocumentPositionParams = serde_json::from_value(call.params).map_err(invalid_params)?;
	let uri = params.text_document.uri.as_str();
	let Some(snapshot) = snapshot_for(&ctx, uri) else {
		return Ok(Value::Null);
	};
	let result: Option<PrepareRenameResponse> = tokio::select! {
		result = ctx.facade.prepare_rename(snapshot, params.position, call.cancel.clone()) => match result {
			Ok(result) => result,
			Err(err) => {
				report_provider_failure(&ctx, "textDocument/prepareRename", err).await;
				None
			}
		},
		_ = call.cancel.cancelled() => return Err(ResponseError::request_cancelled()),
	};
	Ok(serde_json::to_value(result).expect("Option<PrepareRenameResponse> always serializes"))
}

/// Edits are computed against the pre-rename snapshot; the
/// AnalysisProvider is trusted to already return each target document at
/// most once with edits sorted by descending start offset, since it alone
/// has the semantic knowledge to find every reference — the handler does
/// not second-guess the ordering it was handed, only forwards it.
pub async fn rename(ctx: Arc<ServerContext>, call: RequestCall) -> Result<Value, ResponseError> {
	let params: RenameParams = serde_json::from_value(call.params).map_err(invalid_params)?;
	let uri = params.text_document_position.text_document.uri.as_str();
	let Some(snapshot) = snapshot_for(&ctx, uri) else {
		return Ok(serde_json::to_value(WorkspaceEdit::default()).unwrap());
	};
	let position = params.text_document_position.position;
	let result: Option<WorkspaceEdit> = tokio::select! {
		result = ctx.facade.rename(snapshot, position, params.new_name, call.cancel.clone()) => match result {
			Ok(result) => result,
			Err(err) => {
				report_provider_failure(&ctx, "textDocument/rename", err).await;
				None
			}
		},
		_ = call.cancel.cancelled() => return Err(ResponseError::request_cancelled()),
	};
	Ok(serde_json::to_value(result.unwrap_or_default()).expect("WorkspaceEdit always serializes"))
}

pub async fn document_symbol(ctx: Arc<ServerContext>, call: RequestCall) -> Result<Value, ResponseError> {
	let params: DocumentSymbolParams = serde_json::from_value(call.params).map_err(invalid_params)?;
	let uri = params.text_document.uri.as_str();
	let Some(snapshot) = snapshot_for(&ctx, uri) else {
		return Ok(Value::Null);
	};
	let symbols = tokio::select! {
		result = ctx.facade.document_symbols(snapshot, call.cancel.clone()) => match result {
			Ok(symbols) => symbols,
			Err(err) => {
				report_provider_failure(&ctx, "textDocument/documentSymbol", err).await;
				Vec::new()
			}
		},
		_ = call.cancel.cancelled() => return Err(ResponseError::request_cancelled()),
	};
	Ok(serde_json::to_value(symbols).expect("Vec<DocumentSymbol> always serializes"))
}

pub async fn workspace_symbol(ctx: Arc<ServerContext>, call: RequestCall) -> Result<Value, ResponseError> {
	let params: WorkspaceSymbolParams = serde_json::from_value(call.params).map_err(invalid_params)?;
	let symbols = tokio::select! {
		result = ctx.facade.workspace_symbols(params.query, call.cancel.clone()) => match result {
			Ok(symbols) => symbols,
			Err(err) => {
				report_provider_failure(&ctx, "workspace/symbol", err).await;
				Vec::new()
			}
		},
		_ = call.cancel.cancelled() => return Err(ResponseError::request_cancelled()),
	};
	Ok(serde_json::to_value(symbols).expect("Vec<SymbolInformation> always serializes"))
}

pub async fn completion(ctx: Arc<ServerContext>, call: RequestCall) -> Result<Value, ResponseError> {
	let params: CompletionParams = serde_json::from_value(call.params).map_err(invalid_params)?;
	let uri = params.text_document_position.text_document.uri.as_str();
	let Some(snapshot) = snapshot_for(&ctx, uri) else {
		return Ok(Value::Null);
	};
	let position = params.text_document_position.position;
	let list = tokio::select! {
		result = ctx.facade.completions(snapshot, position, params.context, call.cancel.clone()) => match result {
			Ok(list) => list,
			Err(err) => {
				report_provider_failure(&ctx, "textDocument/completion", err).await;
				CompletionList { is_incomplete: true, items: Vec::new(), ..Default::default() }
			}
		},
		_ = call.cancel.cancelled() => return Err(ResponseError::request_cancelled()),
	};
	Ok(serde_json::to_value(list).expect("CompletionList always serializes"))
}

pub async fn completion_resolve(ctx: Arc<ServerContext>, call: RequestCall) -> Result<Value, ResponseError> {
	let item: CompletionItem = serde_json::from_value(call.params).map_err(invalid_params)?;
	let fallback = item.clone();
	let resolved = tokio::select! {
		result = ctx.facade.resolve_completion(item, call.cancel.clone()) => match result {
			Ok(resolved) => resolved,
			Err(err) => {
				report_provider_failure(&ctx, "completionItem/resolve", err).await;
				fallback
			}
		},
		_ = call.cancel.cancelled() => return Err(ResponseError::request_cancelled()),
	};
	Ok(serde_json::to_value(resolved).expect("CompletionItem always serializes"))
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use async_trait::async_trait;
	use lsp_types::{
		CompletionContext, CompletionItem, CompletionList, Diagnostic, DocumentSymbol, Hover, HoverContents,
		Location, MarkedString, Position, PrepareRenameResponse, Range, SymbolInformation, WorkspaceEdit,
	};
	use lsp_worker::CancelSignal;
	use serde_json::json;

	use super::*;
	use crate::analysis::{AnalysisProvider, WorkspaceFacade};
	use crate::config::ServerConfig;
	use crate::diagnostics::DiagnosticsEngine;
	use crate::documents::DocumentStore;
	use crate::error::ProviderResult;
	use crate::lifecycle::Lifecycle;

	struct StubProvider;

	#[async_trait]
	impl AnalysisProvider for StubProvider {
		async fn compute_diagnostics(
			&self,
			_snapshot: Arc<Snapshot>,
			_cancel: CancelSignal,
		) -> ProviderResult<Vec<Diagnostic>> {
			Ok(Vec::new())
		}
		async fn completions(
			&self,
			_snapshot: Arc<Snapshot>,
			_position: Position,
			_context: Option<CompletionContext>,
			_cancel: CancelSignal,
		) -> ProviderResult<CompletionList> {
			Ok(CompletionList { is_incomplete: false, items: Vec::new(), ..Default::default() })
		}
		async fn resolve_completion(&self, item: CompletionItem, _cancel: CancelSignal) -> ProviderResult<CompletionItem> {
			Ok(item)
		}
		async fn hover(
			&self,
			_snapshot: Arc<Snapshot>,
			position: Position,
			_cancel: CancelSignal,
		) -> ProviderResult<Option<Hover>> {
			Ok(Some(Hover {
				contents: HoverContents::Scalar(MarkedString::String("stub hover".into())),
				range: Some(Range::new(position, position)),
			}))
		}
		async fn definition(
			&self,
			snapshot: Arc<Snapshot>,
			position: Position,
			_cancel: CancelSignal,
		) -> ProviderResult<Vec<Location>> {
			Ok(vec![Location { uri: snapshot.uri.parse().unwrap(), range: Range::new(position, position) }])
		}
		async fn references(
			&self,
			_snapshot: Arc<Snapshot>,
			_position: Position,
			_include_declaration: bool,
			_cancel: CancelSignal,
		) -> ProviderResult<Vec<Location>> {
			Ok(Vec::new())
		}
		async fn prepare_rename(
			&self,
			_snapshot: Arc<Snapshot>,
			_position: Position,
			_cancel: CancelSignal,
		) -> ProviderResult<Option<PrepareRenameResponse>> {
			Ok(None)
		}
		async fn rename(
			&self,
			_snapshot: Arc<Snapshot>,
			_position: Position,
			_new_name: String,
			_cancel: CancelSignal,
		) -> ProviderResult<Option<WorkspaceEdit>> {
			Ok(None)
		}
		async fn document_symbols(
			&self,
			_snapshot: Arc<Snapshot>,
			_cancel: CancelSignal,
		) -> ProviderResult<Vec<DocumentSymbol>> {
			Ok(Vec::new())
		}
		async fn workspace_symbols(&self, _query: String, _cancel: CancelSignal) -> ProviderResult<Vec<SymbolInformation>> {
			Ok(Vec::new())
		}
		async fn bootstrap(&self, _cancel: CancelSignal) {}
	}

	fn test_context() -> Arc<ServerContext> {
		let documents = Arc::new(DocumentStore::new());
		let facade = Arc::new(WorkspaceFacade::new(Arc::new(StubProvider)));
		let config = Arc::new(parking_lot::RwLock::new(ServerConfig::default()));
		let notify: crate::log_sink::NotifySink = Arc::new(|_method, _params| Box::pin(async move {}));
		let diagnostics = DiagnosticsEngine::new(documents.clone(), facade.clone(), config.clone(), notify.clone());
		Arc::new(ServerContext { documents, facade, config, notify, diagnostics, lifecycle: Lifecycle::new() })
	}

	fn call_for(id: i64, params: serde_json::Value) -> RequestCall {
		RequestCall {
			id: lsp_rpc::Id::Number(id),
			method: "test".into(),
			params,
			cancel: CancelSignal::never(),
		}
	}

	#[tokio::test]
	async fn hover_on_unopened_document_is_null() {
		let ctx = test_context();
		let params = json!({"textDocument": {"uri": "file:///missing"}, "position": {"line": 0, "character": 0}});
		let result = hover(ctx, call_for(1, params)).await.unwrap();
		assert!(result.is_null());
	}

	#[tokio::test]
	async fn hover_on_open_document_reaches_provider() {
		let ctx = test_context();
		ctx.documents.open("file:///a".into(), "rust".into(), 1, "hello".into()).unwrap();
		ctx.facade.bootstrap(CancelSignal::never()).await;
		let params = json!({"textDocument": {"uri": "file:///a"}, "position": {"line": 0, "character": 0}});
		let result = hover(ctx, call_for(1, params)).await.unwrap();
		assert!(!result.is_null());
	}

	#[tokio::test]
	async fn definition_returns_location_array() {
		let ctx = test_context();
		ctx.documents.open("file:///a".into(), "rust".into(), 1, "hello".into()).unwrap();
		ctx.facade.bootstrap(CancelSignal::never()).await;
		let params = json!({"textDocument": {"uri": "file:///a"}, "position": {"line": 0, "character": 0}});
		let result = definition(ctx, call_for(1, params)).await.unwrap();
		assert!(result.is_array());
	}
}
