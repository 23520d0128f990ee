//! A no-op `AnalysisProvider` so the kernel produces a runnable binary
//! without a real semantic analyzer. Answers every capability with an
//! empty/unchanged result; exists only for manual smoke testing over
//! `--stdio`/`--pipe`.

use std::sync::Arc;

use async_trait::async_trait;
use lsp_server::{AnalysisProvider, ProviderError, Snapshot};
use lsp_types::{
	CompletionContext, CompletionItem, CompletionList, Diagnostic, DocumentSymbol, Hover, Location, Position,
	PrepareRenameResponse, SymbolInformation, WorkspaceEdit,
};
use lsp_worker::CancelSignal;

pub struct StubProvider;

#[async_trait]
impl AnalysisProvider for StubProvider {
	async fn compute_diagnostics(
		&self,
		_snapshot: Arc<Snapshot>,
		_cancel: CancelSignal,
	) -> Result<Vec<Diagnostic>, ProviderError> {
		Ok(Vec::new())
	}

	async fn completions(
		&self,
		_snapshot: Arc<Snapshot>,
		_position: Position,
		_context: Option<CompletionContext>,
		_cancel: CancelSignal,
	) -> Result<CompletionList, ProviderError> {
		Ok(CompletionList::default())
	}

	async fn resolve_completion(&self, item: CompletionItem, _cancel: CancelSignal) -> Result<CompletionItem, ProviderError> {
		Ok(item)
	}

	async fn hover(
		&self,
		_snapshot: Arc<Snapshot>,
		_position: Position,
		_cancel: CancelSignal,
	) -> Result<Option<Hover>, ProviderError> {
		Ok(None)
	}

	async fn definition(
		&self,
		_snapshot: Arc<Snapshot>,
		_position: Position,
		_cancel: CancelSignal,
	) -> Result<Vec<Location>, ProviderError> {
		Ok(Vec::new())
	}

	async fn references(
		&self,
		_snapshot: Arc<Snapshot>,
		_position: Position,
		_include_declaration: bool,
		_cancel: CancelSignal,
	) -> Result<Vec<Location>, ProviderError> {
		Ok(Vec::new())
	}

	async fn prepare_rename(
		&self,
		_snapshot: Arc<Snapshot>,
		_position: Position,
		_cancel: CancelSignal,
	) -> Result<Option<PrepareRenameResponse>, ProviderError> {
		Ok(None)
	}

	async fn rename(
		&self,
		_snapshot: Arc<Snapshot>,
		_position: Position,
		_new_name: String,
		_cancel: CancelSignal,
	) -> Result<Option<WorkspaceEdit>, ProviderError> {
		Ok(None)
	}

	async fn document_symbols(
		&self,
		_snapshot: Arc<Snapshot>,
		_cancel: CancelSignal,
	) -> Result<Vec<DocumentSymbol>, ProviderError> {
		Ok(Vec::new())
	}

	async fn workspace_symbols(&self, _query: String, _cancel: CancelSignal) -> Result<Vec<SymbolInformation>, ProviderError> {
		Ok(Vec::new())
	}

	async fn bootstrap(&self, _cancel: CancelSignal) {}
}
