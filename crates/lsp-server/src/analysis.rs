//! Adapts the abstract AnalysisProvider capability to the server.
//! Everything here is generic over the concrete semantic analyzer, which
//! is out of scope for this kernel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use lsp_text::SourceText;
use lsp_types::{
	CompletionContext, CompletionItem, CompletionList, Diagnostic, DocumentSymbol, Hover, Location, Position,
	PrepareRenameResponse, SymbolInformation, WorkspaceEdit,
};
use lsp_worker::CancelSignal;

use crate::error::ProviderResult;

/// `(uri, version, text)` handed to every AnalysisProvider call. Results
/// are computed against this exact snapshot; the provider never reads the
/// live Document Store.
#[derive(Debug, Clone)]
pub struct Snapshot {
	pub uri: Arc<str>,
	pub version: i32,
	pub text: SourceText,
}

/// The external capability this core delegates semantic analysis to. Out
/// of scope to implement here — the kernel only needs the shape of the
/// boundary.
///
/// Every feature method returns [`ProviderResult`] so a failing analysis
/// backend (a crashed index, a panicking query, a downstream timeout) can
/// be reported to the client instead of silently degrading to an empty
/// result indistinguishable from "nothing found".
#[async_trait]
pub trait AnalysisProvider: Send + Sync {
	async fn compute_diagnostics(&self, snapshot: Arc<Snapshot>, cancel: CancelSignal) -> ProviderResult<Vec<Diagnostic>>;

	async fn completions(
		&self,
		snapshot: Arc<Snapshot>,
		position: Position,
		context: Option<CompletionContext>,
		cancel: CancelSignal,
	) -> ProviderResult<CompletionList>;

	async fn resolve_completion(&self, item: CompletionItem, cancel: CancelSignal) -> ProviderResult<CompletionItem>;

	async fn hover(
		&self,
		snapshot: Arc<Snapshot>,
		position: Position,
		cancel: CancelSignal,
	) -> ProviderResult<Option<Hover>>;

	async fn definition(
		&self,
		snapshot: Arc<Snapshot>,
		position: Position,
		cancel: CancelSignal,
	) -> ProviderResult<Vec<Location>>;

	async fn references(
		&self,
		snapshot: Arc<Snapshot>,
		position: Position,
		include_declaration: bool,
		cancel: CancelSignal,
	) -> ProviderResult<Vec<Location>>;

	async fn prepare_rename(
		&self,
		snapshot: Arc<Snapshot>,
		position: Position,
		cancel: CancelSignal,
	) -> ProviderResult<Option<PrepareRenameResponse>>;

	async fn rename(
		&self,
		snapshot: Arc<Snapshot>,
		position: Position,
		new_name: String,
		cancel: CancelSignal,
	) -> ProviderResult<Option<WorkspaceEdit>>;

	async fn document_symbols(
		&self,
		snapshot: Arc<Snapshot>,
		cancel: CancelSignal,
	) -> ProviderResult<Vec<DocumentSymbol>>;

	async fn workspace_symbols(&self, query: String, cancel: CancelSignal) -> ProviderResult<Vec<SymbolInformation>>;

	/// One-time project/source discovery kicked off after `initialized`.
	async fn bootstrap(&self, cancel: CancelSignal);
}

/// Wraps an [`AnalysisProvider`] with bootstrap-readiness tracking. Before
/// bootstrap completes, feature requests are answered with best-effort
/// empty/null results instead of reaching the provider at all.
pub struct WorkspaceFacade {
	provider: Arc<dyn AnalysisProvider>,
	ready: AtomicBool,
}

impl WorkspaceFacade {
	pub fn new(provider: Arc<dyn AnalysisProvider>) -> Self {
		Self { provider, ready: AtomicBool::new(false) }
	}

	pub fn is_ready(&self) -> bool {
		self.ready.load(Ordering::Acquire)
	}

	/// Runs bootstrap to completion and marks the façade ready. Spawned as
	/// its own task by the caller so `initialized` can return immediately.
	pub async fn bootstrap(&self, cancel: CancelSignal) {
		self.provider.bootstrap(cancel).await;
		self.ready.store(true, Ordering::Release);
	}

	pub async fn compute_diagnostics(
		&self,
		snapshot: Arc<Snapshot>,
		cancel: CancelSignal,
	) -> ProviderResult<Vec<Diagnostic>> {
		if !self.is_ready() {
			return Ok(Vec::new());
		}
		self.provider.compute_diagnostics(snapshot, cancel).await
	}

	pub async fn completions(
		&self,
		snapshot: Arc<Snapshot>,
		position: Position,
		context: Option<CompletionContext>,
		cancel: CancelSignal,
	) -> ProviderResult<CompletionList> {
		if !self.is_ready() {
			return Ok(CompletionList { is_incomplete: true, items: Vec::new(), ..Default::default() });
		}
		self.provider.completions(snapshot, position, context, cancel).await
	}

	pub async fn resolve_completion(&self, item: CompletionItem, cancel: CancelSignal) -> ProviderResult<CompletionItem> {
		if !self.is_ready() {
			return Ok(item);
		}
		self.provider.resolve_completion(item, cancel).await
	}

	pub async fn hover(
		&self,
		snapshot: Arc<Snapshot>,
		position: Position,
		cancel: CancelSignal,
	) -> ProviderResult<Option<Hover>> {
		if !self.is_ready() {
			return Ok(None);
		}
		self.provider.hover(snapshot, position, cancel).await
	}

	pub async fn definition(
		&self,
		snapshot: Arc<Snapshot>,
		position: Position,
		cancel: CancelSignal,
	) -> ProviderResult<Vec<Location>> {
		if !self.is_ready() {
			return Ok(Vec::new());
		}
		self.provider.definition(snapshot, position, cancel).await
	}

	pub async fn references(
		&self,
		snapshot: Arc<Snapshot>,
		position: Position,
		include_declaration: bool,
		cancel: CancelSignal,
	) -> ProviderResult<Vec<Location>> {
		if !self.is_ready() {
			return Ok(Vec::new());
		}
		self.provider.references(snapshot, position, include_declaration, cancel).await
	}

	pub async fn prepare_rename(
		&self,
		snapshot: Arc<Snapshot>,
		position: Position,
		cancel: CancelSignal,
	) -> ProviderResult<Option<PrepareRenameResponse>> {
		if !self.is_ready() {
			return Ok(None);
		}
		self.provider.prepare_rename(snapshot, position, cancel).await
	}

	pub async fn rename(
		&self,
		snapshot: Arc<Snapshot>,
		position: Position,
		new_name: String,
		cancel: CancelSignal,
	) -> ProviderResult<Option<WorkspaceEdit>> {
		if !self.is_ready() {
			return Ok(None);
		}
		self.provider.rename(snapshot, position, new_name, cancel).await
	}

	pub async fn document_symbols(
		&self,
		snapshot: Arc<Snapshot>,
		cancel: CancelSignal,
	) -> ProviderResult<Vec<DocumentSymbol>> {
		if !self.is_ready() {
			return Ok(Vec::new());
		}
		self.provider.document_symbols(snapshot, cancel).await
	}

	pub async fn workspace_symbols(&self, query: String, cancel: CancelSignal) -> ProviderResult<Vec<SymbolInformation>> {
		if !self.is_ready() {
			return Ok(Vec::new());
		}
		self.provider.workspace_symbols(query, cancel).await
	}
}
