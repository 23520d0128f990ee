//! Debounced per-URI diagnostics pipeline.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use lsp_types::PublishDiagnosticsParams;
use parking_lot::RwLock;

use lsp_worker::{CancelSignal, Debouncer};

use crate::analysis::{Snapshot, WorkspaceFacade};
use crate::config::ServerConfig;
use crate::documents::DocumentStore;
use crate::log_sink;
use crate::log_sink::NotifySink;

/// Coalesces bursts of `DocumentChanged` events into at most one
/// `compute_diagnostics` call per URI per quiet period.
pub struct DiagnosticsEngine {
	debouncer: Arc<Debouncer<Arc<str>>>,
	documents: Arc<DocumentStore>,
	facade: Arc<WorkspaceFacade>,
	config: Arc<RwLock<ServerConfig>>,
	notify: NotifySink,
	/// URIs that currently have a non-empty published diagnostic set, so
	/// `close` only needs to clear URIs that might actually have something
	/// on the client's screen. Not load-bearing for correctness — clearing
	/// an already-empty URI is harmless — kept only to avoid a pointless
	/// wire write on close of a document that was never diagnosed.
	published: Mutex<HashSet<Arc<str>>>,
}

impl DiagnosticsEngine {
	pub fn new(
		documents: Arc<DocumentStore>,
		facade: Arc<WorkspaceFacade>,
		config: Arc<RwLock<ServerConfig>>,
		notify: NotifySink,
	) -> Arc<Self> {
		Arc::new(Self {
			debouncer: Arc::new(Debouncer::new()),
			documents,
			facade,
			config,
			notify,
			published: Mutex::new(HashSet::new()),
		})
	}

	/// Arms (or re-arms, coalescing) the debounce slot for `uri`.
	pub fn handle_change(self: &Arc<Self>, uri: Arc<str>, version: i32) {
		if !self.config.read().diagnostics_enabled {
			return;
		}
		let delay = Duration::from_millis(self.config.read().debounce_ms);
		let this = Arc::clone(self);
		self.debouncer.arm(uri.clone(), delay, move |cancel| async move {
			this.compute_and_publish(uri, cancel).await;
		});
	}

	/// Cancels any pending computation, publishes an empty diagnostic list
	/// once to clear client UI, then forgets the URI.
	pub async fn handle_close(&self, uri: Arc<str>) {
		self.debouncer.cancel(&uri);
		self.published.lock().unwrap().remove(&uri);
		self.publish(uri, None, Vec::new()).await;
	}

	async fn compute_and_publish(&self, uri: Arc<str>, cancel: CancelSignal) {
		let Some((version, text)) = self.documents.snapshot(&uri) else {
			// Closed out from under the debounce timer; nothing to publish.
			return;
		};
		let snapshot = Arc::new(Snapshot { uri: uri.clone(), version, text });
		let diagnostics = match self.facade.compute_diagnostics(snapshot, cancel.clone()).await {
			Ok(diagnostics) => diagnostics,
			Err(err) => {
				tracing::warn!(%uri, error = %err, "analysis provider failed to compute diagnostics");
				log_sink::log_warn(&self.notify, format!("textDocument/publishDiagnostics: {err}")).await;
				Vec::new()
			}
		};
		if cancel.is_cancelled() {
			// A later edit preempted us; its own debounce firing will publish.
			return;
		}

		let minimum_severity = self.config.read().minimum_severity;
		let filtered: Vec<_> = diagnostics
			.into_iter()
			.filter(|d| d.severity.map_or(true, |s| s <= minimum_severity))
			.collect();

		if filtered.is_empty() {
			self.published.lock().unwrap().remove(&uri);
		} else {
			self.published.lock().unwrap().insert(uri.clone());
		}
		self.publish(uri, Some(version), filtered).await;
	}

	/// Re-triggers diagnostics for every open document, used after
	/// `workspace/didChangeConfiguration` changes `minimum_severity` so
	/// previously-filtered diagnostics surface without requiring an edit.
	pub fn recompute_all_open(self: &Arc<Self>) {
		for uri in self.documents.documents() {
			if let Some((version, _)) = self.documents.snapshot(&uri) {
				self.handle_change(uri, version);
			}
		}
	}

	async fn publish(&self, uri: Arc<str>, version: Option<i32>, diagnostics: Vec<lsp_types::Diagnostic>) {
		let Ok(parsed_uri) = uri.parse::<lsp_types::Uri>() else {
			tracing::warn!(%uri, "cannot publish diagnostics for unparseable uri");
			return;
		};
		let params = PublishDiagnosticsParams { uri: parsed_uri, diagnostics, version };
		let value = serde_json::to_value(params).expect("PublishDiagnosticsParams always serializes");
		(self.notify)("textDocument/publishDiagnostics", value).await;
	}
}
