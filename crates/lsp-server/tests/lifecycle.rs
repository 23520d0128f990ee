//! End-to-end tests driving a [`Server`] through a scripted transport,
//! exercising the handshake, lifecycle gating, debounced diagnostics, and
//! cancellation without a real pipe or stdio.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use lsp_rpc::transport::{MessageReader, MessageWriter};
use lsp_server::analysis::{AnalysisProvider, Snapshot};
use lsp_server::{ProviderError, Server};
use lsp_types::{
	CompletionContext, CompletionItem, CompletionList, Diagnostic, DiagnosticSeverity, DocumentSymbol, Hover,
	Location, Position, PrepareRenameResponse, SymbolInformation, WorkspaceEdit,
};
use lsp_worker::CancelSignal;
use serde_json::{json, Value};

struct ScriptedReader {
	messages: std::vec::IntoIter<Vec<u8>>,
}

impl ScriptedReader {
	fn new(messages: Vec<Value>) -> Self {
		Self { messages: messages.into_iter().map(|v| serde_json::to_vec(&v).unwrap()).collect::<Vec<_>>().into_iter() }
	}
}

#[async_trait]
impl MessageReader for ScriptedReader {
	async fn read_message(&mut self) -> lsp_rpc::error::Result<Option<Vec<u8>>> {
		Ok(self.messages.next())
	}
}

#[derive(Default)]
struct RecordingWriter {
	written: Mutex<Vec<Value>>,
}

#[async_trait]
impl MessageWriter for RecordingWriter {
	async fn write_message(&self, body: &[u8]) -> lsp_rpc::error::Result<()> {
		let value: Value = serde_json::from_slice(body).expect("server always writes valid JSON");
		self.written.lock().unwrap().push(value);
		Ok(())
	}
}

impl RecordingWriter {
	fn notifications(&self, method: &str) -> Vec<Value> {
		self.written.lock().unwrap().iter().filter(|v| v["method"] == method).cloned().collect()
	}

	fn response_to(&self, id: i64) -> Option<Value> {
		self.written.lock().unwrap().iter().find(|v| v["id"] == json!(id)).cloned()
	}
}

/// A provider whose diagnostics reflect the document's current version, so
/// tests can tell which snapshot a publish came from, and whose other
/// methods return recognizable fixed values.
struct StubProvider {
	diagnostics_calls: AtomicUsize,
}

impl StubProvider {
	fn new() -> Self {
		Self { diagnostics_calls: AtomicUsize::new(0) }
	}
}

#[async_trait]
impl AnalysisProvider for StubProvider {
	async fn compute_diagnostics(
		&self,
		snapshot: Arc<Snapshot>,
		_cancel: CancelSignal,
	) -> Result<Vec<Diagnostic>, ProviderError> {
		self.diagnostics_calls.fetch_add(1, Ordering::SeqCst);
		Ok(vec![Diagnostic {
			range: lsp_types::Range::new(Position::new(0, 0), Position::new(0, 1)),
			severity: Some(DiagnosticSeverity::ERROR),
			message: format!("v{}", snapshot.version),
			..Default::default()
		}])
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
	async fn workspace_symbols(&self, _query: String, cancel: CancelSignal) -> Result<Vec<SymbolInformation>, ProviderError> {
		// Lets cancellation tests race a long-running provider call.
		tokio::select! {
			_ = tokio::time::sleep(Duration::from_secs(3600)) => Ok(Vec::new()),
			_ = cancel.cancelled() => Ok(Vec::new()),
		}
	}
	async fn bootstrap(&self, _cancel: CancelSignal) {}
}

fn initialize_msg(id: i64) -> Value {
	json!({"jsonrpc": "2.0", "id": id, "method": "initialize", "params": {"capabilities": {}}})
}

fn initialized_msg() -> Value {
	json!({"jsonrpc": "2.0", "method": "initialized", "params": {}})
}

fn did_open_msg(uri: &str, text: &str, version: i64) -> Value {
	json!({
		"jsonrpc": "2.0",
		"method": "textDocument/didOpen",
		"params": {"textDocument": {"uri": uri, "languageId": "rust", "version": version, "text": text}},
	})
}

fn did_change_msg(uri: &str, version: i64, text: &str) -> Value {
	json!({
		"jsonrpc": "2.0",
		"method": "textDocument/didChange",
		"params": {
			"textDocument": {"uri": uri, "version": version},
			"contentChanges": [{"text": text}],
		},
	})
}

#[tokio::test]
async fn handshake_then_shutdown_then_exit() {
	let writer = Arc::new(RecordingWriter::default());
	let server = Server::new(Arc::new(StubProvider::new()), writer.clone());
	server.start();
	let dispatcher = server.dispatcher();
	let mut exit_code = server.exit_code();

	let reader = ScriptedReader::new(vec![
		initialize_msg(1),
		initialized_msg(),
		json!({"jsonrpc": "2.0", "id": 2, "method": "shutdown"}),
		json!({"jsonrpc": "2.0", "method": "exit"}),
	]);
	dispatcher.run(Box::new(reader)).await.unwrap();
	tokio::time::sleep(Duration::from_millis(20)).await;

	let init_response = writer.response_to(1).expect("initialize answered");
	assert_eq!(init_response["result"]["capabilities"]["positionEncoding"], json!("utf-16"));
	assert_eq!(init_response["result"]["capabilities"]["textDocumentSync"]["change"], json!(2));

	let shutdown_response = writer.response_to(2).expect("shutdown answered");
	assert_eq!(shutdown_response["result"], Value::Null);

	exit_code.changed().await.unwrap();
	assert_eq!(*exit_code.borrow(), Some(0));
}

#[tokio::test]
async fn shutdown_is_idempotent() {
	let writer = Arc::new(RecordingWriter::default());
	let server = Server::new(Arc::new(StubProvider::new()), writer.clone());
	server.start();
	let dispatcher = server.dispatcher();

	let reader = ScriptedReader::new(vec![
		initialize_msg(1),
		initialized_msg(),
		json!({"jsonrpc": "2.0", "id": 2, "method": "shutdown"}),
		json!({"jsonrpc": "2.0", "id": 3, "method": "shutdown"}),
	]);
	dispatcher.run(Box::new(reader)).await.unwrap();
	tokio::time::sleep(Duration::from_millis(20)).await;

	assert_eq!(writer.response_to(2).unwrap()["result"], Value::Null);
	assert_eq!(writer.response_to(3).unwrap()["result"], Value::Null);
}

#[tokio::test]
async fn request_before_initialize_is_rejected() {
	let writer = Arc::new(RecordingWriter::default());
	let server = Server::new(Arc::new(StubProvider::new()), writer.clone());
	server.start();
	let dispatcher = server.dispatcher();

	let reader = ScriptedReader::new(vec![json!({
		"jsonrpc": "2.0",
		"id": 1,
		"method": "textDocument/hover",
		"params": {"textDocument": {"uri": "file:///a"}, "position": {"line": 0, "character": 0}},
	})]);
	dispatcher.run(Box::new(reader)).await.unwrap();
	tokio::time::sleep(Duration::from_millis(20)).await;

	let response = writer.response_to(1).unwrap();
	assert_eq!(response["error"]["code"], json!(-32002));
}

#[tokio::test]
async fn cancel_request_stops_in_flight_handler() {
	let writer = Arc::new(RecordingWriter::default());
	let server = Server::new(Arc::new(StubProvider::new()), writer.clone());
	server.start();
	let dispatcher = server.dispatcher();

	let reader = ScriptedReader::new(vec![
		initialize_msg(1),
		initialized_msg(),
		json!({"jsonrpc": "2.0", "id": 7, "method": "workspace/symbol", "params": {"query": "foo"}}),
		json!({"jsonrpc": "2.0", "method": "$/cancelRequest", "params": {"id": 7}}),
	]);
	dispatcher.run(Box::new(reader)).await.unwrap();
	tokio::time::sleep(Duration::from_millis(20)).await;

	let response = writer.response_to(7).expect("workspace/symbol answered");
	assert_eq!(response["error"]["code"], json!(-32800));
}

#[tokio::test]
async fn malformed_message_does_not_stop_the_server() {
	let writer = Arc::new(RecordingWriter::default());
	let server = Server::new(Arc::new(StubProvider::new()), writer.clone());
	server.start();
	let dispatcher = server.dispatcher();

	// A malformed frame ahead of a well-formed one: needs a raw byte stream,
	// which ScriptedReader (JSON Value in, JSON Value out) can't express.
	struct RawReader(std::vec::IntoIter<Vec<u8>>);
	#[async_trait]
	impl MessageReader for RawReader {
		async fn read_message(&mut self) -> lsp_rpc::error::Result<Option<Vec<u8>>> {
			Ok(self.0.next())
		}
	}
	let raw = RawReader(vec![b"{not json".to_vec(), serde_json::to_vec(&initialize_msg(1)).unwrap()].into_iter());

	dispatcher.run(Box::new(raw)).await.unwrap();
	tokio::time::sleep(Duration::from_millis(20)).await;

	let written = writer.written.lock().unwrap();
	assert_eq!(written[0]["id"], Value::Null);
	assert_eq!(written[0]["error"]["code"], json!(-32700));
	assert_eq!(written[1]["id"], json!(1));
	assert!(written[1]["result"]["capabilities"].is_object());
}

#[tokio::test(start_paused = true)]
async fn rapid_edits_publish_once_at_the_latest_version() {
	let writer = Arc::new(RecordingWriter::default());
	let server = Server::new(Arc::new(StubProvider::new()), writer.clone());
	server.start();
	let dispatcher = server.dispatcher();

	let reader = ScriptedReader::new(vec![
		initialize_msg(1),
		initialized_msg(),
		did_open_msg("file:///a", "one", 1),
		did_change_msg("file:///a", 2, "two"),
		did_change_msg("file:///a", 3, "three"),
		did_change_msg("file:///a", 4, "four"),
	]);
	dispatcher.run(Box::new(reader)).await.unwrap();

	// Let the document-store broadcast reach the diagnostics subscriber
	// task before advancing the debounce clock.
	for _ in 0..8 {
		tokio::task::yield_now().await;
	}
	tokio::time::advance(Duration::from_millis(500)).await;
	tokio::task::yield_now().await;

	let published = writer.notifications("textDocument/publishDiagnostics");
	assert_eq!(published.len(), 1, "expected exactly one publish, got {published:?}");
	assert_eq!(published[0]["params"]["version"], json!(4));
	assert_eq!(published[0]["params"]["diagnostics"][0]["message"], json!("v4"));
}

#[tokio::test(start_paused = true)]
async fn closing_a_document_clears_its_diagnostics() {
	let writer = Arc::new(RecordingWriter::default());
	let server = Server::new(Arc::new(StubProvider::new()), writer.clone());
	server.start();
	let dispatcher = server.dispatcher();

	let reader = ScriptedReader::new(vec![
		initialize_msg(1),
		initialized_msg(),
		did_open_msg("file:///a", "one", 1),
		json!({
			"jsonrpc": "2.0",
			"method": "textDocument/didClose",
			"params": {"textDocument": {"uri": "file:///a"}},
		}),
	]);
	dispatcher.run(Box::new(reader)).await.unwrap();
	for _ in 0..8 {
		tokio::task::yield_now().await;
	}
	tokio::time::advance(Duration::from_millis(500)).await;
	tokio::task::yield_now().await;

	let published = writer.notifications("textDocument/publishDiagnostics");
	assert_eq!(published.len(), 1);
	assert!(published[0]["params"]["diagnostics"].as_array().unwrap().is_empty());
	assert_eq!(published[0]["params"]["version"], Value::Null);
}
