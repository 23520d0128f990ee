//! Demultiplexes decoded messages to a routing [`tower_service::Service`],
//! tracks in-flight requests for cancellation, and serializes outbound
//! writes.
//!
//! Generic over the service type so that `lsp-server` can wrap a plain
//! [`Router`](crate::service::Router) in a `tower_layer::Layer` (e.g. to
//! gate methods by lifecycle state) without this crate knowing anything
//! about LSP semantics.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use lsp_worker::{spawn_guarded, CancelSource};
use serde_json::Value;
use tower_service::Service;

use crate::envelope::{self, Id, Incoming, Response};
use crate::service::{NotificationCall, RequestCall, RouterCall, RouterResponse};
use crate::transport::{MessageReader, MessageWriter};

struct RequestRecord {
	#[allow(dead_code)]
	method: String,
	cancel: CancelSource,
	#[allow(dead_code)]
	started_at: Instant,
}

/// The running dispatcher: owns the in-flight table and a handle to the
/// outbound writer. Cheap to clone — handlers receive a clone to publish
/// server-initiated notifications (e.g. `textDocument/publishDiagnostics`)
/// without a back-pointer to the dispatcher that spawned them — the write
/// capability is injected as a plain function value instead.
pub struct Dispatcher<S> {
	writer: Arc<dyn MessageWriter>,
	router: S,
	/// Methods whose response must reach the wire before the dispatcher
	/// reads its next message — e.g. `shutdown`, so the client can rely on
	/// its ordering relative to `exit`. Everything else runs concurrently.
	sequential_methods: Arc<HashSet<String>>,
	in_flight: Arc<Mutex<HashMap<Id, RequestRecord>>>,
}

impl<S> Clone for Dispatcher<S>
where
	S: Clone,
{
	fn clone(&self) -> Self {
		Self {
			writer: Arc::clone(&self.writer),
			router: self.router.clone(),
			sequential_methods: Arc::clone(&self.sequential_methods),
			in_flight: Arc::clone(&self.in_flight),
		}
	}
}

impl<S> Dispatcher<S>
where
	S: Service<RouterCall, Response = RouterResponse, Error = std::convert::Infallible> + Clone + Send + Sync + 'static,
	S::Future: Send + 'static,
{
	pub fn new(writer: Arc<dyn MessageWriter>, router: S) -> Self {
		Self::with_sequential_methods(writer, router, [])
	}

	pub fn with_sequential_methods(
		writer: Arc<dyn MessageWriter>,
		router: S,
		sequential_methods: impl IntoIterator<Item = &'static str>,
	) -> Self {
		Self {
			writer,
			router,
			sequential_methods: Arc::new(sequential_methods.into_iter().map(str::to_string).collect()),
			in_flight: Arc::new(Mutex::new(HashMap::new())),
		}
	}

	/// Sends a server-initiated notification (no response expected), such
	/// as `textDocument/publishDiagnostics`.
	pub async fn notify(&self, method: &str, params: Value) {
		let body = serde_json::json!({
			"jsonrpc": "2.0",
			"method": method,
			"params": params,
		});
		if let Err(err) = self.write_value(&body).await {
			tracing::warn!(method, error = %err, "failed to write outbound notification");
		}
	}

	async fn write_value(&self, value: &Value) -> crate::error::Result<()> {
		let bytes = serde_json::to_vec(value).expect("outbound message is always valid JSON");
		self.writer.write_message(&bytes).await
	}

	async fn write_response(&self, response: Response) {
		if let Err(err) = self.write_value(&serde_json::to_value(&response).expect("Response always serializes")).await
		{
			tracing::warn!(error = %err, "failed to write outbound response");
		}
	}

	/// Drains messages from `reader` until clean close or a fatal transport
	/// error, dispatching each to the router. Returns once the stream ends.
	pub async fn run(self, mut reader: Box<dyn MessageReader>) -> crate::error::Result<()> {
		loop {
			let body = match reader.read_message().await {
				Ok(Some(body)) => body,
				Ok(None) => return Ok(()),
				Err(err) => {
					self.release_all_in_flight();
					return Err(err);
				}
			};

			match envelope::decode(&body) {
				Ok(Incoming::Request(req)) => self.dispatch_request(req).await,
				Ok(Incoming::Notification(notif)) => self.dispatch_notification(notif).await,
				Ok(Incoming::Response(_)) => {
					// This core never issues client->server requests of its
					// own, so an inbound "response" is unexpected; ignore.
					tracing::debug!("ignoring unexpected inbound response message");
				}
				Err(parse_error) => {
					self.write_response(Response::failure(Id::Null, parse_error)).await;
				}
			}
		}
	}

	async fn dispatch_request(&self, req: envelope::Request) {
		if req.method == "$/cancelRequest" {
			self.handle_cancel_request(req.params);
			return;
		}

		let cancel_source = CancelSource::new();
		let cancel = cancel_source.signal();
		{
			let mut in_flight = self.in_flight.lock().unwrap();
			in_flight.insert(
				req.id.clone(),
				RequestRecord { method: req.method.clone(), cancel: cancel_source, started_at: Instant::now() },
			);
		}

		let call = RequestCall { id: req.id.clone(), method: req.method.clone(), params: req.params, cancel };

		if self.sequential_methods.contains(&req.method) {
			let response = self.run_request(call).await;
			self.write_response(response).await;
		} else {
			let this = self.clone();
			let guard_dispatcher = self.clone();
			let id_for_guard = req.id.clone();
			spawn_guarded(
				async move {
					let response = this.run_request(call).await;
					this.write_response(response).await;
				},
				move || {
					// Runs even if the handler future is dropped without
					// completing normally (panic, runtime shutdown),
					// guaranteeing release on every exit path.
					guard_dispatcher.release_in_flight(&id_for_guard);
				},
			);
		}
	}

	/// Invokes the router and releases the in-flight record, regardless of
	/// whether the handler succeeded, failed, or was cancelled.
	async fn run_request(&self, call: RequestCall) -> Response {
		let id = call.id.clone();
		let mut router = self.router.clone();
		let result = router.call(RouterCall::Request(call)).await;
		self.release_in_flight(&id);
		match result {
			Ok(RouterResponse::Reply { id, outcome }) => match outcome {
				Ok(value) => Response::success(id, value),
				Err(error) => Response::failure(id, error),
			},
			Ok(RouterResponse::None) => unreachable!("request call always yields Reply"),
			Err(infallible) => match infallible {},
		}
	}

	async fn dispatch_notification(&self, notif: envelope::Notification) {
		let call = NotificationCall { method: notif.method, params: notif.params };
		let mut router = self.router.clone();
		let _ = router.call(RouterCall::Notification(call)).await;
	}

	fn handle_cancel_request(&self, params: Value) {
		let Some(id) = parse_cancel_id(&params) else {
			tracing::debug!("$/cancelRequest with unparseable id; ignoring");
			return;
		};
		// Unknown id (already completed or never received) is silently
		// ignored.
		if let Some(record) = self.in_flight.lock().unwrap().get(&id) {
			record.cancel.cancel();
		}
	}

	fn release_in_flight(&self, id: &Id) {
		self.in_flight.lock().unwrap().remove(id);
	}

	fn release_all_in_flight(&self) {
		let mut in_flight = self.in_flight.lock().unwrap();
		for (_, record) in in_flight.drain() {
			record.cancel.cancel();
		}
	}
}

fn parse_cancel_id(params: &Value) -> Option<Id> {
	let raw = params.get("id")?;
	if let Some(n) = raw.as_i64() {
		Some(Id::Number(n))
	} else {
		raw.as_str().map(|s| Id::String(s.to_string()))
	}
}
