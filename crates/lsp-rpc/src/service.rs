//! Method-name-keyed handler registry, expressed as a [`tower_service::Service`]
//! so the dispatcher can wrap it in ordinary `tower` middleware.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use serde_json::Value;
use tower_service::Service;

use crate::envelope::{Id, ResponseError};
use lsp_worker::CancelSignal;

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// A single request call, carrying enough context for a handler to honor
/// cancellation.
pub struct RequestCall {
	pub id: Id,
	pub method: String,
	pub params: Value,
	pub cancel: CancelSignal,
}

/// A single notification call.
pub struct NotificationCall {
	pub method: String,
	pub params: Value,
}

pub trait RequestHandler: Send + Sync {
	fn call(&self, call: RequestCall) -> BoxFuture<Result<Value, ResponseError>>;
}

impl<F, Fut> RequestHandler for F
where
	F: Fn(RequestCall) -> Fut + Send + Sync,
	Fut: Future<Output = Result<Value, ResponseError>> + Send + 'static,
{
	fn call(&self, call: RequestCall) -> BoxFuture<Result<Value, ResponseError>> {
		Box::pin((self)(call))
	}
}

pub trait NotificationHandler: Send + Sync {
	fn call(&self, call: NotificationCall) -> BoxFuture<()>;
}

impl<F, Fut> NotificationHandler for F
where
	F: Fn(NotificationCall) -> Fut + Send + Sync,
	Fut: Future<Output = ()> + Send + 'static,
{
	fn call(&self, call: NotificationCall) -> BoxFuture<()> {
		Box::pin((self)(call))
	}
}

/// The method-name routing table. Each method has at most one handler;
/// registering the same method twice replaces it.
#[derive(Default, Clone)]
pub struct Router {
	requests: Arc<HashMap<String, Arc<dyn RequestHandler>>>,
	notifications: Arc<HashMap<String, Arc<dyn NotificationHandler>>>,
}

pub struct RouterBuilder {
	requests: HashMap<String, Arc<dyn RequestHandler>>,
	notifications: HashMap<String, Arc<dyn NotificationHandler>>,
}

impl RouterBuilder {
	pub fn new() -> Self {
		Self { requests: HashMap::new(), notifications: HashMap::new() }
	}

	pub fn request(mut self, method: &str, handler: impl RequestHandler + 'static) -> Self {
		self.requests.insert(method.to_string(), Arc::new(handler));
		self
	}

	pub fn notification(mut self, method: &str, handler: impl NotificationHandler + 'static) -> Self {
		self.notifications.insert(method.to_string(), Arc::new(handler));
		self
	}

	pub fn build(self) -> Router {
		Router { requests: Arc::new(self.requests), notifications: Arc::new(self.notifications) }
	}
}

impl Default for RouterBuilder {
	fn default() -> Self {
		Self::new()
	}
}

pub enum RouterCall {
	Request(RequestCall),
	Notification(NotificationCall),
}

pub enum RouterResponse {
	/// A response to write back for a request.
	Reply { id: Id, outcome: Result<Value, ResponseError> },
	/// Nothing to write back (notification handled, or none registered).
	None,
}

impl Router {
	pub fn has_request_handler(&self, method: &str) -> bool {
		self.requests.contains_key(method)
	}
}

/// `Router` implements `Service` over an already-classified call so that
/// cross-cutting concerns (the cancellation bookkeeping in `dispatcher.rs`)
/// can be layered around it with `tower_layer::Layer` instead of woven into
/// the routing logic itself.
impl Service<RouterCall> for Router {
	type Response = RouterResponse;
	type Error = std::convert::Infallible;
	type Future = BoxFuture<Result<RouterResponse, std::convert::Infallible>>;

	fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
		Poll::Ready(Ok(()))
	}

	fn call(&mut self, call: RouterCall) -> Self::Future {
		let requests = Arc::clone(&self.requests);
		let notifications = Arc::clone(&self.notifications);
		Box::pin(async move {
			match call {
				RouterCall::Request(req) => match requests.get(&req.method) {
					Some(handler) => {
						let id = req.id.clone();
						let outcome = handler.call(req).await;
						Ok(RouterResponse::Reply { id, outcome })
					}
					None => Ok(RouterResponse::Reply {
						id: req.id,
						outcome: Err(ResponseError::method_not_found(&req.method)),
					}),
				},
				RouterCall::Notification(notif) => {
					if let Some(handler) = notifications.get(&notif.method) {
						handler.call(notif).await;
					} else {
						tracing::debug!(method = %notif.method, "dropping unrecognized notification");
					}
					Ok(RouterResponse::None)
				}
			}
		})
	}
}
