//! The `initialize` / `initialized` / `shutdown` / `exit` state machine,
//! enforced as a [`tower_layer::Layer`] wrapping the router so that
//! feature handlers never have to check state themselves.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use lsp_rpc::envelope::ResponseError;
use lsp_rpc::service::{RouterCall, RouterResponse};
use parking_lot::Mutex;
use tower_layer::Layer;
use tower_service::Service;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
	NotStarted,
	Starting,
	Initializing,
	Running,
	ShuttingDown,
	Stopped,
}

/// Shared handle to the current [`ServerState`]. Cheap to clone; every
/// clone observes the same state.
#[derive(Clone)]
pub struct Lifecycle {
	state: Arc<Mutex<ServerState>>,
}

impl Default for Lifecycle {
	fn default() -> Self {
		Self::new()
	}
}

impl Lifecycle {
	pub fn new() -> Self {
		Self { state: Arc::new(Mutex::new(ServerState::NotStarted)) }
	}

	pub fn state(&self) -> ServerState {
		*self.state.lock()
	}

	/// `run()` starting the transport: NotStarted -> Starting.
	pub fn start(&self) {
		*self.state.lock() = ServerState::Starting;
	}

	/// Returns whether this call is the legitimate first `initialize`.
	pub fn on_initialize(&self) -> bool {
		let mut state = self.state.lock();
		if *state == ServerState::Starting {
			*state = ServerState::Initializing;
			true
		} else {
			false
		}
	}

	pub fn on_initialized(&self) -> bool {
		let mut state = self.state.lock();
		if *state == ServerState::Initializing {
			*state = ServerState::Running;
			true
		} else {
			false
		}
	}

	/// `shutdown` is idempotent — two requests back to back both return
	/// null. Called from Running it transitions; called again from
	/// ShuttingDown it is a no-op that still answers null, handled by the
	/// request handler returning `Ok(Null)` unconditionally once this
	/// returns.
	pub fn on_shutdown(&self) {
		let mut state = self.state.lock();
		if *state == ServerState::Running {
			*state = ServerState::ShuttingDown;
		}
	}

	/// Returns the process exit code: 0 if `shutdown` preceded `exit`, 1
	/// otherwise.
	pub fn on_exit(&self) -> i32 {
		let mut state = self.state.lock();
		let code = if *state == ServerState::ShuttingDown { 0 } else { 1 };
		*state = ServerState::Stopped;
		code
	}

	/// Whether `method` may reach its handler in the current state. Returns
	/// the rejection error otherwise.
	fn gate(&self, method: &str) -> Result<(), ResponseError> {
		match (self.state(), method) {
			(ServerState::Running, _) => Ok(()),
			(ServerState::ShuttingDown, "exit" | "shutdown") => Ok(()),
			(ServerState::ShuttingDown, _) => Err(ResponseError::invalid_request(format!(
				"server is shutting down, cannot accept {method}"
			))),
			(ServerState::Starting, "initialize") => Ok(()),
			(ServerState::Initializing, "initialized") => Ok(()),
			(ServerState::NotStarted | ServerState::Starting | ServerState::Initializing, _) => {
				Err(ResponseError::server_not_initialized())
			}
			(ServerState::Stopped, _) => Err(ResponseError::invalid_request("server has stopped")),
		}
	}
}

#[derive(Clone)]
pub struct LifecycleLayer {
	lifecycle: Lifecycle,
}

impl LifecycleLayer {
	pub fn new(lifecycle: Lifecycle) -> Self {
		Self { lifecycle }
	}
}

impl<S> Layer<S> for LifecycleLayer {
	type Service = LifecycleService<S>;

	fn layer(&self, inner: S) -> Self::Service {
		LifecycleService { inner, lifecycle: self.lifecycle.clone() }
	}
}

#[derive(Clone)]
pub struct LifecycleService<S> {
	inner: S,
	lifecycle: Lifecycle,
}

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

impl<S> Service<RouterCall> for LifecycleService<S>
where
	S: Service<RouterCall, Response = RouterResponse, Error = std::convert::Infallible> + Clone + Send + 'static,
	S::Future: Send + 'static,
{
	type Response = RouterResponse;
	type Error = std::convert::Infallible;
	type Future = BoxFuture<Result<RouterResponse, std::convert::Infallible>>;

	fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
		self.inner.poll_ready(cx)
	}

	fn call(&mut self, call: RouterCall) -> Self::Future {
		let method = match &call {
			RouterCall::Request(req) => req.method.as_str(),
			RouterCall::Notification(notif) => notif.method.as_str(),
		};

		match self.lifecycle.gate(method) {
			Ok(()) => {
				let fut = self.inner.call(call);
				Box::pin(async move { fut.await })
			}
			Err(err) => match call {
				RouterCall::Request(req) => {
					Box::pin(async move { Ok(RouterResponse::Reply { id: req.id, outcome: Err(err) }) })
				}
				RouterCall::Notification(notif) => {
					tracing::debug!(method = %notif.method, state = ?self.lifecycle.state(), "dropping notification rejected by lifecycle gate");
					Box::pin(async move { Ok(RouterResponse::None) })
				}
			},
		}
	}
}
