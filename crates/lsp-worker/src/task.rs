use std::future::Future;

use tokio::task::JoinHandle;

/// Runs `on_drop` exactly once when dropped, regardless of which path out of
/// scope is taken — normal return, early `return`, or unwind from a panic.
/// The dispatcher uses this to guarantee a `RequestRecord` is released even
/// if the handler it wraps panics.
pub struct TaskGuard<F: FnOnce()> {
	on_drop: Option<F>,
}

impl<F: FnOnce()> TaskGuard<F> {
	pub fn new(on_drop: F) -> Self {
		Self { on_drop: Some(on_drop) }
	}

	/// Disarm the guard without running `on_drop`, for call sites that
	/// already did the cleanup on a successful path.
	pub fn disarm(mut self) {
		self.on_drop = None;
	}
}

impl<F: FnOnce()> Drop for TaskGuard<F> {
	fn drop(&mut self) {
		if let Some(f) = self.on_drop.take() {
			f();
		}
	}
}

/// Spawns `fut` on the current runtime, running `on_drop` when the spawned
/// task's future is dropped for any reason (completion, abort, or the
/// handle itself panicking). `on_drop` runs on the spawned task, not the
/// caller.
pub fn spawn_guarded<Fut, F>(fut: Fut, on_drop: F) -> JoinHandle<Fut::Output>
where
	Fut: Future + Send + 'static,
	Fut::Output: Send + 'static,
	F: FnOnce() + Send + 'static,
{
	tokio::spawn(async move {
		let _guard = TaskGuard::new(on_drop);
		fut.await
	})
}
