use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::cancel::{CancelSignal, CancelSource};

/// Per-key coalescing delay scheduler: arming a key cancels whatever was
/// previously pending for that key, so a burst of arms within `delay` of
/// each other produces exactly one firing, against the last-armed value.
///
/// A diagnostics engine debouncing recomputation per document is the
/// motivating consumer, but nothing here is diagnostics-specific.
pub struct Debouncer<K> {
	slots: Mutex<HashMap<K, CancelSource>>,
}

impl<K> Default for Debouncer<K>
where
	K: Eq + Hash,
{
	fn default() -> Self {
		Self { slots: Mutex::new(HashMap::new()) }
	}
}

impl<K> Debouncer<K>
where
	K: Eq + Hash + Clone + Send + Sync + 'static,
{
	pub fn new() -> Self {
		Self::default()
	}

	/// Cancels any pending firing for `key`, then schedules a new one after
	/// `delay`. `on_fire` receives a [`CancelSignal`] that is raised if a
	/// later `arm` or `cancel` for the same key preempts it before it runs;
	/// `on_fire` should check the signal before doing expensive work.
	pub fn arm<F, Fut>(self: &Arc<Self>, key: K, delay: Duration, on_fire: F)
	where
		F: FnOnce(CancelSignal) -> Fut + Send + 'static,
		Fut: Future<Output = ()> + Send + 'static,
	{
		let source = CancelSource::new();
		let signal = source.signal();
		{
			let mut slots = self.slots.lock().unwrap();
			if let Some(previous) = slots.insert(key.clone(), source) {
				previous.cancel();
			}
		}

		let this = Arc::clone(self);
		tokio::spawn(async move {
			tokio::select! {
				_ = tokio::time::sleep(delay) => {
					// A later `arm`/`cancel` for this key always cancels our
					// own signal before touching the map, so checking it
					// directly is race-free — re-deriving from the map
					// instead would see whatever slot a racing `arm` just
					// inserted, not ours, and fire stale data under the
					// new arm's identity.
					if !signal.is_cancelled() {
						this.slots.lock().unwrap().remove(&key);
						on_fire(signal).await;
					}
				}
				_ = signal.cancelled() => {}
			}
		});
	}

	/// Cancels any pending firing for `key` without scheduling a new one.
	/// Returns whether a slot was present.
	pub fn cancel(&self, key: &K) -> bool {
		match self.slots.lock().unwrap().remove(key) {
			Some(source) => {
				source.cancel();
				true
			}
			None => false,
		}
	}
}
