use tokio_util::sync::CancellationToken;

/// Owning side of a cancellation signal. Dropping it does not cancel; call
/// [`CancelSource::cancel`] explicitly. Kept separate from [`CancelSignal`]
/// so handlers only ever see the read-only half.
#[derive(Debug, Clone, Default)]
pub struct CancelSource {
	token: CancellationToken,
}

impl CancelSource {
	pub fn new() -> Self {
		Self { token: CancellationToken::new() }
	}

	/// A read-only signal a handler can poll or await.
	pub fn signal(&self) -> CancelSignal {
		CancelSignal { token: self.token.clone() }
	}

	/// Raise the signal. Idempotent.
	pub fn cancel(&self) {
		self.token.cancel();
	}
}

/// Read-only half of a cancellation signal, handed to request handlers and
/// to `AnalysisProvider` calls. Cheap to clone; all clones observe the same
/// cancellation.
#[derive(Debug, Clone)]
pub struct CancelSignal {
	token: CancellationToken,
}

impl CancelSignal {
	/// A signal that never cancels, for call sites with no cancellation
	/// source (e.g. background bootstrap work).
	pub fn never() -> Self {
		Self { token: CancellationToken::new() }
	}

	pub fn is_cancelled(&self) -> bool {
		self.token.is_cancelled()
	}

	/// Resolves once the signal is raised. Handlers should race this
	/// against their actual work at suspension points.
	pub async fn cancelled(&self) {
		self.token.cancelled().await;
	}
}
