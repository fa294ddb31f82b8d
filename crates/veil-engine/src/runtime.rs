//! Runtime context shared across one run's node dispatches: the
//! cancellation signal a run must check before every dispatch (§5).

use tokio_util::sync::CancellationToken;

/// Per-run runtime state. Cheap to clone; the cancellation token is shared.
#[derive(Clone, Default)]
pub struct RuntimeContext {
    cancel_token: CancellationToken,
}

impl RuntimeContext {
    pub fn new() -> Self {
        Self {
            cancel_token: CancellationToken::new(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }
}
