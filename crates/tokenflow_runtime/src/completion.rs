//! Awaitable transition results
//!
//! Every manager operation hands back a [`Completion`]. The manager keeps the
//! matching [`Resolver`] inside the motion, timer or scale animation that
//! will finish the work. A resolver that is dropped unresolved, because its
//! motion was replaced or its token destroyed, resolves as
//! [`TransitionOutcome::Superseded`], so no completion ever hangs.

use futures::channel::oneshot;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// How a transition ended
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TransitionOutcome {
    /// The transition ran to its end
    Finished,
    /// A newer transition on the same token, or a destroy, took over
    Superseded,
    /// The operation was not legal in the token's state and did nothing
    Ignored,
}

impl TransitionOutcome {
    pub fn is_finished(self) -> bool {
        self == TransitionOutcome::Finished
    }
}

/// Future resolving to the outcome of one transition
#[must_use = "a completion does nothing unless awaited or inspected"]
#[derive(Debug)]
pub struct Completion {
    state: CompletionState,
}

#[derive(Debug)]
enum CompletionState {
    Ready(Option<TransitionOutcome>),
    Waiting(oneshot::Receiver<TransitionOutcome>),
}

impl Completion {
    /// A completion that is already resolved
    pub fn resolved(outcome: TransitionOutcome) -> Self {
        Self {
            state: CompletionState::Ready(Some(outcome)),
        }
    }

    pub(crate) fn ignored() -> Self {
        Self::resolved(TransitionOutcome::Ignored)
    }

    /// A connected resolver/completion pair
    pub(crate) fn channel() -> (Resolver, Completion) {
        let (tx, rx) = oneshot::channel();
        (
            Resolver { tx: Some(tx) },
            Completion {
                state: CompletionState::Waiting(rx),
            },
        )
    }

    /// Check for a result without waiting
    pub fn try_outcome(&mut self) -> Option<TransitionOutcome> {
        match &mut self.state {
            CompletionState::Ready(outcome) => *outcome,
            CompletionState::Waiting(rx) => {
                let outcome = match rx.try_recv() {
                    Ok(Some(outcome)) => outcome,
                    Ok(None) => return None,
                    Err(oneshot::Canceled) => TransitionOutcome::Superseded,
                };
                self.state = CompletionState::Ready(Some(outcome));
                Some(outcome)
            }
        }
    }

    pub fn is_resolved(&mut self) -> bool {
        self.try_outcome().is_some()
    }
}

impl Future for Completion {
    type Output = TransitionOutcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.state {
            CompletionState::Ready(outcome) => {
                Poll::Ready(outcome.take().unwrap_or(TransitionOutcome::Superseded))
            }
            CompletionState::Waiting(rx) => match Pin::new(rx).poll(cx) {
                Poll::Ready(Ok(outcome)) => {
                    self.state = CompletionState::Ready(None);
                    Poll::Ready(outcome)
                }
                Poll::Ready(Err(oneshot::Canceled)) => {
                    self.state = CompletionState::Ready(None);
                    Poll::Ready(TransitionOutcome::Superseded)
                }
                Poll::Pending => Poll::Pending,
            },
        }
    }
}

/// Sending half of a [`Completion`]
#[derive(Debug)]
pub(crate) struct Resolver {
    tx: Option<oneshot::Sender<TransitionOutcome>>,
}

impl Resolver {
    pub(crate) fn resolve(mut self, outcome: TransitionOutcome) {
        if let Some(tx) = self.tx.take() {
            // The receiver may already be gone; nobody is waiting then.
            let _ = tx.send(outcome);
        }
    }

    pub(crate) fn finish(self) {
        self.resolve(TransitionOutcome::Finished);
    }
}

impl Drop for Resolver {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(TransitionOutcome::Superseded);
        }
    }
}
