//! Graceful shutdown of one accepting endpoint and its connections.
//!
//! A [`QuiesceController`] tracks every accepted connection under a stable
//! integer handle. Initiating shutdown cancels the acceptor token, asks
//! each live child to quiesce via its own cancellation token, and resolves
//! once the last child deregisters. Registrations deregister on drop, so a
//! connection task cannot forget to report its close.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QuiesceError {
    /// Registration attempted after the endpoint finished shutting down.
    /// The caller must close the connection itself.
    #[error("the endpoint has already shut down")]
    AlreadyShutdown,
}

#[derive(Debug)]
enum State {
    UpAndRunning { children: HashMap<u64, CancellationToken> },
    ShuttingDown { children: HashMap<u64, CancellationToken>, done: Vec<oneshot::Sender<()>> },
    ShutdownCompleted,
}

#[derive(Debug)]
struct Inner {
    state: State,
    next_id: u64,
}

fn deregister(inner: &mut Inner, id: u64) {
    match &mut inner.state {
        State::UpAndRunning { children } => {
            children.remove(&id);
        }
        State::ShuttingDown { children, done } => {
            children.remove(&id);
            if children.is_empty() {
                let waiters = std::mem::take(done);
                inner.state = State::ShutdownCompleted;
                for waiter in waiters {
                    let _ = waiter.send(());
                }
            }
        }
        State::ShutdownCompleted => {}
    }
}

/// Shutdown coordinator for one accepting endpoint.
pub struct QuiesceController {
    acceptor: CancellationToken,
    inner: Arc<Mutex<Inner>>,
}

impl Default for QuiesceController {
    fn default() -> Self {
        Self::new()
    }
}

impl QuiesceController {
    pub fn new() -> Self {
        Self {
            acceptor: CancellationToken::new(),
            inner: Arc::new(Mutex::new(Inner {
                state: State::UpAndRunning { children: HashMap::new() },
                next_id: 0,
            })),
        }
    }

    /// Token the accept loop selects on; cancelled when shutdown begins.
    pub fn acceptor_token(&self) -> CancellationToken {
        self.acceptor.clone()
    }

    /// Records a freshly accepted connection. During shutdown the returned
    /// registration's quiesce signal is already raised; after shutdown the
    /// registration is refused.
    pub fn register_child(&self) -> Result<ChildRegistration, QuiesceError> {
        let mut inner = self.inner.lock().expect("quiesce state poisoned");
        let id = inner.next_id;
        inner.next_id += 1;
        let token = CancellationToken::new();
        match &mut inner.state {
            State::UpAndRunning { children } => {
                children.insert(id, token.clone());
            }
            State::ShuttingDown { children, .. } => {
                children.insert(id, token.clone());
                token.cancel();
            }
            State::ShutdownCompleted => return Err(QuiesceError::AlreadyShutdown),
        }
        Ok(ChildRegistration { id, quiesce: token, inner: Arc::clone(&self.inner) })
    }

    /// Closes the acceptor, signals every child to quiesce and resolves
    /// the returned receiver once the last child is gone. Repeat calls
    /// attach to the same completion; with no children the receiver
    /// resolves immediately.
    pub fn initiate_shutdown(&self) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        self.acceptor.cancel();

        let mut inner = self.inner.lock().expect("quiesce state poisoned");
        let state = std::mem::replace(&mut inner.state, State::ShutdownCompleted);
        match state {
            State::UpAndRunning { children } => {
                if children.is_empty() {
                    let _ = tx.send(());
                } else {
                    for token in children.values() {
                        token.cancel();
                    }
                    inner.state = State::ShuttingDown { children, done: vec![tx] };
                }
            }
            State::ShuttingDown { children, mut done } => {
                done.push(tx);
                inner.state = State::ShuttingDown { children, done };
            }
            State::ShutdownCompleted => {
                let _ = tx.send(());
            }
        }
        rx
    }

    pub fn is_shut_down(&self) -> bool {
        matches!(
            self.inner.lock().expect("quiesce state poisoned").state,
            State::ShutdownCompleted
        )
    }
}

/// Handle held by a connection task for as long as the connection lives.
/// Dropping it deregisters the child; the drop that empties the table
/// during shutdown completes every waiting promise.
#[derive(Debug)]
pub struct ChildRegistration {
    id: u64,
    quiesce: CancellationToken,
    inner: Arc<Mutex<Inner>>,
}

impl ChildRegistration {
    /// Raised when this child should stop taking new work and drain.
    pub fn quiesce_signal(&self) -> CancellationToken {
        self.quiesce.clone()
    }
}

impl Drop for ChildRegistration {
    fn drop(&mut self) {
        let mut inner = self.inner.lock().expect("quiesce state poisoned");
        deregister(&mut inner, self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn shutdown_with_no_children_completes_immediately() {
        let controller = QuiesceController::new();
        controller.initiate_shutdown().await.unwrap();
        assert!(controller.is_shut_down());
        assert!(controller.acceptor_token().is_cancelled());
    }

    #[tokio::test]
    async fn shutdown_signals_children_and_waits_for_both() {
        let controller = QuiesceController::new();
        let first = controller.register_child().unwrap();
        let second = controller.register_child().unwrap();

        let mut done = controller.initiate_shutdown();
        assert!(controller.acceptor_token().is_cancelled());
        assert!(first.quiesce_signal().is_cancelled());
        assert!(second.quiesce_signal().is_cancelled());

        assert!(done.try_recv().is_err());
        drop(first);
        assert!(done.try_recv().is_err());
        drop(second);
        done.await.unwrap();
        assert!(controller.is_shut_down());
    }

    #[tokio::test]
    async fn repeat_shutdown_attaches_to_the_same_completion() {
        let controller = QuiesceController::new();
        let child = controller.register_child().unwrap();

        let first_wait = controller.initiate_shutdown();
        let second_wait = controller.initiate_shutdown();
        drop(child);
        first_wait.await.unwrap();
        second_wait.await.unwrap();

        // After completion, another initiation resolves on its own.
        controller.initiate_shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn registration_during_shutdown_is_pre_quiesced() {
        let controller = QuiesceController::new();
        let holdout = controller.register_child().unwrap();
        let mut done = controller.initiate_shutdown();

        let late = controller.register_child().unwrap();
        assert!(late.quiesce_signal().is_cancelled());

        drop(holdout);
        assert!(done.try_recv().is_err());
        drop(late);
        done.await.unwrap();
    }

    #[tokio::test]
    async fn registration_after_shutdown_is_refused() {
        let controller = QuiesceController::new();
        controller.initiate_shutdown().await.unwrap();
        assert_eq!(controller.register_child().unwrap_err(), QuiesceError::AlreadyShutdown);
    }

    #[tokio::test]
    async fn child_ids_stay_stable_across_churn() {
        let controller = QuiesceController::new();
        let first = controller.register_child().unwrap();
        drop(first);
        let second = controller.register_child().unwrap();
        assert_ne!(second.id, 0);
    }
}
