//! Cancellation token handed to supervised workers

use futures::Future;
use tokio::sync::watch::{channel, Receiver, Sender};

/// Creates a linked pair of shutdown handle and signal
pub fn shutdown_channel() -> (ShutdownHandle, ShutdownSignal) {
    let (tx, rx) = channel(false);
    (ShutdownHandle { tx }, ShutdownSignal { rx })
}

/// Triggering side of a [`ShutdownSignal`]
///
/// Dropping the handle has the same effect as triggering it.
#[derive(Debug)]
pub struct ShutdownHandle {
    tx: Sender<bool>,
}

impl ShutdownHandle {
    /// Requests all linked signals to complete
    pub fn trigger(&self) {
        self.tx.send(true).ok();
    }
}

/// Observing side of a [`ShutdownHandle`]
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: Receiver<bool>,
}

impl ShutdownSignal {
    /// Whether or not a shutdown has been requested
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Future that completes once a shutdown has been requested
    pub fn signal(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut rx = self.rx.clone();

        async move {
            loop {
                let triggered = *rx.borrow();

                if triggered || rx.changed().await.is_err() {
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod does {
    use super::*;
    use futures::poll;
    use tokio::task::{spawn, yield_now};

    #[tokio::test]
    async fn stay_pending_until_triggered() {
        let (handle, signal) = shutdown_channel();

        let waiter = spawn(signal.signal());
        yield_now().await;

        assert!(!signal.is_triggered());
        assert!(!poll!(waiter).is_ready());

        handle.trigger();
    }

    #[tokio::test]
    async fn complete_when_triggered() {
        let (handle, signal) = shutdown_channel();

        let waiter = spawn(signal.signal());
        handle.trigger();

        waiter.await.unwrap();
        assert!(signal.is_triggered());
    }

    #[tokio::test]
    async fn complete_when_triggered_before_waiting() {
        let (handle, signal) = shutdown_channel();
        handle.trigger();

        signal.clone().signal().await;
    }

    #[tokio::test]
    async fn complete_when_handle_is_dropped() {
        let (handle, signal) = shutdown_channel();
        drop(handle);

        signal.signal().await;
    }
}
