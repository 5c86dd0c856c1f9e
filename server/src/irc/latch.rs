//! Ready Latch
//!
//! One-shot signal raised once registration and join have completed. It never
//! resets.

use tokio::sync::watch;

/// The session was torn down before the latch was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("IRC session closed before becoming ready")]
pub struct LatchClosed;

/// Create a connected signal/latch pair.
pub fn ready_latch() -> (ReadySignal, ReadyLatch) {
    let (tx, rx) = watch::channel(false);
    (ReadySignal { tx }, ReadyLatch { rx })
}

/// Write side, owned by the receive loop.
#[derive(Debug)]
pub struct ReadySignal {
    tx: watch::Sender<bool>,
}

impl ReadySignal {
    /// Raise the latch. Returns `true` only for the call that raised it.
    pub fn fire(&self) -> bool {
        self.tx.send_if_modified(|ready| {
            if *ready {
                false
            } else {
                *ready = true;
                true
            }
        })
    }

    pub fn is_fired(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Read side. Clone freely.
#[derive(Debug, Clone)]
pub struct ReadyLatch {
    rx: watch::Receiver<bool>,
}

impl ReadyLatch {
    /// Wait until the latch is raised. Returns immediately once it has been.
    pub async fn wait(&self) -> Result<(), LatchClosed> {
        let mut rx = self.rx.clone();
        rx.wait_for(|ready| *ready)
            .await
            .map(|_| ())
            .map_err(|_| LatchClosed)
    }

    pub fn is_latched(&self) -> bool {
        *self.rx.borrow()
    }
}
