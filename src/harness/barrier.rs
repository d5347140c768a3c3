//! Finish-flag barrier
//!
//! Each entity owns one flag and waits on the flags of every entity of the
//! counterpart role before interrupting its child. Built on a broadcast
//! channel so waiters suspend instead of polling.

use tokio::sync::watch;

/// The settable side of one entity's finish flag.
pub struct FinishFlag {
    tx: watch::Sender<bool>,
}

/// A waitable view of another entity's finish flag.
#[derive(Clone)]
pub struct FinishWatch {
    rx: watch::Receiver<bool>,
}

impl FinishFlag {
    pub fn new() -> (FinishFlag, FinishWatch) {
        let (tx, rx) = watch::channel(false);
        (FinishFlag { tx }, FinishWatch { rx })
    }

    /// Mark this entity finished. Idempotent.
    pub fn set(&self) {
        self.tx.send_replace(true);
    }
}

impl FinishWatch {
    /// Resolves once the flag is set, including when it was set before the
    /// wait began. A flag whose owner went away without setting it counts
    /// as finished so the barrier cannot deadlock on a crashed runner.
    pub async fn wait(&mut self) {
        let _ = self.rx.wait_for(|finished| *finished).await;
    }
}

/// Wait for every flag in `watches`.
pub async fn wait_all(watches: &mut [FinishWatch]) {
    for watch in watches {
        watch.wait().await;
    }
}
