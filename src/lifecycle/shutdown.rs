//! Shutdown coordination for a server.

use tokio::sync::watch;

/// Re-armable stop signal shared by a server's accept loop and its sessions.
///
/// Backed by a watch channel so a trigger that happens before a task
/// subscribes is still observed.
#[derive(Debug)]
pub struct Shutdown {
    tx: watch::Sender<bool>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.tx.subscribe(),
        }
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    /// Clear the signal so the owner can run again.
    pub fn reset(&self) {
        self.tx.send_replace(false);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving end of [`Shutdown`].
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Resolve once shutdown has been triggered.
    pub async fn recv(&mut self) {
        // An error means the sender is gone, which also means stop.
        let _ = self.rx.wait_for(|stopped| *stopped).await;
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn trigger_before_subscribe_is_seen() {
        let shutdown = Shutdown::new();
        shutdown.trigger();
        let mut signal = shutdown.subscribe();
        tokio::time::timeout(Duration::from_secs(1), signal.recv())
            .await
            .unwrap();
    }

    #[test]
    fn subscribers_see_trigger_and_reset() {
        let shutdown = Shutdown::new();
        let signal = shutdown.subscribe();
        assert!(!signal.is_triggered());

        shutdown.trigger();
        assert!(signal.is_triggered());
        assert!(signal.clone().is_triggered());

        shutdown.reset();
        assert!(!signal.is_triggered());
    }

    #[tokio::test]
    async fn reset_rearms() {
        let shutdown = Shutdown::new();
        shutdown.trigger();
        shutdown.reset();
        assert!(!shutdown.is_triggered());

        let mut signal = shutdown.subscribe();
        let pending = tokio::time::timeout(Duration::from_millis(50), signal.recv()).await;
        assert!(pending.is_err());

        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(1), signal.recv())
            .await
            .unwrap();
    }
}
