//! Engine shutdown broadcast

use std::sync::Arc;
use tokio::sync::watch;

/// Handle for triggering engine shutdown
///
/// Every [`ShutdownSignal`] observes the trigger, including signals taken
/// after it fired.
#[derive(Clone)]
pub struct ShutdownHandle {
    sender: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Trigger shutdown; returns `false` if it was already triggered
    pub fn trigger(&self) -> bool {
        let previous = self.sender.send_replace(true);
        if !previous {
            tracing::debug!(listeners = self.sender.receiver_count(), "engine shutdown triggered");
        }
        !previous
    }

    pub fn is_triggered(&self) -> bool {
        *self.sender.borrow()
    }

    pub fn signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            receiver: self.sender.subscribe(),
        }
    }
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Cloneable view of a [`ShutdownHandle`] for engine tasks
#[derive(Clone)]
pub struct ShutdownSignal {
    receiver: watch::Receiver<bool>,
}

impl ShutdownSignal {
    pub fn is_triggered(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Wait for shutdown; returns immediately if already triggered
    ///
    /// Also returns if every [`ShutdownHandle`] has been dropped.
    pub async fn wait(&mut self) {
        let _ = self.receiver.wait_for(|triggered| *triggered).await;
    }
}
