//! Event and condition waiting helpers

use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;
use videokit_bridge::BridgeEvent;

/// Bridge event subscription for tests
pub struct EventStream {
    pub receiver: broadcast::Receiver<BridgeEvent>,
}

impl EventStream {
    pub fn new(receiver: broadcast::Receiver<BridgeEvent>) -> Self {
        Self { receiver }
    }

    /// Next event, or `None` after `timeout`
    pub async fn next_timeout(&mut self, timeout: Duration) -> Option<BridgeEvent> {
        tokio::time::timeout(timeout, self.receiver.recv())
            .await
            .ok()
            .and_then(|r| r.ok())
    }

    /// Skip events until one matches `predicate`
    pub async fn wait_for<F>(&mut self, timeout: Duration, predicate: F) -> Option<BridgeEvent>
    where
        F: Fn(&BridgeEvent) -> bool,
    {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.checked_duration_since(Instant::now())?;
            match tokio::time::timeout(remaining, self.receiver.recv()).await {
                Ok(Ok(event)) if predicate(&event) => return Some(event),
                Ok(Ok(_)) => continue,
                Ok(Err(broadcast::error::RecvError::Lagged(_))) => continue,
                Ok(Err(broadcast::error::RecvError::Closed)) => return None,
                Err(_) => return None,
            }
        }
    }

    /// Drain everything already queued
    pub fn drain(&mut self) -> Vec<BridgeEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.receiver.try_recv() {
            events.push(event);
        }
        events
    }
}

/// Poll `condition` every 5ms until it holds or `timeout` passes
pub async fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
