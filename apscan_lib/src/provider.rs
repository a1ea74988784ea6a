/** ------------------------------------------------------------
 * Scan provider abstraction.
 *
 * A provider binds to one adapter, triggers scans, and hands out the
 * current BSS list. Scan completion is approximated by a settling timer
 * because the underlying subsystems do not signal it reliably.
 * ------------------------------------------------------------- */
use crate::errors::ScanError;
use crate::record::{Bssid, RawBssRecord};
use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Settling delay observed to be enough for drivers to finish a scan.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(1000);

const EVENT_CHANNEL_CAPACITY: usize = 16;

/**
 * A wireless adapter as the OS bridge identifies it
 */
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AdapterHandle {
    /// Service / device name, or capture path for offline providers.
    pub name: String,
    pub description: String,
}

impl AdapterHandle {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }

    pub fn is_valid(&self) -> bool {
        !self.name.trim().is_empty()
    }

    /// Display title, description first.
    pub fn title(&self) -> String {
        if self.description.is_empty() {
            self.name.clone()
        } else {
            format!("{} ({})", self.description, self.name)
        }
    }
}

impl fmt::Display for AdapterHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.title())
    }
}

/**
 * Asynchronous provider notifications
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    /// The scan request failed.
    InterfaceError(ScanError),
    /// The settling delay after a successful scan request elapsed.
    ScanComplete,
}

/**
 * Coherent view of the BSS list and the current association
 */
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetworkSnapshot {
    pub records: Vec<RawBssRecord>,
    pub connected: Option<Bssid>,
    /// Source time of the records, when the backend knows it.
    pub captured_at: Option<DateTime<Utc>>,
}

/**
 * Capability interface implemented by every scan backend
 */
pub trait ScanProvider: Send {
    /**
     * Bind to an adapter. Fails with `InvalidAdapter` if the handle is
     * missing or unusable.
     */
    fn init(&mut self, adapter: Option<AdapterHandle>) -> Result<(), ScanError>;

    /**
     * Request a scan. Returns false on immediate failure, after raising
     * `InterfaceError`. Otherwise `ScanComplete` follows after the
     * settling delay.
     */
    fn scan(&mut self) -> bool;

    /// Current BSS records plus the associated BSSID.
    fn network_data(&mut self) -> Result<NetworkSnapshot, ScanError>;

    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent>;

    fn adapter(&self) -> Option<&AdapterHandle>;
}

/**
 * Event fan-out and settling timer shared by the provider backends
 *
 * At most one settling timer is pending: arming again replaces the
 * previous one. Dropping the value cancels a pending timer, so a torn
 * down provider never emits a late `ScanComplete`.
 */
pub struct ProviderEvents {
    sender: broadcast::Sender<ProviderEvent>,
    settle_delay: Duration,
    timer: Option<JoinHandle<()>>,
}

impl ProviderEvents {
    pub fn new(settle_delay: Duration) -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            sender,
            settle_delay,
            timer: None,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProviderEvent> {
        self.sender.subscribe()
    }

    pub fn interface_error(&mut self, err: ScanError) {
        self.cancel();
        tracing::warn!(error = %err, "scan request failed");
        // No subscriber is not an error
        let _ = self.sender.send(ProviderEvent::InterfaceError(err));
    }

    /**
     * Schedule `ScanComplete` after the settling delay. Outside a tokio
     * runtime the event is sent immediately.
     */
    pub fn arm_settle_timer(&mut self) {
        self.cancel();

        let sender = self.sender.clone();
        let delay = self.settle_delay;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                self.timer = Some(handle.spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = sender.send(ProviderEvent::ScanComplete);
                }));
            }
            Err(_) => {
                tracing::debug!("no async runtime, completing scan without settling delay");
                let _ = sender.send(ProviderEvent::ScanComplete);
            }
        }
    }

    pub fn cancel(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

impl Drop for ProviderEvents {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::TryRecvError;

    #[test]
    fn adapter_title() {
        let adapter = AdapterHandle::new("wlan0", "Intel AX200");
        assert_eq!(adapter.title(), "Intel AX200 (wlan0)");
        assert!(adapter.is_valid());
        assert_eq!(AdapterHandle::new("wlan0", "").title(), "wlan0");
        assert!(!AdapterHandle::new(" ", "x").is_valid());
    }

    #[tokio::test(start_paused = true)]
    async fn settle_timer_fires_after_delay() {
        let mut events = ProviderEvents::new(Duration::from_millis(1000));
        let mut rx = events.subscribe();

        events.arm_settle_timer();
        tokio::time::sleep(Duration::from_millis(999)).await;
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(rx.recv().await, Ok(ProviderEvent::ScanComplete));
    }

    #[tokio::test(start_paused = true)]
    async fn rearming_replaces_pending_timer() {
        let mut events = ProviderEvents::new(Duration::from_millis(1000));
        let mut rx = events.subscribe();

        events.arm_settle_timer();
        tokio::time::sleep(Duration::from_millis(500)).await;
        events.arm_settle_timer();
        tokio::time::sleep(Duration::from_millis(2000)).await;

        assert_eq!(rx.try_recv(), Ok(ProviderEvent::ScanComplete));
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
    }

    #[tokio::test(start_paused = true)]
    async fn drop_cancels_pending_timer() {
        let mut events = ProviderEvents::new(Duration::from_millis(1000));
        let mut rx = events.subscribe();

        events.arm_settle_timer();
        drop(events);
        tokio::time::sleep(Duration::from_millis(2000)).await;

        assert!(!matches!(rx.try_recv(), Ok(ProviderEvent::ScanComplete)));
    }

    #[tokio::test]
    async fn interface_error_is_broadcast() {
        let mut events = ProviderEvents::new(DEFAULT_SETTLE_DELAY);
        let mut rx = events.subscribe();

        events.interface_error(ScanError::ScanRequestFailed {
            adapter: "wlan0".into(),
        });
        assert!(matches!(
            rx.recv().await,
            Ok(ProviderEvent::InterfaceError(ScanError::ScanRequestFailed { .. }))
        ));
    }

    #[test]
    fn completes_immediately_without_runtime() {
        let mut events = ProviderEvents::new(DEFAULT_SETTLE_DELAY);
        let mut rx = events.subscribe();
        events.arm_settle_timer();
        assert_eq!(rx.try_recv(), Ok(ProviderEvent::ScanComplete));
    }
}
