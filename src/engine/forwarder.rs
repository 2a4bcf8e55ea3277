//! Browser Forwarder Keep-Alive
//!
//! Platform workaround for WebSocket transports: a WebView pointed at the
//! embedded engine's local HTTP forwarding port keeps the outbound alive.
//! The view itself is host-supplied; this task owns the load/retry cycle
//! and is cancelled when the instance stops.

use crate::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Host-supplied view the keep-alive drives.
pub trait ForwarderView: Send + Sync {
    /// Navigate the view to the forwarding URL.
    fn load(&self, url: &str) -> Result<()>;

    /// Blank the view (about:blank equivalent).
    fn blank(&self);
}

/// Cancellable keep-alive task for the browser forwarder.
///
/// On load failure the view is blanked and reloaded after a delay that
/// doubles up to the configured cap. The task ends once a load succeeds;
/// `stop()` cancels it at any point.
pub struct ForwarderTask {
    handle: JoinHandle<()>,
    view: Arc<dyn ForwarderView>,
}

impl ForwarderTask {
    pub fn spawn(
        view: Arc<dyn ForwarderView>,
        url: String,
        initial_delay: Duration,
        max_delay: Duration,
    ) -> Self {
        let task_view = Arc::clone(&view);
        let handle = tokio::spawn(async move {
            let mut delay = initial_delay;
            let mut attempt = 1u32;
            loop {
                match task_view.load(&url) {
                    Ok(()) => {
                        info!(url = %url, attempt = attempt, "Forwarder view loaded");
                        break;
                    }
                    Err(e) => {
                        warn!(url = %url, attempt = attempt, error = %e, "Forwarder load failed, reloading");
                        task_view.blank();
                        tokio::time::sleep(delay).await;
                        delay = std::cmp::min(delay * 2, max_delay);
                        attempt += 1;
                    }
                }
            }
        });

        Self { handle, view }
    }

    /// Whether the keep-alive has settled (view loaded or task cancelled).
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Cancel the retry loop and blank the view.
    pub fn stop(self) {
        self.handle.abort();
        self.view.blank();
        debug!("Forwarder task stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyView {
        failures_left: AtomicU32,
        loads: AtomicU32,
        blanks: AtomicU32,
    }

    impl FlakyView {
        fn new(failures: u32) -> Self {
            Self {
                failures_left: AtomicU32::new(failures),
                loads: AtomicU32::new(0),
                blanks: AtomicU32::new(0),
            }
        }
    }

    impl ForwarderView for FlakyView {
        fn load(&self, _url: &str) -> Result<()> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            if self.failures_left.load(Ordering::SeqCst) > 0 {
                self.failures_left.fetch_sub(1, Ordering::SeqCst);
                bail!("load failed");
            }
            Ok(())
        }

        fn blank(&self) {
            self.blanks.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_retries_until_load_succeeds() {
        let view = Arc::new(FlakyView::new(2));
        let task = ForwarderTask::spawn(
            Arc::clone(&view) as Arc<dyn ForwarderView>,
            "http://127.0.0.1:1091/".to_string(),
            Duration::from_millis(5),
            Duration::from_millis(20),
        );

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(task.is_finished());
        assert_eq!(view.loads.load(Ordering::SeqCst), 3);
        assert_eq!(view.blanks.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_stop_cancels_retry_loop() {
        let view = Arc::new(FlakyView::new(u32::MAX));
        let task = ForwarderTask::spawn(
            Arc::clone(&view) as Arc<dyn ForwarderView>,
            "http://127.0.0.1:1091/".to_string(),
            Duration::from_secs(60),
            Duration::from_secs(60),
        );

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!task.is_finished());

        task.stop();
        let loads_after_stop = view.loads.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(view.loads.load(Ordering::SeqCst), loads_after_stop);
        // stop() blanks the view on top of any failure blanks.
        assert!(view.blanks.load(Ordering::SeqCst) >= 1);
    }
}
