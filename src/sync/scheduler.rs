use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::TaskSync;

/// Shortest allowed pause between background syncs
pub const MIN_SYNC_INTERVAL_SECS: u64 = 60;
/// Pause between background syncs when none is configured
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 300;

const STOP_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Default)]
struct SchedulerInner {
    /// Kept after `stop` so `trigger_now` keeps working
    token: Option<String>,
    handle: Option<JoinHandle<()>>,
    cancellation: Option<CancellationToken>,
}

/// Periodic background sync
///
/// One loop at a time: sleep for the interval, then sync in a child task so
/// a panic inside the sync is logged instead of ending the loop. Cancellation
/// wakes the sleep immediately
#[derive(Debug)]
pub struct SyncScheduler {
    sync: Arc<TaskSync>,
    inner: Mutex<SchedulerInner>,
    interval_secs: Arc<AtomicU64>,
    /// Length of one interval second; shortened in tests
    tick: Duration,
}

impl SyncScheduler {
    pub fn new(sync: Arc<TaskSync>) -> Self {
        Self::with_tick(sync, Duration::from_secs(1))
    }

    fn with_tick(sync: Arc<TaskSync>, tick: Duration) -> Self {
        Self {
            sync,
            inner: Mutex::new(SchedulerInner::default()),
            interval_secs: Arc::new(AtomicU64::new(DEFAULT_SYNC_INTERVAL_SECS)),
            tick,
        }
    }

    fn inner(&self) -> MutexGuard<'_, SchedulerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start the loop; false if it is already running
    ///
    /// Must be called from within a tokio runtime
    pub fn start(&self, token: &str, interval_secs: u64) -> bool {
        let mut inner = self.inner();
        if inner.handle.as_ref().is_some_and(|h| !h.is_finished()) {
            debug!("Sync scheduler already running");
            return false;
        }

        let interval = interval_secs.max(MIN_SYNC_INTERVAL_SECS);
        self.interval_secs.store(interval, Ordering::SeqCst);

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(sync_loop(
            Arc::clone(&self.sync),
            token.to_string(),
            Arc::clone(&self.interval_secs),
            self.tick,
            cancel.clone(),
        ));

        inner.token = Some(token.to_string());
        inner.handle = Some(handle);
        inner.cancellation = Some(cancel);

        info!(interval_secs = interval, "Sync scheduler started");
        true
    }

    /// Cancel the loop and wait up to five seconds for it; false if not running
    pub async fn stop(&self) -> bool {
        let (handle, cancel) = {
            let mut inner = self.inner();
            (inner.handle.take(), inner.cancellation.take())
        };

        let Some(mut handle) = handle else {
            return false;
        };

        if let Some(cancel) = cancel {
            cancel.cancel();
        }

        match tokio::time::timeout(STOP_TIMEOUT, &mut handle).await {
            Ok(Ok(())) => info!("Sync scheduler stopped"),
            Ok(Err(err)) => warn!(error = %err, "Sync loop ended abnormally"),
            Err(_) => {
                warn!(timeout_secs = STOP_TIMEOUT.as_secs(), "Sync loop did not stop in time, aborting");
                handle.abort();
            }
        }
        true
    }

    pub fn is_running(&self) -> bool {
        self.inner()
            .handle
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    /// Current interval in seconds
    pub fn interval_secs(&self) -> u64 {
        self.interval_secs.load(Ordering::SeqCst)
    }

    /// Change the interval of a running loop, effective from the next cycle
    pub fn set_interval(&self, interval_secs: u64) -> bool {
        if !self.is_running() {
            return false;
        }
        let interval = interval_secs.max(MIN_SYNC_INTERVAL_SECS);
        self.interval_secs.store(interval, Ordering::SeqCst);
        info!(interval_secs = interval, "Sync interval updated");
        true
    }

    /// Sync right away with the last configured token
    pub async fn trigger_now(&self) -> bool {
        let token = self.inner().token.clone();
        match token {
            Some(token) => self.sync.sync(&token).await,
            None => {
                debug!("Sync scheduler has no token configured");
                false
            }
        }
    }
}

async fn sync_loop(
    sync: Arc<TaskSync>,
    token: String,
    interval_secs: Arc<AtomicU64>,
    tick: Duration,
    cancel: CancellationToken,
) {
    loop {
        let secs = u32::try_from(interval_secs.load(Ordering::SeqCst)).unwrap_or(u32::MAX);
        let pause = tick.saturating_mul(secs);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Sync loop cancelled");
                break;
            }
            _ = tokio::time::sleep(pause) => {}
        }

        let sync = Arc::clone(&sync);
        let token = token.clone();
        match tokio::spawn(async move { sync.sync(&token).await }).await {
            Ok(true) => debug!("Background sync completed"),
            Ok(false) => warn!("Background sync could not save tasks"),
            Err(err) => warn!(error = %err, "Background sync panicked"),
        }
    }
}
