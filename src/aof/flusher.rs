//! Background fsync
//!
//! A dedicated thread that forces the log to stable storage once per
//! interval. Failures are retried with exponential backoff; when the retries
//! run out the target is reported unhealthy and the next tick tries again.
//! The thread never takes the process down.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};

use crate::config::FsyncPolicy;
use crate::error::Result;
use super::Aof;

/// Something the flusher can sync
pub trait SyncTarget: Send + Sync + 'static {
    fn sync(&self) -> Result<()>;

    /// Called after every sync round with its final outcome
    fn report(&self, healthy: bool);
}

impl SyncTarget for Aof {
    fn sync(&self) -> Result<()> {
        Aof::sync(self)
    }

    fn report(&self, healthy: bool) {
        self.set_sync_healthy(healthy);
    }
}

/// Handle to the running flusher thread
///
/// Dropping the handle stops the thread and waits for it.
pub struct Flusher {
    shutdown: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Flusher {
    pub fn spawn<T: SyncTarget>(
        target: Arc<T>,
        interval: Duration,
        policy: FsyncPolicy,
    ) -> Result<Self> {
        let (shutdown_tx, shutdown_rx) = channel::bounded::<()>(1);

        let handle = thread::Builder::new()
            .name("aof-flusher".to_string())
            .spawn(move || run(target.as_ref(), &shutdown_rx, interval, policy))?;

        tracing::debug!("AOF flusher started (interval {:?})", interval);

        Ok(Self {
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    /// Stop the thread and wait for it to exit
    pub fn stop(mut self) {
        self.stop_inner();
    }

    fn stop_inner(&mut self) {
        // Disconnecting the channel wakes the thread out of recv_timeout
        drop(self.shutdown.take());

        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("AOF flusher thread panicked");
            } else {
                tracing::debug!("AOF flusher stopped");
            }
        }
    }
}

impl Drop for Flusher {
    fn drop(&mut self) {
        self.stop_inner();
    }
}

fn run<T: SyncTarget>(target: &T, shutdown: &Receiver<()>, interval: Duration, policy: FsyncPolicy) {
    loop {
        match shutdown.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => return,
        }

        if !sync_with_retry(target, shutdown, policy) {
            return;
        }
    }
}

/// One sync round. Returns false if shutdown was requested while backing off.
fn sync_with_retry<T: SyncTarget>(target: &T, shutdown: &Receiver<()>, policy: FsyncPolicy) -> bool {
    let mut attempt = 0;

    loop {
        match target.sync() {
            Ok(()) => {
                target.report(true);
                return true;
            }
            Err(e) if attempt < policy.max_retries => {
                attempt += 1;
                let delay = policy.backoff(attempt);
                tracing::warn!(
                    "AOF fsync failed ({}), retry {}/{} in {:?}",
                    e,
                    attempt,
                    policy.max_retries,
                    delay
                );

                match shutdown.recv_timeout(delay) {
                    Err(RecvTimeoutError::Timeout) => continue,
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => return false,
                }
            }
            Err(e) => {
                tracing::error!("AOF fsync failed after {} attempts: {}", attempt + 1, e);
                target.report(false);
                return true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use crate::error::KvError;

    /// Fails the first `failures` syncs
    struct FlakyDisk {
        failures: usize,
        calls: AtomicUsize,
        healthy: AtomicBool,
        reports: AtomicUsize,
    }

    impl FlakyDisk {
        fn new(failures: usize) -> Self {
            Self {
                failures,
                calls: AtomicUsize::new(0),
                healthy: AtomicBool::new(true),
                reports: AtomicUsize::new(0),
            }
        }
    }

    impl SyncTarget for FlakyDisk {
        fn sync(&self) -> Result<()> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(KvError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk on fire")))
            } else {
                Ok(())
            }
        }

        fn report(&self, healthy: bool) {
            self.healthy.store(healthy, Ordering::SeqCst);
            self.reports.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn fast_policy(max_retries: u32) -> FsyncPolicy {
        FsyncPolicy {
            max_retries,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(4),
        }
    }

    #[test]
    fn retries_until_sync_succeeds() {
        let disk = FlakyDisk::new(2);
        let (_tx, rx) = channel::bounded::<()>(1);

        assert!(sync_with_retry(&disk, &rx, fast_policy(3)));
        assert_eq!(disk.calls.load(Ordering::SeqCst), 3);
        assert!(disk.healthy.load(Ordering::SeqCst));
    }

    #[test]
    fn exhausted_retries_report_degraded_without_stopping() {
        let disk = FlakyDisk::new(usize::MAX);
        let (_tx, rx) = channel::bounded::<()>(1);

        assert!(sync_with_retry(&disk, &rx, fast_policy(2)));
        assert_eq!(disk.calls.load(Ordering::SeqCst), 3);
        assert!(!disk.healthy.load(Ordering::SeqCst));
    }

    #[test]
    fn shutdown_interrupts_backoff() {
        let disk = FlakyDisk::new(usize::MAX);
        let (tx, rx) = channel::bounded::<()>(1);
        drop(tx);

        assert!(!sync_with_retry(&disk, &rx, fast_policy(10)));
        assert_eq!(disk.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn background_thread_syncs_periodically_and_stops() {
        let disk = Arc::new(FlakyDisk::new(0));
        let flusher = Flusher::spawn(Arc::clone(&disk), Duration::from_millis(5), fast_policy(1)).unwrap();

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while disk.reports.load(Ordering::SeqCst) < 2 && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        flusher.stop();

        assert!(disk.reports.load(Ordering::SeqCst) >= 2);
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = FsyncPolicy {
            max_retries: 10,
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(35),
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(10));
        assert_eq!(policy.backoff(2), Duration::from_millis(20));
        assert_eq!(policy.backoff(3), Duration::from_millis(35));
        assert_eq!(policy.backoff(40), Duration::from_millis(35));
    }
}
