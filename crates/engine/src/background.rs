//! Periodic maintenance for a shared registry.
//!
//! One named worker thread runs two jobs on independent schedules:
//!
//! - compaction of one random collection, first at `interval / 2`, then
//!   every `interval`
//! - `save_all`, every `interval` (skipped for registries without a data
//!   directory)
//!
//! Job failures are logged and counted; they never stop the scheduler.

use parking_lot::{Condvar, Mutex as ParkingMutex};
use simdb_core::{SimError, SimResult};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

use crate::registry::SimBase;

/// Maintenance counters snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaintenanceStats {
    /// Compaction runs completed.
    pub compactions: u64,
    /// `save_all` runs completed.
    pub saves: u64,
    /// Runs of either job that returned an error.
    pub failures: u64,
}

struct SchedulerInner {
    stop: ParkingMutex<bool>,
    wake: Condvar,
    compactions: AtomicU64,
    saves: AtomicU64,
    failures: AtomicU64,
}

/// Background compaction and persistence for a [`SimBase`].
///
/// Stops on [`MaintenanceScheduler::shutdown`] or drop.
pub struct MaintenanceScheduler {
    inner: Arc<SchedulerInner>,
    worker: ParkingMutex<Option<JoinHandle<()>>>,
    interval: Duration,
}

impl MaintenanceScheduler {
    /// Start the maintenance thread (`simdb-maintenance`).
    ///
    /// # Errors
    ///
    /// `Configuration` for a zero interval, `Io` if the thread can't spawn.
    pub fn start(base: Arc<SimBase>, interval: Duration) -> SimResult<Self> {
        if interval.is_zero() {
            return Err(SimError::configuration(
                "cron_interval_ms",
                "maintenance interval must be positive",
            ));
        }

        let inner = Arc::new(SchedulerInner {
            stop: ParkingMutex::new(false),
            wake: Condvar::new(),
            compactions: AtomicU64::new(0),
            saves: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        });

        let inner_clone = Arc::clone(&inner);
        let handle = std::thread::Builder::new()
            .name("simdb-maintenance".to_string())
            .spawn(move || maintenance_loop(&inner_clone, &base, interval))?;

        info!(
            target: "simdb::background",
            interval_ms = interval.as_millis() as u64,
            "Maintenance scheduler started"
        );
        Ok(Self {
            inner,
            worker: ParkingMutex::new(Some(handle)),
            interval,
        })
    }

    /// Start with the interval from the registry's configuration.
    ///
    /// Returns `None` when maintenance is disabled (`cron_interval_ms = 0`).
    pub fn from_config(base: Arc<SimBase>) -> SimResult<Option<Self>> {
        match base.config().cron_interval() {
            Some(interval) => Self::start(base, interval).map(Some),
            None => Ok(None),
        }
    }

    /// Configured period.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Signal the worker to exit and join it. Idempotent.
    pub fn shutdown(&self) {
        {
            let mut stop = self.inner.stop.lock();
            *stop = true;
            self.inner.wake.notify_all();
        }

        if let Some(handle) = self.worker.lock().take() {
            let _ = handle.join();
            info!(target: "simdb::background", "Maintenance scheduler stopped");
        }
    }

    /// Return a snapshot of maintenance counters.
    pub fn stats(&self) -> MaintenanceStats {
        MaintenanceStats {
            compactions: self.inner.compactions.load(AtomicOrdering::Relaxed),
            saves: self.inner.saves.load(AtomicOrdering::Relaxed),
            failures: self.inner.failures.load(AtomicOrdering::Relaxed),
        }
    }
}

impl Drop for MaintenanceScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn maintenance_loop(inner: &SchedulerInner, base: &SimBase, interval: Duration) {
    let start = Instant::now();
    let mut next_compact = start + interval / 2;
    let mut next_save = start + interval;

    loop {
        let deadline = next_compact.min(next_save);
        {
            let mut stop = inner.stop.lock();
            while !*stop && Instant::now() < deadline {
                inner.wake.wait_until(&mut stop, deadline);
            }
            if *stop {
                return;
            }
        }

        let now = Instant::now();
        if now >= next_compact {
            run_compaction(inner, base);
            next_compact += interval;
        }
        if now >= next_save {
            run_save(inner, base);
            next_save += interval;
        }
    }
}

fn run_compaction(inner: &SchedulerInner, base: &SimBase) {
    match base.compact_random() {
        Ok(Some(name)) => {
            debug!(target: "simdb::background", collection = %name, "Compaction finished");
        }
        Ok(None) => {}
        Err(e) => {
            inner.failures.fetch_add(1, AtomicOrdering::Relaxed);
            error!(target: "simdb::background", error = %e, "Compaction failed");
            return;
        }
    }
    inner.compactions.fetch_add(1, AtomicOrdering::Relaxed);
}

fn run_save(inner: &SchedulerInner, base: &SimBase) {
    if base.data_dir().is_none() {
        return;
    }
    match base.save_all() {
        Ok(_) => {
            inner.saves.fetch_add(1, AtomicOrdering::Relaxed);
        }
        Err(e) => {
            inner.failures.fetch_add(1, AtomicOrdering::Relaxed);
            error!(target: "simdb::background", error = %e, "Save failed");
        }
    }
}
