use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use tracing::{debug, warn};

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(200);

type TickCallback = Arc<dyn Fn(DateTime<Local>) + Send + Sync>;

/// Emits the current wall-clock time at a fixed cadence on a worker thread.
///
/// Starts paused. Each `resume` bumps a generation counter so a worker from an
/// earlier run can never keep ticking next to the new one.
pub struct TickService {
    interval: Duration,
    callback: TickCallback,
    running: Arc<AtomicBool>,
    generation: Arc<AtomicU64>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl TickService {
    pub fn new<F>(interval: Duration, callback: F) -> Self
    where
        F: Fn(DateTime<Local>) + Send + Sync + 'static,
    {
        Self {
            interval: interval.max(Duration::from_millis(1)),
            callback: Arc::new(callback),
            running: Arc::new(AtomicBool::new(false)),
            generation: Arc::new(AtomicU64::new(0)),
            worker: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Starts ticking, first tick immediately. Returns `false` if already
    /// running.
    pub fn resume(&self) -> bool {
        let mut worker = match self.worker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if self.running.load(Ordering::SeqCst) {
            return false;
        }
        // the old chain must see the new generation before it can see `running`
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.running.store(true, Ordering::SeqCst);
        let state = TickLoop {
            interval: self.interval,
            callback: Arc::clone(&self.callback),
            running: Arc::clone(&self.running),
            generation: Arc::clone(&self.generation),
            owned_generation: generation,
        };

        let spawned = thread::Builder::new()
            .name("tzclock-tick".to_string())
            .spawn(move || state.run());
        match spawned {
            Ok(handle) => {
                debug!(generation, interval_ms = self.interval.as_millis() as u64, "tick resumed");
                // a superseded worker exits on its own once it sees the new generation
                *worker = Some(handle);
                true
            }
            Err(err) => {
                warn!(error = %err, "unable to start tick thread");
                self.running.store(false, Ordering::SeqCst);
                false
            }
        }
    }

    /// Stops the chain. A tick already in progress finishes; none follow.
    pub fn pause(&self) {
        let worker = match self.worker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(handle) = worker.as_ref() {
            handle.thread().unpark();
        }
        debug!("tick paused");
    }
}

impl Drop for TickService {
    fn drop(&mut self) {
        self.pause();
        let handle = match self.worker.get_mut() {
            Ok(slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }
}

struct TickLoop {
    interval: Duration,
    callback: TickCallback,
    running: Arc<AtomicBool>,
    generation: Arc<AtomicU64>,
    owned_generation: u64,
}

impl TickLoop {
    fn is_current(&self) -> bool {
        self.running.load(Ordering::SeqCst)
            && self.generation.load(Ordering::SeqCst) == self.owned_generation
    }

    fn run(self) {
        while self.is_current() {
            (self.callback)(Local::now());

            let deadline = Instant::now() + self.interval;
            loop {
                if !self.is_current() {
                    return;
                }
                let now = Instant::now();
                if now >= deadline {
                    break;
                }
                thread::park_timeout(deadline - now);
            }
        }
    }
}
