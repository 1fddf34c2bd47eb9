//! Progress clock for running timed tasks
//!
//! Purely cosmetic: completion is always decided by comparing timestamps,
//! the clock only feeds progress bars. Starting a new run cancels the
//! previous one, and once `cancel` returns no further events are sent for
//! the cancelled ticket.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Shortest tick interval
pub const MIN_TICK_MS: u64 = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClockRequest {
    pub task_id: String,
    pub duration_ms: u64,
    /// Resume from this percentage instead of 0
    pub initial_progress: Option<u8>,
}

/// Identifies one clock run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClockTicket(u64);

impl ClockTicket {
    pub fn id(&self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClockEvent {
    Progress { task_id: String, percent: u8 },
    Cancelled,
}

pub trait ProgressClock: Send + Sync {
    /// Cancel any running clock and start a new one
    fn start(&self, request: ClockRequest) -> ClockTicket;

    /// Stop the running clock, if any
    fn cancel(&self);

    /// Whether `ticket` still belongs to a live run
    fn is_current(&self, ticket: ClockTicket) -> bool;
}

/// Tick interval for a run of `duration_ms`
pub fn tick_interval(duration_ms: u64) -> Duration {
    Duration::from_millis((duration_ms / 100).max(MIN_TICK_MS))
}

/// Percentage of `duration_ms` covered by `elapsed_ms`, capped at 100
pub fn progress_percent(elapsed_ms: u64, duration_ms: u64) -> u8 {
    if duration_ms == 0 {
        return 100;
    }
    (elapsed_ms.saturating_mul(100) / duration_ms).min(100) as u8
}

/// Clock that never ticks (headless use, tests)
#[derive(Debug, Default)]
pub struct NoopProgressClock {
    next: AtomicU64,
}

impl NoopProgressClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressClock for NoopProgressClock {
    fn start(&self, _request: ClockRequest) -> ClockTicket {
        ClockTicket(self.next.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn cancel(&self) {}

    fn is_current(&self, _ticket: ClockTicket) -> bool {
        false
    }
}

struct ClockState {
    /// Ticket of the live run, 0 when idle
    live: u64,
    handle: Option<JoinHandle<()>>,
}

struct ClockInner {
    next: AtomicU64,
    state: Mutex<ClockState>,
    events: mpsc::UnboundedSender<ClockEvent>,
}

impl ClockInner {
    /// Send a progress event if `ticket` is still live. Returns false once the
    /// run is over.
    fn emit(&self, ticket: u64, task_id: &str, percent: u8) -> bool {
        let Ok(mut state) = self.state.lock() else {
            return false;
        };
        if state.live != ticket {
            return false;
        }
        let _ = self.events.send(ClockEvent::Progress {
            task_id: task_id.to_string(),
            percent,
        });
        if percent >= 100 {
            state.live = 0;
            state.handle = None;
            return false;
        }
        true
    }
}

/// Progress clock driven by a tokio interval
#[derive(Clone)]
pub struct TokioProgressClock {
    inner: Arc<ClockInner>,
}

impl TokioProgressClock {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ClockEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let clock = Self {
            inner: Arc::new(ClockInner {
                next: AtomicU64::new(0),
                state: Mutex::new(ClockState {
                    live: 0,
                    handle: None,
                }),
                events: tx,
            }),
        };
        (clock, rx)
    }
}

impl ProgressClock for TokioProgressClock {
    fn start(&self, request: ClockRequest) -> ClockTicket {
        self.cancel();

        let ticket = self.inner.next.fetch_add(1, Ordering::SeqCst) + 1;
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!("No tokio runtime, progress clock for task {} not started", request.task_id);
            return ClockTicket(ticket);
        };

        let duration = request.duration_ms;
        let offset = duration * u64::from(request.initial_progress.unwrap_or(0).min(100)) / 100;
        let period = tick_interval(duration);
        let inner = self.inner.clone();
        let task_id = request.task_id;

        let Ok(mut state) = self.inner.state.lock() else {
            return ClockTicket(ticket);
        };
        state.live = ticket;
        state.handle = Some(handle.spawn(async move {
            let started = Instant::now();
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                let elapsed = started.elapsed().as_millis() as u64 + offset;
                if !inner.emit(ticket, &task_id, progress_percent(elapsed, duration)) {
                    break;
                }
            }
        }));
        debug!(ticket, duration, "Progress clock started");

        ClockTicket(ticket)
    }

    fn cancel(&self) {
        let Ok(mut state) = self.inner.state.lock() else {
            return;
        };
        if state.live == 0 {
            return;
        }
        state.live = 0;
        if let Some(handle) = state.handle.take() {
            handle.abort();
        }
        let _ = self.inner.events.send(ClockEvent::Cancelled);
        debug!("Progress clock cancelled");
    }

    fn is_current(&self, ticket: ClockTicket) -> bool {
        self.inner
            .state
            .lock()
            .map(|s| s.live != 0 && s.live == ticket.0)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(duration_ms: u64) -> ClockRequest {
        ClockRequest {
            task_id: "1".into(),
            duration_ms,
            initial_progress: None,
        }
    }

    #[test]
    fn interval_has_floor() {
        assert_eq!(tick_interval(1_000), Duration::from_millis(50));
        assert_eq!(tick_interval(30_000), Duration::from_millis(300));
    }

    #[test]
    fn percent_is_capped() {
        assert_eq!(progress_percent(0, 8_000), 0);
        assert_eq!(progress_percent(4_000, 8_000), 50);
        assert_eq!(progress_percent(9_000, 8_000), 100);
        assert_eq!(progress_percent(5, 0), 100);
    }

    #[test]
    fn noop_clock_hands_out_distinct_tickets() {
        let clock = NoopProgressClock::new();
        let a = clock.start(request(100));
        let b = clock.start(request(100));
        assert_ne!(a, b);
        assert!(!clock.is_current(b));
    }

    #[tokio::test]
    async fn runs_to_completion() {
        let (clock, mut rx) = TokioProgressClock::new();
        let ticket = clock.start(request(200));
        assert!(clock.is_current(ticket));

        tokio::time::sleep(Duration::from_millis(500)).await;

        let mut last = None;
        while let Ok(event) = rx.try_recv() {
            last = Some(event);
        }
        assert_eq!(
            last,
            Some(ClockEvent::Progress {
                task_id: "1".into(),
                percent: 100
            })
        );
        assert!(!clock.is_current(ticket));
    }

    #[tokio::test]
    async fn cancel_stops_further_events() {
        let (clock, mut rx) = TokioProgressClock::new();
        let ticket = clock.start(request(10_000));
        tokio::time::sleep(Duration::from_millis(250)).await;
        clock.cancel();
        assert!(!clock.is_current(ticket));

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        assert_eq!(events.last(), Some(&ClockEvent::Cancelled));
        assert!(events.len() >= 2);

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn restart_cancels_previous_run() {
        let (clock, mut rx) = TokioProgressClock::new();
        let first = clock.start(request(10_000));
        let second = clock.start(ClockRequest {
            task_id: "2".into(),
            duration_ms: 10_000,
            initial_progress: Some(50),
        });
        assert!(!clock.is_current(first));
        assert!(clock.is_current(second));

        tokio::time::sleep(Duration::from_millis(150)).await;
        clock.cancel();

        let events: Vec<ClockEvent> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        assert!(events.contains(&ClockEvent::Cancelled));
        assert!(events.iter().any(|e| matches!(
            e,
            ClockEvent::Progress { task_id, percent } if task_id == "2" && *percent >= 50
        )));
    }
}
