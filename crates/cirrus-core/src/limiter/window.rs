// ── Sliding-window call gate ──
//
// Enforces "at most M call starts in any trailing 1-second window".
// When the window is full the waiter sleeps exactly until the oldest
// entry exits the horizon -- no polling loop with a fixed tick.
//
// Besides the 1 s window, two longer horizons are kept purely for
// diagnostics: a minute of call starts ("calls in the last minute") and
// five minutes of throttle events.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

const WINDOW: Duration = Duration::from_secs(1);
const HISTORY_HORIZON: Duration = Duration::from_secs(60);
const THROTTLE_HORIZON: Duration = Duration::from_secs(300);

/// Point-in-time diagnostics snapshot.
#[derive(Debug, Clone, Default)]
pub struct RateLimiterStats {
    /// Call starts inside the current 1 s window.
    pub calls_in_window: usize,
    /// Call starts in the trailing minute.
    pub calls_last_minute: usize,
    /// Forced waits in the trailing five minutes.
    pub throttle_events: usize,
    /// Cumulative time callers spent waiting for a window slot.
    pub total_throttle_wait: Duration,
    /// Call starts granted since construction.
    pub total_calls: u64,
}

pub(crate) struct SlidingWindow {
    max_per_second: usize,
    state: Mutex<WindowState>,
}

#[derive(Default)]
struct WindowState {
    starts: VecDeque<Instant>,
    history: VecDeque<Instant>,
    throttles: VecDeque<Instant>,
    total_wait: Duration,
    total_calls: u64,
}

impl SlidingWindow {
    pub(crate) fn new(max_per_second: usize) -> Self {
        Self {
            max_per_second: max_per_second.max(1),
            state: Mutex::new(WindowState::default()),
        }
    }

    /// Wait until a call may start, then record the start.
    pub(crate) async fn acquire(&self) {
        loop {
            let wake_at = {
                let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
                let now = Instant::now();
                purge(&mut state, now);

                if state.starts.len() < self.max_per_second {
                    state.starts.push_back(now);
                    state.history.push_back(now);
                    state.total_calls += 1;
                    return;
                }

                // Window full: the next slot opens when the oldest start
                // leaves the 1 s horizon.
                let oldest = match state.starts.front() {
                    Some(instant) => *instant,
                    None => now,
                };
                let wake_at = oldest + WINDOW;
                state.throttles.push_back(now);
                state.total_wait += wake_at.saturating_duration_since(now);
                wake_at
            };

            tokio::time::sleep_until(wake_at).await;
        }
    }

    pub(crate) fn stats(&self) -> RateLimiterStats {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        purge(&mut state, Instant::now());
        RateLimiterStats {
            calls_in_window: state.starts.len(),
            calls_last_minute: state.history.len(),
            throttle_events: state.throttles.len(),
            total_throttle_wait: state.total_wait,
            total_calls: state.total_calls,
        }
    }
}

/// Drop entries that have left their horizon.
fn purge(state: &mut WindowState, now: Instant) {
    let expired = |front: &VecDeque<Instant>, horizon: Duration| {
        front
            .front()
            .is_some_and(|t| now.saturating_duration_since(*t) >= horizon)
    };

    while expired(&state.starts, WINDOW) {
        state.starts.pop_front();
    }
    while expired(&state.history, HISTORY_HORIZON) {
        state.history.pop_front();
    }
    while expired(&state.throttles, THROTTLE_HORIZON) {
        state.throttles.pop_front();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn grants_up_to_ceiling_without_waiting(){
        let window = SlidingWindow::new(3);

        let before = Instant::now();
        for _ in 0..3 {
            window.acquire().await;
        }
        assert_eq!(Instant::now(), before, "first three starts are immediate");

        let stats = window.stats();
        assert_eq!(stats.calls_in_window, 3);
        assert_eq!(stats.throttle_events, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn fourth_start_waits_for_window_exit() {
        let window = SlidingWindow::new(3);

        let start = Instant::now();
        for _ in 0..4 {
            window.acquire().await;
        }
        let waited = Instant::now().saturating_duration_since(start);

        // The fourth start had to wait out the full 1 s horizon.
        assert!(waited >= WINDOW, "waited {waited:?}");

        let stats = window.stats();
        assert_eq!(stats.throttle_events, 1);
        assert!(stats.total_throttle_wait >= WINDOW);
        assert_eq!(stats.total_calls, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn history_outlives_the_window() {
        let window = SlidingWindow::new(10);
        window.acquire().await;
        window.acquire().await;

        tokio::time::advance(Duration::from_secs(5)).await;

        let stats = window.stats();
        assert_eq!(stats.calls_in_window, 0);
        assert_eq!(stats.calls_last_minute, 2);

        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(window.stats().calls_last_minute, 0);
    }
}
