// Rate limiter properties: the sliding-window ceiling, priority
// ordering among queued work, and drain-on-stop. All under paused time
// so window waits auto-advance.

#![allow(clippy::unwrap_used)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::Notify;
use tokio::time::Instant;

use cirrus_core::{priority, CoreError, RateLimiter, RateLimiterConfig};

#[tokio::test(start_paused = true)]
async fn never_more_than_m_starts_in_any_trailing_window() {
    let limiter = RateLimiter::new(RateLimiterConfig {
        max_concurrent: 8,
        calls_per_second: 3,
    });
    limiter.start().await;

    let starts: Arc<Mutex<Vec<Instant>>> = Arc::new(Mutex::new(Vec::new()));
    let mut handles = Vec::new();
    for _ in 0..10 {
        let limiter = limiter.clone();
        let starts = Arc::clone(&starts);
        handles.push(tokio::spawn(async move {
            limiter
                .submit(priority::TELEMETRY, move || async move {
                    starts.lock().unwrap().push(Instant::now());
                    Ok(json!(null))
                })
                .await
                .unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let mut starts = starts.lock().unwrap().clone();
    starts.sort();
    assert_eq!(starts.len(), 10);

    // Any 4th start must be at least one full second after the start
    // three positions earlier, for every trailing window.
    for window in starts.windows(4) {
        let span = window[3].saturating_duration_since(window[0]);
        assert!(
            span >= Duration::from_secs(1),
            "4 starts within {span:?}"
        );
    }

    let stats = limiter.stats();
    assert_eq!(stats.total_calls, 10);
    assert!(stats.throttle_events > 0);

    limiter.stop().await;
}

#[tokio::test(start_paused = true)]
async fn priority_dominates_submission_order() {
    // One worker, no window pressure: ordering comes purely from the
    // priority queue.
    let limiter = RateLimiter::new(RateLimiterConfig {
        max_concurrent: 1,
        calls_per_second: 100,
    });
    limiter.start().await;

    let order: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
    let gate = Arc::new(Notify::new());

    // Occupy the only worker so later submissions queue up behind it.
    let blocker = {
        let limiter = limiter.clone();
        let order = Arc::clone(&order);
        let gate = Arc::clone(&gate);
        tokio::spawn(async move {
            limiter
                .submit(priority::TELEMETRY, move || async move {
                    gate.notified().await;
                    order.lock().unwrap().push("blocker");
                    Ok(json!(null))
                })
                .await
                .unwrap();
        })
    };
    tokio::task::yield_now().await;

    // Background first, setup second: the setup call must still win.
    let background = {
        let limiter = limiter.clone();
        let order = Arc::clone(&order);
        tokio::spawn(async move {
            limiter
                .submit(priority::BACKGROUND, move || async move {
                    order.lock().unwrap().push("background");
                    Ok(json!(null))
                })
                .await
                .unwrap();
        })
    };
    tokio::task::yield_now().await;

    let setup = {
        let limiter = limiter.clone();
        let order = Arc::clone(&order);
        tokio::spawn(async move {
            limiter
                .submit(priority::SETUP, move || async move {
                    order.lock().unwrap().push("setup");
                    Ok(json!(null))
                })
                .await
                .unwrap();
        })
    };
    tokio::task::yield_now().await;

    gate.notify_one();
    blocker.await.unwrap();
    setup.await.unwrap();
    background.await.unwrap();

    assert_eq!(
        *order.lock().unwrap(),
        vec!["blocker", "setup", "background"]
    );

    limiter.stop().await;
}

#[tokio::test(start_paused = true)]
async fn ties_within_a_priority_class_are_fifo() {
    let limiter = RateLimiter::new(RateLimiterConfig {
        max_concurrent: 1,
        calls_per_second: 100,
    });
    limiter.start().await;

    let order: Arc<Mutex<Vec<usize>>> = Arc::new(Mutex::new(Vec::new()));
    let gate = Arc::new(Notify::new());

    let blocker = {
        let limiter = limiter.clone();
        let gate = Arc::clone(&gate);
        tokio::spawn(async move {
            limiter
                .submit(priority::TELEMETRY, move || async move {
                    gate.notified().await;
                    Ok(json!(null))
                })
                .await
                .unwrap();
        })
    };
    tokio::task::yield_now().await;

    let mut handles = Vec::new();
    for index in 0..5 {
        let limiter = limiter.clone();
        let order = Arc::clone(&order);
        handles.push(tokio::spawn(async move {
            limiter
                .submit(priority::TELEMETRY, move || async move {
                    order.lock().unwrap().push(index);
                    Ok(json!(null))
                })
                .await
                .unwrap();
        }));
        // Queue each submission before the next so sequence numbers
        // reflect submission order.
        tokio::task::yield_now().await;
    }

    gate.notify_one();
    blocker.await.unwrap();
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    limiter.stop().await;
}

#[tokio::test(start_paused = true)]
async fn stop_lets_accepted_work_finish() {
    let limiter = RateLimiter::new(RateLimiterConfig {
        max_concurrent: 1,
        calls_per_second: 100,
    });
    limiter.start().await;

    let mut handles = Vec::new();
    for index in 0..3 {
        let limiter = limiter.clone();
        handles.push(tokio::spawn(async move {
            limiter
                .submit(priority::TELEMETRY, move || async move {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    Ok(json!(index))
                })
                .await
        }));
    }
    // Let every submission reach the queue before stopping.
    tokio::task::yield_now().await;

    limiter.stop().await;

    for (index, handle) in handles.into_iter().enumerate() {
        let result: Result<Value, CoreError> = handle.await.unwrap();
        assert_eq!(result.unwrap(), json!(index));
    }
}
