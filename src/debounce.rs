//! Trailing-edge debouncing for bursts of host signals.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DebounceDecision {
    /// Nothing pending: wait for the next input indefinitely.
    Idle,
    /// A value is pending and fires once the window elapses quietly.
    Armed(Instant),
}

/// Forward the last value of every burst on `input` once `window` has
/// passed without a new value. A value still pending when `input` closes
/// is flushed before the output closes.
pub fn debounce<T>(window: Duration, input: mpsc::Receiver<T>) -> mpsc::Receiver<T>
where
    T: Send + 'static,
{
    let (tx, rx) = mpsc::channel(16);
    tokio::spawn(run(window, input, tx));
    rx
}

async fn run<T>(window: Duration, mut input: mpsc::Receiver<T>, output: mpsc::Sender<T>) {
    let mut pending: Option<T> = None;
    let mut state = DebounceDecision::Idle;

    loop {
        match state {
            DebounceDecision::Idle => match input.recv().await {
                Some(value) => {
                    pending = Some(value);
                    state = DebounceDecision::Armed(Instant::now() + window);
                }
                None => break,
            },
            DebounceDecision::Armed(deadline) => {
                tokio::select! {
                    received = input.recv() => match received {
                        Some(value) => {
                            pending = Some(value);
                            state = DebounceDecision::Armed(Instant::now() + window);
                        }
                        None => break,
                    },
                    _ = sleep_until(deadline) => {
                        state = DebounceDecision::Idle;
                        if let Some(value) = pending.take() {
                            if output.send(value).await.is_err() {
                                return;
                            }
                        }
                    }
                }
            }
        }
    }

    if let Some(value) = pending.take() {
        tracing::trace!("flushing pending debounced value on close");
        let _ = output.send(value).await;
    }
}
