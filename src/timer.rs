use std::time::Duration;

use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{interval_at, Instant},
};

/// One second of a countdown. `remaining == 0` is the expiry tick and the
/// last one sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    pub generation: u64,
    pub remaining: u32,
}

impl Tick {
    pub fn expired(&self) -> bool {
        self.remaining == 0
    }
}

/// A running per-question countdown. The ticking task stops as soon as the
/// handle is dropped.
#[derive(Debug)]
pub struct Countdown {
    handle: JoinHandle<()>,
    seconds: u32,
    started: Instant,
}

impl Countdown {
    pub fn arm<T>(seconds: u32, generation: u64, sink: mpsc::UnboundedSender<T>) -> Self
    where
        T: From<Tick> + Send + 'static,
    {
        let started = Instant::now();
        let handle = tokio::spawn(async move {
            let period = Duration::from_secs(1);
            let mut ticks = interval_at(started + period, period);
            let mut remaining = seconds;
            while remaining > 0 {
                ticks.tick().await;
                remaining -= 1;
                if sink.send(Tick { generation, remaining }.into()).is_err() {
                    return;
                }
            }
        });
        Self {
            handle,
            seconds,
            started,
        }
    }

    /// Whole seconds since the countdown was armed, capped at its length.
    pub fn elapsed_secs(&self) -> u32 {
        let secs = self.started.elapsed().as_secs();
        u32::try_from(secs).unwrap_or(u32::MAX).min(self.seconds)
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
