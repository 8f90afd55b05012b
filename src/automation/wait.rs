use std::time::Duration;

use tokio::time::{sleep, Instant};

/// Bounds for [`settle`]: never return before `min`, give up at `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettleBounds {
    pub min: Duration,
    pub max: Duration,
    pub poll: Duration,
}

/// Wait at least `bounds.min`, then poll `is_stable` until it holds or
/// `bounds.max` has passed since the call. Returns the last check result.
pub async fn settle<F>(bounds: SettleBounds, mut is_stable: F) -> bool
where
    F: FnMut() -> bool,
{
    let started = Instant::now();
    let deadline = started + bounds.max.max(bounds.min);
    sleep(bounds.min).await;

    loop {
        if is_stable() {
            return true;
        }
        let now = Instant::now();
        if now >= deadline {
            return false;
        }
        let poll = bounds.poll.max(Duration::from_millis(1));
        sleep(poll.min(deadline - now)).await;
    }
}
