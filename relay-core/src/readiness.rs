use std::time::Duration;

/// How often, and how many times, to re-check an external condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl RetryPolicy {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        RetryPolicy {
            interval,
            max_attempts,
        }
    }

    /// Upper bound on how long `poll_until` can wait before giving up.
    pub fn budget(&self) -> Duration {
        self.interval * self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::new(Duration::from_millis(100), 50)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness<T> {
    Ready(T),
    Exhausted { attempts: u32 },
    Cancelled,
}

impl<T> Readiness<T> {
    pub fn into_ready(self) -> Option<T> {
        match self {
            Readiness::Ready(value) => Some(value),
            _ => None,
        }
    }
}

/// Wait for `probe` to yield a value, checking once per `policy.interval`.
///
/// The first check happens one interval after the call; callers that want an
/// immediate attempt should probe synchronously before awaiting this. Before
/// every attempt `is_cancelled` is consulted and, when it returns true, the
/// wait ends with `Readiness::Cancelled` without probing again.
pub async fn poll_until<T, C, P>(policy: RetryPolicy, mut is_cancelled: C, mut probe: P) -> Readiness<T>
where
    C: FnMut() -> bool,
    P: FnMut() -> Option<T>,
{
    for attempt in 1..=policy.max_attempts {
        tokio::time::sleep(policy.interval).await;
        if is_cancelled() {
            log::debug!("Readiness wait cancelled before attempt {}", attempt);
            return Readiness::Cancelled;
        }
        if let Some(value) = probe() {
            return Readiness::Ready(value);
        }
    }
    Readiness::Exhausted {
        attempts: policy.max_attempts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn ready_on_third_attempt() {
        let calls = Cell::new(0u32);
        let start = Instant::now();
        let result = poll_until(RetryPolicy::default(), || false, || {
            calls.set(calls.get() + 1);
            (calls.get() == 3).then_some("node")
        })
        .await;
        assert_eq!(result, Readiness::Ready("node"));
        assert_eq!(calls.get(), 3);
        assert_eq!(start.elapsed(), Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_after_max_attempts() {
        let calls = Cell::new(0u32);
        let policy = RetryPolicy::default();
        let start = Instant::now();
        let result: Readiness<()> = poll_until(policy, || false, || {
            calls.set(calls.get() + 1);
            None
        })
        .await;
        assert_eq!(result, Readiness::Exhausted { attempts: 50 });
        assert_eq!(calls.get(), 50);
        assert_eq!(start.elapsed(), policy.budget());
        assert_eq!(policy.budget(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_probing() {
        let calls = Cell::new(0u32);
        let result: Readiness<()> = poll_until(
            RetryPolicy::default(),
            || calls.get() >= 2,
            || {
                calls.set(calls.get() + 1);
                None
            },
        )
        .await;
        assert_eq!(result, Readiness::Cancelled);
        assert_eq!(calls.get(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_attempts_exhausts_immediately() {
        let policy = RetryPolicy::new(Duration::from_millis(100), 0);
        let result: Readiness<()> = poll_until(policy, || false, || Some(())).await;
        assert_eq!(result, Readiness::Exhausted { attempts: 0 });
    }

    #[test]
    fn into_ready_extracts_value() {
        assert_eq!(Readiness::Ready(7).into_ready(), Some(7));
        assert_eq!(Readiness::<i32>::Cancelled.into_ready(), None);
        assert_eq!(Readiness::<i32>::Exhausted { attempts: 1 }.into_ready(), None);
    }
}
