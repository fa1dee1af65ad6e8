use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::clock::Clock;
use crate::models::HelpRequest;

pub const WARNING_THRESHOLD_SECS: i64 = 30;
pub const DEFAULT_TICK: std::time::Duration = std::time::Duration::from_secs(1);

/// Unclamped time left in the window. An unknown or future `created_at`
/// counts as just created.
pub fn remaining(
    created_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    timeout: Duration,
) -> Duration {
    match created_at {
        Some(created) if created <= now => timeout - (now - created),
        _ => timeout,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownBand {
    Default,
    Warning,
    Expired,
}

impl CountdownBand {
    pub fn for_remaining(remaining: Duration) -> Self {
        if remaining <= Duration::zero() {
            Self::Expired
        } else if remaining <= Duration::seconds(WARNING_THRESHOLD_SECS) {
            Self::Warning
        } else {
            Self::Default
        }
    }
}

/// What a countdown shows at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountdownReading {
    /// Clamped at zero.
    pub remaining: Duration,
    pub band: CountdownBand,
}

impl CountdownReading {
    pub fn at(created_at: Option<DateTime<Utc>>, now: DateTime<Utc>, timeout: Duration) -> Self {
        let left = remaining(created_at, now, timeout);
        Self {
            remaining: left.max(Duration::zero()),
            band: CountdownBand::for_remaining(left),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.band == CountdownBand::Expired
    }

    /// Whole seconds left, rounded up so a live timer never shows 00:00.
    pub fn remaining_secs(&self) -> i64 {
        let millis = self.remaining.num_milliseconds();
        (millis + 999) / 1000
    }

    pub fn label(&self) -> String {
        if self.is_expired() {
            return "Expired".to_string();
        }
        let secs = self.remaining_secs();
        format!("{:02}:{:02}", secs / 60, secs % 60)
    }
}

/// A per-request countdown recomputed from the absolute creation time on
/// every tick. Stops by itself once expired. Read-only: expiry here never
/// changes the request.
pub struct CountdownTimer {
    rx: watch::Receiver<CountdownReading>,
    token: CancellationToken,
}

impl CountdownTimer {
    pub fn start(
        created_at: Option<DateTime<Utc>>,
        timeout: Duration,
        clock: Arc<dyn Clock>,
        tick: std::time::Duration,
    ) -> Self {
        let initial = CountdownReading::at(created_at, clock.now(), timeout);
        let (tx, rx) = watch::channel(initial);
        let token = CancellationToken::new();

        if !initial.is_expired() {
            let token = token.clone();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        biased;
                        _ = token.cancelled() => return,
                        _ = tokio::time::sleep(tick) => {}
                    }
                    if token.is_cancelled() {
                        return;
                    }

                    let reading = CountdownReading::at(created_at, clock.now(), timeout);
                    tx.send_replace(reading);
                    if reading.is_expired() {
                        return;
                    }
                }
            });
        }

        Self { rx, token }
    }

    pub fn reading(&self) -> CountdownReading {
        *self.rx.borrow()
    }

    /// Next tick, or `None` once the timer stopped or was cancelled.
    pub async fn changed(&mut self) -> Option<CountdownReading> {
        if self.token.is_cancelled() {
            return None;
        }
        tokio::select! {
            biased;
            _ = self.token.cancelled() => None,
            changed = self.rx.changed() => changed.ok().map(|_| *self.rx.borrow_and_update()),
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for CountdownTimer {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Exactly one timer per displayed pending request.
pub struct TimerPool {
    clock: Arc<dyn Clock>,
    timeout: Duration,
    tick: std::time::Duration,
    timers: HashMap<String, CountdownTimer>,
}

impl TimerPool {
    pub fn new(clock: Arc<dyn Clock>, timeout: Duration, tick: std::time::Duration) -> Self {
        Self {
            clock,
            timeout,
            tick,
            timers: HashMap::new(),
        }
    }

    /// Starts timers for newly shown requests and cancels the rest.
    pub fn reconcile(&mut self, pending: &[HelpRequest]) {
        self.timers.retain(|id, timer| {
            let keep = pending.iter().any(|req| &req.id == id);
            if !keep {
                timer.cancel();
            }
            keep
        });

        for req in pending {
            if !self.timers.contains_key(&req.id) {
                let timer = CountdownTimer::start(
                    req.created_at,
                    self.timeout,
                    self.clock.clone(),
                    self.tick,
                );
                self.timers.insert(req.id.clone(), timer);
            }
        }
    }

    pub fn reading(&self, id: &str) -> Option<CountdownReading> {
        self.timers.get(id).map(CountdownTimer::reading)
    }

    /// Reading from the pool, or computed on the spot for requests the pool
    /// has not seen yet.
    pub fn reading_for(&self, req: &HelpRequest) -> CountdownReading {
        self.reading(&req.id).unwrap_or_else(|| {
            CountdownReading::at(req.created_at, self.clock.now(), self.timeout)
        })
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    pub fn shutdown(&mut self) {
        for timer in self.timers.values() {
            timer.cancel();
        }
        self.timers.clear();
    }
}

impl Drop for TimerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use tokio::time::timeout as with_timeout;

    const TEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(2);
    const FAST_TICK: std::time::Duration = std::time::Duration::from_millis(10);

    fn window() -> Duration {
        Duration::seconds(60)
    }

    #[test]
    fn test_remaining_for_45_second_old_request() {
        let now = Utc::now();
        let reading = CountdownReading::at(Some(now - Duration::seconds(45)), now, window());
        assert_eq!(reading.remaining_secs(), 15);
        assert_eq!(reading.label(), "00:15");
        assert_eq!(reading.band, CountdownBand::Warning);
    }

    #[test]
    fn test_bands() {
        assert_eq!(
            CountdownBand::for_remaining(Duration::seconds(45)),
            CountdownBand::Default
        );
        assert_eq!(
            CountdownBand::for_remaining(Duration::seconds(31)),
            CountdownBand::Default
        );
        assert_eq!(
            CountdownBand::for_remaining(Duration::seconds(30)),
            CountdownBand::Warning
        );
        assert_eq!(
            CountdownBand::for_remaining(Duration::seconds(20)),
            CountdownBand::Warning
        );
        assert_eq!(
            CountdownBand::for_remaining(Duration::zero()),
            CountdownBand::Expired
        );
        assert_eq!(
            CountdownBand::for_remaining(Duration::seconds(-15)),
            CountdownBand::Expired
        );
    }

    #[test]
    fn test_expired_reading_is_clamped() {
        let now = Utc::now();
        let reading = CountdownReading::at(Some(now - Duration::seconds(75)), now, window());
        assert!(reading.is_expired());
        assert_eq!(reading.remaining, Duration::zero());
        assert_eq!(reading.label(), "Expired");
    }

    #[test]
    fn test_future_or_unknown_created_at_shows_full_window() {
        let now = Utc::now();
        let future = CountdownReading::at(Some(now + Duration::seconds(30)), now, window());
        let unknown = CountdownReading::at(None, now, window());
        assert_eq!(future.label(), "01:00");
        assert_eq!(unknown.remaining, window());
        assert_eq!(unknown.band, CountdownBand::Default);
    }

    #[test]
    fn test_partial_second_rounds_up() {
        let now = Utc::now();
        let reading = CountdownReading::at(
            Some(now - Duration::milliseconds(59_500)),
            now,
            window(),
        );
        assert!(!reading.is_expired());
        assert_eq!(reading.label(), "00:01");
    }

    #[tokio::test]
    async fn test_timer_follows_the_clock() {
        let clock = Arc::new(ManualClock::default());
        let created = clock.now() - Duration::seconds(45);
        let mut timer = CountdownTimer::start(Some(created), window(), clock.clone(), FAST_TICK);
        assert_eq!(timer.reading().remaining_secs(), 15);

        clock.advance(Duration::seconds(5));
        let reading = loop {
            let r = with_timeout(TEST_TIMEOUT, timer.changed())
                .await
                .unwrap()
                .unwrap();
            if r.remaining_secs() == 10 {
                break r;
            }
        };
        assert_eq!(reading.band, CountdownBand::Warning);
    }

    #[tokio::test]
    async fn test_already_expired_timer_never_ticks() {
        let clock = Arc::new(ManualClock::default());
        let created = clock.now() - Duration::seconds(75);
        let mut timer = CountdownTimer::start(Some(created), window(), clock, FAST_TICK);

        assert_eq!(timer.reading().label(), "Expired");
        let next = with_timeout(TEST_TIMEOUT, timer.changed()).await.unwrap();
        assert!(next.is_none());
    }

    #[tokio::test]
    async fn test_timer_stops_after_expiring() {
        let clock = Arc::new(ManualClock::default());
        let created = clock.now() - Duration::seconds(59);
        let mut timer = CountdownTimer::start(Some(created), window(), clock.clone(), FAST_TICK);

        clock.advance(Duration::seconds(2));
        loop {
            match with_timeout(TEST_TIMEOUT, timer.changed()).await.unwrap() {
                Some(r) if r.is_expired() => break,
                Some(_) => continue,
                None => panic!("timer stopped before expiring"),
            }
        }
        assert!(with_timeout(TEST_TIMEOUT, timer.changed())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_cancelled_timer_does_not_tick() {
        let clock = Arc::new(ManualClock::default());
        let mut timer = CountdownTimer::start(Some(clock.now()), window(), clock.clone(), FAST_TICK);
        let before = timer.reading();

        timer.cancel();
        timer.cancel();
        clock.advance(Duration::seconds(10));
        tokio::time::sleep(FAST_TICK * 5).await;

        assert!(timer.changed().await.is_none());
        assert_eq!(timer.reading(), before);
    }

    #[tokio::test]
    async fn test_pool_reconciles_against_pending_snapshot() {
        let clock = Arc::new(ManualClock::default());
        let mut pool = TimerPool::new(clock.clone(), window(), FAST_TICK);
        let a = HelpRequest::new("a".to_string(), "q".to_string());
        let b = HelpRequest::new("b".to_string(), "q".to_string());
        let c = HelpRequest::new("c".to_string(), "q".to_string());

        pool.reconcile(&[a.clone(), b.clone()]);
        assert_eq!(pool.len(), 2);

        pool.reconcile(&[b.clone(), c.clone()]);
        assert_eq!(pool.len(), 2);
        assert!(pool.reading("a").is_none());
        assert!(pool.reading("b").is_some());
        assert!(pool.reading("c").is_some());

        pool.shutdown();
        assert!(pool.is_empty());
    }
}
