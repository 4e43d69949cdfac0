use crate::error::EngineError;
use rand::Rng;
use std::time::Duration;
use tokio::time::{interval, Interval, MissedTickBehavior};

/// A random delay in `0..=max`, at millisecond resolution.
pub fn jitter(max: Duration) -> Duration {
    let max_ms = max.as_millis() as u64;
    if max_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
}

/// The evaluation clock of one symbol.
///
/// Ticks once per `period`, each tick followed by a random delay of at most
/// `max_jitter` so that symbols sharing a period drift apart. The first tick
/// completes immediately (plus jitter). A slow cycle delays the next tick
/// rather than causing a burst of catch-up ticks.
pub struct Ticker {
    interval: Interval,
    max_jitter: Duration,
}

impl Ticker {
    pub fn new(period: Duration, max_jitter: Duration) -> Result<Self, EngineError> {
        if period.is_zero() {
            return Err(EngineError::Configuration(
                "ticker period must be positive".to_string(),
            ));
        }
        let mut interval = interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Ok(Self { interval, max_jitter })
    }

    pub async fn tick(&mut self) {
        self.interval.tick().await;
        let delay = jitter(self.max_jitter);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}
