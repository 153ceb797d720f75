use rand::Rng;
use std::time::Duration;

use super::Context;
use crate::config::Config;

/// One detection loop.
///
/// The scheduler owns the wait between ticks; a detector only decides what
/// one tick does.
pub trait Detector: Send {
    /// Short name used for the thread name and log lines.
    fn name(&self) -> &'static str;

    /// Base interval between ticks, before rate scaling and jitter.
    fn delay(&self, ctx: &Context) -> Duration;

    /// The loop is switched on in `config`.
    fn enabled(&self, _config: &Config) -> bool {
        true
    }

    /// Capture, classify and act once. Returns an extra rest to take before
    /// the next regular wait.
    fn tick(&mut self, ctx: &Context) -> Option<Duration>;

    /// Called instead of `tick` while idle or disabled.
    fn suspend(&mut self) {}
}

/// Scale `base` by the global capture rate and apply random jitter.
pub fn interval(base: Duration, rate_percent: u32, jitter_percent: u32) -> Duration {
    let scaled = base.mul_f64(100.0 / rate_percent.max(1) as f64);
    if jitter_percent == 0 {
        return scaled;
    }

    let jitter = jitter_percent.min(99) as f64 / 100.0;
    let factor = rand::thread_rng().gen_range(1.0 - jitter..=1.0 + jitter);
    scaled.mul_f64(factor)
}

/// Drive `detector` until shutdown.
pub fn run(mut detector: Box<dyn Detector>, ctx: Context) {
    let name = detector.name();
    tracing::debug!("[{}] loop started", name);

    loop {
        let (rate, jitter, enabled) = {
            let config = ctx.config.read();
            (
                config.capture_rate_percent,
                config.poll_jitter_percent,
                detector.enabled(&config),
            )
        };

        if !ctx.sleep(interval(detector.delay(&ctx), rate, jitter)) {
            break;
        }

        if ctx.is_idle() || !enabled {
            detector.suspend();
            continue;
        }

        if let Some(rest) = detector.tick(&ctx) {
            tracing::trace!("[{}] resting {:?}", name, rest);
            if !ctx.sleep(rest) {
                break;
            }
        }
    }

    tracing::debug!("[{}] loop stopped", name);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_scales_with_rate() {
        let base = Duration::from_secs(1);
        assert_eq!(interval(base, 100, 0), base);
        assert_eq!(interval(base, 200, 0), Duration::from_millis(500));
        assert_eq!(interval(base, 50, 0), Duration::from_secs(2));
    }

    #[test]
    fn test_interval_jitter_bounds() {
        let base = Duration::from_secs(1);
        for _ in 0..100 {
            let d = interval(base, 100, 10);
            assert!(d >= Duration::from_millis(899) && d <= Duration::from_millis(1101));
        }
    }

    #[test]
    fn test_zero_rate_does_not_divide_by_zero() {
        assert_eq!(interval(Duration::from_millis(10), 0, 0), Duration::from_secs(1));
    }
}
