//! Blocking delay backed by the OS scheduler.

use std::thread;
use std::time::Duration;

use embedded_hal::delay::DelayNs;

/// [`DelayNs`] implementation using [`std::thread::sleep`].
///
/// Sleeps for at least the requested time, never less.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdDelay;

impl DelayNs for StdDelay {
    fn delay_ns(&mut self, ns: u32) {
        thread::sleep(Duration::from_nanos(u64::from(ns)));
    }

    fn delay_us(&mut self, us: u32) {
        thread::sleep(Duration::from_micros(u64::from(us)));
    }

    fn delay_ms(&mut self, ms: u32) {
        thread::sleep(Duration::from_millis(u64::from(ms)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn never_returns_early() {
        let mut delay = StdDelay;
        let start = Instant::now();
        delay.delay_us(100);
        assert!(start.elapsed() >= Duration::from_micros(100));

        let start = Instant::now();
        delay.delay_ms(2);
        assert!(start.elapsed() >= Duration::from_millis(2));
    }
}
