//! Clock reads and display-time prediction.
//!
//! `XrTime` values are nanoseconds of the monotonic clock, so converting to and
//! from a `timespec` only splits or joins seconds and nanoseconds.

use std::thread;
use std::time::Duration;

use crate::error::XrError;
use crate::types::Result;

const NANOS_PER_SECOND: i64 = 1_000_000_000;

#[cfg(unix)]
pub use rustix::time::Timespec;

/// Mirror of the platform `timespec` on targets without rustix.
#[cfg(not(unix))]
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Timespec {
    pub tv_sec: i64,
    pub tv_nsec: i64,
}

/// Current monotonic clock reading in nanoseconds.
#[cfg(unix)]
pub fn now() -> i64 {
    let ts = rustix::time::clock_gettime(rustix::time::ClockId::Monotonic);
    (ts.tv_sec as i64)
        .saturating_mul(NANOS_PER_SECOND)
        .saturating_add(ts.tv_nsec as i64)
}

#[cfg(not(unix))]
pub fn now() -> i64 {
    use std::sync::OnceLock;
    use std::time::Instant;

    static EPOCH: OnceLock<Instant> = OnceLock::new();
    let nanos = EPOCH.get_or_init(Instant::now).elapsed().as_nanos();
    i64::try_from(nanos).unwrap_or(i64::MAX)
}

pub fn time_to_timespec(time: i64) -> Result<Timespec> {
    if time < 0 {
        return Err(XrError::TimeInvalid(time));
    }
    Ok(Timespec {
        tv_sec: (time / NANOS_PER_SECOND) as _,
        tv_nsec: (time % NANOS_PER_SECOND) as _,
    })
}

pub fn timespec_to_time(ts: &Timespec) -> Result<i64> {
    let seconds = ts.tv_sec as i64;
    let nanos = ts.tv_nsec as i64;
    if seconds < 0 || !(0..NANOS_PER_SECOND).contains(&nanos) {
        return Err(XrError::TimeInvalid(seconds));
    }
    seconds
        .checked_mul(NANOS_PER_SECOND)
        .and_then(|time| time.checked_add(nanos))
        .ok_or(XrError::TimeInvalid(seconds))
}

/// Predicts display times aligned to a fixed refresh period.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameTimer {
    period: i64,
    /// Offset from the period boundary at which a waiting frame is released.
    /// Starts at `-period` so the first wait returns immediately.
    phase: i64,
    next: i64,
}

impl FrameTimer {
    pub fn new(period: i64) -> Self {
        let period = period.max(1);
        Self {
            period,
            phase: -period,
            next: 0,
        }
    }

    pub fn period(&self) -> i64 {
        self.period
    }

    /// Predicted display time of the frame most recently waited for.
    pub fn next(&self) -> i64 {
        self.next
    }

    /// Advances the prediction for a clock reading of `now` and returns how
    /// long the caller should sleep before the frame may start.
    pub fn advance(&mut self, now: i64) -> Duration {
        let boundary = now.div_euclid(self.period) * self.period;
        let mut next = if boundary < now {
            boundary + self.period
        } else {
            boundary
        };
        while now > next + self.phase {
            next += self.period;
        }
        // Keep the prediction monotonic even if the clock is read out of order.
        if next <= self.next {
            next = self.next + self.period;
        }
        self.next = next;
        Duration::from_nanos((next + self.phase - now).max(0) as u64)
    }

    /// Blocks until shortly before the next display time and returns it.
    pub fn wait_for_next_frame(&mut self) -> i64 {
        let delay = self.advance(now());
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        self.next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PERIOD: i64 = 16_666_666;

    #[test]
    fn first_wait_on_a_boundary_returns_immediately() {
        let mut timer = FrameTimer::new(PERIOD);
        assert_eq!(timer.advance(PERIOD * 10), Duration::ZERO);
        assert_eq!(timer.next(), PERIOD * 11);
    }

    #[test]
    fn first_wait_sleeps_until_the_phase_aligned_boundary() {
        let mut timer = FrameTimer::new(PERIOD);
        let delay = timer.advance(PERIOD * 10 + 5);
        // Released one period ahead of the predicted display time.
        assert_eq!(timer.next(), PERIOD * 12);
        assert_eq!(delay, Duration::from_nanos((PERIOD - 5) as u64));

        let delay = timer.advance(PERIOD * 11 + 100);
        assert_eq!(timer.next(), PERIOD * 13);
        assert_eq!(delay, Duration::from_nanos((PERIOD - 100) as u64));
    }

    #[test]
    fn predictions_land_on_period_boundaries() {
        let mut timer = FrameTimer::new(PERIOD);
        let mut now = 1_000_000_000;
        for _ in 0..5 {
            let delay = timer.advance(now);
            assert_eq!(timer.next() % PERIOD, 0);
            assert_eq!(timer.next() + timer.phase, now + delay.as_nanos() as i64);
            now += delay.as_nanos() as i64 + 1_000;
        }
    }

    #[test]
    fn missed_frames_are_skipped_and_next_stays_monotonic() {
        let mut timer = FrameTimer::new(PERIOD);
        let mut previous = 0;
        for now in [PERIOD, PERIOD * 5 + 3, PERIOD * 5 + 4, PERIOD * 40] {
            timer.advance(now);
            assert!(timer.next() > previous);
            previous = timer.next();
        }
        assert!(timer.next() >= PERIOD * 40);
    }

    #[test]
    fn wait_for_next_frame_reports_the_prediction() {
        let mut timer = FrameTimer::new(1_000_000);
        let first = timer.wait_for_next_frame();
        let second = timer.wait_for_next_frame();
        assert!(second > first);
        assert_eq!(second % 1_000_000, 0);
    }

    #[test]
    fn timespec_round_trips() {
        for time in [0, 1, 999_999_999, 1_000_000_000, 1_234_567_890_123, i64::MAX] {
            let ts = time_to_timespec(time).unwrap();
            assert_eq!(timespec_to_time(&ts).unwrap(), time);
        }
    }

    #[test]
    fn invalid_times_are_rejected() {
        assert!(time_to_timespec(-1).is_err());
        let ts = Timespec {
            tv_sec: 1,
            tv_nsec: NANOS_PER_SECOND as _,
        };
        assert!(timespec_to_time(&ts).is_err());
    }

    #[test]
    fn clock_is_monotonic() {
        let a = now();
        let b = now();
        assert!(b >= a);
        assert!(a > 0);
    }
}
