//! Monotonic Clock
//!
//! Process-wide monotonic time with a millisecond view (`now`) and a
//! microsecond view (`profile`). Both are measured from clock creation.
//!
//! ## Sleep/Wake Recalibration
//!
//! A monotonic counter may stop while the machine sleeps, so it falls behind
//! the wall clock. `adjust_time()` compares how far the wall clock moved with
//! how far the counter moved since the previous adjustment and adds any whole
//! seconds of skew to an offset included in every reading:
//!
//! ```text
//! counter:   0 ──── 5s ─────────────────(sleep)─ 6s
//! wall:      0 ──── 5s ─────────────────(sleep)─ 66s
//! adjust():  skew = 60s → offset += 60s → now() = 66_000
//! ```
//!
//! The offset only grows, so readings never go backwards.
//!
//! ## Usage
//!
//! ```rust
//! use queue_actors::time;
//!
//! let start = time::now();
//! let later = time::now();
//! assert!(later >= start);
//! ```

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::OnceLock;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Milliseconds since clock creation
pub type Time = i64;

/// Microseconds since clock creation
pub type ProfileTime = i64;

/// Counter and wall-clock readings behind a [`Clock`]
pub trait TimeSource: Send + Sync + 'static {
    /// Monotonic time elapsed since the source was created
    fn elapsed(&self) -> Duration;

    /// Wall-clock seconds since the UNIX epoch
    fn unixtime(&self) -> i64;
}

/// Platform high-resolution counter plus the system wall clock
#[derive(Debug, Clone, Copy)]
pub struct SystemTimeSource {
    start: Instant,
}

impl SystemTimeSource {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for SystemTimeSource {
    fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    fn unixtime(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or_default()
    }
}

#[derive(Debug)]
struct Adjustment {
    time: Time,
    unixtime: i64,
}

/// Monotonic clock with sleep/wake recalibration
#[derive(Debug)]
pub struct Clock<S: TimeSource = SystemTimeSource> {
    source: S,
    /// Whole seconds added to every reading by `adjust`
    adjust_seconds: AtomicU32,
    last_adjustment: Mutex<Adjustment>,
}

static GLOBAL_CLOCK: OnceLock<Clock> = OnceLock::new();

impl Clock {
    /// Create a clock over the system counter, starting at zero now
    pub fn new() -> Self {
        Self::with_source(SystemTimeSource::new())
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: TimeSource> Clock<S> {
    pub fn with_source(source: S) -> Self {
        let unixtime = source.unixtime();
        Self {
            source,
            adjust_seconds: AtomicU32::new(0),
            last_adjustment: Mutex::new(Adjustment { time: 0, unixtime }),
        }
    }

    /// Milliseconds since creation, including recalibration offset.
    #[inline]
    pub fn now(&self) -> Time {
        let elapsed = saturating_i64(self.source.elapsed().as_millis());
        elapsed.saturating_add(self.offset_seconds() * 1_000)
    }

    /// Microseconds since creation, including recalibration offset.
    #[inline]
    pub fn profile(&self) -> ProfileTime {
        let elapsed = saturating_i64(self.source.elapsed().as_micros());
        elapsed.saturating_add(self.offset_seconds() * 1_000_000)
    }

    /// Recalibrate against the wall clock.
    ///
    /// Returns `true` if the offset was increased. Safe to call from any
    /// thread; concurrent callers are serialized.
    pub fn adjust(&self) -> bool {
        let mut last = self.last_adjustment.lock();

        let now = self.now();
        let delta = now - last.time;
        let unixtime = self.source.unixtime();
        let real = unixtime - last.unixtime;
        let seconds = (real * 1_000 - delta) / 1_000;

        last.time = now;
        last.unixtime = unixtime;

        if seconds <= 0 {
            return false;
        }

        let adjusted = self.adjust_seconds.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
            let next = i64::from(current) + seconds;
            u32::try_from(next).ok()
        });

        match adjusted {
            Ok(previous) => {
                tracing::debug!(
                    skew_secs = seconds,
                    total_offset_secs = i64::from(previous) + seconds,
                    "Monotonic clock recalibrated"
                );
                true
            }
            Err(current) => {
                tracing::warn!(
                    skew_secs = seconds,
                    current_offset_secs = current,
                    "Clock recalibration would overflow the offset, ignoring"
                );
                false
            }
        }
    }

    #[inline]
    fn offset_seconds(&self) -> i64 {
        i64::from(self.adjust_seconds.load(Ordering::SeqCst))
    }
}

fn saturating_i64(value: u128) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Initialize the process clock. Later calls are no-ops.
///
/// Readings from [`now`] and [`profile`] count from the first
/// initialization, which also happens lazily on first use.
pub fn init() {
    GLOBAL_CLOCK.get_or_init(Clock::new);
}

/// Process-wide milliseconds. Thread-safe.
#[inline]
pub fn now() -> Time {
    GLOBAL_CLOCK.get_or_init(Clock::new).now()
}

/// Process-wide microseconds for profiling. Thread-safe.
#[inline]
pub fn profile() -> ProfileTime {
    GLOBAL_CLOCK.get_or_init(Clock::new).profile()
}

/// Recalibrate the process clock; `true` if some adjustment was made.
pub fn adjust_time() -> bool {
    GLOBAL_CLOCK.get_or_init(Clock::new).adjust()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI64, AtomicU64};
    use std::sync::Arc;

    /// Source whose counter and wall clock are moved by hand
    #[derive(Clone, Default)]
    struct ManualSource {
        elapsed_ms: Arc<AtomicU64>,
        unixtime: Arc<AtomicI64>,
    }

    impl ManualSource {
        fn advance(&self, counter_ms: u64, wall_secs: i64) {
            self.elapsed_ms.fetch_add(counter_ms, Ordering::SeqCst);
            self.unixtime.fetch_add(wall_secs, Ordering::SeqCst);
        }
    }

    impl TimeSource for ManualSource {
        fn elapsed(&self) -> Duration {
            Duration::from_millis(self.elapsed_ms.load(Ordering::SeqCst))
        }

        fn unixtime(&self) -> i64 {
            self.unixtime.load(Ordering::SeqCst)
        }
    }

    fn manual_clock() -> (Clock<ManualSource>, ManualSource) {
        let source = ManualSource::default();
        source.unixtime.store(1_700_000_000, Ordering::SeqCst);
        (Clock::with_source(source.clone()), source)
    }

    #[test]
    fn test_global_clock_is_monotonic() {
        init();
        let mut previous = now();
        for _ in 0..1_000 {
            let current = now();
            assert!(current >= previous);
            previous = current;
        }
        let profiled = profile();
        let current = now();
        assert!(current * 1_000 > profiled - 1_000);
    }

    #[test]
    fn test_profile_resolution() {
        let (clock, source) = manual_clock();
        source.advance(1_500, 1);
        assert_eq!(clock.now(), 1_500);
        assert_eq!(clock.profile(), 1_500_000);
    }

    #[test]
    fn test_adjust_without_skew() {
        let (clock, source) = manual_clock();
        source.advance(5_000, 5);
        assert!(!clock.adjust());
        assert_eq!(clock.now(), 5_000);
    }

    #[test]
    fn test_adjust_after_sleep() {
        let (clock, source) = manual_clock();
        source.advance(5_000, 5);
        assert!(!clock.adjust());

        // Counter paused for a minute of wall time
        source.advance(1_000, 61);
        let before = clock.now();
        assert!(clock.adjust());

        let after = clock.now();
        assert_eq!(after, 6_000 + 60_000);
        assert!(after > before);
        assert_eq!(clock.profile(), 66_000_000);

        // Skew is consumed once
        source.advance(1_000, 1);
        assert!(!clock.adjust());
        assert_eq!(clock.now(), 67_000);
    }

    #[test]
    fn test_wall_clock_backwards_is_ignored() {
        let (clock, source) = manual_clock();
        source.advance(10_000, -3_600);
        assert!(!clock.adjust());
        assert_eq!(clock.now(), 10_000);
    }

    #[test]
    fn test_concurrent_adjust_applies_once() {
        let (clock, source) = manual_clock();
        let clock = Arc::new(clock);
        source.advance(0, 30);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let clock = Arc::clone(&clock);
                std::thread::spawn(move || clock.adjust())
            })
            .collect();
        let adjusted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|adjusted| *adjusted)
            .count();

        assert_eq!(adjusted, 1);
        assert_eq!(clock.now(), 30_000);
    }
}
