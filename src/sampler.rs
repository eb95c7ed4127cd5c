//! Adaptive repetition-count search.
//!
//! Before timing an operation we need to know how many back-to-back calls
//! make a measurement long enough to rise above timer resolution and noise.
//! The sampler tries `10, 100, 1000, ...` calls in turn and stops at the
//! first count whose wall-clock time exceeds the target.
//!
//! Stepping one decade at a time means the chosen count can overshoot the
//! minimum by up to 10x; in exchange the trial points are fixed and the
//! search never fails. If no trial reaches the target, the largest count
//! tried is returned.
//!
//! # Example
//!
//! ```
//! use multibench::sampler::find_repetition_count;
//!
//! let mut acc = 0u64;
//! let result = find_repetition_count(|| acc = acc.wrapping_add(1), 0.0, 9);
//! assert_eq!(result.repetitions, 10);
//! ```

use std::time::{Duration, Instant};
use tracing::debug;

/// Default largest exponent tried: up to `10^9` calls.
pub const DEFAULT_MAX_EXPONENT: u32 = 9;

/// Largest exponent whose power of ten fits in a `u64`.
pub const MAX_EXPONENT_LIMIT: u32 = 19;

/// Source of monotonic timestamps for the sampler.
///
/// Timestamps are durations since an arbitrary, fixed origin.
pub trait Clock {
    /// Time elapsed since the clock's origin.
    fn now(&self) -> Duration;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Duration {
        (**self).now()
    }
}

/// Wall-clock time from [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    /// Create a clock whose origin is now.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Outcome of a repetition-count search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleSearchResult {
    /// Chosen number of back-to-back calls, a power of ten.
    pub repetitions: u64,
    /// Time the final trial took. Zero when no trial was run.
    pub elapsed: Duration,
    /// True when no trial exceeded the target and the largest count was returned.
    pub exhausted: bool,
}

impl SampleSearchResult {
    /// Average seconds per call in the final trial.
    pub fn per_call_seconds(&self) -> f64 {
        self.elapsed.as_secs_f64() / self.repetitions as f64
    }
}

/// Finds how many calls of an operation are needed to fill a time budget.
///
/// # Examples
///
/// ```
/// use multibench::sampler::AdaptiveSampler;
///
/// let sampler = AdaptiveSampler::new().max_exponent(3);
/// let result = sampler.find_repetition_count(|| { std::hint::black_box(1 + 1); }, 60.0);
/// assert_eq!(result.repetitions, 1000);
/// assert!(result.exhausted);
/// ```
#[derive(Debug, Clone)]
pub struct AdaptiveSampler<C = MonotonicClock> {
    clock: C,
    max_exponent: u32,
}

impl AdaptiveSampler {
    /// Create a sampler timing with the wall clock.
    pub fn new() -> Self {
        Self::with_clock(MonotonicClock::new())
    }
}

impl Default for AdaptiveSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> AdaptiveSampler<C> {
    /// Create a sampler reading time from `clock`.
    pub fn with_clock(clock: C) -> Self {
        Self {
            clock,
            max_exponent: DEFAULT_MAX_EXPONENT,
        }
    }

    /// Set the largest exponent tried.
    ///
    /// Values are clamped to `1..=MAX_EXPONENT_LIMIT`.
    pub fn max_exponent(mut self, max_exponent: u32) -> Self {
        self.max_exponent = max_exponent.clamp(1, MAX_EXPONENT_LIMIT);
        self
    }

    /// The largest exponent tried.
    pub fn max_exponent_value(&self) -> u32 {
        self.max_exponent
    }

    /// Find the smallest power of ten `n` such that `n` calls of `op` take
    /// longer than `min_seconds`.
    ///
    /// A non-positive (or NaN) `min_seconds` returns `n = 10` without calling
    /// `op`.
    pub fn find_repetition_count<F>(&self, mut op: F, min_seconds: f64) -> SampleSearchResult
    where
        F: FnMut(),
    {
        match self.try_find_repetition_count(
            || {
                op();
                Ok::<(), std::convert::Infallible>(())
            },
            min_seconds,
        ) {
            Ok(result) => result,
            Err(never) => match never {},
        }
    }

    /// Like [`find_repetition_count`](Self::find_repetition_count) for an
    /// operation that can fail.
    ///
    /// # Errors
    ///
    /// The first error returned by `op` aborts the search and is returned
    /// as is.
    pub fn try_find_repetition_count<F, E>(
        &self,
        mut op: F,
        min_seconds: f64,
    ) -> Result<SampleSearchResult, E>
    where
        F: FnMut() -> Result<(), E>,
    {
        // Also catches NaN.
        if !(min_seconds > 0.0) {
            debug!(min_seconds, "non-positive target, skipping calibration");
            return Ok(SampleSearchResult {
                repetitions: 10,
                elapsed: Duration::ZERO,
                exhausted: false,
            });
        }

        let mut last = SampleSearchResult {
            repetitions: 10,
            elapsed: Duration::ZERO,
            exhausted: true,
        };

        for exponent in 1..=self.max_exponent {
            let repetitions = 10u64.pow(exponent);
            let elapsed = self.time_calls(&mut op, repetitions)?;
            debug!(
                repetitions,
                elapsed_s = elapsed.as_secs_f64(),
                min_seconds,
                "calibration trial"
            );

            last = SampleSearchResult {
                repetitions,
                elapsed,
                exhausted: true,
            };
            if elapsed.as_secs_f64() > min_seconds {
                last.exhausted = false;
                break;
            }
        }

        debug!(
            repetitions = last.repetitions,
            exhausted = last.exhausted,
            "calibration finished"
        );
        Ok(last)
    }

    /// Time `repetitions` back-to-back calls of `op`.
    fn time_calls<F, E>(&self, op: &mut F, repetitions: u64) -> Result<Duration, E>
    where
        F: FnMut() -> Result<(), E>,
    {
        let start = self.clock.now();
        for _ in 0..repetitions {
            op()?;
        }
        Ok(self.clock.now().saturating_sub(start))
    }
}

/// Find a repetition count for `op` using the wall clock.
///
/// See [`AdaptiveSampler::find_repetition_count`].
pub fn find_repetition_count<F>(op: F, min_seconds: f64, max_exponent: u32) -> SampleSearchResult
where
    F: FnMut(),
{
    AdaptiveSampler::new()
        .max_exponent(max_exponent)
        .find_repetition_count(op, min_seconds)
}
