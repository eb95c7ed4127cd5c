//! Benchmark problems and their setup/execute lifecycle.
//!
//! A problem is built by the caller, set up once (timed), and then executed
//! as many times as the sampler and the measurement loop need.
//!
//! ```
//! use multibench::problem::{BenchProblem, Problem};
//! use multibench::config::TimingConfig;
//! use std::convert::Infallible;
//!
//! struct Sum {
//!     data: Vec<u64>,
//! }
//!
//! impl Problem for Sum {
//!     type Error = Infallible;
//!
//!     fn setup(&mut self) -> Result<(), Infallible> {
//!         self.data = (0..1024).collect();
//!         Ok(())
//!     }
//!
//!     fn execute(&mut self) -> Result<(), Infallible> {
//!         std::hint::black_box(self.data.iter().sum::<u64>());
//!         Ok(())
//!     }
//! }
//!
//! let mut bench = BenchProblem::new(Sum { data: Vec::new() });
//! let timing = TimingConfig { min_seconds: 0.0, repeats: 3, ..TimingConfig::default() };
//! let report = bench.run(&timing).unwrap();
//! assert_eq!(report.repetitions, 10);
//! assert_eq!(report.runs.len(), 3);
//! ```

use crate::config::TimingConfig;
use crate::sampler::{AdaptiveSampler, Clock, SampleSearchResult};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// A concrete problem to benchmark.
///
/// `execute` must be safe to call any number of times after `setup` without
/// another `setup` and without cumulative effects that would skew later
/// timings.
pub trait Problem {
    /// Error raised by setup or execution.
    type Error;

    /// One-time initialization, timed by [`BenchProblem::setup`].
    fn setup(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    /// The repeatable unit of work being measured.
    fn execute(&mut self) -> Result<(), Self::Error>;
}

/// Drives a [`Problem`] through setup and timed execution.
#[derive(Debug)]
pub struct BenchProblem<P> {
    problem: P,
    setup_time: Option<Duration>,
}

impl<P: Problem> BenchProblem<P> {
    /// Wrap a constructed problem.
    pub fn new(problem: P) -> Self {
        Self {
            problem,
            setup_time: None,
        }
    }

    /// Run the problem's setup hook and record how long it took.
    ///
    /// Calling this again reruns the hook and overwrites the recorded time.
    ///
    /// # Errors
    ///
    /// Whatever the setup hook returns. The recorded time is left untouched.
    pub fn setup(&mut self) -> Result<Duration, P::Error> {
        let start = Instant::now();
        self.problem.setup()?;
        let elapsed = start.elapsed();
        self.setup_time = Some(elapsed);
        debug!(setup_s = elapsed.as_secs_f64(), "problem setup finished");
        Ok(elapsed)
    }

    /// Time taken by the last successful [`setup`](Self::setup).
    pub fn setup_time(&self) -> Option<Duration> {
        self.setup_time
    }

    /// Run one unit of work.
    ///
    /// # Errors
    ///
    /// Whatever the problem's `execute` returns.
    pub fn execute(&mut self) -> Result<(), P::Error> {
        self.problem.execute()
    }

    /// Number of `execute` calls needed to take longer than `min_seconds`.
    ///
    /// Uses the wall clock and tries up to `10^9` calls.
    ///
    /// # Errors
    ///
    /// The first error from `execute` aborts the search.
    pub fn determine_required_repetitions(&mut self, min_seconds: f64) -> Result<u64, P::Error> {
        let sampler = AdaptiveSampler::new();
        self.determine_required_repetitions_with(&sampler, min_seconds)
            .map(|result| result.repetitions)
    }

    /// Like [`determine_required_repetitions`](Self::determine_required_repetitions)
    /// with a caller-supplied sampler, returning the full search result.
    ///
    /// # Errors
    ///
    /// The first error from `execute` aborts the search.
    pub fn determine_required_repetitions_with<C: Clock>(
        &mut self,
        sampler: &AdaptiveSampler<C>,
        min_seconds: f64,
    ) -> Result<SampleSearchResult, P::Error> {
        let problem = &mut self.problem;
        sampler.try_find_repetition_count(|| problem.execute(), min_seconds)
    }

    /// Time `repeats` runs of `number` back-to-back executions each.
    ///
    /// # Errors
    ///
    /// The first error from `execute` aborts the measurement.
    pub fn repeat(&mut self, repeats: usize, number: u64) -> Result<Vec<Duration>, P::Error> {
        let mut runs = Vec::with_capacity(repeats);
        for _ in 0..repeats {
            let start = Instant::now();
            for _ in 0..number {
                self.problem.execute()?;
            }
            runs.push(start.elapsed());
        }
        Ok(runs)
    }

    /// Set up (if not done yet), calibrate and measure.
    ///
    /// # Errors
    ///
    /// The first error from setup or execution.
    pub fn run(&mut self, timing: &TimingConfig) -> Result<TimingReport, P::Error> {
        let setup_time = match self.setup_time {
            Some(time) => time,
            None => self.setup()?,
        };

        let sampler = AdaptiveSampler::new().max_exponent(timing.max_exponent);
        let search = self.determine_required_repetitions_with(&sampler, timing.min_seconds)?;
        let runs = self.repeat(timing.repeats, search.repetitions)?;

        let report = TimingReport {
            setup_time,
            repetitions: search.repetitions,
            runs,
        };
        info!(
            setup_s = setup_time.as_secs_f64(),
            repetitions = report.repetitions,
            repeats = report.runs.len(),
            best_per_call_s = report.best_per_call_seconds(),
            "problem measured"
        );
        Ok(report)
    }

    /// The wrapped problem.
    pub fn problem(&self) -> &P {
        &self.problem
    }

    /// Unwrap the problem.
    pub fn into_inner(self) -> P {
        self.problem
    }
}

/// Measurements of one problem.
#[derive(Debug, Clone, PartialEq)]
pub struct TimingReport {
    /// Time taken by setup.
    pub setup_time: Duration,
    /// Executions per run.
    pub repetitions: u64,
    /// Wall time of each run.
    pub runs: Vec<Duration>,
}

impl TimingReport {
    /// Seconds per execution for every run.
    pub fn per_call_seconds(&self) -> Vec<f64> {
        self.runs
            .iter()
            .map(|run| run.as_secs_f64() / self.repetitions as f64)
            .collect()
    }

    /// Seconds per execution of the fastest run, or `None` without runs.
    pub fn best_per_call_seconds(&self) -> Option<f64> {
        self.runs
            .iter()
            .min()
            .map(|run| run.as_secs_f64() / self.repetitions as f64)
    }
}
