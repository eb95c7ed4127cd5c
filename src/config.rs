//! Configuration types for multibench.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::affinity::{BindMemory, BindingMechanism};
use crate::cpuset::{parse_affinity_list, CoreAffinityGroup};
use crate::error::Result;
use crate::sampler::DEFAULT_MAX_EXPONENT;

/// Configuration for a benchmark run.
///
/// This struct can be deserialized from TOML, YAML, JSON, or environment variables
/// using figment.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MultibenchConfig {
    /// Command used to bind jobs to their cores (default: numactl)
    #[serde(default)]
    pub affinity_cmd: BindingMechanism,

    /// Whether to bind job memory to the local node (default: auto)
    #[serde(default)]
    pub bind_mem: BindMemory,

    /// One comma-separated cpu list per job, e.g. `["0,1", "2,3"]`
    #[serde(default)]
    pub cpu_affinity_list: Vec<String>,

    /// GPU devices used by the single job
    #[serde(default)]
    pub gpu_list: Vec<String>,

    /// Program filling the cores not used by the timed job
    #[serde(default)]
    pub dummy_program: Option<String>,

    /// Program timing a single problem
    #[serde(default)]
    pub timing_program: Option<String>,

    /// Environment variable telling jobs how many threads to use
    #[serde(default)]
    pub nthreads_env_name: Option<String>,

    /// Seconds to wait before starting the next job (default: 10)
    #[serde(default = "default_wait_time")]
    pub wait_time: u64,

    /// File with one problem per line
    #[serde(default)]
    pub input_file: Option<PathBuf>,

    /// File collecting the timing program's output
    #[serde(default)]
    pub output_file: Option<PathBuf>,

    /// Option naming the problem, without leading dashes (default: "problem")
    #[serde(default = "default_problem_argstring")]
    pub problem_argstring: String,

    /// Calibration and measurement parameters
    #[serde(default)]
    pub timing: TimingConfig,
}

fn default_wait_time() -> u64 {
    10
}

fn default_problem_argstring() -> String {
    "problem".to_string()
}

impl Default for MultibenchConfig {
    fn default() -> Self {
        Self {
            affinity_cmd: BindingMechanism::default(),
            bind_mem: BindMemory::default(),
            cpu_affinity_list: Vec::new(),
            gpu_list: Vec::new(),
            dummy_program: None,
            timing_program: None,
            nthreads_env_name: None,
            wait_time: default_wait_time(),
            input_file: None,
            output_file: None,
            problem_argstring: default_problem_argstring(),
            timing: TimingConfig::default(),
        }
    }
}

impl MultibenchConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// The option passed to dummy and timing programs to select a problem,
    /// e.g. `--problem`.
    pub fn problem_flag(&self) -> String {
        format!("--{}", self.problem_argstring)
    }

    /// Parse the configured affinity groups.
    ///
    /// # Errors
    ///
    /// Returns `MultibenchError::InvalidAffinityGroup` for the first group
    /// that cannot be parsed.
    pub fn affinity_groups(&self) -> Result<Vec<CoreAffinityGroup>> {
        parse_affinity_list(self.cpu_affinity_list.as_slice())
    }
}

/// Parameters of the timing loop.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct TimingConfig {
    /// Minimum seconds per timing run (default: 1.0)
    #[serde(default = "default_min_seconds")]
    pub min_seconds: f64,

    /// Number of timing runs (default: 8)
    #[serde(default = "default_repeats")]
    pub repeats: usize,

    /// Largest power of ten tried during calibration (default: 9)
    #[serde(default = "default_max_exponent")]
    pub max_exponent: u32,
}

fn default_min_seconds() -> f64 {
    1.0
}

fn default_repeats() -> usize {
    8
}

fn default_max_exponent() -> u32 {
    DEFAULT_MAX_EXPONENT
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            min_seconds: default_min_seconds(),
            repeats: default_repeats(),
            max_exponent: default_max_exponent(),
        }
    }
}
