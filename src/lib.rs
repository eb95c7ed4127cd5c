//! # multibench
//!
//! **Benchmarking on a busy machine**
//!
//! Tools for benchmarking parallel numerical codes on shared multi-socket
//! hosts. The problem under test runs pinned to its own cores while dummy
//! jobs keep the remaining cores busy, so the numbers reflect a loaded
//! machine rather than an idle one.
//!
//! ## Features
//!
//! - **Affinity Policy**: Choose `numactl` or `taskset` and node-local memory binding; illegal
//!   combinations are rejected when the policy is built
//! - **Topology Validation**: One affinity group per job, equal thread counts, GPU runs limited
//!   to a single job
//! - **Binding Commands**: One function renders every job's launch prefix
//! - **Adaptive Sampling**: Find the power-of-ten repetition count that fills a time budget
//! - **Problem Lifecycle**: Timed setup, then repeatable timed execution
//! - **Flexible Configuration**: Configure via files (TOML/YAML/JSON), environment variables, or code
//! - **CLI Integration**: clap argument groups using the `--mbench-*` options
//!
//! ## Quick Start
//!
//! ```
//! use multibench::{HostCapabilities, MultibenchBuilder};
//!
//! let plan = MultibenchBuilder::new()
//!     .cpu_affinity_list(["0,1", "2,3"])
//!     .dummy_program("./dummy")
//!     .build_with_capabilities(HostCapabilities::new(true, true))?;
//!
//! assert_eq!(plan.threads_per_job(), 2);
//! assert_eq!(plan.binding_commands()[0], ["numactl", "-C", "0,1", "-l", "--"]);
//! # Ok::<(), multibench::MultibenchError>(())
//! ```
//!
//! Use [`MultibenchBuilder::build`] instead to probe the current host for
//! `numactl` and `taskset`.
//!
//! ## Timing a Problem
//!
//! ```ignore
//! use multibench::{BenchProblem, Problem};
//!
//! let mut bench = BenchProblem::new(MyFft::new(4096));
//! bench.setup()?;
//! let n = bench.determine_required_repetitions(1.0)?;
//! let runs = bench.repeat(8, n)?;
//! ```
//!
//! ## Configuration
//!
//! Configuration sources are merged in order (later sources override earlier):
//!
//! 1. Default values
//! 2. Config files (via `.file()`)
//! 3. Environment variables (via `.env_prefix()`)
//! 4. Programmatic overrides
//! 5. CLI arguments (via `.with_cli_args()`, `.with_io_args()`, `.with_timing_args()`)
//!
//! ### Config File Example (TOML)
//!
//! ```toml
//! affinity_cmd = "numactl"
//! bind_mem = "auto"
//! cpu_affinity_list = ["0-3", "4-7"]
//! dummy_program = "./dummy"
//! nthreads_env_name = "OMP_NUM_THREADS"
//!
//! [timing]
//! min_seconds = 1.0
//! repeats = 8
//! ```
//!
//! ### Environment Variables
//!
//! With `.env_prefix("MULTIBENCH")`:
//! - `MULTIBENCH_AFFINITY_CMD=taskset`
//! - `MULTIBENCH_BIND_MEM=disabled`
//! - `MULTIBENCH_TIMING__MIN_SECONDS=0.5`
//!
//! ## Affinity Group Format
//!
//! Each group is a comma-separated cpu list passed verbatim to
//! `numactl -C` or `taskset -c`. The number of entries is the job's thread
//! count, so `"0,1,2,3"` gives four threads while `"0-3"` gives one.

pub mod affinity;
pub mod builder;
pub mod config;
pub mod cpuset;
pub mod error;
pub mod format;
pub mod plan;
pub mod problem;
pub mod sampler;
pub mod topology;

pub use affinity::{
    binding_command, AffinityBinder, AffinityPolicy, BindMemory, BindingMechanism,
    HostCapabilities,
};
pub use builder::{MultibenchArgs, MultibenchBuilder, MultibenchIoArgs, MultibenchTimingArgs};
pub use config::{MultibenchConfig, TimingConfig};
pub use cpuset::CoreAffinityGroup;
pub use error::{MultibenchError, Result};
pub use format::format_time_strings;
pub use plan::BenchPlan;
pub use problem::{BenchProblem, Problem, TimingReport};
pub use sampler::{find_repetition_count, AdaptiveSampler, SampleSearchResult};
pub use topology::{validate_core_affinity_list, validate_gpu_usage, JobTopology};
