//! Error types for multibench.

use crate::affinity::BindingMechanism;
use thiserror::Error;

/// Errors raised while configuring affinity or validating a benchmark topology.
///
/// Every variant is a configuration mistake: none of them are retried and all
/// are reported before any job is launched.
#[derive(Debug, Error)]
pub enum MultibenchError {
    /// The requested binding mechanism was not runnable when the host was probed.
    #[error("binding mechanism '{0}' is not available on this host (not found on PATH)")]
    UnavailableMechanism(BindingMechanism),

    /// Neither numactl nor taskset could be run on this host.
    #[error("need at least one of numactl or taskset on PATH")]
    NoMechanismAvailable,

    /// Memory binding was requested with a mechanism that cannot bind memory.
    #[error("binding mechanism '{mechanism}' does not support memory binding")]
    UnsupportedCombination {
        /// The mechanism that was requested
        mechanism: BindingMechanism,
    },

    /// Unknown binding mechanism token.
    #[error("unknown binding mechanism '{0}' (expected 'numactl' or 'taskset')")]
    UnknownMechanism(String),

    /// Unknown memory binding token.
    #[error("invalid bind-memory value '{0}' (expected 'None', 'True' or 'False')")]
    InvalidBindMemory(String),

    /// An affinity group string could not be parsed.
    #[error("invalid cpu affinity group '{0}'")]
    InvalidAffinityGroup(String),

    /// No affinity groups were given.
    #[error("at least one cpu affinity group is required")]
    EmptyAffinityList,

    /// An affinity group has a different number of cores than the first one.
    #[error(
        "cpu affinity group {index} ('{group}') lists {found} cpus but every group must list {expected}"
    )]
    InconsistentGroupSize {
        /// Position of the offending group in the list
        index: usize,
        /// The offending group, rendered as a cpu list
        group: String,
        /// Cardinality of the first group
        expected: usize,
        /// Cardinality of the offending group
        found: usize,
    },

    /// GPUs were requested together with more than one job.
    #[error("gpu list {gpus:?} requires exactly one cpu affinity group, got {groups}")]
    IncompatibleGpuTopology {
        /// The requested GPU devices
        gpus: Vec<String>,
        /// Number of affinity groups given
        groups: usize,
    },

    /// More than one job was requested without a dummy program to run in them.
    #[error("{jobs} jobs requested but no dummy program was given")]
    MissingDummyProgram {
        /// Number of jobs implied by the affinity list
        jobs: usize,
    },

    /// Error extracting configuration from figment.
    #[error("configuration error: {0}")]
    Config(#[from] Box<figment::Error>),
}

/// Result type alias for multibench operations.
pub type Result<T> = std::result::Result<T, MultibenchError>;
