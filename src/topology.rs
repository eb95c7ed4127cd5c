//! Validation of the job layout implied by an affinity list.
//!
//! Each affinity group is one job; the size of a group is that job's thread
//! count. All jobs must get the same number of threads, and GPU runs are
//! limited to a single job.

use crate::cpuset::CoreAffinityGroup;
use crate::error::{MultibenchError, Result};
use tracing::debug;

/// Check an affinity list and return the number of threads per job.
///
/// # Errors
///
/// - `MultibenchError::EmptyAffinityList` if `groups` is empty.
/// - `MultibenchError::InconsistentGroupSize` for the first group whose size
///   differs from the first group's.
///
/// # Examples
///
/// ```
/// use multibench::cpuset::parse_affinity_list;
/// use multibench::topology::validate_core_affinity_list;
///
/// let groups = parse_affinity_list(&["0,1", "2,3"]).unwrap();
/// assert_eq!(validate_core_affinity_list(&groups).unwrap(), 2);
/// ```
pub fn validate_core_affinity_list(groups: &[CoreAffinityGroup]) -> Result<usize> {
    let first = groups.first().ok_or(MultibenchError::EmptyAffinityList)?;
    let expected = first.len();

    for (index, group) in groups.iter().enumerate().skip(1) {
        if group.len() != expected {
            return Err(MultibenchError::InconsistentGroupSize {
                index,
                group: group.cpu_list(),
                expected,
                found: group.len(),
            });
        }
    }

    Ok(expected)
}

/// Decide whether the run uses GPUs.
///
/// Returns `false` when `gpus` is empty.
///
/// # Errors
///
/// Returns `MultibenchError::IncompatibleGpuTopology` when GPUs are given
/// and the affinity list does not hold exactly one group.
pub fn validate_gpu_usage<S: AsRef<str>>(
    gpus: &[S],
    groups: &[CoreAffinityGroup],
) -> Result<bool> {
    if gpus.is_empty() {
        return Ok(false);
    }
    if groups.len() != 1 {
        return Err(MultibenchError::IncompatibleGpuTopology {
            gpus: gpus.iter().map(|gpu| gpu.as_ref().to_string()).collect(),
            groups: groups.len(),
        });
    }
    Ok(true)
}

/// Jobs and threads derived from a validated affinity list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobTopology {
    /// Number of jobs, one per affinity group.
    pub jobs: usize,
    /// Threads given to every job.
    pub threads_per_job: usize,
    /// Whether the single job drives GPUs.
    pub uses_gpus: bool,
}

impl JobTopology {
    /// Validate `groups` and `gpus` together and derive the topology.
    ///
    /// # Errors
    ///
    /// Any error from [`validate_core_affinity_list`] or [`validate_gpu_usage`].
    pub fn derive<S: AsRef<str>>(groups: &[CoreAffinityGroup], gpus: &[S]) -> Result<Self> {
        let threads_per_job = validate_core_affinity_list(groups)?;
        let uses_gpus = validate_gpu_usage(gpus, groups)?;
        let topology = Self {
            jobs: groups.len(),
            threads_per_job,
            uses_gpus,
        };
        debug!(?topology, "derived job topology");
        Ok(topology)
    }
}
