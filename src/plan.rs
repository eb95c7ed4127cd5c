//! Validated benchmark plans.
//!
//! A [`BenchPlan`] is what the builder hands to a job launcher: the checked
//! affinity policy, one affinity group per job, and the command prefix that
//! pins each job. Launchers append the dummy or timing program to these
//! prefixes; they never assemble binding commands themselves.

use crate::affinity::{AffinityBinder, AffinityPolicy};
use crate::config::{MultibenchConfig, TimingConfig};
use crate::cpuset::{available_cpus, unavailable_cpus, CoreAffinityGroup};
use crate::error::{MultibenchError, Result};
use crate::topology::JobTopology;

use std::time::Duration;
use tracing::{info, warn};

/// A validated benchmark layout.
#[derive(Debug, Clone)]
pub struct BenchPlan {
    config: MultibenchConfig,
    policy: AffinityPolicy,
    groups: Vec<CoreAffinityGroup>,
    topology: JobTopology,
}

impl BenchPlan {
    /// Validate `config` and configure `binder` from it.
    ///
    /// Numeric core IDs outside this process's affinity mask are reported
    /// with a warning but not rejected.
    ///
    /// # Errors
    ///
    /// - Any error from [`AffinityBinder::configure`].
    /// - `MultibenchError::InvalidAffinityGroup` for an unparsable group.
    /// - Any error from [`JobTopology::derive`].
    /// - `MultibenchError::MissingDummyProgram` when several jobs are
    ///   requested without a dummy program.
    pub fn from_config(config: MultibenchConfig, mut binder: AffinityBinder) -> Result<Self> {
        let policy = binder.configure(config.affinity_cmd, config.bind_mem.as_option())?;
        let groups = config.affinity_groups()?;
        let topology = JobTopology::derive(&groups, config.gpu_list.as_slice())?;

        if topology.jobs > 1 && config.dummy_program.is_none() {
            return Err(MultibenchError::MissingDummyProgram {
                jobs: topology.jobs,
            });
        }

        let available = available_cpus();
        if !available.is_empty() {
            let missing = unavailable_cpus(&groups, &available);
            if !missing.is_empty() {
                warn!(?missing, "affinity list names cpus outside this process's mask");
            }
        }

        info!(
            mechanism = %policy.mechanism(),
            bind_memory = policy.bind_memory(),
            jobs = topology.jobs,
            threads_per_job = topology.threads_per_job,
            uses_gpus = topology.uses_gpus,
            "benchmark plan ready"
        );

        Ok(Self {
            config,
            policy,
            groups,
            topology,
        })
    }

    /// The configuration the plan was built from.
    pub fn config(&self) -> &MultibenchConfig {
        &self.config
    }

    /// The affinity policy in force.
    pub fn policy(&self) -> AffinityPolicy {
        self.policy
    }

    /// One affinity group per job.
    pub fn groups(&self) -> &[CoreAffinityGroup] {
        &self.groups
    }

    /// Job count, threads per job and GPU use.
    pub fn topology(&self) -> JobTopology {
        self.topology
    }

    /// Number of jobs.
    pub fn jobs(&self) -> usize {
        self.topology.jobs
    }

    /// Threads given to every job.
    pub fn threads_per_job(&self) -> usize {
        self.topology.threads_per_job
    }

    /// Whether the single job drives GPUs.
    pub fn uses_gpus(&self) -> bool {
        self.topology.uses_gpus
    }

    /// Command prefix pinning job `job`, or `None` if there is no such job.
    pub fn binding_command(&self, job: usize) -> Option<Vec<String>> {
        self.groups
            .get(job)
            .map(|group| self.policy.binding_command(group))
    }

    /// Command prefixes for every job, in job order.
    pub fn binding_commands(&self) -> Vec<Vec<String>> {
        self.groups
            .iter()
            .map(|group| self.policy.binding_command(group))
            .collect()
    }

    /// Environment variable and value telling a job its thread count, if a
    /// variable name was configured.
    pub fn thread_env(&self) -> Option<(String, String)> {
        self.config
            .nthreads_env_name
            .as_ref()
            .map(|name| (name.clone(), self.topology.threads_per_job.to_string()))
    }

    /// Option selecting a problem in dummy and timing programs.
    pub fn problem_flag(&self) -> String {
        self.config.problem_flag()
    }

    /// Pause between starting jobs.
    pub fn wait_time(&self) -> Duration {
        Duration::from_secs(self.config.wait_time)
    }

    /// Timing loop parameters.
    pub fn timing(&self) -> TimingConfig {
        self.config.timing
    }
}
