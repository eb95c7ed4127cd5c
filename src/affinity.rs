//! Binding mechanisms and the affinity policy.
//!
//! This module decides how a job is pinned to its cores: which OS command is
//! used (`numactl` or `taskset`) and whether the job's memory is also bound
//! to the local NUMA node. The legality of that combination is checked once,
//! when the policy is built, so a policy that binds memory through `taskset`
//! can never exist.

use crate::cpuset::CoreAffinityGroup;
use crate::error::{MultibenchError, Result};
use serde::{de, Deserialize, Deserializer, Serialize};
use std::fmt;
use std::process::{Command, Stdio};
use std::str::FromStr;
use std::sync::OnceLock;
use tracing::{debug, info, warn};

/// OS-level facility used to pin a job to its cores.
///
/// Deserializes through [`FromStr`], so config files and environment
/// variables accept the same spellings as the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum BindingMechanism {
    /// `numactl -C <cpus> [-l] --`: core binding plus optional local memory binding.
    #[default]
    Numactl,
    /// `taskset -c <cpus>`: core binding only.
    Taskset,
}

impl BindingMechanism {
    /// Name of the executable implementing the mechanism.
    pub fn program(self) -> &'static str {
        match self {
            BindingMechanism::Numactl => "numactl",
            BindingMechanism::Taskset => "taskset",
        }
    }

    /// Flag preceding the cpu list.
    fn core_flag(self) -> &'static str {
        match self {
            BindingMechanism::Numactl => "-C",
            BindingMechanism::Taskset => "-c",
        }
    }

    /// No-op invocation used to check the executable is runnable.
    fn probe_args(self) -> &'static [&'static str] {
        match self {
            BindingMechanism::Numactl => &["--hardware"],
            BindingMechanism::Taskset => &["-V"],
        }
    }

    /// Whether the mechanism can also bind memory to the local node.
    pub fn supports_memory_binding(self) -> bool {
        matches!(self, BindingMechanism::Numactl)
    }

    /// Default memory binding when none was requested.
    fn default_bind_memory(self) -> bool {
        self.supports_memory_binding()
    }
}

impl fmt::Display for BindingMechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.program())
    }
}

impl TryFrom<String> for BindingMechanism {
    type Error = MultibenchError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl FromStr for BindingMechanism {
    type Err = MultibenchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "numactl" => Ok(BindingMechanism::Numactl),
            "taskset" => Ok(BindingMechanism::Taskset),
            _ => Err(MultibenchError::UnknownMechanism(s.to_string())),
        }
    }
}

/// Requested memory binding: unset, on or off.
///
/// Unset resolves per mechanism when the policy is built. Deserializes from
/// a boolean or from any spelling accepted by [`FromStr`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BindMemory {
    /// Bind memory if the mechanism supports it.
    #[default]
    Auto,
    /// Always bind memory.
    Enabled,
    /// Never bind memory.
    Disabled,
}

impl BindMemory {
    /// The request as the tri-state taken by [`AffinityPolicy::new`].
    pub fn as_option(self) -> Option<bool> {
        match self {
            BindMemory::Auto => None,
            BindMemory::Enabled => Some(true),
            BindMemory::Disabled => Some(false),
        }
    }
}

impl From<Option<bool>> for BindMemory {
    fn from(value: Option<bool>) -> Self {
        match value {
            None => BindMemory::Auto,
            Some(true) => BindMemory::Enabled,
            Some(false) => BindMemory::Disabled,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BindMemoryRepr {
    Flag(bool),
    Name(String),
}

impl<'de> Deserialize<'de> for BindMemory {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match BindMemoryRepr::deserialize(deserializer)? {
            BindMemoryRepr::Flag(flag) => Ok(Some(flag).into()),
            BindMemoryRepr::Name(name) => name.parse().map_err(de::Error::custom),
        }
    }
}

impl FromStr for BindMemory {
    type Err = MultibenchError;

    /// Accepts the `None`/`True`/`False` spelling of the command line as well
    /// as `auto`/`enabled`/`disabled`, case-insensitively.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "auto" => Ok(BindMemory::Auto),
            "true" | "enabled" => Ok(BindMemory::Enabled),
            "false" | "disabled" => Ok(BindMemory::Disabled),
            _ => Err(MultibenchError::InvalidBindMemory(s.to_string())),
        }
    }
}

/// Which binding mechanisms can be run on this host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostCapabilities {
    numactl: bool,
    taskset: bool,
}

static DETECTED: OnceLock<HostCapabilities> = OnceLock::new();

impl HostCapabilities {
    /// Capabilities known up front, e.g. for tests or a host inventory.
    pub fn new(numactl: bool, taskset: bool) -> Self {
        Self { numactl, taskset }
    }

    /// Run each mechanism's no-op invocation and record which ones succeed.
    ///
    /// A mechanism is available when its command exits with status 0. Output
    /// is discarded.
    pub fn probe() -> Self {
        let caps = Self {
            numactl: probe_mechanism(BindingMechanism::Numactl),
            taskset: probe_mechanism(BindingMechanism::Taskset),
        };
        info!(
            numactl = caps.numactl,
            taskset = caps.taskset,
            "probed binding mechanisms"
        );
        caps
    }

    /// Probe the host once and reuse the result for the rest of the process.
    pub fn detect() -> Self {
        *DETECTED.get_or_init(Self::probe)
    }

    /// Whether `mechanism` can be run on this host.
    pub fn is_available(&self, mechanism: BindingMechanism) -> bool {
        match mechanism {
            BindingMechanism::Numactl => self.numactl,
            BindingMechanism::Taskset => self.taskset,
        }
    }

    /// Whether at least one mechanism can be run.
    pub fn any_available(&self) -> bool {
        self.numactl || self.taskset
    }
}

fn probe_mechanism(mechanism: BindingMechanism) -> bool {
    let status = Command::new(mechanism.program())
        .args(mechanism.probe_args())
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();

    match status {
        Ok(status) => {
            debug!(%mechanism, %status, "probe finished");
            status.success()
        }
        Err(e) => {
            debug!(%mechanism, %e, "probe could not be run");
            false
        }
    }
}

/// How jobs are bound: the mechanism and whether memory is bound too.
///
/// A policy binding memory through `taskset` cannot be constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AffinityPolicy {
    mechanism: BindingMechanism,
    bind_memory: bool,
}

impl Default for AffinityPolicy {
    /// `numactl` with memory bound to the local node.
    fn default() -> Self {
        Self {
            mechanism: BindingMechanism::Numactl,
            bind_memory: true,
        }
    }
}

impl AffinityPolicy {
    /// Build a policy without consulting the host.
    ///
    /// `bind_memory` of `None` resolves to `true` for numactl and `false` for
    /// taskset.
    ///
    /// # Errors
    ///
    /// Returns `MultibenchError::UnsupportedCombination` when memory binding is
    /// requested with a mechanism that cannot provide it.
    ///
    /// # Examples
    ///
    /// ```
    /// use multibench::affinity::{AffinityPolicy, BindingMechanism};
    ///
    /// let policy = AffinityPolicy::new(BindingMechanism::Taskset, None).unwrap();
    /// assert!(!policy.bind_memory());
    /// assert!(AffinityPolicy::new(BindingMechanism::Taskset, Some(true)).is_err());
    /// ```
    pub fn new(mechanism: BindingMechanism, bind_memory: Option<bool>) -> Result<Self> {
        let bind_memory = bind_memory.unwrap_or_else(|| mechanism.default_bind_memory());
        if bind_memory && !mechanism.supports_memory_binding() {
            return Err(MultibenchError::UnsupportedCombination { mechanism });
        }
        Ok(Self {
            mechanism,
            bind_memory,
        })
    }

    /// The binding mechanism.
    pub fn mechanism(&self) -> BindingMechanism {
        self.mechanism
    }

    /// Whether memory is bound to the local node.
    pub fn bind_memory(&self) -> bool {
        self.bind_memory
    }

    /// Command prefix binding one job to `group`.
    ///
    /// See [`binding_command`].
    pub fn binding_command(&self, group: &CoreAffinityGroup) -> Vec<String> {
        binding_command(self, group)
    }
}

/// Render the command prefix that binds one job to `group` under `policy`.
///
/// The job launcher appends the executable and its arguments. For numactl
/// the prefix ends with `--`; for taskset it ends with the cpu list.
///
/// # Examples
///
/// ```
/// use multibench::affinity::{binding_command, AffinityPolicy};
///
/// let group = "0,1".parse().unwrap();
/// let cmd = binding_command(&AffinityPolicy::default(), &group);
/// assert_eq!(cmd, ["numactl", "-C", "0,1", "-l", "--"]);
/// ```
pub fn binding_command(policy: &AffinityPolicy, group: &CoreAffinityGroup) -> Vec<String> {
    let mechanism = policy.mechanism;
    let mut cmd = vec![
        mechanism.program().to_string(),
        mechanism.core_flag().to_string(),
        group.cpu_list(),
    ];

    match mechanism {
        BindingMechanism::Numactl => {
            if policy.bind_memory {
                cmd.push("-l".to_string());
            }
            cmd.push("--".to_string());
        }
        BindingMechanism::Taskset => {}
    }

    cmd
}

/// Holds the current affinity policy and the host capabilities it is checked against.
#[derive(Debug, Clone)]
pub struct AffinityBinder {
    capabilities: HostCapabilities,
    policy: AffinityPolicy,
}

impl AffinityBinder {
    /// Create a binder for a host with the given capabilities.
    ///
    /// The binder starts with [`AffinityPolicy::default`].
    pub fn new(capabilities: HostCapabilities) -> Self {
        Self {
            capabilities,
            policy: AffinityPolicy::default(),
        }
    }

    /// Create a binder for the current host.
    ///
    /// # Errors
    ///
    /// Returns `MultibenchError::NoMechanismAvailable` if neither numactl nor
    /// taskset can be run.
    pub fn detect() -> Result<Self> {
        let capabilities = HostCapabilities::detect();
        if !capabilities.any_available() {
            return Err(MultibenchError::NoMechanismAvailable);
        }
        Ok(Self::new(capabilities))
    }

    /// Replace the current policy.
    ///
    /// On error the previous policy is kept.
    ///
    /// # Errors
    ///
    /// - `MultibenchError::UnsupportedCombination` if memory binding is
    ///   requested with taskset, whatever the host has installed.
    /// - `MultibenchError::UnavailableMechanism` if the mechanism was not
    ///   runnable when the host was probed.
    pub fn configure(
        &mut self,
        mechanism: BindingMechanism,
        bind_memory: Option<bool>,
    ) -> Result<AffinityPolicy> {
        let policy = AffinityPolicy::new(mechanism, bind_memory).inspect_err(|e| {
            warn!(%mechanism, ?bind_memory, %e, "rejected affinity policy");
        })?;

        if !self.capabilities.is_available(mechanism) {
            warn!(%mechanism, "binding mechanism not available on this host");
            return Err(MultibenchError::UnavailableMechanism(mechanism));
        }

        self.policy = policy;
        info!(
            %mechanism,
            bind_memory = policy.bind_memory,
            "configured affinity policy"
        );
        Ok(policy)
    }

    /// The current policy.
    pub fn policy(&self) -> AffinityPolicy {
        self.policy
    }

    /// The host capabilities the binder checks against.
    pub fn capabilities(&self) -> HostCapabilities {
        self.capabilities
    }

    /// Command prefix binding one job to `group` under the current policy.
    pub fn binding_command(&self, group: &CoreAffinityGroup) -> Vec<String> {
        binding_command(&self.policy, group)
    }
}
