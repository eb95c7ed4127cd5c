//! CPU affinity group parsing and host CPU enumeration.
//!
//! A core affinity group is the comma-separated cpu list handed to
//! `numactl -C` or `taskset -c` for one job:
//! - Single CPUs: `"0"`, `"15"`
//! - Lists: `"0,2,4,6"`
//! - Ranges are passed through untouched: `"0-3,8"`
//!
//! Tokens are kept opaque. The number of threads a job gets is the number of
//! tokens in its group, so `"0-3"` counts as one.

use crate::error::{MultibenchError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The ordered list of core-ID tokens assigned to one job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CoreAffinityGroup {
    cpus: Vec<String>,
}

impl CoreAffinityGroup {
    /// Create a group from already-split tokens.
    ///
    /// # Errors
    ///
    /// Returns `MultibenchError::InvalidAffinityGroup` if there are no tokens
    /// or any token is blank or contains a comma.
    ///
    /// # Examples
    ///
    /// ```
    /// use multibench::cpuset::CoreAffinityGroup;
    ///
    /// let group = CoreAffinityGroup::new(["0", "1"]).unwrap();
    /// assert_eq!(group.len(), 2);
    /// assert_eq!(group.to_string(), "0,1");
    /// ```
    pub fn new<I, S>(cpus: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let cpus: Vec<String> = cpus
            .into_iter()
            .map(|cpu| cpu.into().trim().to_string())
            .collect();

        if cpus.is_empty() {
            return Err(MultibenchError::InvalidAffinityGroup(String::new()));
        }
        if cpus.iter().any(|cpu| cpu.is_empty() || cpu.contains(',')) {
            return Err(MultibenchError::InvalidAffinityGroup(cpus.join(",")));
        }

        Ok(Self { cpus })
    }

    /// Number of cores in the group, i.e. the thread count of its job.
    pub fn len(&self) -> usize {
        self.cpus.len()
    }

    /// Always false: a group holds at least one core.
    pub fn is_empty(&self) -> bool {
        self.cpus.is_empty()
    }

    /// The core-ID tokens in order.
    pub fn cpus(&self) -> &[String] {
        &self.cpus
    }

    /// Render the group as the cpu-list argument of numactl/taskset.
    pub fn cpu_list(&self) -> String {
        self.cpus.join(",")
    }

    /// Core IDs of the tokens that are plain integers.
    ///
    /// Range tokens (`"0-3"`) and anything else non-numeric are skipped.
    pub fn numeric_ids(&self) -> Vec<usize> {
        self.cpus.iter().filter_map(|cpu| cpu.parse().ok()).collect()
    }
}

/// Parse a comma-separated affinity group such as `"0,1"`.
///
/// # Examples
///
/// ```
/// use multibench::cpuset::CoreAffinityGroup;
///
/// let group: CoreAffinityGroup = "4, 5,6".parse().unwrap();
/// assert_eq!(group.cpus(), ["4", "5", "6"]);
/// assert!("0,,1".parse::<CoreAffinityGroup>().is_err());
/// ```
impl FromStr for CoreAffinityGroup {
    type Err = MultibenchError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(MultibenchError::InvalidAffinityGroup(s.to_string()));
        }

        let cpus: Vec<&str> = s.split(',').map(str::trim).collect();
        if cpus.iter().any(|cpu| cpu.is_empty()) {
            return Err(MultibenchError::InvalidAffinityGroup(s.to_string()));
        }

        Self::new(cpus)
    }
}

impl TryFrom<String> for CoreAffinityGroup {
    type Error = MultibenchError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<CoreAffinityGroup> for String {
    fn from(group: CoreAffinityGroup) -> Self {
        group.cpu_list()
    }
}

impl fmt::Display for CoreAffinityGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.cpu_list())
    }
}

/// Parse every group of an affinity list, stopping at the first bad one.
///
/// # Errors
///
/// Returns `MultibenchError::InvalidAffinityGroup` for the first group that
/// cannot be parsed.
pub fn parse_affinity_list<S: AsRef<str>>(groups: &[S]) -> Result<Vec<CoreAffinityGroup>> {
    groups.iter().map(|group| group.as_ref().parse()).collect()
}

/// Get all logical CPU IDs this process may run on.
///
/// Uses `core_affinity` to read the current affinity mask. Returns an empty
/// vector when the platform does not report one.
pub fn available_cpus() -> Vec<usize> {
    core_affinity::get_core_ids()
        .map(|ids| ids.into_iter().map(|id| id.id).collect())
        .unwrap_or_default()
}

/// Numeric core IDs in `groups` that are missing from `available`.
///
/// Non-numeric tokens are not checked. The result is sorted and deduplicated.
pub fn unavailable_cpus(groups: &[CoreAffinityGroup], available: &[usize]) -> Vec<usize> {
    let mut missing: Vec<usize> = groups
        .iter()
        .flat_map(CoreAffinityGroup::numeric_ids)
        .filter(|cpu| !available.contains(cpu))
        .collect();
    missing.sort_unstable();
    missing.dedup();
    missing
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_cpu() {
        let group: CoreAffinityGroup = "0".parse().unwrap();
        assert_eq!(group.cpus(), ["0"]);
        assert_eq!(group.len(), 1);
    }

    #[test]
    fn test_parse_list() {
        let group: CoreAffinityGroup = "0,2,4,6".parse().unwrap();
        assert_eq!(group.len(), 4);
        assert_eq!(group.cpu_list(), "0,2,4,6");
    }

    #[test]
    fn test_parse_keeps_order_and_duplicates() {
        // Tokens are opaque; numactl/taskset get exactly what was written.
        let group: CoreAffinityGroup = "3,1,1".parse().unwrap();
        assert_eq!(group.cpus(), ["3", "1", "1"]);
    }

    #[test]
    fn test_parse_range_counts_as_one_token() {
        let group: CoreAffinityGroup = "0-3,8".parse().unwrap();
        assert_eq!(group.len(), 2);
        assert_eq!(group.numeric_ids(), vec![8]);
    }

    #[test]
    fn test_parse_with_whitespace() {
        let group: CoreAffinityGroup = " 0, 1 ".parse().unwrap();
        assert_eq!(group.to_string(), "0,1");
    }

    #[test]
    fn test_parse_empty_fails() {
        assert!("".parse::<CoreAffinityGroup>().is_err());
        assert!("   ".parse::<CoreAffinityGroup>().is_err());
        assert!("0,,1".parse::<CoreAffinityGroup>().is_err());
        assert!("0,".parse::<CoreAffinityGroup>().is_err());
    }

    #[test]
    fn test_new_rejects_bad_tokens() {
        assert!(CoreAffinityGroup::new(Vec::<String>::new()).is_err());
        assert!(CoreAffinityGroup::new(["0", " "]).is_err());
        assert!(CoreAffinityGroup::new(["0,1"]).is_err());
    }

    #[test]
    fn test_parse_affinity_list() {
        let groups = parse_affinity_list(&["0,1", "2,3"]).unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[1].cpu_list(), "2,3");

        let err = parse_affinity_list(&["0,1", ""]).unwrap_err();
        assert!(matches!(err, MultibenchError::InvalidAffinityGroup(_)));
    }

    #[test]
    fn test_serde_as_string() {
        let group: CoreAffinityGroup = serde_json::from_str("\"0,1\"").unwrap();
        assert_eq!(group.len(), 2);
        assert_eq!(serde_json::to_string(&group).unwrap(), "\"0,1\"");
        assert!(serde_json::from_str::<CoreAffinityGroup>("\"\"").is_err());
    }

    #[test]
    fn test_unavailable_cpus() {
        let groups = parse_affinity_list(&["0,1", "7,x,0-3"]).unwrap();
        assert_eq!(unavailable_cpus(&groups, &[0, 1, 2, 3]), vec![7]);
        assert!(unavailable_cpus(&groups, &[0, 1, 7]).is_empty());
    }

    #[test]
    fn test_available_cpus() {
        let cpus = available_cpus();
        assert!(!cpus.is_empty());
    }
}
