//! Builder pattern for constructing benchmark plans.
//!
//! The builder supports multiple configuration sources using figment:
//! - Default values
//! - Config files (TOML, YAML, JSON)
//! - Environment variables
//! - Programmatic overrides
//! - CLI arguments via clap

use crate::affinity::{AffinityBinder, BindMemory, BindingMechanism, HostCapabilities};
use crate::config::{MultibenchConfig, TimingConfig};
use crate::error::Result;
use crate::plan::BenchPlan;

use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use figment::Figment;
use std::path::{Path, PathBuf};

/// Builder for constructing a [`BenchPlan`].
///
/// Configuration sources are merged in the following order (later sources override earlier):
/// 1. Default values
/// 2. Config files (in order added)
/// 3. Environment variables
/// 4. Programmatic overrides
///
/// # Examples
///
/// ```ignore
/// use multibench::MultibenchBuilder;
///
/// let plan = MultibenchBuilder::new()
///     .file("multibench.toml")
///     .env_prefix("MULTIBENCH")
///     .cpu_affinity_list(["0,1", "2,3"])
///     .dummy_program("./dummy")
///     .build()?;
/// ```
#[derive(Debug)]
pub struct MultibenchBuilder {
    figment: Figment,
}

impl Default for MultibenchBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MultibenchBuilder {
    /// Create a new builder with default configuration.
    pub fn new() -> Self {
        Self {
            figment: Figment::from(Serialized::defaults(MultibenchConfig::default())),
        }
    }

    /// Add a configuration file.
    ///
    /// Supports TOML, YAML, and JSON formats (detected by extension).
    /// Files are merged in the order they are added.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        let path = path.as_ref();
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        self.figment = match extension.to_lowercase().as_str() {
            "toml" => self.figment.merge(Toml::file(path)),
            "yaml" | "yml" => self.figment.merge(Yaml::file(path)),
            "json" => self.figment.merge(Json::file(path)),
            _ => {
                // Default to TOML
                self.figment.merge(Toml::file(path))
            }
        };
        self
    }

    /// Add environment variables with a prefix.
    ///
    /// Environment variables are expected in the format `{PREFIX}_{KEY}`,
    /// e.g. `MULTIBENCH_AFFINITY_CMD`. Nested keys are separated by a double
    /// underscore: `MULTIBENCH_TIMING__MIN_SECONDS`.
    pub fn env_prefix(mut self, prefix: &str) -> Self {
        self.figment = self
            .figment
            .merge(Env::prefixed(&format!("{prefix}_")).split("__"));
        self
    }

    /// Set the binding mechanism.
    pub fn affinity_cmd(mut self, mechanism: BindingMechanism) -> Self {
        self.figment = self
            .figment
            .merge(Serialized::default("affinity_cmd", mechanism));
        self
    }

    /// Set whether job memory is bound to the local node.
    pub fn bind_mem(mut self, bind_mem: BindMemory) -> Self {
        self.figment = self.figment.merge(Serialized::default("bind_mem", bind_mem));
        self
    }

    /// Set the cpu affinity list, one comma-separated cpu list per job.
    pub fn cpu_affinity_list<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let groups: Vec<String> = groups.into_iter().map(Into::into).collect();
        self.figment = self
            .figment
            .merge(Serialized::default("cpu_affinity_list", groups));
        self
    }

    /// Set the GPU devices used by the single job.
    pub fn gpu_list<I, S>(mut self, gpus: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let gpus: Vec<String> = gpus.into_iter().map(Into::into).collect();
        self.figment = self.figment.merge(Serialized::default("gpu_list", gpus));
        self
    }

    /// Set the program run on the cores not used by the timed job.
    pub fn dummy_program(mut self, program: impl Into<String>) -> Self {
        self.figment = self
            .figment
            .merge(Serialized::default("dummy_program", program.into()));
        self
    }

    /// Set the program timing a single problem.
    pub fn timing_program(mut self, program: impl Into<String>) -> Self {
        self.figment = self
            .figment
            .merge(Serialized::default("timing_program", program.into()));
        self
    }

    /// Set the environment variable telling jobs their thread count.
    pub fn nthreads_env_name(mut self, name: impl Into<String>) -> Self {
        self.figment = self
            .figment
            .merge(Serialized::default("nthreads_env_name", name.into()));
        self
    }

    /// Set the problem option name, without leading dashes.
    pub fn problem_argstring(mut self, name: impl Into<String>) -> Self {
        self.figment = self
            .figment
            .merge(Serialized::default("problem_argstring", name.into()));
        self
    }

    /// Set the timing loop parameters.
    pub fn timing(mut self, timing: TimingConfig) -> Self {
        self.figment = self.figment.merge(Serialized::default("timing", timing));
        self
    }

    /// Apply affinity and job CLI overrides.
    ///
    /// Only options that were given are applied.
    pub fn with_cli_args(mut self, args: &MultibenchArgs) -> Self {
        if let Some(ref groups) = args.mbench_cpu_affinity_list {
            self.figment = self
                .figment
                .merge(Serialized::default("cpu_affinity_list", groups.clone()));
        }
        if let Some(ref gpus) = args.mbench_gpu_list {
            self.figment = self
                .figment
                .merge(Serialized::default("gpu_list", gpus.clone()));
        }
        if let Some(ref program) = args.mbench_dummy_program {
            self.figment = self
                .figment
                .merge(Serialized::default("dummy_program", program.clone()));
        }
        if let Some(ref program) = args.mbench_timing_program {
            self.figment = self
                .figment
                .merge(Serialized::default("timing_program", program.clone()));
        }
        if let Some(ref name) = args.mbench_nthreads_env_name {
            self.figment = self
                .figment
                .merge(Serialized::default("nthreads_env_name", name.clone()));
        }
        if let Some(seconds) = args.mbench_wait_time {
            self.figment = self
                .figment
                .merge(Serialized::default("wait_time", seconds));
        }
        if let Some(mechanism) = args.mbench_affinity_cmd {
            self.figment = self
                .figment
                .merge(Serialized::default("affinity_cmd", mechanism));
        }
        if let Some(bind_mem) = args.mbench_bind_mem {
            self.figment = self
                .figment
                .merge(Serialized::default("bind_mem", bind_mem));
        }
        self
    }

    /// Apply problem input/output CLI overrides.
    pub fn with_io_args(mut self, args: &MultibenchIoArgs) -> Self {
        if let Some(ref path) = args.mbench_input_file {
            self.figment = self
                .figment
                .merge(Serialized::default("input_file", path.clone()));
        }
        if let Some(ref path) = args.mbench_output_file {
            self.figment = self
                .figment
                .merge(Serialized::default("output_file", path.clone()));
        }
        if let Some(ref name) = args.mbench_problem_argstring {
            self.figment = self
                .figment
                .merge(Serialized::default("problem_argstring", name.clone()));
        }
        self
    }

    /// Apply timing CLI overrides.
    pub fn with_timing_args(mut self, args: &MultibenchTimingArgs) -> Self {
        if let Some(seconds) = args.mbench_time {
            self.figment = self
                .figment
                .merge(Serialized::default("timing.min_seconds", seconds));
        }
        if let Some(repeats) = args.mbench_repeats {
            self.figment = self
                .figment
                .merge(Serialized::default("timing.repeats", repeats));
        }
        self
    }

    /// Extract the merged configuration without validating it.
    ///
    /// # Errors
    ///
    /// Returns `MultibenchError::Config` if extraction fails.
    pub fn config(&self) -> Result<MultibenchConfig> {
        Ok(self.figment.extract().map_err(Box::new)?)
    }

    /// Build the plan for the current host.
    ///
    /// Probes the host for numactl and taskset (once per process), then
    /// validates the configuration against it.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration extraction fails
    /// - Neither binding mechanism is available, or the requested one is not
    /// - The affinity policy, affinity list or GPU list is invalid
    /// - Several jobs are requested without a dummy program
    pub fn build(self) -> Result<BenchPlan> {
        let binder = AffinityBinder::detect()?;
        self.build_with_binder(binder)
    }

    /// Build the plan against known host capabilities.
    ///
    /// # Errors
    ///
    /// Same as [`build`](Self::build), except that the host is not probed.
    pub fn build_with_capabilities(self, capabilities: HostCapabilities) -> Result<BenchPlan> {
        self.build_with_binder(AffinityBinder::new(capabilities))
    }

    fn build_with_binder(self, binder: AffinityBinder) -> Result<BenchPlan> {
        let config = self.config()?;
        BenchPlan::from_config(config, binder)
    }
}

/// CLI arguments for job layout and affinity.
///
/// Use with clap's `Parser` derive macro. These arguments can be applied
/// to a `MultibenchBuilder` using `with_cli_args`.
///
/// # Examples
///
/// ```ignore
/// use clap::Parser;
/// use multibench::{MultibenchArgs, MultibenchBuilder};
///
/// #[derive(Parser)]
/// struct DriverArgs {
///     #[command(flatten)]
///     mbench: MultibenchArgs,
/// }
///
/// let args = DriverArgs::parse();
/// let plan = MultibenchBuilder::new()
///     .with_cli_args(&args.mbench)
///     .build()?;
/// ```
#[derive(Debug, Default, Clone, clap::Args)]
pub struct MultibenchArgs {
    /// Space separated list of cpu affinities, one per job; each item is a
    /// comma-separated list of cpu IDs and its length is the job's thread count
    #[arg(long, num_args = 0..)]
    pub mbench_cpu_affinity_list: Option<Vec<String>>,

    /// Space separated list of gpu devices
    #[arg(long, num_args = 0..)]
    pub mbench_gpu_list: Option<Vec<String>>,

    /// Program filling the unoccupied cores; required with more than one job
    #[arg(long)]
    pub mbench_dummy_program: Option<String>,

    /// Program timing a single problem and printing its results to stdout
    #[arg(long)]
    pub mbench_timing_program: Option<String>,

    /// Environment variable telling dummy and timing programs their thread count
    #[arg(long)]
    pub mbench_nthreads_env_name: Option<String>,

    /// Seconds to sleep before starting the next job
    #[arg(long)]
    pub mbench_wait_time: Option<u64>,

    /// Command used to set job cpu affinity: numactl or taskset
    #[arg(long)]
    pub mbench_affinity_cmd: Option<BindingMechanism>,

    /// Bind jobs to node-local memory: None, True or False
    #[arg(long)]
    pub mbench_bind_mem: Option<BindMemory>,
}

/// CLI arguments for per-problem input and output files.
#[derive(Debug, Default, Clone, clap::Args)]
pub struct MultibenchIoArgs {
    /// File with one problem instance per line
    #[arg(long)]
    pub mbench_input_file: Option<PathBuf>,

    /// File the timing program's output is appended to
    #[arg(long)]
    pub mbench_output_file: Option<PathBuf>,

    /// Option selecting a problem in dummy and timing programs, without leading dashes
    #[arg(long)]
    pub mbench_problem_argstring: Option<String>,
}

/// CLI arguments for the timing loop.
#[derive(Debug, Default, Clone, clap::Args)]
pub struct MultibenchTimingArgs {
    /// Minimum seconds per timing loop
    #[arg(long)]
    pub mbench_time: Option<f64>,

    /// Number of timing loops
    #[arg(long)]
    pub mbench_repeats: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use figment::Jail;

    #[derive(Debug, Parser)]
    struct TestCli {
        #[command(flatten)]
        mbench: MultibenchArgs,
        #[command(flatten)]
        io: MultibenchIoArgs,
        #[command(flatten)]
        timing: MultibenchTimingArgs,
    }

    fn all_mechanisms() -> HostCapabilities {
        HostCapabilities::new(true, true)
    }

    #[test]
    fn test_builder_defaults() {
        let config = MultibenchBuilder::new().config().unwrap();
        assert_eq!(config, MultibenchConfig::default());
    }

    #[test]
    fn test_builder_programmatic_override() {
        let config = MultibenchBuilder::new()
            .affinity_cmd(BindingMechanism::Taskset)
            .bind_mem(BindMemory::Disabled)
            .cpu_affinity_list(["0,1", "2,3"])
            .gpu_list(Vec::<String>::new())
            .dummy_program("dummy")
            .timing_program("timer")
            .nthreads_env_name("OMP_NUM_THREADS")
            .problem_argstring("size")
            .timing(TimingConfig {
                min_seconds: 0.5,
                repeats: 3,
                max_exponent: 6,
            })
            .config()
            .unwrap();

        assert_eq!(config.affinity_cmd, BindingMechanism::Taskset);
        assert_eq!(config.bind_mem, BindMemory::Disabled);
        assert_eq!(config.cpu_affinity_list, ["0,1", "2,3"]);
        assert_eq!(config.dummy_program.as_deref(), Some("dummy"));
        assert_eq!(config.timing_program.as_deref(), Some("timer"));
        assert_eq!(config.nthreads_env_name.as_deref(), Some("OMP_NUM_THREADS"));
        assert_eq!(config.problem_flag(), "--size");
        assert_eq!(config.timing.repeats, 3);
        assert_eq!(config.timing.max_exponent, 6);
    }

    #[test]
    fn test_cli_parsing() {
        let cli = TestCli::try_parse_from([
            "driver",
            "--mbench-cpu-affinity-list",
            "0,1",
            "2,3",
            "--mbench-affinity-cmd",
            "taskset",
            "--mbench-bind-mem",
            "False",
            "--mbench-time",
            "0.5",
            "--mbench-problem-argstring",
            "size",
        ])
        .unwrap();

        assert_eq!(
            cli.mbench.mbench_cpu_affinity_list,
            Some(vec!["0,1".to_string(), "2,3".to_string()])
        );
        assert_eq!(cli.mbench.mbench_affinity_cmd, Some(BindingMechanism::Taskset));
        assert_eq!(cli.mbench.mbench_bind_mem, Some(BindMemory::Disabled));
        assert_eq!(cli.timing.mbench_time, Some(0.5));
        assert!(cli.timing.mbench_repeats.is_none());
        assert_eq!(cli.io.mbench_problem_argstring.as_deref(), Some("size"));
    }

    #[test]
    fn test_cli_rejects_unknown_mechanism() {
        let result = TestCli::try_parse_from(["driver", "--mbench-affinity-cmd", "hwloc"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_cli_args_override() {
        let args = MultibenchArgs {
            mbench_cpu_affinity_list: Some(vec!["4,5".to_string()]),
            mbench_affinity_cmd: Some(BindingMechanism::Taskset),
            mbench_bind_mem: Some(BindMemory::Auto),
            ..MultibenchArgs::default()
        };
        let timing = MultibenchTimingArgs {
            mbench_time: Some(2.0),
            mbench_repeats: None,
        };

        let config = MultibenchBuilder::new()
            .cpu_affinity_list(["0,1", "2,3"])
            .dummy_program("dummy")
            .bind_mem(BindMemory::Enabled)
            .with_cli_args(&args)
            .with_timing_args(&timing)
            .config()
            .unwrap();

        // CLI args should override programmatic values
        assert_eq!(config.cpu_affinity_list, ["4,5"]);
        assert_eq!(config.affinity_cmd, BindingMechanism::Taskset);
        assert_eq!(config.bind_mem, BindMemory::Auto);
        // Untouched values survive
        assert_eq!(config.dummy_program.as_deref(), Some("dummy"));
        assert_eq!(config.timing.min_seconds, 2.0);
        assert_eq!(config.timing.repeats, 8);
    }

    #[test]
    fn test_builder_io_args() {
        let io = MultibenchIoArgs {
            mbench_input_file: Some(PathBuf::from("problems.txt")),
            mbench_output_file: None,
            mbench_problem_argstring: Some("instance".to_string()),
        };
        let config = MultibenchBuilder::new().with_io_args(&io).config().unwrap();
        assert_eq!(config.input_file, Some(PathBuf::from("problems.txt")));
        assert!(config.output_file.is_none());
        assert_eq!(config.problem_flag(), "--instance");
    }

    #[test]
    fn test_builder_file_and_env() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "multibench.toml",
                r#"
                    affinity_cmd = "taskset"
                    cpu_affinity_list = ["0,1", "2,3"]
                    dummy_program = "dummy"
                    wait_time = 5

                    [timing]
                    repeats = 4
                "#,
            )?;
            jail.set_env("MULTIBENCH_WAIT_TIME", "7");
            jail.set_env("MULTIBENCH_TIMING__MIN_SECONDS", "0.1");

            let config = MultibenchBuilder::new()
                .file("multibench.toml")
                .env_prefix("MULTIBENCH")
                .config()
                .map_err(|e| e.to_string())?;

            assert_eq!(config.affinity_cmd, BindingMechanism::Taskset);
            assert_eq!(config.cpu_affinity_list, ["0,1", "2,3"]);
            assert_eq!(config.wait_time, 7);
            assert_eq!(config.timing.repeats, 4);
            assert_eq!(config.timing.min_seconds, 0.1);
            Ok(())
        });
    }

    #[test]
    fn test_builder_yaml_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "multibench.yaml",
                "affinity_cmd: numactl\nbind_mem: disabled\ncpu_affinity_list: [\"0-3\"]\n",
            )?;

            let plan = MultibenchBuilder::new()
                .file("multibench.yaml")
                .build_with_capabilities(all_mechanisms())
                .map_err(|e| e.to_string())?;

            assert!(!plan.policy().bind_memory());
            assert_eq!(plan.binding_commands(), [["numactl", "-C", "0-3", "--"]]);
            Ok(())
        });
    }

    #[test]
    fn test_file_and_env_accept_boolean_bind_mem() {
        Jail::expect_with(|jail| {
            jail.create_file("bool.toml", "bind_mem = false\n")?;
            jail.create_file(
                "capitalized.toml",
                "affinity_cmd = \"Numactl\"\nbind_mem = \"True\"\n",
            )?;

            let config = MultibenchBuilder::new()
                .file("bool.toml")
                .config()
                .map_err(|e| e.to_string())?;
            assert_eq!(config.bind_mem, BindMemory::Disabled);

            let config = MultibenchBuilder::new()
                .file("capitalized.toml")
                .config()
                .map_err(|e| e.to_string())?;
            assert_eq!(config.affinity_cmd, BindingMechanism::Numactl);
            assert_eq!(config.bind_mem, BindMemory::Enabled);

            jail.set_env("MB_BIND_MEM", "false");
            jail.set_env("MB_AFFINITY_CMD", "Taskset");
            let config = MultibenchBuilder::new()
                .env_prefix("MB")
                .config()
                .map_err(|e| e.to_string())?;
            assert_eq!(config.affinity_cmd, BindingMechanism::Taskset);
            assert_eq!(config.bind_mem, BindMemory::Disabled);
            Ok(())
        });
    }

    #[test]
    fn test_builder_invalid_file_value() {
        Jail::expect_with(|jail| {
            jail.create_file("multibench.toml", "affinity_cmd = \"hwloc\"")?;
            let result = MultibenchBuilder::new()
                .file("multibench.toml")
                .build_with_capabilities(all_mechanisms());
            assert!(matches!(
                result,
                Err(crate::error::MultibenchError::Config(_))
            ));
            Ok(())
        });
    }
}
