//! Integration tests covering configuration through to launch prefixes.

use multibench::cpuset::parse_affinity_list;
use multibench::{
    binding_command, format_time_strings, validate_core_affinity_list, validate_gpu_usage,
    AffinityBinder, BenchProblem, BindMemory, BindingMechanism, HostCapabilities,
    MultibenchArgs, MultibenchBuilder, MultibenchError, Problem, TimingConfig,
};
use std::convert::Infallible;

fn host() -> HostCapabilities {
    HostCapabilities::new(true, true)
}

/// Configure numactl with memory binding left unset, validate a two-job
/// list, and render the first job's prefix.
#[test]
fn test_numactl_two_jobs() {
    let mut binder = AffinityBinder::new(host());
    let policy = binder.configure(BindingMechanism::Numactl, None).unwrap();
    assert!(policy.bind_memory());

    let groups = parse_affinity_list(&["0,1", "2,3"]).unwrap();
    assert_eq!(validate_core_affinity_list(&groups).unwrap(), 2);

    let first = "0,1".parse().unwrap();
    assert_eq!(
        binding_command(&policy, &first),
        ["numactl", "-C", "0,1", "-l", "--"]
    );
}

#[test]
fn test_taskset_never_binds_memory() {
    let mut binder = AffinityBinder::new(host());
    let err = binder
        .configure(BindingMechanism::Taskset, Some(true))
        .unwrap_err();
    assert!(matches!(err, MultibenchError::UnsupportedCombination { .. }));

    let policy = binder.configure(BindingMechanism::Taskset, None).unwrap();
    let cmd = binding_command(&policy, &"0,1".parse().unwrap());
    assert_eq!(cmd, ["taskset", "-c", "0,1"]);
    assert!(!cmd.iter().any(|token| token == "-l"));
}

#[test]
fn test_gpu_rules() {
    let one = parse_affinity_list(&["0-7"]).unwrap();
    let two = parse_affinity_list(&["0,1", "2,3"]).unwrap();
    let no_gpus: [&str; 0] = [];

    assert!(!validate_gpu_usage(&no_gpus, &two).unwrap());
    assert!(validate_gpu_usage(&["gpu0"], &one).unwrap());
    assert!(matches!(
        validate_gpu_usage(&["gpu0"], &two),
        Err(MultibenchError::IncompatibleGpuTopology { groups: 2, .. })
    ));
}

#[test]
fn test_builder_from_cli_args() {
    let args = MultibenchArgs {
        mbench_cpu_affinity_list: Some(vec!["0,1".to_string(), "2,3".to_string()]),
        mbench_dummy_program: Some("./dummy".to_string()),
        mbench_affinity_cmd: Some(BindingMechanism::Numactl),
        mbench_bind_mem: Some(BindMemory::Disabled),
        mbench_nthreads_env_name: Some("OMP_NUM_THREADS".to_string()),
        ..MultibenchArgs::default()
    };

    let plan = MultibenchBuilder::new()
        .with_cli_args(&args)
        .build_with_capabilities(host())
        .unwrap();

    assert_eq!(plan.jobs(), 2);
    assert_eq!(
        plan.binding_commands(),
        [["numactl", "-C", "0,1", "--"], ["numactl", "-C", "2,3", "--"]]
    );
    assert_eq!(
        plan.thread_env(),
        Some(("OMP_NUM_THREADS".to_string(), "2".to_string()))
    );
}

#[test]
fn test_builder_missing_mechanism() {
    let result = MultibenchBuilder::new()
        .affinity_cmd(BindingMechanism::Taskset)
        .cpu_affinity_list(["0"])
        .build_with_capabilities(HostCapabilities::new(true, false));
    assert!(matches!(
        result,
        Err(MultibenchError::UnavailableMechanism(BindingMechanism::Taskset))
    ));
}

struct Spin {
    iterations: u64,
    prepared: bool,
}

impl Problem for Spin {
    type Error = Infallible;

    fn setup(&mut self) -> Result<(), Infallible> {
        self.prepared = true;
        Ok(())
    }

    fn execute(&mut self) -> Result<(), Infallible> {
        let mut acc = 0u64;
        for i in 0..self.iterations {
            acc = acc.wrapping_add(std::hint::black_box(i));
        }
        std::hint::black_box(acc);
        Ok(())
    }
}

#[test]
fn test_problem_timing_flow() {
    let mut bench = BenchProblem::new(Spin {
        iterations: 1000,
        prepared: false,
    });
    let timing = TimingConfig {
        min_seconds: 0.001,
        repeats: 3,
        max_exponent: 6,
    };

    let report = bench.run(&timing).unwrap();
    assert!(bench.problem().prepared);
    assert!(bench.setup_time().is_some());
    assert!([10, 100, 1_000, 10_000, 100_000, 1_000_000].contains(&report.repetitions));
    assert_eq!(report.runs.len(), 3);

    let lines = format_time_strings(&report.per_call_seconds());
    assert_eq!(lines.len(), 3);
    let unit = lines[0].rsplit(' ').next().unwrap().to_string();
    assert!(lines.iter().all(|line| line.ends_with(&format!(" {unit}"))));
}
