//! fanout - launch massive numbers of lightweight tasks and join them.
//!
//! Runs with no arguments using the built-in benchmark constants; every mode
//! and constant can be overridden on the command line.

mod report;

use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use fanout_core::{FailurePolicy, TaskError};
use fanout_runner::threads::{self, ThreadCancel};
use fanout_runner::{workload, GroupStats, RunnerConfig, RunnerError, TaskGroup};

use report::{Mode, Output, Report};

const DEFAULT_EXECUTOR_TASKS: usize = 1_000_000;
const DEFAULT_EXECUTOR_SLEEP_MS: u64 = 10_000;
const DEFAULT_SPAWN_TASKS: usize = 10_000_000;
const DEFAULT_SPAWN_SLEEP_MS: u64 = 100;
const DEFAULT_OS_THREADS: usize = 10_000;
const DEFAULT_OS_THREAD_SLEEP_MS: u64 = 100;
const DEFAULT_SUM_TASKS: usize = 1_000_000;
const DEFAULT_SUM_SLEEP_MS: u64 = 100;

/// fanout - lightweight task fan-out / fan-in benchmark
#[derive(Parser, Debug)]
#[command(name = "fanout")]
#[command(about = "Launch millions of lightweight tasks and join them", long_about = None)]
struct Cli {
    /// Failure policy for task groups (strict or resilient)
    #[arg(long, global = true, default_value_t = FailurePolicy::Strict)]
    policy: FailurePolicy,

    /// Maximum number of task bodies running at once
    #[arg(long, global = true)]
    max_concurrency: Option<usize>,

    /// Overall deadline for joining the group, in milliseconds
    #[arg(long, global = true)]
    deadline_ms: Option<u64>,

    /// Runtime worker threads (defaults to one per core)
    #[arg(long, global = true)]
    worker_threads: Option<usize>,

    /// Interval between progress log lines in milliseconds (0 disables)
    #[arg(long, global = true, default_value_t = 1000)]
    progress_interval_ms: u64,

    /// Emit milestones and the report as JSON lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
enum Commands {
    /// Submit tasks that each sleep, then report memory usage
    Executor {
        /// Number of tasks
        #[arg(long, default_value_t = DEFAULT_EXECUTOR_TASKS)]
        tasks: usize,

        /// Sleep per task in milliseconds
        #[arg(long, default_value_t = DEFAULT_EXECUTOR_SLEEP_MS)]
        sleep_ms: u64,

        /// Pause before launching, to attach an observer
        #[arg(long, default_value_t = 0)]
        startup_delay_secs: u64,
    },

    /// Create tasks, then wait for each one in turn
    Tasks {
        /// Number of tasks
        #[arg(long, default_value_t = DEFAULT_SPAWN_TASKS)]
        tasks: usize,

        /// Sleep per task in milliseconds
        #[arg(long, default_value_t = DEFAULT_SPAWN_SLEEP_MS)]
        sleep_ms: u64,
    },

    /// Baseline: one OS thread per task
    OsThreads {
        /// Number of threads
        #[arg(long, default_value_t = DEFAULT_OS_THREADS)]
        threads: usize,

        /// Sleep per thread in milliseconds
        #[arg(long, default_value_t = DEFAULT_OS_THREAD_SLEEP_MS)]
        sleep_ms: u64,
    },

    /// Sum the results of many simulated heavy computations
    Sum {
        /// Number of tasks
        #[arg(long, default_value_t = DEFAULT_SUM_TASKS)]
        tasks: usize,

        /// Sleep per task in milliseconds
        #[arg(long, default_value_t = DEFAULT_SUM_SLEEP_MS)]
        sleep_ms: u64,

        /// Make the task at this index fail
        #[arg(long)]
        fail_at: Option<usize>,
    },
}

impl Default for Commands {
    fn default() -> Self {
        Self::Executor {
            tasks: DEFAULT_EXECUTOR_TASKS,
            sleep_ms: DEFAULT_EXECUTOR_SLEEP_MS,
            startup_delay_secs: 0,
        }
    }
}

impl Cli {
    fn runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            policy: self.policy,
            max_concurrency: self.max_concurrency,
            join_deadline: self.deadline_ms.map(Duration::from_millis),
        }
    }

    fn progress_interval(&self) -> Option<Duration> {
        (self.progress_interval_ms > 0).then(|| Duration::from_millis(self.progress_interval_ms))
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries the report.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("fanout=info".parse()?))
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all();
    if let Some(workers) = cli.worker_threads {
        builder.worker_threads(workers);
    }
    let runtime = builder.build()?;

    runtime.block_on(run(cli))
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let output = Output::new(cli.json);
    let config = cli.runner_config();
    config.validate()?;

    let shutdown = CancellationToken::new();
    watch_ctrl_c(shutdown.clone());

    let command = cli.command.clone().unwrap_or_default();
    info!(?command, policy = %config.policy, "Starting fanout");

    let bench = Bench {
        config,
        shutdown,
        output,
        progress_interval: cli.progress_interval(),
    };

    match command {
        Commands::Executor {
            tasks,
            sleep_ms,
            startup_delay_secs,
        } => {
            bench
                .executor(tasks, Duration::from_millis(sleep_ms), startup_delay_secs)
                .await?
        }
        Commands::Tasks { tasks, sleep_ms } => {
            bench.tasks(tasks, Duration::from_millis(sleep_ms)).await?
        }
        Commands::OsThreads { threads, sleep_ms } => {
            bench
                .os_threads(threads, Duration::from_millis(sleep_ms))
                .await?
        }
        Commands::Sum {
            tasks,
            sleep_ms,
            fail_at,
        } => {
            bench
                .sum(tasks, Duration::from_millis(sleep_ms), fail_at)
                .await?
        }
    }

    Ok(())
}

/// Turn Ctrl-C into a cancellation of the root shutdown token.
fn watch_ctrl_c(shutdown: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; cancelling tasks");
            shutdown.cancel();
        }
    });
}

/// Everything a benchmark mode needs, passed explicitly.
struct Bench {
    config: RunnerConfig,
    shutdown: CancellationToken,
    output: Output,
    progress_interval: Option<Duration>,
}

impl Bench {
    async fn executor(
        &self,
        count: usize,
        sleep: Duration,
        startup_delay_secs: u64,
    ) -> Result<(), RunnerError> {
        if startup_delay_secs > 0 {
            self.output
                .milestone(&format!("Waiting {startup_delay_secs}s before launch..."));
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(startup_delay_secs)) => {}
                _ = self.shutdown.cancelled() => {
                    return Err(RunnerError::Interrupted { completed: 0, cancelled: 0 });
                }
            }
        }

        let start = Instant::now();
        let mut group = TaskGroup::with_shutdown(self.config.clone(), &self.shutdown)?;
        let progress = Progress::start(group.stats(), self.progress_interval);

        self.output.milestone(&format!("Submitting {count} tasks..."));
        group.spawn_n(count, move |ctx| workload::sleep_task(ctx, sleep));

        let joined = group.join_summary().await;
        progress.stop().await;
        let summary = joined?;

        self.output
            .report(&Report::new(Mode::Executor, start.elapsed()).with_summary(&summary));
        Ok(())
    }

    async fn tasks(&self, count: usize, sleep: Duration) -> Result<(), RunnerError> {
        let start = Instant::now();
        let mut group = TaskGroup::with_shutdown(self.config.clone(), &self.shutdown)?;
        let progress = Progress::start(group.stats(), self.progress_interval);

        self.output.milestone("Creating tasks...");
        group.spawn_n(count, move |ctx| workload::sleep_task(ctx, sleep));

        self.output.milestone("Waiting for tasks...");
        let joined = group.join_summary().await;
        progress.stop().await;
        let summary = joined?;

        self.output.milestone("Finished");
        self.output
            .report(&Report::new(Mode::Tasks, start.elapsed()).with_summary(&summary));
        Ok(())
    }

    async fn os_threads(&self, count: usize, sleep: Duration) -> Result<(), RunnerError> {
        let cancel = ThreadCancel::new();

        let bridge = {
            let cancel = cancel.clone();
            let shutdown = self.shutdown.clone();
            tokio::spawn(async move {
                shutdown.cancelled().await;
                cancel.cancel();
            })
        };

        self.output.milestone("Creating threads...");
        let worker_cancel = cancel.clone();
        let joined =
            tokio::task::spawn_blocking(move || threads::spawn_and_join(count, sleep, &worker_cancel))
                .await;
        bridge.abort();

        let report = match joined {
            Ok(report) => report?,
            Err(err) => {
                warn!(error = %err, "Thread baseline did not finish");
                cancel.cancel();
                return Err(RunnerError::Interrupted {
                    completed: 0,
                    cancelled: count,
                });
            }
        };

        if self.shutdown.is_cancelled() {
            return Err(RunnerError::Interrupted {
                completed: report.joined - report.interrupted,
                cancelled: report.interrupted,
            });
        }

        self.output.milestone("Finished");
        self.output
            .report(&Report::new(Mode::OsThreads, report.elapsed).with_threads(&report));
        Ok(())
    }

    async fn sum(
        &self,
        count: usize,
        sleep: Duration,
        fail_at: Option<usize>,
    ) -> Result<(), RunnerError> {
        let start = Instant::now();
        let mut group = TaskGroup::with_shutdown(self.config.clone(), &self.shutdown)?;
        let progress = Progress::start(group.stats(), self.progress_interval);

        self.output.milestone(&format!("Forking {count} computations..."));
        group.spawn_n(count, move |ctx| async move {
            if fail_at == Some(ctx.id().index()) {
                return Err(TaskError::failed("injected failure"));
            }
            workload::heavy_computation(ctx, sleep).await
        });

        let joined = group.join().await;
        progress.stop().await;
        let results = joined?;

        self.output.report(
            &Report::new(Mode::Sum, start.elapsed())
                .with_summary(results.summary())
                .with_sum(results.sum()),
        );
        Ok(())
    }
}

/// Periodic progress logging for a running group.
struct Progress {
    done: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl Progress {
    fn start(stats: Arc<GroupStats>, interval: Option<Duration>) -> Self {
        let done = CancellationToken::new();
        let handle = interval.map(|interval| {
            let done = done.clone();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                // The first tick completes immediately.
                ticker.tick().await;
                loop {
                    tokio::select! {
                        _ = done.cancelled() => break,
                        _ = ticker.tick() => {
                            let snapshot = stats.snapshot();
                            info!(
                                finished = snapshot.finished,
                                running = snapshot.running,
                                queued = snapshot.queued(),
                                "Progress: {}", snapshot
                            );
                        }
                    }
                }
            })
        });
        Self { done, handle }
    }

    async fn stop(self) {
        self.done.cancel();
        if let Some(handle) = self.handle {
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_arguments_runs_executor_with_defaults() {
        let cli = Cli::try_parse_from(["fanout"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.policy, FailurePolicy::Strict);
        assert!(!cli.json);
        assert_eq!(cli.progress_interval(), Some(Duration::from_secs(1)));
        assert_eq!(cli.command.clone().unwrap_or_default(), Commands::default());
    }

    #[test]
    fn test_sum_arguments() {
        let cli = Cli::try_parse_from([
            "fanout",
            "sum",
            "--tasks",
            "10",
            "--fail-at",
            "3",
            "--policy",
            "resilient",
            "--deadline-ms",
            "500",
        ])
        .unwrap();

        assert_eq!(
            cli.command,
            Some(Commands::Sum {
                tasks: 10,
                sleep_ms: DEFAULT_SUM_SLEEP_MS,
                fail_at: Some(3),
            })
        );
        let config = cli.runner_config();
        assert_eq!(config.policy, FailurePolicy::Resilient);
        assert_eq!(config.join_deadline, Some(Duration::from_millis(500)));
    }

    #[test]
    fn test_os_threads_subcommand_name() {
        let cli = Cli::try_parse_from(["fanout", "os-threads", "--threads", "4"]).unwrap();
        assert_eq!(
            cli.command,
            Some(Commands::OsThreads {
                threads: 4,
                sleep_ms: DEFAULT_OS_THREAD_SLEEP_MS,
            })
        );
    }

    #[test]
    fn test_rejects_unknown_policy() {
        assert!(Cli::try_parse_from(["fanout", "--policy", "sometimes"]).is_err());
    }

    #[test]
    fn test_progress_can_be_disabled() {
        let cli = Cli::try_parse_from(["fanout", "--progress-interval-ms", "0"]).unwrap();
        assert!(cli.progress_interval().is_none());
    }

    fn quiet_bench(config: RunnerConfig) -> Bench {
        Bench {
            config,
            shutdown: CancellationToken::new(),
            output: Output::new(true),
            progress_interval: Some(Duration::from_millis(5)),
        }
    }

    #[tokio::test]
    async fn test_executor_mode_succeeds() {
        let bench = quiet_bench(RunnerConfig::default());
        assert!(bench.executor(100, Duration::from_millis(1), 0).await.is_ok());
    }

    #[tokio::test]
    async fn test_sum_mode_succeeds() {
        let bench = quiet_bench(RunnerConfig::default());
        assert!(bench.sum(100, Duration::from_millis(1), None).await.is_ok());
    }

    #[tokio::test]
    async fn test_sum_mode_strict_failure_is_an_error() {
        let bench = quiet_bench(RunnerConfig::default());
        let err = bench
            .sum(100, Duration::from_millis(50), Some(7))
            .await
            .unwrap_err();
        assert!(matches!(err, RunnerError::TaskFailed { .. }));
    }

    #[tokio::test]
    async fn test_sum_mode_resilient_failure_is_recorded() {
        let bench = quiet_bench(RunnerConfig::default().with_policy(FailurePolicy::Resilient));
        assert!(bench.sum(100, Duration::from_millis(1), Some(7)).await.is_ok());
    }

    #[tokio::test]
    async fn test_tasks_mode_interrupted_by_shutdown() {
        let bench = quiet_bench(RunnerConfig::default());
        bench.shutdown.cancel();
        let err = bench.tasks(10, Duration::from_secs(3600)).await.unwrap_err();
        assert!(matches!(err, RunnerError::Interrupted { .. }));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_os_threads_mode() {
        let bench = quiet_bench(RunnerConfig::default());
        assert!(bench.os_threads(4, Duration::from_millis(10)).await.is_ok());
    }
}
