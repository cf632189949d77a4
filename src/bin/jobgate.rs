//! jobgate CLI: run the controller against the simulated cluster.

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use jobgate::config::Config;
use jobgate::engine::{Collaborators, Controller};
use jobgate::host::HostState;
use jobgate::model::NewJob;
use jobgate::remote::SimulatedCluster;
use jobgate::store::{JobStore, MemoryStore};
use jobgate::telemetry::{TelemetryConfig, init_telemetry};

#[derive(Parser)]
#[command(name = "jobgate", about = "Job admission and status-polling controller")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the controller against an in-memory store and simulated cluster
    Run {
        /// Number of waiting jobs to seed
        #[arg(long, default_value_t = 6)]
        jobs: usize,
        /// Use the authenticated budget tier
        #[arg(long)]
        authenticated: bool,
        /// Stop after this many seconds even if jobs are still pending
        #[arg(long, default_value_t = 60)]
        duration_secs: u64,
        /// Log admission and polling decisions at info level
        #[arg(long)]
        verbose: bool,
    },
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Command::Run {
            jobs,
            authenticated,
            duration_secs,
            verbose,
        } => {
            cmd_run(
                config,
                jobs,
                authenticated,
                Duration::from_secs(duration_secs),
                verbose,
            )
            .await
        }
        Command::Config => cmd_config(&config),
    }
}

async fn cmd_run(
    config: Config,
    jobs: usize,
    authenticated: bool,
    duration: Duration,
    verbose: bool,
) -> anyhow::Result<()> {
    let guard = init_telemetry(TelemetryConfig {
        endpoint: config.otel_endpoint.clone(),
        service_name: "jobgate".to_string(),
        default_filter: config.log_level.clone(),
    })?;

    let store = Arc::new(MemoryStore::new());
    for i in 0..jobs {
        store.insert(NewJob::new(serde_json::json!({
            "prompt": format!("seeded request #{}", i + 1),
            "steps": 30,
        })))?;
    }

    let cluster = Arc::new(SimulatedCluster::new());
    let host = Arc::new(HostState::new());
    host.set_authenticated(authenticated || config.is_authenticated());

    let controller = Arc::new(Controller::new(
        Collaborators::with_host(store.clone(), cluster.clone(), host),
        config.controller_config(),
    ));
    if verbose {
        controller.set_verbose(true);
    }

    let handle = controller.start()?;

    match wait_for_stop(&store, duration, tokio::signal::ctrl_c()).await? {
        Stop::Drained => {}
        Stop::Interrupted => tracing::info!("interrupted"),
        Stop::Deadline => tracing::warn!("deadline reached with jobs still pending"),
    }

    handle.shutdown().await;
    guard.force_flush();

    print_summary(&store, &cluster)?;
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum Stop {
    Drained,
    Interrupted,
    Deadline,
}

/// Wait until the store has no pending jobs, `duration` elapses or
/// `interrupt` resolves. `interrupt` is created once and polled across every
/// check, so a signal between checks is not lost.
async fn wait_for_stop<F>(store: &MemoryStore, duration: Duration, interrupt: F) -> anyhow::Result<Stop>
where
    F: Future,
{
    let deadline = tokio::time::sleep(duration);
    tokio::pin!(deadline, interrupt);
    loop {
        tokio::select! {
            _ = &mut interrupt => return Ok(Stop::Interrupted),
            _ = &mut deadline => return Ok(Stop::Deadline),
            _ = tokio::time::sleep(Duration::from_millis(500)) => {
                if store.pending_records().await?.is_empty() {
                    return Ok(Stop::Drained);
                }
            }
        }
    }
}

fn print_summary(store: &MemoryStore, cluster: &SimulatedCluster) -> anyhow::Result<()> {
    let records = store.all()?;

    println!(
        "{:<8}  {:<10}  {:<36}  SUBMITTED",
        "ID", "STATUS", "REMOTE_ID"
    );
    println!("{}", "-".repeat(80));
    for record in &records {
        println!(
            "{:<8}  {:<10}  {:<36}  {}",
            record.id,
            record.status,
            record.remote_id.as_deref().unwrap_or("-"),
            record.submitted_at.format("%Y-%m-%d %H:%M:%S")
        );
    }

    let done = records.iter().filter(|r| r.status.is_terminal()).count();
    println!(
        "\n{done}/{} job(s) finished, {} submission(s), {} status check(s)",
        records.len(),
        cluster.submissions(),
        cluster.status_checks()
    );
    Ok(())
}

fn cmd_config(config: &Config) -> anyhow::Result<()> {
    println!("Authenticated:       {}", config.is_authenticated());
    println!("Max jobs (anon):     {}", config.max_jobs_anonymous);
    println!("Max jobs (user):     {}", config.max_jobs_authenticated);
    println!("Refresh interval:    {:?}", config.refresh_interval);
    println!("Admission interval:  {:?}", config.admission_interval);
    println!("Poll interval:       {:?}", config.poll_interval);
    println!("Poll spacing:        {:?}", config.poll_spacing);
    println!("Verbose:             {}", config.verbose);
    println!(
        "OTel endpoint:       {}",
        config.otel_endpoint.as_deref().unwrap_or("-")
    );
    println!("Log level:           {}", config.log_level);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_one_job() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .insert(NewJob::new(serde_json::json!({ "prompt": "a lighthouse" })))
            .unwrap();
        store
    }

    #[tokio::test(start_paused = true)]
    async fn interrupt_between_checks_stops_the_wait() {
        let store = store_with_one_job();

        // Lands between two 500 ms checks.
        let interrupt = tokio::time::sleep(Duration::from_millis(1750));
        let stop = wait_for_stop(&store, Duration::from_secs(60), interrupt)
            .await
            .unwrap();

        assert_eq!(stop, Stop::Interrupted);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_stops_the_wait_with_jobs_pending() {
        let store = store_with_one_job();

        let stop = wait_for_stop(&store, Duration::from_secs(3), std::future::pending::<()>())
            .await
            .unwrap();

        assert_eq!(stop, Stop::Deadline);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_store_stops_the_wait() {
        let store = MemoryStore::new();

        let stop = wait_for_stop(&store, Duration::from_secs(60), std::future::pending::<()>())
            .await
            .unwrap();

        assert_eq!(stop, Stop::Drained);
    }
}
