//! `mcpbench run` handler
//!
//! Spawns one task per virtual user. Each VU connects its own client, runs
//! the scenario steps `iterations` times, and closes. Per-step latencies are
//! merged into a [`RunReport`] and printed as a table.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use colored::Colorize;
use prettytable::{row, Table};

use crate::commands::http_client_for;
use crate::config::{Config, ScenarioConfig, ScenarioStep};
use crate::error::{McpBenchError, Result};
use crate::mcp::types::{
    CallToolParams, GetPromptParams, ListAllParams, ListParams, ReadResourceParams,
};
use crate::mcp::Client;

/// Latency and failure counts for one row of the summary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepStats {
    pub calls: u64,
    pub failures: u64,
    pub total: Duration,
    pub max: Duration,
}

impl StepStats {
    fn record(&mut self, elapsed: Duration, ok: bool) {
        self.calls += 1;
        if !ok {
            self.failures += 1;
        }
        self.total += elapsed;
        self.max = self.max.max(elapsed);
    }

    fn merge(&mut self, other: &StepStats) {
        self.calls += other.calls;
        self.failures += other.failures;
        self.total += other.total;
        self.max = self.max.max(other.max);
    }

    /// Mean latency, zero when nothing was recorded.
    pub fn mean(&self) -> Duration {
        if self.calls == 0 {
            return Duration::ZERO;
        }
        Duration::from_nanos((self.total.as_nanos() / self.calls as u128) as u64)
    }
}

/// Aggregated outcome of a run.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// Connect-plus-handshake timings, one call per VU.
    pub connect: StepStats,
    /// One entry per scenario step, in scenario order.
    pub steps: Vec<(String, StepStats)>,
    /// Wall-clock time of the whole run.
    pub elapsed: Duration,
}

impl RunReport {
    fn merge(&mut self, other: RunReport) {
        self.connect.merge(&other.connect);
        for ((_, mine), (_, theirs)) in self.steps.iter_mut().zip(other.steps.iter()) {
            mine.merge(theirs);
        }
    }

    /// Whether any connect or step failed.
    pub fn has_failures(&self) -> bool {
        self.connect.failures > 0 || self.steps.iter().any(|(_, s)| s.failures > 0)
    }
}

/// Replace the configured scenario with the one in `path`, keeping CLI
/// overrides for `vus` and `iterations`.
pub fn apply_scenario_file(
    config: &mut Config,
    path: &Path,
    vus: Option<usize>,
    iterations: Option<usize>,
) -> Result<()> {
    let mut scenario = ScenarioConfig::from_file(path)?;
    if let Some(vus) = vus {
        scenario.vus = vus;
    }
    if let Some(iterations) = iterations {
        scenario.iterations = iterations;
    }
    tracing::debug!(
        "Loaded scenario from {} ({} steps)",
        path.display(),
        scenario.steps.len()
    );
    config.scenario = scenario;
    Ok(())
}

/// Run the configured scenario and print its summary
///
/// # Errors
///
/// Returns [`McpBenchError::Config`] if the scenario has no steps, and an
/// error if no virtual user managed to connect.
pub async fn run_scenario(config: Config) -> Result<()> {
    if config.scenario.steps.is_empty() {
        return Err(McpBenchError::Config("scenario has no steps".to_string()).into());
    }

    let http = http_client_for(&config)?;
    let client_config = Arc::new(config.client.clone());
    let kind = config.transport;

    println!(
        "{} {} VUs x {} iterations over {}",
        "Running".bold(),
        config.scenario.vus,
        config.scenario.iterations,
        kind
    );

    let report = execute(&config.scenario, move |_vu| {
        let client_config = Arc::clone(&client_config);
        let http = http.clone();
        async move { Client::connect(&client_config, kind, http).await }
    })
    .await;

    print_report(&report);

    if report.connect.failures == report.connect.calls {
        return Err(McpBenchError::Connection("no virtual user could connect".to_string()).into());
    }
    Ok(())
}

/// Run `scenario` with one task per VU, connecting each through `connect`.
pub async fn execute<F, Fut>(scenario: &ScenarioConfig, connect: F) -> RunReport
where
    F: Fn(usize) -> Fut,
    Fut: Future<Output = Result<Client>> + Send + 'static,
{
    let started = Instant::now();
    let steps = Arc::new(scenario.steps.clone());
    let iterations = scenario.iterations;
    let pause = Duration::from_millis(scenario.pause_ms);

    let handles: Vec<_> = (0..scenario.vus)
        .map(|vu| {
            let connecting = connect(vu);
            let steps = Arc::clone(&steps);
            tokio::spawn(run_vu(vu, connecting, steps, iterations, pause))
        })
        .collect();

    let mut report = empty_report(&steps);
    for handle in handles {
        match handle.await {
            Ok(vu_report) => report.merge(vu_report),
            Err(e) => tracing::warn!("virtual user task failed: {}", e),
        }
    }
    report.elapsed = started.elapsed();
    report
}

fn empty_report(steps: &[ScenarioStep]) -> RunReport {
    RunReport {
        connect: StepStats::default(),
        steps: steps
            .iter()
            .map(|s| (s.label(), StepStats::default()))
            .collect(),
        elapsed: Duration::ZERO,
    }
}

async fn run_vu<Fut>(
    vu: usize,
    connecting: Fut,
    steps: Arc<Vec<ScenarioStep>>,
    iterations: usize,
    pause: Duration,
) -> RunReport
where
    Fut: Future<Output = Result<Client>>,
{
    let mut report = empty_report(&steps);

    let started = Instant::now();
    let client = match connecting.await {
        Ok(client) => {
            report.connect.record(started.elapsed(), true);
            client
        }
        Err(e) => {
            report.connect.record(started.elapsed(), false);
            tracing::warn!(vu, "connect failed: {:#}", e);
            return report;
        }
    };

    for iteration in 0..iterations {
        for (step, (_, stats)) in steps.iter().zip(report.steps.iter_mut()) {
            let started = Instant::now();
            let outcome = execute_step(&client, step).await;
            stats.record(started.elapsed(), outcome.is_ok());
            if let Err(e) = outcome {
                tracing::debug!(vu, iteration, step = %step.label(), "step failed: {:#}", e);
            }
        }
        if !pause.is_zero() && iteration + 1 < iterations {
            tokio::time::sleep(pause).await;
        }
    }

    if let Err(e) = client.close().await {
        tracing::debug!(vu, "close failed: {:#}", e);
    }
    report
}

async fn execute_step(client: &Client, step: &ScenarioStep) -> Result<()> {
    match step {
        ScenarioStep::Ping => {
            if !client.ping().await {
                anyhow::bail!("ping failed");
            }
        }
        ScenarioStep::ListTools { cursor } => {
            client.list_tools(list_params(cursor)).await?;
        }
        ScenarioStep::ListResources { cursor } => {
            client.list_resources(list_params(cursor)).await?;
        }
        ScenarioStep::ListPrompts { cursor } => {
            client.list_prompts(list_params(cursor)).await?;
        }
        ScenarioStep::ListAllTools { meta } => {
            client
                .list_all_tools(ListAllParams { meta: meta.clone() })
                .await?;
        }
        ScenarioStep::ListAllResources { meta } => {
            client
                .list_all_resources(ListAllParams { meta: meta.clone() })
                .await?;
        }
        ScenarioStep::ListAllPrompts { meta } => {
            client
                .list_all_prompts(ListAllParams { meta: meta.clone() })
                .await?;
        }
        ScenarioStep::CallTool { name, arguments } => {
            let mut params = CallToolParams::new(name);
            params.arguments = arguments.clone();
            let result = client.call_tool(params).await?;
            if result.is_error == Some(true) {
                anyhow::bail!("tool {} reported an error", name);
            }
        }
        ScenarioStep::ReadResource { uri } => {
            client.read_resource(ReadResourceParams::new(uri)).await?;
        }
        ScenarioStep::GetPrompt { name, arguments } => {
            let mut params = GetPromptParams::new(name);
            params.arguments = arguments.clone();
            client.get_prompt(params).await?;
        }
    }
    Ok(())
}

fn list_params(cursor: &Option<String>) -> ListParams {
    match cursor {
        Some(cursor) => ListParams::with_cursor(cursor),
        None => ListParams::default(),
    }
}

fn format_latency(d: Duration) -> String {
    format!("{:.1} ms", d.as_secs_f64() * 1000.0)
}

fn print_report(report: &RunReport) {
    let mut table = Table::new();
    table.add_row(row!["Step", "Calls", "Failures", "Mean", "Max"]);
    table.add_row(row![
        "connect",
        report.connect.calls,
        report.connect.failures,
        format_latency(report.connect.mean()),
        format_latency(report.connect.max)
    ]);
    for (label, stats) in &report.steps {
        table.add_row(row![
            label,
            stats.calls,
            stats.failures,
            format_latency(stats.mean()),
            format_latency(stats.max)
        ]);
    }

    println!();
    table.printstd();
    let summary = format!("Finished in {:.2}s", report.elapsed.as_secs_f64());
    if report.has_failures() {
        println!("{} {}", summary, "with failures".red());
    } else {
        println!("{}", summary.green());
    }
}
