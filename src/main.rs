use anyhow::{Context, Result};
use clap::Parser;
use renderscope::cli::{Cli, OutputFormat};
use renderscope::config::ProfilerConfig;
use renderscope::display;
use renderscope::emitter::RenderProfiler;
use renderscope::engine::Instrumentation;
use renderscope::timing_event::RenderReport;
use renderscope::workload;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Extra wait after the last render so the final pass has run
const SETTLE_MARGIN: Duration = Duration::from_millis(50);

/// Initialize tracing subscriber for debug output
fn init_tracing(debug: bool) {
    if debug {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into()),
            )
            .with_writer(std::io::stderr)
            .init();
    }
}

/// Drive the demo form through its scripted edits, rendering after each
fn run_demo(scope: &Instrumentation, renders: usize) -> Result<()> {
    let key = scope.config().observed_key.clone();
    let profiler = RenderProfiler::with_key(scope.clone(), key.clone());
    let mut form = workload::demo_form().context("demo form has an invalid pattern")?;
    let edits = workload::demo_edits();

    form.render(&profiler, &key);
    for (name, value) in edits.iter().cycle().take(renders) {
        form.handle_change(name, value.clone());
        form.render(&profiler, &key);
    }

    match form.submit(|_| Ok(())) {
        Ok(data) => info!(fields = data.len(), "demo form submitted"),
        Err(e) => warn!(error = %e, "demo form rejected"),
    }
    form.render(&profiler, &key);
    Ok(())
}

/// Feed host-measured render reports from a JSON Lines file
fn run_replay(scope: &Instrumentation, path: &Path) -> Result<()> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read replay file {}", path.display()))?;
    let reports = RenderReport::parse_lines(&content)
        .with_context(|| format!("invalid replay file {}", path.display()))?;
    if reports.is_empty() {
        anyhow::bail!("replay file {} contains no render reports", path.display());
    }

    debug!(reports = reports.len(), "replaying render reports");
    for report in reports {
        scope.capture_report(report);
    }
    Ok(())
}

fn print_report(scope: &Instrumentation, args: &Cli) -> Result<()> {
    let snapshot = scope.snapshot();
    let state = scope.capture_state();
    let buffer = scope.buffer_stats();

    match args.format {
        OutputFormat::Json => {
            println!("{}", display::render_json(&snapshot, state, &buffer)?);
        }
        OutputFormat::Text => {
            if !scope.is_enabled() {
                println!("Instrumentation disabled; no renders were captured.");
                return Ok(());
            }
            print!("{}", display::render_table(&snapshot));
            print!("{}", display::render_buffer_line(state, &buffer));
            if args.legend {
                println!();
                print!("{}", display::render_legend(scope.config().max_samples));
            }
        }
    }
    Ok(())
}

async fn run(args: Cli, config: ProfilerConfig) -> Result<()> {
    let period = config.aggregation_period();
    let scope = Instrumentation::new(config)?;
    let task = scope.start_aggregation();

    match &args.replay {
        Some(path) => run_replay(&scope, path)?,
        None => run_demo(&scope, args.renders)?,
    }

    if scope.is_enabled() {
        tokio::time::sleep(period + SETTLE_MARGIN).await;
    }
    task.shutdown().await;

    print_report(&scope, &args)
}

fn main() -> Result<()> {
    let args = Cli::parse();

    // Initialize tracing if --debug flag is set
    init_tracing(args.debug);

    let config = args.profiler_config()?;
    debug!(?config, "starting renderscope");

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .context("failed to start async runtime")?;

    runtime.block_on(run(args, config))
}
