// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! agentmeter demo entry point - an instrumented agent in a REPL.

use std::time::Instant;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use agentmeter::agent::{InstrumentedAgent, ScriptedAgent, DEFAULT_MODEL};
use agentmeter::config::{self, ResolvedSinkConfig, SinkOptions};
use agentmeter::sink;
use agentmeter::telemetry::{init_logging, LoggingConfig, OtlpConfig};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Instrumented agent session with telemetry.
#[derive(Parser)]
#[command(name = "agentmeter")]
#[command(author, version, about = "Instrumented agent session with telemetry", long_about = None)]
struct Cli {
    /// Service name attached to every measurement
    #[arg(long)]
    service: Option<String>,

    /// Deployment environment tag
    #[arg(long)]
    env: Option<String>,

    /// API key for agentless submission
    #[arg(long)]
    api_key: Option<String>,

    /// Application key sent alongside the API key
    #[arg(long)]
    app_key: Option<String>,

    /// Metrics site, e.g. datadoghq.eu
    #[arg(long)]
    site: Option<String>,

    /// Send to a local DogStatsD agent instead of the HTTP API
    #[arg(long)]
    statsd: bool,

    /// DogStatsD host
    #[arg(long)]
    statsd_host: Option<String>,

    /// DogStatsD port
    #[arg(long)]
    statsd_port: Option<u16>,

    /// Export spans to an OpenTelemetry collector (needs the otel feature)
    #[arg(long)]
    otlp: bool,

    /// Collector trace endpoint; defaults to OTEL_EXPORTER_OTLP_ENDPOINT
    #[arg(long, requires = "otlp")]
    otlp_endpoint: Option<String>,

    /// Model name reported by the agent
    #[arg(short, long, default_value = DEFAULT_MODEL)]
    model: String,

    /// Run a single prompt and exit
    #[arg(short = 'P', long)]
    prompt: Option<String>,

    /// Output format for non-interactive mode
    #[arg(short = 'f', long, value_enum, default_value = "text")]
    output_format: OutputFormat,

    /// Show debug logs
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Show trace logs for this crate
    #[arg(long)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Output format for non-interactive mode.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the resolved telemetry configuration
    Config,

    /// Show version information
    Version,
}

impl Cli {
    fn sink_options(&self) -> SinkOptions {
        SinkOptions {
            service: self.service.clone(),
            env: self.env.clone(),
            api_key: self.api_key.clone(),
            app_key: self.app_key.clone(),
            site: self.site.clone(),
            agentless: self.statsd.then_some(false),
            statsd_host: self.statsd_host.clone(),
            statsd_port: self.statsd_port,
            ..SinkOptions::default()
        }
    }

    fn logging_config(&self, options: &SinkOptions) -> LoggingConfig {
        let logging = LoggingConfig::from_verbosity(self.verbose, self.debug);
        if !self.otlp {
            return logging;
        }
        let service = config::resolve_sink_config(options).service;
        let otlp = match &self.otlp_endpoint {
            Some(endpoint) => OtlpConfig::new(service).with_endpoint(endpoint.as_str()),
            None => OtlpConfig::new(service),
        };
        logging.with_otlp(otlp)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let options = cli.sink_options();
    let _logging = init_logging(&cli.logging_config(&options))?;

    let config = resolve_config(&options)?;

    match cli.command {
        Some(Commands::Config) => {
            println!("{config:#?}");
            return Ok(());
        }
        Some(Commands::Version) => {
            println!("agentmeter {VERSION}");
            return Ok(());
        }
        None => {}
    }

    let agent = InstrumentedAgent::attach_with_config(
        ScriptedAgent::new().with_model(cli.model.clone()),
        config,
        sink::global(),
    );

    if let Some(prompt) = cli.prompt {
        return handle_prompt(&agent, &prompt, cli.output_format).await;
    }

    run_repl(&agent).await
}

/// Load files, environment and flags; invalid files fall back to flags and environment.
fn resolve_config(options: &SinkOptions) -> anyhow::Result<ResolvedSinkConfig> {
    let workspace_root = std::env::current_dir()?;
    Ok(match config::load_sink_config(&workspace_root, options) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring telemetry config files");
            config::resolve_sink_config(options)
        }
    })
}

async fn handle_prompt(
    agent: &InstrumentedAgent<ScriptedAgent>,
    prompt: &str,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let result = agent.invoke(prompt).await;
    agent.flush().await;

    let response = result?;
    match format {
        OutputFormat::Text => println!("{response}"),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&response)?),
    }
    Ok(())
}

async fn run_repl(agent: &InstrumentedAgent<ScriptedAgent>) -> anyhow::Result<()> {
    let config = agent.config();
    println!("\n{}\n", "Instrumented agent session".bold());
    println!("Service: {}  Env: {}", config.service.cyan(), config.env.cyan());
    println!("Backend: {}", agent.sink().backend().to_string().cyan());
    println!("Model:   {}", agent.model().cyan());
    println!("Tools:   {}", agent.wrapped_tools().join(", ").cyan());

    let mut editor = DefaultEditor::new()?;
    let session_start = Instant::now();
    let mut interactions = 0u32;

    loop {
        println!("\nWrite your question below or 'exit' to quit:");
        let line = match editor.readline("> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                println!("\nExecution interrupted. Exiting...");
                break;
            }
            Err(e) => return Err(e.into()),
        };

        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        editor.add_history_entry(input)?;
        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            break;
        }

        let start = Instant::now();
        match agent.invoke(input).await {
            Ok(response) => {
                interactions += 1;
                println!("{response}");
                println!(
                    "{}",
                    format!(
                        "\n[Metrics] Request #{interactions} processed in {:.2}s",
                        start.elapsed().as_secs_f64()
                    )
                    .dimmed()
                );
            }
            Err(e) => {
                println!("\n{} {e}", "An error occurred:".red());
                println!("Please try a different request.");
            }
        }
    }

    println!(
        "\n[Metrics] Session duration: {:.2}s",
        session_start.elapsed().as_secs_f64()
    );
    println!("[Metrics] Total interactions: {interactions}");
    if let Some(memory) = agent.sink().memory() {
        println!("\n{}", memory.snapshot().format_report());
    }
    agent.flush().await;

    println!("\nGoodbye!");
    Ok(())
}
