//! Command-line front end for the agentmux dispatcher.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use agentmux::{Agentmux, Configuration, ProcessExecutor, ProviderRegistry, SendOptions};

#[derive(Parser)]
#[command(name = "agentmux", version, about = "Dispatch prompts to installed AI coding agents")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Send a prompt through the orchestrated dispatcher.
    Send {
        /// The prompt to deliver.
        prompt: String,
        /// Preferred provider (falls back automatically when unfit).
        #[arg(short, long)]
        provider: Option<String>,
        /// Model override for this call.
        #[arg(short, long)]
        model: Option<String>,
        /// Per-call timeout in seconds.
        #[arg(short, long)]
        timeout: Option<u64>,
        /// Skip the agent's permission prompts where supported.
        #[arg(long)]
        dangerous: bool,
        /// Resume a previous agent session where supported.
        #[arg(long)]
        session: Option<String>,
        /// Bypass orchestration: exactly this provider, no retry, no
        /// failover.
        #[arg(long)]
        direct: bool,
    },
    /// List known providers and whether their binary is installed.
    Providers,
    /// Show dispatcher health and metrics.
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Send {
            prompt,
            provider,
            model,
            timeout,
            dangerous,
            session,
            direct,
        } => {
            let mux = build_dispatcher(provider.as_deref())?;
            let options = SendOptions {
                model,
                timeout: timeout.map(Duration::from_secs),
                dangerous,
                session_id: session,
                ..Default::default()
            };

            let response = if direct {
                let provider = provider
                    .context("--direct requires --provider")?;
                mux.execute_direct(&prompt, &provider, &options).await?
            } else {
                mux.send_message(&prompt, provider.as_deref(), &options).await?
            };

            debug!(provider = %response.provider, exit_code = response.exit_code, "response received");
            print!("{}", response.output);
            if let Some(error) = &response.error {
                eprintln!("{error}");
            }
            std::process::exit(response.exit_code);
        }
        Command::Providers => {
            let executor = ProcessExecutor::new();
            let registry = ProviderRegistry::with_builtins();
            let installed = registry.available(&executor);
            for name in registry.all() {
                let mark = if installed.contains(&name) { "installed" } else { "missing" };
                println!("{name:<16} {mark}");
            }
        }
        Command::Status => {
            let mux = build_dispatcher(None)?;
            let status = mux.status();
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
    }
    Ok(())
}

/// Assemble a configuration covering every installed agent binary. The
/// requested provider, when given, becomes the default even if its
/// binary is missing (the dispatcher will report that properly).
fn build_dispatcher(preferred: Option<&str>) -> Result<Agentmux> {
    let executor = ProcessExecutor::new();
    let registry = ProviderRegistry::with_builtins();
    let mut installed = registry.available(&executor);

    if let Some(name) = preferred {
        let canonical = registry
            .resolve(name)
            .with_context(|| format!("unknown provider `{name}`"))?;
        if !installed.contains(&canonical) {
            installed.push(canonical);
        }
    }

    if installed.is_empty() {
        bail!("no agent binaries found on PATH; install one of: {}", registry.all().join(", "));
    }

    let mut builder = Configuration::builder();
    for (priority, name) in installed.iter().enumerate() {
        builder = builder.provider(name.clone(), |p| p.priority(priority as i32));
    }
    if let Some(name) = preferred {
        let canonical = registry.resolve(name).expect("resolved above");
        builder = builder.default_provider(canonical);
    }

    let config = builder.build()?;
    Agentmux::with_parts(config, registry, Arc::new(executor))
        .context("failed to assemble dispatcher")
}
