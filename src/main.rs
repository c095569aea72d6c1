use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand};
use tokio::sync::broadcast::error::TryRecvError;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use quarry_core::config::QuarryConfig;
use quarry_core::event::ResolveEvent;
use quarry_graph::{Quarry, Registry};
use quarry_sample::{register_all, SampleRequest, SampleResponse, RESPONSE};

const DEFAULT_CONFIG: &str = "quarry.toml";

#[derive(Parser)]
#[command(name = "quarry", version, about = "Concurrent named dependency resolution")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = DEFAULT_CONFIG)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve the sample inbox response
    Sample {
        /// Authentication token (overrides [sample].token)
        #[arg(long, env = "QUARRY_TOKEN")]
        token: Option<String>,
        /// Include unread notifications
        #[arg(long, conflicts_with = "hide_unread")]
        show_unread: bool,
        /// Leave unread notifications out
        #[arg(long)]
        hide_unread: bool,
        /// Print the response as JSON
        #[arg(long)]
        json: bool,
        /// Print resolution events to stderr
        #[arg(long)]
        events: bool,
    },
    /// Print the sample dependency graph
    Graph,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Handle completions before config loading
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "quarry", &mut std::io::stdout());
        return Ok(());
    }

    let config = load_config(&cli.config)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log.filter)),
        )
        .with_target(false)
        .init();

    let mut registry: Registry<SampleRequest> = Registry::new();
    register_all(&mut registry)?;

    match cli.command {
        Commands::Sample {
            token,
            show_unread,
            hide_unread,
            json,
            events,
        } => {
            let request = SampleRequest {
                token: token.unwrap_or_else(|| config.sample.token.clone()),
                show_unread: if show_unread {
                    true
                } else if hide_unread {
                    false
                } else {
                    config.sample.show_unread
                },
            };
            let quarry = registry.into_quarry().with_config(&config.resolver);
            let mut rx = match (events, quarry.events()) {
                (true, Some(bus)) => Some(bus.subscribe()),
                _ => None,
            };

            let result = resolve_until(&quarry, request, async {
                let _ = tokio::signal::ctrl_c().await;
            })
            .await;

            if let Some(rx) = rx.as_mut() {
                loop {
                    match rx.try_recv() {
                        Ok(event) => eprintln!("{}", describe(&event)),
                        Err(TryRecvError::Lagged(n)) => eprintln!("({n} events dropped)"),
                        Err(_) => break,
                    }
                }
            }

            let response = result?;
            if json {
                println!("{}", serde_json::to_string_pretty(response.as_ref())?);
            } else {
                println!("{response:#?}");
            }
        }
        Commands::Graph => {
            for name in registry.factory_names() {
                let deps = registry.dependencies_of(name);
                if deps.is_empty() {
                    println!("{name}");
                } else {
                    println!("{name} -> {}", deps.join(", "));
                }
            }
        }
        Commands::Completions { .. } => unreachable!("handled before config load"),
    }

    Ok(())
}

/// Resolve the sample response, cancelling it if `interrupt` completes first.
/// An interrupted resolution is an error so the process exits non-zero.
async fn resolve_until(
    quarry: &Quarry<SampleRequest>,
    request: SampleRequest,
    interrupt: impl Future<Output = ()>,
) -> anyhow::Result<Arc<SampleResponse>> {
    let cancel = CancellationToken::new();
    tokio::select! {
        result = quarry.get_as::<SampleResponse>(&cancel, request, RESPONSE) => Ok(result?),
        _ = interrupt => {
            info!("Interrupted, cancelling resolution");
            cancel.cancel();
            anyhow::bail!("resolution interrupted")
        }
    }
}

/// A missing default config falls back to defaults; a missing explicit one
/// is an error.
fn load_config(path: &Path) -> anyhow::Result<QuarryConfig> {
    if path.exists() || path != Path::new(DEFAULT_CONFIG) {
        Ok(QuarryConfig::load(path)?)
    } else {
        Ok(QuarryConfig::default())
    }
}

fn describe(event: &ResolveEvent) -> String {
    match event {
        ResolveEvent::SessionStarted { session_id, name } => {
            format!("[{session_id}] resolving {name}")
        }
        ResolveEvent::FactoryStarted { session_id, name } => {
            format!("[{session_id}] {name}: started")
        }
        ResolveEvent::FactoryFinished {
            session_id,
            name,
            elapsed_ms,
        } => format!("[{session_id}] {name}: done in {elapsed_ms}ms"),
        ResolveEvent::FactoryFailed {
            session_id,
            name,
            error,
        } => format!("[{session_id}] {name}: failed: {error}"),
        ResolveEvent::DependencySkipped {
            session_id,
            parent,
            child,
        } => format!("[{session_id}] {parent}: skipped {child}"),
        ResolveEvent::SessionFinished {
            session_id,
            name,
            succeeded,
        } => format!(
            "[{session_id}] {name}: {}",
            if *succeeded { "resolved" } else { "failed" }
        ),
    }
}
