//! `repovault` CLI entry point.

use std::error::Error;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_error::ErrorLayer;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use repovault::cli::{Cli, Commands};
use repovault::config::RepositoryManagerConfig;
use repovault::manager::{ObservabilityScope, RepositoryManager, UpdateStrategy};
use repovault::memory::MemoryProvider;
use repovault::specifier::RepositorySpecifier;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "fatal error");
            eprintln!("Error: {e}");

            let mut source = e.source();
            if source.is_some() {
                eprintln!("\nCaused by:");
                let mut i = 0;
                while let Some(cause) = source {
                    eprintln!("  {i}: {cause}");
                    source = cause.source();
                    i += 1;
                }
            }

            let span_trace = tracing_error::SpanTrace::capture();
            if span_trace.status() == tracing_error::SpanTraceStatus::CAPTURED {
                eprintln!("\n{span_trace}");
            }

            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            let base_level = match verbose {
                0 => "warn",
                1 => "info",
                2 => "debug",
                _ => "trace",
            };
            EnvFilter::new(format!("warn,repovault={base_level}"))
        })
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(false))
        .with(ErrorLayer::default())
        .with(filter)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => RepositoryManagerConfig::from_yaml(path)?,
        None => RepositoryManagerConfig::default(),
    };

    // The demo provider only knows about repositories registered here;
    // a real deployment would supply a concrete VCS-backed provider.
    let provider = Arc::new(
        MemoryProvider::new()
            .with_repo("dummy", vec!["1.0.0".to_string()])
            .with_repo(cli_url(&cli.command), vec!["1.0.0".to_string()]),
    );

    let manager = RepositoryManager::new(
        config.root.clone(),
        provider,
        config.cache_path.clone(),
        config.cache_local_packages,
        config.max_concurrent_operations,
        None,
    )
    .await?;

    let scope = ObservabilityScope::new("cli");

    match cli.command {
        Commands::Lookup(args) => {
            let strategy = if args.always_update { UpdateStrategy::Always } else { UpdateStrategy::Never };
            let handle = manager
                .lookup("cli-package", RepositorySpecifier::new(args.url), strategy, &scope)
                .await?;
            println!("status: {:?}", handle.status());
            println!("clone path: {}", handle.clone_path().display());
        }
        Commands::Remove(args) => {
            manager.remove(&RepositorySpecifier::new(args.url)).await?;
            println!("removed");
        }
        Commands::Reset => {
            manager.reset(&scope).await?;
            println!("reset");
        }
    }

    Ok(())
}

fn cli_url(command: &Commands) -> String {
    match command {
        Commands::Lookup(args) => args.url.clone(),
        Commands::Remove(args) => args.url.clone(),
        Commands::Reset => String::new(),
    }
}
