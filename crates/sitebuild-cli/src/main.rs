//! Sitebuild CLI - static site build entry points
//!
//! Commands:
//! - sitebuild               - Same as `sitebuild build`
//! - sitebuild build         - Clean, run every asset group, publish
//! - sitebuild clean         - Remove the output directory
//! - sitebuild <group>       - Run one asset group (images, styles, ...)
//! - sitebuild publish       - Sync the output directory to the bucket
//! - sitebuild watch         - Re-run groups as their sources change

use anyhow::Result;
use clap::{Parser, Subcommand};
use sitebuild_core::{
    BuildGraph, BuildOutcome, ObjectStore, ProfileCredentials, S3Store, SiteConfig, TaskStatus,
};
use sitebuild_watch::WatchSupervisor;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

/// Sitebuild - build and publish a static site
#[derive(Parser)]
#[command(name = "sitebuild", version, about = "Build and publish a static site")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Clone, Copy)]
enum Commands {
    /// Remove the output directory
    Clean,
    /// Compress images
    Images,
    /// Minify stylesheets
    Styles,
    /// Strip, transpile, minify and bundle scripts into app.js
    Scripts,
    /// Minify page HTML
    #[command(name = "pagesHtml")]
    PagesHtml,
    /// Minify the home page
    #[command(name = "pageHome")]
    PageHome,
    /// Minify page stylesheets
    #[command(name = "pagesCSS")]
    PagesCss,
    /// Copy shared files
    Shared,
    /// Sync the output directory to the bucket
    Publish,
    /// Re-run asset groups as their sources change
    Watch,
    /// Clean, run every asset group, then publish (default)
    Build,
}

impl Commands {
    fn task_name(self) -> &'static str {
        match self {
            Commands::Clean => "clean",
            Commands::Images => "images",
            Commands::Styles => "styles",
            Commands::Scripts => "scripts",
            Commands::PagesHtml => "pagesHtml",
            Commands::PageHome => "pageHome",
            Commands::PagesCss => "pagesCSS",
            Commands::Shared => "shared",
            Commands::Publish => "publish",
            Commands::Watch => "watch",
            Commands::Build => "build",
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cwd = std::env::current_dir()?;
    let config = SiteConfig::load(&cwd)?;

    match cli.command.unwrap_or(Commands::Build) {
        Commands::Watch => watch_sources(&cwd, &config).await,
        command => run(&cwd, config, command.task_name()).await,
    }
}

async fn run(root: &Path, config: SiteConfig, name: &str) -> Result<()> {
    println!("🚀 sitebuild {}", name);
    let start = Instant::now();

    let credentials = Arc::new(ProfileCredentials::new(config.publish.profile.clone()));
    let store: Arc<dyn ObjectStore> = Arc::new(S3Store::new(&config.publish, credentials)?);
    let graph = BuildGraph::new(root, config, store)?;

    let outcome = graph.run(name).await?;
    print_outcome(&outcome, start);
    outcome.into_result()?;
    Ok(())
}

fn print_outcome(outcome: &BuildOutcome, start: Instant) {
    for result in &outcome.results {
        match result.status {
            TaskStatus::Completed => println!("✓ {} ({:?})", result.name, result.duration),
            TaskStatus::Failed => println!(
                "✗ {}: {}",
                result.name,
                result.error.as_deref().unwrap_or("failed")
            ),
            TaskStatus::Cancelled => println!("⏭ {} (not run)", result.name),
        }
    }

    if outcome.is_success() {
        println!("✅ {} finished in {:?}", outcome.target, start.elapsed());
    } else {
        println!("❌ {} failed in {:?}", outcome.target, start.elapsed());
    }
}

async fn watch_sources(root: &Path, config: &SiteConfig) -> Result<()> {
    config.validate()?;
    let supervisor = WatchSupervisor::new(root, config)?;

    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = tx.send(true);
        }
    });

    let stats = supervisor.run(rx).await?;
    println!("👋 Watch stopped: {} rerun(s), {} failed", stats.reruns, stats.failures);
    Ok(())
}
