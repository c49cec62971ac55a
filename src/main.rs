//! bookmarkd - bookmark aggregation service
//!
//! Gathers bookmark YAML files from the projects of a GitLab group, validates
//! and merges them, and serves the merged list and its category tree over
//! HTTP. A webhook endpoint evicts the cache when a source repository changes.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (configuration, connection, bind failure, etc.)
//!   2 - Aggregation failed in --once mode (duplicate URLs, strict schema)

mod aggregator;
mod api;
mod bookmarks;
mod cache;
mod cli;
mod config;
mod error;
mod gitlab;
mod models;
mod report;
mod tree;

use aggregator::Aggregator;
use anyhow::{Context, Result};
use chrono::Utc;
use cli::{Args, OutputFormat};
use config::{Config, DEFAULT_CONFIG_FILE};
use indicatif::{ProgressBar, ProgressStyle};
use report::{Report, ReportMetadata};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    init_logging(&args);

    info!("bookmarkd v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(args).await {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(e) => {
            error!("bookmarkd failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .bookmarkd.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            DEFAULT_CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", DEFAULT_CONFIG_FILE);
    println!("   Set gitlab.root_group_id (or gitlab.projects) and an access token to get started.");
    Ok(())
}

/// Initialize logging. `RUST_LOG` takes precedence over --verbose/--quiet.
fn init_logging(args: &Args) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.log_level().to_string().to_lowercase()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Dispatch to the selected mode. Returns the exit code.
async fn run(args: Args) -> Result<i32> {
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    let aggregator = Arc::new(
        Aggregator::from_config(&config).context("Failed to create GitLab client")?,
    );

    if args.dry_run {
        return handle_dry_run(&aggregator).await;
    }

    if args.once {
        return handle_once(&args, &config, &aggregator).await;
    }

    run_server(&config, aggregator).await
}

/// Handle --dry-run: discover files, print what would be fetched, exit.
async fn handle_dry_run(aggregator: &Aggregator) -> Result<i32> {
    println!("\n🔍 Dry run: discovering data files (no file contents fetched)...\n");

    let files = aggregator.list_source_files().await;

    if files.is_empty() {
        println!("   No matching data files found.");
    } else {
        println!("   Found {} files that would be fetched:\n", files.len());
        for file in &files {
            println!("     📄 {}", file);
        }
        println!("\n   Total: {} files", files.len());
    }

    println!("\n✅ Dry run complete.");
    Ok(0)
}

/// Handle --once: aggregate, write the report, exit.
async fn handle_once(args: &Args, config: &Config, aggregator: &Aggregator) -> Result<i32> {
    let start_time = Instant::now();

    let spinner = if args.quiet {
        None
    } else {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}") {
            pb.set_style(style);
        }
        pb.set_message("Aggregating bookmarks...");
        pb.enable_steady_tick(Duration::from_millis(120));
        Some(pb)
    };

    let result = aggregator.fetch_all().await;

    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    let snapshot = match result {
        Ok(snapshot) => snapshot,
        Err(e) => {
            eprintln!("\n⛔ Aggregation failed:\n{}", e);
            if let error::AggregationError::SchemaViolations(ref reports) = e {
                eprintln!("{}", bookmarks::schema::describe(reports));
            }
            return Ok(2);
        }
    };

    let report = Report {
        metadata: ReportMetadata {
            gitlab_url: config.gitlab.api_url.clone(),
            root_group: config.gitlab.root_group_id.clone(),
            git_ref: config.gitlab.branch.clone(),
            data_path: config.gitlab.data_path.clone(),
            generated_at: Utc::now(),
            duration_seconds: start_time.elapsed().as_secs_f64(),
        },
        snapshot: &snapshot,
    };

    let output = match args.format {
        OutputFormat::Json => report::generate_json_report(&report)?,
        OutputFormat::Markdown => report::generate_markdown_report(&report),
    };

    std::fs::write(&args.output, &output)
        .with_context(|| format!("Failed to write report to {}", args.output.display()))?;

    let stats = &snapshot.stats;
    println!("\n📊 Aggregation Summary:");
    println!("   Projects: {}", stats.projects);
    println!("   Files fetched: {} of {}", stats.files_fetched, stats.files_listed);
    println!("   Bookmarks: {}", snapshot.bookmarks.len());
    println!(
        "   Fetch failures: {} | Parse failures: {} | Invalid files: {}",
        stats.fetch_failures, stats.parse_failures, stats.invalid_files
    );
    println!("   Duration: {:.1}s", report.metadata.duration_seconds);
    println!("\n✅ Report saved to: {}", args.output.display());

    Ok(0)
}

/// Serve the HTTP API until interrupted.
async fn run_server(config: &Config, aggregator: Arc<Aggregator>) -> Result<i32> {
    if config.server.warm_on_startup {
        let warm = Arc::clone(&aggregator);
        tokio::spawn(async move {
            match warm.fetch_all().await {
                Ok(snapshot) => info!("Cache warmed with {} bookmark(s)", snapshot.bookmarks.len()),
                Err(e) => warn!("Cache warm-up failed: {}", e),
            }
        });
    }

    if let Some(period) = config.cache.refresh_interval() {
        let refresh = Arc::clone(&aggregator);
        tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut ticks = tokio::time::interval_at(start, period);
            loop {
                ticks.tick().await;
                info!("Scheduled refresh");
                refresh.invalidate().await;
            }
        });
    }

    let state = api::AppState::new(aggregator, config.webhook.secret_token.clone());
    let app = api::create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind))?;
    info!("🚀 Listening on http://{}", config.server.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("Shutdown signal received");
        })
        .await
        .context("Server error")?;

    info!("✅ Server stopped");
    Ok(0)
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", DEFAULT_CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
