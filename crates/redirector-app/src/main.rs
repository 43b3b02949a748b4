//! Redirector - host and path based HTTP redirect service.
//!
//! Subcommands:
//! - `serve`: HTTP redirect server with optional admin API
//! - `import`: load domains and rules from a JSON file
//! - `translate`: convert legacy nginx configs into importable JSON

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use directories::ProjectDirs;
use redirector_core::legacy::{translate_file, TranslateOptions, TranslationReport};
use redirector_server::{Server, ServerConfig, DEFAULT_ADMIN_PREFIX, DEFAULT_HOST, DEFAULT_PORT};
use redirector_storage::{Database, ImportOptions, ImportReport, ImportStats, Importer};
use tokio::task::JoinSet;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Redirector - host and path based HTTP redirect service
#[derive(Parser, Debug)]
#[command(name = "redirector", version, about)]
struct Args {
    /// Enable debug logging
    #[arg(long, global = true, env = "REDIRECTOR_DEBUG")]
    debug: bool,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info", env = "REDIRECTOR_LOG_LEVEL")]
    log_level: String,

    /// Directory for rotated log files; `serve` defaults to the app data directory
    #[arg(long, global = true, env = "REDIRECTOR_LOG_DIR")]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the redirect server
    Serve(ServeArgs),

    /// Import domains and redirect rules from a JSON file
    Import {
        json_file: PathBuf,

        /// Validate everything, then roll back
        #[arg(long)]
        dry_run: bool,

        /// Skip rejected domains and rules instead of aborting
        #[arg(long)]
        force: bool,

        #[arg(long, env = "REDIRECTOR_DB")]
        db: Option<PathBuf>,
    },

    /// Translate nginx config files into an import document
    Translate {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        #[arg(short, long, default_value = "results.json")]
        output: PathBuf,

        /// Attach raw source values to each rule
        #[arg(long)]
        debug_data: bool,
    },
}

#[derive(clap::Args, Debug)]
struct ServeArgs {
    #[arg(long, default_value = DEFAULT_HOST, env = "REDIRECTOR_HOST")]
    host: String,

    #[arg(long, default_value_t = DEFAULT_PORT, env = "REDIRECTOR_PORT")]
    port: u16,

    /// SQLite database file
    #[arg(long, env = "REDIRECTOR_DB")]
    db: Option<PathBuf>,

    /// Mount the admin API
    #[arg(long, env = "REDIRECTOR_ENABLE_ADMIN")]
    enable_admin: bool,

    #[arg(long, default_value = DEFAULT_ADMIN_PREFIX, env = "REDIRECTOR_ADMIN_PREFIX")]
    admin_prefix: String,

    /// Answer every non-probe request with 404
    #[arg(long, env = "REDIRECTOR_DISABLE_REDIRECTS")]
    disable_redirects: bool,

    /// Reported by the readiness probe
    #[arg(long, default_value = "unknown", env = "REDIRECTOR_COMMIT_HASH")]
    commit_hash: String,
}

/// Get the default logs directory path.
fn logs_dir() -> Option<PathBuf> {
    ProjectDirs::from("com", "redirector", "redirector").map(|dirs| dirs.data_dir().join("logs"))
}

/// Initialize logging; file rotation only when a log directory is available.
fn init_logging(
    args: &Args,
    log_dir: Option<PathBuf>,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let log_level = if args.debug { "debug" } else { &args.log_level };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "redirector={0},redirector_core={0},redirector_storage={0},redirector_server={0},warn",
            log_level
        ))
    });

    if let Some(log_dir) = log_dir {
        if std::fs::create_dir_all(&log_dir).is_ok() {
            let file_appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .max_log_files(5)
                .filename_prefix("redirector")
                .filename_suffix("log")
                .build(&log_dir)
                .ok();

            if let Some(appender) = file_appender {
                let (non_blocking, guard) = tracing_appender::non_blocking(appender);

                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().with_writer(std::io::stderr))
                    .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
                    .init();

                tracing::info!("Logging to {:?}", log_dir);
                return Some(guard);
            }
        }

        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
        tracing::warn!("File logging unavailable, using console only");
        return None;
    }

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
    None
}

fn open_database(db: Option<PathBuf>) -> anyhow::Result<Database> {
    let path = match db {
        Some(path) => path,
        None => Database::default_db_path()?,
    };
    Database::with_path(&path).with_context(|| format!("opening database {}", path.display()))
}

async fn serve(args: ServeArgs) -> anyhow::Result<()> {
    let ServeArgs {
        host,
        port,
        db,
        enable_admin,
        admin_prefix,
        disable_redirects,
        commit_hash,
    } = args;

    let mut config = ServerConfig::default()
        .with_host(host)
        .with_port(port)
        .with_redirects(!disable_redirects)
        .with_commit_hash(commit_hash);
    if enable_admin {
        config = config.with_admin(admin_prefix);
    }

    let db = open_database(db)?;
    tracing::info!(domains = db.domain_count()?, "Database ready");
    let server = Server::with_database(config, db)?;
    server.run().await?;
    Ok(())
}

fn import(json_file: &Path, options: ImportOptions, db: Option<PathBuf>) -> anyhow::Result<()> {
    let db = open_database(db)?;
    let report = Importer::new(&db, options).import_file(json_file)?;
    print!("{}", import_summary(&report));
    Ok(())
}

fn stats_lines(label: &str, stats: &ImportStats) -> String {
    format!(
        "{label}:\n  imported: {}\n  failed: {}\n  skipped: {}\n  total: {}\n",
        stats.successful,
        stats.failed,
        stats.skipped(),
        stats.total
    )
}

fn import_summary(report: &ImportReport) -> String {
    let mut out = String::new();
    if report.dry_run {
        out.push_str("Dry run, no changes were saved.\n");
    }
    out.push_str(&stats_lines("Domains", &report.domains));
    out.push_str(&stats_lines("Redirect rules", &report.rules));
    if !report.errors.is_empty() {
        out.push_str("Errors:\n");
        for error in &report.errors {
            out.push_str(&format!("  {error}\n"));
        }
    }
    out
}

/// Translates every input concurrently and merges results in input order.
///
/// A file that fails to read or parse is logged and left out of the
/// report; the command still fails afterwards.
async fn translate(
    inputs: Vec<PathBuf>,
    options: TranslateOptions,
) -> anyhow::Result<(TranslationReport, usize)> {
    let mut tasks = JoinSet::new();
    for (index, path) in inputs.into_iter().enumerate() {
        tasks.spawn_blocking(move || {
            let result = translate_file(&path, options);
            (index, path, result)
        });
    }

    let mut outcomes = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        outcomes.push(joined.context("translation task panicked")?);
    }
    outcomes.sort_by_key(|(index, _, _)| *index);

    let mut report = TranslationReport::default();
    let mut failed = 0;
    for (_, path, result) in outcomes {
        match result {
            Ok(servers) => report.extend(servers),
            Err(e) => {
                tracing::error!(path = %path.display(), "Failed to translate: {}", e);
                failed += 1;
            }
        }
    }
    Ok((report, failed))
}

async fn run_translate(
    inputs: Vec<PathBuf>,
    output: &Path,
    options: TranslateOptions,
) -> anyhow::Result<()> {
    let (report, failed) = translate(inputs, options).await?;

    let json = serde_json::to_string_pretty(&report)?;
    std::fs::write(output, json).with_context(|| format!("writing {}", output.display()))?;

    println!(
        "Wrote {} domains, {} rules and {} warnings to {}",
        report.results.len(),
        report.rule_count(),
        report.warnings.len(),
        output.display()
    );

    if failed > 0 {
        anyhow::bail!("{failed} input file(s) could not be translated");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_dir = match &args.command {
        Command::Serve(_) => args.log_dir.clone().or_else(logs_dir),
        _ => args.log_dir.clone(),
    };
    let _guard = init_logging(&args, log_dir);

    match args.command {
        Command::Serve(serve_args) => serve(serve_args).await,
        Command::Import {
            json_file,
            dry_run,
            force,
            db,
        } => {
            let options = ImportOptions { dry_run, force };
            tokio::task::spawn_blocking(move || import(&json_file, options, db)).await?
        }
        Command::Translate {
            inputs,
            output,
            debug_data,
        } => {
            let options = TranslateOptions {
                include_debug_data: debug_data,
            };
            run_translate(inputs, &output, options).await
        }
    }
}
