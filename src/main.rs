//! langsync 命令行入口

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Serialize;

use langsync::env::{generate_env_docs, EnvConfig};
use langsync::logging;
use langsync::translation::core::TranslationSummary;
use langsync::translation::{
    ConfigManager, StateStore, TranslateOptions, TranslationError, TranslationManager,
    TranslationQueue, TranslationResult, TranslatorConfig,
};

/// Keep localization files in sync through AI translation providers
#[derive(Parser, Debug)]
#[command(name = "langsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to the first of langsync.toml, .langsync.toml, langsync.json)
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log level: trace, debug, info, warn, error
    #[arg(long, global = true, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Translate missing keys from one locale into one or more locales
    Translate {
        #[arg(value_name = "FROM")]
        from: String,

        #[arg(value_name = "TO", required = true)]
        to: Vec<String>,

        /// Translate without writing files
        #[arg(long)]
        dry: bool,

        /// Retranslate every source key
        #[arg(long)]
        force: bool,

        /// Provider tried first
        #[arg(short, long)]
        provider: Option<String>,

        /// Show every translation for review (implies --dry)
        #[arg(long)]
        review: bool,
    },

    /// Translate into every locale found on disk
    Sync {
        #[arg(long, default_value = "en")]
        from: String,

        /// Target locales (defaults to every other locale on disk)
        #[arg(long, value_delimiter = ',')]
        to: Vec<String>,

        #[arg(short, long)]
        provider: Option<String>,

        #[arg(long)]
        force: bool,

        /// Run through the job queue, one job per file
        #[arg(long)]
        queue: bool,
    },

    /// Count keys that would be translated
    Count {
        from: String,
        to: String,

        #[arg(long)]
        force: bool,
    },

    /// Show the status of every source key in the target locale
    Inspect {
        from: String,
        to: String,

        /// Limit to one file
        #[arg(long)]
        file: Option<String>,
    },

    /// Check credentials and connectivity of a provider
    TestProvider {
        #[arg(value_name = "NAME")]
        name: String,
    },

    /// List configured providers
    Providers,

    /// List locales found on disk
    Locales,

    /// Clear the translation cache
    CacheClear,

    /// Show queue job state
    Status {
        /// Also write the state document to this file
        #[arg(long, value_name = "PATH")]
        export: Option<PathBuf>,
    },

    /// Show recent run reports
    Reports {
        #[arg(short = 'n', long, default_value = "10")]
        limit: usize,

        /// Write every report as a JSON array to this file
        #[arg(long, value_name = "PATH")]
        export: Option<PathBuf>,
    },

    /// Show environment configuration and document every variable
    Env,

    /// Write an example configuration file
    InitConfig {
        #[arg(value_name = "PATH", default_value = "langsync.toml")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn run(cli: Cli) -> TranslationResult<()> {
    if let Commands::Env = cli.command {
        let env = EnvConfig::from_env().map_err(|e| TranslationError::ConfigError(e.to_string()))?;
        env.print_summary();
        println!();
        print!("{}", generate_env_docs());
        return Ok(());
    }

    if let Commands::InitConfig { path, force } = &cli.command {
        if path.exists() && !force {
            return Err(TranslationError::InvalidInput(format!(
                "{} already exists, use --force to overwrite",
                path.display()
            )));
        }
        ConfigManager::generate_example_config(path)?;
        println!("Wrote {}", path.display());
        return Ok(());
    }

    let config = load_config(cli.config.as_ref())?;
    logging::init_logging(cli.log_level.as_deref(), config.log_file.as_deref())?;

    // 只有需要运行状态或报告的命令才访问状态数据库
    let store = match cli.command {
        Commands::Translate { .. }
        | Commands::Sync { .. }
        | Commands::Status { .. }
        | Commands::Reports { .. } => Some(StateStore::open(&config.state_dir())?),
        _ => None,
    };
    let mut manager = TranslationManager::new(config)?;
    if let Some(store) = &store {
        manager = manager.with_reports(store.reports.clone());
    }

    match cli.command {
        Commands::Translate {
            from,
            to,
            dry,
            force,
            provider,
            review,
        } => {
            let options = TranslateOptions {
                dry_run: dry,
                force,
                provider,
                review,
            };
            for target in &to {
                translate_locale(&manager, &from, target, &options, cli.json).await?;
            }
        }
        Commands::Sync {
            from,
            to,
            provider,
            force,
            queue,
        } => {
            let targets = if to.is_empty() {
                manager
                    .available_locales()?
                    .into_iter()
                    .filter(|locale| *locale != from)
                    .collect()
            } else {
                to
            };
            if targets.is_empty() {
                println!("No target locales found");
                return Ok(());
            }

            if queue {
                let store = require_store(store)?;
                run_queue(manager, store, &from, &targets, provider, force, cli.json).await?;
            } else {
                let options = TranslateOptions {
                    force,
                    provider,
                    ..TranslateOptions::default()
                };
                for target in &targets {
                    translate_locale(&manager, &from, target, &options, cli.json).await?;
                }
            }
        }
        Commands::Count { from, to, force } => {
            let missing = manager.count_missing(&from, &to, force)?;
            if cli.json {
                print_json(&serde_json::json!({ "from": from, "to": to, "missing": missing }))?;
            } else {
                println!("{} → {}: {} keys to translate", from, to, missing);
            }
        }
        Commands::Inspect { from, to, file } => match file {
            Some(name) => print_json(&manager.file_entries(&from, &to, &name)?)?,
            None => print_json(&manager.inspect_missing(&from, &to)?)?,
        },
        Commands::TestProvider { name } => {
            let check = manager.test_provider(&name).await;
            if cli.json {
                print_json(&check)?;
            } else {
                println!("{} {}", if check.ok { "OK" } else { "FAILED" }, check.message);
            }
            if !check.ok {
                process::exit(2);
            }
        }
        Commands::Providers => {
            let order = manager.provider_order(None);
            for name in manager.available_providers() {
                let position = order.iter().position(|p| *p == name);
                match position {
                    Some(index) => println!("{} (fallback #{})", name, index + 1),
                    None => println!("{}", name),
                }
            }
        }
        Commands::Locales => {
            for locale in manager.available_locales()? {
                println!("{}", locale);
            }
        }
        Commands::CacheClear => {
            manager.clear_cache()?;
            println!("Cache cleared");
        }
        Commands::Status { export } => {
            let store = require_store(store)?;
            let state = store.monitor.state()?;
            if let Some(path) = export {
                store.monitor.export_json(&path)?;
            }
            if cli.json {
                print_json(&state)?;
            } else {
                for job in &state.jobs {
                    println!(
                        "{} {:?} {} ({} → {}) {}/{}",
                        job.id,
                        job.status,
                        job.file,
                        job.from,
                        job.to,
                        job.translated,
                        job.progress_total
                    );
                }
                println!(
                    "pending: {}, completed: {}, failed: {}",
                    state.totals.pending, state.totals.completed, state.totals.failed
                );
            }
        }
        Commands::Reports { limit, export } => {
            let store = require_store(store)?;
            if let Some(path) = export {
                store.reports.export_json(&path)?;
            }
            print_json(&store.reports.latest(limit)?)?;
        }
        Commands::Env | Commands::InitConfig { .. } => {}
    }

    Ok(())
}

fn require_store(store: Option<StateStore>) -> TranslationResult<StateStore> {
    store.ok_or_else(|| TranslationError::InternalError("state store is not open".to_string()))
}

fn load_config(path: Option<&PathBuf>) -> TranslationResult<TranslatorConfig> {
    let manager = match path {
        Some(path) => ConfigManager::from_path(path)?,
        None => ConfigManager::new()?,
    };
    Ok(manager.into_config())
}

async fn translate_locale(
    manager: &TranslationManager,
    from: &str,
    to: &str,
    options: &TranslateOptions,
    json: bool,
) -> TranslationResult<()> {
    let total = manager.count_missing(from, to, options.force)?;
    let mut done = 0;
    let mut progress = |file: &str, key: &str, _: &str| {
        done += 1;
        if !json {
            eprintln!("[{}/{}] {} {}", done, total, file, key);
        }
    };

    let summary = match manager.translate(from, to, Some(&mut progress), options).await {
        Ok(summary) => summary,
        Err(e) => {
            if !json {
                for file in e.completed_files() {
                    println!("{}: missing {}, translated {}", file.name, file.missing, file.translated);
                }
            }
            return Err(e);
        }
    };

    if json {
        return print_json(&summary);
    }
    print_summary(from, to, &summary, options);
    Ok(())
}

fn print_summary(from: &str, to: &str, summary: &TranslationSummary, options: &TranslateOptions) {
    println!("{} → {}", from, to);
    for file in &summary.files {
        println!("  {}: missing {}, translated {}", file.name, file.missing, file.translated);
    }
    println!(
        "  total: missing {}, translated {}",
        summary.totals.missing, summary.totals.translated
    );

    if options.review {
        for (file, items) in &summary.reviews {
            println!("  [{}]", file);
            for (key, item) in items {
                let marker = if item.degraded { " (placeholders lost)" } else { "" };
                println!("    {}: {} → {} [{}]{}", key, item.source, item.translation, item.provider, marker);
            }
        }
    } else if options.is_dry_run() {
        for (file, preview) in &summary.previews {
            println!("  [{}]", file);
            for (key, translation) in preview {
                println!("    {}: {}", key, translation);
            }
        }
    }
}

async fn run_queue(
    manager: TranslationManager,
    store: StateStore,
    from: &str,
    targets: &[String],
    provider: Option<String>,
    force: bool,
    json: bool,
) -> TranslationResult<()> {
    let settings = manager.config().queue.clone();
    let queue = TranslationQueue::new(Arc::new(manager), store.monitor.clone(), &settings);
    let pool = queue.spawn_workers();

    let mut ids = Vec::new();
    for target in targets {
        ids.extend(queue.dispatch_all(from, target, provider.clone(), force)?);
    }

    queue.wait_idle().await;
    pool.shutdown().await;

    let state = store.monitor.state()?;
    if json {
        return print_json(&state);
    }

    for job in state.jobs.iter().filter(|job| ids.contains(&job.id)) {
        match &job.error {
            Some(error) => println!("{} {:?}: {}", job.file, job.status, error),
            None => println!("{} {:?}: translated {}", job.file, job.status, job.translated),
        }
    }
    println!(
        "pending: {}, completed: {}, failed: {}",
        state.totals.pending, state.totals.completed, state.totals.failed
    );
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> TranslationResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
