//! CLI entry point for the terminology index.
//!
//! Administrative commands over one named index: initialize configuration,
//! rebuild from a JSON-lines record file, query, inspect and maintain.

use anyhow::{Context, anyhow};
use clap::{
    Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use termindex::{
    ComponentId, GenerationTarget, IndexError, IndexService, JsonlComponentStore, SearchQuery,
    Settings,
};

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Green.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Cyan.on_default())
}

/// Terminology full-text index
#[derive(Parser)]
#[command(
    name = "termindex",
    version = env!("CARGO_PKG_VERSION"),
    about = "Generation-consistent full-text index for terminology graphs",
    next_line_help = true,
    styles = clap_cargo_style()
)]
struct Cli {
    /// Path to custom settings.toml file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
enum Commands {
    /// Initialize project
    #[command(about = "Set up .termindex directory with default configuration")]
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Rebuild the index from a record file
    #[command(about = "Clear the index and index every record in a JSON-lines file")]
    Reindex {
        /// JSON-lines file with one component per line
        records: PathBuf,

        /// Number of indexing threads (overrides config)
        #[arg(short, long)]
        threads: Option<usize>,
    },

    /// Search the index
    #[command(
        about = "Search indexed components",
        after_help = "Examples:\n  termindex query \"fracture femur\"\n  termindex query \"family test\" --prefix\n  termindex query heart --assemblage 900 --limit 5"
    )]
    Query {
        /// Query text
        text: String,

        /// Treat the last word as a prefix (type-ahead)
        #[arg(long)]
        prefix: bool,

        /// Maximum number of results
        #[arg(short, long, default_value = "10")]
        limit: usize,

        /// Only match records in these assemblages
        #[arg(long = "assemblage", value_name = "ID")]
        assemblages: Vec<u64>,

        /// Only match records in the metadata module
        #[arg(long)]
        metadata_only: bool,

        /// Refresh the reader before searching
        #[arg(long)]
        latest: bool,

        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show index statistics
    #[command(about = "Display index validity, document counts and generations")]
    Stats {
        /// Output statistics as JSON
        #[arg(long)]
        json: bool,
    },

    /// Remove every document
    #[command(about = "Delete all documents, keeping the index directory")]
    Clear,

    /// Merge segments
    #[command(about = "Merge all index segments into one")]
    Merge,
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        if let Some(index_error) = e.downcast_ref::<IndexError>() {
            for suggestion in index_error.recovery_suggestions() {
                eprintln!("  - {suggestion}");
            }
        }
        std::process::exit(1);
    }
}

fn load_settings(config: Option<&PathBuf>) -> anyhow::Result<Settings> {
    match config {
        Some(path) => Settings::load_from(path).map_err(|e| {
            anyhow!("Configuration error loading from {}: {e}", path.display())
        }),
        None => Settings::load().map_err(|e| anyhow!("Configuration error: {e}")),
    }
}

fn open_service(
    settings: Settings,
    store: Arc<JsonlComponentStore>,
) -> anyhow::Result<IndexService> {
    let service = IndexService::start(settings, store.clone(), store, None)?;
    Ok(service)
}

fn run(cli: Cli) -> anyhow::Result<()> {
    if let Commands::Init { force } = &cli.command {
        let path = Settings::init_config_file(".", *force).map_err(|e| anyhow!("{e}"))?;
        println!("Created configuration file at: {}", path.display());
        println!("Edit this file to customize your settings.");
        return Ok(());
    }

    let mut settings = load_settings(cli.config.as_ref())?;
    termindex::logging::init(&settings.logging.level);

    match cli.command {
        Commands::Init { .. } => Ok(()),

        Commands::Reindex { records, threads } => {
            if let Some(threads) = threads {
                settings.indexing.parallel_threads = threads;
            }
            let store = Arc::new(
                JsonlComponentStore::open(&records)
                    .with_context(|| format!("loading records from {}", records.display()))?,
            );
            println!("Loaded {} records from {}", store.len(), records.display());

            let service = open_service(settings, store)?;
            let start = Instant::now();
            let report = service.reindex()?;
            service.shutdown()?;

            println!("\nReindex Complete:");
            println!("  Jobs: {}", report.jobs);
            println!("  Indexed: {}", report.indexed);
            println!("  Skipped: {}", report.skipped);
            println!("  Failed: {}", report.failed);
            if let Some(generation) = report.generation {
                println!("  Generation: {generation}");
            }
            println!("  Time elapsed: {:.2}s", start.elapsed().as_secs_f64());

            if report.has_failures() {
                return Err(anyhow!("{} records failed to index", report.failed));
            }
            Ok(())
        }

        Commands::Query {
            text,
            prefix,
            limit,
            assemblages,
            metadata_only,
            latest,
            json,
        } => {
            let service = open_service(settings, Arc::new(JsonlComponentStore::new()))?;

            let mut query = if prefix {
                SearchQuery::prefix(text)
            } else {
                SearchQuery::parsed(text)
            }
            .with_limit(limit)
            .restricted_to(assemblages.into_iter().map(ComponentId));
            if metadata_only {
                query = query.metadata_only();
            }
            if latest {
                query = query.at_generation(GenerationTarget::Latest);
            }

            let results = service.search(&query)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else if results.is_empty() {
                println!("No results for '{}'", query.text);
            } else {
                for (rank, hit) in results.hits.iter().enumerate() {
                    println!("{:>3}. {}  (score {:.3})", rank + 1, hit.component_id, hit.score);
                }
                println!("\nGeneration: {}", results.generation);
            }
            service.shutdown()?;
            Ok(())
        }

        Commands::Stats { json } => {
            let service = open_service(settings, Arc::new(JsonlComponentStore::new()))?;
            let stats = service.stats();
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                stats.display();
            }
            service.shutdown()?;
            Ok(())
        }

        Commands::Clear => {
            let service = open_service(settings, Arc::new(JsonlComponentStore::new()))?;
            let generation = service.clear_index()?;
            service.shutdown()?;
            println!("Index cleared at generation {generation}");
            Ok(())
        }

        Commands::Merge => {
            let service = open_service(settings, Arc::new(JsonlComponentStore::new()))?;
            if service.force_merge()? {
                println!("Segments merged");
            } else {
                println!("Index already has at most one segment");
            }
            service.shutdown()?;
            Ok(())
        }
    }
}
