//! Cyberweave CLI: ingest frameworks, resolve mappings, query the graph.
//!
//! Usage:
//!   cyberweave ingest <FRAMEWORK|all> [--timeout secs]
//!   cyberweave resolve
//!   cyberweave query <id|category|neighbors|maps|search> ...
//!   cyberweave runs [--framework F]
//!   cyberweave stats
//!
//! Results go to stdout as JSON; logs go to stderr.

use clap::{Parser, Subcommand};
use cyberweave::adapter::SourceFetcher;
use cyberweave::{
    Config, CrossFrameworkQuery, Framework, NeighborhoodQuery, NodeKey, NodeKind, OpenStore,
    Relation, RunOptions, RunStatus, SearchQuery, SqliteStore, WeaveApi,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::Level;

#[derive(Parser)]
#[command(
    name = "cyberweave",
    version,
    about = "Citation-backed knowledge graph of security frameworks"
)]
struct Cli {
    /// YAML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Path to SQLite database file (overrides the config)
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest one framework, or `all` concurrently
    Ingest {
        /// Framework tag (e.g. THREAT_MODEL, hipaa) or `all`
        framework: String,
        /// Bound fetch and parse, in seconds
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Infer cross-framework MAPS_TO edges for every mapped pair
    Resolve,
    /// Query the graph
    Query {
        #[command(subcommand)]
        query: QueryCommand,
    },
    /// Show ingestion run history, newest first
    Runs {
        #[arg(long)]
        framework: Option<Framework>,
    },
    /// Node and edge counts
    Stats,
}

#[derive(Subcommand)]
enum QueryCommand {
    /// Look up nodes by framework-native identifier
    Id {
        external_id: String,
        #[arg(long)]
        framework: Option<Framework>,
    },
    /// All nodes of one kind in one framework
    Category {
        framework: Framework,
        kind: NodeKind,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Nodes around one node
    Neighbors {
        framework: Framework,
        kind: NodeKind,
        external_id: String,
        #[arg(long, default_value_t = 1)]
        hops: usize,
        #[arg(long)]
        relation: Option<Relation>,
    },
    /// Cross-framework mappings of one node
    Maps {
        framework: Framework,
        kind: NodeKind,
        external_id: String,
        #[arg(long)]
        min_confidence: Option<f64>,
    },
    /// Keyword search over identifiers, names and descriptions
    Search {
        #[arg(required = true)]
        words: Vec<String>,
        #[arg(long)]
        framework: Option<Framework>,
        #[arg(long)]
        limit: Option<usize>,
    },
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<PathBuf>, db: Option<PathBuf>) -> Result<Config, String> {
    let mut config = match path {
        Some(path) => Config::load(&path).map_err(|e| e.to_string())?,
        None => Config::default(),
    };
    if db.is_some() {
        config.database = db;
    }
    Ok(config)
}

fn open_api(config: &Config) -> Result<WeaveApi, String> {
    let db_path = config.database_path();
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let store = SqliteStore::open(&db_path)
        .map_err(|e| format!("Failed to open database {}: {}", db_path.display(), e))?;
    WeaveApi::from_config(config, Arc::new(store), Arc::new(SourceFetcher::new()))
        .map_err(|e| e.to_string())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> i32 {
    match serde_json::to_string_pretty(value) {
        Ok(text) => {
            println!("{}", text);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

async fn cmd_ingest(api: &WeaveApi, target: &str, timeout: Option<u64>) -> i32 {
    let frameworks: Vec<Framework> = if target.eq_ignore_ascii_case("all") {
        Framework::ALL.to_vec()
    } else {
        match target.parse() {
            Ok(framework) => vec![framework],
            Err(e) => {
                eprintln!("Error: {}", e);
                return 1;
            }
        }
    };

    let runs = match timeout {
        Some(secs) => {
            let options = RunOptions::new().with_timeout(Duration::from_secs(secs));
            let mut runs = Vec::new();
            for framework in frameworks {
                runs.push(api.reingest_with(framework, options.clone()).await);
            }
            runs
        }
        None => api.reingest_many(&frameworks).await,
    };

    let code = print_json(&runs);
    if runs.iter().any(|run| run.status() == RunStatus::Failed) {
        return 2;
    }
    code
}

async fn cmd_resolve(api: &WeaveApi) -> i32 {
    let report = api.resolve().await;
    let errors: Vec<String> = report.errors.iter().map(|e| e.to_string()).collect();
    let code = print_json(&serde_json::json!({
        "resolved": report.resolved,
        "errors": errors,
    }));
    if errors.is_empty() {
        code
    } else {
        1
    }
}

fn cmd_query(api: &WeaveApi, query: QueryCommand) -> i32 {
    let result = match query {
        QueryCommand::Id {
            external_id,
            framework,
        } => api
            .find_by_id(&external_id, framework)
            .map(|r| serde_json::to_value(r.hits)),
        QueryCommand::Category {
            framework,
            kind,
            limit,
        } => api.category(framework, kind).map(|mut r| {
            if let Some(limit) = limit {
                r.hits.truncate(limit);
            }
            serde_json::to_value(r.hits)
        }),
        QueryCommand::Neighbors {
            framework,
            kind,
            external_id,
            hops,
            relation,
        } => {
            let mut query =
                NeighborhoodQuery::from(NodeKey::new(framework, kind, external_id)).hops(hops);
            if let Some(relation) = relation {
                query = query.with_relation(relation);
            }
            api.neighborhood(&query).map(|r| serde_json::to_value(r))
        }
        QueryCommand::Maps {
            framework,
            kind,
            external_id,
            min_confidence,
        } => {
            let mut query = CrossFrameworkQuery::from(NodeKey::new(framework, kind, external_id));
            if let Some(min) = min_confidence {
                query = query.min_confidence(min);
            }
            api.mappings(&query).map(|r| serde_json::to_value(r))
        }
        QueryCommand::Search {
            words,
            framework,
            limit,
        } => {
            let mut query = SearchQuery::new(words);
            if let Some(framework) = framework {
                query = query.in_framework(framework);
            }
            if let Some(limit) = limit {
                query = query.limit(limit);
            }
            api.search(&query).map(|r| serde_json::to_value(r.hits))
        }
    };

    match result {
        Ok(Ok(value)) => print_json(&value),
        Ok(Err(e)) => {
            eprintln!("Error: {}", e);
            1
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_runs(api: &WeaveApi, framework: Option<Framework>) -> i32 {
    print_json(&api.run_history(framework))
}

fn cmd_stats(api: &WeaveApi) -> i32 {
    match api.stats() {
        Ok(stats) => print_json(&stats),
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match load_config(cli.config, cli.db) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    let api = match open_api(&config) {
        Ok(api) => api,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let code = match cli.command {
        Commands::Ingest { framework, timeout } => cmd_ingest(&api, &framework, timeout).await,
        Commands::Resolve => cmd_resolve(&api).await,
        Commands::Query { query } => cmd_query(&api, query),
        Commands::Runs { framework } => cmd_runs(&api, framework),
        Commands::Stats => cmd_stats(&api),
    };
    std::process::exit(code);
}
