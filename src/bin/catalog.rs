//! Resource Catalog CLI
//!
//! Create, fetch, list, update and delete catalog entities, and inspect the
//! registered types.

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use resource_catalog::config::StoreBackend;
use resource_catalog::view::parse_query_string;
use resource_catalog::{Catalog, CatalogConfig, FetchScope, FileStore, ListFilter, MemoryStore, Store, ViewConfig};
use serde_json::Value;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "catalog")]
#[command(about = "Typed, hierarchically-named resource catalog")]
struct Cli {
    /// Config file layered over the default locations
    #[arg(short, long)]
    config: Option<String>,

    /// Override the snapshot path of the file store
    #[arg(short, long)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered types and their relationships
    Types,

    /// Print the type graph in DOT format
    Graph,

    /// Create an entity, printing its id
    Create {
        type_name: String,
        /// JSON object, or @path to read it from a file
        body: String,
    },

    /// Fetch one entity
    Get {
        type_name: String,
        id: Uuid,
        /// View options, e.g. "fields=name,device_family_refs&strict_fields"
        #[arg(short, long, default_value = "")]
        query: String,
    },

    /// List entities of a type
    List {
        type_name: String,
        /// Filters and view options, e.g. "detail=true&parent_id=<uuid>"
        #[arg(short, long, default_value = "")]
        query: String,
    },

    /// Merge attributes into an entity
    Update {
        type_name: String,
        id: Uuid,
        /// JSON object, or @path to read it from a file
        body: String,
    },

    /// Delete an entity
    Delete { type_name: String, id: Uuid },

    /// Show the effective configuration, or save it
    Config {
        /// Write the configuration as TOML to this path
        #[arg(long)]
        save: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    let config = match CatalogConfig::load_from(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(e) = run(cli, config) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli, mut config: CatalogConfig) -> anyhow::Result<()> {
    if let Some(path) = cli.store {
        config.store.path = path;
    }

    if let Commands::Config { save } = &cli.command {
        match save {
            Some(path) => {
                config.save(path)?;
                println!("Saved configuration to {}", path.display());
            }
            None => print!("{}", toml::to_string_pretty(&config)?),
        }
        return Ok(());
    }

    match config.store.backend {
        StoreBackend::Memory => execute(Catalog::from_config(&config, MemoryStore::new())?, cli.command),
        StoreBackend::File => {
            let store = FileStore::open(config.store_path())
                .with_context(|| format!("opening store {}", config.store.path.display()))?;
            execute(Catalog::from_config(&config, store)?, cli.command)
        }
    }
}

fn execute<S: Store>(catalog: Catalog<S>, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Types => {
            for descriptor in catalog.registry().iter() {
                println!("{}", descriptor.name());
                print_list("parents", descriptor.parent_types());
                print_list("children", descriptor.child_types());
                print_list("refs", descriptor.ref_types());
                print_list("back refs", descriptor.back_ref_types());
                print_list("normalized", descriptor.normalized_fields());
            }
        }

        Commands::Graph => print!("{}", catalog.registry().to_dot()),

        Commands::Create { type_name, body } => {
            let id = catalog.create(&type_name, read_body(&body)?)?;
            println!("{}", id);
        }

        Commands::Get { type_name, id, query } => {
            let pairs = parse_query_string(&query);
            let view = ViewConfig::from_query(FetchScope::Single, &pairs);
            let doc = catalog.get(&type_name, id, &view)?;
            println!("{}", serde_json::to_string_pretty(&doc)?);
        }

        Commands::List { type_name, query } => {
            let pairs = parse_query_string(&query);
            let filter = ListFilter::from_query(&pairs)?;
            let view = ViewConfig::from_query(FetchScope::Collection, &pairs);
            let doc = catalog.list(&type_name, &filter, &view)?;
            println!("{}", serde_json::to_string_pretty(&doc)?);
        }

        Commands::Update { type_name, id, body } => {
            catalog.update(&type_name, id, read_body(&body)?)?;
            println!("{}", id);
        }

        Commands::Delete { type_name, id } => {
            let id = catalog.delete(&type_name, id)?;
            println!("{}", id);
        }

        Commands::Config { .. } => unreachable!("handled before the store is opened"),
    }
    Ok(())
}

fn print_list(label: &str, items: &[String]) {
    if !items.is_empty() {
        println!("  {}: {}", label, items.join(", "));
    }
}

fn read_body(arg: &str) -> anyhow::Result<Value> {
    let content = match arg.strip_prefix('@') {
        Some(path) => fs::read_to_string(path).with_context(|| format!("reading {}", path))?,
        None => arg.to_string(),
    };
    let body: Value = serde_json::from_str(&content).context("body is not valid JSON")?;
    if !body.is_object() {
        bail!("body must be a JSON object");
    }
    Ok(body)
}
