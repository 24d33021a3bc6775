//! devsync CLI
//!
//! ```text
//! devsync storage list          declared and provisioned storage with state
//! devsync storage push          create/delete claims to match the declaration
//! devsync url list [--offline]  declared and exposed URLs with state
//! devsync url push              create/delete ingresses and routes
//! devsync push                  both families, concurrently
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tabled::{Table, Tabled};
use tracing::{debug, error, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use devsync::config::ComponentConfig;
use devsync::reconcile::endpoint::offline_entries;
use devsync::{
    EndpointEntry, EndpointReconciler, KubeEndpointClient, KubeStorageClient, LocalConfigFile,
    LocalConfigProvider, PushSummary, Result, StorageEntry, StorageReconciler,
    DEFAULT_CONFIG_PATH,
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// devsync - keep component storage and URLs in sync with the cluster
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Component declaration file
    #[arg(short, long, env = "DEVSYNC_CONFIG", default_value = DEFAULT_CONFIG_PATH, global = true)]
    config: PathBuf,

    /// Namespace, overrides the declaration file and kube context
    #[arg(short, long, env = "DEVSYNC_NAMESPACE", global = true)]
    namespace: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table, global = true)]
    output: OutputFormat,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "DEVSYNC_LOG_LEVEL", default_value = "warn", global = true)]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "DEVSYNC_LOG_JSON", global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manage component storage
    Storage {
        #[command(subcommand)]
        action: StorageCommand,
    },
    /// Manage component URLs
    Url {
        #[command(subcommand)]
        action: UrlCommand,
    },
    /// Push storage and URLs
    Push,
}

#[derive(Subcommand, Debug)]
enum StorageCommand {
    /// List storage with its reconciliation state
    List,
    /// Create and delete claims to match the declaration
    Push,
}

#[derive(Subcommand, Debug)]
enum UrlCommand {
    /// List URLs with their reconciliation state
    List {
        /// Do not contact the cluster
        #[arg(long)]
        offline: bool,
    },
    /// Create and delete ingresses/routes to match the declaration
    Push,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() {
    let args = Args::parse();

    init_logging(&args);

    if let Err(e) = run(args).await {
        error!(error = %e, "Command failed");
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

/// Cluster-backed reconcilers for one component
struct Session {
    storage: StorageReconciler,
    endpoints: EndpointReconciler,
}

async fn connect(args: &Args, config: &ComponentConfig) -> Result<Session> {
    let client = kube::Client::try_default().await?;
    let namespace = args
        .namespace
        .clone()
        .or_else(|| config.namespace.clone())
        .unwrap_or_else(|| client.default_namespace().to_string());
    debug!(%namespace, component = %config.component(), "Connected to cluster");

    Ok(Session {
        storage: StorageReconciler::new(
            Arc::new(KubeStorageClient::new(client.clone(), &namespace)),
            config.component(),
        ),
        endpoints: EndpointReconciler::new(
            Arc::new(KubeEndpointClient::new(client, &namespace)),
            config.component(),
        ),
    })
}

async fn run(args: Args) -> Result<()> {
    let local = LocalConfigFile::new(&args.config);
    let config = local.load()?;

    if let Command::Url {
        action: UrlCommand::List { offline: true },
    } = args.command
    {
        let entries = offline_entries(&local.list_endpoints()?);
        return print(&url_table(&entries), &entries, args.output);
    }

    let session = connect(&args, &config).await?;
    match args.command {
        Command::Storage { action } => match action {
            StorageCommand::List => {
                let entries = session.storage.list_with_state(&local.list_storage()?).await?;
                print(&storage_table(&entries), &entries, args.output)
            }
            StorageCommand::Push => {
                let summary = session.storage.push(&local.list_storage()?).await?;
                print_summaries(&[summary], args.output)
            }
        },
        Command::Url { action } => match action {
            UrlCommand::List { .. } => {
                let entries = session
                    .endpoints
                    .list_with_state(&local.list_endpoints()?)
                    .await?;
                print(&url_table(&entries), &entries, args.output)
            }
            UrlCommand::Push => {
                let summary = session.endpoints.push(&local.list_endpoints()?).await?;
                print_summaries(&[summary], args.output)
            }
        },
        Command::Push => {
            let declared_storage = local.list_storage()?;
            let declared_urls = local.list_endpoints()?;
            let (storage, urls) = futures::try_join!(
                session.storage.push(&declared_storage),
                session.endpoints.push(&declared_urls)
            )?;
            print_summaries(&[storage, urls], args.output)
        }
    }
}

// =============================================================================
// Output
// =============================================================================

fn print<T: Serialize>(table: &str, items: &[T], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => print!("{}", table),
        OutputFormat::Json => println!("{}", json_list(items)?),
    }
    Ok(())
}

fn print_summaries(summaries: &[PushSummary], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => {
            for summary in summaries {
                println!("{}", summary);
            }
        }
        OutputFormat::Json => println!("{}", json_list(summaries)?),
    }
    Ok(())
}

fn json_list<T: Serialize>(items: &[T]) -> Result<String> {
    let doc = serde_json::json!({
        "kind": "List",
        "items": items,
    });
    Ok(serde_json::to_string_pretty(&doc)?)
}

#[derive(Tabled)]
struct StorageRow {
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "SIZE")]
    size: String,
    #[tabled(rename = "PATH")]
    path: String,
    #[tabled(rename = "CONTAINER")]
    container: String,
    #[tabled(rename = "STATE")]
    state: String,
}

impl From<&StorageEntry> for StorageRow {
    fn from(entry: &StorageEntry) -> Self {
        Self {
            name: entry.spec.name.clone(),
            size: entry.spec.size.clone(),
            path: entry.spec.path.clone(),
            container: entry.spec.container.clone(),
            state: entry.state.to_string(),
        }
    }
}

#[derive(Tabled)]
struct UrlRow {
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "KIND")]
    kind: String,
    #[tabled(rename = "URL")]
    url: String,
    #[tabled(rename = "PORT")]
    port: u16,
    #[tabled(rename = "SECURE")]
    secure: bool,
    #[tabled(rename = "STATE")]
    state: String,
}

impl From<&EndpointEntry> for UrlRow {
    fn from(entry: &EndpointEntry) -> Self {
        Self {
            name: entry.spec.name.clone(),
            kind: entry.spec.kind.to_string(),
            url: entry.url.clone(),
            port: entry.spec.port,
            secure: entry.spec.secure,
            state: entry.state.to_string(),
        }
    }
}

fn storage_table(entries: &[StorageEntry]) -> String {
    if entries.is_empty() {
        return "No storage found\n".to_string();
    }
    let rows: Vec<StorageRow> = entries.iter().map(StorageRow::from).collect();
    format!("{}\n", Table::new(rows))
}

fn url_table(entries: &[EndpointEntry]) -> String {
    if entries.is_empty() {
        return "No URLs found\n".to_string();
    }
    let rows: Vec<UrlRow> = entries.iter().map(UrlRow::from).collect();
    format!("{}\n", Table::new(rows))
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };

    let mut filter = EnvFilter::from_default_env().add_directive(level.into());
    for directive in ["hyper=warn", "kube=warn", "tower=warn"] {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }

    // stdout carries command output only
    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}
