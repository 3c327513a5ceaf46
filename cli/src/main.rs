use anyhow::{Context, Result};
use clap::Parser;
use clap_derive::{Parser, Subcommand};
use config::{load_env_file, Settings};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use threadkeep_core::{
    DataLayer, DocumentDataLayer, FsDocumentStore, Pagination, StoreHandle, ThreadFilter, ThreadId,
};
use tracing::debug;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(author, version, about = "Inspect a threadkeep conversation store", long_about = None)]
struct Args {
    /// Root directory of the filesystem store
    #[arg(long, global = true, env = "THREADKEEP_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Logical database name
    #[arg(long, global = true, env = "THREADKEEP_DATABASE")]
    database: Option<String>,

    /// Log to stderr (filter from THREADKEEP_LOG / RUST_LOG, default debug)
    #[arg(long, short, global = true)]
    tracing: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a thread root and its ordered steps
    Thread { thread_id: String },
    /// List one page of a user's threads, newest first
    Threads {
        #[arg(long)]
        user: String,
        #[arg(long)]
        search: Option<String>,
        #[arg(long, default_value_t = 20)]
        page_size: usize,
        #[arg(long)]
        cursor: Option<String>,
    },
    /// Print the steps of a thread in creation order
    Steps { thread_id: String },
    /// Print a stored user
    User { identifier: String },
    /// Print the owner of a thread
    Author { thread_id: String },
    /// Delete a thread root (steps and elements are kept)
    DeleteThread { thread_id: String },
    /// Show which store and database are in use
    Info,
}

fn setup_tracing(enable: bool, settings: &Settings) -> Result<()> {
    if enable {
        let filter = EnvFilter::try_from_env("THREADKEEP_LOG")
            .or_else(|_| EnvFilter::try_from_default_env())
            .or_else(|_| EnvFilter::try_new(settings.log_filter.as_deref().unwrap_or("debug")))?;
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(tracing::Level::ERROR)
            .with_writer(std::io::sink)
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    }
    Ok(())
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(layer: &DocumentDataLayer, command: Command) -> Result<()> {
    match command {
        Command::Thread { thread_id } => {
            let thread_id = ThreadId::from(thread_id);
            match layer.get_thread(&thread_id).await {
                Some(thread) => print_json(&thread)?,
                None => println!("Thread '{}' not found", thread_id),
            }
        }
        Command::Threads {
            user,
            search,
            page_size,
            cursor,
        } => {
            let mut filter = ThreadFilter::for_user(user);
            if let Some(search) = search {
                filter = filter.with_search(search);
            }
            let pagination = Pagination {
                first: page_size,
                cursor,
            };
            let page = layer.list_threads(&pagination, &filter).await?;
            print_json(&page.data)?;
            match page.page_info.end_cursor {
                Some(next) => println!("Next page: --cursor {}", next),
                None => println!("No more threads"),
            }
        }
        Command::Steps { thread_id } => {
            print_json(&layer.get_steps(&thread_id.into()).await)?;
        }
        Command::User { identifier } => match layer.get_user(&identifier).await {
            Some(user) => print_json(&user)?,
            None => println!("User '{}' not found", identifier),
        },
        Command::Author { thread_id } => {
            let author = layer.get_thread_author(&thread_id.clone().into()).await;
            if author.is_empty() {
                println!("No author recorded for thread '{}'", thread_id);
            } else {
                println!("{}", author);
            }
        }
        Command::DeleteThread { thread_id } => {
            layer.delete_thread(&thread_id.clone().into()).await;
            println!("Deleted thread '{}' (steps and elements kept)", thread_id);
        }
        Command::Info => {
            println!("{}", layer.build_debug_url());
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    load_env_file();
    let args = Args::parse();
    let settings = Settings::load();

    setup_tracing(args.tracing, &settings)?;

    let root = args
        .data_dir
        .or_else(|| settings.store_dir())
        .context("no store directory: pass --data-dir or set THREADKEEP_DATA_DIR")?;
    let database = args.database.unwrap_or_else(|| settings.database_name.clone());
    debug!(root = %root.display(), database = %database, "Opening store");

    let store = Arc::new(FsDocumentStore::new(root));
    let handle = Arc::new(StoreHandle::new(store, database));
    let layer = DocumentDataLayer::new(handle)
        .await
        .context("failed to provision the store")?;

    let result = run(&layer, args.command).await;
    layer.close().await;
    result
}
