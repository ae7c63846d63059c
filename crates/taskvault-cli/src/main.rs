use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};

use taskvault_core::config::StoreOptions;
use taskvault_core::store::{TaskFilter, TaskStore};
use taskvault_core::task::{render_task_line, task_to_json_value, tasks_to_json, Task, TaskDraft};
use taskvault_core::Status;

mod version;

#[derive(Parser)]
#[command(name = "tv", version = version::FULL, about = "Markdown task vault CLI")]
struct Cli {
    /// Vault root; defaults to the current directory.
    #[arg(long, global = true)]
    root: Option<PathBuf>,
    /// Never contact the daemon, even when configuration enables it.
    #[arg(long, global = true)]
    file_only: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Capture a new task
    Add {
        title: String,
        #[arg(long)]
        due: Option<String>,
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        project: Option<String>,
        #[arg(long = "tag")]
        tags: Vec<String>,
        #[arg(long)]
        estimate: Option<String>,
        #[arg(long)]
        body: Option<String>,
    },
    /// List tasks: inbox|next|waiting|scheduled|someday|completed|today|overdue|all
    List {
        #[arg(default_value = "inbox")]
        filter: String,
        #[arg(long)]
        json: bool,
    },
    /// Show one task, resolved by id, id suffix, or title fragment
    Show {
        query: String,
        #[arg(long)]
        json: bool,
    },
    /// Move a task to next
    Start { query: String },
    /// Complete a task
    Done { query: String },
    /// Park a task in someday
    Defer { query: String },
    /// Bring a task back to next
    Activate { query: String },
    /// Move a task to scheduled, optionally setting a due date
    Schedule {
        query: String,
        #[arg(long)]
        due: Option<String>,
    },
    /// Move a task to waiting, optionally recording who it waits on
    Waiting {
        query: String,
        #[arg(long = "on")]
        waiting_on: Option<String>,
    },
    /// Delete a task permanently
    Rm { query: String },
    /// Update fields on an existing task
    Set {
        query: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        due: Option<String>,
    },
    /// Report daemon reachability and last known health
    DaemonStatus,
    /// Print version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if matches!(cli.command, Command::Version) {
        println!("taskvault {}", version::FULL);
        return Ok(());
    }

    let root = match &cli.root {
        Some(root) => root.clone(),
        None => std::env::current_dir()?,
    };
    let mut options = StoreOptions::resolve(&root);
    if cli.file_only {
        options.daemon_enabled = false;
    }
    let store = TaskStore::new(options)?;

    match cli.command {
        Command::Add {
            title,
            due,
            status,
            project,
            tags,
            estimate,
            body,
        } => {
            let status = match status.as_deref() {
                Some(raw) => match Status::parse(raw) {
                    Some(status) => Some(status),
                    None => bail!("unknown status: {raw}"),
                },
                None => None,
            };
            let task = store
                .create(TaskDraft {
                    title,
                    status,
                    due,
                    project,
                    tags,
                    time_estimate: estimate,
                    body: body.unwrap_or_default(),
                    ..TaskDraft::default()
                })
                .await?;
            warn_on_fallback(&store);
            println!("{}", render_task_line(&task));
        }
        Command::List { filter, json } => {
            let Some(filter) = TaskFilter::parse(&filter) else {
                bail!("unknown filter: {filter}");
            };
            let tasks = store.list(filter).await?;
            warn_on_fallback(&store);
            if json {
                println!("{}", tasks_to_json(&tasks, false));
            } else {
                for task in &tasks {
                    println!("{}", render_task_line(task));
                }
            }
        }
        Command::Show { query, json } => {
            let task = resolve_required(&store, &query).await?;
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&task_to_json_value(&task, true))?
                );
            } else {
                println!("{}", render_task_line(&task));
                if !task.body.trim().is_empty() {
                    println!("\n{}", task.body);
                }
            }
        }
        Command::Start { query } => transition(&store, &query, Status::Next).await?,
        Command::Done { query } => transition(&store, &query, Status::Completed).await?,
        Command::Defer { query } => transition(&store, &query, Status::Someday).await?,
        Command::Activate { query } => transition(&store, &query, Status::Next).await?,
        Command::Schedule { query, due } => {
            let task = resolve_required(&store, &query).await?;
            let mut task = store.schedule(&task.id).await?;
            if let Some(due) = due {
                task = store.set_due(&task.id, &due).await?;
            }
            warn_on_fallback(&store);
            println!("{}", render_task_line(&task));
        }
        Command::Waiting { query, waiting_on } => {
            let task = resolve_required(&store, &query).await?;
            let mut task = store.move_to_waiting(&task.id).await?;
            if let Some(waiting_on) = waiting_on {
                task = store
                    .update(
                        &task.id,
                        taskvault_core::TaskPatch {
                            waiting_on: Some(Some(waiting_on)),
                            ..taskvault_core::TaskPatch::default()
                        },
                    )
                    .await?;
            }
            warn_on_fallback(&store);
            println!("{}", render_task_line(&task));
        }
        Command::Rm { query } => {
            let task = resolve_required(&store, &query).await?;
            store.delete(&task.id).await?;
            warn_on_fallback(&store);
            println!("deleted {}", task.id);
        }
        Command::Set { query, title, due } => {
            let task = resolve_required(&store, &query).await?;
            let mut task = task;
            if let Some(title) = title {
                task = store
                    .update(
                        &task.id,
                        taskvault_core::TaskPatch {
                            title: Some(title),
                            ..taskvault_core::TaskPatch::default()
                        },
                    )
                    .await?;
            }
            if let Some(due) = due {
                task = store.set_due(&task.id, &due).await?;
            }
            warn_on_fallback(&store);
            println!("{}", render_task_line(&task));
        }
        Command::DaemonStatus => {
            if !store.daemon_enabled() {
                println!("daemon: disabled (file-only mode)");
                return Ok(());
            }
            let reachable = store.test_connection().await;
            match store.last_health() {
                Some(health) => {
                    let freshness = if reachable { "live" } else { "last known" };
                    println!(
                        "daemon: {} ({freshness}) version {} uptime {:.0}s tasks {}",
                        health.status, health.version, health.uptime, health.cache.task_count
                    );
                }
                None => println!("daemon: unreachable, no known state"),
            }
        }
        Command::Version => unreachable!("handled above"),
    }
    Ok(())
}

async fn transition(store: &TaskStore, query: &str, status: Status) -> Result<()> {
    let task = resolve_required(store, query).await?;
    let task = store.update_status(&task.id, status).await?;
    warn_on_fallback(store);
    println!("{}", render_task_line(&task));
    Ok(())
}

async fn resolve_required(store: &TaskStore, query: &str) -> Result<Task> {
    match store.resolve(query).await? {
        Some(task) => Ok(task),
        None => bail!("no task matches {query:?}"),
    }
}

fn warn_on_fallback(store: &TaskStore) {
    if store.fell_back() {
        eprintln!("warning: daemon unavailable; served from the local vault");
    }
}
