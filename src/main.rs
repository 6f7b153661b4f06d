//! Tasklist CLI - serve the task list API or manage tasks from the terminal.

use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tasklist::{Backend, NewTask, RedisStore, RetryPolicy, Server, ServerConfig, Store, Task, TaskPatch};

mod cli;

use cli::{Cli, Command};

fn setup_logging(log_file: Option<&Path>) -> Result<()> {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));

    if let Some(log_file) = log_file {
        if let Some(parent) = log_file.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).context("Failed to create log directory")?;
        }

        let target = Box::new(
            fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(log_file)
                .context("Failed to open log file")?,
        );
        builder.target(env_logger::Target::Pipe(target));
    }

    builder.init();

    if let Some(log_file) = log_file {
        info!("Logging initialized, writing to: {}", log_file.display());
    }
    Ok(())
}

async fn open_store(cli: &Cli) -> Result<Store> {
    let retry = RetryPolicy::with_max_retries(cli.connect_retries);
    let backend = RedisStore::connect(&cli.redis_url, &retry)
        .await
        .context("Failed to connect to Redis")?;
    Ok(Store::new(Arc::new(backend)))
}

fn print_task(task: &Task) {
    let check = if task.completed { "✓".green() } else { "○".yellow() };
    let category = task
        .category
        .as_ref()
        .map(|c| format!(" ({})", c))
        .unwrap_or_default();
    let tags = if task.tags.is_empty() {
        String::new()
    } else {
        format!(" [{}]", task.tags.join(", "))
    };
    println!(
        "{} {} {}{}{}",
        check,
        task.id.cyan(),
        task.title,
        category.blue(),
        tags.dimmed()
    );
}

async fn run(cli: Cli) -> Result<()> {
    match &cli.command {
        Command::Serve {
            host,
            port,
            static_dir,
            memory,
        } => {
            let backend = if *memory {
                Backend::Memory
            } else {
                Backend::Redis {
                    url: cli.redis_url.clone(),
                    retry: RetryPolicy::with_max_retries(cli.connect_retries),
                }
            };
            let config = ServerConfig {
                host: host.clone(),
                port: *port,
                static_dir: static_dir.clone(),
                backend,
            };

            println!("{} Starting server on {}", "→".blue(), config.bind_addr());
            let server = Server::connect(config).await?;
            server.run().await.context("Server error")?;
        }

        Command::List => {
            let store = open_store(&cli).await?;
            let mut tasks = store.list_tasks().await.context("Failed to list tasks")?;
            tasks.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

            if tasks.is_empty() {
                println!("{}", "No tasks found".dimmed());
            } else {
                for task in &tasks {
                    print_task(task);
                }
            }
        }

        Command::Add { title, category, tags } => {
            let store = open_store(&cli).await?;
            let task = store
                .create_task(NewTask {
                    title: Some(title.clone()),
                    completed: None,
                    category: category.clone(),
                    tags: tags.clone(),
                })
                .await
                .context("Failed to create task")?;

            println!("{} Created: {} {}", "✓".green(), task.id.cyan(), task.title);
        }

        Command::Done { id } => {
            let store = open_store(&cli).await?;
            let task = store
                .update_task(
                    id,
                    TaskPatch {
                        completed: Some(true),
                        ..Default::default()
                    },
                )
                .await
                .context("Failed to complete task")?;

            println!("{} Completed: {} {}", "✓".green(), task.id.cyan(), task.title);
        }

        Command::Remove { id } => {
            let store = open_store(&cli).await?;
            store.delete_task(id).await.context("Failed to delete task")?;

            println!("{} Deleted: {}", "✓".green(), id.cyan());
        }

        Command::Categories => {
            let store = open_store(&cli).await?;
            let mut categories = store.list_categories().await.context("Failed to list categories")?;
            categories.sort();

            if categories.is_empty() {
                println!("{}", "No categories".dimmed());
            } else {
                for category in categories {
                    println!("  {}", category.blue());
                }
            }
        }

        Command::Ping => {
            let store = open_store(&cli).await?;
            store.ping().await.context("Ping failed")?;
            println!("{} Redis is responding", "✓".green());
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    setup_logging(cli.log_file.as_deref()).context("Failed to setup logging")?;
    log::debug!("Command: {:?}", std::env::args().collect::<Vec<_>>());

    let rt = tokio::runtime::Runtime::new().context("Failed to create runtime")?;
    if let Err(e) = rt.block_on(run(cli)) {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }

    Ok(())
}
